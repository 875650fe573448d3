//! Numbered-line view of a document.
//!
//! Agents edit by line number, so reads can be served with a `N: ` prefix
//! on every line. [`add_line_numbers`] and [`strip_line_numbers`] are
//! inverse only over output produced by `add_line_numbers` itself:
//! stripping arbitrary text that happens to start with `N: ` is lossy by
//! design, since the prefix is assumed to be annotation rather than
//! content.

use regex::Regex;

/// Prefix every line with its 1-based index, right-aligned to the width
/// of the largest index so the column stays visually aligned.
pub fn add_line_numbers(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines.len().to_string().len();

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove a leading run of optional whitespace, digits, a colon, and at
/// most one following space from every line.
pub fn strip_line_numbers(text: &str) -> String {
    let prefix = Regex::new(r"^\s*\d+: ?").expect("line-number pattern is valid");

    text.split('\n')
        .map(|line| prefix.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_right_aligned_to_the_widest_index() {
        let text = (0..12).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let numbered = add_line_numbers(&text);
        let lines: Vec<&str> = numbered.split('\n').collect();

        assert_eq!(lines[0], " 1: line 0");
        assert_eq!(lines[9], "10: line 9");
        assert_eq!(lines[11], "12: line 11");
    }

    #[test]
    fn single_line_gets_width_one() {
        assert_eq!(add_line_numbers("hello"), "1: hello");
    }

    #[test]
    fn round_trip_reconstructs_the_original() {
        let text = "# Title\n\nSome paragraph.\n  indented code\nlast";
        assert_eq!(strip_line_numbers(&add_line_numbers(text)), text);
    }

    #[test]
    fn strip_consumes_at_most_one_space() {
        // Two spaces after the colon: one belongs to the separator, the
        // second is document content.
        assert_eq!(strip_line_numbers("3:  indented"), " indented");
    }

    #[test]
    fn strip_leaves_unnumbered_lines_alone() {
        assert_eq!(strip_line_numbers("no numbers here"), "no numbers here");
        assert_eq!(strip_line_numbers("time: 12:30"), "time: 12:30");
    }

    #[test]
    fn strip_is_lossy_on_lines_that_look_numbered() {
        // "1: " at the start of real content is removed; that is the
        // documented trade-off of the numbered view.
        assert_eq!(strip_line_numbers("1: an actual list entry"), "an actual list entry");
    }
}
