//! Unified diff parsing and fuzzy application.
//!
//! The applier tolerates up to [`MAX_FUZZ`] lines of context drift per
//! hunk edge, because the document may have shifted since the diff was
//! generated. Candidate positions are searched outward from each hunk's
//! expected location, so the nearest plausible site wins; a hunk whose
//! context cannot be located even at maximum fuzz is a conflict, not a
//! parse error.

use regex::Regex;

use super::errors::PatchError;

/// Maximum number of leading/trailing context lines ignored per hunk when
/// the exact context cannot be located.
pub const MAX_FUZZ: usize = 2;

const HUNK_HEADER: &str = r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@";

/// Cheap structural pre-check: does `patch` contain at least one
/// `@@ -N[,N] +N[,N] @@` hunk header? Used to fail fast before a full
/// parse-and-apply attempt.
pub fn is_valid_unified_diff(patch: &str) -> bool {
    let header = Regex::new(&format!("(?m){HUNK_HEADER}")).expect("hunk-header pattern is valid");
    header.is_match(patch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Context,
    Remove,
    Add,
}

#[derive(Debug, Clone)]
struct HunkLine {
    tag: Tag,
    text: String,
}

#[derive(Debug, Clone)]
struct Hunk {
    /// 1-indexed line in the original where the hunk expects to start.
    old_start: usize,
    lines: Vec<HunkLine>,
}

/// Old-side pattern and new-side replacement of a hunk after trimming up
/// to `fuzz` context lines from each edge.
struct FuzzView {
    old: Vec<String>,
    new: Vec<String>,
    leading_trimmed: usize,
}

impl Hunk {
    fn fuzzed(&self, fuzz: usize) -> FuzzView {
        let leading = self
            .lines
            .iter()
            .take_while(|l| l.tag == Tag::Context)
            .count()
            .min(fuzz);
        let trailing = self.lines[leading..]
            .iter()
            .rev()
            .take_while(|l| l.tag == Tag::Context)
            .count()
            .min(fuzz);

        let body = &self.lines[leading..self.lines.len() - trailing];
        let old = body
            .iter()
            .filter(|l| l.tag != Tag::Add)
            .map(|l| l.text.clone())
            .collect();
        let new = body
            .iter()
            .filter(|l| l.tag != Tag::Remove)
            .map(|l| l.text.clone())
            .collect();

        FuzzView {
            old,
            new,
            leading_trimmed: leading,
        }
    }
}

/// Apply a unified diff to `original`, returning the patched text.
pub fn apply(original: &str, patch: &str) -> Result<String, PatchError> {
    if !is_valid_unified_diff(patch) {
        return Err(PatchError::MalformedDiff {
            message: "no `@@ -N[,N] +N[,N] @@` hunk header found".into(),
        });
    }

    let hunks = parse(patch)?;
    let mut lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    let mut offset: isize = 0;

    for (index, hunk) in hunks.iter().enumerate() {
        offset += apply_hunk(&mut lines, hunk, offset).ok_or(PatchError::HunkMismatch {
            hunk: index + 1,
            line: hunk.old_start,
        })?;
    }

    Ok(lines.join("\n"))
}

/// Parse hunks out of a unified diff. File headers (`---`/`+++`) and any
/// prose before the first hunk are skipped; each hunk body is sized by the
/// counts in its header, so trailing text after a complete hunk is ignored
/// rather than misread as context.
fn parse(patch: &str) -> Result<Vec<Hunk>, PatchError> {
    let header = Regex::new(HUNK_HEADER).expect("hunk-header pattern is valid");

    let mut hunks: Vec<Hunk> = Vec::new();
    let mut remaining_old = 0usize;
    let mut remaining_new = 0usize;

    for raw in patch.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if let Some(caps) = header.captures(line) {
            if remaining_old > 0 || remaining_new > 0 {
                return Err(PatchError::MalformedDiff {
                    message: format!("hunk {} is truncated", hunks.len()),
                });
            }
            let old_start = parse_count(caps.get(1).map_or("1", |m| m.as_str()))?;
            remaining_old = parse_count(caps.get(2).map_or("1", |m| m.as_str()))?;
            remaining_new = parse_count(caps.get(4).map_or("1", |m| m.as_str()))?;
            hunks.push(Hunk {
                old_start,
                lines: Vec::new(),
            });
            continue;
        }

        if remaining_old == 0 && remaining_new == 0 {
            continue;
        }
        let hunk = hunks.last_mut().expect("body lines only occur after a header");

        let (tag, text) = match line.chars().next() {
            Some(' ') => (Tag::Context, &line[1..]),
            Some('-') => (Tag::Remove, &line[1..]),
            Some('+') => (Tag::Add, &line[1..]),
            // "\ No newline at end of file" markers carry no content.
            Some('\\') => continue,
            // Some producers emit a completely empty line for empty context.
            None => (Tag::Context, line),
            Some(other) => {
                return Err(PatchError::MalformedDiff {
                    message: format!("unexpected `{other}` at the start of a hunk body line"),
                });
            }
        };

        match tag {
            Tag::Context => {
                remaining_old = remaining_old.saturating_sub(1);
                remaining_new = remaining_new.saturating_sub(1);
            }
            Tag::Remove => remaining_old = remaining_old.saturating_sub(1),
            Tag::Add => remaining_new = remaining_new.saturating_sub(1),
        }
        hunk.lines.push(HunkLine {
            tag,
            text: text.to_string(),
        });
    }

    if remaining_old > 0 || remaining_new > 0 {
        return Err(PatchError::MalformedDiff {
            message: format!("hunk {} is truncated", hunks.len()),
        });
    }

    Ok(hunks)
}

fn parse_count(digits: &str) -> Result<usize, PatchError> {
    digits.parse().map_err(|_| PatchError::MalformedDiff {
        message: format!("hunk header count `{digits}` is out of range"),
    })
}

/// Try the hunk at increasing fuzz levels; on a match, splice in the new
/// lines and return the line-count delta.
fn apply_hunk(lines: &mut Vec<String>, hunk: &Hunk, offset: isize) -> Option<isize> {
    for fuzz in 0..=MAX_FUZZ {
        let view = hunk.fuzzed(fuzz);
        let expected = hunk.old_start as isize - 1 + offset + view.leading_trimmed as isize;

        if let Some(pos) = locate(lines, &view.old, expected) {
            let delta = view.new.len() as isize - view.old.len() as isize;
            lines.splice(pos..pos + view.old.len(), view.new);
            return Some(delta);
        }
    }
    None
}

/// Find where `pattern` occurs in `lines`, searching outward from
/// `expected`. The nearest match wins; on a tie the earlier position is
/// preferred. An empty pattern (a pure insertion) matches at the expected
/// position directly.
fn locate(lines: &[String], pattern: &[String], expected: isize) -> Option<usize> {
    if pattern.is_empty() {
        return Some(expected.clamp(0, lines.len() as isize) as usize);
    }
    if pattern.len() > lines.len() {
        return None;
    }

    let max_pos = lines.len() - pattern.len();
    let expected = expected.clamp(0, max_pos as isize) as usize;

    let mut distance = 0usize;
    loop {
        let mut in_range = false;
        if let Some(below) = expected.checked_sub(distance) {
            in_range = true;
            if matches_at(lines, pattern, below) {
                return Some(below);
            }
        }
        let above = expected + distance;
        if above <= max_pos {
            in_range = true;
            if distance > 0 && matches_at(lines, pattern, above) {
                return Some(above);
            }
        }
        if !in_range {
            return None;
        }
        distance += 1;
    }
}

fn matches_at(lines: &[String], pattern: &[String], pos: usize) -> bool {
    lines[pos..pos + pattern.len()]
        .iter()
        .zip(pattern)
        .all(|(line, expected)| line == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "alpha\nbeta\ngamma\ndelta\nepsilon";

    #[test]
    fn recognizes_hunk_headers() {
        assert!(is_valid_unified_diff("@@ -1,3 +1,4 @@\n context"));
        assert!(is_valid_unified_diff("--- \n+++ \n@@ -10 +10,2 @@\n x"));
    }

    #[test]
    fn rejects_prose_and_bare_markers() {
        assert!(!is_valid_unified_diff("please change line 3 to say hello"));
        assert!(!is_valid_unified_diff("@@ not a header @@"));
        assert!(!is_valid_unified_diff(""));
    }

    #[test]
    fn applies_a_simple_replacement() {
        let patch = "--- \n+++ \n@@ -1,3 +1,3 @@\n alpha\n-beta\n+BETA\n gamma\n";
        assert_eq!(apply(DOC, patch).unwrap(), "alpha\nBETA\ngamma\ndelta\nepsilon");
    }

    #[test]
    fn applies_an_insertion_and_a_deletion() {
        let patch = concat!(
            "@@ -1,2 +1,3 @@\n",
            " alpha\n",
            "+inserted\n",
            " beta\n",
            "@@ -4,2 +5,1 @@\n",
            "-delta\n",
            " epsilon\n",
        );
        assert_eq!(
            apply(DOC, patch).unwrap(),
            "alpha\ninserted\nbeta\ngamma\nepsilon"
        );
    }

    #[test]
    fn locates_a_hunk_whose_position_drifted() {
        // Diff generated against an older revision: the hunk claims line 1
        // but the matching context now sits at line 3.
        let shifted = format!("zero\none\n{DOC}");
        let patch = "@@ -1,3 +1,3 @@\n alpha\n-beta\n+BETA\n gamma\n";
        assert_eq!(
            apply(&shifted, patch).unwrap(),
            "zero\none\nalpha\nBETA\ngamma\ndelta\nepsilon"
        );
    }

    #[test]
    fn fuzz_ignores_drifted_edge_context() {
        // The leading context line changed in the document, but the edit
        // target and trailing context still match.
        let patch = "@@ -1,3 +1,3 @@\n ALPHA CHANGED\n-beta\n+BETA\n gamma\n";
        assert_eq!(apply(DOC, patch).unwrap(), "alpha\nBETA\ngamma\ndelta\nepsilon");
    }

    #[test]
    fn mismatch_beyond_fuzz_is_a_conflict() {
        // The removed line itself is wrong; no amount of context fuzz may
        // rewrite a line the diff never matched.
        let patch = "@@ -1,3 +1,3 @@\n alpha\n-bravo\n+BETA\n gamma\n";
        let err = apply(DOC, patch).unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(err, PatchError::HunkMismatch { hunk: 1, .. }));
    }

    #[test]
    fn pure_insertion_into_empty_document() {
        let patch = "@@ -0,0 +1,2 @@\n+first\n+second\n";
        assert_eq!(apply("", patch).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn truncated_hunk_is_malformed_not_a_conflict() {
        let patch = "@@ -1,3 +1,3 @@\n alpha\n-beta\n";
        let err = apply(DOC, patch).unwrap_err();
        assert!(matches!(err, PatchError::MalformedDiff { .. }));
        assert!(!err.is_conflict());
    }

    #[test]
    fn tolerates_crlf_patch_text() {
        let patch = "@@ -1,3 +1,3 @@\r\n alpha\r\n-beta\r\n+BETA\r\n gamma\r\n";
        assert_eq!(apply(DOC, patch).unwrap(), "alpha\nBETA\ngamma\ndelta\nepsilon");
    }

    #[test]
    fn second_hunk_position_tracks_earlier_growth() {
        let doc: String = (1..=20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let patch = concat!(
            "@@ -1,2 +1,4 @@\n",
            " line 1\n",
            "+added a\n",
            "+added b\n",
            " line 2\n",
            "@@ -18,2 +20,2 @@\n",
            " line 18\n",
            "-line 19\n",
            "+LINE 19\n",
        );
        let patched = apply(&doc, patch).unwrap();
        let lines: Vec<&str> = patched.split('\n').collect();
        assert_eq!(lines[1], "added a");
        assert_eq!(lines[20], "LINE 19");
        assert_eq!(lines.len(), 22);
    }
}
