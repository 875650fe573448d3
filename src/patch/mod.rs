//! Pure patch engine for a document's Markdown text.
//!
//! Four edit semantics funnel through [`apply_operation`]: line-range
//! replace, unified-diff apply, append, and prepend. The engine performs
//! no I/O and holds no state between calls; every invocation either
//! produces a complete [`PatchOutcome`] or fails without mutating
//! anything. Remote reads and writes are composed around it by the
//! caller.

pub mod errors;
pub mod numbering;
pub mod unified;

use similar::TextDiff;

pub use errors::PatchError;
pub use numbering::{add_line_numbers, strip_line_numbers};
pub use unified::is_valid_unified_diff;

/// Upper bound of a line range.
///
/// "To the end of the document" is its own variant rather than a sentinel
/// number, so a caller can always request "replace to the end" without
/// knowing the document's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    /// Inclusive 1-indexed last line to replace. Values past the last
    /// line are clamped, not rejected.
    Line(usize),
    /// Replace through the last line, wherever that is.
    End,
}

/// A single edit request against a document's text. Exactly one variant
/// per request; numeric validation happens inside the engine before any
/// text is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOperation {
    /// Replace the inclusive 1-indexed range `[start, end]` with
    /// `content`'s lines. Empty content deletes the range; this is the
    /// sole deletion mechanism. `start = total_lines + 1` inserts after
    /// the last line.
    ReplaceLines {
        start: usize,
        end: RangeEnd,
        content: String,
    },
    /// Apply a unified diff, tolerating up to two lines of context drift
    /// per hunk edge.
    ApplyDiff { patch: String },
    /// Add content after the existing text, starting on its own line.
    Append { content: String },
    /// Add content before the existing text, separated by exactly one
    /// line break.
    Prepend { content: String },
}

/// Result of a successful patch application. Built once per operation and
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a PatchOutcome does nothing until the patched text is written back"]
pub struct PatchOutcome {
    /// The full new document text.
    pub patched: String,
    /// Unified diff from the original to `patched`: 3 lines of context,
    /// empty file labels.
    pub diff: String,
    /// Added plus removed lines in `diff`, excluding the two file-header
    /// lines. A display magnitude; nothing branches on it.
    pub lines_changed: usize,
}

/// Apply one edit operation to `original`.
pub fn apply_operation(
    original: &str,
    operation: &PatchOperation,
) -> Result<PatchOutcome, PatchError> {
    let patched = match operation {
        PatchOperation::ReplaceLines {
            start,
            end,
            content,
        } => replace_lines(original, *start, *end, content)?,
        PatchOperation::ApplyDiff { patch } => unified::apply(original, patch)?,
        PatchOperation::Append { content } => append(original, content),
        PatchOperation::Prepend { content } => prepend(original, content),
    };

    Ok(build_outcome(original, patched))
}

fn replace_lines(
    original: &str,
    start: usize,
    end: RangeEnd,
    content: &str,
) -> Result<String, PatchError> {
    let lines: Vec<&str> = original.split('\n').collect();
    let total_lines = lines.len();

    if start < 1 {
        return Err(PatchError::StartBeforeFirstLine { start });
    }
    if start > total_lines + 1 {
        return Err(PatchError::StartPastEnd { start, total_lines });
    }

    // Asymmetric on purpose: an `end` past the last line is clamped so
    // callers can over-shoot without knowing the document length, while an
    // out-of-range `start` is always rejected. An `end` before `start`
    // degrades to pure insertion ahead of `start`.
    let effective_end = match end {
        RangeEnd::Line(n) => n.min(total_lines),
        RangeEnd::End => total_lines,
    }
    .max(start - 1);

    let mut result: Vec<&str> = Vec::with_capacity(total_lines + 1);
    result.extend(&lines[..start - 1]);
    if !content.is_empty() {
        result.extend(content.split('\n'));
    }
    result.extend(&lines[effective_end..]);

    Ok(result.join("\n"))
}

fn append(original: &str, content: &str) -> String {
    if original.is_empty() || original.ends_with('\n') {
        format!("{original}{content}")
    } else {
        format!("{original}\n{content}")
    }
}

fn prepend(original: &str, content: &str) -> String {
    format!("{content}\n{original}")
}

/// Shared diff builder: every variant reports its change the same way.
fn build_outcome(original: &str, patched: String) -> PatchOutcome {
    let diff = TextDiff::from_lines(original, patched.as_str())
        .unified_diff()
        .context_radius(3)
        .header("", "")
        .to_string();
    let lines_changed = count_changed_lines(&diff);

    PatchOutcome {
        patched,
        diff,
        lines_changed,
    }
}

fn count_changed_lines(diff: &str) -> usize {
    diff.lines()
        .filter(|line| {
            (line.starts_with('+') && !line.starts_with("+++"))
                || (line.starts_with('-') && !line.starts_with("---"))
        })
        .count()
}
