use thiserror::Error;

/// Errors raised by the patch engine.
///
/// Validation variants mean the caller supplied an out-of-range or
/// malformed operation and must fix the request. Conflict variants mean
/// the document no longer matches what the operation assumes; the caller
/// can recover by re-reading the current content and regenerating the
/// operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("start must be >= 1 (line ranges are 1-indexed, got {start})")]
    StartBeforeFirstLine { start: usize },

    #[error(
        "start {start} is past the end of the document ({total_lines} lines); \
         the largest valid start is {} (insert after the last line)",
        total_lines + 1
    )]
    StartPastEnd { start: usize, total_lines: usize },

    #[error("not a unified diff: {message}")]
    MalformedDiff { message: String },

    #[error(
        "hunk {hunk} does not match the document near line {line}, even with fuzzy \
         context matching; re-read the document with numbered lines and regenerate \
         the diff against the current content"
    )]
    HunkMismatch { hunk: usize, line: usize },
}

impl PatchError {
    /// True for errors caused by the document drifting away from what the
    /// operation assumed, as opposed to a malformed request. Conflicts are
    /// worth a re-read-and-regenerate cycle; validation errors are not.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PatchError::HunkMismatch { .. })
    }
}
