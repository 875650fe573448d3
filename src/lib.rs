//! mdpatch: targeted Markdown patching for remote documents
//!
//! Apply line-range replacements, unified diffs, appends, and prepends to
//! a document's Markdown without rewriting the whole document, and
//! survive the storing API's rate limits and transient failures.
//!
//! # Architecture
//!
//! Two components compose around the remote read/write boundary and never
//! call each other:
//!
//! - [`patch`] — the pure engine. [`apply_operation`] takes original text
//!   plus one [`PatchOperation`] and returns a [`PatchOutcome`] (patched
//!   text, unified diff, changed-line count) or a structured error. No
//!   I/O, no state between calls.
//! - [`remote`] — the resilient call layer. A rolling-window
//!   [`RateLimiter`] paces call starts, [`remote::with_retry`] adds
//!   backoff for transient failures, and [`DocumentClient`] wraps the
//!   store's JSON API in labeled, independently retryable calls.
//!
//! A typical workflow reads the current Markdown, runs the engine, and
//! writes the result back; the read and the write are separate retry
//! boundaries.
//!
//! # Safety
//!
//! - The engine never partially applies: a full [`PatchOutcome`] or an
//!   error, nothing in between
//! - An `end` past the last line clamps; an out-of-range `start` always
//!   fails (intentionally asymmetric, see [`apply_operation`])
//! - Conflicts (drifted diff context) are distinct from validation
//!   errors and carry re-read-and-regenerate guidance
//! - Non-transient API errors are never retried; retry exhaustion is
//!   reported distinctly from a single failure
//! - Server-supplied text is redacted of secret-shaped substrings before
//!   it can surface in an error
//!
//! # Example
//!
//! ```no_run
//! use mdpatch::{apply_operation, PatchOperation, RangeEnd};
//!
//! let original = "# Title\n\nold paragraph\n";
//! let operation = PatchOperation::ReplaceLines {
//!     start: 3,
//!     end: RangeEnd::Line(3),
//!     content: "new paragraph".to_string(),
//! };
//!
//! match apply_operation(original, &operation) {
//!     Ok(outcome) => println!("{} lines changed\n{}", outcome.lines_changed, outcome.diff),
//!     Err(e) => eprintln!("patch failed: {e}"),
//! }
//! ```

pub mod patch;
pub mod remote;

// Re-exports
pub use patch::{
    add_line_numbers, apply_operation, is_valid_unified_diff, strip_line_numbers, PatchError,
    PatchOperation, PatchOutcome, RangeEnd,
};
pub use remote::{
    merge_properties, normalize_document_id, update_properties, ApiError, DocumentClient,
    PropertySchema, RateLimiter, RemoteDocument, RetryPolicy,
};
