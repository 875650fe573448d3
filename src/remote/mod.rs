//! Resilient access to the remote document store.
//!
//! Every remote call flows through two layers: a rolling-window
//! [`RateLimiter`] that paces call starts against the store's
//! requests-per-second ceiling, and [`with_retry`], which retries
//! transient failures with exponential backoff while returning
//! non-transient failures immediately. [`ApiError`] is the closed
//! taxonomy that drives the transient/non-transient decision.
//!
//! The layers know nothing about document content; [`DocumentClient`]
//! composes them around the store's JSON API, and
//! [`properties::update_properties`] shows the intended shape for
//! multi-step workflows: each remote call is its own retry boundary,
//! pure computation happens between them.

pub mod client;
pub mod errors;
pub mod limiter;
pub mod properties;
pub mod retry;

pub use client::{normalize_document_id, DocumentClient, PropertySchema, RemoteDocument};
pub use errors::{redact, ApiError};
pub use limiter::RateLimiter;
pub use properties::{merge_properties, update_properties};
pub use retry::{with_rate_limit, with_retry, RetryPolicy};
