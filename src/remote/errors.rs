use std::time::Duration;

use regex::Regex;
use thiserror::Error;

/// Errors from the remote document store, classified for retry
/// eligibility.
///
/// The taxonomy is closed on purpose: the retry layer decides transient
/// versus non-transient by matching variants, so adding a variant forces
/// that decision to be revisited at compile time rather than silently
/// falling through an open hierarchy.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("rate limited by the document store{}", retry_after_hint(retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication rejected (HTTP {status}); check the API token")]
    Auth { status: u16 },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },

    #[error("{label} failed after {attempts} attempts: {source}; back off before trying again")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Whether retrying can possibly succeed. Throttling, server faults,
    /// and transport failures are worth another attempt; bad input,
    /// missing resources, and rejected credentials are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::Server { .. } | ApiError::Transport { .. } => {
                true
            }
            ApiError::Auth { .. }
            | ApiError::NotFound { .. }
            | ApiError::InvalidRequest { .. }
            | ApiError::RetriesExhausted { .. } => false,
        }
    }

    /// Server-provided backoff hint, when the store sent one with a 429.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map a non-success HTTP status to an error. `retry_after` comes from
    /// the `Retry-After` header; the response body is scanned as a
    /// fallback hint and redacted before it can surface in a message.
    pub fn from_status(
        status: u16,
        retry_after: Option<Duration>,
        resource: &str,
        body: &str,
    ) -> Self {
        match status {
            429 => ApiError::RateLimited {
                retry_after: retry_after.or_else(|| parse_retry_after(body)),
            },
            401 | 403 => ApiError::Auth { status },
            404 => ApiError::NotFound {
                resource: resource.to_string(),
            },
            400 | 422 => ApiError::InvalidRequest {
                message: redact(truncate(body, 200)),
            },
            // 5xx and anything unexpected: escalate as transient so the
            // retry layer applies generic backoff.
            _ => ApiError::Server {
                status,
                message: redact(truncate(body, 200)),
            },
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        ApiError::Transport {
            message: redact(&err.to_string()),
            timeout: err.is_timeout(),
        }
    }
}

fn retry_after_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(" (retry after {}s)", delay.as_secs()),
        None => String::new(),
    }
}

/// Extract a backoff hint from a response body, for stores that put
/// "retry after N seconds" in the error text instead of the header.
pub(crate) fn parse_retry_after(body: &str) -> Option<Duration> {
    let lower = body.to_lowercase();
    let pos = lower.find("retry")?;

    for word in lower[pos..].split_whitespace().skip(1).take(5) {
        if let Ok(secs) = word
            .trim_matches(|c: char| !c.is_numeric())
            .parse::<u64>()
        {
            if secs > 0 && secs < 300 {
                return Some(Duration::from_secs(secs));
            }
        }
    }
    None
}

/// Replace secret-shaped substrings (bearer tokens, api keys) so that no
/// error message can leak a credential, whatever the server echoed back.
pub fn redact(text: &str) -> String {
    let secret = Regex::new(r"(?i)\b(bearer\s+|token[=:]\s*|api[_-]?key[=:]\s*|secret[_-])[A-Za-z0-9._\-]{8,}")
        .expect("secret pattern is valid");
    secret.replace_all(text, "${1}[redacted]").into_owned()
}

/// Truncate for display without splitting a UTF-8 character.
fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
