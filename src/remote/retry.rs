//! Retry with exponential backoff around rate-limit aware remote calls.

use std::future::Future;
use std::time::Duration;

use super::errors::ApiError;
use super::limiter::RateLimiter;

/// Backoff configuration for [`with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; later delays escalate
    /// geometrically.
    pub base_delay: Duration,
    /// Multiplier applied per additional failed attempt.
    pub multiplier: u32,
    /// Upper bound for any single computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff after `failed_attempts` failures: base, base*m, base*m^2...
    fn backoff(&self, failed_attempts: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(failed_attempts.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `call` once, paced by `limiter`. No retries: the operation's error
/// is returned as-is.
pub async fn with_rate_limit<T, F, Fut>(
    limiter: &RateLimiter,
    label: &str,
    call: F,
) -> Result<T, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    limiter.acquire(label).await;
    call().await
}

/// Run `call` under `limiter` pacing, retrying transient failures with
/// exponential backoff. A server `retry-after` hint overrides the
/// computed delay. Non-transient failures return immediately after one
/// attempt; exhausting the attempt cap returns
/// [`ApiError::RetriesExhausted`] naming `label` and the attempt count,
/// so "never worked" and "gave up after N tries" stay distinguishable.
///
/// Each attempt acquires fresh rate-limit capacity: a retry is a real
/// call against the remote ceiling. Intermediate attempts surface only
/// as `tracing` diagnostics.
///
/// Dropping the returned future abandons the backoff wait, but an
/// attempt already in flight is not aborted mid-call.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    label: &str,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        limiter.acquire(label).await;

        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_transient() {
            tracing::debug!(label, attempt, %error, "non-retryable failure");
            return Err(error);
        }
        if attempt >= max_attempts {
            return Err(ApiError::RetriesExhausted {
                label: label.to_string(),
                attempts: attempt,
                source: Box::new(error),
            });
        }

        let delay = error.retry_after().unwrap_or_else(|| policy.backoff(attempt));
        tracing::debug!(
            label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            %error,
            "transient failure, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn roomy_limiter() -> RateLimiter {
        RateLimiter::new(1000, Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_to_the_cap_then_fail_distinctly() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let limiter = roomy_limiter();

        let result: Result<u32, ApiError> = with_retry(&policy, &limiter, "documents.get", {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(ApiError::Server {
                    status: 500,
                    message: "boom".into(),
                }))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            ApiError::RetriesExhausted { label, attempts, .. } => {
                assert_eq!(label, "documents.get");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failures_are_attempted_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let limiter = roomy_limiter();

        let result: Result<u32, ApiError> = with_retry(&policy, &limiter, "documents.get", {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(ApiError::Auth { status: 401 }))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), ApiError::Auth { status: 401 }));
    }

    #[tokio::test(start_paused = true)]
    async fn a_transient_blip_recovers_on_the_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let limiter = roomy_limiter();

        let result = with_retry(&policy, &limiter, "documents.put", {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(if n == 0 {
                    Err(ApiError::RateLimited { retry_after: None })
                } else {
                    Ok(42u32)
                })
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn a_retry_after_hint_overrides_the_computed_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let limiter = roomy_limiter();
        let before = Instant::now();

        let result = with_retry(&policy, &limiter, "documents.put", {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(if n == 0 {
                    Err(ApiError::RateLimited {
                        retry_after: Some(Duration::from_secs(9)),
                    })
                } else {
                    Ok(())
                })
            }
        })
        .await;

        assert!(result.is_ok());
        // Waited the hinted 9s, not the policy's 2s base delay.
        assert!(before.elapsed() >= Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_escalates_geometrically() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2,
            max_delay: Duration::from_secs(60),
        };
        let limiter = roomy_limiter();
        let before = Instant::now();

        let result: Result<(), ApiError> = with_retry(&policy, &limiter, "documents.put", || {
            std::future::ready(Err(ApiError::Server {
                status: 502,
                message: "bad gateway".into(),
            }))
        })
        .await;

        assert!(result.is_err());
        // 2s after the first failure, 4s after the second; the third
        // failure exhausts the cap without sleeping.
        assert!(before.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn with_rate_limit_passes_errors_through_unwrapped() {
        let limiter = roomy_limiter();

        let result: Result<(), ApiError> = with_rate_limit(&limiter, "schema.get", || {
            std::future::ready(Err(ApiError::NotFound {
                resource: "documents/abc".into(),
            }))
        })
        .await;

        assert!(matches!(result.unwrap_err(), ApiError::NotFound { .. }));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
            multiplier: 10,
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(20));
        assert_eq!(policy.backoff(3), Duration::from_secs(60));
    }
}
