//! Rolling-window pacing for remote calls.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Advisory rate limiter: at most `max_calls` call starts within any
/// rolling `window`. Excess callers suspend until capacity frees instead
/// of being rejected, so every caller eventually runs.
///
/// One limiter is shared (via `Arc`) by every call in the process; the
/// timestamp queue lives behind a `tokio::sync::Mutex` so concurrent
/// tasks serialize their bookkeeping. State is per-run only: a restart
/// forgets the window, and compliance is best-effort across runs.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// The document store's documented ceiling.
    pub const DEFAULT_MAX_CALLS: usize = 3;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a call may start, then record its start time.
    pub async fn acquire(&self, label: &str) {
        loop {
            let wait = {
                let mut starts = self.starts.lock().await;
                let now = Instant::now();

                while let Some(front) = starts.front() {
                    if now.duration_since(*front) >= self.window {
                        starts.pop_front();
                    } else {
                        break;
                    }
                }

                if starts.len() < self.max_calls {
                    starts.push_back(now);
                    return;
                }

                // Capacity frees when the oldest start leaves the window.
                let Some(oldest) = starts.front().copied() else {
                    starts.push_back(now);
                    return;
                };
                oldest + self.window - now
            };

            tracing::trace!(
                label,
                wait_ms = wait.as_millis() as u64,
                "rate limit reached, waiting for capacity"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CALLS, Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_within_the_ceiling_does_not_wait() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let before = Instant::now();

        for _ in 0..3 {
            limiter.acquire("test.op").await;
        }

        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn the_call_over_the_ceiling_waits_for_the_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let before = Instant::now();

        for _ in 0..4 {
            limiter.acquire("test.op").await;
        }

        assert!(before.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn a_drained_window_restores_full_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        limiter.acquire("test.op").await;
        limiter.acquire("test.op").await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        limiter.acquire("test.op").await;
        limiter.acquire("test.op").await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_limiters_do_not_interfere() {
        let a = RateLimiter::new(1, Duration::from_secs(10));
        let b = RateLimiter::new(1, Duration::from_secs(10));

        let before = Instant::now();
        a.acquire("a.op").await;
        b.acquire("b.op").await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn seven_calls_through_a_three_per_second_limiter_span_two_windows() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let before = Instant::now();

        for _ in 0..7 {
            limiter.acquire("test.op").await;
        }

        assert!(before.elapsed() >= Duration::from_secs(2));
    }
}
