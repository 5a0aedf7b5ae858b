//! Exponential backoff for rate-limited upstream calls.
//!
//! Only HTTP 429 is retried. Every wait and every attempt races the request's
//! cancellation token, so a disconnected caller stops the loop at once.

use promptrelay_config::RetryConfig;
use promptrelay_types::{RelayError, Result};
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Wait before the first retry; doubled for each one after it.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            initial_delay: Duration::from_millis(5000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            retries: config.retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up.
    ///
    /// # Errors
    ///
    /// Returns the last error from `op`, or [`RelayError::Cancelled`] once
    /// `cancel` fires.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RelayError::Cancelled),
                result = op() => result,
            };
            match result {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay = ?delay,
                        error = %e,
                        "upstream rate limited, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(RelayError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn rate_limited() -> RelayError {
        RelayError::Upstream {
            status: 429,
            body: "slow down".into(),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(5000));
        assert_eq!(policy.delay(1), Duration::from_millis(10000));
        assert_eq!(policy.delay(2), Duration::from_millis(20000));
        assert_eq!(policy.delay(40), policy.delay(32));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            retries: 2,
            initial_delay_ms: 100,
        });
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_429s_then_success() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let stamps = Mutex::new(Vec::new());

        let result = policy
            .run(&cancel, || {
                let calls = {
                    let mut stamps = stamps.lock().unwrap();
                    stamps.push(Instant::now());
                    stamps.len()
                };
                async move {
                    if calls <= 3 {
                        Err(rate_limited())
                    } else {
                        Ok(calls)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        let stamps = stamps.into_inner().unwrap();
        let waits: Vec<u128> = stamps
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(waits, vec![5000, 10000, 20000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retries() {
        let policy = RetryPolicy {
            retries: 2,
            initial_delay: Duration::from_millis(10),
        };
        let cancel = CancellationToken::new();
        let calls = Mutex::new(0);

        let result: Result<()> = policy
            .run(&cancel, || {
                *calls.lock().unwrap() += 1;
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(result, Err(RelayError::Upstream { status: 429, .. })));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_not_retried() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let calls = Mutex::new(0);

        let result: Result<()> = policy
            .run(&cancel, || {
                *calls.lock().unwrap() += 1;
                async {
                    Err(RelayError::Upstream {
                        status: 500,
                        body: String::new(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(RelayError::Upstream { status: 500, .. })));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_retries() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();

        let result: Result<()> = policy
            .run(&cancel, || {
                cancel.cancel();
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(result, Err(RelayError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let calls = Mutex::new(0);
        let started = Instant::now();

        let result: Result<()> = policy
            .run(&cancel, || {
                *calls.lock().unwrap() += 1;
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(result, Err(RelayError::Cancelled)));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(started.elapsed() < Duration::from_millis(5000));
    }
}
