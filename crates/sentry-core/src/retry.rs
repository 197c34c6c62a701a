//! Exponential-backoff retry helper for transient dependency failures.
//!
//! Used sparingly: the Model Router's own fallback-candidate logic is the
//! primary recovery mechanism for provider failures (per the error-handling
//! design, a provider failure is "try next candidate", not a retry loop).
//! This helper exists for the narrower case of a single call worth retrying
//! in place, such as a health check racing a transient DNS blip.

use std::time::Duration;

/// Backoff configuration for [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

/// The result of a retried operation: how many attempts it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Number of attempts actually made (1 means it succeeded first try).
    pub attempts: u32,
}

/// Retry an async operation up to `config.max_attempts` times with
/// exponential backoff, returning the first success alongside how many
/// attempts it took, or the final error if every attempt failed.
pub async fn retry<T, E, F, Fut>(config: RetryConfig, mut op: F) -> Result<(T, RetryOutcome), E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut delay = config.base_delay;
    let mut last_err = None;

    for attempt in 1..=config.max_attempts {
        match op().await {
            Ok(value) => return Ok((value, RetryOutcome { attempts: attempt })),
            Err(err) => {
                last_err = Some(err);
                if attempt < config.max_attempts {
                    tokio::time::sleep(delay).await;
                    let next = delay.mul_f64(config.multiplier);
                    delay = next.min(config.max_delay);
                }
            },
        }
    }

    Err(last_err.expect("loop always runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        };

        let (value, outcome) = retry(config, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err("not yet") } else { Ok(42) }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let config = RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        };

        let result: Result<((), RetryOutcome), &str> =
            retry(config, || async { Err("always fails") }).await;

        assert_eq!(result.unwrap_err(), "always fails");
    }
}
