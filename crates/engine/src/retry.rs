//! Bounded exponential backoff for venue calls.
//!
//! Only failures the adapter classifies as retryable are retried; ledger
//! application is idempotent, so a retried read that partially succeeded
//! upstream cannot double-count.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use veris_core::{ExchangeError, Result};

/// How persistently to retry a failing venue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// No waiting between attempts. Test sessions use this.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt after `attempt` failed. Doubles from
    /// `base_delay` up to `max_delay`; a venue-provided retry-after hint
    /// overrides the computed value.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &ExchangeError) -> Duration {
        match error.retry_after() {
            Some(hint) => hint,
            None => {
                let doubled = self
                    .base_delay
                    .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
                doubled.min(self.max_delay)
            }
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or the attempt budget
/// runs out. The last error is surfaced on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "venue call recovered");
                }
                return Ok(value);
            }
            Err(error) if error.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, &error);
                warn!(
                    label,
                    attempt,
                    %error,
                    delay_ms = delay.as_millis() as u64,
                    "venue call failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
