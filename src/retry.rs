use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::Config;
use crate::errors::{GenMediaError, Result};

/// Upper bound (exclusive) of the random jitter added to each delay.
pub const MAX_JITTER: Duration = Duration::from_millis(1000);

/// Retry bounds for [`retry_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries(),
            backoff: config.retry_backoff(),
            max_backoff: config.retry_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0 for the first retry), with a
    /// fresh random jitter in `[0, MAX_JITTER)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = rand::rng().random_range(0..MAX_JITTER.as_millis() as u64);
        self.delay_with_jitter(attempt, Duration::from_millis(jitter_ms))
    }

    /// `min(backoff * 2^attempt + jitter, max_backoff)`.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.backoff.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.max_backoff)
    }
}

/// Fail with [`GenMediaError::UnsupportedEnvironment`] outside a Tokio runtime,
/// where the SDK's timers cannot run.
pub(crate) fn ensure_tokio_runtime() -> Result<()> {
    tokio::runtime::Handle::try_current().map(|_| ()).map_err(|_| {
        GenMediaError::UnsupportedEnvironment(
            "the GenMedia SDK must be driven from within a Tokio runtime".to_string(),
        )
    })
}

/// Run `operation`, retrying retryable failures up to `policy.max_retries`
/// times. Non-retryable failures return on first occurrence; on exhaustion
/// the last failure is returned.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    ensure_tokio_runtime()?;

    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
