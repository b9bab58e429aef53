use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::{GenMediaError, Result};
use crate::retry::ensure_tokio_runtime;

/// An entity whose state is refreshed from a status endpoint.
pub trait Pollable {
    /// Path (relative to the base URL) of the status endpoint.
    fn status_path(&self) -> String;

    /// Overwrite local state with a status payload.
    fn apply(&mut self, payload: serde_json::Value) -> Result<()>;

    /// Whether polling should stop.
    fn is_settled(&self) -> bool;
}

/// Cadence and deadline for [`poll_until_settled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_poll_time: Duration,
}

impl From<&Config> for PollOptions {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            max_poll_time: config.max_poll_time(),
        }
    }
}

/// Query `fetch(entity.status_path())` until `entity` settles.
///
/// Responses with status >= 500 are treated as transient and polling
/// continues; any other failure aborts. Exceeding `max_poll_time` returns
/// [`GenMediaError::Timeout`]. The deadline is checked once per iteration.
pub async fn poll_until_settled<E, F, Fut>(
    entity: &mut E,
    options: PollOptions,
    mut fetch: F,
) -> Result<()>
where
    E: Pollable,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<serde_json::Value>>,
{
    ensure_tokio_runtime()?;

    let started = Instant::now();
    let mut queries = 0u32;

    loop {
        if started.elapsed() > options.max_poll_time {
            return Err(GenMediaError::Timeout {
                max_poll_time: options.max_poll_time,
            });
        }

        let path = entity.status_path();
        queries += 1;
        debug!(%path, queries, "polling status");

        match fetch(path).await {
            Ok(payload) => {
                entity.apply(payload)?;
                if entity.is_settled() {
                    info!(queries, elapsed_ms = started.elapsed().as_millis() as u64, "settled");
                    return Ok(());
                }
            }
            Err(err) if err.is_server_error() => {
                warn!(error = %err, "transient status failure, continuing to poll");
            }
            Err(err) => return Err(err),
        }

        tokio::time::sleep(options.interval).await;
    }
}
