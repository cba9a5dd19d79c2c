//! Bounded retry for idempotent reads.
//!
//! Writes are never passed through here: a repeated conditional write would
//! simply hit its `Conflict` branch, so only reads benefit from a retry.

use crate::{config::settings::EngineSettings, errors::Result};
use std::future::Future;
use tracing::warn;

/// Runs `read` until it succeeds, fails with a non-transient error, or the
/// attempt budget in `settings` is spent. The pause grows linearly with the
/// attempt number.
pub async fn retry_read<T, F, Fut>(settings: &EngineSettings, operation: &str, mut read: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = settings.read_retry_attempts.max(1);
    let mut attempt = 1;
    loop {
        match read().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(operation, attempt, attempts, error = %e, "Transient read failure, retrying");
                tokio::time::sleep(settings.read_retry_backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
