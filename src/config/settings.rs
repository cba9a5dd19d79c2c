//! Runtime settings loaded from environment variables.
//!
//! Only idempotent reads are ever retried; the retry budget here never
//! applies to ledger or state-machine writes.

use crate::errors::{Error, Result};
use std::time::Duration;

/// Settings for the engine that are not part of config.toml.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Attempts for a transient-failing read, including the first one
    pub read_retry_attempts: u32,
    /// Pause between read attempts
    pub read_retry_backoff: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            read_retry_attempts: 3,
            read_retry_backoff: Duration::from_millis(50),
        }
    }
}

impl EngineSettings {
    /// Reads `READ_RETRY_ATTEMPTS` and `READ_RETRY_BACKOFF_MS`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let read_retry_attempts = match lookup("READ_RETRY_ATTEMPTS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| Error::Config {
                message: format!("READ_RETRY_ATTEMPTS must be a positive integer: {e}"),
            })?,
            None => defaults.read_retry_attempts,
        };
        if read_retry_attempts == 0 {
            return Err(Error::Config {
                message: "READ_RETRY_ATTEMPTS must be at least 1".to_string(),
            });
        }

        let read_retry_backoff = match lookup("READ_RETRY_BACKOFF_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse::<u64>().map_err(|e| {
                Error::Config {
                    message: format!("READ_RETRY_BACKOFF_MS must be an integer: {e}"),
                }
            })?),
            None => defaults.read_retry_backoff,
        };

        Ok(Self {
            read_retry_attempts,
            read_retry_backoff,
        })
    }
}
