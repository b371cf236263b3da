//! Retry with exponential backoff for collaborator calls.

use crate::provider::{CloudError, CloudResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no sleeping.
    #[must_use]
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn next_delay(&self, delay_ms: u64) -> u64 {
        let scaled = (delay_ms as f64 * self.backoff_multiplier.max(1.0)).round();
        let scaled = if scaled.is_finite() && scaled < u64::MAX as f64 {
            scaled as u64
        } else {
            u64::MAX
        };
        scaled.min(self.max_delay_ms)
    }
}

/// Retry `operation` while it fails with a transient error kind
/// (see [`CloudError::is_transient`]).
///
/// # Errors
///
/// Returns the last error once it is non-transient or attempts are exhausted.
pub fn retry_with_backoff<F, T>(config: &RetryConfig, operation: F) -> CloudResult<T>
where
    F: FnMut() -> CloudResult<T>,
{
    retry_with_backoff_if(config, operation, CloudError::is_transient)
}

/// Retry `operation` while `should_retry` accepts its error.
///
/// # Errors
///
/// Returns the last error once `should_retry` rejects it or attempts are exhausted.
pub fn retry_with_backoff_if<F, P, T>(config: &RetryConfig, mut operation: F, should_retry: P) -> CloudResult<T>
where
    F: FnMut() -> CloudResult<T>,
    P: Fn(&CloudError) -> bool,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !should_retry(&err) || attempt >= config.max_attempts {
                    return Err(err);
                }
                debug!(attempt, delay_ms, error = %err, "retrying after error");
                if delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
                delay_ms = config.next_delay(delay_ms);
            }
        }
    }
}
