use crate::config::Config;
use crate::errors::{AppError, AppResult};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            attempts: cfg.store_retry_attempts.max(1),
            backoff: cfg.retry_backoff(),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Run `op`, retrying transient failures. Non-transient errors return
/// immediately; exhausted retries surface as `TransientStoreFailure`.
pub fn with_retry<T, F>(policy: &RetryPolicy, operation: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> AppResult<T>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(operation, attempt, ?delay, error = %err, "store busy, retrying");
                thread::sleep(delay);
            }
            Err(err) if err.is_transient() => {
                return Err(AppError::TransientStoreFailure {
                    attempts: attempt,
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
}
