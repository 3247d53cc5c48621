use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::{AppError, Result};

/// Exponential backoff for database operations that may fail transiently
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }
}

fn is_transient(err: &AppError) -> bool {
    matches!(err, AppError::DatabaseError(_))
}

/// Retry `operation` while it fails with a database error.
pub async fn with_database_retry<F, Fut, T>(policy: RetryPolicy, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Database operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Database operation failed: {}, retrying",
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempt, "Database operation failed: {}", e);
                return Err(e);
            }
        }
    }
}
