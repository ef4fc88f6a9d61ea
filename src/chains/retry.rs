//! Retry handler for adapter calls that fail transiently

use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::domain::AdapterError;

/// Retries retryable adapter failures with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryHandler {
    max_attempts: u32,
    base_delay_ms: u64,
}

impl RetryHandler {
    pub fn new() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1000,
        }
    }

    pub fn with_config(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is exhausted
    pub async fn execute_with_retry_and_logging<F, Fut, T>(
        &self,
        operation: F,
        operation_name: &str,
        chain: &str,
    ) -> Result<T, AdapterError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(
                            "[{}] {} succeeded after {} retries",
                            chain,
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::warn!("[{}] {} failed: {}", chain, operation_name, e);
                    return Err(e);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            "[{}] {} failed after {} attempts: {}",
                            chain,
                            operation_name,
                            attempt,
                            e
                        );
                        return Err(e);
                    }

                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        "[{}] {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        chain,
                        operation_name,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_delay(&self, attempt: u32) -> u64 {
        self.base_delay_ms * 2_u64.pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new()
    }
}
