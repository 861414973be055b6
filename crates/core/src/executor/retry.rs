//! Retry policy with capped exponential backoff.

use std::time::Duration;

use super::config::{DispatcherConfig, RetryConfig};
use super::error::ExecutionError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Bound on the whole task, all attempts included.
    pub overall_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, overall_timeout: Duration) -> Self {
        Self {
            max_attempts: retry.max_attempts.max(1),
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            multiplier: retry.backoff_multiplier.max(1.0),
            overall_timeout,
        }
    }

    pub fn from_dispatcher_config(config: &DispatcherConfig) -> Self {
        Self::from_config(&config.retry, config.task_timeout())
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(initial * multiplier^(attempt-1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Whether a task whose attempt `attempt` failed with `error` gets
    /// another attempt.
    pub fn should_retry(&self, error: &ExecutionError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_dispatcher_config(&DispatcherConfig::default())
    }
}
