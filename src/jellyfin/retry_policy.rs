//! Retry policy for remote requests.
//!
//! Exponential backoff: `base_delay * multiplier^attempt`, capped.

use super::error::ApiError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            ..Self::default()
        }
    }

    /// Delay before retrying after the zero-based `attempt` failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    /// True if a request that failed with `error` on zero-based `attempt`
    /// gets another try.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        error.is_transient() && attempt + 1 < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}
