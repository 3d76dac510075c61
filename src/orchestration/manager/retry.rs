//! Retry decisions for managed workflow attempts.

use std::time::Duration;

use crate::config::ManagerConfig;
use crate::error::DataformError;

/// Which failed attempts are re-queued, and after how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_on_timeout: bool,
    pub retry_on_unsuccessful: bool,
}

impl From<&ManagerConfig> for RetryPolicy {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            retry_on_timeout: config.retry_on_timeout,
            retry_on_unsuccessful: config.retry_on_unsuccessful,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ManagerConfig::default())
    }
}

impl RetryPolicy {
    /// Whether this kind of failure is worth another attempt at all.
    ///
    /// Starts from [`DataformError::is_recoverable`]; the flags can only narrow it.
    pub fn is_retryable(&self, error: &DataformError) -> bool {
        let allowed = match error {
            DataformError::Timeout { .. } => self.retry_on_timeout,
            DataformError::WorkflowUnsuccessful { .. } => self.retry_on_unsuccessful,
            _ => true,
        };
        allowed && error.is_recoverable()
    }

    /// Retry when the error is retryable and the budget is not spent
    pub fn should_retry(&self, error: &DataformError, retries_used: u32) -> bool {
        retries_used < self.max_retries && self.is_retryable(error)
    }
}
