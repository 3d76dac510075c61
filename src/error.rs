//! # Error Types
//!
//! Unified error handling for the workflow handle, service and manager layers.

use std::time::Duration;
use thiserror::Error;

use crate::state_machine::InvocationState;

/// Result type used throughout the crate
pub type DataformResult<T> = Result<T, DataformError>;

/// Error taxonomy for Dataform invocation operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataformError {
    /// Bad local input: empty identifiers, non-positive limits or timeouts
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient transport or API failure, worth retrying
    #[error("Remote API unavailable during {operation}: {reason}")]
    RemoteUnavailable { operation: String, reason: String },

    /// The referenced invocation (or compilation result) no longer exists
    #[error("Not found: {name}")]
    NotFound { name: String },

    /// Local wait deadline exceeded; the remote invocation keeps running
    #[error("Workflow {name} did not complete within {} seconds", .timeout.as_secs())]
    Timeout { name: String, timeout: Duration },

    /// The invocation reached a terminal state other than SUCCEEDED
    #[error("Workflow {name} finished in state {state}")]
    WorkflowUnsuccessful { name: String, state: InvocationState },

    #[error("Workflow manager is shutting down")]
    ManagerShutdown,
}

impl DataformError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a remote unavailable error for a named API operation
    pub fn remote_unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Check if error is recoverable (worth retrying).
    ///
    /// `RetryPolicy` builds on this and may switch off timeouts and
    /// unsuccessful runs.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            DataformError::RemoteUnavailable { .. } => true,
            DataformError::Timeout { .. } => true,
            DataformError::WorkflowUnsuccessful { .. } => true,
            // The handle is gone; asking again will not bring it back
            DataformError::NotFound { .. } => false,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for DataformError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}
