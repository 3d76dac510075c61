use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote workflow invocation states, as reported by the Dataform API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationState {
    /// Invocation accepted but not yet executing
    Pending,
    /// Invocation is executing actions
    Running,
    /// All actions completed successfully
    Succeeded,
    /// At least one action failed
    Failed,
    /// Invocation was cancelled
    Cancelled,
    /// The API returned a state this client does not recognise
    Unknown,
}

impl InvocationState {
    /// Check if this is a terminal state (no further transitions occur)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Check if this terminal state represents success
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Check if this is an active state (invocation is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// All states, in declaration order
    pub fn all() -> [Self; 6] {
        [
            Self::Pending,
            Self::Running,
            Self::Succeeded,
            Self::Failed,
            Self::Cancelled,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for InvocationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "UNKNOWN" | "STATE_UNSPECIFIED" => Ok(Self::Unknown),
            _ => Err(format!("Invalid invocation state: {s}")),
        }
    }
}

/// Default state for a freshly created invocation
impl Default for InvocationState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Local bookkeeping status of a workflow managed by `WorkflowManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedStatus {
    /// Waiting for a free concurrency slot (initially or before a retry)
    Queued,
    /// Holding a slot; the remote invocation is being created or observed
    Running,
    /// Finished successfully
    Done,
    /// Finished unsuccessfully, retries exhausted or not applicable
    Failed,
}

impl ManagedStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ManagedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl Default for ManagedStatus {
    fn default() -> Self {
        Self::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_invocation_states() {
        assert!(InvocationState::Succeeded.is_terminal());
        assert!(InvocationState::Failed.is_terminal());
        assert!(InvocationState::Cancelled.is_terminal());
        assert!(!InvocationState::Pending.is_terminal());
        assert!(!InvocationState::Running.is_terminal());
        assert!(!InvocationState::Unknown.is_terminal());
    }

    #[test]
    fn test_invocation_state_parsing() {
        assert_eq!("running".parse::<InvocationState>(), Ok(InvocationState::Running));
        assert_eq!(
            "STATE_UNSPECIFIED".parse::<InvocationState>(),
            Ok(InvocationState::Unknown)
        );
        assert!("exploded".parse::<InvocationState>().is_err());
    }

    #[test]
    fn test_invocation_state_serde_uses_api_names() {
        let json = serde_json::to_string(&InvocationState::Succeeded).unwrap();
        assert_eq!(json, "\"SUCCEEDED\"");
    }

    #[test]
    fn test_managed_status_terminal() {
        assert!(ManagedStatus::Done.is_terminal());
        assert!(ManagedStatus::Failed.is_terminal());
        assert!(!ManagedStatus::Queued.is_terminal());
        assert!(!ManagedStatus::Running.is_terminal());
        assert_eq!(ManagedStatus::default(), ManagedStatus::Queued);
    }
}
