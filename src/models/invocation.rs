//! Workflow Invocation Records
//!
//! Plain data mirrored from the Dataform API. A record is only ever replaced
//! wholesale by a fresh remote read, never edited locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::InvocationState;

/// Start and end timestamps reported for an invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationTiming {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl InvocationTiming {
    /// Timing for an invocation that has started but not finished
    pub fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start_time),
            end_time: None,
        }
    }
}

/// One remote execution of a Dataform workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInvocation {
    /// Opaque resource name, e.g.
    /// `projects/p/locations/l/repositories/r/workflowInvocations/123`
    pub name: String,

    /// Compilation result the invocation executes
    pub compilation_result: String,

    pub state: InvocationState,

    #[serde(default)]
    pub invocation_timing: InvocationTiming,
}

impl WorkflowInvocation {
    /// Last path segment of the resource name
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        let invocation = WorkflowInvocation {
            name: "projects/p/locations/l/repositories/r/workflowInvocations/abc-123".to_string(),
            compilation_result: "c".to_string(),
            state: InvocationState::Running,
            invocation_timing: InvocationTiming::default(),
        };
        assert_eq!(invocation.short_name(), "abc-123");
    }

    #[test]
    fn test_missing_timing_deserializes_as_empty() {
        let invocation: WorkflowInvocation = serde_json::from_str(
            r#"{"name": "wf", "compilation_result": "c", "state": "PENDING"}"#,
        )
        .unwrap();
        assert_eq!(invocation.invocation_timing, InvocationTiming::default());
        assert_eq!(invocation.short_name(), "wf");
    }
}
