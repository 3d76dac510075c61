//! # System Constants
//!
//! Defaults and fixed names that define the operational boundaries of the
//! invocation wrapper and the workflow manager.

use std::time::Duration;

pub use crate::state_machine::{InvocationState, ManagedStatus};

/// Default Google Cloud region for Dataform repositories
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Default git branch compiled for each invocation
pub const DEFAULT_GIT_BRANCH: &str = "main";

/// Lower bound for any poll interval, to avoid hammering the remote API
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll interval used when callers do not pick one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Wait deadline used when callers do not pick one
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default number of invocations returned by `list_recent_workflows`
pub const DEFAULT_LIST_LIMIT: i32 = 10;

/// Ordering requested from the list API (newest first)
pub const LIST_ORDER_NEWEST_FIRST: &str = "invocation_timing.start_time desc";

/// Workflow manager defaults
pub mod manager {
    use std::time::Duration;

    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);
    pub const DEFAULT_MAX_CONCURRENT_WORKFLOWS: usize = 3;
    pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);
    /// Prefix for locally generated managed-entry identifiers
    pub const GENERATED_ID_PREFIX: &str = "workflow";
}

/// Compilation variable names understood by the Dataform project
pub mod compilation_vars {
    /// Carries the caller's execution id into the compiled SQLX project
    pub const DEFAULT_EXECUTION_ID: &str = "defaultExecutionId";
}

/// Environment variables read once by the configuration loader
pub mod env {
    pub const PROJECT_ID: &str = "GCP_PROJECT_ID";
    pub const LOCATION: &str = "GCP_LOCATION";
    pub const REPO_NAME: &str = "DATAFORM_REPO";
    pub const GIT_BRANCH: &str = "DATAFORM_BRANCH";
    pub const CONFIG_FILE: &str = "DATAFORM_CONFIG";
    pub const ENVIRONMENT: &str = "DATAFORM_ENV";
    pub const LOG_FORMAT: &str = "DATAFORM_LOG_FORMAT";
}
