//! # Dataform Configuration
//!
//! Immutable connection settings for a Dataform repository plus tuning knobs for
//! the workflow manager.
//!
//! ## Usage
//!
//! ```rust
//! use dataform_core::config::DataformConfig;
//!
//! let config = DataformConfig::new("my-project", "analytics")
//!     .unwrap()
//!     .with_git_branch("release")
//!     .unwrap();
//!
//! assert_eq!(
//!     config.repo_uri(),
//!     "projects/my-project/locations/us-central1/repositories/analytics"
//! );
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::{self, manager};
use crate::error::{DataformError, DataformResult};

pub use loader::{ConfigLoader, DataformSettings};

/// Repository coordinates every remote request is built from.
///
/// Fields are private so a validated value cannot be altered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDataformConfig")]
pub struct DataformConfig {
    project_id: String,
    location: String,
    repo_name: String,
    git_branch: String,
}

impl DataformConfig {
    /// Create a configuration with the default location and branch
    pub fn new(project_id: impl Into<String>, repo_name: impl Into<String>) -> DataformResult<Self> {
        Self::with_all(
            project_id,
            constants::DEFAULT_LOCATION,
            repo_name,
            constants::DEFAULT_GIT_BRANCH,
        )
    }

    /// Create a fully specified configuration
    pub fn with_all(
        project_id: impl Into<String>,
        location: impl Into<String>,
        repo_name: impl Into<String>,
        git_branch: impl Into<String>,
    ) -> DataformResult<Self> {
        let config = Self {
            project_id: project_id.into(),
            location: location.into(),
            repo_name: repo_name.into(),
            git_branch: git_branch.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Copy of this configuration targeting another region
    pub fn with_location(self, location: impl Into<String>) -> DataformResult<Self> {
        Self::with_all(self.project_id, location, self.repo_name, self.git_branch)
    }

    /// Copy of this configuration compiling another branch
    pub fn with_git_branch(self, git_branch: impl Into<String>) -> DataformResult<Self> {
        Self::with_all(self.project_id, self.location, self.repo_name, git_branch)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn git_branch(&self) -> &str {
        &self.git_branch
    }

    /// Fully qualified repository resource name
    pub fn repo_uri(&self) -> String {
        format!(
            "projects/{}/locations/{}/repositories/{}",
            self.project_id, self.location, self.repo_name
        )
    }

    fn validate(&self) -> DataformResult<()> {
        let fields = [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("repo_name", &self.repo_name),
            ("git_branch", &self.git_branch),
        ];

        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(DataformError::invalid_argument(format!(
                    "{field} must not be empty"
                )));
            }
            if value.contains('/') && field != "git_branch" {
                return Err(DataformError::invalid_argument(format!(
                    "{field} must not contain '/': {value}"
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for DataformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataformConfig(project_id={}, repo_name={}, branch={})",
            self.project_id, self.repo_name, self.git_branch
        )
    }
}

/// Unvalidated shape used when deserializing from files
#[derive(Debug, Deserialize)]
struct RawDataformConfig {
    project_id: String,
    #[serde(default = "default_location")]
    location: String,
    repo_name: String,
    #[serde(default = "default_git_branch")]
    git_branch: String,
}

fn default_location() -> String {
    constants::DEFAULT_LOCATION.to_string()
}

fn default_git_branch() -> String {
    constants::DEFAULT_GIT_BRANCH.to_string()
}

impl TryFrom<RawDataformConfig> for DataformConfig {
    type Error = DataformError;

    fn try_from(raw: RawDataformConfig) -> Result<Self, Self::Error> {
        Self::with_all(raw.project_id, raw.location, raw.repo_name, raw.git_branch)
    }
}

/// Workflow manager tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Retry attempts after the first run
    pub max_retries: u32,
    /// Delay before each retry attempt
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
    /// Ceiling on simultaneously RUNNING entries
    pub max_concurrent_workflows: usize,
    /// How often a running entry polls its invocation
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Per-attempt wait deadline
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Treat a local wait timeout as retryable
    pub retry_on_timeout: bool,
    /// Treat a FAILED or CANCELLED terminal invocation as retryable
    pub retry_on_unsuccessful: bool,
    /// Whether each invocation fully refreshes incremental tables
    pub full_refresh: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_retries: manager::DEFAULT_MAX_RETRIES,
            retry_delay: manager::DEFAULT_RETRY_DELAY,
            max_concurrent_workflows: manager::DEFAULT_MAX_CONCURRENT_WORKFLOWS,
            poll_interval: constants::DEFAULT_POLL_INTERVAL,
            timeout: constants::DEFAULT_WAIT_TIMEOUT,
            retry_on_timeout: true,
            retry_on_unsuccessful: true,
            full_refresh: true,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> DataformResult<()> {
        if self.max_concurrent_workflows == 0 {
            return Err(DataformError::invalid_argument(
                "max_concurrent_workflows must be greater than 0",
            ));
        }
        if self.timeout.is_zero() {
            return Err(DataformError::invalid_argument(
                "timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Serialize durations as whole seconds in config files
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_repo_uri() {
        let config = DataformConfig::new("test-project", "test-repo").unwrap();
        assert_eq!(config.location(), "us-central1");
        assert_eq!(config.git_branch(), "main");
        assert_eq!(
            config.repo_uri(),
            "projects/test-project/locations/us-central1/repositories/test-repo"
        );
    }

    #[test]
    fn test_empty_identifiers_fail_fast() {
        assert!(matches!(
            DataformConfig::new("", "repo"),
            Err(DataformError::InvalidArgument(_))
        ));
        assert!(matches!(
            DataformConfig::with_all("p", "  ", "r", "main"),
            Err(DataformError::InvalidArgument(_))
        ));
        assert!(DataformConfig::new("p", "r")
            .unwrap()
            .with_git_branch("")
            .is_err());
    }

    #[test]
    fn test_slashes_rejected_outside_branch() {
        assert!(DataformConfig::new("p/x", "r").is_err());
        assert!(DataformConfig::new("p", "r")
            .unwrap()
            .with_git_branch("feature/incremental")
            .is_ok());
    }

    #[test]
    fn test_display() {
        let config = DataformConfig::with_all("p", "europe-west1", "r", "test").unwrap();
        assert_eq!(
            config.to_string(),
            "DataformConfig(project_id=p, repo_name=r, branch=test)"
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let parsed: Result<DataformConfig, _> =
            serde_json::from_str(r#"{"project_id": "", "repo_name": "r"}"#);
        assert!(parsed.is_err());

        let parsed: DataformConfig =
            serde_json::from_str(r#"{"project_id": "p", "repo_name": "r"}"#).unwrap();
        assert_eq!(parsed.location(), "us-central1");
    }

    #[test]
    fn test_manager_config_validation() {
        assert!(ManagerConfig::default().validate().is_ok());

        let config = ManagerConfig {
            max_concurrent_workflows: 0,
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
