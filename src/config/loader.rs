//! Configuration Loader
//!
//! Reads settings once at startup: an optional TOML/YAML/JSON file overlaid by the
//! `GCP_PROJECT_ID`, `GCP_LOCATION`, `DATAFORM_REPO` and `DATAFORM_BRANCH`
//! environment variables.
//!
//! ```toml
//! [dataform]
//! project_id = "my-project"
//! repo_name = "analytics"
//! git_branch = "main"
//!
//! [manager]
//! max_retries = 2
//! retry_delay = 30
//! max_concurrent_workflows = 2
//! ```

use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DataformConfig, ManagerConfig};
use crate::constants::{self, env};
use crate::error::DataformResult;

/// Everything a process needs to build a service and a manager
#[derive(Debug, Clone, Deserialize)]
pub struct DataformSettings {
    pub dataform: DataformConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

/// Environment variable to settings key
const ENV_OVERRIDES: [(&str, &str); 4] = [
    (env::PROJECT_ID, "dataform.project_id"),
    (env::LOCATION, "dataform.location"),
    (env::REPO_NAME, "dataform.repo_name"),
    (env::GIT_BRANCH, "dataform.git_branch"),
];

/// Builder for loading `DataformSettings`
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ConfigLoader {
    /// Snapshot the process environment; picks up `DATAFORM_CONFIG` as the file path
    pub fn from_process_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| {
                key == env::CONFIG_FILE || ENV_OVERRIDES.iter().any(|(var, _)| *var == key.as_str())
            })
            .collect();

        Self {
            file: vars.get(env::CONFIG_FILE).map(PathBuf::from),
            env: vars,
        }
    }

    /// Read settings from this file (required to exist)
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the environment snapshot, mainly for tests
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    pub fn load(&self) -> DataformResult<DataformSettings> {
        let mut builder = Config::builder()
            .set_default("dataform.location", constants::DEFAULT_LOCATION)?
            .set_default("dataform.git_branch", constants::DEFAULT_GIT_BRANCH)?;

        if let Some(path) = &self.file {
            debug!(path = %path.display(), "Loading Dataform settings file");
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = self.env.get(var).filter(|value| !value.trim().is_empty()) {
                builder = builder.set_override(key, value.clone())?;
            }
        }

        let settings: DataformSettings = builder.build()?.try_deserialize()?;
        settings.manager.validate()?;

        debug!(
            config = %settings.dataform,
            max_concurrent_workflows = settings.manager.max_concurrent_workflows,
            max_retries = settings.manager.max_retries,
            "Dataform settings loaded"
        );

        Ok(settings)
    }
}
