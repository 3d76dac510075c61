//! Request records handed to a `DataformClient`.
//!
//! The service builds these from `DataformConfig`; client implementations map
//! them onto whatever wire format the remote API expects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compile the repository at a git commitish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationRequest {
    /// Repository resource name
    pub parent: String,
    /// Branch, tag or commit to compile
    pub git_commitish: String,
    /// Compilation variables (`dataform.projectConfig.vars`)
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// Suffix appended to every schema name
    #[serde(default)]
    pub schema_suffix: Option<String>,
}

/// Invocation flags controlling what a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOptions {
    /// Rebuild incremental tables from scratch
    pub full_refresh: bool,
    /// Include transitive dependencies of the selected actions
    pub include_dependencies: bool,
    /// Include transitive dependents of the selected actions
    pub include_dependents: bool,
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self {
            full_refresh: true,
            include_dependencies: true,
            include_dependents: true,
        }
    }
}

/// Start a workflow invocation from a compilation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub parent: String,
    pub compilation_result: String,
    #[serde(flatten)]
    pub options: InvocationOptions,
}

/// Page through invocations of a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInvocationsRequest {
    pub parent: String,
    pub page_size: i32,
    pub order_by: String,
}
