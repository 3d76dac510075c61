//! # Workflow Service
//!
//! Compile, invoke, look up and list workflow invocations for one configured
//! Dataform repository.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::handle::WorkflowHandle;
use crate::client::DataformClient;
use crate::config::DataformConfig;
use crate::constants::{self, compilation_vars};
use crate::error::{DataformError, DataformResult};
use crate::logging::{log_error, log_workflow_operation};
use crate::models::{
    CompilationRequest, InvocationOptions, InvocationRequest, ListInvocationsRequest,
};

/// Parameters for `WorkflowService::run_workflow`
#[derive(Debug, Clone, PartialEq)]
pub struct RunWorkflowRequest {
    /// Passed to the compilation as `defaultExecutionId`; generated when absent
    pub execution_id: Option<String>,
    /// Block until the invocation finishes
    pub wait: bool,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub options: InvocationOptions,
}

impl Default for RunWorkflowRequest {
    fn default() -> Self {
        Self {
            execution_id: None,
            wait: false,
            timeout: constants::DEFAULT_WAIT_TIMEOUT,
            poll_interval: constants::DEFAULT_POLL_INTERVAL,
            options: InvocationOptions::default(),
        }
    }
}

impl RunWorkflowRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.options.full_refresh = full_refresh;
        self
    }

    fn validate(&self) -> DataformResult<()> {
        if self.timeout.is_zero() {
            return Err(DataformError::invalid_argument(
                "timeout must be greater than 0",
            ));
        }
        if let Some(execution_id) = &self.execution_id {
            if execution_id.trim().is_empty() {
                return Err(DataformError::invalid_argument(
                    "execution_id must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// Workflow operations against one repository
pub struct WorkflowService {
    config: DataformConfig,
    client: Arc<dyn DataformClient>,
    latest_workflow: Mutex<Option<WorkflowHandle>>,
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService")
            .field("config", &self.config)
            .field("client", &self.client.client_name())
            .finish()
    }
}

impl WorkflowService {
    pub fn new(config: DataformConfig, client: Arc<dyn DataformClient>) -> Self {
        info!(
            repository = %config.repo_uri(),
            client = client.client_name(),
            "Initialized Dataform workflow service"
        );
        Self {
            config,
            client,
            latest_workflow: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DataformConfig {
        &self.config
    }

    /// Handle created most recently by this service
    pub fn latest_workflow(&self) -> Option<WorkflowHandle> {
        self.latest_workflow.lock().clone()
    }

    /// Compile the configured branch; returns the compilation result name
    #[instrument(skip(self, vars), fields(repository = %self.config.repo_name()))]
    pub async fn compile(
        &self,
        vars: HashMap<String, String>,
        schema_suffix: Option<&str>,
    ) -> DataformResult<String> {
        let request = CompilationRequest {
            parent: self.config.repo_uri(),
            git_commitish: self.config.git_branch().to_string(),
            vars,
            schema_suffix: schema_suffix.map(str::to_string),
        };

        let compilation = self
            .client
            .create_compilation_result(request)
            .await
            .inspect_err(|error| {
                log_error("workflow_service", "compile", &error.to_string(), None)
            })?;

        debug!(compilation = %compilation, "Created compilation result");
        Ok(compilation)
    }

    /// Start an invocation of `compilation_name`
    pub async fn create_workflow(
        &self,
        compilation_name: &str,
        options: InvocationOptions,
    ) -> DataformResult<WorkflowHandle> {
        if compilation_name.trim().is_empty() {
            return Err(DataformError::invalid_argument(
                "compilation_name must not be empty",
            ));
        }

        let invocation = self
            .client
            .create_workflow_invocation(InvocationRequest {
                parent: self.config.repo_uri(),
                compilation_result: compilation_name.to_string(),
                options,
            })
            .await
            .inspect_err(|error| {
                log_error(
                    "workflow_service",
                    "create_workflow",
                    &error.to_string(),
                    Some(compilation_name),
                )
            })?;

        let handle = WorkflowHandle::new(self.client.clone(), invocation);
        log_workflow_operation(
            "create_workflow",
            Some(handle.name()),
            None,
            &handle.state().to_string(),
            Some(compilation_name),
        );
        *self.latest_workflow.lock() = Some(handle.clone());
        Ok(handle)
    }

    /// Handle for an existing invocation, fetched fresh
    pub async fn get_workflow(&self, workflow_name: &str) -> DataformResult<WorkflowHandle> {
        if workflow_name.trim().is_empty() {
            return Err(DataformError::invalid_argument(
                "workflow_name must not be empty",
            ));
        }
        let invocation = self.client.get_workflow_invocation(workflow_name).await?;
        Ok(WorkflowHandle::new(self.client.clone(), invocation))
    }

    /// Compile with the execution id, start an invocation and optionally wait
    pub async fn run_workflow(&self, request: RunWorkflowRequest) -> DataformResult<WorkflowHandle> {
        request.validate()?;

        let execution_id = request
            .execution_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(
            execution_id = %execution_id,
            wait = request.wait,
            full_refresh = request.options.full_refresh,
            "Running workflow"
        );

        let vars = HashMap::from([(
            compilation_vars::DEFAULT_EXECUTION_ID.to_string(),
            execution_id.clone(),
        )]);
        let compilation = self.compile(vars, None).await?;
        let mut handle = self
            .create_workflow(&compilation, request.options)
            .await?
            .with_execution_id(execution_id);
        *self.latest_workflow.lock() = Some(handle.clone());

        if request.wait {
            handle
                .wait_for_completion(request.poll_interval, request.timeout)
                .await?;
            *self.latest_workflow.lock() = Some(handle.clone());
        }

        Ok(handle)
    }

    /// Most recent invocations of the repository, newest first.
    ///
    /// Invocations without a start time sort last.
    pub async fn list_recent_workflows(&self, limit: i32) -> DataformResult<Vec<WorkflowHandle>> {
        if limit <= 0 {
            return Err(DataformError::invalid_argument(format!(
                "limit must be positive, got {limit}"
            )));
        }

        let invocations = self
            .client
            .list_workflow_invocations(ListInvocationsRequest {
                parent: self.config.repo_uri(),
                page_size: limit,
                order_by: constants::LIST_ORDER_NEWEST_FIRST.to_string(),
            })
            .await?;

        let mut handles: Vec<WorkflowHandle> = invocations
            .into_iter()
            .map(|invocation| WorkflowHandle::new(self.client.clone(), invocation))
            .collect();
        // Option orders None first, so compare reversed
        handles.sort_by(|a, b| match (a.start_time(), b.start_time()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        handles.truncate(limit as usize);

        debug!(count = handles.len(), limit, "Listed recent workflows");
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryDataformClient;

    fn service() -> (WorkflowService, Arc<InMemoryDataformClient>) {
        let client = Arc::new(InMemoryDataformClient::new());
        let config = DataformConfig::new("p", "r").unwrap();
        (WorkflowService::new(config, client.clone()), client)
    }

    #[tokio::test]
    async fn test_run_workflow_passes_execution_id_var() {
        let (service, client) = service();
        let handle = service
            .run_workflow(RunWorkflowRequest::new().with_execution_id("exec-1"))
            .await
            .unwrap();

        assert_eq!(handle.execution_id(), Some("exec-1"));
        let compilations = client.compilation_requests();
        assert_eq!(compilations.len(), 1);
        assert_eq!(
            compilations[0].vars.get(compilation_vars::DEFAULT_EXECUTION_ID),
            Some(&"exec-1".to_string())
        );
        assert_eq!(compilations[0].git_commitish, "main");
        assert_eq!(service.latest_workflow().unwrap().name(), handle.name());
    }

    #[tokio::test]
    async fn test_generated_execution_id_is_uuid() {
        let (service, _) = service();
        let handle = service.run_workflow(RunWorkflowRequest::new()).await.unwrap();
        let execution_id = handle.execution_id().unwrap();
        assert!(Uuid::parse_str(execution_id).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_requests_make_no_remote_calls() {
        let (service, client) = service();

        let zero_timeout = service
            .run_workflow(RunWorkflowRequest::new().with_timeout(Duration::ZERO))
            .await;
        assert!(matches!(zero_timeout, Err(DataformError::InvalidArgument(_))));

        let empty_id = service
            .run_workflow(RunWorkflowRequest::new().with_execution_id(" "))
            .await;
        assert!(matches!(empty_id, Err(DataformError::InvalidArgument(_))));

        assert!(matches!(
            service.list_recent_workflows(0).await,
            Err(DataformError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.get_workflow("").await,
            Err(DataformError::InvalidArgument(_))
        ));

        assert_eq!(client.call_counts(), Default::default());
    }

    #[tokio::test]
    async fn test_full_refresh_flag_reaches_invocation() {
        let (service, client) = service();
        service
            .run_workflow(RunWorkflowRequest::new().with_full_refresh(false))
            .await
            .unwrap();
        assert!(!client.invocation_requests()[0].options.full_refresh);
    }
}
