//! # Workflow Handle
//!
//! Client-side view of one remote workflow invocation. The handle only learns
//! about its invocation through `refresh`; every predicate reads the last
//! fetched record and never touches the network.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::shutdown::ShutdownSignal;
use crate::client::DataformClient;
use crate::constants::MIN_POLL_INTERVAL;
use crate::error::{DataformError, DataformResult};
use crate::models::WorkflowInvocation;
use crate::state_machine::{invocation_transition_allowed, InvocationState};

/// Clamp a requested poll interval to the supported minimum
pub fn clamp_poll_interval(requested: Duration) -> Duration {
    if requested < MIN_POLL_INTERVAL {
        warn!(
            requested_ms = requested.as_millis() as u64,
            minimum_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "Poll interval below minimum, clamping"
        );
        MIN_POLL_INTERVAL
    } else {
        requested
    }
}

/// Handle on a single workflow invocation
#[derive(Clone)]
pub struct WorkflowHandle {
    client: Arc<dyn DataformClient>,
    invocation: WorkflowInvocation,
    execution_id: Option<String>,
}

impl fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("client", &self.client.client_name())
            .field("invocation", &self.invocation)
            .field("execution_id", &self.execution_id)
            .finish()
    }
}

impl fmt::Display for WorkflowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataformWorkflow(name={}, state={})",
            self.short_name(),
            self.state()
        )
    }
}

impl WorkflowHandle {
    pub fn new(client: Arc<dyn DataformClient>, invocation: WorkflowInvocation) -> Self {
        Self {
            client,
            invocation,
            execution_id: None,
        }
    }

    pub(crate) fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// Last fetched invocation record
    pub fn invocation(&self) -> &WorkflowInvocation {
        &self.invocation
    }

    pub fn name(&self) -> &str {
        &self.invocation.name
    }

    pub fn short_name(&self) -> &str {
        self.invocation.short_name()
    }

    pub fn compilation_result(&self) -> &str {
        &self.invocation.compilation_result
    }

    /// Execution id passed to the compilation, when created through the service
    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn state(&self) -> InvocationState {
        self.invocation.state
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_successful(&self) -> bool {
        self.state() == InvocationState::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.state() == InvocationState::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == InvocationState::Cancelled
    }

    pub fn is_running(&self) -> bool {
        self.state() == InvocationState::Running
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.invocation.invocation_timing.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.invocation.invocation_timing.end_time
    }

    /// Run time: end minus start when finished, elapsed so far while active.
    ///
    /// `None` when the invocation never reported a start, or when it is
    /// complete without an end time.
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start_time()?;
        let end = match self.end_time() {
            Some(end) => end,
            None if !self.is_complete() => Utc::now(),
            None => return None,
        };
        // Clock skew can put end before start; report zero rather than nothing
        Some((end - start).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration().map(|duration| duration.as_secs_f64())
    }

    /// Re-fetch the invocation from the remote API.
    ///
    /// A fetched state that would move the handle backwards (out of a
    /// terminal state, RUNNING back to PENDING, or a known state back to
    /// UNKNOWN) is logged and ignored.
    pub async fn refresh(&mut self) -> DataformResult<&mut Self> {
        let latest = self
            .client
            .get_workflow_invocation(&self.invocation.name)
            .await?;
        self.apply(latest);
        Ok(self)
    }

    fn apply(&mut self, latest: WorkflowInvocation) {
        let current = self.invocation.state;
        if invocation_transition_allowed(current, latest.state) {
            if current != latest.state {
                debug!(
                    workflow = %self.invocation.name,
                    from = %current,
                    to = %latest.state,
                    "Workflow state changed"
                );
            }
            self.invocation = latest;
        } else {
            warn!(
                workflow = %self.invocation.name,
                current = %current,
                reported = %latest.state,
                "Ignoring regressing workflow state"
            );
        }
    }

    /// Poll until the invocation reaches a terminal state.
    ///
    /// Returns `Timeout` once `timeout` has elapsed; the remote invocation is
    /// left running. A zero `timeout` is rejected before any remote call.
    pub async fn wait_for_completion(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> DataformResult<&mut Self> {
        self.poll_until_complete(poll_interval, timeout, None).await
    }

    /// Like `wait_for_completion`, but gives up with `ManagerShutdown` once
    /// `signal` is raised. The poll cycle in progress still finishes.
    pub async fn wait_for_completion_or_shutdown(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
        signal: &ShutdownSignal,
    ) -> DataformResult<&mut Self> {
        self.poll_until_complete(poll_interval, timeout, Some(signal))
            .await
    }

    async fn poll_until_complete(
        &mut self,
        poll_interval: Duration,
        timeout: Duration,
        shutdown: Option<&ShutdownSignal>,
    ) -> DataformResult<&mut Self> {
        if timeout.is_zero() {
            return Err(DataformError::invalid_argument(
                "timeout must be greater than 0",
            ));
        }
        let poll_interval = clamp_poll_interval(poll_interval);
        let deadline = Instant::now() + timeout;

        info!(
            workflow = %self.invocation.name,
            poll_interval_secs = poll_interval.as_secs_f64(),
            timeout_secs = timeout.as_secs_f64(),
            "Waiting for workflow completion"
        );

        loop {
            self.refresh().await?;
            if self.is_complete() {
                info!(
                    workflow = %self.invocation.name,
                    state = %self.state(),
                    duration_secs = self.duration_seconds(),
                    "Workflow completed"
                );
                return Ok(self);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    workflow = %self.invocation.name,
                    state = %self.state(),
                    "Workflow did not complete before the wait deadline"
                );
                return Err(DataformError::Timeout {
                    name: self.invocation.name.clone(),
                    timeout,
                });
            }

            debug!(
                workflow = %self.invocation.name,
                state = %self.state(),
                "Workflow still in progress"
            );
            let pause = poll_interval.min(deadline - now);
            match shutdown {
                Some(signal) => {
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = signal.wait_for_shutdown() => {
                            info!(workflow = %self.invocation.name, "Stopped waiting on shutdown");
                            return Err(DataformError::ManagerShutdown);
                        }
                    }
                }
                None => tokio::time::sleep(pause).await,
            }
        }
    }
}
