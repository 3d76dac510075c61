//! # In-Memory Dataform Client
//!
//! Scriptable stand-in for the remote API. Each created invocation walks
//! through a script of states, one state per `get_workflow_invocation` call,
//! and stays on the last one. Timestamps follow the tokio clock, so paused-time
//! tests see consistent durations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

use super::traits::DataformClient;
use crate::error::{DataformError, DataformResult};
use crate::models::{
    CompilationRequest, InvocationRequest, InvocationTiming, ListInvocationsRequest,
    WorkflowInvocation,
};
use crate::state_machine::InvocationState;

/// Number of calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCallCounts {
    pub compile: usize,
    pub create: usize,
    pub get: usize,
    pub list: usize,
}

#[derive(Debug)]
struct ScriptedInvocation {
    record: WorkflowInvocation,
    parent: String,
    remaining: VecDeque<InvocationState>,
    sequence: u64,
}

#[derive(Debug, Default)]
struct InMemoryState {
    next_id: u64,
    compilations: HashMap<String, CompilationRequest>,
    compilation_log: Vec<CompilationRequest>,
    invocations: HashMap<String, ScriptedInvocation>,
    scripts: VecDeque<Vec<InvocationState>>,
    invocation_requests: Vec<InvocationRequest>,
    create_failures: u32,
    get_failures: u32,
    list_failures: u32,
    calls: ClientCallCounts,
}

/// In-memory `DataformClient` for tests, demos and dry runs
#[derive(Debug)]
pub struct InMemoryDataformClient {
    state: Mutex<InMemoryState>,
    default_script: Vec<InvocationState>,
    latency: Option<Duration>,
    epoch_wall: DateTime<Utc>,
    epoch: tokio::time::Instant,
}

impl Default for InMemoryDataformClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDataformClient {
    /// Invocations go RUNNING then SUCCEEDED unless scripted otherwise
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryState::default()),
            default_script: vec![InvocationState::Running, InvocationState::Succeeded],
            latency: None,
            epoch_wall: Utc::now(),
            epoch: tokio::time::Instant::now(),
        }
    }

    /// Script used for invocations without a queued script
    pub fn with_default_script(mut self, script: Vec<InvocationState>) -> Self {
        self.default_script = script;
        self
    }

    /// Delay applied to every call, to simulate network round trips
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a script for the next created invocation (FIFO)
    pub fn push_script(&self, script: Vec<InvocationState>) {
        self.state.lock().scripts.push_back(script);
    }

    /// Make the next `count` invocation creations fail as unavailable
    pub fn fail_next_creates(&self, count: u32) {
        self.state.lock().create_failures = count;
    }

    /// Make the next `count` invocation reads fail as unavailable
    pub fn fail_next_gets(&self, count: u32) {
        self.state.lock().get_failures = count;
    }

    /// Make the next `count` list calls fail as unavailable
    pub fn fail_next_lists(&self, count: u32) {
        self.state.lock().list_failures = count;
    }

    /// Drop an invocation so later reads report it missing
    pub fn forget_invocation(&self, name: &str) {
        self.state.lock().invocations.remove(name);
    }

    pub fn call_counts(&self) -> ClientCallCounts {
        self.state.lock().calls
    }

    /// Compilation requests received, in arrival order
    pub fn compilation_requests(&self) -> Vec<CompilationRequest> {
        self.state.lock().compilation_log.clone()
    }

    /// Invocation requests received, in arrival order
    pub fn invocation_requests(&self) -> Vec<InvocationRequest> {
        self.state.lock().invocation_requests.clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.state.lock().invocations.len()
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.epoch.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.epoch_wall + elapsed
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn consume_failure(counter: &mut u32, operation: &str) -> DataformResult<()> {
        if *counter > 0 {
            *counter -= 1;
            return Err(DataformError::remote_unavailable(
                operation,
                "injected transport failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DataformClient for InMemoryDataformClient {
    async fn create_compilation_result(
        &self,
        request: CompilationRequest,
    ) -> DataformResult<String> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        state.calls.compile += 1;
        state.next_id += 1;
        let name = format!("{}/compilationResults/{:08}", request.parent, state.next_id);
        state.compilation_log.push(request.clone());
        state.compilations.insert(name.clone(), request);

        debug!(compilation = %name, "In-memory compilation created");
        Ok(name)
    }

    async fn create_workflow_invocation(
        &self,
        request: InvocationRequest,
    ) -> DataformResult<WorkflowInvocation> {
        self.simulate_latency().await;
        let now = self.now();

        let mut state = self.state.lock();
        state.calls.create += 1;
        Self::consume_failure(&mut state.create_failures, "create_workflow_invocation")?;

        if !state.compilations.contains_key(&request.compilation_result) {
            return Err(DataformError::not_found(request.compilation_result));
        }

        state.next_id += 1;
        let sequence = state.next_id;
        let name = format!("{}/workflowInvocations/{:08}", request.parent, sequence);
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| self.default_script.clone());

        let record = WorkflowInvocation {
            name: name.clone(),
            compilation_result: request.compilation_result.clone(),
            state: InvocationState::Pending,
            invocation_timing: InvocationTiming::started_at(now),
        };

        state.invocations.insert(
            name.clone(),
            ScriptedInvocation {
                record: record.clone(),
                parent: request.parent.clone(),
                remaining: script.into(),
                sequence,
            },
        );
        state.invocation_requests.push(request);

        debug!(invocation = %name, "In-memory invocation created");
        Ok(record)
    }

    async fn get_workflow_invocation(&self, name: &str) -> DataformResult<WorkflowInvocation> {
        self.simulate_latency().await;
        let now = self.now();

        let mut state = self.state.lock();
        state.calls.get += 1;
        Self::consume_failure(&mut state.get_failures, "get_workflow_invocation")?;

        let invocation = state
            .invocations
            .get_mut(name)
            .ok_or_else(|| DataformError::not_found(name))?;

        if let Some(next) = invocation.remaining.pop_front() {
            invocation.record.state = next;
            if next.is_terminal() && invocation.record.invocation_timing.end_time.is_none() {
                invocation.record.invocation_timing.end_time = Some(now);
            }
        }

        Ok(invocation.record.clone())
    }

    async fn list_workflow_invocations(
        &self,
        request: ListInvocationsRequest,
    ) -> DataformResult<Vec<WorkflowInvocation>> {
        self.simulate_latency().await;

        let mut state = self.state.lock();
        state.calls.list += 1;
        Self::consume_failure(&mut state.list_failures, "list_workflow_invocations")?;

        let mut matching: Vec<&ScriptedInvocation> = state
            .invocations
            .values()
            .filter(|invocation| invocation.parent == request.parent)
            .collect();
        matching.sort_by(|a, b| {
            b.record
                .invocation_timing
                .start_time
                .cmp(&a.record.invocation_timing.start_time)
                .then(b.sequence.cmp(&a.sequence))
        });

        let page_size = usize::try_from(request.page_size).unwrap_or(0);
        Ok(matching
            .into_iter()
            .take(page_size)
            .map(|invocation| invocation.record.clone())
            .collect())
    }

    fn client_name(&self) -> &'static str {
        "in-memory"
    }
}
