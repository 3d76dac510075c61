//! # Workflow Manager
//!
//! Runs many workflows at once under a concurrency cap, with retry and
//! lifecycle callbacks, without blocking the caller.
//!
//! ## Architecture
//!
//! - Submissions land in an entry table and an unbounded FIFO queue.
//! - A single dispatcher task takes ids off the queue in order and waits for a
//!   semaphore permit before spawning a worker, so admission is FIFO and the
//!   number of RUNNING entries never exceeds `max_concurrent_workflows`.
//! - A worker holds its permit for the whole RUNNING period. On a retryable
//!   failure it re-queues the entry after `retry_delay`, releasing the slot
//!   while it waits.
//! - Every status change goes through one transition helper, which checks it
//!   against the managed-entry guard.
//!
//! Entry lifecycle: `QUEUED -> RUNNING -> {DONE, FAILED}`, with
//! `RUNNING -> QUEUED` for retries and `QUEUED -> FAILED` on shutdown.
//!
//! ## Usage
//!
//! ```rust
//! use dataform_core::client::InMemoryDataformClient;
//! use dataform_core::config::{DataformConfig, ManagerConfig};
//! use dataform_core::orchestration::{ManagedRunRequest, WorkflowManager, WorkflowService};
//! use dataform_core::ManagedStatus;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let service = Arc::new(WorkflowService::new(
//!     DataformConfig::new("my-project", "analytics")?,
//!     Arc::new(InMemoryDataformClient::new()),
//! ));
//! let config = ManagerConfig {
//!     poll_interval: Duration::from_secs(1),
//!     ..ManagerConfig::default()
//! };
//! let manager = WorkflowManager::new(service, config)?;
//!
//! let entry = manager.run_workflow_and_wait(ManagedRunRequest::new()).await?;
//! assert_eq!(entry.status, ManagedStatus::Done);
//! manager.shutdown(Duration::from_secs(5)).await;
//! # Ok::<(), dataform_core::DataformError>(())
//! # }).unwrap();
//! ```

pub mod entry;
pub mod observer;
pub mod retry;

pub use entry::{ManagedWorkflowEntry, ManagerStats};
pub use observer::{NoopObserver, WorkflowCallbacks, WorkflowObserver};
pub use retry::RetryPolicy;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::entry::{EntryRecord, RunSettings};
use self::observer::notify;
use super::handle::WorkflowHandle;
use super::service::{RunWorkflowRequest, WorkflowService};
use super::shutdown::ShutdownSignal;
use crate::config::ManagerConfig;
use crate::constants::manager::GENERATED_ID_PREFIX;
use crate::error::{DataformError, DataformResult};
use crate::logging::{log_error, log_workflow_operation};
use crate::state_machine::{managed_transition_allowed, ManagedStatus};

/// One workflow submission
pub struct ManagedRunRequest {
    /// Used as both entry id and execution id; generated when absent
    pub execution_id: Option<String>,
    /// Overrides `ManagerConfig::full_refresh`
    pub full_refresh: Option<bool>,
    /// Overrides `ManagerConfig::timeout` for each attempt
    pub timeout: Option<Duration>,
    pub observer: Arc<dyn WorkflowObserver>,
}

impl Default for ManagedRunRequest {
    fn default() -> Self {
        Self {
            execution_id: None,
            full_refresh: None,
            timeout: None,
            observer: Arc::new(NoopObserver),
        }
    }
}

impl fmt::Debug for ManagedRunRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedRunRequest")
            .field("execution_id", &self.execution_id)
            .field("full_refresh", &self.full_refresh)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ManagedRunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = Some(full_refresh);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }
}

/// What a worker needs to run one attempt
struct Attempt {
    number: u32,
    execution_id: String,
    settings: RunSettings,
    observer: Arc<dyn WorkflowObserver>,
}

struct ManagerInner {
    service: Arc<WorkflowService>,
    config: ManagerConfig,
    retry_policy: RetryPolicy,
    entries: DashMap<String, EntryRecord>,
    sequence: AtomicU64,
    slots: Arc<Semaphore>,
    queue: mpsc::UnboundedSender<String>,
    accepting: AtomicBool,
    shutdown: ShutdownSignal,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Concurrent workflow runner with retry and lifecycle callbacks
pub struct WorkflowManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for WorkflowManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowManager")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkflowManager {
    /// Start a manager and its dispatcher. Must be called inside a tokio runtime.
    pub fn new(service: Arc<WorkflowService>, config: ManagerConfig) -> DataformResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            DataformError::configuration("WorkflowManager must be created inside a tokio runtime")
        })?;

        let (queue, receiver) = mpsc::unbounded_channel();
        let inner = Arc::new(ManagerInner {
            service,
            retry_policy: RetryPolicy::from(&config),
            slots: Arc::new(Semaphore::new(config.max_concurrent_workflows)),
            config,
            entries: DashMap::new(),
            sequence: AtomicU64::new(0),
            queue,
            accepting: AtomicBool::new(true),
            shutdown: ShutdownSignal::new(),
            dispatcher: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        });

        let dispatcher = runtime.spawn(dispatch_loop(inner.clone(), receiver));
        *inner.dispatcher.lock() = Some(dispatcher);

        info!(
            max_concurrent_workflows = inner.config.max_concurrent_workflows,
            max_retries = inner.retry_policy.max_retries,
            retry_delay_secs = inner.retry_policy.retry_delay.as_secs(),
            "Workflow manager started"
        );
        Ok(Self { inner })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry_policy
    }

    pub fn service(&self) -> &Arc<WorkflowService> {
        &self.inner.service
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Queue a workflow and return its entry id without waiting
    pub fn run_workflow(&self, request: ManagedRunRequest) -> DataformResult<String> {
        if !self.is_accepting() {
            return Err(DataformError::ManagerShutdown);
        }

        let timeout = request.timeout.unwrap_or(self.inner.config.timeout);
        if timeout.is_zero() {
            return Err(DataformError::invalid_argument(
                "timeout must be greater than 0",
            ));
        }
        let id = match request.execution_id {
            Some(id) if id.trim().is_empty() => {
                return Err(DataformError::invalid_argument(
                    "execution_id must not be empty",
                ))
            }
            Some(id) => id,
            None => format!("{GENERATED_ID_PREFIX}-{}", Uuid::new_v4()),
        };
        let settings = RunSettings {
            full_refresh: request
                .full_refresh
                .unwrap_or(self.inner.config.full_refresh),
            timeout,
        };

        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
        match self.inner.entries.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(DataformError::invalid_argument(format!(
                    "workflow '{id}' is already tracked"
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(EntryRecord::new(
                    id.clone(),
                    sequence,
                    settings,
                    request.observer,
                ));
            }
        }

        if self.inner.queue.send(id.clone()).is_err() {
            self.inner.entries.remove(&id);
            return Err(DataformError::ManagerShutdown);
        }

        log_workflow_operation("submit", None, Some(&id), "queued", None);
        Ok(id)
    }

    /// Queue a workflow and wait until it is DONE or FAILED
    pub async fn run_workflow_and_wait(
        &self,
        request: ManagedRunRequest,
    ) -> DataformResult<ManagedWorkflowEntry> {
        let id = self.run_workflow(request)?;
        self.wait_for_workflow(&id).await
    }

    /// Wait until an entry is terminal and its callbacks have run
    pub async fn wait_for_workflow(&self, id: &str) -> DataformResult<ManagedWorkflowEntry> {
        let mut settled = self
            .inner
            .entries
            .get(id)
            .map(|record| record.settled.subscribe())
            .ok_or_else(|| DataformError::not_found(id))?;

        // The sender lives in the retained entry, so this only ends once settled
        let _ = settled.wait_for(|settled| *settled).await;
        self.get_workflow(id)
            .ok_or_else(|| DataformError::not_found(id))
    }

    pub fn get_workflow(&self, id: &str) -> Option<ManagedWorkflowEntry> {
        self.inner.snapshot(id)
    }

    /// Snapshot of every entry in submission order
    pub fn get_all_workflows(&self) -> Vec<ManagedWorkflowEntry> {
        let mut records: Vec<(u64, ManagedWorkflowEntry)> = self
            .inner
            .entries
            .iter()
            .map(|record| (record.sequence, record.snapshot.clone()))
            .collect();
        records.sort_by_key(|(sequence, _)| *sequence);
        records.into_iter().map(|(_, entry)| entry).collect()
    }

    pub fn stats(&self) -> ManagerStats {
        let mut stats = ManagerStats {
            available_slots: self.inner.slots.available_permits(),
            max_concurrent_workflows: self.inner.config.max_concurrent_workflows,
            ..ManagerStats::default()
        };
        for record in self.inner.entries.iter() {
            stats.count(record.snapshot.status);
        }
        stats
    }

    /// Stop accepting work, give in-flight entries up to `grace` to finish,
    /// then stop everything still pending and join all tasks.
    ///
    /// Entries still QUEUED, waiting to retry, or polling when the grace
    /// period ends settle as FAILED with `ManagerShutdown`. Entries that already
    /// finished are left alone.
    pub async fn shutdown(&self, grace: Duration) -> ManagerStats {
        if self.inner.accepting.swap(false, Ordering::SeqCst) {
            info!(grace_secs = grace.as_secs(), "Workflow manager shutting down");
        } else {
            debug!("Workflow manager shutdown already in progress");
        }

        let pending: Vec<_> = self
            .inner
            .entries
            .iter()
            .filter(|record| !record.snapshot.status.is_terminal())
            .map(|record| record.settled.subscribe())
            .collect();
        let in_flight = pending.len();
        let drained = tokio::time::timeout(
            grace,
            join_all(pending.into_iter().map(|mut settled| async move {
                let _ = settled.wait_for(|settled| *settled).await;
            })),
        )
        .await
        .is_ok();
        if !drained {
            warn!(
                in_flight,
                grace_secs = grace.as_secs(),
                "Grace period elapsed with unfinished workflows, stopping them"
            );
        }

        self.inner.shutdown.request_shutdown();

        let dispatcher = self.inner.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            if let Err(error) = dispatcher.await {
                warn!(error = %error, "Workflow dispatcher ended abnormally");
            }
        }
        // The dispatcher is the only spawner, so one pass joins every worker
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for result in join_all(workers).await {
            if let Err(error) = result {
                warn!(error = %error, "Workflow worker ended abnormally");
            }
        }

        let stats = self.stats();
        info!(
            done = stats.done,
            failed = stats.failed,
            "Workflow manager stopped"
        );
        stats
    }
}

impl Drop for WorkflowManager {
    fn drop(&mut self) {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.shutdown.request_shutdown();
    }
}

impl ManagerInner {
    fn snapshot(&self, id: &str) -> Option<ManagedWorkflowEntry> {
        self.entries.get(id).map(|record| record.snapshot.clone())
    }

    fn observer(&self, id: &str) -> Option<Arc<dyn WorkflowObserver>> {
        self.entries.get(id).map(|record| record.observer.clone())
    }

    /// The only place entry status changes
    fn transition(
        &self,
        id: &str,
        to: ManagedStatus,
        update: impl FnOnce(&mut ManagedWorkflowEntry),
    ) -> bool {
        let Some(mut record) = self.entries.get_mut(id) else {
            warn!(entry_id = %id, to = %to, "Transition for unknown workflow entry");
            return false;
        };
        let from = record.snapshot.status;
        if !managed_transition_allowed(from, to) {
            warn!(entry_id = %id, from = %from, to = %to, "Rejected workflow entry transition");
            return false;
        }

        let entry = &mut record.snapshot;
        update(entry);
        entry.status = to;
        entry.updated_at = Utc::now();
        debug!(entry_id = %id, from = %from, to = %to, "Workflow entry transitioned");
        true
    }

    fn record_handle(&self, id: &str, handle: &WorkflowHandle) {
        if let Some(mut record) = self.entries.get_mut(id) {
            record.snapshot.handle = Some(handle.clone());
            record.snapshot.updated_at = Utc::now();
        }
    }

    fn settle(&self, id: &str) {
        if let Some(record) = self.entries.get(id) {
            record.settled.send_replace(true);
        }
    }

    fn track(&self, worker: JoinHandle<()>) {
        let mut workers = self.workers.lock();
        workers.retain(|worker| !worker.is_finished());
        workers.push(worker);
    }

    fn begin_attempt(&self, id: &str) -> Option<Attempt> {
        let mut number = 0;
        if !self.transition(id, ManagedStatus::Running, |entry| {
            entry.attempts += 1;
            number = entry.attempts;
        }) {
            return None;
        }

        let record = self.entries.get(id)?;
        Some(Attempt {
            number,
            execution_id: record.snapshot.execution_id.clone(),
            settings: record.settings,
            observer: record.observer.clone(),
        })
    }

    /// Create the invocation and poll it to a terminal state
    async fn execute(
        &self,
        id: &str,
        attempt: &Attempt,
    ) -> Result<WorkflowHandle, (Option<WorkflowHandle>, DataformError)> {
        let request = RunWorkflowRequest::new()
            .with_execution_id(attempt.execution_id.clone())
            .with_full_refresh(attempt.settings.full_refresh)
            .with_timeout(attempt.settings.timeout);
        let mut handle = match self.service.run_workflow(request).await {
            Ok(handle) => handle,
            Err(error) => {
                notify("on_start", id, || attempt.observer.on_start(id, None));
                return Err((None, error));
            }
        };

        self.record_handle(id, &handle);
        notify("on_start", id, || attempt.observer.on_start(id, Some(&handle)));

        let waited = handle
            .wait_for_completion_or_shutdown(
                self.config.poll_interval,
                attempt.settings.timeout,
                &self.shutdown,
            )
            .await
            .map(|_| ());
        self.record_handle(id, &handle);
        if let Err(error) = waited {
            return Err((Some(handle), error));
        }

        if handle.is_successful() {
            Ok(handle)
        } else {
            let error = DataformError::WorkflowUnsuccessful {
                name: handle.name().to_string(),
                state: handle.state(),
            };
            Err((Some(handle), error))
        }
    }

    fn complete(&self, id: &str, handle: WorkflowHandle, permit: OwnedSemaphorePermit) {
        let done = self.transition(id, ManagedStatus::Done, |entry| {
            entry.handle = Some(handle.clone());
        });
        drop(permit);
        if !done {
            return;
        }

        log_workflow_operation("run_workflow", Some(handle.name()), Some(id), "done", None);
        if let Some(observer) = self.observer(id) {
            notify("on_complete", id, || observer.on_complete(id, &handle));
        }
        self.settle(id);
    }

    fn fail(
        &self,
        id: &str,
        handle: Option<WorkflowHandle>,
        error: &DataformError,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let failed = self.transition(id, ManagedStatus::Failed, |entry| {
            if let Some(handle) = handle {
                entry.handle = Some(handle);
            }
            entry.last_error = Some(error.to_string());
        });
        drop(permit);
        if !failed {
            return;
        }

        log_error("workflow_manager", "run_workflow", &error.to_string(), Some(id));
        let Some((observer, latest)) = self
            .entries
            .get(id)
            .map(|record| (record.observer.clone(), record.snapshot.handle.clone()))
        else {
            return;
        };
        notify("on_error", id, || observer.on_error(id, latest.as_ref(), error));
        self.settle(id);
    }

    /// Sleep out the retry delay, then re-queue; shutdown fails the entry instead
    async fn retry_later(&self, id: String) {
        tokio::select! {
            _ = tokio::time::sleep(self.retry_policy.retry_delay) => {
                if self.queue.send(id.clone()).is_err() {
                    self.fail(&id, None, &DataformError::ManagerShutdown, None);
                }
            }
            _ = self.shutdown.wait_for_shutdown() => {
                self.fail(&id, None, &DataformError::ManagerShutdown, None);
            }
        }
    }
}

/// Admit queued entries in order, one permit per running attempt
async fn dispatch_loop(inner: Arc<ManagerInner>, mut queue: mpsc::UnboundedReceiver<String>) {
    debug!("Workflow dispatcher started");
    loop {
        let id = tokio::select! {
            biased;
            _ = inner.shutdown.wait_for_shutdown() => break,
            next = queue.recv() => match next {
                Some(id) => id,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = inner.shutdown.wait_for_shutdown() => {
                inner.fail(&id, None, &DataformError::ManagerShutdown, None);
                break;
            }
            permit = inner.slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    inner.fail(&id, None, &DataformError::ManagerShutdown, None);
                    break;
                }
            },
        };

        let worker = tokio::spawn(run_attempt(inner.clone(), id, permit));
        inner.track(worker);
    }

    // Anything still queued will never run
    queue.close();
    while let Ok(id) = queue.try_recv() {
        inner.fail(&id, None, &DataformError::ManagerShutdown, None);
    }
    debug!("Workflow dispatcher stopped");
}

/// One physical attempt of an entry, holding its slot while RUNNING
async fn run_attempt(inner: Arc<ManagerInner>, id: String, permit: OwnedSemaphorePermit) {
    let Some(attempt) = inner.begin_attempt(&id) else {
        return;
    };
    info!(
        entry_id = %id,
        attempt = attempt.number,
        execution_id = %attempt.execution_id,
        "Starting workflow attempt"
    );

    match inner.execute(&id, &attempt).await {
        Ok(handle) => inner.complete(&id, handle, permit),
        Err((handle, error)) => {
            let retries_used = inner
                .snapshot(&id)
                .map(|entry| entry.retries_used)
                .unwrap_or_default();
            if !inner.retry_policy.should_retry(&error, retries_used) {
                inner.fail(&id, handle, &error, Some(permit));
                return;
            }

            let requeued = inner.transition(&id, ManagedStatus::Queued, |entry| {
                entry.retries_used += 1;
                entry.last_error = Some(error.to_string());
                if let Some(handle) = handle {
                    entry.handle = Some(handle);
                }
            });
            drop(permit);
            if requeued {
                warn!(
                    entry_id = %id,
                    attempt = attempt.number,
                    retry = retries_used + 1,
                    max_retries = inner.retry_policy.max_retries,
                    delay_secs = inner.retry_policy.retry_delay.as_secs(),
                    error = %error,
                    "Workflow attempt failed, retrying"
                );
                inner.retry_later(id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryDataformClient;
    use crate::config::DataformConfig;

    fn manager(config: ManagerConfig) -> WorkflowManager {
        let client = Arc::new(InMemoryDataformClient::new());
        let service = Arc::new(WorkflowService::new(
            DataformConfig::new("p", "r").unwrap(),
            client,
        ));
        WorkflowManager::new(service, config).unwrap()
    }

    #[test]
    fn test_new_requires_runtime() {
        let client = Arc::new(InMemoryDataformClient::new());
        let service = Arc::new(WorkflowService::new(
            DataformConfig::new("p", "r").unwrap(),
            client,
        ));
        let result = WorkflowManager::new(service, ManagerConfig::default());
        assert!(matches!(result, Err(DataformError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let client = Arc::new(InMemoryDataformClient::new());
        let service = Arc::new(WorkflowService::new(
            DataformConfig::new("p", "r").unwrap(),
            client,
        ));
        let config = ManagerConfig {
            max_concurrent_workflows: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            WorkflowManager::new(service, config),
            Err(DataformError::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_validation() {
        let manager = manager(ManagerConfig::default());

        let zero_timeout =
            manager.run_workflow(ManagedRunRequest::new().with_timeout(Duration::ZERO));
        assert!(matches!(zero_timeout, Err(DataformError::InvalidArgument(_))));

        let empty_id = manager.run_workflow(ManagedRunRequest::new().with_execution_id(""));
        assert!(matches!(empty_id, Err(DataformError::InvalidArgument(_))));

        let generated = manager.run_workflow(ManagedRunRequest::new()).unwrap();
        assert!(generated.starts_with("workflow-"));

        manager
            .run_workflow(ManagedRunRequest::new().with_execution_id("dup"))
            .unwrap();
        let duplicate = manager.run_workflow(ManagedRunRequest::new().with_execution_id("dup"));
        assert!(matches!(duplicate, Err(DataformError::InvalidArgument(_))));

        manager.shutdown(Duration::from_secs(600)).await;
        let after = manager.run_workflow(ManagedRunRequest::new());
        assert!(matches!(after, Err(DataformError::ManagerShutdown)));
    }

    #[tokio::test]
    async fn test_wait_for_unknown_entry() {
        let manager = manager(ManagerConfig::default());
        assert!(matches!(
            manager.wait_for_workflow("missing").await,
            Err(DataformError::NotFound { .. })
        ));
        assert!(manager.get_workflow("missing").is_none());
    }
}
