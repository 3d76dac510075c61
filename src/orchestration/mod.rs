//! # Workflow Orchestration
//!
//! Running Dataform workflows on top of a `DataformClient`.
//!
//! ## Core Components
//!
//! - **WorkflowHandle**: one remote invocation; refresh, predicates and wait-with-poll
//! - **WorkflowService**: compile, invoke, look up and list invocations for one repository
//! - **WorkflowManager**: many workflows under a concurrency cap, with retry and observers
//! - **ShutdownSignal**: cooperative stop flag shared by the manager's tasks

pub mod handle;
pub mod manager;
pub mod service;
pub mod shutdown;

pub use handle::{clamp_poll_interval, WorkflowHandle};
pub use manager::{
    ManagedRunRequest, ManagedWorkflowEntry, ManagerStats, NoopObserver, RetryPolicy,
    WorkflowCallbacks, WorkflowManager, WorkflowObserver,
};
pub use service::{RunWorkflowRequest, WorkflowService};
pub use shutdown::ShutdownSignal;
