#![allow(clippy::doc_markdown)] // Allow technical terms like BigQuery, GCP in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dataform Core Rust
//!
//! Run and monitor Google Cloud Dataform workflow invocations from Rust.
//!
//! ## Overview
//!
//! The crate wraps the Dataform workflow-invocation API behind three layers:
//! a [`WorkflowHandle`] that tracks one invocation until it finishes, a
//! [`WorkflowService`] that compiles and starts invocations for a configured
//! repository, and a [`WorkflowManager`] that runs many workflows concurrently
//! with retry and lifecycle callbacks.
//!
//! The remote API is reached through the [`DataformClient`] trait. An
//! in-memory implementation ships for tests, demos and dry runs;
//! authentication and transport belong to the client implementation.
//!
//! ## Module Organization
//!
//! - [`config`] - Repository and manager configuration, file and env loading
//! - [`client`] - The remote API trait and the in-memory client
//! - [`models`] - Invocation records and request types
//! - [`orchestration`] - Handle, service, manager and shutdown signal
//! - [`state_machine`] - Invocation states, entry statuses and transition guards
//! - [`error`] - Structured error handling
//! - [`logging`] - `tracing` subscriber setup and structured helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dataform_core::client::InMemoryDataformClient;
//! use dataform_core::config::DataformConfig;
//! use dataform_core::orchestration::{RunWorkflowRequest, WorkflowService};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> dataform_core::DataformResult<()> {
//! let config = DataformConfig::new("my-project", "analytics")?;
//! let service = WorkflowService::new(config, Arc::new(InMemoryDataformClient::new()));
//!
//! let workflow = service
//!     .run_workflow(
//!         RunWorkflowRequest::new()
//!             .with_wait(true)
//!             .with_poll_interval(Duration::from_secs(5)),
//!     )
//!     .await?;
//! println!("{workflow} took {:?}s", workflow.duration_seconds());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use client::{DataformClient, InMemoryDataformClient};
pub use config::{ConfigLoader, DataformConfig, DataformSettings, ManagerConfig};
pub use error::{DataformError, DataformResult};
pub use models::{InvocationTiming, WorkflowInvocation};
pub use orchestration::{
    ManagedRunRequest, ManagedWorkflowEntry, ManagerStats, RetryPolicy, RunWorkflowRequest,
    ShutdownSignal, WorkflowCallbacks, WorkflowHandle, WorkflowManager, WorkflowObserver,
    WorkflowService,
};
pub use state_machine::{InvocationState, ManagedStatus};
