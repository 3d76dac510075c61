//! # Data Models
//!
//! Records exchanged with the remote Dataform API.

pub mod invocation;
pub mod requests;

pub use invocation::{InvocationTiming, WorkflowInvocation};
pub use requests::{CompilationRequest, InvocationOptions, InvocationRequest, ListInvocationsRequest};
