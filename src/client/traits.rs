//! # Dataform Client Trait
//!
//! The remote API seen from this crate. Implementations own transport,
//! authentication and field mapping; everything above this trait only deals in
//! `models` records and `DataformError`.

use async_trait::async_trait;

use crate::error::DataformResult;
use crate::models::{
    CompilationRequest, InvocationRequest, ListInvocationsRequest, WorkflowInvocation,
};

/// Operations consumed from the Dataform workflow-invocation API.
///
/// Implementations must report transient transport failures as
/// `DataformError::RemoteUnavailable` and missing resources as
/// `DataformError::NotFound`, since callers decide retries from those variants.
#[async_trait]
pub trait DataformClient: Send + Sync {
    /// Compile the repository; returns the compilation result resource name
    async fn create_compilation_result(&self, request: CompilationRequest)
        -> DataformResult<String>;

    /// Start an invocation of a compilation result
    async fn create_workflow_invocation(
        &self,
        request: InvocationRequest,
    ) -> DataformResult<WorkflowInvocation>;

    /// Read the current record of an invocation
    async fn get_workflow_invocation(&self, name: &str) -> DataformResult<WorkflowInvocation>;

    /// List invocations under a repository, honouring `page_size` and `order_by`
    async fn list_workflow_invocations(
        &self,
        request: ListInvocationsRequest,
    ) -> DataformResult<Vec<WorkflowInvocation>>;

    /// Name used in logs
    fn client_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
