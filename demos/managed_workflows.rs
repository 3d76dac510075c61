//! Run several workflows through a `WorkflowManager` with callbacks, retries
//! and a concurrency cap, then shut down gracefully.
//!
//! ```bash
//! DATAFORM_LOG_FORMAT=json cargo run --example managed_workflows
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use dataform_core::client::InMemoryDataformClient;
use dataform_core::config::{ConfigLoader, DataformConfig, ManagerConfig};
use dataform_core::constants::manager::DEFAULT_SHUTDOWN_GRACE;
use dataform_core::logging::init_structured_logging;
use dataform_core::orchestration::{
    ManagedRunRequest, WorkflowCallbacks, WorkflowManager, WorkflowService,
};
use dataform_core::InvocationState;

#[tokio::main]
async fn main() -> Result<()> {
    init_structured_logging();

    let (config, manager_config) = match ConfigLoader::from_process_env().load() {
        Ok(settings) => (settings.dataform, settings.manager),
        Err(error) => {
            info!(error = %error, "No Dataform settings found, using demo configuration");
            (
                DataformConfig::new("demo-project", "demo-repo")?,
                ManagerConfig {
                    max_retries: 1,
                    retry_delay: Duration::from_secs(2),
                    max_concurrent_workflows: 2,
                    poll_interval: Duration::from_secs(1),
                    ..ManagerConfig::default()
                },
            )
        }
    };

    let client = Arc::new(InMemoryDataformClient::new());
    // The second invocation fails once, so its entry retries
    client.push_script(vec![InvocationState::Running, InvocationState::Succeeded]);
    client.push_script(vec![InvocationState::Running, InvocationState::Failed]);
    client.push_script(vec![InvocationState::Running, InvocationState::Succeeded]);

    let service = Arc::new(WorkflowService::new(config, client));
    let manager = WorkflowManager::new(service, manager_config).context("starting manager")?;

    let callbacks = Arc::new(
        WorkflowCallbacks::new()
            .with_on_start(|id, workflow| match workflow {
                Some(workflow) => println!("[{id}] started {}", workflow.short_name()),
                None => println!("[{id}] attempt could not create an invocation"),
            })
            .with_on_complete(|id, workflow| {
                println!(
                    "[{id}] completed in {:.1}s",
                    workflow.duration_seconds().unwrap_or_default()
                )
            })
            .with_on_error(|id, _, error| println!("[{id}] failed: {error}")),
    );

    let mut ids = Vec::new();
    for name in ["daily-sales", "inventory", "marketing"] {
        let id = manager.run_workflow(
            ManagedRunRequest::new()
                .with_execution_id(name)
                .with_observer(callbacks.clone()),
        )?;
        ids.push(id);
    }
    println!("Submitted {} workflows: {:?}", ids.len(), manager.stats());

    for id in &ids {
        let entry = manager.wait_for_workflow(id).await?;
        println!(
            "{} -> {} after {} attempt(s)",
            entry.id, entry.status, entry.attempts
        );
    }

    let stats = manager.shutdown(DEFAULT_SHUTDOWN_GRACE).await;
    println!(
        "Done: {}, failed: {}, total: {}",
        stats.done,
        stats.failed,
        stats.total()
    );
    Ok(())
}
