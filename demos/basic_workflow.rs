//! Run a single Dataform workflow, wait for it, and list recent runs.
//!
//! Settings come from `DATAFORM_CONFIG` and the `GCP_PROJECT_ID` /
//! `DATAFORM_REPO` family of variables, falling back to demo values. The
//! workflow runs against the in-memory client.
//!
//! ```bash
//! GCP_PROJECT_ID=my-project DATAFORM_REPO=analytics cargo run --example basic_workflow
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use dataform_core::client::InMemoryDataformClient;
use dataform_core::config::{ConfigLoader, DataformConfig};
use dataform_core::constants::DEFAULT_LIST_LIMIT;
use dataform_core::logging::init_structured_logging;
use dataform_core::orchestration::{RunWorkflowRequest, WorkflowService};
use dataform_core::InvocationState;

fn load_config() -> Result<DataformConfig> {
    match ConfigLoader::from_process_env().load() {
        Ok(settings) => Ok(settings.dataform),
        Err(error) => {
            info!(error = %error, "No Dataform settings found, using demo configuration");
            DataformConfig::new("demo-project", "demo-repo").context("building demo configuration")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_structured_logging();

    let config = load_config()?;
    info!(config = %config, "Loaded configuration");

    let client = Arc::new(InMemoryDataformClient::new().with_default_script(vec![
        InvocationState::Running,
        InvocationState::Running,
        InvocationState::Succeeded,
    ]));
    let service = WorkflowService::new(config, client);

    let workflow = service
        .run_workflow(
            RunWorkflowRequest::new()
                .with_wait(true)
                .with_poll_interval(Duration::from_secs(1))
                .with_timeout(Duration::from_secs(60)),
        )
        .await
        .context("running workflow")?;

    println!("{workflow}");
    println!("  execution id: {}", workflow.execution_id().unwrap_or("-"));
    println!("  successful:   {}", workflow.is_successful());
    if let Some(seconds) = workflow.duration_seconds() {
        println!("  duration:     {seconds:.1}s");
    }

    let recent = service
        .list_recent_workflows(DEFAULT_LIST_LIMIT)
        .await
        .context("listing recent workflows")?;
    println!("Recent workflows:");
    for workflow in recent {
        println!("  {} started {:?}", workflow, workflow.start_time());
    }

    Ok(())
}
