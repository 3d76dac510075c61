#![allow(dead_code)]

pub mod observers;
pub mod strategies;

pub use observers::*;

use std::sync::Arc;
use std::time::Duration;

use dataform_core::client::InMemoryDataformClient;
use dataform_core::config::{DataformConfig, ManagerConfig};
use dataform_core::orchestration::{WorkflowManager, WorkflowService};
use dataform_core::InvocationState;

pub const TEST_PROJECT: &str = "test-project";
pub const TEST_REPO: &str = "test-repo";

pub fn test_config() -> DataformConfig {
    DataformConfig::new(TEST_PROJECT, TEST_REPO).expect("valid test config")
}

/// Manager settings with short intervals, for paused-clock tests
pub fn fast_manager_config() -> ManagerConfig {
    ManagerConfig {
        max_retries: 2,
        retry_delay: Duration::from_secs(5),
        max_concurrent_workflows: 2,
        poll_interval: Duration::from_secs(1),
        timeout: Duration::from_secs(60),
        ..ManagerConfig::default()
    }
}

pub fn service_with(client: Arc<InMemoryDataformClient>) -> Arc<WorkflowService> {
    Arc::new(WorkflowService::new(test_config(), client))
}

pub fn manager_with(client: Arc<InMemoryDataformClient>, config: ManagerConfig) -> WorkflowManager {
    WorkflowManager::new(service_with(client), config).expect("manager starts")
}

/// Script that runs for `polls` reads and then ends in `last`
pub fn script(polls: usize, last: InvocationState) -> Vec<InvocationState> {
    let mut states = vec![InvocationState::Running; polls];
    states.push(last);
    states
}
