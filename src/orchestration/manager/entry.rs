//! Managed workflow entries and their point-in-time snapshots.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::observer::WorkflowObserver;
use crate::orchestration::handle::WorkflowHandle;
use crate::state_machine::ManagedStatus;

/// Snapshot of one workflow tracked by `WorkflowManager`
#[derive(Debug, Clone)]
pub struct ManagedWorkflowEntry {
    pub id: String,
    /// Execution id sent with every attempt; retries reuse it
    pub execution_id: String,
    pub status: ManagedStatus,
    /// Latest handle recorded by the manager; absent until an invocation exists
    pub handle: Option<WorkflowHandle>,
    pub retries_used: u32,
    /// Physical run attempts started
    pub attempts: u32,
    pub last_error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ManagedWorkflowEntry {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Entry counts by status plus free concurrency slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    pub available_slots: usize,
    pub max_concurrent_workflows: usize,
}

impl ManagerStats {
    pub fn total(&self) -> usize {
        self.queued + self.running + self.done + self.failed
    }

    pub(crate) fn count(&mut self, status: ManagedStatus) {
        match status {
            ManagedStatus::Queued => self.queued += 1,
            ManagedStatus::Running => self.running += 1,
            ManagedStatus::Done => self.done += 1,
            ManagedStatus::Failed => self.failed += 1,
        }
    }
}

/// Per-run settings fixed at submission
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunSettings {
    pub full_refresh: bool,
    pub timeout: Duration,
}

/// Table row: public snapshot plus manager-private bookkeeping
pub(crate) struct EntryRecord {
    pub snapshot: ManagedWorkflowEntry,
    pub sequence: u64,
    pub settings: RunSettings,
    pub observer: Arc<dyn WorkflowObserver>,
    /// Flipped to `true` once the entry is terminal and its observer has run
    pub settled: watch::Sender<bool>,
}

impl EntryRecord {
    pub fn new(
        id: String,
        sequence: u64,
        settings: RunSettings,
        observer: Arc<dyn WorkflowObserver>,
    ) -> Self {
        let now = Utc::now();
        let (settled, _) = watch::channel(false);
        Self {
            snapshot: ManagedWorkflowEntry {
                execution_id: id.clone(),
                id,
                status: ManagedStatus::Queued,
                handle: None,
                retries_used: 0,
                attempts: 0,
                last_error: None,
                submitted_at: now,
                updated_at: now,
            },
            sequence,
            settings,
            observer,
            settled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let mut stats = ManagerStats::default();
        for status in [
            ManagedStatus::Queued,
            ManagedStatus::Running,
            ManagedStatus::Done,
            ManagedStatus::Done,
            ManagedStatus::Failed,
        ] {
            stats.count(status);
        }
        assert_eq!(stats.done, 2);
        assert_eq!(stats.total(), 5);
    }
}
