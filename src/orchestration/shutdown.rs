//! Cooperative stop signal shared by the manager, its dispatcher and workers.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Raised once, observed by any number of tasks.
///
/// Backed by a `watch` channel so a task that starts waiting after the signal
/// was raised still returns immediately.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Raise the signal; later calls are no-ops
    pub fn request_shutdown(&self) {
        if !self.sender.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once the signal has been raised
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns once raised.
        let _ = receiver.wait_for(|raised| *raised).await;
    }
}
