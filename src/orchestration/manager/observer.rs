//! Lifecycle callbacks for managed workflows.
//!
//! Observers run on manager worker tasks. A panicking observer is caught and
//! logged; it never takes the worker down.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

use crate::error::DataformError;
use crate::orchestration::handle::WorkflowHandle;

/// Receives lifecycle events for managed workflows. Every method defaults to a no-op.
pub trait WorkflowObserver: Send + Sync {
    /// The entry moved to RUNNING for a new attempt. `workflow` is absent when
    /// the attempt failed before the remote invocation was created.
    fn on_start(&self, entry_id: &str, workflow: Option<&WorkflowHandle>) {
        let _ = (entry_id, workflow);
    }

    /// The entry finished with a successful invocation
    fn on_complete(&self, entry_id: &str, workflow: &WorkflowHandle) {
        let _ = (entry_id, workflow);
    }

    /// The entry failed for good. `workflow` is absent when no invocation was
    /// ever created.
    fn on_error(&self, entry_id: &str, workflow: Option<&WorkflowHandle>, error: &DataformError) {
        let _ = (entry_id, workflow, error);
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

type StartCallback = Box<dyn Fn(&str, Option<&WorkflowHandle>) + Send + Sync>;
type WorkflowCallback = Box<dyn Fn(&str, &WorkflowHandle) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&str, Option<&WorkflowHandle>, &DataformError) + Send + Sync>;

/// Closure-based observer
///
/// ```rust
/// use dataform_core::orchestration::WorkflowCallbacks;
///
/// let callbacks = WorkflowCallbacks::new()
///     .with_on_complete(|id, workflow| println!("{id} finished as {}", workflow.state()))
///     .with_on_error(|id, _, error| eprintln!("{id} failed: {error}"));
/// ```
#[derive(Default)]
pub struct WorkflowCallbacks {
    on_start: Option<StartCallback>,
    on_complete: Option<WorkflowCallback>,
    on_error: Option<ErrorCallback>,
}

impl fmt::Debug for WorkflowCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl WorkflowCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_start(
        mut self,
        callback: impl Fn(&str, Option<&WorkflowHandle>) + Send + Sync + 'static,
    ) -> Self {
        self.on_start = Some(Box::new(callback));
        self
    }

    pub fn with_on_complete(
        mut self,
        callback: impl Fn(&str, &WorkflowHandle) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn with_on_error(
        mut self,
        callback: impl Fn(&str, Option<&WorkflowHandle>, &DataformError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl WorkflowObserver for WorkflowCallbacks {
    fn on_start(&self, entry_id: &str, workflow: Option<&WorkflowHandle>) {
        if let Some(callback) = &self.on_start {
            callback(entry_id, workflow);
        }
    }

    fn on_complete(&self, entry_id: &str, workflow: &WorkflowHandle) {
        if let Some(callback) = &self.on_complete {
            callback(entry_id, workflow);
        }
    }

    fn on_error(&self, entry_id: &str, workflow: Option<&WorkflowHandle>, error: &DataformError) {
        if let Some(callback) = &self.on_error {
            callback(entry_id, workflow, error);
        }
    }
}

/// Run one observer hook, containing any panic
pub(crate) fn notify(hook: &'static str, entry_id: &str, call: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(call)) {
        error!(
            entry_id = %entry_id,
            hook,
            panic = %panic_message(panic.as_ref()),
            "Workflow observer panicked"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_notify_contains_panics() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        notify("on_start", "entry-1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("observer bug");
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callbacks_dispatch_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let callbacks = WorkflowCallbacks::new().with_on_error(move |id, workflow, error| {
            assert_eq!(id, "entry-1");
            assert!(workflow.is_none());
            assert_eq!(error, &DataformError::ManagerShutdown);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        callbacks.on_error("entry-1", None, &DataformError::ManagerShutdown);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
    }
}
