use parking_lot::Mutex;

use dataform_core::orchestration::{WorkflowHandle, WorkflowObserver};
use dataform_core::DataformError;

/// One observer callback, as seen by `RecordingObserver`
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Started {
        id: String,
        workflow: Option<String>,
    },
    Completed { id: String, workflow: String },
    Failed {
        id: String,
        workflow: Option<String>,
        error: DataformError,
    },
}

/// Records every callback in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
    panic_on_start: bool,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer whose `on_start` panics after recording
    pub fn panicking() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            panic_on_start: true,
        }
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    pub fn starts(&self, entry_id: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ObservedEvent::Started { id, .. } if id == entry_id))
            .count()
    }

    pub fn completions(&self, entry_id: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ObservedEvent::Completed { id, .. } if id == entry_id))
            .count()
    }

    pub fn errors(&self, entry_id: &str) -> Vec<DataformError> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ObservedEvent::Failed { id, error, .. } if id == entry_id => Some(error),
                _ => None,
            })
            .collect()
    }

    /// Entry ids in the order their first attempt started
    pub fn start_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        for event in self.events() {
            if let ObservedEvent::Started { id, .. } = event {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
        }
        order
    }
}

impl WorkflowObserver for RecordingObserver {
    fn on_start(&self, entry_id: &str, workflow: Option<&WorkflowHandle>) {
        self.events.lock().push(ObservedEvent::Started {
            id: entry_id.to_string(),
            workflow: workflow.map(|workflow| workflow.name().to_string()),
        });
        if self.panic_on_start {
            panic!("observer failure for {entry_id}");
        }
    }

    fn on_complete(&self, entry_id: &str, workflow: &WorkflowHandle) {
        self.events.lock().push(ObservedEvent::Completed {
            id: entry_id.to_string(),
            workflow: workflow.name().to_string(),
        });
    }

    fn on_error(&self, entry_id: &str, workflow: Option<&WorkflowHandle>, error: &DataformError) {
        self.events.lock().push(ObservedEvent::Failed {
            id: entry_id.to_string(),
            workflow: workflow.map(|workflow| workflow.name().to_string()),
            error: error.clone(),
        });
    }
}
