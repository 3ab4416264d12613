use std::sync::{Arc, Mutex};

/// Shared, ordered log of labels, for asserting the order in which
/// scheduled actions ran.
#[derive(Debug, Clone, Default)]
pub struct FiringLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl FiringLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An action that appends `label` when it runs.
    pub fn recorder(&self, label: impl Into<String>) -> impl FnOnce() + Send + 'static {
        let entries = Arc::clone(&self.entries);
        let label = label.into();
        move || entries.lock().unwrap().push(label)
    }

    pub fn push(&self, label: impl Into<String>) {
        self.entries.lock().unwrap().push(label.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
