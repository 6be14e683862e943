use std::sync::Arc;

use timeline_core::Storage;

/// Configuration for a session's turn workflow.
#[derive(Clone, Default)]
pub struct TurnConfig {
    /// Prefix for log lines and key for persisted files.
    pub session_id: String,
    /// Optional storage for persisting committed turns
    pub storage: Option<Arc<dyn Storage>>,
}

impl TurnConfig {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            storage: None,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }
}
