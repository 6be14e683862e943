use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use timeline_core::{JsonlStorage, Storage, TimelineEvent, TimelineSnapshot};

/// One session's handle on the shared storage.
///
/// Callers write while holding the session's timeline lock, so the log and
/// snapshot follow mutation order. After `close`, writes are dropped: a
/// request that still holds the handle of a deleted session cannot bring
/// its files back.
pub struct SessionStore {
    storage: Arc<JsonlStorage>,
    closed: AtomicBool,
}

impl SessionStore {
    pub fn new(storage: Arc<JsonlStorage>) -> Self {
        Self {
            storage,
            closed: AtomicBool::new(false),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `record` with failures logged; memory stays authoritative.
    pub async fn record_or_warn(
        &self,
        session_id: &str,
        event: TimelineEvent,
        snapshot: &TimelineSnapshot,
    ) {
        if let Err(e) = self.record(session_id, &event, snapshot).await {
            log::warn!("[{}] Failed to persist {:?}: {}", session_id, event, e);
        }
    }
}

#[async_trait]
impl Storage for SessionStore {
    async fn record(
        &self,
        session_id: &str,
        event: &TimelineEvent,
        snapshot: &TimelineSnapshot,
    ) -> io::Result<()> {
        if self.is_closed() {
            log::debug!("[{}] Session closed, not persisting {:?}", session_id, event);
            return Ok(());
        }
        self.storage.record(session_id, event, snapshot).await
    }

    async fn save_snapshot(&self, session_id: &str, snapshot: &TimelineSnapshot) -> io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.storage.save_snapshot(session_id, snapshot).await
    }

    async fn load_snapshot(&self, session_id: &str) -> io::Result<Option<TimelineSnapshot>> {
        self.storage.load_snapshot(session_id).await
    }

    async fn load_events(&self, session_id: &str) -> io::Result<Vec<TimelineEvent>> {
        self.storage.load_events(session_id).await
    }

    async fn delete_session(&self, session_id: &str) -> io::Result<bool> {
        self.storage.delete_session(session_id).await
    }
}
