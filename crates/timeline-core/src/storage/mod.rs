//! Session persistence: one full snapshot plus an append-only event log
//! per session.

mod jsonl;

pub use jsonl::JsonlStorage;

use std::io;

use async_trait::async_trait;

use crate::event::TimelineEvent;
use crate::timeline::TimelineSnapshot;

const MAX_SESSION_ID_LEN: usize = 128;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Appends `event` to the session log, then replaces the stored
    /// snapshot with `snapshot`.
    async fn record(
        &self,
        session_id: &str,
        event: &TimelineEvent,
        snapshot: &TimelineSnapshot,
    ) -> io::Result<()>;

    /// Replaces the stored snapshot without logging an event.
    async fn save_snapshot(&self, session_id: &str, snapshot: &TimelineSnapshot) -> io::Result<()>;

    async fn load_snapshot(&self, session_id: &str) -> io::Result<Option<TimelineSnapshot>>;

    /// The session's event log in write order.
    async fn load_events(&self, session_id: &str) -> io::Result<Vec<TimelineEvent>>;

    /// Returns false when nothing was stored for the session.
    async fn delete_session(&self, session_id: &str) -> io::Result<bool>;
}

/// Session ids become file names, so only ASCII letters, digits, `-` and
/// `_` are accepted.
pub fn validate_session_id(session_id: &str) -> io::Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid session id: {:?}", session_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_must_be_plain_file_stems() {
        assert!(validate_session_id("3f2c9a1e-7b4d-4e0a-9c55-1d2e3f4a5b6c").is_ok());
        assert!(validate_session_id("s_1").is_ok());

        let too_long = "x".repeat(129);
        for bad in ["", "../etc/passwd", "a/b", "a.json", "spaced id", too_long.as_str()] {
            let err = validate_session_id(bad).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{bad:?}");
        }
    }
}
