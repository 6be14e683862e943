use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{validate_session_id, Storage};
use crate::event::TimelineEvent;
use crate::timeline::TimelineSnapshot;

/// Files kept for one session under the storage root.
struct SessionFiles {
    /// `<id>.json`, the latest full snapshot.
    snapshot: PathBuf,
    /// `<id>.jsonl`, one `TimelineEvent` per line.
    events: PathBuf,
    /// `<id>.json.tmp`, renamed over `snapshot` once fully written.
    staging: PathBuf,
}

/// Filesystem storage: a snapshot file and an event log per session, all
/// directly under one root directory.
#[derive(Debug, Clone)]
pub struct JsonlStorage {
    root: PathBuf,
}

impl JsonlStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    fn files(&self, session_id: &str) -> io::Result<SessionFiles> {
        validate_session_id(session_id)?;
        Ok(SessionFiles {
            snapshot: self.root.join(format!("{session_id}.json")),
            events: self.root.join(format!("{session_id}.jsonl")),
            staging: self.root.join(format!("{session_id}.json.tmp")),
        })
    }

    /// A reader never sees a half-written snapshot: the new content lands
    /// in the staging file first and replaces the old one by rename.
    async fn replace_snapshot(files: &SessionFiles, snapshot: &TimelineSnapshot) -> io::Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        let mut staging = fs::File::create(&files.staging).await?;
        staging.write_all(&bytes).await?;
        staging.sync_all().await?;
        drop(staging);
        fs::rename(&files.staging, &files.snapshot).await
    }

    async fn append_event_line(files: &SessionFiles, event: &TimelineEvent) -> io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&files.events)
            .await?;
        log.write_all(&line).await?;
        log.flush().await
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

async fn remove_optional(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

#[async_trait]
impl Storage for JsonlStorage {
    async fn record(
        &self,
        session_id: &str,
        event: &TimelineEvent,
        snapshot: &TimelineSnapshot,
    ) -> io::Result<()> {
        let files = self.files(session_id)?;
        Self::append_event_line(&files, event).await?;
        Self::replace_snapshot(&files, snapshot).await
    }

    async fn save_snapshot(&self, session_id: &str, snapshot: &TimelineSnapshot) -> io::Result<()> {
        let files = self.files(session_id)?;
        Self::replace_snapshot(&files, snapshot).await
    }

    async fn load_snapshot(&self, session_id: &str) -> io::Result<Option<TimelineSnapshot>> {
        let files = self.files(session_id)?;
        match read_optional(&files.snapshot).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    async fn load_events(&self, session_id: &str) -> io::Result<Vec<TimelineEvent>> {
        let files = self.files(session_id)?;
        let Some(content) = read_optional(&files.events).await? else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(error) => log::warn!(
                    "[{}] Skipping unreadable event on line {}: {}",
                    session_id,
                    number + 1,
                    error
                ),
            }
        }
        Ok(events)
    }

    async fn delete_session(&self, session_id: &str) -> io::Result<bool> {
        let files = self.files(session_id)?;
        remove_optional(&files.staging).await?;
        let snapshot = remove_optional(&files.snapshot).await?;
        let events = remove_optional(&files.events).await?;
        Ok(snapshot || events)
    }
}
