use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use timeline_core::{JsonlStorage, Storage, Timeline, TimelineConfig};
use timeline_llm::{CompletionProvider, OpenAICompatProvider};
use timeline_loop::{TurnConfig, TurnWorkflow};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{ApiError, Result};
use crate::session_store::SessionStore;

/// One session's timeline, the workflow that takes turns on it, and the
/// store both persist through.
#[derive(Clone)]
pub struct SessionHandle {
    pub timeline: Arc<Mutex<Timeline>>,
    pub workflow: TurnWorkflow,
    pub store: Arc<SessionStore>,
}

/// Ids that cannot name a stored session are reported as missing sessions.
pub(crate) fn storage_error(session_id: &str, error: io::Error) -> ApiError {
    if error.kind() == io::ErrorKind::InvalidInput {
        ApiError::SessionNotFound(session_id.to_string())
    } else {
        ApiError::Storage(error)
    }
}

pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    pub storage: Arc<JsonlStorage>,
    pub llm: Arc<dyn CompletionProvider>,
    pub timeline_config: TimelineConfig,
}

impl AppState {
    pub async fn new(config: &ServerConfig) -> std::io::Result<Self> {
        let data_dir = config.data_dir();
        log::info!("Initializing storage at: {:?}", data_dir);
        let storage = JsonlStorage::new(&data_dir);
        storage.init().await?;

        log::info!(
            "Creating completion provider with base URL: {} and model: {}",
            config.llm_base_url(),
            config.model()
        );
        if config.api_key.is_none() {
            log::warn!("No LLM API key configured; turns will fail until one is set");
        }
        let llm = OpenAICompatProvider::new(config.api_key.clone().unwrap_or_default())
            .with_base_url(config.llm_base_url())
            .with_model(config.model())
            .with_site(config.site_url.clone(), config.site_name.clone());

        Ok(Self::with_provider(
            Arc::new(llm),
            storage,
            config.timeline.clone(),
        ))
    }

    pub fn with_provider(
        llm: Arc<dyn CompletionProvider>,
        storage: JsonlStorage,
        timeline_config: TimelineConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage: Arc::new(storage),
            llm,
            timeline_config,
        }
    }

    fn open(&self, session_id: &str, timeline: Timeline) -> SessionHandle {
        let timeline = Arc::new(Mutex::new(timeline));
        let store = Arc::new(SessionStore::new(self.storage.clone()));
        let workflow = TurnWorkflow::new(
            timeline.clone(),
            self.llm.clone(),
            TurnConfig::new(session_id).with_storage(store.clone()),
        );
        SessionHandle {
            timeline,
            workflow,
            store,
        }
    }

    pub async fn create_session(&self, system_prompt: Option<String>) -> (String, SessionHandle) {
        let session_id = Uuid::new_v4().to_string();
        let mut config = self.timeline_config.clone();
        if let Some(prompt) = system_prompt
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty())
        {
            config.default_system_prompt = prompt;
        }

        let timeline = Timeline::new(config);
        let snapshot = timeline.snapshot();
        let handle = self.open(&session_id, timeline);
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());
        if let Err(e) = handle.store.save_snapshot(&session_id, &snapshot).await {
            log::warn!("[{}] Failed to save new session: {}", session_id, e);
        }
        log::info!("[{}] Session created", session_id);

        (session_id, handle)
    }

    /// Memory first, then storage.
    pub async fn session(&self, session_id: &str) -> Result<SessionHandle> {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return Ok(handle.clone());
        }

        let snapshot = self
            .storage
            .load_snapshot(session_id)
            .await
            .map_err(|e| storage_error(session_id, e))?
            .ok_or_else(|| ApiError::SessionNotFound(session_id.to_string()))?;
        let timeline = Timeline::restore(snapshot)
            .map_err(|e| ApiError::CorruptSession(session_id.to_string(), e))?;
        log::info!("[{}] Session loaded from storage", session_id);

        let handle = self.open(session_id, timeline);
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert(handle)
            .clone())
    }

    pub async fn remove_session(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(session_id)
    }
}
