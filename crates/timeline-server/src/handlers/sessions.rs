use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use timeline_core::{Storage, Timeline, TimelineEvent, TimelineSnapshot};

use crate::error::{ApiError, Result};
use crate::state::{storage_error, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SystemPromptRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    #[serde(flatten)]
    pub snapshot: TimelineSnapshot,
    pub prompt_locked: bool,
    pub can_go_back: bool,
}

impl SessionView {
    pub fn of(session_id: String, timeline: &Timeline) -> Self {
        Self {
            session_id,
            snapshot: timeline.snapshot(),
            prompt_locked: timeline.is_prompt_locked(),
            can_go_back: timeline.can_go_back(),
        }
    }
}

pub async fn create(
    state: web::Data<AppState>,
    req: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse> {
    let (session_id, handle) = state.create_session(req.into_inner().system_prompt).await;
    let timeline = handle.timeline.lock().await;
    Ok(HttpResponse::Created().json(SessionView::of(session_id, &timeline)))
}

pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let timeline = handle.timeline.lock().await;
    Ok(HttpResponse::Ok().json(SessionView::of(session_id, &timeline)))
}

pub async fn delete(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();

    let removed = state.remove_session(&session_id).await;
    let removed_from_memory = removed.is_some();

    // Holding the timeline lock waits out any in-progress write; closing the
    // store under it stops later ones.
    let _timeline = match removed.as_ref() {
        Some(handle) => {
            handle.workflow.stop().await;
            let timeline = handle.timeline.lock().await;
            handle.store.close();
            Some(timeline)
        }
        None => None,
    };

    let deleted_from_storage = state
        .storage
        .delete_session(&session_id)
        .await
        .map_err(|e| {
            log::error!("[{}] Failed to delete session from storage: {}", session_id, e);
            storage_error(&session_id, e)
        })?;

    if !(removed_from_memory || deleted_from_storage) {
        return Err(ApiError::SessionNotFound(session_id));
    }

    log::info!(
        "[{}] Session deleted (storage: {}, memory: {})",
        session_id,
        deleted_from_storage,
        removed_from_memory
    );
    Ok(HttpResponse::Ok().finish())
}

pub async fn reset(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;

    let mut timeline = handle.timeline.lock().await;
    timeline.reset();
    log::info!("[{}] Timeline reset", session_id);
    let view = SessionView::of(session_id.clone(), &timeline);
    handle
        .store
        .record_or_warn(&session_id, TimelineEvent::Reset, &view.snapshot)
        .await;

    Ok(HttpResponse::Ok().json(view))
}

pub async fn update_system_prompt(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<SystemPromptRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;

    let mut timeline = handle.timeline.lock().await;
    timeline.update_root_system_content(req.into_inner().content)?;
    let view = SessionView::of(session_id.clone(), &timeline);
    handle
        .store
        .record_or_warn(&session_id, TimelineEvent::SystemPromptUpdated, &view.snapshot)
        .await;

    Ok(HttpResponse::Ok().json(view))
}
