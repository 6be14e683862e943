use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use timeline_core::{NodeId, Timeline, TimelineEvent, TimelineState};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub node_id: NodeId,
}

#[derive(Debug, Serialize)]
pub struct NavigationView {
    #[serde(flatten)]
    pub state: TimelineState,
    pub can_go_back: bool,
}

impl NavigationView {
    fn of(timeline: &Timeline) -> Self {
        Self {
            state: timeline.state().clone(),
            can_go_back: timeline.can_go_back(),
        }
    }
}

pub async fn navigate(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<NavigateRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let node_id = req.into_inner().node_id;

    let mut timeline = handle.timeline.lock().await;
    timeline.navigate(node_id.as_str())?;
    handle
        .store
        .record_or_warn(&session_id, TimelineEvent::Navigated { node_id }, &timeline.snapshot())
        .await;

    Ok(HttpResponse::Ok().json(NavigationView::of(&timeline)))
}

pub async fn jump(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<NavigateRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let node_id = req.into_inner().node_id;

    let mut timeline = handle.timeline.lock().await;
    timeline.jump_to_timeline(node_id.as_str())?;
    log::debug!("[{}] Jumped to {}", session_id, node_id);
    handle
        .store
        .record_or_warn(&session_id, TimelineEvent::Jumped { node_id }, &timeline.snapshot())
        .await;

    Ok(HttpResponse::Ok().json(NavigationView::of(&timeline)))
}

pub async fn back(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;

    let mut timeline = handle.timeline.lock().await;
    let node_id = timeline.back()?;
    handle
        .store
        .record_or_warn(&session_id, TimelineEvent::WentBack { node_id }, &timeline.snapshot())
        .await;

    Ok(HttpResponse::Ok().json(NavigationView::of(&timeline)))
}
