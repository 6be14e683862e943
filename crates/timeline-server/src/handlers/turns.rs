use actix_web::{web, HttpResponse};
use serde::Serialize;
use timeline_loop::TurnRequest;

use crate::error::Result;
use crate::handlers::nodes::NodeCreated;
use crate::state::AppState;

#[derive(Serialize)]
struct StopResponse {
    success: bool,
    message: String,
}

pub async fn submit(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<TurnRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    log::info!("[{}] Turn request received ({:?})", session_id, req.mode);

    let node = handle.workflow.submit(req.into_inner()).await?;

    Ok(HttpResponse::Created().json(NodeCreated {
        current_node_id: node.id.clone(),
        node,
    }))
}

pub async fn stop(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    log::info!("[{}] Stop request received", session_id);
    let handle = state.session(&session_id).await?;

    if handle.workflow.stop().await {
        Ok(HttpResponse::Ok().json(StopResponse {
            success: true,
            message: "Turn cancelled".to_string(),
        }))
    } else {
        log::warn!("[{}] No turn in flight", session_id);
        Ok(HttpResponse::NotFound().json(StopResponse {
            success: false,
            message: "No turn in flight".to_string(),
        }))
    }
}

pub async fn turn_state(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    Ok(HttpResponse::Ok().json(handle.workflow.state().await))
}
