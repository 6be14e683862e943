use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use timeline_core::{Message, Node, NodeId, NodeMetadata, Timeline, TimelineEvent};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: Option<NodeMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub parent_id: NodeId,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub node_ids: Vec<NodeId>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct NodeCreated {
    pub node: Node,
    pub current_node_id: NodeId,
}

impl NodeCreated {
    fn of(timeline: &Timeline, node_id: &NodeId) -> Result<Self> {
        Ok(Self {
            node: timeline.lookup(node_id.as_str())?.clone(),
            current_node_id: timeline.current_node_id().clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct NodeView<'a> {
    #[serde(flatten)]
    node: &'a Node,
    children: Vec<&'a NodeId>,
}

pub async fn lookup(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (session_id, node_id) = path.into_inner();
    let handle = state.session(&session_id).await?;
    let timeline = handle.timeline.lock().await;

    let node = timeline.lookup(&node_id)?;
    let children = timeline
        .children(&node_id)?
        .into_iter()
        .map(|child| &child.id)
        .collect();
    Ok(HttpResponse::Ok().json(NodeView { node, children }))
}

pub async fn transcript(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<TranscriptQuery>,
) -> Result<HttpResponse> {
    let (session_id, node_id) = path.into_inner();
    let handle = state.session(&session_id).await?;
    let messages = handle
        .timeline
        .lock()
        .await
        .transcript(&node_id, query.recursive)?;

    Ok(HttpResponse::Ok().json(json!({
        "node_id": node_id,
        "recursive": query.recursive,
        "messages": messages,
    })))
}

pub async fn append(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AppendRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let AppendRequest { messages, metadata } = req.into_inner();

    let mut timeline = handle.timeline.lock().await;
    let parent_id = timeline.current_node_id().clone();
    let node_id = timeline.append(messages, metadata)?;
    let created = NodeCreated::of(&timeline, &node_id)?;
    log::debug!("[{}] Appended node {}", session_id, node_id);
    handle
        .store
        .record_or_warn(
            &session_id,
            TimelineEvent::NodeAppended { node_id, parent_id },
            &timeline.snapshot(),
        )
        .await;

    Ok(HttpResponse::Created().json(created))
}

pub async fn branch(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<BranchRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let BranchRequest { parent_id, messages } = req.into_inner();

    let mut timeline = handle.timeline.lock().await;
    let node_id = timeline.branch(parent_id.as_str(), messages)?;
    let created = NodeCreated::of(&timeline, &node_id)?;
    log::debug!("[{}] Branched {} from {}", session_id, node_id, parent_id);
    handle
        .store
        .record_or_warn(
            &session_id,
            TimelineEvent::BranchCreated { node_id, parent_id },
            &timeline.snapshot(),
        )
        .await;

    Ok(HttpResponse::Created().json(created))
}

pub async fn merge(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<MergeRequest>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let sources = req.into_inner().node_ids;

    let mut timeline = handle.timeline.lock().await;
    let node_id = timeline.merge(&sources)?;
    let created = NodeCreated::of(&timeline, &node_id)?;
    log::debug!("[{}] Merged {} nodes into {}", session_id, sources.len(), node_id);
    handle
        .store
        .record_or_warn(
            &session_id,
            TimelineEvent::TimelinesMerged { node_id, sources },
            &timeline.snapshot(),
        )
        .await;

    Ok(HttpResponse::Created().json(created))
}

pub async fn layout(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let handle = state.session(&session_id).await?;
    let layout = handle.timeline.lock().await.layout()?;
    Ok(HttpResponse::Ok().json(layout))
}
