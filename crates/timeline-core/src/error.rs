use thiserror::Error;

use crate::node::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Invalid merge: {0}")]
    InvalidMerge(String),

    #[error("System prompt is locked once the timeline holds {node_count} nodes")]
    PromptLocked { node_count: usize },

    #[error("A node needs at least one message")]
    EmptyMessages,

    #[error("Branching from the root node is disabled")]
    RootBranchDisallowed,

    #[error("No previous history entry to go back to")]
    NoPreviousEntry,

    #[error("Node is not connected to root: {0}")]
    DetachedNode(NodeId),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
