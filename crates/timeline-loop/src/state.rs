use serde::{Deserialize, Serialize};
use timeline_core::NodeId;

/// Where a turn's committed node attaches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// Extend the current node.
    #[default]
    Continue,
    /// Fork from the current node's parent, re-asking its question.
    Branch,
    /// Fork from an explicitly chosen earlier node.
    BranchFrom(NodeId),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRequest {
    pub content: String,
    #[serde(default)]
    pub mode: TurnMode,
}

impl TurnRequest {
    pub fn new(content: impl Into<String>, mode: TurnMode) -> Self {
        Self {
            content: content.into(),
            mode,
        }
    }

    pub fn continue_with(content: impl Into<String>) -> Self {
        Self::new(content, TurnMode::Continue)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingCompletion {
        draft: String,
        anchor: NodeId,
    },
    Committed {
        node_id: NodeId,
    },
    Failed {
        draft: String,
        reason: String,
    },
}

impl TurnState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TurnState::AwaitingCompletion { .. })
    }
}
