use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// One line of a session's event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    NodeAppended {
        node_id: NodeId,
        parent_id: NodeId,
    },

    BranchCreated {
        node_id: NodeId,
        parent_id: NodeId,
    },

    TimelinesMerged {
        node_id: NodeId,
        sources: Vec<NodeId>,
    },

    Navigated {
        node_id: NodeId,
    },

    Jumped {
        node_id: NodeId,
    },

    WentBack {
        node_id: NodeId,
    },

    Reset,

    SystemPromptUpdated,

    /// A turn ended without committing a node.
    TurnFailed {
        anchor: NodeId,
        message: String,
    },
}
