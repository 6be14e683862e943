//! NavigationController - the "current position" cursor
//!
//! Holds only identifiers into the graph. Every move is checked against the
//! graph first; an unknown id is an error, never a silent no-op.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::graph::TimelineGraph;
use crate::node::NodeId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineState {
    pub current_node_id: NodeId,
    /// Visited path. Append-only; duplicates allowed; replaced only by a jump.
    pub history: Vec<NodeId>,
    /// Display emphasis only.
    pub explored_branches: BTreeSet<NodeId>,
}

impl TimelineState {
    pub fn at_root() -> Self {
        let root = NodeId::root();
        Self {
            current_node_id: root.clone(),
            history: vec![root.clone()],
            explored_branches: BTreeSet::from([root]),
        }
    }
}

impl Default for TimelineState {
    fn default() -> Self {
        Self::at_root()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    state: TimelineState,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a restored state after checking every id resolves in `graph`.
    pub fn from_state(graph: &TimelineGraph, state: TimelineState) -> Result<Self> {
        graph.lookup(state.current_node_id.as_str())?;
        for id in state.history.iter().chain(state.explored_branches.iter()) {
            graph.lookup(id.as_str())?;
        }
        Ok(Self { state })
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn current(&self) -> &NodeId {
        &self.state.current_node_id
    }

    pub fn can_go_back(&self) -> bool {
        self.state.history.len() > 1
    }

    /// Moves the cursor and appends to the path log, without deduplication.
    pub fn navigate(&mut self, graph: &TimelineGraph, id: &str) -> Result<()> {
        let node = graph.lookup(id)?;
        self.advance(node.id.clone());
        Ok(())
    }

    /// Moves the cursor and restarts the path log at `id`.
    pub fn jump_to_timeline(&mut self, graph: &TimelineGraph, id: &str) -> Result<()> {
        let id = graph.lookup(id)?.id.clone();
        self.state.history = vec![id.clone()];
        self.state.explored_branches.insert(id.clone());
        self.state.current_node_id = id;
        Ok(())
    }

    /// Navigates to the second-most-recent history entry.
    ///
    /// This is a regular `navigate`: the entry is appended, nothing is
    /// popped. Repeated calls therefore toggle between the last two entries.
    pub fn back(&mut self, graph: &TimelineGraph) -> Result<NodeId> {
        if !self.can_go_back() {
            return Err(TimelineError::NoPreviousEntry);
        }
        let previous = self.state.history[self.state.history.len() - 2].clone();
        self.navigate(graph, previous.as_str())?;
        Ok(previous)
    }

    pub fn reset(&mut self) {
        self.state = TimelineState::at_root();
    }

    /// Unchecked move, for ids the caller has just inserted into the graph.
    pub(crate) fn advance(&mut self, id: NodeId) {
        self.state.history.push(id.clone());
        self.state.explored_branches.insert(id.clone());
        self.state.current_node_id = id;
    }
}
