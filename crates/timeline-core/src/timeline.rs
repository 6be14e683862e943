//! Timeline - the single owner of a conversation tree and its cursor
//!
//! All mutation goes through here. Every operation completes before it
//! returns, so a caller never sees a new node paired with a stale cursor.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::TimelineGraph;
use crate::layout::{layout_timeline, LayoutConfig, TimelineLayout};
use crate::message::Message;
use crate::navigation::{NavigationController, TimelineState};
use crate::node::{Node, NodeId, NodeMetadata};
use crate::transcript::get_transcript;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineConfig {
    pub default_system_prompt: String,
    /// Root's system prompt is editable while the node count is at most this.
    pub prompt_lock_threshold: usize,
    pub allow_root_branch: bool,
    pub layout: LayoutConfig,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prompt_lock_threshold: 2,
            allow_root_branch: false,
            layout: LayoutConfig::default(),
        }
    }
}

/// Plain-data form of a timeline, for persistence collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineSnapshot {
    #[serde(flatten)]
    pub graph: TimelineGraph,
    pub state: TimelineState,
    #[serde(default)]
    pub config: TimelineConfig,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    graph: TimelineGraph,
    navigation: NavigationController,
    config: TimelineConfig,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(TimelineConfig::default())
    }
}

impl Timeline {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            graph: TimelineGraph::new(config.default_system_prompt.clone()),
            navigation: NavigationController::new(),
            config,
        }
    }

    /// Rebuilds a timeline from a snapshot, rejecting broken trees and
    /// cursors that point at missing nodes.
    pub fn restore(snapshot: TimelineSnapshot) -> Result<Self> {
        snapshot.graph.validate()?;
        let navigation = NavigationController::from_state(&snapshot.graph, snapshot.state)?;
        Ok(Self {
            graph: snapshot.graph,
            navigation,
            config: snapshot.config,
        })
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            graph: self.graph.clone(),
            state: self.navigation.state().clone(),
            config: self.config.clone(),
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn graph(&self) -> &TimelineGraph {
        &self.graph
    }

    pub fn state(&self) -> &TimelineState {
        self.navigation.state()
    }

    pub fn current_node_id(&self) -> &NodeId {
        self.navigation.current()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn lookup(&self, id: &str) -> Result<&Node> {
        self.graph.lookup(id)
    }

    pub fn children(&self, id: &str) -> Result<Vec<&Node>> {
        self.graph.lookup(id)?;
        Ok(self.graph.children(id))
    }

    /// Extends the current position and moves the cursor onto the new node.
    pub fn append(
        &mut self,
        messages: Vec<Message>,
        metadata: Option<NodeMetadata>,
    ) -> Result<NodeId> {
        let parent = self.navigation.current().clone();
        self.append_at(parent.as_str(), messages, metadata)
    }

    /// `append` anchored at an explicit parent instead of the cursor.
    ///
    /// Used by the turn workflow, whose anchor is fixed before the remote
    /// call and must not follow cursor moves made while it waits.
    pub fn append_at(
        &mut self,
        parent_id: &str,
        messages: Vec<Message>,
        metadata: Option<NodeMetadata>,
    ) -> Result<NodeId> {
        let id = self.graph.attach(parent_id, messages, |_, messages| {
            metadata.unwrap_or_else(|| NodeMetadata::main_for(messages))
        })?;
        self.navigation.advance(id.clone());
        log::debug!("appended node {} under {}", id, parent_id);
        Ok(id)
    }

    /// Forks from any existing node. The cursor stays where it is.
    pub fn branch(&mut self, parent_id: &str, messages: Vec<Message>) -> Result<NodeId> {
        let id = self
            .graph
            .branch(parent_id, messages, self.config.allow_root_branch)?;
        log::debug!("branched node {} from {}", id, parent_id);
        Ok(id)
    }

    /// Merges the listed nodes' own messages into a new node. The cursor
    /// stays where it is.
    pub fn merge(&mut self, node_ids: &[NodeId]) -> Result<NodeId> {
        let id = self.graph.merge(node_ids)?;
        log::debug!("merged {} nodes into {}", node_ids.len(), id);
        Ok(id)
    }

    pub fn navigate(&mut self, id: &str) -> Result<()> {
        self.navigation.navigate(&self.graph, id)
    }

    pub fn jump_to_timeline(&mut self, id: &str) -> Result<()> {
        self.navigation.jump_to_timeline(&self.graph, id)
    }

    pub fn back(&mut self) -> Result<NodeId> {
        self.navigation.back(&self.graph)
    }

    pub fn can_go_back(&self) -> bool {
        self.navigation.can_go_back()
    }

    /// Back to a lone root holding the configured default system prompt.
    pub fn reset(&mut self) {
        self.graph = TimelineGraph::new(self.config.default_system_prompt.clone());
        self.navigation.reset();
    }

    pub fn is_prompt_locked(&self) -> bool {
        self.graph.node_count() > self.config.prompt_lock_threshold
    }

    pub fn update_root_system_content(&mut self, content: impl Into<String>) -> Result<()> {
        self.graph
            .update_root_system_content(content, self.config.prompt_lock_threshold)
    }

    pub fn transcript(&self, node_id: &str, recursive: bool) -> Result<Vec<Message>> {
        get_transcript(&self.graph, node_id, recursive)
    }

    pub fn layout(&self) -> Result<TimelineLayout> {
        layout_timeline(
            &self.graph,
            self.navigation.current().as_str(),
            &self.config.layout,
        )
    }
}
