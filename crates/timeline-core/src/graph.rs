//! TimelineGraph - id-keyed arena of conversation nodes
//!
//! Edges are parent pointers only. "Who are my children" is answered by
//! filtering on `parent_id`, never by a stored back-edge.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::message::{Message, Role};
use crate::node::{BranchType, Node, NodeId, NodeMetadata, ROOT_ID};

const ROOT_TITLE: &str = "System Configuration";
const MERGED_TITLE: &str = "Merged timeline";

/// Owns every node. Grows only; nothing is ever removed.
///
/// Insertion order is preserved and is the discovery order used by layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineGraph {
    nodes: IndexMap<NodeId, Node>,
}

impl TimelineGraph {
    /// A graph holding only `root`, whose single system message is `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let root = Node {
            id: NodeId::root(),
            messages: vec![Message::system(system_prompt)],
            parent_id: None,
            metadata: NodeMetadata::new("main", BranchType::Main, ROOT_TITLE),
        };
        let mut nodes = IndexMap::new();
        nodes.insert(root.id.clone(), root);
        Self { nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn lookup(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TimelineError::NodeNotFound(NodeId::new(id)))
    }

    pub fn root(&self) -> Result<&Node> {
        self.lookup(ROOT_ID)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.parent_id.as_ref().map(NodeId::as_str) == Some(id))
            .collect()
    }

    /// The chain from `id` up to root, starting with `id` itself.
    ///
    /// Walks at most `node_count` steps, so a corrupted parent chain is
    /// reported as `DetachedNode` instead of looping.
    pub fn ancestors(&self, id: &str) -> Result<Vec<&Node>> {
        let mut chain = vec![self.lookup(id)?];
        loop {
            let current = chain[chain.len() - 1];
            let Some(parent_id) = current.parent_id.as_ref() else {
                if current.id.is_root() {
                    return Ok(chain);
                }
                return Err(TimelineError::DetachedNode(NodeId::new(id)));
            };
            if chain.len() >= self.nodes.len() {
                return Err(TimelineError::DetachedNode(NodeId::new(id)));
            }
            let parent = self
                .nodes
                .get(parent_id)
                .ok_or_else(|| TimelineError::DetachedNode(NodeId::new(id)))?;
            chain.push(parent);
        }
    }

    /// Inserts a child of `parent_id`. `metadata` is built from the new id.
    pub(crate) fn attach<F>(
        &mut self,
        parent_id: &str,
        messages: Vec<Message>,
        metadata: F,
    ) -> Result<NodeId>
    where
        F: FnOnce(&NodeId, &[Message]) -> NodeMetadata,
    {
        if messages.is_empty() {
            return Err(TimelineError::EmptyMessages);
        }
        let parent = self.lookup(parent_id)?.id.clone();
        let id = NodeId::generate();
        let metadata = metadata(&id, &messages);
        let node = Node {
            id: id.clone(),
            messages,
            parent_id: Some(parent),
            metadata,
        };
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Forks an `alternate` child from any existing node.
    pub fn branch(
        &mut self,
        parent_id: &str,
        messages: Vec<Message>,
        allow_root: bool,
    ) -> Result<NodeId> {
        let parent = self.lookup(parent_id)?;
        if parent.id.is_root() && !allow_root {
            return Err(TimelineError::RootBranchDisallowed);
        }
        self.attach(parent_id, messages, NodeMetadata::alternate_for)
    }

    /// Synthesises a `merged` node from the listed nodes' own messages.
    ///
    /// The new node hangs off the first listed node's parent. Root is
    /// rejected because it has no parent to attach under.
    pub fn merge(&mut self, node_ids: &[NodeId]) -> Result<NodeId> {
        if node_ids.len() < 2 {
            return Err(TimelineError::InvalidMerge(format!(
                "need at least two nodes, got {}",
                node_ids.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(node_ids.len());
        for id in node_ids {
            if !seen.insert(id) {
                return Err(TimelineError::InvalidMerge(format!("duplicate node {id}")));
            }
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| TimelineError::InvalidMerge(format!("unknown node {id}")))?;
            if node.id.is_root() {
                return Err(TimelineError::InvalidMerge(
                    "the root node cannot be merged".to_string(),
                ));
            }
            sources.push(node);
        }

        let parent_id = match sources[0].parent_id.clone() {
            Some(parent) => parent,
            None => return Err(TimelineError::DetachedNode(sources[0].id.clone())),
        };
        let messages: Vec<Message> = sources
            .iter()
            .flat_map(|node| node.messages.iter().cloned())
            .collect();
        let tags: BTreeSet<String> = sources
            .iter()
            .flat_map(|node| node.metadata.tags.iter().cloned())
            .collect();

        self.attach(parent_id.as_str(), messages, move |id, _| NodeMetadata {
            universe: format!("merged-{}", id.short()),
            branch_type: BranchType::Merged,
            tags,
            title: MERGED_TITLE.to_string(),
        })
    }

    /// Replaces the content of root's system message in place.
    ///
    /// Rejected with `PromptLocked` once the graph holds more than
    /// `lock_threshold` nodes.
    pub fn update_root_system_content(
        &mut self,
        content: impl Into<String>,
        lock_threshold: usize,
    ) -> Result<()> {
        let node_count = self.nodes.len();
        if node_count > lock_threshold {
            return Err(TimelineError::PromptLocked { node_count });
        }
        let root = self
            .nodes
            .get_mut(ROOT_ID)
            .ok_or_else(|| TimelineError::NodeNotFound(NodeId::root()))?;
        let content = content.into();
        match root.messages.iter().position(|m| m.role == Role::System) {
            Some(idx) => {
                let replaced = root.messages[idx].with_content(content);
                root.messages[idx] = replaced;
            }
            None => root.messages.insert(0, Message::system(content)),
        }
        Ok(())
    }

    /// Checks the rooted-tree invariants on data that did not come through
    /// the mutation primitives (restored snapshots).
    pub fn validate(&self) -> Result<()> {
        let root = self.root()?;
        if root.parent_id.is_some() {
            return Err(TimelineError::DetachedNode(root.id.clone()));
        }
        for (key, node) in &self.nodes {
            if key != &node.id {
                return Err(TimelineError::DetachedNode(key.clone()));
            }
            if node.parent_id.is_none() && !node.id.is_root() {
                return Err(TimelineError::DetachedNode(node.id.clone()));
            }
            self.ancestors(node.id.as_str())?;
        }
        Ok(())
    }
}
