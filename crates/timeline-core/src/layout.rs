//! LayoutEngine - projects the timeline tree onto 2D coordinates.
//!
//! Recomputed from scratch whenever the node set changes:
//! - level: breadth-first depth from root
//! - branch index: position inside the node's level, in discovery order
//!   (global per level, so unrelated subtrees at the same depth stack on
//!   one another)
//! - x from level, y from branch type and branch index
//!
//! Drag overrides belong to the view and never come back through here.

use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::graph::TimelineGraph;
use crate::node::{BranchType, Node, NodeId, ROOT_ID};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub base_x: f64,
    pub base_y: f64,
    pub horizontal_spacing: f64,
    pub vertical_spacing: f64,
    /// Vertical step between `main` nodes sharing a level.
    pub branch_offset: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_x: 400.0,
            base_y: 300.0,
            horizontal_spacing: 400.0,
            vertical_spacing: 300.0,
            branch_offset: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct NodePlacement {
    pub level: usize,
    pub branch_index: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LayoutEdge {
    pub parent: NodeId,
    pub child: NodeId,
    /// Both endpoints lie on the cursor's ancestor chain.
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineLayout {
    levels: Vec<Vec<NodeId>>,
    placements: IndexMap<NodeId, NodePlacement>,
    edges: Vec<LayoutEdge>,
    active_path: BTreeSet<NodeId>,
}

impl TimelineLayout {
    pub fn levels(&self) -> &[Vec<NodeId>] {
        &self.levels
    }

    pub fn placements(&self) -> &IndexMap<NodeId, NodePlacement> {
        &self.placements
    }

    pub fn placement(&self, node_id: &str) -> Option<&NodePlacement> {
        self.placements.get(node_id)
    }

    pub fn edges(&self) -> &[LayoutEdge] {
        &self.edges
    }

    pub fn active_path(&self) -> &BTreeSet<NodeId> {
        &self.active_path
    }

    pub fn is_on_active_path(&self, node_id: &str) -> bool {
        self.active_path.contains(node_id)
    }
}

pub fn layout_timeline(
    graph: &TimelineGraph,
    current_node_id: &str,
    config: &LayoutConfig,
) -> Result<TimelineLayout> {
    let levels = assign_levels(graph)?;

    let mut placements = IndexMap::with_capacity(graph.node_count());
    for (level, ids) in levels.iter().enumerate() {
        for (branch_index, id) in ids.iter().enumerate() {
            let node = graph.lookup(id.as_str())?;
            let (x, y) = coordinates(node, level, branch_index, config);
            placements.insert(
                id.clone(),
                NodePlacement {
                    level,
                    branch_index,
                    x,
                    y,
                },
            );
        }
    }

    let active_path: BTreeSet<NodeId> = graph
        .ancestors(current_node_id)?
        .into_iter()
        .map(|node| node.id.clone())
        .collect();

    let edges = graph
        .nodes()
        .filter_map(|node| {
            let parent = node.parent_id.as_ref()?;
            Some(LayoutEdge {
                parent: parent.clone(),
                child: node.id.clone(),
                active: active_path.contains(parent) && active_path.contains(&node.id),
            })
        })
        .collect();

    Ok(TimelineLayout {
        levels,
        placements,
        edges,
        active_path,
    })
}

/// Breadth-first from root. Every node must be reached.
fn assign_levels(graph: &TimelineGraph) -> Result<Vec<Vec<NodeId>>> {
    let mut children: HashMap<&str, Vec<&Node>> = HashMap::new();
    for node in graph.nodes() {
        if let Some(parent) = node.parent_id.as_ref() {
            children.entry(parent.as_str()).or_default().push(node);
        }
    }

    let root = graph.root()?;
    let mut levels: Vec<Vec<NodeId>> = Vec::new();
    let mut visited = 0usize;
    let mut queue = VecDeque::from([(root, 0usize)]);

    while let Some((node, level)) = queue.pop_front() {
        if levels.len() <= level {
            levels.push(Vec::new());
        }
        levels[level].push(node.id.clone());
        visited += 1;

        if let Some(kids) = children.get(node.id.as_str()) {
            queue.extend(kids.iter().map(|child| (*child, level + 1)));
        }
    }

    if visited != graph.node_count() {
        let placed: BTreeSet<&NodeId> = levels.iter().flatten().collect();
        let detached = graph
            .nodes()
            .find(|node| !placed.contains(&node.id))
            .map(|node| node.id.clone())
            .unwrap_or_else(|| NodeId::new(ROOT_ID));
        return Err(TimelineError::DetachedNode(detached));
    }

    Ok(levels)
}

fn coordinates(node: &Node, level: usize, branch_index: usize, config: &LayoutConfig) -> (f64, f64) {
    let x = config.base_x + level as f64 * config.horizontal_spacing;
    if node.id.is_root() {
        return (x, config.base_y);
    }
    let y = match node.metadata.branch_type {
        BranchType::Alternate => config.base_y + config.vertical_spacing * branch_index as f64,
        BranchType::Merged => config.base_y - config.vertical_spacing * 0.5,
        BranchType::Main => config.base_y + config.branch_offset * branch_index as f64,
    };
    (x, y)
}
