use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Reserved identifier of the single parentless node.
pub const ROOT_ID: &str = "root";

/// Characters of message content used for a generated title.
const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used for generated universe labels.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BranchType {
    #[default]
    Main,
    Alternate,
    Merged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMetadata {
    pub universe: String,
    pub branch_type: BranchType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub title: String,
}

impl NodeMetadata {
    pub fn new(universe: impl Into<String>, branch_type: BranchType, title: impl Into<String>) -> Self {
        Self {
            universe: universe.into(),
            branch_type,
            tags: BTreeSet::new(),
            title: title.into(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Metadata `append` uses when the caller supplies none.
    pub fn main_for(messages: &[Message]) -> Self {
        let title = messages
            .first()
            .map(|m| title_from(&m.content))
            .unwrap_or_else(|| "New node".to_string());
        Self::new("main", BranchType::Main, title)
    }

    pub(crate) fn alternate_for(id: &NodeId, messages: &[Message]) -> Self {
        let title = messages
            .last()
            .map(|m| title_from(&m.content))
            .unwrap_or_else(|| "New branch".to_string());
        Self::new(format!("branch-{}", id.short()), BranchType::Alternate, title)
    }
}

pub fn title_from(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_CHARS).collect();
    title.push_str("...");
    title
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub messages: Vec<Message>,
    pub parent_id: Option<NodeId>,
    pub metadata: NodeMetadata,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
