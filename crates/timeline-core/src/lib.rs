//! timeline-core - branching conversation timelines
//!
//! - `graph` - the node arena and its append/branch/merge primitives
//! - `navigation` - the cursor, visited path and explored set
//! - `transcript` - root-first message history for a node
//! - `layout` - 2D placement of the tree for display
//! - `timeline` - the service object that owns all of the above
//! - `storage` - optional snapshot/event persistence

pub mod error;
pub mod event;
pub mod graph;
pub mod layout;
pub mod message;
pub mod navigation;
pub mod node;
pub mod storage;
pub mod timeline;
pub mod transcript;

pub use error::{Result, TimelineError};
pub use event::TimelineEvent;
pub use graph::TimelineGraph;
pub use layout::{layout_timeline, LayoutConfig, LayoutEdge, NodePlacement, TimelineLayout};
pub use message::{Message, Role};
pub use navigation::{NavigationController, TimelineState};
pub use node::{title_from, BranchType, Node, NodeId, NodeMetadata, ROOT_ID};
pub use storage::{validate_session_id, JsonlStorage, Storage};
pub use timeline::{Timeline, TimelineConfig, TimelineSnapshot, DEFAULT_SYSTEM_PROMPT};
pub use transcript::{conversation_pairs, get_transcript, truncate_to_pair};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
