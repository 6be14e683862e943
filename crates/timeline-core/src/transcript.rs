//! HistoryResolver - linear transcripts for a node

use crate::error::Result;
use crate::graph::TimelineGraph;
use crate::message::{Message, Role};

/// The messages for `node_id`.
///
/// Non-recursive: a copy of the node's own messages. Recursive: every
/// ancestor's messages concatenated root-first, ending with the node's own.
/// The recursive form is what gets sent to the completion provider.
pub fn get_transcript(graph: &TimelineGraph, node_id: &str, recursive: bool) -> Result<Vec<Message>> {
    if !recursive {
        return Ok(graph.lookup(node_id)?.messages.clone());
    }
    let chain = graph.ancestors(node_id)?;
    Ok(chain
        .iter()
        .rev()
        .flat_map(|node| node.messages.iter().cloned())
        .collect())
}

/// Each `user` message immediately followed by an `assistant` reply.
pub fn conversation_pairs(messages: &[Message]) -> Vec<(&Message, &Message)> {
    messages
        .windows(2)
        .filter(|pair| pair[0].role == Role::User && pair[1].role == Role::Assistant)
        .map(|pair| (&pair[0], &pair[1]))
        .collect()
}

/// Cuts `messages` just after the reply that follows the `pair_index`-th
/// user message. An index past the last user message keeps everything.
pub fn truncate_to_pair(messages: &[Message], pair_index: usize) -> &[Message] {
    let cutoff = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::User)
        .nth(pair_index)
        .map(|(idx, _)| (idx + 2).min(messages.len()));
    match cutoff {
        Some(end) => &messages[..end],
        None => messages,
    }
}
