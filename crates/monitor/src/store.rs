//! Last observed history and sent sequence per replica.

use chainwatch_types::{NodeId, SeqId};
use std::collections::HashMap;

/// Per-replica observations.
///
/// Every update fully supersedes the previous entry for that replica; old
/// and new values are never merged.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyStore {
    /// Committed update ids, as last observed.
    history: HashMap<NodeId, Vec<SeqId>>,
    /// Update ids forwarded but not yet acknowledged, as last observed.
    sent: HashMap<NodeId, Vec<SeqId>>,
}

impl ConsistencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every observation.
    pub fn clear(&mut self) {
        self.history.clear();
        self.sent.clear();
    }

    /// Replace the committed history of a replica.
    pub fn replace_history(&mut self, server: NodeId, history: Vec<SeqId>) {
        self.history.insert(server, history);
    }

    /// Replace the sent sequence of a replica.
    pub fn replace_sent(&mut self, server: NodeId, sent: Vec<SeqId>) {
        self.sent.insert(server, sent);
    }

    /// Last observed history of a replica.
    pub fn history(&self, server: NodeId) -> Option<&[SeqId]> {
        self.history.get(&server).map(Vec::as_slice)
    }

    /// Last observed sent sequence of a replica.
    pub fn sent(&self, server: NodeId) -> Option<&[SeqId]> {
        self.sent.get(&server).map(Vec::as_slice)
    }

    /// Whether a history has been observed for the replica.
    pub fn has_history(&self, server: NodeId) -> bool {
        self.history.contains_key(&server)
    }

    /// Number of replicas with a recorded history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Number of replicas with a recorded sent sequence.
    pub fn sent_len(&self) -> usize {
        self.sent.len()
    }
}
