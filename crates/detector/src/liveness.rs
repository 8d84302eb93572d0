//! Per-round liveness bookkeeping.

use chainwatch_types::{ClientId, NodeId};
use std::collections::BTreeSet;

/// Monitored, alive and responded node sets plus the registered clients.
///
/// `responses` is always a subset of `alive`, and `alive` of `monitored`.
/// Nodes only leave `alive` by being declared failed; they come back only
/// when the monitored set is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessState {
    monitored: BTreeSet<NodeId>,
    alive: BTreeSet<NodeId>,
    responses: BTreeSet<NodeId>,
    attempts: u32,
    clients: BTreeSet<ClientId>,
}

impl LivenessState {
    /// Create state monitoring `nodes`, all presumed alive.
    pub fn new(nodes: BTreeSet<NodeId>) -> Self {
        Self {
            alive: nodes.clone(),
            monitored: nodes,
            ..Default::default()
        }
    }

    /// Replace the monitored set. Every node in it is presumed alive again;
    /// responses from nodes outside it are dropped.
    pub fn reconfigure(&mut self, nodes: BTreeSet<NodeId>) {
        self.alive = nodes.clone();
        self.monitored = nodes;
        let alive = &self.alive;
        self.responses.retain(|node| alive.contains(node));
    }

    pub fn monitored(&self) -> &BTreeSet<NodeId> {
        &self.monitored
    }

    pub fn alive(&self) -> &BTreeSet<NodeId> {
        &self.alive
    }

    pub fn responses(&self) -> &BTreeSet<NodeId> {
        &self.responses
    }

    pub fn clients(&self) -> &BTreeSet<ClientId> {
        &self.clients
    }

    /// Attempts made in the current round.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_alive(&self, node: NodeId) -> bool {
        self.alive.contains(&node)
    }

    /// Record a pong. Returns `false` (and records nothing) if the node is
    /// not alive.
    pub fn record_response(&mut self, node: NodeId) -> bool {
        if !self.alive.contains(&node) {
            return false;
        }
        self.responses.insert(node);
        true
    }

    /// Whether every alive node answered this round.
    pub fn all_responded(&self) -> bool {
        self.responses.len() == self.alive.len()
    }

    /// Alive nodes that have not answered this round, in id order.
    pub fn unresponded(&self) -> Vec<NodeId> {
        self.alive.difference(&self.responses).copied().collect()
    }

    /// Count one more attempt and return the new total.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Start a fresh round.
    pub fn reset_round(&mut self) {
        self.attempts = 0;
        self.responses.clear();
    }

    /// Remove a node from the alive set. Returns `false` if it was not alive.
    pub fn mark_failed(&mut self, node: NodeId) -> bool {
        self.responses.remove(&node);
        self.alive.remove(&node)
    }

    pub fn register_client(&mut self, client: ClientId) -> bool {
        self.clients.insert(client)
    }

    pub fn unregister_client(&mut self, client: ClientId) -> bool {
        self.clients.remove(&client)
    }
}
