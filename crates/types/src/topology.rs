//! Linear chain topology.

use crate::NodeId;
use std::collections::HashSet;

/// Errors raised when building a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// A node appears more than once, which would make its neighbours ambiguous.
    #[error("node {0} appears more than once in the chain")]
    DuplicateNode(NodeId),
}

/// Ordered head-to-tail list of replicas.
///
/// Index `i` has successor `i + 1` and predecessor `i - 1`. Writes enter at
/// the head (index 0) and propagate towards the tail. The whole order is
/// replaced on reconfiguration; observations recorded against the old order
/// are kept by their owner and simply get new neighbours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainTopology {
    servers: Vec<NodeId>,
}

impl ChainTopology {
    /// Create a chain from an ordered server list.
    ///
    /// Returns an error if any node appears twice.
    pub fn new(servers: Vec<NodeId>) -> Result<Self, TopologyError> {
        let mut seen = HashSet::with_capacity(servers.len());
        for server in &servers {
            if !seen.insert(*server) {
                return Err(TopologyError::DuplicateNode(*server));
            }
        }
        Ok(Self { servers })
    }

    /// Number of replicas in the chain.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether the chain has no replicas.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// The ordered servers, head first.
    pub fn servers(&self) -> &[NodeId] {
        &self.servers
    }

    /// First replica of the chain.
    pub fn head(&self) -> Option<NodeId> {
        self.servers.first().copied()
    }

    /// Last replica of the chain.
    pub fn tail(&self) -> Option<NodeId> {
        self.servers.last().copied()
    }

    /// Position of a node in the chain.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.servers.iter().position(|s| *s == node)
    }

    /// Whether the node is part of the chain.
    pub fn contains(&self, node: NodeId) -> bool {
        self.position(node).is_some()
    }

    /// The replica directly after `node` (towards the tail).
    ///
    /// Returns `None` for the tail and for nodes outside the chain.
    pub fn successor(&self, node: NodeId) -> Option<NodeId> {
        let index = self.position(node)?;
        self.servers.get(index + 1).copied()
    }

    /// The replica directly before `node` (towards the head).
    ///
    /// Returns `None` for the head and for nodes outside the chain.
    pub fn predecessor(&self, node: NodeId) -> Option<NodeId> {
        let index = self.position(node)?;
        index.checked_sub(1).map(|prev| self.servers[prev])
    }

    /// Adjacent `(predecessor, successor)` pairs, head first.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.servers.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chain(ids: &[u64]) -> ChainTopology {
        ChainTopology::new(ids.iter().copied().map(NodeId).collect()).unwrap()
    }

    #[test]
    fn test_neighbours() {
        let chain = make_chain(&[10, 20, 30]);

        assert_eq!(chain.successor(NodeId(10)), Some(NodeId(20)));
        assert_eq!(chain.successor(NodeId(20)), Some(NodeId(30)));
        assert_eq!(chain.successor(NodeId(30)), None);

        assert_eq!(chain.predecessor(NodeId(10)), None);
        assert_eq!(chain.predecessor(NodeId(20)), Some(NodeId(10)));
        assert_eq!(chain.predecessor(NodeId(30)), Some(NodeId(20)));
    }

    #[test]
    fn test_unknown_node_has_no_neighbours() {
        let chain = make_chain(&[1, 2]);
        assert_eq!(chain.successor(NodeId(9)), None);
        assert_eq!(chain.predecessor(NodeId(9)), None);
        assert!(!chain.contains(NodeId(9)));
    }

    #[test]
    fn test_head_tail_and_links() {
        let chain = make_chain(&[1, 2, 3]);
        assert_eq!(chain.head(), Some(NodeId(1)));
        assert_eq!(chain.tail(), Some(NodeId(3)));
        assert_eq!(
            chain.links().collect::<Vec<_>>(),
            vec![(NodeId(1), NodeId(2)), (NodeId(2), NodeId(3))]
        );

        let single = make_chain(&[7]);
        assert_eq!(single.links().count(), 0);
        assert_eq!(single.successor(NodeId(7)), None);
        assert_eq!(single.predecessor(NodeId(7)), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ChainTopology::new(vec![NodeId(1), NodeId(2), NodeId(1)]);
        assert_eq!(result, Err(TopologyError::DuplicateNode(NodeId(1))));
    }

    #[test]
    fn test_empty_chain() {
        let chain = ChainTopology::default();
        assert!(chain.is_empty());
        assert_eq!(chain.head(), None);
        assert_eq!(chain.tail(), None);
    }
}
