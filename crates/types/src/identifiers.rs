//! Opaque identifiers for chain replicas, failure-detector clients and detectors.
//!
//! Identities are small value-type handles rather than references to live
//! actors. This keeps every event and action serializable and makes
//! comparisons stable across runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a replica or monitored endpoint.
///
/// `Ord` is derived only so that sets of nodes iterate deterministically.
/// The position of a node in a chain is defined by
/// [`ChainTopology`](crate::ChainTopology), not by this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identity of a client registered for failure notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

/// Identity of a failure detector, carried on every ping so nodes know where to reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DetectorId(pub u64);

/// Update sequence id committed or forwarded by a replica.
pub type SeqId = u64;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "detector-{}", self.0)
    }
}
