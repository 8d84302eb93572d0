//! Core types for chainwatch.
//!
//! This crate provides the foundational types shared by the invariant
//! monitor, the failure detector and their runners:
//!
//! - **Identifiers**: [`NodeId`], [`ClientId`], [`DetectorId`], [`SeqId`]
//! - **Topology**: [`ChainTopology`], the head-to-tail replica order
//! - **Observations**: [`SentLog`], the in-flight send record replicas report
//! - **Violations**: [`Violation`], the monitor's correctness signals
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod topology;
mod violation;

pub use identifiers::{ClientId, DetectorId, NodeId, SeqId};
pub use topology::{ChainTopology, TopologyError};
pub use violation::{InvariantKind, Violation};

use serde::{Deserialize, Serialize};

/// One entry of a replica's sent log: an update forwarded downstream but not
/// yet acknowledged as committed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentLog {
    /// Sequence id of the forwarded update.
    pub next_seq_id: SeqId,
}

impl SentLog {
    /// Create a sent-log entry.
    pub fn new(next_seq_id: SeqId) -> Self {
        Self { next_seq_id }
    }
}

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Build a sent log from raw sequence ids, preserving order.
    pub fn sent_log(ids: &[SeqId]) -> Vec<SentLog> {
        ids.iter().copied().map(SentLog::new).collect()
    }
}
