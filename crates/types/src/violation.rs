//! Correctness signals raised by the chain invariant monitor.

use crate::SeqId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which chain invariant a failed comparison belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvariantKind {
    /// `HIST(i+1) <= HIST(i)`: a successor never commits ahead of its predecessor.
    UpdatePropagation,
    /// `HIST(i) == merge(HIST(i+1), SENT(i))`: committed history reconciles with
    /// what the successor holds plus what is still in flight.
    InProcessRequests,
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantKind::UpdatePropagation => write!(f, "update propagation"),
            InvariantKind::InProcessRequests => write!(f, "in-process requests"),
        }
    }
}

/// A fatal correctness signal for the system under test.
///
/// Violations carry the offending values. They are returned as `Err` when an
/// observation is rejected outright, and collected as plain values when an
/// individual neighbour check fails so that the remaining checks still run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Violation {
    /// An observation arrived before the monitor was given a chain.
    #[error("observation received before the monitor was configured")]
    NotConfigured,

    /// A sequence is not strictly increasing.
    #[error("sequence {sequence:?} is not strictly increasing at position {position}")]
    UnsortedSequence {
        /// The offending sequence.
        sequence: Vec<SeqId>,
        /// Index of the first element that is not greater than its predecessor.
        position: usize,
    },

    /// A pointwise comparison between two sequences failed.
    #[error("{kind} invariant violated at position {position}: {left:?} vs {right:?}")]
    InvariantViolated {
        /// Which invariant the comparison was checking.
        kind: InvariantKind,
        /// Left operand.
        left: Vec<SeqId>,
        /// Right operand.
        right: Vec<SeqId>,
        /// First position where the comparison failed.
        position: usize,
    },

    /// The bounded scratch buffer would have held more than `capacity` elements.
    #[error("scratch buffer exceeded its capacity of {capacity} elements")]
    ScratchOverflow {
        /// Maximum number of elements the buffer may hold.
        capacity: usize,
    },
}

impl Violation {
    /// Short label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Violation::NotConfigured => "not_configured",
            Violation::UnsortedSequence { .. } => "unsorted_sequence",
            Violation::InvariantViolated { .. } => "invariant_violated",
            Violation::ScratchOverflow { .. } => "scratch_overflow",
        }
    }
}
