//! Chain replication invariant monitor.
//!
//! This crate implements a passive observer that checks global consistency
//! of a head-to-tail replica chain using only the snapshots replicas
//! broadcast about themselves.
//!
//! # Invariants
//!
//! For every adjacent pair `(i, i+1)` of the chain whose observations are
//! known:
//!
//! ```text
//! HIST(i+1) <= HIST(i)                    (update propagation)
//! HIST(i)   == merge(HIST(i+1), SENT(i))  (in-process requests)
//! ```
//!
//! Both comparisons are pointwise over the overlapping prefix of the two
//! sequences; positions past the shorter sequence are not compared.
//!
//! # Components
//!
//! - [`InvariantMonitor`] - Sub-state machine that drives the checks
//! - [`ConsistencyStore`] - Last observed history and sent sequence per replica
//! - [`sequence`] - Sortedness, prefix comparison and bounded merge

pub mod sequence;
mod state;
mod store;

pub use sequence::{ScratchBuffer, SCRATCH_CAPACITY};
pub use state::{InvariantMonitor, MonitorStats, ObservationReport};
pub use store::ConsistencyStore;
