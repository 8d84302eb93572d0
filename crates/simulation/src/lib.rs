//! Deterministic simulation for the failure detector and invariant monitor.
//!
//! The runner plays every external collaborator the state machines rely on:
//!
//! - **Timer**: `StartTimer` schedules a `Timeout`; `CancelTimer` answers
//!   with `CancelSuccess`, or with `CancelFailure` when the timer wins the
//!   race (injected with a configurable probability)
//! - **Monitored nodes**: answer pings with `Pong` unless crashed
//! - **Network**: latency with jitter, packet loss and partitions, FIFO per
//!   link
//! - **Clients and ping sink**: record everything they receive
//!
//! All randomness comes from a seeded `ChaCha8Rng`. Given the same seed and
//! the same schedule, a run produces identical results.

mod config;
mod event_queue;
mod network;
mod runner;

pub use config::SimulationConfig;
pub use event_queue::EventKey;
pub use network::{Endpoint, NetworkConfig, SimulatedNetwork};
pub use runner::{
    FailureNotice, RecordingPingSink, SimulationReport, SimulationRunner, SimulationStats,
    ViolationRecord,
};
