//! Core types for chainwatch state machines.
//!
//! This crate provides the foundational types for the reactive architecture:
//!
//! - [`Event`]: All possible inputs to the state machines
//! - [`Action`]: All possible outputs from the state machines
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`StateMachine`] / [`SubStateMachine`]: The traits state machines implement
//! - [`PingSink`]: One-way observation channel for pings
//!
//! # Architecture
//!
//! The core is built on a simple event-driven model:
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner (simulation or production) which:
//! 1. Delivers events to the state machine
//! 2. Executes the returned actions (pings, timers, notifications)
//! 3. Converts collaborator replies back into events

mod action;
mod event;
mod message;
mod sink;
mod traits;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use message::OutboundMessage;
pub use sink::{NoopPingSink, PingSink};
pub use traits::{StateMachine, SubStateMachine};

/// Type alias for timer identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    /// Failure detector round timer: ping timeout in SendPing, round
    /// interval in Reset.
    PingRound,
}
