//! Action types for the reactive state machines.

use crate::{message::OutboundMessage, TimerId};
use chainwatch_types::{ClientId, NodeId, Violation};
use std::time::Duration;

/// Actions the state machines want to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and converts collaborator replies back into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// Send a message to a monitored node. A live node answers a ping with
    /// `Event::Pong`.
    SendToNode {
        node: NodeId,
        message: OutboundMessage,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Start a timer. Its expiry arrives as `Event::Timeout`.
    ///
    /// The duration is a hint: an abstract timer may fire at any time.
    StartTimer { id: TimerId, duration: Duration },

    /// Request cancellation. The timer answers with exactly one of
    /// `Event::CancelSuccess` or `Event::CancelFailure`.
    CancelTimer { id: TimerId },

    // ═══════════════════════════════════════════════════════════════════════
    // Notifications (fire-and-forget)
    // ═══════════════════════════════════════════════════════════════════════
    /// Tell a registered client that a node is presumed failed.
    NotifyFailure { client: ClientId, node: NodeId },

    /// Report a ping to the safety observation sink.
    ReportPing { node: NodeId },

    /// Report a correctness violation found by the invariant monitor.
    ReportViolation { violation: Violation },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendToNode { .. } => "SendToNode",
            Action::StartTimer { .. } => "StartTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::NotifyFailure { .. } => "NotifyFailure",
            Action::ReportPing { .. } => "ReportPing",
            Action::ReportViolation { .. } => "ReportViolation",
        }
    }
}
