//! Event types for the reactive state machines.

use chainwatch_types::{ClientId, NodeId, SentLog, SeqId};
use std::collections::BTreeSet;

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    Internal = 0,

    /// Timer events: expiry and cancellation outcomes from the timer.
    Timer = 1,

    /// Network events: replies from monitored nodes.
    Network = 2,

    /// Client events: configuration, registration and replica observations.
    Client = 3,
}

/// All possible events the monitor and detector can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machines process events and return actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Invariant monitor inputs (priority: Client)
    // ═══════════════════════════════════════════════════════════════════════
    /// Install the chain and reset all recorded observations.
    ConfigureMonitor { servers: Vec<NodeId> },

    /// Replace the chain order only. Recorded observations are kept.
    UpdateServers { servers: Vec<NodeId> },

    /// A replica broadcast its committed history.
    HistoryObserved { server: NodeId, history: Vec<SeqId> },

    /// A replica broadcast its sent log (updates forwarded, not yet acknowledged).
    SentObserved {
        server: NodeId,
        sent_log: Vec<SentLog>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Failure detector configuration (priority: Client)
    // ═══════════════════════════════════════════════════════════════════════
    /// Set of nodes to monitor. The first one starts the detector; later
    /// ones replace the monitored set.
    ConfigureDetector { nodes: BTreeSet<NodeId> },

    /// Start delivering failure notifications to a client.
    RegisterClient { client: ClientId },

    /// Stop delivering failure notifications to a client.
    UnregisterClient { client: ClientId },

    // ═══════════════════════════════════════════════════════════════════════
    // Monitored node replies (priority: Network)
    // ═══════════════════════════════════════════════════════════════════════
    /// A node answered a ping.
    Pong { node: NodeId },

    // ═══════════════════════════════════════════════════════════════════════
    // Timer collaborator (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// The round timer expired.
    Timeout,

    /// A cancel request stopped the timer before it fired.
    CancelSuccess,

    /// A cancel request lost the race: the timer had already fired and its
    /// `Timeout` is on its way.
    CancelFailure,
}

impl Event {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::Timeout | Event::CancelSuccess | Event::CancelFailure => EventPriority::Timer,

            Event::Pong { .. } => EventPriority::Network,

            Event::ConfigureMonitor { .. }
            | Event::UpdateServers { .. }
            | Event::HistoryObserved { .. }
            | Event::SentObserved { .. }
            | Event::ConfigureDetector { .. }
            | Event::RegisterClient { .. }
            | Event::UnregisterClient { .. } => EventPriority::Client,
        }
    }

    /// Whether this event is addressed to the invariant monitor.
    pub fn is_monitor_event(&self) -> bool {
        matches!(
            self,
            Event::ConfigureMonitor { .. }
                | Event::UpdateServers { .. }
                | Event::HistoryObserved { .. }
                | Event::SentObserved { .. }
        )
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ConfigureMonitor { .. } => "ConfigureMonitor",
            Event::UpdateServers { .. } => "UpdateServers",
            Event::HistoryObserved { .. } => "HistoryObserved",
            Event::SentObserved { .. } => "SentObserved",
            Event::ConfigureDetector { .. } => "ConfigureDetector",
            Event::RegisterClient { .. } => "RegisterClient",
            Event::UnregisterClient { .. } => "UnregisterClient",
            Event::Pong { .. } => "Pong",
            Event::Timeout => "Timeout",
            Event::CancelSuccess => "CancelSuccess",
            Event::CancelFailure => "CancelFailure",
        }
    }
}
