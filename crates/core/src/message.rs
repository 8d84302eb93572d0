//! Outbound message types for node communication.

use chainwatch_types::DetectorId;

/// Messages a failure detector sends to monitored nodes.
///
/// The runner handles the actual delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Liveness probe. The node is expected to answer with `Event::Pong`.
    Ping { from: DetectorId },
}

impl OutboundMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Ping { .. } => "Ping",
        }
    }
}
