//! Ping observation sink.

use chainwatch_types::NodeId;

/// One-way, non-blocking observer of pings issued by a failure detector.
///
/// The detector never waits on the sink. Runners forward
/// [`Action::ReportPing`](crate::Action::ReportPing) here; deployments that
/// have no external safety check use [`NoopPingSink`].
pub trait PingSink {
    /// Called once for every ping sent to `node`.
    fn on_ping(&mut self, node: NodeId);
}

/// Sink that discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPingSink;

impl PingSink for NoopPingSink {
    fn on_ping(&mut self, _node: NodeId) {}
}
