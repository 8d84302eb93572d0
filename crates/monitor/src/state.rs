//! InvariantMonitor sub-state machine.
//!
//! Observes history and sent-log snapshots broadcast by replicas and checks
//! the chain invariants against each neighbour whose snapshot is known.

use crate::sequence::{self, ScratchBuffer};
use crate::store::ConsistencyStore;
use chainwatch_core::{Action, Event, SubStateMachine};
use chainwatch_types::{
    ChainTopology, InvariantKind, NodeId, SentLog, SeqId, TopologyError, Violation,
};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Outcome of one accepted observation.
///
/// Every neighbour check runs even if an earlier one failed; failures are
/// collected here instead of aborting the observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationReport {
    /// Replica the observation came from.
    pub server: NodeId,
    /// Number of neighbour checks that ran.
    pub checks_run: usize,
    /// Failed checks, in the order they ran.
    pub violations: Vec<Violation>,
}

impl ObservationReport {
    fn new(server: NodeId) -> Self {
        Self {
            server,
            checks_run: 0,
            violations: Vec::new(),
        }
    }

    fn record(&mut self, outcome: Result<(), Violation>) {
        self.checks_run += 1;
        if let Err(violation) = outcome {
            self.violations.push(violation);
        }
    }

    /// Whether every check passed.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Convert the failures into report actions.
    pub fn into_actions(self) -> Vec<Action> {
        self.violations
            .into_iter()
            .map(|violation| Action::ReportViolation { violation })
            .collect()
    }
}

/// Statistics from the invariant monitor for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Observations stored and checked.
    pub observations_accepted: u64,
    /// Observations refused before being stored.
    pub observations_rejected: u64,
    /// Neighbour checks executed.
    pub checks_run: u64,
    /// Violations found (rejections included).
    pub violations: u64,
}

/// Passive chain invariant monitor.
///
/// Handles:
/// - Chain configuration and reconfiguration
/// - History snapshots (update propagation invariant)
/// - Sent-log snapshots (in-process requests invariant)
///
/// Does NOT handle:
/// - Replication itself (replicas are external)
/// - Recovery from a violation (violations are surfaced, never repaired)
pub struct InvariantMonitor {
    /// Current chain. `None` until configured.
    topology: Option<ChainTopology>,

    /// Last observed snapshots per replica.
    store: ConsistencyStore,

    /// Bounded buffer for extraction and merging.
    scratch: ScratchBuffer,

    /// Counters.
    stats: MonitorStats,

    /// Current time.
    now: Duration,
}

impl std::fmt::Debug for InvariantMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvariantMonitor")
            .field("chain_len", &self.topology.as_ref().map(ChainTopology::len))
            .field("histories", &self.store.history_len())
            .field("sent", &self.store.sent_len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for InvariantMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantMonitor {
    /// Create an unconfigured monitor.
    pub fn new() -> Self {
        Self {
            topology: None,
            store: ConsistencyStore::new(),
            scratch: ScratchBuffer::new(),
            stats: MonitorStats::default(),
            now: Duration::ZERO,
        }
    }

    /// Whether a chain has been installed.
    pub fn is_configured(&self) -> bool {
        self.topology.is_some()
    }

    /// Current chain.
    pub fn topology(&self) -> Option<&ChainTopology> {
        self.topology.as_ref()
    }

    /// Recorded observations.
    pub fn store(&self) -> &ConsistencyStore {
        &self.store
    }

    /// Get statistics for metrics.
    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Install a chain and forget all previous observations.
    pub fn configure(&mut self, servers: Vec<NodeId>) -> Result<(), TopologyError> {
        let topology = ChainTopology::new(servers)?;
        self.store.clear();
        self.scratch.clear();

        info!(chain_len = topology.len(), "Invariant monitor configured");
        self.topology = Some(topology);
        Ok(())
    }

    /// Replace the chain order, keeping every recorded observation.
    ///
    /// Neighbour relations of already-observed replicas change immediately;
    /// nothing is re-checked until the next observation arrives. On a monitor
    /// that was never configured this simply installs the chain.
    pub fn update_servers(&mut self, servers: Vec<NodeId>) -> Result<(), TopologyError> {
        let topology = ChainTopology::new(servers)?;
        debug!(chain_len = topology.len(), "Chain order updated");
        self.topology = Some(topology);
        Ok(())
    }

    /// Record a replica's committed history and check update propagation
    /// against both neighbours.
    ///
    /// Rejected (nothing stored) if the monitor is unconfigured or the
    /// history is not strictly increasing.
    pub fn observe_history(
        &mut self,
        server: NodeId,
        history: Vec<SeqId>,
    ) -> Result<ObservationReport, Violation> {
        let Some((successor, predecessor)) = self.neighbours(server) else {
            return Err(self.reject(server, Violation::NotConfigured));
        };
        if let Err(violation) = sequence::check_sorted(&history) {
            return Err(self.reject(server, violation));
        }

        trace!(%server, len = history.len(), "History observed");
        self.store.replace_history(server, history);

        let mut report = ObservationReport::new(server);
        let current = self.store.history(server).unwrap_or_default();

        // HIST(i+1) <= HIST(i)
        if let Some(next_history) = successor.and_then(|next| self.store.history(next)) {
            report.record(sequence::less_or_equal(
                next_history,
                current,
                InvariantKind::UpdatePropagation,
            ));
        }

        // HIST(i) <= HIST(i-1)
        if let Some(prev_history) = predecessor.and_then(|prev| self.store.history(prev)) {
            report.record(sequence::less_or_equal(
                current,
                prev_history,
                InvariantKind::UpdatePropagation,
            ));
        }

        Ok(self.finish(report))
    }

    /// Record a replica's sent log and check that committed histories
    /// reconcile with what is in flight, in both directions.
    ///
    /// Rejected (nothing stored) if the monitor is unconfigured, the log does
    /// not fit in the scratch buffer, or its ids are not strictly increasing.
    pub fn observe_sent(
        &mut self,
        server: NodeId,
        sent_log: &[SentLog],
    ) -> Result<ObservationReport, Violation> {
        let Some((successor, predecessor)) = self.neighbours(server) else {
            return Err(self.reject(server, Violation::NotConfigured));
        };
        let extracted = match self.scratch.extract(sent_log).map(<[SeqId]>::to_vec) {
            Ok(ids) => ids,
            Err(violation) => return Err(self.reject(server, violation)),
        };

        trace!(%server, len = extracted.len(), "Sent log observed");
        self.store.replace_sent(server, extracted);

        let mut report = ObservationReport::new(server);
        let current_history = self.store.history(server).unwrap_or_default();

        // HIST(i) == merge(HIST(i+1), SENT(i))
        if let Some(next_history) = successor.and_then(|next| self.store.history(next)) {
            let sent = self.store.sent(server).unwrap_or_default();
            report.record(reconcile(
                &mut self.scratch,
                next_history,
                sent,
                current_history,
            ));
        }

        // HIST(i-1) == merge(HIST(i), SENT(i-1))
        if let Some(prev) = predecessor {
            if let Some(prev_history) = self.store.history(prev) {
                let prev_sent = self.store.sent(prev).unwrap_or_default();
                report.record(reconcile(
                    &mut self.scratch,
                    current_history,
                    prev_sent,
                    prev_history,
                ));
            }
        }

        self.scratch.clear();
        Ok(self.finish(report))
    }

    fn neighbours(&self, server: NodeId) -> Option<(Option<NodeId>, Option<NodeId>)> {
        self.topology
            .as_ref()
            .map(|topology| (topology.successor(server), topology.predecessor(server)))
    }

    fn reject(&mut self, server: NodeId, violation: Violation) -> Violation {
        self.stats.observations_rejected += 1;
        self.stats.violations += 1;
        warn!(
            %server,
            now = ?self.now,
            kind = violation.label(),
            %violation,
            "Observation rejected"
        );
        violation
    }

    fn finish(&mut self, report: ObservationReport) -> ObservationReport {
        self.stats.observations_accepted += 1;
        self.stats.checks_run += report.checks_run as u64;
        self.stats.violations += report.violations.len() as u64;

        for violation in &report.violations {
            warn!(
                server = %report.server,
                now = ?self.now,
                kind = violation.label(),
                %violation,
                "Chain invariant violated"
            );
        }
        report
    }
}

/// Check `expected == merge(lower, upper)` using the bounded buffer.
fn reconcile(
    scratch: &mut ScratchBuffer,
    lower: &[SeqId],
    upper: &[SeqId],
    expected: &[SeqId],
) -> Result<(), Violation> {
    let merged = scratch.merge(lower, upper)?;
    sequence::equal(expected, merged, InvariantKind::InProcessRequests)
}

impl SubStateMachine for InvariantMonitor {
    fn try_handle(&mut self, event: &Event) -> Option<Vec<Action>> {
        match event {
            Event::ConfigureMonitor { servers } => {
                if let Err(error) = self.configure(servers.clone()) {
                    warn!(%error, "Rejected monitor configuration");
                }
                Some(vec![])
            }
            Event::UpdateServers { servers } => {
                if let Err(error) = self.update_servers(servers.clone()) {
                    warn!(%error, "Rejected chain update");
                }
                Some(vec![])
            }
            Event::HistoryObserved { server, history } => Some(
                match self.observe_history(*server, history.clone()) {
                    Ok(report) => report.into_actions(),
                    Err(violation) => vec![Action::ReportViolation { violation }],
                },
            ),
            Event::SentObserved { server, sent_log } => {
                Some(match self.observe_sent(*server, sent_log) {
                    Ok(report) => report.into_actions(),
                    Err(violation) => vec![Action::ReportViolation { violation }],
                })
            }
            _ => None,
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }
}
