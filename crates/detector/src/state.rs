//! Failure detector state machine.
//!
//! This module implements the detector as a pushdown automaton: the active
//! state sits on top of the states it was pushed from and inherits their
//! handlers. Every state also declares which events it defers (kept until a
//! later state accepts them) and which it ignores.

use crate::config::DetectorConfig;
use crate::liveness::LivenessState;
use chainwatch_core::{Action, Event, OutboundMessage, StateMachine, TimerId};
use chainwatch_types::NodeId;
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Detector statistics for monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorStats {
    /// Rounds that reached `Reset`.
    pub rounds_completed: u64,
    /// Pings sent, retries included.
    pub pings_sent: u64,
    /// Nodes declared failed.
    pub nodes_failed: u64,
    /// Rounds ended by a successful cancel.
    pub fast_path_rounds: u64,
    /// Cancels that lost the race against the timer.
    pub cancel_races: u64,
    /// Events no state on the stack accepts.
    pub unhandled_events: u64,
}

/// Protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorState {
    /// Waiting for the monitored set.
    Init,
    /// Pinging and collecting pongs.
    SendPing,
    /// Every alive node answered, waiting for the timer's cancel outcome.
    WaitForCancelResponse,
    /// Idle until the next round.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Handle,
    Defer,
    Ignore,
}

impl DetectorState {
    /// What this state itself declares for `event`. `None` defers the
    /// decision to the states below it.
    fn disposition(self, event: &Event) -> Option<Disposition> {
        use DetectorState::*;
        use Disposition::*;

        match (self, event) {
            (
                Init,
                Event::ConfigureDetector { .. }
                | Event::RegisterClient { .. }
                | Event::UnregisterClient { .. },
            ) => Some(Handle),

            (SendPing, Event::Pong { .. } | Event::Timeout) => Some(Handle),

            (WaitForCancelResponse, Event::CancelSuccess | Event::CancelFailure) => Some(Handle),
            (WaitForCancelResponse, Event::Timeout | Event::Pong { .. }) => Some(Defer),

            (Reset, Event::Timeout) => Some(Handle),
            (Reset, Event::Pong { .. }) => Some(Ignore),

            _ => None,
        }
    }
}

/// Ping-based failure detector.
///
/// Handles:
/// - Monitored set configuration and client registration
/// - Ping rounds with bounded retry
/// - The cancel race between a full set of pongs and the round timer
///
/// Does NOT handle:
/// - Timer implementation (runner executes `StartTimer` / `CancelTimer`)
/// - Message delivery (runner executes `SendToNode` / `NotifyFailure`)
pub struct FailureDetector {
    /// Active state.
    current: DetectorState,

    /// States below the active one, bottom first.
    stack: Vec<DetectorState>,

    /// Events held back by the active state, oldest first.
    deferred: VecDeque<Event>,

    liveness: LivenessState,

    stats: DetectorStats,

    /// Current time.
    now: Duration,

    /// Configuration.
    config: DetectorConfig,
}

impl std::fmt::Debug for FailureDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureDetector")
            .field("detector_id", &self.config.detector_id)
            .field("state", &self.current)
            .field("stack_depth", &self.stack.len())
            .field("deferred_len", &self.deferred.len())
            .field("alive_len", &self.liveness.alive().len())
            .field("clients_len", &self.liveness.clients().len())
            .finish()
    }
}

impl FailureDetector {
    /// Create a detector in `Init`.
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            current: DetectorState::Init,
            stack: Vec::new(),
            deferred: VecDeque::new(),
            liveness: LivenessState::default(),
            stats: DetectorStats::default(),
            now: Duration::ZERO,
            config,
        }
    }

    /// Active state.
    pub fn state(&self) -> DetectorState {
        self.current
    }

    /// Number of states below the active one.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of events currently deferred.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn liveness(&self) -> &LivenessState {
        &self.liveness
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Get statistics for metrics.
    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════

    /// Find the first state, from the top of the stack down, that declares
    /// a disposition for `event`.
    fn resolve(&self, event: &Event) -> Option<(DetectorState, Disposition)> {
        std::iter::once(self.current)
            .chain(self.stack.iter().rev().copied())
            .find_map(|state| state.disposition(event).map(|d| (state, d)))
    }

    fn dispatch(&mut self, event: Event, actions: &mut Vec<Action>) {
        match self.resolve(&event) {
            Some((owner, Disposition::Handle)) => self.on_event(owner, event, actions),
            Some((_, Disposition::Defer)) => {
                trace!(event = event.type_name(), state = ?self.current, "Deferring event");
                self.deferred.push_back(event);
            }
            Some((_, Disposition::Ignore)) => {
                trace!(event = event.type_name(), state = ?self.current, "Ignoring event");
            }
            None => {
                self.stats.unhandled_events += 1;
                trace!(event = event.type_name(), state = ?self.current, "Dropping unhandled event");
            }
        }
    }

    /// Re-offer deferred events, oldest first, once the active state no
    /// longer defers them.
    fn drain_deferred(&mut self, actions: &mut Vec<Action>) {
        while let Some(index) = self
            .deferred
            .iter()
            .position(|event| !matches!(self.resolve(event), Some((_, Disposition::Defer))))
        {
            if let Some(event) = self.deferred.remove(index) {
                self.dispatch(event, actions);
            }
        }
    }

    fn on_event(&mut self, owner: DetectorState, event: Event, actions: &mut Vec<Action>) {
        match (owner, event) {
            (_, Event::ConfigureDetector { nodes }) => self.on_configure(nodes, actions),
            (_, Event::RegisterClient { client }) => {
                if self.liveness.register_client(client) {
                    debug!(%client, "Client registered");
                }
            }
            (_, Event::UnregisterClient { client }) => {
                if self.liveness.unregister_client(client) {
                    debug!(%client, "Client unregistered");
                }
            }
            (_, Event::Pong { node }) => self.on_pong(node, actions),
            (DetectorState::Reset, Event::Timeout) => {
                self.goto(DetectorState::SendPing, actions)
            }
            (_, Event::Timeout) => self.on_timeout(actions),
            (_, Event::CancelSuccess) => {
                self.stats.fast_path_rounds += 1;
                self.pop();
                self.goto(DetectorState::Reset, actions);
            }
            (_, Event::CancelFailure) => {
                // The timer already fired; its deferred timeout completes the attempt.
                self.stats.cancel_races += 1;
                self.pop();
            }
            (owner, event) => {
                trace!(event = event.type_name(), state = ?owner, "No handler for event");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transitions
    // ═══════════════════════════════════════════════════════════════════════

    fn goto(&mut self, target: DetectorState, actions: &mut Vec<Action>) {
        debug!(from = ?self.current, to = ?target, "State transition");
        self.current = target;
        self.on_entry(actions);
    }

    fn push(&mut self, target: DetectorState, actions: &mut Vec<Action>) {
        debug!(from = ?self.current, to = ?target, "Push state");
        self.stack.push(self.current);
        self.current = target;
        self.on_entry(actions);
    }

    /// Return to the state below without re-running its entry action.
    fn pop(&mut self) {
        if let Some(below) = self.stack.pop() {
            debug!(from = ?self.current, to = ?below, "Pop state");
            self.current = below;
        }
    }

    fn on_entry(&mut self, actions: &mut Vec<Action>) {
        match self.current {
            DetectorState::Init | DetectorState::WaitForCancelResponse => {}
            DetectorState::SendPing => self.send_pings(actions),
            DetectorState::Reset => {
                self.stats.rounds_completed += 1;
                self.liveness.reset_round();
                actions.push(Action::StartTimer {
                    id: TimerId::PingRound,
                    duration: self.config.round_interval,
                });
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Handlers
    // ═══════════════════════════════════════════════════════════════════════

    fn on_configure(&mut self, nodes: BTreeSet<NodeId>, actions: &mut Vec<Action>) {
        if self.current == DetectorState::Init {
            info!(
                detector = %self.config.detector_id,
                nodes = nodes.len(),
                "Failure detector started"
            );
            self.liveness.reconfigure(nodes);
            self.liveness.reset_round();
            self.push(DetectorState::SendPing, actions);
        } else {
            info!(
                detector = %self.config.detector_id,
                nodes = nodes.len(),
                state = ?self.current,
                "Monitored set replaced"
            );
            self.liveness.reconfigure(nodes);
        }
    }

    fn send_pings(&mut self, actions: &mut Vec<Action>) {
        let from = self.config.detector_id;
        for node in self.liveness.unresponded() {
            trace!(%node, "Sending ping");
            self.stats.pings_sent += 1;
            actions.push(Action::ReportPing { node });
            actions.push(Action::SendToNode {
                node,
                message: OutboundMessage::Ping { from },
            });
        }

        actions.push(Action::StartTimer {
            id: TimerId::PingRound,
            duration: self.config.ping_timeout,
        });
    }

    fn on_pong(&mut self, node: NodeId, actions: &mut Vec<Action>) {
        if !self.liveness.record_response(node) {
            trace!(%node, "Dropping pong from node that is not alive");
            return;
        }

        if self.liveness.all_responded() {
            debug!(
                responses = self.liveness.responses().len(),
                "All alive nodes responded, cancelling round timer"
            );
            actions.push(Action::CancelTimer {
                id: TimerId::PingRound,
            });
            self.push(DetectorState::WaitForCancelResponse, actions);
        }
    }

    fn on_timeout(&mut self, actions: &mut Vec<Action>) {
        let attempts = self.liveness.record_attempt();

        if !self.liveness.all_responded() && attempts < self.config.max_attempts {
            debug!(
                attempts,
                silent = self.liveness.unresponded().len(),
                "Ping timeout, retrying silent nodes"
            );
            self.goto(DetectorState::SendPing, actions);
            return;
        }

        for node in self.liveness.unresponded() {
            self.liveness.mark_failed(node);
            self.stats.nodes_failed += 1;
            info!(
                %node,
                attempts,
                clients = self.liveness.clients().len(),
                "Node presumed failed"
            );
            for client in self.liveness.clients() {
                actions.push(Action::NotifyFailure {
                    client: *client,
                    node,
                });
            }
        }

        self.goto(DetectorState::Reset, actions);
    }
}

impl StateMachine for FailureDetector {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        let mut actions = Vec::new();
        self.dispatch(event, &mut actions);
        self.drain_deferred(&mut actions);
        actions
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
