//! Deterministic simulation runner.
//!
//! The runner owns one failure detector and one invariant monitor and plays
//! every collaborator around them. Detector actions are executed inline;
//! replies travel back through the simulated network and the event queue.

use crate::config::SimulationConfig;
use crate::event_queue::EventKey;
use crate::network::{Endpoint, SimulatedNetwork};
use chainwatch_core::{
    Action, Event, EventPriority, OutboundMessage, PingSink, StateMachine, SubStateMachine,
    TimerId,
};
use chainwatch_detector::FailureDetector;
use chainwatch_monitor::InvariantMonitor;
use chainwatch_types::{ClientId, NodeId, Violation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Entry in the event queue.
#[derive(Debug, Clone)]
enum Delivery {
    /// Event for the failure detector.
    Detector(Event),
    /// Event for the invariant monitor.
    Monitor(Event),
    /// Message arriving at a monitored node.
    Node { node: NodeId, message: OutboundMessage },
    /// Scripted crash of a monitored node.
    Crash { node: NodeId },
    /// Scripted recovery of a monitored node.
    Recover { node: NodeId },
}

impl Delivery {
    fn priority(&self) -> EventPriority {
        match self {
            Delivery::Detector(event) | Delivery::Monitor(event) => event.priority(),
            Delivery::Node { .. } => EventPriority::Network,
            Delivery::Crash { .. } | Delivery::Recover { .. } => EventPriority::Internal,
        }
    }
}

/// Ping sink that keeps every observation in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingPingSink {
    pings: Vec<NodeId>,
}

impl RecordingPingSink {
    /// All pinged nodes, in ping order.
    pub fn pings(&self) -> &[NodeId] {
        &self.pings
    }

    /// Number of pings reported for `node`.
    pub fn count(&self, node: NodeId) -> usize {
        self.pings.iter().filter(|n| **n == node).count()
    }
}

impl PingSink for RecordingPingSink {
    fn on_ping(&mut self, node: NodeId) {
        self.pings.push(node);
    }
}

/// A failure notification as received by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureNotice {
    pub time: Duration,
    pub client: ClientId,
    pub node: NodeId,
}

/// A violation reported by the invariant monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationRecord {
    pub time: Duration,
    pub violation: Violation,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 4],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages sent (successfully scheduled for delivery).
    pub messages_sent: u64,
    /// Messages dropped due to network partition.
    pub messages_dropped_partition: u64,
    /// Messages dropped due to packet loss.
    pub messages_dropped_loss: u64,
    /// Pings that reached a crashed node.
    pub pings_to_crashed: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Cancels answered with `CancelSuccess`.
    pub timers_cancelled: u64,
    /// Cancels answered with `CancelFailure`.
    pub cancel_failures: u64,
}

impl SimulationStats {
    /// Total messages dropped (partition + packet loss).
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_partition + self.messages_dropped_loss
    }

    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped();
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

/// Summary of a run, suitable for printing or serializing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub simulated_time: Duration,
    pub stats: SimulationStats,
    pub rounds_completed: u64,
    pub pings_sent: u64,
    pub nodes_failed: u64,
    pub fast_path_rounds: u64,
    pub cancel_races: u64,
    pub alive: Vec<NodeId>,
    pub failures: Vec<FailureNotice>,
    pub violations: Vec<ViolationRecord>,
}

/// State of a scripted monitored node.
#[derive(Debug, Clone, Copy)]
struct SimNode {
    up: bool,
    pongs_sent: u64,
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions.
/// Given the same seed, produces identical results every run.
pub struct SimulationRunner {
    /// The detector under test.
    detector: FailureDetector,

    /// The monitor under test.
    monitor: InvariantMonitor,

    /// Scripted monitored nodes.
    nodes: BTreeMap<NodeId, SimNode>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Delivery>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Network simulator.
    network: SimulatedNetwork,

    /// RNG for network conditions and timer races (seeded for determinism).
    rng: ChaCha8Rng,

    seed: u64,

    /// Armed timers. Maps timer_id -> key of its queued timeout.
    timers: HashMap<TimerId, EventKey>,

    cancel_race_probability: f64,

    ping_sink: RecordingPingSink,

    /// Notifications received by clients, in delivery order.
    notifications: Vec<FailureNotice>,

    /// Violations reported by the monitor, in report order.
    violations: Vec<ViolationRecord>,

    /// Statistics.
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a new simulation runner with the given configuration.
    pub fn new(config: SimulationConfig, seed: u64) -> Self {
        info!(
            seed,
            latency = ?config.network.latency,
            packet_loss_rate = config.network.packet_loss_rate,
            cancel_race_probability = config.cancel_race_probability,
            "Created simulation runner"
        );

        Self {
            detector: FailureDetector::new(config.detector),
            monitor: InvariantMonitor::new(),
            nodes: BTreeMap::new(),
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(config.network),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            timers: HashMap::new(),
            cancel_race_probability: config.cancel_race_probability,
            ping_sink: RecordingPingSink::default(),
            notifications: Vec::new(),
            violations: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    // ─── Accessors ───

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    pub fn monitor(&self) -> &InvariantMonitor {
        &self.monitor
    }

    /// Get simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Get current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Get a reference to the network.
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Get a mutable reference to the network for partition/loss configuration.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    pub fn ping_sink(&self) -> &RecordingPingSink {
        &self.ping_sink
    }

    /// Every failure notification delivered so far.
    pub fn notifications(&self) -> &[FailureNotice] {
        &self.notifications
    }

    /// Nodes reported failed to `client`, in delivery order.
    pub fn failures_for(&self, client: ClientId) -> Vec<NodeId> {
        self.notifications
            .iter()
            .filter(|notice| notice.client == client)
            .map(|notice| notice.node)
            .collect()
    }

    pub fn violations(&self) -> &[ViolationRecord] {
        &self.violations
    }

    /// Whether a scripted node is currently answering pings.
    pub fn is_node_up(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.up)
    }

    /// Number of pongs a scripted node has sent.
    pub fn pongs_sent(&self, node: NodeId) -> u64 {
        self.nodes.get(&node).map_or(0, |n| n.pongs_sent)
    }

    // ─── Scenario setup ───

    /// Add a scripted node that answers pings.
    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.insert(
            node,
            SimNode {
                up: true,
                pongs_sent: 0,
            },
        );
    }

    /// Add the nodes and start the detector on them immediately.
    pub fn start_detector(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        let nodes: BTreeSet<NodeId> = nodes.into_iter().collect();
        for node in &nodes {
            self.add_node(*node);
        }
        self.schedule_detector_event(Duration::ZERO, Event::ConfigureDetector { nodes });
    }

    /// Register a client with the detector after `delay`.
    pub fn register_client(&mut self, client: ClientId, delay: Duration) {
        self.schedule_detector_event(delay, Event::RegisterClient { client });
    }

    /// Unregister a client from the detector after `delay`.
    pub fn unregister_client(&mut self, client: ClientId, delay: Duration) {
        self.schedule_detector_event(delay, Event::UnregisterClient { client });
    }

    /// Stop a node from answering pings, effective immediately.
    pub fn crash_node(&mut self, node: NodeId) {
        self.set_node_up(node, false);
    }

    /// Let a node answer pings again, effective immediately.
    pub fn recover_node(&mut self, node: NodeId) {
        self.set_node_up(node, true);
    }

    /// Crash a node after `delay`.
    pub fn schedule_crash(&mut self, node: NodeId, delay: Duration) {
        self.schedule(self.now + delay, Delivery::Crash { node });
    }

    /// Recover a node after `delay`.
    pub fn schedule_recover(&mut self, node: NodeId, delay: Duration) {
        self.schedule(self.now + delay, Delivery::Recover { node });
    }

    /// Deliver an event to the failure detector after `delay`.
    pub fn schedule_detector_event(&mut self, delay: Duration, event: Event) {
        self.schedule(self.now + delay, Delivery::Detector(event));
    }

    /// Deliver an observation or configuration event to the invariant
    /// monitor after `delay`.
    pub fn schedule_monitor_event(&mut self, delay: Duration, event: Event) {
        self.schedule(self.now + delay, Delivery::Monitor(event));
    }

    // ─── Execution ───

    /// Run simulation until no more events or time limit reached.
    ///
    /// Afterwards the clock reads at least `end_time`, so delays passed to
    /// the scheduling methods are relative to the end of this run.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(
            end_time_secs = end_time.as_secs_f64(),
            "Running simulation step"
        );

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(
                    remaining_events = self.event_queue.len(),
                    "Time limit reached"
                );
                break;
            }

            let Some(delivery) = self.event_queue.remove(&key) else {
                break;
            };
            self.now = key.time;

            self.stats.events_processed += 1;
            self.stats.events_by_priority[key.priority as usize] += 1;

            self.deliver(key, delivery);
        }

        self.now = self.now.max(end_time);

        trace!(
            events_processed = self.stats.events_processed,
            actions_generated = self.stats.actions_generated,
            final_time = ?self.now,
            "Simulation step complete"
        );
    }

    /// Build a summary of the run so far.
    pub fn report(&self) -> SimulationReport {
        let detector = self.detector.stats();
        SimulationReport {
            seed: self.seed,
            simulated_time: self.now,
            stats: self.stats.clone(),
            rounds_completed: detector.rounds_completed,
            pings_sent: detector.pings_sent,
            nodes_failed: detector.nodes_failed,
            fast_path_rounds: detector.fast_path_rounds,
            cancel_races: detector.cancel_races,
            alive: self.detector.liveness().alive().iter().copied().collect(),
            failures: self.notifications.clone(),
            violations: self.violations.clone(),
        }
    }

    fn deliver(&mut self, key: EventKey, delivery: Delivery) {
        match delivery {
            Delivery::Detector(event) => {
                if event == Event::Timeout
                    && self.timers.get(&TimerId::PingRound) == Some(&key)
                {
                    self.timers.remove(&TimerId::PingRound);
                }

                trace!(time = ?self.now, event = event.type_name(), "Detector event");
                self.detector.set_time(self.now);
                let actions = self.detector.handle(event);
                self.process_actions(actions);
            }

            Delivery::Monitor(event) => {
                self.monitor.set_time(self.now);
                match self.monitor.try_handle(&event) {
                    Some(actions) => self.process_actions(actions),
                    None => warn!(
                        event = event.type_name(),
                        "Event not accepted by the invariant monitor"
                    ),
                }
            }

            Delivery::Node { node, message } => self.on_node_message(node, message),

            Delivery::Crash { node } => self.set_node_up(node, false),
            Delivery::Recover { node } => self.set_node_up(node, true),
        }
    }

    fn process_actions(&mut self, actions: Vec<Action>) {
        self.stats.actions_generated += actions.len() as u64;
        for action in actions {
            self.process_action(action);
        }
    }

    /// Process an action from the detector or the monitor.
    fn process_action(&mut self, action: Action) {
        match action {
            Action::SendToNode { node, message } => {
                self.try_deliver_message(
                    Endpoint::Detector,
                    Endpoint::Node(node),
                    Delivery::Node { node, message },
                );
            }

            Action::StartTimer { id, duration } => {
                if let Some(stale) = self.timers.remove(&id) {
                    self.event_queue.remove(&stale);
                }
                let key = self.schedule(self.now + duration, Delivery::Detector(Event::Timeout));
                self.timers.insert(id, key);
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => self.cancel_timer(id),

            Action::NotifyFailure { client, node } => {
                info!(time = ?self.now, %client, %node, "Client notified of node failure");
                self.notifications.push(FailureNotice {
                    time: self.now,
                    client,
                    node,
                });
            }

            Action::ReportPing { node } => self.ping_sink.on_ping(node),

            Action::ReportViolation { violation } => {
                warn!(time = ?self.now, kind = violation.label(), %violation, "Violation reported");
                self.violations.push(ViolationRecord {
                    time: self.now,
                    violation,
                });
            }
        }
    }

    /// Answer a cancel request.
    ///
    /// An armed timer is removed and `CancelSuccess` returned, unless the
    /// injected race makes it fire first: then its `Timeout` is delivered
    /// followed by `CancelFailure`. A timer that already fired always
    /// answers `CancelFailure`.
    fn cancel_timer(&mut self, id: TimerId) {
        let Some(key) = self.timers.remove(&id) else {
            self.stats.cancel_failures += 1;
            self.schedule(self.now, Delivery::Detector(Event::CancelFailure));
            return;
        };
        self.event_queue.remove(&key);

        let race = self.cancel_race_probability > 0.0
            && self.rng.gen::<f64>() < self.cancel_race_probability;
        if race {
            debug!(time = ?self.now, "Timer fired before the cancel request");
            self.stats.cancel_failures += 1;
            self.schedule(self.now, Delivery::Detector(Event::Timeout));
            self.schedule(self.now, Delivery::Detector(Event::CancelFailure));
        } else {
            self.stats.timers_cancelled += 1;
            self.schedule(self.now, Delivery::Detector(Event::CancelSuccess));
        }
    }

    fn on_node_message(&mut self, node: NodeId, message: OutboundMessage) {
        match message {
            OutboundMessage::Ping { from } => {
                let Some(state) = self.nodes.get_mut(&node).filter(|n| n.up) else {
                    self.stats.pings_to_crashed += 1;
                    trace!(%node, %from, "Ping reached a node that is down");
                    return;
                };
                state.pongs_sent += 1;
                self.try_deliver_message(
                    Endpoint::Node(node),
                    Endpoint::Detector,
                    Delivery::Detector(Event::Pong { node }),
                );
            }
        }
    }

    fn set_node_up(&mut self, node: NodeId, up: bool) {
        match self.nodes.get_mut(&node) {
            Some(state) => {
                state.up = up;
                info!(time = ?self.now, %node, up, "Node state changed");
            }
            None => warn!(%node, "Unknown node"),
        }
    }

    /// Schedule a delivery at a specific time.
    fn schedule(&mut self, time: Duration, delivery: Delivery) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, delivery.priority(), self.sequence);
        self.event_queue.insert(key, delivery);
        key
    }

    /// Try to deliver a message, accounting for partitions and packet loss.
    /// Updates stats based on delivery outcome.
    fn try_deliver_message(&mut self, from: Endpoint, to: Endpoint, delivery: Delivery) {
        // Check partition first (deterministic - doesn't consume RNG)
        if self.network.is_partitioned(from, to) {
            self.stats.messages_dropped_partition += 1;
            trace!(?from, ?to, "Message dropped due to partition");
            return;
        }

        if self.network.should_drop_packet(&mut self.rng) {
            self.stats.messages_dropped_loss += 1;
            trace!(?from, ?to, "Message dropped due to packet loss");
            return;
        }

        let delivery_time = self
            .network
            .delivery_time(from, to, self.now, &mut self.rng);
        self.schedule(delivery_time, delivery);
        self.stats.messages_sent += 1;
    }
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("seed", &self.seed)
            .field("now", &self.now)
            .field("queued", &self.event_queue.len())
            .field("nodes", &self.nodes.len())
            .field("detector", &self.detector)
            .field("monitor", &self.monitor)
            .finish()
    }
}
