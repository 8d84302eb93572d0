//! Production runner implementation.

use crate::metrics;
use crate::timers::{CancelOutcome, TimerManager};
use chainwatch_core::{
    Action, Event, NoopPingSink, OutboundMessage, PingSink, StateMachine, SubStateMachine,
};
use chainwatch_detector::{DetectorConfig, FailureDetector};
use chainwatch_monitor::InvariantMonitor;
use chainwatch_types::{ClientId, DetectorId, NodeId, SentLog, SeqId, Violation};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, span, trace, warn, Level};

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Delivered to a registered client when a monitored node is declared failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureNotification {
    pub detector: DetectorId,
    pub node: NodeId,
}

/// Requests from handles that need runner-side bookkeeping.
#[derive(Debug)]
enum Command {
    Submit(Event),
    AttachNode {
        node: NodeId,
        outlet: mpsc::UnboundedSender<OutboundMessage>,
    },
    RegisterClient {
        client: ClientId,
        outlet: mpsc::UnboundedSender<FailureNotification>,
    },
    UnregisterClient {
        client: ClientId,
    },
    SubscribeViolations {
        outlet: mpsc::UnboundedSender<Violation>,
    },
}

/// Handle for shutting down a running DetectorRunner.
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Cloneable handle for talking to a running [`DetectorRunner`].
///
/// All methods are fire-and-forget; they fail only once the runner is gone.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    network_tx: mpsc::UnboundedSender<Event>,
}

impl DetectorHandle {
    fn send(&self, command: Command) -> Result<(), RunnerError> {
        self.command_tx
            .send(command)
            .map_err(|_| RunnerError::ChannelClosed)
    }

    /// Replace the monitored set and (on first call) start pinging.
    pub fn configure(&self, nodes: impl IntoIterator<Item = NodeId>) -> Result<(), RunnerError> {
        let nodes: BTreeSet<NodeId> = nodes.into_iter().collect();
        self.send(Command::Submit(Event::ConfigureDetector { nodes }))
    }

    /// Route pings for `node` into `outlet`.
    pub fn attach_node(
        &self,
        node: NodeId,
        outlet: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<(), RunnerError> {
        self.send(Command::AttachNode { node, outlet })
    }

    /// Register a client; the receiver yields every failure declared after
    /// registration.
    pub fn register_client(
        &self,
        client: ClientId,
    ) -> Result<mpsc::UnboundedReceiver<FailureNotification>, RunnerError> {
        let (outlet, rx) = mpsc::unbounded_channel();
        self.send(Command::RegisterClient { client, outlet })?;
        Ok(rx)
    }

    pub fn unregister_client(&self, client: ClientId) -> Result<(), RunnerError> {
        self.send(Command::UnregisterClient { client })
    }

    /// Receive every violation reported by the invariant monitor.
    pub fn subscribe_violations(&self) -> Result<mpsc::UnboundedReceiver<Violation>, RunnerError> {
        let (outlet, rx) = mpsc::unbounded_channel();
        self.send(Command::SubscribeViolations { outlet })?;
        Ok(rx)
    }

    /// Install the chain order and clear recorded observations.
    pub fn configure_monitor(&self, servers: Vec<NodeId>) -> Result<(), RunnerError> {
        self.send(Command::Submit(Event::ConfigureMonitor { servers }))
    }

    /// Replace the chain order, keeping recorded observations.
    pub fn update_servers(&self, servers: Vec<NodeId>) -> Result<(), RunnerError> {
        self.send(Command::Submit(Event::UpdateServers { servers }))
    }

    pub fn observe_history(&self, server: NodeId, history: Vec<SeqId>) -> Result<(), RunnerError> {
        self.send(Command::Submit(Event::HistoryObserved { server, history }))
    }

    pub fn observe_sent(&self, server: NodeId, sent_log: Vec<SentLog>) -> Result<(), RunnerError> {
        self.send(Command::Submit(Event::SentObserved { server, sent_log }))
    }

    pub(crate) fn network_sender(&self) -> mpsc::UnboundedSender<Event> {
        self.network_tx.clone()
    }

    /// Deliver a ping response from `node`.
    pub fn pong(&self, node: NodeId) -> Result<(), RunnerError> {
        self.network_tx
            .send(Event::Pong { node })
            .map_err(|_| RunnerError::ChannelClosed)
    }
}

/// Production runner that owns the detector and monitor state machines.
///
/// Uses the event aggregator pattern: a single task owns both machines and
/// receives events from three channels. Timer events are never starved by
/// network traffic, and network traffic is never starved by client requests.
pub struct DetectorRunner {
    detector: FailureDetector,
    monitor: InvariantMonitor,
    timers: TimerManager,
    /// Timer fires and cancel outcomes.
    timer_rx: mpsc::UnboundedReceiver<Event>,
    /// Used to report cancel outcomes back through the timer channel.
    timer_tx: mpsc::UnboundedSender<Event>,
    /// Pong responses from nodes.
    network_rx: mpsc::UnboundedReceiver<Event>,
    /// Client and monitor requests.
    command_rx: mpsc::UnboundedReceiver<Command>,
    nodes: HashMap<NodeId, mpsc::UnboundedSender<OutboundMessage>>,
    clients: HashMap<ClientId, mpsc::UnboundedSender<FailureNotification>>,
    violation_subscribers: Vec<mpsc::UnboundedSender<Violation>>,
    ping_sink: Box<dyn PingSink + Send>,
    shutdown_rx: oneshot::Receiver<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    start_time: Instant,
    nodes_failed_reported: u64,
}

impl std::fmt::Debug for DetectorRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRunner")
            .field("detector", &self.detector)
            .field("nodes", &self.nodes.len())
            .field("clients", &self.clients.len())
            .finish()
    }
}

impl DetectorRunner {
    /// Create a runner and the first handle for talking to it.
    ///
    /// The runner exits when every handle has been dropped or the shutdown
    /// handle fires.
    pub fn new(config: DetectorConfig) -> (Self, DetectorHandle) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (network_tx, network_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runner = Self {
            detector: FailureDetector::new(config),
            monitor: InvariantMonitor::new(),
            timers: TimerManager::new(timer_tx.clone()),
            timer_rx,
            timer_tx,
            network_rx,
            command_rx,
            nodes: HashMap::new(),
            clients: HashMap::new(),
            violation_subscribers: Vec::new(),
            ping_sink: Box::new(NoopPingSink),
            shutdown_rx,
            shutdown_tx: Some(shutdown_tx),
            start_time: Instant::now(),
            nodes_failed_reported: 0,
        };
        let handle = DetectorHandle {
            command_tx,
            network_tx,
        };
        (runner, handle)
    }

    /// Observe every ping the detector sends.
    pub fn with_ping_sink(mut self, sink: impl PingSink + Send + 'static) -> Self {
        self.ping_sink = Box::new(sink);
        self
    }

    /// Get a shutdown handle for graceful shutdown.
    ///
    /// Returns a handle that when dropped triggers graceful shutdown.
    /// Can only be called once; subsequent calls return None.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    pub fn monitor(&self) -> &InvariantMonitor {
        &self.monitor
    }

    /// Run the event loop until shutdown.
    ///
    /// Returns the runner so callers can inspect final state.
    pub async fn run(mut self) -> Result<Self, RunnerError> {
        info!(
            detector = %self.detector.config().detector_id,
            "Starting detector runner"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                Some(event) = self.timer_rx.recv() => {
                    let event_span = span!(Level::DEBUG, "handle_timer", event.type = %event.type_name());
                    let _guard = event_span.enter();
                    self.dispatch(event);
                }

                Some(event) = self.network_rx.recv() => {
                    let event_span = span!(Level::DEBUG, "handle_network", event.type = %event.type_name());
                    let _guard = event_span.enter();
                    metrics::record_pong_received();
                    self.dispatch(event);
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.on_command(command),
                        None => {
                            info!("All handles dropped, stopping");
                            break;
                        }
                    }
                }
            }
        }

        self.timers.cancel_all();
        Ok(self)
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit(event) => {
                let event_span = span!(Level::DEBUG, "handle_client", event.type = %event.type_name());
                let _guard = event_span.enter();
                self.dispatch(event);
            }
            Command::AttachNode { node, outlet } => {
                if self.nodes.insert(node, outlet).is_some() {
                    debug!(%node, "Replaced node outlet");
                }
            }
            Command::RegisterClient { client, outlet } => {
                self.clients.insert(client, outlet);
                self.dispatch(Event::RegisterClient { client });
            }
            Command::UnregisterClient { client } => {
                self.dispatch(Event::UnregisterClient { client });
                self.clients.remove(&client);
            }
            Command::SubscribeViolations { outlet } => {
                self.violation_subscribers.push(outlet);
            }
        }
    }

    /// Route an event to the machine that owns it and execute the actions.
    fn dispatch(&mut self, event: Event) {
        let now = self.start_time.elapsed();
        let started = Instant::now();

        let actions = if event.is_monitor_event() {
            let before = self.monitor.stats();
            self.monitor.set_time(now);
            let actions = self.monitor.try_handle(&event).unwrap_or_default();
            let after = self.monitor.stats();
            if after.observations_accepted > before.observations_accepted {
                metrics::record_observation(true);
            }
            if after.observations_rejected > before.observations_rejected {
                metrics::record_observation(false);
            }
            actions
        } else {
            self.detector.set_time(now);
            self.detector.handle(event)
        };

        metrics::record_event_latency(started.elapsed().as_secs_f64());

        for action in actions {
            self.process_action(action);
        }
        self.update_detector_metrics();
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::SendToNode { node, message } => {
                metrics::record_ping_sent();
                let delivered = self
                    .nodes
                    .get(&node)
                    .is_some_and(|outlet| outlet.send(message).is_ok());
                if !delivered {
                    trace!(%node, "No live outlet for node, message dropped");
                    metrics::record_undeliverable();
                }
            }
            Action::StartTimer { id, duration } => {
                self.timers.set_timer(id, duration);
            }
            Action::CancelTimer { id } => {
                let outcome = self.timers.cancel_timer(id);
                metrics::record_cancel_outcome(outcome == CancelOutcome::Cancelled);
                // A losing cancel may be queued ahead of the timer's own
                // Timeout. The runner holds the receiver, so this cannot fail
                // while running.
                let _ = self.timer_tx.send(outcome.into_event());
            }
            Action::NotifyFailure { client, node } => {
                let notification = FailureNotification {
                    detector: self.detector.config().detector_id,
                    node,
                };
                match self.clients.get(&client) {
                    Some(outlet) if outlet.send(notification).is_ok() => {
                        metrics::record_failure_notification();
                    }
                    _ => {
                        warn!(%client, %node, "Client unreachable, failure notification lost");
                        metrics::record_undeliverable();
                    }
                }
            }
            Action::ReportPing { node } => {
                self.ping_sink.on_ping(node);
            }
            Action::ReportViolation { violation } => {
                metrics::record_violation(violation.label());
                self.violation_subscribers
                    .retain(|outlet| outlet.send(violation.clone()).is_ok());
            }
        }
    }

    fn update_detector_metrics(&mut self) {
        let stats = self.detector.stats();
        let newly_failed = stats.nodes_failed - self.nodes_failed_reported;
        self.nodes_failed_reported = stats.nodes_failed;

        let liveness = self.detector.liveness();
        metrics::set_detector_status(
            liveness.alive().len(),
            liveness.clients().len(),
            newly_failed,
        );
    }
}
