//! Production metrics using native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters.
//! Use traces for event-level granularity during investigations.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Gauge, Histogram,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for production monitoring.
pub struct Metrics {
    // === Failure detector ===
    pub pings_sent: Counter,
    pub pongs_received: Counter,
    pub nodes_failed: Counter,
    pub notifications_sent: Counter,
    pub cancel_outcomes: CounterVec,
    pub alive_nodes: Gauge,
    pub registered_clients: Gauge,

    // === Invariant monitor ===
    pub observations: CounterVec,
    pub violations: CounterVec,

    // === Runner ===
    pub event_handle_latency: Histogram,
    pub undeliverable_messages: Counter,
}

impl Metrics {
    fn new() -> Self {
        Self {
            pings_sent: register_counter!(
                "chainwatch_pings_sent_total",
                "Total pings sent to monitored nodes"
            )
            .unwrap(),

            pongs_received: register_counter!(
                "chainwatch_pongs_received_total",
                "Total ping responses received"
            )
            .unwrap(),

            nodes_failed: register_counter!(
                "chainwatch_nodes_failed_total",
                "Total nodes declared failed"
            )
            .unwrap(),

            notifications_sent: register_counter!(
                "chainwatch_failure_notifications_total",
                "Total failure notifications delivered to clients"
            )
            .unwrap(),

            cancel_outcomes: register_counter_vec!(
                "chainwatch_timer_cancel_total",
                "Round timer cancel requests by outcome",
                &["outcome"]
            )
            .unwrap(),

            alive_nodes: register_gauge!(
                "chainwatch_alive_nodes",
                "Monitored nodes currently presumed alive"
            )
            .unwrap(),

            registered_clients: register_gauge!(
                "chainwatch_registered_clients",
                "Clients registered for failure notifications"
            )
            .unwrap(),

            observations: register_counter_vec!(
                "chainwatch_observations_total",
                "Monitor observations by outcome",
                &["outcome"]
            )
            .unwrap(),

            violations: register_counter_vec!(
                "chainwatch_violations_total",
                "Reported violations by kind",
                &["kind"]
            )
            .unwrap(),

            event_handle_latency: register_histogram!(
                "chainwatch_event_handle_latency_seconds",
                "Time spent handling a single event",
                vec![0.00001, 0.0001, 0.001, 0.01, 0.1]
            )
            .unwrap(),

            undeliverable_messages: register_counter!(
                "chainwatch_undeliverable_messages_total",
                "Outbound messages with no live destination"
            )
            .unwrap(),
        }
    }
}

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Record a ping sent to a monitored node.
pub fn record_ping_sent() {
    metrics().pings_sent.inc();
}

/// Record a ping response.
pub fn record_pong_received() {
    metrics().pongs_received.inc();
}

/// Record a failure notification. Each call is one (client, node) pair.
pub fn record_failure_notification() {
    metrics().notifications_sent.inc();
}

/// Record the outcome of a round timer cancel.
pub fn record_cancel_outcome(succeeded: bool) {
    let label = if succeeded { "success" } else { "failure" };
    metrics().cancel_outcomes.with_label_values(&[label]).inc();
}

/// Update detector liveness gauges and the failed-node counter.
pub fn set_detector_status(alive: usize, clients: usize, newly_failed: u64) {
    let m = metrics();
    m.alive_nodes.set(alive as f64);
    m.registered_clients.set(clients as f64);
    if newly_failed > 0 {
        m.nodes_failed.inc_by(newly_failed as f64);
    }
}

/// Record a monitor observation as accepted or rejected.
pub fn record_observation(accepted: bool) {
    let label = if accepted { "accepted" } else { "rejected" };
    metrics().observations.with_label_values(&[label]).inc();
}

/// Record a reported violation.
pub fn record_violation(kind: &str) {
    metrics().violations.with_label_values(&[kind]).inc();
}

/// Record time spent in a single `handle` call.
pub fn record_event_latency(latency_secs: f64) {
    metrics().event_handle_latency.observe(latency_secs);
}

/// Record a message whose destination has no live channel.
pub fn record_undeliverable() {
    metrics().undeliverable_messages.inc();
}
