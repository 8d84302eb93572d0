//! End-to-end failure detection scenarios.
//!
//! Each test scripts a set of monitored nodes, runs the detector against
//! the simulated network and timer, and checks what clients were told.

use chainwatch_core::Event;
use chainwatch_detector::{DetectorConfig, DetectorState};
use chainwatch_simulation::{NetworkConfig, SimulationConfig, SimulationRunner};
use chainwatch_types::{ClientId, NodeId};
use std::time::Duration;
use tracing_test::traced_test;

const X: NodeId = NodeId(1);
const Y: NodeId = NodeId(2);
const Z: NodeId = NodeId(3);

fn test_config() -> SimulationConfig {
    SimulationConfig::default().with_network(NetworkConfig {
        latency: Duration::from_millis(10),
        jitter_fraction: 0.1,
        ..Default::default()
    })
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// X never answers: after two timeouts every registered client hears about
/// it exactly once, and X is never pinged again.
#[traced_test]
#[test]
fn test_silent_node_reported_once() {
    let mut runner = SimulationRunner::new(test_config(), 42);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.register_client(ClientId(2), Duration::ZERO);
    runner.start_detector([X, Y, Z]);
    runner.crash_node(X);

    runner.run_until(ms(150));
    assert!(runner.notifications().is_empty(), "one timeout is not enough");

    runner.run_until(ms(250));
    assert_eq!(runner.failures_for(ClientId(1)), vec![X]);
    assert_eq!(runner.failures_for(ClientId(2)), vec![X]);
    assert_eq!(runner.ping_sink().count(X), 2);

    runner.run_until(Duration::from_secs(5));
    assert_eq!(runner.notifications().len(), 2);
    assert_eq!(runner.ping_sink().count(X), 2, "failed node pinged again");
    assert!(runner.ping_sink().count(Y) >= 5);
    assert_eq!(runner.report().alive, vec![Y, Z]);
}

#[traced_test]
#[test]
fn test_healthy_nodes_take_fast_path() {
    let mut runner = SimulationRunner::new(test_config(), 7);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y, Z]);

    runner.run_until(Duration::from_secs(5));

    let stats = runner.detector().stats();
    assert!(runner.notifications().is_empty());
    assert!(stats.rounds_completed >= 4, "rounds: {}", stats.rounds_completed);
    assert_eq!(stats.fast_path_rounds, stats.rounds_completed);
    assert_eq!(stats.cancel_races, 0);
    assert_eq!(runner.stats().timers_cancelled, stats.fast_path_rounds);
}

/// Every cancel loses the race: the pending timeout is processed with the
/// ordinary attempt counting and nobody is declared failed.
#[traced_test]
#[test]
fn test_cancel_race_never_fails_responsive_nodes() {
    let config = test_config().with_cancel_race_probability(1.0);
    let mut runner = SimulationRunner::new(config, 3);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y, Z]);

    runner.run_until(Duration::from_secs(5));

    let stats = runner.detector().stats();
    assert!(runner.notifications().is_empty());
    assert!(stats.cancel_races >= 4);
    assert_eq!(stats.fast_path_rounds, 0);
    assert_eq!(stats.cancel_races, runner.stats().cancel_failures);
    assert_eq!(stats.nodes_failed, 0);
}

#[traced_test]
#[test]
fn test_late_client_gets_no_replay() {
    let mut runner = SimulationRunner::new(test_config(), 11);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y]);
    runner.crash_node(X);
    runner.register_client(ClientId(2), Duration::from_secs(1));

    runner.run_until(Duration::from_secs(3));

    assert_eq!(runner.failures_for(ClientId(1)), vec![X]);
    assert!(runner.failures_for(ClientId(2)).is_empty());
}

#[traced_test]
#[test]
fn test_unregistered_client_not_notified() {
    let mut runner = SimulationRunner::new(test_config(), 5);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.register_client(ClientId(2), Duration::ZERO);
    runner.start_detector([X, Y]);
    runner.unregister_client(ClientId(2), ms(50));
    runner.schedule_crash(Y, ms(1500));

    runner.run_until(Duration::from_secs(4));

    assert_eq!(runner.failures_for(ClientId(1)), vec![Y]);
    assert!(runner.failures_for(ClientId(2)).is_empty());
}

#[traced_test]
#[test]
fn test_crash_mid_run_detected_in_next_round() {
    let mut runner = SimulationRunner::new(test_config(), 9);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y, Z]);
    runner.schedule_crash(Y, ms(1500));

    runner.run_until(Duration::from_secs(4));

    let notices = runner.notifications();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].node, Y);
    assert!(notices[0].time > ms(1500));
    assert!(runner.detector().liveness().is_alive(X));
}

#[traced_test]
#[test]
fn test_partitioned_node_presumed_failed() {
    let mut runner = SimulationRunner::new(test_config(), 13);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y, Z]);
    runner.network_mut().isolate_node(Z);

    runner.run_until(Duration::from_secs(2));

    assert_eq!(runner.failures_for(ClientId(1)), vec![Z]);
    assert!(runner.stats().messages_dropped_partition >= 2);
    // The node itself never crashed.
    assert!(runner.is_node_up(Z));
}

/// A recovered node is only pinged again once the monitored set is
/// replaced.
#[traced_test]
#[test]
fn test_reconfiguration_revives_failed_node() {
    let mut runner = SimulationRunner::new(test_config(), 17);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y]);
    runner.crash_node(X);

    runner.run_until(Duration::from_secs(2));
    assert_eq!(runner.failures_for(ClientId(1)), vec![X]);

    runner.recover_node(X);
    runner.run_until(Duration::from_secs(3));
    assert_eq!(runner.ping_sink().count(X), 2);

    runner.schedule_detector_event(
        Duration::ZERO,
        Event::ConfigureDetector {
            nodes: [X, Y].into_iter().collect(),
        },
    );
    runner.run_until(Duration::from_secs(6));

    assert!(runner.ping_sink().count(X) > 2);
    assert!(runner.pongs_sent(X) > 0);
    assert_eq!(runner.failures_for(ClientId(1)), vec![X]);
    assert!(runner.detector().liveness().is_alive(X));
}

#[traced_test]
#[test]
fn test_total_loss_fails_everyone_in_one_round() {
    let mut config = test_config();
    config.network.packet_loss_rate = 1.0;
    let mut runner = SimulationRunner::new(config, 21);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X, Y, Z]);

    runner.run_until(ms(250));

    assert_eq!(runner.failures_for(ClientId(1)), vec![X, Y, Z]);
    assert_eq!(runner.detector().state(), DetectorState::Reset);
    assert_eq!(runner.stats().messages_sent, 0);
}

#[traced_test]
#[test]
fn test_custom_timer_durations() {
    let detector = DetectorConfig::default()
        .with_ping_timeout(ms(50))
        .with_round_interval(ms(200));
    let mut runner = SimulationRunner::new(test_config().with_detector(detector), 23);
    runner.register_client(ClientId(1), Duration::ZERO);
    runner.start_detector([X]);
    runner.crash_node(X);

    runner.run_until(ms(120));
    assert_eq!(runner.failures_for(ClientId(1)), vec![X]);

    // Empty rounds keep ticking at the configured interval.
    runner.run_until(Duration::from_secs(1));
    assert!(runner.detector().stats().rounds_completed >= 4);
}
