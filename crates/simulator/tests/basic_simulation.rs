//! Basic simulation test.
//!
//! Verifies that the simulator schedules scenarios correctly and that
//! reports are reproducible.

use chainwatch_simulator::{Simulator, SimulatorConfig, WorkloadConfig, WorkloadFault};
use chainwatch_types::{ClientId, InvariantKind, NodeId, Violation};
use std::time::Duration;

#[test]
fn test_crash_scenario() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let config = SimulatorConfig::new(3)
        .with_clients(2)
        .with_seed(42)
        .with_duration(Duration::from_secs(5))
        .with_crash(NodeId(2), Duration::from_millis(1500));

    let mut simulator = Simulator::new(config).expect("Failed to create simulator");
    let report = simulator.run();

    assert_eq!(report.simulation.nodes_failed, 1);
    assert_eq!(report.simulation.alive, vec![NodeId(1), NodeId(3)]);
    assert_eq!(report.simulation.failures.len(), 2);
    assert_eq!(
        simulator.runner().failures_for(ClientId(1)),
        vec![NodeId(2)]
    );
    assert_eq!(
        simulator.runner().failures_for(ClientId(2)),
        vec![NodeId(2)]
    );
    assert!(report.simulation.failures[0].time > Duration::from_millis(1500));
    assert!(report.simulation.rounds_completed >= 4);
}

#[test]
fn test_isolated_node_fails_without_crashing() {
    let config = SimulatorConfig::new(2)
        .with_duration(Duration::from_secs(2))
        .with_isolated(NodeId(1));

    let mut simulator = Simulator::new(config).expect("Failed to create simulator");
    let report = simulator.run();

    assert_eq!(report.simulation.alive, vec![NodeId(2)]);
    assert!(simulator.runner().is_node_up(NodeId(1)));
}

#[test]
fn test_recovered_node_stays_failed_without_reconfiguration() {
    let config = SimulatorConfig::new(2)
        .with_duration(Duration::from_secs(5))
        .with_crash_and_recovery(NodeId(1), Duration::ZERO, Duration::from_secs(2));

    let mut simulator = Simulator::new(config).expect("Failed to create simulator");
    let report = simulator.run();

    assert_eq!(report.simulation.nodes_failed, 1);
    assert_eq!(report.simulation.alive, vec![NodeId(2)]);
    assert!(simulator.runner().is_node_up(NodeId(1)));
    assert_eq!(simulator.runner().ping_sink().count(NodeId(1)), 2);
}

#[test]
fn test_healthy_workload_is_clean() {
    let config = SimulatorConfig::new(3)
        .with_duration(Duration::from_secs(2))
        .with_workload(WorkloadConfig::default().with_updates(5));

    let mut simulator = Simulator::new(config).expect("Failed to create simulator");
    let report = simulator.run();

    let steps = simulator.workload().expect("workload").steps().len() as u64;
    assert!(report.simulation.violations.is_empty());
    assert_eq!(report.observations_accepted, steps * 6);
    assert_eq!(report.observations_rejected, 0);
    assert!(report.checks_run > 0);
    assert!(report.simulation.failures.is_empty());
}

#[test]
fn test_workload_fault_reported() {
    let config = SimulatorConfig::new(3)
        .with_duration(Duration::from_secs(2))
        .with_workload(WorkloadConfig::default().with_fault(WorkloadFault::SuccessorAhead));

    let mut simulator = Simulator::new(config).expect("Failed to create simulator");
    let report = simulator.run();

    assert!(report.simulation.violations.iter().any(|record| matches!(
        record.violation,
        Violation::InvariantViolated {
            kind: InvariantKind::UpdatePropagation,
            ..
        }
    )));
}

#[test]
fn test_same_seed_same_json() {
    let config = || {
        SimulatorConfig::new(4)
            .with_seed(7)
            .with_duration(Duration::from_secs(3))
            .with_crash(NodeId(4), Duration::from_millis(800))
            .with_workload(WorkloadConfig::default())
    };

    let first = Simulator::new(config()).expect("create").run();
    let second = Simulator::new(config()).expect("create").run();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
}

#[test]
fn test_invalid_scenario_rejected() {
    let config = SimulatorConfig::new(2).with_crash(NodeId(9), Duration::ZERO);
    assert!(Simulator::new(config).is_err());
}
