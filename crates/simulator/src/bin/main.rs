//! Chainwatch Deterministic Simulator CLI
//!
//! Run failure detection and chain monitoring scenarios with configurable
//! faults. Given the same seed, every run produces the same report.
//!
//! # Example
//!
//! ```bash
//! # Three nodes, node 2 crashes at 1.5s, run for 10 seconds
//! chainwatch-sim --nodes 3 --crash 2@1500 --duration 10
//!
//! # Lossy network with cancel races, JSON report
//! chainwatch-sim -n 5 --loss 0.05 --cancel-race 0.2 --json
//!
//! # Chain workload with an injected fault
//! chainwatch-sim --workload --fault successor-ahead
//! ```

use anyhow::{Context, Result};
use chainwatch_detector::DetectorConfig;
use chainwatch_simulation::{NetworkConfig, SimulationConfig};
use chainwatch_simulator::{Simulator, SimulatorConfig, WorkloadConfig, WorkloadFault};
use chainwatch_types::{DetectorId, NodeId};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A node and a time in milliseconds, written `NODE@MS`.
#[derive(Debug, Clone, Copy)]
struct NodeAt {
    node: NodeId,
    at: Duration,
}

fn parse_node_at(s: &str) -> Result<NodeAt, String> {
    let (node, ms) = s
        .split_once('@')
        .ok_or_else(|| format!("expected NODE@MS, got '{s}'"))?;
    let node = node
        .parse::<u64>()
        .map_err(|e| format!("bad node id '{node}': {e}"))?;
    let ms = ms
        .parse::<u64>()
        .map_err(|e| format!("bad time '{ms}': {e}"))?;
    Ok(NodeAt {
        node: NodeId(node),
        at: Duration::from_millis(ms),
    })
}

/// Chainwatch Deterministic Simulator
///
/// Runs the failure detector and invariant monitor in a fully deterministic
/// environment.
#[derive(Parser, Debug)]
#[command(name = "chainwatch-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of monitored nodes (ids 1..=N, also the chain order)
    #[arg(short = 'n', long, default_value = "3")]
    nodes: u64,

    /// Number of registered clients
    #[arg(short = 'c', long, default_value = "1")]
    clients: u64,

    /// Simulated duration in seconds
    #[arg(short = 'd', long, default_value = "10")]
    duration: u64,

    /// Random seed for deterministic simulation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Crash a node at a time, as NODE@MS (repeatable)
    #[arg(long, value_parser = parse_node_at)]
    crash: Vec<NodeAt>,

    /// Recover a crashed node at a time, as NODE@MS (repeatable)
    #[arg(long, value_parser = parse_node_at)]
    recover: Vec<NodeAt>,

    /// Partition a node from the detector for the whole run (repeatable)
    #[arg(long)]
    isolate: Vec<u64>,

    /// One-way network latency in milliseconds
    #[arg(long, default_value = "10")]
    latency_ms: u64,

    /// Packet loss rate (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    loss: f64,

    /// Probability that a timer cancel loses the race (0.0-1.0)
    #[arg(long, default_value = "0.0")]
    cancel_race: f64,

    /// Ping timeout in milliseconds
    #[arg(long, default_value = "100")]
    ping_timeout_ms: u64,

    /// Pause between rounds in milliseconds
    #[arg(long, default_value = "1000")]
    round_interval_ms: u64,

    /// Drive a chain replication workload through the invariant monitor
    #[arg(long)]
    workload: bool,

    /// Updates accepted by the chain head
    #[arg(long, default_value = "4")]
    updates: usize,

    /// Fault injected into the workload: none, phantom-in-flight, successor-ahead
    #[arg(long, default_value = "none")]
    fault: WorkloadFault,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

impl Args {
    fn to_config(&self) -> SimulatorConfig {
        let detector = DetectorConfig::new(DetectorId(0))
            .with_ping_timeout(Duration::from_millis(self.ping_timeout_ms))
            .with_round_interval(Duration::from_millis(self.round_interval_ms));
        let simulation = SimulationConfig::default()
            .with_network(NetworkConfig {
                latency: Duration::from_millis(self.latency_ms),
                packet_loss_rate: self.loss.clamp(0.0, 1.0),
                ..Default::default()
            })
            .with_detector(detector)
            .with_cancel_race_probability(self.cancel_race);

        let mut config = SimulatorConfig::new(self.nodes)
            .with_seed(self.seed)
            .with_clients(self.clients)
            .with_duration(Duration::from_secs(self.duration))
            .with_simulation(simulation);

        for crash in &self.crash {
            let recovery = self.recover.iter().find(|r| r.node == crash.node);
            config = match recovery {
                Some(r) => config.with_crash_and_recovery(crash.node, crash.at, r.at),
                None => config.with_crash(crash.node, crash.at),
            };
        }
        for node in &self.isolate {
            config = config.with_isolated(NodeId(*node));
        }
        if self.workload {
            config = config.with_workload(
                WorkloadConfig::default()
                    .with_updates(self.updates)
                    .with_fault(self.fault),
            );
        }
        config
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,chainwatch_simulator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!(
        nodes = args.nodes,
        clients = args.clients,
        duration_secs = args.duration,
        seed = args.seed,
        loss = args.loss,
        cancel_race = args.cancel_race,
        workload = args.workload,
        "Starting simulation"
    );

    let mut simulator =
        Simulator::new(args.to_config()).context("Failed to create simulator")?;
    let report = simulator.run();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        report.print_summary();
    }

    Ok(())
}
