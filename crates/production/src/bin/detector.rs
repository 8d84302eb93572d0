//! Chainwatch Failure Detector
//!
//! Runs the production failure detector against in-process nodes.
//!
//! # Usage
//!
//! ```bash
//! # Monitor five nodes, make node 3 go silent after two seconds
//! chainwatch-detector --nodes 5 --silence 3 --silence-after-ms 2000
//!
//! # Shorter rounds, print Prometheus metrics on exit
//! chainwatch-detector --ping-timeout-ms 20 --round-interval-ms 200 --metrics
//! ```

use anyhow::{bail, Context, Result};
use chainwatch_detector::DetectorConfig;
use chainwatch_production::{
    encode_metrics, init_telemetry, DetectorRunner, NodeResponder, TelemetryConfig,
};
use chainwatch_types::{ClientId, DetectorId, NodeId};
use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// Chainwatch Failure Detector
///
/// Pings a set of in-process nodes and reports the ones that stop answering.
#[derive(Parser, Debug)]
#[command(name = "chainwatch-detector")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of monitored nodes (ids 1..=N)
    #[arg(long, default_value_t = 3)]
    nodes: u64,

    /// Node ids that stop answering pings (can be specified multiple times)
    #[arg(long)]
    silence: Vec<u64>,

    /// Delay before silenced nodes stop answering
    #[arg(long, default_value_t = 1500)]
    silence_after_ms: u64,

    /// How long to wait for pongs before a retry or failure
    #[arg(long, default_value_t = 100)]
    ping_timeout_ms: u64,

    /// Pause between rounds
    #[arg(long, default_value_t = 1000)]
    round_interval_ms: u64,

    /// Stop after this long (runs until Ctrl-C if unset)
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    metrics: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info,chainwatch=debug")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        default_filter: cli.log_level.clone(),
        ..Default::default()
    })?;

    if cli.nodes == 0 {
        bail!("--nodes must be at least 1");
    }
    if let Some(id) = cli.silence.iter().find(|id| **id == 0 || **id > cli.nodes) {
        bail!("--silence {id} is not a monitored node");
    }

    let config = DetectorConfig::new(DetectorId(0))
        .with_ping_timeout(Duration::from_millis(cli.ping_timeout_ms))
        .with_round_interval(Duration::from_millis(cli.round_interval_ms));
    info!(?config, nodes = cli.nodes, "Detector starting...");

    let (mut runner, handle) = DetectorRunner::new(config);
    let shutdown = runner
        .shutdown_handle()
        .context("shutdown handle already taken")?;

    let nodes: Vec<NodeId> = (1..=cli.nodes).map(NodeId).collect();
    let responders = nodes
        .iter()
        .map(|node| NodeResponder::spawn(*node, &handle))
        .collect::<Result<Vec<_>, _>>()?;

    let mut failures = handle.register_client(ClientId(0))?;
    handle.configure(nodes)?;

    let runner_task = tokio::spawn(runner.run());

    let silence_after = Duration::from_millis(cli.silence_after_ms);
    let silenced = cli.silence.clone();
    let silence_task = tokio::spawn(async move {
        tokio::time::sleep(silence_after).await;
        for responder in &responders {
            if silenced.contains(&responder.node().0) {
                warn!(node = %responder.node(), "Silencing node");
                responder.pause();
            }
        }
        // Keep responders alive until the process exits.
        std::future::pending::<()>().await;
    });

    let deadline = async {
        match cli.duration_ms {
            Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(notification) = failures.recv() => {
                info!(
                    node = %notification.node,
                    detector = %notification.detector,
                    "Node failed"
                );
            }
            _ = &mut deadline => {
                info!("Duration elapsed");
                break;
            }
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C");
                break;
            }
        }
    }

    shutdown.shutdown();
    silence_task.abort();
    let runner = runner_task.await.context("runner task panicked")??;

    let stats = runner.detector().stats();
    info!(
        rounds = stats.rounds_completed,
        pings = stats.pings_sent,
        failed = stats.nodes_failed,
        fast_path = stats.fast_path_rounds,
        cancel_races = stats.cancel_races,
        "Detector stopped"
    );

    if cli.metrics {
        print!("{}", encode_metrics()?);
    }

    Ok(())
}
