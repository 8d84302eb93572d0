//! Main simulator runner.
//!
//! Turns a [`SimulatorConfig`] into a scheduled deterministic simulation:
//! nodes, clients, crash plans, partitions and the optional chain workload.

use crate::config::{SimulatorConfig, SimulatorError};
use crate::report::SimulatorReport;
use crate::workload::ChainWorkload;
use chainwatch_simulation::SimulationRunner;
use chainwatch_types::ClientId;
use std::time::Duration;
use tracing::info;

/// Main simulator that sets up a scenario and collects the report.
pub struct Simulator {
    /// Underlying deterministic simulation runner.
    runner: SimulationRunner,
    config: SimulatorConfig,
    workload: Option<ChainWorkload>,
}

impl Simulator {
    /// Create a simulator and schedule everything the scenario describes.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        config.validate()?;

        let mut runner = SimulationRunner::new(config.simulation.clone(), config.seed);
        let nodes = config.node_ids();

        for client in 1..=config.clients {
            runner.register_client(ClientId(client), Duration::ZERO);
        }
        runner.start_detector(nodes.iter().copied());

        for plan in &config.crashes {
            runner.schedule_crash(plan.node, plan.at);
            if let Some(recover_at) = plan.recover_at {
                runner.schedule_recover(plan.node, recover_at);
            }
        }
        for node in &config.isolated {
            runner.network_mut().isolate_node(*node);
        }

        let workload = config
            .workload
            .clone()
            .map(|workload| ChainWorkload::new(nodes, workload));
        if let Some(workload) = &workload {
            runner.schedule_monitor_event(Duration::ZERO, workload.configure_event());
            for step in workload.steps() {
                for event in step.events {
                    runner.schedule_monitor_event(step.offset, event);
                }
            }
        }

        info!(
            nodes = config.nodes,
            clients = config.clients,
            seed = config.seed,
            crashes = config.crashes.len(),
            isolated = config.isolated.len(),
            workload = workload.is_some(),
            "Simulator created"
        );

        Ok(Self {
            runner,
            config,
            workload,
        })
    }

    /// Run for the configured duration and report.
    pub fn run(&mut self) -> SimulatorReport {
        info!(
            duration_secs = self.config.duration.as_secs_f64(),
            "Starting simulation"
        );
        self.runner.run_until(self.config.duration);
        self.report()
    }

    /// Build the report for the run so far.
    pub fn report(&self) -> SimulatorReport {
        let monitor = self.runner.monitor().stats();
        SimulatorReport {
            simulation: self.runner.report(),
            observations_accepted: monitor.observations_accepted,
            observations_rejected: monitor.observations_rejected,
            checks_run: monitor.checks_run,
        }
    }

    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn workload(&self) -> Option<&ChainWorkload> {
        self.workload.as_ref()
    }
}
