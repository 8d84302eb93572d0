//! Scenario configuration.

use crate::workload::WorkloadConfig;
use chainwatch_simulation::SimulationConfig;
use chainwatch_types::NodeId;
use std::time::Duration;
use thiserror::Error;

/// Errors from scenario setup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulatorError {
    #[error("scenario needs at least one monitored node")]
    NoNodes,
    #[error("{0} is not a monitored node")]
    UnknownNode(NodeId),
}

/// A node that stops answering pings at `at`, and optionally comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashPlan {
    pub node: NodeId,
    pub at: Duration,
    pub recover_at: Option<Duration>,
}

/// Complete description of one simulated run.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Monitored nodes are `NodeId(1)..=NodeId(nodes)`.
    pub nodes: u64,
    /// Clients are `ClientId(1)..=ClientId(clients)`, all registered at time zero.
    pub clients: u64,
    pub seed: u64,
    /// Simulated time to run for.
    pub duration: Duration,
    pub crashes: Vec<CrashPlan>,
    /// Nodes cut off from the detector for the whole run.
    pub isolated: Vec<NodeId>,
    pub simulation: SimulationConfig,
    /// Chain workload over the monitored nodes, head first.
    pub workload: Option<WorkloadConfig>,
}

impl SimulatorConfig {
    pub fn new(nodes: u64) -> Self {
        Self {
            nodes,
            clients: 1,
            seed: 42,
            duration: Duration::from_secs(10),
            crashes: Vec::new(),
            isolated: Vec::new(),
            simulation: SimulationConfig::default(),
            workload: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_clients(mut self, clients: u64) -> Self {
        self.clients = clients;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_crash(mut self, node: NodeId, at: Duration) -> Self {
        self.crashes.push(CrashPlan {
            node,
            at,
            recover_at: None,
        });
        self
    }

    pub fn with_crash_and_recovery(
        mut self,
        node: NodeId,
        at: Duration,
        recover_at: Duration,
    ) -> Self {
        self.crashes.push(CrashPlan {
            node,
            at,
            recover_at: Some(recover_at),
        });
        self
    }

    pub fn with_isolated(mut self, node: NodeId) -> Self {
        self.isolated.push(node);
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = Some(workload);
        self
    }

    /// The monitored nodes, in chain order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        (1..=self.nodes).map(NodeId).collect()
    }

    /// Check that every fault targets a monitored node.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.nodes == 0 {
            return Err(SimulatorError::NoNodes);
        }
        let known = |node: NodeId| (1..=self.nodes).contains(&node.0);
        let targets = self
            .crashes
            .iter()
            .map(|plan| plan.node)
            .chain(self.isolated.iter().copied());
        for node in targets {
            if !known(node) {
                return Err(SimulatorError::UnknownNode(node));
            }
        }
        Ok(())
    }
}
