//! Chain replication workload for the invariant monitor.
//!
//! Generates the observations a healthy chain would broadcast while a fixed
//! number of updates travel from head to tail, one hop per step. A fault can
//! be injected into one step's observations to exercise violation reporting.

use chainwatch_core::Event;
use chainwatch_monitor::SCRATCH_CAPACITY;
use chainwatch_types::{NodeId, SentLog, SeqId};
use serde::Serialize;
use std::time::Duration;

/// A deliberate corruption of the reported observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WorkloadFault {
    #[default]
    None,
    /// The head reports an in-flight update it never committed.
    PhantomInFlight,
    /// The second server reports an update its predecessor never committed.
    SuccessorAhead,
}

impl std::str::FromStr for WorkloadFault {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(WorkloadFault::None),
            "phantom-in-flight" => Ok(WorkloadFault::PhantomInFlight),
            "successor-ahead" => Ok(WorkloadFault::SuccessorAhead),
            other => Err(format!(
                "unknown fault '{other}' (expected none, phantom-in-flight or successor-ahead)"
            )),
        }
    }
}

/// Workload configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Updates accepted by the head. Capped at the monitor's scratch capacity
    /// so that every reconciliation fits.
    pub updates: usize,
    /// Simulated time between steps.
    pub step_interval: Duration,
    pub fault: WorkloadFault,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            updates: 4,
            step_interval: Duration::from_millis(50),
            fault: WorkloadFault::None,
        }
    }
}

impl WorkloadConfig {
    pub fn with_updates(mut self, updates: usize) -> Self {
        self.updates = updates.clamp(1, SCRATCH_CAPACITY);
        self
    }

    pub fn with_step_interval(mut self, interval: Duration) -> Self {
        self.step_interval = interval;
        self
    }

    pub fn with_fault(mut self, fault: WorkloadFault) -> Self {
        self.fault = fault;
        self
    }
}

/// One batch of observations, all delivered at `offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadStep {
    pub offset: Duration,
    pub events: Vec<Event>,
}

/// Replays update propagation through a chain of servers.
#[derive(Debug, Clone)]
pub struct ChainWorkload {
    servers: Vec<NodeId>,
    config: WorkloadConfig,
}

impl ChainWorkload {
    pub fn new(servers: Vec<NodeId>, config: WorkloadConfig) -> Self {
        let updates = config.updates.clamp(1, SCRATCH_CAPACITY);
        Self {
            servers,
            config: WorkloadConfig { updates, ..config },
        }
    }

    pub fn servers(&self) -> &[NodeId] {
        &self.servers
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// The configuration event that must precede every step.
    pub fn configure_event(&self) -> Event {
        Event::ConfigureMonitor {
            servers: self.servers.clone(),
        }
    }

    /// Generate every step until the tail has committed all updates.
    ///
    /// Within a step, histories are reported head to tail before any sent
    /// log, so each reconciliation sees one consistent snapshot.
    pub fn steps(&self) -> Vec<WorkloadStep> {
        let n = self.servers.len();
        if n == 0 {
            return Vec::new();
        }

        let mut histories: Vec<Vec<SeqId>> = vec![Vec::new(); n];
        let mut next_seq: SeqId = 1;
        let mut fault_pending = self.config.fault != WorkloadFault::None;
        let mut steps = Vec::new();
        let mut index: u32 = 0;

        while histories[n - 1].len() < self.config.updates {
            // Forward one update per link, tail side first so nothing moves
            // more than one hop per step.
            for i in (0..n - 1).rev() {
                let forwarded = histories[i + 1].len();
                if let Some(&seq) = histories[i].get(forwarded) {
                    histories[i + 1].push(seq);
                }
            }
            if histories[0].len() < self.config.updates {
                histories[0].push(next_seq);
                next_seq += 1;
            }

            let committed = histories[n - 1].len();
            let mut reported_histories = histories.clone();
            let mut sent: Vec<Vec<SeqId>> = histories
                .iter()
                .map(|history| history[committed..].to_vec())
                .collect();

            if fault_pending {
                fault_pending = !self.inject(&mut reported_histories, &mut sent, next_seq);
            }

            let mut events = Vec::with_capacity(2 * n);
            for (server, history) in self.servers.iter().zip(reported_histories) {
                events.push(Event::HistoryObserved {
                    server: *server,
                    history,
                });
            }
            for (server, ids) in self.servers.iter().zip(sent) {
                events.push(Event::SentObserved {
                    server: *server,
                    sent_log: ids.into_iter().map(SentLog::new).collect(),
                });
            }

            index += 1;
            steps.push(WorkloadStep {
                offset: self.config.step_interval * index,
                events,
            });
        }

        steps
    }

    /// Apply the configured fault to this step if it is observable here.
    fn inject(
        &self,
        histories: &mut [Vec<SeqId>],
        sent: &mut [Vec<SeqId>],
        next_seq: SeqId,
    ) -> bool {
        if histories.len() < 2 {
            return false;
        }
        match self.config.fault {
            WorkloadFault::None => false,
            WorkloadFault::PhantomInFlight => match sent[0].last_mut() {
                Some(newest) => {
                    *newest += 1;
                    true
                }
                None => false,
            },
            WorkloadFault::SuccessorAhead => {
                histories[1].push(next_seq + 100);
                true
            }
        }
    }
}
