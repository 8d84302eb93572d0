//! Scenario driver for the chainwatch deterministic simulation.
//!
//! Describes a run declaratively ([`SimulatorConfig`]), schedules it on a
//! [`chainwatch_simulation::SimulationRunner`], and summarizes the outcome
//! ([`SimulatorReport`]). The `chainwatch-sim` binary is a thin CLI over
//! this crate.

mod config;
mod report;
mod runner;
mod workload;

pub use config::{CrashPlan, SimulatorConfig, SimulatorError};
pub use report::SimulatorReport;
pub use runner::Simulator;
pub use workload::{ChainWorkload, WorkloadConfig, WorkloadFault, WorkloadStep};
