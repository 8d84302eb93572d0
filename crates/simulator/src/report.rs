//! Final simulator report.

use chainwatch_simulation::SimulationReport;
use serde::Serialize;

/// Simulation report plus the invariant monitor's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorReport {
    #[serde(flatten)]
    pub simulation: SimulationReport,
    pub observations_accepted: u64,
    pub observations_rejected: u64,
    pub checks_run: u64,
}

impl SimulatorReport {
    /// Fraction of completed rounds that ended through a successful cancel.
    pub fn fast_path_ratio(&self) -> f64 {
        let rounds = self.simulation.rounds_completed;
        if rounds > 0 {
            self.simulation.fast_path_rounds as f64 / rounds as f64
        } else {
            0.0
        }
    }

    /// Print a summary of the report.
    pub fn print_summary(&self) {
        let sim = &self.simulation;
        let stats = &sim.stats;

        println!("\n═══════════════════════════════════════════");
        println!("           SIMULATION REPORT                ");
        println!("═══════════════════════════════════════════");
        println!();
        println!("Failure detector:");
        println!("  Rounds:        {}", sim.rounds_completed);
        println!(
            "  Fast path:     {} ({:.1}%)",
            sim.fast_path_rounds,
            self.fast_path_ratio() * 100.0
        );
        println!("  Cancel races:  {}", sim.cancel_races);
        println!("  Pings sent:    {}", sim.pings_sent);
        println!("  Nodes failed:  {}", sim.nodes_failed);
        println!(
            "  Alive:         {}",
            sim.alive
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!();
        println!("Notifications:");
        if sim.failures.is_empty() {
            println!("  (none)");
        }
        for notice in &sim.failures {
            println!(
                "  {:>10.3}s  {} <- {} failed",
                notice.time.as_secs_f64(),
                notice.client,
                notice.node
            );
        }
        println!();
        println!("Invariant monitor:");
        println!("  Accepted:      {}", self.observations_accepted);
        println!("  Rejected:      {}", self.observations_rejected);
        println!("  Checks run:    {}", self.checks_run);
        println!("  Violations:    {}", sim.violations.len());
        for record in &sim.violations {
            println!(
                "  {:>10.3}s  {}",
                record.time.as_secs_f64(),
                record.violation
            );
        }
        println!();
        println!("Network:");
        println!("  Delivered:     {}", stats.messages_sent);
        println!("  Dropped:       {}", stats.messages_dropped());
        println!("  Delivery rate: {:.2}%", stats.delivery_rate() * 100.0);
        println!();
        println!("Seed: {}  Duration: {:?}", sim.seed, sim.simulated_time);
        println!("═══════════════════════════════════════════\n");
    }
}
