//! Simulation configuration.

use crate::network::NetworkConfig;
use chainwatch_detector::DetectorConfig;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Network conditions between the detector and the monitored nodes.
    pub network: NetworkConfig,

    /// Failure detector settings.
    pub detector: DetectorConfig,

    /// Probability (0.0 - 1.0) that a cancel request loses the race against
    /// the timer, i.e. the timer fires and `CancelFailure` is returned.
    pub cancel_race_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            detector: DetectorConfig::default(),
            cancel_race_probability: 0.0,
        }
    }
}

impl SimulationConfig {
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Set the cancel race probability, clamped to `0.0..=1.0`.
    pub fn with_cancel_race_probability(mut self, probability: f64) -> Self {
        self.cancel_race_probability = probability.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder_clamps_probability() {
        let config = SimulationConfig::default().with_cancel_race_probability(3.0);
        assert_eq!(config.cancel_race_probability, 1.0);

        let config = config
            .with_cancel_race_probability(-1.0)
            .with_detector(DetectorConfig::default().with_ping_timeout(Duration::from_millis(5)));
        assert_eq!(config.cancel_race_probability, 0.0);
        assert_eq!(config.detector.ping_timeout, Duration::from_millis(5));
    }
}
