//! Failure detector configuration.

use chainwatch_types::DetectorId;
use std::time::Duration;

/// Configuration for the failure detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Identity carried in outgoing pings.
    pub detector_id: DetectorId,

    /// Timer duration requested on every ping attempt.
    pub ping_timeout: Duration,

    /// Timer duration requested between rounds.
    pub round_interval: Duration,

    /// Ping attempts per round before silent nodes are declared failed.
    pub max_attempts: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detector_id: DetectorId(0),
            ping_timeout: Duration::from_millis(100),
            round_interval: Duration::from_millis(1000),
            max_attempts: 2,
        }
    }
}

impl DetectorConfig {
    /// Create a default configuration for the given detector.
    pub fn new(detector_id: DetectorId) -> Self {
        Self {
            detector_id,
            ..Default::default()
        }
    }

    /// Set the ping timeout.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Set the interval between rounds.
    pub fn with_round_interval(mut self, interval: Duration) -> Self {
        self.round_interval = interval;
        self
    }

    /// Set the number of attempts per round. At least one attempt is always made.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}
