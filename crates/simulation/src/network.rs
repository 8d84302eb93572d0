//! Simulated network with deterministic latency, packet loss, and partitions.

use chainwatch_types::NodeId;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// A party that sends or receives messages in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// The failure detector.
    Detector,
    /// A monitored node.
    Node(NodeId),
}

/// Configuration for simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Base one-way latency.
    pub latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Messages are dropped with this probability.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(10),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.0,
        }
    }
}

/// Simulated network for deterministic message delivery.
///
/// Supports:
/// - Configurable latency with jitter
/// - Packet loss (probabilistic message drops)
/// - Network partitions (blocking communication between endpoint pairs)
/// - FIFO delivery per directed link
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Partitioned endpoint pairs. If (a, b) is in this set, messages from a to b are dropped.
    partitions: HashSet<(Endpoint, Endpoint)>,
    /// Latest scheduled delivery per directed link.
    last_delivery: HashMap<(Endpoint, Endpoint), Duration>,
}

impl SimulatedNetwork {
    /// Create a new simulated network.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            partitions: HashSet::new(),
            last_delivery: HashMap::new(),
        }
    }

    // ─── Partition Management ───

    /// Check if a message from `from` to `to` would be dropped by a partition.
    pub fn is_partitioned(&self, from: Endpoint, to: Endpoint) -> bool {
        self.partitions.contains(&(from, to))
    }

    /// Create a unidirectional partition: messages from `from` to `to` are dropped.
    pub fn partition_unidirectional(&mut self, from: Endpoint, to: Endpoint) {
        self.partitions.insert((from, to));
    }

    /// Create a bidirectional partition between two endpoints.
    pub fn partition_bidirectional(&mut self, a: Endpoint, b: Endpoint) {
        self.partitions.insert((a, b));
        self.partitions.insert((b, a));
    }

    /// Cut a monitored node off from the detector in both directions.
    pub fn isolate_node(&mut self, node: NodeId) {
        self.partition_bidirectional(Endpoint::Detector, Endpoint::Node(node));
    }

    /// Heal a unidirectional partition.
    pub fn heal_unidirectional(&mut self, from: Endpoint, to: Endpoint) {
        self.partitions.remove(&(from, to));
    }

    /// Heal a bidirectional partition between two endpoints.
    pub fn heal_bidirectional(&mut self, a: Endpoint, b: Endpoint) {
        self.partitions.remove(&(a, b));
        self.partitions.remove(&(b, a));
    }

    /// Heal all partitions - restore full network connectivity.
    pub fn heal_all(&mut self) {
        self.partitions.clear();
    }

    /// Get the number of active partition pairs.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    // ─── Packet Loss ───

    /// Check if a packet should be dropped based on the configured loss rate.
    pub fn should_drop_packet(&self, rng: &mut ChaCha8Rng) -> bool {
        self.config.packet_loss_rate > 0.0 && rng.gen::<f64>() < self.config.packet_loss_rate
    }

    /// Set the packet loss rate (0.0 - 1.0).
    pub fn set_packet_loss_rate(&mut self, rate: f64) {
        self.config.packet_loss_rate = rate.clamp(0.0, 1.0);
    }

    pub fn packet_loss_rate(&self) -> f64 {
        self.config.packet_loss_rate
    }

    // ─── Latency ───

    /// Sample a one-way latency.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.latency;
        let jitter_range = base.as_secs_f64() * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        let latency_secs = (base.as_secs_f64() + jitter).max(0.0001);

        Duration::from_secs_f64(latency_secs)
    }

    /// Pick the delivery time for a message sent at `now`.
    ///
    /// Never earlier than the previous delivery on the same directed link, so
    /// jitter cannot reorder messages between two parties.
    pub fn delivery_time(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        now: Duration,
        rng: &mut ChaCha8Rng,
    ) -> Duration {
        let proposed = now + self.sample_latency(rng);
        let last = self.last_delivery.entry((from, to)).or_default();
        let time = proposed.max(*last);
        *last = time;
        time
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const A: Endpoint = Endpoint::Node(NodeId(1));
    const B: Endpoint = Endpoint::Node(NodeId(2));

    #[test]
    fn test_latency_deterministic() {
        let network = SimulatedNetwork::new(NetworkConfig::default());
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);

        assert_eq!(
            network.sample_latency(&mut rng1),
            network.sample_latency(&mut rng2),
            "Same seed should produce same latency"
        );
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let network = SimulatedNetwork::new(NetworkConfig {
            latency: Duration::from_millis(7),
            jitter_fraction: 0.0,
            ..Default::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(network.sample_latency(&mut rng), Duration::from_millis(7));
    }

    #[test]
    fn test_unidirectional_partition() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default());
        assert!(!network.is_partitioned(A, B));

        network.partition_unidirectional(A, B);
        assert!(network.is_partitioned(A, B));
        assert!(!network.is_partitioned(B, A));

        network.heal_unidirectional(A, B);
        assert!(!network.is_partitioned(A, B));
    }

    #[test]
    fn test_isolate_node() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default());
        network.isolate_node(NodeId(1));

        assert!(network.is_partitioned(Endpoint::Detector, A));
        assert!(network.is_partitioned(A, Endpoint::Detector));
        assert!(!network.is_partitioned(Endpoint::Detector, B));

        network.heal_bidirectional(Endpoint::Detector, A);
        assert_eq!(network.partition_count(), 0);

        network.isolate_node(NodeId(2));
        network.heal_all();
        assert_eq!(network.partition_count(), 0);
    }

    #[test]
    fn test_packet_loss_rate() {
        let mut network = SimulatedNetwork::new(NetworkConfig {
            packet_loss_rate: 0.5,
            ..Default::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let iterations = 10000;
        let drops = (0..iterations)
            .filter(|_| network.should_drop_packet(&mut rng))
            .count();
        let drop_rate = drops as f64 / iterations as f64;
        assert!(
            (0.45..0.55).contains(&drop_rate),
            "Expected ~50% drop rate, got {:.2}%",
            drop_rate * 100.0
        );

        network.set_packet_loss_rate(1.5);
        assert_eq!(network.packet_loss_rate(), 1.0);
        network.set_packet_loss_rate(-0.5);
        assert_eq!(network.packet_loss_rate(), 0.0);
        for _ in 0..100 {
            assert!(!network.should_drop_packet(&mut rng));
        }
    }

    #[test]
    fn test_fifo_per_link() {
        let mut network = SimulatedNetwork::new(NetworkConfig {
            latency: Duration::from_millis(10),
            jitter_fraction: 0.9,
            ..Default::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut last = Duration::ZERO;
        for step in 0..200u64 {
            let now = Duration::from_micros(step * 100);
            let time = network.delivery_time(Endpoint::Detector, A, now, &mut rng);
            assert!(time >= last, "delivery reordered on a single link");
            assert!(time > now);
            last = time;
        }
    }
}
