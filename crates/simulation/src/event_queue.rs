//! Ordering key for the simulation event queue.

use chainwatch_core::EventPriority;
use std::time::Duration;

/// Key for deterministic event ordering.
///
/// Events are ordered by time, then priority, then insertion sequence. The
/// sequence number is unique per runner, so two keys never compare equal and
/// deliveries scheduled for the same instant keep their scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    /// Simulated time at which the event is delivered.
    pub time: Duration,
    /// Priority within the same instant.
    pub priority: EventPriority,
    /// Insertion order.
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, priority: EventPriority, sequence: u64) -> Self {
        Self {
            time,
            priority,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_ordering() {
        let mut queue = BTreeMap::new();
        let t = Duration::from_millis(10);
        queue.insert(EventKey::new(t, EventPriority::Network, 1), "pong");
        queue.insert(EventKey::new(t, EventPriority::Timer, 2), "timeout");
        queue.insert(EventKey::new(Duration::from_millis(5), EventPriority::Client, 3), "early");
        queue.insert(EventKey::new(t, EventPriority::Timer, 4), "cancel");

        let order: Vec<_> = queue.into_values().collect();
        assert_eq!(order, vec!["early", "timeout", "cancel", "pong"]);
    }
}
