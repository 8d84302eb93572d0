//! Timer management for production runner.
//!
//! Provides tokio-based timer implementation for the deterministic state machine.
//! Timers are spawned as tokio tasks and can be cancelled.
//!
//! A cancel request and an expiring timer race each other. Each timer owns a
//! claim flag; whichever side sets it first wins, so every timer produces
//! either its expiry event or a successful cancel, never both.
//!
//! A timer task claims its flag before it sends the expiry event. On a
//! multi-thread runtime a losing cancel can therefore be reported before the
//! `Timeout` is queued; the detector accepts both orders.

use chainwatch_core::{Event, TimerId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Convert a TimerId to the corresponding Event.
fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::PingRound => Event::Timeout,
    }
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The timer was stopped before it fired.
    Cancelled,
    /// The timer already fired (or was never set). Its event may reach the
    /// runner before or after the resulting `CancelFailure`.
    AlreadyFired,
}

impl CancelOutcome {
    /// The event reporting this outcome to the state machine.
    pub fn into_event(self) -> Event {
        match self {
            CancelOutcome::Cancelled => Event::CancelSuccess,
            CancelOutcome::AlreadyFired => Event::CancelFailure,
        }
    }
}

struct ArmedTimer {
    handle: JoinHandle<()>,
    claimed: Arc<AtomicBool>,
}

/// Manages timers for the production runner.
///
/// Each timer is a tokio task that sleeps for the specified duration and then
/// sends the appropriate timer event to the event channel.
pub struct TimerManager {
    /// Active timers (id -> task handle and claim flag).
    timers: HashMap<TimerId, ArmedTimer>,
    /// Event sender for timer fires.
    event_tx: mpsc::UnboundedSender<Event>,
}

impl TimerManager {
    /// Create a new timer manager.
    pub fn new(event_tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            timers: HashMap::new(),
            event_tx,
        }
    }

    /// Set a timer that will fire after the given duration.
    ///
    /// If a timer with the same ID already exists, it is cancelled first.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id);

        let event_tx = self.event_tx.clone();
        let claimed = Arc::new(AtomicBool::new(false));
        let task_claim = claimed.clone();

        let handle = tokio::spawn(async move {
            trace!(timer_id = ?id, ?duration, "Timer task started, sleeping");
            tokio::time::sleep(duration).await;
            if task_claim.swap(true, Ordering::AcqRel) {
                return;
            }
            trace!(timer_id = ?id, "Timer fired, sending event");
            // The receiver only disappears when the runner is shutting down.
            let _ = event_tx.send(timer_event(id));
        });

        self.timers.insert(id, ArmedTimer { handle, claimed });
        debug!(?id, ?duration, "Timer set");
    }

    /// Cancel a timer.
    ///
    /// Returns [`CancelOutcome::AlreadyFired`] if the timer is unknown or its
    /// task won the race.
    pub fn cancel_timer(&mut self, id: TimerId) -> CancelOutcome {
        let Some(timer) = self.timers.remove(&id) else {
            return CancelOutcome::AlreadyFired;
        };

        if timer.claimed.swap(true, Ordering::AcqRel) {
            debug!(?id, "Timer fired before cancel");
            CancelOutcome::AlreadyFired
        } else {
            timer.handle.abort();
            debug!(?id, "Timer cancelled");
            CancelOutcome::Cancelled
        }
    }

    /// Cancel all timers.
    ///
    /// Called during shutdown.
    pub fn cancel_all(&mut self) {
        for (id, timer) in self.timers.drain() {
            timer.claimed.store(true, Ordering::Release);
            timer.handle.abort();
            trace!(?id, "Timer cancelled (shutdown)");
        }
    }

    /// Get the number of timers that have not been cancelled.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
