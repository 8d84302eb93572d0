//! State machine traits.

use crate::{Action, Event};
use std::time::Duration;

/// A top-level state machine driven by a runner.
///
/// The runner owns the only reference to the machine and feeds it one event
/// at a time. Each call runs to completion before the next event is offered.
pub trait StateMachine {
    /// Process one event and return the actions to execute.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Update the machine's notion of the current time.
    fn set_time(&mut self, now: Duration);

    /// The machine's current time.
    fn now(&self) -> Duration;
}

/// A state machine that handles a subset of events.
///
/// Returns `None` for events it does not recognise so that a composing
/// machine or runner can route them elsewhere.
pub trait SubStateMachine {
    /// Try to handle an event. `None` means the event is not for this machine.
    fn try_handle(&mut self, event: &Event) -> Option<Vec<Action>>;

    /// Update the machine's notion of the current time.
    fn set_time(&mut self, now: Duration);
}
