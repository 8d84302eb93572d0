//! Production runner with async I/O.
//!
//! This crate wraps the deterministic state machines with real async I/O:
//!
//! - Pings and pongs via tokio channels
//! - Timers via spawned tokio tasks
//! - Failure notifications and violations via per-subscriber channels
//!
//! # Architecture
//!
//! Uses the event aggregator pattern: a single task owns the failure detector
//! and the invariant monitor and receives events via mpsc channels. This
//! avoids mutex contention and keeps each machine single-threaded.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      DetectorRunner task                     │
//! │   loop { event = select!(timer, network, command);           │
//! │          actions = machine.handle(event); execute(actions) } │
//! └──────────────────────────────────────────────────────────────┘
//!        ▲ Timeout /            ▲ Pong              ▲ Configure / Register /
//!        │ Cancel*              │                   │ observations
//!   TimerManager          NodeResponder tasks       DetectorHandle
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chainwatch_detector::DetectorConfig;
//! use chainwatch_production::{DetectorRunner, NodeResponder};
//! use chainwatch_types::{ClientId, NodeId};
//!
//! # async fn demo() -> Result<(), chainwatch_production::RunnerError> {
//! let (runner, handle) = DetectorRunner::new(DetectorConfig::default());
//! let _node = NodeResponder::spawn(NodeId(1), &handle)?;
//! let mut failures = handle.register_client(ClientId(1))?;
//! handle.configure([NodeId(1)])?;
//! tokio::spawn(runner.run());
//!
//! while let Some(notification) = failures.recv().await {
//!     println!("{} failed", notification.node);
//! }
//! # Ok(())
//! # }
//! ```

pub mod metrics;
mod responder;
mod runner;
pub mod telemetry;
mod timers;

pub use responder::NodeResponder;
pub use runner::{DetectorHandle, DetectorRunner, FailureNotification, RunnerError, ShutdownHandle};
pub use telemetry::{encode_metrics, init_telemetry, TelemetryConfig, TelemetryError};
pub use timers::{CancelOutcome, TimerManager};
