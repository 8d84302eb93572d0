//! Ping-based failure detector.
//!
//! This crate provides a synchronous failure detector that can be driven by
//! both the simulation and the production runner.
//!
//! # Protocol
//!
//! The detector works in rounds. Each round pings every alive node that has
//! not answered yet and arms the round timer:
//!
//! - `Event::Pong` → Record the response; once every alive node answered,
//!   cancel the timer and wait for the cancel outcome
//! - `Event::Timeout` → Retry the silent nodes once; on the second timeout
//!   declare them failed and notify every registered client
//! - `Event::CancelSuccess` → Round finished early, wait for the next round
//! - `Event::CancelFailure` → The timer fired first; its `Timeout` is
//!   processed with the ordinary attempt counting
//!
//! # States
//!
//! ```text
//! Init ──ConfigureDetector──▶ SendPing ◀──Timeout── Reset
//!                              │  ▲                  ▲
//!                    all pongs │  │ CancelFailure    │ CancelSuccess /
//!                              ▼  │                  │ final timeout
//!                        WaitForCancelResponse ──────┘
//! ```
//!
//! `WaitForCancelResponse` is pushed on top of `SendPing`, and `SendPing` on
//! top of `Init`. Client registration and reconfiguration are declared on
//! `Init` and therefore available in every state.

mod config;
mod liveness;
mod state;

pub use config::DetectorConfig;
pub use liveness::LivenessState;
pub use state::{DetectorState, DetectorStats, FailureDetector};
