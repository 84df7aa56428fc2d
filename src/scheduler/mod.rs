//! Scheduling core: state machine, actor, and runtime wiring.
//!
//! This module contains the embedded implementation of the capvisor runtime.
//!
//! Internal structure:
//! - [`PollScheduler`] — the coalescing/readiness-gated state machine and
//!   discovery-pass logic;
//! - [`EventActor`] — single-threaded consumer serializing every asynchronous
//!   input into scheduler calls;
//! - [`Signal`]/[`SignalQueue`] — typed inputs with per-kind latest-wins
//!   de-duplication;
//! - [`CapabilityPoller`] — explicit construction and lifecycle of the whole
//!   runtime;
//! - `shutdown` — cross-platform OS termination-signal handling.

mod actor;
mod core;
mod poller;
mod shutdown;
mod signals;
mod state;

pub use actor::EventActor;
pub use core::PollScheduler;
pub use poller::CapabilityPoller;
pub use shutdown::wait_for_shutdown_signal;
pub use signals::{Signal, SignalKind, SignalQueue, SignalSender};
