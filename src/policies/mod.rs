//! Scheduling policies.
//!
//! This module groups the pure decision logic that controls **whether** a poll
//! may be scheduled, **how long** to wait between passes, and **which** cached
//! fields have gone stale.
//!
//! ## Contents
//! - [`ReadinessState`], [`Provisioned`] — the three-input gate every
//!   scheduling decision consults
//! - [`IntervalPolicy`] — jittered base interval, min floor, error retry,
//!   failure-streak growth
//! - [`verify_backoff`] — the separate `30s × 2^(n−1)` verify sequence
//! - [`EvictionPolicy`], [`Eviction`] — double-windowed staleness selection
//!
//! ## Quick wiring
//! ```text
//! PollScheduler:
//!   - readiness.is_ready()          gates request_poll / run_discovery_pass
//!   - intervals.next_interval(n)    re-arms after a successful pass
//!   - intervals.backoff_on_error()  re-arms after an unreadable store
//!   - eviction.select_obsolete(..)  downgrades stale fields post-scan
//! ```

mod eviction;
mod interval;
mod readiness;

pub use eviction::{Eviction, EvictionPolicy};
pub use interval::{verify_backoff, IntervalPolicy};
pub use readiness::{Provisioned, ReadinessState};
