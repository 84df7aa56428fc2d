//! # capvisor
//!
//! **Capvisor** is a capability discovery poll scheduling library for Rust.
//!
//! It decides *when* to re-check the network-exposed capabilities of a set of
//! previously-discovered contacts and keeps a local capability cache from
//! growing stale. The crate owns scheduling, coalescing, jitter, and eviction;
//! the discovery protocol, the datastore, and the wake-timer facility stay
//! outside, behind narrow collaborator traits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  transport feed   publish feed   provisioning   contact feed   verify feed
//!        │               │              │              │              │
//!        └───────────────┴──── SignalSender::push ─────┴──────────────┘
//!                                      ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  SignalQueue (latest-wins per supersession kind, FIFO otherwise)  │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventActor (single-threaded, one signal fully to completion)     │
//! │    └─► PollScheduler                                              │
//! │         - ReadinessState gate (transport ∧ publish ∧ provisioned) │
//! │         - ScheduleState (one armed timer, earliest wins)          │
//! │         - IntervalPolicy (jitter, min floor, error retry)         │
//! │         - EvictionPolicy (cache expiration × max record age)      │
//! └──────┬─────────────────┬──────────────────┬───────────────────────┘
//!        ▼                 ▼                  ▼
//!   WakeTimer       CapabilityStore    DiscoveryQueue
//!   (arm/cancel,    (ordered query,    (fire-and-forget
//!    fires re-       counted upsert,    batch submission)
//!    enter as        bulk invalidate)
//!    signals)
//!
//!  every transition ── publish(Event) ──► Bus ──► SubscriberSet ──► subscribers
//! ```
//!
//! ### Discovery cycle
//! ```text
//! signal (service up / publish ok / provisioned / settings / contact / verify)
//!   ├─► readiness gate: not ready ─► cancel_all (never armed while not ready)
//!   ├─► request_poll(delay, kind)
//!   │     ├─ armed at/earlier     ─► coalesced (no-op)
//!   │     ├─ new-contact request  ─► preempts an armed periodic timer
//!   │     └─ otherwise            ─► cancel old, arm new generation
//!   ▼
//! timer fire (stale generations discarded)
//!   ├─► re-check readiness
//!   ├─► query store (ascending last-updated; stops at first not-due record)
//!   ├─► re-arm: min(first-not-due remaining wait, jittered base interval)
//!   ├─► evict expired capability fields over the same snapshot
//!   └─► submit due records (bounded batch, fire-and-forget)
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Scheduling**    | Coalesced, readiness-gated, generation-checked wake timers.        | [`PollScheduler`], [`WakeTimer`]          |
//! | **Policies**      | Jittered intervals, verify backoff, double-windowed eviction.      | [`IntervalPolicy`], [`EvictionPolicy`]    |
//! | **Signals**       | Typed inputs with per-kind latest-wins de-duplication.             | [`Signal`], [`SignalQueue`]               |
//! | **Collaborators** | Narrow contracts for store, request queue, provisioning.           | [`CapabilityStore`], [`DiscoveryQueue`]   |
//! | **Observability** | Broadcast events with isolated subscriber workers.                 | [`Event`], [`Subscribe`], [`SubscriberSet`] |
//! | **Runtime**       | Explicitly constructed, token-cancelled poller (no singletons).    | [`CapabilityPoller`]                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use capvisor::{
//!     CapabilityPoller, MemoryStore, PollConfig, PollSettings, Provisioned,
//!     DeviceIdentity, DiscoveryBatch, DiscoveryQueue, ProvisioningSource, Signal,
//! };
//!
//! struct NoopQueue;
//!
//! #[async_trait::async_trait]
//! impl DiscoveryQueue for NoopQueue {
//!     async fn submit(&self, _batch: DiscoveryBatch) {}
//! }
//!
//! struct Carrier;
//!
//! impl ProvisioningSource for Carrier {
//!     fn provisioned(&self) -> Provisioned { Provisioned::Yes }
//!     fn identity(&self) -> Option<DeviceIdentity> { None }
//!     fn settings(&self) -> PollSettings { PollSettings::default() }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let poller = CapabilityPoller::new(
//!         PollConfig::default(),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(NoopQueue),
//!         Arc::new(Carrier),
//!         Vec::new(),
//!     );
//!
//!     // Hand this to whatever observes the transport/publish/contact feeds.
//!     let handle = poller.handle();
//!     handle.push(Signal::ServiceStatus { available: true });
//!
//!     let token = CancellationToken::new();
//!     poller.run(token).await;
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod events;
mod policies;
mod scheduler;
mod sources;
mod store;
mod subscribers;
mod timer;

// ---- Public re-exports ----

pub use config::{PollConfig, PollSettings};
pub use dispatch::{DiscoveryBatch, DiscoveryQueue, PollKind, QueueRef};
pub use error::{StoreError, TimerError};
pub use events::{Bus, Event, EventKind};
pub use policies::{verify_backoff, Eviction, EvictionPolicy, IntervalPolicy, Provisioned, ReadinessState};
pub use scheduler::{
    wait_for_shutdown_signal, CapabilityPoller, EventActor, PollScheduler, Signal, SignalKind,
    SignalQueue, SignalSender,
};
pub use sources::{DeviceIdentity, ProvisioningSource, SourceRef};
pub use store::{
    now_millis, Capability, CapabilityStore, ContactRecord, MemoryStore, RecordFilter,
    RecordPatch, StoreRef,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use timer::{TimerHandle, TokioWakeTimer, WakeTimer};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
