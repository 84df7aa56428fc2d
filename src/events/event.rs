//! # Runtime events emitted by the scheduler, actor, and subscriber workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Scheduling events**: timer arming, coalescing, cancellation
//! - **Pass events**: discovery pass flow (started, completed, batch, eviction)
//! - **State events**: readiness transitions, invalidation, identity capture
//! - **Infrastructure events**: shutdown, subscriber overflow/panic
//!
//! The [`Event`] struct carries additional metadata such as timestamps, delays,
//! counts, phone numbers, and timer generations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are delivered
//! out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use capvisor::{Event, EventKind, PollKind};
//!
//! let ev = Event::new(EventKind::PollScheduled)
//!     .with_delay(Duration::from_secs(5))
//!     .with_poll_kind(PollKind::NewContactsOnly)
//!     .with_generation(3);
//!
//! assert_eq!(ev.kind, EventKind::PollScheduled);
//! assert_eq!(ev.delay_ms, Some(5000));
//! assert_eq!(ev.generation, Some(3));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::dispatch::PollKind;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Scheduling events ===
    /// A wake timer was armed for a future discovery pass.
    ///
    /// Sets:
    /// - `delay_ms`: delay until the timer fires
    /// - `poll_kind`: kind of the armed poll
    /// - `generation`: schedule generation of the armed timer
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PollScheduled,

    /// A poll request arrived no earlier than the already-armed poll and was
    /// absorbed (earliest wins, never push a poll later).
    ///
    /// Sets:
    /// - `delay_ms`: the rejected candidate's delay
    /// - `poll_kind`: kind of the rejected request
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PollCoalesced,

    /// Schedule state was cleared (readiness lost, settings changed, shutdown).
    ///
    /// Sets:
    /// - `reason`: why the schedule was dropped
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ScheduleCleared,

    /// The timer facility refused to arm a wake-up; that cycle's poll is dropped.
    ///
    /// Sets:
    /// - `reason`: arm failure message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    TimerArmFailed,

    /// A timer fire no longer matching the current schedule generation was discarded.
    ///
    /// Sets:
    /// - `generation`: the stale fire's generation
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    StaleFireDiscarded,

    // === Pass events ===
    /// A discovery pass started executing.
    ///
    /// Sets:
    /// - `poll_kind`: pass kind (full scan or new contacts only)
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PassStarted,

    /// A discovery pass finished (re-arm already happened).
    ///
    /// Sets:
    /// - `count`: number of record ids batched this pass
    /// - `poll_kind`: pass kind
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    PassCompleted,

    /// A non-empty batch was handed to the discovery request queue.
    ///
    /// Sets:
    /// - `count`: batch size
    /// - `poll_kind`: batch kind
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    BatchSubmitted,

    /// Expired capability fields were downgraded in the store.
    ///
    /// Sets:
    /// - `count`: number of records patched
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    RecordsEvicted,

    /// A store read failed; a short bounded retry was scheduled.
    ///
    /// Sets:
    /// - `delay_ms`: retry delay
    /// - `reason`: store error label
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    StoreRetryScheduled,

    /// A single-record store write failed; the write was skipped.
    ///
    /// Sets:
    /// - `number`: the record's phone number, when known
    /// - `reason`: store error message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    StoreWriteFailed,

    // === State events ===
    /// Readiness was recomputed after an external signal.
    ///
    /// Sets:
    /// - `reason`: `"ready"` or `"not_ready"`
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ReadinessChanged,

    /// The feature was deprovisioned; all cached capabilities were marked unknown.
    ///
    /// Sets:
    /// - `count`: number of rows invalidated
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    CapabilitiesInvalidated,

    /// Device identity fields were captured after the first successful publish.
    ///
    /// Emitted at most once per poller lifetime.
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    IdentityCaptured,

    /// A contact record was upserted in response to a new-contact signal.
    ///
    /// Sets:
    /// - `number`: the contact's phone number
    /// - `count`: rows changed (0 = no-op upsert, no poll triggered)
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ContactUpserted,

    // === Infrastructure events ===
    /// Shutdown requested (token cancelled or OS signal observed).
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ShutdownRequested,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic info/message
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Record/row count, where applicable.
    pub count: Option<u64>,
    /// Contact phone number, where applicable.
    pub number: Option<Arc<str>>,
    /// Human-readable reason (errors, cancellation causes, overflow details).
    pub reason: Option<Arc<str>>,
    /// Poll kind (full scan vs new contacts only).
    pub poll_kind: Option<PollKind>,
    /// Schedule generation, where applicable.
    pub generation: Option<u64>,
    /// Subscriber name (overflow/panic events only).
    pub subscriber: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            delay_ms: None,
            count: None,
            number: None,
            reason: None,
            poll_kind: None,
            generation: None,
            subscriber: None,
        }
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a record/row count.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a contact phone number.
    #[inline]
    pub fn with_number(mut self, number: impl Into<Arc<str>>) -> Self {
        self.number = Some(number.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a poll kind.
    #[inline]
    pub fn with_poll_kind(mut self, kind: PollKind) -> Self {
        self.poll_kind = Some(kind);
        self
    }

    /// Attaches a schedule generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(Arc::from(subscriber));
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(Arc::from(subscriber));
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::PassStarted);
        let b = Event::new(EventKind::PassCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates_at_u32_max() {
        let ev = Event::new(EventKind::PollScheduled).with_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
