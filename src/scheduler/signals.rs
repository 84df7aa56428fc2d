//! # Typed signals and the latest-wins signal queue.
//!
//! Every asynchronous input to the runtime — service status, publish outcome,
//! provisioning, settings, new contacts, verify results, timer fires — arrives
//! as a [`Signal`] pushed into a [`SignalQueue`]. A single consumer (the event
//! actor) drains the queue one signal at a time, which makes it the sole writer
//! of readiness and schedule state.
//!
//! ## De-duplication
//! Signal kinds that are natural supersessions (service status, publish state,
//! provisioning, settings, verify results) occupy at most one queue position:
//! pushing a new one **replaces** any not-yet-processed signal of the same
//! kind, so bursts collapse to the latest value only. `ContactAdded` and
//! `TimerFired` are plain FIFO — every occurrence matters.
//!
//! ```text
//! push(ServiceStatus{true})              queue: [ServiceStatus{true}]
//! push(ContactAdded{"555-0100"})         queue: [ServiceStatus{true}, ContactAdded]
//! push(ServiceStatus{false})             queue: [ContactAdded, ServiceStatus{false}]
//!                                               (old status removed, new at back)
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// An asynchronous input to the scheduling runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Transport/service availability changed.
    ServiceStatus {
        /// Whether the service connection is up.
        available: bool,
    },
    /// The outcome of the most recent publish.
    PublishState {
        /// Whether the publish succeeded.
        succeeded: bool,
    },
    /// Provisioning values may have changed; re-read them.
    ProvisionChanged,
    /// Configured intervals may have changed; re-read them.
    SettingsChanged,
    /// A contact was added to the address book.
    ContactAdded {
        /// The contact's phone number.
        number: String,
    },
    /// A previous action should be re-verified.
    VerifyResult {
        /// How many verification attempts have happened (1-based).
        attempts: u32,
    },
    /// An armed wake timer fired.
    TimerFired {
        /// Schedule generation the timer was armed under.
        generation: u64,
    },
}

impl Signal {
    /// Returns the signal's kind (used for de-duplication).
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::ServiceStatus { .. } => SignalKind::ServiceStatus,
            Signal::PublishState { .. } => SignalKind::PublishState,
            Signal::ProvisionChanged => SignalKind::ProvisionChanged,
            Signal::SettingsChanged => SignalKind::SettingsChanged,
            Signal::ContactAdded { .. } => SignalKind::ContactAdded,
            Signal::VerifyResult { .. } => SignalKind::VerifyResult,
            Signal::TimerFired { .. } => SignalKind::TimerFired,
        }
    }
}

/// Kind tag for [`Signal`], used by the latest-wins replacement rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalKind {
    ServiceStatus,
    PublishState,
    ProvisionChanged,
    SettingsChanged,
    ContactAdded,
    VerifyResult,
    TimerFired,
}

impl SignalKind {
    /// True for supersession kinds where only the latest pending value matters.
    pub fn coalesces(&self) -> bool {
        !matches!(self, SignalKind::ContactAdded | SignalKind::TimerFired)
    }
}

/// Single-consumer signal queue with per-kind latest-wins replacement.
///
/// ### Rules
/// - Pushing a coalescing kind removes any pending signal of the same kind and
///   appends the new one (arrival order preserved for the survivor).
/// - Non-coalescing kinds are FIFO, bounded by `capacity`; pushes beyond the
///   bound are rejected.
/// - `recv` is intended for exactly one consumer.
pub struct SignalQueue {
    inner: Mutex<VecDeque<Signal>>,
    notify: Notify,
    capacity: usize,
}

impl SignalQueue {
    /// Creates a queue bounding non-coalescing signals to `capacity` (min 1).
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        })
    }

    /// Returns a cloneable producer handle.
    pub fn sender(self: &Arc<Self>) -> SignalSender {
        SignalSender {
            queue: Arc::clone(self),
        }
    }

    /// Enqueues a signal. Returns false if a non-coalescing signal was rejected
    /// because the queue is full.
    pub fn push(&self, signal: Signal) -> bool {
        {
            let mut q = self.inner.lock().expect("signal queue poisoned");
            if signal.kind().coalesces() {
                let kind = signal.kind();
                q.retain(|s| s.kind() != kind);
            } else if q.len() >= self.capacity {
                return false;
            }
            q.push_back(signal);
        }
        self.notify.notify_one();
        true
    }

    /// Waits for and removes the next signal.
    pub async fn recv(&self) -> Signal {
        loop {
            let notified = self.notify.notified();
            if let Some(signal) = self.inner.lock().expect("signal queue poisoned").pop_front() {
                return signal;
            }
            notified.await;
        }
    }

    /// Number of pending signals.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("signal queue poisoned").len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cloneable producer handle for a [`SignalQueue`].
///
/// Readiness sources, timers, and embedders push through this; the owning
/// actor is the only consumer.
#[derive(Clone)]
pub struct SignalSender {
    queue: Arc<SignalQueue>,
}

impl SignalSender {
    /// Enqueues a signal (see [`SignalQueue::push`]).
    pub fn push(&self, signal: Signal) -> bool {
        self.queue.push(signal)
    }
}
