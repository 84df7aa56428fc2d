//! # Discovery request dispatch.
//!
//! The scheduler decides **when** contacts need a capability refresh; the
//! [`DiscoveryQueue`] collaborator owns the network protocol that performs it.
//! Batches are handed off fire-and-forget: the scheduler re-arms itself before
//! (and regardless of) submission, so a slow downstream queue never stalls
//! future scheduling.

use async_trait::async_trait;
use std::sync::Arc;

/// What a poll (and the batch it produces) covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollKind {
    /// Routine periodic pass over the full record set.
    Normal,
    /// Accelerated pass covering only never-polled records.
    ///
    /// Preempts an armed periodic timer, but never the other way around.
    NewContactsOnly,
}

/// Ordered record ids due for refresh, bounded by the configured batch cap.
///
/// The scheduler forgets the batch after submission; there is no retained
/// ownership and no completion tracking.
#[derive(Clone, Debug)]
pub struct DiscoveryBatch {
    /// Record ids in ascending last-updated order.
    pub ids: Vec<i64>,
    /// The pass kind that produced the batch.
    pub kind: PollKind,
    /// Opaque tag correlating the batch with the pass that produced it.
    pub context: Arc<str>,
}

/// Shared handle to a discovery queue implementation.
pub type QueueRef = Arc<dyn DiscoveryQueue>;

/// # Outbound request-batching queue.
///
/// Implementations perform the actual network discovery. Submission is
/// fire-and-forget from the scheduler's point of view; delivery failures are
/// the queue's problem and must not be reported back synchronously.
#[async_trait]
pub trait DiscoveryQueue: Send + Sync + 'static {
    /// Accepts a batch of record ids for refresh.
    async fn submit(&self, batch: DiscoveryBatch);
}
