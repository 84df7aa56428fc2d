//! # Contact/capability store contract.
//!
//! The scheduler reads records via ordered queries and writes them via partial
//! updates only. The store lives outside this crate (a content provider, a
//! database, a directory cache); the trait pins down the narrow surface the
//! scheduler needs:
//!
//! - queries ordered **ascending by last-updated time**, so a scan can stop at
//!   the first not-yet-due record,
//! - upserts that return a **row count**, so callers can distinguish a no-op
//!   from a real change (the new-contact trigger depends on this),
//! - a bulk invalidation used when the feature is deprovisioned.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::record::{ContactRecord, RecordFilter, RecordPatch};

/// Shared handle to a capability store implementation.
pub type StoreRef = Arc<dyn CapabilityStore>;

/// # External contact/capability datastore.
///
/// All operations are single-record (or bulk but independent) and carry no
/// transactional coupling to scheduling decisions.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use capvisor::{CapabilityStore, ContactRecord, RecordFilter, RecordPatch, StoreError};
///
/// struct EmptyStore;
///
/// #[async_trait]
/// impl CapabilityStore for EmptyStore {
///     async fn query(&self, _filter: RecordFilter) -> Result<Vec<ContactRecord>, StoreError> {
///         Ok(Vec::new())
///     }
///
///     async fn upsert(&self, _number: &str, _patch: RecordPatch) -> Result<u64, StoreError> {
///         Ok(0)
///     }
///
///     async fn invalidate_all(&self) -> Result<u64, StoreError> {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait CapabilityStore: Send + Sync + 'static {
    /// Returns records matching `filter`, ordered ascending by `last_updated_ms`.
    async fn query(&self, filter: RecordFilter) -> Result<Vec<ContactRecord>, StoreError>;

    /// Inserts or patches the record keyed by `number`.
    ///
    /// Returns the number of rows actually changed: `0` means the patch was a
    /// no-op against the existing row.
    async fn upsert(&self, number: &str, patch: RecordPatch) -> Result<u64, StoreError>;

    /// Marks every cached capability unknown (bulk invalidation, not eviction
    /// by age). Returns the number of rows touched.
    async fn invalidate_all(&self) -> Result<u64, StoreError>;
}
