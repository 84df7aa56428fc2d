//! # In-memory capability store.
//!
//! [`MemoryStore`] keeps records in a `RwLock`-guarded vector. It implements
//! the full [`CapabilityStore`] contract — ordered queries, counted upserts,
//! bulk invalidation — and is what the crate's own tests and demos run against.
//! Production deployments back the trait with a real datastore.

use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::contacts::CapabilityStore;
use crate::store::record::{Capability, ContactRecord, RecordFilter, RecordPatch};

/// In-memory [`CapabilityStore`] implementation.
pub struct MemoryStore {
    rows: RwLock<Vec<ContactRecord>>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Creates a store pre-populated with `records`.
    ///
    /// The id counter continues above the highest seeded id.
    pub fn seeded(records: Vec<ContactRecord>) -> Self {
        let max_id = records.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            rows: RwLock::new(records),
            next_id: AtomicI64::new(max_id + 1),
        }
    }

    /// Returns a snapshot of all rows in insertion order (test helper).
    pub async fn snapshot(&self) -> Vec<ContactRecord> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl CapabilityStore for MemoryStore {
    async fn query(&self, filter: RecordFilter) -> Result<Vec<ContactRecord>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<ContactRecord> = match filter {
            RecordFilter::All => rows.clone(),
            RecordFilter::NewOnly => rows
                .iter()
                .filter(|r| r.last_updated_ms == 0)
                .cloned()
                .collect(),
        };
        out.sort_by_key(|r| r.last_updated_ms);
        Ok(out)
    }

    async fn upsert(&self, number: &str, patch: RecordPatch) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.iter_mut().find(|r| r.number == number) {
            return Ok(u64::from(patch.apply(row)));
        }

        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let mut row = ContactRecord::new(id, number);
        patch.apply(&mut row);
        rows.push(row);
        Ok(1)
    }

    async fn invalidate_all(&self) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let mut touched = 0u64;
        for row in rows.iter_mut() {
            if row.voice.is_known() || row.video.is_known() {
                row.voice = Capability::UNKNOWN;
                row.video = Capability::UNKNOWN;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_orders_ascending_by_last_updated() {
        let mut a = ContactRecord::new(1, "555-0100");
        a.last_updated_ms = 300;
        let mut b = ContactRecord::new(2, "555-0101");
        b.last_updated_ms = 100;
        let store = MemoryStore::seeded(vec![a, b]);

        let rows = store.query(RecordFilter::All).await.unwrap();
        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[1].id, 1);
    }

    #[tokio::test]
    async fn test_new_only_filter_returns_unpolled_rows() {
        let mut polled = ContactRecord::new(1, "555-0100");
        polled.last_updated_ms = 500;
        let fresh = ContactRecord::new(2, "555-0101");
        let store = MemoryStore::seeded(vec![polled, fresh]);

        let rows = store.query(RecordFilter::NewOnly).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[tokio::test]
    async fn test_upsert_insert_then_noop() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .upsert("555-0100", RecordPatch::new_contact())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .upsert("555-0100", RecordPatch::new_contact())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_invalidate_all_counts_known_rows_only() {
        let mut known = ContactRecord::new(1, "555-0100");
        known.voice = Capability {
            supported: true,
            updated_ms: 900,
        };
        let unknown = ContactRecord::new(2, "555-0101");
        let store = MemoryStore::seeded(vec![known, unknown]);

        assert_eq!(store.invalidate_all().await.unwrap(), 1);
        let rows = store.snapshot().await;
        assert!(rows.iter().all(|r| !r.voice.is_known() && !r.video.is_known()));
    }
}
