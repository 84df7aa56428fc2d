//! # Contact/capability store: records, contract, in-memory implementation.
//!
//! This module provides the datastore-facing types:
//! - [`ContactRecord`], [`Capability`], [`RecordPatch`], [`RecordFilter`] — the
//!   record data model and partial-update vocabulary
//! - [`CapabilityStore`] — the narrow trait the scheduler depends on
//! - [`MemoryStore`] — an in-memory implementation for tests and demos

mod contacts;
mod memory;
mod record;

pub use contacts::{CapabilityStore, StoreRef};
pub use memory::MemoryStore;
pub use record::{now_millis, Capability, ContactRecord, RecordFilter, RecordPatch};
