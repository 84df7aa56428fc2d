//! # Contact capability records and partial updates.
//!
//! [`ContactRecord`] is the unit the external store owns and the scheduler
//! reads. The scheduler never mutates records in place: it issues
//! [`RecordPatch`] partial updates carrying only the fields it changes.
//!
//! ## Timestamp conventions
//! - All timestamps are epoch milliseconds (`u64`); `0` means "never set".
//! - Timestamps are monotonically non-decreasing once set by a real update.
//! - The scheduler never writes a timestamp in the future.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time as epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One capability field: a supported flag plus the time it was last refreshed.
///
/// `updated_ms == 0` means the capability has never been refreshed and its
/// value is unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capability {
    /// Whether the remote directory reported the capability as supported.
    pub supported: bool,
    /// When this field was last refreshed (epoch ms; 0 = never).
    pub updated_ms: u64,
}

impl Capability {
    /// A never-refreshed, unknown capability.
    pub const UNKNOWN: Capability = Capability {
        supported: false,
        updated_ms: 0,
    };

    /// True once the field has been refreshed at least once.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.updated_ms != 0
    }
}

/// A cached contact capability record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactRecord {
    /// Store-assigned row identity.
    pub id: i64,
    /// The contact's phone number (the upsert key).
    pub number: String,
    /// Optional display name.
    pub display_name: Option<String>,
    /// When the record was last polled (epoch ms; 0 = never polled).
    pub last_updated_ms: u64,
    /// Voice capability field.
    pub voice: Capability,
    /// Video capability field.
    pub video: Capability,
}

impl ContactRecord {
    /// Creates a fresh, never-polled record for a number.
    pub fn new(id: i64, number: impl Into<String>) -> Self {
        Self {
            id,
            number: number.into(),
            display_name: None,
            last_updated_ms: 0,
            voice: Capability::UNKNOWN,
            video: Capability::UNKNOWN,
        }
    }
}

/// Partial update for a contact record; only set fields are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// New display name, if changing.
    pub display_name: Option<String>,
    /// New last-polled timestamp, if changing.
    pub last_updated_ms: Option<u64>,
    /// New voice capability field, if changing.
    pub voice: Option<Capability>,
    /// New video capability field, if changing.
    pub video: Option<Capability>,
}

impl RecordPatch {
    /// The patch used when a new contact is added: zeroed timestamps, unknown
    /// capabilities. Applied to an already-zeroed record it changes nothing,
    /// which is how a duplicate add is detected (row count 0).
    pub fn new_contact() -> Self {
        Self {
            display_name: None,
            last_updated_ms: Some(0),
            voice: Some(Capability::UNKNOWN),
            video: Some(Capability::UNKNOWN),
        }
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.last_updated_ms.is_none()
            && self.voice.is_none()
            && self.video.is_none()
    }

    /// Applies the patch to a record, returning whether any value changed.
    pub fn apply(&self, record: &mut ContactRecord) -> bool {
        let mut changed = false;
        if let Some(name) = &self.display_name {
            if record.display_name.as_deref() != Some(name.as_str()) {
                record.display_name = Some(name.clone());
                changed = true;
            }
        }
        if let Some(ts) = self.last_updated_ms {
            if record.last_updated_ms != ts {
                record.last_updated_ms = ts;
                changed = true;
            }
        }
        if let Some(voice) = self.voice {
            if record.voice != voice {
                record.voice = voice;
                changed = true;
            }
        }
        if let Some(video) = self.video {
            if record.video != video {
                record.video = video;
                changed = true;
            }
        }
        changed
    }
}

/// Which records a query should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFilter {
    /// All records, ordered ascending by `last_updated_ms`.
    All,
    /// Only never-polled records (`last_updated_ms == 0`).
    NewOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contact_patch_is_noop_on_fresh_record() {
        let mut rec = ContactRecord::new(1, "555-0100");
        assert!(!RecordPatch::new_contact().apply(&mut rec));
    }

    #[test]
    fn test_new_contact_patch_rezeroes_polled_record() {
        let mut rec = ContactRecord::new(1, "555-0100");
        rec.last_updated_ms = 12_000;
        rec.voice = Capability {
            supported: true,
            updated_ms: 12_000,
        };
        assert!(RecordPatch::new_contact().apply(&mut rec));
        assert_eq!(rec.last_updated_ms, 0);
        assert!(!rec.voice.is_known());
    }

    #[test]
    fn test_apply_reports_unchanged_fields() {
        let mut rec = ContactRecord::new(1, "555-0100");
        rec.display_name = Some("Ada".into());
        let patch = RecordPatch {
            display_name: Some("Ada".into()),
            ..RecordPatch::default()
        };
        assert!(!patch.apply(&mut rec));
    }
}
