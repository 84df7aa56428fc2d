//! # Eviction policy for stale capability fields.
//!
//! [`EvictionPolicy`] decides which capability fields on which records must be
//! downgraded because they have not been refreshed within the cache-expiration
//! window.
//!
//! ## Windowing rule
//! Eligibility is bounded on both sides:
//! - a **field** is stale once `now − field_timestamp >= cache_expiration`
//!   (voice and video judged independently; never-set fields are skipped),
//! - a **record** participates only while `now − last_updated <= max_record_age`.
//!   Rows last touched longer ago are abandoned and intentionally left alone,
//!   so eviction does not churn on permanently-stale rows.
//!
//! Applying an eviction writes `supported = false` and stamps the field
//! timestamp to `now` — a monotonic, idempotent downgrade.

use std::sync::Arc;

use crate::config::PollSettings;
use crate::store::ContactRecord;

/// A record selected for downgrade, with the fields to clear.
#[derive(Clone, Debug)]
pub struct Eviction {
    /// Store row identity.
    pub id: i64,
    /// Upsert key for the patch write.
    pub number: Arc<str>,
    /// Clear the voice capability field.
    pub clear_voice: bool,
    /// Clear the video capability field.
    pub clear_video: bool,
}

/// Cache-expiration policy, rebuilt whenever the settings source changes.
#[derive(Clone, Copy, Debug)]
pub struct EvictionPolicy {
    cache_expiration_ms: u64,
    max_record_age_ms: u64,
}

impl EvictionPolicy {
    /// Builds a policy from the active settings.
    pub fn new(settings: &PollSettings) -> Self {
        Self {
            cache_expiration_ms: settings.cache_expiration.as_millis() as u64,
            max_record_age_ms: settings.max_record_age.as_millis() as u64,
        }
    }

    /// Selects records whose capability fields must be downgraded at `now`.
    ///
    /// Pure: the caller applies the result via store patches.
    pub fn select_obsolete(&self, records: &[ContactRecord], now_ms: u64) -> Vec<Eviction> {
        let mut out = Vec::new();
        for rec in records {
            if now_ms.saturating_sub(rec.last_updated_ms) > self.max_record_age_ms {
                continue;
            }

            let clear_voice = self.field_expired(rec.voice.updated_ms, now_ms);
            let clear_video = self.field_expired(rec.video.updated_ms, now_ms);
            if clear_voice || clear_video {
                out.push(Eviction {
                    id: rec.id,
                    number: Arc::from(rec.number.as_str()),
                    clear_voice,
                    clear_video,
                });
            }
        }
        out
    }

    fn field_expired(&self, updated_ms: u64, now_ms: u64) -> bool {
        updated_ms != 0 && now_ms.saturating_sub(updated_ms) >= self.cache_expiration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Capability;
    use std::time::Duration;

    const NOW: u64 = 1_000_000_000_000;

    fn policy() -> EvictionPolicy {
        EvictionPolicy::new(&PollSettings {
            poll_interval: Duration::from_secs(7 * 24 * 3600),
            cache_expiration: Duration::from_secs(100),
            max_record_age: Duration::from_secs(1000),
        })
    }

    fn record(last_updated_ms: u64, voice_ms: u64, video_ms: u64) -> ContactRecord {
        let mut rec = ContactRecord::new(7, "555-0100");
        rec.last_updated_ms = last_updated_ms;
        rec.voice = Capability {
            supported: true,
            updated_ms: voice_ms,
        };
        rec.video = Capability {
            supported: true,
            updated_ms: video_ms,
        };
        rec
    }

    #[test]
    fn test_abandoned_record_left_untouched() {
        // last_updated = now − 2×max_age, voice = now − 2×cache_expiration
        let rec = record(NOW - 2_000_000, NOW - 200_000, NOW);
        assert!(policy().select_obsolete(&[rec], NOW).is_empty());
    }

    #[test]
    fn test_recent_record_with_expired_field_included() {
        // last_updated = now − max_age/2, voice = now − 2×cache_expiration
        let rec = record(NOW - 500_000, NOW - 200_000, NOW);
        let out = policy().select_obsolete(&[rec], NOW);
        assert_eq!(out.len(), 1);
        assert!(out[0].clear_voice);
        assert!(!out[0].clear_video);
    }

    #[test]
    fn test_fields_judged_independently() {
        let rec = record(NOW - 1_000, NOW - 200_000, NOW - 150_000);
        let out = policy().select_obsolete(&[rec], NOW);
        assert!(out[0].clear_voice && out[0].clear_video);
    }

    #[test]
    fn test_never_set_field_skipped() {
        let mut rec = record(NOW - 1_000, 0, NOW - 10_000);
        rec.voice = Capability::UNKNOWN;
        assert!(policy().select_obsolete(&[rec], NOW).is_empty());
    }

    #[test]
    fn test_expiration_boundary_is_inclusive() {
        let rec = record(NOW - 1_000, NOW - 100_000, NOW);
        let out = policy().select_obsolete(&[rec], NOW);
        assert_eq!(out.len(), 1, "age == cache_expiration must be eligible");
    }

    #[test]
    fn test_future_field_timestamp_not_eligible() {
        let rec = record(NOW - 1_000, NOW + 5_000, NOW);
        assert!(policy().select_obsolete(&[rec], NOW).is_empty());
    }
}
