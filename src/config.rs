//! # Runtime configuration.
//!
//! Provides [`PollConfig`] (static wiring knobs, fixed for the lifetime of a
//! poller) and [`PollSettings`] (interval values that a provisioning/settings
//! source may change at runtime).
//!
//! Config is used in two ways:
//! 1. **Poller creation**: `CapabilityPoller::new(config, ...)`
//! 2. **Interval policies**: `IntervalPolicy::new(&settings, &config)`
//!
//! [`PollSettings`] is re-read from the [`ProvisioningSource`](crate::ProvisioningSource)
//! whenever a settings-changed signal arrives, so a live poller picks up carrier
//! or operator reconfiguration without a restart.

use std::time::Duration;

/// Static configuration for the poll scheduling runtime.
///
/// Defines:
/// - **Event system**: bus capacity, signal queue capacity
/// - **Batching**: maximum records per discovery batch
/// - **Retry behavior**: fixed store-error retry, failure growth factor
/// - **Special delays**: new-contact poll delay, verify backoff base/ceiling
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `signal_capacity`: FIFO bound for non-coalescing signals (timer fires, new contacts)
/// - `batch_cap`: Hard cap on records handed to the discovery queue per pass
/// - `error_retry`: Fixed short retry after an unreadable store (order of minutes)
/// - `new_contact_delay`: Delay before a new-contacts-only poll
/// - `verify_base` / `verify_ceiling`: `base × 2^(n−1)` verify backoff, clamped
/// - `failure_factor`: Growth applied to the periodic interval per consecutive failure
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Bound on queued non-coalescing signals.
    ///
    /// Supersession signal kinds (service status, publish state, provisioning,
    /// settings, verify results) occupy at most one slot each and are not
    /// counted against this bound.
    pub signal_capacity: usize,

    /// Maximum number of record ids per discovery batch.
    ///
    /// Records that are due but over the cap stay due and are picked up by the
    /// next pass.
    pub batch_cap: usize,

    /// Fixed retry delay after a structural discovery-pass failure
    /// (store unreadable). Independent of the jittered base interval.
    pub error_retry: Duration,

    /// Delay before polling after a genuinely new contact is upserted.
    pub new_contact_delay: Duration,

    /// Base delay for the verify backoff sequence (`base × 2^(n−1)`).
    pub verify_base: Duration,

    /// Ceiling clamping the verify backoff sequence.
    ///
    /// The exponential is otherwise unbounded in the attempt count.
    pub verify_ceiling: Duration,

    /// Multiplicative growth applied to the periodic interval per consecutive
    /// pass failure (`>= 1.0` recommended). Growth is capped after three
    /// consecutive failures.
    pub failure_factor: f64,
}

impl Default for PollConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `signal_capacity = 64`
    /// - `batch_cap = 100`
    /// - `error_retry = 2min`
    /// - `new_contact_delay = 5s`
    /// - `verify_base = 30s`, `verify_ceiling = 2h`
    /// - `failure_factor = 2.0`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            signal_capacity: 64,
            batch_cap: 100,
            error_retry: Duration::from_secs(120),
            new_contact_delay: Duration::from_secs(5),
            verify_base: Duration::from_secs(30),
            verify_ceiling: Duration::from_secs(2 * 3600),
            failure_factor: 2.0,
        }
    }
}

impl PollConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a signal queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn signal_capacity_clamped(&self) -> usize {
        self.signal_capacity.max(1)
    }
}

/// Interval values owned by the provisioning/settings source.
///
/// A settings-changed signal forces these to be re-read before the next pass,
/// so interval policies are rebuilt from fresh values rather than stale copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Base interval between full discovery passes (jitter is applied on top).
    pub poll_interval: Duration,

    /// Window after which an unrefreshed capability field is downgraded.
    pub cache_expiration: Duration,

    /// Absolute record-age ceiling: rows last touched longer ago than this are
    /// considered abandoned and left untouched by eviction.
    pub max_record_age: Duration,
}

impl Default for PollSettings {
    /// Default settings:
    ///
    /// - `poll_interval = 7 days`
    /// - `cache_expiration = 90 days`
    /// - `max_record_age = 180 days`
    fn default() -> Self {
        const DAY: u64 = 24 * 3600;
        Self {
            poll_interval: Duration::from_secs(7 * DAY),
            cache_expiration: Duration::from_secs(90 * DAY),
            max_record_age: Duration::from_secs(180 * DAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_capacity_clamped_to_one() {
        let cfg = PollConfig {
            bus_capacity: 0,
            ..PollConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_default_ordering_of_windows() {
        let s = PollSettings::default();
        assert!(s.poll_interval < s.cache_expiration);
        assert!(s.cache_expiration < s.max_record_age);
    }
}
