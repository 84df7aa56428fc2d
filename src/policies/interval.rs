//! # Interval policy for discovery passes.
//!
//! [`IntervalPolicy`] computes how long to wait between discovery passes:
//! - a **jittered base interval** (uniform multiplier in `[0.9, 1.1]`) that
//!   smooths load across many independent schedulers polling at the "same"
//!   logical interval,
//! - a **minimum re-poll floor** (`base / 10`) bounding only the policy's own
//!   recomputed interval — explicit external requests such as "new contact
//!   added" or "service just became ready" are intentionally allowed to be
//!   faster,
//! - a growth factor keyed by the consecutive-failure streak, capped after
//!   three failures so delays stay bounded,
//! - a **fixed short retry window** ([`IntervalPolicy::backoff_on_error`]) used
//!   when a pass fails structurally (store unreadable), independent of the
//!   jittered base.
//!
//! [`verify_backoff`] is a separate, explicitly exponential sequence
//! (`base × 2^(n−1)`) used only to re-check the effect of a previous action.
//! It is kept apart from the jittered interval on purpose.

use std::time::Duration;

use rand::Rng;

use crate::config::{PollConfig, PollSettings};

/// Streak exponent cap: growth stops compounding after this many failures.
const MAX_FAILURE_EXP: u32 = 3;

/// Poll interval policy, rebuilt whenever the settings source changes.
#[derive(Clone, Copy, Debug)]
pub struct IntervalPolicy {
    base: Duration,
    factor: f64,
    error_retry: Duration,
}

impl IntervalPolicy {
    /// Builds a policy from the active settings and static config.
    pub fn new(settings: &PollSettings, cfg: &PollConfig) -> Self {
        Self {
            base: settings.poll_interval,
            factor: cfg.failure_factor.max(1.0),
            error_retry: cfg.error_retry,
        }
    }

    /// Returns the configured base interval (no jitter).
    #[inline]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Minimum re-poll floor: `base / 10`.
    ///
    /// Bounds only this policy's own recomputed interval. Callers passing
    /// explicit delays (new-contact, just-became-ready) bypass the floor.
    #[inline]
    pub fn min_interval(&self) -> Duration {
        self.base / 10
    }

    /// Computes the delay until the next periodic pass.
    ///
    /// The base is grown by `factor^streak` (exponent capped at 3), then a
    /// uniformly distributed multiplier in `[0.9, 1.1]` is applied. The
    /// jittered output is never fed back into subsequent calculations, and the
    /// result never drops below [`min_interval`](Self::min_interval).
    pub fn next_interval(&self, failure_streak: u32) -> Duration {
        let exp = failure_streak.min(MAX_FAILURE_EXP) as i32;
        let grown = self.base.as_secs_f64() * self.factor.powi(exp);
        let grown = if grown.is_finite() && grown >= 0.0 {
            Duration::from_secs_f64(grown)
        } else {
            self.base
        };

        let mult: f64 = rand::rng().random_range(0.9..=1.1);
        grown.mul_f64(mult).max(self.min_interval())
    }

    /// Fixed short retry window for structural pass failures.
    ///
    /// Independent of the jittered base interval; bounded by configuration
    /// (on the order of minutes).
    #[inline]
    pub fn backoff_on_error(&self) -> Duration {
        self.error_retry
    }
}

/// Verify backoff: `base × 2^(n−1)`, clamped to `ceiling`.
///
/// Used only to schedule re-checks of a previous action's effect; deliberately
/// separate from [`IntervalPolicy`]. Attempt counts below 1 are treated as 1.
/// The shift is capped so large attempt counts clamp to the ceiling instead of
/// overflowing.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use capvisor::verify_backoff;
///
/// let base = Duration::from_secs(30);
/// let ceiling = Duration::from_secs(7200);
/// assert_eq!(verify_backoff(1, base, ceiling), Duration::from_secs(30));
/// assert_eq!(verify_backoff(3, base, ceiling), Duration::from_secs(120));
/// ```
pub fn verify_backoff(attempts: u32, base: Duration, ceiling: Duration) -> Duration {
    let shift = attempts.max(1) - 1;
    if shift >= 32 {
        return ceiling;
    }
    base.saturating_mul(1u32 << shift.min(31)).min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base: Duration) -> IntervalPolicy {
        IntervalPolicy::new(
            &PollSettings {
                poll_interval: base,
                ..PollSettings::default()
            },
            &PollConfig::default(),
        )
    }

    #[test]
    fn test_jitter_bounds_ten_thousand_samples() {
        let base = Duration::from_secs(1000);
        let p = policy(base);
        let lo = base.mul_f64(0.9);
        let hi = base.mul_f64(1.1);

        for _ in 0..10_000 {
            let d = p.next_interval(0);
            assert!(d >= lo, "interval {:?} below 0.9×base", d);
            assert!(d <= hi, "interval {:?} above 1.1×base", d);
        }
    }

    #[test]
    fn test_min_interval_is_tenth_of_base() {
        let p = policy(Duration::from_secs(700));
        assert_eq!(p.min_interval(), Duration::from_secs(70));
    }

    #[test]
    fn test_failure_streak_grows_interval() {
        let base = Duration::from_secs(100);
        let p = policy(base);

        // factor 2.0, streak 2 → grown base 400s, jitter within [360s, 440s]
        for _ in 0..200 {
            let d = p.next_interval(2);
            assert!(d >= Duration::from_secs(360), "streak delay {:?} too low", d);
            assert!(d <= Duration::from_secs(440), "streak delay {:?} too high", d);
        }
    }

    #[test]
    fn test_failure_growth_caps_after_three() {
        let base = Duration::from_secs(100);
        let p = policy(base);

        // exponent capped at 3 → grown base 800s regardless of streak size
        let hi = Duration::from_secs(880);
        for streak in [3, 10, u32::MAX] {
            for _ in 0..100 {
                assert!(p.next_interval(streak) <= hi);
            }
        }
    }

    #[test]
    fn test_backoff_on_error_is_fixed() {
        let p = policy(Duration::from_secs(604_800));
        assert_eq!(p.backoff_on_error(), PollConfig::default().error_retry);
    }

    #[test]
    fn test_verify_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(30);
        let ceiling = Duration::from_secs(7200);
        assert_eq!(verify_backoff(1, base, ceiling), Duration::from_secs(30));
        assert_eq!(verify_backoff(2, base, ceiling), Duration::from_secs(60));
        assert_eq!(verify_backoff(3, base, ceiling), Duration::from_secs(120));
        assert_eq!(verify_backoff(4, base, ceiling), Duration::from_secs(240));
    }

    #[test]
    fn test_verify_backoff_zero_attempts_treated_as_one() {
        let base = Duration::from_secs(30);
        assert_eq!(
            verify_backoff(0, base, Duration::from_secs(7200)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_verify_backoff_clamps_to_ceiling() {
        let base = Duration::from_secs(30);
        let ceiling = Duration::from_secs(7200);
        assert_eq!(verify_backoff(10, base, ceiling), ceiling);
        assert_eq!(verify_backoff(u32::MAX, base, ceiling), ceiling);
    }
}
