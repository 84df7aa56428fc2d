//! # Schedule state owned by the poll scheduler.
//!
//! [`ScheduleState`] tracks the single outstanding wake timer:
//! - `next_fire_at` and the timer handle are set together or not at all,
//! - at most one timer is outstanding at any time,
//! - a monotonically increasing **generation** identifies the current arming;
//!   fires carrying an older generation are stale and must be discarded.
//!
//! Mutated only inside the single-threaded actor context.

use tokio::time::Instant;

use crate::dispatch::PollKind;
use crate::timer::TimerHandle;

/// The "next scheduled time" state: armed deadline, handle, kind, generation.
pub(crate) struct ScheduleState {
    next_fire_at: Option<Instant>,
    handle: Option<TimerHandle>,
    kind: PollKind,
    generation: u64,
}

impl ScheduleState {
    pub(crate) fn new() -> Self {
        Self {
            next_fire_at: None,
            handle: None,
            kind: PollKind::Normal,
            generation: 0,
        }
    }

    /// True while a timer is outstanding.
    pub(crate) fn is_armed(&self) -> bool {
        debug_assert_eq!(self.handle.is_some(), self.next_fire_at.is_some());
        self.handle.is_some()
    }

    /// Deadline of the armed timer, if any.
    pub(crate) fn next_fire_at(&self) -> Option<Instant> {
        self.next_fire_at
    }

    /// Kind of the armed poll (meaningful only while armed).
    pub(crate) fn armed_kind(&self) -> PollKind {
        self.kind
    }

    /// Current schedule generation.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Advances the generation, invalidating any in-flight fire.
    pub(crate) fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Records a newly armed timer.
    pub(crate) fn arm(&mut self, at: Instant, handle: TimerHandle, kind: PollKind) {
        debug_assert!(self.handle.is_none(), "only one timer may be outstanding");
        debug_assert_eq!(handle.generation(), self.generation);
        self.next_fire_at = Some(at);
        self.handle = Some(handle);
        self.kind = kind;
    }

    /// Clears the armed state, returning the handle (if any) for cancellation.
    pub(crate) fn clear(&mut self) -> Option<TimerHandle> {
        self.next_fire_at = None;
        self.handle.take()
    }

    /// True when `generation` identifies the currently armed timer.
    pub(crate) fn matches(&self, generation: u64) -> bool {
        self.is_armed() && self.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_arm_and_clear_keep_invariant() {
        let mut state = ScheduleState::new();
        assert!(!state.is_armed());

        let generation = state.bump();
        let handle = TimerHandle::new(generation, CancellationToken::new());
        state.arm(
            Instant::now() + Duration::from_secs(1),
            handle,
            PollKind::Normal,
        );
        assert!(state.is_armed());
        assert!(state.matches(generation));

        state.clear();
        assert!(!state.is_armed());
        assert!(!state.matches(generation));
    }

    #[tokio::test]
    async fn test_bump_invalidates_prior_generation() {
        let mut state = ScheduleState::new();
        let generation = state.bump();
        let handle = TimerHandle::new(generation, CancellationToken::new());
        state.arm(
            Instant::now() + Duration::from_secs(1),
            handle,
            PollKind::Normal,
        );

        state.clear();
        state.bump();
        assert!(!state.matches(generation));
    }
}
