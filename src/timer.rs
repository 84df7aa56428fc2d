//! # Deferred wake-timer facility.
//!
//! [`WakeTimer`] is the contract for the OS-level deferred wake-up the
//! scheduler arms between passes: exactly one fire per armed handle, delivered
//! back into the actor's signal queue (never by calling into scheduler state
//! from a foreign thread). Production embedders back the trait with a
//! wake-capable alarm facility that survives coarse power-saving states.
//!
//! [`TokioWakeTimer`] is the in-process implementation: a spawned
//! `sleep_until` raced against a per-handle cancellation token. Cancellation is
//! best-effort — a timer can fire just as it is being cancelled, which is why
//! fires carry the schedule generation they were armed under and stale fires
//! are discarded by the scheduler.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TimerError;
use crate::scheduler::{Signal, SignalSender};

/// Handle to one armed wake-up.
///
/// Dropping the handle does **not** cancel the timer; call
/// [`TimerHandle::abort`] (or [`WakeTimer::cancel`]).
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    cancel: CancellationToken,
}

impl TimerHandle {
    /// Creates a handle for an armed timer.
    pub fn new(generation: u64, cancel: CancellationToken) -> Self {
        Self { generation, cancel }
    }

    /// The schedule generation this timer was armed under.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Best-effort cancellation of the armed wake-up.
    pub fn abort(&self) {
        self.cancel.cancel();
    }
}

/// # Deferred wake-timer contract.
///
/// - `arm` schedules exactly one fire at `deadline`, tagged with `generation`.
/// - `cancel` is best-effort; a concurrent fire must be tolerated downstream.
/// - An arm refusal drops that cycle's poll only (never fatal).
pub trait WakeTimer: Send + Sync + 'static {
    /// Arms a wake-up at `deadline`. The fire must be delivered as
    /// [`Signal::TimerFired`] carrying `generation`.
    fn arm(&self, deadline: Instant, generation: u64) -> Result<TimerHandle, TimerError>;

    /// Cancels an armed wake-up (best-effort).
    fn cancel(&self, handle: &TimerHandle) {
        handle.abort();
    }
}

/// In-process [`WakeTimer`] backed by `tokio::time`.
///
/// Must be armed from within a tokio runtime context.
pub struct TokioWakeTimer {
    signals: SignalSender,
}

impl TokioWakeTimer {
    /// Creates a timer that delivers fires into `signals`.
    pub fn new(signals: SignalSender) -> Self {
        Self { signals }
    }
}

impl WakeTimer for TokioWakeTimer {
    fn arm(&self, deadline: Instant, generation: u64) -> Result<TimerHandle, TimerError> {
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let signals = self.signals.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    signals.push(Signal::TimerFired { generation });
                }
                _ = guard.cancelled() => {}
            }
        });

        Ok(TimerHandle::new(generation, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SignalQueue;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_fire_delivers_generation() {
        let queue = SignalQueue::new(8);
        let timer = TokioWakeTimer::new(queue.sender());

        timer
            .arm(Instant::now() + Duration::from_secs(30), 42)
            .unwrap();

        assert_eq!(queue.recv().await, Signal::TimerFired { generation: 42 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_fire() {
        let queue = SignalQueue::new(8);
        let timer = TokioWakeTimer::new(queue.sender());

        let handle = timer
            .arm(Instant::now() + Duration::from_secs(30), 1)
            .unwrap();
        timer.cancel(&handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(queue.is_empty());
    }
}
