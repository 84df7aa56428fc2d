//! # EventActor: single-threaded signal consumer.
//!
//! Dequeues [`Signal`]s one at a time and maps each to exactly one
//! [`PollScheduler`] handler, executed to completion before the next signal is
//! taken (no reentrancy). This serialization makes the scheduler the sole
//! writer of readiness and schedule state — no locks around either.
//!
//! External collaborators (timers, readiness sources) never call into the
//! scheduler directly; their completions re-enter as signals through the
//! queue's [`SignalSender`](crate::SignalSender) handles.
//!
//! ## Rules
//! - Signals are processed strictly in queue order, fully to completion.
//! - Cancellation is observed between signals, never mid-handler.
//! - On exit the actor drops any armed timer (`cancel_all`).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::scheduler::core::PollScheduler;
use crate::scheduler::signals::{Signal, SignalQueue};

/// Message-queue-driven front end for a [`PollScheduler`].
pub struct EventActor {
    scheduler: PollScheduler,
    signals: Arc<SignalQueue>,
}

impl EventActor {
    /// Creates an actor consuming `signals` into `scheduler`.
    pub fn new(scheduler: PollScheduler, signals: Arc<SignalQueue>) -> Self {
        Self { scheduler, signals }
    }

    /// Runs until `token` is cancelled, then clears any armed schedule.
    pub async fn run(mut self, token: CancellationToken) -> PollScheduler {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                signal = self.signals.recv() => self.dispatch(signal).await,
            }
        }
        self.scheduler.cancel_all("shutdown");
        self.scheduler
    }

    /// Maps one signal to its handler.
    async fn dispatch(&mut self, signal: Signal) {
        match signal {
            Signal::ServiceStatus { available } => self.scheduler.on_service_status(available),
            Signal::PublishState { succeeded } => self.scheduler.on_publish_state(succeeded),
            Signal::ProvisionChanged => self.scheduler.on_provision_changed().await,
            Signal::SettingsChanged => self.scheduler.on_settings_changed(),
            Signal::ContactAdded { number } => self.scheduler.on_contact_added(&number).await,
            Signal::VerifyResult { attempts } => self.scheduler.on_verify_result(attempts),
            Signal::TimerFired { generation } => self.scheduler.on_timer_fired(generation).await,
        }
    }
}
