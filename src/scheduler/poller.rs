//! # CapabilityPoller: runtime wiring and lifecycle.
//!
//! The poller assembles the pieces — bus, subscriber fan-out, signal queue,
//! timer, scheduler, actor — into one explicitly constructed, owned instance.
//! There is no ambient global state: embedders create a poller, hand its
//! [`SignalSender`] to their readiness sources, and drive it with a
//! [`CancellationToken`].
//!
//! ## High-level architecture
//! ```text
//! readiness sources ──┐
//! contact feed      ──┼── SignalSender::push ──► SignalQueue
//! verify results    ──┘                              │
//!                                                    ▼
//!                         TokioWakeTimer ──fire──► EventActor (single-threaded)
//!                               ▲                     │
//!                               └────── arm ─── PollScheduler
//!                                                     │ publish(Event)
//!                                                     ▼
//!                            Bus ──► fan-out listener ──► SubscriberSet ──► subscribers
//! ```
//!
//! ## Shutdown path
//! ```text
//! token.cancel()
//!   └─► actor finishes the current signal, cancel_all("shutdown")
//!   └─► Bus.publish(ShutdownRequested)
//!   └─► fan-out listener drains buffered events, exits
//!   └─► SubscriberSet::shutdown() joins every worker
//! ```
//! Teardown is deterministic: when [`CapabilityPoller::run`] returns, no
//! worker tasks remain.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::dispatch::QueueRef;
use crate::events::{Bus, Event, EventKind};
use crate::scheduler::actor::EventActor;
use crate::scheduler::core::PollScheduler;
use crate::scheduler::shutdown::wait_for_shutdown_signal;
use crate::scheduler::signals::{SignalQueue, SignalSender};
use crate::sources::SourceRef;
use crate::store::StoreRef;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::timer::{TokioWakeTimer, WakeTimer};

/// Owned capability-poll runtime. See the module docs for the wiring diagram.
pub struct CapabilityPoller {
    cfg: PollConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    signals: Arc<SignalQueue>,
    store: StoreRef,
    queue: QueueRef,
    source: SourceRef,
    timer: Option<Arc<dyn WakeTimer>>,
}

impl CapabilityPoller {
    /// Creates a poller with the given collaborators and subscribers.
    ///
    /// The default wake timer is [`TokioWakeTimer`]; override it with
    /// [`with_timer`](Self::with_timer) when the platform provides a
    /// wake-capable alarm facility.
    pub fn new(
        cfg: PollConfig,
        store: StoreRef,
        queue: QueueRef,
        source: SourceRef,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        let signals = SignalQueue::new(cfg.signal_capacity_clamped());
        Self {
            cfg,
            bus,
            subs,
            signals,
            store,
            queue,
            source,
            timer: None,
        }
    }

    /// Replaces the default in-process timer with a platform one.
    ///
    /// The timer must deliver fires through this poller's [`SignalSender`].
    pub fn with_timer(mut self, timer: Arc<dyn WakeTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Returns a cloneable handle readiness sources push signals through.
    pub fn handle(&self) -> SignalSender {
        self.signals.sender()
    }

    /// Returns the event bus (for additional ad-hoc receivers).
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Runs the actor loop until `token` is cancelled, then tears down
    /// deterministically (see the module docs).
    pub async fn run(self, token: CancellationToken) {
        let CapabilityPoller {
            cfg,
            bus,
            subs,
            signals,
            store,
            queue,
            source,
            timer,
        } = self;

        let fanout_token = CancellationToken::new();
        let fanout = {
            let mut rx = bus.subscribe();
            let set = Arc::clone(&subs);
            let stop = fanout_token.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        ev = rx.recv() => match ev {
                            Ok(ev) => set.emit(&ev),
                            Err(RecvError::Closed) => break,
                            Err(RecvError::Lagged(_)) => continue,
                        }
                    }
                }
                // Forward anything still buffered before workers shut down.
                while let Ok(ev) = rx.try_recv() {
                    set.emit(&ev);
                }
            })
        };

        let timer = timer
            .unwrap_or_else(|| Arc::new(TokioWakeTimer::new(signals.sender())) as Arc<dyn WakeTimer>);
        let scheduler = PollScheduler::new(cfg, store, queue, timer, source, bus.clone());
        let actor = EventActor::new(scheduler, Arc::clone(&signals));
        let _scheduler = actor.run(token).await;

        bus.publish(Event::new(EventKind::ShutdownRequested));
        fanout_token.cancel();
        let _ = fanout.await;

        drop(bus);
        if let Ok(set) = Arc::try_unwrap(subs) {
            set.shutdown().await;
        }
    }

    /// Convenience: runs until the process receives a termination signal.
    pub async fn run_until_signal(self) {
        let token = CancellationToken::new();
        let stop = token.clone();
        tokio::spawn(async move {
            let _ = wait_for_shutdown_signal().await;
            stop.cancel();
        });
        self.run(token).await;
    }
}
