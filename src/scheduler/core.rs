//! # PollScheduler: the core scheduling state machine.
//!
//! Owns the "next scheduled time" state and every decision about it:
//! coalesced timer arming, readiness gating, discovery passes, eviction, and
//! re-arming. All methods run inside the single-threaded actor context — the
//! scheduler is the sole writer of readiness and schedule state.
//!
//! ## State machine
//! ```text
//! Idle ──request_poll──► Armed ──timer fire──► Running ──► Armed
//!  ▲                       │                      │          │
//!  └───── cancel_all ──────┘                      └── not ready / arm failed ──► Idle
//! ```
//!
//! ## Pass flow
//! ```text
//! timer fire (generation checked, stale fires discarded)
//!   ├─► re-check readiness (may have changed since arming)
//!   ├─► store.query(ordered ascending by last_updated)
//!   │     └─ Err ──► fixed short retry, nothing else touched
//!   ├─► scan: due records → batch (capped); first not-due record
//!   │         bounds the scan and yields the remaining-wait candidate
//!   ├─► re-arm: request_poll(remaining) + request_poll(jittered)
//!   │           (earliest wins; happens BEFORE submission)
//!   ├─► eviction over the same snapshot (full-scan passes only)
//!   └─► submit batch (fire-and-forget)
//! ```
//!
//! ## Rules
//! - Earliest wins: a request never pushes an armed poll later.
//! - New-contact requests preempt an armed periodic timer, never vice versa.
//! - Scheduling is never left armed while not ready.
//! - Store failures are retried with a bounded delay; timer-arm failures drop
//!   that cycle only. Neither crashes the actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::PollConfig;
use crate::dispatch::{DiscoveryBatch, PollKind, QueueRef};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{verify_backoff, EvictionPolicy, IntervalPolicy, Provisioned, ReadinessState};
use crate::scheduler::state::ScheduleState;
use crate::sources::{DeviceIdentity, SourceRef};
use crate::store::{now_millis, Capability, ContactRecord, RecordFilter, RecordPatch, StoreRef};
use crate::timer::WakeTimer;

/// Core scheduling state machine. See the module docs for the state diagram.
pub struct PollScheduler {
    cfg: PollConfig,
    readiness: ReadinessState,
    state: ScheduleState,
    intervals: IntervalPolicy,
    eviction: EvictionPolicy,
    settings_stale: bool,
    failure_streak: u32,
    identity: Option<DeviceIdentity>,
    store: StoreRef,
    queue: QueueRef,
    timer: Arc<dyn WakeTimer>,
    source: SourceRef,
    bus: Bus,
}

impl PollScheduler {
    /// Creates a scheduler in `Idle` with readiness unknown.
    ///
    /// Interval and eviction policies are initialized from the source's
    /// current settings.
    pub fn new(
        cfg: PollConfig,
        store: StoreRef,
        queue: QueueRef,
        timer: Arc<dyn WakeTimer>,
        source: SourceRef,
        bus: Bus,
    ) -> Self {
        let settings = source.settings();
        Self {
            intervals: IntervalPolicy::new(&settings, &cfg),
            eviction: EvictionPolicy::new(&settings),
            readiness: ReadinessState::default(),
            state: ScheduleState::new(),
            settings_stale: false,
            failure_streak: 0,
            identity: None,
            cfg,
            store,
            queue,
            timer,
            source,
            bus,
        }
    }

    /// Current readiness inputs.
    pub fn readiness(&self) -> ReadinessState {
        self.readiness
    }

    /// Identity fields captured after the first successful publish, if any.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Requests a discovery pass after `delay`.
    ///
    /// Coalescing rule: if a poll is already armed at or before the candidate
    /// time, the call is a no-op — earliest wins, a poll is never pushed later.
    /// `NewContactsOnly` requests preempt an armed periodic timer first.
    ///
    /// If readiness is false the request is dropped and any armed timer is
    /// cancelled: scheduling is never armed while not ready.
    pub fn request_poll(&mut self, delay: Duration, kind: PollKind) {
        if !self.readiness.is_ready() {
            self.cancel_all("not_ready");
            return;
        }

        let candidate = Instant::now() + delay;
        if let Some(at) = self.state.next_fire_at() {
            let preempts = kind == PollKind::NewContactsOnly
                && self.state.armed_kind() == PollKind::Normal;
            if !preempts && candidate >= at {
                self.bus.publish(
                    Event::new(EventKind::PollCoalesced)
                        .with_delay(delay)
                        .with_poll_kind(kind),
                );
                return;
            }
            if let Some(handle) = self.state.clear() {
                self.timer.cancel(&handle);
            }
        }

        let generation = self.state.bump();
        match self.timer.arm(candidate, generation) {
            Ok(handle) => {
                self.state.arm(candidate, handle, kind);
                self.bus.publish(
                    Event::new(EventKind::PollScheduled)
                        .with_delay(delay)
                        .with_poll_kind(kind)
                        .with_generation(generation),
                );
            }
            Err(e) => {
                // This cycle's poll is dropped; the next external signal re-arms.
                self.bus
                    .publish(Event::new(EventKind::TimerArmFailed).with_reason(e.as_message()));
            }
        }
    }

    /// Drops any armed timer and bumps the generation so in-flight fires are
    /// discarded as stale.
    pub fn cancel_all(&mut self, reason: &str) {
        if let Some(handle) = self.state.clear() {
            self.timer.cancel(&handle);
            self.state.bump();
            self.bus
                .publish(Event::new(EventKind::ScheduleCleared).with_reason(reason.to_string()));
        }
    }

    /// Dispatches a timer fire. Fires that no longer match the current
    /// schedule generation are discarded without side effects.
    pub async fn on_timer_fired(&mut self, generation: u64) {
        if !self.state.matches(generation) {
            self.bus
                .publish(Event::new(EventKind::StaleFireDiscarded).with_generation(generation));
            return;
        }
        let kind = self.state.armed_kind();
        // The handle already fired; dropping it is enough.
        self.state.clear();
        self.run_discovery_pass(kind).await;
    }

    /// Runs one discovery pass.
    ///
    /// Re-checks readiness first: the state may have changed since the timer
    /// was armed. Store read failures schedule a short bounded retry and leave
    /// everything else untouched.
    pub async fn run_discovery_pass(&mut self, kind: PollKind) {
        if !self.readiness.is_ready() {
            self.cancel_all("not_ready");
            return;
        }
        self.refresh_settings_if_stale();
        self.bus
            .publish(Event::new(EventKind::PassStarted).with_poll_kind(kind));

        let filter = match kind {
            PollKind::Normal => RecordFilter::All,
            PollKind::NewContactsOnly => RecordFilter::NewOnly,
        };
        let records = match self.store.query(filter).await {
            Ok(records) => records,
            Err(e) => {
                self.failure_streak = self.failure_streak.saturating_add(1);
                let delay = self.intervals.backoff_on_error();
                self.bus.publish(
                    Event::new(EventKind::StoreRetryScheduled)
                        .with_delay(delay)
                        .with_reason(e.as_label()),
                );
                self.request_poll(delay, PollKind::Normal);
                return;
            }
        };

        let now = now_millis();
        let due_after = self
            .intervals
            .base()
            .saturating_sub(self.intervals.min_interval())
            .as_millis() as u64;

        let mut batch: Vec<i64> = Vec::new();
        let mut next_due_in: Option<Duration> = None;
        for rec in &records {
            // A future last-updated stamp is clock skew; treat it as due.
            let due = rec.last_updated_ms > now || now - rec.last_updated_ms >= due_after;
            if !due {
                // The query is ordered ascending, so the first not-due record
                // determines the earliest future work.
                next_due_in = Some(Duration::from_millis(due_after - (now - rec.last_updated_ms)));
                break;
            }
            if batch.len() < self.cfg.batch_cap {
                batch.push(rec.id);
            }
        }

        // Re-arm before batch submission so a slow downstream queue can never
        // stall future scheduling. Earliest candidate wins.
        if let Some(wait) = next_due_in {
            self.request_poll(wait, PollKind::Normal);
        }
        let streak = std::mem::take(&mut self.failure_streak);
        self.request_poll(self.intervals.next_interval(streak), PollKind::Normal);

        if kind == PollKind::Normal {
            self.apply_evictions(&records, now).await;
        }

        let batched = batch.len() as u64;
        if !batch.is_empty() {
            self.bus.publish(
                Event::new(EventKind::BatchSubmitted)
                    .with_count(batched)
                    .with_poll_kind(kind),
            );
            let context: Arc<str> = Arc::from(format!("pass-{}", self.state.generation()));
            self.queue
                .submit(DiscoveryBatch {
                    ids: batch,
                    kind,
                    context,
                })
                .await;
        }
        self.bus.publish(
            Event::new(EventKind::PassCompleted)
                .with_count(batched)
                .with_poll_kind(kind),
        );
    }

    /// Transport/service availability changed.
    pub fn on_service_status(&mut self, available: bool) {
        self.readiness.transport_available = available;
        self.branch_on_readiness();
    }

    /// Publish outcome changed. The first success captures device identity
    /// fields once; the capture is never re-triggered.
    pub fn on_publish_state(&mut self, succeeded: bool) {
        self.readiness.last_publish_succeeded = succeeded;
        if succeeded && self.identity.is_none() {
            if let Some(identity) = self.source.identity() {
                self.identity = Some(identity);
                self.bus.publish(Event::new(EventKind::IdentityCaptured));
            }
        }
        self.branch_on_readiness();
    }

    /// Provisioning values changed. An enabled→disabled transition marks every
    /// cached capability unknown (bulk invalidation, not eviction by age).
    pub async fn on_provision_changed(&mut self) {
        let previous = self.readiness.provisioned;
        let current = self.source.provisioned();
        if previous == Provisioned::Yes && current == Provisioned::No {
            match self.store.invalidate_all().await {
                Ok(rows) => {
                    self.bus
                        .publish(Event::new(EventKind::CapabilitiesInvalidated).with_count(rows));
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::StoreWriteFailed).with_reason(e.as_message()),
                    );
                }
            }
        }
        self.readiness.provisioned = current;
        self.branch_on_readiness();
    }

    /// Configured intervals changed: drop the schedule, re-read settings
    /// before the next pass, and re-request an immediate poll if ready.
    pub fn on_settings_changed(&mut self) {
        self.cancel_all("settings_changed");
        self.settings_stale = true;
        if self.readiness.is_ready() {
            self.request_poll(Duration::ZERO, PollKind::Normal);
        }
    }

    /// A contact was added. Only a real change (row count > 0) triggers the
    /// accelerated new-contacts poll, so duplicate adds schedule nothing.
    pub async fn on_contact_added(&mut self, number: &str) {
        match self.store.upsert(number, RecordPatch::new_contact()).await {
            Ok(rows) => {
                self.bus.publish(
                    Event::new(EventKind::ContactUpserted)
                        .with_number(number.to_string())
                        .with_count(rows),
                );
                if rows > 0 {
                    self.request_poll(self.cfg.new_contact_delay, PollKind::NewContactsOnly);
                }
            }
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::StoreWriteFailed).with_reason(e.as_message()));
                self.request_poll(self.intervals.backoff_on_error(), PollKind::Normal);
            }
        }
    }

    /// Schedules the next verification check at `verify_base × 2^(n−1)`,
    /// clamped to the configured ceiling. Dropped when not ready.
    pub fn on_verify_result(&mut self, attempts: u32) {
        if !self.readiness.is_ready() {
            return;
        }
        let delay = verify_backoff(attempts, self.cfg.verify_base, self.cfg.verify_ceiling);
        self.request_poll(delay, PollKind::Normal);
    }

    fn branch_on_readiness(&mut self) {
        let ready = self.readiness.is_ready();
        self.bus.publish(
            Event::new(EventKind::ReadinessChanged).with_reason(if ready {
                "ready"
            } else {
                "not_ready"
            }),
        );
        if ready {
            self.request_poll(Duration::ZERO, PollKind::Normal);
        } else {
            self.cancel_all("not_ready");
        }
    }

    fn refresh_settings_if_stale(&mut self) {
        if !self.settings_stale {
            return;
        }
        let settings = self.source.settings();
        self.intervals = IntervalPolicy::new(&settings, &self.cfg);
        self.eviction = EvictionPolicy::new(&settings);
        self.settings_stale = false;
    }

    async fn apply_evictions(&mut self, records: &[ContactRecord], now_ms: u64) {
        let evictions = self.eviction.select_obsolete(records, now_ms);
        if evictions.is_empty() {
            return;
        }

        let cleared = Capability {
            supported: false,
            updated_ms: now_ms,
        };
        let mut patched = 0u64;
        for eviction in &evictions {
            let patch = RecordPatch {
                voice: eviction.clear_voice.then_some(cleared),
                video: eviction.clear_video.then_some(cleared),
                ..RecordPatch::default()
            };
            match self.store.upsert(&eviction.number, patch).await {
                Ok(rows) => patched += rows.min(1),
                Err(e) => {
                    // Independent single-record writes; skip and move on.
                    self.bus.publish(
                        Event::new(EventKind::StoreWriteFailed)
                            .with_number(eviction.number.clone())
                            .with_reason(e.as_message()),
                    );
                }
            }
        }
        self.bus
            .publish(Event::new(EventKind::RecordsEvicted).with_count(patched));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollSettings;
    use crate::dispatch::DiscoveryQueue;
    use crate::error::{StoreError, TimerError};
    use crate::sources::ProvisioningSource;
    use crate::store::{CapabilityStore, MemoryStore};
    use crate::timer::TimerHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::Mutex as StdMutex;
    use tokio_util::sync::CancellationToken;

    struct RecordingTimer {
        armed: StdMutex<Vec<(Instant, u64)>>,
        cancelled: StdMutex<Vec<u64>>,
        refuse: AtomicBool,
    }

    impl RecordingTimer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                armed: StdMutex::new(Vec::new()),
                cancelled: StdMutex::new(Vec::new()),
                refuse: AtomicBool::new(false),
            })
        }

        fn armed_count(&self) -> usize {
            self.armed.lock().unwrap().len()
        }

        fn last_deadline(&self) -> Instant {
            self.armed.lock().unwrap().last().expect("nothing armed").0
        }

        fn last_generation(&self) -> u64 {
            self.armed.lock().unwrap().last().expect("nothing armed").1
        }
    }

    impl WakeTimer for RecordingTimer {
        fn arm(&self, deadline: Instant, generation: u64) -> Result<TimerHandle, TimerError> {
            if self.refuse.load(AtomicOrdering::Relaxed) {
                return Err(TimerError::ArmRefused {
                    reason: "refused by test".into(),
                });
            }
            self.armed.lock().unwrap().push((deadline, generation));
            Ok(TimerHandle::new(generation, CancellationToken::new()))
        }

        fn cancel(&self, handle: &TimerHandle) {
            self.cancelled.lock().unwrap().push(handle.generation());
            handle.abort();
        }
    }

    #[derive(Default)]
    struct CapturingQueue {
        batches: StdMutex<Vec<DiscoveryBatch>>,
    }

    #[async_trait]
    impl DiscoveryQueue for CapturingQueue {
        async fn submit(&self, batch: DiscoveryBatch) {
            self.batches.lock().unwrap().push(batch);
        }
    }

    /// Queue that records whether the scheduler was already re-armed when the
    /// batch arrived.
    struct SubmissionProbe {
        timer: Arc<RecordingTimer>,
        armed_before_submit: AtomicBool,
        arms_at_submit: StdMutex<usize>,
    }

    #[async_trait]
    impl DiscoveryQueue for SubmissionProbe {
        async fn submit(&self, _batch: DiscoveryBatch) {
            let arms = self.timer.armed_count();
            *self.arms_at_submit.lock().unwrap() = arms;
            self.armed_before_submit
                .store(arms > 0, AtomicOrdering::Relaxed);
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CapabilityStore for FailingStore {
        async fn query(&self, _filter: RecordFilter) -> Result<Vec<ContactRecord>, StoreError> {
            Err(StoreError::Unavailable {
                reason: "down for test".into(),
            })
        }

        async fn upsert(&self, _number: &str, _patch: RecordPatch) -> Result<u64, StoreError> {
            Err(StoreError::Write {
                reason: "down for test".into(),
            })
        }

        async fn invalidate_all(&self) -> Result<u64, StoreError> {
            Err(StoreError::Write {
                reason: "down for test".into(),
            })
        }
    }

    struct StaticSource {
        provisioned: StdMutex<Provisioned>,
        settings: StdMutex<PollSettings>,
        identity: StdMutex<Option<DeviceIdentity>>,
    }

    impl StaticSource {
        fn new(settings: PollSettings) -> Arc<Self> {
            Arc::new(Self {
                provisioned: StdMutex::new(Provisioned::Yes),
                settings: StdMutex::new(settings),
                identity: StdMutex::new(None),
            })
        }
    }

    impl ProvisioningSource for StaticSource {
        fn provisioned(&self) -> Provisioned {
            *self.provisioned.lock().unwrap()
        }

        fn identity(&self) -> Option<DeviceIdentity> {
            self.identity.lock().unwrap().clone()
        }

        fn settings(&self) -> PollSettings {
            *self.settings.lock().unwrap()
        }
    }

    struct Fixture {
        scheduler: PollScheduler,
        timer: Arc<RecordingTimer>,
        queue: Arc<CapturingQueue>,
        store: Arc<MemoryStore>,
        source: Arc<StaticSource>,
    }

    fn fixture_with(settings: PollSettings, records: Vec<ContactRecord>) -> Fixture {
        let timer = RecordingTimer::new();
        let queue = Arc::new(CapturingQueue::default());
        let store = Arc::new(MemoryStore::seeded(records));
        let source = StaticSource::new(settings);
        let scheduler = PollScheduler::new(
            PollConfig::default(),
            store.clone(),
            queue.clone(),
            timer.clone(),
            source.clone(),
            Bus::new(64),
        );
        Fixture {
            scheduler,
            timer,
            queue,
            store,
            source,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PollSettings::default(), Vec::new())
    }

    fn make_ready(scheduler: &mut PollScheduler) {
        scheduler.readiness.transport_available = true;
        scheduler.readiness.last_publish_succeeded = true;
        scheduler.readiness.provisioned = Provisioned::Yes;
    }

    fn seconds_until(deadline: Instant) -> f64 {
        deadline.saturating_duration_since(Instant::now()).as_secs_f64()
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_poll_dropped_when_not_ready() {
        let mut f = fixture();
        f.scheduler.request_poll(Duration::from_secs(5), PollKind::Normal);
        assert_eq!(f.timer.armed_count(), 0);
        assert!(!f.scheduler.state.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_loss_cancels_armed_timer() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        f.scheduler.request_poll(Duration::from_secs(5), PollKind::Normal);
        assert!(f.scheduler.state.is_armed());

        f.scheduler.on_service_status(false);
        assert!(!f.scheduler.state.is_armed());
        assert_eq!(f.timer.cancelled.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalescing_keeps_minimum_of_candidates() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        let start = Instant::now();

        for secs in [300u64, 120, 500, 60, 400] {
            f.scheduler
                .request_poll(Duration::from_secs(secs), PollKind::Normal);
        }

        let armed_at = f.scheduler.state.next_fire_at().expect("must stay armed");
        assert_eq!(armed_at, start + Duration::from_secs(60));
        // 300 arms, 120 re-arms, 500 coalesces, 60 re-arms, 400 coalesces
        assert_eq!(f.timer.armed_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_candidate_is_a_noop() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        f.scheduler.request_poll(Duration::from_secs(30), PollKind::Normal);
        let before = f.scheduler.state.generation();

        f.scheduler.request_poll(Duration::from_secs(30), PollKind::Normal);
        assert_eq!(f.scheduler.state.generation(), before);
        assert_eq!(f.timer.armed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_contact_preempts_periodic_even_if_later() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        f.scheduler.request_poll(Duration::from_secs(2), PollKind::Normal);

        f.scheduler
            .request_poll(Duration::from_secs(30), PollKind::NewContactsOnly);
        let armed_at = f.scheduler.state.next_fire_at().unwrap();
        assert!((seconds_until(armed_at) - 30.0).abs() < 0.5);
        assert_eq!(f.scheduler.state.armed_kind(), PollKind::NewContactsOnly);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_never_preempts_new_contact_poll() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        f.scheduler
            .request_poll(Duration::from_secs(5), PollKind::NewContactsOnly);

        // A later periodic request coalesces away; the armed kind survives.
        f.scheduler.request_poll(Duration::from_secs(60), PollKind::Normal);
        assert_eq!(f.scheduler.state.armed_kind(), PollKind::NewContactsOnly);

        // An earlier periodic request still wins on time alone.
        f.scheduler.request_poll(Duration::from_secs(1), PollKind::Normal);
        assert_eq!(f.scheduler.state.armed_kind(), PollKind::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_arm_failure_drops_cycle_only() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        f.timer.refuse.store(true, AtomicOrdering::Relaxed);

        f.scheduler.request_poll(Duration::from_secs(5), PollKind::Normal);
        assert!(!f.scheduler.state.is_armed());

        // The scheduler survives and the next request arms normally.
        f.timer.refuse.store(false, AtomicOrdering::Relaxed);
        f.scheduler.request_poll(Duration::from_secs(5), PollKind::Normal);
        assert!(f.scheduler.state.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_discarded_without_side_effects() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);
        f.scheduler.request_poll(Duration::from_secs(1), PollKind::Normal);
        let generation = f.timer.last_generation();

        f.scheduler.cancel_all("test");
        let arms_before = f.timer.armed_count();

        f.scheduler.on_timer_fired(generation).await;
        assert_eq!(f.timer.armed_count(), arms_before, "no pass may run");
        assert!(f.queue.batches.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_aborts_when_readiness_lost_after_arming() {
        let timer = RecordingTimer::new();
        let queue = Arc::new(CapturingQueue::default());
        let source = StaticSource::new(PollSettings::default());
        let mut scheduler = PollScheduler::new(
            PollConfig::default(),
            Arc::new(FailingStore),
            queue.clone(),
            timer.clone(),
            source,
            Bus::new(64),
        );

        // Not ready: the pass must return before touching the store, so the
        // failing store must not bump the failure streak.
        scheduler.run_discovery_pass(PollKind::Normal).await;
        assert_eq!(scheduler.failure_streak, 0);
        assert_eq!(timer.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_schedules_fixed_bounded_retry() {
        let timer = RecordingTimer::new();
        let queue = Arc::new(CapturingQueue::default());
        let source = StaticSource::new(PollSettings::default());
        let mut scheduler = PollScheduler::new(
            PollConfig::default(),
            Arc::new(FailingStore),
            queue.clone(),
            timer.clone(),
            source,
            Bus::new(64),
        );
        make_ready(&mut scheduler);

        scheduler.run_discovery_pass(PollKind::Normal).await;
        assert_eq!(scheduler.failure_streak, 1);
        assert_eq!(timer.armed_count(), 1);
        let retry = PollConfig::default().error_retry;
        assert!((seconds_until(timer.last_deadline()) - retry.as_secs_f64()).abs() < 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_scan_stops_at_first_not_due() {
        // poll_interval 1000s → due threshold 900s.
        let settings = PollSettings {
            poll_interval: Duration::from_secs(1000),
            ..PollSettings::default()
        };
        let now = now_millis();
        let mut due = ContactRecord::new(1, "555-0100");
        due.last_updated_ms = now - 950_000;
        let mut almost = ContactRecord::new(2, "555-0101");
        almost.last_updated_ms = now - 800_000; // due in ~100s
        let mut fresh = ContactRecord::new(3, "555-0102");
        fresh.last_updated_ms = now - 700_000;
        let mut f = fixture_with(settings, vec![due, almost, fresh]);

        // Readiness assembles piecewise; only the final signal may arm.
        f.scheduler.on_publish_state(true);
        f.scheduler.on_provision_changed().await;
        assert_eq!(f.timer.armed_count(), 0);
        f.scheduler.on_service_status(true);
        assert_eq!(f.timer.armed_count(), 1, "exactly one immediate poll");
        assert!(seconds_until(f.timer.last_deadline()) < 0.5);

        f.scheduler.on_timer_fired(f.timer.last_generation()).await;

        let batches = f.queue.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].ids, vec![1], "only record #1 is due");

        // Reschedule comes from record #2's remaining wait (~100s), not the
        // jittered base interval (>= 900s).
        let wait = seconds_until(f.scheduler.state.next_fire_at().unwrap());
        assert!((95.0..105.0).contains(&wait), "rearm at {wait}s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_happens_before_batch_submission() {
        let settings = PollSettings {
            poll_interval: Duration::from_secs(1000),
            ..PollSettings::default()
        };
        let timer = RecordingTimer::new();
        let probe = Arc::new(SubmissionProbe {
            timer: timer.clone(),
            armed_before_submit: AtomicBool::new(false),
            arms_at_submit: StdMutex::new(0),
        });
        let mut overdue = ContactRecord::new(1, "555-0100");
        overdue.last_updated_ms = now_millis() - 950_000;
        let store = Arc::new(MemoryStore::seeded(vec![overdue]));
        let source = StaticSource::new(settings);
        let mut scheduler = PollScheduler::new(
            PollConfig::default(),
            store,
            probe.clone(),
            timer.clone(),
            source,
            Bus::new(64),
        );
        make_ready(&mut scheduler);

        scheduler.run_discovery_pass(PollKind::Normal).await;
        assert!(probe.armed_before_submit.load(AtomicOrdering::Relaxed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_bounded_by_cap() {
        let settings = PollSettings {
            poll_interval: Duration::from_secs(1000),
            ..PollSettings::default()
        };
        let now = now_millis();
        let records = (0i64..150)
            .map(|i| {
                let mut rec = ContactRecord::new(i + 1, format!("555-{i:04}"));
                rec.last_updated_ms = now - 950_000 - i as u64;
                rec
            })
            .collect();
        let mut f = fixture_with(settings, records);
        make_ready(&mut f.scheduler);

        f.scheduler.run_discovery_pass(PollKind::Normal).await;
        let batches = f.queue.batches.lock().unwrap();
        assert_eq!(batches[0].ids.len(), PollConfig::default().batch_cap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_contact_upsert_is_idempotent() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);

        f.scheduler.on_contact_added("555-0100").await;
        assert_eq!(f.timer.armed_count(), 1);
        assert_eq!(f.scheduler.state.armed_kind(), PollKind::NewContactsOnly);
        let delay = seconds_until(f.timer.last_deadline());
        assert!((delay - 5.0).abs() < 0.5, "new-contact delay was {delay}s");

        // Second add changes no rows → no additional scheduling.
        f.scheduler.on_contact_added("555-0100").await;
        assert_eq!(f.timer.armed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_contact_pass_queries_new_only() {
        let now = now_millis();
        let mut polled = ContactRecord::new(1, "555-0100");
        polled.last_updated_ms = now - 1_000;
        let mut f = fixture_with(PollSettings::default(), vec![polled]);
        make_ready(&mut f.scheduler);

        f.scheduler.on_contact_added("555-0199").await;
        f.scheduler.on_timer_fired(f.timer.last_generation()).await;

        let batches = f.queue.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].kind, PollKind::NewContactsOnly);
        assert_eq!(batches[0].ids.len(), 1, "only the never-polled record");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deprovisioning_bulk_invalidates() {
        let now = now_millis();
        let mut rec = ContactRecord::new(1, "555-0100");
        rec.last_updated_ms = now - 1_000;
        rec.voice = Capability {
            supported: true,
            updated_ms: now - 1_000,
        };
        let mut f = fixture_with(PollSettings::default(), vec![rec]);
        make_ready(&mut f.scheduler);
        *f.source.provisioned.lock().unwrap() = Provisioned::No;

        f.scheduler.on_provision_changed().await;

        let rows = f.store.snapshot().await;
        assert!(!rows[0].voice.is_known());
        assert!(!f.scheduler.state.is_armed(), "deprovisioned → no schedule");
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_result_uses_exponential_delay() {
        let mut f = fixture();
        make_ready(&mut f.scheduler);

        f.scheduler.on_verify_result(3);
        let delay = seconds_until(f.timer.last_deadline());
        assert!((delay - 120.0).abs() < 0.5, "verify delay was {delay}s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_result_ignored_when_not_ready() {
        let mut f = fixture();
        f.scheduler.on_verify_result(3);
        assert_eq!(f.timer.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_change_forces_interval_reload() {
        let settings = PollSettings {
            poll_interval: Duration::from_secs(1000),
            ..PollSettings::default()
        };
        let now = now_millis();
        // Not due under 1000s, overdue under 100s.
        let mut rec = ContactRecord::new(1, "555-0100");
        rec.last_updated_ms = now - 200_000;
        let mut f = fixture_with(settings, vec![rec]);
        make_ready(&mut f.scheduler);

        *f.source.settings.lock().unwrap() = PollSettings {
            poll_interval: Duration::from_secs(100),
            ..PollSettings::default()
        };
        f.scheduler.on_settings_changed();
        assert!(f.scheduler.state.is_armed(), "immediate re-poll when ready");

        f.scheduler.on_timer_fired(f.timer.last_generation()).await;
        let batches = f.queue.batches.lock().unwrap();
        assert_eq!(batches.len(), 1, "record due under the reloaded interval");
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_applied_over_pass_snapshot() {
        let settings = PollSettings {
            poll_interval: Duration::from_secs(1000),
            cache_expiration: Duration::from_secs(50),
            max_record_age: Duration::from_secs(1_000_000),
        };
        let now = now_millis();
        let mut rec = ContactRecord::new(1, "555-0100");
        rec.last_updated_ms = now - 1_000;
        rec.voice = Capability {
            supported: true,
            updated_ms: now - 60_000,
        };
        let mut f = fixture_with(settings, vec![rec]);
        make_ready(&mut f.scheduler);

        f.scheduler.run_discovery_pass(PollKind::Normal).await;

        let rows = f.store.snapshot().await;
        assert!(!rows[0].voice.supported);
        assert!(rows[0].voice.updated_ms >= now, "stamped to pass time");
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_captured_once_on_first_publish_success() {
        let mut f = fixture();
        *f.source.identity.lock().unwrap() = Some(DeviceIdentity {
            number: Some("555-0000".into()),
            subscriber_id: None,
        });

        f.scheduler.on_publish_state(true);
        assert!(f.scheduler.identity().is_some());

        // A later identity change is not re-captured.
        *f.source.identity.lock().unwrap() = Some(DeviceIdentity {
            number: Some("555-9999".into()),
            subscriber_id: None,
        });
        f.scheduler.on_publish_state(true);
        assert_eq!(
            f.scheduler.identity().unwrap().number.as_deref(),
            Some("555-0000")
        );
    }
}
