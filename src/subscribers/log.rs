//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [scheduled] delay=120000ms kind=Normal gen=7
//! [coalesced] delay=300000ms kind=Normal
//! [pass-started] kind=Normal
//! [batch] count=3 kind=Normal
//! [evicted] count=2
//! [store-retry] delay=120000ms err="store_unavailable"
//! [readiness] not_ready
//! [cleared] reason="settings_changed"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event descriptions
/// to stdout for debugging and demonstration purposes.
///
/// Not intended for production use — implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::PollScheduled => {
                println!(
                    "[scheduled] delay={:?}ms kind={:?} gen={:?}",
                    e.delay_ms, e.poll_kind, e.generation
                );
            }
            EventKind::PollCoalesced => {
                println!("[coalesced] delay={:?}ms kind={:?}", e.delay_ms, e.poll_kind);
            }
            EventKind::ScheduleCleared => {
                println!("[cleared] reason={:?}", e.reason);
            }
            EventKind::TimerArmFailed => {
                println!("[arm-failed] err={:?}", e.reason);
            }
            EventKind::StaleFireDiscarded => {
                println!("[stale-fire] gen={:?}", e.generation);
            }
            EventKind::PassStarted => {
                println!("[pass-started] kind={:?}", e.poll_kind);
            }
            EventKind::PassCompleted => {
                println!("[pass-completed] batched={:?}", e.count);
            }
            EventKind::BatchSubmitted => {
                println!("[batch] count={:?} kind={:?}", e.count, e.poll_kind);
            }
            EventKind::RecordsEvicted => {
                println!("[evicted] count={:?}", e.count);
            }
            EventKind::StoreRetryScheduled => {
                println!("[store-retry] delay={:?}ms err={:?}", e.delay_ms, e.reason);
            }
            EventKind::StoreWriteFailed => {
                println!("[store-write-failed] number={:?} err={:?}", e.number, e.reason);
            }
            EventKind::ReadinessChanged => {
                println!("[readiness] {}", e.reason.as_deref().unwrap_or("?"));
            }
            EventKind::CapabilitiesInvalidated => {
                println!("[invalidated] count={:?}", e.count);
            }
            EventKind::IdentityCaptured => {
                println!("[identity-captured]");
            }
            EventKind::ContactUpserted => {
                println!("[contact] number={:?} changed={:?}", e.number, e.count);
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panic] sub={:?} info={:?}", e.subscriber, e.reason);
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] sub={:?} reason={:?}", e.subscriber, e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
