//! Error types used by the capvisor runtime and its collaborators.
//!
//! This module defines two main error enums:
//!
//! - [`StoreError`] — errors surfaced by the contact/capability store.
//! - [`TimerError`] — errors surfaced by the deferred wake-timer facility.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Store errors are always recoverable from the scheduler's point of view: a failed
//! read or write schedules a short bounded retry and never crashes the actor.
//! Timer-arm failures drop that cycle's poll only; the next external signal re-arms.

use thiserror::Error;

/// # Errors produced by the contact/capability store.
///
/// These represent transient I/O failures of the external datastore. The
/// scheduler treats every variant as retryable: the record snapshot is simply
/// considered "not due yet" and a short retry is scheduled.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store is temporarily unreachable (locked, remounting, backing service down).
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// The underlying failure message.
        reason: String,
    },

    /// A query returned an unreadable or inconsistent result.
    #[error("store query failed: {reason}")]
    Query {
        /// The underlying failure message.
        reason: String,
    },

    /// A single-record write (upsert/invalidate) failed.
    #[error("store write failed: {reason}")]
    Write {
        /// The underlying failure message.
        reason: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use capvisor::StoreError;
    ///
    /// let err = StoreError::Unavailable { reason: "db locked".into() };
    /// assert_eq!(err.as_label(), "store_unavailable");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "store_unavailable",
            StoreError::Query { .. } => "store_query_failed",
            StoreError::Write { .. } => "store_write_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StoreError::Unavailable { reason } => format!("unavailable: {reason}"),
            StoreError::Query { reason } => format!("query: {reason}"),
            StoreError::Write { reason } => format!("write: {reason}"),
        }
    }

    /// Indicates whether the error is safe to retry.
    ///
    /// Always `true`: store failures are transient by contract. The method
    /// exists so call sites read as intent rather than assumption.
    ///
    /// # Example
    /// ```
    /// use capvisor::StoreError;
    ///
    /// let err = StoreError::Query { reason: "cursor closed".into() };
    /// assert!(err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// # Errors produced by the deferred wake-timer facility.
///
/// Arm failures are fatal to that scheduling attempt only. The scheduler stays
/// alive and relies on the next externally-triggered signal to re-arm.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TimerError {
    /// The timer facility refused to arm a wake-up (quota, power policy, shutdown).
    #[error("timer arm refused: {reason}")]
    ArmRefused {
        /// The underlying failure message.
        reason: String,
    },
}

impl TimerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TimerError::ArmRefused { .. } => "timer_arm_refused",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TimerError::ArmRefused { reason } => format!("arm refused: {reason}"),
        }
    }
}
