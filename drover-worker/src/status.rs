//! Status and health tracking
//!
//! The poll loop records the start of every poll attempt; health checks and
//! heartbeats read that timestamp without locking.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sentinel for "never polled".
const NEVER: i64 = i64::MIN;

/// The last-poll timestamp, shared between the poll loop (writer) and
/// health-check or heartbeat readers.
///
/// Stored as epoch milliseconds in an atomic cell so readers never contend
/// with the loop. Updates are monotonically non-decreasing.
#[derive(Debug)]
pub struct PollState {
    last_polled_ms: AtomicI64,
}

impl PollState {
    pub fn new() -> Self {
        Self {
            last_polled_ms: AtomicI64::new(NEVER),
        }
    }

    /// Records the start of a poll attempt.
    ///
    /// Called before the scheduler request is issued, so a failing request
    /// still counts as an attempt and does not make the worker look stalled
    /// earlier than it did.
    pub fn record_poll(&self, now: DateTime<Utc>) {
        // fetch_max keeps the timestamp monotonic even if a stale writer
        // races a fresher one
        self.last_polled_ms
            .fetch_max(now.timestamp_millis(), Ordering::SeqCst);
    }

    /// The start of the most recent poll attempt, if any.
    pub fn last_polled(&self) -> Option<DateTime<Utc>> {
        match self.last_polled_ms.load(Ordering::SeqCst) {
            NEVER => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    /// Liveness predicate for external health checks.
    ///
    /// True iff the most recent poll started within `query_interval_seconds
    /// * 30` of now. The x30 multiplier turns a short cadence into a
    /// generous window (a 10-second cadence tolerates 5 minutes of silence)
    /// so scheduling jitter and transient scheduler slowness do not read as
    /// unhealthy.
    pub fn is_still_polling(&self, query_interval_seconds: u64) -> bool {
        self.is_still_polling_at(query_interval_seconds, Utc::now())
    }

    fn is_still_polling_at(&self, query_interval_seconds: u64, now: DateTime<Utc>) -> bool {
        let Some(last_polled) = self.last_polled() else {
            return false;
        };
        let window_ms = (query_interval_seconds as i64).saturating_mul(30_000);
        (now - last_polled).num_milliseconds() <= window_ms
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time description of a worker, safe to read while the loop runs.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub name: String,
    pub work_pool_name: String,
    pub queue_names: Vec<String>,
    pub settings: WorkerSettings,
}

/// The settings portion of a status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSettings {
    pub poll_interval_seconds: u64,
    pub prefetch_seconds: u64,
    pub concurrency_limit: Option<usize>,
}
