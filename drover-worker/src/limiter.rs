//! Capacity limiter
//!
//! Bounds how many flow run dispatches are in the launch/monitor phase at
//! once. Rendering and validation happen before acquisition; only the
//! submission to the execution backend and the wait for completion hold a
//! slot.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fixed-capacity gate over concurrent job launches.
///
/// `None` capacity is the unbounded sentinel: every acquire succeeds
/// immediately. Waiters queue on the underlying semaphore, so a release
/// always eventually unblocks one of them.
#[derive(Debug)]
pub struct CapacityLimiter {
    limit: Option<usize>,
    semaphore: Option<Arc<Semaphore>>,
}

/// A held capacity slot. The slot is returned when the token is dropped,
/// whether the dispatch succeeded, failed, or panicked.
#[derive(Debug)]
pub struct LimiterToken {
    _permit: Option<OwnedSemaphorePermit>,
}

impl CapacityLimiter {
    /// Creates a limiter with the given capacity, or an unbounded one for
    /// `None`.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            semaphore: limit.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// The configured capacity, if any.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Slots currently free, or `None` for an unbounded limiter.
    #[allow(dead_code)]
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Waits until a slot is free and claims it.
    ///
    /// Callers beyond capacity wait here; they are never dropped.
    pub async fn acquire(&self) -> LimiterToken {
        match &self.semaphore {
            Some(semaphore) => {
                let permit = Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .expect("limiter semaphore is never closed");
                LimiterToken {
                    _permit: Some(permit),
                }
            }
            None => LimiterToken { _permit: None },
        }
    }
}
