//! Timestamp source for document and interval identity.
//!
//! # Responsibility
//! - Hand out epoch-millisecond timestamps for `createdAt`/`updatedAt`.
//! - Let tests substitute a deterministic clock.
//!
//! # Invariants
//! - `SystemClock` never returns the same value twice within one process, so
//!   intervals created in the same millisecond keep distinct identity keys.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Source of identity/update timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time in epoch milliseconds.
    fn now_millis(&self) -> Timestamp;
}

/// Wall clock with a strictly increasing guarantee.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_issued: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        let wall = wall_clock_millis();
        let mut previous = self.last_issued.load(Ordering::Relaxed);
        loop {
            let next = wall.max(previous + 1);
            match self.last_issued.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}

fn wall_clock_millis() -> Timestamp {
    // A clock set before 1970 degrades to 0 and the monotonic bump takes over.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
