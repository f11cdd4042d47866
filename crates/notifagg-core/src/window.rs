// Time windows and the clock abstraction
//
// A window id is floor(now / window_size). Buckets opened in different windows
// never merge, and a bucket becomes flushable once the current window id is
// strictly greater than its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Monotonically increasing window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl WindowId {
    /// Map a unix timestamp in milliseconds onto its window.
    ///
    /// Timestamps before the epoch land in window 0. A zero window size is
    /// treated as one millisecond so the function stays total.
    pub fn at(now_millis: i64, window: Duration) -> Self {
        let size = (window.as_millis() as u64).max(1);
        let now = now_millis.max(0) as u64;
        WindowId(now / size)
    }

    /// True when this window has fully elapsed relative to `current`.
    pub fn is_closed(&self, current: WindowId) -> bool {
        self.0 < current.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of wall-clock time, injected so tests can cross window boundaries.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
