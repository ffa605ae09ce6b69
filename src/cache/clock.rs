//! Pluggable time source so cache expiry can be tested without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now", in whole seconds. The cache only ever needs
/// second-granularity timestamps (heap priorities are `i64` seconds).
pub trait Clock: Send + Sync {
    /// The current time, in whole seconds since the unix epoch.
    fn now_secs(&self) -> i64;
}

/// Wall-clock time via [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A manually-advanced clock for deterministic expiry tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    /// Starts the clock at `start_secs`.
    pub fn new(start_secs: i64) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start_secs)),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}
