//! Time source for session expiry

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Unix-seconds clock
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually advanced clock for tests
#[derive(Debug, Default)]
#[allow(dead_code)] // Used in tests
pub struct ManualClock {
    now: AtomicI64,
}

#[allow(dead_code)] // Used in tests
impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
