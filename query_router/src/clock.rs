//! Time source abstraction.
//!
//! Mirrors the role the `iox_time` crate plays across the teacher workspace: pipeline code never
//! calls `SystemTime::now()` directly, so cache TTL/LRU behavior can be driven deterministically
//! in tests.

use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// A point in time, expressed as milliseconds since the Unix epoch.
pub type TimeMs = i64;

/// Anything that can report the current time.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> TimeMs;
}

/// A [`Clock`] backed by the OS wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimeMs {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        now.as_millis() as TimeMs
    }
}

/// A [`Clock`] that only advances when told to. Used by cache and pruner tests.
#[derive(Debug)]
pub struct TestClock {
    now: AtomicI64,
}

impl TestClock {
    /// Create a clock starting at the given time.
    pub fn new(start_ms: TimeMs) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Advance the clock by `delta_ms`.
    pub fn advance(&self, delta_ms: TimeMs) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, ms: TimeMs) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> TimeMs {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = TestClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }
}
