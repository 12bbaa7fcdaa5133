//! Monotonic clock sources
//!
//! All Tether timestamps are milliseconds on a monotonic timeline. The
//! timeline starts at zero when the clock is created and can be resumed past
//! a floor (used when a snapshot from an earlier process is loaded) so that
//! newly issued timestamps never sort before restored ones.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A source of monotonic millisecond timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds; never decreases.
    fn now_ms(&self) -> u64;

    /// Ensure every future reading is at least `floor_ms`.
    fn resume_from(&self, floor_ms: u64);
}

/// Production clock backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
    offset_ms: AtomicU64,
    last_ms: AtomicU64,
}

impl MonotonicClock {
    /// Create a clock whose timeline starts now at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicU64::new(0),
            last_ms: AtomicU64::new(0),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        let candidate = elapsed.saturating_add(self.offset_ms.load(Ordering::Acquire));
        // fetch_max keeps readings non-decreasing across racing threads
        let previous = self.last_ms.fetch_max(candidate, Ordering::AcqRel);
        previous.max(candidate)
    }

    fn resume_from(&self, floor_ms: u64) {
        self.offset_ms.fetch_max(floor_ms, Ordering::AcqRel);
        self.last_ms.fetch_max(floor_ms, Ordering::AcqRel);
    }
}

/// Manually driven clock for tests and deterministic simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Advance the clock by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }

    /// Move the clock forward to `time_ms`; earlier values are ignored.
    pub fn set(&self, time_ms: u64) {
        self.now_ms.fetch_max(time_ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn resume_from(&self, floor_ms: u64) {
        self.set(floor_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_decreases() {
        let clock = MonotonicClock::new();
        let mut last = clock.now_ms();
        for _ in 0..1000 {
            let now = clock.now_ms();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_monotonic_clock_resume() {
        let clock = MonotonicClock::new();
        clock.resume_from(50_000);
        assert!(clock.now_ms() >= 50_000);

        // Resuming to an earlier floor is a no-op
        clock.resume_from(10);
        assert!(clock.now_ms() >= 50_000);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_ms(), 100);

        clock.advance(25);
        assert_eq!(clock.now_ms(), 125);

        clock.set(50);
        assert_eq!(clock.now_ms(), 125);

        clock.resume_from(1_000);
        assert_eq!(clock.now_ms(), 1_000);
    }
}
