#![forbid(unsafe_code)]

//! Monotonic time sources for the decoder's timing windows.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic clock measured from an arbitrary epoch.
pub trait Clock {
    /// Time elapsed since the clock's epoch.
    fn now_mono(&self) -> Duration;
}

// ── Monotonic ────────────────────────────────────────────────────────────

/// Monotonic clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_mono(&self) -> Duration {
        self.epoch.elapsed()
    }
}

// ── Manual ───────────────────────────────────────────────────────────────

/// Manually advanced clock.
///
/// Clones share the same reading, so a test can keep one handle while the
/// decoder owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set current monotonic time.
    pub fn set(&self, now: Duration) {
        self.nanos.store(duration_to_nanos(now), Ordering::Relaxed);
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&self, dt: Duration) {
        let dt = duration_to_nanos(dt);
        let _ = self
            .nanos
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(dt))
            });
    }
}

impl Clock for ManualClock {
    fn now_mono(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
