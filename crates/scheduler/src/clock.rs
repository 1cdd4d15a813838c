//! Time sources
//!
//! The core never calls `Instant::now()` directly. It reads time through a
//! [`Clock`] so that the jump state machine and the position cache can be
//! driven by a manual clock in tests and headless hosts.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

/// Source of monotonic time for the viewer core.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
///
/// Clones share the same offset, so a host can hold one handle and advance
/// time while the viewer reads through another.
///
/// # Example
///
/// ```
/// use strip_viewer_scheduler::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(50));
/// assert_eq!(clock.now() - start, Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_micros: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_micros: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.offset_micros
            .fetch_add(delta.as_micros() as u64, Ordering::AcqRel);
    }

    /// Move time forward to `instant`. Instants in the past are ignored.
    pub fn advance_to(&self, instant: Instant) {
        let target = instant.saturating_duration_since(self.base).as_micros() as u64;
        self.offset_micros.fetch_max(target, Ordering::AcqRel);
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_micros.load(Ordering::Acquire))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}
