//! Hosts that service suspension requests
//!
//! The core never blocks on its own. Drivers such as
//! [`Viewer::scroll_to_page`](crate::Viewer::scroll_to_page) hand every
//! [`Wake`] to a [`Host`] and resume once it returns.

use std::sync::Arc;
use std::thread;
use strip_viewer_scheduler::{Clock, ManualClock, Wake};

/// Something that can wait for the next frame or a deadline.
pub trait Host {
    /// Return once `wake` is due.
    fn wait(&mut self, wake: Wake);
}

/// Host that advances a [`ManualClock`] instead of sleeping.
///
/// Used headless and in tests, where a jump of several seconds of
/// simulated time runs instantly.
#[derive(Debug, Clone)]
pub struct ClockHost {
    clock: ManualClock,
    frames: u64,
    timers: u64,
}

impl ClockHost {
    /// Create a host driving `clock`.
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            frames: 0,
            timers: 0,
        }
    }

    /// The driven clock.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of frame waits serviced.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Number of deadline waits serviced.
    pub fn timers(&self) -> u64 {
        self.timers
    }
}

impl Host for ClockHost {
    fn wait(&mut self, wake: Wake) {
        match wake {
            Wake::NextFrame => self.frames += 1,
            Wake::At(_) => self.timers += 1,
        }
        let deadline = wake.deadline(self.clock.now());
        self.clock.advance_to(deadline);
    }
}

/// Host that sleeps the calling thread.
pub struct SleepHost {
    clock: Arc<dyn Clock>,
}

impl SleepHost {
    /// Create a host that measures deadlines against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Host for SleepHost {
    fn wait(&mut self, wake: Wake) {
        let now = self.clock.now();
        if wake.is_due(now) {
            return;
        }
        thread::sleep(wake.deadline(now).saturating_duration_since(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strip_viewer_scheduler::{SystemClock, FRAME_INTERVAL};

    #[test]
    fn test_clock_host_advances_to_deadline() {
        let clock = ManualClock::new();
        let mut host = ClockHost::new(clock.clone());
        let start = clock.now();

        host.wait(Wake::At(start + Duration::from_millis(50)));
        assert_eq!(clock.elapsed(), Duration::from_millis(50));

        host.wait(Wake::NextFrame);
        assert_eq!(clock.elapsed(), Duration::from_millis(50) + FRAME_INTERVAL);
        assert_eq!(host.frames(), 1);
        assert_eq!(host.timers(), 1);
    }

    #[test]
    fn test_clock_host_ignores_past_deadlines() {
        let clock = ManualClock::new();
        let mut host = ClockHost::new(clock.clone());
        let start = clock.now();
        clock.advance(Duration::from_millis(100));

        host.wait(Wake::At(start));
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn test_sleep_host_waits() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut host = SleepHost::new(clock.clone());
        let start = clock.now();

        host.wait(Wake::At(start + Duration::from_millis(5)));
        assert!(clock.now() >= start + Duration::from_millis(5));
    }

    #[test]
    fn test_sleep_host_skips_due_wakes() {
        let manual = ManualClock::new();
        let start = manual.now();
        manual.advance(Duration::from_secs(7200));
        let mut host = SleepHost::new(Arc::new(manual.clone()));

        let before = std::time::Instant::now();
        host.wait(Wake::At(start + Duration::from_secs(3600)));
        host.wait(Wake::At(start));
        assert!(before.elapsed() < Duration::from_secs(1));
    }
}
