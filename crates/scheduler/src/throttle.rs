//! Interval throttling for periodic maintenance work

use std::time::{Duration, Instant};

/// Lets an action run at most once per interval.
///
/// The first call to [`ready`](Self::ready) always succeeds; later calls
/// succeed only once `interval` has elapsed since the last success.
#[derive(Debug, Clone)]
pub struct IntervalThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl IntervalThrottle {
    /// Create a throttle with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` and records `now` if the action may run.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) <= self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_runs() {
        let mut throttle = IntervalThrottle::new(Duration::from_secs(2));
        assert!(throttle.ready(Instant::now()));
    }

    #[test]
    fn test_suppresses_within_interval() {
        let start = Instant::now();
        let mut throttle = IntervalThrottle::new(Duration::from_secs(2));

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(16)));
        assert!(!throttle.ready(start + Duration::from_secs(2)));
        assert!(throttle.ready(start + Duration::from_millis(2001)));
        assert!(!throttle.ready(start + Duration::from_millis(2500)));
    }
}
