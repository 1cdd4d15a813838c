//! Bounded retry with fixed backoff
//!
//! Used where the core must wait for something that has no single completion
//! event, such as an entry becoming resident after its batch was requested.

use crate::frame::Wake;
use std::time::{Duration, Instant};

/// Maximum attempts and the fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of waits allowed before giving up.
    pub max_attempts: u32,

    /// Delay between attempts. Backoff is fixed, not exponential.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a retry policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Upper bound on the time spent waiting under this policy.
    pub fn budget(&self) -> Duration {
        self.delay * self.max_attempts
    }

    /// Start tracking attempts under this policy.
    pub fn start(self) -> RetryState {
        RetryState {
            policy: self,
            attempts: 0,
        }
    }
}

/// Attempt counter for a running [`RetryPolicy`].
///
/// # Example
///
/// ```
/// use strip_viewer_scheduler::RetryPolicy;
/// use std::time::{Duration, Instant};
///
/// let now = Instant::now();
/// let mut retry = RetryPolicy::new(2, Duration::from_millis(50)).start();
///
/// assert!(retry.next_wake(now).is_some());
/// assert!(retry.next_wake(now).is_some());
/// assert!(retry.next_wake(now).is_none()); // budget exhausted
/// assert_eq!(retry.attempts(), 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    /// Consume one attempt and return when to check again, or `None` once
    /// the budget is exhausted.
    pub fn next_wake(&mut self, now: Instant) -> Option<Wake> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(Wake::after(now, self.policy.delay))
    }

    /// Attempts consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether no attempts remain.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// The policy being tracked.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}
