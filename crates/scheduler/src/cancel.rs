//! Cancellation tokens for abandoned work
//!
//! A single in-flight load cannot be cancelled; the core instead abandons the
//! wait and lets the load finish in the background. Tokens let a host drop
//! timers and frame callbacks that belong to abandoned work, such as a jump
//! that was superseded by a newer one.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancellation flag.
///
/// Clones observe the same state.
///
/// # Example
///
/// ```
/// use strip_viewer_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let timer_token = token.clone();
///
/// token.cancel();
/// assert!(timer_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel()` has been called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
