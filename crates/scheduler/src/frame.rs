//! Frame-synchronized scheduling
//!
//! Work in the viewer core is chunked into per-frame callbacks. A component
//! that needs to suspend returns a [`Wake`] describing when it wants to be
//! stepped again; the host maps `NextFrame` onto its display refresh and
//! `At` onto a timer.

use std::time::{Duration, Instant};

/// Nominal frame interval for 60 Hz displays (16.67ms).
///
/// Hosts without a real display refresh (tests, headless tools) advance
/// their clock by this amount when asked for the next frame.
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// A suspension request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Run again on the next display refresh.
    NextFrame,

    /// Run again once the clock reaches this instant.
    At(Instant),
}

impl Wake {
    /// Wake after `delay` from `now`.
    pub fn after(now: Instant, delay: Duration) -> Self {
        Self::At(now + delay)
    }

    /// The instant at which this wake is due, treating a frame as
    /// [`FRAME_INTERVAL`] from `now`.
    pub fn deadline(&self, now: Instant) -> Instant {
        match self {
            Self::NextFrame => now + FRAME_INTERVAL,
            Self::At(at) => *at,
        }
    }

    /// Whether the wake is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self {
            Self::NextFrame => false,
            Self::At(at) => now >= *at,
        }
    }
}

/// Coalesces high-frequency requests into at most one pending frame.
///
/// Scroll events arrive far more often than frames are drawn. Each event
/// calls [`request`](Self::request); only the first request after a frame
/// has been taken asks the host for a new frame.
///
/// # Example
///
/// ```
/// use strip_viewer_scheduler::FrameCoalescer;
///
/// let mut frames = FrameCoalescer::new();
/// assert!(frames.request()); // schedule a frame
/// assert!(!frames.request()); // already pending
/// assert!(frames.take()); // the frame runs
/// assert!(!frames.take()); // nothing left
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameCoalescer {
    pending: bool,
    requests: u64,
    frames: u64,
}

impl FrameCoalescer {
    /// Create a coalescer with no pending frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. Returns `true` if this request scheduled a new
    /// frame, `false` if one was already pending.
    pub fn request(&mut self) -> bool {
        self.requests += 1;
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Consume the pending frame, if any.
    pub fn take(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.frames += 1;
        true
    }

    /// Drop the pending frame without running it.
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    /// Whether a frame is pending.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Total requests recorded.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Total frames consumed.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
