//! Strip Viewer Scheduler Library
//!
//! Cooperative scheduling primitives for the viewer core.
//!
//! Nothing in this crate spawns threads or sleeps. Components describe when
//! they want to run again with a [`Wake`], and the host decides how to honor
//! it (next display refresh, a timer, or a simulated clock in tests).
//!
//! # Example
//!
//! ```
//! use strip_viewer_scheduler::{Clock, FrameCoalescer, IntervalThrottle, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut frames = FrameCoalescer::new();
//! let mut evictions = IntervalThrottle::new(Duration::from_secs(2));
//!
//! // Many scroll events inside one frame collapse into one recomputation.
//! assert!(frames.request());
//! assert!(!frames.request());
//! assert!(frames.take());
//!
//! // Expensive work runs at most once per interval.
//! assert!(evictions.ready(clock.now()));
//! clock.advance(Duration::from_millis(500));
//! assert!(!evictions.ready(clock.now()));
//! ```

mod cancel;
mod clock;
mod frame;
mod retry;
mod throttle;

pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use frame::{FrameCoalescer, Wake, FRAME_INTERVAL};
pub use retry::{RetryPolicy, RetryState};
pub use throttle::IntervalThrottle;
