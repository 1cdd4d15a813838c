//! Strip Viewer Core Library
//!
//! Session state for viewing a long ordered sequence of images as one
//! continuous vertical strip.
//!
//! Only a window of items around the current position is kept resident.
//! Scrolling near either edge of that window prefetches the next batch, and
//! distant batches are evicted periodically. Jumping to an arbitrary item
//! loads its neighborhood first, waits for it to arrive, then aligns it
//! with the top of the viewport.
//!
//! The core is single-threaded and never blocks: waits are expressed as
//! [`Wake`](strip_viewer_scheduler::Wake) values serviced by a [`Host`].

pub mod config;
pub mod error;
pub mod host;
pub mod jump;
pub mod scroll;
pub mod surface;
pub mod tracker;
pub mod viewer;

pub use config::{ConfigError, ViewerConfig};
pub use error::{JumpError, JumpResult};
pub use host::{ClockHost, Host, SleepHost};
pub use jump::{
    JumpContext, JumpCoordinator, JumpKind, JumpOutcome, JumpPhase, JumpStart, JumpStep,
    JumpTiming, SHORT_READY_TIMEOUT,
};
pub use scroll::{ScrollReport, ScrollTrigger};
pub use surface::{Bounds, DisplayStyle, StackSurface, Surface};
pub use tracker::ViewportTracker;
pub use viewer::Viewer;
