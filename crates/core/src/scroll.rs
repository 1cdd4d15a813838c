//! Scroll-driven prefetch and eviction
//!
//! Scroll events are coalesced into at most one pending frame. When the
//! frame runs, the batch beyond either edge of the resident range is
//! requested if that edge is close to the viewport, and every
//! `unload_check_interval` distant batches are evicted.

use crate::config::ViewerConfig;
use crate::surface::Surface;
use crate::viewer::Viewer;
use std::time::Instant;
use strip_viewer_cache::Materializer;
use strip_viewer_scheduler::{FrameCoalescer, IntervalThrottle, Wake};
use tracing::debug;

/// What one frame did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollReport {
    /// A pending frame ran.
    pub ran: bool,

    /// Start of the batch requested below the resident range.
    pub loaded_after: Option<usize>,

    /// Start of the batch requested above the resident range.
    pub loaded_before: Option<usize>,

    /// Indices evicted this frame.
    pub evicted: Vec<usize>,
}

/// Turns scroll events into prefetch and eviction work.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    frames: FrameCoalescer,
    unload: IntervalThrottle,
    load_threshold_px: f32,
}

impl ScrollTrigger {
    /// Create a trigger using the configured thresholds.
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            frames: FrameCoalescer::new(),
            unload: IntervalThrottle::new(config.unload_check_interval),
            load_threshold_px: config.load_threshold_px,
        }
    }

    /// Record a scroll event. Returns the wake to schedule, or `None` if a
    /// frame is already pending.
    pub fn on_scroll(&mut self) -> Option<Wake> {
        self.frames.request().then_some(Wake::NextFrame)
    }

    /// Whether a frame is pending.
    pub fn is_pending(&self) -> bool {
        self.frames.is_pending()
    }

    /// Drop a pending frame.
    pub fn cancel(&mut self) {
        self.frames.cancel();
    }

    /// Number of scroll events seen.
    pub fn events(&self) -> u64 {
        self.frames.requests()
    }

    /// Number of frames that ran.
    pub fn frames(&self) -> u64 {
        self.frames.frames()
    }

    /// Run the pending frame, if any.
    pub fn on_frame<M, S>(&mut self, viewer: &mut Viewer<M, S>, now: Instant) -> ScrollReport
    where
        M: Materializer,
        S: Surface,
    {
        let mut report = ScrollReport::default();
        if !self.frames.take() {
            return report;
        }
        report.ran = true;

        viewer.invalidate_layout();
        if !viewer.has_items() {
            return report;
        }

        let total = viewer.total_count();
        let batch_size = viewer.config().batch_size;
        let viewport_height = viewer.surface().viewport_height();

        if let Some(last) = viewer.cache().last_index() {
            let near_bottom = viewer
                .surface()
                .bounds(last)
                .is_some_and(|bounds| bounds.bottom <= viewport_height + self.load_threshold_px);
            if near_bottom && last + 1 < total {
                viewer.load_batch(last + 1);
                report.loaded_after = Some(last + 1);
            }
        }

        if let Some(first) = viewer.cache().first_index() {
            let near_top = viewer
                .surface()
                .bounds(first)
                .is_some_and(|bounds| bounds.top >= -self.load_threshold_px);
            if near_top && first > 0 {
                let start = first.saturating_sub(batch_size);
                viewer.load_batch(start);
                report.loaded_before = Some(start);
            }
        }

        if self.unload.ready(now) {
            report.evicted = viewer.evict_around_current();
        }

        if report.loaded_after.is_some() || report.loaded_before.is_some() || !report.evicted.is_empty() {
            debug!(
                after = ?report.loaded_after,
                before = ?report.loaded_before,
                evicted = report.evicted.len(),
                "scroll frame"
            );
        }
        report
    }
}
