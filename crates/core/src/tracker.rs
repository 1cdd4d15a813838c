//! Current-position tracking
//!
//! The current item is the first resident entry whose bounds straddle the
//! viewport midpoint. Scanning every entry on each scroll event is
//! wasteful, so the result is memoized for a short time and entry bounds
//! are cached until the layout changes.

use crate::surface::{Bounds, Surface};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use strip_viewer_cache::{DisplayResource, WindowCache};

/// Memoized viewport position.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    ttl: Duration,
    memo: Option<(usize, Instant)>,
    rects: HashMap<usize, Bounds>,
    rects_stale: bool,
    recomputations: u64,
}

impl ViewportTracker {
    /// Create a tracker that trusts a computed position for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            memo: None,
            rects: HashMap::new(),
            rects_stale: false,
            recomputations: 0,
        }
    }

    /// Index of the item at the viewport midpoint.
    ///
    /// Falls back to the first resident index, or 0 when nothing is
    /// resident. The memo is bypassed while `jump_active` is set.
    pub fn current_index<R, S>(
        &mut self,
        cache: &WindowCache<R>,
        surface: &S,
        now: Instant,
        jump_active: bool,
    ) -> usize
    where
        R: DisplayResource,
        S: Surface + ?Sized,
    {
        if !jump_active {
            if let Some((index, at)) = self.memo {
                if now.saturating_duration_since(at) < self.ttl {
                    return index;
                }
            }
        }

        if self.rects_stale {
            self.rects.clear();
            self.rects_stale = false;
        }

        let midpoint = surface.viewport_height() / 2.0;
        let mut found = None;
        for index in cache.indices() {
            let bounds = match self.rects.get(&index) {
                Some(bounds) => *bounds,
                None => {
                    let Some(bounds) = surface.bounds(index) else {
                        continue;
                    };
                    self.rects.insert(index, bounds);
                    bounds
                }
            };

            if bounds.contains_y(midpoint) {
                found = Some(index);
                break;
            }
            // Entries are stacked in index order
            if bounds.top > midpoint {
                break;
            }
        }

        let index = found.or_else(|| cache.first_index()).unwrap_or(0);
        self.memo = Some((index, now));
        self.recomputations += 1;
        index
    }

    /// Drop the memo and mark every cached rect stale.
    pub fn invalidate(&mut self) {
        self.memo = None;
        self.rects_stale = true;
    }

    /// Drop cached rects for entries that left the cache.
    pub fn forget(&mut self, indices: &[usize]) {
        for index in indices {
            self.rects.remove(index);
        }
        if self
            .memo
            .is_some_and(|(current, _)| indices.contains(&current))
        {
            self.memo = None;
        }
    }

    /// Number of cached rects.
    pub fn cached_rects(&self) -> usize {
        if self.rects_stale {
            0
        } else {
            self.rects.len()
        }
    }

    /// Number of full scans performed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
