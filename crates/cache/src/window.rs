//! Window cache: the resident entries around the viewer's position
//!
//! Entries are kept in an ordered map keyed by sequence index. That map is
//! the source of truth for what is on screen: the renderer consumes the
//! [`CacheEvent`]s it emits and never the reverse.
//!
//! Eviction is distance based and batch granular. A pass only runs once the
//! resident count exceeds `max_resident`, and it only removes batches whose
//! nearest member is farther than `unload_threshold` from the current
//! position, so resident indices stay a union of whole batches.

use crate::batch::{batch_start, distance_to_batch};
use crate::entry::{DisplayResource, MaterializedEntry};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Size limits for the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Materialization unit.
    pub batch_size: usize,

    /// Resident count above which an eviction pass may run.
    pub max_resident: usize,

    /// Entries within this distance of the current position are never
    /// evicted.
    pub unload_threshold: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_resident: 100,
            unload_threshold: 45,
        }
    }
}

impl CacheLimits {
    /// Largest number of entries an eviction pass can leave behind: every
    /// batch that touches `[current - threshold, current + threshold]`.
    pub fn retained_window(&self) -> usize {
        let size = self.batch_size.max(1);
        let span = self.unload_threshold * 2;
        (span.div_ceil(size) + 1) * size
    }
}

/// Change notifications for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// An entry became resident.
    Inserted(usize),

    /// An entry was evicted and its resource released.
    Evicted(usize),

    /// Every entry was released.
    Cleared,
}

/// Statistics about the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently resident.
    pub resident: usize,

    /// Configured eviction trigger.
    pub max_resident: usize,

    /// Entries inserted since creation.
    pub inserted: u64,

    /// Entries evicted by distance since creation.
    pub evicted: u64,

    /// Eviction passes that removed at least one entry.
    pub eviction_passes: u64,

    /// Eviction calls skipped because a jump held eviction suspended.
    pub suspended_skips: u64,
}

/// Ordered, bounded map from index to materialized entry.
///
/// # Example
///
/// ```
/// use strip_viewer_cache::{CacheLimits, WindowCache, Blob};
///
/// let cache: WindowCache<Blob> = WindowCache::new(CacheLimits::default());
/// assert!(cache.resident_range().is_none());
/// assert!(!cache.is_loaded(0));
/// ```
#[derive(Debug)]
pub struct WindowCache<R> {
    limits: CacheLimits,
    entries: BTreeMap<usize, MaterializedEntry<R>>,
    suspended: bool,
    pinned: Option<usize>,
    events: Vec<CacheEvent>,
    stats: CacheStats,
}

impl<R: DisplayResource> WindowCache<R> {
    /// Create an empty cache.
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            limits,
            entries: BTreeMap::new(),
            suspended: false,
            pinned: None,
            events: Vec::new(),
            stats: CacheStats {
                max_resident: limits.max_resident,
                ..Default::default()
            },
        }
    }

    /// The configured limits.
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// Whether `index` has a resident entry.
    pub fn is_loaded(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Whether `index` is resident and its resource is ready.
    pub fn is_ready(&self, index: usize) -> bool {
        self.entries.get(&index).is_some_and(|entry| entry.is_ready())
    }

    /// Lowest and highest resident index, or `None` when nothing is resident.
    pub fn resident_range(&self) -> Option<RangeInclusive<usize>> {
        let first = *self.entries.keys().next()?;
        let last = *self.entries.keys().next_back()?;
        Some(first..=last)
    }

    /// Lowest resident index.
    pub fn first_index(&self) -> Option<usize> {
        self.entries.keys().next().copied()
    }

    /// Highest resident index.
    pub fn last_index(&self) -> Option<usize> {
        self.entries.keys().next_back().copied()
    }

    /// Resident entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&MaterializedEntry<R>> {
        self.entries.get(&index)
    }

    /// Resident entries in ascending index order, which is display order.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &MaterializedEntry<R>> {
        self.entries.values()
    }

    /// Resident indices in ascending order.
    pub fn indices(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the resident count exceeds `max_resident`.
    pub fn over_capacity(&self) -> bool {
        self.entries.len() > self.limits.max_resident
    }

    /// Insert a freshly materialized entry. Only the load scheduler inserts.
    ///
    /// Returns `false` and releases the new resource if `index` was already
    /// resident.
    pub(crate) fn insert(&mut self, entry: MaterializedEntry<R>) -> bool {
        let index = entry.index();
        if self.entries.contains_key(&index) {
            tracing::trace!(index, "duplicate materialization released");
            entry.release();
            return false;
        }

        self.entries.insert(index, entry);
        self.events.push(CacheEvent::Inserted(index));
        self.stats.inserted += 1;
        self.stats.resident = self.entries.len();
        true
    }

    /// Record that the resource at `index` finished decoding.
    pub(crate) fn mark_ready(&mut self, index: usize) -> bool {
        match self.entries.get_mut(&index) {
            Some(entry) => {
                entry.mark_ready();
                true
            }
            None => false,
        }
    }

    /// Suspend eviction and pin `target` for the duration of a jump.
    pub fn suspend_eviction(&mut self, target: usize) {
        self.suspended = true;
        self.pinned = Some(target);
    }

    /// Resume normal eviction and drop the pin.
    pub fn resume_eviction(&mut self) {
        self.suspended = false;
        self.pinned = None;
    }

    /// Whether eviction is currently suspended.
    pub fn is_eviction_suspended(&self) -> bool {
        self.suspended
    }

    /// The index protected by an active jump.
    pub fn pinned(&self) -> Option<usize> {
        self.pinned
    }

    /// Evict batches far from `current_index`.
    ///
    /// Does nothing while eviction is suspended. The resident count is not
    /// consulted: load paths check [`over_capacity`](Self::over_capacity)
    /// before calling this, periodic passes do not. Returns the evicted
    /// indices in ascending order so callers can drop any layout
    /// information they hold for them.
    pub fn evict_distant(&mut self, current_index: usize) -> Vec<usize> {
        if self.suspended {
            self.stats.suspended_skips += 1;
            return Vec::new();
        }

        let size = self.limits.batch_size.max(1);
        let threshold = self.limits.unload_threshold;
        let pinned_batch = self.pinned.map(|index| batch_start(index, size));

        let doomed: Vec<usize> = self
            .entries
            .keys()
            .copied()
            .filter(|&index| {
                let start = batch_start(index, size);
                Some(start) != pinned_batch
                    && distance_to_batch(current_index, start, size) > threshold
            })
            .collect();

        for &index in &doomed {
            if let Some(entry) = self.entries.remove(&index) {
                entry.release();
                self.events.push(CacheEvent::Evicted(index));
            }
        }

        if !doomed.is_empty() {
            self.stats.evicted += doomed.len() as u64;
            self.stats.eviction_passes += 1;
            self.stats.resident = self.entries.len();
            tracing::debug!(
                current_index,
                evicted = doomed.len(),
                resident = self.entries.len(),
                "evicted distant entries"
            );
        }

        doomed
    }

    /// Release every entry and reset eviction state. Returns how many
    /// entries were released.
    pub fn clear(&mut self) -> usize {
        let released = self.entries.len();
        for (_, entry) in std::mem::take(&mut self.entries) {
            entry.release();
        }
        self.suspended = false;
        self.pinned = None;
        self.events.push(CacheEvent::Cleared);
        self.stats.resident = 0;
        released
    }

    /// Take the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<CacheEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
