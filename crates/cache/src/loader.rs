//! Load scheduler: batch-aligned, idempotent materialization
//!
//! Requests are issued one batch at a time. Completions may arrive in any
//! order; each batch buffers them and inserts into the window cache in
//! ascending index order, so display order always matches sequence order.
//! A failed slot is dropped and never holds back the slots after it.
//!
//! There is no cancellation of an individual load. [`LoadScheduler::reset`]
//! starts a new generation instead, and completions stamped with an older
//! generation are released as soon as they arrive.

use crate::batch::{batch_range, batch_start};
use crate::entry::{DisplayResource, MaterializedEntry};
use crate::source::{SourceHandle, SourceList};
use crate::window::WindowCache;
use std::collections::{BTreeMap, BTreeSet};

/// Identifies one materialization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    /// Sequence index being materialized.
    pub index: usize,

    /// Session generation the request belongs to.
    pub generation: u64,
}

/// Errors reported by a materializer.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported source: {0}")]
    Unsupported(String),

    #[error("materializer is shut down")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

/// Outcome of a materialization request, reported asynchronously.
#[derive(Debug)]
pub enum Completion<R> {
    /// The resource exists and can be placed on the surface. `ready` says
    /// whether it has also finished decoding.
    Materialized {
        ticket: LoadTicket,
        resource: R,
        ready: bool,
    },

    /// A previously materialized resource finished decoding. `ok` is false
    /// when decoding failed; the entry still counts as settled.
    Ready { ticket: LoadTicket, ok: bool },

    /// No resource could be produced.
    Failed { ticket: LoadTicket, error: LoadError },
}

impl<R> Completion<R> {
    /// The ticket this completion answers.
    pub fn ticket(&self) -> LoadTicket {
        match self {
            Self::Materialized { ticket, .. }
            | Self::Ready { ticket, .. }
            | Self::Failed { ticket, .. } => *ticket,
        }
    }
}

/// Turns sources into display resources.
///
/// Every request must eventually be answered with exactly one
/// `Materialized` or `Failed` completion.
pub trait Materializer {
    /// The resource type placed in the cache.
    type Resource: DisplayResource;

    /// Begin materializing `source`.
    fn request(&mut self, ticket: LoadTicket, source: &SourceHandle);

    /// Completions that arrived since the last poll, in arrival order.
    fn poll_completions(&mut self) -> Vec<Completion<Self::Resource>>;
}

/// Counters for the load pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Requests handed to the materializer.
    pub requested: u64,

    /// Indices skipped because they were resident or already in flight.
    pub skipped: u64,

    /// Entries inserted into the cache.
    pub inserted: u64,

    /// Requests that failed.
    pub failed: u64,

    /// Completions discarded because their generation was stale.
    pub discarded: u64,
}

/// What a [`LoadScheduler::pump`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Indices inserted into the cache, in insertion order.
    pub inserted: Vec<usize>,

    /// Indices whose request failed.
    pub failed: Vec<usize>,

    /// Resident indices that became ready.
    pub became_ready: Vec<usize>,

    /// Stale completions released.
    pub discarded: usize,
}

impl PumpReport {
    /// Whether the pump changed anything the layout depends on.
    pub fn changed_layout(&self) -> bool {
        !self.inserted.is_empty() || !self.became_ready.is_empty()
    }
}

enum Slot<R> {
    Waiting,
    Arrived { resource: R, ready: bool },
    Failed,
}

struct PendingBatch<R> {
    start: usize,
    slots: BTreeMap<usize, Slot<R>>,
}

/// Issues batch requests and inserts their results in order.
///
/// # Example
///
/// ```ignore
/// let mut loader = LoadScheduler::new(materializer, 10);
/// loader.load_batch(0, &sources, &mut cache);
/// let report = loader.pump(&mut cache);
/// ```
pub struct LoadScheduler<M: Materializer> {
    materializer: M,
    batch_size: usize,
    generation: u64,
    in_flight: BTreeSet<usize>,
    pending: Vec<PendingBatch<M::Resource>>,
    stats: LoadStats,
}

impl<M: Materializer> LoadScheduler<M> {
    /// Create a scheduler around `materializer`.
    pub fn new(materializer: M, batch_size: usize) -> Self {
        Self {
            materializer,
            batch_size: batch_size.max(1),
            generation: 0,
            in_flight: BTreeSet::new(),
            pending: Vec::new(),
            stats: LoadStats::default(),
        }
    }

    /// Materialization unit.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Current session generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `index` has been requested and not yet answered.
    pub fn is_in_flight(&self, index: usize) -> bool {
        self.in_flight.contains(&index)
    }

    /// Number of outstanding requests.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Highest index currently requested.
    pub fn last_in_flight(&self) -> Option<usize> {
        self.in_flight.iter().next_back().copied()
    }

    /// The wrapped materializer.
    pub fn materializer(&self) -> &M {
        &self.materializer
    }

    /// The wrapped materializer, mutably.
    pub fn materializer_mut(&mut self) -> &mut M {
        &mut self.materializer
    }

    /// Counters.
    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Request `[start, start + batch_size)`, clipped to the list.
    ///
    /// Every batch-aligned range touching the requested span is loaded, so
    /// an unaligned `start` never leaves a partial batch resident. Indices
    /// that are resident or in flight are skipped. Returns the number of
    /// new requests.
    pub fn load_batch(
        &mut self,
        start: usize,
        sources: &SourceList,
        cache: &WindowCache<M::Resource>,
    ) -> usize {
        let total = sources.len();
        if start >= total {
            return 0;
        }

        let end = (start + self.batch_size).min(total);
        let mut batch = batch_start(start, self.batch_size);
        let mut requested = 0;
        while batch < end {
            requested += self.request_batch(batch, sources, cache);
            batch += self.batch_size;
        }
        requested
    }

    /// Request the batch containing `index` and its two neighbors.
    ///
    /// `index` is clamped into the list. Returns the number of new requests.
    pub fn load_around(
        &mut self,
        index: usize,
        sources: &SourceList,
        cache: &WindowCache<M::Resource>,
    ) -> usize {
        let Some(index) = sources.clamp(index) else {
            return 0;
        };

        let start = batch_start(index, self.batch_size);
        let mut requested = self.request_batch(start, sources, cache);
        if let Some(previous) = start.checked_sub(self.batch_size) {
            requested += self.request_batch(previous, sources, cache);
        }
        let next = start + self.batch_size;
        if next < sources.len() {
            requested += self.request_batch(next, sources, cache);
        }
        requested
    }

    /// Request the batch after everything resident or in flight, or the
    /// first batch when nothing is.
    pub fn load_next(&mut self, sources: &SourceList, cache: &WindowCache<M::Resource>) -> usize {
        let frontier = cache.last_index().max(self.last_in_flight());
        let start = frontier.map_or(0, |last| last + 1);
        self.load_batch(start, sources, cache)
    }

    fn request_batch(
        &mut self,
        start: usize,
        sources: &SourceList,
        cache: &WindowCache<M::Resource>,
    ) -> usize {
        let mut slots = BTreeMap::new();
        for index in batch_range(start, self.batch_size, sources.len()) {
            if cache.is_loaded(index) || self.in_flight.contains(&index) {
                self.stats.skipped += 1;
                continue;
            }
            slots.insert(index, Slot::Waiting);
        }

        if slots.is_empty() {
            return 0;
        }

        let requested = slots.len();
        tracing::debug!(start, requested, "requesting batch");

        for &index in slots.keys() {
            let Some(item) = sources.get(index) else {
                continue;
            };
            self.in_flight.insert(index);
            self.materializer.request(
                LoadTicket {
                    index,
                    generation: self.generation,
                },
                &item.source,
            );
        }

        self.stats.requested += requested as u64;
        self.pending.push(PendingBatch { start, slots });
        requested
    }

    /// Drain materializer completions into the cache.
    pub fn pump(&mut self, cache: &mut WindowCache<M::Resource>) -> PumpReport {
        let mut report = PumpReport::default();

        for completion in self.materializer.poll_completions() {
            let ticket = completion.ticket();
            if ticket.generation != self.generation {
                if let Completion::Materialized { mut resource, .. } = completion {
                    resource.release();
                }
                self.stats.discarded += 1;
                report.discarded += 1;
                continue;
            }

            match completion {
                Completion::Materialized {
                    resource, ready, ..
                } => match self.slot_mut(ticket.index) {
                    Some(slot) if matches!(slot, Slot::Waiting) => {
                        *slot = Slot::Arrived { resource, ready };
                    }
                    _ => {
                        tracing::trace!(index = ticket.index, "unexpected materialization released");
                        let mut resource = resource;
                        resource.release();
                    }
                },
                Completion::Ready { ok, .. } => {
                    if !ok {
                        tracing::warn!(index = ticket.index, "resource failed to decode");
                    }
                    if cache.mark_ready(ticket.index) {
                        report.became_ready.push(ticket.index);
                    } else if let Some(Slot::Arrived { ready, .. }) = self.slot_mut(ticket.index) {
                        *ready = true;
                    }
                }
                Completion::Failed { error, .. } => {
                    tracing::warn!(index = ticket.index, %error, "materialization failed");
                    if let Some(slot) = self.slot_mut(ticket.index) {
                        *slot = Slot::Failed;
                    }
                }
            }
        }

        self.flush(cache, &mut report);
        report
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut Slot<M::Resource>> {
        self.pending
            .iter_mut()
            .find_map(|batch| batch.slots.get_mut(&index))
    }

    fn flush(&mut self, cache: &mut WindowCache<M::Resource>, report: &mut PumpReport) {
        for batch in &mut self.pending {
            while let Some(entry) = batch.slots.first_entry() {
                if matches!(entry.get(), Slot::Waiting) {
                    break;
                }
                let (index, slot) = entry.remove_entry();
                self.in_flight.remove(&index);
                match slot {
                    Slot::Arrived { resource, ready } => {
                        if cache.insert(MaterializedEntry::new(index, resource, ready)) {
                            self.stats.inserted += 1;
                            report.inserted.push(index);
                        }
                    }
                    Slot::Failed => {
                        self.stats.failed += 1;
                        report.failed.push(index);
                    }
                    Slot::Waiting => {}
                }
            }
            if batch.slots.is_empty() {
                tracing::trace!(start = batch.start, "batch settled");
            }
        }
        self.pending.retain(|batch| !batch.slots.is_empty());
    }

    /// Abandon every outstanding request and start a new generation.
    ///
    /// Resources that arrived but were not yet inserted are released now;
    /// answers to the abandoned requests are released when they arrive.
    pub fn reset(&mut self) -> u64 {
        for batch in self.pending.drain(..) {
            for (_, slot) in batch.slots {
                if let Slot::Arrived { mut resource, .. } = slot {
                    resource.release();
                }
            }
        }
        self.in_flight.clear();
        self.generation += 1;
        self.generation
    }
}
