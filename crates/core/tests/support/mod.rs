//! Shared fixtures for viewer integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strip_viewer_cache::{
    Completion, DisplayResource, LoadError, LoadTicket, Materializer, SourceHandle, SourceList,
};
use strip_viewer_core::{StackSurface, Viewer, ViewerConfig};
use strip_viewer_scheduler::{Clock, ManualClock};

pub const VIEWPORT: f32 = 800.0;
pub const ITEM_HEIGHT: f32 = 1200.0;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("strip_viewer=debug")
        .try_init();
}

/// A resident page that records its own release.
#[derive(Debug)]
pub struct Page {
    pub index: usize,
    released: Rc<RefCell<Vec<usize>>>,
}

impl DisplayResource for Page {
    fn release(&mut self) {
        self.released.borrow_mut().push(self.index);
    }
}

/// Materializer whose completions arrive on a simulated clock.
pub struct FakeMaterializer {
    clock: ManualClock,
    latency: Duration,
    decode_delay: Duration,
    failing: BTreeSet<usize>,
    never_ready: BTreeSet<usize>,
    rng: Option<StdRng>,
    queued: Vec<(Instant, LoadTicket)>,
    decoding: Vec<(Instant, LoadTicket)>,
    requests: Rc<RefCell<Vec<usize>>>,
    released: Rc<RefCell<Vec<usize>>>,
}

impl FakeMaterializer {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            latency: Duration::ZERO,
            decode_delay: Duration::ZERO,
            failing: BTreeSet::new(),
            never_ready: BTreeSet::new(),
            rng: None,
            queued: Vec::new(),
            decoding: Vec::new(),
            requests: Rc::default(),
            released: Rc::default(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    pub fn failing(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(indices);
        self
    }

    pub fn never_ready(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.never_ready.extend(indices);
        self
    }

    /// Deliver simultaneous completions in a seeded random order.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn requests(&self) -> Rc<RefCell<Vec<usize>>> {
        Rc::clone(&self.requests)
    }

    pub fn released(&self) -> Rc<RefCell<Vec<usize>>> {
        Rc::clone(&self.released)
    }

    pub fn outstanding(&self) -> usize {
        self.queued.len()
    }
}

impl Materializer for FakeMaterializer {
    type Resource = Page;

    fn request(&mut self, ticket: LoadTicket, _source: &SourceHandle) {
        self.requests.borrow_mut().push(ticket.index);
        self.queued.push((self.clock.now() + self.latency, ticket));
    }

    fn poll_completions(&mut self) -> Vec<Completion<Page>> {
        let now = self.clock.now();
        let mut completions = Vec::new();

        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.queued.drain(..).partition(|(at, _)| *at <= now);
        self.queued = waiting;
        if let Some(rng) = self.rng.as_mut() {
            due.shuffle(rng);
        }

        for (_, ticket) in due {
            if self.failing.contains(&ticket.index) {
                completions.push(Completion::Failed {
                    ticket,
                    error: LoadError::Other(format!("cannot decode item {}", ticket.index)),
                });
                continue;
            }

            let page = Page {
                index: ticket.index,
                released: Rc::clone(&self.released),
            };
            let ready = if self.never_ready.contains(&ticket.index) {
                false
            } else if self.decode_delay.is_zero() {
                true
            } else {
                self.decoding.push((now + self.decode_delay, ticket));
                false
            };
            completions.push(Completion::Materialized {
                ticket,
                resource: page,
                ready,
            });
        }

        let (decoded, decoding): (Vec<_>, Vec<_>) =
            self.decoding.drain(..).partition(|(at, _)| *at <= now);
        self.decoding = decoding;
        completions.extend(
            decoded
                .into_iter()
                .map(|(_, ticket)| Completion::Ready { ticket, ok: true }),
        );

        completions
    }
}

pub type TestViewer = Viewer<FakeMaterializer, StackSurface>;

pub fn items(total: usize) -> SourceList {
    SourceList::from_paths((0..total).map(|i| format!("page-{i:05}.webp")))
}

pub fn viewer_with(config: ViewerConfig, materializer: FakeMaterializer, clock: &ManualClock, total: usize) -> TestViewer {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let surface = StackSurface::uniform(VIEWPORT, ITEM_HEIGHT);
    let mut viewer = Viewer::new(config, materializer, surface, clock).unwrap();
    viewer.set_items(items(total));
    viewer
}

pub fn viewer(clock: &ManualClock, total: usize) -> TestViewer {
    viewer_with(
        ViewerConfig::default(),
        FakeMaterializer::new(clock.clone()),
        clock,
        total,
    )
}

/// Scroll so `index` sits at the viewport top.
pub fn show(viewer: &mut TestViewer, index: usize) {
    use strip_viewer_core::Surface;
    assert!(viewer.surface_mut().align_top(index), "item {index} not laid out");
    viewer.invalidate_layout();
}
