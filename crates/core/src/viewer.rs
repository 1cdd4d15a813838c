//! Viewer session
//!
//! [`Viewer`] ties the window cache, the load scheduler, the viewport
//! tracker and the jump coordinator to one item list and one surface.
//! It is the entry point a host talks to.

use crate::config::{ConfigError, ViewerConfig};
use crate::error::JumpResult;
use crate::host::Host;
use crate::jump::{JumpContext, JumpCoordinator, JumpKind, JumpOutcome, JumpStart, JumpStep, JumpTiming};
use crate::surface::{DisplayStyle, Surface};
use crate::tracker::ViewportTracker;
use std::sync::Arc;
use std::time::Instant;
use strip_viewer_cache::{LoadScheduler, LoadStats, Materializer, PumpReport, SourceList, WindowCache};
use strip_viewer_scheduler::Clock;
use tracing::{debug, info};

/// Everything but the jump coordinator, so a jump can borrow it as its
/// context.
struct ViewerState<M: Materializer, S: Surface> {
    config: ViewerConfig,
    clock: Arc<dyn Clock>,
    sources: SourceList,
    cache: WindowCache<M::Resource>,
    loader: LoadScheduler<M>,
    tracker: ViewportTracker,
    surface: S,
    style: DisplayStyle,
}

impl<M: Materializer, S: Surface> ViewerState<M, S> {
    fn position(&mut self, jump_active: bool) -> usize {
        let now = self.clock.now();
        self.tracker
            .current_index(&self.cache, &self.surface, now, jump_active)
    }

    fn pump(&mut self) -> PumpReport {
        let report = self.loader.pump(&mut self.cache);
        self.sync_surface();
        if report.changed_layout() {
            self.tracker.invalidate();
        }
        report
    }

    fn sync_surface(&mut self) {
        for event in self.cache.drain_events() {
            self.surface.apply(event);
        }
    }

    fn load_batch(&mut self, start: usize) -> usize {
        let requested = self.loader.load_batch(start, &self.sources, &self.cache);
        self.pump();
        requested
    }

    fn load_neighborhood(&mut self, index: usize, jump_active: bool) -> usize {
        let requested = self.loader.load_around(index, &self.sources, &self.cache);
        self.pump();
        self.enforce_capacity(jump_active);
        requested
    }

    fn load_next_batch(&mut self, jump_active: bool) -> usize {
        let requested = self.loader.load_next(&self.sources, &self.cache);
        self.pump();
        self.enforce_capacity(jump_active);
        requested
    }

    fn enforce_capacity(&mut self, jump_active: bool) {
        if !self.cache.over_capacity() || self.cache.is_eviction_suspended() {
            return;
        }
        let current = self.position(jump_active);
        self.evict_distant(current);
    }

    fn evict_distant(&mut self, current_index: usize) -> Vec<usize> {
        let evicted = self.cache.evict_distant(current_index);
        if !evicted.is_empty() {
            self.tracker.forget(&evicted);
            self.sync_surface();
            self.tracker.invalidate();
        }
        evicted
    }
}

impl<M: Materializer, S: Surface> JumpContext for ViewerState<M, S> {
    fn total_count(&self) -> usize {
        self.sources.len()
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn fresh_index(&mut self) -> usize {
        self.position(true)
    }

    fn load_around_page(&mut self, index: usize) {
        self.load_neighborhood(index, true);
    }

    fn is_loaded(&self, index: usize) -> bool {
        self.cache.is_loaded(index)
    }

    fn is_ready(&self, index: usize) -> bool {
        self.cache.is_ready(index)
    }

    fn align_top(&mut self, index: usize) -> bool {
        self.surface.align_top(index)
    }

    fn invalidate_position(&mut self) {
        self.tracker.invalidate();
    }

    fn suspend_eviction(&mut self, target: usize) {
        self.cache.suspend_eviction(target);
    }

    fn resume_eviction(&mut self) {
        self.cache.resume_eviction();
    }
}

/// One viewing session over an ordered item list.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strip_viewer_cache::{FileMaterializer, FileMaterializerConfig, SourceHandle, SourceList};
/// use strip_viewer_core::{ClockHost, StackSurface, Viewer, ViewerConfig};
/// use strip_viewer_scheduler::ManualClock;
///
/// let clock = ManualClock::new();
/// let materializer = FileMaterializer::new(FileMaterializerConfig::new(1)).unwrap();
/// let surface = StackSurface::uniform(800.0, 1200.0);
/// let mut viewer =
///     Viewer::new(ViewerConfig::default(), materializer, surface, Arc::new(clock.clone())).unwrap();
///
/// viewer.set_items(SourceList::new(
///     (0..3).map(|i| (format!("{i}.png"), SourceHandle::Blob(vec![i as u8].into()))),
/// ));
/// assert_eq!(viewer.total_count(), 3);
///
/// // Nothing is resident yet, so a jump gives up after its retry budget
/// // unless the worker delivers in time.
/// let mut host = ClockHost::new(clock);
/// let _ = viewer.scroll_to_page(&mut host, 2);
/// assert!(!viewer.is_jumping());
/// ```
pub struct Viewer<M: Materializer, S: Surface> {
    state: ViewerState<M, S>,
    jump: JumpCoordinator,
}

impl<M: Materializer, S: Surface> Viewer<M, S> {
    /// Create a session with no items.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation.
    pub fn new(
        config: ViewerConfig,
        materializer: M,
        surface: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = ViewerState {
            cache: WindowCache::new(config.cache_limits()),
            loader: LoadScheduler::new(materializer, config.batch_size),
            tracker: ViewportTracker::new(config.position_cache_ttl),
            sources: SourceList::empty(),
            style: DisplayStyle::default(),
            surface,
            clock,
            config,
        };
        let jump = JumpCoordinator::new(JumpTiming::from_config(&state.config));

        Ok(Self { state, jump })
    }

    /// Replace the item list. Everything resident is released and loads
    /// still in flight are ignored when they complete.
    pub fn set_items(&mut self, sources: SourceList) {
        self.clear();
        self.state.sources = sources;
        info!(total = self.state.sources.len(), "items set");
    }

    /// Whether the list has any items.
    pub fn has_items(&self) -> bool {
        !self.state.sources.is_empty()
    }

    /// Number of items in the list.
    pub fn total_count(&self) -> usize {
        self.state.sources.len()
    }

    /// The item list.
    pub fn sources(&self) -> &SourceList {
        &self.state.sources
    }

    /// Request the batch starting at `start` and apply whatever has
    /// already completed. Returns the number of new requests.
    pub fn load_batch(&mut self, start: usize) -> usize {
        self.state.load_batch(start)
    }

    /// Request the batch holding `index` and both neighbors, then evict if
    /// the cache is over capacity.
    pub fn load_around_page(&mut self, index: usize) -> usize {
        let jumping = self.jump.is_active();
        self.state.load_neighborhood(index, jumping)
    }

    /// Request the batch after the loaded frontier.
    pub fn load_next_batch(&mut self) -> usize {
        let jumping = self.jump.is_active();
        self.state.load_next_batch(jumping)
    }

    /// Evict batches far from `current_index`. Returns the evicted indices.
    pub fn evict_distant(&mut self, current_index: usize) -> Vec<usize> {
        self.state.evict_distant(current_index)
    }

    /// Evict batches far from the current position.
    pub fn evict_around_current(&mut self) -> Vec<usize> {
        let current = self.current_index();
        self.state.evict_distant(current)
    }

    /// Index of the item at the viewport midpoint.
    pub fn current_index(&mut self) -> usize {
        let jumping = self.jump.is_active();
        self.state.position(jumping)
    }

    /// Apply completed loads.
    pub fn pump(&mut self) -> PumpReport {
        self.state.pump()
    }

    /// Forget cached positions after the host scrolled or changed layout.
    pub fn invalidate_layout(&mut self) {
        self.state.tracker.invalidate();
    }

    /// Start a jump without driving it. Use [`poll_jump`](Self::poll_jump)
    /// to advance it.
    pub fn begin_jump(&mut self, target: usize, kind: JumpKind) -> JumpStart {
        let now = self.state.clock.now();
        self.jump.begin(&mut self.state, target, kind, now)
    }

    /// Apply completed loads and advance the running jump.
    pub fn poll_jump(&mut self) -> JumpStep {
        self.state.pump();
        let now = self.state.clock.now();
        self.jump.step(&mut self.state, now)
    }

    /// Abandon the running jump. Returns its target.
    pub fn cancel_jump(&mut self) -> Option<usize> {
        self.jump.cancel(&mut self.state)
    }

    /// Jump to `target`, waiting on `host` until the jump completes.
    ///
    /// Returns `Ok(None)` when the list is empty.
    ///
    /// # Errors
    /// Returns [`JumpError::NotFound`](crate::JumpError::NotFound) if the
    /// target never became resident. The viewport is left where it was.
    pub fn scroll_to_page<H>(&mut self, host: &mut H, target: usize) -> JumpResult<Option<JumpOutcome>>
    where
        H: Host + ?Sized,
    {
        self.drive(host, target, JumpKind::Full)
    }

    /// Lightweight jump for adjacent navigation: one neighborhood, one
    /// residency check.
    pub fn navigate_to<H>(&mut self, host: &mut H, target: usize) -> JumpResult<Option<JumpOutcome>>
    where
        H: Host + ?Sized,
    {
        self.drive(host, target, JumpKind::Short)
    }

    fn drive<H>(&mut self, host: &mut H, target: usize, kind: JumpKind) -> JumpResult<Option<JumpOutcome>>
    where
        H: Host + ?Sized,
    {
        match self.begin_jump(target, kind) {
            JumpStart::Empty => return Ok(None),
            JumpStart::Started {
                superseded: Some(previous),
                ..
            } => debug!(%previous, "replaced running jump"),
            JumpStart::Started { .. } => {}
        }

        loop {
            match self.poll_jump() {
                JumpStep::Yield(wake) => host.wait(wake),
                JumpStep::Done(result) => return result.map(Some),
                JumpStep::Idle => return Ok(None),
            }
        }
    }

    /// Change the viewport height.
    pub fn resize(&mut self, viewport_height: f32) {
        self.state.surface.resize(viewport_height);
        self.state.tracker.invalidate();
    }

    /// Change display options and return to the item that was current.
    ///
    /// Uses the full jump so the reflow and settle delays give the restyled
    /// layout time to stabilize before the target is realigned.
    pub fn set_style<H>(&mut self, host: &mut H, style: DisplayStyle) -> JumpResult<Option<JumpOutcome>>
    where
        H: Host + ?Sized,
    {
        if style == self.state.style {
            return Ok(None);
        }
        let current = self.current_index();
        self.state.style = style;
        self.state.surface.apply_style(style);
        self.state.tracker.invalidate();

        if !self.has_items() {
            return Ok(None);
        }
        self.scroll_to_page(host, current)
    }

    /// Current display options.
    pub fn style(&self) -> DisplayStyle {
        self.state.style
    }

    /// Release everything resident and abandon loads in flight.
    pub fn clear(&mut self) {
        self.jump.cancel(&mut self.state);
        let generation = self.state.loader.reset();
        let released = self.state.cache.clear();
        self.state.sync_surface();
        self.state.tracker.invalidate();
        info!(released, generation, "viewer cleared");
    }

    /// Whether a jump is running.
    pub fn is_jumping(&self) -> bool {
        self.jump.is_active()
    }

    /// Clamped target of the running jump.
    pub fn jump_target(&self) -> Option<usize> {
        self.jump.target()
    }

    /// The window cache.
    pub fn cache(&self) -> &WindowCache<M::Resource> {
        &self.state.cache
    }

    /// The layout surface.
    pub fn surface(&self) -> &S {
        &self.state.surface
    }

    /// Mutable access to the surface. Call
    /// [`invalidate_layout`](Self::invalidate_layout) after scrolling it.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.state.surface
    }

    /// The load scheduler.
    pub fn loader(&self) -> &LoadScheduler<M> {
        &self.state.loader
    }

    /// Load counters.
    pub fn load_stats(&self) -> LoadStats {
        self.state.loader.stats()
    }

    /// Session configuration.
    pub fn config(&self) -> &ViewerConfig {
        &self.state.config
    }

    /// Current time on the session clock.
    pub fn now(&self) -> Instant {
        self.state.clock.now()
    }
}
