//! Jump-to-item coordination
//!
//! A jump loads the neighborhood around a target, waits for the target to
//! become resident and decoded, aligns it with the viewport top and lets the
//! layout settle. Every wait is a [`Wake`] handed back to the caller, so the
//! coordinator itself never blocks.
//!
//! While a jump runs, eviction is suspended and the target pinned. Starting
//! a new jump cancels the running one and moves the pin.

use crate::config::ViewerConfig;
use crate::error::{JumpError, JumpResult};
use std::time::{Duration, Instant};
use strip_viewer_scheduler::{CancellationToken, RetryPolicy, RetryState, Wake};
use tracing::{debug, info, warn};

/// Ready timeout for [`JumpKind::Short`] navigation.
pub const SHORT_READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Operations a jump needs from the viewer.
pub trait JumpContext {
    /// Number of items in the list.
    fn total_count(&self) -> usize;

    /// Materialization unit.
    fn batch_size(&self) -> usize;

    /// Current position, recomputed rather than memoized.
    fn fresh_index(&mut self) -> usize;

    /// Load the batch holding `index` and its neighbors.
    fn load_around_page(&mut self, index: usize);

    /// Whether `index` is resident.
    fn is_loaded(&self, index: usize) -> bool;

    /// Whether the resident entry at `index` has finished decoding.
    fn is_ready(&self, index: usize) -> bool;

    /// Align the entry's top edge with the viewport top.
    fn align_top(&mut self, index: usize) -> bool;

    /// Drop memoized positions and cached entry bounds.
    fn invalidate_position(&mut self);

    /// Stop eviction and pin `target`.
    fn suspend_eviction(&mut self, target: usize);

    /// Allow eviction again.
    fn resume_eviction(&mut self);
}

/// How thoroughly a jump prepares its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Load three or five neighborhoods and poll with the full retry budget.
    Full,

    /// Load one neighborhood, check once, and skip the reflow wait.
    Short,
}

/// Publicly visible phase of a running jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpPhase {
    Loading,
    AwaitResident,
    AwaitReady,
    Reflow,
    Settling,
}

/// Timing parameters for a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTiming {
    /// Residency polling policy.
    pub retry: RetryPolicy,

    /// Longest wait for the target to decode.
    pub ready_timeout: Duration,

    /// Wait before aligning.
    pub reflow_delay: Duration,

    /// Wait after aligning.
    pub settle_delay: Duration,

    /// Distance beyond which five neighborhoods are loaded.
    pub long_jump_distance: usize,
}

impl JumpTiming {
    /// Timing taken from a viewer configuration.
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            retry: config.jump_retry_policy(),
            ready_timeout: config.ready_timeout,
            reflow_delay: config.jump_reflow_delay,
            settle_delay: config.jump_settle_delay,
            long_jump_distance: config.long_jump_distance,
        }
    }

    fn for_kind(self, kind: JumpKind) -> Self {
        match kind {
            JumpKind::Full => self,
            JumpKind::Short => Self {
                retry: RetryPolicy::new(1, self.retry.delay),
                ready_timeout: SHORT_READY_TIMEOUT,
                reflow_delay: Duration::ZERO,
                settle_delay: Duration::ZERO,
                long_jump_distance: self.long_jump_distance,
            },
        }
    }
}

impl Default for JumpTiming {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// Summary of a completed jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpOutcome {
    /// Index as requested, before clamping.
    pub requested: usize,

    /// Clamped target.
    pub target: usize,

    /// Position reported once the jump settled.
    pub final_index: usize,

    /// Residency checks that waited before the target was found.
    pub attempts: u32,

    /// The target was aligned before it finished decoding.
    pub resource_timed_out: bool,

    /// Time from start to completion.
    pub elapsed: Duration,
}

/// Result of starting a jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpStart {
    /// The list is empty; nothing happened.
    Empty,

    /// The jump is running.
    Started {
        target: usize,
        /// The jump this one replaced, if any.
        superseded: Option<JumpError>,
    },
}

/// Result of advancing a jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpStep {
    /// No jump is running.
    Idle,

    /// Call [`JumpCoordinator::step`] again once the wake is due.
    Yield(Wake),

    /// The jump finished.
    Done(JumpResult<JumpOutcome>),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Loading { step: usize },
    AwaitResident { retry: RetryState },
    AwaitReady { deadline: Instant },
    Reflow { until: Instant },
    Settling { until: Instant },
}

#[derive(Debug)]
struct ActiveJump {
    requested: usize,
    target: usize,
    breadth: usize,
    timing: JumpTiming,
    started_at: Instant,
    phase: Phase,
    token: CancellationToken,
    attempts: u32,
    resource_timed_out: bool,
}

/// Drives at most one jump at a time.
#[derive(Debug)]
pub struct JumpCoordinator {
    timing: JumpTiming,
    active: Option<ActiveJump>,
}

impl JumpCoordinator {
    /// Create an idle coordinator.
    pub fn new(timing: JumpTiming) -> Self {
        Self {
            timing,
            active: None,
        }
    }

    /// Whether a jump is running.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Clamped target of the running jump.
    pub fn target(&self) -> Option<usize> {
        self.active.as_ref().map(|jump| jump.target)
    }

    /// Phase of the running jump.
    pub fn phase(&self) -> Option<JumpPhase> {
        self.active.as_ref().map(|jump| match jump.phase {
            Phase::Loading { .. } => JumpPhase::Loading,
            Phase::AwaitResident { .. } => JumpPhase::AwaitResident,
            Phase::AwaitReady { .. } => JumpPhase::AwaitReady,
            Phase::Reflow { .. } => JumpPhase::Reflow,
            Phase::Settling { .. } => JumpPhase::Settling,
        })
    }

    /// Cancellation token of the running jump. Cancelling it abandons the
    /// jump at its next step.
    pub fn token(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|jump| jump.token.clone())
    }

    /// Start a jump to `requested`, replacing any running jump.
    ///
    /// Out-of-range targets are clamped to the last item. An empty list
    /// leaves everything untouched.
    pub fn begin<C>(&mut self, ctx: &mut C, requested: usize, kind: JumpKind, now: Instant) -> JumpStart
    where
        C: JumpContext + ?Sized,
    {
        let total = ctx.total_count();
        if total == 0 {
            debug!(requested, "jump ignored, list is empty");
            return JumpStart::Empty;
        }
        let target = requested.min(total - 1);

        let superseded = self.active.take().map(|previous| {
            previous.token.cancel();
            debug!(previous = previous.target, target, "jump superseded");
            JumpError::Superseded {
                target: previous.target,
            }
        });

        ctx.suspend_eviction(target);
        ctx.invalidate_position();
        let current = ctx.fresh_index();

        let timing = self.timing.for_kind(kind);
        let distance = target.abs_diff(current);
        let breadth = match kind {
            JumpKind::Short => 1,
            JumpKind::Full if distance > timing.long_jump_distance => 5,
            JumpKind::Full => 3,
        };
        debug!(requested, target, current, breadth, ?kind, "jump started");

        self.active = Some(ActiveJump {
            requested,
            target,
            breadth,
            timing,
            started_at: now,
            phase: Phase::Loading { step: 0 },
            token: CancellationToken::new(),
            attempts: 0,
            resource_timed_out: false,
        });

        JumpStart::Started { target, superseded }
    }

    /// Advance the running jump as far as it can go at `now`.
    pub fn step<C>(&mut self, ctx: &mut C, now: Instant) -> JumpStep
    where
        C: JumpContext + ?Sized,
    {
        let Some(jump) = self.active.as_mut() else {
            return JumpStep::Idle;
        };

        if jump.token.is_cancelled() {
            let target = jump.target;
            self.finish(ctx);
            debug!(target, "jump cancelled");
            return JumpStep::Done(Err(JumpError::Superseded { target }));
        }

        loop {
            match jump.phase {
                Phase::Loading { step } => {
                    if step < jump.breadth {
                        let index = neighborhood(
                            jump.target,
                            step,
                            jump.breadth,
                            ctx.batch_size(),
                            ctx.total_count(),
                        );
                        ctx.load_around_page(index);
                        jump.phase = Phase::Loading { step: step + 1 };
                        return JumpStep::Yield(Wake::NextFrame);
                    }
                    jump.phase = Phase::AwaitResident {
                        retry: jump.timing.retry.start(),
                    };
                }

                Phase::AwaitResident { mut retry } => {
                    if ctx.is_loaded(jump.target) {
                        jump.attempts = retry.attempts();
                        jump.phase = Phase::AwaitReady {
                            deadline: now + jump.timing.ready_timeout,
                        };
                        continue;
                    }

                    if let Some(wake) = retry.next_wake(now) {
                        jump.phase = Phase::AwaitResident { retry };
                        return JumpStep::Yield(wake);
                    }

                    let target = jump.target;
                    let attempts = retry.attempts();
                    warn!(target, attempts, "jump target never became resident");
                    self.finish(ctx);
                    return JumpStep::Done(Err(JumpError::NotFound { target, attempts }));
                }

                Phase::AwaitReady { deadline } => {
                    let ready = ctx.is_ready(jump.target);
                    if !ready && now < deadline {
                        let delay = jump.timing.retry.delay;
                        if delay.is_zero() {
                            return JumpStep::Yield(Wake::NextFrame);
                        }
                        return JumpStep::Yield(Wake::At((now + delay).min(deadline)));
                    }

                    if !ready {
                        warn!(target = jump.target, "jump target not decoded in time");
                        jump.resource_timed_out = true;
                    }
                    jump.phase = Phase::Reflow {
                        until: now + jump.timing.reflow_delay,
                    };
                }

                Phase::Reflow { until } => {
                    if now < until {
                        return JumpStep::Yield(Wake::At(until));
                    }

                    if !ctx.align_top(jump.target) {
                        let target = jump.target;
                        let attempts = jump.attempts;
                        warn!(target, "jump target left the surface before alignment");
                        self.finish(ctx);
                        return JumpStep::Done(Err(JumpError::NotFound { target, attempts }));
                    }
                    ctx.invalidate_position();
                    jump.phase = Phase::Settling {
                        until: now + jump.timing.settle_delay,
                    };
                }

                Phase::Settling { until } => {
                    if now < until {
                        return JumpStep::Yield(Wake::At(until));
                    }

                    let requested = jump.requested;
                    let target = jump.target;
                    let attempts = jump.attempts;
                    let resource_timed_out = jump.resource_timed_out;
                    let elapsed = now.saturating_duration_since(jump.started_at);

                    self.finish(ctx);
                    let final_index = ctx.fresh_index();
                    info!(target, final_index, ?elapsed, "jump complete");

                    return JumpStep::Done(Ok(JumpOutcome {
                        requested,
                        target,
                        final_index,
                        attempts,
                        resource_timed_out,
                        elapsed,
                    }));
                }
            }
        }
    }

    /// Abandon the running jump. Returns its target.
    pub fn cancel<C>(&mut self, ctx: &mut C) -> Option<usize>
    where
        C: JumpContext + ?Sized,
    {
        let jump = self.active.as_ref()?;
        jump.token.cancel();
        let target = jump.target;
        self.finish(ctx);
        Some(target)
    }

    fn finish<C>(&mut self, ctx: &mut C)
    where
        C: JumpContext + ?Sized,
    {
        self.active = None;
        ctx.resume_eviction();
        ctx.invalidate_position();
    }
}

/// Index of the `step`-th of `breadth` neighborhoods centered on `target`.
fn neighborhood(target: usize, step: usize, breadth: usize, batch_size: usize, total: usize) -> usize {
    let half = breadth / 2;
    let last = total.saturating_sub(1);
    if step < half {
        target.saturating_sub((half - step) * batch_size)
    } else {
        (target + (step - half) * batch_size).min(last)
    }
}
