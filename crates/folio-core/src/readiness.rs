#![forbid(unsafe_code)]

//! Readiness aggregator: one idempotent "ready" transition from several
//! one-shot conditions, plus an eased progress estimate for the loader.
//!
//! Ready fires when either
//! - all of [`Condition::MinimumDelayElapsed`], [`Condition::FontsLoaded`]
//!   and [`Condition::DocumentLoaded`] have resolved, or
//! - [`Condition::HardTimeoutElapsed`] resolves,
//!
//! whichever happens first. The two timed conditions are timers owned by the
//! aggregator; the other two are resolved by the host through
//! [`ReadinessHandle::resolve`].
//!
//! # Invariants
//!
//! 1. `on_ready` is delivered at most once per start, with progress 100.
//! 2. Progress never decreases and stays at or below 95 until ready.
//! 3. After `cancel()` no timer, frame or notification remains.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::env::{Environment, LOADING_MARKER};
use crate::runtime::{FrameLoop, Host, LoopControl, TimerId};

/// Body background while the loader is up.
pub const LOADING_BACKGROUND: &str = "#111111";
/// Body background restored once ready.
pub const READY_BACKGROUND: &str = "var(--color-background)";
/// Property the background override is written to.
pub const BACKGROUND_PROPERTY: &str = "background-color";

/// Ceiling of the estimated progress before ready.
pub const PROGRESS_CEILING: u8 = 95;

/// One precondition for dismissing the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    MinimumDelayElapsed,
    FontsLoaded,
    DocumentLoaded,
    HardTimeoutElapsed,
}

impl Condition {
    const fn slot(self) -> usize {
        match self {
            Self::MinimumDelayElapsed => 0,
            Self::FontsLoaded => 1,
            Self::DocumentLoaded => 2,
            Self::HardTimeoutElapsed => 3,
        }
    }
}

/// Snapshot of the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadinessState {
    pub is_ready: bool,
    pub progress: u8,
    pub has_finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    pub minimum_delay: Duration,
    pub hard_timeout: Duration,
    pub progress_duration: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            minimum_delay: Duration::from_millis(1000),
            hard_timeout: Duration::from_millis(8000),
            progress_duration: Duration::from_millis(5000),
        }
    }
}

/// Receives readiness notifications.
pub trait ReadinessListener {
    /// Progress changed (0..=100).
    fn on_progress(&mut self, _progress: u8) {}

    /// The loader may be dismissed. Called once, with progress 100.
    fn on_ready(&mut self, progress: u8);
}

/// Estimated progress after `elapsed` out of `duration`.
///
/// `1 - (1 - x)^2` ease-out over `x = elapsed / duration`, scaled to at most
/// [`PROGRESS_CEILING`].
#[must_use]
pub fn estimate_progress(elapsed: Duration, duration: Duration) -> u8 {
    let x = if duration.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    };
    let eased = 1.0 - (1.0 - x) * (1.0 - x);
    let scaled = (eased * f64::from(PROGRESS_CEILING)).floor();
    scaled.clamp(0.0, f64::from(PROGRESS_CEILING)) as u8
}

struct Inner {
    config: ReadinessConfig,
    state: ReadinessState,
    resolved: [bool; 4],
    progress_started: Option<Duration>,
    minimum_delay_timer: Option<TimerId>,
    hard_timeout_timer: Option<TimerId>,
    progress_loop: Option<FrameLoop>,
    cancelled: bool,
}

impl Inner {
    fn soft_conditions_met(&self) -> bool {
        [
            Condition::MinimumDelayElapsed,
            Condition::FontsLoaded,
            Condition::DocumentLoaded,
        ]
        .iter()
        .all(|c| self.resolved[c.slot()])
    }
}

struct Shared {
    host: Rc<dyn Host>,
    env: Rc<dyn Environment>,
    inner: RefCell<Inner>,
    listener: RefCell<Box<dyn ReadinessListener>>,
}

impl Shared {
    fn resolve(&self, condition: Condition) {
        let ready_now = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled || inner.state.is_ready {
                return;
            }
            let slot = condition.slot();
            if inner.resolved[slot] {
                trace!(?condition, "readiness: condition already resolved");
                return;
            }
            inner.resolved[slot] = true;
            match condition {
                Condition::MinimumDelayElapsed => inner.minimum_delay_timer = None,
                Condition::HardTimeoutElapsed => inner.hard_timeout_timer = None,
                Condition::FontsLoaded | Condition::DocumentLoaded => {}
            }
            debug!(?condition, "readiness: condition resolved");
            condition == Condition::HardTimeoutElapsed || inner.soft_conditions_met()
        };
        if ready_now {
            self.finish(condition == Condition::HardTimeoutElapsed);
        }
    }

    fn finish(&self, timed_out: bool) {
        let (timers, progress_loop, previous) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.has_finished {
                return;
            }
            inner.state.is_ready = true;
            inner.state.has_finished = true;
            let previous = inner.state.progress;
            inner.state.progress = 100;
            let timers = [
                inner.hard_timeout_timer.take(),
                inner.minimum_delay_timer.take(),
            ];
            (timers, inner.progress_loop.take(), previous)
        };
        for id in timers.into_iter().flatten() {
            self.host.clear_timeout(id);
        }
        drop(progress_loop);

        debug!(timed_out, "readiness: ready");
        self.env.clear_marker(LOADING_MARKER);
        self.env.set_property(BACKGROUND_PROPERTY, READY_BACKGROUND);

        let mut listener = self.listener.borrow_mut();
        if previous != 100 {
            listener.on_progress(100);
        }
        listener.on_ready(100);
    }

    fn progress_step(&self, now: Duration) -> LoopControl {
        let (changed, done) = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled || inner.state.is_ready {
                return LoopControl::Break;
            }
            let started = *inner.progress_started.get_or_insert(now);
            let elapsed = now.saturating_sub(started);
            let value = estimate_progress(elapsed, inner.config.progress_duration);
            let changed = (value > inner.state.progress).then(|| {
                inner.state.progress = value;
                value
            });
            (changed, elapsed >= inner.config.progress_duration)
        };
        if let Some(value) = changed {
            self.listener.borrow_mut().on_progress(value);
        }
        if done {
            trace!("readiness: progress estimate settled");
            LoopControl::Break
        } else {
            LoopControl::Continue
        }
    }

    fn cancel(&self) {
        let (timers, progress_loop, was_ready) = {
            let mut inner = self.inner.borrow_mut();
            if inner.cancelled {
                return;
            }
            inner.cancelled = true;
            let timers = [
                inner.minimum_delay_timer.take(),
                inner.hard_timeout_timer.take(),
            ];
            (timers, inner.progress_loop.take(), inner.state.is_ready)
        };
        for id in timers.into_iter().flatten() {
            self.host.clear_timeout(id);
        }
        drop(progress_loop);
        if !was_ready {
            self.env.clear_marker(LOADING_MARKER);
            self.env.clear_property(BACKGROUND_PROPERTY);
        }
        debug!(was_ready, "readiness: cancelled");
    }
}

/// Entry point for the aggregator.
pub struct Readiness;

impl Readiness {
    /// Mark the document as loading and start both timers and the progress
    /// estimator.
    pub fn start(
        host: Rc<dyn Host>,
        env: Rc<dyn Environment>,
        config: ReadinessConfig,
        listener: impl ReadinessListener + 'static,
    ) -> ReadinessHandle {
        env.set_property(BACKGROUND_PROPERTY, LOADING_BACKGROUND);
        env.set_marker(LOADING_MARKER);

        let shared = Rc::new(Shared {
            host: Rc::clone(&host),
            env,
            inner: RefCell::new(Inner {
                config,
                state: ReadinessState::default(),
                resolved: [false; 4],
                progress_started: None,
                minimum_delay_timer: None,
                hard_timeout_timer: None,
                progress_loop: None,
                cancelled: false,
            }),
            listener: RefCell::new(Box::new(listener)),
        });

        let minimum_delay_timer = host.set_timeout(
            config.minimum_delay,
            resolve_later(&shared, Condition::MinimumDelayElapsed),
        );
        let hard_timeout_timer = host.set_timeout(
            config.hard_timeout,
            resolve_later(&shared, Condition::HardTimeoutElapsed),
        );
        let weak = Rc::downgrade(&shared);
        let progress_loop = FrameLoop::start(host, move |now| match weak.upgrade() {
            Some(shared) => shared.progress_step(now),
            None => LoopControl::Break,
        });

        {
            let mut inner = shared.inner.borrow_mut();
            inner.minimum_delay_timer = Some(minimum_delay_timer);
            inner.hard_timeout_timer = Some(hard_timeout_timer);
            inner.progress_loop = Some(progress_loop);
        }
        debug!(
            minimum_delay_ms = config.minimum_delay.as_millis() as u64,
            hard_timeout_ms = config.hard_timeout.as_millis() as u64,
            "readiness: started"
        );
        ReadinessHandle { shared }
    }
}

fn resolve_later(shared: &Rc<Shared>, condition: Condition) -> Box<dyn FnOnce()> {
    let weak: Weak<Shared> = Rc::downgrade(shared);
    Box::new(move || {
        if let Some(shared) = weak.upgrade() {
            shared.resolve(condition);
        }
    })
}

/// Handle returned by [`Readiness::start`].
pub struct ReadinessHandle {
    shared: Rc<Shared>,
}

impl std::fmt::Debug for ReadinessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl ReadinessHandle {
    /// Report that a condition has resolved. Repeats are ignored.
    pub fn resolve(&self, condition: Condition) {
        self.shared.resolve(condition);
    }

    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.shared.inner.borrow().state
    }

    #[must_use]
    pub fn is_resolved(&self, condition: Condition) -> bool {
        self.shared.inner.borrow().resolved[condition.slot()]
    }

    /// Stop all timers and the estimator. Idempotent.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.inner.borrow().cancelled
    }
}

impl Drop for ReadinessHandle {
    fn drop(&mut self) {
        self.shared.cancel();
    }
}
