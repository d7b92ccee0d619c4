#![forbid(unsafe_code)]

//! Smooth-scroll engine adapter.
//!
//! The page scrolls through an external smooth-scroll primitive described by
//! [`ScrollEngine`]. [`SmoothScroll`] owns one engine and drives it from a
//! single [`FrameLoop`]; [`ScrollContext`] is the clonable handle the rest of
//! the page uses to request programmatic scrolls. A context that has no
//! engine yet (early mount) or whose engine was destroyed silently ignores
//! scroll requests.
//!
//! [`LerpEngine`] is the built-in engine: a virtual position eased toward a
//! clamped target a fixed fraction per frame, written out through a
//! [`ScrollSink`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::ScrollTargetError;
use crate::runtime::{FrameLoop, Host, LoopControl};

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Where a programmatic scroll should land.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    /// Absolute document offset in CSS pixels.
    Offset(f64),
    /// Named section, without the leading `#`.
    Anchor(String),
}

impl ScrollTarget {
    #[must_use]
    pub fn anchor(name: impl Into<String>) -> Self {
        Self::Anchor(name.into())
    }
}

impl FromStr for ScrollTarget {
    type Err = ScrollTargetError;

    /// `"#about-section"` is an anchor, `"0"` and `"120.5"` are offsets, and
    /// any other non-empty word is taken as an anchor name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix('#') {
            return if name.is_empty() {
                Err(ScrollTargetError::Empty)
            } else {
                Ok(Self::Anchor(name.to_owned()))
            };
        }
        if s.is_empty() {
            return Err(ScrollTargetError::Empty);
        }
        match s.parse::<f64>() {
            Ok(y) if y.is_finite() => Ok(Self::Offset(y)),
            _ => Ok(Self::Anchor(s.to_owned())),
        }
    }
}

impl fmt::Display for ScrollTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset(y) => write!(f, "{y}"),
            Self::Anchor(name) => write!(f, "#{name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine seam
// ---------------------------------------------------------------------------

/// Origin of a scroll gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Wheel,
    Touch,
}

/// The external smooth-scroll primitive.
pub trait ScrollEngine {
    /// Advance one display frame.
    fn raf(&mut self, now: Duration);

    /// Begin an eased scroll toward `target`.
    fn scroll_to(&mut self, target: &ScrollTarget);

    /// Feed a gesture delta. Returns `true` when the engine consumed it and
    /// the host should suppress native scrolling.
    fn on_wheel(&mut self, delta_y: f64, source: InputSource) -> bool;

    /// Current (eased) scroll position.
    fn scroll_y(&self) -> f64;

    /// Release the engine. Later calls on it are no-ops.
    fn destroy(&mut self);
}

/// Resolves a named anchor to its document offset.
pub trait AnchorResolver {
    fn resolve(&self, anchor: &str) -> Option<f64>;
}

impl AnchorResolver for HashMap<String, f64> {
    fn resolve(&self, anchor: &str) -> Option<f64> {
        self.get(anchor).copied()
    }
}

/// Applies an eased scroll position to the document.
pub trait ScrollSink {
    fn write_scroll(&mut self, y: f64);
}

// ---------------------------------------------------------------------------
// LerpEngine
// ---------------------------------------------------------------------------

/// Engine tuning, as accepted from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmoothScrollOptions {
    /// Ease wheel input.
    pub smooth_wheel: bool,
    /// Ease touch input. Off by default; touch keeps native momentum.
    pub smooth_touch: bool,
    /// Fraction of the remaining distance covered per frame, in (0, 1].
    pub lerp: f64,
    /// Scale applied to wheel deltas.
    pub wheel_multiplier: f64,
}

impl Default for SmoothScrollOptions {
    fn default() -> Self {
        Self {
            smooth_wheel: true,
            smooth_touch: false,
            lerp: 0.1,
            wheel_multiplier: 1.0,
        }
    }
}

/// Distance under which the eased position snaps onto the target.
pub const SNAP_DISTANCE: f64 = 0.5;

/// Built-in [`ScrollEngine`].
pub struct LerpEngine<R, S> {
    options: SmoothScrollOptions,
    resolver: R,
    sink: S,
    current: f64,
    target: f64,
    limit: f64,
    destroyed: bool,
}

impl<R: AnchorResolver, S: ScrollSink> LerpEngine<R, S> {
    /// Engine resting at `start_y` with scrollable range `[0, limit]`.
    pub fn new(options: SmoothScrollOptions, resolver: R, sink: S, start_y: f64, limit: f64) -> Self {
        let limit = limit.max(0.0);
        let start = start_y.clamp(0.0, limit);
        Self {
            options,
            resolver,
            sink,
            current: start,
            target: start,
            limit,
            destroyed: false,
        }
    }

    /// Update the scrollable range (document resized).
    pub fn set_limit(&mut self, limit: f64) {
        self.limit = limit.max(0.0);
        self.target = self.clamp(self.target);
        self.current = self.clamp(self.current);
    }

    /// Adopt a position the document reached natively (keyboard, touch).
    pub fn sync(&mut self, y: f64) {
        let y = self.clamp(y);
        self.current = y;
        self.target = y;
    }

    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        !self.destroyed && self.current != self.target
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn clamp(&self, y: f64) -> f64 {
        if y.is_nan() { self.target } else { y.clamp(0.0, self.limit) }
    }
}

impl<R: AnchorResolver, S: ScrollSink> ScrollEngine for LerpEngine<R, S> {
    fn raf(&mut self, _now: Duration) {
        if !self.is_animating() {
            return;
        }
        let gap = self.target - self.current;
        self.current = if gap.abs() <= SNAP_DISTANCE {
            self.target
        } else {
            self.current + gap * self.options.lerp
        };
        self.sink.write_scroll(self.current);
    }

    fn scroll_to(&mut self, target: &ScrollTarget) {
        if self.destroyed {
            return;
        }
        let y = match target {
            ScrollTarget::Offset(y) => *y,
            ScrollTarget::Anchor(name) => match self.resolver.resolve(name) {
                Some(y) => y,
                None => {
                    warn!(anchor = %name, "smooth scroll: unknown anchor ignored");
                    return;
                }
            },
        };
        self.target = self.clamp(y);
        trace!(y = self.target, "smooth scroll: target set");
    }

    fn on_wheel(&mut self, delta_y: f64, source: InputSource) -> bool {
        let eased = match source {
            InputSource::Wheel => self.options.smooth_wheel,
            InputSource::Touch => self.options.smooth_touch,
        };
        if self.destroyed || !eased || !delta_y.is_finite() {
            return false;
        }
        self.target = self.clamp(self.target + delta_y * self.options.wheel_multiplier);
        true
    }

    fn scroll_y(&self) -> f64 {
        self.current
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.target = self.current;
    }
}

// ---------------------------------------------------------------------------
// Driver and context
// ---------------------------------------------------------------------------

struct Driver {
    engine: RefCell<Box<dyn ScrollEngine>>,
    frame_loop: RefCell<Option<FrameLoop>>,
    destroyed: Cell<bool>,
}

impl Driver {
    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        if let Some(frame_loop) = self.frame_loop.borrow_mut().take() {
            frame_loop.cancel();
        }
        self.engine.borrow_mut().destroy();
        debug!("smooth scroll: destroyed");
    }
}

/// An engine plus the frame loop driving it.
pub struct SmoothScroll {
    driver: Rc<Driver>,
}

impl SmoothScroll {
    /// Take ownership of `engine` and call its `raf` every frame.
    pub fn create(host: Rc<dyn Host>, engine: impl ScrollEngine + 'static) -> Self {
        let driver = Rc::new(Driver {
            engine: RefCell::new(Box::new(engine)),
            frame_loop: RefCell::new(None),
            destroyed: Cell::new(false),
        });
        let weak: Weak<Driver> = Rc::downgrade(&driver);
        let frame_loop = FrameLoop::start(host, move |now| match weak.upgrade() {
            Some(driver) if !driver.destroyed.get() => {
                driver.engine.borrow_mut().raf(now);
                LoopControl::Continue
            }
            _ => LoopControl::Break,
        });
        *driver.frame_loop.borrow_mut() = Some(frame_loop);
        debug!("smooth scroll: created");
        Self { driver }
    }

    pub fn scroll_to(&self, target: &ScrollTarget) {
        if !self.driver.destroyed.get() {
            self.driver.engine.borrow_mut().scroll_to(target);
        }
    }

    pub fn on_wheel(&self, delta_y: f64, source: InputSource) -> bool {
        !self.driver.destroyed.get() && self.driver.engine.borrow_mut().on_wheel(delta_y, source)
    }

    #[must_use]
    pub fn scroll_y(&self) -> f64 {
        self.driver.engine.borrow().scroll_y()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.driver.destroyed.get()
    }

    /// Cancel the frame loop and destroy the engine together. Idempotent.
    pub fn destroy(&self) {
        self.driver.destroy();
    }

    /// A context bound to this engine.
    #[must_use]
    pub fn context(&self) -> ScrollContext {
        let context = ScrollContext::default();
        context.install(self);
        context
    }
}

impl Drop for SmoothScroll {
    fn drop(&mut self) {
        self.driver.destroy();
    }
}

/// Shared handle for requesting scrolls from anywhere on the page.
///
/// Holds the engine weakly: the [`SmoothScroll`] owner decides its lifetime.
#[derive(Clone, Default)]
pub struct ScrollContext {
    slot: Rc<RefCell<Weak<Driver>>>,
}

impl fmt::Debug for ScrollContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollContext")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl ScrollContext {
    /// Bind every clone of this context to `scroll`.
    pub fn install(&self, scroll: &SmoothScroll) {
        *self.slot.borrow_mut() = Rc::downgrade(&scroll.driver);
    }

    pub fn clear(&self) {
        *self.slot.borrow_mut() = Weak::new();
    }

    /// Whether a live engine is bound.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.driver().is_some()
    }

    /// Forward to the bound engine. Returns `false` (and does nothing) when
    /// no live engine is bound.
    pub fn scroll_to(&self, target: &ScrollTarget) -> bool {
        match self.driver() {
            Some(driver) => {
                driver.engine.borrow_mut().scroll_to(target);
                true
            }
            None => {
                trace!(to = %target, "smooth scroll: engine not ready, ignored");
                false
            }
        }
    }

    fn driver(&self) -> Option<Rc<Driver>> {
        self.slot
            .borrow()
            .upgrade()
            .filter(|driver| !driver.destroyed.get())
    }
}
