#![forbid(unsafe_code)]

//! Scroll-direction nav visibility.
//!
//! The nav bar hides while the reader scrolls down and reappears on the way
//! up or near the top of the page. Scroll events are coalesced: the latest
//! position is stored and evaluated at most once per display frame.
//!
//! # Invariants
//!
//! 1. At or below `near_top` the nav is visible regardless of direction.
//! 2. A delta whose magnitude is within `dead_zone` changes nothing, not even
//!    the baseline it is measured from.
//! 3. `last_scroll_y` only moves inside the frame callback.
//! 4. At most one frame is pending at any time.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::runtime::{FrameLoop, Host, LoopControl};
use crate::smooth_scroll::{ScrollContext, ScrollTarget};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavConfig {
    /// Deltas at or below this magnitude are jitter.
    pub dead_zone: f64,
    /// Positions at or below this are "near top".
    pub near_top: f64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            dead_zone: 6.0,
            near_top: 10.0,
        }
    }
}

/// The nav's visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NavVisibility {
    pub is_hidden: bool,
    pub last_scroll_y: f64,
    pub frame_pending: bool,
}

impl NavVisibility {
    #[must_use]
    pub fn new(initial_y: f64) -> Self {
        Self {
            last_scroll_y: initial_y,
            ..Self::default()
        }
    }

    /// Evaluate a scroll position. Returns the new hidden flag when it
    /// changed.
    pub fn evaluate(&mut self, current_y: f64, config: &NavConfig) -> Option<bool> {
        if current_y <= config.near_top {
            self.last_scroll_y = current_y;
            return self.set_hidden(false);
        }
        let delta = current_y - self.last_scroll_y;
        if delta.abs() <= config.dead_zone {
            return None;
        }
        self.last_scroll_y = current_y;
        self.set_hidden(delta > 0.0)
    }

    fn set_hidden(&mut self, hidden: bool) -> Option<bool> {
        (self.is_hidden != hidden).then(|| {
            self.is_hidden = hidden;
            hidden
        })
    }
}

struct Inner {
    config: NavConfig,
    visibility: NavVisibility,
    latest_y: f64,
    pending: Option<FrameLoop>,
    stopped: bool,
}

struct Shared {
    host: Rc<dyn Host>,
    inner: RefCell<Inner>,
    on_change: RefCell<Box<dyn FnMut(bool)>>,
}

impl Shared {
    fn update(&self) {
        let (changed, _finished) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.visibility.frame_pending = false;
            let finished = inner.pending.take();
            if inner.stopped {
                return;
            }
            let changed = inner.visibility.evaluate(inner.latest_y, &inner.config);
            trace!(y = inner.latest_y, hidden = inner.visibility.is_hidden, "nav: evaluated");
            (changed, finished)
        };
        if let Some(hidden) = changed {
            debug!(hidden, "nav: visibility changed");
            let callback = &mut *self.on_change.borrow_mut();
            callback(hidden);
        }
    }
}

/// Frame-coalesced nav visibility controller.
pub struct NavController {
    shared: Rc<Shared>,
}

impl NavController {
    /// Start visible, measuring deltas from `initial_y`. `on_change` receives
    /// the new hidden flag on every change.
    pub fn start(
        host: Rc<dyn Host>,
        config: NavConfig,
        initial_y: f64,
        on_change: impl FnMut(bool) + 'static,
    ) -> Self {
        debug!(initial_y, "nav: started");
        Self {
            shared: Rc::new(Shared {
                host,
                inner: RefCell::new(Inner {
                    config,
                    visibility: NavVisibility::new(initial_y),
                    latest_y: initial_y,
                    pending: None,
                    stopped: false,
                }),
                on_change: RefCell::new(Box::new(on_change)),
            }),
        }
    }

    /// Record a scroll position; evaluation happens on the next frame.
    pub fn on_scroll(&self, y: f64) {
        let mut inner = self.shared.inner.borrow_mut();
        if inner.stopped {
            return;
        }
        inner.latest_y = y;
        if inner.visibility.frame_pending {
            return;
        }
        inner.visibility.frame_pending = true;
        let weak: Weak<Shared> = Rc::downgrade(&self.shared);
        inner.pending = Some(FrameLoop::start(Rc::clone(&self.shared.host), move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.update();
            }
            LoopControl::Break
        }));
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.shared.inner.borrow().visibility.is_hidden
    }

    #[must_use]
    pub fn visibility(&self) -> NavVisibility {
        self.shared.inner.borrow().visibility
    }

    /// Cancel any pending frame. Idempotent.
    pub fn stop(&self) {
        let pending = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.stopped {
                return;
            }
            inner.stopped = true;
            inner.visibility.frame_pending = false;
            inner.pending.take()
        };
        if let Some(frame_loop) = pending {
            frame_loop.cancel();
        }
        debug!("nav: stopped");
    }
}

impl Drop for NavController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An entry in the site navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavLink {
    Home,
    Projects,
    About,
    Contact,
}

impl NavLink {
    pub const ALL: [NavLink; 4] = [Self::Home, Self::Projects, Self::About, Self::Contact];

    /// Link for a nav label, case-insensitively.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|link| link.label().eq_ignore_ascii_case(label.trim()))
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Projects => "projects",
            Self::About => "about",
            Self::Contact => "contact",
        }
    }

    #[must_use]
    pub fn target(self) -> ScrollTarget {
        match self {
            Self::Home => ScrollTarget::Offset(0.0),
            Self::Projects => ScrollTarget::anchor("projects-section"),
            Self::About => ScrollTarget::anchor("about-section"),
            Self::Contact => ScrollTarget::anchor("contact-section"),
        }
    }

    /// Scroll to this link's section. No-op (returns `false`) until the
    /// smooth-scroll engine is installed.
    pub fn navigate(self, scroll: &ScrollContext) -> bool {
        trace!(link = self.label(), "nav: navigate");
        scroll.scroll_to(&self.target())
    }
}
