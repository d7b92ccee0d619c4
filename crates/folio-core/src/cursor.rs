#![forbid(unsafe_code)]

//! Pointer-following cursor with hover zones.
//!
//! Two elements follow the pointer: a dot pinned to the raw position and a
//! ring that trails it by exponential smoothing, advanced once per frame.
//! Hover zones are classified on pointer boundary crossings only (never per
//! frame) from the hovered node's ancestry and surfaced as a document marker
//! (`cursor-hover-<zone>`).
//!
//! # Invariants
//!
//! 1. At most one hover marker is set at a time.
//! 2. Switching to the zone already active writes nothing and does not
//!    notify, so moving between nested elements of one zone never flickers.
//! 3. `cursor-visible` is set on the first pointer move and never again.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::env::{CURSOR_VISIBLE_MARKER, Environment, StyleTarget};
use crate::geometry::{Point, Rect};
use crate::runtime::{FrameLoop, Host, LoopControl};

/// What kind of region the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Zone {
    #[default]
    None,
    Media,
    Ui,
    Nav,
}

impl Zone {
    /// Zone for a `data-cursor` tag value. Unknown values yield `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "media" => Some(Self::Media),
            "ui" => Some(Self::Ui),
            "nav" => Some(Self::Nav),
            _ => None,
        }
    }

    /// Document marker for this zone.
    #[must_use]
    pub const fn marker(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Media => Some("cursor-hover-media"),
            Self::Ui => Some("cursor-hover-ui"),
            Self::Nav => Some("cursor-hover-nav"),
        }
    }
}

/// A node in the hovered element's ancestry.
///
/// Hosts resolve text nodes to their parent element before handing them in.
pub trait ZoneNode: Clone {
    fn parent(&self) -> Option<Self>;

    /// Value of the node's cursor tag attribute, if present.
    fn cursor_tag(&self) -> Option<String>;

    /// Whether the node is a link or a button.
    fn is_interactive(&self) -> bool;
}

/// Classify the zone under `node`.
///
/// The nearest inclusive ancestor carrying a known cursor tag wins, even
/// over a nearer link or button; failing that any interactive ancestor
/// yields [`Zone::Ui`].
#[must_use]
pub fn classify<N: ZoneNode>(node: Option<&N>) -> Zone {
    let mut current = node.cloned();
    let mut interactive = false;
    while let Some(n) = current {
        if let Some(zone) = n.cursor_tag().as_deref().and_then(Zone::from_tag) {
            return zone;
        }
        interactive |= n.is_interactive();
        current = n.parent();
    }
    if interactive { Zone::Ui } else { Zone::None }
}

/// CSS transform centring an element on `p`.
#[must_use]
pub fn transform(p: Point) -> String {
    format!("translate3d({}px, {}px, 0) translate(-50%, -50%)", p.x, p.y)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerState {
    /// Last reported pointer position.
    pub raw: Point,
    /// Smoothed ring position.
    pub trailing: Point,
    pub zone: Zone,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorConfig {
    /// Fraction of the gap to the pointer closed per frame, in (0, 1].
    pub smoothing: f64,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self { smoothing: 0.1 }
    }
}

struct Inner {
    state: PointerState,
    config: CursorConfig,
    visible: bool,
    stopped: bool,
    frame_loop: Option<FrameLoop>,
}

struct Shared {
    env: Rc<dyn Environment>,
    dot: Rc<dyn StyleTarget>,
    ring: Rc<dyn StyleTarget>,
    inner: RefCell<Inner>,
    on_zone_change: RefCell<Box<dyn FnMut(Zone)>>,
}

impl Shared {
    fn tick(&self) -> LoopControl {
        let (raw, trailing) = {
            let mut inner = self.inner.borrow_mut();
            if inner.stopped {
                return LoopControl::Break;
            }
            let smoothing = inner.config.smoothing;
            let state = &mut inner.state;
            state.trailing = state.trailing.lerp(state.raw, smoothing);
            (state.raw, state.trailing)
        };
        self.dot.set_style("transform", &transform(raw));
        self.ring.set_style("transform", &transform(trailing));
        LoopControl::Continue
    }

    fn switch(&self, zone: Zone) {
        let previous = {
            let mut inner = self.inner.borrow_mut();
            if inner.stopped || inner.state.zone == zone {
                trace!(?zone, "cursor: zone unchanged");
                return;
            }
            std::mem::replace(&mut inner.state.zone, zone)
        };
        if let Some(marker) = previous.marker() {
            self.env.clear_marker(marker);
        }
        if let Some(marker) = zone.marker() {
            self.env.set_marker(marker);
        }
        trace!(from = ?previous, to = ?zone, "cursor: zone changed");
        let callback = &mut *self.on_zone_change.borrow_mut();
        callback(zone);
    }
}

/// The running cursor controller.
pub struct PointerCursor {
    shared: Rc<Shared>,
}

impl PointerCursor {
    /// Start the trailing loop with both elements at the centre of
    /// `viewport`.
    pub fn start(
        host: Rc<dyn Host>,
        env: Rc<dyn Environment>,
        dot: Rc<dyn StyleTarget>,
        ring: Rc<dyn StyleTarget>,
        viewport: Rect,
        config: CursorConfig,
        on_zone_change: impl FnMut(Zone) + 'static,
    ) -> Self {
        let centre = viewport.center();
        let shared = Rc::new(Shared {
            env,
            dot,
            ring,
            inner: RefCell::new(Inner {
                state: PointerState {
                    raw: centre,
                    trailing: centre,
                    zone: Zone::None,
                },
                config,
                visible: false,
                stopped: false,
                frame_loop: None,
            }),
            on_zone_change: RefCell::new(Box::new(on_zone_change)),
        });
        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let frame_loop = FrameLoop::start(host, move |_| match weak.upgrade() {
            Some(shared) => shared.tick(),
            None => LoopControl::Break,
        });
        shared.inner.borrow_mut().frame_loop = Some(frame_loop);
        debug!(x = centre.x, y = centre.y, "cursor: started");
        Self { shared }
    }

    pub fn pointer_move(&self, x: f64, y: f64) {
        let first = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.stopped {
                return;
            }
            inner.state.raw = Point::new(x, y);
            !std::mem::replace(&mut inner.visible, true)
        };
        if first {
            self.shared.env.set_marker(CURSOR_VISIBLE_MARKER);
        }
    }

    /// The pointer entered `target`.
    pub fn pointer_over<N: ZoneNode>(&self, target: Option<&N>) {
        let zone = classify(target);
        if zone != Zone::None {
            self.shared.switch(zone);
        }
    }

    /// The pointer left `from` for `to`.
    pub fn pointer_out<N: ZoneNode>(&self, from: Option<&N>, to: Option<&N>) {
        let from_zone = classify(from);
        let to_zone = classify(to);
        if from_zone != Zone::None && to_zone == Zone::None {
            self.shared.switch(Zone::None);
        } else if to_zone != Zone::None && to_zone != from_zone {
            self.shared.switch(to_zone);
        }
    }

    #[must_use]
    pub fn state(&self) -> PointerState {
        self.shared.inner.borrow().state
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.inner.borrow().stopped
    }

    /// Cancel the trailing loop and clear the hover marker. Idempotent.
    pub fn stop(&self) {
        let (frame_loop, zone) = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.stopped {
                return;
            }
            inner.stopped = true;
            let zone = std::mem::take(&mut inner.state.zone);
            (inner.frame_loop.take(), zone)
        };
        if let Some(frame_loop) = frame_loop {
            frame_loop.cancel();
        }
        if let Some(marker) = zone.marker() {
            self.shared.env.clear_marker(marker);
        }
        debug!("cursor: stopped");
    }
}

impl Drop for PointerCursor {
    fn drop(&mut self) {
        self.stop();
    }
}
