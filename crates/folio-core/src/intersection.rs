#![forbid(unsafe_code)]

//! Intersection tracking for the projects panels and section.
//!
//! Two independent trackers share this module:
//!
//! - [`PanelTracker`] follows which project panel is "active". Panels are
//!   tested against a shrunk root (by default the band between 35% and 45%
//!   of the viewport height) so a panel only activates when it occupies the
//!   centre of the screen.
//! - [`SectionTracker`] toggles the `projects-section-active` document marker
//!   while the section intersects the viewport. Its threshold only tells the
//!   observer when to report.
//!
//! Both consume [`IntersectionEntry`] batches. In the browser the batches
//! come from a native observer; [`GeometricObserver`] derives the same
//! batches from rectangles for hosts without one.
//!
//! # Invariants
//!
//! 1. Within one batch the last intersecting entry wins the active index,
//!    in batch (document) order, regardless of geometry.
//! 2. The panel listener only hears about changes of the final index.
//! 3. After `disconnect` no batch has any effect.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::env::{Environment, SECTION_ACTIVE_MARKER};
use crate::error::RootMarginError;
use crate::geometry::Rect;

/// Slack when comparing a reported ratio against a threshold.
const RATIO_EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Root margin
// ---------------------------------------------------------------------------

/// One side of a root margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    /// Percentage of the root's height (top/bottom) or width (left/right).
    Percent(f64),
}

impl Length {
    #[must_use]
    pub fn resolve(self, basis: f64) -> f64 {
        match self {
            Self::Px(px) => px,
            Self::Percent(pct) => basis * pct / 100.0,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(px) => write!(f, "{px}px"),
            Self::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

impl FromStr for Length {
    type Err = RootMarginError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || RootMarginError::InvalidLength(token.to_owned());
        let number = |s: &str| {
            s.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(invalid)
        };
        if token == "0" {
            Ok(Self::Px(0.0))
        } else if let Some(px) = token.strip_suffix("px") {
            number(px).map(Self::Px)
        } else if let Some(pct) = token.strip_suffix('%') {
            number(pct).map(Self::Percent)
        } else {
            Err(invalid())
        }
    }
}

/// Offsets applied to the viewport before intersection testing, in CSS
/// `margin` shorthand order. Negative values shrink the root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl RootMargin {
    /// Margin used for project panel activation.
    pub const PANEL_DEFAULT: &'static str = "-35% 0px -55% 0px";

    pub const ZERO: Self = Self {
        top: Length::Px(0.0),
        right: Length::Px(0.0),
        bottom: Length::Px(0.0),
        left: Length::Px(0.0),
    };

    /// The root rectangle for `viewport`.
    #[must_use]
    pub fn apply(&self, viewport: Rect) -> Rect {
        let top = self.top.resolve(viewport.height);
        let bottom = self.bottom.resolve(viewport.height);
        let left = self.left.resolve(viewport.width);
        let right = self.right.resolve(viewport.width);
        Rect::new(
            viewport.x - left,
            viewport.y - top,
            (viewport.width + left + right).max(0.0),
            (viewport.height + top + bottom).max(0.0),
        )
    }
}

impl Default for RootMargin {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for RootMargin {
    type Err = RootMarginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<Length>, _>>()?;
        let (top, right, bottom, left) = match values.as_slice() {
            [] => return Err(RootMarginError::Empty),
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            more => return Err(RootMarginError::TooManyValues(more.len())),
        };
        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One observation of one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    /// Registration index of the target.
    pub index: usize,
    pub is_intersecting: bool,
    /// Visible fraction of the target, in [0, 1].
    pub ratio: f64,
}

/// Fraction of `target` inside `root`, and whether they touch at all.
#[must_use]
pub fn intersection_ratio(target: &Rect, root: &Rect) -> (bool, f64) {
    match target.intersection(root) {
        None => (false, 0.0),
        Some(overlap) => {
            let area = target.area();
            let ratio = if area > 0.0 {
                (overlap.area() / area).clamp(0.0, 1.0)
            } else {
                1.0
            };
            (true, ratio)
        }
    }
}

/// One entry per target against an already-shrunk `root`. A target is
/// intersecting as soon as it touches the root; thresholds only decide when
/// an observer reports it.
#[must_use]
pub fn compute_entries(root: &Rect, targets: &[Rect]) -> Vec<IntersectionEntry> {
    targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let (is_intersecting, ratio) = intersection_ratio(target, root);
            IntersectionEntry {
                index,
                is_intersecting,
                ratio,
            }
        })
        .collect()
}

/// Derives entry batches from target rectangles.
///
/// Each call reports only targets whose intersecting state changed, or whose
/// ratio crossed `threshold`, since the previous call; the first call
/// reports every target.
#[derive(Debug, Clone)]
pub struct GeometricObserver {
    margin: RootMargin,
    threshold: f64,
    last: Option<Vec<(bool, bool)>>,
}

impl GeometricObserver {
    #[must_use]
    pub fn new(margin: RootMargin, threshold: f64) -> Self {
        Self {
            margin,
            threshold,
            last: None,
        }
    }

    fn state(&self, entry: &IntersectionEntry) -> (bool, bool) {
        let above = entry.is_intersecting && entry.ratio + RATIO_EPSILON >= self.threshold;
        (entry.is_intersecting, above)
    }

    pub fn observe(&mut self, viewport: Rect, targets: &[Rect]) -> Vec<IntersectionEntry> {
        let entries = compute_entries(&self.margin.apply(viewport), targets);
        let states: Vec<(bool, bool)> = entries.iter().map(|e| self.state(e)).collect();

        let changed = match &self.last {
            Some(last) if last.len() == entries.len() => entries
                .iter()
                .filter(|e| last[e.index] != states[e.index])
                .copied()
                .collect(),
            _ => entries.clone(),
        };
        trace!(reported = changed.len(), "intersection: observed");
        self.last = Some(states);
        changed
    }
}

// ---------------------------------------------------------------------------
// PanelTracker
// ---------------------------------------------------------------------------

struct PanelInner {
    intersecting: Vec<bool>,
    active_index: usize,
    disconnected: bool,
}

/// Tracks the active project panel.
pub struct PanelTracker {
    inner: RefCell<PanelInner>,
    on_change: RefCell<Box<dyn FnMut(usize)>>,
}

impl PanelTracker {
    /// Track `count` panels, with panel 0 initially active.
    pub fn observe(count: usize, on_change: impl FnMut(usize) + 'static) -> Self {
        debug!(count, "panels: observing");
        Self {
            inner: RefCell::new(PanelInner {
                intersecting: vec![false; count],
                active_index: 0,
                disconnected: false,
            }),
            on_change: RefCell::new(Box::new(on_change)),
        }
    }

    /// Apply one observation batch.
    pub fn apply_batch(&self, entries: &[IntersectionEntry]) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            if inner.disconnected {
                return;
            }
            let before = inner.active_index;
            for entry in entries {
                let Some(state) = inner.intersecting.get_mut(entry.index) else {
                    trace!(index = entry.index, "panels: entry out of range");
                    continue;
                };
                *state = entry.is_intersecting;
                if entry.is_intersecting {
                    inner.active_index = entry.index;
                }
            }
            (inner.active_index != before).then_some(inner.active_index)
        };
        if let Some(index) = changed {
            debug!(index, "panels: active panel changed");
            let callback = &mut *self.on_change.borrow_mut();
            callback(index);
        }
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.inner.borrow().active_index
    }

    /// Last reported state of panel `index`.
    #[must_use]
    pub fn is_intersecting(&self, index: usize) -> bool {
        self.inner
            .borrow()
            .intersecting
            .get(index)
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn panel_count(&self) -> usize {
        self.inner.borrow().intersecting.len()
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.inner.borrow().disconnected
    }

    /// Stop tracking. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.inner.borrow_mut();
        if !inner.disconnected {
            inner.disconnected = true;
            debug!("panels: disconnected");
        }
    }
}

// ---------------------------------------------------------------------------
// SectionTracker
// ---------------------------------------------------------------------------

struct SectionInner {
    active: bool,
    disconnected: bool,
}

/// Toggles the section-active marker for a single observed container.
pub struct SectionTracker {
    env: Rc<dyn Environment>,
    threshold: f64,
    inner: RefCell<SectionInner>,
    on_change: RefCell<Box<dyn FnMut(bool)>>,
}

impl SectionTracker {
    pub fn observe(
        env: Rc<dyn Environment>,
        threshold: f64,
        on_change: impl FnMut(bool) + 'static,
    ) -> Self {
        debug!(threshold, "section: observing");
        Self {
            env,
            threshold,
            inner: RefCell::new(SectionInner {
                active: false,
                disconnected: false,
            }),
            on_change: RefCell::new(Box::new(on_change)),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Apply a batch; only the latest entry counts.
    pub fn apply_batch(&self, entries: &[IntersectionEntry]) {
        if let Some(entry) = entries.last() {
            self.apply(entry);
        }
    }

    pub fn apply(&self, entry: &IntersectionEntry) {
        let active = entry.is_intersecting;
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disconnected || inner.active == active {
                return;
            }
            inner.active = active;
        }
        if active {
            self.env.set_marker(SECTION_ACTIVE_MARKER);
        } else {
            self.env.clear_marker(SECTION_ACTIVE_MARKER);
        }
        debug!(active, ratio = entry.ratio, "section: active changed");
        let callback = &mut *self.on_change.borrow_mut();
        callback(active);
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    /// Stop tracking and clear the marker. Idempotent.
    pub fn disconnect(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disconnected {
                return;
            }
            inner.disconnected = true;
            inner.active = false;
        }
        self.env.clear_marker(SECTION_ACTIVE_MARKER);
        debug!("section: disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MarkerSet;
    use pretty_assertions::assert_eq;

    fn entry(index: usize, is_intersecting: bool) -> IntersectionEntry {
        IntersectionEntry {
            index,
            is_intersecting,
            ratio: if is_intersecting { 1.0 } else { 0.0 },
        }
    }

    fn panels(count: usize) -> (Rc<RefCell<Vec<usize>>>, PanelTracker) {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        let tracker = PanelTracker::observe(count, move |i| sink.borrow_mut().push(i));
        (changes, tracker)
    }

    #[test]
    fn parses_margin_shorthand() {
        let margin: RootMargin = RootMargin::PANEL_DEFAULT.parse().unwrap();
        assert_eq!(margin.top, Length::Percent(-35.0));
        assert_eq!(margin.right, Length::Px(0.0));
        assert_eq!(margin.bottom, Length::Percent(-55.0));
        assert_eq!(margin.to_string(), "-35% 0px -55% 0px");

        let two: RootMargin = "10px 5%".parse().unwrap();
        assert_eq!(two.bottom, Length::Px(10.0));
        assert_eq!(two.left, Length::Percent(5.0));
        let three: RootMargin = "1px 2px 3px".parse().unwrap();
        assert_eq!(three.left, Length::Px(2.0));
        assert_eq!("0".parse::<RootMargin>(), Ok(RootMargin::ZERO));
    }

    #[test]
    fn rejects_bad_margins() {
        assert_eq!("".parse::<RootMargin>(), Err(RootMarginError::Empty));
        assert_eq!(
            "1px 1px 1px 1px 1px".parse::<RootMargin>(),
            Err(RootMarginError::TooManyValues(5))
        );
        assert_eq!(
            "-35% 2em".parse::<RootMargin>(),
            Err(RootMarginError::InvalidLength("2em".into()))
        );
        assert!("px".parse::<RootMargin>().is_err());
    }

    #[test]
    fn panel_margin_shrinks_to_central_band() {
        let margin: RootMargin = RootMargin::PANEL_DEFAULT.parse().unwrap();
        let root = margin.apply(Rect::from_size(1000.0, 1000.0));
        assert_eq!(root.y, 350.0);
        assert_eq!(root.width, 1000.0);
        assert!((root.height - 100.0).abs() < 1e-9);
    }

    #[test]
    fn last_intersecting_entry_wins() {
        let (changes, tracker) = panels(3);
        tracker.apply_batch(&[entry(0, true), entry(1, false), entry(2, true)]);
        assert_eq!(tracker.active_index(), 2);
        assert!(tracker.is_intersecting(0));
        assert_eq!(*changes.borrow(), vec![2]);
    }

    #[test]
    fn unchanged_index_does_not_notify() {
        let (changes, tracker) = panels(3);
        tracker.apply_batch(&[entry(0, true)]);
        tracker.apply_batch(&[entry(1, true), entry(0, true)]);
        tracker.apply_batch(&[entry(1, false)]);
        assert!(changes.borrow().is_empty());
        assert_eq!(tracker.active_index(), 0);
        assert!(!tracker.is_intersecting(1));
    }

    #[test]
    fn out_of_range_and_disconnected_batches_are_ignored() {
        let (changes, tracker) = panels(2);
        tracker.apply_batch(&[entry(7, true)]);
        assert_eq!(tracker.active_index(), 0);
        tracker.disconnect();
        tracker.disconnect();
        tracker.apply_batch(&[entry(1, true)]);
        assert_eq!(tracker.active_index(), 0);
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn geometric_observer_reports_changes_only() {
        let margin: RootMargin = RootMargin::PANEL_DEFAULT.parse().unwrap();
        let mut observer = GeometricObserver::new(margin, 0.0);
        let viewport = Rect::from_size(1000.0, 1000.0);
        let panel = |top: f64| Rect::new(0.0, top, 1000.0, 800.0);

        let first = observer.observe(viewport, &[panel(0.0), panel(800.0), panel(1600.0)]);
        assert_eq!(
            first.iter().map(|e| e.is_intersecting).collect::<Vec<_>>(),
            vec![true, false, false]
        );
        assert!(observer.observe(viewport, &[panel(-10.0), panel(790.0), panel(1590.0)]).is_empty());

        let moved = observer.observe(viewport, &[panel(-500.0), panel(300.0), panel(1100.0)]);
        assert_eq!(
            moved.iter().map(|e| (e.index, e.is_intersecting)).collect::<Vec<_>>(),
            vec![(0, false), (1, true)]
        );
    }

    #[test]
    fn partial_overlap_still_intersects() {
        let root = Rect::from_size(1000.0, 1000.0);
        let entries = compute_entries(&root, &[Rect::new(0.0, 900.0, 1000.0, 1000.0)]);
        assert!(entries[0].is_intersecting);
        assert!((entries[0].ratio - 0.1).abs() < 1e-9);
        let apart = compute_entries(&root, &[Rect::new(0.0, 1200.0, 1000.0, 1000.0)]);
        assert_eq!(apart[0].is_intersecting, false);
    }

    #[test]
    fn geometric_observer_reports_threshold_crossings() {
        let mut observer = GeometricObserver::new(RootMargin::default(), 0.2);
        let viewport = Rect::from_size(1000.0, 1000.0);
        let section = |top: f64| [Rect::new(0.0, top, 1000.0, 1000.0)];

        assert_eq!(observer.observe(viewport, &section(500.0)).len(), 1);
        assert!(observer.observe(viewport, &section(600.0)).is_empty());
        let below = observer.observe(viewport, &section(850.0));
        assert_eq!(below.len(), 1);
        assert!(below[0].is_intersecting);
        assert!(below[0].ratio < 0.2);
        let gone = observer.observe(viewport, &section(1100.0));
        assert_eq!(gone.len(), 1);
        assert!(!gone[0].is_intersecting);
    }

    #[test]
    fn section_marker_follows_intersection() {
        let env = Rc::new(MarkerSet::new());
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        let section = SectionTracker::observe(env.clone(), 0.2, move |a| sink.borrow_mut().push(a));

        let seen = |ratio: f64| IntersectionEntry {
            index: 0,
            is_intersecting: ratio > 0.0,
            ratio,
        };
        section.apply_batch(&[seen(0.0), seen(0.5)]);
        assert!(env.has_marker(SECTION_ACTIVE_MARKER));
        section.apply(&seen(0.19));
        assert!(env.has_marker(SECTION_ACTIVE_MARKER));
        section.apply(&seen(0.0));
        assert!(!section.is_active());
        assert_eq!(*changes.borrow(), vec![true, false]);
    }

    #[test]
    fn section_disconnect_clears_marker_once() {
        let env = Rc::new(MarkerSet::new());
        let section = SectionTracker::observe(env.clone(), 0.2, |_| {});
        section.apply(&entry(0, true));
        env.clear_log();
        section.disconnect();
        section.disconnect();
        section.apply(&entry(0, true));
        assert_eq!(env.marker_writes(SECTION_ACTIVE_MARKER), 1);
        assert!(!env.has_marker(SECTION_ACTIVE_MARKER));
    }

    #[test]
    fn trackers_run_side_by_side() {
        let env = Rc::new(MarkerSet::new());
        let (changes, panels) = panels(3);
        let section = SectionTracker::observe(env.clone(), 0.2, |_| {});
        section.apply(&entry(0, true));
        panels.apply_batch(&[entry(1, true)]);
        section.disconnect();
        panels.apply_batch(&[entry(2, true)]);
        assert_eq!(*changes.borrow(), vec![1, 2]);
        assert!(!env.has_marker(SECTION_ACTIVE_MARKER));
    }
}
