#![forbid(unsafe_code)]

//! Document-level marker and element style capabilities.
//!
//! Components never reach for `document.body` themselves. They receive an
//! [`Environment`] (body class list plus body inline properties) and, where
//! they animate a specific element, a [`StyleTarget`]. [`MarkerSet`] and
//! [`RecordedStyle`] are in-memory implementations that also keep a log of
//! every write so tests can assert on side effects.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

/// Marker set while the loading overlay is up.
pub const LOADING_MARKER: &str = "is-loading";
/// Marker set once the first pointer move is seen.
pub const CURSOR_VISIBLE_MARKER: &str = "cursor-visible";
/// Marker set while the projects section dominates the viewport.
pub const SECTION_ACTIVE_MARKER: &str = "projects-section-active";

/// Document-level state toggled by the components.
pub trait Environment {
    /// Add a marker (class) to the document. Adding twice is harmless.
    fn set_marker(&self, name: &str);
    /// Remove a marker from the document.
    fn clear_marker(&self, name: &str);
    /// Override a document-level style property.
    fn set_property(&self, name: &str, value: &str);
    /// Remove a document-level style override.
    fn clear_property(&self, name: &str);
}

/// Inline style writer for one element.
pub trait StyleTarget {
    fn set_style(&self, property: &str, value: &str);
}

/// One recorded write against a [`MarkerSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOp {
    SetMarker(String),
    ClearMarker(String),
    SetProperty(String, String),
    ClearProperty(String),
}

/// In-memory [`Environment`] with a write log.
#[derive(Debug, Default)]
pub struct MarkerSet {
    markers: RefCell<BTreeSet<String>>,
    properties: RefCell<BTreeMap<String, String>>,
    log: RefCell<Vec<EnvOp>>,
}

impl MarkerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is currently set.
    #[must_use]
    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.borrow().contains(name)
    }

    /// Current value of a property override.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.borrow().get(name).cloned()
    }

    /// Currently set markers, sorted.
    #[must_use]
    pub fn markers(&self) -> Vec<String> {
        self.markers.borrow().iter().cloned().collect()
    }

    /// Every write so far, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<EnvOp> {
        self.log.borrow().clone()
    }

    /// Number of writes that touched marker `name`.
    #[must_use]
    pub fn marker_writes(&self, name: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|op| match op {
                EnvOp::SetMarker(m) | EnvOp::ClearMarker(m) => m == name,
                _ => false,
            })
            .count()
    }

    /// Forget the write log (state is kept).
    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Environment for MarkerSet {
    fn set_marker(&self, name: &str) {
        self.markers.borrow_mut().insert(name.to_owned());
        self.log.borrow_mut().push(EnvOp::SetMarker(name.to_owned()));
    }

    fn clear_marker(&self, name: &str) {
        self.markers.borrow_mut().remove(name);
        self.log
            .borrow_mut()
            .push(EnvOp::ClearMarker(name.to_owned()));
    }

    fn set_property(&self, name: &str, value: &str) {
        self.properties
            .borrow_mut()
            .insert(name.to_owned(), value.to_owned());
        self.log
            .borrow_mut()
            .push(EnvOp::SetProperty(name.to_owned(), value.to_owned()));
    }

    fn clear_property(&self, name: &str) {
        self.properties.borrow_mut().remove(name);
        self.log
            .borrow_mut()
            .push(EnvOp::ClearProperty(name.to_owned()));
    }
}

/// In-memory [`StyleTarget`] keeping the latest value per property.
#[derive(Debug, Default)]
pub struct RecordedStyle {
    styles: RefCell<BTreeMap<String, String>>,
    writes: Cell<usize>,
}

impl RecordedStyle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<String> {
        self.styles.borrow().get(property).cloned()
    }

    /// Total number of `set_style` calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl StyleTarget for RecordedStyle {
    fn set_style(&self, property: &str, value: &str) {
        self.styles
            .borrow_mut()
            .insert(property.to_owned(), value.to_owned());
        self.writes.set(self.writes.get() + 1);
    }
}
