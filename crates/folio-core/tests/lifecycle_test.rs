//! End-to-end mount/unmount of every component against one manual host.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use folio_core::env::{
    CURSOR_VISIBLE_MARKER, LOADING_MARKER, MarkerSet, RecordedStyle, SECTION_ACTIVE_MARKER,
};
use folio_core::geometry::Rect;
use folio_core::intersection::GeometricObserver;
use folio_core::readiness::{Condition, Readiness, ReadinessListener};
use folio_core::sequencer::{Entity, Phase, PhaseSink, PhaseTiming, Sequencer};
use folio_core::smooth_scroll::{LerpEngine, ScrollSink};
use folio_core::{
    FolioConfig, ManualHost, NavController, NavLink, PanelTracker, PointerCursor, SectionTracker,
    SmoothScroll, Teardown,
};
use pretty_assertions::assert_eq;

struct Quiet;

impl PhaseSink for Quiet {
    fn phase_started(&mut self, _: Entity, _: Phase, _: &PhaseTiming, _: &[Duration]) {}
}

/// Forwards readiness to the sequencer the way the page host wires them.
struct ToSequencer(Rc<Sequencer>);

impl ReadinessListener for ToSequencer {
    fn on_ready(&mut self, _progress: u8) {
        self.0.play_exit();
    }
}

#[derive(Clone, Default)]
struct Window(Rc<Cell<f64>>);

impl ScrollSink for Window {
    fn write_scroll(&mut self, y: f64) {
        self.0.set(y);
    }
}

#[test]
fn full_page_lifecycle_leaves_nothing_behind() {
    let config = FolioConfig::default();
    let host = Rc::new(ManualHost::new());
    let env = Rc::new(MarkerSet::new());
    let overlay = Rc::new(RecordedStyle::new());
    let teardown = Teardown::new();

    // Loader.
    let finished = Rc::new(Cell::new(0));
    let finished_count = Rc::clone(&finished);
    let sequencer = Rc::new(Sequencer::new(
        host.clone(),
        overlay.clone(),
        config.sequencer(),
        Quiet,
        move || finished_count.set(finished_count.get() + 1),
    ));
    sequencer.play_entrance();
    let readiness = Rc::new(Readiness::start(
        host.clone(),
        env.clone(),
        config.readiness(),
        ToSequencer(Rc::clone(&sequencer)),
    ));
    {
        let sequencer = Rc::clone(&sequencer);
        teardown.push(move || sequencer.stop());
        let readiness = Rc::clone(&readiness);
        teardown.push(move || readiness.cancel());
    }

    // Smooth scroll and nav.
    let window = Window::default();
    let anchors = HashMap::from([("about-section".to_owned(), 1800.0)]);
    let engine = LerpEngine::new(config.scroll.clone(), anchors, window.clone(), 0.0, 6000.0);
    let scroll = Rc::new(SmoothScroll::create(host.clone(), engine));
    let context = scroll.context();
    let hidden = Rc::new(RefCell::new(Vec::new()));
    let hidden_log = Rc::clone(&hidden);
    let nav = Rc::new(NavController::start(host.clone(), config.nav(), 0.0, move |h| {
        hidden_log.borrow_mut().push(h)
    }));
    {
        let scroll = Rc::clone(&scroll);
        teardown.push(move || scroll.destroy());
        let nav = Rc::clone(&nav);
        teardown.push(move || nav.stop());
    }

    // Cursor.
    let cursor = Rc::new(PointerCursor::start(
        host.clone(),
        env.clone(),
        Rc::new(RecordedStyle::new()),
        Rc::new(RecordedStyle::new()),
        Rect::from_size(1280.0, 800.0),
        config.cursor(),
        |_| {},
    ));
    {
        let cursor = Rc::clone(&cursor);
        teardown.push(move || cursor.stop());
    }

    // Panels and section.
    let viewport = Rect::from_size(1000.0, 1000.0);
    let mut panel_observer = GeometricObserver::new(config.panel_root_margin().unwrap(), 0.0);
    let mut section_observer =
        GeometricObserver::new(Default::default(), config.section_threshold);
    let active = Rc::new(RefCell::new(Vec::new()));
    let active_log = Rc::clone(&active);
    let panels = Rc::new(PanelTracker::observe(3, move |i| active_log.borrow_mut().push(i)));
    let section = Rc::new(SectionTracker::observe(
        env.clone(),
        config.section_threshold,
        |_| {},
    ));
    {
        let panels = Rc::clone(&panels);
        teardown.push(move || panels.disconnect());
        let section = Rc::clone(&section);
        teardown.push(move || section.disconnect());
    }

    // Loading.
    assert!(env.has_marker(LOADING_MARKER));
    host.run_frames(30, ManualHost::FRAME_INTERVAL);
    readiness.resolve(Condition::FontsLoaded);
    readiness.resolve(Condition::DocumentLoaded);
    host.advance(Duration::from_millis(600));
    assert!(readiness.state().has_finished);
    assert!(!env.has_marker(LOADING_MARKER));

    // Exit animation runs to completion on the host clock.
    host.advance(Duration::from_secs(3));
    assert_eq!(finished.get(), 1);
    assert_eq!(overlay.get("opacity").as_deref(), Some("0"));

    // Interaction.
    cursor.pointer_move(640.0, 400.0);
    assert!(env.has_marker(CURSOR_VISIBLE_MARKER));
    assert!(NavLink::About.navigate(&context));
    host.run_frames(120, ManualHost::FRAME_INTERVAL);
    assert_eq!(window.0.get(), 1800.0);
    nav.on_scroll(window.0.get());
    host.frame();
    assert_eq!(*hidden.borrow(), vec![true]);

    let panel_rects = [
        Rect::new(0.0, -600.0, 1000.0, 800.0),
        Rect::new(0.0, 200.0, 1000.0, 800.0),
        Rect::new(0.0, 1000.0, 1000.0, 800.0),
    ];
    panels.apply_batch(&panel_observer.observe(viewport, &panel_rects));
    assert_eq!(panels.active_index(), 1);
    section.apply_batch(&section_observer.observe(viewport, &[Rect::new(0.0, 100.0, 1000.0, 2400.0)]));
    assert!(env.has_marker(SECTION_ACTIVE_MARKER));

    // Unmount, twice.
    teardown.dispose();
    env.clear_log();
    teardown.dispose();
    assert!(env.ops().is_empty());
    assert_eq!(host.pending_frames(), 0);
    assert_eq!(host.pending_timers(), 0);
    assert!(!env.has_marker(SECTION_ACTIVE_MARKER));
    assert!(!context.is_ready());
    assert!(!NavLink::Home.navigate(&context));

    host.run_frames(10, ManualHost::FRAME_INTERVAL);
    assert_eq!(finished.get(), 1);
    assert_eq!(*active.borrow(), vec![1]);
}

#[test]
fn unmount_during_loading_is_clean() {
    let host = Rc::new(ManualHost::new());
    let env = Rc::new(MarkerSet::new());
    let overlay = Rc::new(RecordedStyle::new());
    let sequencer = Rc::new(Sequencer::new(
        host.clone(),
        overlay.clone(),
        Default::default(),
        Quiet,
        || panic!("exit must not complete after unmount"),
    ));
    sequencer.play_entrance();
    let readiness = Readiness::start(
        host.clone(),
        env.clone(),
        Default::default(),
        ToSequencer(Rc::clone(&sequencer)),
    );
    host.run_frames(5, ManualHost::FRAME_INTERVAL);

    readiness.cancel();
    sequencer.stop();
    readiness.cancel();
    sequencer.stop();

    assert_eq!(host.pending_frames(), 0);
    assert_eq!(host.pending_timers(), 0);
    assert!(env.markers().is_empty());
    host.advance(Duration::from_secs(30));
    assert_eq!(overlay.writes(), 0);
}
