#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the page.
//!
//! Implements the core capability traits on `web-sys` and wraps each
//! component's mount/unmount in [`FolioInteractions`]. Only compiled on
//! `wasm32` targets.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use js_sys::{Array, Function, Object, Promise, Reflect};
use tracing::{debug, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    AddEventListenerOptions, Document, Element, Event, EventTarget, HtmlElement,
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, MouseEvent, Node,
    WheelEvent, Window,
};
use web_time::Instant;

use folio_core::cursor::{PointerCursor, ZoneNode};
use folio_core::env::{Environment, StyleTarget};
use folio_core::geometry::Rect;
use folio_core::intersection::{IntersectionEntry, PanelTracker, SectionTracker};
use folio_core::nav::{NavController, NavLink};
use folio_core::readiness::{Condition, Readiness, ReadinessHandle, ReadinessListener};
use folio_core::runtime::{FrameCallback, FrameId, Host, TimerCallback, TimerId};
use folio_core::sequencer::{Entity, Phase, PhaseSink, PhaseTiming, Sequencer};
use folio_core::smooth_scroll::{
    AnchorResolver, InputSource, LerpEngine, ScrollContext, ScrollEngine, ScrollSink,
    ScrollTarget, SmoothScroll,
};
use folio_core::{FolioConfig, Teardown};

use crate::{
    CURSOR_ATTRIBUTE, INDEX_ATTRIBUTE, entity_name, events, is_interactive_tag, parse_config,
    parse_panel_index, phase_name, scroll_limit, wheel_delta_px,
};

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = match info.location() {
                Some(loc) => format!("folio panic at {}:{}: {info}", loc.file(), loc.line()),
                None => format!("folio panic: {info}"),
            };
            console_error(&msg);
        }));
    });
}

fn set_js(obj: &Object, key: &str, value: JsValue) {
    let _ = Reflect::set(obj, &JsValue::from_str(key), &value);
}

fn notify(callback: &Function, value: JsValue) {
    if let Err(err) = callback.call1(&JsValue::NULL, &value) {
        warn!(?err, "page callback threw");
    }
}

fn js_ms(d: Duration) -> JsValue {
    JsValue::from_f64(d.as_secs_f64() * 1000.0)
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

struct Scheduled<F: ?Sized> {
    handle: i32,
    closure: Closure<F>,
}

/// `requestAnimationFrame` / `setTimeout` host.
///
/// A callback's closure is retired (not dropped) when it fires and freed at
/// the start of the next callback, once it is no longer on the stack.
struct BrowserHost {
    window: Window,
    origin: Instant,
    this: Weak<BrowserHost>,
    next_id: Cell<u64>,
    frames: RefCell<HashMap<u64, Scheduled<dyn FnMut(f64)>>>,
    timers: RefCell<HashMap<u64, Scheduled<dyn FnMut()>>>,
    retired_frames: RefCell<Vec<Closure<dyn FnMut(f64)>>>,
    retired_timers: RefCell<Vec<Closure<dyn FnMut()>>>,
}

impl BrowserHost {
    fn new(window: Window) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            window,
            origin: Instant::now(),
            this: this.clone(),
            next_id: Cell::new(0),
            frames: RefCell::new(HashMap::new()),
            timers: RefCell::new(HashMap::new()),
            retired_frames: RefCell::new(Vec::new()),
            retired_timers: RefCell::new(Vec::new()),
        })
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn flush_retired(&self) {
        self.retired_frames.borrow_mut().clear();
        self.retired_timers.borrow_mut().clear();
    }
}

impl Host for BrowserHost {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let id = self.next_id();
        let this = self.this.clone();
        let mut callback = Some(callback);
        let closure = Closure::<dyn FnMut(f64)>::new(move |_timestamp: f64| {
            let Some(host) = this.upgrade() else {
                return;
            };
            host.flush_retired();
            if let Some(done) = host.frames.borrow_mut().remove(&id) {
                host.retired_frames.borrow_mut().push(done.closure);
            }
            if let Some(callback) = callback.take() {
                callback(host.now());
            }
        });
        match self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
        {
            Ok(handle) => {
                self.frames
                    .borrow_mut()
                    .insert(id, Scheduled { handle, closure });
            }
            Err(err) => warn!(?err, "requestAnimationFrame failed"),
        }
        FrameId(id)
    }

    fn cancel_frame(&self, id: FrameId) {
        let scheduled = self.frames.borrow_mut().remove(&id.0);
        if let Some(scheduled) = scheduled {
            let _ = self.window.cancel_animation_frame(scheduled.handle);
        }
    }

    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = self.next_id();
        let this = self.this.clone();
        let mut callback = Some(callback);
        let closure = Closure::<dyn FnMut()>::new(move || {
            let Some(host) = this.upgrade() else {
                return;
            };
            host.flush_retired();
            if let Some(done) = host.timers.borrow_mut().remove(&id) {
                host.retired_timers.borrow_mut().push(done.closure);
            }
            if let Some(callback) = callback.take() {
                callback();
            }
        });
        let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                ms,
            ) {
            Ok(handle) => {
                self.timers
                    .borrow_mut()
                    .insert(id, Scheduled { handle, closure });
            }
            Err(err) => warn!(?err, "setTimeout failed"),
        }
        TimerId(id)
    }

    fn clear_timeout(&self, id: TimerId) {
        let scheduled = self.timers.borrow_mut().remove(&id.0);
        if let Some(scheduled) = scheduled {
            self.window.clear_timeout_with_handle(scheduled.handle);
        }
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        for (_, scheduled) in self.frames.get_mut().drain() {
            let _ = self.window.cancel_animation_frame(scheduled.handle);
        }
        for (_, scheduled) in self.timers.get_mut().drain() {
            self.window.clear_timeout_with_handle(scheduled.handle);
        }
    }
}

// ---------------------------------------------------------------------------
// Document capabilities
// ---------------------------------------------------------------------------

/// Markers are classes on `<body>`; properties are its inline style.
struct BodyEnvironment {
    body: HtmlElement,
}

impl Environment for BodyEnvironment {
    fn set_marker(&self, name: &str) {
        let _ = self.body.class_list().add_1(name);
    }

    fn clear_marker(&self, name: &str) {
        let _ = self.body.class_list().remove_1(name);
    }

    fn set_property(&self, name: &str, value: &str) {
        let _ = self.body.style().set_property(name, value);
    }

    fn clear_property(&self, name: &str) {
        let _ = self.body.style().remove_property(name);
    }
}

struct ElementStyle(HtmlElement);

impl StyleTarget for ElementStyle {
    fn set_style(&self, property: &str, value: &str) {
        let _ = self.0.style().set_property(property, value);
    }
}

#[derive(Clone)]
struct DomNode(Element);

impl ZoneNode for DomNode {
    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(DomNode)
    }

    fn cursor_tag(&self) -> Option<String> {
        self.0.get_attribute(CURSOR_ATTRIBUTE)
    }

    fn is_interactive(&self) -> bool {
        is_interactive_tag(&self.0.tag_name())
    }
}

/// The element an event target stands for; text nodes map to their parent.
fn dom_node(target: Option<EventTarget>) -> Option<DomNode> {
    match target?.dyn_into::<Element>() {
        Ok(element) => Some(DomNode(element)),
        Err(other) => other.dyn_into::<Node>().ok()?.parent_element().map(DomNode),
    }
}

struct WindowScrollSink(Window);

impl ScrollSink for WindowScrollSink {
    fn write_scroll(&mut self, y: f64) {
        self.0.scroll_to_with_x_and_y(0.0, y);
    }
}

struct DocumentAnchors {
    window: Window,
    document: Document,
}

impl AnchorResolver for DocumentAnchors {
    fn resolve(&self, anchor: &str) -> Option<f64> {
        let element = self.document.get_element_by_id(anchor)?;
        let scrolled = self.window.scroll_y().unwrap_or(0.0);
        Some(element.get_bounding_client_rect().top() + scrolled)
    }
}

fn viewport_size(window: &Window) -> (f64, f64) {
    let read = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    (read(window.inner_width()), read(window.inner_height()))
}

fn page_scroll_limit(window: &Window, document: &Document) -> f64 {
    let height = document
        .document_element()
        .map_or(0.0, |root| f64::from(root.scroll_height()));
    scroll_limit(height, viewport_size(window).1)
}

/// [`LerpEngine`] bound to the window, tracking document height and native
/// scrolling (keyboard, scrollbar) between eased scrolls.
struct PageEngine {
    inner: LerpEngine<DocumentAnchors, WindowScrollSink>,
    window: Window,
    document: Document,
}

impl PageEngine {
    fn refresh(&mut self) {
        self.inner
            .set_limit(page_scroll_limit(&self.window, &self.document));
        if !self.inner.is_animating() {
            if let Ok(y) = self.window.scroll_y() {
                self.inner.sync(y);
            }
        }
    }
}

impl ScrollEngine for PageEngine {
    fn raf(&mut self, now: Duration) {
        if self.inner.is_animating() {
            self.inner.raf(now);
        } else if let Ok(y) = self.window.scroll_y() {
            if y != self.inner.scroll_y() {
                self.inner.sync(y);
            }
        }
    }

    fn scroll_to(&mut self, target: &ScrollTarget) {
        self.refresh();
        self.inner.scroll_to(target);
    }

    fn on_wheel(&mut self, delta_y: f64, source: InputSource) -> bool {
        self.refresh();
        self.inner.on_wheel(delta_y, source)
    }

    fn scroll_y(&self) -> f64 {
        self.inner.scroll_y()
    }

    fn destroy(&mut self) {
        self.inner.destroy();
    }
}

// ---------------------------------------------------------------------------
// Listener and observer plumbing
// ---------------------------------------------------------------------------

/// Subscribe `handler` and register the matching unsubscribe in `teardown`.
fn listen(
    teardown: &Teardown,
    target: &EventTarget,
    event: &'static str,
    passive: bool,
    handler: impl FnMut(Event) + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    let options = AddEventListenerOptions::new();
    Reflect::set(&options, &"passive".into(), &JsValue::from_bool(passive))?;
    target.add_event_listener_with_callback_and_add_event_listener_options(
        event,
        closure.as_ref().unchecked_ref(),
        &options,
    )?;
    let target = target.clone();
    teardown.push(move || {
        let _ = target.remove_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
        drop(closure);
    });
    Ok(())
}

type ObserverCallback = Closure<dyn FnMut(Array, IntersectionObserver)>;

/// How an observer entry finds its index.
#[derive(Clone, Copy)]
enum EntryIndex {
    /// The `data-index` attribute; entries without a valid one are skipped.
    Attribute,
    /// Position in the registered target list.
    Position,
}

fn observe_intersections(
    teardown: &Teardown,
    targets: &[Element],
    index_by: EntryIndex,
    root_margin: &str,
    threshold: f64,
    mut on_batch: impl FnMut(Vec<IntersectionEntry>) + 'static,
) -> Result<(), JsValue> {
    let registered = targets.to_vec();
    let callback: ObserverCallback = Closure::new(move |entries: Array, _: IntersectionObserver| {
        let batch = entries
            .iter()
            .filter_map(|value| value.dyn_into::<IntersectionObserverEntry>().ok())
            .filter_map(|entry| {
                let target = entry.target();
                let index = match index_by {
                    EntryIndex::Attribute => {
                        parse_panel_index(target.get_attribute(INDEX_ATTRIBUTE).as_deref())
                    }
                    EntryIndex::Position => registered.iter().position(|r| *r == target),
                };
                let Some(index) = index else {
                    trace!("intersection: entry without index skipped");
                    return None;
                };
                Some(IntersectionEntry {
                    index,
                    is_intersecting: entry.is_intersecting(),
                    ratio: entry.intersection_ratio(),
                })
            })
            .collect();
        on_batch(batch);
    });

    let init: IntersectionObserverInit = Object::new().unchecked_into();
    Reflect::set(&init, &"rootMargin".into(), &JsValue::from_str(root_margin))?;
    Reflect::set(&init, &"threshold".into(), &JsValue::from_f64(threshold))?;
    let observer = IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)?;
    for target in targets {
        observer.observe(target);
    }
    teardown.push(move || {
        observer.disconnect();
        drop(callback);
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Page-facing adapters
// ---------------------------------------------------------------------------

struct PageReadiness {
    sequencer: Rc<Sequencer>,
    on_progress: Function,
    on_ready: Function,
}

impl ReadinessListener for PageReadiness {
    fn on_progress(&mut self, progress: u8) {
        notify(&self.on_progress, JsValue::from(progress));
    }

    fn on_ready(&mut self, progress: u8) {
        notify(&self.on_ready, JsValue::from(progress));
        self.sequencer.play_exit();
    }
}

struct PagePhases(Option<Function>);

impl PhaseSink for PagePhases {
    fn phase_started(
        &mut self,
        entity: Entity,
        phase: Phase,
        timing: &PhaseTiming,
        child_offsets: &[Duration],
    ) {
        let Some(callback) = &self.0 else {
            return;
        };
        let payload = Object::new();
        set_js(&payload, "entity", entity_name(entity).into());
        set_js(&payload, "phase", phase_name(phase).into());
        set_js(&payload, "durationMs", js_ms(timing.duration));
        let offsets: Array = child_offsets.iter().copied().map(js_ms).collect();
        set_js(&payload, "childOffsetsMs", offsets.into());
        notify(callback, payload.into());
    }
}

/// Resolve the font and document conditions from the browser.
fn watch_page_load(
    teardown: &Teardown,
    window: &Window,
    document: &Document,
    readiness: &Rc<ReadinessHandle>,
) -> Result<(), JsValue> {
    let fonts_ready = Reflect::get(document, &"fonts".into())
        .ok()
        .filter(|fonts| !fonts.is_undefined())
        .and_then(|fonts| Reflect::get(&fonts, &"ready".into()).ok())
        .and_then(|ready| ready.dyn_into::<Promise>().ok());
    match fonts_ready {
        Some(promise) => {
            let weak = Rc::downgrade(readiness);
            spawn_local(async move {
                let _ = JsFuture::from(promise).await;
                if let Some(readiness) = weak.upgrade() {
                    readiness.resolve(Condition::FontsLoaded);
                }
            });
        }
        None => readiness.resolve(Condition::FontsLoaded),
    }

    if document.ready_state() == "complete" {
        readiness.resolve(Condition::DocumentLoaded);
    } else {
        let weak = Rc::downgrade(readiness);
        listen(teardown, window.as_ref(), events::LOAD, true, move |_| {
            if let Some(readiness) = weak.upgrade() {
                readiness.resolve(Condition::DocumentLoaded);
            }
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FolioInteractions
// ---------------------------------------------------------------------------

/// Mounts the page's interaction components and releases them on unmount.
#[wasm_bindgen]
pub struct FolioInteractions {
    teardown: Teardown,
    config: FolioConfig,
    scroll: ScrollContext,
    env: Rc<BodyEnvironment>,
    host: Rc<BrowserHost>,
    window: Window,
    document: Document,
}

#[wasm_bindgen]
impl FolioInteractions {
    /// Create from an optional JSON option object (camelCase keys).
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<FolioInteractions, JsValue> {
        install_panic_hook();
        let config =
            parse_config(config_json.as_deref()).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let body = document
            .body()
            .ok_or_else(|| JsValue::from_str("no document body"))?;
        debug!("folio: created");
        Ok(Self {
            teardown: Teardown::new(),
            config,
            scroll: ScrollContext::default(),
            env: Rc::new(BodyEnvironment { body }),
            host: BrowserHost::new(window.clone()),
            window,
            document,
        })
    }

    /// Start the loader: readiness, progress estimate and the letter/counter
    /// animation. `onPhase` receives `{ entity, phase, durationMs,
    /// childOffsetsMs }` at each phase start.
    #[wasm_bindgen(js_name = mountLoader)]
    pub fn mount_loader(
        &mut self,
        overlay: HtmlElement,
        on_progress: Function,
        on_ready: Function,
        on_finish: Function,
        on_phase: Option<Function>,
    ) -> Result<(), JsValue> {
        let sequencer = Rc::new(Sequencer::new(
            self.host.clone(),
            Rc::new(ElementStyle(overlay)),
            self.config.sequencer(),
            PagePhases(on_phase),
            move || {
                if let Err(err) = on_finish.call0(&JsValue::NULL) {
                    warn!(?err, "onFinish threw");
                }
            },
        ));
        let readiness = Rc::new(Readiness::start(
            self.host.clone(),
            self.env.clone(),
            self.config.readiness(),
            PageReadiness {
                sequencer: Rc::clone(&sequencer),
                on_progress,
                on_ready,
            },
        ));
        {
            let sequencer = Rc::clone(&sequencer);
            self.teardown.push(move || sequencer.stop());
            let readiness = Rc::clone(&readiness);
            self.teardown.push(move || readiness.cancel());
        }
        sequencer.play_entrance();
        watch_page_load(&self.teardown, &self.window, &self.document, &readiness)
    }

    /// Start the trailing cursor on the given dot and ring elements.
    #[wasm_bindgen(js_name = mountCursor)]
    pub fn mount_cursor(&mut self, dot: HtmlElement, ring: HtmlElement) -> Result<(), JsValue> {
        let (width, height) = viewport_size(&self.window);
        let cursor = Rc::new(PointerCursor::start(
            self.host.clone(),
            self.env.clone(),
            Rc::new(ElementStyle(dot)),
            Rc::new(ElementStyle(ring)),
            Rect::from_size(width, height),
            self.config.cursor(),
            |zone| tracing::trace!(?zone, "folio: cursor zone"),
        ));
        {
            let cursor = Rc::clone(&cursor);
            self.teardown.push(move || cursor.stop());
        }

        let moved = Rc::clone(&cursor);
        listen(&self.teardown, self.window.as_ref(), events::POINTER_MOVE, true, move |event| {
            if let Some(pointer) = event.dyn_ref::<MouseEvent>() {
                moved.pointer_move(f64::from(pointer.client_x()), f64::from(pointer.client_y()));
            }
        })?;
        let over = Rc::clone(&cursor);
        listen(&self.teardown, self.document.as_ref(), events::POINTER_OVER, true, move |event| {
            over.pointer_over(dom_node(event.target()).as_ref());
        })?;
        let out = Rc::clone(&cursor);
        listen(&self.teardown, self.document.as_ref(), events::POINTER_OUT, true, move |event| {
            let to = event
                .dyn_ref::<MouseEvent>()
                .and_then(|pointer| dom_node(pointer.related_target()));
            out.pointer_out(dom_node(event.target()).as_ref(), to.as_ref());
        })
    }

    /// Take over wheel scrolling with the eased engine.
    #[wasm_bindgen(js_name = mountSmoothScroll)]
    pub fn mount_smooth_scroll(&mut self) -> Result<(), JsValue> {
        let start = self.window.scroll_y().unwrap_or(0.0);
        let engine = PageEngine {
            inner: LerpEngine::new(
                self.config.scroll.clone(),
                DocumentAnchors {
                    window: self.window.clone(),
                    document: self.document.clone(),
                },
                WindowScrollSink(self.window.clone()),
                start,
                page_scroll_limit(&self.window, &self.document),
            ),
            window: self.window.clone(),
            document: self.document.clone(),
        };
        let scroll = Rc::new(SmoothScroll::create(self.host.clone(), engine));
        self.scroll.install(&scroll);
        {
            let scroll = Rc::clone(&scroll);
            let context = self.scroll.clone();
            self.teardown.push(move || {
                context.clear();
                scroll.destroy();
            });
        }

        let window = self.window.clone();
        listen(&self.teardown, self.window.as_ref(), events::WHEEL, false, move |event| {
            let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
                return;
            };
            let page = viewport_size(&window).1;
            let delta = wheel_delta_px(wheel.delta_y(), wheel.delta_mode(), page);
            if scroll.on_wheel(delta, InputSource::Wheel) {
                event.prevent_default();
            }
        })
    }

    /// Hide the nav on scroll-down; `onHiddenChange(isHidden)` on change.
    #[wasm_bindgen(js_name = mountNav)]
    pub fn mount_nav(&mut self, on_hidden_change: Function) -> Result<(), JsValue> {
        let nav = Rc::new(NavController::start(
            self.host.clone(),
            self.config.nav(),
            self.window.scroll_y().unwrap_or(0.0),
            move |hidden| notify(&on_hidden_change, JsValue::from_bool(hidden)),
        ));
        {
            let nav = Rc::clone(&nav);
            self.teardown.push(move || nav.stop());
        }
        let window = self.window.clone();
        listen(&self.teardown, self.window.as_ref(), events::SCROLL, true, move |_| {
            nav.on_scroll(window.scroll_y().unwrap_or(0.0));
        })
    }

    /// Track the active project panel; `onActiveChange(index)` on change.
    #[wasm_bindgen(js_name = mountPanels)]
    pub fn mount_panels(&mut self, panels: Array, on_active_change: Function) -> Result<(), JsValue> {
        let elements: Vec<Element> = panels
            .iter()
            .filter_map(|value| value.dyn_into::<Element>().ok())
            .collect();
        let margin = self
            .config
            .panel_root_margin()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let tracker = Rc::new(PanelTracker::observe(elements.len(), move |index| {
            notify(&on_active_change, JsValue::from(index as u32));
        }));
        {
            let tracker = Rc::clone(&tracker);
            self.teardown.push(move || tracker.disconnect());
        }
        observe_intersections(
            &self.teardown,
            &elements,
            EntryIndex::Attribute,
            &margin.to_string(),
            0.0,
            move |batch| tracker.apply_batch(&batch),
        )
    }

    /// Toggle the section-active marker for `section`;
    /// `onActiveChange(isActive)` on change.
    #[wasm_bindgen(js_name = mountSection)]
    pub fn mount_section(&mut self, section: Element, on_active_change: Function) -> Result<(), JsValue> {
        let tracker = Rc::new(SectionTracker::observe(
            self.env.clone(),
            self.config.section_threshold,
            move |active| notify(&on_active_change, JsValue::from_bool(active)),
        ));
        {
            let tracker = Rc::clone(&tracker);
            self.teardown.push(move || tracker.disconnect());
        }
        observe_intersections(
            &self.teardown,
            &[section],
            EntryIndex::Position,
            "0px",
            tracker.threshold(),
            move |batch| tracker.apply_batch(&batch),
        )
    }

    /// Scroll to a nav section by label (`home`, `projects`, `about`,
    /// `contact`). Returns `false` when the label is unknown or the engine
    /// is not mounted.
    pub fn navigate(&self, label: &str) -> bool {
        NavLink::from_label(label).is_some_and(|link| link.navigate(&self.scroll))
    }

    /// Scroll to `"#anchor"` or an offset such as `"0"`.
    #[wasm_bindgen(js_name = scrollTo)]
    pub fn scroll_to(&self, target: &str) -> Result<bool, JsValue> {
        let target: ScrollTarget = target
            .parse()
            .map_err(|e: folio_core::ScrollTargetError| JsValue::from_str(&e.to_string()))?;
        Ok(self.scroll.scroll_to(&target))
    }

    /// Release everything mounted so far. Safe to call repeatedly; later
    /// mounts start a fresh teardown list.
    pub fn unmount(&mut self) {
        std::mem::take(&mut self.teardown).dispose();
        debug!("folio: unmounted");
    }
}
