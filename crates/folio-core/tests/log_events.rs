//! Log output of the components, captured with a `tracing-subscriber` layer.
//!
//! Lifecycle transitions log at DEBUG and anomalies at WARN; decision
//! detail stays at TRACE.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use folio_core::env::MarkerSet;
use folio_core::readiness::{Readiness, ReadinessConfig, ReadinessListener};
use folio_core::smooth_scroll::{LerpEngine, ScrollEngine, ScrollSink, SmoothScrollOptions};
use folio_core::{ManualHost, NavController, ScrollTarget};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    message: String,
    fields: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.message == message)
            .cloned()
            .collect()
    }

    fn levels(&self) -> HashSet<Level> {
        self.events.lock().unwrap().iter().map(|e| e.level).collect()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: fields.get("message").cloned().unwrap_or_default(),
            fields,
        });
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (EventCapture, R) {
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (capture, result)
}

struct Ignore;

impl ReadinessListener for Ignore {
    fn on_ready(&mut self, _progress: u8) {}
}

struct Discard;

impl ScrollSink for Discard {
    fn write_scroll(&mut self, _y: f64) {}
}

#[test]
fn hard_timeout_logs_ready_once() {
    let (logs, ()) = capture(|| {
        let host = Rc::new(ManualHost::new());
        let handle = Readiness::start(
            host.clone(),
            Rc::new(MarkerSet::new()),
            ReadinessConfig::default(),
            Ignore,
        );
        host.advance(Duration::from_secs(10));
        handle.cancel();
    });

    let ready = logs.with_message("readiness: ready");
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].level, Level::DEBUG);
    assert_eq!(ready[0].fields.get("timed_out").map(String::as_str), Some("true"));
    assert_eq!(logs.with_message("readiness: cancelled").len(), 1);
}

#[test]
fn unknown_anchor_is_a_warning() {
    let (logs, y) = capture(|| {
        let mut engine = LerpEngine::new(
            SmoothScrollOptions::default(),
            HashMap::<String, f64>::new(),
            Discard,
            120.0,
            4000.0,
        );
        engine.scroll_to(&ScrollTarget::anchor("missing-section"));
        engine.target()
    });

    assert_eq!(y, 120.0);
    let warnings = logs.with_message("smooth scroll: unknown anchor ignored");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::WARN);
    assert_eq!(
        warnings[0].fields.get("anchor").map(String::as_str),
        Some("missing-section")
    );
}

#[test]
fn nav_lifecycle_stays_out_of_warn() {
    let (logs, ()) = capture(|| {
        let host = Rc::new(ManualHost::new());
        let nav = NavController::start(host.clone(), Default::default(), 0.0, |_| {});
        for y in [40.0, 400.0, 402.0, 200.0] {
            nav.on_scroll(y);
            host.frame();
        }
        nav.stop();
    });

    assert_eq!(logs.with_message("nav: started").len(), 1);
    assert_eq!(logs.with_message("nav: visibility changed").len(), 2);
    assert_eq!(logs.with_message("nav: stopped").len(), 1);
    assert!(!logs.levels().contains(&Level::WARN));
}
