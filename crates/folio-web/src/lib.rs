#![forbid(unsafe_code)]

//! Browser bindings for [`folio_core`].
//!
//! This crate provides [`FolioInteractions`], a `wasm-bindgen`-exported
//! lifecycle object that implements the core's capability traits on top of
//! `web-sys` (frames, timers, `document.body`, `IntersectionObserver`, font
//! and load readiness) and mounts each interaction component against the
//! elements the page hands it.
//!
//! The DOM-free pieces (attribute names, event names, option parsing) live
//! here so they build and test natively.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::FolioInteractions;

use folio_core::sequencer::{Entity, Phase};
use folio_core::{ConfigError, FolioConfig};

/// Attribute carrying a hover-zone tag (`media`, `ui`, `nav`).
pub const CURSOR_ATTRIBUTE: &str = "data-cursor";
/// Attribute carrying a project panel's index.
pub const INDEX_ATTRIBUTE: &str = "data-index";

/// Event names the bindings subscribe to.
pub mod events {
    pub const POINTER_MOVE: &str = "pointermove";
    pub const POINTER_OVER: &str = "pointerover";
    pub const POINTER_OUT: &str = "pointerout";
    pub const SCROLL: &str = "scroll";
    pub const WHEEL: &str = "wheel";
    pub const LOAD: &str = "load";
}

/// Whether an element with tag name `tag` counts as interactive for the
/// cursor (links and buttons).
#[must_use]
pub fn is_interactive_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("a") || tag.eq_ignore_ascii_case("button")
}

/// Panel index from its index attribute; `None` when absent or not a
/// non-negative integer.
#[must_use]
pub fn parse_panel_index(value: Option<&str>) -> Option<usize> {
    value?.trim().parse().ok()
}

/// Configuration from the page's option JSON. Absent or blank input yields
/// the defaults.
pub fn parse_config(json: Option<&str>) -> Result<FolioConfig, ConfigError> {
    match json.map(str::trim) {
        None | Some("") => Ok(FolioConfig::default()),
        Some(json) => FolioConfig::from_json_str(json),
    }
}

/// Maximum scroll offset for a document of `scroll_height` in a viewport of
/// `viewport_height`.
#[must_use]
pub fn scroll_limit(scroll_height: f64, viewport_height: f64) -> f64 {
    (scroll_height - viewport_height).max(0.0)
}

/// Wheel delta in pixels. `mode` is the event's `deltaMode`: 0 pixels,
/// 1 lines, 2 pages of `page_height`.
#[must_use]
pub fn wheel_delta_px(delta: f64, mode: u32, page_height: f64) -> f64 {
    match mode {
        1 => delta * LINE_HEIGHT_PX,
        2 => delta * page_height,
        _ => delta,
    }
}

/// Pixels per line for line-mode wheel deltas.
pub const LINE_HEIGHT_PX: f64 = 16.0;

/// Name passed to the page's phase callback.
#[must_use]
pub const fn entity_name(entity: Entity) -> &'static str {
    match entity {
        Entity::Letters => "letters",
        Entity::Counter => "counter",
    }
}

/// Name passed to the page's phase callback.
#[must_use]
pub const fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Hidden => "hidden",
        Phase::Visible => "visible",
        Phase::Bounce => "bounce",
        Phase::Hide => "hide",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interactive_tags_match_any_case() {
        assert!(is_interactive_tag("A"));
        assert!(is_interactive_tag("button"));
        assert!(!is_interactive_tag("SPAN"));
        assert!(!is_interactive_tag("abbr"));
    }

    #[test]
    fn panel_index_parsing() {
        assert_eq!(parse_panel_index(Some("2")), Some(2));
        assert_eq!(parse_panel_index(Some(" 0 ")), Some(0));
        assert_eq!(parse_panel_index(Some("-1")), None);
        assert_eq!(parse_panel_index(Some("two")), None);
        assert_eq!(parse_panel_index(None), None);
    }

    #[test]
    fn blank_config_is_default() {
        assert_eq!(parse_config(None).unwrap(), FolioConfig::default());
        assert_eq!(parse_config(Some("  ")).unwrap(), FolioConfig::default());
        let config = parse_config(Some(r#"{"navDeadZonePx": 12}"#)).unwrap();
        assert_eq!(config.nav_dead_zone_px, 12.0);
        assert!(parse_config(Some(r#"{"sectionThreshold": 2}"#)).is_err());
    }

    #[test]
    fn scroll_limit_never_negative() {
        assert_eq!(scroll_limit(5000.0, 800.0), 4200.0);
        assert_eq!(scroll_limit(600.0, 800.0), 0.0);
    }

    #[test]
    fn wheel_deltas_normalise_to_pixels() {
        assert_eq!(wheel_delta_px(120.0, 0, 800.0), 120.0);
        assert_eq!(wheel_delta_px(3.0, 1, 800.0), 48.0);
        assert_eq!(wheel_delta_px(-1.0, 2, 800.0), -800.0);
    }

    #[test]
    fn callback_names() {
        assert_eq!(entity_name(Entity::Letters), "letters");
        assert_eq!(phase_name(Phase::Bounce), "bounce");
    }
}
