#![forbid(unsafe_code)]

//! Tunables for every component, loadable from the host as JSON.
//!
//! Keys are camelCase so the page host can pass its option object through
//! `JSON.stringify` unchanged:
//!
//! ```
//! use folio_core::config::FolioConfig;
//!
//! let config = FolioConfig::from_json_str(r#"{ "hardTimeoutMs": 4000 }"#).unwrap();
//! assert_eq!(config.hard_timeout_ms, 4000);
//! assert_eq!(config.minimum_delay_ms, 1000);
//! ```
//!
//! # Defaults
//!
//! Every field defaults to the value the site ships with, so
//! `FolioConfig::default()` reproduces production behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cursor::CursorConfig;
use crate::error::{ConfigError, RootMarginError};
use crate::intersection::RootMargin;
use crate::nav::NavConfig;
use crate::readiness::ReadinessConfig;
use crate::sequencer::{MAX_LETTERS, SequencerConfig};
use crate::smooth_scroll::SmoothScrollOptions;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FolioConfig {
    /// Floor on perceived loading time.
    pub minimum_delay_ms: u64,
    /// Readiness is forced after this long even if a condition never resolves.
    pub hard_timeout_ms: u64,
    /// Time the progress estimator takes to ease toward its 95% ceiling.
    pub progress_duration_ms: u64,
    /// Trailing cursor smoothing coefficient, in (0, 1].
    pub cursor_smoothing: f64,
    /// Scroll deltas at or below this magnitude do not toggle the nav.
    pub nav_dead_zone_px: f64,
    /// At or below this scroll position the nav is always shown.
    pub nav_near_top_px: f64,
    /// Root margin (CSS shorthand) for panel activation.
    pub panel_root_margin: String,
    /// Visible fraction at which the projects section counts as active.
    pub section_threshold: f64,
    /// Number of staggered letters in the loader wordmark.
    pub letter_count: usize,
    /// Smooth-scroll engine options.
    pub scroll: SmoothScrollOptions,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            minimum_delay_ms: 1000,
            hard_timeout_ms: 8000,
            progress_duration_ms: 5000,
            cursor_smoothing: 0.1,
            nav_dead_zone_px: 6.0,
            nav_near_top_px: 10.0,
            panel_root_margin: RootMargin::PANEL_DEFAULT.to_owned(),
            section_threshold: 0.2,
            letter_count: 6,
            scroll: SmoothScrollOptions::default(),
        }
    }
}

impl FolioConfig {
    /// Parse from JSON and validate.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Check every parameter is within its accepted range.
    ///
    /// Returns a list of problems; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.hard_timeout_ms == 0 {
            errors.push("hardTimeoutMs must be > 0".into());
        }
        if !(self.cursor_smoothing > 0.0 && self.cursor_smoothing <= 1.0) {
            errors.push(format!(
                "cursorSmoothing must be in (0, 1], got {}",
                self.cursor_smoothing
            ));
        }
        if !(self.scroll.lerp > 0.0 && self.scroll.lerp <= 1.0) {
            errors.push(format!(
                "scroll.lerp must be in (0, 1], got {}",
                self.scroll.lerp
            ));
        }
        if !self.nav_dead_zone_px.is_finite() || self.nav_dead_zone_px < 0.0 {
            errors.push(format!(
                "navDeadZonePx must be >= 0, got {}",
                self.nav_dead_zone_px
            ));
        }
        if !self.nav_near_top_px.is_finite() || self.nav_near_top_px < 0.0 {
            errors.push(format!(
                "navNearTopPx must be >= 0, got {}",
                self.nav_near_top_px
            ));
        }
        if !(1..=MAX_LETTERS).contains(&self.letter_count) {
            errors.push(format!(
                "letterCount must be in 1..={MAX_LETTERS}, got {}",
                self.letter_count
            ));
        }
        if !(0.0..=1.0).contains(&self.section_threshold) {
            errors.push(format!(
                "sectionThreshold must be in [0, 1], got {}",
                self.section_threshold
            ));
        }
        if let Err(e) = self.panel_root_margin() {
            errors.push(format!("panelRootMargin: {e}"));
        }

        errors
    }

    #[must_use]
    pub fn readiness(&self) -> ReadinessConfig {
        ReadinessConfig {
            minimum_delay: Duration::from_millis(self.minimum_delay_ms),
            hard_timeout: Duration::from_millis(self.hard_timeout_ms),
            progress_duration: Duration::from_millis(self.progress_duration_ms),
        }
    }

    #[must_use]
    pub fn sequencer(&self) -> SequencerConfig {
        SequencerConfig {
            letter_count: self.letter_count,
            ..SequencerConfig::default()
        }
    }

    #[must_use]
    pub fn cursor(&self) -> CursorConfig {
        CursorConfig {
            smoothing: self.cursor_smoothing,
        }
    }

    #[must_use]
    pub fn nav(&self) -> NavConfig {
        NavConfig {
            dead_zone: self.nav_dead_zone_px,
            near_top: self.nav_near_top_px,
        }
    }

    pub fn panel_root_margin(&self) -> Result<RootMargin, RootMarginError> {
        self.panel_root_margin.parse()
    }
}
