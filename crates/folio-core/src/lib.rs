#![cfg_attr(not(test), forbid(unsafe_code))]

//! `folio-core` is the interaction core of the folio portfolio page.
//!
//! Design goals:
//! - **Host-driven**: frames, timers and document writes arrive through the
//!   [`runtime::Host`] and [`env::Environment`] traits. Nothing here touches
//!   a real DOM, so every component runs natively under test.
//! - **Deterministic time**: [`runtime::ManualHost`] advances a clock only
//!   when told to.
//! - **Disposable**: every component's `stop`/`destroy`/`disconnect` is
//!   idempotent and leaves no frame or timer behind.
//!
//! Components:
//!
//! | Module | Component |
//! |--------|-----------|
//! | [`readiness`] | loading conditions and the progress estimate |
//! | [`sequencer`] | loader entrance/exit phases |
//! | [`smooth_scroll`] | eased scrolling and the shared scroll context |
//! | [`cursor`] | pointer-following dot and ring, hover zones |
//! | [`nav`] | scroll-direction nav visibility and nav links |
//! | [`intersection`] | active project panel and section marker |

pub mod config;
pub mod cursor;
pub mod env;
pub mod error;
pub mod geometry;
pub mod intersection;
pub mod nav;
pub mod readiness;
pub mod runtime;
pub mod sequencer;
pub mod smooth_scroll;
pub mod teardown;

pub use config::FolioConfig;
pub use cursor::{PointerCursor, Zone, ZoneNode};
pub use env::{Environment, MarkerSet, RecordedStyle, StyleTarget};
pub use error::{ConfigError, RootMarginError, ScrollTargetError};
pub use geometry::{Point, Rect};
pub use intersection::{IntersectionEntry, PanelTracker, RootMargin, SectionTracker};
pub use nav::{NavController, NavLink};
pub use readiness::{Condition, Readiness, ReadinessHandle, ReadinessListener, ReadinessState};
pub use runtime::{FrameLoop, Host, LoopControl, ManualHost};
pub use sequencer::{Entity, Phase, PhaseSink, Sequencer};
pub use smooth_scroll::{ScrollContext, ScrollEngine, ScrollTarget, SmoothScroll};
pub use teardown::Teardown;
