#![forbid(unsafe_code)]

//! Error types.
//!
//! Runtime operations in this crate never fail: missing or late
//! environmental signals are absorbed by timeouts and no-ops. The only
//! fallible surface is turning host-supplied strings into configuration.

use std::fmt;

/// A rejected intersection root margin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootMarginError {
    /// The margin string had no values.
    Empty,
    /// More than four values were given.
    TooManyValues(usize),
    /// A value was not `<number>px`, `<number>%` or `0`.
    InvalidLength(String),
}

impl fmt::Display for RootMarginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "root margin is empty"),
            Self::TooManyValues(n) => write!(f, "root margin takes 1 to 4 values, got {n}"),
            Self::InvalidLength(token) => {
                write!(f, "root margin value {token:?} must be in px or %")
            }
        }
    }
}

impl std::error::Error for RootMarginError {}

/// A rejected scroll target string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTargetError {
    /// Neither an offset nor an anchor name.
    Empty,
}

impl fmt::Display for ScrollTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "scroll target is empty"),
        }
    }
}

impl std::error::Error for ScrollTargetError {}

/// A rejected configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// JSON parse error.
    Json(serde_json::Error),
    /// Values outside their accepted ranges.
    Validation(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
