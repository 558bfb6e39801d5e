#![forbid(unsafe_code)]

//! `tracing` subscriber installation.
//!
//! Library code only emits through the `tracing` macros; applications call
//! [`init`] once at startup to route those events to stderr.

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::config::UiConfig;

/// Errors from [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// `log_filter` is not a valid filter directive.
    InvalidFilter(String),
    /// A global subscriber was already installed.
    AlreadyInstalled(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilter(msg) => write!(f, "invalid log filter: {msg}"),
            Self::AlreadyInstalled(msg) => write!(f, "logging already initialized: {msg}"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Install the global fmt subscriber described by `config`.
///
/// The filter comes from [`UiConfig::log_filter`]; call
/// [`UiConfig::with_env_overrides`] first to honor `KUI_LOG`. JSON output
/// needs the `tracing-json` feature; without it `log_json` is ignored.
pub fn init(config: &UiConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    #[cfg(feature = "tracing-json")]
    if config.log_json {
        return builder
            .json()
            .try_init()
            .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()));
    }

    builder
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))
}
