#![forbid(unsafe_code)]

//! UI configuration loaded from TOML.
//!
//! Every field has a default, so an empty document (or no file at all) is a
//! valid configuration.
//!
//! ```
//! use kui_core::config::UiConfig;
//!
//! let config = UiConfig::from_toml_str("autofocus_delay_ms = 25").unwrap();
//! assert_eq!(config.autofocus_delay_ms, 25);
//! assert_eq!(config.done_label, "Done");
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides [`UiConfig::log_filter`].
pub const LOG_FILTER_ENV: &str = "KUI_LOG";

/// Errors from loading a [`UiConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The document is not valid TOML for [`UiConfig`].
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config: {e}"),
            Self::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e)
    }
}

/// Runtime settings shared by state machines, views, and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    /// Delay between revealing an autofocus widget and focusing it.
    pub autofocus_delay_ms: u64,
    /// Label of the view control that saves and closes the top panel.
    pub done_label: String,
    /// Label of the view control that reverts the top panel.
    pub cancel_label: String,
    /// `tracing` filter directive, e.g. `"info,kui_runtime=debug"`.
    pub log_filter: String,
    /// Emit logs as JSON lines (requires the `tracing-json` feature).
    pub log_json: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            autofocus_delay_ms: 10,
            done_label: "Done".to_owned(),
            cancel_label: "Cancel".to_owned(),
            log_filter: "info".to_owned(),
            log_json: false,
        }
    }
}

impl UiConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the environment (`KUI_LOG`).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV)
            && !filter.trim().is_empty()
        {
            self.log_filter = filter;
        }
        self
    }

    #[must_use]
    pub fn autofocus_delay(&self) -> Duration {
        Duration::from_millis(self.autofocus_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(UiConfig::from_toml_str("").unwrap(), UiConfig::default());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config = UiConfig::from_toml_str(
            r#"
            cancel_label = "Abbrechen"
            log_json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.cancel_label, "Abbrechen");
        assert!(config.log_json);
        assert_eq!(config.done_label, "Done");
        assert_eq!(config.autofocus_delay(), Duration::from_millis(10));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = UiConfig::from_toml_str("autofocus = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "autofocus_delay_ms = 0").unwrap();
        let config = UiConfig::load(file.path()).unwrap();
        assert_eq!(config.autofocus_delay(), Duration::ZERO);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = UiConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = UiConfig {
            log_filter: "debug".into(),
            ..UiConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(UiConfig::from_toml_str(&text).unwrap(), config);
    }
}
