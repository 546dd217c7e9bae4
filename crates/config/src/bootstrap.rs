//! Bootstrap configuration
//!
//! The small TOML file the agent reads once at startup. Everything dynamic
//! (systems, pollers, listeners, consumers) comes from declarations; the
//! bootstrap only covers process-level concerns.
//!
//! # Example
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "console"
//!
//! [storage]
//! path = "/var/lib/tstream/state.json"
//!
//! [controls]
//! debug = false
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Console,
    /// JSON structured logging
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: LogLevel,

    /// Output format (console, json)
    pub format: LogFormat,
}

/// Declaration persistence configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the persisted declaration blob
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/tstream/state.json".into(),
        }
    }
}

/// Process-level controls
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControlsConfig {
    /// Enables debug facilities such as listener event injection
    pub debug: bool,
}

/// Top-level bootstrap configuration
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Logging configuration
    pub log: LogConfig,

    /// Declaration persistence
    pub storage: StorageConfig,

    /// Process-level controls
    pub controls: ControlsConfig,
}

impl BootstrapConfig {
    /// Load from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }
}

impl FromStr for BootstrapConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BootstrapConfig::from_str("").unwrap();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.storage.path, "/var/lib/tstream/state.json");
        assert!(!config.controls.debug);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[storage]
path = "/tmp/state.json"

[controls]
debug = true
"#;
        let config = BootstrapConfig::from_str(toml).unwrap();
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.storage.path, "/tmp/state.json");
        assert!(config.controls.debug);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(BootstrapConfig::from_str("log = {{").is_err());
    }
}
