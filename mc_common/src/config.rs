//! TOML configuration loading.
//!
//! A small generic helper used by every crate that owns a configuration
//! struct.

use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read configuration: {0}")]
    IoError(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Load and deserialize a TOML configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` does not exist,
/// [`ConfigError::IoError`] on other I/O failures, and
/// [`ConfigError::ParseError`] if the contents are not valid TOML for `T`.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.display())))?;

    toml::from_str(&text).map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
}

/// Common fields shared by every binary's configuration file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SharedConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Log level read from configuration (maps onto `tracing`'s `LevelFilter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, serde::Deserialize)]
    struct Example {
        name: String,
        count: u32,
    }

    #[test]
    fn load_missing_file() {
        let err = load_toml::<Example>(Path::new("/nonexistent/path.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "name = \"x\"\ncount = 3\n").unwrap();
        let cfg: Example = load_toml(file.path()).unwrap();
        assert_eq!(cfg.name, "x");
        assert_eq!(cfg.count, 3);
    }

    #[test]
    fn load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not valid toml {{{{").unwrap();
        let err = load_toml::<Example>(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
