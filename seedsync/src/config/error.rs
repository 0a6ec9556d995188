//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or written.
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse config file: {0}")]
    Parse(String),

    /// A key holds a value of the wrong shape.
    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A required key is absent.
    #[error("Missing [{section}] {key}")]
    MissingValue { section: String, key: String },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &str,
        key: &str,
        value: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
