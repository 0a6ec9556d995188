//! Logging setup.
//!
//! Installs a `tracing` subscriber that writes human-readable lines with local
//! timestamps to stderr and, when a directory is configured, to a daily
//! rolling file through a non-blocking writer. `RUST_LOG` takes precedence
//! over the configured level.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

/// File name prefix of the rolling log file.
pub const LOG_FILE_NAME: &str = "seedsync.log";

/// Logging options.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `seedsync=debug`.
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl LoggingConfig {
    /// Raise the level to `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level.clone(),
            directory: settings.directory.clone(),
        }
    }
}

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

/// Keeps the file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::Filter {
            directive: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false);

    let (file_layer, file_guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            level: "warn".to_string(),
            directory: Some(PathBuf::from("/var/log/seedsync")),
        };
        let config = LoggingConfig::from(&settings);
        assert_eq!(config.level, "warn");
        assert_eq!(config.directory, settings.directory);
    }

    #[test]
    fn test_verbose_raises_level() {
        assert_eq!(LoggingConfig::default().verbose(true).level, "debug");
        assert_eq!(LoggingConfig::default().verbose(false).level, "info");
    }
}
