//! Shared setup for commands that run the engine.

use std::path::{Path, PathBuf};

use seedsync::config::{config_file_path, ConfigFile};
use seedsync::logging::{init_logging, LoggingConfig, LoggingGuard};
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Loads configuration, installs logging and builds the runtime.
pub struct CliRunner {
    config: ConfigFile,
    config_path: PathBuf,
    _logging: LoggingGuard,
}

impl CliRunner {
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging = LoggingConfig::from(&config.logging).verbose(verbose);
        let guard = init_logging(&logging)?;

        Ok(Self {
            config,
            config_path,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            config = %self.config_path.display(),
            base_url = %self.config.server.base_url,
            "seedsync starting"
        );
    }

    /// Current-thread runtime: a response is checked for staleness and its
    /// result dispatched without another task running in between.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(format!("failed to build runtime: {}", e)))
    }
}
