//! CLI error type.

use std::fmt;

use seedsync::config::ConfigError;
use seedsync::engine::EngineError;
use seedsync::expr::{ExpressionError, FunctionValidationError};
use seedsync::logging::LoggingError;

/// Errors surfaced to the user by a command.
#[derive(Debug)]
pub enum CliError {
    ConfigFile(ConfigError),
    Logging(LoggingError),
    Engine(EngineError),
    Runtime(String),
    InvalidArgument(String),
    Validation(FunctionValidationError),
    Expression(ExpressionError),
    Output(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::Logging(e) => write!(f, "Logging setup failed: {}", e),
            CliError::Engine(e) => write!(f, "Engine error: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Validation(e) => write!(f, "{}", e),
            CliError::Expression(e) => write!(f, "{}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Validation(e) => Some(e),
            CliError::Expression(e) => Some(e),
            CliError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<FunctionValidationError> for CliError {
    fn from(e: FunctionValidationError) -> Self {
        CliError::Validation(e)
    }
}

impl From<ExpressionError> for CliError {
    fn from(e: ExpressionError) -> Self {
        CliError::Expression(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}
