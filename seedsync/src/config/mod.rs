//! Configuration
//!
//! Settings are read from an INI file, by default
//! `<config dir>/seedsync/config.ini`. A missing file is not an error; every
//! setting has a default.

mod catalog;
mod error;
mod file;

pub use catalog::{builtin_variables, merge_variables, TraitFunction, VariableConfig};
pub use error::ConfigError;
pub use file::{
    config_directory, config_file_path, ConfigFile, EngineSettings, LoggingSettings,
    ServerSettings, DEFAULT_API_ROOT, DEFAULT_BASE_URL, DEFAULT_LATITUDE_VARIABLE,
};
