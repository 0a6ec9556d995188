//! INI configuration file.
//!
//! ```ini
//! [server]
//! base_url = https://seedlotselectiontool.org
//! api_root = /sst/
//! timeout = 30
//!
//! [logging]
//! level = info
//!
//! [engine]
//! latitude_variable = LAT
//!
//! [trait.height]
//! fn = 0.5 * MAT + 12
//! species = psme, pico
//!
//! [variable.MAP]
//! multiplier = 1
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;

use super::catalog::{builtin_variables, merge_variables, TraitFunction, VariableConfig};
use super::error::ConfigError;
use crate::transport::{ClientSettings, DEFAULT_TIMEOUT_SECS};

/// Default backend.
pub const DEFAULT_BASE_URL: &str = "https://seedlotselectiontool.org";

/// Default prefix of the seed source REST API.
pub const DEFAULT_API_ROOT: &str = "/sst/";

/// Variable name resolved from the point's latitude instead of the map server.
pub const DEFAULT_LATITUDE_VARIABLE: &str = "LAT";

const TRAIT_PREFIX: &str = "trait.";
const VARIABLE_PREFIX: &str = "variable.";

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seedsync")
}

/// Default path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub base_url: String,
    pub api_root: String,
    pub timeout_secs: u64,
    /// Sent as `X-CSRFToken` on mutating requests.
    pub csrf_token: Option<String>,
    /// Sent as `Accept-Language` on mutating requests.
    pub language: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_root: DEFAULT_API_ROOT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            csrf_token: None,
            language: None,
        }
    }
}

impl ServerSettings {
    /// HTTP client settings for this server.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: Some(self.base_url.clone()),
            timeout_secs: Some(self.timeout_secs),
            csrf_token: self.csrf_token.clone(),
            language: self.language.clone(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    /// When set, logs are also written to a daily file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub latitude_variable: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            latitude_variable: DEFAULT_LATITUDE_VARIABLE.to_string(),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub engine: EngineSettings,
    pub traits: Vec<TraitFunction>,
    /// Built-in catalog merged with `[variable.*]` overrides.
    pub variables: Vec<VariableConfig>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            engine: EngineSettings::default(),
            traits: Vec::new(),
            variables: builtin_variables(),
        }
    }
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse INI text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("server")) {
            if let Some(v) = section.get("base_url") {
                config.server.base_url = v.trim().to_string();
            }
            if let Some(v) = section.get("api_root") {
                config.server.api_root = normalize_api_root(v);
            }
            if let Some(v) = section.get("timeout") {
                config.server.timeout_secs = v
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::invalid("server", "timeout", v, "expected seconds"))?;
            }
            config.server.csrf_token = non_empty(section.get("csrf_token"));
            config.server.language = non_empty(section.get("language"));
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("level") {
                config.logging.level = v.trim().to_string();
            }
            config.logging.directory = non_empty(section.get("directory")).map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some("engine")) {
            if let Some(v) = non_empty(section.get("latitude_variable")) {
                config.engine.latitude_variable = v;
            }
        }

        let mut overrides = Vec::new();
        for (name, properties) in ini.iter() {
            let Some(name) = name else { continue };

            if let Some(trait_name) = name.strip_prefix(TRAIT_PREFIX) {
                let section = name.to_string();
                let func = non_empty(properties.get("fn")).ok_or_else(|| ConfigError::MissingValue {
                    section: section.clone(),
                    key: "fn".to_string(),
                })?;
                let species = properties
                    .get("species")
                    .map(split_list)
                    .unwrap_or_default();
                config.traits.push(TraitFunction {
                    name: trait_name.to_string(),
                    func,
                    species,
                });
            } else if let Some(variable) = name.strip_prefix(VARIABLE_PREFIX) {
                let raw = properties.get("multiplier").ok_or_else(|| ConfigError::MissingValue {
                    section: name.to_string(),
                    key: "multiplier".to_string(),
                })?;
                let multiplier: f64 = raw
                    .trim()
                    .parse()
                    .ok()
                    .filter(|m: &f64| m.is_finite() && *m != 0.0)
                    .ok_or_else(|| {
                        ConfigError::invalid(name, "multiplier", raw, "expected a non-zero number")
                    })?;
                overrides.push(VariableConfig::new(variable, multiplier));
            }
        }
        merge_variables(&mut config.variables, overrides);

        Ok(config)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Render as an INI document.
    ///
    /// Only variables that differ from the built-in catalog are written.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("server"))
            .set("base_url", self.server.base_url.as_str())
            .set("api_root", self.server.api_root.as_str())
            .set("timeout", self.server.timeout_secs.to_string());
        if let Some(token) = &self.server.csrf_token {
            ini.with_section(Some("server")).set("csrf_token", token.as_str());
        }
        if let Some(language) = &self.server.language {
            ini.with_section(Some("server")).set("language", language.as_str());
        }

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str());
        if let Some(directory) = &self.logging.directory {
            ini.with_section(Some("logging"))
                .set("directory", directory.display().to_string());
        }

        ini.with_section(Some("engine"))
            .set("latitude_variable", self.engine.latitude_variable.as_str());

        for function in &self.traits {
            ini.with_section(Some(format!("{}{}", TRAIT_PREFIX, function.name)))
                .set("fn", function.func.as_str())
                .set("species", function.species.join(", "));
        }

        let builtin = builtin_variables();
        for variable in &self.variables {
            if builtin.contains(variable) {
                continue;
            }
            ini.with_section(Some(format!("{}{}", VARIABLE_PREFIX, variable.name)))
                .set("multiplier", variable.multiplier.to_string());
        }

        ini
    }

    /// Multiplier of a variable, if it is in the catalog.
    pub fn multiplier(&self, variable: &str) -> Option<f64> {
        self.variables
            .iter()
            .find(|v| v.name == variable)
            .map(|v| v.multiplier)
    }

    /// Trait function by name.
    pub fn trait_function(&self, name: &str) -> Option<&TraitFunction> {
        self.traits.iter().find(|t| t.name == name)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// API roots always start and end with a slash.
fn normalize_api_root(value: &str) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
