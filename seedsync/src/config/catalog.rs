//! Climate variables and trait functions known to the engine.

use serde::{Deserialize, Serialize};

/// A climate variable served as a raster by the map server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    /// Raster values are stored as `real value * multiplier`.
    pub multiplier: f64,
}

impl VariableConfig {
    pub fn new(name: impl Into<String>, multiplier: f64) -> Self {
        Self {
            name: name.into(),
            multiplier,
        }
    }
}

/// A trait formula offered for a set of species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitFunction {
    pub name: String,
    /// Formula over climate variable names.
    pub func: String,
    pub species: Vec<String>,
}

/// Built-in variables and their multipliers.
const BUILTIN_VARIABLES: &[(&str, f64)] = &[
    ("MAT", 10.0),
    ("MWMT", 10.0),
    ("MCMT", 10.0),
    ("TD", 10.0),
    ("MAP", 1.0),
    ("MSP", 1.0),
    ("AHM", 10.0),
    ("SHM", 10.0),
    ("DD_0", 1.0),
    ("DD5", 1.0),
    ("FFP", 1.0),
    ("PAS", 1.0),
    ("EMT", 10.0),
    ("EXT", 10.0),
    ("Eref", 1.0),
    ("CMD", 1.0),
];

/// The built-in variable catalog.
pub fn builtin_variables() -> Vec<VariableConfig> {
    BUILTIN_VARIABLES
        .iter()
        .map(|(name, multiplier)| VariableConfig::new(*name, *multiplier))
        .collect()
}

/// Merge overrides into a catalog, replacing entries with the same name.
pub fn merge_variables(base: &mut Vec<VariableConfig>, overrides: Vec<VariableConfig>) {
    for variable in overrides {
        match base.iter_mut().find(|v| v.name == variable.name) {
            Some(existing) => existing.multiplier = variable.multiplier,
            None => base.push(variable),
        }
    }
}
