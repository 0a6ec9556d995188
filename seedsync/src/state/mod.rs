//! Application state.
//!
//! [`AppState`] is the single value held by the engine's store. It mirrors the
//! run configuration a user builds up in the seedlot selection tool, plus the
//! derived data the sync handlers keep up to date: variable values and
//! transfer limits, seed zones, legends, popup readings, custom function and
//! trait values.
//!
//! State only changes through [`Action`]s applied by the reducer in
//! [`reducer`].

mod actions;
mod reducer;

pub use actions::Action;

use serde::{Deserialize, Serialize};

use crate::config::TraitFunction;
use crate::point::Point;

/// Species used when nothing more specific is selected.
pub const GENERIC_SPECIES: &str = "generic";

/// Layer name of the last run's results.
pub const RESULTS_LAYER: &str = "results";

/// Prefix of per-variable raster layers (`variable-MAT`).
pub const VARIABLE_LAYER_PREFIX: &str = "variable-";

/// Regions available when the region is chosen manually.
pub const REGIONS: &[&str] = &[
    "ak2",
    "west2",
    "nc1",
    "uscentral1",
    "ne1",
    "useast1",
    "mexico1",
];

/// What the user is searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    /// Find seedlots suited to a planting site.
    #[default]
    Seedlots,
    /// Find planting sites suited to a seedlot.
    Sites,
}

/// How transfer limits are determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Transfer limits derived from a seed zone.
    Seedzone,
    /// User supplied transfer limits.
    #[default]
    Custom,
    /// Custom formulas over climate variables.
    Function,
    /// Configured trait formulas.
    Trait,
}

/// Whether the region follows the point or is chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionMethod {
    #[default]
    Auto,
    Custom,
}

/// Which side of the climate selection an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateSide {
    Seedlot,
    Site,
}

/// A climate period and, for future periods, the emissions scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimateSelection {
    /// Period identifier, e.g. `1961_1990` or `2055`.
    pub time: String,
    /// Scenario, e.g. `rcp45`. Ignored for historical periods.
    pub model: Option<String>,
}

impl ClimateSelection {
    pub fn new(time: impl Into<String>, model: Option<&str>) -> Self {
        Self {
            time: time.into(),
            model: model.map(str::to_string),
        }
    }

    /// Whether the period is one of the observed historical normals.
    pub fn is_historical(&self) -> bool {
        self.time == "1961_1990" || self.time == "1981_2010"
    }
}

/// Seedlot and site climates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Climate {
    pub seedlot: ClimateSelection,
    pub site: ClimateSelection,
}

impl Default for Climate {
    fn default() -> Self {
        Self {
            seedlot: ClimateSelection::new("1961_1990", None),
            site: ClimateSelection::new("1961_1990", Some("rcp45")),
        }
    }
}

impl Climate {
    pub fn side(&self, side: ClimateSide) -> &ClimateSelection {
        match side {
            ClimateSide::Seedlot => &self.seedlot,
            ClimateSide::Site => &self.site,
        }
    }

    fn side_mut(&mut self, side: ClimateSide) -> &mut ClimateSelection {
        match side {
            ClimateSide::Seedlot => &mut self.seedlot,
            ClimateSide::Site => &mut self.site,
        }
    }
}

/// A climate variable in the run configuration.
///
/// Values are raw service units (e.g. tenths of a degree for `MAT`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Value at the selected point, `None` while unknown or after a failure.
    pub value: Option<f64>,
    pub transfer: Option<f64>,
    pub default_transfer: Option<f64>,
    pub avg_transfer: Option<f64>,
    pub zone_center: Option<f64>,
    pub transfer_is_modified: bool,
    pub is_fetching: bool,
    pub is_fetching_transfer: bool,
    pub custom_center: Option<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn reset_transfer(&mut self) {
        self.is_fetching_transfer = false;
        self.default_transfer = None;
        self.avg_transfer = None;
        self.zone_center = None;
        if !self.transfer_is_modified {
            self.transfer = None;
        }
    }
}

/// A seed zone as returned by the seed zone endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub zone_uid: String,
    pub name: String,
    pub species: String,
    pub elevation_at_point: Option<f64>,
    pub elevation_band: Option<serde_json::Value>,
}

/// Seed zone matching state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Zones {
    pub matched: Vec<Zone>,
    pub elevation_at_point: Option<f64>,
    pub selected: Option<String>,
    pub geometry: Option<serde_json::Value>,
    pub is_fetching_zones: bool,
    pub is_fetching_geometry: bool,
}

/// A user-defined formula over climate variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFunction {
    pub id: String,
    pub name: String,
    pub func: String,
    pub value: Option<f64>,
    pub transfer: Option<f64>,
    pub selected: bool,
    pub is_fetching: bool,
}

/// A configured trait selected for the current species.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitEntry {
    pub name: String,
    pub value: Option<f64>,
    pub transfer: Option<f64>,
    pub is_fetching: bool,
}

impl TraitEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Everything the user has configured for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub objective: Objective,
    pub point: Option<Point>,
    pub elevation: Option<f64>,
    pub climate: Climate,
    pub method: Method,
    pub region: Option<String>,
    pub region_method: RegionMethod,
    pub valid_regions: Vec<String>,
    pub is_fetching_regions: bool,
    pub species: String,
    pub available_species: Vec<String>,
    pub variables: Vec<Variable>,
    pub zones: Zones,
    pub custom_functions: Vec<CustomFunction>,
    pub traits: Vec<TraitEntry>,
    /// Region the variable values were last requested for.
    pub variables_region: Option<String>,
    next_function_id: u64,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            objective: Objective::default(),
            point: None,
            elevation: None,
            climate: Climate::default(),
            method: Method::default(),
            region: None,
            region_method: RegionMethod::default(),
            valid_regions: Vec::new(),
            is_fetching_regions: false,
            species: GENERIC_SPECIES.to_string(),
            available_species: Vec::new(),
            variables: Vec::new(),
            zones: Zones::default(),
            custom_functions: Vec::new(),
            traits: Vec::new(),
            variables_region: None,
            next_function_id: 1,
        }
    }
}

impl RunConfiguration {
    /// Variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Custom function by id.
    pub fn custom_function(&self, id: &str) -> Option<&CustomFunction> {
        self.custom_functions.iter().find(|f| f.id == id)
    }

    fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    fn custom_function_mut(&mut self, id: &str) -> Option<&mut CustomFunction> {
        self.custom_functions.iter_mut().find(|f| f.id == id)
    }
}

/// A variable reading in the map popup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PopupValue {
    pub name: String,
    pub value: Option<f64>,
    pub is_fetching: bool,
}

/// A seed zone at the popup location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PopupZone {
    pub id: String,
    pub name: String,
    pub elevation_band: Option<serde_json::Value>,
}

/// Readings for an arbitrary map location, independent of the run point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Popup {
    pub point: Option<Point>,
    pub region: Option<String>,
    pub elevation: Option<f64>,
    pub values: Vec<PopupValue>,
    pub zones: Vec<PopupZone>,
}

/// One swatch of a raster legend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegendElement {
    /// Display label after normalisation.
    pub label: String,
    /// Base64 swatch image, passed through from the map server.
    pub image_data: Option<String>,
    pub content_type: Option<String>,
}

/// Legend of one map layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerLegend {
    /// Layer name reported by the map server (`data` for run results,
    /// the variable name for variable layers).
    pub layer_name: String,
    pub elements: Vec<LegendElement>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Legends {
    /// Most recently received first.
    pub legends: Vec<LayerLegend>,
    pub is_fetching: bool,
}

/// The last finished run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Job {
    pub service_id: Option<String>,
}

/// Root state of the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppState {
    pub run_configuration: RunConfiguration,
    pub popup: Popup,
    pub legends: Legends,
    /// Active map layers.
    pub layers: Vec<String>,
    pub job: Job,
    /// Configured trait functions, consulted when species or method change.
    #[serde(skip)]
    pub trait_functions: Vec<TraitFunction>,
}

impl AppState {
    /// Initial state with the given trait function catalog.
    pub fn new(trait_functions: Vec<TraitFunction>) -> Self {
        Self {
            trait_functions,
            ..Self::default()
        }
    }
}
