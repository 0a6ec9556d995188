use crate::point::Point;

use super::{ClimateSide, LayerLegend, Method, Objective, PopupZone, RegionMethod, Zone};

/// Every state transition the engine knows about.
///
/// Actions named `Request*` mark a fetch as started, `Receive*` deliver its
/// result (`None` meaning the fetch failed or had no data) and `Fail*` end a
/// fetch without a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Dispatched once after every handler is registered.
    Initialize,

    // Run configuration
    SelectObjective(Objective),
    SetPoint(Point),
    SetElevation(Option<f64>),
    SelectClimateYear { climate: ClimateSide, year: String },
    SelectClimateModel { climate: ClimateSide, model: String },
    SelectMethod(Method),
    SelectSpecies(String),
    ReceiveAvailableSpecies(Vec<String>),

    // Regions
    RequestRegions,
    ReceiveRegions(Vec<String>),
    SetRegion(Option<String>),
    SelectRegionMethod(RegionMethod),

    // Variables
    AddVariables(Vec<String>),
    RemoveVariable(usize),
    ModifyTransfer { variable: String, transfer: f64 },
    ResetTransfer(String),
    RequestValue(String),
    ReceiveValue { variable: String, value: Option<f64> },
    RequestTransfer(String),
    ReceiveTransfer {
        variable: String,
        transfer: Option<f64>,
        avg_transfer: Option<f64>,
        center: Option<f64>,
    },
    SetVariablesRegion(Option<String>),

    // Seed zones
    SelectZone(Option<String>),
    RequestZones,
    ReceiveZones(Vec<Zone>),
    FailZones,
    RequestGeometry,
    ReceiveGeometry(serde_json::Value),
    FailGeometry,

    // Map layers and legends
    ToggleLayer(String),
    FinishJob { service_id: String },
    ResetLegends,
    RequestLegend,
    ReceiveLegend(LayerLegend),
    FailLegend,

    // Popup
    SetPopupLocation(Point),
    ResetPopupLocation,
    RequestPopupRegion,
    ReceivePopupRegion(Option<String>),
    ReceivePopupElevation(Option<f64>),
    RequestPopupValue(String),
    ReceivePopupValue { variable: String, value: Option<f64> },
    ReceivePopupZones(Vec<PopupZone>),

    // Custom functions
    CreateFunction { name: String, func: String },
    SetFunction { id: String, name: String, func: String },
    ToggleFunction(String),
    DeleteFunction(String),
    RequestFunctionValue(String),
    SetFunctionValue { id: String, value: Option<f64> },

    // Traits
    AddTrait(String),
    RemoveTrait(usize),
    RequestTraitValue(usize),
    SetTraitValue { index: usize, value: Option<f64> },
}
