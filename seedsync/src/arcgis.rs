//! ArcGIS map server requests and responses.
//!
//! Climate rasters are published as one map service per region, period,
//! scenario and variable. Values at a point come from the `identify`
//! operation and legends from the `legend` operation.

use serde::Deserialize;
use serde_json::Value;

use crate::point::Point;
use crate::state::{Climate, Objective};
use crate::transport::url_encode;

/// Root of the map server REST API.
pub const SERVICES_ROOT: &str = "/arcgis/rest/services/";

/// Attribute holding the raster value in identify results.
pub const PIXEL_VALUE_ATTRIBUTE: &str = "Pixel value";

/// Name of the map service for a variable.
///
/// The site climate is shown when looking for seedlots and the seedlot
/// climate when looking for sites. Historical periods have no scenario.
///
/// ```
/// use seedsync::arcgis::service_name;
/// use seedsync::state::{Climate, Objective};
///
/// let climate = Climate::default();
/// assert_eq!(
///     service_name("MAT", Objective::Seedlots, &climate, "west2"),
///     "west2_1961_1990Y_MAT"
/// );
/// ```
pub fn service_name(variable: &str, objective: Objective, climate: &Climate, region: &str) -> String {
    let selected = match objective {
        Objective::Seedlots => &climate.site,
        Objective::Sites => &climate.seedlot,
    };

    if selected.is_historical() {
        format!("{}_{}Y_{}", region, selected.time, variable)
    } else {
        let model = selected.model.as_deref().unwrap_or_default();
        format!("{}_{}_{}Y_{}", region, model, selected.time, variable)
    }
}

/// Name of the elevation service of a region.
pub fn dem_service_name(region: &str) -> String {
    format!("{}_dem", region)
}

/// URL of the identify operation of a service at a point.
pub fn identify_url(service: &str, point: &Point) -> String {
    let geometry = point.geometry_json();
    format!(
        "{}{}/MapServer/identify/?{}",
        SERVICES_ROOT,
        service,
        url_encode(&[
            ("f", "json"),
            ("tolerance", "2"),
            ("imageDisplay", "1600,1031,96"),
            ("geometryType", "esriGeometryPoint"),
            ("mapExtent", "0,0,0,0"),
            ("geometry", geometry.as_str()),
        ])
    )
}

/// URL of the legend of a service.
pub fn legend_url(service: &str) -> String {
    format!("{}{}/MapServer/legend", SERVICES_ROOT, service)
}

/// Body of an identify response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentifyResponse {
    #[serde(default)]
    pub results: Vec<IdentifyResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentifyResult {
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

impl IdentifyResponse {
    /// Raster value of the first result.
    ///
    /// Accepts numbers and numeric strings. `NoData`, empty results and
    /// non-finite values yield `None`.
    pub fn pixel_value(&self) -> Option<f64> {
        let value = self.results.first()?.attributes.get(PIXEL_VALUE_ATTRIBUTE)?;
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        number.is_finite().then_some(number)
    }
}

/// Body of a legend response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegendResponse {
    #[serde(default)]
    pub layers: Vec<LegendLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendLayer {
    #[serde(default)]
    pub layer_name: String,
    #[serde(default)]
    pub legend: Vec<LegendSwatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendSwatch {
    #[serde(default)]
    pub label: String,
    pub image_data: Option<String>,
    pub content_type: Option<String>,
}

impl LegendSwatch {
    /// Leading numeric part of the label, if any (`"12.5 - 13"` gives 12.5).
    pub fn numeric_label(&self) -> Option<f64> {
        let label = self.label.trim();
        let end = label
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
            .map(|(i, _)| i)
            .unwrap_or(label.len());
        label[..end].parse::<f64>().ok().filter(|n| n.is_finite())
    }
}
