//! Legends of the active map layers.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{SyncContext, SyncError};
use crate::arcgis::{legend_url, service_name, LegendLayer, LegendResponse};
use crate::resync::{Io, Registration, Watcher};
use crate::state::{
    Action, AppState, Climate, LayerLegend, LegendElement, Objective, RESULTS_LAYER,
    VARIABLE_LAYER_PREFIX,
};
use crate::store::Dispatcher;

const SUBSCRIPTION: &str = "legends";

/// Layer name the map server reports for run results.
const RESULTS_LEGEND_LAYER: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub struct LegendsSnapshot {
    pub layers: Vec<String>,
    pub objective: Objective,
    pub climate: Climate,
    pub region: Option<String>,
    pub service_id: Option<String>,
}

pub fn select(state: &AppState) -> LegendsSnapshot {
    let rc = &state.run_configuration;
    LegendsSnapshot {
        layers: state.layers.clone(),
        objective: rc.objective,
        climate: rc.climate.clone(),
        region: rc.region.clone(),
        service_id: state.job.service_id.clone(),
    }
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let ctx = Arc::clone(ctx);
    vec![watcher.register(SUBSCRIPTION, select, move |snapshot, io, dispatch, _| {
        on_layers(&ctx, snapshot, io, dispatch)
    })]
}

/// A raster layer whose legend can be requested.
#[derive(Debug, Clone, PartialEq)]
enum LegendSource {
    Results { url: String },
    Variable { name: String, url: String },
}

impl LegendSource {
    fn resolve(layer: &str, snapshot: &LegendsSnapshot) -> Option<Self> {
        if layer == RESULTS_LAYER {
            let service_id = snapshot.service_id.as_ref()?;
            return Some(Self::Results {
                url: legend_url(service_id),
            });
        }

        let name = layer.strip_prefix(VARIABLE_LAYER_PREFIX)?;
        let region = snapshot.region.as_ref()?;
        let service = service_name(name, snapshot.objective, &snapshot.climate, region);
        Some(Self::Variable {
            name: name.to_string(),
            url: legend_url(&service),
        })
    }

    fn url(&self) -> &str {
        match self {
            Self::Results { url } | Self::Variable { url, .. } => url,
        }
    }
}

fn on_layers(
    ctx: &Arc<SyncContext>,
    snapshot: &LegendsSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
) -> Result<(), SyncError> {
    if snapshot.layers.is_empty() {
        return Ok(());
    }

    dispatch.dispatch(Action::ResetLegends);

    for layer in &snapshot.layers {
        let Some(source) = LegendSource::resolve(layer, snapshot) else {
            debug!(layer = %layer, "layer has no legend");
            continue;
        };

        dispatch.dispatch(Action::RequestLegend);
        let ctx = Arc::clone(ctx);
        let dispatch = dispatch.clone();
        let task_io = io.clone();
        io.spawn(async move {
            match task_io.get_json::<LegendResponse>(source.url()).await {
                Ok(response) => match normalize(&ctx, &source, response) {
                    Some(legend) => {
                        task_io.dispatch(&dispatch, Action::ReceiveLegend(legend));
                    }
                    None => {
                        task_io.dispatch(&dispatch, Action::FailLegend);
                    }
                },
                Err(e) if e.is_stale() => debug!(subscription = SUBSCRIPTION, "stale result dropped"),
                Err(e) => {
                    warn!(subscription = SUBSCRIPTION, url = source.url(), error = %e, "legend request failed");
                    task_io.dispatch(&dispatch, Action::FailLegend);
                }
            }
        });
    }
    Ok(())
}

/// Turn the first layer of a legend response into display labels.
fn normalize(ctx: &SyncContext, source: &LegendSource, response: LegendResponse) -> Option<LayerLegend> {
    let LegendLayer { layer_name, legend } = response.layers.into_iter().next()?;

    let labels: Vec<String> = if layer_name == RESULTS_LEGEND_LAYER {
        extreme_labels(&legend.iter().map(|s| s.numeric_label()).collect::<Vec<_>>())
    } else if let LegendSource::Variable { name, .. } = source {
        let multiplier = ctx.multiplier(name).unwrap_or(1.0);
        legend
            .iter()
            .map(|swatch| {
                swatch
                    .numeric_label()
                    .map(|n| (n / multiplier).to_string())
                    .unwrap_or_default()
            })
            .collect()
    } else {
        vec![String::new(); legend.len()]
    };

    let layer_name = match (layer_name.is_empty(), source) {
        (true, LegendSource::Variable { name, .. }) => name.clone(),
        _ => layer_name,
    };

    let elements = legend
        .into_iter()
        .zip(labels)
        .map(|(swatch, label)| LegendElement {
            label,
            image_data: swatch.image_data,
            content_type: swatch.content_type,
        })
        .collect();

    Some(LayerLegend { layer_name, elements })
}

/// `Low` at the smallest value, `High` at the largest, empty elsewhere.
fn extreme_labels(values: &[Option<f64>]) -> Vec<String> {
    let numbers = values.iter().flatten();
    let min = numbers.clone().copied().reduce(f64::min);
    let max = numbers.copied().reduce(f64::max);

    values
        .iter()
        .map(|value| match *value {
            Some(v) if Some(v) == min => "Low".to_string(),
            Some(v) if Some(v) == max => "High".to_string(),
            _ => String::new(),
        })
        .collect()
}
