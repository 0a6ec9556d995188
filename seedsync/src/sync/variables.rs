//! Variable values, transfer limits and popup readings.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::diff::only_changed;
use super::{identify, settle, StateReader, SyncContext, SyncError};
use crate::arcgis::service_name;
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState, Climate, Method, Objective};
use crate::store::Dispatcher;
use crate::transport::url_encode;

#[derive(Debug, Clone, PartialEq)]
pub struct ValuesSnapshot {
    pub objective: Objective,
    pub point: Option<Point>,
    pub climate: Climate,
    pub variables: Vec<String>,
    pub valid_regions: Vec<String>,
}

pub fn select_values(state: &AppState) -> ValuesSnapshot {
    let rc = &state.run_configuration;
    ValuesSnapshot {
        objective: rc.objective,
        point: rc.point,
        climate: rc.climate.clone(),
        variables: variable_names(state),
        valid_regions: rc.valid_regions.clone(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferSnapshot {
    pub method: Method,
    pub point: Option<Point>,
    pub zone: Option<String>,
    /// Seedlot climate period.
    pub year: String,
    pub variables: Vec<String>,
    pub region: Option<String>,
}

pub fn select_transfer(state: &AppState) -> TransferSnapshot {
    let rc = &state.run_configuration;
    TransferSnapshot {
        method: rc.method,
        point: rc.point,
        zone: rc.zones.selected.clone(),
        year: rc.climate.seedlot.time.clone(),
        variables: variable_names(state),
        region: rc.region.clone(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSnapshot {
    pub climate: Climate,
    pub region: Option<String>,
    pub objective: Objective,
}

pub fn select_region(state: &AppState) -> RegionSnapshot {
    let rc = &state.run_configuration;
    RegionSnapshot {
        climate: rc.climate.clone(),
        region: rc.region.clone(),
        objective: rc.objective,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupValuesSnapshot {
    pub objective: Objective,
    pub point: Option<Point>,
    pub climate: Climate,
    pub variables: Vec<String>,
    pub region: Option<String>,
}

pub fn select_popup_values(state: &AppState) -> PopupValuesSnapshot {
    let rc = &state.run_configuration;
    PopupValuesSnapshot {
        objective: rc.objective,
        point: state.popup.point,
        climate: rc.climate.clone(),
        variables: variable_names(state),
        region: state.popup.region.clone(),
    }
}

fn variable_names(state: &AppState) -> Vec<String> {
    state
        .run_configuration
        .variables
        .iter()
        .map(|v| v.name.clone())
        .collect()
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let reader = StateReader::new(watcher.store());

    let values = {
        let reader = reader.clone();
        watcher.register("values", select_values, move |snapshot, io, dispatch, previous| {
            on_values(&reader, snapshot, io, dispatch, previous)
        })
    };

    let transfer = {
        let ctx = Arc::clone(ctx);
        let reader = reader.clone();
        watcher.register("transfer", select_transfer, move |snapshot, io, dispatch, previous| {
            on_transfer(&ctx, &reader, snapshot, io, dispatch, previous)
        })
    };

    let region = watcher.register("variables-region", select_region, |snapshot, _, dispatch, _| {
        dispatch.dispatch(Action::SetVariablesRegion(snapshot.region.clone()));
        Ok(())
    });

    let popup_values = watcher.register(
        "popup-values",
        select_popup_values,
        move |snapshot, io, dispatch, previous| on_popup_values(&reader, snapshot, io, dispatch, previous),
    );

    vec![values, transfer, region, popup_values]
}

/// Where a batch of climate values is read.
struct ValueQuery {
    objective: Objective,
    climate: Climate,
    region: String,
    point: Point,
}

/// Fetch each variable's value independently, bracketed by the given
/// request and receive actions.
fn fetch_values(
    subscription: &'static str,
    query: ValueQuery,
    names: Vec<String>,
    io: &Io,
    dispatch: &Dispatcher<Action>,
    request: fn(String) -> Action,
    receive: fn(String, Option<f64>) -> Action,
) {
    let query = Arc::new(query);
    for name in names {
        dispatch.dispatch(request(name.clone()));

        let service = service_name(&name, query.objective, &query.climate, &query.region);
        let query = Arc::clone(&query);
        let dispatch = dispatch.clone();
        let task_io = io.clone();
        io.spawn(async move {
            let result = identify(&task_io, &service, &query.point).await;
            if let Some(value) = settle(subscription, &name, result) {
                debug!(subscription, variable = %name, ?value, "value received");
                task_io.dispatch(&dispatch, receive(name, value));
            }
        });
    }
}

fn on_values(
    reader: &StateReader,
    snapshot: &ValuesSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
    previous: Option<&ValuesSnapshot>,
) -> Result<(), SyncError> {
    let Some(point) = snapshot.point.filter(Point::is_valid) else {
        return Ok(());
    };
    let Some(region) = snapshot.valid_regions.first() else {
        return Ok(());
    };

    let variables_only = only_changed(previous, snapshot, |s| s.variables.clear());
    let names = reader
        .read(|state| {
            state
                .run_configuration
                .variables
                .iter()
                .filter(|v| !variables_only || v.value.is_none())
                .map(|v| v.name.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let query = ValueQuery {
        objective: snapshot.objective,
        climate: snapshot.climate.clone(),
        region: region.clone(),
        point,
    };
    fetch_values(
        "values",
        query,
        names,
        &io,
        dispatch,
        Action::RequestValue,
        |variable, value| Action::ReceiveValue { variable, value },
    );
    Ok(())
}

fn on_popup_values(
    reader: &StateReader,
    snapshot: &PopupValuesSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
    previous: Option<&PopupValuesSnapshot>,
) -> Result<(), SyncError> {
    // The popup handler refreshes every row when the location moves; this
    // one only picks up rows added to or removed from the variable list.
    let Some(previous) = previous else {
        return Ok(());
    };
    if previous.variables == snapshot.variables {
        return Ok(());
    }
    let (Some(point), Some(region)) = (snapshot.point.filter(Point::is_valid), snapshot.region.as_ref())
    else {
        return Ok(());
    };

    let variables_only = only_changed(Some(previous), snapshot, |s| s.variables.clear());
    let names = reader
        .read(|state| {
            state
                .popup
                .values
                .iter()
                .filter(|v| !variables_only || v.value.is_none())
                .map(|v| v.name.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let query = ValueQuery {
        objective: snapshot.objective,
        climate: snapshot.climate.clone(),
        region: region.clone(),
        point,
    };
    fetch_values(
        "popup-values",
        query,
        names,
        &io,
        dispatch,
        Action::RequestPopupValue,
        |variable, value| Action::ReceivePopupValue { variable, value },
    );
    Ok(())
}

/// `{"results": [{"transfer": .., "avg_transfer": .., "center": ..}]}`
#[derive(Debug, Default, Deserialize)]
struct TransferLimitsResponse {
    #[serde(default)]
    results: Vec<TransferLimit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TransferLimit {
    transfer: Option<f64>,
    avg_transfer: Option<f64>,
    center: Option<f64>,
}

fn transfer_limits_url(ctx: &SyncContext, point: &Point, variable: &str, zone: Option<&str>, year: &str) -> String {
    let mut params = vec![
        ("point", point.query_value()),
        ("variable", variable.to_string()),
    ];
    if let Some(zone) = zone {
        params.push(("zone__zone_uid", zone.to_string()));
    }
    params.push(("time_period", year.to_string()));
    format!("{}?{}", ctx.api_url("transfer-limits/"), url_encode(&params))
}

fn on_transfer(
    ctx: &Arc<SyncContext>,
    reader: &StateReader,
    snapshot: &TransferSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
    previous: Option<&TransferSnapshot>,
) -> Result<(), SyncError> {
    let has_regions = reader
        .read(|s| !s.run_configuration.valid_regions.is_empty())
        .unwrap_or(false);
    if !has_regions || snapshot.method != Method::Seedzone {
        return Ok(());
    }
    let Some(point) = snapshot.point.filter(Point::is_valid) else {
        return Ok(());
    };

    let variables_only = only_changed(previous, snapshot, |s| s.variables.clear());
    let names = reader
        .read(|state| {
            state
                .run_configuration
                .variables
                .iter()
                .filter(|v| !variables_only || v.default_transfer.is_none())
                .map(|v| v.name.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    for name in names {
        dispatch.dispatch(Action::RequestTransfer(name.clone()));

        let url = transfer_limits_url(ctx, &point, &name, snapshot.zone.as_deref(), &snapshot.year);
        let dispatch = dispatch.clone();
        let task_io = io.clone();
        io.spawn(async move {
            let result = task_io
                .get_json::<TransferLimitsResponse>(&url)
                .await
                .map(|response| response.results.into_iter().next());
            let Some(limit) = settle("transfer", &name, result) else {
                return;
            };
            let limit = limit.unwrap_or_default();
            task_io.dispatch(&dispatch, Action::ReceiveTransfer {
                variable: name,
                transfer: limit.transfer,
                avg_transfer: limit.avg_transfer,
                center: limit.center,
            });
        });
    }
    Ok(())
}
