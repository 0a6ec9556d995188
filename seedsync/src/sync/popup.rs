//! Readings at the map popup location.
//!
//! The popup is independent of the run point: it resolves its own region,
//! then reads elevation, every popup variable row and the seed zones at the
//! location.

use std::sync::Arc;

use tracing::{debug, warn};

use super::zones::{seedzones_url, SeedZonesResponse};
use super::{identify, regions_url, settle, RegionsResponse, StateReader, SyncContext, SyncError};
use crate::arcgis::{dem_service_name, service_name};
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState, PopupZone};
use crate::store::Dispatcher;

const SUBSCRIPTION: &str = "popup";

#[derive(Debug, Clone, PartialEq)]
pub struct PopupSnapshot {
    pub point: Option<Point>,
}

pub fn select(state: &AppState) -> PopupSnapshot {
    PopupSnapshot {
        point: state.popup.point,
    }
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let ctx = Arc::clone(ctx);
    let reader = StateReader::new(watcher.store());
    vec![watcher.register(SUBSCRIPTION, select, move |snapshot, io, dispatch, _| {
        on_popup(&ctx, &reader, snapshot, io, dispatch)
    })]
}

fn on_popup(
    ctx: &Arc<SyncContext>,
    reader: &StateReader,
    snapshot: &PopupSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
) -> Result<(), SyncError> {
    let Some(point) = snapshot.point.filter(Point::is_valid) else {
        return Ok(());
    };

    dispatch.dispatch(Action::RequestPopupRegion);

    let ctx = Arc::clone(ctx);
    let reader = reader.clone();
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        let io = task_io;
        let region = match io.get_json::<RegionsResponse>(&regions_url(&ctx, &point)).await {
            Ok(response) => response.names().into_iter().next(),
            Err(e) if e.is_stale() => return,
            Err(e) => {
                warn!(subscription = SUBSCRIPTION, error = %e, "popup region lookup failed");
                None
            }
        };
        if !io.dispatch(&dispatch, Action::ReceivePopupRegion(region.clone())) {
            return;
        }

        let Some(region) = region else {
            debug!(%point, "popup location is outside every region");
            return;
        };

        read_elevation(&io, &dispatch, &region, point);
        read_values(&io, &reader, &dispatch, &region, point);
        read_zones(&ctx, &io, &dispatch, point);
    });
    Ok(())
}

fn read_elevation(io: &Io, dispatch: &Dispatcher<Action>, region: &str, point: Point) {
    let service = dem_service_name(region);
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        let result = identify(&task_io, &service, &point).await;
        if let Some(elevation) = settle(SUBSCRIPTION, "elevation", result) {
            task_io.dispatch(&dispatch, Action::ReceivePopupElevation(elevation));
        }
    });
}

fn read_values(io: &Io, reader: &StateReader, dispatch: &Dispatcher<Action>, region: &str, point: Point) {
    let Some((objective, climate, names)) = reader.read(|state| {
        let names: Vec<String> = state.popup.values.iter().map(|v| v.name.clone()).collect();
        (state.run_configuration.objective, state.run_configuration.climate.clone(), names)
    }) else {
        return;
    };

    for name in names {
        if !io.dispatch(dispatch, Action::RequestPopupValue(name.clone())) {
            return;
        }

        let service = service_name(&name, objective, &climate, region);
        let dispatch = dispatch.clone();
        let task_io = io.clone();
        io.spawn(async move {
            let result = identify(&task_io, &service, &point).await;
            if let Some(value) = settle(SUBSCRIPTION, &name, result) {
                task_io.dispatch(&dispatch, Action::ReceivePopupValue { variable: name, value });
            }
        });
    }
}

fn read_zones(ctx: &SyncContext, io: &Io, dispatch: &Dispatcher<Action>, point: Point) {
    let url = seedzones_url(ctx, &point, None);
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        match task_io.get_json::<SeedZonesResponse>(&url).await {
            Ok(response) => {
                let zones = response
                    .results
                    .into_iter()
                    .map(|zone| PopupZone {
                        id: zone.zone_uid,
                        name: zone.name,
                        elevation_band: zone.elevation_band,
                    })
                    .collect();
                task_io.dispatch(&dispatch, Action::ReceivePopupZones(zones));
            }
            Err(e) if e.is_stale() => debug!(subscription = SUBSCRIPTION, "stale result dropped"),
            Err(e) => warn!(subscription = SUBSCRIPTION, error = %e, "popup seed zone lookup failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PopupValue;
    use crate::sync::testing::{pixel, regions, Harness};
    use serde_json::json;

    fn with_rows(names: &[&str]) -> AppState {
        let mut state = AppState::default();
        state.popup.values = names
            .iter()
            .map(|n| PopupValue {
                name: n.to_string(),
                ..PopupValue::default()
            })
            .collect();
        state
    }

    #[tokio::test]
    async fn test_popup_location_reads_everything() {
        let h = Harness::new(with_rows(&["MAT", "MAP"]));
        h.mock.respond("/sst/regions/", 200, regions(&["nc1"]));
        h.mock.respond("nc1_dem", 200, pixel(250.0));
        h.mock.respond("nc1_1961_1990Y_MAT", 200, pixel(88.0));
        h.mock.respond("nc1_1961_1990Y_MAP", 200, pixel(910.0));
        h.mock.respond(
            "/sst/seedzones/",
            200,
            json!({"results": [{"zone_uid": "pipo_3", "name": "Ponderosa 3", "species": "pipo", "elevation_band": [500, 1000]}]}),
        );
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetPopupLocation(Point::from_lat_lon(47.0, -95.0)));
        h.settle().await;

        let popup = h.state().popup;
        assert_eq!(popup.region.as_deref(), Some("nc1"));
        assert_eq!(popup.elevation, Some(250.0));
        assert_eq!(popup.values[0].value, Some(88.0));
        assert_eq!(popup.values[1].value, Some(910.0));
        assert_eq!(
            popup.zones,
            [PopupZone {
                id: "pipo_3".to_string(),
                name: "Ponderosa 3".to_string(),
                elevation_band: Some(json!([500, 1000])),
            }]
        );
    }

    #[tokio::test]
    async fn test_popup_outside_regions_stops_after_region() {
        let h = Harness::new(with_rows(&["MAT"]));
        h.mock.respond("/sst/regions/", 200, regions(&[]));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetPopupLocation(Point::from_lat_lon(10.0, 10.0)));
        h.settle().await;

        assert_eq!(h.mock.urls().len(), 1);
        assert_eq!(h.state().popup.region, None);
    }

    #[tokio::test]
    async fn test_moving_popup_drops_earlier_region() {
        let h = Harness::new(with_rows(&[]));
        h.mock.hold("/sst/regions/");
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetPopupLocation(Point::from_lat_lon(47.0, -95.0)));
        h.dispatch(Action::SetPopupLocation(Point::from_lat_lon(45.0, -123.0)));
        tokio::task::yield_now().await;
        while h.mock.parked("/sst/regions/") < 2 {
            tokio::task::yield_now().await;
        }

        // Newest first, then the superseded request.
        assert!(h.mock.release("-123", 200, regions(&["west2"])));
        assert!(h.mock.release("-95", 200, regions(&["nc1"])));
        h.settle().await;

        assert_eq!(h.state().popup.region.as_deref(), Some("west2"));
        assert_eq!(h.mock.count("nc1_dem"), 0);
    }
}
