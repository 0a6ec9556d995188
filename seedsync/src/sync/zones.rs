//! Available species, matching seed zones and the selected zone's geometry.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{SyncContext, SyncError};
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState, Method, Zone};
use crate::store::Dispatcher;
use crate::transport::{encode_component, url_encode};

#[derive(Debug, Clone, PartialEq)]
pub struct AvailableSpeciesSnapshot {
    pub point: Option<Point>,
    pub method: Method,
}

pub fn select_available_species(state: &AppState) -> AvailableSpeciesSnapshot {
    AvailableSpeciesSnapshot {
        point: state.run_configuration.point,
        method: state.run_configuration.method,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZonesSnapshot {
    pub point: Option<Point>,
    pub method: Method,
    pub species: String,
}

pub fn select_zones(state: &AppState) -> ZonesSnapshot {
    ZonesSnapshot {
        point: state.run_configuration.point,
        method: state.run_configuration.method,
        species: state.run_configuration.species.clone(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySnapshot {
    pub zone: Option<String>,
    pub has_geometry: bool,
}

pub fn select_geometry(state: &AppState) -> GeometrySnapshot {
    let zones = &state.run_configuration.zones;
    GeometrySnapshot {
        zone: zones.selected.clone(),
        has_geometry: zones.geometry.is_some(),
    }
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let available = {
        let ctx = Arc::clone(ctx);
        watcher.register("available-species", select_available_species, move |s, io, dispatch, _| {
            on_available_species(&ctx, s, io, dispatch)
        })
    };
    let zones = {
        let ctx = Arc::clone(ctx);
        watcher.register("zones", select_zones, move |s, io, dispatch, _| on_zones(&ctx, s, io, dispatch))
    };
    let geometry = {
        let ctx = Arc::clone(ctx);
        watcher.register("zone-geometry", select_geometry, move |s, io, dispatch, _| {
            on_geometry(&ctx, s, io, dispatch)
        })
    };
    vec![available, zones, geometry]
}

/// `{"results": [<zone>, ..]}` from the seed zone endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SeedZonesResponse {
    #[serde(default)]
    pub results: Vec<Zone>,
}

impl SeedZonesResponse {
    /// Species with a zone at the point, in response order, without repeats.
    fn species(&self) -> Vec<String> {
        let mut species: Vec<String> = Vec::new();
        for zone in &self.results {
            if !species.contains(&zone.species) {
                species.push(zone.species.clone());
            }
        }
        species
    }
}

/// Seed zones at a point, optionally restricted to one species.
pub(crate) fn seedzones_url(ctx: &SyncContext, point: &Point, species: Option<&str>) -> String {
    let mut params = vec![("point", point.query_value())];
    if let Some(species) = species {
        params.push(("species", species.to_string()));
    }
    format!("{}?{}", ctx.api_url("seedzones/"), url_encode(&params))
}

fn on_available_species(
    ctx: &SyncContext,
    snapshot: &AvailableSpeciesSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
) -> Result<(), SyncError> {
    if snapshot.method != Method::Seedzone {
        return Ok(());
    }
    let Some(point) = snapshot.point.filter(Point::is_valid) else {
        return Ok(());
    };

    dispatch.dispatch(Action::RequestZones);
    let url = seedzones_url(ctx, &point, None);
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        match task_io.get_json::<SeedZonesResponse>(&url).await {
            Ok(response) => {
                task_io.dispatch(&dispatch, Action::ReceiveAvailableSpecies(response.species()));
            }
            Err(e) if e.is_stale() => debug!(subscription = "available-species", "stale result dropped"),
            Err(e) => {
                warn!(subscription = "available-species", error = %e, "seed zone lookup failed");
                task_io.dispatch(&dispatch, Action::FailZones);
            }
        }
    });
    Ok(())
}

fn on_zones(
    ctx: &SyncContext,
    snapshot: &ZonesSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
) -> Result<(), SyncError> {
    if snapshot.method != Method::Seedzone {
        return Ok(());
    }
    let Some(point) = snapshot.point.filter(Point::is_valid) else {
        return Ok(());
    };

    dispatch.dispatch(Action::RequestZones);
    let url = seedzones_url(ctx, &point, Some(&snapshot.species));
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        match task_io.get_json::<SeedZonesResponse>(&url).await {
            Ok(response) => {
                debug!(count = response.results.len(), "seed zones received");
                task_io.dispatch(&dispatch, Action::ReceiveZones(response.results));
            }
            Err(e) if e.is_stale() => debug!(subscription = "zones", "stale result dropped"),
            Err(e) => {
                warn!(subscription = "zones", error = %e, "seed zone lookup failed");
                task_io.dispatch(&dispatch, Action::FailZones);
            }
        }
    });
    Ok(())
}

fn on_geometry(
    ctx: &SyncContext,
    snapshot: &GeometrySnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
) -> Result<(), SyncError> {
    let Some(zone) = snapshot.zone.as_ref().filter(|_| !snapshot.has_geometry) else {
        return Ok(());
    };

    dispatch.dispatch(Action::RequestGeometry);
    let url = ctx.api_url(&format!("seedzones/{}/geometry/", encode_component(zone)));
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        match task_io.get_json::<Value>(&url).await {
            Ok(geometry) => {
                task_io.dispatch(&dispatch, Action::ReceiveGeometry(geometry));
            }
            Err(e) if e.is_stale() => debug!(subscription = "zone-geometry", "stale result dropped"),
            Err(e) => {
                warn!(subscription = "zone-geometry", error = %e, "zone geometry lookup failed");
                task_io.dispatch(&dispatch, Action::FailGeometry);
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::Harness;
    use serde_json::json;

    fn seedzone_state() -> AppState {
        let mut state = AppState::default();
        state.run_configuration.method = Method::Seedzone;
        state.run_configuration.point = Some(Point::from_lat_lon(45.0, -123.0));
        state
    }

    fn zone(uid: &str, species: &str) -> Value {
        json!({
            "zone_uid": uid,
            "name": format!("Zone {}", uid),
            "species": species,
            "elevation_at_point": 120.0,
            "elevation_band": [0, 500]
        })
    }

    #[tokio::test]
    async fn test_zones_and_geometry_follow_point() {
        let h = Harness::new(seedzone_state());
        h.mock.respond(
            "species=generic",
            200,
            json!({"results": [zone("generic_1", "generic")]}),
        );
        h.mock.respond("generic_1/geometry/", 200, json!({"type": "Polygon"}));
        h.mock.respond(
            "seedzones/?point",
            200,
            json!({"results": [zone("generic_1", "generic"), zone("psme_1", "psme"), zone("psme_2", "psme")]}),
        );
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::Initialize);
        h.settle().await;

        let rc = h.state().run_configuration;
        assert_eq!(rc.available_species, ["generic", "psme"]);
        assert_eq!(rc.zones.matched.len(), 1);
        assert_eq!(rc.zones.selected.as_deref(), Some("generic_1"));
        assert_eq!(rc.zones.elevation_at_point, Some(120.0));
        assert_eq!(rc.zones.geometry, Some(json!({"type": "Polygon"})));
        assert!(!rc.zones.is_fetching_zones);
        assert!(!rc.zones.is_fetching_geometry);
    }

    #[tokio::test]
    async fn test_other_methods_do_not_look_up_zones() {
        let mut state = seedzone_state();
        state.run_configuration.method = Method::Custom;
        let h = Harness::new(state);
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::Initialize);
        h.settle().await;

        assert!(h.mock.urls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_zone_lookup_clears_fetching() {
        let h = Harness::new(seedzone_state());
        h.mock.respond("seedzones/", 500, json!({}));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::Initialize);
        h.settle().await;

        let zones = h.state().run_configuration.zones;
        assert!(!zones.is_fetching_zones);
        assert!(zones.matched.is_empty());
    }

    #[tokio::test]
    async fn test_failed_geometry_clears_selection() {
        let mut state = AppState::default();
        state.run_configuration.zones.selected = Some("psme_1".to_string());
        let h = Harness::new(state);
        h.mock.respond("geometry/", 404, json!({}));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::Initialize);
        h.settle().await;

        let zones = h.state().run_configuration.zones;
        assert_eq!(zones.selected, None);
        assert!(!zones.is_fetching_geometry);
        assert_eq!(h.mock.count("/sst/seedzones/psme_1/geometry/"), 1);
    }

    #[test]
    fn test_seedzones_url() {
        let ctx = SyncContext::default();
        let point = Point::from_lat_lon(45.0, -123.0);
        assert_eq!(
            seedzones_url(&ctx, &point, Some("psme")),
            "/sst/seedzones/?point=-123%2C45&species=psme"
        );
    }
}
