//! Regions and elevation of the selected point.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{identify, regions_url, settle, RegionsResponse, StateReader, SyncContext, SyncError};
use crate::arcgis::dem_service_name;
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState, RegionMethod};
use crate::store::Dispatcher;

const SUBSCRIPTION: &str = "point";

#[derive(Debug, Clone, PartialEq)]
pub struct PointSnapshot {
    pub point: Option<Point>,
}

pub fn select(state: &AppState) -> PointSnapshot {
    PointSnapshot {
        point: state.run_configuration.point,
    }
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let ctx = Arc::clone(ctx);
    let reader = StateReader::new(watcher.store());
    vec![watcher.register(SUBSCRIPTION, select, move |snapshot, io, dispatch, _| {
        on_point(&ctx, &reader, snapshot, io, dispatch)
    })]
}

fn on_point(
    ctx: &Arc<SyncContext>,
    reader: &StateReader,
    snapshot: &PointSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
) -> Result<(), SyncError> {
    let Some(point) = snapshot.point.filter(Point::is_valid) else {
        return Ok(());
    };

    dispatch.dispatch(Action::RequestRegions);

    let url = regions_url(ctx, &point);
    let reader = reader.clone();
    let dispatch = dispatch.clone();
    let task_io = io.clone();
    io.spawn(async move {
        let io = task_io;
        let regions = match io.get_json::<RegionsResponse>(&url).await {
            Ok(response) => response.names(),
            Err(e) if e.is_stale() => return,
            Err(e) => {
                warn!(subscription = SUBSCRIPTION, error = %e, "region lookup failed");
                Vec::new()
            }
        };

        let region = regions.first().cloned();
        if !io.dispatch(&dispatch, Action::ReceiveRegions(regions)) {
            return;
        }
        if reader.read(|s| s.run_configuration.region_method) == Some(RegionMethod::Auto) {
            io.dispatch(&dispatch, Action::SetRegion(region.clone()));
        }

        let Some(region) = region else {
            debug!(%point, "point is outside every region");
            return;
        };

        let result = identify(&io, &dem_service_name(&region), &point).await;
        if let Some(elevation) = settle(SUBSCRIPTION, "elevation", result) {
            io.dispatch(&dispatch, Action::SetElevation(elevation));
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{pixel, regions, Harness};
    use serde_json::json;

    #[tokio::test]
    async fn test_point_resolves_region_and_elevation() {
        let h = Harness::new(AppState::default());
        h.mock.respond("/sst/regions/", 200, regions(&["west2", "nc1"]));
        h.mock.respond("west2_dem", 200, pixel(312.0));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
        h.settle().await;

        let rc = h.state().run_configuration;
        assert_eq!(rc.valid_regions, ["west2", "nc1"]);
        assert_eq!(rc.region.as_deref(), Some("west2"));
        assert_eq!(rc.elevation, Some(312.0));
        assert!(h.mock.urls()[0].ends_with("regions/?point=-123%2C45"));
    }

    #[tokio::test]
    async fn test_custom_region_is_kept() {
        let h = Harness::new(AppState::default());
        h.mock.respond("/sst/regions/", 200, regions(&["west2"]));
        h.mock.respond("west2_dem", 200, pixel(10.0));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetRegion(Some("ak2".to_string())));
        h.dispatch(Action::SelectRegionMethod(RegionMethod::Custom));
        h.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
        h.settle().await;

        let rc = h.state().run_configuration;
        assert_eq!(rc.region.as_deref(), Some("ak2"));
        assert_eq!(rc.valid_regions, ["west2"]);
    }

    #[tokio::test]
    async fn test_no_point_issues_no_requests() {
        let h = Harness::new(AppState::default());
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::Initialize);
        h.dispatch(Action::SetPoint(Point::new(f64::NAN, 45.0)));
        h.settle().await;

        assert!(h.mock.urls().is_empty());
    }

    #[tokio::test]
    async fn test_new_point_has_no_elevation_until_resolved() {
        let h = Harness::new(AppState::default());
        h.mock.respond("point=-123%2C45", 200, regions(&["west2"]));
        h.mock.respond("point=-120%2C44", 200, regions(&["nc1"]));
        h.mock.respond("west2_dem", 200, pixel(312.0));
        h.mock.hold("nc1_dem");
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
        h.settle().await;
        assert_eq!(h.state().run_configuration.elevation, Some(312.0));

        h.dispatch(Action::SetPoint(Point::from_lat_lon(44.0, -120.0)));
        while h.mock.parked("nc1_dem") == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.state().run_configuration.elevation, None);

        h.mock.release("nc1_dem", 200, pixel(95.0));
        h.settle().await;
        assert_eq!(h.state().run_configuration.elevation, Some(95.0));
    }

    #[tokio::test]
    async fn test_failed_elevation_clears_it() {
        let h = Harness::new(AppState::default());
        h.mock.respond("/sst/regions/", 200, regions(&["west2"]));
        h.mock.respond("west2_dem", 500, json!({}));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::SetPoint(Point::from_lat_lon(45.0, -123.0)));
        h.settle().await;

        assert_eq!(h.state().run_configuration.elevation, None);
    }
}
