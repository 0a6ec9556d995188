//! Values of custom functions.

use std::sync::Arc;

use super::bridge::{spawn_evaluation, FormulaInputs};
use super::diff::only_changed;
use super::{StateReader, SyncContext, SyncError};
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState, Climate, Objective};
use crate::store::Dispatcher;

const SUBSCRIPTION: &str = "functions";

/// The parts of a custom function that determine its value.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub id: String,
    pub name: String,
    pub func: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionsSnapshot {
    pub objective: Objective,
    pub climate: Climate,
    pub region: Option<String>,
    pub point: Option<Point>,
    pub functions: Vec<FunctionDescriptor>,
}

pub fn select(state: &AppState) -> FunctionsSnapshot {
    let rc = &state.run_configuration;
    FunctionsSnapshot {
        objective: rc.objective,
        climate: rc.climate.clone(),
        region: rc.region.clone(),
        point: rc.point,
        functions: rc
            .custom_functions
            .iter()
            .map(|f| FunctionDescriptor {
                id: f.id.clone(),
                name: f.name.clone(),
                func: f.func.clone(),
                selected: f.selected,
            })
            .collect(),
    }
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let ctx = Arc::clone(ctx);
    let reader = StateReader::new(watcher.store());
    vec![watcher.register(SUBSCRIPTION, select, move |snapshot, io, dispatch, previous| {
        on_functions(&ctx, &reader, snapshot, io, dispatch, previous)
    })]
}

/// Functions to re-evaluate.
///
/// After a change to anything but the functions, all of them. Otherwise the
/// new or edited ones, plus selected ones still being fetched, since that
/// evaluation belongs to the firing this one supersedes. Functions that
/// settled without a value are left alone.
fn work_items(
    snapshot: &FunctionsSnapshot,
    previous: Option<&FunctionsSnapshot>,
    in_flight: &[String],
) -> Vec<FunctionDescriptor> {
    let functions_only = only_changed(previous, snapshot, |s| s.functions.clear());
    let Some(previous) = previous.filter(|_| functions_only) else {
        return snapshot.functions.clone();
    };

    snapshot
        .functions
        .iter()
        .filter(|f| {
            let changed = !previous.functions.contains(f);
            changed || (f.selected && in_flight.contains(&f.id))
        })
        .cloned()
        .collect()
}

fn on_functions(
    ctx: &Arc<SyncContext>,
    reader: &StateReader,
    snapshot: &FunctionsSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
    previous: Option<&FunctionsSnapshot>,
) -> Result<(), SyncError> {
    let (Some(point), Some(region)) = (snapshot.point.filter(Point::is_valid), snapshot.region.clone())
    else {
        return Ok(());
    };

    let in_flight = reader
        .read(|state| {
            state
                .run_configuration
                .custom_functions
                .iter()
                .filter(|f| f.is_fetching)
                .map(|f| f.id.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let inputs = Arc::new(FormulaInputs {
        objective: snapshot.objective,
        climate: snapshot.climate.clone(),
        region,
        point,
    });

    for function in work_items(snapshot, previous, &in_flight) {
        dispatch.dispatch(Action::SetFunctionValue {
            id: function.id.clone(),
            value: None,
        });
        if !function.selected {
            continue;
        }

        dispatch.dispatch(Action::RequestFunctionValue(function.id.clone()));
        let id = function.id;
        spawn_evaluation(
            SUBSCRIPTION,
            ctx,
            &io,
            dispatch,
            function.func,
            Arc::clone(&inputs),
            move |value| Action::SetFunctionValue { id, value },
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{pixel, Harness};
    use serde_json::json;

    fn located() -> AppState {
        let mut state = AppState::default();
        state.run_configuration.point = Some(Point::from_lat_lon(45.0, -123.0));
        state.run_configuration.region = Some("west2".to_string());
        state
    }

    fn descriptor(id: &str, func: &str, selected: bool) -> FunctionDescriptor {
        FunctionDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            func: func.to_string(),
            selected,
        }
    }

    fn value(state: &AppState, id: &str) -> Option<f64> {
        state.run_configuration.custom_function(id).and_then(|f| f.value)
    }

    #[test]
    fn test_work_items_after_edit() {
        let previous = select(&located());
        let mut current = previous.clone();
        let mut before = previous.clone();
        before.functions = vec![descriptor("fn-1", "MAT", true), descriptor("fn-2", "MAP", true)];
        current.functions = vec![descriptor("fn-1", "MAT", true), descriptor("fn-2", "MAP * 2", true)];

        let items = work_items(&current, Some(&before), &[]);
        assert_eq!(items, [descriptor("fn-2", "MAP * 2", true)]);

        let items = work_items(&current, Some(&before), &["fn-1".to_string()]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_work_items_after_other_change() {
        let mut before = select(&located());
        before.functions = vec![descriptor("fn-1", "MAT", true)];
        let mut current = before.clone();
        current.region = Some("ak2".to_string());

        assert_eq!(work_items(&current, Some(&before), &[]).len(), 1);
    }

    #[tokio::test]
    async fn test_created_function_is_evaluated() {
        let h = Harness::new(located());
        h.mock.respond("west2_1961_1990Y_MAT", 200, pixel(125.0));
        h.mock.respond("west2_1961_1990Y_MAP", 200, pixel(800.0));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::Initialize);
        h.dispatch(Action::CreateFunction {
            name: "moisture".to_string(),
            func: "MAP / MAT".to_string(),
        });
        h.settle().await;

        assert_eq!(value(&h.state(), "fn-1"), Some(6.4));
        assert!(!h.state().run_configuration.custom_functions[0].is_fetching);
    }

    #[tokio::test]
    async fn test_failed_input_yields_none() {
        let h = Harness::new(located());
        h.mock.respond("_MAT", 200, pixel(125.0));
        h.mock.respond("_MAP", 500, json!({}));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::CreateFunction {
            name: "sum".to_string(),
            func: "MAT + MAP".to_string(),
        });
        h.settle().await;

        let state = h.state();
        assert_eq!(value(&state, "fn-1"), None);
        assert!(!state.run_configuration.custom_functions[0].is_fetching);
    }

    #[tokio::test]
    async fn test_deselected_function_is_cleared_without_requests() {
        let h = Harness::new(located());
        h.mock.respond("_MAT", 200, pixel(125.0));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::CreateFunction {
            name: "warmth".to_string(),
            func: "MAT".to_string(),
        });
        h.settle().await;
        assert_eq!(value(&h.state(), "fn-1"), Some(125.0));

        h.dispatch(Action::ToggleFunction("fn-1".to_string()));
        h.settle().await;

        assert_eq!(value(&h.state(), "fn-1"), None);
        assert_eq!(h.mock.count("_MAT/"), 1);
    }

    #[tokio::test]
    async fn test_unrelated_function_not_refetched() {
        let h = Harness::new(located());
        h.mock.respond("_MAT", 200, pixel(125.0));
        h.mock.respond("_MAP", 200, pixel(800.0));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::CreateFunction {
            name: "a".to_string(),
            func: "MAT".to_string(),
        });
        h.settle().await;
        h.dispatch(Action::CreateFunction {
            name: "b".to_string(),
            func: "MAP".to_string(),
        });
        h.settle().await;

        assert_eq!(h.mock.count("_MAT/"), 1);
        assert_eq!(h.mock.count("_MAP/"), 1);
        assert_eq!(value(&h.state(), "fn-1"), Some(125.0));
        assert_eq!(value(&h.state(), "fn-2"), Some(800.0));
    }

    #[tokio::test]
    async fn test_failed_function_not_refetched_by_sibling_changes() {
        let h = Harness::new(located());
        h.mock.respond("_MAT", 200, pixel(125.0));
        h.mock.respond("_MAP", 500, json!({}));
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::CreateFunction {
            name: "sum".to_string(),
            func: "MAT + MAP".to_string(),
        });
        h.settle().await;
        assert_eq!(value(&h.state(), "fn-1"), None);

        h.dispatch(Action::CreateFunction {
            name: "latitude".to_string(),
            func: "LAT".to_string(),
        });
        h.settle().await;
        h.dispatch(Action::ToggleFunction("fn-2".to_string()));
        h.settle().await;

        assert_eq!(h.mock.count("_MAP/"), 1);
        assert_eq!(value(&h.state(), "fn-1"), None);
    }

    #[tokio::test]
    async fn test_in_flight_function_reissued_by_sibling_creation() {
        let h = Harness::new(located());
        h.mock.hold("_MAT");
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::CreateFunction {
            name: "warmth".to_string(),
            func: "MAT".to_string(),
        });
        while h.mock.parked("_MAT") == 0 {
            tokio::task::yield_now().await;
        }

        h.dispatch(Action::CreateFunction {
            name: "latitude".to_string(),
            func: "LAT".to_string(),
        });
        while h.mock.parked("_MAT") < 2 {
            tokio::task::yield_now().await;
        }

        assert!(h.mock.release("_MAT", 200, pixel(1.0)));
        assert!(h.mock.release("_MAT", 200, pixel(125.0)));
        h.settle().await;

        let state = h.state();
        assert_eq!(value(&state, "fn-1"), Some(125.0));
        assert_eq!(value(&state, "fn-2"), Some(45.0));
        assert!(!state.run_configuration.custom_functions[0].is_fetching);
    }

    #[tokio::test]
    async fn test_no_region_no_requests() {
        let mut state = located();
        state.run_configuration.region = None;
        let h = Harness::new(state);
        let _r = register(&h.watcher, &h.ctx);

        h.dispatch(Action::CreateFunction {
            name: "a".to_string(),
            func: "MAT".to_string(),
        });
        h.settle().await;

        assert!(h.mock.urls().is_empty());
    }
}
