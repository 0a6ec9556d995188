//! Values of configured traits.

use std::sync::Arc;

use tracing::warn;

use super::bridge::{spawn_evaluation, FormulaInputs};
use super::diff::only_changed;
use super::{StateReader, SyncContext, SyncError};
use crate::point::Point;
use crate::resync::{Io, Registration, Watcher};
use crate::state::{Action, AppState, Climate, Objective};
use crate::store::Dispatcher;

const SUBSCRIPTION: &str = "traits";

#[derive(Debug, Clone, PartialEq)]
pub struct TraitsSnapshot {
    pub objective: Objective,
    pub point: Option<Point>,
    pub climate: Climate,
    pub traits: Vec<String>,
    pub region: Option<String>,
    pub species: String,
}

pub fn select(state: &AppState) -> TraitsSnapshot {
    let rc = &state.run_configuration;
    TraitsSnapshot {
        objective: rc.objective,
        point: rc.point,
        climate: rc.climate.clone(),
        traits: rc.traits.iter().map(|t| t.name.clone()).collect(),
        region: rc.region.clone(),
        species: rc.species.clone(),
    }
}

pub fn register(watcher: &Watcher<AppState, Action>, ctx: &Arc<SyncContext>) -> Vec<Registration> {
    let ctx = Arc::clone(ctx);
    let reader = StateReader::new(watcher.store());
    vec![watcher.register(SUBSCRIPTION, select, move |snapshot, io, dispatch, previous| {
        on_traits(&ctx, &reader, snapshot, io, dispatch, previous)
    })]
}

fn on_traits(
    ctx: &Arc<SyncContext>,
    reader: &StateReader,
    snapshot: &TraitsSnapshot,
    io: Io,
    dispatch: &Dispatcher<Action>,
    previous: Option<&TraitsSnapshot>,
) -> Result<(), SyncError> {
    let (Some(point), Some(region)) = (snapshot.point.filter(Point::is_valid), snapshot.region.clone())
    else {
        return Ok(());
    };

    let traits_only = only_changed(previous, snapshot, |s| s.traits.clear());
    let items: Vec<(usize, String)> = reader
        .read(|state| {
            state
                .run_configuration
                .traits
                .iter()
                .enumerate()
                .filter(|(_, t)| !traits_only || t.value.is_none())
                .map(|(index, t)| (index, t.name.clone()))
                .collect()
        })
        .unwrap_or_default();

    let inputs = Arc::new(FormulaInputs {
        objective: snapshot.objective,
        climate: snapshot.climate.clone(),
        region,
        point,
    });

    for (index, name) in items {
        dispatch.dispatch(Action::SetTraitValue { index, value: None });

        let Some(function) = ctx.trait_function(&name) else {
            warn!(subscription = SUBSCRIPTION, trait_name = %name, "no function configured for trait");
            continue;
        };

        dispatch.dispatch(Action::RequestTraitValue(index));
        spawn_evaluation(
            SUBSCRIPTION,
            ctx,
            &io,
            dispatch,
            function.func.clone(),
            Arc::clone(&inputs),
            move |value| Action::SetTraitValue { index, value },
        );
    }
    Ok(())
}
