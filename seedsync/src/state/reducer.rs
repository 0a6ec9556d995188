//! Reducer for [`AppState`].
//!
//! The top-level reducer updates run configuration fields first and then lets
//! each collection reducer (variables, zones, functions, traits, popup,
//! legends) react to the same action, so one action can touch several parts
//! of the state.

use crate::store::Reducer;

use super::{
    Action, AppState, CustomFunction, Legends, Method, Popup, PopupValue, RegionMethod,
    RunConfiguration, TraitEntry, Variable, Zones, GENERIC_SPECIES, REGIONS, RESULTS_LAYER,
};
use crate::config::TraitFunction;

impl Reducer<Action> for AppState {
    fn reduce(&mut self, action: &Action) {
        reduce_run_configuration(&mut self.run_configuration, action, &self.trait_functions);
        reduce_variables(&mut self.run_configuration.variables, action);
        reduce_zones(&mut self.run_configuration.zones, action);
        reduce_custom_functions(&mut self.run_configuration, action);
        reduce_traits(&mut self.run_configuration.traits, action, &self.trait_functions);
        reduce_popup(&mut self.popup, action);
        reduce_legends(&mut self.legends, action);
        reduce_layers(self, action);
    }
}

fn reduce_run_configuration(
    rc: &mut RunConfiguration,
    action: &Action,
    trait_functions: &[TraitFunction],
) {
    match action {
        Action::SelectObjective(objective) => rc.objective = *objective,
        Action::SetPoint(point) => {
            rc.point = Some(*point);
            rc.elevation = None;
        }
        Action::SetElevation(elevation) => rc.elevation = *elevation,
        Action::SelectClimateYear { climate, year } => {
            rc.climate.side_mut(*climate).time = year.clone();
        }
        Action::SelectClimateModel { climate, model } => {
            rc.climate.side_mut(*climate).model = Some(model.clone());
        }
        Action::SelectMethod(method) => {
            rc.method = *method;
            match method {
                Method::Seedzone if !rc.available_species.contains(&rc.species) => {
                    rc.species = GENERIC_SPECIES.to_string();
                }
                Method::Trait => {
                    let species: Vec<&String> =
                        trait_functions.iter().flat_map(|f| f.species.iter()).collect();
                    if !species.contains(&&rc.species) {
                        if let Some(first) = species.first() {
                            rc.species = (*first).clone();
                        }
                    }
                }
                _ => {}
            }
        }
        Action::SelectSpecies(species) => rc.species = species.clone(),
        Action::ReceiveAvailableSpecies(species) => {
            rc.available_species = species.clone();
            if let Some(first) = species.first() {
                if !species.contains(&rc.species) {
                    rc.species = first.clone();
                }
            }
        }
        Action::RequestRegions => rc.is_fetching_regions = true,
        Action::ReceiveRegions(regions) => {
            rc.valid_regions = regions.clone();
            rc.is_fetching_regions = false;
        }
        Action::SetRegion(region) => rc.region = region.clone(),
        Action::SelectRegionMethod(method) => {
            rc.region_method = *method;
            match method {
                RegionMethod::Auto => rc.region = rc.valid_regions.first().cloned(),
                RegionMethod::Custom if rc.region.is_none() => {
                    rc.region = REGIONS.first().map(|r| r.to_string());
                }
                RegionMethod::Custom => {}
            }
        }
        Action::SetVariablesRegion(region) => rc.variables_region = region.clone(),
        _ => {}
    }
}

fn reduce_variables(variables: &mut Vec<Variable>, action: &Action) {
    fn update(variables: &mut [Variable], name: &str, f: impl FnOnce(&mut Variable)) {
        if let Some(variable) = variables.iter_mut().find(|v| v.name == name) {
            f(variable);
        }
    }

    match action {
        Action::AddVariables(names) => {
            for name in names {
                if !variables.iter().any(|v| &v.name == name) {
                    variables.push(Variable::new(name.clone()));
                }
            }
        }
        Action::RemoveVariable(index) if *index < variables.len() => {
            variables.remove(*index);
        }
        Action::ModifyTransfer { variable, transfer } => update(variables, variable, |v| {
            v.transfer = Some(*transfer);
            v.transfer_is_modified = true;
        }),
        Action::ResetTransfer(variable) => update(variables, variable, |v| {
            v.transfer = v.default_transfer;
            v.transfer_is_modified = false;
        }),
        Action::RequestValue(variable) => update(variables, variable, |v| v.is_fetching = true),
        Action::ReceiveValue { variable, value } => update(variables, variable, |v| {
            v.is_fetching = false;
            v.value = *value;
        }),
        Action::SetPoint(_) => {
            for v in variables.iter_mut() {
                v.is_fetching = false;
                v.value = None;
                v.reset_transfer();
            }
        }
        Action::SelectObjective(_)
        | Action::SelectClimateYear { .. }
        | Action::SelectClimateModel { .. } => {
            for v in variables.iter_mut() {
                v.is_fetching = false;
                v.default_transfer = None;
                v.value = None;
            }
        }
        Action::SelectMethod(Method::Trait | Method::Function) => variables.clear(),
        Action::SelectMethod(_) | Action::SelectZone(_) => {
            for v in variables.iter_mut() {
                v.reset_transfer();
            }
        }
        Action::RequestTransfer(variable) => {
            update(variables, variable, |v| v.is_fetching_transfer = true)
        }
        Action::ReceiveTransfer {
            variable,
            transfer,
            avg_transfer,
            center,
        } => update(variables, variable, |v| {
            v.is_fetching_transfer = false;
            v.default_transfer = *transfer;
            v.avg_transfer = *avg_transfer;
            v.zone_center = *center;
            if !v.transfer_is_modified {
                v.transfer = *transfer;
            }
        }),
        _ => {}
    }
}

fn reduce_zones(zones: &mut Zones, action: &Action) {
    match action {
        Action::ReceiveZones(matched) => {
            zones.matched = matched.clone();
            zones.is_fetching_zones = false;
            zones.elevation_at_point = matched.first().and_then(|z| z.elevation_at_point);

            let still_matched = zones
                .selected
                .as_ref()
                .is_some_and(|selected| matched.iter().any(|z| &z.zone_uid == selected));
            if !still_matched {
                zones.selected = None;
                zones.geometry = None;
                zones.is_fetching_geometry = false;
            }
            if zones.selected.is_none() {
                zones.selected = matched.first().map(|z| z.zone_uid.clone());
            }
        }
        Action::SelectZone(zone) => {
            zones.selected = zone.clone();
            zones.geometry = None;
            zones.is_fetching_geometry = false;
        }
        Action::RequestZones => zones.is_fetching_zones = true,
        Action::FailZones => zones.is_fetching_zones = false,
        Action::RequestGeometry => zones.is_fetching_geometry = true,
        Action::ReceiveGeometry(geometry) => {
            zones.geometry = Some(geometry.clone());
            zones.is_fetching_geometry = false;
        }
        Action::FailGeometry => {
            zones.is_fetching_geometry = false;
            zones.geometry = None;
            zones.selected = None;
        }
        _ => {}
    }
}

fn reduce_custom_functions(rc: &mut RunConfiguration, action: &Action) {
    match action {
        Action::CreateFunction { name, func } => {
            let id = format!("fn-{}", rc.next_function_id);
            rc.next_function_id += 1;
            rc.custom_functions.push(CustomFunction {
                id,
                name: name.clone(),
                func: func.clone(),
                value: None,
                transfer: None,
                selected: true,
                is_fetching: false,
            });
        }
        Action::DeleteFunction(id) => rc.custom_functions.retain(|f| &f.id != id),
        Action::ToggleFunction(id) => {
            if let Some(f) = rc.custom_function_mut(id) {
                f.selected = !f.selected;
            }
        }
        Action::SetFunction { id, name, func } => {
            if let Some(f) = rc.custom_function_mut(id) {
                f.name = name.clone();
                f.func = func.clone();
            }
        }
        Action::RequestFunctionValue(id) => {
            if let Some(f) = rc.custom_function_mut(id) {
                f.is_fetching = true;
            }
        }
        Action::SetFunctionValue { id, value } => {
            if let Some(f) = rc.custom_function_mut(id) {
                f.value = *value;
                f.is_fetching = false;
            }
        }
        Action::SelectMethod(_) => {
            for f in rc.custom_functions.iter_mut() {
                f.selected = false;
            }
        }
        _ => {}
    }
}

fn reduce_traits(traits: &mut Vec<TraitEntry>, action: &Action, trait_functions: &[TraitFunction]) {
    match action {
        Action::AddTrait(name) => traits.push(TraitEntry::new(name.clone())),
        Action::RemoveTrait(index) if *index < traits.len() => {
            traits.remove(*index);
        }
        Action::RequestTraitValue(index) => {
            if let Some(t) = traits.get_mut(*index) {
                t.is_fetching = true;
            }
        }
        Action::SetTraitValue { index, value } => {
            if let Some(t) = traits.get_mut(*index) {
                t.value = *value;
                t.is_fetching = false;
            }
        }
        Action::SelectSpecies(species) => {
            *traits = trait_functions
                .iter()
                .filter(|f| f.species.contains(species))
                .map(|f| TraitEntry::new(f.name.clone()))
                .collect();
        }
        Action::SelectMethod(_) => traits.clear(),
        _ => {}
    }
}

fn reduce_popup(popup: &mut Popup, action: &Action) {
    fn update(popup: &mut Popup, name: &str, f: impl FnOnce(&mut PopupValue)) {
        if let Some(value) = popup.values.iter_mut().find(|v| v.name == name) {
            f(value);
        }
    }

    match action {
        Action::SetPopupLocation(point) => {
            popup.point = Some(*point);
            popup.elevation = None;
            for v in popup.values.iter_mut() {
                v.value = None;
            }
        }
        Action::ResetPopupLocation => {
            let values = popup
                .values
                .iter()
                .map(|v| PopupValue {
                    name: v.name.clone(),
                    ..PopupValue::default()
                })
                .collect();
            *popup = Popup {
                values,
                ..Popup::default()
            };
        }
        Action::RequestPopupValue(variable) => update(popup, variable, |v| {
            v.is_fetching = true;
            v.value = None;
        }),
        Action::ReceivePopupValue { variable, value } => update(popup, variable, |v| {
            v.is_fetching = false;
            v.value = *value;
        }),
        Action::AddVariables(names) => {
            for name in names {
                if !popup.values.iter().any(|v| &v.name == name) {
                    popup.values.push(PopupValue {
                        name: name.clone(),
                        ..PopupValue::default()
                    });
                }
            }
        }
        Action::RemoveVariable(index) if *index < popup.values.len() => {
            popup.values.remove(*index);
        }
        Action::SelectMethod(method) if !matches!(method, Method::Seedzone | Method::Custom) => {
            popup.values.clear();
        }
        Action::ReceivePopupElevation(elevation) => popup.elevation = *elevation,
        Action::RequestPopupRegion => popup.region = None,
        Action::ReceivePopupRegion(region) => popup.region = region.clone(),
        Action::ReceivePopupZones(zones) => popup.zones = zones.clone(),
        _ => {}
    }
}

fn reduce_legends(legends: &mut Legends, action: &Action) {
    match action {
        Action::ResetLegends => *legends = Legends::default(),
        Action::RequestLegend => legends.is_fetching = true,
        Action::ReceiveLegend(legend) => {
            legends.legends.insert(0, legend.clone());
            legends.is_fetching = false;
        }
        Action::FailLegend => legends.is_fetching = false,
        _ => {}
    }
}

fn reduce_layers(state: &mut AppState, action: &Action) {
    match action {
        Action::ToggleLayer(name) => {
            if let Some(index) = state.layers.iter().position(|l| l == name) {
                state.layers.remove(index);
            } else {
                state.layers.push(name.clone());
            }
        }
        Action::FinishJob { service_id } => {
            state.job.service_id = Some(service_id.clone());
            if !state.layers.iter().any(|l| l == RESULTS_LAYER) {
                state.layers.push(RESULTS_LAYER.to_string());
            }
        }
        _ => {}
    }
}
