//! Arguments and output shared by the engine commands.

use clap::{Args, ValueEnum};
use serde_json::{json, Value};
use seedsync::state::{Action, AppState, ClimateSide, Method, Objective};
use seedsync::Point;

use crate::error::CliError;

/// Objective selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ObjectiveArg {
    /// Find seedlots for a planting site
    Seedlots,
    /// Find planting sites for a seedlot
    Sites,
}

impl From<ObjectiveArg> for Objective {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::Seedlots => Objective::Seedlots,
            ObjectiveArg::Sites => Objective::Sites,
        }
    }
}

/// Transfer limit method for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum MethodArg {
    /// Limits from the seed zone at the point
    Seedzone,
    /// Limits entered by hand
    Custom,
    /// Custom functions only
    Function,
    /// Configured species traits
    Trait,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Seedzone => Method::Seedzone,
            MethodArg::Custom => Method::Custom,
            MethodArg::Function => Method::Function,
            MethodArg::Trait => Method::Trait,
        }
    }
}

/// Inputs of a run, applied to the engine as actions.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Latitude of the point, in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the point, in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Climate variables to read (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "MAT,MAP")]
    pub variables: Vec<String>,

    #[arg(long, value_enum, default_value = "seedlots")]
    pub objective: ObjectiveArg,

    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    /// Species for seed zones and traits
    #[arg(long)]
    pub species: Option<String>,

    /// Climate period of the evaluated side, e.g. 1961_1990 or 2055
    #[arg(long)]
    pub time: Option<String>,

    /// Emissions scenario for future periods, e.g. rcp45
    #[arg(long)]
    pub model: Option<String>,

    /// Custom function as NAME=FORMULA (repeatable)
    #[arg(long = "function")]
    pub functions: Vec<String>,
}

impl QueryArgs {
    pub fn point(&self) -> Result<Point, CliError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CliError::InvalidArgument(format!(
                "latitude {} is outside -90..90",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(CliError::InvalidArgument(format!(
                "longitude {} is outside -180..180",
                self.lon
            )));
        }
        Ok(Point::from_lat_lon(self.lat, self.lon))
    }

    /// Actions that set up the run. The point comes last, so every handler
    /// fires once against the complete configuration.
    pub fn actions(&self) -> Result<Vec<Action>, CliError> {
        let point = self.point()?;
        let objective = Objective::from(self.objective);
        // Values are read for the planting site's climate when looking for
        // seedlots, and for the seedlot's climate otherwise.
        let side = match objective {
            Objective::Seedlots => ClimateSide::Site,
            Objective::Sites => ClimateSide::Seedlot,
        };

        let mut actions = vec![Action::SelectObjective(objective)];
        if let Some(method) = self.method {
            actions.push(Action::SelectMethod(method.into()));
        }
        if let Some(species) = &self.species {
            actions.push(Action::SelectSpecies(species.clone()));
        }
        if let Some(model) = &self.model {
            actions.push(Action::SelectClimateModel {
                climate: side,
                model: model.clone(),
            });
        }
        if let Some(time) = &self.time {
            actions.push(Action::SelectClimateYear {
                climate: side,
                year: time.clone(),
            });
        }

        let variables: Vec<String> = self
            .variables
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if !variables.is_empty() {
            actions.push(Action::AddVariables(variables));
        }

        for function in &self.functions {
            let (name, func) = parse_assignment(function)?;
            actions.push(Action::CreateFunction {
                name,
                func: func.to_string(),
            });
        }

        actions.push(Action::SetPoint(point));
        Ok(actions)
    }
}

/// Split `NAME=VALUE` at the first `=`.
pub fn parse_assignment(s: &str) -> Result<(String, &str), CliError> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.trim())),
        _ => Err(CliError::InvalidArgument(format!(
            "expected NAME=VALUE, got '{}'",
            s
        ))),
    }
}

/// The derived values of a settled state, as printed by the commands.
pub fn report(state: &AppState) -> Value {
    let rc = &state.run_configuration;
    json!({
        "point": rc.point.map(|p| json!({"lat": p.lat(), "lon": p.lon()})),
        "region": rc.region,
        "elevation": rc.elevation,
        "variables": rc.variables.iter().map(|v| json!({
            "name": v.name,
            "value": v.value,
            "transfer": v.transfer,
            "avg_transfer": v.avg_transfer,
            "center": v.zone_center,
        })).collect::<Vec<_>>(),
        "functions": rc.custom_functions.iter().map(|f| json!({
            "name": f.name,
            "func": f.func,
            "value": f.value,
        })).collect::<Vec<_>>(),
        "traits": rc.traits.iter().map(|t| json!({
            "name": t.name,
            "value": t.value,
        })).collect::<Vec<_>>(),
        "zone": rc.zones.selected,
        "species": rc.species,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> QueryArgs {
        QueryArgs {
            lat: 45.0,
            lon: -123.0,
            variables: vec!["MAT".to_string(), " MAP ".to_string()],
            objective: ObjectiveArg::Seedlots,
            method: None,
            species: None,
            time: Some("2055".to_string()),
            model: Some("rcp85".to_string()),
            functions: vec!["warmth=MAT / 10".to_string()],
        }
    }

    #[test]
    fn test_actions_end_with_point() {
        let actions = args().actions().unwrap();
        assert_eq!(actions.first(), Some(&Action::SelectObjective(Objective::Seedlots)));
        assert_eq!(
            actions.last(),
            Some(&Action::SetPoint(Point::from_lat_lon(45.0, -123.0)))
        );
        assert!(actions.contains(&Action::AddVariables(vec!["MAT".to_string(), "MAP".to_string()])));
        assert!(actions.contains(&Action::SelectClimateYear {
            climate: ClimateSide::Site,
            year: "2055".to_string(),
        }));
        assert!(actions.contains(&Action::CreateFunction {
            name: "warmth".to_string(),
            func: "MAT / 10".to_string(),
        }));
    }

    #[test]
    fn test_out_of_range_latitude() {
        let mut args = args();
        args.lat = 95.0;
        assert!(matches!(args.actions(), Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("a = b=c").unwrap(), ("a".to_string(), "b=c"));
        assert!(parse_assignment("=1").is_err());
        assert!(parse_assignment("MAT").is_err());
    }

    #[test]
    fn test_report_shape() {
        let state = AppState::default();
        let report = report(&state);
        assert_eq!(report["variables"], json!([]));
        assert_eq!(report["species"], json!("generic"));
        assert_eq!(report["point"], Value::Null);
    }
}
