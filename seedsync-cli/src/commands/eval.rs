//! Eval command - evaluate a formula with given variable values.

use std::collections::HashMap;

use seedsync::expr::{ArithmeticEngine, ExpressionEngine};

use super::common::parse_assignment;
use crate::error::CliError;

/// Run the eval command.
pub fn run(formula: &str, vars: &[String]) -> Result<(), CliError> {
    let mut context = HashMap::new();
    for var in vars {
        let (name, value) = parse_assignment(var)?;
        let value: f64 = value.parse().map_err(|_| {
            CliError::InvalidArgument(format!("value of {} is not a number: '{}'", name, value))
        })?;
        context.insert(name, value);
    }

    println!("{}", evaluate(formula, &context)?);
    Ok(())
}

fn evaluate(formula: &str, context: &HashMap<String, f64>) -> Result<f64, CliError> {
    Ok(ArithmeticEngine::new().evaluate(formula, context)?)
}
