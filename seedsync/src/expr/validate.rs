//! Validation of user-entered custom functions.

use std::collections::HashMap;

use thiserror::Error;

use super::{ExpressionEngine, ExpressionError};

/// Value every variable takes during the trial evaluation.
const TRIAL_VALUE: f64 = 2.0;

/// Why a custom function cannot be saved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FunctionValidationError {
    #[error("Name is required")]
    MissingName,

    #[error("Invalid formula: {message} (line {line}, column {column})")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Formula must reference at least one variable")]
    NoVariables,

    #[error("Unknown variable(s): {}", .0.join(", "))]
    UnknownVariables(Vec<String>),

    #[error("Formula cannot be evaluated: {0}")]
    Evaluation(String),
}

/// Check a custom function before it is saved.
///
/// Returns the variables the formula references. `known` lists every
/// variable the engine can fetch, including the latitude variable.
pub fn validate_function(
    engine: &dyn ExpressionEngine,
    name: &str,
    func: &str,
    known: &[String],
) -> Result<Vec<String>, FunctionValidationError> {
    if name.trim().is_empty() {
        return Err(FunctionValidationError::MissingName);
    }

    let names = engine.names(func).map_err(|e| match e {
        ExpressionError::Parse {
            message,
            line,
            column,
        } => FunctionValidationError::Parse {
            message,
            line,
            column,
        },
        other => FunctionValidationError::Evaluation(other.to_string()),
    })?;

    if names.is_empty() {
        return Err(FunctionValidationError::NoVariables);
    }

    let unknown: Vec<String> = names.iter().filter(|n| !known.contains(n)).cloned().collect();
    if !unknown.is_empty() {
        return Err(FunctionValidationError::UnknownVariables(unknown));
    }

    let context: HashMap<String, f64> = names.iter().map(|n| (n.clone(), TRIAL_VALUE)).collect();
    engine
        .evaluate(func, &context)
        .map_err(|e| FunctionValidationError::Evaluation(e.to_string()))?;

    Ok(names)
}
