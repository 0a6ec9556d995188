//! Formula evaluation
//!
//! Custom functions and traits are arithmetic formulas over climate variable
//! names. The sync handlers only depend on the [`ExpressionEngine`] trait:
//! discover the referenced names, then evaluate with a name/value context.
//! [`ArithmeticEngine`] is the built-in implementation.

mod arithmetic;
mod lexer;
mod validate;

use std::collections::HashMap;

use thiserror::Error;

pub use arithmetic::ArithmeticEngine;
pub use validate::{validate_function, FunctionValidationError};

/// Constant available in every formula, never fetched.
pub const MATH_E: &str = "math_e";

/// Errors from parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// Syntax error at a 1-based position.
    #[error("{message} (line {line}, column {column})")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}() takes {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },
}

impl ExpressionError {
    pub(crate) fn parse(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            column,
        }
    }
}

/// A formula language.
pub trait ExpressionEngine: Send + Sync {
    /// Variable names referenced by `formula`, first occurrence order, without
    /// duplicates and without built-in constants.
    fn names(&self, formula: &str) -> Result<Vec<String>, ExpressionError>;

    /// Evaluate `formula` with the given variable values.
    fn evaluate(&self, formula: &str, context: &HashMap<String, f64>) -> Result<f64, ExpressionError>;
}
