//! Check command - validate a custom function before saving it.

use seedsync::expr::{validate_function, ArithmeticEngine};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the check command.
pub fn run(runner: &CliRunner, name: &str, formula: &str) -> Result<(), CliError> {
    let config = runner.config();
    let mut known: Vec<String> = config.variables.iter().map(|v| v.name.clone()).collect();
    known.push(config.engine.latitude_variable.clone());

    let variables = validate_function(&ArithmeticEngine::new(), name, formula, &known)?;
    println!("{}: ok", name);
    println!("Variables: {}", variables.join(", "));
    Ok(())
}
