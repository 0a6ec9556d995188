//! SeedSync CLI - Command-line interface
//!
//! Drives the sync engine against a seed source backend and exposes the
//! formula tools used when editing custom functions.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use seedsync::config::config_file_path;

use commands::common::QueryArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "seedsync")]
#[command(version, about = "Keep climate values in step with a seedlot selection run", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/seedsync/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a point and print its derived values as JSON
    Values(QueryArgs),

    /// Resolve a point and keep reporting settled states until Ctrl+C
    Watch(QueryArgs),

    /// Validate a custom function
    Check {
        /// Function name
        name: String,

        /// Formula over climate variables, e.g. "MAT / 10 + LAT"
        formula: String,
    },

    /// Evaluate a formula with given variable values
    Eval {
        formula: String,

        /// Variable value as NAME=VALUE (repeatable)
        #[arg(long = "var")]
        vars: Vec<String>,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config_file_path);
            commands::init::run(&path, force)
        }
        Commands::Eval { formula, vars } => commands::eval::run(&formula, &vars),
        Commands::Check { name, formula } => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;
            commands::check::run(&runner, &name, &formula)
        }
        Commands::Values(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;
            commands::values::run(&runner, args)
        }
        Commands::Watch(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;
            commands::watch::run(&runner, args)
        }
    }
}
