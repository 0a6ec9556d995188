//! Values command - resolve a point once and print the derived values.

use seedsync::{Engine, EngineConfig};

use super::common::{report, QueryArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the values command.
pub fn run(runner: &CliRunner, args: QueryArgs) -> Result<(), CliError> {
    runner.log_startup("values");
    let actions = args.actions()?;
    let config = EngineConfig::from_config_file(runner.config());

    let state = runner.runtime()?.block_on(async move {
        let engine = Engine::start(config)?;
        for action in actions {
            engine.dispatch(action);
        }
        engine.wait_idle().await;
        let state = engine.state();
        engine.shutdown();
        Ok::<_, CliError>(state)
    })?;

    println!("{}", serde_json::to_string_pretty(&report(&state))?);
    Ok(())
}
