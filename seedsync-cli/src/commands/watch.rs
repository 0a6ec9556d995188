//! Watch command - keep the engine running and report every settled state.

use std::sync::Arc;
use std::time::Duration;

use seedsync::{Engine, EngineConfig};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{report, QueryArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// How often the subscription counters are logged while idle.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Run the watch command.
pub fn run(runner: &CliRunner, args: QueryArgs) -> Result<(), CliError> {
    runner.log_startup("watch");
    let actions = args.actions()?;
    let config = EngineConfig::from_config_file(runner.config());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    println!("SeedSync watch v{}", env!("CARGO_PKG_VERSION"));
    println!("Point: {}, {}", args.lat, args.lon);
    println!("Press Ctrl+C to exit");
    println!();

    runner.runtime()?.block_on(async move {
        let engine = Engine::start(config)?;

        let changed = Arc::new(Notify::new());
        let listener = {
            let changed = Arc::clone(&changed);
            engine.store().subscribe(move || changed.notify_one())
        };

        for action in actions {
            engine.dispatch(action);
        }

        let mut status = tokio::time::interval(STATUS_INTERVAL);
        status.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = changed.notified() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = engine.wait_idle() => {}
                    }
                    info!(in_flight = engine.in_flight(), "state settled");
                    println!("{}", serde_json::to_string_pretty(&report(&engine.state()))?);
                }
                _ = status.tick() => {
                    for (name, firings) in engine.firings() {
                        info!(subscription = name, firings, "subscription status");
                    }
                }
            }
        }

        listener.unsubscribe();
        engine.shutdown();
        Ok::<_, CliError>(())
    })
}
