//! Chatvote replay binary.
//!
//! Loads `chatvote-config.yaml` (or the path given as the first argument),
//! reads the chat export it points at, and replays it against the configured
//! vote categories. Per-tick snapshots go to stdout as JSON lines; logs go to
//! stderr.
//!
//! # Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Initialize structured logging (tracing)
//! 3. Load the chat export
//! 4. Build the replay engine and start a pass
//! 5. Wire Ctrl-C to a shutdown command
//! 6. Run the replay until the pass finishes
//! 7. Log the result

mod error;
mod loader;
mod output;

use std::path::{Path, PathBuf};

use chatvote_core::config::{LogFormat, LoggingConfig, ReplayConfig};
use chatvote_core::engine::{PlayOutcome, ReplayEngine};
use chatvote_core::operator;
use chatvote_core::runner::{self, RunOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ReplayError;
use crate::output::JsonLinesCallback;

/// Config file used when no path is given.
const DEFAULT_CONFIG_PATH: &str = "chatvote-config.yaml";

/// Application entry point for the replay binary.
///
/// # Errors
///
/// Returns an error if configuration, the chat export, or the replay fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = load_config(&config_path)?;
    let validated = config.validate().map_err(ReplayError::from)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    if !config_path.exists() {
        info!(config = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        config = %config_path.display(),
        events = %config.input.events_path.display(),
        categories = validated.categories.len(),
        rate = validated.settings.rate,
        bin_width_secs = validated.settings.bin_width_secs,
        "chatvote-replay starting"
    );

    // 3. Load the chat export.
    let events = loader::load_export(&config.input.events_path)?;
    info!(messages = events.len(), "Chat export loaded");

    // 4. Build the engine and start the pass.
    let mut engine =
        ReplayEngine::new(validated.settings, validated.categories).map_err(ReplayError::from)?;
    engine.load_events(events).map_err(ReplayError::from)?;
    if engine.play() == PlayOutcome::NothingToPlay {
        warn!("Chat export has no messages, nothing to replay");
        return Ok(());
    }

    // 5. Ctrl-C ends the run.
    let (handle, mut commands) = operator::channel(operator::DEFAULT_COMMAND_CAPACITY);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = handle.shutdown().await;
        }
    });

    // 6. Run the replay.
    let mut callback = JsonLinesCallback::new(std::io::stdout());
    let result = runner::run_replay(
        &mut engine,
        &mut commands,
        &mut callback,
        RunOptions {
            exit_on_finish: true,
        },
    )
    .await
    .map_err(ReplayError::from)?;

    // 7. Log results.
    runner::log_replay_end(&result);
    info!(
        end_reason = ?result.end_reason,
        lines = callback.lines(),
        skipped_ticks = callback.skipped(),
        "chatvote-replay shutdown complete"
    );

    Ok(())
}

/// Load the replay configuration, falling back to defaults when the file
/// does not exist.
fn load_config(path: &Path) -> Result<ReplayConfig, ReplayError> {
    if path.exists() {
        Ok(ReplayConfig::from_file(path)?)
    } else {
        let mut config = ReplayConfig::default();
        config.input.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
