//! Error types for the replay binary.
//!
//! [`ReplayError`] is the top-level error type that wraps all possible
//! failure modes during startup and the replay run.

use std::path::PathBuf;

/// Top-level error for the replay binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: chatvote_core::config::ConfigError,
    },

    /// The engine rejected the settings or the loaded events.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: chatvote_core::engine::EngineError,
    },

    /// The replay run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: chatvote_core::runner::RunnerError,
    },

    /// The chat export could not be read.
    #[error("failed to read chat export {}: {source}", path.display())]
    Input {
        /// Export file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The chat export is not the expected JSON shape.
    #[error("failed to parse chat export: {source}")]
    Export {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
