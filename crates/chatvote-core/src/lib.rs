//! Replay clock, keyword classification, vote resolution, and aggregation
//! for Chatvote.
//!
//! Chat events are replayed against a simulated clock. Each tick pulls the
//! events that have now "happened", classifies them by keyword, turns the
//! classifications into per-actor vote changes, and folds those into running
//! totals and a time-binned series for charting.
//!
//! ```text
//! clock -> store -> classify -> resolver -> aggregate -> TickOutput
//! ```
//!
//! # Modules
//!
//! - [`duration`] -- `d:h:m:s` duration strings to seconds and back.
//! - [`keywords`] -- Shell-quoted keyword lines.
//! - [`store`] -- Sorted event store with a forward-only cursor.
//! - [`classify`] -- Case-folded substring matching against categories.
//! - [`resolver`] -- Per-actor debouncing and vote switching.
//! - [`aggregate`] -- Running totals and fixed-width time bins.
//! - [`words`] -- Word frequency over replayed bodies.
//! - [`clock`] -- Simulated time and the Stopped/Playing/Paused machine.
//! - [`engine`] -- [`ReplayEngine`], the single owner of all replay state.
//! - [`operator`] -- [`ReplayHandle`] command channel.
//! - [`runner`] -- Async tick loop with [`TickCallback`] output.
//! - [`config`] -- `chatvote-config.yaml` loading and validation.
//!
//! [`ReplayEngine`]: engine::ReplayEngine
//! [`ReplayHandle`]: operator::ReplayHandle
//! [`TickCallback`]: runner::TickCallback

pub mod aggregate;
pub mod classify;
pub mod clock;
pub mod config;
pub mod duration;
pub mod engine;
pub mod keywords;
pub mod operator;
pub mod resolver;
pub mod runner;
pub mod store;
pub mod words;
