//! Shared type definitions for the Chatvote replay engine.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: validated chat events, vote categories, vote changes, and the
//! per-tick output consumed by the chart front-end. Renderer-facing types
//! flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- String newtypes for actor and category identifiers
//! - [`enums`] -- Vote direction and playback status
//! - [`structs`] -- Events, categories, vote changes, and tick output

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{PlaybackStatus, VoteDirection};
pub use ids::{ActorId, CategoryId};
pub use structs::{
    BinnedSeries, Category, CategorySeries, CategoryTotal, ChatEvent, RawChatEvent, SeriesPoint,
    TickOutput, VoteChange, WordCount,
};
