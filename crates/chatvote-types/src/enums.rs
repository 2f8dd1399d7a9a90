//! Enumeration types for the Chatvote replay engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Sign of a vote change.
///
/// A vote resolver never emits raw counts, only additions and withdrawals.
/// An actor switching categories produces a [`Withdraw`] for the previous
/// category followed by an [`Add`] for the new one.
///
/// [`Add`]: VoteDirection::Add
/// [`Withdraw`]: VoteDirection::Withdraw
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum VoteDirection {
    /// `+1` for the category.
    Add,
    /// `-1` for the category.
    Withdraw,
}

impl VoteDirection {
    /// Signed contribution of this change to a running total.
    pub const fn delta(self) -> i64 {
        match self {
            Self::Add => 1,
            Self::Withdraw => -1,
        }
    }
}

/// Playback state of the replay engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PlaybackStatus {
    /// No pass in progress; the next `play` starts from the start offset.
    #[default]
    Stopped,
    /// Ticks are being scheduled.
    Playing,
    /// Ticks are suspended; derived state is retained.
    Paused,
}

impl PlaybackStatus {
    /// Whether ticks should currently be scheduled.
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_signs() {
        assert_eq!(VoteDirection::Add.delta(), 1);
        assert_eq!(VoteDirection::Withdraw.delta(), -1);
    }

    #[test]
    fn default_status_is_stopped() {
        assert_eq!(PlaybackStatus::default(), PlaybackStatus::Stopped);
        assert!(!PlaybackStatus::Paused.is_playing());
        assert!(PlaybackStatus::Playing.is_playing());
    }
}
