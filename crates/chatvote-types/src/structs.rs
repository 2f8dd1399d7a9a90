//! Core data structs: chat events, categories, vote changes, and the
//! per-tick output handed to the renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{PlaybackStatus, VoteDirection};
use crate::ids::{ActorId, CategoryId};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event as supplied by an external loader, before validation.
///
/// Every field is optional so that a loader can hand over whatever it
/// parsed; the event store rejects the whole batch if any field is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChatEvent {
    /// When the message was sent.
    pub timestamp: Option<DateTime<Utc>>,
    /// Who sent it.
    pub actor_id: Option<String>,
    /// Message text.
    pub body: Option<String>,
}

impl RawChatEvent {
    /// Build a fully populated raw event.
    pub fn new(
        timestamp: DateTime<Utc>,
        actor_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Some(timestamp),
            actor_id: Some(actor_id.into()),
            body: Some(body.into()),
        }
    }
}

/// A validated, immutable chat event held by the event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Position in the timestamp-sorted store. Breaks timestamp ties.
    pub seq: usize,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Who sent it.
    pub actor_id: ActorId,
    /// Message text as sent.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// An operator-configured vote category.
///
/// Keywords are stored case-folded, without empty entries and without
/// duplicates, in the order the operator wrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Category {
    /// Stable identifier.
    pub id: CategoryId,
    /// Human-readable label shown in legends.
    pub label: String,
    /// Display color, usually `#rrggbb`.
    pub color: String,
    /// Ordered set of case-folded keywords.
    pub keywords: Vec<String>,
}

impl Category {
    /// Create a category, normalizing its keyword list.
    pub fn new(
        id: impl Into<CategoryId>,
        label: impl Into<String>,
        color: impl Into<String>,
        keywords: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let mut normalized: Vec<String> = Vec::new();
        for keyword in keywords {
            let folded = keyword.as_ref().to_lowercase();
            if folded.is_empty() || normalized.contains(&folded) {
                continue;
            }
            normalized.push(folded);
        }
        Self {
            id: id.into(),
            label: label.into(),
            color: color.into(),
            keywords: normalized,
        }
    }
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// A signed vote change emitted by the vote resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteChange {
    /// Sequence number of the event that caused the change.
    pub seq: usize,
    /// Timestamp of the event that caused the change.
    pub timestamp: DateTime<Utc>,
    /// Actor whose position changed.
    pub actor_id: ActorId,
    /// Category gaining or losing the vote.
    pub category: CategoryId,
    /// `+1` or `-1`.
    pub direction: VoteDirection,
}

// ---------------------------------------------------------------------------
// Renderer output
// ---------------------------------------------------------------------------

/// Running total for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CategoryTotal {
    /// Category identifier.
    pub category: CategoryId,
    /// Category label.
    pub label: String,
    /// Category color.
    pub color: String,
    /// Current signed total.
    pub total: i64,
}

/// One written bin of a category's series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SeriesPoint {
    /// Bin label, e.g. `00:01:30`.
    pub label: String,
    /// Cumulative total of the category at the end of this bin.
    pub value: i64,
}

/// The binned series of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CategorySeries {
    /// Category identifier.
    pub category: CategoryId,
    /// Category label.
    pub label: String,
    /// Category color.
    pub color: String,
    /// Written bins in increasing elapsed-time order.
    pub points: Vec<SeriesPoint>,
}

/// Time-binned series for all categories with a shared, gap-free label axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BinnedSeries {
    /// One label per bin width from the first to the last observed bin.
    pub labels: Vec<String>,
    /// Per-category points, in category configuration order.
    pub datasets: Vec<CategorySeries>,
}

/// A word and how often it appeared in replayed bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WordCount {
    /// Lowercased word.
    pub word: String,
    /// Occurrences so far in this pass.
    pub count: u64,
}

/// Everything the renderer needs after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickOutput {
    /// Playback state after the tick.
    pub status: PlaybackStatus,
    /// Simulated time since the first event, in seconds.
    pub offset_seconds: f64,
    /// Simulated time formatted for display.
    pub clock: String,
    /// Running totals, in category configuration order.
    pub totals: Vec<CategoryTotal>,
    /// Binned series.
    pub series: BinnedSeries,
    /// Word tally, present on ticks where it was refreshed.
    pub words: Option<Vec<WordCount>>,
    /// Totals differ from the previous tick's.
    pub totals_changed: bool,
    /// The label axis differs from the previous tick's.
    pub labels_changed: bool,
    /// This tick reached the end offset.
    pub finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_keywords_are_folded_and_deduplicated() {
        let category = Category::new("buy", "Buy", "#00ff00", ["Buy", "", "BUY", "long"]);
        assert_eq!(category.keywords, vec!["buy".to_owned(), "long".to_owned()]);
    }

    #[test]
    fn raw_event_round_trips_through_json() {
        let raw = RawChatEvent::new(DateTime::<Utc>::UNIX_EPOCH, "u1", "hello");
        let json = serde_json::to_string(&raw).unwrap_or_default();
        let back: Option<RawChatEvent> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(raw));
    }
}
