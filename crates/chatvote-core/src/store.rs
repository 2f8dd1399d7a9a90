//! Event store: the timestamp-sorted chat log and its read cursor.
//!
//! Events are validated and sorted once, at load time, and never reordered
//! afterwards. During playback the cursor only moves forward, so each call
//! to [`EventStore::advance_to`] costs time proportional to the number of
//! newly elapsed events. Seeking backwards is reserved for restarts.

use chatvote_types::{ActorId, ChatEvent, RawChatEvent};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

/// Errors that can occur when loading events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An event is missing a required field. The whole batch is rejected.
    #[error("invalid event at index {index}: {reason}")]
    InvalidEvent {
        /// Position of the event in the supplied batch.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Immutable, timestamp-sorted chat events plus a forward-only cursor.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    /// Events in ascending timestamp order; `seq` equals the position.
    events: Vec<ChatEvent>,
    /// Index of the next event not yet returned by `advance_to`.
    cursor: usize,
}

impl EventStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            cursor: 0,
        }
    }

    /// Replace the event list and reset the cursor.
    ///
    /// Events are stably sorted by timestamp, so events sharing a timestamp
    /// keep their supplied order. Returns the number of events loaded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEvent`] if any event lacks a timestamp,
    /// an actor id, or a body. The store is left untouched in that case.
    pub fn load(&mut self, raw: Vec<RawChatEvent>) -> Result<usize, StoreError> {
        let mut events = raw
            .into_iter()
            .enumerate()
            .map(|(index, event)| validate(index, event))
            .collect::<Result<Vec<_>, _>>()?;

        let was_sorted = events.is_sorted_by_key(|e| e.timestamp);
        if !was_sorted {
            events.sort_by_key(|e| e.timestamp);
            debug!("Events were not in timestamp order and have been sorted");
        }
        for (seq, event) in events.iter_mut().enumerate() {
            event.seq = seq;
        }

        self.events = events;
        self.cursor = 0;

        info!(
            events = self.events.len(),
            first = ?self.first_timestamp(),
            last = ?self.last_timestamp(),
            "Events loaded"
        );
        Ok(self.events.len())
    }

    /// Return all not-yet-returned events with `timestamp <= instant` and
    /// move the cursor past them.
    pub fn advance_to(&mut self, instant: DateTime<Utc>) -> &[ChatEvent] {
        let start = self.cursor;
        while self
            .events
            .get(self.cursor)
            .is_some_and(|e| e.timestamp <= instant)
        {
            self.cursor = self.cursor.saturating_add(1);
        }
        self.events.get(start..self.cursor).unwrap_or_default()
    }

    /// Move the cursor to the first event with `timestamp >= instant`.
    pub fn reset_cursor(&mut self, instant: DateTime<Utc>) {
        self.cursor = self.events.partition_point(|e| e.timestamp < instant);
        debug!(cursor = self.cursor, %instant, "Event cursor repositioned");
    }

    /// Index of the next unconsumed event.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether every event has been returned.
    pub const fn is_exhausted(&self) -> bool {
        self.cursor >= self.events.len()
    }

    /// All events in timestamp order.
    pub fn events(&self) -> &[ChatEvent] {
        &self.events
    }

    /// Number of loaded events.
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are loaded.
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the first event; the origin of elapsed time.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.timestamp)
    }

    /// Timestamp of the last event.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Time between the first and last event.
    pub fn span(&self) -> Option<TimeDelta> {
        let first = self.first_timestamp()?;
        Some(self.last_timestamp()?.signed_duration_since(first))
    }
}

/// Check one raw event and turn it into a [`ChatEvent`].
fn validate(index: usize, raw: RawChatEvent) -> Result<ChatEvent, StoreError> {
    let timestamp = raw.timestamp.ok_or(StoreError::InvalidEvent {
        index,
        reason: "missing timestamp",
    })?;
    let actor_id = raw
        .actor_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(StoreError::InvalidEvent {
            index,
            reason: "missing actor id",
        })?;
    let body = raw.body.ok_or(StoreError::InvalidEvent {
        index,
        reason: "missing body",
    })?;

    Ok(ChatEvent {
        seq: index,
        timestamp,
        actor_id: ActorId::new(actor_id),
        body,
    })
}
