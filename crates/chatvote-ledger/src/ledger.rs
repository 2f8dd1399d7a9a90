//! The vote ledger: an append-only log of vote changes keyed by actor.
//!
//! The [`VoteLedger`] is the in-memory record of one replay pass. It is
//! cleared when playback restarts and rebuilt from the start of the event
//! store whenever categories or events change.
//!
//! # Design
//!
//! - **Append-only**: records are never modified or removed within a pass.
//! - **Keyed by actor**: each actor owns a small ordered history; actors
//!   never interact.
//! - **Balanced**: an actor holds at most one vote at a time, and never
//!   withdraws from a category it does not hold.

use std::collections::BTreeMap;

use chatvote_types::{ActorId, CategoryId, VoteDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conservation::{BalanceResult, verify_balances};
use crate::LedgerError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One vote change in an actor's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Sequence number of the event that caused the change.
    pub seq: usize,
    /// Timestamp of that event.
    pub timestamp: DateTime<Utc>,
    /// Category gaining or losing the vote.
    pub category: CategoryId,
    /// `+1` or `-1`.
    pub direction: VoteDirection,
}

impl VoteRecord {
    /// Build a record.
    pub const fn new(
        seq: usize,
        timestamp: DateTime<Utc>,
        category: CategoryId,
        direction: VoteDirection,
    ) -> Self {
        Self {
            seq,
            timestamp,
            category,
            direction,
        }
    }
}

/// History and current position of a single actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ActorHistory {
    /// All records, in insertion order.
    records: Vec<VoteRecord>,
    /// Category the actor currently holds a vote in.
    current: Option<CategoryId>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Append-only vote history for every actor seen in the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteLedger {
    actors: BTreeMap<ActorId, ActorHistory>,
    /// Total number of records across all actors.
    len: usize,
}

impl VoteLedger {
    /// Create a new empty ledger.
    pub const fn new() -> Self {
        Self {
            actors: BTreeMap::new(),
            len: 0,
        }
    }

    /// Return the number of records in the ledger.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Return whether the ledger has no records.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return the number of actors with at least one record.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Drop every record. Called when a replay pass restarts.
    pub fn clear(&mut self) {
        debug!(records = self.len, actors = self.actor_count(), "Vote ledger cleared");
        self.actors.clear();
        self.len = 0;
    }

    /// Append a record to an actor's history.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::WithdrawWithoutVote`] if the actor does not hold a
    ///   vote in the withdrawn category.
    /// - [`LedgerError::DoubleVote`] if the actor already holds a vote.
    /// - [`LedgerError::OutOfOrder`] if the record is older than the
    ///   actor's latest record.
    pub fn record(&mut self, actor: &ActorId, record: VoteRecord) -> Result<(), LedgerError> {
        let history = self.actors.entry(actor.clone()).or_default();

        let newer = history.records.last().map(|r| r.seq).filter(|last| record.seq < *last);
        if let Some(last_seq) = newer {
            return Err(LedgerError::OutOfOrder {
                actor: actor.clone(),
                seq: record.seq,
                last_seq,
            });
        }

        match record.direction {
            VoteDirection::Add => {
                if history.current.is_some() {
                    return Err(LedgerError::DoubleVote {
                        actor: actor.clone(),
                        category: record.category,
                    });
                }
                history.current = Some(record.category.clone());
            }
            VoteDirection::Withdraw => {
                if history.current.as_ref() != Some(&record.category) {
                    return Err(LedgerError::WithdrawWithoutVote {
                        actor: actor.clone(),
                        category: record.category,
                    });
                }
                history.current = None;
            }
        }

        history.records.push(record);
        self.len = self.len.saturating_add(1);
        Ok(())
    }

    /// Category the actor currently holds a vote in.
    pub fn current_vote(&self, actor: &ActorId) -> Option<&CategoryId> {
        self.actors.get(actor).and_then(|h| h.current.as_ref())
    }

    /// Category of the actor's most recent record, whatever its direction.
    pub fn last_category(&self, actor: &ActorId) -> Option<&CategoryId> {
        self.actors
            .get(actor)
            .and_then(|h| h.records.last())
            .map(|r| &r.category)
    }

    /// The actor's full history, oldest first. Empty for unknown actors.
    pub fn history(&self, actor: &ActorId) -> &[VoteRecord] {
        self.actors.get(actor).map_or(&[], |h| h.records.as_slice())
    }

    /// Iterate over every actor and its history, in actor id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, &[VoteRecord])> {
        self.actors
            .iter()
            .map(|(actor, h)| (actor, h.records.as_slice()))
    }

    /// Verify the balance law over every actor's history.
    pub fn verify_balances(&self) -> BalanceResult {
        verify_balances(self)
    }
}
