//! Vote resolver: turns classified chat events into signed vote changes.
//!
//! Each actor holds at most one vote. For every event, independently per
//! actor:
//!
//! | Classification | Actor holds | Emitted |
//! |----------------|-------------|---------|
//! | no match | anything | nothing |
//! | two or more matches | anything | nothing (ambiguous, state kept) |
//! | exactly `C` | nothing | `+1 C` |
//! | exactly `C` | `C` | nothing (debounced) |
//! | exactly `C` | `P != C` | `-1 P`, then `+1 C` |
//!
//! Changes from one batch are returned ordered by the originating event's
//! timestamp, then by event sequence, keeping a withdrawal ahead of the
//! addition it pairs with. The output is a pure function of the events and
//! categories seen since the last [`VoteResolver::reset`].

use chatvote_ledger::{LedgerError, VoteLedger, VoteRecord};
use chatvote_types::{Category, CategoryId, ChatEvent, VoteChange, VoteDirection};
use tracing::trace;

use crate::classify::classify;

/// Counters describing what the resolver did with the events it saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Events examined.
    pub events: u64,
    /// Events matching no category.
    pub unmatched: u64,
    /// Events matching two or more categories.
    pub ambiguous: u64,
    /// Single-category events repeating the actor's current vote.
    pub debounced: u64,
    /// Vote changes emitted.
    pub changes: u64,
}

/// Per-actor vote state machine backed by a [`VoteLedger`].
#[derive(Debug, Clone, Default)]
pub struct VoteResolver {
    ledger: VoteLedger,
    stats: ResolverStats,
}

impl VoteResolver {
    /// Create a resolver with no history.
    pub const fn new() -> Self {
        Self {
            ledger: VoteLedger::new(),
            stats: ResolverStats {
                events: 0,
                unmatched: 0,
                ambiguous: 0,
                debounced: 0,
                changes: 0,
            },
        }
    }

    /// Forget every actor's history.
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.stats = ResolverStats::default();
    }

    /// The vote ledger built so far.
    pub const fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    /// Counters since the last reset.
    pub const fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// Classify a batch of events and return the resulting vote changes.
    ///
    /// Events must be supplied in store order across calls.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if a change would break the ledger's balance
    /// law, which indicates events were supplied out of order.
    pub fn resolve(
        &mut self,
        events: &[ChatEvent],
        categories: &[Category],
    ) -> Result<Vec<VoteChange>, LedgerError> {
        let mut changes: Vec<VoteChange> = Vec::new();

        for event in events {
            self.stats.events = self.stats.events.saturating_add(1);

            let classification = classify(event, categories);
            if classification.is_ambiguous() {
                trace!(
                    seq = event.seq,
                    actor = %event.actor_id,
                    matches = classification.match_count(),
                    keeps = ?self.ledger.last_category(&event.actor_id),
                    "Ambiguous vote ignored"
                );
                self.stats.ambiguous = self.stats.ambiguous.saturating_add(1);
                continue;
            }
            let Some(candidate) = classification.candidate() else {
                self.stats.unmatched = self.stats.unmatched.saturating_add(1);
                continue;
            };

            match self.ledger.current_vote(&event.actor_id).cloned() {
                Some(previous) if classification.matched(&previous) => {
                    self.stats.debounced = self.stats.debounced.saturating_add(1);
                }
                Some(previous) => {
                    self.emit(event, previous, VoteDirection::Withdraw, &mut changes)?;
                    self.emit(event, candidate.clone(), VoteDirection::Add, &mut changes)?;
                }
                None => {
                    self.emit(event, candidate.clone(), VoteDirection::Add, &mut changes)?;
                }
            }
        }

        // Stable: a withdrawal stays ahead of the addition from the same event.
        changes.sort_by_key(|c| (c.timestamp, c.seq));
        Ok(changes)
    }

    /// Record one change in the ledger and append it to the output.
    fn emit(
        &mut self,
        event: &ChatEvent,
        category: CategoryId,
        direction: VoteDirection,
        out: &mut Vec<VoteChange>,
    ) -> Result<(), LedgerError> {
        self.ledger.record(
            &event.actor_id,
            VoteRecord::new(event.seq, event.timestamp, category.clone(), direction),
        )?;
        self.stats.changes = self.stats.changes.saturating_add(1);
        out.push(VoteChange {
            seq: event.seq,
            timestamp: event.timestamp,
            actor_id: event.actor_id.clone(),
            category,
            direction,
        });
        Ok(())
    }
}
