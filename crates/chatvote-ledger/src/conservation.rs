//! Balance law verification for the vote ledger.
//!
//! For every actor A and category C, walking A's history in order:
//!
//! ```text
//! running(A, C) = additions(A, C) - withdrawals(A, C)   stays in 0..=1
//! sum over C of running(A, C)                           stays in 0..=1
//! ```
//!
//! [`VoteLedger::record`] already rejects records that would break these
//! bounds, so a ledger built through it always balances. The check exists
//! for histories assembled elsewhere and as a test oracle.
//!
//! [`VoteLedger::record`]: crate::VoteLedger::record

use std::collections::BTreeMap;

use chatvote_types::{ActorId, CategoryId};

use crate::ledger::{VoteLedger, VoteRecord};
use crate::LedgerAnomaly;

/// The result of a balance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceResult {
    /// Every actor's history balances.
    Balanced,
    /// The first imbalance found.
    Anomaly(LedgerAnomaly),
}

impl BalanceResult {
    /// Whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify the balance law for every actor in the ledger.
pub fn verify_balances(ledger: &VoteLedger) -> BalanceResult {
    for (actor, records) in ledger.iter() {
        if let Some(anomaly) = check_history(actor, records) {
            return BalanceResult::Anomaly(anomaly);
        }
    }
    BalanceResult::Balanced
}

/// Walk one actor's history and return the first violation, if any.
fn check_history(actor: &ActorId, records: &[VoteRecord]) -> Option<LedgerAnomaly> {
    let mut running: BTreeMap<&CategoryId, i64> = BTreeMap::new();
    let mut net: i64 = 0;

    for (position, record) in records.iter().enumerate() {
        let delta = record.direction.delta();
        let slot = running.entry(&record.category).or_insert(0);
        *slot = slot.saturating_add(delta);
        net = net.saturating_add(delta);

        if *slot < 0 {
            return Some(LedgerAnomaly {
                actor: actor.clone(),
                category: Some(record.category.clone()),
                message: format!(
                    "actor {actor} withdrew from {} more often than it voted for it \
                     (record {position}, event {})",
                    record.category, record.seq
                ),
            });
        }
        if *slot > 1 || net > 1 {
            return Some(LedgerAnomaly {
                actor: actor.clone(),
                category: Some(record.category.clone()),
                message: format!(
                    "actor {actor} holds more than one vote after record {position} (event {})",
                    record.seq
                ),
            });
        }
    }

    None
}
