//! Append-only vote ledger for the Chatvote replay engine.
//!
//! Every vote change issued during a replay pass is recorded here, keyed by
//! the actor that caused it. The ledger is the resolver's memory: it answers
//! "what did this actor last vote for?" and it is the place where the vote
//! balance law is enforced.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`VoteLedger`] struct: per-actor append-only history.
//! - [`conservation`] -- Balance verification over a whole ledger.
//!
//! # Balance Law
//!
//! For every actor A and category C, at every prefix of A's history:
//!
//! ```text
//! withdrawals(A, C) <= additions(A, C)
//! ```
//!
//! and the net of all of A's changes is either 0 or 1. A violation is
//! rejected at record time with [`LedgerError::WithdrawWithoutVote`] or
//! [`LedgerError::DoubleVote`]; [`conservation::verify_balances`] re-checks
//! a finished ledger and reports a [`LedgerAnomaly`].
//!
//! # Usage
//!
//! ```
//! use chatvote_ledger::{VoteLedger, VoteRecord};
//! use chatvote_ledger::conservation::BalanceResult;
//! use chatvote_types::{ActorId, CategoryId, VoteDirection};
//! use chrono::{DateTime, Utc};
//!
//! let mut ledger = VoteLedger::new();
//! let actor = ActorId::new("u1");
//! let at = DateTime::<Utc>::UNIX_EPOCH;
//!
//! ledger
//!     .record(&actor, VoteRecord::new(0, at, CategoryId::new("buy"), VoteDirection::Add))
//!     .ok();
//! ledger
//!     .record(&actor, VoteRecord::new(1, at, CategoryId::new("buy"), VoteDirection::Withdraw))
//!     .ok();
//! ledger
//!     .record(&actor, VoteRecord::new(1, at, CategoryId::new("sell"), VoteDirection::Add))
//!     .ok();
//!
//! assert_eq!(ledger.current_vote(&actor), Some(&CategoryId::new("sell")));
//! assert_eq!(ledger.verify_balances(), BalanceResult::Balanced);
//! ```

pub mod conservation;
pub mod ledger;

// Re-export primary types at crate root.
pub use conservation::BalanceResult;
pub use ledger::{VoteLedger, VoteRecord};

use chatvote_types::{ActorId, CategoryId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when recording vote changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A withdrawal was recorded for a category the actor holds no vote in.
    #[error("actor {actor} withdrew from {category} without a prior vote")]
    WithdrawWithoutVote {
        /// The actor whose history would go negative.
        actor: ActorId,
        /// The category being withdrawn from.
        category: CategoryId,
    },

    /// An addition was recorded while the actor already holds a vote.
    #[error("actor {actor} voted for {category} while still holding a vote")]
    DoubleVote {
        /// The actor who would hold two votes.
        actor: ActorId,
        /// The category being added.
        category: CategoryId,
    },

    /// Records must be appended in non-decreasing event order.
    #[error("actor {actor} record for event {seq} is older than event {last_seq}")]
    OutOfOrder {
        /// The actor whose history would be reordered.
        actor: ActorId,
        /// Sequence number of the rejected record.
        seq: usize,
        /// Sequence number of the actor's latest record.
        last_seq: usize,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A balance law violation found by [`conservation::verify_balances`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// Actor whose history is out of balance.
    pub actor: ActorId,
    /// Category involved, when the violation is category-specific.
    pub category: Option<CategoryId>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
