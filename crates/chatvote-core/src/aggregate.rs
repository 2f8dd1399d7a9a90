//! Aggregator: folds vote changes into running totals and a time-binned
//! series.
//!
//! A change lands in the bin containing its event's elapsed time since the
//! first event of the store, truncated down to a multiple of the bin width.
//! The bin records the category's running total after the change, so the
//! last change in a bin wins. The label axis runs from the first to the last
//! observed bin at bin-width stride, with gaps filled by labels only.

use std::collections::BTreeMap;

use chatvote_types::{
    BinnedSeries, Category, CategoryId, CategorySeries, CategoryTotal, SeriesPoint, VoteChange,
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::duration;

/// Errors that can occur when folding a vote change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    /// The change names a category that is not configured.
    #[error("vote change for unknown category {category}")]
    UnknownCategory {
        /// The unknown category.
        category: CategoryId,
    },

    /// Applying the change would take a total below zero.
    #[error("withdrawal from {category} would make its total negative")]
    NegativeTotal {
        /// The category whose total would go negative.
        category: CategoryId,
    },
}

/// Running state of one category.
#[derive(Debug, Clone)]
struct Tally {
    category: Category,
    total: i64,
    /// Bin start in whole seconds -> total after the last change in that bin.
    bins: BTreeMap<u64, i64>,
}

/// Per-category totals and binned series for one replay pass.
#[derive(Debug, Clone)]
pub struct Aggregator {
    tallies: Vec<Tally>,
    bin_width_secs: u64,
    label_fields: usize,
    /// Elapsed time is measured from here. `None` until events are loaded.
    origin: Option<DateTime<Utc>>,
    /// First and last observed bin start.
    span: Option<(u64, u64)>,
}

impl Aggregator {
    /// Create an aggregator for the given categories.
    ///
    /// A bin width of zero is treated as one second.
    pub fn new(
        categories: &[Category],
        bin_width_secs: u64,
        label_fields: usize,
        origin: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            tallies: categories
                .iter()
                .map(|category| Tally {
                    category: category.clone(),
                    total: 0,
                    bins: BTreeMap::new(),
                })
                .collect(),
            bin_width_secs: bin_width_secs.max(1),
            label_fields,
            origin,
            span: None,
        }
    }

    /// Bin width in seconds.
    pub const fn bin_width_secs(&self) -> u64 {
        self.bin_width_secs
    }

    /// Clear totals and bins, keeping categories and bin settings.
    pub fn reset(&mut self) {
        for tally in &mut self.tallies {
            tally.total = 0;
            tally.bins.clear();
        }
        self.span = None;
        debug!(categories = self.tallies.len(), "Aggregates reset");
    }

    /// Fold one vote change.
    ///
    /// Changes must be applied in the order the resolver produced them.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] if the category is unknown or a withdrawal
    /// would make its total negative. Nothing is modified in either case.
    pub fn apply(&mut self, change: &VoteChange) -> Result<(), AggregateError> {
        let bin = self.bin_of(change.timestamp);
        let tally = self
            .tallies
            .iter_mut()
            .find(|t| t.category.id == change.category)
            .ok_or_else(|| AggregateError::UnknownCategory {
                category: change.category.clone(),
            })?;

        let total = tally
            .total
            .checked_add(change.direction.delta())
            .filter(|t| *t >= 0)
            .ok_or_else(|| AggregateError::NegativeTotal {
                category: change.category.clone(),
            })?;

        tally.total = total;
        tally.bins.insert(bin, total);
        self.span = Some(match self.span {
            Some((first, last)) => (first.min(bin), last.max(bin)),
            None => (bin, bin),
        });
        Ok(())
    }

    /// Running total of one category.
    pub fn total(&self, category: &CategoryId) -> Option<i64> {
        self.tallies
            .iter()
            .find(|t| &t.category.id == category)
            .map(|t| t.total)
    }

    /// Running totals, in category order.
    pub fn totals(&self) -> Vec<CategoryTotal> {
        self.tallies
            .iter()
            .map(|t| CategoryTotal {
                category: t.category.id.clone(),
                label: t.category.label.clone(),
                color: t.category.color.clone(),
                total: t.total,
            })
            .collect()
    }

    /// The gap-free label axis from the first to the last observed bin.
    pub fn labels(&self) -> Vec<String> {
        let Some((first, last)) = self.span else {
            return Vec::new();
        };
        let mut labels = Vec::new();
        let mut bin = first;
        while bin <= last {
            labels.push(self.label(bin));
            match bin.checked_add(self.bin_width_secs) {
                Some(next) => bin = next,
                None => break,
            }
        }
        labels
    }

    /// Labels plus every category's written bins.
    pub fn series(&self) -> BinnedSeries {
        BinnedSeries {
            labels: self.labels(),
            datasets: self
                .tallies
                .iter()
                .map(|t| CategorySeries {
                    category: t.category.id.clone(),
                    label: t.category.label.clone(),
                    color: t.category.color.clone(),
                    points: t
                        .bins
                        .iter()
                        .map(|(bin, value)| SeriesPoint {
                            label: self.label(*bin),
                            value: *value,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Start of the bin containing `timestamp`, in whole elapsed seconds.
    fn bin_of(&self, timestamp: DateTime<Utc>) -> u64 {
        let elapsed_ms = self
            .origin
            .map_or(0, |origin| timestamp.signed_duration_since(origin).num_milliseconds());
        let elapsed_secs = u64::try_from(elapsed_ms).unwrap_or(0) / 1000;
        elapsed_secs
            .checked_div(self.bin_width_secs)
            .and_then(|n| n.checked_mul(self.bin_width_secs))
            .unwrap_or(0)
    }

    #[allow(clippy::cast_precision_loss)]
    fn label(&self, bin: u64) -> String {
        duration::format(bin as f64, self.label_fields)
    }
}
