//! Keyword classifier: which categories does a message body mention?
//!
//! A category matches when the case-folded body contains any of its
//! keywords as a literal substring. Matching several categories at once is
//! an ordinary outcome; the vote resolver decides what it means.

use chatvote_types::{Category, CategoryId, ChatEvent};

/// One matched category and where its earliest keyword occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch {
    /// The matched category.
    pub category: CategoryId,
    /// Byte offset of the earliest matching keyword in the folded body.
    pub position: usize,
}

/// Classification of a single event against the configured categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Matched categories, in configuration order.
    matches: Vec<CategoryMatch>,
}

impl Classification {
    /// All matched categories, in configuration order.
    pub fn matches(&self) -> &[CategoryMatch] {
        &self.matches
    }

    /// Whether the given category matched.
    pub fn matched(&self, category: &CategoryId) -> bool {
        self.matches.iter().any(|m| &m.category == category)
    }

    /// Number of matched categories.
    pub const fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// No category matched.
    pub const fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Two or more categories matched.
    pub const fn is_ambiguous(&self) -> bool {
        self.matches.len() > 1
    }

    /// The single matched category, if exactly one matched.
    pub const fn candidate(&self) -> Option<&CategoryId> {
        match self.matches.as_slice() {
            [only] => Some(&only.category),
            _ => None,
        }
    }
}

/// Classify an event's body.
pub fn classify(event: &ChatEvent, categories: &[Category]) -> Classification {
    classify_body(&event.body, categories)
}

/// Classify a raw body string.
pub fn classify_body(body: &str, categories: &[Category]) -> Classification {
    if categories.is_empty() {
        return Classification::default();
    }
    let folded = body.to_lowercase();
    let matches = categories
        .iter()
        .filter_map(|category| {
            category
                .keywords
                .iter()
                .filter_map(|keyword| folded.find(keyword.as_str()))
                .min()
                .map(|position| CategoryMatch {
                    category: category.id.clone(),
                    position,
                })
        })
        .collect();
    Classification { matches }
}
