//! Whitespace word frequency over replayed message bodies.

use std::collections::HashMap;

use chatvote_types::WordCount;

/// Word counts for one replay pass.
#[derive(Debug, Clone, Default)]
pub struct WordTally {
    counts: HashMap<String, u64>,
}

impl WordTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every whitespace-separated word of a body, case-folded.
    pub fn add(&mut self, body: &str) {
        for word in body.to_lowercase().split_whitespace() {
            let count = self.counts.entry(word.to_owned()).or_insert(0);
            *count = count.saturating_add(1);
        }
    }

    /// Forget all counts.
    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Number of distinct words seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no word has been seen.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Words whose count is at least `min_percent` percent of the most
    /// frequent word's, most frequent first, ties alphabetical.
    pub fn top_words(&self, min_percent: u64) -> Vec<WordCount> {
        let Some(max) = self.counts.values().copied().max() else {
            return Vec::new();
        };
        let threshold = max.saturating_mul(min_percent);
        let mut words: Vec<WordCount> = self
            .counts
            .iter()
            .filter(|(_, count)| count.saturating_mul(100) >= threshold)
            .map(|(word, count)| WordCount {
                word: word.clone(),
                count: *count,
            })
            .collect();
        words.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_case_folded() {
        let mut tally = WordTally::new();
        tally.add("Buy buy  BUY now");
        let top = tally.top_words(0);
        assert_eq!(
            top,
            vec![
                WordCount { word: "buy".into(), count: 3 },
                WordCount { word: "now".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn threshold_drops_rare_words() {
        let mut tally = WordTally::new();
        for _ in 0..200 {
            tally.add("moon");
        }
        tally.add("lambo");
        tally.add("rocket rocket");
        let top: Vec<_> = tally.top_words(1).into_iter().map(|w| w.word).collect();
        // 1% of 200 is 2: "rocket" stays, "lambo" goes.
        assert_eq!(top, vec!["moon", "rocket"]);
    }

    #[test]
    fn empty_tally_has_no_words() {
        let mut tally = WordTally::new();
        assert!(tally.top_words(1).is_empty());
        tally.add("x");
        tally.clear();
        assert!(tally.is_empty());
    }
}
