//! Keyword list parsing.
//!
//! Operators type a category's keywords as a single line with shell-style
//! quoting, so multi-word phrases stay together:
//!
//! ```text
//! buy "to the moon" 'long it'   ->   ["buy", "to the moon", "long it"]
//! ```
//!
//! Configuration files may instead give an explicit list. Either way the
//! result is case-folded, stripped of empty entries, and deduplicated by
//! [`chatvote_types::Category::new`].

use serde::Deserialize;
use tracing::warn;

/// A keyword list as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeywordSpec {
    /// An explicit YAML list.
    List(Vec<String>),
    /// A shell-quoted line.
    Line(String),
}

impl Default for KeywordSpec {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl KeywordSpec {
    /// Resolve into individual keywords.
    pub fn into_keywords(self) -> Vec<String> {
        match self {
            Self::List(list) => list,
            Self::Line(line) => split_keywords(&line),
        }
    }
}

/// Split a shell-quoted keyword line.
///
/// A line with unbalanced quotes falls back to plain whitespace splitting.
pub fn split_keywords(line: &str) -> Vec<String> {
    shlex::split(line).unwrap_or_else(|| {
        warn!(line, "Unbalanced quotes in keyword list, splitting on whitespace");
        line.split_whitespace().map(str::to_owned).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_phrases_stay_together() {
        assert_eq!(
            split_keywords(r#"buy "to the moon" 'long it'"#),
            vec!["buy", "to the moon", "long it"]
        );
    }

    #[test]
    fn blank_line_yields_nothing() {
        assert!(split_keywords("   ").is_empty());
    }

    #[test]
    fn unbalanced_quotes_fall_back_to_whitespace() {
        assert_eq!(split_keywords(r#"buy "moon"#), vec!["buy", "\"moon"]);
    }

    #[test]
    fn keywords_accept_list_or_line() {
        let list: KeywordSpec = serde_yml::from_str("[buy, long]").unwrap_or_default();
        assert_eq!(list.into_keywords(), vec!["buy", "long"]);

        let line: KeywordSpec = serde_yml::from_str("'buy \"go long\"'").unwrap_or_default();
        assert_eq!(line.into_keywords(), vec!["buy", "go long"]);
    }
}
