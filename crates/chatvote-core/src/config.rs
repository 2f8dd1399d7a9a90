//! Configuration loading and typed config structures for a Chatvote replay.
//!
//! The configuration lives in `chatvote-config.yaml`. Every field has a
//! default, so an empty file is a valid configuration: normal speed,
//! 30-second bins, starting at the first event and ending at the last one.
//!
//! Raw YAML is kept as operators write it (duration strings, keyword lines).
//! [`ReplayConfig::validate`] turns it into [`ReplaySettings`] and
//! [`Category`] values for the engine.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatvote_types::Category;
use serde::Deserialize;

use crate::duration::{self, DurationError, MAX_FIELDS};
use crate::engine::ReplaySettings;
use crate::keywords::KeywordSpec;

/// Environment variable overriding `input.events_path`.
pub const EVENTS_PATH_ENV: &str = "CHATVOTE_EVENTS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A duration string is malformed.
    #[error("invalid duration in replay.{field}: {source}")]
    Duration {
        /// Which setting.
        field: &'static str,
        /// The underlying parse error.
        source: DurationError,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level replay configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReplayConfig {
    /// Playback settings.
    #[serde(default)]
    pub replay: ReplaySection,

    /// Vote categories, in display order.
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Input file locations.
    #[serde(default)]
    pub input: InputConfig,
}

/// Engine-ready values produced by [`ReplayConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    /// Typed playback settings.
    pub settings: ReplaySettings,
    /// Categories with normalized keywords.
    pub categories: Vec<Category>,
}

impl ReplayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CHATVOTE_EVENTS` overrides `input.events_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.input.apply_env_overrides();
        Ok(config)
    }

    /// Check every value and build engine settings and categories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Duration`] for malformed start or end offsets
    /// and [`ConfigError::Invalid`] for out-of-range numbers, an end before
    /// the start, or duplicate category ids.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let replay = &self.replay;

        let start = duration::parse(&replay.start).map_err(|source| ConfigError::Duration {
            field: "start",
            source,
        })?;
        let end = replay
            .end
            .as_deref()
            .map(|text| {
                duration::parse(text).map_err(|source| ConfigError::Duration {
                    field: "end",
                    source,
                })
            })
            .transpose()?;

        if let Some(end) = end.filter(|end| *end < start) {
            return Err(invalid(format!(
                "end offset {end}s is before start offset {start}s"
            )));
        }
        if !replay.rate.is_finite() || replay.rate <= 0.0 {
            return Err(invalid(format!(
                "rate must be a finite positive number, got {}",
                replay.rate
            )));
        }
        if replay.bin_width_secs == 0 {
            return Err(invalid("bin_width_secs must be at least 1".to_owned()));
        }
        if replay.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms must be at least 1".to_owned()));
        }

        let label_fields = replay
            .label_fields
            .or_else(|| replay.end.as_deref().map(duration::field_count))
            .unwrap_or_else(default_label_fields);
        if !(1..=MAX_FIELDS).contains(&label_fields) {
            return Err(invalid(format!(
                "label_fields must be between 1 and {MAX_FIELDS}, got {label_fields}"
            )));
        }

        let settings = ReplaySettings {
            start_offset_ms: duration::to_millis(start),
            end_offset_ms: end.map(duration::to_millis),
            rate: replay.rate,
            bin_width_secs: replay.bin_width_secs,
            label_fields,
            tick_interval: Duration::from_millis(replay.tick_interval_ms),
            word_tally: replay.word_cloud,
        };

        Ok(ValidatedConfig {
            settings,
            categories: self.build_categories()?,
        })
    }

    fn build_categories(&self) -> Result<Vec<Category>, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut categories = Vec::with_capacity(self.categories.len());
        for (index, raw) in self.categories.iter().enumerate() {
            let id = raw.id.clone().unwrap_or_else(|| slug(&raw.label, index));
            if !seen.insert(id.clone()) {
                return Err(invalid(format!("duplicate category id {id:?}")));
            }
            categories.push(Category::new(
                id,
                raw.label.clone(),
                raw.color.clone(),
                raw.keywords.clone().into_keywords(),
            ));
        }
        Ok(categories)
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

/// Lowercased label with runs of non-alphanumerics collapsed to `-`, or a
/// positional id for labels with no usable characters.
fn slug(label: &str, index: usize) -> String {
    let slug = label
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        format!("category-{index}")
    } else {
        slug
    }
}

/// Playback settings as written in YAML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplaySection {
    /// Start offset, e.g. `0` or `00:05:00`.
    #[serde(default = "default_start")]
    pub start: String,

    /// End offset. Defaults to the span of the loaded events.
    #[serde(default)]
    pub end: Option<String>,

    /// Simulated seconds per real second.
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Series bin width in seconds.
    #[serde(default = "default_bin_width_secs")]
    pub bin_width_secs: u64,

    /// Minimum label fields. Defaults to the field count of `end`.
    #[serde(default)]
    pub label_fields: Option<usize>,

    /// Real milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Report the word tally.
    #[serde(default)]
    pub word_cloud: bool,
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: None,
            rate: default_rate(),
            bin_width_secs: default_bin_width_secs(),
            label_fields: None,
            tick_interval_ms: default_tick_interval_ms(),
            word_cloud: false,
        }
    }
}

fn default_start() -> String {
    "0".to_owned()
}

const fn default_rate() -> f64 {
    1.0
}

const fn default_bin_width_secs() -> u64 {
    30
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_label_fields() -> usize {
    3
}

/// One vote category as written in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryConfig {
    /// Stable id. Derived from the label when omitted.
    #[serde(default)]
    pub id: Option<String>,

    /// Legend label.
    pub label: String,

    /// Display color.
    #[serde(default = "default_color")]
    pub color: String,

    /// Keyword list or shell-quoted keyword line.
    #[serde(default)]
    pub keywords: KeywordSpec,
}

fn default_color() -> String {
    "#888888".to_owned()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Input file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// Chat export JSON file.
    #[serde(default = "default_events_path")]
    pub events_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            events_path: default_events_path(),
        }
    }
}

impl InputConfig {
    /// Apply `CHATVOTE_EVENTS` if set.
    pub fn apply_env_overrides(&mut self) {
        self.override_events_path(std::env::var(EVENTS_PATH_ENV).ok());
    }

    fn override_events_path(&mut self, value: Option<String>) {
        if let Some(path) = value.filter(|p| !p.trim().is_empty()) {
            self.events_path = PathBuf::from(path);
        }
    }
}

fn default_events_path() -> PathBuf {
    PathBuf::from("chat.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatvote_types::CategoryId;

    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = ReplayConfig::parse("").unwrap();
        assert_eq!(config.replay, ReplaySection::default());
        let validated = config.validate().unwrap();
        assert_eq!(validated.settings.start_offset_ms, 0);
        assert_eq!(validated.settings.end_offset_ms, None);
        assert_eq!(validated.settings.bin_width_secs, 30);
        assert_eq!(validated.settings.label_fields, 3);
        assert_eq!(validated.settings.tick_interval, Duration::from_millis(100));
        assert!(validated.categories.is_empty());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r##"
replay:
  start: "00:01:00"
  end: "1:00:00:00"
  rate: 2.5
  bin_width_secs: 10
  tick_interval_ms: 50
  word_cloud: true

categories:
  - label: Buy It
    color: "#00ff00"
    keywords: 'buy "to the moon"'
  - id: sell
    label: Sell
    keywords: [Sell, short, ""]

logging:
  level: debug
  format: json

input:
  events_path: data/chat.json
"##;
        let config = ReplayConfig::parse(yaml).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");

        let validated = config.validate().unwrap();
        let settings = validated.settings;
        assert_eq!(settings.start_offset_ms, 60_000);
        assert_eq!(settings.end_offset_ms, Some(86_400_000));
        assert_eq!(settings.label_fields, 4);
        assert!(settings.word_tally);
        assert_eq!(settings.tick_interval, Duration::from_millis(50));

        let buy = validated.categories.first().unwrap();
        assert_eq!(buy.id, CategoryId::new("buy-it"));
        assert_eq!(buy.keywords, vec!["buy", "to the moon"]);
        let sell = validated.categories.get(1).unwrap();
        assert_eq!(sell.keywords, vec!["sell", "short"]);
        assert_eq!(sell.color, "#888888");
    }

    #[test]
    fn label_fields_override_wins() {
        let yaml = "replay:\n  end: \"00:10:00\"\n  label_fields: 2\n";
        let validated = ReplayConfig::parse(yaml).unwrap().validate().unwrap();
        assert_eq!(validated.settings.label_fields, 2);
    }

    #[test]
    fn malformed_durations_are_reported() {
        let config = ReplayConfig::parse("replay:\n  start: \"1:2:3:4:5\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Duration { field: "start", .. })
        ));
        let config = ReplayConfig::parse("replay:\n  end: \"ten\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Duration { field: "end", .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for yaml in [
            "replay:\n  rate: 0\n",
            "replay:\n  bin_width_secs: 0\n",
            "replay:\n  tick_interval_ms: 0\n",
            "replay:\n  label_fields: 5\n",
            "replay:\n  start: \"10\"\n  end: \"5\"\n",
        ] {
            let config = ReplayConfig::parse(yaml).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { .. })),
                "{yaml}"
            );
        }
    }

    #[test]
    fn duplicate_category_ids_are_rejected() {
        let yaml = "categories:\n  - label: Buy\n  - label: BUY\n";
        let config = ReplayConfig::parse(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            ReplayConfig::parse("replay: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn events_path_override() {
        let mut input = InputConfig::default();
        input.override_events_path(None);
        assert_eq!(input.events_path, PathBuf::from("chat.json"));
        input.override_events_path(Some("  ".to_owned()));
        assert_eq!(input.events_path, PathBuf::from("chat.json"));
        input.override_events_path(Some("/tmp/other.json".to_owned()));
        assert_eq!(input.events_path, PathBuf::from("/tmp/other.json"));
    }

    #[test]
    fn slug_falls_back_to_position() {
        assert_eq!(slug("To the Moon!", 0), "to-the-moon");
        assert_eq!(slug("!!!", 3), "category-3");
    }
}
