//! The replay engine: one explicit owner for every piece of replay state.
//!
//! The engine wires the pipeline together. Each [`ReplayEngine::tick`]
//! advances the [`ReplayClock`], pulls newly elapsed events from the
//! [`EventStore`], resolves them into vote changes, and folds those into the
//! [`Aggregator`]. A tick is a plain function of the engine state and the
//! real time that passed; scheduling lives in [`crate::runner`].
//!
//! # Restart semantics
//!
//! - [`ReplayEngine::play`] always starts a fresh pass: resolver, aggregates
//!   and word tally are cleared, and both the clock and the event cursor move
//!   to the configured start offset.
//! - Loading events, replacing categories, or changing the bin width is a
//!   reconfiguration. Playback state is captured, the change applied, derived
//!   state rebuilt from the start offset up to the captured offset, and the
//!   captured state restored.

use std::time::Duration;

use chatvote_ledger::LedgerError;
use chatvote_types::{
    BinnedSeries, Category, CategoryTotal, PlaybackStatus, RawChatEvent, TickOutput, WordCount,
};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateError, Aggregator};
use crate::clock::{ClockError, ReplayClock};
use crate::resolver::VoteResolver;
use crate::store::{EventStore, StoreError};
use crate::words::WordTally;

/// Real time between ticks unless configured otherwise.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// The word tally is refreshed on every this many ticks.
pub const WORD_REFRESH_TICKS: u64 = 50;

/// Words below this percentage of the most frequent word are not reported.
pub const WORD_MIN_PERCENT: u64 = 1;

/// Errors that can occur while driving the replay engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Event loading failed.
    #[error("event store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The vote ledger rejected a change.
    #[error("vote ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },

    /// The aggregator rejected a change.
    #[error("aggregation error: {source}")]
    Aggregate {
        /// The underlying aggregation error.
        #[from]
        source: AggregateError,
    },

    /// Clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// Bin width must be a positive number of seconds.
    #[error("bin width must be at least 1 second")]
    InvalidBinWidth,
}

/// Typed playback settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    /// Where each pass starts, in milliseconds after the first event.
    pub start_offset_ms: u64,
    /// Where each pass ends. `None` means the span of the loaded events.
    pub end_offset_ms: Option<u64>,
    /// Simulated seconds per real second.
    pub rate: f64,
    /// Width of one series bin in seconds.
    pub bin_width_secs: u64,
    /// Minimum number of fields in bin labels and the clock display.
    pub label_fields: usize,
    /// Real time between ticks.
    pub tick_interval: Duration,
    /// Maintain the word tally.
    pub word_tally: bool,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            start_offset_ms: 0,
            end_offset_ms: None,
            rate: 1.0,
            bin_width_secs: 30,
            label_fields: 3,
            tick_interval: DEFAULT_TICK_INTERVAL,
            word_tally: false,
        }
    }
}

/// What [`ReplayEngine::play`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new pass started.
    Started,
    /// No events are loaded; the engine stays stopped.
    NothingToPlay,
}

/// Owner of the event store, vote state, aggregates and clock.
#[derive(Debug)]
pub struct ReplayEngine {
    settings: ReplaySettings,
    categories: Vec<Category>,
    store: EventStore,
    resolver: VoteResolver,
    aggregator: Aggregator,
    words: WordTally,
    clock: ReplayClock,
    /// Ticks since the current pass started.
    ticks: u64,
    /// Totals and labels handed out by the previous tick.
    last_totals: Option<Vec<i64>>,
    last_labels: Option<Vec<String>>,
}

impl ReplayEngine {
    /// Create a stopped engine with no events.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Clock`] for an invalid rate and
    /// [`EngineError::InvalidBinWidth`] for a zero bin width.
    pub fn new(settings: ReplaySettings, categories: Vec<Category>) -> Result<Self, EngineError> {
        if settings.bin_width_secs == 0 {
            return Err(EngineError::InvalidBinWidth);
        }
        let clock = ReplayClock::new(settings.rate)?;
        let aggregator = Aggregator::new(
            &categories,
            settings.bin_width_secs,
            settings.label_fields,
            None,
        );
        Ok(Self {
            settings,
            categories,
            store: EventStore::new(),
            resolver: VoteResolver::new(),
            aggregator,
            words: WordTally::new(),
            clock,
            ticks: 0,
            last_totals: None,
            last_labels: None,
        })
    }

    // -----------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------

    /// Start a fresh pass from the start offset.
    pub fn play(&mut self) -> PlayOutcome {
        self.reset_derived();
        if self.store.is_empty() {
            self.clock.stop();
            info!("No events loaded, nothing to play");
            return PlayOutcome::NothingToPlay;
        }

        let start = self.start_ms();
        if let Some(instant) = self.instant_at(start) {
            self.store.reset_cursor(instant);
        }
        self.clock.start_at(start);
        info!(
            start_ms = start,
            end_ms = self.end_ms(),
            rate = self.clock.rate(),
            events = self.store.len(),
            "Replay started"
        );
        PlayOutcome::Started
    }

    /// Suspend ticking, keeping derived state.
    pub fn pause(&mut self) {
        if self.clock.pause() {
            info!(offset_ms = self.clock.offset_ms(), "Replay paused");
        }
    }

    /// Halt playback and rewind the clock to zero.
    pub fn stop(&mut self) {
        self.clock.stop();
        info!("Replay stopped");
    }

    /// Resume from a pause, or start a fresh pass when stopped or finished.
    ///
    /// Returns the status afterwards.
    pub fn set_playing(&mut self, playing: bool) -> PlaybackStatus {
        if !playing {
            self.pause();
            return self.clock.status();
        }
        match self.clock.status() {
            PlaybackStatus::Playing => {}
            PlaybackStatus::Paused if !self.clock.is_finished() => {
                if self.clock.resume() {
                    info!(offset_ms = self.clock.offset_ms(), "Replay resumed");
                }
            }
            PlaybackStatus::Paused | PlaybackStatus::Stopped => {
                let _ = self.play();
            }
        }
        self.clock.status()
    }

    /// Advance by one tick of `real` elapsed time.
    ///
    /// Returns `None` when not playing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the clock overflows or a vote change
    /// breaks the ledger or aggregate invariants.
    pub fn tick(&mut self, real: Duration) -> Result<Option<TickOutput>, EngineError> {
        if !self.clock.status().is_playing() {
            return Ok(None);
        }

        let offset = self.clock.advance(real)?;
        let end = self.end_ms();
        self.process_until(offset.min(end))?;
        self.ticks = self.ticks.saturating_add(1);

        if offset >= end {
            self.clock.finish(end);
            info!(
                end_ms = end,
                ticks = self.ticks,
                votes = self.resolver.stats().changes,
                actors = self.resolver.ledger().actor_count(),
                "Replay reached end offset"
            );
        }

        let refresh_words = self.settings.word_tally
            && (self.clock.is_finished() || self.ticks % WORD_REFRESH_TICKS == 0);
        let words = refresh_words.then(|| self.words.top_words(WORD_MIN_PERCENT));
        Ok(Some(self.output(words)))
    }

    // -----------------------------------------------------------------
    // Reconfiguration
    // -----------------------------------------------------------------

    /// Replace the event list. Returns the number of events loaded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if any event is invalid; the previous
    /// events and state are kept in that case.
    pub fn load_events(&mut self, events: Vec<RawChatEvent>) -> Result<usize, EngineError> {
        self.reconfigure("events", |engine| Ok(engine.store.load(events)?))
    }

    /// Replace the category list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if rebuilding derived state fails.
    pub fn set_categories(&mut self, categories: Vec<Category>) -> Result<(), EngineError> {
        self.reconfigure("categories", |engine| {
            engine.categories = categories;
            Ok(())
        })
    }

    /// Change the bin width and rebuild the series.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidBinWidth`] for zero.
    pub fn set_bin_width(&mut self, bin_width_secs: u64) -> Result<(), EngineError> {
        if bin_width_secs == 0 {
            return Err(EngineError::InvalidBinWidth);
        }
        self.reconfigure("bin width", |engine| {
            engine.settings.bin_width_secs = bin_width_secs;
            Ok(())
        })
    }

    /// Change the playback rate from the next tick on.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Clock`] for a rate that is not finite and
    /// positive.
    pub fn set_rate(&mut self, rate: f64) -> Result<(), EngineError> {
        self.clock.set_rate(rate)?;
        self.settings.rate = rate;
        debug!(rate, "Playback rate changed");
        Ok(())
    }

    /// Apply a change that invalidates derived state, then rebuild it.
    fn reconfigure<T>(
        &mut self,
        what: &'static str,
        apply: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let status = self.clock.status();
        let offset = self.clock.offset_ms();

        let value = apply(self)?;

        self.reset_derived();
        if status == PlaybackStatus::Stopped {
            info!(what, "Reconfigured while stopped");
            return Ok(value);
        }
        if self.store.is_empty() {
            self.clock.stop();
            warn!(what, "Reconfigured with no events, replay stopped");
            return Ok(value);
        }

        // Rebuild the pass so far in one step.
        let start = self.start_ms();
        if let Some(instant) = self.instant_at(start) {
            self.store.reset_cursor(instant);
        }
        let end = self.end_ms();
        self.process_until(offset.min(end))?;
        if offset >= end {
            self.clock.finish(end);
        } else {
            self.clock.seek(offset);
            self.clock.restore(status, false);
        }
        info!(what, offset_ms = offset, status = ?self.clock.status(), "Reconfigured and rebuilt");
        Ok(value)
    }

    /// Clear everything derived from events and categories.
    fn reset_derived(&mut self) {
        self.resolver.reset();
        self.words.clear();
        self.aggregator = Aggregator::new(
            &self.categories,
            self.settings.bin_width_secs,
            self.settings.label_fields,
            self.store.first_timestamp(),
        );
        self.ticks = 0;
        self.last_totals = None;
        self.last_labels = None;
    }

    // -----------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------

    /// Feed every event up to `offset_ms` through the pipeline.
    fn process_until(&mut self, offset_ms: u64) -> Result<(), EngineError> {
        let Some(instant) = self.instant_at(offset_ms) else {
            return Ok(());
        };
        let events = self.store.advance_to(instant);
        if events.is_empty() {
            return Ok(());
        }
        if self.settings.word_tally {
            for event in events {
                self.words.add(&event.body);
            }
        }
        let processed = events.len();
        let changes = self.resolver.resolve(events, &self.categories)?;
        for change in &changes {
            self.aggregator.apply(change)?;
        }
        debug!(
            events = processed,
            changes = changes.len(),
            cursor = self.store.cursor(),
            "Events processed"
        );
        Ok(())
    }

    /// Absolute time of a simulated offset.
    fn instant_at(&self, offset_ms: u64) -> Option<DateTime<Utc>> {
        let first = self.store.first_timestamp()?;
        let millis = i64::try_from(offset_ms).unwrap_or(i64::MAX);
        let delta = TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX);
        Some(first.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Start offset of the current pass, never past its end.
    pub fn start_ms(&self) -> u64 {
        self.settings.start_offset_ms.min(self.end_ms())
    }

    /// End offset of the current pass.
    pub fn end_ms(&self) -> u64 {
        self.settings.end_offset_ms.unwrap_or_else(|| {
            self.store
                .span()
                .and_then(|span| u64::try_from(span.num_milliseconds()).ok())
                .unwrap_or(0)
        })
    }

    // -----------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------

    /// Build a tick output, updating the change flags.
    fn output(&mut self, words: Option<Vec<WordCount>>) -> TickOutput {
        let totals = self.aggregator.totals();
        let series = self.aggregator.series();

        let values: Vec<i64> = totals.iter().map(|t| t.total).collect();
        let totals_changed = self.last_totals.as_ref() != Some(&values);
        let labels_changed = self.last_labels.as_ref() != Some(&series.labels);
        self.last_totals = Some(values);
        self.last_labels = Some(series.labels.clone());

        TickOutput {
            status: self.clock.status(),
            offset_seconds: self.clock.offset_seconds(),
            clock: self.clock.display(self.settings.label_fields),
            totals,
            series,
            words,
            totals_changed,
            labels_changed,
            finished: self.clock.is_finished(),
        }
    }

    /// Read-only view of the current state. Change flags are always false.
    pub fn snapshot(&self) -> TickOutput {
        TickOutput {
            status: self.clock.status(),
            offset_seconds: self.clock.offset_seconds(),
            clock: self.clock.display(self.settings.label_fields),
            totals: self.aggregator.totals(),
            series: self.aggregator.series(),
            words: self
                .settings
                .word_tally
                .then(|| self.words.top_words(WORD_MIN_PERCENT)),
            totals_changed: false,
            labels_changed: false,
            finished: self.clock.is_finished(),
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// Playback status.
    pub const fn status(&self) -> PlaybackStatus {
        self.clock.status()
    }

    /// Current settings.
    pub const fn settings(&self) -> &ReplaySettings {
        &self.settings
    }

    /// Configured categories.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// The event store.
    pub const fn store(&self) -> &EventStore {
        &self.store
    }

    /// The vote resolver and its ledger.
    pub const fn resolver(&self) -> &VoteResolver {
        &self.resolver
    }

    /// The replay clock.
    pub const fn clock(&self) -> &ReplayClock {
        &self.clock
    }

    /// Running totals.
    pub fn totals(&self) -> Vec<CategoryTotal> {
        self.aggregator.totals()
    }

    /// Binned series.
    pub fn series(&self) -> BinnedSeries {
        self.aggregator.series()
    }
}
