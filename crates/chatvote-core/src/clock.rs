//! Replay clock: simulated time and the playback state machine.
//!
//! Simulated time is the offset from the first chat event, held in whole
//! milliseconds. Each tick advances it by `rate x real tick interval`,
//! computed in nanoseconds. The part of a step below one millisecond is
//! carried into the next tick, so slow rates still move the clock and the
//! sum over many ticks stays exact to the nanosecond.
//!
//! ```text
//!            start_at                 pause
//! Stopped ------------> Playing -------------> Paused
//!    ^                    |  ^                   |
//!    |        stop        |  |      resume       |
//!    +--------------------+  +-------------------+
//! ```
//!
//! Reaching the end offset is a `finish`: the clock pauses at the end and
//! remembers that the pass is complete.

use std::time::Duration;

use chatvote_types::PlaybackStatus;

use crate::duration;

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    /// Playback rate is zero, negative, or not finite.
    #[error("playback rate must be a finite positive number, got {rate}")]
    InvalidRate {
        /// The rejected rate.
        rate: f64,
    },

    /// The simulated offset would exceed `u64::MAX` milliseconds.
    #[error("simulated offset overflow")]
    OffsetOverflow,
}

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Simulated-time cursor plus playback status.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayClock {
    /// Simulated time since the first event, in milliseconds.
    offset_ms: u64,
    /// Simulated nanoseconds past `offset_ms`, always below one millisecond.
    pending_ns: u64,
    /// Rounding residue of the last step, within half a nanosecond.
    residue_ns: f64,
    /// Simulated seconds per real second.
    rate: f64,
    status: PlaybackStatus,
    /// The current pass reached its end offset.
    finished: bool,
}

impl ReplayClock {
    /// Create a stopped clock at offset zero.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRate`] if `rate` is not a finite
    /// positive number.
    pub fn new(rate: f64) -> Result<Self, ClockError> {
        check_rate(rate)?;
        Ok(Self {
            offset_ms: 0,
            pending_ns: 0,
            residue_ns: 0.0,
            rate,
            status: PlaybackStatus::Stopped,
            finished: false,
        })
    }

    /// Change the playback rate. Takes effect from the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRate`] and keeps the old rate if `rate`
    /// is not a finite positive number.
    pub fn set_rate(&mut self, rate: f64) -> Result<(), ClockError> {
        check_rate(rate)?;
        self.rate = rate;
        Ok(())
    }

    /// Advance simulated time by one real tick. Returns the new offset in
    /// whole milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::OffsetOverflow`] if the offset would overflow.
    /// The clock is left unchanged in that case.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn advance(&mut self, interval: Duration) -> Result<u64, ClockError> {
        let exact = self
            .rate
            .mul_add(interval.as_secs_f64() * 1e9, self.residue_ns);
        let step = exact.round();
        if !step.is_finite() || step >= u64::MAX as f64 {
            return Err(ClockError::OffsetOverflow);
        }
        let step_ns = step.max(0.0) as u64;

        let total_ns = self
            .pending_ns
            .checked_add(step_ns)
            .ok_or(ClockError::OffsetOverflow)?;
        let offset_ms = self
            .offset_ms
            .checked_add(total_ns / NANOS_PER_MILLI)
            .ok_or(ClockError::OffsetOverflow)?;

        self.offset_ms = offset_ms;
        self.pending_ns = total_ns % NANOS_PER_MILLI;
        self.residue_ns = exact - step;
        Ok(self.offset_ms)
    }

    /// Move to an exact millisecond offset, dropping any carried fraction.
    const fn place(&mut self, offset_ms: u64) {
        self.offset_ms = offset_ms;
        self.pending_ns = 0;
        self.residue_ns = 0.0;
    }

    /// Begin a new pass at `offset_ms`.
    pub const fn start_at(&mut self, offset_ms: u64) {
        self.place(offset_ms);
        self.status = PlaybackStatus::Playing;
        self.finished = false;
    }

    /// Move simulated time without changing status.
    pub const fn seek(&mut self, offset_ms: u64) {
        self.place(offset_ms);
    }

    /// Playing -> Paused. Returns whether the status changed.
    pub const fn pause(&mut self) -> bool {
        if self.status.is_playing() {
            self.status = PlaybackStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Paused -> Playing, unless the pass already finished. Returns whether
    /// the status changed.
    pub const fn resume(&mut self) -> bool {
        if matches!(self.status, PlaybackStatus::Paused) && !self.finished {
            self.status = PlaybackStatus::Playing;
            true
        } else {
            false
        }
    }

    /// Halt playback and rewind to zero.
    pub const fn stop(&mut self) {
        self.status = PlaybackStatus::Stopped;
        self.place(0);
        self.finished = false;
    }

    /// End the pass: clamp to `end_ms` and pause.
    pub const fn finish(&mut self, end_ms: u64) {
        self.place(end_ms);
        self.status = PlaybackStatus::Paused;
        self.finished = true;
    }

    /// Force a status, used when restoring state after a reconfiguration.
    pub const fn restore(&mut self, status: PlaybackStatus, finished: bool) {
        self.status = status;
        self.finished = finished;
    }

    /// Current simulated offset in milliseconds.
    pub const fn offset_ms(&self) -> u64 {
        self.offset_ms
    }

    /// Current simulated offset in seconds.
    pub const fn offset_seconds(&self) -> f64 {
        duration::millis_to_seconds(self.offset_ms)
    }

    /// Playback rate.
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Playback status.
    pub const fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Whether the current pass reached its end offset.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// The offset formatted for display.
    ///
    /// Below normal speed a whole-second value gets a trailing `.0` so the
    /// display width stays stable while tenths tick by.
    pub fn display(&self, label_fields: usize) -> String {
        let mut text = duration::format(self.offset_seconds(), label_fields);
        if self.rate < 1.0 && !text.contains('.') {
            text.push_str(".0");
        }
        text
    }
}

fn check_rate(rate: f64) -> Result<(), ClockError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(ClockError::InvalidRate { rate })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn new_clock_is_stopped_at_zero() {
        let clock = ReplayClock::new(1.0).unwrap();
        assert_eq!(clock.status(), PlaybackStatus::Stopped);
        assert_eq!(clock.offset_ms(), 0);
        assert!(!clock.is_finished());
    }

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(ReplayClock::new(0.0).is_err());
        assert!(ReplayClock::new(-1.0).is_err());
        assert!(ReplayClock::new(f64::NAN).is_err());
        let mut clock = ReplayClock::new(2.0).unwrap();
        assert!(clock.set_rate(f64::INFINITY).is_err());
        assert!((clock.rate() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn advance_scales_by_rate() {
        let mut clock = ReplayClock::new(1.0).unwrap();
        clock.start_at(0);
        assert_eq!(clock.advance(TICK).unwrap(), 100);
        clock.set_rate(10.0).unwrap();
        assert_eq!(clock.advance(TICK).unwrap(), 1100);
        clock.set_rate(0.25).unwrap();
        assert_eq!(clock.advance(TICK).unwrap(), 1125);
    }

    #[test]
    fn many_ticks_do_not_drift() {
        let mut clock = ReplayClock::new(1.0).unwrap();
        clock.start_at(0);
        for _ in 0..10_000 {
            clock.advance(TICK).unwrap();
        }
        assert_eq!(clock.offset_ms(), 1_000_000);
    }

    fn ticks_at(rate: f64, ticks: u32) -> u64 {
        let mut clock = ReplayClock::new(rate).unwrap();
        clock.start_at(0);
        for _ in 0..ticks {
            clock.advance(TICK).unwrap();
        }
        clock.offset_ms()
    }

    #[test]
    fn sub_millisecond_steps_carry_over() {
        // 0.4 ms per tick: nothing visible on the first tick, but it adds up.
        let mut clock = ReplayClock::new(0.004).unwrap();
        clock.start_at(0);
        assert_eq!(clock.advance(TICK).unwrap(), 0);
        assert_eq!(clock.advance(TICK).unwrap(), 0);
        assert_eq!(clock.advance(TICK).unwrap(), 1);
        assert_eq!(ticks_at(0.004, 10_000), 4_000);
    }

    #[test]
    fn fractional_rates_track_rate_times_interval() {
        assert_eq!(ticks_at(0.015, 1_000), 1_500);
        assert_eq!(ticks_at(1.005, 1_000), 100_500);
        assert_eq!(ticks_at(0.25, 1_000), 25_000);
    }

    #[test]
    fn seek_drops_carried_fraction() {
        let mut clock = ReplayClock::new(0.004).unwrap();
        clock.start_at(0);
        clock.advance(TICK).unwrap();
        clock.advance(TICK).unwrap();
        clock.seek(10);
        // 0.8 ms were pending; after the seek one tick adds only 0.4 ms.
        assert_eq!(clock.advance(TICK).unwrap(), 10);
    }

    #[test]
    fn advance_overflow_is_an_error() {
        let mut clock = ReplayClock::new(1.0).unwrap();
        clock.start_at(u64::MAX);
        assert_eq!(clock.advance(TICK), Err(ClockError::OffsetOverflow));
    }

    #[test]
    fn state_transitions() {
        let mut clock = ReplayClock::new(1.0).unwrap();
        assert!(!clock.pause());
        assert!(!clock.resume());

        clock.start_at(5000);
        assert_eq!(clock.status(), PlaybackStatus::Playing);
        assert!(clock.pause());
        assert_eq!(clock.status(), PlaybackStatus::Paused);
        assert!(clock.resume());
        assert_eq!(clock.status(), PlaybackStatus::Playing);

        clock.stop();
        assert_eq!(clock.status(), PlaybackStatus::Stopped);
        assert_eq!(clock.offset_ms(), 0);
    }

    #[test]
    fn finished_pass_cannot_resume() {
        let mut clock = ReplayClock::new(1.0).unwrap();
        clock.start_at(0);
        clock.finish(12_000);
        assert_eq!(clock.status(), PlaybackStatus::Paused);
        assert_eq!(clock.offset_ms(), 12_000);
        assert!(clock.is_finished());
        assert!(!clock.resume());
    }

    #[test]
    fn display_appends_tenth_below_normal_speed() {
        let mut clock = ReplayClock::new(1.0).unwrap();
        clock.seek(90_000);
        assert_eq!(clock.display(3), "00:01:30");

        clock.set_rate(0.5).unwrap();
        assert_eq!(clock.display(3), "00:01:30.0");
        clock.seek(90_500);
        assert_eq!(clock.display(3), "00:01:30.5");
    }
}
