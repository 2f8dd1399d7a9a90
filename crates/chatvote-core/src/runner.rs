//! Async replay driver.
//!
//! [`run_replay`] owns the tick schedule. While the engine is playing it
//! ticks on a fixed real-time interval; otherwise it sleeps on the command
//! channel. Commands and ticks never interleave: a command is handled either
//! before a tick starts or after it has been handed to the callback.

use std::time::Duration;

use chatvote_types::TickOutput;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{EngineError, ReplayEngine};
use crate::operator::ControlCommand;

/// Errors that can occur during the replay run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed.
    #[error("tick error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },
}

/// Why the runner returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayEndReason {
    /// The pass reached its end offset and `exit_on_finish` was set.
    Finished,
    /// A [`ControlCommand::Shutdown`] arrived.
    Shutdown,
    /// Every [`ReplayHandle`](crate::operator::ReplayHandle) was dropped
    /// while the engine was idle.
    HandleDropped,
}

/// Runner behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Return as soon as a pass finishes instead of waiting for commands.
    pub exit_on_finish: bool,
}

/// Result of the replay run.
#[derive(Debug)]
pub struct ReplayResult {
    /// Why the run ended.
    pub end_reason: ReplayEndReason,
    /// The last tick output, if any tick ran.
    pub final_output: Option<TickOutput>,
    /// Ticks executed.
    pub total_ticks: u64,
}

/// Receives engine output.
pub trait TickCallback: Send {
    /// Called after every tick.
    fn on_tick(&mut self, output: &TickOutput);

    /// Called with a fresh snapshot after a command changed engine state.
    fn on_state_change(&mut self, _snapshot: &TickOutput) {}
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _output: &TickOutput) {}
}

/// Drive the engine until shutdown, handle loss, or (optionally) the end of
/// the pass.
///
/// The engine's configured tick interval is read once; each tick passes that
/// interval to [`ReplayEngine::tick`] regardless of scheduling jitter, so
/// simulated time depends only on the number of ticks.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub async fn run_replay(
    engine: &mut ReplayEngine,
    commands: &mut mpsc::Receiver<ControlCommand>,
    callback: &mut dyn TickCallback,
    options: RunOptions,
) -> Result<ReplayResult, RunnerError> {
    let period = engine.settings().tick_interval.max(Duration::from_millis(1));
    let first_tick = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut interval = time::interval_at(first_tick, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut final_output: Option<TickOutput> = None;
    let mut total_ticks: u64 = 0;

    info!(
        tick_interval_ms = period.as_millis(),
        status = ?engine.status(),
        exit_on_finish = options.exit_on_finish,
        "Replay runner starting"
    );

    loop {
        let was_playing = engine.status().is_playing();

        let command = if was_playing {
            tokio::select! {
                biased;
                command = commands.recv() => command,
                _ = interval.tick() => {
                    if let Some(output) = engine.tick(period)? {
                        total_ticks = total_ticks.saturating_add(1);
                        callback.on_tick(&output);
                        let finished = output.finished;
                        final_output = Some(output);
                        if finished && options.exit_on_finish {
                            return Ok(ReplayResult {
                                end_reason: ReplayEndReason::Finished,
                                final_output,
                                total_ticks,
                            });
                        }
                    }
                    continue;
                }
            }
        } else {
            commands.recv().await
        };

        let Some(command) = command else {
            if was_playing {
                // Handles are gone but the pass is still running.
                debug!("Control channel closed, playing on");
                return finish_without_commands(
                    engine,
                    &mut interval,
                    period,
                    callback,
                    final_output,
                    total_ticks,
                )
                .await;
            }
            info!("Control channel closed");
            return Ok(ReplayResult {
                end_reason: ReplayEndReason::HandleDropped,
                final_output,
                total_ticks,
            });
        };

        if matches!(command, ControlCommand::Shutdown) {
            info!("Shutdown requested");
            return Ok(ReplayResult {
                end_reason: ReplayEndReason::Shutdown,
                final_output,
                total_ticks,
            });
        }

        if apply_command(engine, command) {
            callback.on_state_change(&engine.snapshot());
        }
        if !was_playing && engine.status().is_playing() {
            // Next tick one full period from now.
            interval.reset();
        }
    }
}

/// Tick to the end of the pass with no control channel left.
async fn finish_without_commands(
    engine: &mut ReplayEngine,
    interval: &mut time::Interval,
    period: Duration,
    callback: &mut dyn TickCallback,
    mut final_output: Option<TickOutput>,
    mut total_ticks: u64,
) -> Result<ReplayResult, RunnerError> {
    while engine.status().is_playing() {
        interval.tick().await;
        if let Some(output) = engine.tick(period)? {
            total_ticks = total_ticks.saturating_add(1);
            callback.on_tick(&output);
            final_output = Some(output);
        }
    }
    Ok(ReplayResult {
        end_reason: if engine.clock().is_finished() {
            ReplayEndReason::Finished
        } else {
            ReplayEndReason::HandleDropped
        },
        final_output,
        total_ticks,
    })
}

/// Apply one command. Returns whether the renderer should be refreshed.
fn apply_command(engine: &mut ReplayEngine, command: ControlCommand) -> bool {
    match command {
        ControlCommand::Play => {
            let _ = engine.play();
            true
        }
        ControlCommand::Pause => {
            engine.pause();
            false
        }
        ControlCommand::Stop => {
            engine.stop();
            true
        }
        ControlCommand::SetPlaying { playing, reply } => {
            let _ = reply.send(engine.set_playing(playing));
            false
        }
        ControlCommand::SetRate { rate, reply } => {
            let result = engine.set_rate(rate);
            if let Err(err) = &result {
                warn!(error = %err, "Rate change rejected");
            }
            let _ = reply.send(result);
            false
        }
        ControlCommand::SetBinWidth { seconds, reply } => {
            let result = engine.set_bin_width(seconds);
            let changed = result.is_ok();
            let _ = reply.send(result);
            changed
        }
        ControlCommand::SetCategories { categories, reply } => {
            let result = engine.set_categories(categories);
            let changed = result.is_ok();
            let _ = reply.send(result);
            changed
        }
        ControlCommand::LoadEvents { events, reply } => {
            let result = engine.load_events(events);
            let changed = result.is_ok();
            let _ = reply.send(result);
            changed
        }
        ControlCommand::Snapshot { reply } => {
            let _ = reply.send(engine.snapshot());
            false
        }
        ControlCommand::Shutdown => false,
    }
}

/// Log the end of a replay run.
pub fn log_replay_end(result: &ReplayResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_clock = result.final_output.as_ref().map(|o| o.clock.as_str()),
        "Replay ended"
    );

    if let Some(ref output) = result.final_output {
        for total in &output.totals {
            info!(category = %total.category, total = total.total, "Final total");
        }
    } else {
        warn!("Replay ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chatvote_types::{Category, PlaybackStatus, RawChatEvent};
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::engine::ReplaySettings;
    use crate::operator;

    #[derive(Default)]
    struct Recorder {
        ticks: Vec<TickOutput>,
        snapshots: usize,
    }

    impl TickCallback for Recorder {
        fn on_tick(&mut self, output: &TickOutput) {
            self.ticks.push(output.clone());
        }

        fn on_state_change(&mut self, _snapshot: &TickOutput) {
            self.snapshots = self.snapshots.saturating_add(1);
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000_i64.saturating_add(secs), 0).unwrap()
    }

    fn engine() -> ReplayEngine {
        let settings = ReplaySettings {
            rate: 10.0,
            bin_width_secs: 10,
            ..ReplaySettings::default()
        };
        let categories = vec![
            Category::new("buy", "Buy", "#00ff00", ["buy"]),
            Category::new("sell", "Sell", "#ff0000", ["sell"]),
        ];
        let mut engine = ReplayEngine::new(settings, categories).unwrap();
        engine
            .load_events(vec![
                RawChatEvent::new(at(0), "u1", "buy now"),
                RawChatEvent::new(at(5), "u1", "buy now"),
                RawChatEvent::new(at(12), "u1", "sell now"),
            ])
            .unwrap();
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_finish() {
        let mut engine = engine();
        let _ = engine.play();
        let (_handle, mut rx) = operator::channel(4);
        let mut recorder = Recorder::default();

        let result = run_replay(
            &mut engine,
            &mut rx,
            &mut recorder,
            RunOptions {
                exit_on_finish: true,
            },
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, ReplayEndReason::Finished);
        assert_eq!(result.total_ticks, 12);
        assert_eq!(recorder.ticks.len(), 12);
        let last = result.final_output.unwrap();
        assert!(last.finished);
        assert_eq!(last.status, PlaybackStatus::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_runner_ends_when_handles_drop() {
        let mut engine = engine();
        let (handle, mut rx) = operator::channel(4);
        drop(handle);

        let result = run_replay(&mut engine, &mut rx, &mut NoOpCallback, RunOptions::default())
            .await
            .unwrap();
        assert_eq!(result.end_reason, ReplayEndReason::HandleDropped);
        assert_eq!(result.total_ticks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_applied_between_ticks() {
        let mut engine = engine();
        let (handle, mut rx) = operator::channel(4);
        let mut recorder = Recorder::default();

        let runner = run_replay(&mut engine, &mut rx, &mut recorder, RunOptions::default());
        let driver = async {
            handle.play().await.unwrap();
            time::sleep(Duration::from_millis(350)).await;
            handle.pause().await.unwrap();
            let paused = handle.snapshot().await.unwrap();

            time::sleep(Duration::from_millis(1_000)).await;
            let still = handle.snapshot().await.unwrap();

            handle.set_rate(20.0).await.unwrap();
            assert!(handle.set_rate(-1.0).await.is_err());
            let status = handle.set_playing(true).await.unwrap();
            time::sleep(Duration::from_millis(150)).await;
            let resumed = handle.snapshot().await.unwrap();

            handle.shutdown().await.unwrap();
            (paused, still, status, resumed)
        };

        let (result, (paused, still, status, resumed)) = tokio::join!(runner, driver);
        let result = result.unwrap();

        assert_eq!(result.end_reason, ReplayEndReason::Shutdown);
        assert_eq!(result.total_ticks, 4);
        assert!((paused.offset_seconds - 3.0).abs() < 1e-9);
        assert!((still.offset_seconds - 3.0).abs() < 1e-9);
        assert_eq!(status, PlaybackStatus::Playing);
        // One tick at 20x after resuming.
        assert!((resumed.offset_seconds - 5.0).abs() < 1e-9);
        // Only `play` refreshed the renderer.
        assert_eq!(recorder.snapshots, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfiguration_while_paused_rebuilds() {
        let mut engine = engine();
        let (handle, mut rx) = operator::channel(4);
        let mut recorder = Recorder::default();

        let runner = run_replay(&mut engine, &mut rx, &mut recorder, RunOptions::default());
        let driver = async {
            handle.play().await.unwrap();
            time::sleep(Duration::from_millis(650)).await;
            handle.pause().await.unwrap();
            handle
                .set_categories(vec![Category::new("now", "Now", "#fff", ["now"])])
                .await
                .unwrap();
            assert!(handle.set_bin_width(0).await.is_err());
            let snapshot = handle.snapshot().await.unwrap();
            handle.shutdown().await.unwrap();
            snapshot
        };

        let (result, snapshot) = tokio::join!(runner, driver);
        assert_eq!(result.unwrap().end_reason, ReplayEndReason::Shutdown);
        assert_eq!(snapshot.status, PlaybackStatus::Paused);
        assert_eq!(snapshot.totals.first().map(|t| t.total), Some(1));
        assert_eq!(recorder.snapshots, 2);
    }
}
