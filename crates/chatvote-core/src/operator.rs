//! Operator control channel for a running replay.
//!
//! The runner owns the [`ReplayEngine`] outright. Everything else talks to
//! it through a [`ReplayHandle`], which queues [`ControlCommand`]s on a
//! bounded `mpsc` channel. The runner drains commands only between ticks, so
//! a reconfiguration is always sequenced after the tick in flight.
//!
//! Fallible commands carry a `oneshot` sender for the result.
//!
//! [`ReplayEngine`]: crate::engine::ReplayEngine

use chatvote_types::{Category, PlaybackStatus, RawChatEvent, TickOutput};
use tokio::sync::{mpsc, oneshot};

use crate::engine::EngineError;

/// Default command queue depth.
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

/// Errors returned by [`ReplayHandle`] calls.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The runner is gone.
    #[error("replay runner is no longer running")]
    Closed,

    /// The engine rejected the command.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },
}

/// A request for the replay runner.
#[derive(Debug)]
pub enum ControlCommand {
    /// Start a fresh pass.
    Play,
    /// Suspend ticking.
    Pause,
    /// Halt and rewind the clock.
    Stop,
    /// Resume or restart when `true`, pause when `false`.
    SetPlaying {
        /// Desired playing state.
        playing: bool,
        /// Receives the resulting status.
        reply: oneshot::Sender<PlaybackStatus>,
    },
    /// Change the playback rate.
    SetRate {
        /// New rate.
        rate: f64,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Change the bin width.
    SetBinWidth {
        /// New bin width in seconds.
        seconds: u64,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Replace the categories.
    SetCategories {
        /// New categories.
        categories: Vec<Category>,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Replace the events.
    LoadEvents {
        /// New events.
        events: Vec<RawChatEvent>,
        /// Receives the number of events loaded.
        reply: oneshot::Sender<Result<usize, EngineError>>,
    },
    /// Read the current state.
    Snapshot {
        /// Receives the snapshot.
        reply: oneshot::Sender<TickOutput>,
    },
    /// End the runner.
    Shutdown,
}

/// Cloneable sender side of the control channel.
#[derive(Debug, Clone)]
pub struct ReplayHandle {
    tx: mpsc::Sender<ControlCommand>,
}

/// Create a control channel with room for `capacity` queued commands.
pub fn channel(capacity: usize) -> (ReplayHandle, mpsc::Receiver<ControlCommand>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ReplayHandle { tx }, rx)
}

impl ReplayHandle {
    /// Queue a command without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has ended.
    pub async fn send(&self, command: ControlCommand) -> Result<(), HandleError> {
        self.tx.send(command).await.map_err(|_closed| HandleError::Closed)
    }

    /// Start a fresh pass.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has ended.
    pub async fn play(&self) -> Result<(), HandleError> {
        self.send(ControlCommand::Play).await
    }

    /// Suspend ticking.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has ended.
    pub async fn pause(&self) -> Result<(), HandleError> {
        self.send(ControlCommand::Pause).await
    }

    /// Halt and rewind.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has ended.
    pub async fn stop(&self) -> Result<(), HandleError> {
        self.send(ControlCommand::Stop).await
    }

    /// Ask the runner to end.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has already ended.
    pub async fn shutdown(&self) -> Result<(), HandleError> {
        self.send(ControlCommand::Shutdown).await
    }

    /// Resume, restart, or pause. Returns the resulting status.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has ended.
    pub async fn set_playing(&self, playing: bool) -> Result<PlaybackStatus, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::SetPlaying { playing, reply }).await?;
        rx.await.map_err(|_closed| HandleError::Closed)
    }

    /// Change the playback rate.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the runner has ended or the rate is invalid.
    pub async fn set_rate(&self, rate: f64) -> Result<(), HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::SetRate { rate, reply }).await?;
        rx.await
            .map_err(|_closed| HandleError::Closed)?
            .map_err(HandleError::from)
    }

    /// Change the bin width.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the runner has ended or the width is zero.
    pub async fn set_bin_width(&self, seconds: u64) -> Result<(), HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::SetBinWidth { seconds, reply }).await?;
        rx.await
            .map_err(|_closed| HandleError::Closed)?
            .map_err(HandleError::from)
    }

    /// Replace the categories.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the runner has ended or rebuilding fails.
    pub async fn set_categories(&self, categories: Vec<Category>) -> Result<(), HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::SetCategories { categories, reply })
            .await?;
        rx.await
            .map_err(|_closed| HandleError::Closed)?
            .map_err(HandleError::from)
    }

    /// Replace the events. Returns the number loaded.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] if the runner has ended or an event is
    /// invalid.
    pub async fn load_events(&self, events: Vec<RawChatEvent>) -> Result<usize, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::LoadEvents { events, reply }).await?;
        rx.await
            .map_err(|_closed| HandleError::Closed)?
            .map_err(HandleError::from)
    }

    /// Read the current state.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Closed`] if the runner has ended.
    pub async fn snapshot(&self) -> Result<TickOutput, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_closed| HandleError::Closed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commands_arrive_in_order() {
        let (handle, mut rx) = channel(4);
        handle.play().await.unwrap();
        handle.pause().await.unwrap();
        handle.shutdown().await.unwrap();
        assert!(matches!(rx.recv().await, Some(ControlCommand::Play)));
        assert!(matches!(rx.recv().await, Some(ControlCommand::Pause)));
        assert!(matches!(rx.recv().await, Some(ControlCommand::Shutdown)));
    }

    #[tokio::test]
    async fn closed_runner_is_reported() {
        let (handle, rx) = channel(1);
        drop(rx);
        assert!(matches!(handle.play().await, Err(HandleError::Closed)));
        assert!(matches!(handle.snapshot().await, Err(HandleError::Closed)));
    }

    #[tokio::test]
    async fn dropped_reply_is_reported() {
        let (handle, mut rx) = channel(1);
        let server = tokio::spawn(async move {
            // Receive and drop the command without replying.
            let _ = rx.recv().await;
        });
        assert!(matches!(handle.set_rate(2.0).await, Err(HandleError::Closed)));
        server.await.unwrap();
    }
}
