//! JSON-lines tick output.
//!
//! Each emitted line is one [`TickOutput`] with a `kind` tag: `"tick"` for
//! ticks that changed something the renderer shows, `"state"` for snapshots
//! taken after an operator command. Ticks that only move the clock are
//! skipped except for the one that finishes the pass.

use std::io::Write;

use chatvote_core::runner::TickCallback;
use chatvote_types::TickOutput;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
struct Line<'a> {
    kind: &'static str,
    #[serde(flatten)]
    output: &'a TickOutput,
}

/// Tick callback that writes one JSON object per line.
pub struct JsonLinesCallback<W> {
    out: W,
    lines: u64,
    skipped: u64,
}

impl<W: Write + Send> JsonLinesCallback<W> {
    /// Write to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            lines: 0,
            skipped: 0,
        }
    }

    /// Lines written so far.
    pub const fn lines(&self) -> u64 {
        self.lines
    }

    /// Ticks skipped because nothing visible changed.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, kind: &'static str, output: &TickOutput) {
        let result = serde_json::to_writer(&mut self.out, &Line { kind, output })
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.lines = self.lines.saturating_add(1),
            Err(e) => warn!(error = %e, kind, "failed to write output line"),
        }
    }
}

const fn is_visible(output: &TickOutput) -> bool {
    output.totals_changed || output.labels_changed || output.finished || output.words.is_some()
}

impl<W: Write + Send> TickCallback for JsonLinesCallback<W> {
    fn on_tick(&mut self, output: &TickOutput) {
        if is_visible(output) {
            self.emit("tick", output);
        } else {
            self.skipped = self.skipped.saturating_add(1);
        }
    }

    fn on_state_change(&mut self, snapshot: &TickOutput) {
        debug!(status = ?snapshot.status, clock = %snapshot.clock, "State change snapshot");
        self.emit("state", snapshot);
    }
}
