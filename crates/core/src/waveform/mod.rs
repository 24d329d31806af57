//! Waveform trace sessions.
//!
//! A [`TraceSession`] owns one trace sink and moves through a fixed lifecycle:
//! `Unopened → Open → Closed`. It provides:
//! 1. **Open:** Writes the VCD declaration section for the model's signals.
//! 2. **Append:** One timestamped record per tick; the first carries every value, later ones only changes.
//! 3. **Close:** Flushes the sink. Idempotent, and performed on drop so every exit path releases the sink.
//!
//! Appending outside the `Open` state is silently ignored.

/// VCD encoding helpers.
pub mod vcd;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::common::TraceError;
use crate::model::{SignalDecl, SignalSnapshot};

/// Lifecycle state of a [`TraceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Sink attached, header not yet written.
    Unopened,
    /// Header written; records may be appended.
    Open,
    /// Flushed; terminal.
    Closed,
}

/// Trace session writing VCD records to a sink.
#[derive(Debug)]
pub struct TraceSession<W: Write = BufWriter<File>> {
    sink: Option<W>,
    state: SessionState,
    ids: Vec<String>,
    widths: Vec<u32>,
    last: Option<Vec<u64>>,
    last_tick: Option<u64>,
    records: u64,
}

impl TraceSession<BufWriter<File>> {
    /// Creates or truncates the file at `path` and opens a session for `signals`.
    ///
    /// # Errors
    ///
    /// [`TraceError::SinkUnavailable`] if the file cannot be created, or any error from
    /// [`TraceSession::begin`].
    pub fn open(path: impl AsRef<Path>, signals: &[SignalDecl]) -> Result<Self, TraceError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| TraceError::SinkUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut session = Self::new(BufWriter::new(file));
        session.begin(signals)?;
        tracing::info!(path = %path.display(), signals = signals.len(), "trace opened");
        Ok(session)
    }
}

impl<W: Write> TraceSession<W> {
    /// Wraps `sink` in an unopened session.
    pub const fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            state: SessionState::Unopened,
            ids: Vec::new(),
            widths: Vec::new(),
            last: None,
            last_tick: None,
            records: 0,
        }
    }

    /// Writes the declaration section and moves the session to `Open`.
    ///
    /// Does nothing unless the session is `Unopened`.
    ///
    /// # Errors
    ///
    /// [`TraceError::InvalidSignal`] for a width outside `1..=64`, or [`TraceError::Io`].
    pub fn begin(&mut self, signals: &[SignalDecl]) -> Result<(), TraceError> {
        if self.state != SessionState::Unopened {
            tracing::warn!(state = ?self.state, "trace session already started");
            return Ok(());
        }
        if let Some(bad) = signals.iter().find(|s| s.width == 0 || s.width > 64) {
            return Err(TraceError::InvalidSignal {
                name: bad.name.clone(),
                width: bad.width,
            });
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        self.ids = (0..signals.len()).map(vcd::identifier).collect();
        self.widths = signals.iter().map(|s| s.width).collect();
        vcd::write_header(sink, signals, &self.ids)?;
        self.state = SessionState::Open;
        Ok(())
    }

    /// Appends the record for `tick`.
    ///
    /// Ignored unless the session is `Open`. Ticks must increase strictly; a record for a
    /// tick at or before the previous one is dropped with a warning.
    ///
    /// # Errors
    ///
    /// [`TraceError::Io`] if writing to the sink fails.
    pub fn append(&mut self, tick: u64, snapshot: &SignalSnapshot) -> Result<(), TraceError> {
        if self.state != SessionState::Open {
            return Ok(());
        }
        if self.last_tick.is_some_and(|last| tick <= last) {
            tracing::warn!(tick, last = ?self.last_tick, "out-of-order trace record dropped");
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        let current: Vec<u64> = (0..self.ids.len())
            .map(|i| snapshot.get(i).unwrap_or(0) & vcd::mask(self.widths[i]))
            .collect();

        writeln!(sink, "#{tick}")?;
        match &self.last {
            None => {
                writeln!(sink, "$dumpvars")?;
                for ((id, width), value) in self.ids.iter().zip(&self.widths).zip(&current) {
                    vcd::write_value(sink, *width, *value, id)?;
                }
                writeln!(sink, "$end")?;
            }
            Some(previous) => {
                for (i, value) in current.iter().enumerate() {
                    if previous[i] != *value {
                        vcd::write_value(sink, self.widths[i], *value, &self.ids[i])?;
                    }
                }
            }
        }

        self.last = Some(current);
        self.last_tick = Some(tick);
        self.records += 1;
        Ok(())
    }

    /// Flushes the sink and moves the session to `Closed`. Closing again is a no-op.
    ///
    /// # Errors
    ///
    /// [`TraceError::Io`] if the final flush fails; the session is closed regardless.
    pub fn close(&mut self) -> Result<(), TraceError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        tracing::debug!(records = self.records, "trace closed");
        Ok(())
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` while records are being accepted.
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Number of records appended so far.
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Tick of the most recent record.
    pub const fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Borrows the sink.
    pub const fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Closes the session and returns the sink.
    ///
    /// # Errors
    ///
    /// [`TraceError::Io`] if the final flush fails.
    pub fn into_inner(mut self) -> Result<W, TraceError> {
        self.close()?;
        self.sink
            .take()
            .ok_or_else(|| TraceError::Io(std::io::Error::other("trace sink already taken")))
    }
}

impl<W: Write> Drop for TraceSession<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to flush trace on drop");
        }
    }
}
