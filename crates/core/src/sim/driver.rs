//! Tick loop.
//!
//! Each tick the driver performs, in order:
//! 1. **Stimulus:** Drives design-specific inputs through the optional hook.
//! 2. **Clock:** Flips the phase and writes the new level to the clock input.
//! 3. **Reset:** Writes the reset input from the [`ResetWindow`].
//! 4. **Evaluate:** Settles the model once.
//! 5. **Record:** Samples every declared signal into the trace, tagged with the tick.
//! 6. **Advance:** Increments the tick counter.
//!
//! The model's finish request is checked before each tick, so a model that finishes
//! during tick `t` stops the run at `t + 1`.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::checkpoint::CheckpointManager;
use crate::common::{ConfigError, ModelFault, ResetWindow, SimError, SimulationClock, TraceError};
use crate::config::RunConfig;
use crate::model::{Model, SignalSnapshot};
use crate::stats::RunStats;
use crate::store::SnapshotStore;
use crate::waveform::{SessionState, TraceSession};

type Stimulus<M> = Box<dyn FnMut(u64, &mut M)>;

/// Why a run returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The clock reached the tick limit.
    LimitReached,
    /// The model raised its finish flag.
    ModelRequestedFinish,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Tick the clock stopped at; the next run continues from here.
    pub stopped_at: u64,
    /// Why the run returned.
    pub reason: StopReason,
    /// Ticks executed by this run.
    pub ticks_executed: u64,
}

/// Drives a [`Model`] through clock and reset sequencing, tick by tick.
///
/// The driver exclusively owns the model and the clock. Trace sessions and checkpoint
/// managers are collaborators: a trace is attached for as long as it should record,
/// and a manager is passed in for each save or restore.
pub struct Driver<M: Model, W: Write = BufWriter<File>> {
    model: M,
    clock: SimulationClock,
    reset: ResetWindow,
    trace: Option<TraceSession<W>>,
    stimulus: Option<Stimulus<M>>,
    snapshot: SignalSnapshot,
    fault: Option<(u64, ModelFault)>,
    stats: RunStats,
}

impl<M: Model> Driver<M, BufWriter<File>> {
    /// Opens a trace file at `path` for the model's signals and attaches it.
    ///
    /// # Errors
    ///
    /// [`TraceError::SinkUnavailable`] if the file cannot be created. The driver is
    /// left without a trace and can still run.
    pub fn trace_to(&mut self, path: impl AsRef<Path>) -> Result<(), TraceError> {
        let session = TraceSession::open(path, &self.model.signals())?;
        self.attach_trace(session)
    }
}

impl<M: Model, W: Write> Driver<M, W> {
    /// Creates a driver at tick 0 with the clock line low.
    ///
    /// # Arguments
    ///
    /// * `model` - Freshly elaborated model; the driver takes ownership.
    /// * `reset` - Ticks during which reset is held active.
    pub fn new(model: M, reset: ResetWindow) -> Self {
        let snapshot = SignalSnapshot::with_len(model.signals().len());
        Self {
            model,
            clock: SimulationClock::new(),
            reset,
            trace: None,
            stimulus: None,
            snapshot,
            fault: None,
            stats: RunStats::default(),
        }
    }

    /// Creates a driver with the reset window described by `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidResetWindow`] if deassertion precedes assertion.
    pub fn from_config(model: M, config: &RunConfig) -> Result<Self, ConfigError> {
        let reset = ResetWindow::new(config.reset_assert, config.reset_deassert)?;
        Ok(Self::new(model, reset))
    }

    /// Installs a hook that drives design-specific inputs before every clock toggle.
    ///
    /// The hook receives the tick about to run.
    #[must_use]
    pub fn with_stimulus<F>(mut self, stimulus: F) -> Self
    where
        F: FnMut(u64, &mut M) + 'static,
    {
        self.stimulus = Some(Box::new(stimulus));
        self
    }

    /// Attaches `session`, writing its header first if it has not been started.
    ///
    /// A previously attached session is closed and replaced.
    ///
    /// # Errors
    ///
    /// Any error from [`TraceSession::begin`].
    pub fn attach_trace(&mut self, mut session: TraceSession<W>) -> Result<(), TraceError> {
        if session.state() == SessionState::Unopened {
            session.begin(&self.model.signals())?;
        }
        if let Some(mut previous) = self.trace.replace(session) {
            previous.close()?;
        }
        Ok(())
    }

    /// Flushes and closes the attached trace, if any. Closing again is a no-op.
    ///
    /// # Errors
    ///
    /// [`TraceError::Io`] if the final flush fails.
    pub fn close_trace(&mut self) -> Result<(), TraceError> {
        match self.trace.as_mut() {
            Some(trace) => trace.close(),
            None => Ok(()),
        }
    }

    /// Detaches the trace session and returns it.
    pub const fn detach_trace(&mut self) -> Option<TraceSession<W>> {
        self.trace.take()
    }

    /// Runs ticks until `tick_limit` is reached or the model requests finish.
    ///
    /// An unbounded run also stops with [`StopReason::LimitReached`] when the tick
    /// counter cannot advance any further.
    ///
    /// # Arguments
    ///
    /// * `tick_limit` - Absolute tick to stop at, or `None` to run until the model finishes.
    ///
    /// # Returns
    ///
    /// The tick the clock stopped at and why.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::TickLimitBehindClock`] if `tick_limit` lies behind the clock.
    /// - [`SimError::ModelFault`] if evaluation faults; the trace is closed and the
    ///   faulted tick is neither traced nor counted. Every later run reports the same fault.
    /// - [`SimError::Trace`] if the trace sink fails; the trace is closed.
    pub fn run(&mut self, tick_limit: Option<u64>) -> Result<RunResult, SimError> {
        let start = self.clock.tick();
        if let Some((tick, source)) = &self.fault {
            return Err(SimError::ModelFault {
                tick: *tick,
                source: source.clone(),
            });
        }
        if let Some(limit) = tick_limit.filter(|&limit| limit < start) {
            return Err(ConfigError::TickLimitBehindClock {
                limit,
                current: start,
            }
            .into());
        }

        self.stats.runs += 1;
        tracing::info!(start, limit = ?tick_limit, reset = ?self.reset, "run started");

        let started = Instant::now();
        let outcome = self.run_ticks(tick_limit);
        self.stats.add_busy(started.elapsed());

        let reason = outcome?;
        let result = RunResult {
            stopped_at: self.clock.tick(),
            reason,
            ticks_executed: self.clock.tick() - start,
        };
        tracing::info!(
            stopped_at = result.stopped_at,
            ticks = result.ticks_executed,
            reason = ?result.reason,
            "run stopped"
        );
        Ok(result)
    }

    fn run_ticks(&mut self, tick_limit: Option<u64>) -> Result<StopReason, SimError> {
        loop {
            if self.model.finished() {
                return Ok(StopReason::ModelRequestedFinish);
            }
            let tick = self.clock.tick();
            if tick == u64::MAX || tick_limit.is_some_and(|limit| tick >= limit) {
                return Ok(StopReason::LimitReached);
            }
            self.step(tick)?;
        }
    }

    fn step(&mut self, tick: u64) -> Result<(), SimError> {
        if let Some(stimulus) = self.stimulus.as_mut() {
            stimulus(tick, &mut self.model);
        }

        let level = self.clock.toggle();
        self.model.set_clock(level);
        let reset = self.reset.is_active(tick);
        self.model.set_reset(reset);

        if let Err(source) = self.model.eval() {
            tracing::error!(tick, error = %source, "model fault, aborting run");
            self.fault = Some((tick, source.clone()));
            self.release_trace();
            return Err(SimError::ModelFault { tick, source });
        }

        self.model.sample(&mut self.snapshot);
        if let Some(trace) = self.trace.as_mut() {
            let before = trace.records();
            let appended = trace.append(tick, &self.snapshot);
            self.stats.trace_records += trace.records() - before;
            if let Err(e) = appended {
                tracing::error!(tick, error = %e, "trace write failed, aborting run");
                self.release_trace();
                return Err(e.into());
            }
        }

        tracing::trace!(tick, clock = level, reset, "tick");
        self.stats.ticks += 1;
        if reset {
            self.stats.reset_ticks += 1;
        }
        self.clock.advance();
        Ok(())
    }

    fn release_trace(&mut self) {
        if let Err(e) = self.close_trace() {
            tracing::warn!(error = %e, "failed to flush trace");
        }
    }

    /// Saves the model and clock to `destination` through `manager`.
    ///
    /// # Errors
    ///
    /// Any [`CheckpointError`](crate::common::CheckpointError), wrapped in [`SimError::Checkpoint`].
    pub fn save_checkpoint<S: SnapshotStore>(
        &mut self,
        manager: &mut CheckpointManager<S>,
        destination: &str,
    ) -> Result<(), SimError> {
        manager.save(&self.model, &self.clock, destination)?;
        self.stats.checkpoints_saved += 1;
        Ok(())
    }

    /// Replaces the model state and clock with the checkpoint at `source`.
    ///
    /// Ticks after the restore continue numbering from the checkpoint's tick. On error
    /// the model, clock, and trace are untouched.
    ///
    /// An attached trace that already holds a record at or after the restored tick is
    /// closed, since the ticks that follow could not be recorded in order. Attach a new
    /// session to keep tracing.
    ///
    /// # Errors
    ///
    /// Any [`CheckpointError`](crate::common::CheckpointError), wrapped in [`SimError::Checkpoint`].
    pub fn restore_checkpoint<S: SnapshotStore>(
        &mut self,
        manager: &mut CheckpointManager<S>,
        source: &str,
    ) -> Result<(), SimError> {
        manager.restore(&mut self.model, &mut self.clock, source)?;
        self.fault = None;
        self.stats.checkpoints_restored += 1;

        let next = self.clock.tick();
        let rewound = self
            .trace
            .as_ref()
            .filter(|trace| trace.is_open())
            .and_then(TraceSession::last_tick)
            .filter(|&last| next <= last);
        if let Some(last) = rewound {
            tracing::warn!(
                source,
                tick = next,
                last_recorded = last,
                "restore rewinds behind the trace, closing it"
            );
            self.release_trace();
        }
        Ok(())
    }

    /// Borrows the model.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// Mutably borrows the model, e.g. to drive inputs between runs.
    pub const fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Current clock.
    pub const fn clock(&self) -> SimulationClock {
        self.clock
    }

    /// Reset window in use.
    pub const fn reset_window(&self) -> ResetWindow {
        self.reset
    }

    /// Attached trace session, if any.
    pub const fn trace(&self) -> Option<&TraceSession<W>> {
        self.trace.as_ref()
    }

    /// Statistics accumulated so far.
    pub const fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Closes the trace and returns the model and statistics.
    pub fn finish(mut self) -> (M, RunStats) {
        self.release_trace();
        (self.model, self.stats)
    }
}

impl<M: Model, W: Write> fmt::Debug for Driver<M, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("clock", &self.clock)
            .field("reset", &self.reset)
            .field("trace", &self.trace.as_ref().map(TraceSession::state))
            .field("stimulus", &self.stimulus.is_some())
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}
