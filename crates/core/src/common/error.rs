//! Error taxonomy for the simulation driver.
//!
//! This module defines one error type per component and the top-level [`SimError`]. It provides:
//! 1. **Configuration Errors:** Rejected before any tick runs.
//! 2. **Model Faults:** Fatal conditions reported by the simulated model.
//! 3. **Trace, Store, and Checkpoint Errors:** Failures of the persistence collaborators.
//!
//! No error is retried automatically; the caller decides how to proceed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::OpenMode;

/// Invalid driver configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The reset window ends before it starts.
    #[error("reset window deasserts at tick {deassert_tick} before it asserts at tick {assert_tick}")]
    InvalidResetWindow {
        /// First tick with reset active.
        assert_tick: u64,
        /// First tick with reset inactive again.
        deassert_tick: u64,
    },

    /// The requested tick limit lies behind the current clock, e.g. after a restore.
    #[error("tick limit {limit} is behind the clock (current tick {current})")]
    TickLimitBehindClock {
        /// Requested limit.
        limit: u64,
        /// Tick the clock is currently at.
        current: u64,
    },

    /// The configuration file could not be read.
    #[error("could not read configuration {}: {source}", path.display())]
    Load {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is not valid JSON for [`Config`](crate::config::Config).
    #[error("could not parse configuration {}: {source}", path.display())]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}

/// Fault reported by the simulated model.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelFault {
    /// The model detected an internal consistency violation during evaluation.
    #[error("internal consistency violation: {reason}")]
    Inconsistent {
        /// Model-provided description.
        reason: String,
    },

    /// The model is between evaluation phases and its state cannot be captured.
    #[error("model is mid-step")]
    MidStep,

    /// Imported state does not fit this model instance.
    #[error("state does not fit this model: {reason}")]
    IncompatibleState {
        /// Model-provided description.
        reason: String,
    },
}

/// Waveform trace failure.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace sink could not be created. Recoverable by running without tracing.
    #[error("cannot create trace sink {}: {source}", path.display())]
    SinkUnavailable {
        /// Requested sink path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A signal declaration cannot be represented in the trace.
    #[error("signal `{name}` has unsupported width {width}")]
    InvalidSignal {
        /// Signal name.
        name: String,
        /// Declared width in bits.
        width: u32,
    },

    /// Writing or flushing the sink failed.
    #[error("trace sink write failed: {0}")]
    Io(#[from] io::Error),
}

/// Snapshot store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot exists under the name.
    #[error("snapshot `{name}` not found")]
    NotFound {
        /// Snapshot name.
        name: String,
    },

    /// The snapshot could not be opened in the requested mode.
    #[error("snapshot `{name}` cannot be opened: {source}")]
    Unavailable {
        /// Snapshot name.
        name: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The name is blank, absolute, or contains a `..` component.
    #[error("invalid snapshot name `{name}`")]
    InvalidName {
        /// Rejected name.
        name: String,
    },

    /// The handle has already been closed.
    #[error("snapshot handle is closed")]
    Closed,

    /// The operation does not match the mode the handle was opened with.
    #[error("snapshot handle opened for {opened:?} cannot {requested:?}")]
    WrongMode {
        /// Mode the handle was opened with.
        opened: OpenMode,
        /// Mode the operation needs.
        requested: OpenMode,
    },

    /// Reading, writing, or committing failed.
    #[error("snapshot store I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Checkpoint save/restore failure.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The destination could not be opened or committed.
    #[error("checkpoint destination `{destination}` unavailable: {source}")]
    DestinationUnavailable {
        /// Destination name.
        destination: String,
        /// Store failure.
        source: StoreError,
    },

    /// The model state could not be captured consistently or encoded.
    #[error("checkpoint state could not be captured: {reason}")]
    SerializationFailed {
        /// Description of the failure.
        reason: String,
    },

    /// No checkpoint exists under the requested name.
    #[error("checkpoint `{name}` not found")]
    SourceNotFound {
        /// Source name.
        name: String,
    },

    /// The checkpoint exists but cannot be decoded or applied.
    #[error("checkpoint `{name}` is corrupt: {reason}")]
    CorruptPayload {
        /// Source name.
        name: String,
        /// Description of the failure.
        reason: String,
    },
}

/// Top-level error surfaced by driver operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration rejected before the run started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The model faulted; the run was aborted and the trace closed.
    #[error("model fault at tick {tick}: {source}")]
    ModelFault {
        /// Tick during which the fault was raised.
        tick: u64,
        /// Fault reported by the model.
        source: ModelFault,
    },

    /// Checkpoint save or restore failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Waveform trace failed.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Snapshot store failed outside a checkpoint operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}
