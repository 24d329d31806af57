//! Checkpoint manager.
//!
//! Captures or restores a model's complete state, together with the driver clock, as one
//! atomic unit. It provides:
//! 1. **Save:** Export, encode, stage in memory, then transfer into the destination store.
//! 2. **Restore:** Read, decode, validate, then overwrite model and clock in one step.
//! 3. **Backup:** Copy a committed checkpoint to another name with the store's transfer.
//!
//! One manager is created per simulation run and handed the store it should use;
//! nothing about checkpointing lives in process-wide state.

use serde::{Deserialize, Serialize};

use crate::common::{CheckpointError, Phase, SimulationClock, StoreError};
use crate::model::Model;
use crate::store::{MemoryStore, OpenMode, SnapshotStore, StoreHandle, transfer};

/// Format tag written into every payload.
pub const CHECKPOINT_FORMAT: &str = "simdrive-checkpoint";

/// Payload schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Payload<S> {
    format: String,
    version: u32,
    tick: u64,
    phase: Phase,
    model: S,
}

/// A materialized checkpoint: destination name plus encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Destination name the checkpoint is stored under.
    pub identifier: String,
    /// Encoded model state and clock.
    pub payload: Vec<u8>,
}

impl Checkpoint {
    /// Captures `model` and `clock` into a checkpoint named `identifier`.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::SerializationFailed`] if the model cannot export a settled
    /// state or the state cannot be encoded.
    pub fn capture<M: Model>(
        model: &M,
        clock: &SimulationClock,
        identifier: &str,
    ) -> Result<Self, CheckpointError> {
        let state = model
            .export_state()
            .map_err(|fault| CheckpointError::SerializationFailed {
                reason: fault.to_string(),
            })?;
        let payload = Payload {
            format: CHECKPOINT_FORMAT.to_string(),
            version: CHECKPOINT_VERSION,
            tick: clock.tick(),
            phase: clock.phase(),
            model: state,
        };
        let payload =
            serde_json::to_vec(&payload).map_err(|e| CheckpointError::SerializationFailed {
                reason: e.to_string(),
            })?;
        Ok(Self {
            identifier: identifier.to_string(),
            payload,
        })
    }

    /// Decodes the payload into a model state and the clock it was captured at.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::CorruptPayload`] if the bytes are not a checkpoint of this
    /// format and version, do not decode into `S`, or place the clock at `u64::MAX`.
    pub fn decode<S>(&self) -> Result<(S, SimulationClock), CheckpointError>
    where
        S: for<'de> Deserialize<'de>,
    {
        let corrupt = |reason: String| CheckpointError::CorruptPayload {
            name: self.identifier.clone(),
            reason,
        };
        let payload: Payload<S> =
            serde_json::from_slice(&self.payload).map_err(|e| corrupt(e.to_string()))?;
        if payload.format != CHECKPOINT_FORMAT {
            return Err(corrupt(format!("unknown format tag `{}`", payload.format)));
        }
        if payload.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {CHECKPOINT_VERSION})",
                payload.version
            )));
        }
        if payload.tick == u64::MAX {
            return Err(corrupt(format!("tick {} leaves no tick to run", payload.tick)));
        }
        Ok((payload.model, SimulationClock::at(payload.tick, payload.phase)))
    }
}

/// Saves and restores simulation state through a [`SnapshotStore`].
#[derive(Debug)]
pub struct CheckpointManager<S: SnapshotStore> {
    store: S,
    staging: MemoryStore,
}

impl<S: SnapshotStore> CheckpointManager<S> {
    /// Creates a manager writing to `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            staging: MemoryStore::new(),
        }
    }

    /// Borrows the backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Tears the manager down and returns the backing store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Saves `model` and `clock` to `destination`, replacing any previous checkpoint there.
    ///
    /// Nothing is visible at `destination` unless the complete payload was committed.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::SerializationFailed`] if the state cannot be captured, or
    /// [`CheckpointError::DestinationUnavailable`] if the destination cannot be opened,
    /// written, or committed.
    pub fn save<M: Model>(
        &mut self,
        model: &M,
        clock: &SimulationClock,
        destination: &str,
    ) -> Result<(), CheckpointError> {
        let checkpoint = Checkpoint::capture(model, clock, destination)?;
        tracing::info!(
            destination,
            tick = clock.tick(),
            bytes = checkpoint.payload.len(),
            "saving checkpoint"
        );

        let unavailable = |source: StoreError| CheckpointError::DestinationUnavailable {
            destination: destination.to_string(),
            source,
        };

        let mut staged = self.staging.open(destination, OpenMode::Write).map_err(unavailable)?;
        staged.write_all(&checkpoint.payload).map_err(unavailable)?;
        staged.close().map_err(unavailable)?;

        let result = self.commit_staged(destination).map_err(unavailable);
        let _ = self.staging.remove(destination);
        result
    }

    fn commit_staged(&mut self, destination: &str) -> Result<(), StoreError> {
        let mut src = self.staging.open(destination, OpenMode::Read)?;
        let mut dst = self.store.open(destination, OpenMode::Write)?;
        let _ = transfer(&mut src, &mut dst)?;
        dst.close()?;
        src.close()
    }

    /// Restores `model` and `clock` from `source`.
    ///
    /// The model and clock are only modified after the payload has been read, decoded,
    /// and accepted by the model.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::SourceNotFound`] if `source` cannot be opened, or
    /// [`CheckpointError::CorruptPayload`] if it cannot be read, decoded, or applied.
    pub fn restore<M: Model>(
        &mut self,
        model: &mut M,
        clock: &mut SimulationClock,
        source: &str,
    ) -> Result<(), CheckpointError> {
        let not_found = || CheckpointError::SourceNotFound {
            name: source.to_string(),
        };
        let mut handle = self.store.open(source, OpenMode::Read).map_err(|e| {
            tracing::debug!(source, error = %e, "checkpoint source unavailable");
            not_found()
        })?;
        let bytes = handle
            .read_all()
            .map_err(|e| CheckpointError::CorruptPayload {
                name: source.to_string(),
                reason: e.to_string(),
            })?;
        if let Err(e) = handle.close() {
            tracing::warn!(source, error = %e, "failed to close checkpoint source");
        }

        let checkpoint = Checkpoint {
            identifier: source.to_string(),
            payload: bytes,
        };
        let (state, restored_clock) = checkpoint.decode::<M::State>()?;
        model
            .import_state(state)
            .map_err(|fault| CheckpointError::CorruptPayload {
                name: source.to_string(),
                reason: fault.to_string(),
            })?;
        *clock = restored_clock;

        tracing::info!(source, tick = clock.tick(), "restored checkpoint");
        Ok(())
    }

    /// Copies the checkpoint at `source` to `destination` byte for byte.
    ///
    /// # Returns
    ///
    /// Number of bytes copied.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::SourceNotFound`] or [`CheckpointError::DestinationUnavailable`].
    pub fn backup(&mut self, source: &str, destination: &str) -> Result<usize, CheckpointError> {
        let unavailable = |source: StoreError| CheckpointError::DestinationUnavailable {
            destination: destination.to_string(),
            source,
        };
        let mut src = self
            .store
            .open(source, OpenMode::Read)
            .map_err(|_| CheckpointError::SourceNotFound {
                name: source.to_string(),
            })?;
        let mut dst = self
            .store
            .open(destination, OpenMode::Write)
            .map_err(unavailable)?;
        let copied = transfer(&mut src, &mut dst).map_err(unavailable)?;
        dst.close().map_err(unavailable)?;
        if let Err(e) = src.close() {
            tracing::warn!(source, error = %e, "failed to close backup source");
        }
        tracing::info!(source, destination, bytes = copied, "checkpoint backed up");
        Ok(copied)
    }
}
