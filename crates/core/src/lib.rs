//! Checkpointable, trace-recording simulation driver.
//!
//! This crate drives a stateful, black-box simulation model one half-cycle at a time. It provides:
//! 1. **Driver:** Clock/reset sequencing, per-tick evaluation, and run termination.
//! 2. **Waveform:** VCD trace sessions with one timestamped record per tick.
//! 3. **Checkpoint:** Full-state save, restore, and backup through a snapshot store.
//! 4. **Store:** File-backed and in-memory snapshot stores with atomic replace semantics.
//! 5. **Model:** The capability surface a model must expose, plus a reference counter design.

/// Common types (clock, reset window, error taxonomy).
pub mod common;
/// Driver configuration (defaults, JSON loading, validation).
pub mod config;
/// Checkpoint manager: save, restore, and backup of simulation state.
pub mod checkpoint;
/// Model capability trait, signal declarations, and the reference design.
pub mod model;
/// Simulation driver and run loop.
pub mod sim;
/// Snapshot store trait and its file and in-memory implementations.
pub mod store;
/// Run statistics collection and reporting.
pub mod stats;
/// Waveform (VCD) trace sessions.
pub mod waveform;

/// Checkpoint manager; construct one per run with the store it should write to.
pub use crate::checkpoint::CheckpointManager;
/// Clock, phase, and reset window types owned by the driver.
pub use crate::common::{Phase, ResetWindow, SimulationClock};
/// Top-level error type returned by driver operations.
pub use crate::common::error::SimError;
/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// Model capability trait implemented by every drivable design.
pub use crate::model::Model;
/// Simulation driver and its run outcome types.
pub use crate::sim::{Driver, RunResult, StopReason};
/// Trace session type.
pub use crate::waveform::TraceSession;
