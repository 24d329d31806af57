//! Common types shared by the driver, the waveform recorder, and the checkpoint manager.
//!
//! This module provides:
//! 1. **Clock:** The driver-owned tick counter and half-cycle phase.
//! 2. **Reset:** The half-open reset window evaluated once per tick.
//! 3. **Error Handling:** The error taxonomy for configuration, model, trace, store, and checkpoint failures.

/// Simulation clock and reset window.
pub mod clock;

/// Error types for every component of the driver.
pub mod error;

pub use clock::{Phase, ResetWindow, SimulationClock};
pub use error::{CheckpointError, ConfigError, ModelFault, SimError, StoreError, TraceError};
