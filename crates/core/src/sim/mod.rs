//! Simulation driver.
//!
//! This module owns the tick loop. It provides:
//! 1. **Driver:** Clock and reset sequencing around a [`Model`](crate::model::Model).
//! 2. **Outcome:** [`RunResult`] and [`StopReason`] describing why a run ended.

/// Tick loop and driver lifecycle.
pub mod driver;

pub use driver::{Driver, RunResult, StopReason};
