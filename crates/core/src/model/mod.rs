//! Model capability surface.
//!
//! The driver never looks inside a model. It only depends on:
//! 1. **Inputs:** Writable clock and reset lines (design-specific inputs are set by a stimulus).
//! 2. **Evaluation:** One combinational settle per tick, which may report a fatal fault.
//! 3. **Observation:** Signal declarations and a per-tick sample of their values.
//! 4. **State:** A full-state export/import pair covering every retained register and memory.
//!
//! Generated hardware bindings implement [`Model`] directly; [`counter::CounterTop`] is a small
//! reference design used by the CLI and the test suite.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::ModelFault;

/// Reference counter design.
pub mod counter;

pub use counter::{CounterConfig, CounterState, CounterTop};

/// Name and bit width of one observable signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDecl {
    /// Hierarchical signal name as shown in waveform viewers.
    pub name: String,
    /// Width in bits (1..=64).
    pub width: u32,
}

impl SignalDecl {
    /// Declares a signal of the given width.
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }

    /// Declares a single-bit signal.
    pub fn bit(name: impl Into<String>) -> Self {
        Self::new(name, 1)
    }
}

/// Values of every declared signal at one tick, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignalSnapshot {
    values: Vec<u64>,
}

impl SignalSnapshot {
    /// Creates a zeroed snapshot for `len` signals.
    pub fn with_len(len: usize) -> Self {
        Self {
            values: vec![0; len],
        }
    }

    /// Stores `value` for the signal at `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Stores a single-bit value for the signal at `index`.
    #[inline]
    pub fn set_bit(&mut self, index: usize, value: bool) {
        self.set(index, u64::from(value));
    }

    /// Returns the value of the signal at `index`, if declared.
    #[inline]
    pub fn get(&self, index: usize) -> Option<u64> {
        self.values.get(index).copied()
    }

    /// All values in declaration order.
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Number of signals in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the snapshot holds no signals.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A stateful simulation model the driver can clock, observe, and checkpoint.
pub trait Model {
    /// Complete retained state: registers, latches, and memories, not just outputs.
    type State: Serialize + DeserializeOwned;

    /// Signals recorded in the waveform, in the order [`Model::sample`] fills them.
    fn signals(&self) -> Vec<SignalDecl>;

    /// Drives the clock input.
    fn set_clock(&mut self, level: bool);

    /// Drives the reset input.
    fn set_reset(&mut self, active: bool);

    /// Settles the model for the current inputs.
    ///
    /// Not assumed idempotent: calling it twice without new inputs may change state.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelFault`] if the model detects an unrecoverable condition.
    /// The driver never evaluates a faulted model again.
    fn eval(&mut self) -> Result<(), ModelFault>;

    /// Returns `true` once the model has requested the end of simulation.
    fn finished(&self) -> bool {
        false
    }

    /// Writes the current value of every declared signal into `out`.
    fn sample(&self, out: &mut SignalSnapshot);

    /// Captures the complete retained state.
    ///
    /// # Errors
    ///
    /// Returns [`ModelFault::MidStep`] if inputs have changed since the last
    /// evaluation and the state is therefore not settled.
    fn export_state(&self) -> Result<Self::State, ModelFault>;

    /// Replaces the complete retained state.
    ///
    /// # Errors
    ///
    /// Returns [`ModelFault::IncompatibleState`] if `state` was captured from a model
    /// of a different shape. The model is left untouched in that case.
    fn import_state(&mut self, state: Self::State) -> Result<(), ModelFault>;
}
