//! Reference counter design.
//!
//! `CounterTop` is a small clocked design with the same shape as a generated model:
//! top-level input fields, registers updated on the rising clock edge, an edge-detect
//! latch, and a history memory. It exists so the driver, the trace, and the checkpoint
//! protocol can be exercised without a hardware toolchain.
//!
//! On every rising edge:
//! - with `reset` held, all registers return to their reset values;
//! - otherwise, with `enable` set, `count` advances by `step`, the LFSR shifts once,
//!   and the LFSR's low byte is written to `history[count % depth]`.

use serde::{Deserialize, Serialize};

use super::{Model, SignalDecl, SignalSnapshot};
use crate::common::ModelFault;

/// LFSR value after reset (x^16 + x^14 + x^13 + x^11 + 1).
pub const LFSR_SEED: u16 = 0xACE1;

/// Default number of history memory entries.
pub const DEFAULT_HISTORY_DEPTH: usize = 16;

/// Index of each traced signal in [`CounterTop::signals`].
mod sig {
    pub const CLOCK: usize = 0;
    pub const RESET: usize = 1;
    pub const ENABLE: usize = 2;
    pub const COUNT: usize = 3;
    pub const LFSR: usize = 4;
    pub const DONE: usize = 5;
}

/// Elaboration parameters for [`CounterTop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterConfig {
    /// Number of history memory entries; part of the model's shape.
    #[serde(default = "CounterConfig::default_history_depth")]
    pub history_depth: usize,

    /// Count value at which the design raises its finish flag.
    #[serde(default)]
    pub finish_at: Option<u32>,

    /// Count value the design treats as an internal consistency violation.
    #[serde(default)]
    pub fault_at: Option<u32>,
}

impl CounterConfig {
    fn default_history_depth() -> usize {
        DEFAULT_HISTORY_DEPTH
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            finish_at: None,
            fault_at: None,
        }
    }
}

/// Complete retained state of a [`CounterTop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Last driven clock input.
    pub clock: bool,
    /// Last driven reset input.
    pub reset: bool,
    /// Last driven enable input.
    pub enable: bool,
    /// Last driven step input.
    pub step: u8,
    /// Clock level seen by the previous evaluation (edge-detect latch).
    pub prev_clock: bool,
    /// Counter register.
    pub count: u32,
    /// LFSR register.
    pub lfsr: u16,
    /// Rising edges observed since construction.
    pub edges: u64,
    /// Finish flag register.
    pub done: bool,
    /// History memory.
    pub history: Vec<u8>,
}

/// Clocked counter with an LFSR and a history memory.
#[derive(Debug, Clone)]
pub struct CounterTop {
    /// Clock input.
    pub clock: bool,
    /// Synchronous reset input.
    pub reset: bool,
    /// Count enable input.
    pub enable: bool,
    /// Count increment input.
    pub step: u8,

    config: CounterConfig,
    prev_clock: bool,
    count: u32,
    lfsr: u16,
    edges: u64,
    done: bool,
    history: Vec<u8>,
    unsettled: bool,
}

impl CounterTop {
    /// Elaborates a counter with the given parameters. All registers start at reset values.
    pub fn new(config: CounterConfig) -> Self {
        Self {
            clock: false,
            reset: false,
            enable: true,
            step: 1,
            config,
            prev_clock: false,
            count: 0,
            lfsr: LFSR_SEED,
            edges: 0,
            done: false,
            history: vec![0; config.history_depth],
            unsettled: false,
        }
    }

    /// Drives the enable input.
    pub const fn set_enable(&mut self, enable: bool) {
        self.unsettled |= self.enable != enable;
        self.enable = enable;
    }

    /// Drives the step input.
    pub const fn set_step(&mut self, step: u8) {
        self.unsettled |= self.step != step;
        self.step = step;
    }

    /// Current counter value.
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Current LFSR value.
    pub const fn lfsr(&self) -> u16 {
        self.lfsr
    }

    /// Rising edges observed since construction.
    pub const fn edges(&self) -> u64 {
        self.edges
    }

    /// History memory contents.
    pub fn history(&self) -> &[u8] {
        &self.history
    }

    /// Elaboration parameters.
    pub const fn config(&self) -> &CounterConfig {
        &self.config
    }

    const fn next_lfsr(value: u16) -> u16 {
        let bit = (value ^ (value >> 2) ^ (value >> 3) ^ (value >> 5)) & 1;
        (value >> 1) | (bit << 15)
    }

    fn on_rising_edge(&mut self) -> Result<(), ModelFault> {
        self.edges += 1;

        if self.reset {
            self.count = 0;
            self.lfsr = LFSR_SEED;
            self.done = false;
            self.history.fill(0);
            return Ok(());
        }

        if !self.enable {
            return Ok(());
        }

        let next = self.count.wrapping_add(u32::from(self.step));
        if self.config.fault_at == Some(next) {
            return Err(ModelFault::Inconsistent {
                reason: format!("counter reached poisoned value {next}"),
            });
        }

        self.count = next;
        self.lfsr = Self::next_lfsr(self.lfsr);
        if !self.history.is_empty() {
            let slot = self.count as usize % self.history.len();
            self.history[slot] = self.lfsr.to_le_bytes()[0];
        }
        if let Some(limit) = self.config.finish_at {
            self.done |= self.count >= limit;
        }
        Ok(())
    }
}

impl Default for CounterTop {
    fn default() -> Self {
        Self::new(CounterConfig::default())
    }
}

impl Model for CounterTop {
    type State = CounterState;

    fn signals(&self) -> Vec<SignalDecl> {
        vec![
            SignalDecl::bit("clock"),
            SignalDecl::bit("reset"),
            SignalDecl::bit("enable"),
            SignalDecl::new("count", 32),
            SignalDecl::new("lfsr", 16),
            SignalDecl::bit("done"),
        ]
    }

    fn set_clock(&mut self, level: bool) {
        self.unsettled |= self.clock != level;
        self.clock = level;
    }

    fn set_reset(&mut self, active: bool) {
        self.unsettled |= self.reset != active;
        self.reset = active;
    }

    fn eval(&mut self) -> Result<(), ModelFault> {
        let rising = self.clock && !self.prev_clock;
        self.prev_clock = self.clock;
        self.unsettled = false;
        if rising {
            self.on_rising_edge()?;
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.done
    }

    fn sample(&self, out: &mut SignalSnapshot) {
        out.set_bit(sig::CLOCK, self.clock);
        out.set_bit(sig::RESET, self.reset);
        out.set_bit(sig::ENABLE, self.enable);
        out.set(sig::COUNT, u64::from(self.count));
        out.set(sig::LFSR, u64::from(self.lfsr));
        out.set_bit(sig::DONE, self.done);
    }

    fn export_state(&self) -> Result<CounterState, ModelFault> {
        if self.unsettled {
            return Err(ModelFault::MidStep);
        }
        Ok(CounterState {
            clock: self.clock,
            reset: self.reset,
            enable: self.enable,
            step: self.step,
            prev_clock: self.prev_clock,
            count: self.count,
            lfsr: self.lfsr,
            edges: self.edges,
            done: self.done,
            history: self.history.clone(),
        })
    }

    fn import_state(&mut self, state: CounterState) -> Result<(), ModelFault> {
        if state.history.len() != self.config.history_depth {
            return Err(ModelFault::IncompatibleState {
                reason: format!(
                    "history depth {} does not match elaborated depth {}",
                    state.history.len(),
                    self.config.history_depth
                ),
            });
        }
        self.clock = state.clock;
        self.reset = state.reset;
        self.enable = state.enable;
        self.step = state.step;
        self.prev_clock = state.prev_clock;
        self.count = state.count;
        self.lfsr = state.lfsr;
        self.edges = state.edges;
        self.done = state.done;
        self.history = state.history;
        self.unsettled = false;
        Ok(())
    }
}
