//! Simulation clock and reset window.
//!
//! The driver advances the clock one half-cycle per tick. It provides:
//! 1. **Phase:** A square wave that flips on every tick.
//! 2. **Tick Counter:** A monotonic 64-bit counter, restored from checkpoints.
//! 3. **Reset Window:** A half-open tick interval during which reset is held active.

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Half-cycle phase of the simulation clock.
///
/// `Rising` corresponds to the clock line being driven high for the current tick,
/// `Falling` to it being driven low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Clock line driven high.
    Rising,
    /// Clock line driven low. A fresh clock starts here so the first toggle rises.
    #[default]
    Falling,
}

impl Phase {
    /// Returns the opposite phase.
    #[inline]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Rising => Self::Falling,
            Self::Falling => Self::Rising,
        }
    }

    /// Returns the logic level of the clock line in this phase.
    #[inline]
    pub const fn level(self) -> bool {
        matches!(self, Self::Rising)
    }
}

/// Driver-owned simulation clock.
///
/// `tick` counts half-cycles executed so far; it is the timestamp of the next
/// tick to run. The phase is the level most recently driven onto the clock input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulationClock {
    tick: u64,
    phase: Phase,
}

impl SimulationClock {
    /// Creates a clock at tick 0 with the clock line low.
    pub const fn new() -> Self {
        Self {
            tick: 0,
            phase: Phase::Falling,
        }
    }

    /// Creates a clock at an arbitrary position, used when restoring a checkpoint.
    ///
    /// # Arguments
    ///
    /// * `tick` - Tick number of the next tick to execute.
    /// * `phase` - Phase most recently driven onto the clock input.
    pub const fn at(tick: u64, phase: Phase) -> Self {
        Self { tick, phase }
    }

    /// Returns the tick number of the next tick to execute.
    #[inline]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns the phase most recently driven onto the clock input.
    #[inline]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Flips the phase and returns the new clock level.
    #[inline]
    pub const fn toggle(&mut self) -> bool {
        self.phase = self.phase.toggled();
        self.phase.level()
    }

    /// Moves to the next tick.
    #[inline]
    pub const fn advance(&mut self) {
        self.tick += 1;
    }
}

/// Half-open interval of ticks `[assert_tick, deassert_tick)` during which reset is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetWindow {
    assert_tick: u64,
    deassert_tick: u64,
}

impl ResetWindow {
    /// Creates a reset window.
    ///
    /// # Arguments
    ///
    /// * `assert_tick` - First tick with reset active.
    /// * `deassert_tick` - First tick with reset inactive again.
    ///
    /// # Returns
    ///
    /// The window, or [`ConfigError::InvalidResetWindow`] if it would end before it starts.
    /// An empty window (`assert_tick == deassert_tick`) is valid and never asserts reset.
    pub fn new(assert_tick: u64, deassert_tick: u64) -> Result<Self, ConfigError> {
        if assert_tick > deassert_tick {
            return Err(ConfigError::InvalidResetWindow {
                assert_tick,
                deassert_tick,
            });
        }
        Ok(Self {
            assert_tick,
            deassert_tick,
        })
    }

    /// A window that never asserts reset.
    pub const fn never() -> Self {
        Self {
            assert_tick: 0,
            deassert_tick: 0,
        }
    }

    /// First tick with reset active.
    pub const fn assert_tick(&self) -> u64 {
        self.assert_tick
    }

    /// First tick after the window with reset inactive.
    pub const fn deassert_tick(&self) -> u64 {
        self.deassert_tick
    }

    /// Returns `true` if reset is active at `tick`.
    #[inline]
    pub const fn is_active(&self, tick: u64) -> bool {
        self.assert_tick <= tick && tick < self.deassert_tick
    }

    /// Number of ticks the window holds reset active.
    pub const fn len(&self) -> u64 {
        self.deassert_tick - self.assert_tick
    }

    /// Returns `true` if the window never asserts reset.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResetWindow {
    fn default() -> Self {
        Self {
            assert_tick: 2,
            deassert_tick: 10,
        }
    }
}
