//! Configuration for a simulation run.
//!
//! This module defines the structures that parameterize the driver. It provides:
//! 1. **Defaults:** Tick limit, reset window, and trace sink matching the stock harness.
//! 2. **Structures:** Run, trace, checkpoint, and model sections.
//! 3. **Loading:** JSON files via `serde_json`, validated before any tick runs.
//!
//! Use `Config::default()` for the stock run, or load a JSON file and override
//! individual fields from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{ConfigError, ResetWindow};
use crate::model::CounterConfig;

/// Default configuration constants.
mod defaults {
    /// Ticks executed by a bounded run.
    pub const TICK_LIMIT: u64 = 100;

    /// First tick with reset asserted.
    pub const RESET_ASSERT: u64 = 2;

    /// First tick with reset deasserted again.
    ///
    /// Reset is therefore active for ticks `2..=9`.
    pub const RESET_DEASSERT: u64 = 10;

    /// Waveform sink written when tracing is enabled.
    pub const TRACE_PATH: &str = "simtop.vcd";

    /// Directory checkpoints are saved to and restored from.
    pub const STORE_DIR: &str = ".";

    #[allow(clippy::unnecessary_wraps)]
    pub const fn tick_limit() -> Option<u64> {
        Some(TICK_LIMIT)
    }

    pub const fn reset_assert() -> u64 {
        RESET_ASSERT
    }

    pub const fn reset_deassert() -> u64 {
        RESET_DEASSERT
    }

    pub const fn trace_enabled() -> bool {
        true
    }

    pub fn trace_path() -> std::path::PathBuf {
        TRACE_PATH.into()
    }

    pub fn store_dir() -> std::path::PathBuf {
        STORE_DIR.into()
    }
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use simdrive_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.run.tick_limit, Some(100));
/// assert!(config.trace.enabled);
/// ```
///
/// Missing sections and fields fall back to their defaults:
///
/// ```
/// use simdrive_core::config::Config;
///
/// let json = r#"{
///     "run": { "tick_limit": 40, "reset_deassert": 6 },
///     "trace": { "path": "wave.vcd" },
///     "model": { "finish_at": 20 }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.run.tick_limit, Some(40));
/// assert_eq!(config.run.reset_assert, 2);
/// assert_eq!(config.model.finish_at, Some(20));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tick loop bounds and reset sequencing
    pub run: RunConfig,
    /// Waveform output
    pub trace: TraceConfig,
    /// Checkpoint store and save/restore names
    pub checkpoint: CheckpointConfig,
    /// Reference model parameters
    pub model: CounterConfig,
}

/// Tick loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tick to stop at; `None` runs until the model finishes.
    #[serde(default = "defaults::tick_limit")]
    pub tick_limit: Option<u64>,

    /// First tick with reset asserted.
    #[serde(default = "defaults::reset_assert")]
    pub reset_assert: u64,

    /// First tick with reset deasserted again.
    #[serde(default = "defaults::reset_deassert")]
    pub reset_deassert: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_limit: defaults::tick_limit(),
            reset_assert: defaults::RESET_ASSERT,
            reset_deassert: defaults::RESET_DEASSERT,
        }
    }
}

/// Waveform settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Record a waveform.
    #[serde(default = "defaults::trace_enabled")]
    pub enabled: bool,

    /// Sink path, created or truncated at the start of the run.
    #[serde(default = "defaults::trace_path")]
    pub path: PathBuf,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::trace_enabled(),
            path: defaults::trace_path(),
        }
    }
}

/// Checkpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory backing the snapshot store.
    #[serde(default = "defaults::store_dir")]
    pub store_dir: PathBuf,

    /// Checkpoint to save after the run completes.
    #[serde(default)]
    pub save_to: Option<String>,

    /// Checkpoint to restore before the run starts.
    #[serde(default)]
    pub restore_from: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            store_dir: defaults::store_dir(),
            save_to: None,
            restore_from: None,
        }
    }
}

impl CheckpointConfig {
    /// Returns `true` if the run saves or restores a checkpoint.
    pub const fn is_enabled(&self) -> bool {
        self.save_to.is_some() || self.restore_from.is_some()
    }
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - JSON file to read.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] if the file cannot be read, [`ConfigError::Parse`] if it is
    /// not valid JSON for this structure, or any error from [`Config::validate`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds the reset window described by the run section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidResetWindow`] if deassertion precedes assertion.
    pub fn reset_window(&self) -> Result<ResetWindow, ConfigError> {
        ResetWindow::new(self.run.reset_assert, self.run.reset_deassert)
    }

    /// Checks every constraint that can be checked before the model exists.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidResetWindow`] for an inverted reset window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let _ = self.reset_window()?;
        Ok(())
    }
}
