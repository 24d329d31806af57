//! Run statistics collection and reporting.
//!
//! This module tracks what the driver did across one or more runs. It provides:
//! 1. **Ticks:** Total ticks executed and ticks spent with reset asserted.
//! 2. **Trace:** Records appended to the waveform.
//! 3. **Checkpoints:** Saves and restores performed.
//! 4. **Throughput:** Wall-clock time and ticks per second.

use std::time::{Duration, Instant};

/// Statistics accumulated by a [`Driver`](crate::sim::Driver).
#[derive(Debug, Clone)]
pub struct RunStats {
    start_time: Instant,
    busy: Duration,
    /// Ticks executed across all runs.
    pub ticks: u64,
    /// Ticks executed with reset asserted.
    pub reset_ticks: u64,
    /// Trace records appended.
    pub trace_records: u64,
    /// Runs started.
    pub runs: u64,
    /// Checkpoints saved.
    pub checkpoints_saved: u64,
    /// Checkpoints restored.
    pub checkpoints_restored: u64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            busy: Duration::ZERO,
            ticks: 0,
            reset_ticks: 0,
            trace_records: 0,
            runs: 0,
            checkpoints_saved: 0,
            checkpoints_restored: 0,
        }
    }
}

impl RunStats {
    /// Adds time spent inside the tick loop.
    pub fn add_busy(&mut self, elapsed: Duration) {
        self.busy += elapsed;
    }

    /// Time spent inside the tick loop.
    pub const fn busy(&self) -> Duration {
        self.busy
    }

    /// Time since the statistics were created.
    pub fn wall_time(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Ticks per second of tick-loop time, or zero before any tick ran.
    #[allow(clippy::cast_precision_loss)]
    pub fn ticks_per_second(&self) -> f64 {
        let secs = self.busy.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary to stdout.
    pub fn print(&self) {
        println!("==========================================================");
        println!("SIMULATION STATISTICS");
        println!("==========================================================");
        println!("runs                     {}", self.runs);
        println!("ticks                    {}", self.ticks);
        println!("reset ticks              {}", self.reset_ticks);
        println!("trace records            {}", self.trace_records);
        println!("checkpoints saved        {}", self.checkpoints_saved);
        println!("checkpoints restored     {}", self.checkpoints_restored);
        println!("loop time                {:.3} s", self.busy.as_secs_f64());
        println!("wall time                {:.3} s", self.wall_time().as_secs_f64());
        println!("ticks/s                  {:.0}", self.ticks_per_second());
        println!("==========================================================");
    }
}
