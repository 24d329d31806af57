//! Simulation driver CLI.
//!
//! This binary runs the reference counter design under the driver. It performs:
//! 1. **Run:** Clock the model for a bounded or unbounded number of ticks, tracing to VCD.
//! 2. **Checkpoint:** Optionally restore before the run and save after it.
//! 3. **Backup:** Copy a saved checkpoint to another name in the same store.
//!
//! Set `RUST_LOG` to adjust log verbosity (default `info`).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use simdrive_core::common::{SimError, TraceError};
use simdrive_core::config::Config;
use simdrive_core::model::CounterTop;
use simdrive_core::store::FileStore;
use simdrive_core::{CheckpointManager, Driver};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "simdrive",
    author,
    version,
    about = "Checkpointable, trace-recording simulation driver",
    long_about = "Clock a model through a reset sequence, record every tick to a VCD waveform, and save or restore its complete state.\n\nExamples:\n  simdrive run\n  simdrive run --ticks 400 --trace wave.vcd --save after_reset\n  simdrive run --restore after_reset --ticks 800 --no-trace\n  simdrive backup after_reset after_reset.bak"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the model, optionally restoring and saving checkpoints.
    Run(RunArgs),

    /// Copy a saved checkpoint to another name.
    Backup {
        /// Checkpoint to copy.
        source: String,

        /// Name to copy it to; replaced if it exists.
        destination: String,

        /// Directory holding the checkpoints.
        #[arg(long, default_value = ".")]
        store: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tick to stop at.
    #[arg(short, long, conflicts_with = "unbounded")]
    ticks: Option<u64>,

    /// Run until the model finishes.
    #[arg(long)]
    unbounded: bool,

    /// First tick with reset asserted.
    #[arg(long)]
    reset_assert: Option<u64>,

    /// First tick with reset deasserted again.
    #[arg(long)]
    reset_deassert: Option<u64>,

    /// Waveform output path.
    #[arg(long, conflicts_with = "no_trace")]
    trace: Option<PathBuf>,

    /// Disable waveform output.
    #[arg(long)]
    no_trace: bool,

    /// Save a checkpoint under this name after the run.
    #[arg(long)]
    save: Option<String>,

    /// Restore the checkpoint with this name before the run.
    #[arg(long)]
    restore: Option<String>,

    /// Directory holding the checkpoints.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Count value at which the model requests finish.
    #[arg(long)]
    finish_at: Option<u32>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Backup {
            source,
            destination,
            store,
        } => cmd_backup(&source, &destination, store),
    };

    if let Err(e) = result {
        eprintln!("\n[!] {e}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Merges the configuration file (or defaults) with command-line overrides.
///
/// # Arguments
///
/// * `args` - Parsed `run` flags.
///
/// # Returns
///
/// The validated configuration.
fn resolve_config(args: RunArgs) -> Result<Config, SimError> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if args.unbounded {
        config.run.tick_limit = None;
    } else if let Some(ticks) = args.ticks {
        config.run.tick_limit = Some(ticks);
    }
    if let Some(tick) = args.reset_assert {
        config.run.reset_assert = tick;
    }
    if let Some(tick) = args.reset_deassert {
        config.run.reset_deassert = tick;
    }
    if args.no_trace {
        config.trace.enabled = false;
    } else if let Some(path) = args.trace {
        config.trace.enabled = true;
        config.trace.path = path;
    }
    if let Some(dir) = args.store {
        config.checkpoint.store_dir = dir;
    }
    if args.save.is_some() {
        config.checkpoint.save_to = args.save;
    }
    if args.restore.is_some() {
        config.checkpoint.restore_from = args.restore;
    }
    if args.finish_at.is_some() {
        config.model.finish_at = args.finish_at;
    }

    config.validate()?;
    Ok(config)
}

/// Runs the counter design: restore, trace, tick loop, save, then print statistics.
fn cmd_run(args: RunArgs) -> Result<(), SimError> {
    let config = resolve_config(args)?;

    println!(
        "[*] Ticks: {}  Reset: {}..{}  Trace: {}",
        config
            .run
            .tick_limit
            .map_or_else(|| "unbounded".to_string(), |limit| limit.to_string()),
        config.run.reset_assert,
        config.run.reset_deassert,
        if config.trace.enabled {
            config.trace.path.display().to_string()
        } else {
            "off".to_string()
        }
    );

    // Design inputs are rewritten every tick, like a generated harness does.
    let model = CounterTop::new(config.model);
    let mut driver: Driver<CounterTop> =
        Driver::from_config(model, &config.run)?.with_stimulus(|_, model: &mut CounterTop| {
            model.set_enable(true);
            model.set_step(1);
        });

    let mut manager = config
        .checkpoint
        .is_enabled()
        .then(|| CheckpointManager::new(FileStore::new(&config.checkpoint.store_dir)));

    if let (Some(manager), Some(source)) = (manager.as_mut(), &config.checkpoint.restore_from) {
        driver.restore_checkpoint(manager, source)?;
        println!("[*] Restored {source} at tick {}", driver.clock().tick());
    }

    if config.trace.enabled {
        match driver.trace_to(&config.trace.path) {
            Ok(()) => {}
            Err(e @ TraceError::SinkUnavailable { .. }) => {
                tracing::warn!(error = %e, "continuing without a waveform");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let result = driver.run(config.run.tick_limit)?;
    println!(
        "[*] Stopped at tick {} ({:?}) after {} ticks",
        result.stopped_at, result.reason, result.ticks_executed
    );
    driver.close_trace()?;

    if let (Some(manager), Some(destination)) = (manager.as_mut(), &config.checkpoint.save_to) {
        driver.save_checkpoint(manager, destination)?;
        println!("[*] Saved {destination} at tick {}", driver.clock().tick());
    }

    let (model, stats) = driver.finish();
    println!("[*] count={} lfsr={:#06x}", model.count(), model.lfsr());
    stats.print();
    Ok(())
}

/// Copies the checkpoint `source` to `destination` inside `store`.
fn cmd_backup(source: &str, destination: &str, store: PathBuf) -> Result<(), SimError> {
    let mut manager = CheckpointManager::new(FileStore::new(store));
    let copied = manager.backup(source, destination)?;
    println!("[*] Backed up {source} -> {destination} ({copied} bytes)");
    Ok(())
}
