//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "knob", version, about = "Resistor-ladder knob tooling")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// EEPROM image file (overrides store.path from the config)
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Print events and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Canned input for the simulated ladder.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Gesture {
    /// One detent clockwise
    Forward,
    /// One detent counter-clockwise
    Backward,
    /// Press and release once
    Click,
    /// Two quick presses
    DoubleClick,
    /// Hold the button past the long-press window
    LongPress,
    /// Turn slowly through every position, used to calibrate
    Sweep,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Boot the pipeline and report events until the input ends or Ctrl-C
    Run {
        /// Gestures to play on the simulated ladder, in order (repeatable)
        #[arg(long = "gesture", value_enum, value_name = "GESTURE")]
        gestures: Vec<Gesture>,
        /// Sweep rounds when a `sweep` gesture is played
        #[arg(long, value_name = "N", default_value_t = 120)]
        rounds: u32,
        /// Stop after this many conversions
        #[arg(long, value_name = "N")]
        max_samples: Option<u64>,
        /// Process conversions inline instead of on the sampler thread
        #[arg(long, action = ArgAction::SetTrue)]
        direct: bool,
    },
    /// Force a calibration pass, persist the learned bands, then exit
    Calibrate {
        /// Sweep rounds fed to the simulated ladder
        #[arg(long, value_name = "N", default_value_t = 120)]
        rounds: u32,
        /// Process conversions inline instead of on the sampler thread
        #[arg(long, action = ArgAction::SetTrue)]
        direct: bool,
    },
    /// Print the band table stored in the EEPROM image
    Bands,
    /// Reset the EEPROM image to the erased state
    Erase,
    /// Write a band table from CSV (bin,low,high) into the EEPROM image
    Import {
        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },
    /// Save the stored band table as CSV (bin,low,high)
    Export {
        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },
    /// Quick health check (config, store image, sample source)
    SelfCheck,
}
