//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "cog", version, about = "Drone center-of-gravity balancer")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/cog_config.toml")]
    pub config: PathBuf,

    /// Optional calibration CSV (strict header: channel,raw,grams)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Emit JSON lines (logs on stderr, results and errors on stdout)
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up, then move the battery to one offset
    Goto {
        /// Target front/back offset in millimeters (-100..=100)
        #[arg(long, allow_hyphen_values = true)]
        offset: i32,
    },
    /// Set up once, then read one offset per line from stdin (q or EOF quits)
    Console,
    /// Set up, then print both weights and the differential
    Read {
        /// Samples averaged per channel (overrides sampling.sample_count)
        #[arg(long, value_name = "N")]
        samples: Option<usize>,
    },
    /// Measure one channel's reference unit against a known mass
    Calibrate {
        /// Load cell channel (1 or 2)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        channel: u8,
        /// Mass placed on the cell after taring, in grams
        #[arg(long, value_name = "GRAMS")]
        known_grams: f32,
        /// Time allowed to place the mass before sampling
        #[arg(long, value_name = "MS", default_value_t = 5_000)]
        settle_ms: u64,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
