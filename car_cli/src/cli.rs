//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "car", version, about = "Onboard controller for the distance-run vehicle")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/car_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the console protocol until the link closes
    Serve {
        /// Serial device; overrides serial.device
        #[arg(long, value_name = "DEVICE", conflicts_with = "stdio")]
        port: Option<PathBuf>,
        /// Baud rate; overrides serial.baud_rate
        #[arg(long, value_name = "BAUD")]
        baud: Option<u32>,
        /// Speak the protocol on stdin/stdout even if a device is configured
        #[arg(long, action = ArgAction::SetTrue)]
        stdio: bool,
        /// Simulated wheel: milliseconds between magnet edges while driven
        #[arg(long, value_name = "MS", default_value_t = 50)]
        sim_edge_ms: u64,
    },
    /// Validate the config and print the static status
    SelfCheck,
}
