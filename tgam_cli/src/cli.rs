//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "tgam", version, about = "TGAM headset stream tool")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to
    /// logging.level, then info. RUST_LOG wins over both.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List serial ports that look usable
    Ports,
    /// Open a port and print combined records as JSON lines
    Stream {
        /// Port name; defaults to serial.port, then the first enumerated port
        #[arg(long, value_name = "NAME")]
        port: Option<String>,
        /// Override serial.baud_rate
        #[arg(long, value_name = "BAUD")]
        baud: Option<u32>,
        /// Stop after this many milliseconds (runs until Ctrl-C otherwise)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Also append combined records to this CSV file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
        /// Print every decoded record, not only combined ones
        #[arg(long, action = ArgAction::SetTrue)]
        raw: bool,
    },
    /// Decode a captured byte dump offline
    Decode {
        /// File holding raw bytes as read from the headset
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Validate the configuration and exit
    SelfCheck,
}
