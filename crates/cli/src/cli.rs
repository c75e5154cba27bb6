//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Configuration file used when `--config` is omitted
pub const DEFAULT_CONFIG: &str = "bootstats.toml";

/// bootstats - repeated boot-time measurements of an embedded device
#[derive(Parser, Debug)]
#[command(
    name = "bootstats",
    author,
    version,
    about = "Boot-time statistics for embedded devices",
    long_about = "Power-cycles a device again and again, timestamps the events it emits \n\
                  (serial console, system log, power-state signals), recognizes \n\
                  configured trigger points and reports per-milestone statistics, \n\
                  optionally compared against a saved reference."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BOOTSTATS_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BOOTSTATS_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the measurements and print the statistics
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Describe a configuration file
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (TOML or JSON); defaults to ./bootstats.toml when present
    #[arg(short, long, env = "BOOTSTATS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of boot cycles to measure
    #[arg(short, long, env = "BOOTSTATS_ITERATIONS")]
    pub iterations: Option<u32>,

    /// Seconds to wait between power-off and the next power-on
    #[arg(long, env = "BOOTSTATS_COOLDOWN")]
    pub cooldown: Option<f64>,

    /// Shell command that powers the device on
    #[arg(long, env = "BOOTSTATS_POWER_ON")]
    pub power_on: Option<String>,

    /// Shell command that powers the device off
    #[arg(long, env = "BOOTSTATS_POWER_OFF")]
    pub power_off: Option<String>,

    /// The operator switches power by hand
    #[arg(long, env = "BOOTSTATS_MANUAL_POWER")]
    pub manual_power: bool,

    /// Reboot with the hardware reset sequence instead of a power-on
    #[arg(long, env = "BOOTSTATS_HARDWARE_RESET")]
    pub hardware_reset: bool,

    /// Shell command that issues the reset sequence
    #[arg(long, env = "BOOTSTATS_RESET_COMMAND")]
    pub reset_command: Option<String>,

    /// Serial console device ("-" reads standard input)
    #[arg(long, env = "BOOTSTATS_SERIAL_DEVICE")]
    pub serial_device: Option<String>,

    /// The serial adapter is powered by the device and disappears with it
    #[arg(long, env = "BOOTSTATS_RECONNECT_SERIAL")]
    pub reconnect_serial: bool,

    /// Add a literal trigger point: `<id>:<pattern>` (repeatable)
    #[arg(short, long = "trigger", value_name = "ID:PATTERN")]
    pub triggers: Vec<String>,

    /// Source matched by trigger points that name none
    #[arg(long, env = "BOOTSTATS_DEFAULT_SOURCE")]
    pub default_source: Option<String>,

    /// Reference file: written when absent, compared against otherwise
    #[arg(long, env = "BOOTSTATS_REF_FILE")]
    pub ref_file: Option<PathBuf>,

    /// Also print the values stored in the reference file
    #[arg(long, env = "BOOTSTATS_SHOW_REFERENCE")]
    pub show_reference: bool,

    /// Print every received line
    #[arg(long, env = "BOOTSTATS_SHOW_CONSOLE")]
    pub show_console: bool,

    /// Print every received line with the delta since the previous one
    #[arg(long, env = "BOOTSTATS_SHOW_CONSOLE_DIFF")]
    pub show_console_diff: bool,

    /// Write the raw serial output to this file
    #[arg(long, env = "BOOTSTATS_SERIAL_LOG_FILE")]
    pub serial_log_file: Option<PathBuf>,

    /// Ingestion queue capacity (0 = unbounded)
    #[arg(long, default_value = "0", env = "BOOTSTATS_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "BOOTSTATS_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate the effective configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Configuration file to validate
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every trigger point
    #[arg(long)]
    pub triggers: bool,

    /// List every interval
    #[arg(long)]
    pub intervals: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
