//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Herald - in-process domain event notifier
#[derive(Parser, Debug)]
#[command(
    name = "herald",
    author,
    version,
    about = "In-process domain event notifier",
    long_about = "Inspect herald configuration files and exercise a notifier built from them.\n\n\
                  `demo` registers sample handlers, raises a batch of events and reports \n\
                  how each dispatch unit finished."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "HERALD_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "HERALD_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level used when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Build a notifier from configuration and raise sample events
    Demo(DemoArgs),
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "herald.toml", env = "HERALD_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "herald.toml", env = "HERALD_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `demo` command
#[derive(Parser, Debug, Clone)]
pub struct DemoArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "herald.toml", env = "HERALD_CONFIG")]
    pub config: PathBuf,

    /// Number of order events to raise
    #[arg(short, long, default_value = "20", env = "HERALD_DEMO_EVENTS")]
    pub events: u64,

    /// Every K-th order fails its inventory reservation (0 = never)
    #[arg(long, default_value = "5", env = "HERALD_DEMO_FAIL_EVERY")]
    pub fail_every: u64,

    /// Simulated work per handler invocation, in milliseconds
    #[arg(long, default_value = "0")]
    pub handler_delay_ms: u64,

    /// Make the error consumer reject what it receives
    #[arg(long)]
    pub failing_consumer: bool,

    /// How long to wait for background units to finish, in milliseconds
    #[arg(long, default_value = "5000")]
    pub settle_timeout_ms: u64,

    /// Metrics server port, overrides `logging.metrics_port` (0 = disabled)
    #[arg(long, env = "HERALD_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl DemoArgs {
    pub fn fail_every(&self) -> Option<u64> {
        (self.fail_every > 0).then_some(self.fail_every)
    }
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

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => contracts::LogFormat::Json,
            LogFormat::Pretty => contracts::LogFormat::Pretty,
            LogFormat::Compact => contracts::LogFormat::Compact,
        }
    }
}
