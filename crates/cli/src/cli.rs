//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Chunk Push - bounded, retrying chunk replication pipeline
#[derive(Parser, Debug)]
#[command(
    name = "chunk-push",
    author,
    version,
    about = "Content-addressed chunk push pipeline",
    long_about = "Splits an input file into content-addressed chunks and pushes every chunk \n\
                  to its closest peer on a simulated overlay network, with bounded \n\
                  concurrency and retries. Prints the manifest digest when done."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CHUNK_PUSH_VERBOSE")]
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
        env = "CHUNK_PUSH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push a file through the pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "CHUNK_PUSH_CONFIG")]
    pub config: PathBuf,

    /// File to split into chunks and push
    #[arg(short, long, env = "CHUNK_PUSH_INPUT")]
    pub input: PathBuf,

    /// Override push concurrency from configuration
    #[arg(long, env = "CHUNK_PUSH_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Pipeline deadline in seconds (0 = no deadline)
    #[arg(long, env = "CHUNK_PUSH_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Override the simulated network's failure rate
    #[arg(long, env = "CHUNK_PUSH_FAILURE_RATE")]
    pub failure_rate: Option<f64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CHUNK_PUSH_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and input, then exit without pushing
    #[arg(long)]
    pub dry_run: bool,

    /// Print run statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every peer overlay address
    #[arg(long)]
    pub peers: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
