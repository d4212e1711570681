use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;
use crate::config::LogFormat;

/// TabPilot - agent loop for in-browser automation
#[derive(Parser, Debug)]
#[command(name = "tabpilot", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (defaults to `logging.level` from the configuration)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Log line format (defaults to `logging.format`)
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}
