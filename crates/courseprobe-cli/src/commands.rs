//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// courseprobe: drive an e-learning assignment end to end and check its progress
#[derive(Parser, Debug)]
#[command(name = "courseprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the assignment flow in a browser
    Run(RunArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),

    /// List the progress checkpoints
    Checkpoints(CheckpointsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding config.properties and credentials.properties
    #[arg(short = 'd', long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Write the JSON flow report to this file
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Force headless mode regardless of configuration
    #[arg(long)]
    pub headless: bool,

    /// Budget for the login step in milliseconds
    #[arg(long, default_value = "15000")]
    pub login_timeout: u64,

    /// Budget for every other step in milliseconds
    #[arg(long, default_value = "20000")]
    pub step_timeout: u64,

    /// Poll interval in milliseconds
    #[arg(long, default_value = "500")]
    pub poll_interval: u64,

    /// Run against the built-in mock assignment site instead of a browser
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Directory holding config.properties and credentials.properties
    #[arg(short = 'd', long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the checkpoints command
#[derive(Parser, Debug)]
pub struct CheckpointsArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Format argument for listings
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}
