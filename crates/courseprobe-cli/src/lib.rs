//! courseprobe CLI library
//!
//! Command-line front end for the courseprobe assignment flow.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{CheckpointsArgs, Cli, ColorArg, Commands, ConfigArgs, FormatArg, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{checkpoint_table, config_json, config_text, step_line, OutputFormat, Reporter};
pub use runner::{FlowRunner, RunPlan, DRY_RUN_URL};
