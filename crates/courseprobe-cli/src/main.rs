//! courseprobe: drive an e-learning assignment and check its progress
//!
//! ## Usage
//!
//! ```bash
//! courseprobe run -d conf --report target/report.json   # Run the flow
//! courseprobe run --dry-run                             # Run against the mock site
//! courseprobe config -d conf                            # Show resolved config
//! courseprobe checkpoints --format json                 # List checkpoints
//! ```

use clap::Parser;
use courseprobe::flow::CHECKPOINTS;
use courseprobe::mock::AppOptions;
use courseprobe::RunConfig;
use courseprobe_cli::{
    checkpoint_table, config_json, config_text, CheckpointsArgs, Cli, CliConfig, CliResult,
    ColorChoice, Commands, ConfigArgs, FlowRunner, OutputFormat, Reporter, RunArgs, RunPlan,
    Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    match cli.command {
        Commands::Run(args) => run_flow(&config, &args),
        Commands::Config(args) => show_config(&args),
        Commands::Checkpoints(args) => show_checkpoints(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// `RUST_LOG` wins over the `-v`/`-q` flags
fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.filter_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .with_target(config.verbosity.is_debug())
        .try_init();
}

fn run_flow(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if args.dry_run {
        let options = AppOptions::new();
        let plan = RunPlan::dry_run(args, &options)?;
        FlowRunner::new(plan, &reporter).execute_mock(options)?;
    } else {
        let plan = RunPlan::from_args(args)?;
        FlowRunner::new(plan, &reporter).launch_and_execute()?;
    }
    Ok(())
}

fn show_config(args: &ConfigArgs) -> CliResult<()> {
    let resolved = RunConfig::from_dir(args.config_dir.clone())?;
    match OutputFormat::from(args.format) {
        OutputFormat::Text => print!("{}", config_text(&resolved)),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config_json(&resolved))?);
        }
    }
    Ok(())
}

fn show_checkpoints(args: &CheckpointsArgs) -> CliResult<()> {
    match OutputFormat::from(args.format) {
        OutputFormat::Text => print!("{}", checkpoint_table(&CHECKPOINTS)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&CHECKPOINTS)?),
    }
    Ok(())
}
