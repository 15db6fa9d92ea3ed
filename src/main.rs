//! bootstage - Main entry point
//!
//! Resolves default paths, runs one stage through the dispatcher (or reports
//! status) and maps the outcome to a process exit code.

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use bootstage::cli::{Cli, Commands, OutputFormat, StatusArgs};
use bootstage::{BootSummary, Dispatcher, HookRunner, PathsConfig, StatusPaths};

/// Initialize logging to stderr; RUST_LOG overrides the default level
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.debug);
    debug!("CLI arguments parsed: {:?}", cli);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let config = PathsConfig::discover(cli.config.as_deref())?;
    let paths = config.status_paths(cli.data_dir.as_deref(), cli.link_dir.as_deref());
    debug!(
        data_dir = %paths.data_dir.display(),
        link_dir = %paths.link_dir.display(),
        "resolved record paths"
    );

    match &cli.command {
        Commands::Status(args) => show_status(&paths, args),
        Commands::Init { .. } | Commands::Modules { .. } | Commands::Single { .. } => {
            run_stage(cli, &config, paths)
        }
    }
}

fn run_stage(cli: &Cli, config: &PathsConfig, paths: StatusPaths) -> Result<u8> {
    let (name, flags) = cli.command.invocation();
    let mut hooks = HookRunner::new(&config.hooks_dir);
    let dispatcher = Dispatcher::new(paths);

    match dispatcher.run(name, &flags, &mut hooks) {
        Ok(outcome) => {
            info!(
                stage = %outcome.stage,
                errors = outcome.outcome.errors.len(),
                "recorded stage outcome"
            );
            // recorded errors do not fail the process
            Ok(u8::try_from(outcome.exit_code()).unwrap_or(1))
        }
        Err(e) if e.is_configuration() => Err(e.into()),
        Err(e) => Err(e).with_context(|| format!("stage '{}' could not be recorded", name)),
    }
}

fn show_status(paths: &StatusPaths, args: &StatusArgs) -> Result<u8> {
    let summary = BootSummary::read(paths).context("Failed to read boot status")?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text if args.long => print!("{}", summary.long_report()),
        OutputFormat::Text => println!("{}", summary),
    }
    Ok(u8::try_from(summary.exit_code()).unwrap_or(1))
}
