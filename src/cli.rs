use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::action::InvocationFlags;

/// bootstage - run a boot stage and record its outcome
#[derive(Parser, Debug)]
#[command(name = "bootstage")]
#[command(about = "Runs boot-time configuration stages and tracks their status")]
#[command(version)]
pub struct Cli {
    /// Authoritative record directory (default: <cloud_dir>/data)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory where records are published for readers (default: run_dir)
    #[arg(long, global = true)]
    pub link_dir: Option<PathBuf>,

    /// Path configuration file (default: /etc/bootstage/paths.json if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the instance (network stage, or local stage with --local)
    Init {
        /// Run the pre-network local stage
        #[arg(short, long)]
        local: bool,
    },
    /// Run configuration modules
    Modules {
        /// Module mode to run (config, final)
        #[arg(short, long, default_value = "config")]
        mode: String,
    },
    /// Run a single module
    Single {
        /// Module name to run (e.g. cc_ntp)
        #[arg(short, long)]
        name: String,
        /// Frequency to run the module with
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Report the status of the current boot
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Include datasource, last stage and errors
    #[arg(short, long)]
    pub long: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Commands {
    /// Invocation name and flags handed to the dispatcher
    pub fn invocation(&self) -> (&'static str, InvocationFlags) {
        match self {
            Self::Init { local } => (
                "init",
                InvocationFlags {
                    local: *local,
                    ..Default::default()
                },
            ),
            Self::Modules { mode } => (
                "modules",
                InvocationFlags {
                    mode: mode.clone(),
                    ..Default::default()
                },
            ),
            Self::Single { name, frequency } => (
                "single",
                InvocationFlags {
                    module: Some(name.clone()),
                    frequency: frequency.clone(),
                    ..Default::default()
                },
            ),
            Self::Status(_) => ("status", InvocationFlags::default()),
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
