//! Typed stage actions.
//!
//! An invocation arrives as a name plus parsed flags. [`StageAction::resolve`]
//! turns that into one variant of a fixed enumeration, each carrying its own
//! typed arguments, or fails with a [`ConfigurationError`] before anything
//! touches the filesystem.
//!
//! The work itself is done by a [`StageHandler`], supplied by the caller
//! (datasource detection, module runners, or the hook runner in the binary).

use serde::Serialize;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::stage::Stage;

/// Invocation names the dispatcher knows how to run.
pub const KNOWN_NAMES: &[&str] = &["init", "modules", "single"];

/// Errors raised while resolving an invocation. None of these are ever
/// recorded into the status document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// Carries the composed mode, e.g. `modules-bogusmode`
    #[error("Invalid cloud init mode specified '{0}'")]
    InvalidMode(String),

    #[error("single stage requires a module name")]
    MissingModule,
}

/// Operating mode of the modules stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModulesMode {
    Config,
    Final,
}

/// Arguments of the `init` action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitArgs {
    /// Run the local (pre-network) pass
    pub local: bool,
}

/// Arguments of the `modules` action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulesArgs {
    pub mode: ModulesMode,
}

/// Arguments of the `single` action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleArgs {
    pub module: String,
    pub frequency: Option<String>,
}

/// Raw flags as produced by the argument parser.
#[derive(Debug, Clone, Default)]
pub struct InvocationFlags {
    pub local: bool,
    pub mode: String,
    pub module: Option<String>,
    pub frequency: Option<String>,
}

/// A resolved action for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    Init(InitArgs),
    Modules(ModulesArgs),
    Single(SingleArgs),
}

impl StageAction {
    /// Resolve an invocation name and its flags.
    ///
    /// # Errors
    ///
    /// - `UnknownName` if `name` is not in [`KNOWN_NAMES`]
    /// - `InvalidMode` if `modules` is given a mode other than config/final
    /// - `MissingModule` if `single` has no module name
    pub fn resolve(name: &str, flags: &InvocationFlags) -> Result<Self, ConfigurationError> {
        match name {
            "init" => Ok(Self::Init(InitArgs { local: flags.local })),
            "modules" => ModulesMode::from_str(&flags.mode)
                .map(|mode| Self::Modules(ModulesArgs { mode }))
                .map_err(|_| ConfigurationError::InvalidMode(format!("modules-{}", flags.mode))),
            "single" => match flags.module.as_deref().map(str::trim) {
                Some(module) if !module.is_empty() => Ok(Self::Single(SingleArgs {
                    module: module.to_string(),
                    frequency: flags.frequency.clone(),
                })),
                _ => Err(ConfigurationError::MissingModule),
            },
            other => Err(ConfigurationError::UnknownName(other.to_string())),
        }
    }

    /// Registry name of this action
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Modules(_) => "modules",
            Self::Single(_) => "single",
        }
    }

    /// Stage whose outcome this action records
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Init(InitArgs { local: true }) => Stage::Local,
            Self::Init(InitArgs { local: false }) => Stage::Init,
            Self::Modules(ModulesArgs { mode: ModulesMode::Config }) => Stage::Config,
            Self::Modules(ModulesArgs { mode: ModulesMode::Final }) => Stage::Final,
            Self::Single(_) => Stage::Single,
        }
    }

    /// Environment handed to external stage programs
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("BOOTSTAGE_NAME".to_string(), self.name().to_string()),
            ("BOOTSTAGE_STAGE".to_string(), self.stage().to_string()),
        ];
        match self {
            Self::Init(_) => {}
            Self::Modules(args) => env.push(("BOOTSTAGE_MODE".to_string(), args.mode.to_string())),
            Self::Single(args) => {
                env.push(("BOOTSTAGE_MODULE".to_string(), args.module.clone()));
                if let Some(freq) = &args.frequency {
                    env.push(("BOOTSTAGE_FREQUENCY".to_string(), freq.clone()));
                }
            }
        }
        env
    }
}

/// What a stage action reports back.
///
/// Recoverable failures belong in `errors`; an empty list means success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub datasource: Option<String>,
    pub errors: Vec<String>,
}

impl ActionReport {
    pub fn new(datasource: Option<String>, errors: Vec<String>) -> Self {
        Self { datasource, errors }
    }

    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }
}

/// Executes a resolved stage action.
///
/// Returning `Err` signals a defect in the handler. The dispatcher propagates
/// it and records nothing; expected failures go in [`ActionReport::errors`].
pub trait StageHandler {
    fn execute(&mut self, name: &str, action: &StageAction) -> anyhow::Result<ActionReport>;
}

impl<F> StageHandler for F
where
    F: FnMut(&str, &StageAction) -> anyhow::Result<ActionReport>,
{
    fn execute(&mut self, name: &str, action: &StageAction) -> anyhow::Result<ActionReport> {
        self(name, action)
    }
}
