//! bootstage library
//!
//! Dispatches boot-time configuration stages, records each stage's outcome
//! in `status.json` and publishes the records atomically for status readers.

pub mod action;
pub mod atomic;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod publish;
pub mod record;
pub mod stage;
pub mod store;
pub mod summary;

// Re-export main types for convenience
pub use action::{
    ActionReport, ConfigurationError, InitArgs, InvocationFlags, ModulesArgs, ModulesMode,
    SingleArgs, StageAction, StageHandler,
};
pub use config::PathsConfig;
pub use dispatch::{DispatchOutcome, Dispatcher, StatusPaths, run};
pub use error::BootStageError;
pub use hooks::HookRunner;
pub use publish::{PublishSummary, publish, purge_result};
pub use record::{ResultRecord, StageOutcome, StatusRecord};
pub use stage::Stage;
pub use store::{Record, RecordStore, ResultStore, StatusStore};
pub use summary::{BootState, BootSummary};
