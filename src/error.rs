//! Error handling module for bootstage
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Configuration errors from invocation resolution live in [`crate::action`]
//! and convert into [`BootStageError`] at the dispatcher boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::action::ConfigurationError;

/// Main error type for bootstage
#[derive(Error, Debug)]
pub enum BootStageError {
    /// IO errors (record files, directories, temp files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record file exists but cannot be parsed
    #[error("Corrupt document {}: {source}", .path.display())]
    DocumentCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invocation could not be resolved (unknown name, invalid mode)
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The stage handler itself failed (a defect, not a recorded error)
    #[error("Stage action failed: {0:#}")]
    Action(anyhow::Error),

    /// Path configuration errors (loading, validation)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for bootstage operations
pub type Result<T> = std::result::Result<T, BootStageError>;

impl BootStageError {
    /// Create a path configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a corrupt document error
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::DocumentCorrupt {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors raised before any file was touched
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
