//! Boot status query
//!
//! Reads the published records and condenses them into one of four states
//! for health checks and the `status` subcommand.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use strum::Display;

use crate::dispatch::StatusPaths;
use crate::error::Result;
use crate::record::{ResultRecord, StatusRecord};
use crate::stage::Stage;
use crate::store::{ResultStore, StatusStore};

/// Overall state of the current boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BootState {
    /// No stage has recorded anything
    #[strum(serialize = "not run")]
    #[serde(rename = "not run")]
    NotRun,
    /// Stages recorded, the pass has not completed
    Running,
    /// Pass completed without errors
    Done,
    /// Some stage reported errors
    Error,
}

/// Errors of one stage, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageErrors {
    pub stage: Stage,
    pub errors: Vec<String>,
}

/// Condensed view of `status.json` and `result.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootSummary {
    pub state: BootState,
    pub datasource: Option<String>,
    /// Last stage to finish, by finish time
    pub last_stage: Option<Stage>,
    /// Boot stage expected next while the pass is running
    pub next_stage: Option<Stage>,
    pub errors: Vec<StageErrors>,
}

impl BootSummary {
    /// Read the link-directory records, falling back to the data directory
    /// when nothing has been published yet.
    pub fn read(paths: &StatusPaths) -> Result<Self> {
        let link = Self::read_dir(&paths.link_dir)?;
        if link.state != BootState::NotRun {
            return Ok(link);
        }
        Self::read_dir(&paths.data_dir)
    }

    pub fn read_dir(dir: &Path) -> Result<Self> {
        let status = StatusStore::in_dir(dir).load_existing()?;
        let result = ResultStore::in_dir(dir).load_existing()?;
        Ok(Self::from_records(status.as_ref(), result.as_ref()))
    }

    pub fn from_records(status: Option<&StatusRecord>, result: Option<&ResultRecord>) -> Self {
        let Some(status) = status else {
            return Self {
                state: BootState::NotRun,
                datasource: result.and_then(|r| r.v1.datasource.clone()),
                last_stage: None,
                next_stage: None,
                errors: Vec::new(),
            };
        };

        let errors: Vec<StageErrors> = status
            .v1
            .stages
            .iter()
            .filter(|(_, o)| !o.errors.is_empty())
            .map(|(stage, o)| StageErrors {
                stage: *stage,
                errors: o.errors.clone(),
            })
            .collect();

        let last_stage = status
            .v1
            .stages
            .iter()
            .filter_map(|(stage, o)| o.finish.map(|f| (f, *stage)))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, stage)| stage);

        let last_boot_stage = status
            .v1
            .stages
            .iter()
            .filter(|(stage, _)| stage.is_boot_stage())
            .filter_map(|(stage, o)| o.finish.map(|f| (f, *stage)))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, stage)| stage);

        let result_failed = result.is_some_and(|r| !r.succeeded());
        let state = if !errors.is_empty() || result_failed {
            BootState::Error
        } else if result.is_some() {
            BootState::Done
        } else if status.v1.stages.is_empty() {
            BootState::NotRun
        } else {
            BootState::Running
        };

        let next_stage = match state {
            BootState::Running => last_boot_stage.and_then(Stage::next),
            _ => None,
        };

        Self {
            state,
            datasource: status.v1.datasource.clone(),
            last_stage,
            next_stage,
            errors,
        }
    }

    /// Exit status for health checks: 1 on error, else 0
    pub const fn exit_code(&self) -> i32 {
        match self.state {
            BootState::Error => 1,
            _ => 0,
        }
    }

    /// Multi-line report including datasource and errors
    pub fn long_report(&self) -> String {
        let mut out = format!("status: {}\n", self.state);
        if let Some(stage) = self.last_stage {
            out.push_str(&format!("last stage: {} ({})\n", stage, stage.description()));
        }
        if let Some(stage) = self.next_stage {
            out.push_str(&format!("next stage: {} ({})\n", stage, stage.description()));
        }
        out.push_str(&format!(
            "datasource: {}\n",
            self.datasource.as_deref().unwrap_or("none")
        ));
        for entry in &self.errors {
            for err in &entry.errors {
                out.push_str(&format!("error [{}]: {}\n", entry.stage, err));
            }
        }
        out
    }
}

impl fmt::Display for BootSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status: {}", self.state)
    }
}
