//! Status and result documents.
//!
//! `status.json` keeps one [`StageOutcome`] per stage for the current boot.
//! `result.json` is the older, coarser summary written once a boot pass
//! completes. Both are versioned under a top-level `v1` key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::stage::Stage;

/// Seconds since the UNIX epoch, with sub-second precision.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0) // clock before epoch
}

/// Outcome of one stage invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    #[serde(default)]
    pub datasource: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default, alias = "finished")]
    pub finish: Option<f64>,
}

impl StageOutcome {
    /// Returns true once the stage ran to completion without errors
    pub fn succeeded(&self) -> bool {
        self.finish.is_some() && self.errors.is_empty()
    }
}

/// Body of `status.json`
///
/// Entries under `v1` that are not a stage outcome (keys written by other
/// tools or newer versions) are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStatusV1", into = "RawStatusV1")]
pub struct StatusV1 {
    /// Most recent datasource reported by any stage
    pub datasource: Option<String>,
    pub stages: BTreeMap<Stage, StageOutcome>,
    pub extra: BTreeMap<String, Value>,
}

/// `v1` as it appears on disk: a datasource plus arbitrary keyed entries
#[derive(Serialize, Deserialize)]
struct RawStatusV1 {
    #[serde(default)]
    datasource: Option<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, Value>,
}

impl From<RawStatusV1> for StatusV1 {
    fn from(raw: RawStatusV1) -> Self {
        let mut status = Self {
            datasource: raw.datasource,
            ..Self::default()
        };
        for (key, value) in raw.entries {
            let outcome = key
                .parse::<Stage>()
                .ok()
                .and_then(|stage| Some((stage, StageOutcome::deserialize(&value).ok()?)));
            match outcome {
                Some((stage, outcome)) => {
                    status.stages.insert(stage, outcome);
                }
                None => {
                    status.extra.insert(key, value);
                }
            }
        }
        status
    }
}

impl From<StatusV1> for RawStatusV1 {
    fn from(status: StatusV1) -> Self {
        let mut entries = status.extra;
        for (stage, outcome) in status.stages {
            entries.insert(
                stage.to_string(),
                serde_json::to_value(outcome).unwrap_or_default(),
            );
        }
        Self {
            datasource: status.datasource,
            entries,
        }
    }
}

/// Versioned per-stage status document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default)]
    pub v1: StatusV1,
}

impl StatusRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.v1.stages.get(&stage)
    }

    pub fn datasource(&self) -> Option<&str> {
        self.v1.datasource.as_deref()
    }

    /// Store `outcome` as the entry for `stage`.
    ///
    /// Only that stage's entry is replaced; other stages are left as they are.
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        if let Some(ds) = &outcome.datasource {
            self.v1.datasource = Some(ds.clone());
        }
        self.v1.extra.remove(&stage.to_string());
        self.v1.stages.insert(stage, outcome);
    }

    /// Errors of every boot stage, in boot order
    pub fn boot_errors(&self) -> Vec<String> {
        Stage::boot_order()
            .iter()
            .filter_map(|stage| self.v1.stages.get(stage))
            .flat_map(|outcome| outcome.errors.iter().cloned())
            .collect()
    }

    /// Returns true if any recorded stage reported errors
    pub fn has_errors(&self) -> bool {
        self.v1.stages.values().any(|o| !o.errors.is_empty())
    }
}

/// Body of `result.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultV1 {
    #[serde(default)]
    pub datasource: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Legacy pass/fail summary of a completed boot pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub v1: ResultV1,
}

impl ResultRecord {
    /// Derive the summary from the boot's status document
    pub fn from_status(status: &StatusRecord) -> Self {
        Self {
            v1: ResultV1 {
                datasource: status.v1.datasource.clone(),
                errors: status.boot_errors(),
            },
        }
    }

    pub fn succeeded(&self) -> bool {
        self.v1.errors.is_empty()
    }
}
