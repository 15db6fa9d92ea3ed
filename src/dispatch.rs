//! Stage dispatcher
//!
//! Runs one stage invocation end to end:
//!
//! 1. resolve the invocation (configuration errors stop here, before any I/O)
//! 2. on the local pass, purge `result.json` left over from the previous boot
//! 3. run the handler and time it
//! 4. merge its report into `status.json` under the stage's own key
//! 5. persist the status (and the result once the boot pass completes)
//! 6. publish both records into the link directory
//!
//! Errors the handler *reports* are recorded and the dispatch still succeeds.
//! A handler that *fails* is a defect: the error propagates and nothing new
//! is written.

use std::path::{Path, PathBuf};

use crate::action::{InvocationFlags, StageAction, StageHandler};
use crate::error::{BootStageError, Result};
use crate::publish;
use crate::record::{ResultRecord, StageOutcome, StatusRecord, unix_now};
use crate::stage::Stage;
use crate::store::{ResultStore, StatusStore};

/// Where records are kept and where they are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPaths {
    /// Authoritative copy
    pub data_dir: PathBuf,
    /// Stable path read by status tools
    pub link_dir: PathBuf,
}

impl StatusPaths {
    pub fn new(data_dir: impl Into<PathBuf>, link_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            link_dir: link_dir.into(),
        }
    }

    pub fn status_path(&self) -> PathBuf {
        StatusStore::in_dir(&self.data_dir).path().to_path_buf()
    }

    pub fn status_link(&self) -> PathBuf {
        StatusStore::in_dir(&self.link_dir).path().to_path_buf()
    }
}

/// Result of a dispatch whose action ran.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

impl DispatchOutcome {
    /// Process exit status for a dispatch whose action ran.
    ///
    /// Always 0: reported errors live in `status.json`, not in the exit code.
    pub const fn exit_code(&self) -> i32 {
        0
    }

    pub fn has_errors(&self) -> bool {
        !self.outcome.errors.is_empty()
    }
}

/// Runs stage invocations against one pair of directories.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    paths: StatusPaths,
}

impl Dispatcher {
    pub fn new(paths: StatusPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &StatusPaths {
        &self.paths
    }

    /// Resolve `name` with `flags` and run it.
    ///
    /// # Errors
    ///
    /// - `Configuration` for an unknown name or invalid mode (nothing written)
    /// - `Action` if the handler itself fails (nothing new written)
    /// - `Io` / `Json` if records cannot be persisted or published
    pub fn run<H>(
        &self,
        name: &str,
        flags: &InvocationFlags,
        handler: &mut H,
    ) -> Result<DispatchOutcome>
    where
        H: StageHandler + ?Sized,
    {
        let action = StageAction::resolve(name, flags)?;
        self.run_action(name, &action, handler)
    }

    /// Run an already resolved action.
    pub fn run_action<H>(
        &self,
        name: &str,
        action: &StageAction,
        handler: &mut H,
    ) -> Result<DispatchOutcome>
    where
        H: StageHandler + ?Sized,
    {
        let stage = action.stage();
        let StatusPaths { data_dir, link_dir } = &self.paths;
        let status_store = StatusStore::in_dir(data_dir);

        let mut status = if stage.starts_pass() {
            publish::purge_result(data_dir, link_dir)?;
            tracing::debug!("local pass starts a fresh status record");
            StatusRecord::new()
        } else {
            load_status_or_fresh(&status_store)?
        };

        tracing::info!(%stage, name, "running stage");
        let start = unix_now();
        let report = handler.execute(name, action).map_err(|e| {
            tracing::error!(%stage, error = %format!("{e:#}"), "stage action failed");
            BootStageError::Action(e)
        })?;
        let finish = unix_now();

        let outcome = StageOutcome {
            datasource: report.datasource,
            errors: report.errors,
            start: Some(start),
            finish: Some(finish),
        };
        if outcome.errors.is_empty() {
            tracing::info!(%stage, elapsed = finish - start, "stage finished");
        } else {
            tracing::warn!(%stage, errors = outcome.errors.len(), "stage finished with errors");
        }

        status.record(stage, outcome.clone());
        status_store.save(&status)?;

        if stage.completes_pass() {
            let result = ResultRecord::from_status(&status);
            ResultStore::in_dir(data_dir).save(&result)?;
            tracing::info!(errors = result.v1.errors.len(), "boot pass complete, wrote result");
        }

        publish::publish(data_dir, link_dir)?;

        Ok(DispatchOutcome { stage, outcome })
    }
}

/// Dispatch one invocation against explicit directories.
pub fn run<H>(
    name: &str,
    flags: &InvocationFlags,
    handler: &mut H,
    data_dir: &Path,
    link_dir: &Path,
) -> Result<DispatchOutcome>
where
    H: StageHandler + ?Sized,
{
    Dispatcher::new(StatusPaths::new(data_dir, link_dir)).run(name, flags, handler)
}

/// A corrupt document is replaced; any other failure to read it propagates.
fn load_status_or_fresh(store: &StatusStore) -> Result<StatusRecord> {
    match store.load() {
        Err(e @ BootStageError::DocumentCorrupt { .. }) => {
            tracing::warn!(
                path = %store.path().display(),
                error = %e,
                "corrupt status record, starting fresh"
            );
            Ok(StatusRecord::new())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionReport;
    use std::fs;
    use tempfile::TempDir;

    fn flags(local: bool, mode: &str) -> InvocationFlags {
        InvocationFlags {
            local,
            mode: mode.to_string(),
            ..Default::default()
        }
    }

    fn ok_handler(_: &str, _: &StageAction) -> anyhow::Result<ActionReport> {
        Ok(ActionReport::default())
    }

    fn setup() -> (TempDir, Dispatcher) {
        let tmp = TempDir::new().unwrap();
        let paths = StatusPaths::new(tmp.path().join("data"), tmp.path().join("link"));
        (tmp, Dispatcher::new(paths))
    }

    #[test]
    fn test_outcome_is_timed() {
        let (_tmp, dispatcher) = setup();
        let mut handler = ok_handler;
        let out = dispatcher.run("init", &flags(false, ""), &mut handler).unwrap();

        assert_eq!(out.stage, Stage::Init);
        let (start, finish) = (out.outcome.start.unwrap(), out.outcome.finish.unwrap());
        assert!(finish >= start);
        assert_eq!(out.exit_code(), 0);
        assert!(!out.has_errors());
    }

    #[test]
    fn test_non_local_recovers_from_corrupt_status() {
        let (_tmp, dispatcher) = setup();
        fs::create_dir_all(&dispatcher.paths().data_dir).unwrap();
        fs::write(dispatcher.paths().status_path(), "old").unwrap();

        let mut handler = ok_handler;
        dispatcher.run("modules", &flags(false, "config"), &mut handler).unwrap();

        let status: StatusRecord = crate::store::load(&dispatcher.paths().status_link()).unwrap();
        assert!(status.outcome(Stage::Config).is_some());
    }

    #[test]
    fn test_unreadable_status_propagates() {
        let (_tmp, dispatcher) = setup();
        fs::create_dir_all(dispatcher.paths().status_path()).unwrap();

        let mut handler = ok_handler;
        let err = dispatcher.run("init", &flags(false, ""), &mut handler).unwrap_err();
        assert!(matches!(err, BootStageError::Io(_)), "{err:?}");
        assert!(!dispatcher.paths().status_link().exists());
    }

    #[test]
    fn test_foreign_status_keys_keep_earlier_stages() {
        let (_tmp, dispatcher) = setup();
        let mut handler = |_: &str, action: &StageAction| -> anyhow::Result<ActionReport> {
            Ok(match action.stage() {
                Stage::Local => ActionReport::default().with_datasource("NoCloud"),
                _ => ActionReport::default(),
            })
        };
        dispatcher.run("init", &flags(true, ""), &mut handler).unwrap();

        let path = dispatcher.paths().status_path();
        let mut doc: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        doc["v1"]["stage"] = serde_json::Value::Null;
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        dispatcher.run("init", &flags(false, ""), &mut handler).unwrap();

        let status: StatusRecord = crate::store::load(&dispatcher.paths().status_link()).unwrap();
        let local = status.outcome(Stage::Local).expect("local outcome survives");
        assert_eq!(local.datasource.as_deref(), Some("NoCloud"));
        assert!(status.outcome(Stage::Init).is_some());
        assert!(status.v1.extra.contains_key("stage"));
    }

    #[test]
    fn test_handler_defect_writes_nothing() {
        let (_tmp, dispatcher) = setup();
        let mut handler = |_: &str, _: &StageAction| -> anyhow::Result<ActionReport> {
            anyhow::bail!("index out of range")
        };
        let err = dispatcher.run("init", &flags(false, ""), &mut handler).unwrap_err();

        assert!(matches!(err, BootStageError::Action(_)));
        assert!(err.to_string().contains("index out of range"));
        assert!(!dispatcher.paths().status_path().exists());
        assert!(!dispatcher.paths().status_link().exists());
    }

    #[test]
    fn test_final_stage_writes_result() {
        let (_tmp, dispatcher) = setup();
        let mut handler = |_: &str, action: &StageAction| -> anyhow::Result<ActionReport> {
            Ok(match action.stage() {
                Stage::Local => ActionReport::default().with_datasource("NoCloud"),
                Stage::Config => ActionReport::default().with_error("cc_ntp failed"),
                _ => ActionReport::default(),
            })
        };
        dispatcher.run("init", &flags(true, ""), &mut handler).unwrap();
        dispatcher.run("init", &flags(false, ""), &mut handler).unwrap();
        dispatcher.run("modules", &flags(false, "config"), &mut handler).unwrap();
        assert!(!dispatcher.paths().link_dir.join("result.json").exists());

        dispatcher.run("modules", &flags(false, "final"), &mut handler).unwrap();

        let result_link = dispatcher.paths().link_dir.join("result.json");
        let result: ResultRecord = crate::store::load(&result_link).unwrap();
        assert_eq!(result.v1.datasource.as_deref(), Some("NoCloud"));
        assert_eq!(result.v1.errors, vec!["cc_ntp failed"]);
    }

    #[test]
    fn test_failed_local_pass_keeps_previous_status() {
        let (_tmp, dispatcher) = setup();
        let mut handler = ok_handler;
        for (local, mode, name) in [
            (true, "", "init"),
            (false, "", "init"),
            (false, "config", "modules"),
            (false, "final", "modules"),
        ] {
            dispatcher.run(name, &flags(local, mode), &mut handler).unwrap();
        }
        let previous = fs::read(dispatcher.paths().status_link()).unwrap();

        let mut failing = |_: &str, _: &StageAction| -> anyhow::Result<ActionReport> {
            anyhow::bail!("handler crashed")
        };
        let err = dispatcher.run("init", &flags(true, ""), &mut failing).unwrap_err();
        assert!(matches!(err, BootStageError::Action(_)));

        // results are purged before the handler runs; status is only
        // replaced once it returns
        let paths = dispatcher.paths();
        assert!(!paths.data_dir.join("result.json").exists());
        assert!(!paths.link_dir.join("result.json").exists());
        assert_eq!(fs::read(paths.status_link()).unwrap(), previous);
        let status: StatusRecord = crate::store::load(&paths.status_path()).unwrap();
        assert!(status.outcome(Stage::Final).is_some());
    }
}
