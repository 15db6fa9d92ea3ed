//! Stage hook runner
//!
//! The binary's [`StageHandler`]: for each stage it runs the program
//! `<hooks_dir>/<stage>` if one is installed.
//!
//! # Hook protocol
//!
//! - Environment: `BOOTSTAGE_NAME`, `BOOTSTAGE_STAGE`, plus `BOOTSTAGE_MODE`,
//!   `BOOTSTAGE_MODULE` and `BOOTSTAGE_FREQUENCY` where they apply
//! - `datasource: <id>` on stdout sets the datasource
//! - `error: <message>` on stdout records an error
//! - A non-zero exit status records an error naming the hook
//!
//! Failures to run the hook are reported as stage errors, not returned as
//! `Err`: they are expected operational failures, not handler defects.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::action::{ActionReport, StageAction, StageHandler};

const DATASOURCE_PREFIX: &str = "datasource:";
const ERROR_PREFIX: &str = "error:";

/// Runs per-stage hook programs from one directory.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    pub fn new(hooks_dir: impl Into<PathBuf>) -> Self {
        Self {
            hooks_dir: hooks_dir.into(),
        }
    }

    /// Program run for `action`
    pub fn hook_path(&self, action: &StageAction) -> PathBuf {
        self.hooks_dir.join(action.stage().to_string())
    }

    fn run_hook(&self, path: &Path, action: &StageAction) -> ActionReport {
        let env_vars = action.env_vars();
        tracing::info!(hook = %path.display(), env = ?env_vars, "running stage hook");

        let mut cmd = Command::new(path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(env_vars);

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(hook = %path.display(), err = %e, "failed to run stage hook");
                return ActionReport::default()
                    .with_error(format!("failed to run hook {}: {}", path.display(), e));
            }
        };

        let mut report = parse_hook_output(&String::from_utf8_lossy(&output.stdout));
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(hook = %path.display(), stderr = %stderr.trim(), "hook stderr");
        }

        if !output.status.success() {
            let msg = match output.status.code() {
                Some(code) => format!("hook {} exited with status {}", path.display(), code),
                None => format!("hook {} was terminated by a signal", path.display()),
            };
            tracing::warn!("{}", msg);
            report.errors.push(msg);
        }
        report
    }
}

impl StageHandler for HookRunner {
    fn execute(&mut self, _name: &str, action: &StageAction) -> anyhow::Result<ActionReport> {
        let path = self.hook_path(action);
        if !path.is_file() {
            tracing::debug!(hook = %path.display(), "no hook installed for stage");
            return Ok(ActionReport::default());
        }
        Ok(self.run_hook(&path, action))
    }
}

/// Parse the stdout protocol. Unrecognized lines are ignored.
pub fn parse_hook_output(stdout: &str) -> ActionReport {
    let mut report = ActionReport::default();
    for line in stdout.lines().map(str::trim) {
        if let Some(ds) = line.strip_prefix(DATASOURCE_PREFIX) {
            let ds = ds.trim();
            if !ds.is_empty() {
                report.datasource = Some(ds.to_string());
            }
        } else if let Some(err) = line.strip_prefix(ERROR_PREFIX) {
            report.errors.push(err.trim().to_string());
        }
    }
    report
}
