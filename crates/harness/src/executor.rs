//! Scenario executors
//!
//! The orchestrator hands each point to a [`ScenarioExecutor`]:
//! - [`SubprocessExecutor`] launches `txmatrix scenario` as a child
//!   process with the session toggle in its environment and classifies the
//!   last line of its stdout.
//! - [`InProcessExecutor`] calls the runner directly and classifies the
//!   structured outcome.
//!
//! A runner that fails before its first scenario step reports a setup
//! failure. That is an environment problem, not a result, so both
//! executors return it as an error and the run stops.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result, SetupError};
use crate::scenario::run_point;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};
use txmatrix_core::{final_line, setup_failure, ScenarioPoint, ScenarioResult};

/// Environment toggle selecting multiplexed sessions for read-write
/// transactions in the scenario process
pub const MULTIPLEXED_SESSIONS_ENV: &str = "MULTIPLEXED_SESSIONS_FOR_RW";

/// Runs one point and classifies it
pub trait ScenarioExecutor {
    /// Execute `point` against the freshly reset backend
    fn execute(&self, point: &ScenarioPoint) -> std::result::Result<ScenarioResult, SetupError>;
}

/// Runs each point in a child `scenario` process
#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    program: PathBuf,
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
}

impl SubprocessExecutor {
    /// Launch `program scenario ...` for every point
    pub fn new(program: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            data_dir: data_dir.into(),
            config_path: None,
        }
    }

    /// Launch the currently running binary
    pub fn current_exe(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let program = std::env::current_exe().map_err(HarnessError::Runner)?;
        Ok(Self::new(program, data_dir))
    }

    /// Pass `--config` through to the child
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Command line for `point`
    pub fn command(&self, point: &ScenarioPoint) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("scenario").arg("--data-dir").arg(&self.data_dir);
        if let Some(path) = &self.config_path {
            cmd.arg("--config").arg(path);
        }
        cmd.args([
            "--insert",
            point.insert.as_str(),
            "--delete",
            point.delete.as_str(),
            "--begin",
            point.begin.as_str(),
            "--skip-setup",
        ]);
        match point.session.env_value() {
            Some(value) => cmd.env(MULTIPLEXED_SESSIONS_ENV, value),
            None => cmd.env_remove(MULTIPLEXED_SESSIONS_ENV),
        };
        cmd
    }
}

/// Classify the stdout of a scenario process
///
/// Only an exact `PASS` final line passes. A trailing blank line or
/// trailing whitespace makes the final line something else.
pub fn classify_stdout(
    point: &ScenarioPoint,
    stdout: &str,
) -> std::result::Result<ScenarioResult, SetupError> {
    let last = final_line(stdout);
    if let Some(message) = setup_failure(last) {
        return Err(SetupError::Runner {
            message: message.to_string(),
        });
    }
    Ok(ScenarioResult::from_line(*point, last))
}

impl ScenarioExecutor for SubprocessExecutor {
    fn execute(&self, point: &ScenarioPoint) -> std::result::Result<ScenarioResult, SetupError> {
        let output = self.command(point).output().map_err(|source| {
            warn!(program = %self.program.display(), error = %source, "failed to launch scenario runner");
            SetupError::Launch {
                program: self.program.clone(),
                source,
            }
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(target: "txmatrix::scenario", "{}", line);
        }
        debug!(%point, status = %output.status, last = final_line(&stdout), "scenario process finished");
        classify_stdout(point, &stdout)
    }
}

/// Runs each point inside the orchestrating process
#[derive(Debug, Clone)]
pub struct InProcessExecutor {
    config: HarnessConfig,
}

impl InProcessExecutor {
    /// Executor against the backend `config` resolves to
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

impl ScenarioExecutor for InProcessExecutor {
    fn execute(&self, point: &ScenarioPoint) -> std::result::Result<ScenarioResult, SetupError> {
        let outcome = run_point(&self.config, point, true);
        debug!(%point, ?outcome, "scenario finished");
        if let Some(message) = outcome.setup_failure() {
            return Err(SetupError::Runner {
                message: message.to_string(),
            });
        }
        Ok(ScenarioResult::from_outcome(*point, &outcome))
    }
}
