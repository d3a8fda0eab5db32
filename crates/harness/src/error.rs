//! Error types for the harness
//!
//! Three classes are kept apart:
//! - [`SetupError`]: the environment is broken (backend missing, schema
//!   creation failed). Fatal to a matrix run.
//! - [`StepError`]: one transactional step of a scenario failed. Folded
//!   into that point's non-PASS result.
//! - [`HarnessError`]: a whole run could not complete.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use txmatrix_core::{ScenarioPoint, ScenarioResult, Step};
use txmatrix_emulator::Status;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Backend reset or bootstrap failure
#[derive(Debug, Error)]
pub enum SetupError {
    /// Filesystem operation on the backend data directory failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Backend never answered a readiness check
    #[error("backend not ready after {attempts} attempts: {last}")]
    NotReady {
        /// Checks made
        attempts: u32,
        /// Last check error
        last: Status,
    },

    /// A backend or admin call failed
    #[error("{action}: {status}")]
    Backend {
        /// What was being attempted
        action: &'static str,
        /// Backend status
        status: Status,
    },

    /// The data directory holds files the backend did not write
    #[error("refusing to remove {path}: it is not a backend data directory (found {entry})")]
    ForeignDataDir {
        /// Configured data directory
        path: PathBuf,
        /// First entry that is not a backend file
        entry: String,
    },

    /// The scenario runner failed before its first scenario step
    #[error("scenario runner setup failed: {message}")]
    Runner {
        /// Runner's error text
        message: String,
    },

    /// The scenario runner process could not be started
    #[error("could not launch scenario runner {program}: {source}")]
    Launch {
        /// Runner executable
        program: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl SetupError {
    /// Wrap a backend status with the action that produced it
    pub fn backend(action: &'static str) -> impl FnOnce(Status) -> SetupError {
        move |status| SetupError::Backend { action, status }
    }

    /// Wrap an I/O error with the path it concerned
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> SetupError {
        let path = path.into();
        move |source| SetupError::Io { path, source }
    }
}

/// A scenario step failed
#[derive(Debug, Clone, Error)]
#[error("{step}: {status}")]
pub struct StepError {
    /// Failing step
    pub step: Step,
    /// Underlying status
    pub status: Status,
}

impl StepError {
    /// Tag a status with its step
    pub fn at(step: Step) -> impl FnOnce(Status) -> StepError {
        move |status| StepError { step, status }
    }
}

/// Fatal harness error
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Backend reset failed before running `point`
    ///
    /// `completed` holds the results gathered before the failure.
    #[error("setup failed before point [{point}]: {source}")]
    Setup {
        /// Point that could not be started
        point: ScenarioPoint,
        /// Cause
        #[source]
        source: SetupError,
        /// Results of the points that ran
        completed: Vec<ScenarioResult>,
    },

    /// Backend reset failed outside a matrix run
    #[error("setup failed: {0}")]
    Environment(#[from] SetupError),

    /// Invalid configuration file or values
    #[error("configuration error: {0}")]
    Config(String),

    /// The scenario runner could not be located
    #[error("cannot locate scenario runner: {0}")]
    Runner(#[source] io::Error),
}

impl HarnessError {
    /// Configuration error from a message
    pub fn config(message: impl Into<String>) -> Self {
        HarnessError::Config(message.into())
    }
}
