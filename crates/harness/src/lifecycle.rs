//! Backend reset
//!
//! Before every point the backend is brought back to an empty state, so no
//! row written by one point can be observed by the next:
//! - [`LocalEmulatorLifecycle`] removes and recreates the local data
//!   directory.
//! - [`SpannerEmulatorLifecycle`] deletes the test instance on a running
//!   Cloud Spanner emulator and creates it again.

use crate::bootstrap::bootstrap;
use crate::config::{BackendConfig, HarnessConfig};
use crate::error::{Result, SetupError};
use crate::target::BackendTarget;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};
use txmatrix_emulator::config::CONFIG_FILE_NAME as EMULATOR_CONFIG_FILE;
use txmatrix_emulator::store::is_data_file;
use txmatrix_emulator::{DatabasePath, Emulator, EmulatorConfig, SpannerRest, Status};

/// Control over the backend the scenarios run against
pub trait BackendLifecycle {
    /// Stop the backend and discard its data; absent backends are fine
    fn stop(&self) -> std::result::Result<(), SetupError>;

    /// Start a fresh backend and wait until it answers
    fn start(&self) -> std::result::Result<(), SetupError>;

    /// Create the schema on a started backend
    fn bootstrap(&self) -> std::result::Result<DatabasePath, SetupError>;

    /// Stop, start and bootstrap
    fn reset(&self) -> std::result::Result<DatabasePath, SetupError> {
        self.stop()?;
        self.start()?;
        self.bootstrap()
    }
}

/// Lifecycle for the backend `config` resolves to
pub fn lifecycle_for(config: &HarnessConfig) -> Result<Box<dyn BackendLifecycle>> {
    let target = BackendTarget::resolve(&config.backend)?;
    info!(%target, "backend selected");
    Ok(match target {
        BackendTarget::Local { .. } => Box::new(LocalEmulatorLifecycle::new(config.clone())),
        BackendTarget::SpannerEmulator { endpoint } => {
            Box::new(SpannerEmulatorLifecycle::new(config.clone(), endpoint))
        }
    })
}

/// Retry `check` until it succeeds or the attempts run out
fn wait_ready(
    backend: &BackendConfig,
    check: impl Fn() -> std::result::Result<(), Status>,
) -> std::result::Result<(), SetupError> {
    let mut last = None;
    for attempt in 1..=backend.ready_attempts {
        std::thread::sleep(backend.settle());
        match check() {
            Ok(()) => {
                debug!(attempt, "backend ready");
                return Ok(());
            }
            Err(status) => {
                debug!(attempt, error = %status, "backend not ready");
                last = Some(status);
            }
        }
    }
    Err(SetupError::NotReady {
        attempts: backend.ready_attempts,
        last: last.unwrap_or_else(|| Status::unavailable("no readiness check was made")),
    })
}

/// Backend living in a local data directory
pub struct LocalEmulatorLifecycle {
    config: HarnessConfig,
}

impl LocalEmulatorLifecycle {
    /// Lifecycle for `config.backend.data_dir`
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    fn data_dir(&self) -> &Path {
        &self.config.backend.data_dir
    }

    /// Fail unless every entry of the data directory is a backend file
    fn check_data_dir(&self) -> std::result::Result<bool, SetupError> {
        let dir = self.data_dir();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(SetupError::io(dir)(e)),
        };
        for entry in entries {
            let entry = entry.map_err(SetupError::io(dir))?;
            let name = entry.file_name();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !name.to_str().is_some_and(is_data_file) {
                return Err(SetupError::ForeignDataDir {
                    path: dir.to_path_buf(),
                    entry: name.to_string_lossy().into_owned(),
                });
            }
        }
        Ok(true)
    }
}

impl BackendLifecycle for LocalEmulatorLifecycle {
    fn stop(&self) -> std::result::Result<(), SetupError> {
        if !self.check_data_dir()? {
            return Ok(());
        }
        match std::fs::remove_dir_all(self.data_dir()) {
            Ok(()) => {
                debug!(dir = %self.data_dir().display(), "backend removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SetupError::io(self.data_dir())(e)),
        }
    }

    fn start(&self) -> std::result::Result<(), SetupError> {
        let dir = self.data_dir();
        std::fs::create_dir_all(dir).map_err(SetupError::io(dir))?;
        EmulatorConfig {
            multiplexed_mutation_loss: self.config.backend.multiplexed_mutation_loss,
        }
        .write_to_file(&dir.join(EMULATOR_CONFIG_FILE))
        .map_err(SetupError::backend("write backend config"))?;
        wait_ready(&self.config.backend, || {
            Emulator::open(dir).and_then(|emu| emu.ping())
        })?;
        info!(dir = %dir.display(), "backend started");
        Ok(())
    }

    fn bootstrap(&self) -> std::result::Result<DatabasePath, SetupError> {
        let emulator =
            Emulator::open(self.data_dir()).map_err(SetupError::backend("connect"))?;
        bootstrap(&emulator, &self.config.schema)
    }
}

/// Cloud Spanner emulator that is already running
///
/// The emulator process is not restarted. Deleting the test instance drops
/// its databases and rows, which leaves the emulator as empty as a fresh
/// start would.
pub struct SpannerEmulatorLifecycle {
    config: HarnessConfig,
    rest: SpannerRest,
}

impl SpannerEmulatorLifecycle {
    /// Lifecycle for the emulator REST gateway at `endpoint`
    pub fn new(config: HarnessConfig, endpoint: impl Into<String>) -> Self {
        let rest = SpannerRest::new(endpoint, config.backend.request_timeout());
        Self { config, rest }
    }
}

impl BackendLifecycle for SpannerEmulatorLifecycle {
    fn stop(&self) -> std::result::Result<(), SetupError> {
        let instance = self.config.schema.instance_path();
        match self.rest.delete_instance(&instance) {
            Ok(()) => {
                debug!(instance = %instance, "instance deleted");
                Ok(())
            }
            Err(status) if status.is_not_found() => Ok(()),
            Err(status) => Err(SetupError::backend("delete instance")(status)),
        }
    }

    fn start(&self) -> std::result::Result<(), SetupError> {
        let project = &self.config.schema.project;
        wait_ready(&self.config.backend, || self.rest.ping(project))?;
        info!(endpoint = self.rest.endpoint(), "emulator ready");
        Ok(())
    }

    fn bootstrap(&self) -> std::result::Result<DatabasePath, SetupError> {
        bootstrap(&self.rest, &self.config.schema)
    }
}
