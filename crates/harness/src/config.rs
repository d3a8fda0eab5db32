//! Harness configuration via `txmatrix.toml`
//!
//! Every field has a default, so a missing file or an empty one runs the
//! standard matrix against the Cloud Spanner emulator when
//! `SPANNER_EMULATOR_HOST` is set, and against a local backend under
//! `.txmatrix/backend` otherwise.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use txmatrix_core::SessionMode;
use txmatrix_emulator::client::{ClientConfig, RetryConfig};
use txmatrix_emulator::spanner_rest::DEFAULT_REST_PORT;
use txmatrix_emulator::{DatabasePath, InstancePath};

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "txmatrix.toml";

/// Which backend the scenarios run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// The emulator when `SPANNER_EMULATOR_HOST` is set or `endpoint` is
    /// configured, the local backend otherwise
    #[default]
    Auto,
    /// File-backed backend in `data_dir`
    Local,
    /// Cloud Spanner emulator through its REST gateway
    SpannerEmulator,
}

/// Backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend selection
    pub kind: BackendKind,
    /// Local backend data directory, wiped on every reset
    pub data_dir: PathBuf,
    /// Delay after start and between readiness checks, in milliseconds
    pub settle_ms: u64,
    /// Readiness checks before giving up
    pub ready_attempts: u32,
    /// Reproduce the multiplexed-session mutation loss (local backend only)
    pub multiplexed_mutation_loss: bool,
    /// Emulator REST base URL; derived from `SPANNER_EMULATOR_HOST` if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Emulator REST gateway port used with `SPANNER_EMULATOR_HOST`
    pub rest_port: u16,
    /// Emulator request and long-running operation timeout, in milliseconds
    pub request_timeout_ms: u64,
}

impl BackendConfig {
    /// Emulator request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay after start and between readiness checks
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Auto,
            data_dir: PathBuf::from(".txmatrix/backend"),
            settle_ms: 100,
            ready_attempts: 10,
            multiplexed_mutation_loss: false,
            endpoint: None,
            rest_port: DEFAULT_REST_PORT,
            request_timeout_ms: 10_000,
        }
    }
}

/// Names of the bootstrap resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Project id
    pub project: String,
    /// Instance id
    pub instance: String,
    /// Database id
    pub database: String,
    /// Table every scenario writes to
    pub table: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            project: "test-project".to_string(),
            instance: "test-instance".to_string(),
            database: "test-database".to_string(),
            table: "T".to_string(),
        }
    }
}

impl SchemaConfig {
    /// Instance resource name
    pub fn instance_path(&self) -> InstancePath {
        InstancePath::new(&self.project, &self.instance)
    }

    /// Database resource name
    pub fn database_path(&self) -> DatabasePath {
        self.instance_path().database(&self.database)
    }
}

/// Client library settings used by every scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Sessions opened at client creation
    pub min_sessions: usize,
    /// Pool upper bound
    pub max_sessions: usize,
    /// Retries of aborted managed transactions
    pub max_retries: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            min_sessions: 1,
            max_sessions: 10,
            max_retries: 3,
        }
    }
}

/// Harness configuration loaded from `txmatrix.toml`.
///
/// # Example
///
/// ```toml
/// [backend]
/// data_dir = ".txmatrix/backend"
///
/// [schema]
/// table = "T"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// `[backend]`
    pub backend: BackendConfig,
    /// `[schema]`
    pub schema: SchemaConfig,
    /// `[client]`
    pub client: ClientSettings,
}

impl HarnessConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# txmatrix configuration

[backend]
# "auto" uses the Cloud Spanner emulator when SPANNER_EMULATOR_HOST is set
# (or endpoint below is given) and the local backend otherwise.
# "local" and "spanner-emulator" force one of them.
kind = "auto"
# Data directory of the local backend. Removed and recreated before
# every scenario point.
data_dir = ".txmatrix/backend"
# Settling delay after start and between readiness checks (milliseconds)
settle_ms = 100
# Readiness checks before the run is aborted
ready_attempts = 10
# Make the local backend reproduce the lost-mutation defect on
# multiplexed sessions
multiplexed_mutation_loss = false
# Emulator REST gateway. Without endpoint, the host of
# SPANNER_EMULATOR_HOST is combined with rest_port.
# endpoint = "http://localhost:9020"
rest_port = 9020
# Timeout of every emulator request and long-running operation
request_timeout_ms = 10000

[schema]
project = "test-project"
instance = "test-instance"
database = "test-database"
table = "T"

[client]
min_sessions = 1
max_sessions = 10
# Retries of aborted managed read-write transactions
max_retries = 3
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: HarnessConfig = toml::from_str(&content).map_err(|e| {
            HarnessError::config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise `txmatrix.toml` if present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_FILE_NAME).exists() => {
                Self::from_file(Path::new(CONFIG_FILE_NAME))
            }
            None => Ok(Self::default()),
        }
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                HarnessError::config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        let schema = &self.schema;
        for (name, value) in [
            ("schema.project", &schema.project),
            ("schema.instance", &schema.instance),
            ("schema.database", &schema.database),
            ("schema.table", &schema.table),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(HarnessError::config(format!(
                    "{} must be a non-empty name without '/', got '{}'",
                    name, value
                )));
            }
        }
        if !schema
            .table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(HarnessError::config(format!(
                "schema.table must be a plain identifier, got '{}'",
                schema.table
            )));
        }
        if self.client.max_sessions == 0 || self.client.min_sessions > self.client.max_sessions {
            return Err(HarnessError::config(format!(
                "client.min_sessions ({}) must not exceed client.max_sessions ({}), which must be positive",
                self.client.min_sessions, self.client.max_sessions
            )));
        }
        if self.backend.ready_attempts == 0 {
            return Err(HarnessError::config("backend.ready_attempts must be at least 1"));
        }
        if self.backend.request_timeout_ms == 0 {
            return Err(HarnessError::config(
                "backend.request_timeout_ms must be at least 1",
            ));
        }
        Ok(())
    }

    /// Override the backend data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backend.data_dir = dir.into();
        self
    }

    /// Select the backend kind
    pub fn with_backend_kind(mut self, kind: BackendKind) -> Self {
        self.backend.kind = kind;
        self
    }

    /// Client construction options for a point's session mode
    pub fn client_config(&self, session: SessionMode) -> ClientConfig {
        ClientConfig {
            multiplexed_rw: session.multiplexed(),
            min_sessions: self.client.min_sessions,
            max_sessions: self.client.max_sessions,
            retry: RetryConfig::new().with_max_retries(self.client.max_retries),
        }
    }
}
