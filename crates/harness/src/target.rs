//! Backend selection
//!
//! A run targets either the Cloud Spanner emulator, reached through its
//! REST gateway, or the file-backed local backend. The orchestrating
//! process and every scenario runner resolve the target the same way, from
//! `[backend]` and `SPANNER_EMULATOR_HOST`.

use crate::config::{BackendConfig, BackendKind};
use crate::error::{HarnessError, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use txmatrix_emulator::spanner_rest::{rest_endpoint, EMULATOR_HOST_ENV};
use txmatrix_emulator::{AdminBackend, Backend, Emulator, SpannerRest, Status};

/// Where the scenarios run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    /// File-backed backend in a data directory
    Local {
        /// Data directory
        data_dir: PathBuf,
    },
    /// Cloud Spanner emulator
    SpannerEmulator {
        /// REST gateway base URL
        endpoint: String,
    },
}

impl BackendTarget {
    /// Resolve from `config` and the process environment
    pub fn resolve(config: &BackendConfig) -> Result<Self> {
        let host = std::env::var(EMULATOR_HOST_ENV).ok();
        Self::resolve_with(config, host.as_deref())
    }

    /// Resolve from `config` and an explicit `SPANNER_EMULATOR_HOST` value
    pub fn resolve_with(config: &BackendConfig, emulator_host: Option<&str>) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .or_else(|| emulator_host.and_then(|host| rest_endpoint(host, config.rest_port)));
        match (config.kind, endpoint) {
            (BackendKind::Local, _) | (BackendKind::Auto, None) => Ok(BackendTarget::Local {
                data_dir: config.data_dir.clone(),
            }),
            (_, Some(endpoint)) => Ok(BackendTarget::SpannerEmulator { endpoint }),
            (BackendKind::SpannerEmulator, None) => Err(HarnessError::config(format!(
                "backend.kind = \"spanner-emulator\" needs backend.endpoint or {}",
                EMULATOR_HOST_ENV
            ))),
        }
    }

    /// Attach to the target
    ///
    /// A local backend must already be started. The emulator is not
    /// contacted until the first call.
    pub fn connect(&self, config: &BackendConfig) -> std::result::Result<Connection, Status> {
        match self {
            BackendTarget::Local { data_dir } => {
                Ok(Connection::Local(Arc::new(Emulator::open(data_dir)?)))
            }
            BackendTarget::SpannerEmulator { endpoint } => Ok(Connection::SpannerEmulator(
                Arc::new(SpannerRest::new(endpoint.as_str(), config.request_timeout())),
            )),
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendTarget::Local { data_dir } => {
                write!(f, "local backend in {}", data_dir.display())
            }
            BackendTarget::SpannerEmulator { endpoint } => {
                write!(f, "Cloud Spanner emulator at {}", endpoint)
            }
        }
    }
}

/// An attached backend
pub enum Connection {
    /// File-backed backend
    Local(Arc<Emulator>),
    /// Cloud Spanner emulator
    SpannerEmulator(Arc<SpannerRest>),
}

impl Connection {
    /// Data-path RPCs, shared with the client library
    pub fn backend(&self) -> Arc<dyn Backend> {
        match self {
            Connection::Local(emulator) => emulator.clone() as Arc<dyn Backend>,
            Connection::SpannerEmulator(rest) => rest.clone() as Arc<dyn Backend>,
        }
    }

    /// Admin RPCs
    pub fn admin(&self) -> &dyn AdminBackend {
        match self {
            Connection::Local(emulator) => emulator.as_ref(),
            Connection::SpannerEmulator(rest) => rest.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use txmatrix_emulator::Code;

    fn backend(kind: BackendKind) -> BackendConfig {
        BackendConfig {
            kind,
            data_dir: PathBuf::from("/tmp/backend"),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_auto_follows_emulator_host() {
        let config = backend(BackendKind::Auto);
        assert_eq!(
            BackendTarget::resolve_with(&config, None).unwrap(),
            BackendTarget::Local {
                data_dir: PathBuf::from("/tmp/backend")
            }
        );
        assert_eq!(
            BackendTarget::resolve_with(&config, Some("localhost:9010")).unwrap(),
            BackendTarget::SpannerEmulator {
                endpoint: "http://localhost:9020".to_string()
            }
        );
    }

    #[test]
    fn test_configured_endpoint_wins() {
        let config = BackendConfig {
            endpoint: Some("http://emulator:19020".to_string()),
            ..backend(BackendKind::Auto)
        };
        assert_eq!(
            BackendTarget::resolve_with(&config, Some("localhost:9010")).unwrap(),
            BackendTarget::SpannerEmulator {
                endpoint: "http://emulator:19020".to_string()
            }
        );
    }

    #[test]
    fn test_local_kind_ignores_emulator_host() {
        let config = backend(BackendKind::Local);
        assert!(matches!(
            BackendTarget::resolve_with(&config, Some("localhost:9010")).unwrap(),
            BackendTarget::Local { .. }
        ));
    }

    #[test]
    fn test_emulator_kind_needs_an_address() {
        let config = backend(BackendKind::SpannerEmulator);
        assert!(matches!(
            BackendTarget::resolve_with(&config, None),
            Err(HarnessError::Config(_))
        ));
        let config = BackendConfig {
            rest_port: 9999,
            ..config
        };
        assert_eq!(
            BackendTarget::resolve_with(&config, Some("127.0.0.1:9010")).unwrap(),
            BackendTarget::SpannerEmulator {
                endpoint: "http://127.0.0.1:9999".to_string()
            }
        );
    }

    #[test]
    fn test_connect_local_requires_started_backend() {
        let dir = TempDir::new().unwrap();
        let target = BackendTarget::Local {
            data_dir: dir.path().join("missing"),
        };
        let err = target
            .connect(&BackendConfig::default())
            .err()
            .expect("backend is not started");
        assert_eq!(err.code, Code::Unavailable);
    }

    #[test]
    fn test_display() {
        let target = BackendTarget::SpannerEmulator {
            endpoint: "http://localhost:9020".to_string(),
        };
        assert_eq!(
            target.to_string(),
            "Cloud Spanner emulator at http://localhost:9020"
        );
    }
}
