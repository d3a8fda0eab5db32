//! Matrix-driven verification of transactional delete durability
//!
//! Flow of one matrix run:
//!
//! ```text
//! MatrixSpec::points ──► for each point:
//!     BackendLifecycle::reset      (stop, start, bootstrap schema)
//!     ScenarioExecutor::execute    (insert, delete, verify; classify)
//! ──► MatrixReport                 (table or JSON)
//! ```
//!
//! The backend is the Cloud Spanner emulator when `SPANNER_EMULATOR_HOST`
//! is set (or `[backend]` names an endpoint), otherwise the file-backed
//! local backend. See [`target`].

#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod matrix;
pub mod orchestrator;
pub mod report;
pub mod scenario;
pub mod target;

pub use config::{BackendKind, HarnessConfig};
pub use error::{HarnessError, Result, SetupError, StepError};
pub use executor::{
    classify_stdout, InProcessExecutor, ScenarioExecutor, SubprocessExecutor,
    MULTIPLEXED_SESSIONS_ENV,
};
pub use lifecycle::{
    lifecycle_for, BackendLifecycle, LocalEmulatorLifecycle, SpannerEmulatorLifecycle,
};
pub use matrix::{MatrixSpec, Variant};
pub use orchestrator::Orchestrator;
pub use report::{MatrixReport, Summary};
pub use scenario::{run_point, ScenarioRunner};
pub use target::{BackendTarget, Connection};
