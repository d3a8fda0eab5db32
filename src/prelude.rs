//! Everything needed to run a matrix from code.

pub use txmatrix_core::{
    BeginStrategy, DeleteMethod, InsertMethod, ScenarioOutcome, ScenarioPoint, ScenarioResult,
    SessionMode, Verdict,
};
pub use txmatrix_harness::{
    lifecycle_for, BackendKind, BackendLifecycle, HarnessConfig, InProcessExecutor,
    LocalEmulatorLifecycle, MatrixReport, MatrixSpec, Orchestrator, ScenarioExecutor,
    SpannerEmulatorLifecycle, SubprocessExecutor, Variant,
};
