//! Shared helpers for the integration suites.

#![allow(dead_code)]

use tempfile::TempDir;
pub use txmatrix::prelude::*;

/// Local-backend config rooted in `dir` with no settling delay
pub fn harness_config(dir: &TempDir, mutation_loss: bool) -> HarnessConfig {
    let mut config = HarnessConfig::default()
        .with_data_dir(dir.path().join("backend"))
        .with_backend_kind(BackendKind::Local);
    config.backend.settle_ms = 0;
    config.backend.multiplexed_mutation_loss = mutation_loss;
    config
}

/// Run a whole variant in-process
pub fn run_matrix(config: &HarnessConfig, variant: Variant) -> MatrixReport {
    let lifecycle = LocalEmulatorLifecycle::new(config.clone());
    let executor = InProcessExecutor::new(config.clone());
    Orchestrator::new(&lifecycle, &executor)
        .run(&MatrixSpec::for_variant(variant))
        .expect("matrix run")
}

/// The result recorded for `point`
pub fn result_for(report: &MatrixReport, point: ScenarioPoint) -> &ScenarioResult {
    report
        .results
        .iter()
        .find(|r| r.point == point)
        .unwrap_or_else(|| panic!("no result for {}", point))
}

/// A point of the `delete-begin` variant
pub fn delete_begin(
    session: SessionMode,
    delete: DeleteMethod,
    begin: BeginStrategy,
) -> ScenarioPoint {
    ScenarioPoint {
        session,
        insert: InsertMethod::RwDml,
        delete,
        begin,
    }
}
