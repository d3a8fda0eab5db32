//! Every point starts from an empty table.

use crate::common::*;
use std::sync::Arc;
use tempfile::TempDir;
use txmatrix::emulator::{Client, ClientConfig, Emulator, Key, Status};
use txmatrix::harness::run_point;
use txmatrix::SCENARIO_KEY;

fn read_scenario_row(config: &HarnessConfig) -> Result<(), Status> {
    let emulator = Arc::new(Emulator::open(&config.backend.data_dir)?);
    let client = Client::new(
        emulator,
        config.schema.database_path(),
        ClientConfig::default(),
    )?;
    let row = client
        .single()
        .read_row(&config.schema.table, Key(SCENARIO_KEY), &["PK"]);
    client.close()?;
    row.map(|_| ())
}

#[test]
fn reset_clears_a_surviving_row() {
    let dir = TempDir::new().unwrap();
    let config = harness_config(&dir, true);
    let lifecycle = LocalEmulatorLifecycle::new(config.clone());
    lifecycle.reset().unwrap();

    let lost = delete_begin(
        SessionMode::Enabled,
        DeleteMethod::StmtMutation,
        BeginStrategy::Explicit,
    );
    let outcome = run_point(&config, &lost, true);
    assert!(outcome.is_data_loss());
    assert!(read_scenario_row(&config).is_ok());

    lifecycle.reset().unwrap();
    let err = read_scenario_row(&config).unwrap_err();
    assert!(err.is_not_found(), "{}", err);
}

#[test]
fn point_after_a_bug_still_inserts_cleanly() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::DeleteBegin);

    // Enumeration order puts rw-mutation/default right after the BUG point.
    let position = report
        .results
        .iter()
        .position(|r| {
            r.point
                == delete_begin(
                    SessionMode::Enabled,
                    DeleteMethod::StmtMutation,
                    BeginStrategy::Explicit,
                )
        })
        .unwrap();
    let next = &report.results[position + 1];
    assert_eq!(next.point.delete, DeleteMethod::RwMutation);
    assert_eq!(next.verdict, Verdict::Pass, "{}", next.raw_label);
}

#[test]
fn results_follow_enumeration_order() {
    let dir = TempDir::new().unwrap();
    let config = harness_config(&dir, true);
    for variant in Variant::ALL {
        let report = run_matrix(&config, *variant);
        let expected: Vec<_> = MatrixSpec::for_variant(*variant).points().collect();
        let got: Vec<_> = report.results.iter().map(|r| r.point).collect();
        assert_eq!(got, expected, "variant {}", variant);
    }
}

#[test]
fn rerun_after_reset_classifies_the_same() {
    let dir = TempDir::new().unwrap();
    let config = harness_config(&dir, true);
    let first = run_matrix(&config, Variant::DeleteBegin);
    let second = run_matrix(&config, Variant::DeleteBegin);
    let verdicts = |report: &MatrixReport| -> Vec<_> {
        report
            .results
            .iter()
            .map(|r| (r.point, r.verdict, r.raw_label.clone()))
            .collect()
    };
    assert_eq!(verdicts(&first), verdicts(&second));
    assert_eq!(second.summary.bug, 2);
}
