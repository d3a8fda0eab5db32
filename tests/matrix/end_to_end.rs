//! Expected classifications of the documented scenarios.

use crate::common::*;
use tempfile::TempDir;

#[test]
fn declarative_insert_and_declarative_delete_pass() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::InsertDelete);

    for session in SessionMode::ALL {
        let point = ScenarioPoint {
            session: *session,
            insert: InsertMethod::RwDml,
            delete: DeleteMethod::RwMutation,
            begin: BeginStrategy::Default,
        };
        assert_eq!(result_for(&report, point).verdict, Verdict::Pass);
    }
}

#[test]
fn explicit_begin_mutation_on_multiplexed_session_is_bug() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::DeleteBegin);

    let point = delete_begin(
        SessionMode::Enabled,
        DeleteMethod::StmtMutation,
        BeginStrategy::Explicit,
    );
    let result = result_for(&report, point);
    assert_eq!(result.verdict, Verdict::Bug);
    assert_eq!(
        result.raw_label,
        "FAIL: BUG: row PK=1 still exists after DELETE succeeded without error"
    );
}

#[test]
fn disabling_multiplexing_avoids_the_loss() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::DeleteBegin);

    let point = delete_begin(
        SessionMode::Disabled,
        DeleteMethod::StmtMutation,
        BeginStrategy::Explicit,
    );
    assert_eq!(result_for(&report, point).verdict, Verdict::Pass);
}

#[test]
fn sql_delete_passes_everywhere() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::DeleteBegin);

    let dml: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.point.delete == DeleteMethod::StmtDml)
        .collect();
    assert_eq!(dml.len(), 9);
    assert!(dml.iter().all(|r| r.verdict == Verdict::Pass));
}

#[test]
fn only_keyless_explicit_commits_on_multiplexed_sessions_lose_data() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::DeleteBegin);

    let bugs: Vec<ScenarioPoint> = report
        .results
        .iter()
        .filter(|r| r.verdict == Verdict::Bug)
        .map(|r| r.point)
        .collect();
    assert_eq!(
        bugs,
        vec![
            delete_begin(
                SessionMode::Enabled,
                DeleteMethod::StmtMutation,
                BeginStrategy::Explicit
            ),
            delete_begin(
                SessionMode::Unset,
                DeleteMethod::StmtMutation,
                BeginStrategy::Explicit
            ),
        ]
    );
    assert_eq!(report.summary.to_string(), "30 points: 28 pass, 2 bug");
}

#[test]
fn insert_methods_do_not_matter_with_default_begin() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::InsertDelete);
    assert_eq!(report.summary.total, 24);
    assert!(!report.has_bugs(), "{}", report.render_table());
}

#[test]
fn fault_disabled_backend_is_clean() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, false), Variant::DeleteBegin);
    assert!(!report.has_bugs(), "{}", report.render_table());
}

#[test]
fn mixed_write_passes_but_is_unverified() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::MixedWrite);

    assert_eq!(report.summary.total, 9);
    assert_eq!(report.summary.unverified, 9);
    assert!(report.results.iter().all(|r| r.unverified));
    assert!(report.results.iter().all(|r| r.verdict == Verdict::Pass));
}
