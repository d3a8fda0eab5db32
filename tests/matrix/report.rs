use crate::common::*;
use tempfile::TempDir;

#[test]
fn table_rows_match_results() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::DeleteBegin);
    let table = report.render_table();
    let lines: Vec<&str> = table.lines().collect();

    // header, rule, one row per point, blank, summary
    assert_eq!(lines.len(), 2 + 30 + 2);
    assert_eq!(lines[0], "SESSIONS  DELETE         BEGIN     RESULT");
    assert_eq!(lines[4], "enabled   stmt-mutation  explicit  BUG");
    assert_eq!(lines[33], "30 points: 28 pass, 2 bug");
}

#[test]
fn json_report_round_trips() {
    let dir = TempDir::new().unwrap();
    let report = run_matrix(&harness_config(&dir, true), Variant::MixedWrite);

    let json = report.to_json().unwrap();
    let parsed: MatrixReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.results, report.results);
    assert_eq!(parsed.summary, report.summary);
    assert_eq!(parsed.variant, Variant::MixedWrite);
    assert_eq!(parsed.axes, report.axes);
    assert_eq!(parsed.render_table(), report.render_table());
}
