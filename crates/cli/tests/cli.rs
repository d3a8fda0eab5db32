//! Black-box tests of the `txmatrix` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const TOGGLE: &str = "MULTIPLEXED_SESSIONS_FOR_RW";

fn binary() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_txmatrix"))
}

/// Config with no settling delay, backend under the temp dir
fn write_config(dir: &TempDir, mutation_loss: bool) -> PathBuf {
    let path = dir.path().join("txmatrix.toml");
    let content = format!(
        "[backend]\nkind = \"local\"\ndata_dir = \"{}\"\nsettle_ms = 0\nmultiplexed_mutation_loss = {}\n\n[schema]\ntable = \"Singers\"\n",
        dir.path().join("backend").display(),
        mutation_loss
    );
    std::fs::write(&path, content).unwrap();
    path
}

fn txmatrix(config: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(binary());
    cmd.args(args)
        .arg("--config")
        .arg(config)
        .arg("--quiet")
        .env_remove(TOGGLE)
        .env_remove("SPANNER_EMULATOR_HOST")
        .env_remove("RUST_LOG");
    cmd
}

fn last_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .last()
        .unwrap_or("")
        .to_string()
}

fn reset(config: &Path) {
    let output = txmatrix(config, &["reset"]).output().unwrap();
    assert!(output.status.success(), "reset failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("projects/test-project/instances/test-instance/databases/test-database"));
}

#[test]
fn test_scenario_without_backend_is_setup_failure() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, true);
    let output = txmatrix(&config, &["scenario"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(last_line(&output).starts_with("Setup: "), "{:?}", output);
}

#[test]
fn test_scenario_explicit_mutation_on_multiplexed_session() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, true);
    reset(&config);

    let output = txmatrix(
        &config,
        &["scenario", "--delete", "stmt-mutation", "--begin", "explicit", "--skip-setup"],
    )
    .env(TOGGLE, "true")
    .output()
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        last_line(&output),
        "FAIL: BUG: row PK=1 still exists after DELETE succeeded without error"
    );
}

#[test]
fn test_scenario_passes_with_multiplexing_disabled() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, true);
    reset(&config);

    let output = txmatrix(
        &config,
        &["scenario", "--delete", "stmt-mutation", "--begin", "explicit", "--skip-setup"],
    )
    .env(TOGGLE, "false")
    .output()
    .unwrap();

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert_eq!(last_line(&output), "PASS");
}

#[test]
fn test_scenario_rejects_bad_toggle() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, true);
    reset(&config);

    let output = txmatrix(&config, &["scenario", "--skip-setup"])
        .env(TOGGLE, "sometimes")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(last_line(&output).contains(TOGGLE));
}

#[test]
fn test_matrix_mixed_write_subprocess() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, true);

    let output = txmatrix(&config, &["matrix", "--variant", "mixed-write"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("SESSIONS  BEGIN     RESULT\n"));
    assert!(stdout.contains("PASS (unverified)"));
    assert_eq!(last_line(&output), "9 points: 9 pass, 0 bug (9 unverified)");
}

#[test]
fn test_matrix_delete_begin_json_reports_bugs() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, true);

    let output = txmatrix(
        &config,
        &["matrix", "--variant", "delete-begin", "--in-process", "--json"],
    )
    .output()
    .unwrap();

    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["variant"], "delete-begin");
    assert_eq!(report["summary"]["total"], 30);
    assert_eq!(report["summary"]["bug"], 2);

    let bugs: Vec<_> = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["verdict"] == "BUG")
        .map(|r| {
            (
                r["point"]["session"].as_str().unwrap().to_string(),
                r["point"]["delete"].as_str().unwrap().to_string(),
                r["point"]["begin"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        bugs,
        vec![
            ("enabled".into(), "stmt-mutation".into(), "explicit".into()),
            ("unset".into(), "stmt-mutation".into(), "explicit".into()),
        ]
    );
}

#[test]
fn test_matrix_without_fault_is_clean() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, false);

    let output = txmatrix(
        &config,
        &["matrix", "--variant", "insert-delete", "--in-process"],
    )
    .output()
    .unwrap();

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert_eq!(last_line(&output), "24 points: 24 pass, 0 bug");
}

#[test]
fn test_matrix_bad_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[schema]\ntable = \"a/b\"\n").unwrap();

    let output = txmatrix(&path, &["matrix", "--variant", "mixed-write"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_matrix_refuses_foreign_data_dir() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("thesis.txt");
    std::fs::write(&notes, "chapter one").unwrap();
    let path = dir.path().join("txmatrix.toml");
    std::fs::write(
        &path,
        format!(
            "[backend]\nkind = \"local\"\ndata_dir = \"{}\"\nsettle_ms = 0\n",
            dir.path().display()
        ),
    )
    .unwrap();

    let output = txmatrix(&path, &["matrix", "--variant", "mixed-write", "--in-process"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("refusing to remove"));
    assert_eq!(std::fs::read_to_string(&notes).unwrap(), "chapter one");
}
