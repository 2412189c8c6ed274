use std::fs;

use assert_cmd::Command;
use predicates::boolean::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn help_lists_worker_programs() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("respawn"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("tick").and(contains("serve")).and(contains("--workers")));
}

#[test]
fn missing_config_file_is_reported() {
    let temp = tempdir().expect("failed to create tempdir");
    let missing = temp.path().join("absent.yaml");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("respawn"));
    cmd.arg("--config").arg(&missing).arg("tick");
    cmd.assert().failure().stderr(contains("NotFound"));
}

#[test]
fn invalid_interval_in_config_is_rejected() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = temp.path().join("respawn.yaml");
    fs::write(
        &config_path,
        r#"workers: 1
tick:
  interval: "soon"
"#,
    )
    .expect("failed to write config");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("respawn"));
    cmd.arg("--config").arg(&config_path).arg("tick");
    cmd.assert().failure().stderr(contains("interval"));
}

#[test]
fn worker_marker_alone_runs_the_worker_directly() {
    // With the marker present the process is a worker: it runs the entry point itself
    // instead of launching anything. The serve worker has no inherited listener here.
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("respawn"));
    cmd.args(["serve", "--respawn-worker"]);
    cmd.assert()
        .failure()
        .code(1)
        .stdout(contains("no inherited listener"));
}
