//! Black-box tests driving the `chopsticks-cli` binary directly, testing
//! CLI surfaces through `assert_cmd` rather than calling `run_cli`
//! in-process.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("chopsticks-cli").unwrap()
}

#[test]
fn daemon_status_reports_stopped_without_a_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args([
            "daemon",
            "status",
            "--pid-file",
            dir.path().join("daemon.pid").to_str().unwrap(),
            "--state-file",
            dir.path().join("daemon.state").to_str().unwrap(),
            "--socket-path",
            dir.path().join("daemon.sock").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped"));
}

#[test]
fn daemon_stop_without_a_running_daemon_is_a_success() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args([
            "daemon",
            "stop",
            "--pid-file",
            dir.path().join("daemon.pid").to_str().unwrap(),
            "--state-file",
            dir.path().join("daemon.state").to_str().unwrap(),
            "--socket-path",
            dir.path().join("daemon.sock").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("was not running"));
}

#[test]
fn daemon_status_with_json_format_reports_running_false() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args([
            "daemon",
            "status",
            "--pid-file",
            dir.path().join("daemon.pid").to_str().unwrap(),
            "--state-file",
            dir.path().join("daemon.state").to_str().unwrap(),
            "--socket-path",
            dir.path().join("daemon.sock").to_str().unwrap(),
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"running\": false"));
}

#[test]
fn daemon_stop_with_json_format_reports_not_running_outcome() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args([
            "daemon",
            "stop",
            "--pid-file",
            dir.path().join("daemon.pid").to_str().unwrap(),
            "--state-file",
            dir.path().join("daemon.state").to_str().unwrap(),
            "--socket-path",
            dir.path().join("daemon.sock").to_str().unwrap(),
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\": \"not_running\""));
}

fn write_file(path: &std::path::Path, contents: &str) {
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

fn setup_action_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let install_root = dir.join("install");
    let data_dir = dir.join("data");
    std::fs::create_dir_all(&install_root).unwrap();
    std::fs::create_dir_all(&data_dir).unwrap();
    write_file(&install_root.join("scenario.py"), "# locust scenario\n");

    let credentials_path = dir.join("credentials.yaml");
    write_file(
        &credentials_path,
        r#"
endpoint: http://minio.internal:9000
access_key: AKIAEXAMPLE
secret_key: secretexample
bucket: chopsticks-runs
region: us-east-1
driver: s5cmd
"#,
    );

    let config_path = dir.join("config.yaml");
    write_file(
        &config_path,
        &format!(
            r#"
install_root: {install_root}
data_dir: {data_dir}
credentials_path: {credentials_path}
workload:
  binary: /usr/bin/true
  default_scenario: scenario.py
"#,
            install_root = install_root.display(),
            data_dir = data_dir.display(),
            credentials_path = credentials_path.display(),
        ),
    );
    config_path
}

#[test]
fn action_test_status_on_a_fresh_unit_is_idle() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = setup_action_fixture(dir.path());
    cli()
        .args(["action", "--config", config_path.to_str().unwrap(), "test-status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"test_state\": \"idle\""))
        .stdout(predicate::str::contains("\"is_leader\": true"));
}

#[test]
fn action_start_test_rejects_a_missing_scenario_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = setup_action_fixture(dir.path());
    cli()
        .args([
            "action",
            "--config",
            config_path.to_str().unwrap(),
            "start-test",
            "--users",
            "5",
            "--spawn-rate",
            "1.0",
            "--duration",
            "30s",
            "--scenario-file",
            "does-not-exist.py",
            "--headless",
        ])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("scenario file not found"));
}
