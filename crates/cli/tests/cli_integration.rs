//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `lifecycle` binary and verify
//! exit codes, stdout content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const THREE_ENTRY_TABLE: &str =
    r#"{"Created-Continue":"Running","Created-Cancel":"InternalErrorState","Running-Continue":"Completed"}"#;

fn lifecycle() -> Command {
    let mut cmd = cargo_bin_cmd!("lifecycle");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A temp dir holding `engine.toml` that points the directory loader at
/// `machines/`, with `Job.json` written there.
fn config_dir(job_table: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("machines")).unwrap();
    fs::write(dir.path().join("machines/Job.json"), job_table).unwrap();
    let config = dir.path().join("engine.toml");
    fs::write(
        &config,
        "[config_loader]\nkind = \"directory\"\npath = \"machines\"\n\n[callouts]\nkind = \"disabled\"\n",
    )
    .unwrap();
    (dir, config)
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    lifecycle()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Life cycle engine operator CLI"));
}

#[test]
fn version_exits_0() {
    lifecycle()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lifecycle"));
}

#[test]
fn missing_subcommand_fails() {
    lifecycle().assert().failure();
}

// ──────────────────────────────────────────────
// 2. validate
// ──────────────────────────────────────────────

#[test]
fn validate_prints_normalized_table() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("job.json");
    fs::write(&file, THREE_ENTRY_TABLE).unwrap();

    lifecycle()
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (3 transitions)"))
        .stdout(predicate::str::contains("Created-Continue -> Running"))
        .stdout(predicate::str::contains("Running-Continue -> Completed"));
}

#[test]
fn validate_json_output() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("job.json");
    fs::write(&file, THREE_ENTRY_TABLE).unwrap();

    let output = lifecycle()
        .args(["--output", "json", "validate"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["transitions"], 3);
    assert_eq!(json["table"]["Created-Cancel"], "InternalErrorState");
}

#[test]
fn validate_rejects_non_json() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.json");
    fs::write(&file, "Invalid state machine configuration").unwrap();

    lifecycle()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn validate_rejects_malformed_key() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.json");
    fs::write(&file, r#"{"Created":"Running"}"#).unwrap();

    lifecycle()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid transition key 'Created'"));
}

#[test]
fn validate_missing_file_fails() {
    lifecycle()
        .args(["validate", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn quiet_suppresses_error_output() {
    lifecycle()
        .args(["--quiet", "validate", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

#[test]
fn json_errors_are_json() {
    let output = lifecycle()
        .args(["--output", "json", "validate", "does-not-exist.json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("does-not-exist.json"));
}

// ──────────────────────────────────────────────
// 3. show
// ──────────────────────────────────────────────

#[test]
fn show_without_config_prints_built_in_table() {
    lifecycle()
        .args(["show", "--entity-type", "Job"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created-Continue -> Running"))
        .stdout(predicate::str::contains("InternalErrorState-Continue -> Disposed"));
}

#[test]
fn show_uses_directory_loader() {
    let (_dir, config) = config_dir(THREE_ENTRY_TABLE);

    lifecycle()
        .args(["show", "--entity-type", "Job", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running-Continue -> Completed"))
        .stdout(predicate::str::contains("Running-Cancel").not());
}

#[test]
fn show_falls_back_to_built_in_table_for_unconfigured_type() {
    let (_dir, config) = config_dir(THREE_ENTRY_TABLE);

    lifecycle()
        .args(["show", "--entity-type", "Order", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running-Cancel -> Cancelled"));
}

#[test]
fn show_reports_invalid_configuration() {
    let (_dir, config) = config_dir("Invalid state machine configuration");

    lifecycle()
        .args(["show", "--entity-type", "Job", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "invalid state machine configuration for entity type 'Job'",
        ));
}

#[test]
fn show_reports_unparseable_engine_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engine.toml");
    fs::write(&config, "[callouts]\nkind = \"smtp\"\n").unwrap();

    lifecycle()
        .args(["show", "--entity-type", "Job", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse engine configuration"));
}

// ──────────────────────────────────────────────
// 4. evaluate
// ──────────────────────────────────────────────

#[test]
fn evaluate_prints_next_state() {
    lifecycle()
        .args([
            "evaluate",
            "--entity-type",
            "Job",
            "--state",
            "Created",
            "--condition",
            "Continue",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("Running\n"));
}

#[test]
fn evaluate_unknown_transition_fails() {
    let (_dir, config) = config_dir(THREE_ENTRY_TABLE);

    lifecycle()
        .args([
            "evaluate",
            "--entity-type",
            "Job",
            "--state",
            "Running",
            "--condition",
            "Cancel",
            "--config",
        ])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "no transition from state 'Running' on condition 'Cancel'",
        ));
}

#[test]
fn evaluate_json_output() {
    let output = lifecycle()
        .args([
            "--output",
            "json",
            "evaluate",
            "--entity-type",
            "Job",
            "--state",
            "Running",
            "--condition",
            "Cancel",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["next_state"], "Cancelled");
}

// ──────────────────────────────────────────────
// 5. change-state
// ──────────────────────────────────────────────

#[test]
fn change_state_rejects_empty_uri() {
    lifecycle()
        .args([
            "change-state",
            "",
            "Continue",
            "--entity-type",
            "Job",
            "--user",
            "alice",
            "--tenant",
            "tenant-a",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid argument"));
}

#[test]
fn change_state_reports_unreachable_entity() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let (_dir, config) = config_dir(THREE_ENTRY_TABLE);

    let output = lifecycle()
        .args(["--output", "json", "change-state"])
        .arg(format!("http://{}/jobs/1", addr))
        .args([
            "Continue",
            "--entity-type",
            "Job",
            "--user",
            "alice",
            "--tenant",
            "tenant-a",
            "--config",
        ])
        .arg(&config)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("cannot fetch entity"));
    assert_eq!(json["retryable"], true);
    assert_eq!(json["committed_state"], serde_json::Value::Null);
}
