//! Smoke tests for the courseprobe CLI

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG_ENV: [&str; 8] = [
    "BASE_URL",
    "BROWSER",
    "HEADLESS",
    "IMPLICIT_WAIT",
    "CHROME_EXECUTABLE",
    "USER_EMAIL",
    "USER_PASSWORD",
    "USER_ORG",
];

/// Command for the courseprobe binary with configuration variables cleared
fn courseprobe() -> Command {
    let mut cmd = Command::cargo_bin("courseprobe").expect("courseprobe binary should exist");
    for key in CONFIG_ENV {
        cmd.env_remove(key);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn config_dir(config: &str, credentials: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.properties"), config).unwrap();
    fs::write(dir.path().join("credentials.properties"), credentials).unwrap();
    dir
}

const CREDENTIALS: &str = "user_email=learner@example.com\nuser_password=hunter2\nuser_org=acme\n";

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    courseprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    courseprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("checkpoints"));
}

#[test]
fn test_no_args_fails() {
    courseprobe().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    courseprobe()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config-dir"))
        .stdout(predicate::str::contains("--headless"));
}

// ============================================================================
// Checkpoints
// ============================================================================

#[test]
fn test_checkpoints_table() {
    courseprobe()
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(predicate::str::contains("ModuleStarted"))
        .stdout(predicate::str::contains("percent == 0"))
        .stdout(predicate::str::contains("\"91%\""))
        .stdout(predicate::str::contains("FinalAnswerSelected"));
}

#[test]
fn test_checkpoints_json() {
    let output = courseprobe()
        .args(["checkpoints", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let values: Vec<u64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["value"].as_u64().unwrap())
        .collect();
    assert_eq!(values, vec![0, 33, 34, 75, 83, 91, 100]);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_masks_password() {
    let dir = config_dir("base_url=https://app.test/\nheadless=true\n", CREDENTIALS);
    courseprobe()
        .args(["config", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url = https://app.test/"))
        .stdout(predicate::str::contains("headless = true"))
        .stdout(predicate::str::contains("user_password = ********"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_env_overrides_file() {
    let dir = config_dir("base_url=https://file.test/\n", CREDENTIALS);
    courseprobe()
        .env("BASE_URL", "https://env.test/")
        .args(["config", "--format", "json", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("https://env.test/"));
}

#[test]
fn test_config_missing_base_url_fails() {
    let dir = config_dir("headless=true\n", CREDENTIALS);
    courseprobe()
        .args(["config", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("base_url"));
}

#[test]
fn test_config_unsupported_browser_fails() {
    let dir = config_dir("base_url=https://app.test/\nbrowser=lynx\n", CREDENTIALS);
    courseprobe()
        .args(["config", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("lynx"));
}

#[test]
fn test_run_without_base_url_fails_before_launch() {
    let dir = config_dir("", CREDENTIALS);
    courseprobe()
        .args(["run", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("base_url"));
}

// ============================================================================
// Dry run
// ============================================================================

#[test]
fn test_dry_run_completes_against_mock_site() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.json");
    courseprobe()
        .args(["--color", "never", "run", "--dry-run", "--report"])
        .arg(&report)
        .assert()
        .success()
        .stderr(predicate::str::contains("PASSED 15 of 15 steps"))
        .stderr(predicate::str::contains("ResultsShown"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["final_state"], "results_shown");
    assert_eq!(json["steps"].as_array().unwrap().len(), 15);
}
