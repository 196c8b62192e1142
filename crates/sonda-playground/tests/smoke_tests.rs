//! Smoke tests for the sonda-playground CLI
//!
//! Offline runs use real time, so they stick to scenarios without delays.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn playground() -> Command {
    let mut cmd = Command::cargo_bin("sonda-playground").expect("sonda-playground binary should exist");
    cmd.env_remove("SONDA_BASE_URL").env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    playground()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    playground()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_no_args_fails() {
    playground().assert().failure();
}

#[test]
fn test_run_help_mentions_offline() {
    playground()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--offline"))
        .stdout(predicate::str::contains("--scenario"));
}

// ============================================================================
// List
// ============================================================================

#[test]
fn test_list_prints_every_scenario() {
    let assert = playground().arg("list").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for scenario in sonda_playground::scenarios::all() {
        assert!(stdout.contains(scenario.name()), "missing {}", scenario.name());
    }
    assert_eq!(stdout.matches("[fails by design]").count(), 2);
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_unknown_scenario_fails() {
    playground()
        .args(["run", "--offline", "-s", "dynamic_table"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown scenario 'dynamic_table'"));
}

#[test]
fn test_fail_fast_conflicts_with_concurrent() {
    playground()
        .args(["run", "--offline", "--concurrent", "--fail-fast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_offline_run_passes() {
    playground()
        .args(["--color", "never", "run", "--offline", "-s", "verify_text"])
        .assert()
        .success()
        .stderr(predicate::str::contains("PASS"))
        .stderr(predicate::str::contains("verify_text"));
}

#[test]
fn test_offline_run_json_summary() {
    let assert = playground()
        .args(["-q", "run", "--offline", "-s", "verify_text", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let reports = summary["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["name"], "verify_text");
    assert!(reports[0]["failure"].is_null());
}

#[test]
fn test_invalid_base_url_rejected() {
    playground()
        .args(["run", "--offline", "--base-url", "ftp://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("base_url must be an http(s) URL"));
}

#[test]
fn test_config_file_is_validated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sonda.yaml");
    fs::write(&path, "poll_interval_ms: 0\n").unwrap();
    playground()
        .args(["run", "--offline", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("poll_interval_ms must be positive"));
}

#[cfg(not(feature = "browser"))]
#[test]
fn test_browser_run_without_feature_points_to_offline() {
    playground()
        .args(["run", "-s", "verify_text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--offline"));
}
