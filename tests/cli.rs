use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Binary with an isolated config file and no inherited overrides
fn ccpulse(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ccpulse").unwrap();
    cmd.env("CCPULSE_CONFIG", config_dir.path().join("config.toml"))
        .env_remove("CCPULSE_PROMETHEUS_URL")
        .env_remove("CCPULSE_REFRESH_SECS")
        .env_remove("CCPULSE_STATS_FILE")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_config_show_prints_defaults() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:9090"))
        .stdout(predicate::str::contains("31517"));
}

#[test]
fn test_env_override_is_shown_but_not_saved() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .env("CCPULSE_PROMETHEUS_URL", "http://metrics.internal:9090")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://metrics.internal:9090"));

    let stored = std::fs::read_to_string(tmp.path().join("config.toml")).unwrap();
    assert!(!stored.contains("metrics.internal"));
}

#[test]
fn test_set_url_persists() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args(["config", "set-url", "http://prom:9090"])
        .assert()
        .success();

    ccpulse(&tmp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://prom:9090"));
}

#[test]
fn test_set_url_rejects_non_http_scheme() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args(["config", "set-url", "ftp://prom:9090"])
        .assert()
        .failure();
}

#[test]
fn test_insights_json_from_fixture() {
    let tmp = TempDir::new().unwrap();
    let output = ccpulse(&tmp)
        .args(["insights", "--days", "3", "--today", "2026-03-10", "--json", "--file"])
        .arg(fixture("stats-cache.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["days"], 3);
    assert_eq!(report["total_sessions"], 13);
    assert_eq!(report["comparison"]["messages"]["current"], 120.0);
    assert_eq!(report["comparison"]["messages"]["previous"], 40.0);
    assert_eq!(report["comparison"]["messages"]["percent_change"], 200.0);
    assert_eq!(report["peak"]["current_streak"], 6);
    assert_eq!(report["peak"]["most_active_hour"], 14);
    assert_eq!(report["messages_trend"].as_array().unwrap().len(), 3);
}

#[test]
fn test_insights_text_output() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args(["insights", "--today", "2026-03-10", "--file"])
        .arg(fixture("stats-cache.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Claude Code Insights"))
        .stdout(predicate::str::contains("claude-opus-4"));
}

#[test]
fn test_insights_missing_file() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args(["insights", "--file"])
        .arg(tmp.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_unknown_range_is_rejected() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args(["dashboard", "--range", "forever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown time range"));
}

#[test]
fn test_range_conflicts_with_custom_bounds() {
    let tmp = TempDir::new().unwrap();
    ccpulse(&tmp)
        .args([
            "dashboard",
            "--range",
            "1h",
            "--start",
            "2026-03-01T00:00:00Z",
            "--end",
            "2026-03-01T06:00:00Z",
        ])
        .assert()
        .failure();
}

#[test]
fn test_check_reports_unreachable_backend() {
    let tmp = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    ccpulse(&tmp)
        .env("CCPULSE_PROMETHEUS_URL", format!("http://127.0.0.1:{}", port))
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("not connected"));
}
