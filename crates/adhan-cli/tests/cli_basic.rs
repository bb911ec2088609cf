//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Every test
//! points HOME at its own temporary directory so the data directory starts
//! empty.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "adhan-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env("ADHAN_ENV", "dev")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn configure_paris(home: &Path) {
    for (key, value) in [
        ("coordinates.latitude", "48.8566"),
        ("coordinates.longitude", "2.3522"),
        ("utc_offset_minutes", "60"),
    ] {
        run_ok(home, &["settings", "set", key, value, "--no-reprogram"]);
    }
}

#[test]
fn test_times_without_settings_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["times"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no settings"), "stderr: {stderr}");
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(run_ok(home.path(), &["config", "get", "reprogram.debounce_ms"]).trim(), "750");
    run_ok(home.path(), &["config", "set", "reprogram.debounce_ms", "300"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "reprogram.debounce_ms"]).trim(), "300");
    assert!(run_ok(home.path(), &["config", "list"]).contains("reprogram.debounce_ms = 300"));
    assert!(run_ok(home.path(), &["config", "path"]).trim().ends_with("adhan-dev/config.toml"));

    let (_, _, code) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
}

#[test]
fn test_settings_roundtrip() {
    let home = tempfile::tempdir().unwrap();
    configure_paris(home.path());
    assert_eq!(
        run_ok(home.path(), &["settings", "show", "coordinates.latitude"]).trim(),
        "48.8566"
    );

    let (_, _, code) = run_cli(home.path(), &["settings", "set", "coordinates.latitude", "123"]);
    assert_eq!(code, 1);

    run_ok(home.path(), &["settings", "reset"]);
    assert!(run_ok(home.path(), &["settings", "show"]).contains("no settings"));
}

#[test]
fn test_times_json() {
    let home = tempfile::tempdir().unwrap();
    configure_paris(home.path());
    let out = run_ok(home.path(), &["times", "--date", "2024-01-01", "--days", "2", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let days = parsed.as_array().unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["date"], "2024-01-01");
    assert_eq!(days[0]["times"].as_array().unwrap().len(), 6);
}

#[test]
fn test_schedule_json() {
    let home = tempfile::tempdir().unwrap();
    configure_paris(home.path());
    run_ok(home.path(), &["settings", "set", "reminders_enabled", "true", "--no-reprogram"]);
    let out = run_ok(
        home.path(),
        &["schedule", "--json", "--days", "1", "--now", "2024-01-01T04:00:00Z"],
    );
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["intents"].as_array().unwrap().len(), 10);
    assert_eq!(parsed["truncated"], false);
}

#[test]
fn test_reprogram_and_diagnostics() {
    let home = tempfile::tempdir().unwrap();
    configure_paris(home.path());
    let out = run_ok(
        home.path(),
        &["reprogram", "--json", "--now", "2024-01-01T04:00:00Z"],
    );
    let run: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(run["success"], true);
    assert_eq!(run["trigger"], "manual");
    // Free tier: two days of five adhans.
    assert_eq!(run["intent_count"], 10);

    let outbox = home.path().join(".config/adhan-dev/outbox.json");
    let pending: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(outbox).unwrap()).unwrap();
    assert_eq!(pending["pending"].as_array().unwrap().len(), 10);

    let out = run_ok(home.path(), &["diagnostics", "--json"]);
    let runs: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 1);
}

#[test]
fn test_refresh_without_settings_records_failure() {
    let home = tempfile::tempdir().unwrap();
    let out = run_ok(home.path(), &["refresh"]);
    assert!(out.contains("failed"));

    let out = run_ok(home.path(), &["diagnostics", "--json"]);
    let runs: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(runs[0]["error"]["kind"], "no_settings");
    assert_eq!(runs[0]["intent_count"], 0);
}
