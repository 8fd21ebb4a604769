#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const OVERRIDE_VARS: &[&str] = &[
    "PACKY_CONFIG",
    "DBPATH",
    "SAVEPATH",
    "CRON",
    "SYNCFREQ",
    "PORT",
    "IRCHOSTNAME",
    "METRICPREFIX",
];

fn packy(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("packy").unwrap();
    cmd.current_dir(dir.path());
    for var in OVERRIDE_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg(dir.path().join("config.yaml"));
    cmd
}

/// Write fake ownership and probe tools plus a config pointing at them.
/// The tools are run through `sh`, reading their output from files in `dir`.
fn write_project(dir: &TempDir, extra: &str) {
    let d = dir.path().display();
    std::fs::write(
        dir.path().join("query.sh"),
        format!("cat \"{d}/owned-$2.txt\" 2>/dev/null\n"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("probe.sh"),
        format!("cat \"{d}/probe$1.txt\" 2>/dev/null\nexit 0\n"),
    )
    .unwrap();
    let config = format!(
        r#"maintainers:
  - alice
  - name: bob
    ircName: bobby
db: {d}/packages.db
savePath: {d}/data.json
tools:
  query: sh
  query_args: ["{d}/query.sh"]
  probe: sh
  move_args: ["{d}/probe.sh", "-m"]
  update_args: ["{d}/probe.sh", "-u"]
  query_delay_ms: 0
  timeout_secs: 10
  lock_dir: {d}/lock
{extra}"#
    );
    std::fs::write(dir.path().join("config.yaml"), config).unwrap();
}

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

// ---------------------------------------------------------------------------
// packy config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_accepts_clean_config() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "");
    packy(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_rejects_bad_cron() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "cron: \"every so often\"\n");
    packy(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn env_override_is_validated_too() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "");
    packy(&dir)
        .env("CRON", "not a cron")
        .args(["config", "validate", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not a cron"));
}

#[test]
fn config_show_applies_overrides() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "");
    let out = packy(&dir)
        .env("SYNCFREQ", "7")
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["syncfreq"], 7);
    assert_eq!(json["maintainers"][1]["ircName"], "bobby");
}

#[test]
fn cycle_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "");
    packy(&dir)
        .env("CRON", "not a cron")
        .args(["cycle", "--no-notify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"))
        .stderr(predicate::str::contains("not a cron"));
    assert!(!dir.path().join("data.json").exists());
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();
    packy(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config not found"));
}

// ---------------------------------------------------------------------------
// packy cycle / packy maintainer
// ---------------------------------------------------------------------------

#[test]
fn cycle_then_maintainer_view() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "");
    write(dir.path(), "owned-alice.txt", "foo\nbar\n");
    write(dir.path(), "owned-bob.txt", "baz\n");
    write(dir.path(), "probe-m.txt", "Package basename | from | to\nfoo | a | b\n");
    write(dir.path(), "probe-u.txt", "baz | 1 | 2\n");

    let out = packy(&dir)
        .args(["cycle", "--no-notify", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["report"]["reconcile"].is_object());
    let notified = json["notified"].as_array().unwrap();
    assert_eq!(notified.len(), 2);
    assert_eq!(notified[0]["maintainer"]["name"], "alice");
    assert_eq!(notified[0]["packages"], serde_json::json!(["foo"]));
    assert_eq!(notified[1]["action"], "update");

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("data.json")).unwrap())
            .unwrap();
    assert_eq!(saved["move"], serde_json::json!(["foo"]));

    packy(&dir)
        .args(["maintainer", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice owns 2 packages"))
        .stdout(predicate::str::contains("foo"))
        .stdout(predicate::str::contains("Nothing ready to update."));

    packy(&dir)
        .args(["maintainer", "carol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("known maintainers: alice, bob"));

    // Second run: nothing new, no reconciliation.
    let out = packy(&dir)
        .args(["cycle", "--no-notify", "--json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["report"].get("reconcile").is_none());
    assert!(json["notified"].as_array().unwrap().is_empty());
}

#[test]
fn maintainer_without_packages_fails() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "");
    packy(&dir)
        .args(["maintainer", "carol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owns no packages"));
}
