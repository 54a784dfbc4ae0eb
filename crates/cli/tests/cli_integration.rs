//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `keystone` binary against a fresh database
//! in a temporary directory and verify exit codes, stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("keystone.db")
    }

    /// A `keystone` command rooted in the workspace, pointed at its database.
    fn keystone(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("keystone");
        cmd.current_dir(self.dir.path())
            .env_remove("KEYSTONE_DB")
            .env_remove("KEYSTONE_LOG")
            .env_remove("KEYSTONE_LOG_JSON")
            .arg("--db")
            .arg(self.db());
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let out = self
            .keystone()
            .args(["--output", "json"])
            .args(args)
            .output()
            .expect("run keystone");
        assert!(
            out.status.success(),
            "keystone {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        serde_json::from_slice(&out.stdout).expect("json stdout")
    }

    fn create_project(&self, name: &str) -> i64 {
        self.json(&["project", "create", "--name", name])["value"]
            .as_i64()
            .expect("project id")
    }
}

const ONE_LINE: &str = r#"[
  {"cost_code": "01-010", "description": "Mobilization", "quantity": 1, "unit": "LS",
   "unit_cost": 5000, "total_cost": 5000}
]"#;

// ──────────────────────────────────────────────
// 1. Help, version and init
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    cargo_bin_cmd!("keystone")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("baseline and earned-value"));
}

#[test]
fn version_exits_0() {
    cargo_bin_cmd!("keystone")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keystone"));
}

#[test]
fn init_creates_database() {
    let ws = Workspace::new();
    ws.keystone()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema version 1"));
    assert!(ws.db().exists());
}

#[test]
fn db_path_comes_from_config_file() {
    let ws = Workspace::new();
    ws.write("keystone.toml", "[store]\npath = \"data/site.db\"\n");
    cargo_bin_cmd!("keystone")
        .current_dir(ws.dir.path())
        .env_remove("KEYSTONE_DB")
        .arg("init")
        .assert()
        .success();
    assert!(ws.dir.path().join("data/site.db").exists());
}

#[test]
fn explicit_missing_config_fails() {
    let ws = Workspace::new();
    ws.keystone()
        .args(["--config", "nope.toml", "init"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nope.toml"));
}

// ──────────────────────────────────────────────
// 2. End-to-end baseline and analysis
// ──────────────────────────────────────────────

#[test]
fn worked_example_end_to_end() {
    let ws = Workspace::new();
    let project = ws.create_project("Harbor Office").to_string();
    let file = ws.write("estimate.json", ONE_LINE);

    ws.keystone()
        .args(["estimates", "import"])
        .arg(&file)
        .args(["--project", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 estimate line(s)"));

    ws.keystone()
        .args(["baseline", "regenerate", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 element(s), 1 budget line(s)"));

    let drift = ws.json(&["baseline", "drift", &project]);
    assert_eq!(drift["value"]["in_sync"], true);

    let cost = ws.json(&["analyze", "cost", &project]);
    let element = cost["value"]["rows"][0]["element_id"].as_i64().unwrap().to_string();

    ws.keystone()
        .args(["track", "actual", &project, "--amount", "3000", "--date", "2024-03-10"])
        .args(["--element", &element])
        .assert()
        .success();
    ws.keystone()
        .args(["track", "progress", &project, &element, "--percent", "100", "--date", "2024-03-15"])
        .assert()
        .success();

    ws.keystone()
        .args(["analyze", "cost", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("5000.00"))
        .stdout(predicate::str::contains("3000.00"))
        .stdout(predicate::str::contains("2000.00"))
        .stdout(predicate::str::contains("40.0"));

    let cost = ws.json(&["analyze", "cost", &project]);
    let row = &cost["value"]["rows"][0];
    assert_eq!(row["earned_value"], 5000.0);
    assert_eq!(row["cost_variance"], 2000.0);
    assert_eq!(row["cost_variance_pct"], 40.0);

    ws.keystone()
        .args(["analyze", "summary", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("CPI  1.667"))
        .stdout(predicate::str::contains("too high"));
}

#[test]
fn cost_variance_percentage_is_null_in_json_without_progress() {
    let ws = Workspace::new();
    let project = ws.create_project("Idle").to_string();
    let file = ws.write("estimate.json", ONE_LINE);
    ws.keystone()
        .args(["estimates", "import"])
        .arg(&file)
        .args(["--project", &project])
        .assert()
        .success();
    ws.keystone()
        .args(["baseline", "regenerate", &project])
        .assert()
        .success();

    let cost = ws.json(&["analyze", "cost", &project]);
    assert!(cost["value"]["rows"][0]["cost_variance_pct"].is_null());
    assert!(cost["message"]
        .as_str()
        .unwrap()
        .contains("No actual costs or progress"));

    ws.keystone()
        .args(["analyze", "cost", &project])
        .assert()
        .success()
        .stdout(predicate::str::contains("n/a"));
}

// ──────────────────────────────────────────────
// 3. Failure paths exit 1
// ──────────────────────────────────────────────

#[test]
fn unknown_project_exits_1() {
    let ws = Workspace::new();
    ws.keystone()
        .args(["baseline", "regenerate", "99"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("project 99 not found"));
}

#[test]
fn json_errors_carry_kind() {
    let ws = Workspace::new();
    let project = ws.create_project("No breakdown").to_string();
    let out = ws
        .keystone()
        .args(["--output", "json", "baseline", "budget", &project])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let err: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(err["kind"], "precondition_failed");
    assert!(err["error"].as_str().unwrap().contains("no breakdown"));
}

#[test]
fn schedule_analysis_without_progress_fails() {
    let ws = Workspace::new();
    let project = ws.create_project("No progress").to_string();
    let file = ws.write("estimate.json", ONE_LINE);
    ws.keystone()
        .args(["estimates", "import"])
        .arg(&file)
        .args(["--project", &project])
        .assert()
        .success();
    ws.keystone()
        .args(["baseline", "regenerate", &project])
        .assert()
        .success();
    ws.keystone()
        .args(["analyze", "schedule", &project])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no progress updates"));
}

#[test]
fn invalid_amount_is_rejected() {
    let ws = Workspace::new();
    let project = ws.create_project("Costs").to_string();
    ws.keystone()
        .args(["track", "actual", &project, "--amount", "-5", "--date", "2024-03-10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("positive"));
}

#[test]
fn malformed_estimate_file_is_rejected() {
    let ws = Workspace::new();
    let file = ws.write("bad.json", "{ not json");
    ws.keystone()
        .args(["estimates", "import"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid estimate JSON"));
}

#[test]
fn quiet_suppresses_error_text() {
    let ws = Workspace::new();
    ws.keystone()
        .args(["--quiet", "analyze", "cost", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 4. Project lifecycle
// ──────────────────────────────────────────────

#[test]
fn status_transitions_follow_lifecycle() {
    let ws = Workspace::new();
    let project = ws.create_project("Lifecycle").to_string();

    ws.keystone()
        .args(["project", "status", &project, "planning"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from pending to planning"));
    ws.keystone()
        .args(["project", "status", &project, "closed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot move from planning to closed"));
    ws.keystone()
        .args(["project", "status", &project, "paused"])
        .assert()
        .failure();
}

#[test]
fn project_list_shows_created_projects() {
    let ws = Workspace::new();
    ws.create_project("Alpha");
    ws.create_project("Beta");
    ws.keystone()
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alpha"))
        .stdout(predicate::str::contains("Beta"))
        .stdout(predicate::str::contains("2 project(s)"));
}

#[test]
fn end_before_start_is_rejected() {
    let ws = Workspace::new();
    ws.keystone()
        .args(["project", "create", "--name", "Backwards"])
        .args(["--start", "2024-06-01", "--end", "2024-05-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("before start date"));
}
