// ABOUTME: End-to-end CLI tests exercising the compiled binary.
// ABOUTME: Covers init, dry-run planning, validation exit codes, and history.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn convoy() -> Command {
    Command::cargo_bin("convoy").expect("binary should build")
}

fn write_manifest(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("convoy.yml");
    std::fs::write(&path, yaml).unwrap();
    path
}

const SMALL_PLATFORM: &str = r#"
defaults:
  LOG_LEVEL: info

units:
  - name: db
    kind: infrastructure
    resource: {kind: postgres, name: platform-db}
    produces: [DATABASE_HOST]
    start: ["up", "db"]
    probe: {tcp: "localhost:5432"}
  - name: api
    kind: service
    depends_on: [db]
    requires: [DATABASE_HOST, LOG_LEVEL]
    start: ["up", "api"]
    probe: {http: "http://localhost:8080/health"}
"#;

#[test]
fn init_writes_starter_manifest() {
    let dir = TempDir::new().unwrap();

    convoy()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("convoy.yml"));

    let written = std::fs::read_to_string(dir.path().join("convoy.yml")).unwrap();
    assert!(written.contains("units:"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "units: []");

    convoy()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already exists"));

    convoy()
        .current_dir(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn dry_run_prints_batches_and_resolved_configs() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, SMALL_PLATFORM);

    convoy()
        .args(["deploy", "--dry-run", "--manifest"])
        .arg(&manifest)
        .env_remove("LOG_LEVEL")
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch 0: db"))
        .stdout(predicate::str::contains("Batch 1: api"))
        .stdout(predicate::str::contains("LOG_LEVEL=info"));
}

#[test]
fn dry_run_applies_set_overrides() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, SMALL_PLATFORM);

    convoy()
        .args(["deploy", "--dry-run", "--set", "LOG_LEVEL=debug", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("LOG_LEVEL=debug"));
}

#[test]
fn cyclic_manifest_fails_validation() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
units:
  - name: a
    kind: service
    depends_on: [b]
    start: ["up", "a"]
    probe: {tcp: "localhost:1"}
  - name: b
    kind: service
    depends_on: [a]
    start: ["up", "b"]
    probe: {tcp: "localhost:2"}
"#,
    );

    convoy()
        .args(["deploy", "--dry-run", "--manifest"])
        .arg(&manifest)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("dependency cycle"));
}

#[test]
fn unsatisfiable_required_key_fails_validation() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
units:
  - name: api
    kind: service
    requires: [API_TOKEN]
    start: ["up", "api"]
    probe: {tcp: "localhost:8080"}
"#,
    );

    convoy()
        .args(["deploy", "--dry-run", "--manifest"])
        .arg(&manifest)
        .env_remove("API_TOKEN")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("API_TOKEN"));
}

#[test]
fn malformed_set_pair_is_rejected() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, SMALL_PLATFORM);

    convoy()
        .args(["deploy", "--dry-run", "--set", "NOT_A_PAIR", "--manifest"])
        .arg(&manifest)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn missing_manifest_is_reported() {
    let dir = TempDir::new().unwrap();

    convoy()
        .current_dir(dir.path())
        .args(["deploy", "--dry-run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn history_with_no_runs_is_empty_success() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, SMALL_PLATFORM);

    convoy()
        .current_dir(dir.path())
        .args(["history", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("No recorded runs"));
}
