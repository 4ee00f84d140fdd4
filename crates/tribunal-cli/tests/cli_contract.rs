#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const SUITE: &str = r#"
version: 1
run:
  max_concurrency: 2
datasets:
  - name: greetings
    judge: { type: simple }
    cases:
      - { id: hello, input: "Say hi", criteria: "greets the user", expected: "Hi!", category: smoke }
      - { id: bye, input: "Say bye", criteria: "says goodbye", expected: "Bye!" }
"#;

fn tribunal() -> Command {
    let mut cmd = Command::cargo_bin("tribunal").unwrap();
    cmd.env_remove("TRIBUNAL_JUDGE").env_remove("OPENAI_API_KEY");
    cmd
}

fn write_suite(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("suite.yaml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn validate_accepts_good_suite() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    tribunal()
        .args(["validate", "--config"])
        .arg(&path)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("1 datasets, 2 cases"));
}

#[test]
fn validate_rejects_unknown_version() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), "version: 9\ndatasets: []\n");
    tribunal()
        .args(["validate", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported config version 9"));
}

#[test]
fn passing_fake_run_exits_zero_and_writes_json() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    let out = dir.path().join("summary.json");
    tribunal()
        .args(["run", "--config"])
        .arg(&path)
        .arg("--json")
        .arg(&out)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("Results: 2 passed, 0 failed, 0 errors"));

    let v: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(v["status"], "completed");
    assert_eq!(v["metrics"]["total"], 2);
    assert_eq!(v["results"].as_array().unwrap().len(), 2);
}

#[test]
fn failing_fake_run_exits_one() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    tribunal()
        .args(["run", "--sequential", "--fake-response", "NO\nnot good enough", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("greetings/hello"));
}

#[test]
fn category_flag_filters_cases() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    tribunal()
        .args(["run", "--category", "smoke", "--config"])
        .arg(&path)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("(1 total"));
}

#[test]
fn empty_selection_is_a_failed_run() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    tribunal()
        .args(["run", "--category", "missing", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no eligible cases"));
}

#[test]
fn openai_without_key_is_config_error() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    tribunal()
        .args(["run", "--judge", "openai", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn malformed_fake_answer_is_error_status() {
    let dir = tempdir().unwrap();
    let path = write_suite(dir.path(), SUITE);
    tribunal()
        .args(["run", "--fake-response", "MAYBE", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("0 failed, 2 errors"));
}
