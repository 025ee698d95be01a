//! CLI tests for `pw validate` and `pw repair`

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn document() -> Value {
    json!({
        "request": "Add an export command",
        "feature_groups": [{
            "name": "Export",
            "description": "CSV export",
            "features": [{
                "name": "CSV writer",
                "description": "Write rows as CSV",
                "complexity_level": 0,
                "files_affected": ["src/export.rs"],
                "implementation_steps": [{"step_id": "S1", "description": "Write header and rows"}],
                "test_requirements": {"unit_tests": [{"name": "quotes commas", "description": "Fields with commas are quoted"}]},
                "dependencies": {"internal": [], "external": ["csv"], "features": []},
                "risk_assessment": {"critical_files": [], "potential_regressions": [], "mitigations": [], "security_concerns": []},
                "system_design": {"overview": "Streaming writer", "code_elements": [], "data_flow": [], "key_algorithms": []}
            }]
        }]
    })
}

/// `pw` isolated from the user's config and data directories
fn pw(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pw").expect("binary built");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"));
    cmd
}

fn write(dir: &Path, name: &str, doc: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
    path
}

#[test]
fn test_validate_valid_document() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "plan.json", &document());

    pw(temp_dir.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found."));
}

#[test]
fn test_validate_reports_violations() {
    let temp_dir = TempDir::new().unwrap();
    let mut doc = document();
    doc["feature_groups"][0]["features"][0]["dependencies"]["features"] =
        json!([{"feature": "Missing feature", "relation": "requires"}]);
    doc["feature_groups"][0]["features"][0]["implementation_steps"][0]["description"] = json!("rm -rf ./out first");
    let path = write(temp_dir.path(), "plan.json", &doc);

    pw(temp_dir.path())
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("reference-integrity (1):"))
        .stdout(predicate::str::contains("content-safety (1):"))
        .stdout(predicate::str::contains("Missing feature"));
}

#[test]
fn test_validate_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    std::fs::write(&path, "not json").unwrap();

    let output = pw(temp_dir.path())
        .args(["validate", "--format", "json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], json!(false));
    assert_eq!(report["counts"]["schema-structure"], json!(1));
}

#[test]
fn test_repair_writes_fixed_document() {
    let temp_dir = TempDir::new().unwrap();
    let mut doc = document();
    doc["feature_groups"][0]["features"][0]
        .as_object_mut()
        .unwrap()
        .remove("risk_assessment");
    let input = write(temp_dir.path(), "plan.json", &doc);
    let output = temp_dir.path().join("fixed.json");

    pw(temp_dir.path())
        .arg("repair")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("risk_assessment"));

    pw(temp_dir.path()).arg("validate").arg(&output).assert().success();
}
