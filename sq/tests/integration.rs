//! Integration tests for sq CLI.

use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::{json, Value};
use tempfile::TempDir;

fn sq_cmd(sift_root: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sq"));
    cmd.env("SIFT_ROOT", sift_root);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_compile_expr() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "-f", "json", "-e", r#"{"platform": ["snowflake"]}"#])
        .output()
        .expect("failed to run sq compile");

    assert!(output.status.success(), "sq compile failed: {:?}", output);
    assert_eq!(
        stdout_json(&output),
        json!({
            "types": null,
            "orFilters": [{"and": [
                {"field": "platform.keyword", "condition": "EQUAL", "values": ["urn:li:dataPlatform:snowflake"]},
                {"field": "removed", "condition": "EQUAL", "values": ["true"], "negated": true}
            ]}]
        })
    );
}

#[test]
fn test_compile_env_expands_to_two_clauses() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args([
            "c",
            "-e",
            r#"{"and": [{"entity_type": "dataset"}, {"env": "PROD"}]}"#,
        ])
        .output()
        .expect("failed to run sq c");

    assert!(output.status.success(), "sq c failed: {:?}", output);
    let payload = stdout_json(&output);
    assert_eq!(payload["types"], json!(["DATASET"]));
    let clauses = payload["orFilters"].as_array().unwrap();
    assert_eq!(clauses.len(), 2);
    assert_eq!(clauses[0]["and"][1]["field"], "origin");
    assert_eq!(clauses[1]["and"][1]["field"], "env");
}

#[test]
fn test_compile_no_default_status() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "--no-default-status", "-f", "json", "-e", r#"{"env": "PROD"}"#])
        .output()
        .expect("failed to run sq compile");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("removed"));
}

#[test]
fn test_compile_clauses_format() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "-f", "clauses", "-e", r#"{"not": {"platform": "snowflake"}}"#])
        .output()
        .expect("failed to run sq compile");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("types: (any)"));
    assert!(stdout.contains("clause 1:"));
    assert!(stdout.contains("NOT platform.keyword EQUAL [urn:li:dataPlatform:snowflake]"));
    assert!(stdout.contains("NOT removed EQUAL [true]"));
}

#[test]
fn test_compile_unknown_format_fails() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "-f", "xml", "-e", r#"{"env": "PROD"}"#])
        .output()
        .expect("failed to run sq compile");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown format 'xml'"));
}

#[test]
fn test_invalid_domain_urn_fails() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "-e", r#"{"domain": ["marketing"]}"#])
        .output()
        .expect("failed to run sq compile");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error: "), "stderr: {}", stderr);
    assert!(stderr.contains("Invalid URN for domain"), "stderr: {}", stderr);
}

#[test]
fn test_unsupported_negation_fails() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "-e", r#"{"not": {"env": "PROD"}}"#])
        .output()
        .expect("failed to run sq compile");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("Cannot negate a filter with multiple OR clauses"));
}

#[test]
fn test_compile_yaml_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("filter.yaml");
    std::fs::write(
        &path,
        "and:\n  - entity_type: [dataset]\n  - platform: [snowflake, bigquery]\n  - status: ALL\n",
    )
    .unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "-f", "json"])
        .arg(&path)
        .output()
        .expect("failed to run sq compile");

    assert!(output.status.success(), "sq compile failed: {:?}", output);
    let payload = stdout_json(&output);
    assert_eq!(payload["types"], json!(["DATASET"]));
    let clause = payload["orFilters"][0]["and"].as_array().unwrap();
    assert_eq!(clause.len(), 2);
    assert_eq!(
        clause[1]["values"],
        json!(["urn:li:dataPlatform:snowflake", "urn:li:dataPlatform:bigquery"])
    );
}

#[test]
fn test_compile_json_file_syntax_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("filter.json");
    std::fs::write(&path, r#"{"env": ["PROD"]"#).unwrap();

    let output = sq_cmd(tmp.path())
        .arg("compile")
        .arg(&path)
        .output()
        .expect("failed to run sq compile");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("JSON error"));
}

#[test]
fn test_compile_from_stdin() {
    let tmp = TempDir::new().unwrap();

    let mut child = sq_cmd(tmp.path())
        .args(["compile", "-f", "json", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn sq compile");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"entity_subtype: Table\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "sq compile failed: {:?}", output);
    let payload = stdout_json(&output);
    assert_eq!(payload["orFilters"][0]["and"][0]["field"], "typeNames");
}

#[test]
fn test_fingerprint_is_stable() {
    let tmp = TempDir::new().unwrap();

    let run = |expr: &str| {
        let output = sq_cmd(tmp.path())
            .args(["compile", "--fingerprint", "-e", expr])
            .output()
            .expect("failed to run sq compile");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    let a = run(r#"{"platform": ["snowflake"]}"#);
    let b = run(r#"{"platform": "urn:li:dataPlatform:snowflake"}"#);
    assert_eq!(a.len(), 64);
    assert_eq!(a, b);
    assert_ne!(a, run(r#"{"platform": ["bigquery"]}"#));
}

#[test]
fn test_check_prints_canonical_form() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["check", "-e", r#"{"and": [{"env": "PROD"}, {"entity_type": "dataset"}]}"#])
        .output()
        .expect("failed to run sq check");

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({"and": [{"env": ["PROD"]}, {"entity_type": ["dataset"]}]})
    );
}

#[test]
fn test_check_reports_validation_path() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["check", "-e", r#"{"and": [{"bogus": 1}]}"#])
        .output()
        .expect("failed to run sq check");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("$.and[0]"));
}

#[test]
fn test_preset_lifecycle() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["preset", "add", "warehouse", "-e", r#"{"platform": ["snowflake", "bigquery"]}"#])
        .output()
        .expect("failed to run sq preset add");
    assert!(output.status.success(), "sq preset add failed: {:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Added preset: warehouse"));
    assert!(tmp.path().join("config.toml").exists());

    // Adding again without --force is refused
    let output = sq_cmd(tmp.path())
        .args(["preset", "add", "warehouse", "-e", r#"{"env": "PROD"}"#])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));

    let output = sq_cmd(tmp.path())
        .args(["preset", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("warehouse"));
    assert!(stdout.contains("urn:li:dataPlatform:snowflake") || stdout.contains("snowflake"));

    let output = sq_cmd(tmp.path())
        .args(["preset", "show", "warehouse"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({"platform": ["snowflake", "bigquery"]})
    );

    let output = sq_cmd(tmp.path())
        .args(["compile", "-f", "json", "--preset", "warehouse"])
        .output()
        .unwrap();
    assert!(output.status.success(), "sq compile --preset failed: {:?}", output);
    assert_eq!(
        stdout_json(&output)["orFilters"][0]["and"][0]["field"],
        "platform.keyword"
    );

    let output = sq_cmd(tmp.path())
        .args(["preset", "remove", "warehouse"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let output = sq_cmd(tmp.path())
        .args(["preset", "list"])
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&output.stdout).contains("No presets found."));
}

#[test]
fn test_preset_add_rejects_unnegatable_filter() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["preset", "add", "bad", "-e", r#"{"not": {"or": [{"env": "PROD"}]}}"#])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!tmp.path().join("config.toml").exists());
}

#[test]
fn test_missing_preset_fails() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path())
        .args(["compile", "--preset", "nope"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not found: preset 'nope'"));
}

#[test]
fn test_quick_help() {
    let tmp = TempDir::new().unwrap();

    let output = sq_cmd(tmp.path()).arg("?").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("SQ QUICK REFERENCE"));
}
