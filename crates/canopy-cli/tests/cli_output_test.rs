//! Integration tests for the canopy binary
//!
//! These tests run the built binary and check exit codes and JSON output.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn canopy_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove 'deps' directory
    path.push("canopy");
    path
}

/// Run in an empty directory with no CANOPY_* variables set
fn canopy(dir: &TempDir, args: &[&str]) -> Output {
    let mut command = Command::new(canopy_bin());
    command.current_dir(dir.path()).args(args);
    for (key, _) in std::env::vars() {
        if key.starts_with("CANOPY_") {
            command.env_remove(key);
        }
    }
    command.output().expect("Failed to execute command")
}

fn parse_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_config_json_lists_sources() {
    let dir = TempDir::new().unwrap();
    let output = canopy(&dir, &["config", "--json"]);
    assert!(output.status.success(), "Command should succeed");

    let parsed = parse_stdout(&output);
    assert_eq!(parsed["status"], "success");

    let entries = parsed["data"].as_array().expect("data should be an array");
    let crs = entries
        .iter()
        .find(|e| e["key"] == "planar_crs")
        .expect("planar_crs entry");
    assert_eq!(crs["value"], "EPSG:32749");
    assert_eq!(crs["source"], "Default");

    let key = entries.iter().find(|e| e["key"] == "alerts_api_key").unwrap();
    assert_eq!(key["value"], "(unset)");
}

#[test]
fn test_config_file_is_reported_as_source() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("canopy.toml"), "footprint_shape = \"circle\"\n").unwrap();

    let output = canopy(&dir, &["config", "--json"]);
    let parsed = parse_stdout(&output);

    let shape = parsed["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["key"] == "footprint_shape")
        .cloned()
        .unwrap();
    assert_eq!(shape["value"], "Circle");
    assert_eq!(shape["source"], "File");
}

#[test]
fn test_run_without_api_key_fails() {
    let dir = TempDir::new().unwrap();
    let output = canopy(&dir, &["run", "--start", "2025-07-01", "--end", "2025-10-01", "--dry-run"]);

    assert!(!output.status.success(), "Run without an API key should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CANOPY_API_KEY"), "stderr was: {}", stderr);
}

#[test]
fn test_run_rejects_inverted_dates() {
    let dir = TempDir::new().unwrap();
    let output = canopy(&dir, &["run", "--start", "2025-10-01", "--end", "2025-07-01"]);
    assert!(!output.status.success());
}

#[test]
fn test_bad_layer_spec_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = canopy(
        &dir,
        &["run", "--start", "2025-07-01", "--end", "2025-10-01", "--layer", "admin.geojson"],
    );
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cluster_local_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("alerts.json");
    std::fs::write(
        &input,
        r#"[
            {"longitude": 110.20000, "latitude": 0.70000, "observed_at": "2025-07-14", "owner": "PT Alpha"},
            {"longitude": 110.20005, "latitude": 0.70000, "observed_at": "2025-07-15", "owner": "PT Alpha"},
            {"longitude": 110.30000, "latitude": 0.80000, "observed_at": "2025-07-14", "owner": "PT Beta"}
        ]"#,
    )
    .unwrap();

    let output = canopy(&dir, &["cluster", "alerts.json", "--json", "--rows"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let data = &parse_stdout(&output)["data"];
    assert_eq!(data["alerts"], 3);
    assert_eq!(data["planar_crs"], "EPSG:32749");

    let clusters = data["clusters"].as_array().unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0]["cluster_id"], "1");
    assert_eq!(clusters[0]["points"], 2);
    let merged = clusters[0]["area_m2"].as_f64().unwrap();
    assert!(merged > 125.44 && merged < 250.88);
    assert_eq!(clusters[1]["area_m2"], 125.44);

    let rows = data["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["owner"], "PT Beta");
    assert_eq!(rows[2]["cluster_id"], "2");
    assert_eq!(rows[2]["point_count_in_cluster"], 1);
}

#[test]
fn test_cluster_rejects_malformed_input() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("alerts.json"), "{\"longitude\": 1}").unwrap();

    let output = canopy(&dir, &["cluster", "alerts.json"]);
    assert!(!output.status.success());
}
