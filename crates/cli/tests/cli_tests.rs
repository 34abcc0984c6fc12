//! CLI integration tests

use std::process::Command;

const TELEMETRY: &str = "\
timestamp,resource_global_name,cpu_utilization,memory_used_bytes,disk_read_bytes,disk_write_bytes,ingress_bytes,egress_bytes,uptime_fraction,cost_usd,sku_description
01-03-2024 00:00,//compute.googleapis.com/projects/demo/zones/us-east1-b/instances/11,0.10,4294967296,100,200,1000,2000,1.0,1.50,E2 Instance Core
01-03-2024 06:00,//compute.googleapis.com/projects/demo/zones/us-east1-b/instances/11,0.30,4294967296,100,200,1000,2000,1.0,2.50,E2 Instance Core
02-03-2024 00:00,//compute.googleapis.com/projects/demo/zones/us-east1-b/instances/11,0.20,4294967296,100,200,1000,2000,1.0,1.00,E2 Instance Core
";

fn vmi(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "insight-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = vmi(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("VM telemetry insight"), "Should show app name");
    assert!(stdout.contains("preprocess"), "Should show preprocess command");
    assert!(stdout.contains("analyze"), "Should show analyze command");
    assert!(stdout.contains("split"), "Should show split command");
    assert!(stdout.contains("recommend"), "Should show recommend command");
    assert!(stdout.contains("alerts"), "Should show alerts command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = vmi(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("vmi"), "Should show binary name");
}

#[test]
fn test_split_help() {
    let output = vmi(&["split", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--test-size"));
    assert!(stdout.contains("--strategy"));
    assert!(stdout.contains("--seed"));
    assert!(stdout.contains("--out-dir"));
}

#[test]
fn test_alerts_help() {
    let output = vmi(&["alerts", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--impact"));
    assert!(stdout.contains("high"));
}

#[test]
fn test_analyze_requires_source() {
    let output = vmi(&["analyze"]);
    assert!(!output.status.success(), "analyze without a source should fail");
}

#[test]
fn test_invalid_strategy() {
    let output = vmi(&["split", "--snapshot", "a.csv", "--out-dir", "out", "--strategy", "stratified"]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_command() {
    let output = vmi(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}

#[test]
fn test_preprocess_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("vm.csv");
    let snapshot = dir.path().join("processed").join("processed_vm_data.csv");
    std::fs::write(&input, TELEMETRY).unwrap();

    let output = vmi(&[
        "--format",
        "json",
        "preprocess",
        "--input",
        input.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["cost_usd_sum"], 4.0);
    assert!(snapshot.exists());
}

#[test]
fn test_analyze_missing_input_fails() {
    let output = vmi(&["analyze", "--input", "/nonexistent/vm.csv"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to load VM telemetry"));
}
