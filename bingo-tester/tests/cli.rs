use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "bingo-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_bingo-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("first-row"));
    std::fs::remove_file(output_path).ok();
}

#[test]
fn cli_runs_scenarios_and_writes_json() {
    let exe = env!("CARGO_BIN_EXE_bingo-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "first-row,reward-wrap,unknown-one",
            "--iterations",
            "2",
            "--seeds",
            "1,0x10",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown scenario"));

    let content = std::fs::read_to_string(&output_path).expect("read output");
    let results: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let runs = results.as_array().expect("array of results");
    assert_eq!(runs.len(), 4);
    assert!(runs.iter().all(|run| run["passed"] == true));
    assert!(runs.iter().any(|run| run["seed"] == 16));
    std::fs::remove_file(output_path).ok();
}

#[test]
fn cli_rejects_bad_seeds() {
    let exe = env!("CARGO_BIN_EXE_bingo-tester");
    let output = Command::new(exe)
        .args(["--seeds", "banana", "--scenarios", "first-row"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}
