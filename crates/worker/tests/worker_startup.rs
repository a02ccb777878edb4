use std::io::Write;
use std::process::Stdio;

use tempfile::NamedTempFile;

/// Create a minimal valid config
fn minimal_config(scratch_root: &std::path::Path) -> String {
    format!(
        r#"
[storage]
endpoint = "http://127.0.0.1:9000"

[stream]
endpoint = "http://127.0.0.1:7000"

[runner]
scratch_root = "{}"
"#,
        scratch_root.display()
    )
}

/// Run the worker binary to completion and capture its output
async fn run_worker(config_path: &std::path::Path, args: &[&str]) -> std::process::Output {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_gristmill"))
        .args(args)
        .env("GRISTMILL_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .expect("Failed to run worker")
}

fn temp_config(scratch_root: &std::path::Path) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(minimal_config(scratch_root).as_bytes())
        .unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[tokio::test]
async fn test_probe_reports_resources() {
    let scratch = tempfile::tempdir().unwrap();
    let config = temp_config(scratch.path());

    let output = run_worker(config.path(), &["probe"]).await;

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["cpu_cores"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_clear_scratch_empties_root() {
    let scratch = tempfile::tempdir().unwrap();
    std::fs::create_dir(scratch.path().join("stale-run")).unwrap();
    std::fs::write(scratch.path().join("stale-run/out.txt"), b"junk").unwrap();
    let config = temp_config(scratch.path());

    let output = run_worker(config.path(), &["clear-scratch"]).await;

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["entries_removed"], 1);
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_missing_batch_file_fails() {
    let scratch = tempfile::tempdir().unwrap();
    let config = temp_config(scratch.path());

    let output = run_worker(config.path(), &["/nonexistent/batch.jsonl"]).await;

    assert!(!output.status.success());
}

#[tokio::test]
async fn test_invalid_config_fails() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"[storage]\nendpoint = \"not-a-url\"\n\n[stream]\nendpoint = \"http://127.0.0.1:7000\"\n")
        .unwrap();
    temp_file.flush().unwrap();

    let output = run_worker(temp_file.path(), &["probe"]).await;

    assert!(!output.status.success());
}
