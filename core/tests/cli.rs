use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../tests/fixtures")
        .join(name)
}

fn synap_rs() -> Command {
    Command::new(env!("CARGO_BIN_EXE_synap-rs"))
}

#[test]
fn infer_command_reports_and_dumps_outputs() -> Result<()> {
    let out_dir = tempfile::tempdir()?;
    let output = synap_rs()
        .args(["infer", "--backend", "simulated", "-m"])
        .arg(fixture("invert_model.synap"))
        .args(["-i", "value:1", "-i", "zero:2", "-o", "4", "-o", "6", "-r", "3"])
        .arg("--dump-raw")
        .arg("--output-dir")
        .arg(out_dir.path())
        .output()
        .context("Failed to run synap-rs")?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["backend"], "simulated");
    assert_eq!(report["repeat"], 3);
    assert_eq!(report["inputs"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["outputs"][1]["size"], 6);
    assert!(report["timings_ms"]["mean"].is_number());

    let raw0 = std::fs::read(out_dir.path().join("output_raw_0.dat"))?;
    assert_eq!(raw0, vec![0xfe, 0xff, 0xff, 0xff]);
    let raw1 = std::fs::read(out_dir.path().join("output_raw_1.dat"))?;
    assert_eq!(raw1, vec![0xff; 6]);
    Ok(())
}

#[test]
fn infer_command_fails_on_missing_model() -> Result<()> {
    let output = synap_rs()
        .args(["infer", "--backend", "sim", "-m", "/nonexistent/model.synap"])
        .output()?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn check_command_with_lock() -> Result<()> {
    let output = synap_rs()
        .args(["check", "--backend", "simulated", "--lock"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("NPU lock: OK"));
    assert!(stdout.contains("Status: OK"));
    Ok(())
}
