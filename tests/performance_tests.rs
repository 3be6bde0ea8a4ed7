use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_large_script_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("large_test.csv");
    common::generate_script(&output_path, 20_000, 1).expect("Failed to generate large script");

    let status = Command::new(cargo_bin!("salon-queue"))
        .arg(&output_path)
        .arg("--config")
        .arg("tests/fixtures/salons.toml")
        .stdout(std::process::Stdio::null())
        .status()
        .expect("Failed to execute command");
    assert!(status.success(), "Binary failed to process large script");
}

#[test]
fn test_large_script_streaming_db() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("large_test.csv");
    common::generate_script(&output_path, 20_000, 2).expect("Failed to generate large script");

    let status = Command::new(cargo_bin!("salon-queue"))
        .arg(&output_path)
        .arg("--config")
        .arg("tests/fixtures/salons.toml")
        .arg("--db-path")
        .arg(dir.path().join("test_db"))
        .stdout(std::process::Stdio::null())
        .status()
        .expect("Failed to execute command");
    assert!(status.success(), "Binary failed to process large script");
}
