use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const HEADER: [&str; 9] = [
    "op", "actor", "salon", "target", "value", "date", "time", "services", "at",
];

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("robustness_test.csv");
    let mut wtr = csv::Writer::from_path(&output_path).unwrap();
    wtr.write_record(HEADER).unwrap();

    // Valid check-in
    wtr.write_record(["checkin", "alice", "downtown", "t1", "", "", "", "", ""])
        .unwrap();
    // Unknown op
    wtr.write_record(["teleport", "alice", "downtown", "", "", "", "", "", ""])
        .unwrap();
    // Unparseable timestamp
    wtr.write_record(["checkin", "bob", "downtown", "", "", "", "", "", "yesterday"])
        .unwrap();
    // Valid check-in again
    wtr.write_record(["checkin", "carol", "downtown", "t3", "", "", "", "", ""])
        .unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("salon-queue"));
    cmd.arg(&output_path)
        .arg("--config")
        .arg("tests/fixtures/salons.toml");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains("2,checkin,ok,,ticket=1"))
        .stdout(predicate::str::contains("5,checkin,ok,,ticket=2 position=2"))
        .stdout(predicate::str::contains("teleport").not());
}

#[test]
fn test_invalid_values_are_reported_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("data_type_test.csv");
    let mut wtr = csv::Writer::from_path(&output_path).unwrap();
    wtr.write_record(HEADER).unwrap();

    // Delta is not a number
    wtr.write_record(["adjust", "desk", "downtown", "", "lots", "", "", "", ""])
        .unwrap();
    // Delta out of range
    wtr.write_record(["adjust", "desk", "downtown", "", "+2", "", "", "", ""])
        .unwrap();
    // Rating out of range
    wtr.write_record(["rate", "alice", "downtown", "", "9", "", "", "", ""])
        .unwrap();
    // Valid adjustment
    wtr.write_record(["adjust", "desk", "downtown", "", "+1", "", "", "", ""])
        .unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("salon-queue"));
    cmd.arg(&output_path)
        .arg("--config")
        .arg("tests/fixtures/salons.toml");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2,adjust,rejected,ERR_INVALID_ARGUMENT,"))
        .stdout(predicate::str::contains("3,adjust,rejected,ERR_INVALID_ARGUMENT,"))
        .stdout(predicate::str::contains("4,rate,rejected,ERR_INVALID_ARGUMENT,"))
        .stdout(predicate::str::contains("5,adjust,ok,,queue=1"));
}
