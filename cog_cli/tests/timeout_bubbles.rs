use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[rstest]
fn hx711_timeout_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let toml = r#"
[calibration]
reference_unit_1 = 420.0
reference_unit_2 = 420.0

[stepper]
dwell_us = 1

[hardware]
sensor_read_timeout_ms = 50
"#;
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("cog").unwrap();
    cmd.env("COG_SIM_TIMEOUT", "1");
    cmd.arg("--config")
        .arg(&cfg)
        .arg("goto")
        .arg("--offset")
        .arg("0");
    cmd.assert()
        .code(5)
        .stderr(predicate::str::contains(
            "What happened: Load cell read timed out",
        ));
}
