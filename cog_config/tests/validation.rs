use cog_config::load_toml;
use rstest::rstest;

const FULL: &str = r#"
[pins]
stepper_step = 17
stepper_dir = 27
stepper_enable = 22
load_cell_1_dt = 5
load_cell_1_sck = 6
load_cell_2_dt = 23
load_cell_2_sck = 24

[calibration]
reference_unit_1 = 420.0
reference_unit_2 = -415.5

[sampling]
sample_count = 5
tare_samples = 15

[control]
tolerance_g = 1.0
grams_per_mm = 0.8
max_steps = 4000
resample_every = 2

[stepper]
dwell_us = 100000
enable_active_low = true

[hardware]
sensor_read_timeout_ms = 500
gain_pulses = 25

[logging]
level = "debug"
rotation = "daily"
"#;

#[test]
fn full_config_parses_and_validates() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.control.grams_per_mm, 0.8);
    assert_eq!(cfg.control.resample_every, 2);
    assert_eq!(cfg.calibration.reference_unit_2, -415.5);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[test]
fn empty_config_uses_reference_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.pins.stepper_step, 17);
    assert_eq!(cfg.pins.load_cell_2_sck, 24);
    assert_eq!(cfg.sampling.sample_count, 5);
    assert_eq!(cfg.control.tolerance_g, 1.0);
    assert_eq!(cfg.stepper.dwell_us, 100_000);
    // Uncalibrated until the operator supplies counts per gram
    assert_eq!(cfg.calibration.reference_unit_1, 0.0);
}

#[rstest]
#[case("[pins]\nload_cell_2_dt = 5\n", "share gpio 5")]
#[case("[pins]\nstepper_step = 40\n", "not a valid bcm gpio")]
#[case("[sampling]\nsample_count = 0\n", "sampling.sample_count must be in 1..=1000")]
#[case("[sampling]\ntare_samples = 0\n", "sampling.tare_samples must be in 1..=1000")]
#[case("[sampling]\nsample_count = 1001\n", "sampling.sample_count must be in 1..=1000")]
#[case("[sampling]\ntare_samples = 5000\n", "sampling.tare_samples must be in 1..=1000")]
#[case("[control]\ntolerance_g = 0.0\n", "control.tolerance_g must be > 0")]
#[case("[control]\ngrams_per_mm = -1.0\n", "control.grams_per_mm must be > 0")]
#[case("[control]\nmax_steps = 0\n", "control.max_steps must be >= 1")]
#[case("[control]\nresample_every = 0\n", "control.resample_every must be >= 1")]
#[case("[stepper]\ndwell_us = 0\n", "stepper.dwell_us must be >= 1")]
#[case("[hardware]\ngain_pulses = 24\n", "gain_pulses must be 25, 26 or 27")]
#[case("[hardware]\nsensor_read_timeout_ms = 0\n", "sensor_read_timeout_ms must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
#[case("[simulation]\ngrams_per_step = 0.0\n", "simulation.grams_per_step")]
#[case("[simulation]\nnoise_g = -0.1\n", "simulation.noise_g")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").to_lowercase().contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn unknown_types_fail_to_parse() {
    assert!(load_toml("[control]\nmax_steps = \"many\"\n").is_err());
}
