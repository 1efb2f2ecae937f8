//! Human-readable error descriptions and structured JSON error formatting.

use cog_core::error::{BalanceError, BuildError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingChannels => {
                "What happened: No load cell channels were provided to the positioner.\nLikely causes: The HX711 scales failed to initialize or were not wired into the builder.\nHow to fix: Ensure both scales are created and passed via with_channels(...).".to_string()
            }
            BuildError::MissingStepper => {
                "What happened: No stepper lines were provided to the positioner.\nLikely causes: The step/dir/enable pins failed to initialize or were not wired into the builder.\nHow to fix: Ensure the stepper lines are claimed and passed via with_stepper(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BalanceError>() {
        return match be {
            BalanceError::Configuration(msg) => format!(
                "What happened: Configuration problem: {msg}.\nLikely causes: Invalid TOML values, GPIO pins already claimed by another process, or a move requested before setup finished.\nHow to fix: Check [pins] and the other sections of the config, free the pins, then rerun."
            ),
            BalanceError::Calibration(msg) => format!(
                "What happened: Calibration problem: {msg}.\nLikely causes: reference_unit_1/reference_unit_2 left at 0, or a calibration CSV without usable rows.\nHow to fix: Run `cog calibrate --channel N --known-grams G` for each channel and put the results in [calibration] or a CSV."
            ),
            BalanceError::SensorTimeout => {
                "What happened: Load cell read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing hardware.sensor_read_timeout_ms in the config.".to_string()
            }
            BalanceError::NonConvergence { steps, last_diff_g } => format!(
                "What happened: The move did not converge after {steps} steps (last differential {last_diff_g:.2} g).\nLikely causes: Carriage at the end of its rail, a slipping belt, or a target the airframe cannot reach.\nHow to fix: Check the mechanics, pick a smaller offset, or raise control.max_steps."
            ),
            BalanceError::InvalidTarget(mm) => format!(
                "What happened: Offset {mm} mm is outside the allowed range.\nLikely causes: A typo or a value in the wrong unit.\nHow to fix: Use an offset between -100 and 100 mm."
            ),
            BalanceError::Interrupted => {
                "What happened: The move was interrupted.\nLikely causes: Ctrl-C was pressed.\nHow to fix: The carriage stays where it stopped; start a new move when ready.".to_string()
            }
            BalanceError::Hardware(msg) | BalanceError::HardwareFault(msg) => format!(
                "What happened: Hardware error: {msg}.\nLikely causes: Loose wiring, power loss, or GPIO access revoked.\nHow to fix: Check the wiring and power, then rerun setup."
            ),
            BalanceError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: Driver used before initialization.\nHow to fix: Re-run with --log-level=debug for more detail."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Detail: {msg}"
    )
}

/// Stable exit codes per error kind. Clap usage errors exit with 2 before we get here.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    match err.downcast_ref::<BalanceError>() {
        Some(BalanceError::Configuration(_)) => 3,
        Some(BalanceError::Calibration(_)) => 4,
        Some(BalanceError::SensorTimeout) => 5,
        Some(BalanceError::NonConvergence { .. }) => 6,
        Some(BalanceError::InvalidTarget(_)) => 7,
        Some(BalanceError::Interrupted) => 130,
        _ => 1,
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Configuration";
    }
    match err.downcast_ref::<BalanceError>() {
        Some(BalanceError::Configuration(_)) => "Configuration",
        Some(BalanceError::Calibration(_)) => "Calibration",
        Some(BalanceError::SensorTimeout) => "SensorTimeout",
        Some(BalanceError::NonConvergence { .. }) => "NonConvergence",
        Some(BalanceError::InvalidTarget(_)) => "InvalidTarget",
        Some(BalanceError::Interrupted) => "Interrupted",
        Some(BalanceError::Hardware(_) | BalanceError::HardwareFault(_)) => "Hardware",
        Some(BalanceError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<BalanceError>() {
        Some(BalanceError::NonConvergence { steps, last_diff_g }) => {
            Some(json!({ "steps": steps, "last_diff_g": last_diff_g }))
        }
        Some(BalanceError::InvalidTarget(mm)) => Some(json!({ "offset_mm": mm })),
        _ => None,
    };

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "chain": format!("{err:#}"),
    });
    if let Some(d) = details {
        obj["details"] = d;
    }
    obj.to_string()
}
