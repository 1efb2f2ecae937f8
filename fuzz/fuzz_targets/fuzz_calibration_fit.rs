#![no_main]
use cog_config::CalibrationRow;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|rows: Vec<(i64, f32)>| {
    let rows: Vec<CalibrationRow> = rows
        .into_iter()
        .map(|(raw, grams)| CalibrationRow {
            channel: 1,
            raw,
            grams,
        })
        .collect();
    // An accepted fit is always usable as a reference unit.
    if let Ok(unit) = cog_config::fit_reference_unit(&rows) {
        assert!(unit.is_finite() && unit != 0.0);
    }
});
