#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration parsing for the CoG balancer.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The calibration CSV loader enforces headers and fits a per-channel
//!   reference unit (counts per gram) by least squares.
use serde::Deserialize;

/// Upper bound on raw reads combined into one weight or tare.
pub const MAX_SAMPLES: usize = 1_000;

/// Calibration CSV schema.
///
/// Expected headers:
/// channel,raw,grams
///
/// Example:
/// channel,raw,grams
/// 1,8000,0.0
/// 1,50000,100.0
/// 2,-3000,0.0
/// 2,39500,100.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub channel: u8,
    pub raw: i64,
    pub grams: f32,
}

/// BCM pin numbers. Defaults follow the reference wiring
/// (TMC2225 STEP/DIR/EN on 17/27/22, HX711 #1 on 5/6, HX711 #2 on 23/24).
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    pub stepper_step: u8,
    pub stepper_dir: u8,
    pub stepper_enable: u8,
    pub load_cell_1_dt: u8,
    pub load_cell_1_sck: u8,
    pub load_cell_2_dt: u8,
    pub load_cell_2_sck: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            stepper_step: 17,
            stepper_dir: 27,
            stepper_enable: 22,
            load_cell_1_dt: 5,
            load_cell_1_sck: 6,
            load_cell_2_dt: 23,
            load_cell_2_sck: 24,
        }
    }
}

impl Pins {
    fn all(&self) -> [(&'static str, u8); 7] {
        [
            ("stepper_step", self.stepper_step),
            ("stepper_dir", self.stepper_dir),
            ("stepper_enable", self.stepper_enable),
            ("load_cell_1_dt", self.load_cell_1_dt),
            ("load_cell_1_sck", self.load_cell_1_sck),
            ("load_cell_2_dt", self.load_cell_2_dt),
            ("load_cell_2_sck", self.load_cell_2_sck),
        ]
    }
}

/// Per-channel calibration divisors in raw counts per gram.
/// 0.0 means "not calibrated yet" and is rejected when the positioner is set up.
#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct CalibrationCfg {
    pub reference_unit_1: f32,
    pub reference_unit_2: f32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SamplingCfg {
    /// Raw reads averaged per weight query.
    pub sample_count: usize,
    /// Raw reads averaged when capturing the tare baseline.
    pub tare_samples: usize,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_count: 5,
            tare_samples: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ControlCfg {
    /// Centering is done once |weight1 - weight2| drops below this many grams.
    pub tolerance_g: f32,
    /// Grams of differential per millimeter of requested offset.
    pub grams_per_mm: f32,
    /// Step budget for one move before it is declared non-convergent.
    pub max_steps: u32,
    /// Re-read both channels after this many steps.
    pub resample_every: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tolerance_g: 1.0,
            grams_per_mm: 1.0,
            max_steps: 5_000,
            resample_every: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StepperCfg {
    /// Hold time for each half of a step pulse, in microseconds.
    pub dwell_us: u64,
    /// Driver enable input is active low (TMC2225).
    pub enable_active_low: bool,
}

impl Default for StepperCfg {
    fn default() -> Self {
        Self {
            dwell_us: 100_000,
            enable_active_low: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready (DT low) before failing
    pub sensor_read_timeout_ms: u64,
    /// Total SCK pulses per HX711 read: 25 (A/128), 26 (B/32) or 27 (A/64)
    pub gain_pulses: u8,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 500,
            gain_pulses: 25,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the simulated rig used when built without `hardware`.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Simulation {
    /// Static load placed on channel 1 after taring.
    pub load_1_g: f32,
    /// Static load placed on channel 2 after taring.
    pub load_2_g: f32,
    pub grams_per_step: f32,
    pub counts_per_gram: f32,
    pub noise_g: f32,
    pub rail_steps: i32,
    pub seed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            load_1_g: 0.0,
            load_2_g: 0.0,
            grams_per_step: 0.25,
            counts_per_gram: 420.0,
            noise_g: 0.0,
            rail_steps: 2_000,
            seed: 7,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub sampling: SamplingCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub stepper: StepperCfg,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Reference units fitted from a calibration CSV; channels absent from the
/// file are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FittedCalibration {
    pub reference_unit_1: Option<f32>,
    pub reference_unit_2: Option<f32>,
}

impl FittedCalibration {
    /// Apply fitted values on top of the configured ones.
    pub fn merged_into(self, cfg: CalibrationCfg) -> CalibrationCfg {
        CalibrationCfg {
            reference_unit_1: self.reference_unit_1.unwrap_or(cfg.reference_unit_1),
            reference_unit_2: self.reference_unit_2.unwrap_or(cfg.reference_unit_2),
        }
    }
}

/// Fit counts-per-gram for one channel: ordinary least squares of raw counts
/// against grams, returning the slope.
pub fn fit_reference_unit(rows: &[CalibrationRow]) -> eyre::Result<f32> {
    if rows.len() < 2 {
        eyre::bail!("calibration requires at least two rows, got {}", rows.len());
    }

    // Raw values must be strictly monotonic, no duplicates
    let mut dir: i8 = 0;
    for i in 1..rows.len() {
        let step_dir = match rows[i].raw.cmp(&rows[i - 1].raw) {
            std::cmp::Ordering::Equal => eyre::bail!(
                "calibration rows have duplicate raw values at index {} and {}",
                i - 1,
                i
            ),
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Less => -1,
        };
        if dir == 0 {
            dir = step_dir;
        } else if dir != step_dir {
            eyre::bail!(
                "calibration raw values must be monotonic (strictly increasing or strictly decreasing)"
            );
        }
    }

    let n = rows.len() as f64;
    let mean_g = rows.iter().map(|r| f64::from(r.grams)).sum::<f64>() / n;
    let mean_raw = rows.iter().map(|r| r.raw as f64).sum::<f64>() / n;
    let mut sgg = 0.0f64;
    let mut sgr = 0.0f64;
    for r in rows {
        let g = f64::from(r.grams) - mean_g;
        sgg += g * g;
        sgr += g * (r.raw as f64 - mean_raw);
    }
    if !sgg.is_finite() || sgg == 0.0 {
        eyre::bail!("calibration cannot determine slope (all rows have the same grams)");
    }
    let slope = (sgr / sgg) as f32;
    if !slope.is_finite() || slope == 0.0 {
        eyre::bail!("calibration produced zero or non-finite reference unit");
    }
    Ok(slope)
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<FittedCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["channel", "raw", "grams"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'channel,raw,grams', got: {}",
            actual.join(",")
        );
    }

    let mut ch1 = Vec::new();
    let mut ch2 = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        match row.channel {
            1 => ch1.push(row),
            2 => ch2.push(row),
            other => eyre::bail!(
                "invalid CSV row {}: channel must be 1 or 2, got {other}",
                idx + 2
            ),
        }
    }
    if ch1.is_empty() && ch2.is_empty() {
        eyre::bail!("calibration CSV {:?} has no rows", path);
    }

    let fit = |rows: &[CalibrationRow], ch: u8| -> eyre::Result<Option<f32>> {
        if rows.is_empty() {
            return Ok(None);
        }
        fit_reference_unit(rows)
            .map(Some)
            .map_err(|e| eyre::eyre!("channel {ch}: {e}"))
    };
    Ok(FittedCalibration {
        reference_unit_1: fit(&ch1, 1)?,
        reference_unit_2: fit(&ch2, 2)?,
    })
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins: each physical line has exactly one owner
        let pins = self.pins.all();
        for (i, (name_a, a)) in pins.iter().enumerate() {
            if *a > 27 {
                eyre::bail!("pins.{name_a} = {a} is not a valid BCM GPIO (0..=27)");
            }
            for (name_b, b) in &pins[i + 1..] {
                if a == b {
                    eyre::bail!("pins.{name_a} and pins.{name_b} share GPIO {a}");
                }
            }
        }

        // Calibration
        if !self.calibration.reference_unit_1.is_finite() {
            eyre::bail!("calibration.reference_unit_1 must be finite");
        }
        if !self.calibration.reference_unit_2.is_finite() {
            eyre::bail!("calibration.reference_unit_2 must be finite");
        }

        // Sampling
        if !(1..=MAX_SAMPLES).contains(&self.sampling.sample_count) {
            eyre::bail!("sampling.sample_count must be in 1..={MAX_SAMPLES}");
        }
        if !(1..=MAX_SAMPLES).contains(&self.sampling.tare_samples) {
            eyre::bail!("sampling.tare_samples must be in 1..={MAX_SAMPLES}");
        }

        // Control
        if !(self.control.tolerance_g.is_finite() && self.control.tolerance_g > 0.0) {
            eyre::bail!("control.tolerance_g must be > 0");
        }
        if !(self.control.grams_per_mm.is_finite() && self.control.grams_per_mm > 0.0) {
            eyre::bail!("control.grams_per_mm must be > 0");
        }
        if self.control.max_steps == 0 {
            eyre::bail!("control.max_steps must be >= 1");
        }
        if self.control.resample_every == 0 {
            eyre::bail!("control.resample_every must be >= 1");
        }

        // Stepper
        if self.stepper.dwell_us == 0 {
            eyre::bail!("stepper.dwell_us must be >= 1");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }
        if !(25..=27).contains(&self.hardware.gain_pulses) {
            eyre::bail!("hardware.gain_pulses must be 25, 26 or 27");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.grams_per_step.is_finite() && sim.grams_per_step > 0.0) {
            eyre::bail!("simulation.grams_per_step must be > 0");
        }
        if !sim.counts_per_gram.is_finite() || sim.counts_per_gram == 0.0 {
            eyre::bail!("simulation.counts_per_gram must be non-zero");
        }
        if !(sim.noise_g.is_finite() && sim.noise_g >= 0.0) {
            eyre::bail!("simulation.noise_g must be >= 0");
        }
        if sim.rail_steps < 1 {
            eyre::bail!("simulation.rail_steps must be >= 1");
        }
        if !(sim.load_1_g.is_finite() && sim.load_2_g.is_finite()) {
            eyre::bail!("simulation loads must be finite");
        }

        Ok(())
    }
}
