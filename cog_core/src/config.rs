//! Runtime configuration for the balancing core.
//!
//! These are the structs `BatteryPositioner` runs with. They are separate
//! from the TOML-deserialized config in `cog_config`; see `conversions`.

/// Operator offsets are limited to this many millimeters either way.
pub const MAX_OFFSET_MM: i32 = 100;

/// Most raw reads a single weight query or tare may combine.
pub const MAX_SAMPLES: usize = cog_config::MAX_SAMPLES;

/// Load cell sampling.
#[derive(Debug, Clone)]
pub struct SamplingCfg {
    /// Raw reads combined per weight query. Default: 5.
    pub sample_count: usize,
    /// Raw reads combined when capturing the tare baseline. Default: 15.
    pub tare_samples: usize,
    /// Max wait per raw read (ms).
    pub sensor_timeout_ms: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_count: 5,
            tare_samples: 15,
            sensor_timeout_ms: 500,
        }
    }
}

/// Convergence and safety limits for a move.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Centering stops once `|diff| < tolerance_g`. Default: 1 g.
    pub tolerance_g: f32,
    /// Differential grams per millimeter of operator offset. The default of 1.0
    /// treats the millimeter value directly as a gram threshold.
    pub grams_per_mm: f32,
    /// Step budget for a whole move (centering + offsetting).
    pub max_steps: u32,
    /// Re-sample both channels after this many steps. Default: every step.
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

/// Step pulse timing and driver wiring.
#[derive(Debug, Clone)]
pub struct StepperCfg {
    /// Hold time for each half of a step pulse (µs). Default: 100 ms.
    pub dwell_us: u64,
    /// Enable input is asserted by driving it low.
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

/// Counts-per-gram divisors for the two channels. 0.0 means uncalibrated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferenceUnits {
    pub channel_1: f32,
    pub channel_2: f32,
}
