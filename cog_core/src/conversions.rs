//! `From` implementations bridging `cog_config` types to `cog_core` types.

use crate::config::{ControlCfg, ReferenceUnits, SamplingCfg, StepperCfg};

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&cog_config::Config> for SamplingCfg {
    fn from(c: &cog_config::Config) -> Self {
        Self {
            sample_count: c.sampling.sample_count,
            tare_samples: c.sampling.tare_samples,
            sensor_timeout_ms: c.hardware.sensor_read_timeout_ms,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&cog_config::ControlCfg> for ControlCfg {
    fn from(c: &cog_config::ControlCfg) -> Self {
        Self {
            tolerance_g: c.tolerance_g,
            grams_per_mm: c.grams_per_mm,
            max_steps: c.max_steps,
            resample_every: c.resample_every,
        }
    }
}

// ── StepperCfg ───────────────────────────────────────────────────────────────

impl From<&cog_config::StepperCfg> for StepperCfg {
    fn from(c: &cog_config::StepperCfg) -> Self {
        Self {
            dwell_us: c.dwell_us,
            enable_active_low: c.enable_active_low,
        }
    }
}

// ── ReferenceUnits ───────────────────────────────────────────────────────────

impl From<&cog_config::CalibrationCfg> for ReferenceUnits {
    fn from(c: &cog_config::CalibrationCfg) -> Self {
        Self {
            channel_1: c.reference_unit_1,
            channel_2: c.reference_unit_2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_timeout_comes_from_hardware_section() {
        let cfg = cog_config::load_toml("[hardware]\nsensor_read_timeout_ms = 42\n").unwrap();
        let s = SamplingCfg::from(&cfg);
        assert_eq!(s.sensor_timeout_ms, 42);
        assert_eq!(s.sample_count, 5);
    }

    #[test]
    fn reference_units_map_per_channel() {
        let c = cog_config::CalibrationCfg {
            reference_unit_1: 1.5,
            reference_unit_2: -2.0,
        };
        assert_eq!(
            ReferenceUnits::from(&c),
            ReferenceUnits {
                channel_1: 1.5,
                channel_2: -2.0
            }
        );
    }
}
