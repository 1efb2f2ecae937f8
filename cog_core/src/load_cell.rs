//! One tared, calibrated load cell channel.

use std::time::Duration;

use cog_traits::Scale;
use eyre::WrapErr;

use crate::config::MAX_SAMPLES;
use crate::error::{BalanceError, Result};
use crate::hw_error::map_hw_error;
use crate::util::combine_samples;

/// Reject reference units that would make weights meaningless.
pub fn validate_reference_unit(label: &str, unit: f32) -> core::result::Result<(), BalanceError> {
    if unit == 0.0 || !unit.is_finite() {
        return Err(BalanceError::Calibration(format!(
            "{label}: reference unit must be non-zero and finite (got {unit})"
        )));
    }
    Ok(())
}

pub struct LoadCellChannel<S: Scale> {
    label: String,
    scale: S,
    read_timeout: Duration,
    reference_unit: f32,
    tare_offset: Option<f64>,
}

impl<S: Scale> core::fmt::Debug for LoadCellChannel<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoadCellChannel")
            .field("label", &self.label)
            .field("reference_unit", &self.reference_unit)
            .field("tare_offset", &self.tare_offset)
            .finish()
    }
}

impl<S: Scale> LoadCellChannel<S> {
    pub fn new(label: impl Into<String>, scale: S, read_timeout: Duration) -> Self {
        Self {
            label: label.into(),
            scale,
            read_timeout,
            reference_unit: 0.0,
            tare_offset: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reinitialize the amplifier. Must precede `tare()`.
    pub fn reset(&mut self) -> Result<()> {
        self.scale
            .reset()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("resetting {}", self.label))?;
        tracing::debug!(channel = %self.label, "load cell reset");
        Ok(())
    }

    /// Capture the current reading as the zero baseline. Returns the baseline in counts.
    pub fn tare(&mut self, samples: usize) -> Result<f64> {
        let offset = self
            .read_average(samples)
            .wrap_err_with(|| format!("taring {}", self.label))?;
        self.tare_offset = Some(offset);
        tracing::info!(channel = %self.label, offset, samples, "load cell tared");
        Ok(offset)
    }

    /// Counts per gram. Zero or non-finite is rejected.
    pub fn set_reference_unit(&mut self, unit: f32) -> Result<()> {
        validate_reference_unit(&self.label, unit).map_err(eyre::Report::new)?;
        self.reference_unit = unit;
        tracing::debug!(channel = %self.label, unit, "reference unit set");
        Ok(())
    }

    pub fn reference_unit(&self) -> f32 {
        self.reference_unit
    }

    pub fn tare_offset(&self) -> Option<f64> {
        self.tare_offset
    }

    pub fn is_tared(&self) -> bool {
        self.tare_offset.is_some()
    }

    /// Take `n` raw reads and combine them (single, median, or trimmed mean).
    pub fn read_average(&mut self, n: usize) -> Result<f64> {
        if n == 0 {
            return Err(eyre::Report::new(BalanceError::Configuration(format!(
                "{}: sample count must be >= 1",
                self.label
            ))));
        }
        if n > MAX_SAMPLES {
            return Err(eyre::Report::new(BalanceError::Configuration(format!(
                "{}: sample count {n} exceeds {MAX_SAMPLES}",
                self.label
            ))));
        }
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            let raw = self
                .scale
                .read(self.read_timeout)
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err_with(|| format!("reading {}", self.label))?;
            samples.push(raw);
        }
        combine_samples(&mut samples).ok_or_else(|| {
            eyre::Report::new(BalanceError::State(format!(
                "{}: no samples collected",
                self.label
            )))
        })
    }

    /// Tared counts averaged over `n` reads.
    pub fn get_value(&mut self, n: usize) -> Result<f64> {
        let Some(offset) = self.tare_offset else {
            return Err(eyre::Report::new(BalanceError::Calibration(format!(
                "{} not tared",
                self.label
            ))));
        };
        Ok(self.read_average(n)? - offset)
    }

    /// Weight in grams averaged over `n` reads.
    pub fn get_weight(&mut self, n: usize) -> Result<f32> {
        if self.reference_unit == 0.0 {
            return Err(eyre::Report::new(BalanceError::Calibration(format!(
                "{}: reference unit not set",
                self.label
            ))));
        }
        let grams = (self.get_value(n)? / f64::from(self.reference_unit)) as f32;
        tracing::debug!(channel = %self.label, grams, samples = n, "weight");
        Ok(grams)
    }
}
