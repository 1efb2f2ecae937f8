//! The closed balancing loop: two load cells, one stepper, one carriage.
//!
//! A move runs in two phases. Centering drives `|weight1 - weight2|` below
//! the tolerance, re-sampling as it goes and always stepping away from the
//! heavier side. Offsetting then pushes the differential past the requested
//! target. Both phases share one step budget.

use cog_traits::{OutputLine, Scale};
use eyre::WrapErr;

use crate::config::{ControlCfg, MAX_OFFSET_MM, ReferenceUnits, SamplingCfg};
use crate::error::{BalanceError, Result};
use crate::load_cell::{LoadCellChannel, validate_reference_unit};
use crate::status::{BalancerState, MoveReport, Side};
use crate::stepper::StepperDriver;

pub struct BatteryPositioner<S: Scale, L: OutputLine> {
    pub(crate) channel_1: LoadCellChannel<S>,
    pub(crate) channel_2: LoadCellChannel<S>,
    pub(crate) stepper: StepperDriver<L>,
    pub(crate) sampling: SamplingCfg,
    pub(crate) control: ControlCfg,
    pub(crate) reference: ReferenceUnits,
    pub(crate) interrupt_check: Option<Box<dyn Fn() -> bool>>,
    pub(crate) state: BalancerState,
    pub(crate) ready: bool,
}

impl<S: Scale, L: OutputLine> core::fmt::Debug for BatteryPositioner<S, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BatteryPositioner")
            .field("state", &self.state)
            .field("ready", &self.ready)
            .field("channel_1", &self.channel_1)
            .field("channel_2", &self.channel_2)
            .field("stepper", &self.stepper)
            .finish()
    }
}

/// Step accounting shared by both phases of one move.
struct StepBudget {
    used: u32,
    max: u32,
}

impl<S: Scale, L: OutputLine> BatteryPositioner<S, L> {
    /// Initialize the driver, then reset, tare and scale each channel in that order.
    ///
    /// Must succeed before any `goto_offset`. A failure leaves the positioner
    /// not ready.
    pub fn setup(&mut self) -> Result<()> {
        self.ready = false;
        self.state = BalancerState::Idle;

        validate_reference_unit(self.channel_1.label(), self.reference.channel_1)
            .map_err(eyre::Report::new)?;
        validate_reference_unit(self.channel_2.label(), self.reference.channel_2)
            .map_err(eyre::Report::new)?;

        self.stepper.initialize()?;

        let tare_samples = self.sampling.tare_samples;
        for (channel, unit) in [
            (&mut self.channel_1, self.reference.channel_1),
            (&mut self.channel_2, self.reference.channel_2),
        ] {
            channel.reset()?;
            channel.tare(tare_samples)?;
            channel.set_reference_unit(unit)?;
        }

        self.ready = true;
        tracing::info!(
            tare_1 = self.channel_1.tare_offset(),
            tare_2 = self.channel_2.tare_offset(),
            "positioner ready"
        );
        Ok(())
    }

    /// Drive the carriage until the differential matches `offset_mm`.
    ///
    /// The gram target is `offset_mm * grams_per_mm`. Errors abort the move
    /// where it stands; the carriage is not moved back.
    pub fn goto_offset(&mut self, offset_mm: i32) -> Result<MoveReport> {
        if !self.ready {
            return Err(eyre::Report::new(BalanceError::Configuration(
                "positioner not set up".into(),
            )));
        }
        if !(-MAX_OFFSET_MM..=MAX_OFFSET_MM).contains(&offset_mm) {
            return Err(eyre::Report::new(BalanceError::InvalidTarget(offset_mm)));
        }

        let target_g = offset_mm as f32 * self.control.grams_per_mm;
        tracing::info!(offset_mm, target_g, "move started");

        match self.run_move(offset_mm, target_g) {
            Ok(report) => {
                self.state = BalancerState::Converged;
                tracing::info!(
                    centering_steps = report.centering_steps,
                    offset_steps = report.offset_steps,
                    final_diff_g = report.final_diff_g,
                    "move converged"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(state = %self.state, error = %e, "move aborted");
                self.state = BalancerState::Idle;
                Err(e.wrap_err(format!("moving to offset {offset_mm} mm")))
            }
        }
    }

    fn run_move(&mut self, offset_mm: i32, target_g: f32) -> Result<MoveReport> {
        let mut budget = StepBudget {
            used: 0,
            max: self.control.max_steps,
        };
        let resample_every = self.control.resample_every.max(1);

        self.stepper.begin_move();
        self.state = BalancerState::Centering;
        let mut diff = self.read_differential()?;

        let mut centering_steps = 0u32;
        while diff.abs() >= self.control.tolerance_g {
            // Heavier channel 1 means forward, toward channel 2.
            let forward = diff > 0.0;
            if self.stepper.direction() != Some(forward) {
                self.stepper.set_direction(forward)?;
            }
            self.step_once(&mut budget, diff)?;
            centering_steps += 1;
            if centering_steps % resample_every == 0 {
                diff = self.read_differential()?;
            }
        }
        tracing::debug!(centering_steps, diff, "centering done");

        let mut report = MoveReport {
            target_mm: offset_mm,
            target_g,
            centering_steps,
            offset_steps: 0,
            final_diff_g: diff,
        };
        if offset_mm == 0 {
            return Ok(report);
        }

        let side = if offset_mm < 0 {
            Side::Negative
        } else {
            Side::Positive
        };
        self.state = BalancerState::Offsetting(side);
        self.stepper.set_direction(side == Side::Negative)?;

        let unsatisfied = |d: f32| match side {
            Side::Negative => d > target_g,
            Side::Positive => d < target_g,
        };
        let mut offset_steps = 0u32;
        while unsatisfied(diff) {
            self.step_once(&mut budget, diff)?;
            offset_steps += 1;
            if offset_steps % resample_every == 0 {
                diff = self.read_differential()?;
            }
        }

        report.offset_steps = offset_steps;
        report.final_diff_g = diff;
        Ok(report)
    }

    fn step_once(&mut self, budget: &mut StepBudget, last_diff_g: f32) -> Result<()> {
        if self.interrupt_check.as_ref().is_some_and(|check| check()) {
            return Err(eyre::Report::new(BalanceError::Interrupted));
        }
        if budget.used >= budget.max {
            return Err(eyre::Report::new(BalanceError::NonConvergence {
                steps: budget.used,
                last_diff_g,
            }));
        }
        self.stepper.step()?;
        budget.used += 1;
        Ok(())
    }

    /// Both channel weights in grams, sampled sequentially.
    pub fn read_weights(&mut self) -> Result<(f32, f32)> {
        let n = self.sampling.sample_count;
        let w1 = self.channel_1.get_weight(n).wrap_err("sampling channel 1")?;
        let w2 = self.channel_2.get_weight(n).wrap_err("sampling channel 2")?;
        Ok((w1, w2))
    }

    /// `weight1 - weight2` in grams.
    pub fn read_differential(&mut self) -> Result<f32> {
        let (w1, w2) = self.read_weights()?;
        let diff = w1 - w2;
        tracing::debug!(w1, w2, diff, "differential");
        Ok(diff)
    }

    /// Release the driver, e.g. after an interrupted move. Requires a new `setup()`.
    pub fn disable_stepper(&mut self) -> Result<()> {
        self.ready = false;
        self.state = BalancerState::Idle;
        self.stepper.disable()
    }

    pub fn state(&self) -> BalancerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The two load cell channels, channel 1 first.
    pub fn channels(&self) -> (&LoadCellChannel<S>, &LoadCellChannel<S>) {
        (&self.channel_1, &self.channel_2)
    }

    pub fn stepper(&self) -> &StepperDriver<L> {
        &self.stepper
    }

    pub fn sampling(&self) -> &SamplingCfg {
        &self.sampling
    }

    pub fn control(&self) -> &ControlCfg {
        &self.control
    }
}
