//! Step/direction/enable sequencing for a single stepper driver (TMC2225 class).
//!
//! The driver owns its three output lines exclusively. Pulse timing goes
//! through the shared `Clock`, so a test clock makes every dwell instant.

use std::sync::Arc;
use std::time::Duration;

use cog_traits::{Clock, OutputLine};
use eyre::WrapErr;

use crate::config::StepperCfg;
use crate::error::{BalanceError, Result};
use crate::hw_error::map_hw_error;

pub struct StepperDriver<L: OutputLine> {
    step: L,
    dir: L,
    enable: L,
    cfg: StepperCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    enabled: bool,
    direction: Option<bool>,
    steps_emitted: u64,
}

impl<L: OutputLine> core::fmt::Debug for StepperDriver<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepperDriver")
            .field("enabled", &self.enabled)
            .field("direction", &self.direction)
            .field("steps_emitted", &self.steps_emitted)
            .field("dwell_us", &self.cfg.dwell_us)
            .finish()
    }
}

fn drive<L: OutputLine>(line: &mut L, high: bool, what: &'static str) -> Result<()> {
    line.set_level(high)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err(what)
}

impl<L: OutputLine> StepperDriver<L> {
    pub fn new(
        step: L,
        dir: L,
        enable: L,
        cfg: StepperCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            step,
            dir,
            enable,
            cfg,
            clock,
            enabled: false,
            direction: None,
            steps_emitted: 0,
        }
    }

    /// Put all lines in their idle state and enable the driver.
    ///
    /// Step and direction go low. Enable is asserted, which with the default
    /// active-low wiring also means low.
    pub fn initialize(&mut self) -> Result<()> {
        self.enabled = false;
        self.direction = None;
        drive(&mut self.step, false, "initializing step line")?;
        drive(&mut self.dir, false, "initializing direction line")?;
        drive(
            &mut self.enable,
            !self.cfg.enable_active_low,
            "asserting driver enable",
        )?;
        self.enabled = true;
        tracing::info!(
            enable_active_low = self.cfg.enable_active_low,
            dwell_us = self.cfg.dwell_us,
            "stepper driver initialized"
        );
        Ok(())
    }

    /// Forget the direction of the previous move.
    pub fn begin_move(&mut self) {
        self.direction = None;
    }

    /// `forward == true` moves the carriage toward channel 2.
    pub fn set_direction(&mut self, forward: bool) -> Result<()> {
        drive(&mut self.dir, forward, "setting direction")?;
        if self.direction != Some(forward) {
            tracing::debug!(forward, "direction set");
        }
        self.direction = Some(forward);
        Ok(())
    }

    /// Emit one step pulse: high, dwell, low, dwell.
    pub fn step(&mut self) -> Result<()> {
        if !self.enabled {
            return Err(eyre::Report::new(BalanceError::State(
                "stepper driver not initialized".into(),
            )));
        }
        let Some(forward) = self.direction else {
            return Err(eyre::Report::new(BalanceError::State(
                "no direction set for this move".into(),
            )));
        };
        let dwell = Duration::from_micros(self.cfg.dwell_us);
        drive(&mut self.step, true, "raising step line")?;
        self.clock.sleep(dwell);
        drive(&mut self.step, false, "lowering step line")?;
        self.clock.sleep(dwell);
        self.steps_emitted = self.steps_emitted.saturating_add(1);
        tracing::trace!(forward, steps = self.steps_emitted, "step");
        Ok(())
    }

    /// De-assert enable. Further steps are refused until `initialize()`.
    pub fn disable(&mut self) -> Result<()> {
        self.enabled = false;
        self.direction = None;
        drive(
            &mut self.enable,
            self.cfg.enable_active_low,
            "de-asserting driver enable",
        )?;
        tracing::info!("stepper driver disabled");
        Ok(())
    }

    pub fn direction(&self) -> Option<bool> {
        self.direction
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pulses emitted since construction.
    pub fn steps_emitted(&self) -> u64 {
        self.steps_emitted
    }
}
