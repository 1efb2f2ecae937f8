//! Type-state builder for `Positioner` and generic `build_positioner` constructor.
//!
//! The builder enforces at compile time that both load cell channels and the
//! stepper lines are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use cog_traits::clock::{Clock, MonotonicClock};
use cog_traits::{OutputLine, Scale};

use crate::config::{ControlCfg, MAX_SAMPLES, ReferenceUnits, SamplingCfg, StepperCfg};
use crate::error::{BuildError, Result};
use crate::load_cell::LoadCellChannel;
use crate::positioner::BatteryPositioner;
use crate::status::BalancerState;
use crate::stepper::StepperDriver;

/// Dynamically dispatched positioner, as assembled by the builder.
pub type Positioner = BatteryPositioner<Box<dyn Scale>, Box<dyn OutputLine>>;

/// Step, direction and enable lines, in that order.
pub struct StepperLines<L> {
    pub step: L,
    pub dir: L,
    pub enable: L,
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Positioner`. Configs are validated on `build()`.
pub struct PositionerBuilder<C, M> {
    channels: Option<(Box<dyn Scale>, Box<dyn Scale>)>,
    stepper: Option<StepperLines<Box<dyn OutputLine>>>,
    sampling: Option<SamplingCfg>,
    control: Option<ControlCfg>,
    stepper_cfg: Option<StepperCfg>,
    reference: Option<ReferenceUnits>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    interrupt_check: Option<Box<dyn Fn() -> bool>>,
    _c: PhantomData<C>,
    _m: PhantomData<M>,
}

impl Default for PositionerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            channels: None,
            stepper: None,
            sampling: None,
            control: None,
            stepper_cfg: None,
            reference: None,
            clock: None,
            interrupt_check: None,
            _c: PhantomData,
            _m: PhantomData,
        }
    }
}

impl Positioner {
    /// Start building a positioner.
    pub fn builder() -> PositionerBuilder<Missing, Missing> {
        PositionerBuilder::default()
    }
}

/// Validate configuration and wire up the channels and driver.
///
/// Shared by `PositionerBuilder::try_build()` and `build_positioner()`.
/// Reference units are not checked here; `setup()` rejects bad ones.
#[allow(clippy::too_many_arguments)]
fn validate_and_build<S: Scale, L: OutputLine>(
    scale_1: S,
    scale_2: S,
    lines: StepperLines<L>,
    sampling: SamplingCfg,
    control: ControlCfg,
    stepper_cfg: StepperCfg,
    reference: ReferenceUnits,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    interrupt_check: Option<Box<dyn Fn() -> bool>>,
) -> Result<BatteryPositioner<S, L>> {
    // ── Validation ───────────────────────────────────────────────────────────
    if sampling.sample_count == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sample_count must be >= 1",
        )));
    }
    if sampling.sample_count > MAX_SAMPLES {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sample_count exceeds MAX_SAMPLES",
        )));
    }
    if sampling.tare_samples == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tare_samples must be >= 1",
        )));
    }
    if sampling.tare_samples > MAX_SAMPLES {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tare_samples exceeds MAX_SAMPLES",
        )));
    }
    if sampling.sensor_timeout_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sensor_timeout_ms must be >= 1",
        )));
    }
    if !control.tolerance_g.is_finite() || control.tolerance_g <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tolerance_g must be > 0",
        )));
    }
    if !control.grams_per_mm.is_finite() || control.grams_per_mm <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "grams_per_mm must be > 0",
        )));
    }
    if control.max_steps == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_steps must be >= 1",
        )));
    }
    if control.resample_every == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "resample_every must be >= 1",
        )));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let timeout = Duration::from_millis(sampling.sensor_timeout_ms);

    Ok(BatteryPositioner {
        channel_1: LoadCellChannel::new("load_cell_1", scale_1, timeout),
        channel_2: LoadCellChannel::new("load_cell_2", scale_2, timeout),
        stepper: StepperDriver::new(lines.step, lines.dir, lines.enable, stepper_cfg, clock),
        sampling,
        control,
        reference,
        interrupt_check,
        state: BalancerState::Idle,
        ready: false,
    })
}

impl<C, M> PositionerBuilder<C, M> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Positioner> {
        let (scale_1, scale_2) = self
            .channels
            .ok_or_else(|| eyre::Report::new(BuildError::MissingChannels))?;
        let lines = self
            .stepper
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStepper))?;

        validate_and_build(
            scale_1,
            scale_2,
            lines,
            self.sampling.unwrap_or_default(),
            self.control.unwrap_or_default(),
            self.stepper_cfg.unwrap_or_default(),
            self.reference.unwrap_or_default(),
            self.clock,
            self.interrupt_check,
        )
    }
}

/// Chainable setters that do not affect type-state.
impl<C, M> PositionerBuilder<C, M> {
    pub fn with_sampling(mut self, sampling: SamplingCfg) -> Self {
        self.sampling = Some(sampling);
        self
    }
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }
    pub fn with_stepper_cfg(mut self, cfg: StepperCfg) -> Self {
        self.stepper_cfg = Some(cfg);
        self
    }
    pub fn with_reference_units(mut self, reference: ReferenceUnits) -> Self {
        self.reference = Some(reference);
        self
    }
    /// Polled before every step; returning true aborts the move.
    pub fn with_interrupt_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.interrupt_check = Some(Box::new(f));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<M> PositionerBuilder<Missing, M> {
    pub fn with_channels(
        self,
        channel_1: impl Scale + 'static,
        channel_2: impl Scale + 'static,
    ) -> PositionerBuilder<Set, M> {
        PositionerBuilder {
            channels: Some((Box::new(channel_1), Box::new(channel_2))),
            stepper: self.stepper,
            sampling: self.sampling,
            control: self.control,
            stepper_cfg: self.stepper_cfg,
            reference: self.reference,
            clock: self.clock,
            interrupt_check: self.interrupt_check,
            _c: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<C> PositionerBuilder<C, Missing> {
    pub fn with_stepper(
        self,
        step: impl OutputLine + 'static,
        dir: impl OutputLine + 'static,
        enable: impl OutputLine + 'static,
    ) -> PositionerBuilder<C, Set> {
        PositionerBuilder {
            channels: self.channels,
            stepper: Some(StepperLines {
                step: Box::new(step),
                dir: Box::new(dir),
                enable: Box::new(enable),
            }),
            sampling: self.sampling,
            control: self.control,
            stepper_cfg: self.stepper_cfg,
            reference: self.reference,
            clock: self.clock,
            interrupt_check: self.interrupt_check,
            _c: PhantomData,
            _m: PhantomData,
        }
    }
}

impl PositionerBuilder<Set, Set> {
    /// Validate and build. Only available once channels and stepper are set.
    pub fn build(self) -> Result<Positioner> {
        self.try_build()
    }
}

/// Build a statically dispatched positioner from concrete scales and lines.
///
/// Delegates to the shared `validate_and_build`.
#[allow(clippy::too_many_arguments)]
pub fn build_positioner<S, L>(
    scale_1: S,
    scale_2: S,
    lines: StepperLines<L>,
    sampling: SamplingCfg,
    control: ControlCfg,
    stepper_cfg: StepperCfg,
    reference: ReferenceUnits,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    interrupt_check: Option<Box<dyn Fn() -> bool>>,
) -> Result<BatteryPositioner<S, L>>
where
    S: Scale,
    L: OutputLine,
{
    validate_and_build(
        scale_1,
        scale_2,
        lines,
        sampling,
        control,
        stepper_cfg,
        reference,
        clock,
        interrupt_check,
    )
}
