#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Center-of-gravity balancing core (hardware-agnostic).
//!
//! All hardware goes through `cog_traits::OutputLine` and `cog_traits::Scale`,
//! so the same loop runs on Raspberry Pi GPIO, the simulated rig, or test doubles.
//!
//! ## Architecture
//!
//! - **Stepper**: step/direction/enable sequencing with clock-driven dwell (`stepper`)
//! - **Load cells**: reset, tare, reference unit, averaged weight (`load_cell`)
//! - **Control**: centering then offsetting with a step budget (`positioner`)
//! - **Construction**: type-state builder and generic constructor (`builder`)
//! - **Configuration**: runtime config structs (`config`) and `cog_config` bridges
//! - **Status**: positioner state machine and move reports (`status`)

pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod load_cell;
pub mod positioner;
pub mod status;
pub mod stepper;
pub mod util;

pub use builder::{
    Missing, Positioner, PositionerBuilder, Set, StepperLines, build_positioner,
};
pub use config::{ControlCfg, MAX_OFFSET_MM, MAX_SAMPLES, ReferenceUnits, SamplingCfg, StepperCfg};
pub use error::{BalanceError, BuildError, Report, Result};
pub use load_cell::LoadCellChannel;
pub use positioner::BatteryPositioner;
pub use status::{BalancerState, MoveReport, Side};
pub use stepper::StepperDriver;
