#![allow(dead_code)]

use cog_core::{
    BatteryPositioner, ControlCfg, ReferenceUnits, SamplingCfg, StepperCfg, StepperLines,
    build_positioner,
};
use cog_hardware::{Channel, SimLine, SimRig, SimRigCfg, SimScale};
use cog_traits::clock::test_clock::TestClock;

pub type SimPositioner = BatteryPositioner<SimScale, SimLine>;

/// Counts per gram used by the default rig; matching reference units give exact grams.
pub const COUNTS_PER_GRAM: f32 = 420.0;

pub fn calibrated() -> ReferenceUnits {
    ReferenceUnits {
        channel_1: COUNTS_PER_GRAM,
        channel_2: COUNTS_PER_GRAM,
    }
}

pub fn positioner_on(
    rig: &SimRig,
    control: ControlCfg,
    reference: ReferenceUnits,
    interrupt_check: Option<Box<dyn Fn() -> bool>>,
) -> (SimPositioner, TestClock) {
    let clock = TestClock::new();
    let p = build_positioner(
        rig.scale(Channel::One),
        rig.scale(Channel::Two),
        StepperLines {
            step: rig.step_line(),
            dir: rig.dir_line(),
            enable: rig.enable_line(),
        },
        SamplingCfg::default(),
        control,
        StepperCfg::default(),
        reference,
        Some(Box::new(clock.clone())),
        interrupt_check,
    )
    .expect("valid positioner config");
    (p, clock)
}

/// Rig plus a set-up positioner, with the airframe placed after taring.
pub fn ready_rig(
    load_1_g: f32,
    load_2_g: f32,
    rig_cfg: SimRigCfg,
) -> (SimRig, SimPositioner, TestClock) {
    let rig = SimRig::new(rig_cfg);
    let (mut p, clock) = positioner_on(&rig, ControlCfg::default(), calibrated(), None);
    p.setup().expect("setup on empty cells");
    rig.place_loads(load_1_g, load_2_g);
    (rig, p, clock)
}
