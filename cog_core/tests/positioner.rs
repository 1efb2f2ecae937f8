mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use cog_core::{BalanceError, BalancerState, ControlCfg, ReferenceUnits};
use cog_hardware::{Channel, RigEvent, SimRig, SimRigCfg};
use common::{COUNTS_PER_GRAM, calibrated, positioner_on, ready_rig};
use rstest::rstest;

fn balance_err(e: &eyre::Report) -> &BalanceError {
    e.downcast_ref::<BalanceError>()
        .unwrap_or_else(|| panic!("expected BalanceError, got: {e:?}"))
}

#[test]
fn heavier_channel_one_centers_forward_and_stops_below_tolerance() {
    let (rig, mut p, _clock) = ready_rig(105.0, 100.0, SimRigCfg::default());

    let report = p.goto_offset(0).expect("centering converges");

    // 0.5 g of differential per step: 5.0 -> 0.5 after 9 steps
    assert_eq!(report.centering_steps, 9);
    assert_eq!(report.offset_steps, 0);
    assert!(report.final_diff_g.abs() < 1.0);
    assert!(rig.dir_level(), "forward direction expected");
    assert_eq!(rig.position(), 9);
    assert_eq!(p.state(), BalancerState::Converged);
}

#[test]
fn balanced_pair_with_zero_target_never_offsets() {
    let (rig, mut p, _clock) = ready_rig(100.0, 100.0, SimRigCfg::default());
    let report = p.goto_offset(0).unwrap();
    assert_eq!(report.total_steps(), 0);
    assert_eq!(rig.steps_applied(), 0);
}

#[test]
fn negative_target_steps_until_differential_reaches_it() {
    let (rig, mut p, _clock) = ready_rig(100.0, 100.0, SimRigCfg::default());

    let report = p.goto_offset(-20).expect("offsetting converges");

    assert_eq!(report.centering_steps, 0);
    assert_eq!(report.offset_steps, 40);
    assert!(report.final_diff_g <= -20.0);
    assert!((rig.differential_g() + 20.0).abs() < 1e-3);
    assert_eq!(rig.position(), 40);
}

#[test]
fn positive_target_moves_toward_channel_one() {
    let (rig, mut p, _clock) = ready_rig(100.0, 100.0, SimRigCfg::default());

    let report = p.goto_offset(10).unwrap();

    assert_eq!(report.offset_steps, 20);
    assert!(report.final_diff_g >= 10.0);
    assert!(!rig.dir_level());
    assert_eq!(rig.position(), -20);
}

#[test]
fn grams_per_mm_scales_the_target() {
    let rig = SimRig::default();
    let control = ControlCfg {
        grams_per_mm: 2.0,
        ..ControlCfg::default()
    };
    let (mut p, _clock) = positioner_on(&rig, control, calibrated(), None);
    p.setup().unwrap();
    rig.place_loads(100.0, 100.0);

    let report = p.goto_offset(-5).unwrap();
    assert_eq!(report.target_g, -10.0);
    assert_eq!(report.offset_steps, 20);
}

#[test]
fn consecutive_moves_continue_from_where_the_carriage_is() {
    let (rig, mut p, _clock) = ready_rig(100.0, 100.0, SimRigCfg::default());
    p.goto_offset(-20).unwrap();
    // Back to center: centering alone runs forward/backward as needed.
    let report = p.goto_offset(0).unwrap();
    assert!(report.final_diff_g.abs() < 1.0);
    assert!(!rig.dir_level(), "carriage had to come back toward channel 1");
    assert!(rig.position().abs() <= 1);
}

#[test]
fn dwell_runs_on_the_injected_clock() {
    let (_rig, mut p, clock) = ready_rig(105.0, 100.0, SimRigCfg::default());
    p.goto_offset(0).unwrap();
    // 9 pulses, two 100 ms holds each
    assert_eq!(clock.elapsed(), Duration::from_millis(1_800));
}

#[test]
fn move_before_setup_is_a_configuration_error() {
    let rig = SimRig::default();
    let (mut p, _clock) = positioner_on(&rig, ControlCfg::default(), calibrated(), None);

    let err = p.goto_offset(0).unwrap_err();
    assert_eq!(
        balance_err(&err),
        &BalanceError::Configuration("positioner not set up".into())
    );
    assert_eq!(rig.reads(Channel::One), 0, "no sensor access before setup");
}

#[rstest]
#[case(0.0, 420.0)]
#[case(420.0, 0.0)]
#[case(f32::NAN, 420.0)]
fn setup_rejects_uncalibrated_channels(#[case] unit_1: f32, #[case] unit_2: f32) {
    let rig = SimRig::default();
    let reference = ReferenceUnits {
        channel_1: unit_1,
        channel_2: unit_2,
    };
    let (mut p, _clock) = positioner_on(&rig, ControlCfg::default(), reference, None);

    let err = p.setup().unwrap_err();
    assert!(matches!(balance_err(&err), BalanceError::Calibration(_)));
    assert!(!p.is_ready());

    // setup failure blocks moves
    let err = p.goto_offset(0).unwrap_err();
    assert!(matches!(balance_err(&err), BalanceError::Configuration(_)));
}

#[test]
fn setup_resets_then_tares_each_channel() {
    let rig = SimRig::default();
    let (mut p, _clock) = positioner_on(&rig, ControlCfg::default(), calibrated(), None);
    p.setup().unwrap();
    assert!(p.is_ready());
    assert_eq!(p.state(), BalancerState::Idle);
    for ch in [Channel::One, Channel::Two] {
        assert_eq!(rig.resets(ch), 1);
        assert_eq!(rig.reads(ch), 15);
    }
    assert!(rig.driver_enabled());

    // channel 1 is reset then tared, and only then channel 2
    let mut expected = vec![RigEvent::Reset(Channel::One)];
    expected.extend(std::iter::repeat_n(RigEvent::Read(Channel::One), 15));
    expected.push(RigEvent::Reset(Channel::Two));
    expected.extend(std::iter::repeat_n(RigEvent::Read(Channel::Two), 15));
    assert_eq!(rig.events(), expected);

    let (c1, c2) = p.channels();
    assert_eq!(c1.reference_unit(), COUNTS_PER_GRAM);
    assert_eq!(c2.reference_unit(), COUNTS_PER_GRAM);
}

#[test]
fn failed_tare_leaves_reference_unit_unset() {
    let rig = SimRig::default();
    rig.set_timeout(Channel::Two, true);
    let (mut p, _clock) = positioner_on(&rig, ControlCfg::default(), calibrated(), None);

    let err = p.setup().unwrap_err();
    assert_eq!(balance_err(&err), &BalanceError::SensorTimeout);
    assert!(!p.is_ready());

    // channel 2 was reset, its tare failed, so its unit was never applied
    let (c1, c2) = p.channels();
    assert!(c1.is_tared());
    assert_eq!(c1.reference_unit(), COUNTS_PER_GRAM);
    assert!(!c2.is_tared());
    assert_eq!(c2.reference_unit(), 0.0);
    assert_eq!(rig.resets(Channel::Two), 1);
    assert_eq!(rig.events().last(), Some(&RigEvent::Reset(Channel::Two)));
}

#[rstest]
#[case(101)]
#[case(-101)]
#[case(i32::MAX)]
fn out_of_range_offsets_are_rejected(#[case] offset: i32) {
    let (rig, mut p, _clock) = ready_rig(100.0, 100.0, SimRigCfg::default());
    let err = p.goto_offset(offset).unwrap_err();
    assert_eq!(balance_err(&err), &BalanceError::InvalidTarget(offset));
    assert_eq!(rig.steps_applied(), 0);
}

#[test]
fn end_stop_turns_into_non_convergence() {
    let rig_cfg = SimRigCfg {
        rail_steps: 10,
        ..SimRigCfg::default()
    };
    let rig = SimRig::new(rig_cfg);
    let control = ControlCfg {
        max_steps: 200,
        ..ControlCfg::default()
    };
    let (mut p, _clock) = positioner_on(&rig, control, calibrated(), None);
    p.setup().unwrap();
    rig.place_loads(100.0, 100.0);

    let err = p.goto_offset(-100).unwrap_err();
    match balance_err(&err) {
        BalanceError::NonConvergence { steps, last_diff_g } => {
            assert_eq!(*steps, 200);
            // 10 steps of 0.25 g each way
            assert!((last_diff_g + 5.0).abs() < 1e-3);
        }
        other => panic!("expected NonConvergence, got {other:?}"),
    }
    assert_eq!(rig.position(), 10);
    assert_eq!(rig.steps_absorbed(), 190);
    assert_eq!(p.state(), BalancerState::Idle);
}

#[test]
fn sensor_timeout_aborts_the_move_where_it_stands() {
    let rig = SimRig::default();
    let checks = Rc::new(Cell::new(0u32));
    let trip = {
        let rig = rig.clone();
        let checks = Rc::clone(&checks);
        move || {
            checks.set(checks.get() + 1);
            if checks.get() == 4 {
                rig.set_timeout(Channel::Two, true);
            }
            false
        }
    };
    let (mut p, _clock) = positioner_on(
        &rig,
        ControlCfg::default(),
        calibrated(),
        Some(Box::new(trip)),
    );
    p.setup().unwrap();
    rig.place_loads(110.0, 100.0);

    let err = p.goto_offset(0).unwrap_err();
    assert_eq!(balance_err(&err), &BalanceError::SensorTimeout);
    // the fourth step went out before the failed re-sample; no rollback
    assert_eq!(rig.position(), 4);
    assert_eq!(p.state(), BalancerState::Idle);
    assert!(p.is_ready(), "a failed move does not undo setup");
}

#[test]
fn interrupt_check_aborts_before_stepping() {
    let rig = SimRig::default();
    let (mut p, _clock) =
        positioner_on(&rig, ControlCfg::default(), calibrated(), Some(Box::new(|| true)));
    p.setup().unwrap();
    rig.place_loads(120.0, 100.0);

    let err = p.goto_offset(0).unwrap_err();
    assert_eq!(balance_err(&err), &BalanceError::Interrupted);
    assert_eq!(rig.steps_applied(), 0);
}

#[test]
fn coarser_resampling_takes_the_same_number_of_steps_per_sample() {
    let rig = SimRig::default();
    let control = ControlCfg {
        resample_every: 4,
        ..ControlCfg::default()
    };
    let (mut p, _clock) = positioner_on(&rig, control, calibrated(), None);
    p.setup().unwrap();
    rig.place_loads(100.0, 100.0);

    let report = p.goto_offset(-20).unwrap();
    assert_eq!(report.offset_steps % 4, 0);
    assert!(report.final_diff_g <= -20.0);
    // 1 sample before the move plus one per 4 steps, 5 reads per channel each
    let samples = 1 + u64::from(report.offset_steps / 4);
    assert_eq!(rig.reads(Channel::One), 15 + samples * 5);
}

#[test]
fn stepper_fault_is_typed_and_fatal() {
    let (rig, mut p, _clock) = ready_rig(105.0, 100.0, SimRigCfg::default());
    rig.set_line_fault(true);
    let err = p.goto_offset(0).unwrap_err();
    assert!(matches!(balance_err(&err), BalanceError::HardwareFault(_)));
    assert_eq!(rig.position(), 0);
}

#[test]
fn disabling_requires_a_new_setup() {
    let (rig, mut p, _clock) = ready_rig(105.0, 100.0, SimRigCfg::default());
    p.disable_stepper().unwrap();
    assert!(!rig.driver_enabled());
    assert!(p.goto_offset(0).is_err());
    p.setup().unwrap();
    assert!(rig.driver_enabled());
}
