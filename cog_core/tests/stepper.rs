use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use cog_core::{BalanceError, StepperCfg, StepperDriver};
use cog_traits::OutputLine;
use cog_traits::clock::test_clock::TestClock;
use rstest::rstest;

type Log = Rc<RefCell<Vec<(&'static str, bool)>>>;

/// Records every write as (line name, level).
struct RecordingLine {
    name: &'static str,
    log: Log,
}

impl OutputLine for RecordingLine {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log.borrow_mut().push((self.name, true));
        Ok(())
    }
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.log.borrow_mut().push((self.name, false));
        Ok(())
    }
}

fn driver(cfg: StepperCfg) -> (StepperDriver<RecordingLine>, Log, TestClock) {
    let log: Log = Rc::default();
    let line = |name| RecordingLine {
        name,
        log: Rc::clone(&log),
    };
    let clock = TestClock::new();
    let d = StepperDriver::new(
        line("step"),
        line("dir"),
        line("enable"),
        cfg,
        Arc::new(clock.clone()),
    );
    (d, log, clock)
}

fn state_err(e: &eyre::Report) -> bool {
    matches!(e.downcast_ref::<BalanceError>(), Some(BalanceError::State(_)))
}

#[rstest]
#[case(true, false)]
#[case(false, true)]
fn initialize_drives_idle_levels(#[case] active_low: bool, #[case] enable_level: bool) {
    let (mut d, log, _clock) = driver(StepperCfg {
        enable_active_low: active_low,
        ..StepperCfg::default()
    });
    d.initialize().unwrap();
    assert_eq!(
        *log.borrow(),
        vec![("step", false), ("dir", false), ("enable", enable_level)]
    );
    assert!(d.is_enabled());
    assert_eq!(d.direction(), None);
}

#[test]
fn step_is_high_dwell_low_dwell() {
    let (mut d, log, clock) = driver(StepperCfg {
        dwell_us: 250,
        ..StepperCfg::default()
    });
    d.initialize().unwrap();
    d.set_direction(true).unwrap();
    log.borrow_mut().clear();

    d.step().unwrap();

    assert_eq!(*log.borrow(), vec![("step", true), ("step", false)]);
    assert_eq!(clock.elapsed(), Duration::from_micros(500));
    assert_eq!(d.steps_emitted(), 1);
}

#[test]
fn set_direction_only_touches_direction_line() {
    let (mut d, log, clock) = driver(StepperCfg::default());
    d.initialize().unwrap();
    log.borrow_mut().clear();
    d.set_direction(true).unwrap();
    d.set_direction(false).unwrap();
    assert_eq!(*log.borrow(), vec![("dir", true), ("dir", false)]);
    assert_eq!(clock.elapsed(), Duration::ZERO);
    assert_eq!(d.direction(), Some(false));
}

#[test]
fn step_requires_initialize() {
    let (mut d, log, _clock) = driver(StepperCfg::default());
    d.set_direction(true).unwrap();
    let err = d.step().unwrap_err();
    assert!(state_err(&err));
    assert!(log.borrow().iter().all(|(name, _)| *name != "step"));
}

#[test]
fn step_requires_a_direction_for_this_move() {
    let (mut d, _log, _clock) = driver(StepperCfg::default());
    d.initialize().unwrap();
    assert!(state_err(&d.step().unwrap_err()));

    d.set_direction(false).unwrap();
    d.step().unwrap();

    d.begin_move();
    assert!(state_err(&d.step().unwrap_err()));
    assert_eq!(d.steps_emitted(), 1);
}

#[test]
fn disable_deasserts_enable_and_blocks_steps() {
    let (mut d, log, _clock) = driver(StepperCfg::default());
    d.initialize().unwrap();
    d.set_direction(true).unwrap();
    d.disable().unwrap();
    assert_eq!(log.borrow().last(), Some(&("enable", true)));
    assert!(!d.is_enabled());
    assert!(state_err(&d.step().unwrap_err()));
}

#[test]
fn line_failure_propagates_without_retry() {
    struct Broken;
    impl OutputLine for Broken {
        fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err(Box::new(cog_hardware::HwError::Gpio("pin 17 released".into())))
        }
        fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err(Box::new(cog_hardware::HwError::Gpio("pin 17 released".into())))
        }
    }
    let mut d = StepperDriver::new(
        Broken,
        Broken,
        Broken,
        StepperCfg::default(),
        Arc::new(TestClock::new()),
    );
    let err = d.initialize().unwrap_err();
    assert_eq!(
        err.downcast_ref::<BalanceError>(),
        Some(&BalanceError::HardwareFault("pin 17 released".into()))
    );
    assert!(!d.is_enabled());
}
