//! Backend assembly, positioner wiring, and the operator commands.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cog_core::error::{BalanceError, Result};
use cog_core::{LoadCellChannel, MoveReport, Positioner, SamplingCfg};
use cog_hardware::SimRig;
use cog_traits::{Clock, MonotonicClock, OutputLine, Scale};
use eyre::WrapErr;
use serde_json::json;

use crate::error_fmt::humanize;

/// What stands in for the operator's hands: nothing on real hardware, the rig
/// itself in simulation.
#[cfg_attr(not(all(feature = "hardware", target_os = "linux")), allow(dead_code))]
pub enum Bench {
    Hardware,
    Sim { rig: SimRig, loads_g: (f32, f32) },
}

impl Bench {
    /// The airframe goes on after both cells are tared.
    fn airframe_on(&self) {
        if let Self::Sim { rig, loads_g } = self {
            rig.place_loads(loads_g.0, loads_g.1);
            tracing::debug!(load_1_g = loads_g.0, load_2_g = loads_g.1, "sim airframe placed");
        }
    }

    fn mass_on(&self, channel: u8, grams: f32) {
        if let Self::Sim { rig, .. } = self {
            match channel {
                1 => rig.place_loads(grams, 0.0),
                _ => rig.place_loads(0.0, grams),
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Sim { .. } => "sim",
        }
    }
}

/// Claimed sensors and lines, not yet wired into a positioner.
pub struct Backend {
    pub scale_1: Box<dyn Scale>,
    pub scale_2: Box<dyn Scale>,
    pub step: Box<dyn OutputLine>,
    pub dir: Box<dyn OutputLine>,
    pub enable: Box<dyn OutputLine>,
    pub bench: Bench,
}

/// Claim every GPIO pin the config names. A pin that cannot be claimed is a
/// configuration error.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open_backend(cfg: &cog_config::Config) -> Result<Backend> {
    use cog_hardware::gpio;

    let as_config =
        |e: cog_hardware::HwError| eyre::Report::new(BalanceError::Configuration(e.to_string()));
    let io = gpio::open().map_err(as_config)?;
    let pins = &cfg.pins;
    let reset_timeout = Duration::from_millis(cfg.hardware.sensor_read_timeout_ms);
    let gain = cfg.hardware.gain_pulses;

    let scale_1 = gpio::HardwareScale::new(
        &io,
        pins.load_cell_1_dt,
        pins.load_cell_1_sck,
        gain,
        reset_timeout,
    )
    .map_err(as_config)
    .wrap_err("open hx711 channel 1")?;
    let scale_2 = gpio::HardwareScale::new(
        &io,
        pins.load_cell_2_dt,
        pins.load_cell_2_sck,
        gain,
        reset_timeout,
    )
    .map_err(as_config)
    .wrap_err("open hx711 channel 2")?;
    let (step, dir, enable) = gpio::claim_stepper_lines(
        &io,
        pins.stepper_step,
        pins.stepper_dir,
        pins.stepper_enable,
    )
    .map_err(as_config)
    .wrap_err("open stepper pins")?;

    tracing::info!(
        step = pins.stepper_step,
        dir = pins.stepper_dir,
        enable = pins.stepper_enable,
        "gpio claimed"
    );
    Ok(Backend {
        scale_1: Box::new(scale_1),
        scale_2: Box::new(scale_2),
        step: Box::new(step),
        dir: Box::new(dir),
        enable: Box::new(enable),
        bench: Bench::Hardware,
    })
}

/// Build the simulated rig from `[simulation]`.
///
/// `COG_SIM_TIMEOUT=1` makes channel 2 time out on every read.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open_backend(cfg: &cog_config::Config) -> Result<Backend> {
    use cog_hardware::{Channel, SimRigCfg};

    let sim = &cfg.simulation;
    let rig = SimRig::new(SimRigCfg {
        grams_per_step: sim.grams_per_step,
        counts_per_gram: [sim.counts_per_gram; 2],
        noise_g: sim.noise_g,
        rail_steps: sim.rail_steps,
        enable_active_low: cfg.stepper.enable_active_low,
        seed: sim.seed,
        ..SimRigCfg::default()
    });
    if std::env::var("COG_SIM_TIMEOUT").is_ok_and(|v| v == "1") {
        rig.set_timeout(Channel::Two, true);
    }
    tracing::info!(
        load_1_g = sim.load_1_g,
        load_2_g = sim.load_2_g,
        grams_per_step = sim.grams_per_step,
        "using simulated rig"
    );
    Ok(Backend {
        scale_1: Box::new(rig.scale(Channel::One)),
        scale_2: Box::new(rig.scale(Channel::Two)),
        step: Box::new(rig.step_line()),
        dir: Box::new(rig.dir_line()),
        enable: Box::new(rig.enable_line()),
        bench: Bench::Sim {
            rig,
            loads_g: (sim.load_1_g, sim.load_2_g),
        },
    })
}

/// Wire a backend into a positioner. The shutdown flag aborts moves between steps.
pub fn assemble(
    cfg: &cog_config::Config,
    backend: Backend,
    sample_override: Option<usize>,
    shutdown: Arc<AtomicBool>,
) -> Result<(Positioner, Bench)> {
    let mut sampling = SamplingCfg::from(cfg);
    if let Some(n) = sample_override {
        sampling.sample_count = n;
    }
    let positioner = Positioner::builder()
        .with_channels(backend.scale_1, backend.scale_2)
        .with_stepper(backend.step, backend.dir, backend.enable)
        .with_sampling(sampling)
        .with_control((&cfg.control).into())
        .with_stepper_cfg((&cfg.stepper).into())
        .with_reference_units((&cfg.calibration).into())
        .with_interrupt_check(move || shutdown.load(Ordering::Relaxed))
        .build()?;
    Ok((positioner, backend.bench))
}

fn set_up(positioner: &mut Positioner, bench: &Bench) -> Result<()> {
    positioner.setup().wrap_err("positioner setup")?;
    bench.airframe_on();
    Ok(())
}

fn print_report(json: bool, report: &MoveReport, positioner: &Positioner) {
    if json {
        println!(
            "{}",
            json!({
                "event": "move",
                "target_mm": report.target_mm,
                "target_g": report.target_g,
                "centering_steps": report.centering_steps,
                "offset_steps": report.offset_steps,
                "final_diff_g": report.final_diff_g,
                "state": positioner.state().to_string(),
            })
        );
    } else {
        println!(
            "Reached offset {} mm: differential {:.2} g after {} steps ({} centering, {} offsetting).",
            report.target_mm,
            report.final_diff_g,
            report.total_steps(),
            report.centering_steps,
            report.offset_steps
        );
    }
}

/// After an interrupt the driver is released so the carriage can be moved by hand.
fn release_if_interrupted(positioner: &mut Positioner, shutdown: &AtomicBool) {
    if shutdown.load(Ordering::Relaxed) {
        if let Err(e) = positioner.disable_stepper() {
            tracing::warn!(error = %e, "disabling stepper after interrupt failed");
        }
    }
}

pub fn run_goto(
    positioner: &mut Positioner,
    bench: &Bench,
    offset_mm: i32,
    json: bool,
    shutdown: &AtomicBool,
) -> Result<()> {
    set_up(positioner, bench)?;
    let result = positioner.goto_offset(offset_mm);
    release_if_interrupted(positioner, shutdown);
    let report = result?;
    print_report(json, &report, positioner);
    Ok(())
}

/// The serialized operator loop: one move at a time, each line one offset.
///
/// A failed move is reported and the loop keeps going; an interrupt ends it.
pub fn run_console(
    positioner: &mut Positioner,
    bench: &Bench,
    input: impl BufRead,
    json: bool,
    shutdown: &AtomicBool,
) -> Result<()> {
    set_up(positioner, bench)?;
    if !json {
        println!("Ready. Enter an offset in mm (-100..=100), or q to quit.");
    }
    for line in input.lines() {
        if shutdown.load(Ordering::Relaxed) {
            release_if_interrupted(positioner, shutdown);
            return Err(eyre::Report::new(BalanceError::Interrupted));
        }
        let line = line.wrap_err("reading operator input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        let Ok(offset_mm) = line.parse::<i32>() else {
            if json {
                println!("{}", json!({ "event": "input_error", "input": line }));
            } else {
                println!("Not an offset: {line:?}");
            }
            continue;
        };
        match positioner.goto_offset(offset_mm) {
            Ok(report) => print_report(json, &report, positioner),
            Err(e) => {
                if matches!(e.downcast_ref::<BalanceError>(), Some(BalanceError::Interrupted)) {
                    release_if_interrupted(positioner, shutdown);
                    return Err(e);
                }
                tracing::error!(error = %format!("{e:#}"), "move failed");
                if json {
                    println!("{}", crate::error_fmt::format_error_json(&e));
                } else {
                    println!("{}", humanize(&e));
                }
            }
        }
    }
    tracing::info!("console closed");
    Ok(())
}

pub fn run_read(positioner: &mut Positioner, bench: &Bench, json: bool) -> Result<()> {
    set_up(positioner, bench)?;
    let (w1, w2) = positioner.read_weights()?;
    let diff = w1 - w2;
    if json {
        println!(
            "{}",
            json!({ "event": "read", "weight_1_g": w1, "weight_2_g": w2, "differential_g": diff })
        );
    } else {
        println!("channel 1: {w1:.2} g\nchannel 2: {w2:.2} g\ndifferential: {diff:.2} g");
    }
    Ok(())
}

/// Tare one channel, wait for the known mass, report counts per gram.
pub fn run_calibrate(
    cfg: &cog_config::Config,
    backend: Backend,
    channel: u8,
    known_grams: f32,
    settle_ms: u64,
    json: bool,
) -> Result<()> {
    if !known_grams.is_finite() || known_grams <= 0.0 {
        return Err(eyre::Report::new(BalanceError::Calibration(format!(
            "known mass must be > 0 g (got {known_grams})"
        ))));
    }
    let sampling = SamplingCfg::from(cfg);
    let timeout = Duration::from_millis(sampling.sensor_timeout_ms);
    let scale = if channel == 1 {
        backend.scale_1
    } else {
        backend.scale_2
    };
    let mut cell = LoadCellChannel::new(format!("load_cell_{channel}"), scale, timeout);

    cell.reset()?;
    cell.tare(sampling.tare_samples)?;
    if !json {
        println!("Place {known_grams} g on channel {channel} ...");
    }
    backend.bench.mass_on(channel, known_grams);
    MonotonicClock::new().sleep(Duration::from_millis(settle_ms));

    let counts = cell.get_value(sampling.tare_samples)?;
    let unit = (counts / f64::from(known_grams)) as f32;
    if unit == 0.0 || !unit.is_finite() {
        return Err(eyre::Report::new(BalanceError::Calibration(format!(
            "channel {channel} did not respond to the {known_grams} g mass"
        ))));
    }
    tracing::info!(channel, unit, counts, "calibrated");
    if json {
        println!(
            "{}",
            json!({
                "event": "calibrate",
                "channel": channel,
                "known_grams": known_grams,
                "reference_unit": unit,
            })
        );
    } else {
        println!("reference_unit_{channel} = {unit:.3}");
    }
    Ok(())
}

pub fn run_self_check(backend: &Backend, json: bool) {
    let backend_name = backend.bench.name();
    if json {
        println!("{}", json!({ "event": "self_check", "backend": backend_name, "ok": true }));
    } else {
        println!("self-check ok ({backend_name})");
    }
}
