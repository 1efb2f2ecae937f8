//! Simulated balancing rig: a carriage on a rail between two load cells.
//!
//! The rig couples actuation to sensing the way the real airframe does. Each
//! rising edge on the step line (while the driver is enabled) moves the
//! carriage one step, and each step shifts `grams_per_step` between the two
//! cells. A high direction line moves the carriage toward channel 2, which
//! lowers `weight1 - weight2`.
//!
//! All handles share one `Rc<RefCell<_>>`, so the rig is single-threaded like
//! the control loop that drives it.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use cog_traits::{OutputLine, Scale};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::error::HwError;

/// Which of the two load cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    One,
    Two,
}

/// The event log keeps only this many entries from the start of a run.
const EVENT_LOG_CAP: usize = 4_096;

/// Sensor-side activity, in the order the rig saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigEvent {
    Reset(Channel),
    Read(Channel),
}

impl Channel {
    fn idx(self) -> usize {
        match self {
            Channel::One => 0,
            Channel::Two => 1,
        }
    }
}

/// Physical parameters of the simulated rig.
#[derive(Debug, Clone)]
pub struct SimRigCfg {
    /// Grams moved from channel 1 to channel 2 per forward step.
    pub grams_per_step: f32,
    /// Raw counts per gram for each amplifier.
    pub counts_per_gram: [f32; 2],
    /// Raw reading of each unloaded cell.
    pub zero_counts: [i32; 2],
    /// Standard deviation of additive read noise, in grams. 0 disables noise.
    pub noise_g: f32,
    /// Carriage travel from center to either end stop, in steps.
    pub rail_steps: i32,
    /// Treat a low enable line as "driver enabled" (TMC2225 style).
    pub enable_active_low: bool,
    /// RNG seed for reproducible noise.
    pub seed: u64,
}

impl Default for SimRigCfg {
    fn default() -> Self {
        Self {
            grams_per_step: 0.25,
            counts_per_gram: [420.0, 420.0],
            zero_counts: [8_000, -3_000],
            noise_g: 0.0,
            rail_steps: 2_000,
            enable_active_low: true,
            seed: 7,
        }
    }
}

struct RigState {
    cfg: SimRigCfg,
    position: i32,
    loads_g: [f32; 2],
    step_level: bool,
    dir_level: bool,
    enable_level: bool,
    steps_applied: u64,
    steps_absorbed: u64,
    timeout: [bool; 2],
    line_fault: bool,
    reads: [u64; 2],
    resets: [u64; 2],
    events: Vec<RigEvent>,
    rng: StdRng,
    noise: Option<Normal<f32>>,
}

impl RigState {
    fn driver_enabled(&self) -> bool {
        self.enable_level != self.cfg.enable_active_low
    }

    fn log(&mut self, event: RigEvent) {
        if self.events.len() < EVENT_LOG_CAP {
            self.events.push(event);
        }
    }

    fn weight_g(&self, ch: Channel) -> f32 {
        let shift = self.position as f32 * self.cfg.grams_per_step;
        match ch {
            Channel::One => self.loads_g[0] - shift,
            Channel::Two => self.loads_g[1] + shift,
        }
    }

    fn apply_step(&mut self) {
        if !self.driver_enabled() {
            return;
        }
        let next = if self.dir_level {
            self.position + 1
        } else {
            self.position - 1
        };
        if next.abs() > self.cfg.rail_steps {
            self.steps_absorbed += 1;
            tracing::trace!(position = self.position, "sim carriage at end stop");
            return;
        }
        self.position = next;
        self.steps_applied += 1;
    }
}

/// Shared handle to the simulated rig.
#[derive(Clone)]
pub struct SimRig {
    state: Rc<RefCell<RigState>>,
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new(SimRigCfg::default())
    }
}

impl SimRig {
    pub fn new(cfg: SimRigCfg) -> Self {
        let noise = if cfg.noise_g.is_finite() && cfg.noise_g > 0.0 {
            Normal::new(0.0, cfg.noise_g).ok()
        } else {
            None
        };
        let rng = StdRng::seed_from_u64(cfg.seed);
        Self {
            state: Rc::new(RefCell::new(RigState {
                cfg,
                position: 0,
                loads_g: [0.0; 2],
                step_level: false,
                dir_level: false,
                enable_level: true,
                steps_applied: 0,
                steps_absorbed: 0,
                timeout: [false; 2],
                line_fault: false,
                reads: [0; 2],
                resets: [0; 2],
                events: Vec::new(),
                rng,
                noise,
            })),
        }
    }

    pub fn step_line(&self) -> SimLine {
        self.line(LineKind::Step)
    }

    pub fn dir_line(&self) -> SimLine {
        self.line(LineKind::Dir)
    }

    pub fn enable_line(&self) -> SimLine {
        self.line(LineKind::Enable)
    }

    fn line(&self, kind: LineKind) -> SimLine {
        SimLine {
            state: Rc::clone(&self.state),
            kind,
        }
    }

    pub fn scale(&self, channel: Channel) -> SimScale {
        SimScale {
            state: Rc::clone(&self.state),
            channel,
        }
    }

    /// Put the airframe on the cells (static load on top of the carriage shift).
    pub fn place_loads(&self, load_1_g: f32, load_2_g: f32) {
        self.state.borrow_mut().loads_g = [load_1_g, load_2_g];
    }

    /// Make every read on `channel` fail with a timeout.
    pub fn set_timeout(&self, channel: Channel, timeout: bool) {
        self.state.borrow_mut().timeout[channel.idx()] = timeout;
    }

    /// Make every line write fail with a GPIO error.
    pub fn set_line_fault(&self, fault: bool) {
        self.state.borrow_mut().line_fault = fault;
    }

    /// Carriage position in steps; positive is toward channel 2.
    pub fn position(&self) -> i32 {
        self.state.borrow().position
    }

    /// Noise-free weight on `channel`.
    pub fn weight_g(&self, channel: Channel) -> f32 {
        self.state.borrow().weight_g(channel)
    }

    /// Noise-free `weight1 - weight2`.
    pub fn differential_g(&self) -> f32 {
        let s = self.state.borrow();
        s.weight_g(Channel::One) - s.weight_g(Channel::Two)
    }

    pub fn steps_applied(&self) -> u64 {
        self.state.borrow().steps_applied
    }

    pub fn steps_absorbed(&self) -> u64 {
        self.state.borrow().steps_absorbed
    }

    pub fn reads(&self, channel: Channel) -> u64 {
        self.state.borrow().reads[channel.idx()]
    }

    pub fn resets(&self, channel: Channel) -> u64 {
        self.state.borrow().resets[channel.idx()]
    }

    /// Successful resets and reads so far, oldest first (capped).
    pub fn events(&self) -> Vec<RigEvent> {
        self.state.borrow().events.clone()
    }

    pub fn driver_enabled(&self) -> bool {
        self.state.borrow().driver_enabled()
    }

    /// Current level of the direction line.
    pub fn dir_level(&self) -> bool {
        self.state.borrow().dir_level
    }
}

#[derive(Debug, Clone, Copy)]
enum LineKind {
    Step,
    Dir,
    Enable,
}

/// One of the rig's stepper driver inputs.
pub struct SimLine {
    state: Rc<RefCell<RigState>>,
    kind: LineKind,
}

impl SimLine {
    fn write(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.borrow_mut();
        if s.line_fault {
            return Err(Box::new(HwError::Gpio(format!(
                "simulated fault writing {:?} line",
                self.kind
            ))));
        }
        match self.kind {
            LineKind::Step => {
                let rising = high && !s.step_level;
                s.step_level = high;
                if rising {
                    s.apply_step();
                }
            }
            LineKind::Dir => s.dir_level = high,
            LineKind::Enable => s.enable_level = high,
        }
        Ok(())
    }
}

impl OutputLine for SimLine {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(true)
    }
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write(false)
    }
}

/// One simulated HX711 channel.
pub struct SimScale {
    state: Rc<RefCell<RigState>>,
    channel: Channel,
}

impl Scale for SimScale {
    fn reset(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.borrow_mut();
        s.resets[self.channel.idx()] += 1;
        s.log(RigEvent::Reset(self.channel));
        Ok(())
    }

    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.borrow_mut();
        let i = self.channel.idx();
        if s.timeout[i] {
            return Err(Box::new(HwError::Timeout));
        }
        s.reads[i] += 1;
        s.log(RigEvent::Read(self.channel));
        let mut grams = s.weight_g(self.channel);
        if let Some(noise) = s.noise {
            grams += noise.sample(&mut s.rng);
        }
        let counts = (grams * s.cfg.counts_per_gram[i]).round() as i32;
        let raw = s.cfg.zero_counts[i].saturating_add(counts);
        tracing::trace!(channel = ?self.channel, raw, "sim scale read");
        Ok(raw)
    }
}
