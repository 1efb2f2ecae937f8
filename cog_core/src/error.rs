use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    /// Pins unavailable, or the positioner used before a successful setup.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Reference unit zero/unset or channel not tared.
    #[error("calibration error: {0}")]
    Calibration(String),
    #[error("timeout waiting for load cell")]
    SensorTimeout,
    #[error("move did not converge after {steps} steps (differential {last_diff_g:.2} g)")]
    NonConvergence { steps: u32, last_diff_g: f32 },
    #[error("target offset {0} mm outside [-100, 100]")]
    InvalidTarget(i32),
    #[error("move interrupted")]
    Interrupted,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cell channels")]
    MissingChannels,
    #[error("missing stepper lines")]
    MissingStepper,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
