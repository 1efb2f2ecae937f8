//! Hardware seams for the CoG balancer.
//!
//! The control core only talks to hardware through these traits, so the same
//! loop runs against Raspberry Pi GPIO, the simulated rig, or a test double.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// A single digital output line (step, direction or enable).
pub trait OutputLine {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Drive the line to `high` (true) or low (false).
    fn set_level(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if high { self.set_high() } else { self.set_low() }
    }
}

/// One load-cell amplifier channel producing raw signed counts.
pub trait Scale {
    /// Reinitialize the amplifier's gain/protocol state.
    fn reset(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Take one raw conversion, failing instead of blocking past `timeout`.
    fn read(&mut self, timeout: Duration) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: OutputLine + ?Sized> OutputLine for Box<T> {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_high()
    }
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_low()
    }
}

impl<T: Scale + ?Sized> Scale for Box<T> {
    fn reset(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).reset()
    }
    fn read(&mut self, timeout: Duration) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}
