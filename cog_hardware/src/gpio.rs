//! Raspberry Pi GPIO backends: owned output lines and HX711 scales.
//!
//! Every pin is claimed exactly once through `rppal`; a pin already held by
//! another owner fails here, before any control code runs.

use std::time::Duration;

use cog_traits::{OutputLine, Scale};
use rppal::gpio::{Gpio, OutputPin};

use crate::error::{HwError, Result};
use crate::hx711::Hx711;

/// Exclusively owned digital output line.
pub struct GpioLine {
    pin: OutputPin,
}

impl GpioLine {
    pub fn pin(&self) -> u8 {
        self.pin.pin()
    }
}

impl OutputLine for GpioLine {
    fn set_high(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_high();
        Ok(())
    }
    fn set_low(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_low();
        Ok(())
    }
}

/// Claim a BCM pin as an output, initially low.
pub fn claim_output(gpio: &Gpio, pin: u8) -> Result<GpioLine> {
    let pin = gpio
        .get(pin)
        .map_err(|e| HwError::Gpio(format!("claim output pin {pin}: {e}")))?
        .into_output_low();
    Ok(GpioLine { pin })
}

/// Claim the stepper driver's step, direction and enable lines.
pub fn claim_stepper_lines(
    gpio: &Gpio,
    step: u8,
    dir: u8,
    enable: u8,
) -> Result<(GpioLine, GpioLine, GpioLine)> {
    Ok((
        claim_output(gpio, step)?,
        claim_output(gpio, dir)?,
        claim_output(gpio, enable)?,
    ))
}

/// HX711-backed load cell channel.
pub struct HardwareScale {
    hx711: Hx711,
    reset_timeout: Duration,
}

impl HardwareScale {
    pub fn new(
        gpio: &Gpio,
        dt_pin: u8,
        sck_pin: u8,
        gain_pulses: u8,
        reset_timeout: Duration,
    ) -> Result<Self> {
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("claim hx711 DT pin {dt_pin}: {e}")))?
            .into_input();
        let sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("claim hx711 SCK pin {sck_pin}: {e}")))?
            .into_output_low();
        Ok(Self {
            hx711: Hx711::new(dt, sck, gain_pulses)?,
            reset_timeout,
        })
    }
}

impl Scale for HardwareScale {
    fn reset(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.hx711.reset(self.reset_timeout).map_err(|e| {
            tracing::error!(error = %e, "hx711 reset failed");
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>
        })
    }

    fn read(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        match self.hx711.read_with_timeout(timeout) {
            Ok(raw) => {
                tracing::trace!(raw, "hx711 sample");
                Ok(raw)
            }
            Err(e) => {
                tracing::error!("Scale read error: {}", e);
                Err(Box::new(e))
            }
        }
    }
}

/// Open the GPIO controller.
pub fn open() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))
}
