//! Bit-banged HX711 driver on Raspberry Pi GPIO.

use std::time::Duration;

use rppal::gpio::{InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{sign_extend_24, wait_until_low_with_timeout};

/// SCK must stay high longer than 60 µs to power the chip down.
const POWER_DOWN_HOLD: Duration = Duration::from_micros(100);
const DATA_READY_POLL: Duration = Duration::from_micros(200);

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn new(dt: InputPin, mut sck: OutputPin, gain_pulses: u8) -> Result<Self> {
        if !(25..=27).contains(&gain_pulses) {
            return Err(HwError::Gpio(format!(
                "hx711 gain pulses must be 25, 26 or 27, got {gain_pulses}"
            )));
        }
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses,
        })
    }

    /// Power-cycle the chip and discard one conversion so the configured gain
    /// is in effect for the next read.
    pub fn reset(&mut self, timeout: Duration) -> Result<()> {
        self.sck.set_high();
        std::thread::sleep(POWER_DOWN_HOLD);
        self.sck.set_low();
        let _ = self.read_with_timeout(timeout)?;
        trace!("hx711 reset");
        Ok(())
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, DATA_READY_POLL)?;

        // Clock out 24 bits, MSB first
        let mut value: u32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | u32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Extra pulses select gain/channel for the next conversion
        for _ in 24..self.gain_pulses {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        let raw = sign_extend_24(value);
        trace!(raw, "hx711 raw read");
        Ok(raw)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}
