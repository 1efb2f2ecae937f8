use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the HX711 DOUT line (read through `is_high`) drops low, which
/// signals a finished conversion, or fail once `timeout` expires.
/// Sleeps `poll_interval` between polls instead of spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Sign-extend a 24-bit two's complement HX711 sample to `i32`.
#[inline]
pub fn sign_extend_24(value: u32) -> i32 {
    let v = (value & 0x00FF_FFFF) as i32;
    if v & 0x0080_0000 != 0 { v | !0x00FF_FFFF } else { v }
}
