//! Maps `Box<dyn Error>` from trait boundaries to typed `BalanceError`.
//!
//! The traits in `cog_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with a feature-gated path for
//! `cog_hardware::HwError` downcasting.

use crate::error::BalanceError;

/// Map a trait-boundary error to a typed `BalanceError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> BalanceError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<cog_hardware::HwError>() {
            return match hw {
                cog_hardware::HwError::Timeout => BalanceError::SensorTimeout,
                cog_hardware::HwError::DataReadyTimeout => BalanceError::SensorTimeout,
                cog_hardware::HwError::Gpio(msg) => BalanceError::HardwareFault(msg.clone()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        BalanceError::SensorTimeout
    } else {
        BalanceError::Hardware(s)
    }
}
