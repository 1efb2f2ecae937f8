//! Positioner state and the report returned by a completed move.

/// Which way the offsetting phase pushes the differential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Target above zero: carriage moves toward channel 1.
    Positive,
    /// Target below zero: carriage moves toward channel 2.
    Negative,
}

/// Where the positioner is in a move.
///
/// `Idle` before setup, after a failed move, and between setup and the first
/// move. A successful move ends in `Converged` until the next one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalancerState {
    #[default]
    Idle,
    Centering,
    Offsetting(Side),
    Converged,
}

impl core::fmt::Display for BalancerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Centering => f.write_str("centering"),
            Self::Offsetting(Side::Positive) => f.write_str("offsetting(+)"),
            Self::Offsetting(Side::Negative) => f.write_str("offsetting(-)"),
            Self::Converged => f.write_str("converged"),
        }
    }
}

/// Outcome of a successful `goto_offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    /// Operator offset as requested.
    pub target_mm: i32,
    /// The same target expressed as a gram differential.
    pub target_g: f32,
    pub centering_steps: u32,
    pub offset_steps: u32,
    /// Last sampled `weight1 - weight2`.
    pub final_diff_g: f32,
}

impl MoveReport {
    pub fn total_steps(&self) -> u32 {
        self.centering_steps.saturating_add(self.offset_steps)
    }
}
