//! Hardware backends for the CoG balancer.
//!
//! - `sim`: always available; a coupled carriage/load-cell rig used by the
//!   simulation build of the CLI and by tests.
//! - `gpio` / `hx711`: Raspberry Pi backends, behind the `hardware` feature.
pub mod error;
pub mod sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;

pub use error::HwError;
pub use sim::{Channel, RigEvent, SimLine, SimRig, SimRigCfg, SimScale};
