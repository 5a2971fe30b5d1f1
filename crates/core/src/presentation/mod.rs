//! One-at-a-time presentation of the ranked suggestions

mod rotator;
mod scheduler;

use std::time::Duration;

pub use rotator::{RotationState, Rotator};
pub use scheduler::{effective_period, RotationTask};

pub(crate) use scheduler::lock;

/// How long each suggestion stays on screen before the next one.
pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(8);
