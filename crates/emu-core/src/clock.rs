//! Master clock configuration.

use serde::{Deserialize, Serialize};

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Everything the scheduler does is measured in CPU cycles derived from this
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterClock {
    /// CPU clock frequency in Hz (e.g. `1_020_000` for an Apple II).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Whether the frequency splits into whole frames at `frames_per_second`.
    #[must_use]
    pub const fn divides_evenly(&self, frames_per_second: u64) -> bool {
        frames_per_second != 0 && self.frequency_hz % frames_per_second == 0
    }

    /// Ticks per frame at the given frame rate.
    ///
    /// # Panics
    ///
    /// Panics if the frequency is not an exact multiple of the frame rate.
    /// That is a configuration bug, not a runtime condition.
    #[must_use]
    pub const fn ticks_per_frame(&self, frames_per_second: u64) -> Ticks {
        assert!(
            self.divides_evenly(frames_per_second),
            "clock frequency must be an exact multiple of the frame rate"
        );
        Ticks::new(self.frequency_hz / frames_per_second)
    }
}
