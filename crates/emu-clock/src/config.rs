//! Clock configuration.

use emu_core::MasterClock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timing and debugger behaviour of a [`crate::Clock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// CPU clock.
    pub master: MasterClock,
    /// Frames per second; one frame is the unit of real-time scheduling.
    pub frame_rate: u64,
    /// How far a frame's work may overrun its period before pacing is
    /// re-anchored to the current time.
    pub slack_ms: f64,
    /// Treat BRK as a breakpoint.
    pub stop_on_brk: bool,
    /// Track execution coverage.
    pub coverage: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::apple2()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("frame rate must be non-zero")]
    ZeroFrameRate,
    #[error("clock frequency {frequency_hz} Hz is not a multiple of {frame_rate} frames/s")]
    UnevenFrameRate { frequency_hz: u64, frame_rate: u64 },
    #[error("slack must be a non-negative number of milliseconds, got {0}")]
    InvalidSlack(f64),
}

impl ClockConfig {
    /// Apple II: 1.02 MHz at 60 frames/s, 17 000 cycles per frame.
    #[must_use]
    pub const fn apple2() -> Self {
        Self {
            master: MasterClock::new(1_020_000),
            frame_rate: 60,
            slack_ms: 5.0,
            stop_on_brk: false,
            coverage: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        if !self.master.divides_evenly(self.frame_rate) {
            return Err(ConfigError::UnevenFrameRate {
                frequency_hz: self.master.frequency_hz,
                frame_rate: self.frame_rate,
            });
        }
        if !(self.slack_ms >= 0.0 && self.slack_ms.is_finite()) {
            return Err(ConfigError::InvalidSlack(self.slack_ms));
        }
        Ok(())
    }

    /// CPU cycles in one frame.
    ///
    /// # Panics
    ///
    /// Panics if the frequency is not an exact multiple of the frame rate.
    #[must_use]
    pub const fn cycles_per_frame(&self) -> u64 {
        self.master.ticks_per_frame(self.frame_rate).get()
    }

    /// Length of one frame in milliseconds.
    #[must_use]
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.frame_rate as f64
    }
}
