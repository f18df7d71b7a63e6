//! Scheduler for the 6502 core.
//!
//! Runs whole instructions in frame-sized slices against a wall clock,
//! evaluates stop conditions after every instruction and implements the
//! debugger's step modes on top of the CPU's call/return hooks.

mod breakpoints;
mod clock;
mod config;
mod events;
mod step;
mod time;

pub use breakpoints::{Breakpoint, Breakpoints};
pub use clock::{Clock, ClockState, DebugState, StopHandle};
pub use config::{ClockConfig, ConfigError};
pub use events::{ClockEvent, ClockListener, StopReason};
pub use step::StepMode;
pub use time::{ManualTime, SystemTime, TimeSource};
