//! Core traits and types for cycle-accurate emulation.
//!
//! The CPU never sees memory directly. Every access goes through the
//! [`Bus`] contract, which owns banking, soft switches and the floating bus.

mod bus;
mod clock;
mod cpu;
mod observable;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use ticks::Ticks;
