//! Cycle-accurate MOS 6502 and WDC 65C02 emulation.
//!
//! The engine executes one bus access per cycle through the
//! [`emu_core::Bus`] contract. Alongside the CPU this crate carries the
//! debugger aids that watch it run: a shadow call stack rebuilt from
//! JSR/RTS and an execution coverage map.

mod alu;
mod coverage;
mod cpu;
pub mod flags;
mod microcode;
mod opcodes;
mod registers;
mod state;
mod vstack;

pub use coverage::{Coverage, CoverageFlags};
pub use cpu::{Cpu65x02, CpuHooks, Latch, Sequence};
pub use flags::Status;
pub use microcode::{Index, Instruction, InstructionTable, MicroOp};
pub use opcodes::{AddressingMode, Descriptor, OpcodeTable, Operation, Variant};
pub use registers::Registers;
pub use state::{CpuState, STATE_VERSION, StateError};
pub use vstack::{Frame, Marker, VirtualStack, VirtualStackState};
