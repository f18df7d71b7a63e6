//! Versioned CPU snapshot.
//!
//! A snapshot carries the in-flight micro-op position, so restoring one taken
//! mid-instruction (or mid-interrupt) resumes on the exact next cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::{Cpu65x02, Latch, Sequence};
use crate::microcode::INTERRUPT;
use crate::opcodes::Variant;
use crate::vstack::VirtualStackState;
use crate::{Registers, Status};

/// Current snapshot format version.
pub const STATE_VERSION: u32 = 1;

/// Complete CPU state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub version: u32,
    pub variant: Variant,
    /// Raw PC; one past the prefetched opcode at an instruction boundary.
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// The six real flags.
    pub ps: u8,
    pub t: u8,
    pub cycles: u64,
    pub pending_nmi: bool,
    pub pending_irq: bool,
    pub opcode: u8,
    pub sequence: Sequence,
    pub latch: Latch,
    pub vstack: VirtualStackState,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("unsupported CPU state version {0}")]
    UnsupportedVersion(u32),
    #[error("state was saved from a {found:?} but this CPU is a {expected:?}")]
    VariantMismatch { expected: Variant, found: Variant },
    #[error("micro-op position {t} is outside the {sequence:?} sequence ({len} steps)")]
    InvalidPosition { sequence: Sequence, t: u8, len: u8 },
}

impl Cpu65x02 {
    #[must_use]
    pub fn state(&self) -> CpuState {
        CpuState {
            version: STATE_VERSION,
            variant: self.variant,
            pc: self.regs.pc,
            sp: self.regs.s,
            a: self.regs.a,
            x: self.regs.x,
            y: self.regs.y,
            ps: self.regs.p.bits(),
            t: self.t,
            cycles: self.cycles,
            pending_nmi: self.nmi_pending,
            pending_irq: self.irq_pending,
            opcode: self.opcode,
            sequence: self.sequence,
            latch: self.latch,
            vstack: self.vstack.state(),
        }
    }

    /// Restore a snapshot. Nothing changes if it is rejected.
    pub fn set_state(&mut self, state: &CpuState) -> Result<(), StateError> {
        if state.version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(state.version));
        }
        if state.variant != self.variant {
            return Err(StateError::VariantMismatch {
                expected: self.variant,
                found: state.variant,
            });
        }
        let len = match state.sequence {
            Sequence::Opcode => self.instruction_len(state.opcode),
            Sequence::Irq | Sequence::Nmi => INTERRUPT.len() as u8,
        };
        if state.t >= len {
            return Err(StateError::InvalidPosition {
                sequence: state.sequence,
                t: state.t,
                len,
            });
        }

        self.regs = Registers {
            a: state.a,
            x: state.x,
            y: state.y,
            s: state.sp,
            pc: state.pc,
            p: Status::from_byte(state.ps),
        };
        self.t = state.t;
        self.cycles = state.cycles;
        self.nmi_pending = state.pending_nmi;
        self.irq_pending = state.pending_irq;
        self.opcode = state.opcode;
        self.sequence = state.sequence;
        self.latch = state.latch;
        self.vstack.restore(&state.vstack);
        Ok(())
    }
}
