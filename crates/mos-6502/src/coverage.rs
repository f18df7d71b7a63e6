//! Per-address execution coverage.
//!
//! Every executed instruction marks its address and classifies where control
//! went next. Consumers pull only the cells that changed since the last
//! flush, scanning just the address range touched in between.

use bitflags::bitflags;

use crate::opcodes::{OpcodeTable, Variant};

bitflags! {
    /// Classification of one address.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CoverageFlags: u8 {
        const EXECUTED = 0x01;
        const BRANCH_TARGET = 0x02;
        const JUMP_TARGET = 0x04;
        const CALL_TARGET = 0x08;
        const RETURN_TARGET = 0x10;
    }
}

#[derive(Debug)]
pub struct Coverage {
    opcodes: &'static OpcodeTable,
    current: Box<[u8]>,
    flushed: Box<[u8]>,
    /// Lowest and highest address marked since the last flush.
    dirty: Option<(u16, u16)>,
}

impl Coverage {
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        Self {
            opcodes: OpcodeTable::get(variant),
            current: vec![0; 0x10000].into_boxed_slice(),
            flushed: vec![0; 0x10000].into_boxed_slice(),
            dirty: None,
        }
    }

    /// Record one instruction that started at `start` and left PC at `end`.
    pub fn step(&mut self, start: u16, end: u16, opcode: u8) {
        self.mark(start, CoverageFlags::EXECUTED);

        let descriptor = self.opcodes.lookup(opcode);
        let target = if descriptor.is_branch() {
            let fall_through = start.wrapping_add(u16::from(descriptor.bytes));
            (end != fall_through).then_some(CoverageFlags::BRANCH_TARGET)
        } else if descriptor.is_call() {
            Some(CoverageFlags::CALL_TARGET)
        } else if descriptor.is_jump() {
            Some(CoverageFlags::JUMP_TARGET)
        } else if descriptor.is_return() {
            Some(CoverageFlags::RETURN_TARGET)
        } else {
            None
        };

        if let Some(flags) = target {
            self.mark(end, flags);
        }
    }

    fn mark(&mut self, address: u16, flags: CoverageFlags) {
        self.current[address as usize] |= flags.bits();
        self.dirty = Some(match self.dirty {
            Some((low, high)) => (low.min(address), high.max(address)),
            None => (address, address),
        });
    }

    #[must_use]
    pub fn get(&self, address: u16) -> CoverageFlags {
        CoverageFlags::from_bits_truncate(self.current[address as usize])
    }

    /// Call `f` for every address whose flags changed since the last call.
    pub fn process_each<F: FnMut(u16, CoverageFlags)>(&mut self, mut f: F) {
        let Some((low, high)) = self.dirty.take() else {
            return;
        };
        for address in low..=high {
            let i = address as usize;
            if self.current[i] != self.flushed[i] {
                self.flushed[i] = self.current[i];
                f(address, CoverageFlags::from_bits_truncate(self.current[i]));
            }
        }
    }

    pub fn clear(&mut self) {
        self.current.fill(0);
        self.flushed.fill(0);
        self.dirty = None;
    }
}
