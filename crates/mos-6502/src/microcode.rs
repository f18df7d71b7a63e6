//! Micro-operation definitions for cycle-accurate 6502 execution.
//!
//! Every instruction is a fixed array of micro-ops, one bus cycle each. The
//! last micro-op of every sequence is [`MicroOp::Fetch`], which prefetches the
//! next opcode, so an instruction boundary is simply "T wrapped to 0".
//!
//! Sequences are composed once per variant from an addressing-mode builder
//! and the opcode's [`Operation`]. Penalty cycles are not static: indexed
//! and branch micro-ops return [`Flow::Skip`] to jump over the extra cycle
//! when no carry happened.

use std::sync::OnceLock;

use crate::opcodes::{AddressingMode, Descriptor, OpcodeTable, Operation, Variant};

/// Longest sequence: `NOP abs` on the 65C02 ($5C) at 8 cycles.
pub const MAX_OPS: usize = 8;

/// Index register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    X,
    Y,
}

/// What the engine does after a micro-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next micro-op.
    Next,
    /// Skip this many micro-ops.
    Skip(u8),
    /// Sequence finished; T returns to 0.
    Done,
}

/// One bus cycle of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Read opcode at PC, increment PC. Ends every sequence.
    Fetch,

    /// Dummy read at PC, then run the implied/accumulator operation.
    Implied,
    /// Read operand at PC, increment PC, apply the read operation.
    Immediate,

    /// Read zero-page address at PC into `ea`.
    ZeroPageAddress,
    /// Dummy read of `ea`, then add the index within page zero.
    ZeroPageIndex(Index),
    /// Read low byte of an absolute address at PC.
    AbsoluteLow,
    /// Read high byte of an absolute address at PC.
    AbsoluteHigh,
    /// Read high byte and add the index. Skips the fix-up cycle when the
    /// addition did not carry and `penalty` is set.
    AbsoluteHighIndexed { index: Index, penalty: bool },
    /// Dummy read while the high byte of `ea` is corrected.
    FixIndexed,
    /// Read zero-page pointer at PC.
    PointerAddress,
    /// Dummy read of the pointer, then add X.
    PointerIndexX,
    /// Read low byte of `ea` through the zero-page pointer.
    PointerLow,
    /// Read high byte of `ea` through the pointer, wrapping in page zero.
    PointerHigh,
    /// As [`MicroOp::PointerHigh`], then add Y.
    PointerHighIndexed { penalty: bool },

    /// Read `ea` and apply the read operation.
    Read,
    /// Write the stored register to `ea`.
    Write,
    /// Read `ea` into `operand`.
    ReadOperand,
    /// Write the unmodified `operand` back, then modify it.
    DummyWrite,
    /// Write the modified `operand` to `ea`.
    WriteResult,
    /// Dummy read of `ea`.
    DummyRead,
    /// Dummy read of the last operand byte.
    DummyReadOperand,

    /// Dummy read of the stack top.
    StackPeek,
    /// Push A, X, Y or P.
    Push,
    /// Pull A, X, Y or P.
    Pull,
    PushPch,
    PushPcl,
    /// Push P (B set for BRK, clear for IRQ/NMI), then mask interrupts.
    PushStatus,
    PullStatus,
    PullPcl,
    PullPch,

    /// JSR: read target high byte, fire the call hook, jump.
    JsrHigh,
    /// RTS: dummy read, PC = pulled address + 1, fire the return hook.
    RtsReturn,
    /// RTI: pull PCH, fire the return hook.
    RtiReturn,
    /// JMP abs: read high byte and jump.
    JumpHigh,
    /// Add X to the 16-bit pointer in `ea`.
    AddIndexX,
    /// Read target low byte from the 16-bit pointer in `ea`.
    IndirectLow,
    /// Read target high byte from `ea + 1` and jump.
    IndirectHigh,
    /// NMOS: read target high byte without carrying into the pointer's page.
    IndirectHighPageWrap,

    /// Read branch offset; skip to the fetch if the branch is not taken.
    BranchOffset,
    /// Dummy read, compute target; skip the fix-up if the page is unchanged.
    BranchTaken,
    /// Dummy read at the unfixed target, then jump.
    BranchFixPage,

    /// BRK: read the signature byte, select $FFFE, fire the debug hook.
    BreakSignature,
    /// IRQ/NMI: dummy read at PC.
    InterruptDummy,
    VectorLow,
    VectorHigh,

    /// Undefined NMOS opcode: dummy read at PC and log.
    IllegalStub,
}

/// A composed micro-op sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    ops: [MicroOp; MAX_OPS],
    len: u8,
    pub operation: Operation,
}

impl Instruction {
    const fn empty(operation: Operation) -> Self {
        Self {
            ops: [MicroOp::Fetch; MAX_OPS],
            len: 0,
            operation,
        }
    }

    fn from_ops(operation: Operation, ops: &[MicroOp]) -> Self {
        let mut instruction = Self::empty(operation);
        for &op in ops {
            instruction.push(op);
        }
        instruction
    }

    fn push(&mut self, op: MicroOp) {
        debug_assert!((self.len as usize) < MAX_OPS, "micro-op sequence overflow");
        self.ops[self.len as usize] = op;
        self.len += 1;
    }

    /// Micro-op at position `t`.
    #[must_use]
    pub fn op(&self, t: u8) -> Option<MicroOp> {
        self.ops().get(t as usize).copied()
    }

    #[must_use]
    pub fn ops(&self) -> &[MicroOp] {
        &self.ops[..self.len as usize]
    }

    #[must_use]
    pub const fn len(&self) -> u8 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Sequence spliced in for IRQ and NMI. The vector is chosen when splicing.
pub const INTERRUPT: [MicroOp; 7] = [
    MicroOp::InterruptDummy,
    MicroOp::PushPch,
    MicroOp::PushPcl,
    MicroOp::PushStatus,
    MicroOp::VectorLow,
    MicroOp::VectorHigh,
    MicroOp::Fetch,
];

/// Composed sequences for all 256 opcodes of one variant.
#[derive(Debug)]
pub struct InstructionTable {
    entries: [Instruction; 256],
}

static NMOS_INSTRUCTIONS: OnceLock<InstructionTable> = OnceLock::new();
static CMOS_INSTRUCTIONS: OnceLock<InstructionTable> = OnceLock::new();

impl InstructionTable {
    #[must_use]
    pub fn get(variant: Variant) -> &'static Self {
        match variant {
            Variant::Nmos6502 => NMOS_INSTRUCTIONS.get_or_init(|| Self::build(variant)),
            Variant::Cmos65C02 => CMOS_INSTRUCTIONS.get_or_init(|| Self::build(variant)),
        }
    }

    fn build(variant: Variant) -> Self {
        let opcodes = OpcodeTable::get(variant);
        let mut entries = [Instruction::empty(Operation::Illegal); 256];
        for (opcode, descriptor) in opcodes.iter() {
            entries[opcode as usize] = compose(variant, descriptor);
        }
        Self { entries }
    }

    #[must_use]
    pub const fn lookup(&self, opcode: u8) -> &Instruction {
        &self.entries[opcode as usize]
    }
}

/// How an operation touches its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    Modify,
}

const fn access(operation: Operation) -> Access {
    use Operation as O;
    match operation {
        O::Sta | O::Stx | O::Sty | O::Stz => Access::Write,
        O::Asl
        | O::Lsr
        | O::Rol
        | O::Ror
        | O::Inc
        | O::Dec
        | O::Tsb
        | O::Trb
        | O::Rmb(_)
        | O::Smb(_) => Access::Modify,
        _ => Access::Read,
    }
}

/// Address-computation micro-ops for a data-accessing mode. Indexed modes
/// always include [`MicroOp::FixIndexed`]; `penalty` decides whether it may
/// be skipped.
fn address_steps(mode: AddressingMode, penalty: bool) -> Vec<MicroOp> {
    use MicroOp as U;
    match mode {
        AddressingMode::ZeroPage => vec![U::ZeroPageAddress],
        AddressingMode::ZeroPageX => vec![U::ZeroPageAddress, U::ZeroPageIndex(Index::X)],
        AddressingMode::ZeroPageY => vec![U::ZeroPageAddress, U::ZeroPageIndex(Index::Y)],
        AddressingMode::Absolute => vec![U::AbsoluteLow, U::AbsoluteHigh],
        AddressingMode::AbsoluteX => vec![
            U::AbsoluteLow,
            U::AbsoluteHighIndexed {
                index: Index::X,
                penalty,
            },
            U::FixIndexed,
        ],
        AddressingMode::AbsoluteY => vec![
            U::AbsoluteLow,
            U::AbsoluteHighIndexed {
                index: Index::Y,
                penalty,
            },
            U::FixIndexed,
        ],
        AddressingMode::IndexedIndirect => vec![
            U::PointerAddress,
            U::PointerIndexX,
            U::PointerLow,
            U::PointerHigh,
        ],
        AddressingMode::IndirectIndexed => vec![
            U::PointerAddress,
            U::PointerLow,
            U::PointerHighIndexed { penalty },
            U::FixIndexed,
        ],
        AddressingMode::ZeroPageIndirect => vec![U::PointerAddress, U::PointerLow, U::PointerHigh],
        _ => Vec::new(),
    }
}

fn data_sequence(descriptor: &Descriptor, penalty: bool) -> Vec<MicroOp> {
    use MicroOp as U;
    if descriptor.mode == AddressingMode::Immediate {
        return vec![U::Immediate, U::Fetch];
    }
    if matches!(
        descriptor.mode,
        AddressingMode::Implied | AddressingMode::Accumulator
    ) {
        return vec![U::Implied, U::Fetch];
    }

    let mut ops = address_steps(descriptor.mode, penalty);
    match access(descriptor.operation) {
        Access::Read => ops.push(U::Read),
        Access::Write => ops.push(U::Write),
        Access::Modify => ops.extend([U::ReadOperand, U::DummyWrite, U::WriteResult]),
    }
    ops.push(U::Fetch);
    ops
}

/// Build the micro-op sequence for one opcode.
fn compose(variant: Variant, descriptor: &Descriptor) -> Instruction {
    use MicroOp as U;
    use Operation as O;

    let operation = descriptor.operation;
    let ops: Vec<MicroOp> = match operation {
        O::Illegal => vec![U::IllegalStub, U::Fetch],
        O::Brk => vec![
            U::BreakSignature,
            U::PushPch,
            U::PushPcl,
            U::PushStatus,
            U::VectorLow,
            U::VectorHigh,
            U::Fetch,
        ],
        O::Jsr => vec![
            U::AbsoluteLow,
            U::StackPeek,
            U::PushPch,
            U::PushPcl,
            U::JsrHigh,
            U::Fetch,
        ],
        O::Rts => vec![
            U::Implied,
            U::StackPeek,
            U::PullPcl,
            U::PullPch,
            U::RtsReturn,
            U::Fetch,
        ],
        O::Rti => vec![
            U::Implied,
            U::StackPeek,
            U::PullStatus,
            U::PullPcl,
            U::RtiReturn,
            U::Fetch,
        ],
        O::Jmp => match descriptor.mode {
            AddressingMode::Indirect if variant == Variant::Nmos6502 => vec![
                U::AbsoluteLow,
                U::AbsoluteHigh,
                U::IndirectLow,
                U::IndirectHighPageWrap,
                U::Fetch,
            ],
            AddressingMode::Indirect => vec![
                U::AbsoluteLow,
                U::AbsoluteHigh,
                U::DummyReadOperand,
                U::IndirectLow,
                U::IndirectHigh,
                U::Fetch,
            ],
            AddressingMode::AbsoluteIndexedIndirect => vec![
                U::AbsoluteLow,
                U::AbsoluteHigh,
                U::AddIndexX,
                U::IndirectLow,
                U::IndirectHigh,
                U::Fetch,
            ],
            _ => vec![U::AbsoluteLow, U::JumpHigh, U::Fetch],
        },
        O::Pha | O::Php | O::Phx | O::Phy => vec![U::Implied, U::Push, U::Fetch],
        O::Pla | O::Plp | O::Plx | O::Ply => vec![U::Implied, U::StackPeek, U::Pull, U::Fetch],
        O::Bbr(_) | O::Bbs(_) => vec![
            U::ZeroPageAddress,
            U::ReadOperand,
            U::DummyRead,
            U::BranchOffset,
            U::BranchTaken,
            U::BranchFixPage,
            U::Fetch,
        ],
        _ if descriptor.mode == AddressingMode::Relative => vec![
            U::BranchOffset,
            U::BranchTaken,
            U::BranchFixPage,
            U::Fetch,
        ],
        // 65C02 single-cycle NOPs are nothing but the next fetch.
        O::Nop if descriptor.cycles == 1 => vec![U::Fetch],
        _ => {
            let full = data_sequence(descriptor, false);
            let penalty = full.len() > usize::from(descriptor.cycles);
            let mut ops = if penalty {
                data_sequence(descriptor, true)
            } else {
                full
            };
            // Wide NOPs burn their remaining cycles before the fetch.
            while ops.len() < usize::from(descriptor.cycles) {
                ops.insert(ops.len() - 1, U::DummyRead);
            }
            ops
        }
    };

    Instruction::from_ops(operation, &ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(variant: Variant, opcode: u8) -> Vec<MicroOp> {
        InstructionTable::get(variant).lookup(opcode).ops().to_vec()
    }

    #[test]
    fn every_sequence_ends_with_fetch() {
        for variant in [Variant::Nmos6502, Variant::Cmos65C02] {
            let table = InstructionTable::get(variant);
            for opcode in 0..=255u8 {
                let ops = table.lookup(opcode).ops();
                assert_eq!(ops.last(), Some(&MicroOp::Fetch), "{variant:?} {opcode:02X}");
                assert_eq!(
                    ops.iter().filter(|&&op| op == MicroOp::Fetch).count(),
                    1,
                    "{variant:?} {opcode:02X}"
                );
            }
        }
    }

    #[test]
    fn base_length_matches_declared_cycles() {
        for variant in [Variant::Nmos6502, Variant::Cmos65C02] {
            let opcodes = OpcodeTable::get(variant);
            let table = InstructionTable::get(variant);
            for (opcode, descriptor) in opcodes.iter() {
                let ops = table.lookup(opcode).ops();
                let skippable = ops
                    .iter()
                    .filter(|op| {
                        matches!(
                            op,
                            MicroOp::AbsoluteHighIndexed { penalty: true, .. }
                                | MicroOp::PointerHighIndexed { penalty: true }
                        )
                    })
                    .count();
                let branch_extra = if descriptor.is_branch() {
                    // Taken and page-fix cycles sit beyond the base count,
                    // except for BRA whose base already includes "taken".
                    if descriptor.operation == Operation::Bra { 1 } else { 2 }
                } else {
                    0
                };
                assert_eq!(
                    ops.len(),
                    usize::from(descriptor.cycles) + skippable + branch_extra,
                    "{variant:?} {opcode:02X} {}",
                    descriptor.mnemonic
                );
            }
        }
    }

    #[test]
    fn indexed_writes_never_skip_the_fix_up() {
        assert_eq!(
            sequence(Variant::Nmos6502, 0x9D),
            vec![
                MicroOp::AbsoluteLow,
                MicroOp::AbsoluteHighIndexed {
                    index: Index::X,
                    penalty: false
                },
                MicroOp::FixIndexed,
                MicroOp::Write,
                MicroOp::Fetch,
            ]
        );
    }

    #[test]
    fn cmos_shift_abs_x_has_page_penalty() {
        assert!(matches!(
            sequence(Variant::Cmos65C02, 0x1E)[1],
            MicroOp::AbsoluteHighIndexed { penalty: true, .. }
        ));
        assert!(matches!(
            sequence(Variant::Cmos65C02, 0xFE)[1],
            MicroOp::AbsoluteHighIndexed { penalty: false, .. }
        ));
        assert!(matches!(
            sequence(Variant::Nmos6502, 0x1E)[1],
            MicroOp::AbsoluteHighIndexed { penalty: false, .. }
        ));
    }

    #[test]
    fn indirect_jump_variants() {
        assert!(sequence(Variant::Nmos6502, 0x6C).contains(&MicroOp::IndirectHighPageWrap));
        assert!(sequence(Variant::Cmos65C02, 0x6C).contains(&MicroOp::IndirectHigh));
    }

    #[test]
    fn wide_nop_is_padded() {
        let ops = sequence(Variant::Cmos65C02, 0x5C);
        assert_eq!(ops.len(), 8);
        assert_eq!(ops[0], MicroOp::AbsoluteLow);
        assert_eq!(ops[1], MicroOp::AbsoluteHigh);
        assert_eq!(ops[2], MicroOp::Read);
    }
}
