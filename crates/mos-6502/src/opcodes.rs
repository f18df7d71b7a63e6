//! Opcode descriptor tables for the NMOS 6502 and the CMOS 65C02.
//!
//! Each variant gets one immutable 256-entry table, built on first use. The
//! 65C02 table is the 6502 table with an explicit overlay applied during
//! construction; nothing is patched afterwards.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// CPU variant selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Variant {
    /// Original NMOS 6502 (Apple II, II+, unenhanced IIe).
    #[default]
    Nmos6502,
    /// CMOS 65C02 (enhanced IIe, IIc).
    Cmos65C02,
}

/// How an instruction finds its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// `(abs)` - JMP only.
    Indirect,
    /// `(zp,X)`
    IndexedIndirect,
    /// `(zp),Y`
    IndirectIndexed,
    /// `(zp)` - 65C02.
    ZeroPageIndirect,
    /// `(abs,X)` - 65C02 JMP only.
    AbsoluteIndexedIndirect,
    Relative,
    /// `zp,rel` - 65C02 BBR/BBS.
    ZeroPageRelative,
}

impl AddressingMode {
    /// Instruction length in bytes, opcode included.
    #[must_use]
    pub const fn byte_length(self) -> u8 {
        match self {
            Self::Implied | Self::Accumulator => 1,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndexedIndirect
            | Self::IndirectIndexed
            | Self::ZeroPageIndirect
            | Self::Relative => 2,
            Self::Absolute
            | Self::AbsoluteX
            | Self::AbsoluteY
            | Self::Indirect
            | Self::AbsoluteIndexedIndirect
            | Self::ZeroPageRelative => 3,
        }
    }
}

/// The operation an opcode performs, independent of addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Adc,
    And,
    Asl,
    /// Branch if bit n of a zero-page byte is clear.
    Bbr(u8),
    /// Branch if bit n of a zero-page byte is set.
    Bbs(u8),
    Bcc,
    Bcs,
    Beq,
    Bit,
    /// 65C02 `BIT #imm`: only Z is affected.
    BitImmediate,
    Bmi,
    Bne,
    Bpl,
    Bra,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Phx,
    Phy,
    Pla,
    Plp,
    Plx,
    Ply,
    /// Reset bit n of a zero-page byte.
    Rmb(u8),
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    /// Set bit n of a zero-page byte.
    Smb(u8),
    Sta,
    Stx,
    Sty,
    Stz,
    Tax,
    Tay,
    Trb,
    Tsb,
    Tsx,
    Txa,
    Txs,
    Tya,
    /// Undefined NMOS slot.
    Illegal,
}

const BBR: [&str; 8] = [
    "BBR0", "BBR1", "BBR2", "BBR3", "BBR4", "BBR5", "BBR6", "BBR7",
];
const BBS: [&str; 8] = [
    "BBS0", "BBS1", "BBS2", "BBS3", "BBS4", "BBS5", "BBS6", "BBS7",
];
const RMB: [&str; 8] = [
    "RMB0", "RMB1", "RMB2", "RMB3", "RMB4", "RMB5", "RMB6", "RMB7",
];
const SMB: [&str; 8] = [
    "SMB0", "SMB1", "SMB2", "SMB3", "SMB4", "SMB5", "SMB6", "SMB7",
];

impl Operation {
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Adc => "ADC",
            Self::And => "AND",
            Self::Asl => "ASL",
            Self::Bbr(n) => BBR[(n & 7) as usize],
            Self::Bbs(n) => BBS[(n & 7) as usize],
            Self::Bcc => "BCC",
            Self::Bcs => "BCS",
            Self::Beq => "BEQ",
            Self::Bit | Self::BitImmediate => "BIT",
            Self::Bmi => "BMI",
            Self::Bne => "BNE",
            Self::Bpl => "BPL",
            Self::Bra => "BRA",
            Self::Brk => "BRK",
            Self::Bvc => "BVC",
            Self::Bvs => "BVS",
            Self::Clc => "CLC",
            Self::Cld => "CLD",
            Self::Cli => "CLI",
            Self::Clv => "CLV",
            Self::Cmp => "CMP",
            Self::Cpx => "CPX",
            Self::Cpy => "CPY",
            Self::Dec => "DEC",
            Self::Dex => "DEX",
            Self::Dey => "DEY",
            Self::Eor => "EOR",
            Self::Inc => "INC",
            Self::Inx => "INX",
            Self::Iny => "INY",
            Self::Jmp => "JMP",
            Self::Jsr => "JSR",
            Self::Lda => "LDA",
            Self::Ldx => "LDX",
            Self::Ldy => "LDY",
            Self::Lsr => "LSR",
            Self::Nop => "NOP",
            Self::Ora => "ORA",
            Self::Pha => "PHA",
            Self::Php => "PHP",
            Self::Phx => "PHX",
            Self::Phy => "PHY",
            Self::Pla => "PLA",
            Self::Plp => "PLP",
            Self::Plx => "PLX",
            Self::Ply => "PLY",
            Self::Rmb(n) => RMB[(n & 7) as usize],
            Self::Rol => "ROL",
            Self::Ror => "ROR",
            Self::Rti => "RTI",
            Self::Rts => "RTS",
            Self::Sbc => "SBC",
            Self::Sec => "SEC",
            Self::Sed => "SED",
            Self::Sei => "SEI",
            Self::Smb(n) => SMB[(n & 7) as usize],
            Self::Sta => "STA",
            Self::Stx => "STX",
            Self::Sty => "STY",
            Self::Stz => "STZ",
            Self::Tax => "TAX",
            Self::Tay => "TAY",
            Self::Trb => "TRB",
            Self::Tsb => "TSB",
            Self::Tsx => "TSX",
            Self::Txa => "TXA",
            Self::Txs => "TXS",
            Self::Tya => "TYA",
            Self::Illegal => "???",
        }
    }

    /// Any relative branch, including `BRA` and `BBR`/`BBS`.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        self.is_conditional_branch() || matches!(self, Self::Bra)
    }

    /// A branch that may fall through.
    #[must_use]
    pub const fn is_conditional_branch(self) -> bool {
        matches!(
            self,
            Self::Bcc
                | Self::Bcs
                | Self::Beq
                | Self::Bmi
                | Self::Bne
                | Self::Bpl
                | Self::Bvc
                | Self::Bvs
                | Self::Bbr(_)
                | Self::Bbs(_)
        )
    }

    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jmp)
    }

    #[must_use]
    pub const fn is_call(self) -> bool {
        matches!(self, Self::Jsr)
    }

    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(self, Self::Rts | Self::Rti)
    }

    #[must_use]
    pub const fn is_illegal(self) -> bool {
        matches!(self, Self::Illegal)
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub mnemonic: &'static str,
    pub operation: Operation,
    pub mode: AddressingMode,
    /// Length in bytes, opcode included.
    pub bytes: u8,
    /// Base cycle count, before index-carry and branch penalties.
    pub cycles: u8,
    /// Changes PC other than by falling through.
    pub flow_control: bool,
}

impl Descriptor {
    const fn new(operation: Operation, mode: AddressingMode, cycles: u8) -> Self {
        Self {
            mnemonic: operation.mnemonic(),
            operation,
            mode,
            bytes: mode.byte_length(),
            cycles,
            flow_control: operation.is_branch()
                || operation.is_jump()
                || operation.is_call()
                || operation.is_return()
                || matches!(operation, Operation::Brk),
        }
    }

    const ILLEGAL: Self = Self::new(Operation::Illegal, AddressingMode::Implied, 2);

    #[must_use]
    pub const fn is_branch(&self) -> bool {
        self.operation.is_branch()
    }

    #[must_use]
    pub const fn is_jump(&self) -> bool {
        self.operation.is_jump()
    }

    #[must_use]
    pub const fn is_call(&self) -> bool {
        self.operation.is_call()
    }

    #[must_use]
    pub const fn is_return(&self) -> bool {
        self.operation.is_return()
    }

    #[must_use]
    pub const fn is_illegal(&self) -> bool {
        self.operation.is_illegal()
    }
}

use AddressingMode as M;
use Operation as O;

/// Documented NMOS opcodes: (opcode, operation, mode, base cycles).
const NMOS: &[(u8, Operation, AddressingMode, u8)] = &[
    (0x00, O::Brk, M::Implied, 7),
    (0x01, O::Ora, M::IndexedIndirect, 6),
    (0x05, O::Ora, M::ZeroPage, 3),
    (0x06, O::Asl, M::ZeroPage, 5),
    (0x08, O::Php, M::Implied, 3),
    (0x09, O::Ora, M::Immediate, 2),
    (0x0A, O::Asl, M::Accumulator, 2),
    (0x0D, O::Ora, M::Absolute, 4),
    (0x0E, O::Asl, M::Absolute, 6),
    (0x10, O::Bpl, M::Relative, 2),
    (0x11, O::Ora, M::IndirectIndexed, 5),
    (0x15, O::Ora, M::ZeroPageX, 4),
    (0x16, O::Asl, M::ZeroPageX, 6),
    (0x18, O::Clc, M::Implied, 2),
    (0x19, O::Ora, M::AbsoluteY, 4),
    (0x1D, O::Ora, M::AbsoluteX, 4),
    (0x1E, O::Asl, M::AbsoluteX, 7),
    (0x20, O::Jsr, M::Absolute, 6),
    (0x21, O::And, M::IndexedIndirect, 6),
    (0x24, O::Bit, M::ZeroPage, 3),
    (0x25, O::And, M::ZeroPage, 3),
    (0x26, O::Rol, M::ZeroPage, 5),
    (0x28, O::Plp, M::Implied, 4),
    (0x29, O::And, M::Immediate, 2),
    (0x2A, O::Rol, M::Accumulator, 2),
    (0x2C, O::Bit, M::Absolute, 4),
    (0x2D, O::And, M::Absolute, 4),
    (0x2E, O::Rol, M::Absolute, 6),
    (0x30, O::Bmi, M::Relative, 2),
    (0x31, O::And, M::IndirectIndexed, 5),
    (0x35, O::And, M::ZeroPageX, 4),
    (0x36, O::Rol, M::ZeroPageX, 6),
    (0x38, O::Sec, M::Implied, 2),
    (0x39, O::And, M::AbsoluteY, 4),
    (0x3D, O::And, M::AbsoluteX, 4),
    (0x3E, O::Rol, M::AbsoluteX, 7),
    (0x40, O::Rti, M::Implied, 6),
    (0x41, O::Eor, M::IndexedIndirect, 6),
    (0x45, O::Eor, M::ZeroPage, 3),
    (0x46, O::Lsr, M::ZeroPage, 5),
    (0x48, O::Pha, M::Implied, 3),
    (0x49, O::Eor, M::Immediate, 2),
    (0x4A, O::Lsr, M::Accumulator, 2),
    (0x4C, O::Jmp, M::Absolute, 3),
    (0x4D, O::Eor, M::Absolute, 4),
    (0x4E, O::Lsr, M::Absolute, 6),
    (0x50, O::Bvc, M::Relative, 2),
    (0x51, O::Eor, M::IndirectIndexed, 5),
    (0x55, O::Eor, M::ZeroPageX, 4),
    (0x56, O::Lsr, M::ZeroPageX, 6),
    (0x58, O::Cli, M::Implied, 2),
    (0x59, O::Eor, M::AbsoluteY, 4),
    (0x5D, O::Eor, M::AbsoluteX, 4),
    (0x5E, O::Lsr, M::AbsoluteX, 7),
    (0x60, O::Rts, M::Implied, 6),
    (0x61, O::Adc, M::IndexedIndirect, 6),
    (0x65, O::Adc, M::ZeroPage, 3),
    (0x66, O::Ror, M::ZeroPage, 5),
    (0x68, O::Pla, M::Implied, 4),
    (0x69, O::Adc, M::Immediate, 2),
    (0x6A, O::Ror, M::Accumulator, 2),
    (0x6C, O::Jmp, M::Indirect, 5),
    (0x6D, O::Adc, M::Absolute, 4),
    (0x6E, O::Ror, M::Absolute, 6),
    (0x70, O::Bvs, M::Relative, 2),
    (0x71, O::Adc, M::IndirectIndexed, 5),
    (0x75, O::Adc, M::ZeroPageX, 4),
    (0x76, O::Ror, M::ZeroPageX, 6),
    (0x78, O::Sei, M::Implied, 2),
    (0x79, O::Adc, M::AbsoluteY, 4),
    (0x7D, O::Adc, M::AbsoluteX, 4),
    (0x7E, O::Ror, M::AbsoluteX, 7),
    (0x81, O::Sta, M::IndexedIndirect, 6),
    (0x84, O::Sty, M::ZeroPage, 3),
    (0x85, O::Sta, M::ZeroPage, 3),
    (0x86, O::Stx, M::ZeroPage, 3),
    (0x88, O::Dey, M::Implied, 2),
    (0x8A, O::Txa, M::Implied, 2),
    (0x8C, O::Sty, M::Absolute, 4),
    (0x8D, O::Sta, M::Absolute, 4),
    (0x8E, O::Stx, M::Absolute, 4),
    (0x90, O::Bcc, M::Relative, 2),
    (0x91, O::Sta, M::IndirectIndexed, 6),
    (0x94, O::Sty, M::ZeroPageX, 4),
    (0x95, O::Sta, M::ZeroPageX, 4),
    (0x96, O::Stx, M::ZeroPageY, 4),
    (0x98, O::Tya, M::Implied, 2),
    (0x99, O::Sta, M::AbsoluteY, 5),
    (0x9A, O::Txs, M::Implied, 2),
    (0x9D, O::Sta, M::AbsoluteX, 5),
    (0xA0, O::Ldy, M::Immediate, 2),
    (0xA1, O::Lda, M::IndexedIndirect, 6),
    (0xA2, O::Ldx, M::Immediate, 2),
    (0xA4, O::Ldy, M::ZeroPage, 3),
    (0xA5, O::Lda, M::ZeroPage, 3),
    (0xA6, O::Ldx, M::ZeroPage, 3),
    (0xA8, O::Tay, M::Implied, 2),
    (0xA9, O::Lda, M::Immediate, 2),
    (0xAA, O::Tax, M::Implied, 2),
    (0xAC, O::Ldy, M::Absolute, 4),
    (0xAD, O::Lda, M::Absolute, 4),
    (0xAE, O::Ldx, M::Absolute, 4),
    (0xB0, O::Bcs, M::Relative, 2),
    (0xB1, O::Lda, M::IndirectIndexed, 5),
    (0xB4, O::Ldy, M::ZeroPageX, 4),
    (0xB5, O::Lda, M::ZeroPageX, 4),
    (0xB6, O::Ldx, M::ZeroPageY, 4),
    (0xB8, O::Clv, M::Implied, 2),
    (0xB9, O::Lda, M::AbsoluteY, 4),
    (0xBA, O::Tsx, M::Implied, 2),
    (0xBC, O::Ldy, M::AbsoluteX, 4),
    (0xBD, O::Lda, M::AbsoluteX, 4),
    (0xBE, O::Ldx, M::AbsoluteY, 4),
    (0xC0, O::Cpy, M::Immediate, 2),
    (0xC1, O::Cmp, M::IndexedIndirect, 6),
    (0xC4, O::Cpy, M::ZeroPage, 3),
    (0xC5, O::Cmp, M::ZeroPage, 3),
    (0xC6, O::Dec, M::ZeroPage, 5),
    (0xC8, O::Iny, M::Implied, 2),
    (0xC9, O::Cmp, M::Immediate, 2),
    (0xCA, O::Dex, M::Implied, 2),
    (0xCC, O::Cpy, M::Absolute, 4),
    (0xCD, O::Cmp, M::Absolute, 4),
    (0xCE, O::Dec, M::Absolute, 6),
    (0xD0, O::Bne, M::Relative, 2),
    (0xD1, O::Cmp, M::IndirectIndexed, 5),
    (0xD5, O::Cmp, M::ZeroPageX, 4),
    (0xD6, O::Dec, M::ZeroPageX, 6),
    (0xD8, O::Cld, M::Implied, 2),
    (0xD9, O::Cmp, M::AbsoluteY, 4),
    (0xDD, O::Cmp, M::AbsoluteX, 4),
    (0xDE, O::Dec, M::AbsoluteX, 7),
    (0xE0, O::Cpx, M::Immediate, 2),
    (0xE1, O::Sbc, M::IndexedIndirect, 6),
    (0xE4, O::Cpx, M::ZeroPage, 3),
    (0xE5, O::Sbc, M::ZeroPage, 3),
    (0xE6, O::Inc, M::ZeroPage, 5),
    (0xE8, O::Inx, M::Implied, 2),
    (0xE9, O::Sbc, M::Immediate, 2),
    (0xEA, O::Nop, M::Implied, 2),
    (0xEC, O::Cpx, M::Absolute, 4),
    (0xED, O::Sbc, M::Absolute, 4),
    (0xEE, O::Inc, M::Absolute, 6),
    (0xF0, O::Beq, M::Relative, 2),
    (0xF1, O::Sbc, M::IndirectIndexed, 5),
    (0xF5, O::Sbc, M::ZeroPageX, 4),
    (0xF6, O::Inc, M::ZeroPageX, 6),
    (0xF8, O::Sed, M::Implied, 2),
    (0xF9, O::Sbc, M::AbsoluteY, 4),
    (0xFD, O::Sbc, M::AbsoluteX, 4),
    (0xFE, O::Inc, M::AbsoluteX, 7),
];

/// 65C02 additions and overrides applied on top of [`NMOS`].
const CMOS: &[(u8, Operation, AddressingMode, u8)] = &[
    (0x04, O::Tsb, M::ZeroPage, 5),
    (0x0C, O::Tsb, M::Absolute, 6),
    (0x12, O::Ora, M::ZeroPageIndirect, 5),
    (0x14, O::Trb, M::ZeroPage, 5),
    (0x1A, O::Inc, M::Accumulator, 2),
    (0x1C, O::Trb, M::Absolute, 6),
    (0x1E, O::Asl, M::AbsoluteX, 6),
    (0x32, O::And, M::ZeroPageIndirect, 5),
    (0x34, O::Bit, M::ZeroPageX, 4),
    (0x3A, O::Dec, M::Accumulator, 2),
    (0x3C, O::Bit, M::AbsoluteX, 4),
    (0x3E, O::Rol, M::AbsoluteX, 6),
    (0x52, O::Eor, M::ZeroPageIndirect, 5),
    (0x5A, O::Phy, M::Implied, 3),
    (0x5E, O::Lsr, M::AbsoluteX, 6),
    (0x64, O::Stz, M::ZeroPage, 3),
    (0x6C, O::Jmp, M::Indirect, 6),
    (0x72, O::Adc, M::ZeroPageIndirect, 5),
    (0x74, O::Stz, M::ZeroPageX, 4),
    (0x7A, O::Ply, M::Implied, 4),
    (0x7C, O::Jmp, M::AbsoluteIndexedIndirect, 6),
    (0x7E, O::Ror, M::AbsoluteX, 6),
    (0x80, O::Bra, M::Relative, 3),
    (0x89, O::BitImmediate, M::Immediate, 2),
    (0x92, O::Sta, M::ZeroPageIndirect, 5),
    (0x9C, O::Stz, M::Absolute, 4),
    (0x9E, O::Stz, M::AbsoluteX, 5),
    (0xB2, O::Lda, M::ZeroPageIndirect, 5),
    (0xD2, O::Cmp, M::ZeroPageIndirect, 5),
    (0xDA, O::Phx, M::Implied, 3),
    (0xF2, O::Sbc, M::ZeroPageIndirect, 5),
    (0xFA, O::Plx, M::Implied, 4),
];

/// Byte and cycle footprint of the 65C02 NOPs that fill the old NMOS
/// undefined slots.
const fn cmos_nop(opcode: u8) -> (AddressingMode, u8) {
    match opcode {
        0x44 => (M::ZeroPage, 3),
        0x54 | 0xD4 | 0xF4 => (M::ZeroPageX, 4),
        0x5C => (M::Absolute, 8),
        0xDC | 0xFC => (M::Absolute, 4),
        _ if opcode & 0x0F == 0x02 => (M::Immediate, 2),
        _ => (M::Implied, 1),
    }
}

/// A complete 256-entry opcode table for one variant.
#[derive(Debug)]
pub struct OpcodeTable {
    variant: Variant,
    entries: [Descriptor; 256],
}

static NMOS_TABLE: OnceLock<OpcodeTable> = OnceLock::new();
static CMOS_TABLE: OnceLock<OpcodeTable> = OnceLock::new();

impl OpcodeTable {
    /// The shared table for `variant`, built on first use.
    #[must_use]
    pub fn get(variant: Variant) -> &'static Self {
        match variant {
            Variant::Nmos6502 => NMOS_TABLE.get_or_init(|| Self::build(variant)),
            Variant::Cmos65C02 => CMOS_TABLE.get_or_init(|| Self::build(variant)),
        }
    }

    fn build(variant: Variant) -> Self {
        let mut entries = [Descriptor::ILLEGAL; 256];
        for &(opcode, operation, mode, cycles) in NMOS {
            entries[opcode as usize] = Descriptor::new(operation, mode, cycles);
        }

        if variant == Variant::Cmos65C02 {
            for &(opcode, operation, mode, cycles) in CMOS {
                entries[opcode as usize] = Descriptor::new(operation, mode, cycles);
            }
            for bit in 0..8u8 {
                let row = bit << 4;
                entries[(row | 0x07) as usize] = Descriptor::new(O::Rmb(bit), M::ZeroPage, 5);
                entries[(row | 0x87) as usize] = Descriptor::new(O::Smb(bit), M::ZeroPage, 5);
                entries[(row | 0x0F) as usize] =
                    Descriptor::new(O::Bbr(bit), M::ZeroPageRelative, 5);
                entries[(row | 0x8F) as usize] =
                    Descriptor::new(O::Bbs(bit), M::ZeroPageRelative, 5);
            }
            for (opcode, entry) in entries.iter_mut().enumerate() {
                if entry.is_illegal() {
                    let (mode, cycles) = cmos_nop(opcode as u8);
                    *entry = Descriptor::new(O::Nop, mode, cycles);
                }
            }
        }

        Self { variant, entries }
    }

    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    #[must_use]
    pub const fn lookup(&self, opcode: u8) -> &Descriptor {
        &self.entries[opcode as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Descriptor)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(opcode, entry)| (opcode as u8, entry))
    }
}
