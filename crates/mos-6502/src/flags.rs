//! 6502 processor status register (P).
//!
//! Only N, V, D, I, Z and C exist as CPU state. B and bit 5 are synthesised
//! when the status byte is pushed and discarded when it is pulled.

use serde::{Deserialize, Serialize};

/// Carry out of bit 7 (inverted borrow for SBC and compares).
pub const C: u8 = 0x01;

/// Result was zero.
pub const Z: u8 = 0x02;

/// IRQ masked.
pub const I: u8 = 0x04;

/// ADC and SBC work in BCD.
pub const D: u8 = 0x08;

/// Break flag - only appears in the pushed copy of P.
pub const B: u8 = 0x10;

/// Unused bit - always pushed as 1.
pub const U: u8 = 0x20;

/// Signed overflow.
pub const V: u8 = 0x40;

/// Bit 7 of the result.
pub const N: u8 = 0x80;

/// Mask of the bits that are real CPU state.
pub const REAL: u8 = N | V | D | I | Z | C;

/// The stored part of P.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status(u8);

impl Status {
    /// Status with every flag clear.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Unpack a status byte, dropping B and bit 5.
    #[must_use]
    pub const fn from_byte(value: u8) -> Self {
        Self(value & REAL)
    }

    /// The six real flags packed at their fixed bit positions.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Byte pushed by BRK and PHP: B and bit 5 both set.
    #[must_use]
    pub const fn to_byte_brk(self) -> u8 {
        self.0 | U | B
    }

    /// Byte pushed by IRQ and NMI: bit 5 set, B clear.
    #[must_use]
    pub const fn to_byte_irq(self) -> u8 {
        self.0 | U
    }

    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8) {
        self.0 |= flag & REAL;
    }

    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// N and Z from a result byte.
    pub fn update_nz(&mut self, value: u8) {
        self.set_if(N, value & 0x80 != 0);
        self.set_if(Z, value == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_and_unused_bits_are_not_stored() {
        let p = Status::from_byte(0xFF);
        assert_eq!(p.bits(), 0xCF);
        assert_eq!(p.to_byte_brk(), 0xFF);
        assert_eq!(p.to_byte_irq(), 0xEF);
    }

    #[test]
    fn set_ignores_synthetic_bits() {
        let mut p = Status::new();
        p.set(B | U | C);
        assert_eq!(p.bits(), C);
    }
}
