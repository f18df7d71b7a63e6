//! Instruction semantics that only touch registers.
//!
//! The engine performs the bus cycles; these functions do the work once the
//! operand is in hand.

use crate::flags::{C, D, I, N, V, Z};
use crate::opcodes::{Operation, Variant};
use crate::Registers;

/// Apply a read-class operation (loads, logic, arithmetic, compares, BIT).
pub fn execute_read(regs: &mut Registers, variant: Variant, operation: Operation, value: u8) {
    match operation {
        Operation::Lda => {
            regs.a = value;
            regs.p.update_nz(value);
        }
        Operation::Ldx => {
            regs.x = value;
            regs.p.update_nz(value);
        }
        Operation::Ldy => {
            regs.y = value;
            regs.p.update_nz(value);
        }
        Operation::Ora => {
            regs.a |= value;
            regs.p.update_nz(regs.a);
        }
        Operation::And => {
            regs.a &= value;
            regs.p.update_nz(regs.a);
        }
        Operation::Eor => {
            regs.a ^= value;
            regs.p.update_nz(regs.a);
        }
        Operation::Adc => adc(regs, variant, value),
        Operation::Sbc => sbc(regs, variant, value),
        Operation::Cmp => compare(regs, regs.a, value),
        Operation::Cpx => compare(regs, regs.x, value),
        Operation::Cpy => compare(regs, regs.y, value),
        Operation::Bit => {
            regs.p.set_if(Z, regs.a & value == 0);
            regs.p.set_if(N, value & 0x80 != 0);
            regs.p.set_if(V, value & 0x40 != 0);
        }
        Operation::BitImmediate => regs.p.set_if(Z, regs.a & value == 0),
        _ => {}
    }
}

/// Apply a read-modify-write operation to `value`, returning the new value.
pub fn execute_modify(regs: &mut Registers, operation: Operation, value: u8) -> u8 {
    match operation {
        Operation::Asl => asl(regs, value),
        Operation::Lsr => lsr(regs, value),
        Operation::Rol => rol(regs, value),
        Operation::Ror => ror(regs, value),
        Operation::Inc => {
            let result = value.wrapping_add(1);
            regs.p.update_nz(result);
            result
        }
        Operation::Dec => {
            let result = value.wrapping_sub(1);
            regs.p.update_nz(result);
            result
        }
        Operation::Tsb => {
            regs.p.set_if(Z, regs.a & value == 0);
            value | regs.a
        }
        Operation::Trb => {
            regs.p.set_if(Z, regs.a & value == 0);
            value & !regs.a
        }
        Operation::Rmb(bit) => value & !(1 << bit),
        Operation::Smb(bit) => value | (1 << bit),
        _ => value,
    }
}

/// Apply an implied or accumulator operation.
pub fn execute_implied(regs: &mut Registers, operation: Operation) {
    match operation {
        Operation::Asl | Operation::Lsr | Operation::Rol | Operation::Ror => {
            regs.a = execute_modify(regs, operation, regs.a);
        }
        Operation::Inc | Operation::Dec => {
            regs.a = execute_modify(regs, operation, regs.a);
        }
        Operation::Clc => regs.p.clear(C),
        Operation::Cld => regs.p.clear(D),
        Operation::Cli => regs.p.clear(I),
        Operation::Clv => regs.p.clear(V),
        Operation::Sec => regs.p.set(C),
        Operation::Sed => regs.p.set(D),
        Operation::Sei => regs.p.set(I),
        Operation::Tax => {
            regs.x = regs.a;
            regs.p.update_nz(regs.x);
        }
        Operation::Tay => {
            regs.y = regs.a;
            regs.p.update_nz(regs.y);
        }
        Operation::Txa => {
            regs.a = regs.x;
            regs.p.update_nz(regs.a);
        }
        Operation::Tya => {
            regs.a = regs.y;
            regs.p.update_nz(regs.a);
        }
        Operation::Tsx => {
            regs.x = regs.s;
            regs.p.update_nz(regs.x);
        }
        // TXS does not affect flags
        Operation::Txs => regs.s = regs.x,
        Operation::Inx => {
            regs.x = regs.x.wrapping_add(1);
            regs.p.update_nz(regs.x);
        }
        Operation::Iny => {
            regs.y = regs.y.wrapping_add(1);
            regs.p.update_nz(regs.y);
        }
        Operation::Dex => {
            regs.x = regs.x.wrapping_sub(1);
            regs.p.update_nz(regs.x);
        }
        Operation::Dey => {
            regs.y = regs.y.wrapping_sub(1);
            regs.p.update_nz(regs.y);
        }
        _ => {}
    }
}

/// Value written by a store or push.
#[must_use]
pub fn store_value(regs: &Registers, operation: Operation) -> u8 {
    match operation {
        Operation::Sta | Operation::Pha => regs.a,
        Operation::Stx | Operation::Phx => regs.x,
        Operation::Sty | Operation::Phy => regs.y,
        Operation::Php => regs.p.to_byte_brk(),
        _ => 0,
    }
}

/// Apply a pulled byte.
pub fn execute_pull(regs: &mut Registers, operation: Operation, value: u8) {
    match operation {
        Operation::Pla => {
            regs.a = value;
            regs.p.update_nz(value);
        }
        Operation::Plx => {
            regs.x = value;
            regs.p.update_nz(value);
        }
        Operation::Ply => {
            regs.y = value;
            regs.p.update_nz(value);
        }
        Operation::Plp => regs.p = crate::Status::from_byte(value),
        _ => {}
    }
}

/// Whether a branch is taken. `zero_page` is the byte tested by BBR/BBS.
#[must_use]
pub fn branch_taken(regs: &Registers, operation: Operation, zero_page: u8) -> bool {
    let p = regs.p;
    match operation {
        Operation::Bpl => !p.is_set(N),
        Operation::Bmi => p.is_set(N),
        Operation::Bvc => !p.is_set(V),
        Operation::Bvs => p.is_set(V),
        Operation::Bcc => !p.is_set(C),
        Operation::Bcs => p.is_set(C),
        Operation::Bne => !p.is_set(Z),
        Operation::Beq => p.is_set(Z),
        Operation::Bra => true,
        Operation::Bbr(bit) => zero_page & (1 << bit) == 0,
        Operation::Bbs(bit) => zero_page & (1 << bit) != 0,
        _ => false,
    }
}

fn compare(regs: &mut Registers, register: u8, value: u8) {
    let result = register.wrapping_sub(value);
    regs.p.set_if(C, register >= value);
    regs.p.update_nz(result);
}

fn asl(regs: &mut Registers, value: u8) -> u8 {
    regs.p.set_if(C, value & 0x80 != 0);
    let result = value << 1;
    regs.p.update_nz(result);
    result
}

fn lsr(regs: &mut Registers, value: u8) -> u8 {
    regs.p.set_if(C, value & 0x01 != 0);
    let result = value >> 1;
    regs.p.update_nz(result);
    result
}

fn rol(regs: &mut Registers, value: u8) -> u8 {
    let carry_in = u8::from(regs.p.is_set(C));
    regs.p.set_if(C, value & 0x80 != 0);
    let result = (value << 1) | carry_in;
    regs.p.update_nz(result);
    result
}

fn ror(regs: &mut Registers, value: u8) -> u8 {
    let carry_in = if regs.p.is_set(C) { 0x80 } else { 0 };
    regs.p.set_if(C, value & 0x01 != 0);
    let result = (value >> 1) | carry_in;
    regs.p.update_nz(result);
    result
}

fn adc(regs: &mut Registers, variant: Variant, value: u8) {
    if regs.p.is_set(D) {
        adc_decimal(regs, variant, value);
    } else {
        adc_binary(regs, value);
    }
}

fn adc_binary(regs: &mut Registers, value: u8) {
    let a = u16::from(regs.a);
    let m = u16::from(value);
    let sum = a + m + u16::from(regs.p.is_set(C));
    let result = sum as u8;

    regs.p.set_if(C, sum > 0xFF);
    regs.p.set_if(V, (a ^ sum) & (m ^ sum) & 0x80 != 0);
    regs.p.update_nz(result);
    regs.a = result;
}

/// Decimal ADC. Both variants take V and C from the nibble-adjusted sum.
/// The NMOS part takes Z from the binary sum and N from the sum before the
/// high-nibble adjust; the 65C02 derives N and Z from the final result.
fn adc_decimal(regs: &mut Registers, variant: Variant, value: u8) {
    let a = regs.a;
    let carry = u16::from(regs.p.is_set(C));

    let mut low = u16::from(a & 0x0F) + u16::from(value & 0x0F) + carry;
    if low >= 0x0A {
        low = ((low + 0x06) & 0x0F) + 0x10;
    }
    let mut sum = u16::from(a & 0xF0) + u16::from(value & 0xF0) + low;

    let signed = i16::from((a & 0xF0) as i8) + i16::from((value & 0xF0) as i8) + low as i16;
    regs.p.set_if(V, !(-128..=127).contains(&signed));
    let intermediate = sum as u8;

    if sum >= 0xA0 {
        sum += 0x60;
    }
    let result = sum as u8;
    regs.p.set_if(C, sum >= 0x100);

    match variant {
        Variant::Nmos6502 => {
            let binary = a.wrapping_add(value).wrapping_add(carry as u8);
            regs.p.set_if(Z, binary == 0);
            regs.p.set_if(N, intermediate & 0x80 != 0);
        }
        Variant::Cmos65C02 => regs.p.update_nz(result),
    }
    regs.a = result;
}

fn sbc(regs: &mut Registers, variant: Variant, value: u8) {
    if regs.p.is_set(D) {
        sbc_decimal(regs, variant, value);
    } else {
        adc_binary(regs, !value);
    }
}

/// Decimal SBC. Flags come from the binary subtraction; the 65C02 then
/// re-derives N and Z from the adjusted result.
fn sbc_decimal(regs: &mut Registers, variant: Variant, value: u8) {
    let a = regs.a;
    let borrow = i16::from(!regs.p.is_set(C));

    let mut low = i16::from(a & 0x0F) - i16::from(value & 0x0F) - borrow;
    let result = match variant {
        Variant::Nmos6502 => {
            if low < 0 {
                low = ((low - 0x06) & 0x0F) - 0x10;
            }
            let mut diff = i16::from(a & 0xF0) - i16::from(value & 0xF0) + low;
            if diff < 0 {
                diff -= 0x60;
            }
            diff as u8
        }
        Variant::Cmos65C02 => {
            let mut diff = i16::from(a) - i16::from(value) - borrow;
            if diff < 0 {
                diff -= 0x60;
            }
            if low < 0 {
                diff -= 0x06;
            }
            diff as u8
        }
    };

    // C, V (and on NMOS also N, Z) from the binary subtraction.
    adc_binary(regs, !value);
    if variant == Variant::Cmos65C02 {
        regs.p.update_nz(result);
    }
    regs.a = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Status;

    fn regs(a: u8, p: u8) -> Registers {
        Registers {
            a,
            p: Status::from_byte(p),
            ..Registers::new()
        }
    }

    #[test]
    fn binary_adc_sets_overflow() {
        let mut r = regs(0x50, 0);
        execute_read(&mut r, Variant::Nmos6502, Operation::Adc, 0x50);
        assert_eq!(r.a, 0xA0);
        assert!(r.p.is_set(V));
        assert!(r.p.is_set(N));
        assert!(!r.p.is_set(C));
    }

    #[test]
    fn decimal_adc_79_plus_carry_nmos() {
        let mut r = regs(0x79, D | C);
        execute_read(&mut r, Variant::Nmos6502, Operation::Adc, 0x00);
        assert_eq!(r.a, 0x80);
        assert!(r.p.is_set(N));
        assert!(r.p.is_set(V));
        assert!(!r.p.is_set(Z));
        assert!(!r.p.is_set(C));
    }

    #[test]
    fn decimal_adc_99_plus_1_wraps_with_carry() {
        for variant in [Variant::Nmos6502, Variant::Cmos65C02] {
            let mut r = regs(0x99, D);
            execute_read(&mut r, variant, Operation::Adc, 0x01);
            assert_eq!(r.a, 0x00, "{variant:?}");
            assert!(r.p.is_set(C), "{variant:?}");
        }
    }

    #[test]
    fn decimal_adc_zero_flag_differs_between_variants() {
        // 99 + 01 = 00 (BCD) but the binary sum is $9A.
        let mut nmos = regs(0x99, D);
        execute_read(&mut nmos, Variant::Nmos6502, Operation::Adc, 0x01);
        assert!(!nmos.p.is_set(Z));

        let mut cmos = regs(0x99, D);
        execute_read(&mut cmos, Variant::Cmos65C02, Operation::Adc, 0x01);
        assert!(cmos.p.is_set(Z));
    }

    #[test]
    fn decimal_sbc() {
        for variant in [Variant::Nmos6502, Variant::Cmos65C02] {
            let mut r = regs(0x42, D | C);
            execute_read(&mut r, variant, Operation::Sbc, 0x13);
            assert_eq!(r.a, 0x29, "{variant:?}");
            assert!(r.p.is_set(C), "{variant:?}");

            let mut r = regs(0x00, D | C);
            execute_read(&mut r, variant, Operation::Sbc, 0x01);
            assert_eq!(r.a, 0x99, "{variant:?}");
            assert!(!r.p.is_set(C), "{variant:?}");
        }
    }

    #[test]
    fn compare_sets_carry_on_greater_or_equal() {
        let mut r = regs(0x40, 0);
        execute_read(&mut r, Variant::Nmos6502, Operation::Cmp, 0x40);
        assert!(r.p.is_set(C));
        assert!(r.p.is_set(Z));
        execute_read(&mut r, Variant::Nmos6502, Operation::Cmp, 0x41);
        assert!(!r.p.is_set(C));
        assert!(r.p.is_set(N));
    }

    #[test]
    fn test_and_set_bits() {
        let mut r = regs(0x0F, 0);
        assert_eq!(execute_modify(&mut r, Operation::Tsb, 0xF0), 0xFF);
        assert!(r.p.is_set(Z));
        assert_eq!(execute_modify(&mut r, Operation::Trb, 0xFF), 0xF0);
        assert!(!r.p.is_set(Z));
        assert_eq!(execute_modify(&mut r, Operation::Smb(3), 0x00), 0x08);
        assert_eq!(execute_modify(&mut r, Operation::Rmb(7), 0xFF), 0x7F);
    }

    #[test]
    fn rotates_go_through_carry() {
        let mut r = regs(0x80, C);
        execute_implied(&mut r, Operation::Rol);
        assert_eq!(r.a, 0x01);
        assert!(r.p.is_set(C));
        execute_implied(&mut r, Operation::Ror);
        assert_eq!(r.a, 0x80);
        assert!(r.p.is_set(C));
    }

    #[test]
    fn bit_immediate_only_touches_zero() {
        let mut r = regs(0x01, N | V);
        execute_read(&mut r, Variant::Cmos65C02, Operation::BitImmediate, 0xC0);
        assert!(r.p.is_set(Z));
        assert!(r.p.is_set(N));
        assert!(r.p.is_set(V));
    }

    #[test]
    fn php_pushes_break_and_unused() {
        let r = regs(0, C);
        assert_eq!(store_value(&r, Operation::Php), 0x31);
    }

    #[test]
    fn branch_on_zero_page_bit() {
        let r = regs(0, 0);
        assert!(branch_taken(&r, Operation::Bbs(2), 0x04));
        assert!(!branch_taken(&r, Operation::Bbr(2), 0x04));
        assert!(branch_taken(&r, Operation::Bra, 0));
    }
}
