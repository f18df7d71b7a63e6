//! Property-based tests for CPU invariants.

use emu_core::SimpleBus;
use mos_6502::{Cpu65x02, CpuState, OpcodeTable, Variant};
use proptest::prelude::*;

fn variant() -> impl Strategy<Value = Variant> {
    prop_oneof![Just(Variant::Nmos6502), Just(Variant::Cmos65C02)]
}

/// Opcodes that fall through to the next instruction.
fn straight_line_opcodes(variant: Variant) -> Vec<u8> {
    OpcodeTable::get(variant)
        .iter()
        .filter(|(_, d)| !d.flow_control && !d.is_illegal())
        .map(|(opcode, _)| opcode)
        .collect()
}

proptest! {
    #[test]
    fn pc_advances_by_instruction_length_and_wraps(
        variant in variant(),
        start in any::<u16>(),
        pick in any::<prop::sample::Index>(),
        operands in any::<[u8; 2]>(),
    ) {
        let opcodes = straight_line_opcodes(variant);
        let opcode = opcodes[pick.index(opcodes.len())];
        let descriptor = OpcodeTable::get(variant).lookup(opcode);

        let mut bus = SimpleBus::new();
        bus.load(start, &[opcode, operands[0], operands[1]]);
        let mut cpu = Cpu65x02::new(variant);
        cpu.set_pc(&bus, start);
        cpu.next_instruction(&mut bus, &mut ());

        prop_assert_eq!(cpu.pc(), start.wrapping_add(u16::from(descriptor.bytes)));
    }

    #[test]
    fn indexed_read_costs_one_more_cycle_on_carry(
        variant in variant(),
        base in any::<u16>(),
        x in any::<u8>(),
    ) {
        let mut bus = SimpleBus::new();
        let [low, high] = base.to_le_bytes();
        // LDA abs,X
        bus.load(0x0200, &[0xBD, low, high]);
        let mut cpu = Cpu65x02::new(variant);
        cpu.set_pc(&bus, 0x0200);
        cpu.regs.x = x;

        let crossed = (base & 0x00FF) + u16::from(x) > 0x00FF;
        prop_assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 4 + u32::from(crossed));
    }

    #[test]
    fn nested_calls_unwind_to_an_empty_frame_list(
        depth in 1usize..40,
        pushes in prop::collection::vec(0u8..3, 40),
    ) {
        let mut bus = SimpleBus::new();
        // JSR sub0 at $0200; sub i at $1000 + i*$10.
        bus.load(0x0200, &[0x20, 0x00, 0x10]);
        for i in 0..depth {
            let address = 0x1000 + (i as u16) * 0x10;
            let mut body = Vec::new();
            for _ in 0..pushes[i] {
                body.extend([0x48, 0x08, 0x28, 0x68]); // PHA PHP PLP PLA
            }
            if i + 1 < depth {
                let [low, high] = (address + 0x10).to_le_bytes();
                body.extend([0x20, low, high]);
            }
            body.push(0x60);
            prop_assert!(body.len() <= 0x10);
            bus.load(address, &body);
        }

        let mut cpu = Cpu65x02::new(Variant::Nmos6502);
        cpu.set_pc(&bus, 0x0200);
        let mut deepest = 0;
        for _ in 0..10_000 {
            cpu.next_instruction(&mut bus, &mut ());
            deepest = deepest.max(cpu.virtual_stack().depth());
            if cpu.pc() == 0x0203 {
                break;
            }
        }

        prop_assert_eq!(cpu.pc(), 0x0203);
        prop_assert_eq!(deepest, depth);
        prop_assert_eq!(cpu.virtual_stack().depth(), 0);
    }

    #[test]
    fn snapshot_survives_json_at_any_cycle(
        variant in variant(),
        stop_after in 0usize..40,
    ) {
        let mut bus = SimpleBus::new();
        let program = [
            0xA2, 0x03, // LDX #$03
            0x20, 0x10, 0x02, // JSR $0210
            0xCA, // DEX
            0xD0, 0xFA, // BNE -6
            0x4C, 0x08, 0x02, // JMP $0208
        ];
        bus.load(0x0200, &program);
        bus.load(0x0210, &[0x48, 0x68, 0x60]); // PHA PLA RTS

        let mut cpu = Cpu65x02::new(variant);
        cpu.set_pc(&bus, 0x0200);
        for _ in 0..stop_after {
            cpu.tick_with(&mut bus, &mut ());
        }

        let json = serde_json::to_string(&cpu.state()).expect("serialize");
        let restored: CpuState = serde_json::from_str(&json).expect("deserialize");
        let mut copy = Cpu65x02::new(variant);
        copy.set_state(&restored).expect("restore");

        let mut copy_bus = bus.clone();
        for _ in 0..30 {
            cpu.tick_with(&mut bus, &mut ());
            copy.tick_with(&mut copy_bus, &mut ());
        }
        prop_assert_eq!(cpu.state(), copy.state());
    }
}
