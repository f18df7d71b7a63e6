//! Bus-level behaviour of individual instructions.

use emu_core::{Bus, SimpleBus};
use mos_6502::{Cpu65x02, Variant, flags};

/// Load a program at $0200 and point the CPU at it.
fn setup_program(bus: &mut SimpleBus, variant: Variant, program: &[u8]) -> Cpu65x02 {
    bus.load(0x0200, program);
    let mut cpu = Cpu65x02::new(variant);
    cpu.set_pc(bus, 0x0200);
    cpu
}

fn run(cpu: &mut Cpu65x02, bus: &mut SimpleBus, instructions: usize) -> u32 {
    (0..instructions)
        .map(|_| cpu.next_instruction(bus, &mut ()))
        .sum()
}

/// Records every access, in order.
#[derive(Default)]
struct RecordingBus {
    ram: SimpleBus,
    log: Vec<Access>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read(u16),
    Write(u16, u8),
}

impl Bus for RecordingBus {
    fn read(&mut self, address: u16, cycles: u64) -> u8 {
        self.log.push(Access::Read(address));
        self.ram.read(address, cycles)
    }

    fn write(&mut self, address: u16, value: u8, cycles: u64) {
        self.log.push(Access::Write(address, value));
        self.ram.write(address, value, cycles);
    }

    fn read_const(&self, address: u16) -> u8 {
        self.ram.read_const(address)
    }
}

#[test]
fn test_stack_pha_pla() {
    let mut bus = SimpleBus::new();
    let program = [
        0xA9, 0x42, // LDA #$42
        0xA2, 0xFF, // LDX #$FF
        0x9A, // TXS
        0x48, // PHA
        0xA9, 0x00, // LDA #$00
        0x68, // PLA
    ];
    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &program);

    run(&mut cpu, &mut bus, 6);

    assert_eq!(cpu.regs.a, 0x42, "PLA should restore A");
    assert_eq!(cpu.regs.s, 0xFF, "SP should be back to $FF after PLA");
}

#[test]
fn test_stack_php_plp() {
    let mut bus = SimpleBus::new();
    let program = [
        0x38, // SEC
        0x08, // PHP
        0x18, // CLC
        0x28, // PLP
    ];
    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &program);

    run(&mut cpu, &mut bus, 4);

    assert!(cpu.regs.p.is_set(flags::C), "PLP should restore carry flag");
    assert_eq!(bus.peek(0x01FD) & 0x30, 0x30, "PHP pushes B and bit 5");
    assert_eq!(cpu.status_bits() & 0x30, 0, "B and bit 5 are never stored");
}

#[test]
fn test_cmos_stack_ops() {
    let mut bus = SimpleBus::new();
    let program = [
        0xA2, 0x11, // LDX #$11
        0xA0, 0x22, // LDY #$22
        0xDA, // PHX
        0x5A, // PHY
        0xFA, // PLX
        0x7A, // PLY
    ];
    let mut cpu = setup_program(&mut bus, Variant::Cmos65C02, &program);

    assert_eq!(run(&mut cpu, &mut bus, 6), 2 + 2 + 3 + 3 + 4 + 4);
    assert_eq!((cpu.regs.x, cpu.regs.y), (0x22, 0x11));
}

#[test]
fn test_pc_wraps_at_top_of_memory() {
    let mut bus = SimpleBus::new();
    // LDA #$5A straddling $FFFF/$0000, then NOP
    bus.poke(0xFFFF, 0xA9);
    bus.load(0x0000, &[0x5A, 0xEA]);
    let mut cpu = Cpu65x02::new(Variant::Nmos6502);
    cpu.set_pc(&bus, 0xFFFF);

    cpu.next_instruction(&mut bus, &mut ());

    assert_eq!(cpu.regs.a, 0x5A);
    assert_eq!(cpu.pc(), 0x0001);
}

#[test]
fn test_rmw_writes_original_value_first() {
    for variant in [Variant::Nmos6502, Variant::Cmos65C02] {
        let mut bus = RecordingBus::default();
        // INC $10
        bus.ram.load(0x0200, &[0xE6, 0x10]);
        bus.ram.poke(0x0010, 0x41);
        let mut cpu = Cpu65x02::new(variant);
        cpu.set_pc(&bus, 0x0200);

        assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 5);

        let writes: Vec<_> = bus
            .log
            .iter()
            .filter(|access| matches!(access, Access::Write(..)))
            .copied()
            .collect();
        assert_eq!(
            writes,
            vec![Access::Write(0x0010, 0x41), Access::Write(0x0010, 0x42)],
            "{variant:?}"
        );
    }
}

#[test]
fn test_indexed_read_dummy_cycle() {
    // LDA $20F0,X with X=$20 crosses into $2110.
    let program = [0xBD, 0xF0, 0x20];

    let mut bus = RecordingBus::default();
    bus.ram.load(0x0200, &program);
    let mut cpu = Cpu65x02::new(Variant::Nmos6502);
    cpu.set_pc(&bus, 0x0200);
    cpu.regs.x = 0x20;
    cpu.next_instruction(&mut bus, &mut ());
    assert_eq!(
        bus.log,
        vec![
            Access::Read(0x0201),
            Access::Read(0x0202),
            Access::Read(0x2010),
            Access::Read(0x2110),
            Access::Read(0x0203),
        ],
        "NMOS reads the unfixed address"
    );

    let mut bus = RecordingBus::default();
    bus.ram.load(0x0200, &program);
    let mut cpu = Cpu65x02::new(Variant::Cmos65C02);
    cpu.set_pc(&bus, 0x0200);
    cpu.regs.x = 0x20;
    cpu.next_instruction(&mut bus, &mut ());
    assert_eq!(bus.log[2], Access::Read(0x0202), "65C02 rereads the operand");
}

#[test]
fn test_jmp_indirect_page_wrap() {
    let program = [0x6C, 0xFF, 0x02]; // JMP ($02FF)

    let mut bus = SimpleBus::new();
    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &program);
    bus.poke(0x02FF, 0x34);
    bus.poke(0x0200, 0x6C); // high byte comes from $0200 on NMOS
    bus.poke(0x0300, 0x12);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 5);
    assert_eq!(cpu.pc(), 0x6C34);

    let mut bus = SimpleBus::new();
    let mut cpu = setup_program(&mut bus, Variant::Cmos65C02, &program);
    bus.poke(0x02FF, 0x34);
    bus.poke(0x0300, 0x12);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 6);
    assert_eq!(cpu.pc(), 0x1234);
}

#[test]
fn test_jmp_absolute_indexed_indirect() {
    let mut bus = SimpleBus::new();
    // JMP ($1000,X)
    let mut cpu = setup_program(&mut bus, Variant::Cmos65C02, &[0x7C, 0x00, 0x10]);
    cpu.regs.x = 0x04;
    bus.load(0x1004, &[0x78, 0x56]);

    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 6);
    assert_eq!(cpu.pc(), 0x5678);
}

#[test]
fn test_decimal_adc_vector() {
    let mut bus = SimpleBus::new();
    let program = [
        0xF8, // SED
        0x38, // SEC
        0xA9, 0x79, // LDA #$79
        0x69, 0x00, // ADC #$00
    ];
    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &program);

    run(&mut cpu, &mut bus, 4);

    assert_eq!(cpu.regs.a, 0x80);
    assert!(cpu.regs.p.is_set(flags::N));
    assert!(cpu.regs.p.is_set(flags::V));
    assert!(!cpu.regs.p.is_set(flags::Z));
    assert!(!cpu.regs.p.is_set(flags::C));
}

#[test]
fn test_nmi_waits_for_instruction_boundary() {
    let mut bus = SimpleBus::new();
    bus.load(0xFFFA, &[0x00, 0x80]);
    // LDA $1234 (4 cycles)
    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &[0xAD, 0x34, 0x12]);
    bus.poke(0x1234, 0x99);

    for raise_at in 1..4 {
        let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &[0xAD, 0x34, 0x12]);
        for cycle in 0..4 {
            if cycle == raise_at {
                cpu.raise_nmi();
            }
            cpu.tick_with(&mut bus, &mut ());
        }
        assert_eq!(cpu.t(), 0);
        assert_eq!(cpu.regs.a, 0x99, "LDA completes first");
        assert!(cpu.nmi_pending());
        assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 7);
        assert_eq!(cpu.pc(), 0x8000);
    }

    // Raised at the boundary it is taken straight away.
    cpu.raise_nmi();
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 7);
    assert_eq!(cpu.regs.a, 0x00);
    assert_eq!(cpu.pc(), 0x8000);
}

#[test]
fn test_rti_restores_status_and_pc() {
    let mut bus = SimpleBus::new();
    bus.load(0xFFFE, &[0x00, 0x80]);
    bus.poke(0x8000, 0x40); // RTI
    let program = [
        0x58, // CLI
        0x38, // SEC
        0xEA, // NOP
    ];
    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &program);
    run(&mut cpu, &mut bus, 2);
    cpu.raise_irq();

    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.pc(), 0x8000);
    assert!(cpu.regs.p.is_set(flags::I));

    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 6);
    assert_eq!(cpu.pc(), 0x0202);
    assert!(!cpu.regs.p.is_set(flags::I));
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn test_irq_clears_decimal_only_on_cmos() {
    for (variant, decimal_after) in [(Variant::Nmos6502, true), (Variant::Cmos65C02, false)] {
        let mut bus = SimpleBus::new();
        bus.load(0xFFFE, &[0x00, 0x80]);
        let mut cpu = setup_program(&mut bus, variant, &[0xEA]);
        cpu.set_status_bits(flags::D);
        cpu.raise_irq();

        cpu.next_instruction(&mut bus, &mut ());

        assert_eq!(cpu.regs.p.is_set(flags::D), decimal_after, "{variant:?}");
    }
}

#[test]
fn test_bit_branch_and_bit_set() {
    let mut bus = SimpleBus::new();
    let program = [
        0x97, 0x10, // SMB1 $10
        0x9F, 0x10, 0x02, // BBS1 $10,+2
        0xA9, 0x01, // LDA #$01 (skipped)
        0x17, 0x10, // RMB1 $10
        0x1F, 0x10, 0x02, // BBR1 $10,+2
        0xA9, 0x02, // LDA #$02 (skipped)
        0xEA, // NOP
    ];
    let mut cpu = setup_program(&mut bus, Variant::Cmos65C02, &program);

    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 5);
    assert_eq!(bus.peek(0x0010), 0x02);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 6);
    assert_eq!(cpu.pc(), 0x0207);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 5);
    assert_eq!(bus.peek(0x0010), 0x00);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 6);
    assert_eq!(cpu.pc(), 0x020E);
    assert_eq!(cpu.regs.a, 0x00);
}

#[test]
fn test_stz_and_test_bits() {
    let mut bus = SimpleBus::new();
    bus.poke(0x0010, 0xFF);
    bus.poke(0x0011, 0xF0);
    let program = [
        0x64, 0x10, // STZ $10
        0xA9, 0x0F, // LDA #$0F
        0x04, 0x11, // TSB $11
    ];
    let mut cpu = setup_program(&mut bus, Variant::Cmos65C02, &program);

    run(&mut cpu, &mut bus, 3);

    assert_eq!(bus.peek(0x0010), 0x00);
    assert_eq!(bus.peek(0x0011), 0xFF);
    assert!(cpu.regs.p.is_set(flags::Z));
}

#[test]
fn test_illegal_opcode_keeps_running() {
    let mut bus = SimpleBus::new();
    // $02 is undefined on the 6502 and a 2-byte NOP on the 65C02.
    let program = [0x02, 0xA9, 0x07];

    let mut cpu = setup_program(&mut bus, Variant::Nmos6502, &program);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 2);
    assert_eq!(cpu.pc(), 0x0201);
    cpu.next_instruction(&mut bus, &mut ());
    assert_eq!(cpu.regs.a, 0x07);

    let mut cpu = setup_program(&mut bus, Variant::Cmos65C02, &program);
    assert_eq!(cpu.next_instruction(&mut bus, &mut ()), 2);
    assert_eq!(cpu.pc(), 0x0202);
}

#[test]
fn test_read_const_has_no_side_effects() {
    let mut bus = RecordingBus::default();
    bus.ram.load(0x0200, &[0xEA]);
    let mut cpu = Cpu65x02::new(Variant::Nmos6502);
    cpu.set_pc(&bus, 0x0200);

    assert_eq!(cpu.descriptor_at(&bus, 0x0200).mnemonic, "NOP");
    assert!(bus.log.is_empty());
}
