//! 6502/65C02 CPU implementation.
//!
//! Cycle-accurate emulation where each `tick()` performs exactly one bus
//! access. Instructions run as precomposed micro-op sequences (see
//! [`crate::microcode`]); the last micro-op of each prefetches the next
//! opcode, so between instructions `T == 0` and `regs.pc` points one past the
//! opcode that will run next.

use emu_core::{Bus, Cpu, Observable, Value};
use serde::{Deserialize, Serialize};

use crate::alu;
use crate::flags::{C, D, I, N, V, Z};
use crate::microcode::{Flow, INTERRUPT, Index, InstructionTable, MicroOp};
use crate::opcodes::{Descriptor, OpcodeTable, Operation, Variant};
use crate::vstack::{Marker, VirtualStack};
use crate::{Registers, Status};

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// Notifications raised by the engine while executing.
///
/// These are the only signals the scheduler and debugger observe.
pub trait CpuHooks {
    /// JSR is about to jump to its target.
    fn call(&mut self) {}
    /// RTS has restored PC. Interrupts and RTI are not reported.
    fn returned(&mut self) {}
    /// BRK executed.
    fn debug(&mut self) {}
}

impl CpuHooks for () {}

/// Which micro-op sequence is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sequence {
    /// The instruction for the prefetched opcode.
    #[default]
    Opcode,
    Irq,
    Nmi,
}

/// Temporaries carried between micro-ops of one instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latch {
    /// Effective address.
    pub ea: u16,
    /// Zero-page pointer for indirect modes.
    pub pointer: u8,
    /// Operand byte (RMW data, branch offset, JMP indirect low byte).
    pub operand: u8,
    /// Interrupt vector for the running BRK/IRQ/NMI.
    pub vector: u16,
    /// Last index addition carried into the high byte.
    pub crossed: bool,
}

/// The 6502 family CPU.
#[derive(Debug)]
pub struct Cpu65x02 {
    /// CPU registers.
    pub regs: Registers,
    pub(crate) variant: Variant,
    opcodes: &'static OpcodeTable,
    instructions: &'static InstructionTable,
    /// Prefetched opcode, or the one executing when `t > 0`.
    pub(crate) opcode: u8,
    pub(crate) sequence: Sequence,
    /// Position within the running sequence.
    pub(crate) t: u8,
    pub(crate) latch: Latch,
    pub(crate) nmi_pending: bool,
    pub(crate) irq_pending: bool,
    /// Total cycles executed; passed to the bus with every access.
    pub(crate) cycles: u64,
    pub(crate) vstack: VirtualStack,
}

impl Cpu65x02 {
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        Self {
            regs: Registers::new(),
            variant,
            opcodes: OpcodeTable::get(variant),
            instructions: InstructionTable::get(variant),
            opcode: 0,
            sequence: Sequence::Opcode,
            t: 0,
            latch: Latch::default(),
            nmi_pending: false,
            irq_pending: false,
            cycles: 0,
            vstack: VirtualStack::new(),
        }
    }

    /// Reset through $FFFC and prefetch the first opcode.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs.s = 0xFD;
        self.regs.p.set(I);
        self.regs.p.clear(D);
        self.nmi_pending = false;
        self.irq_pending = false;
        self.sequence = Sequence::Opcode;
        self.latch = Latch::default();
        self.vstack.reset();

        // Same shape as an interrupt: a dummy read, three stack cycles with
        // writes suppressed, the vector, then the first opcode fetch.
        let _ = self.read(bus, self.regs.pc);
        self.cycles += 1;
        for offset in 0..3u8 {
            let address = 0x0100 | u16::from(0xFDu8.wrapping_add(3 - offset));
            let _ = self.read(bus, address);
            self.cycles += 1;
        }
        let low = self.read(bus, RESET_VECTOR);
        self.cycles += 1;
        let high = self.read(bus, RESET_VECTOR.wrapping_add(1));
        self.cycles += 1;
        self.regs.pc = u16::from_le_bytes([low, high]);

        self.opcode = self.read(bus, self.regs.pc);
        self.cycles += 1;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.t = 0;
        log::debug!("{:?} reset to ${:04X}", self.variant, self.pc());
    }

    /// Move execution to `address` without bus side effects.
    pub fn set_pc<B: Bus>(&mut self, bus: &B, address: u16) {
        self.opcode = bus.read_const(address);
        self.regs.pc = address.wrapping_add(1);
        self.sequence = Sequence::Opcode;
        self.t = 0;
    }

    pub fn raise_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Latch IRQ. It stays pending while I is set.
    pub fn raise_irq(&mut self) {
        self.irq_pending = true;
    }

    /// Whether the next tick will splice in an interrupt instead of running
    /// the prefetched opcode.
    #[must_use]
    pub fn interrupt_due(&self) -> bool {
        self.t == 0
            && self.sequence == Sequence::Opcode
            && (self.nmi_pending || (self.irq_pending && !self.regs.p.is_set(I)))
    }

    /// Execute one cycle.
    pub fn tick_with<B: Bus, H: CpuHooks + ?Sized>(&mut self, bus: &mut B, hooks: &mut H) {
        if self.t == 0 && self.sequence == Sequence::Opcode {
            self.poll_interrupts();
        }

        let op = self.current_op();
        let flow = self.execute(op, bus, hooks);
        self.cycles += 1;

        match flow {
            Flow::Next => self.t += 1,
            Flow::Skip(n) => self.t += 1 + n,
            Flow::Done => {
                self.t = 0;
                self.sequence = Sequence::Opcode;
            }
        }
    }

    /// Run until the next instruction boundary. Returns cycles consumed.
    pub fn next_instruction<B: Bus, H: CpuHooks + ?Sized>(
        &mut self,
        bus: &mut B,
        hooks: &mut H,
    ) -> u32 {
        let mut cycles = 0;
        loop {
            self.tick_with(bus, hooks);
            cycles += 1;
            if self.t == 0 {
                return cycles;
            }
        }
    }

    fn poll_interrupts(&mut self) {
        let (sequence, vector) = if self.nmi_pending {
            self.nmi_pending = false;
            (Sequence::Nmi, NMI_VECTOR)
        } else if self.irq_pending && !self.regs.p.is_set(I) {
            self.irq_pending = false;
            (Sequence::Irq, IRQ_VECTOR)
        } else {
            return;
        };
        // The prefetched opcode is discarded and fetched again on return.
        self.regs.pc = self.regs.pc.wrapping_sub(1);
        self.sequence = sequence;
        self.latch.vector = vector;
    }

    fn current_op(&self) -> MicroOp {
        let op = match self.sequence {
            Sequence::Opcode => self.instructions.lookup(self.opcode).op(self.t),
            Sequence::Irq | Sequence::Nmi => INTERRUPT.get(self.t as usize).copied(),
        };
        op.unwrap_or(MicroOp::Fetch)
    }

    pub(crate) fn instruction_len(&self, opcode: u8) -> u8 {
        self.instructions.lookup(opcode).len()
    }

    fn operation(&self) -> Operation {
        self.instructions.lookup(self.opcode).operation
    }

    fn read<B: Bus>(&self, bus: &mut B, address: u16) -> u8 {
        bus.read(address, self.cycles)
    }

    fn write<B: Bus>(&self, bus: &mut B, address: u16, value: u8) {
        bus.write(address, value, self.cycles);
    }

    /// Read the byte at PC and advance PC.
    fn read_pc<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let address = self.regs.push();
        self.write(bus, address, value);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let address = self.regs.pop();
        self.read(bus, address)
    }

    fn index(&self, index: Index) -> u8 {
        match index {
            Index::X => self.regs.x,
            Index::Y => self.regs.y,
        }
    }

    /// Add an index to `base`, skipping the fix-up cycle when allowed.
    fn index_into(&mut self, base: u16, index: u8, penalty: bool) -> Flow {
        self.latch.ea = base.wrapping_add(u16::from(index));
        self.latch.crossed = (base ^ self.latch.ea) & 0xFF00 != 0;
        if penalty && !self.latch.crossed {
            Flow::Skip(1)
        } else {
            Flow::Next
        }
    }

    fn with_high(&self, high: u8) -> u16 {
        u16::from_le_bytes([self.latch.ea as u8, high])
    }

    fn execute<B: Bus, H: CpuHooks + ?Sized>(
        &mut self,
        op: MicroOp,
        bus: &mut B,
        hooks: &mut H,
    ) -> Flow {
        let operation = self.operation();
        match op {
            MicroOp::Fetch => {
                self.opcode = self.read_pc(bus);
                return Flow::Done;
            }

            MicroOp::Implied => {
                let _ = self.read(bus, self.regs.pc);
                alu::execute_implied(&mut self.regs, operation);
            }
            MicroOp::Immediate => {
                let value = self.read_pc(bus);
                alu::execute_read(&mut self.regs, self.variant, operation, value);
            }

            // Address computation
            MicroOp::ZeroPageAddress | MicroOp::AbsoluteLow => {
                self.latch.ea = u16::from(self.read_pc(bus));
            }
            MicroOp::ZeroPageIndex(index) => {
                let _ = self.read(bus, self.latch.ea);
                let offset = self.index(index);
                self.latch.ea = u16::from((self.latch.ea as u8).wrapping_add(offset));
            }
            MicroOp::AbsoluteHigh => {
                let high = self.read_pc(bus);
                self.latch.ea = self.with_high(high);
            }
            MicroOp::AbsoluteHighIndexed { index, penalty } => {
                let high = self.read_pc(bus);
                let base = self.with_high(high);
                let offset = self.index(index);
                return self.index_into(base, offset, penalty);
            }
            MicroOp::FixIndexed => {
                let address = match (self.variant, self.latch.crossed) {
                    (Variant::Nmos6502, true) => self.latch.ea.wrapping_sub(0x100),
                    (Variant::Cmos65C02, true) => self.regs.pc.wrapping_sub(1),
                    (_, false) => self.latch.ea,
                };
                let _ = self.read(bus, address);
            }
            MicroOp::PointerAddress => {
                self.latch.pointer = self.read_pc(bus);
            }
            MicroOp::PointerIndexX => {
                let _ = self.read(bus, u16::from(self.latch.pointer));
                self.latch.pointer = self.latch.pointer.wrapping_add(self.regs.x);
            }
            MicroOp::PointerLow => {
                self.latch.ea = u16::from(self.read(bus, u16::from(self.latch.pointer)));
            }
            MicroOp::PointerHigh => {
                let high = self.read(bus, u16::from(self.latch.pointer.wrapping_add(1)));
                self.latch.ea = self.with_high(high);
            }
            MicroOp::PointerHighIndexed { penalty } => {
                let high = self.read(bus, u16::from(self.latch.pointer.wrapping_add(1)));
                let base = self.with_high(high);
                return self.index_into(base, self.regs.y, penalty);
            }

            // Data access
            MicroOp::Read => {
                let value = self.read(bus, self.latch.ea);
                alu::execute_read(&mut self.regs, self.variant, operation, value);
            }
            MicroOp::Write => {
                let value = alu::store_value(&self.regs, operation);
                self.write(bus, self.latch.ea, value);
            }
            MicroOp::ReadOperand => {
                self.latch.operand = self.read(bus, self.latch.ea);
            }
            MicroOp::DummyWrite => {
                self.write(bus, self.latch.ea, self.latch.operand);
                self.latch.operand =
                    alu::execute_modify(&mut self.regs, operation, self.latch.operand);
            }
            MicroOp::WriteResult => {
                self.write(bus, self.latch.ea, self.latch.operand);
            }
            MicroOp::DummyRead => {
                let _ = self.read(bus, self.latch.ea);
            }
            MicroOp::DummyReadOperand => {
                let _ = self.read(bus, self.regs.pc.wrapping_sub(1));
            }

            // Stack
            MicroOp::StackPeek => {
                let _ = self.read(bus, self.regs.stack_addr());
            }
            MicroOp::Push => {
                let value = alu::store_value(&self.regs, operation);
                self.push(bus, value);
                let marker = if operation == Operation::Php {
                    Marker::Php
                } else {
                    Marker::Pha
                };
                self.vstack.on_push(marker);
            }
            MicroOp::Pull => {
                let value = self.pull(bus);
                alu::execute_pull(&mut self.regs, operation, value);
                self.vstack.on_pull();
            }
            MicroOp::PushPch => {
                let [_, high] = self.regs.pc.to_le_bytes();
                self.push(bus, high);
            }
            MicroOp::PushPcl => {
                let [low, _] = self.regs.pc.to_le_bytes();
                self.push(bus, low);
            }
            MicroOp::PushStatus => {
                let brk = self.sequence == Sequence::Opcode;
                let value = if brk {
                    self.regs.p.to_byte_brk()
                } else {
                    self.regs.p.to_byte_irq()
                };
                self.push(bus, value);
                self.regs.p.set(I);
                if brk || self.variant == Variant::Cmos65C02 {
                    self.regs.p.clear(D);
                }
            }
            MicroOp::PullStatus => {
                let value = self.pull(bus);
                self.regs.p = Status::from_byte(value);
            }
            MicroOp::PullPcl => {
                self.latch.ea = u16::from(self.pull(bus));
            }
            MicroOp::PullPch => {
                let high = self.pull(bus);
                self.latch.ea = self.with_high(high);
            }

            // Control flow
            MicroOp::JsrHigh => {
                let high = self.read(bus, self.regs.pc);
                let target = self.with_high(high);
                let mut registers = self.regs;
                registers.pc = self.regs.pc.wrapping_sub(2);
                self.vstack.on_call(target, registers, self.cycles);
                hooks.call();
                self.regs.pc = target;
            }
            MicroOp::RtsReturn => {
                let _ = self.read(bus, self.latch.ea);
                self.regs.pc = self.latch.ea.wrapping_add(1);
                self.vstack.on_return();
                hooks.returned();
            }
            MicroOp::RtiReturn => {
                let high = self.pull(bus);
                self.regs.pc = self.with_high(high);
            }
            MicroOp::JumpHigh => {
                let high = self.read(bus, self.regs.pc);
                self.regs.pc = self.with_high(high);
            }
            MicroOp::AddIndexX => {
                let _ = self.read(bus, self.regs.pc.wrapping_sub(1));
                self.latch.ea = self.latch.ea.wrapping_add(u16::from(self.regs.x));
            }
            MicroOp::IndirectLow => {
                self.latch.operand = self.read(bus, self.latch.ea);
            }
            MicroOp::IndirectHigh => {
                let high = self.read(bus, self.latch.ea.wrapping_add(1));
                self.regs.pc = u16::from_le_bytes([self.latch.operand, high]);
            }
            MicroOp::IndirectHighPageWrap => {
                let address = (self.latch.ea & 0xFF00) | (self.latch.ea.wrapping_add(1) & 0x00FF);
                let high = self.read(bus, address);
                self.regs.pc = u16::from_le_bytes([self.latch.operand, high]);
            }
            MicroOp::BranchOffset => {
                // BBR/BBS test the zero-page byte before the offset replaces it.
                let taken = alu::branch_taken(&self.regs, operation, self.latch.operand);
                self.latch.operand = self.read_pc(bus);
                if !taken {
                    return Flow::Skip(2);
                }
            }
            MicroOp::BranchTaken => {
                let _ = self.read(bus, self.regs.pc);
                let offset = self.latch.operand as i8;
                self.latch.ea = self.regs.pc.wrapping_add_signed(i16::from(offset));
                if (self.regs.pc ^ self.latch.ea) & 0xFF00 == 0 {
                    self.regs.pc = self.latch.ea;
                    return Flow::Skip(1);
                }
            }
            MicroOp::BranchFixPage => {
                let address = (self.regs.pc & 0xFF00) | (self.latch.ea & 0x00FF);
                let _ = self.read(bus, address);
                self.regs.pc = self.latch.ea;
            }

            // Interrupts
            MicroOp::BreakSignature => {
                let _ = self.read_pc(bus);
                self.latch.vector = IRQ_VECTOR;
                hooks.debug();
            }
            MicroOp::InterruptDummy => {
                let _ = self.read(bus, self.regs.pc);
            }
            MicroOp::VectorLow => {
                self.latch.ea = u16::from(self.read(bus, self.latch.vector));
            }
            MicroOp::VectorHigh => {
                let high = self.read(bus, self.latch.vector.wrapping_add(1));
                self.regs.pc = self.with_high(high);
            }

            MicroOp::IllegalStub => {
                let _ = self.read(bus, self.regs.pc);
                log::warn!(
                    "illegal opcode ${:02X} at ${:04X}",
                    self.opcode,
                    self.regs.pc.wrapping_sub(1)
                );
            }
        }
        Flow::Next
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// Address of the prefetched opcode. Only meaningful at an instruction
    /// boundary.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.regs.pc.wrapping_sub(1)
    }

    #[must_use]
    pub const fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Position within the running micro-op sequence.
    #[must_use]
    pub const fn t(&self) -> u8 {
        self.t
    }

    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub const fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    #[must_use]
    pub const fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    /// The six real flags packed into a byte (B and bit 5 clear).
    #[must_use]
    pub const fn status_bits(&self) -> u8 {
        self.regs.p.bits()
    }

    pub fn set_status_bits(&mut self, value: u8) {
        self.regs.p = Status::from_byte(value);
    }

    #[must_use]
    pub fn opcode_table(&self) -> &'static OpcodeTable {
        self.opcodes
    }

    /// Descriptor of the prefetched opcode.
    #[must_use]
    pub fn current_descriptor(&self) -> &'static Descriptor {
        self.opcodes.lookup(self.opcode)
    }

    /// Decode the opcode at `address` without bus side effects.
    #[must_use]
    pub fn descriptor_at<B: Bus>(&self, bus: &B, address: u16) -> &'static Descriptor {
        self.opcodes.lookup(bus.read_const(address))
    }

    #[must_use]
    pub fn virtual_stack(&self) -> &VirtualStack {
        &self.vstack
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl Cpu for Cpu65x02 {
    type Registers = Registers;

    fn tick<B: Bus>(&mut self, bus: &mut B) {
        self.tick_with(bus, &mut ());
    }

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.next_instruction(bus, &mut ())
    }

    fn pc(&self) -> u16 {
        Cpu65x02::pc(self)
    }

    fn registers(&self) -> Self::Registers {
        self.regs
    }

    fn interrupt(&mut self) {
        self.raise_irq();
    }

    fn nmi(&mut self) {
        self.raise_nmi();
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) {
        Cpu65x02::reset(self, bus);
    }
}

impl Observable for Cpu65x02 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.pc().into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" | "sp" => Some(self.regs.s.into()),
            "p" | "status" => Some(self.status_bits().into()),
            "flags.c" | "c" => Some(self.regs.p.is_set(C).into()),
            "flags.z" | "z" => Some(self.regs.p.is_set(Z).into()),
            "flags.i" | "i" => Some(self.regs.p.is_set(I).into()),
            "flags.d" | "d" => Some(self.regs.p.is_set(D).into()),
            "flags.v" | "v" => Some(self.regs.p.is_set(V).into()),
            "flags.n" | "n" => Some(self.regs.p.is_set(N).into()),
            "t" => Some(self.t.into()),
            "opcode" => Some(self.opcode.into()),
            "cycles" => Some(Value::U64(self.cycles)),
            "nmi" => Some(self.nmi_pending.into()),
            "irq" => Some(self.irq_pending.into()),
            "vstack.depth" => Some(Value::U64(self.vstack.depth() as u64)),
            "vstack.frames" => Some(Value::List(
                self.vstack
                    .call_stack()
                    .map(|frame| Value::U16(frame.entry))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc",
            "a",
            "x",
            "y",
            "s",
            "p",
            "flags.n",
            "flags.v",
            "flags.d",
            "flags.i",
            "flags.z",
            "flags.c",
            "t",
            "opcode",
            "cycles",
            "nmi",
            "irq",
            "vstack.depth",
            "vstack.frames",
        ]
    }
}
