//! CPU core trait.

use crate::Bus;

/// A CPU core.
///
/// CPUs take a bus reference in their tick method because they need to
/// access memory on specific cycles. The bus is passed in, not owned, so the
/// scheduler can hand it to other components between instructions.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Advance the CPU by exactly one cycle.
    fn tick<B: Bus>(&mut self, bus: &mut B);

    /// Run until the next instruction boundary. Returns cycles consumed.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Address of the most recently fetched opcode.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Latch a maskable interrupt; serviced at the next instruction boundary.
    fn interrupt(&mut self);

    /// Latch a non-maskable interrupt; serviced at the next instruction boundary.
    fn nmi(&mut self);

    /// Reset the CPU through its reset vector.
    fn reset<B: Bus>(&mut self, bus: &mut B);
}
