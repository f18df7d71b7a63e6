//! Memory and I/O bus contract.

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding, bank switching and soft switches.
///
/// `cycles` is the CPU's running cycle total at the moment of the access.
/// Buses that emulate the floating bus derive the returned value from it.
pub trait Bus {
    /// Read a byte. May have side effects (soft switches, bank changes).
    fn read(&mut self, address: u16, cycles: u64) -> u8;

    /// Write a byte. May have side effects.
    fn write(&mut self, address: u16, value: u8, cycles: u64);

    /// Read a byte without side effects.
    ///
    /// Used for disassembly, data watches and debugger memory reads. Must
    /// never change soft-switch state.
    fn read_const(&self, address: u16) -> u8;
}

/// Flat 64 KiB RAM with no I/O.
#[derive(Clone)]
pub struct SimpleBus {
    ram: Box<[u8; 0x10000]>,
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x10000]),
        }
    }

    /// Copy `data` into RAM starting at `address`, wrapping at $FFFF.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.ram[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }

    /// Point the reset vector at `address`.
    pub fn set_reset_vector(&mut self, address: u16) {
        self.load(0xFFFC, &address.to_le_bytes());
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16, _cycles: u64) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8, _cycles: u64) {
        self.ram[address as usize] = value;
    }

    fn read_const(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }
}
