//! SAP-1 CPU registers.
//!
//! The SAP-1 has six pieces of register state:
//! - A: 8-bit accumulator
//! - B: 8-bit operand register, loaded from the bus by ADD and SUB
//! - PC: 4-bit program counter
//! - MAR: 4-bit memory address register
//! - IR: 8-bit instruction register (opcode nibble, operand nibble)
//! - Carry: 1-bit flag set by ADD and SUB

use serde::{Serialize, Deserialize};
use std::fmt;

/// A 4-bit value.
/// Range: 0 to 15. Every constructor wraps modulo 16.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Nibble(u8);

impl Nibble {
    /// Zero.
    pub const ZERO: Nibble = Nibble(0);
    /// Maximum value: 15.
    pub const MAX: Nibble = Nibble(0x0F);

    /// Create a nibble, keeping only the low 4 bits.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Self(value & 0x0F)
    }

    /// Create a nibble from an arbitrary index, wrapping modulo 16.
    #[inline]
    pub const fn wrapping_from_usize(value: usize) -> Self {
        Self((value % 16) as u8)
    }

    /// The high 4 bits of a byte.
    #[inline]
    pub const fn high(byte: u8) -> Self {
        Self(byte >> 4)
    }

    /// The low 4 bits of a byte.
    #[inline]
    pub const fn low(byte: u8) -> Self {
        Self::new(byte)
    }

    /// Get the value (0-15).
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Get the value as a memory index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Add one, wrapping from 15 to 0.
    #[inline]
    pub const fn wrapping_inc(self) -> Self {
        Self::new(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04b}", self.0)
    }
}

impl fmt::Display for Nibble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Nibble> for u8 {
    fn from(n: Nibble) -> u8 {
        n.0
    }
}

/// Keeps only the low 4 bits, like [`Nibble::new`].
impl From<u8> for Nibble {
    fn from(value: u8) -> Self {
        Nibble::new(value)
    }
}

/// The SAP-1 register file.
///
/// Fields are private so that every mutation goes through a setter that
/// keeps the value inside its bit width.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    a: u8,
    b: u8,
    pc: Nibble,
    mar: Nibble,
    ir: u8,
    carry: bool,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// A: accumulator.
    pub fn a(&self) -> u8 {
        self.a
    }

    /// B: last operand read by ADD or SUB.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// PC: address of the next instruction.
    pub fn pc(&self) -> Nibble {
        self.pc
    }

    /// MAR: address of the last memory access.
    pub fn mar(&self) -> Nibble {
        self.mar
    }

    /// IR: the instruction being executed.
    pub fn ir(&self) -> u8 {
        self.ir
    }

    /// Carry flag.
    pub fn carry(&self) -> bool {
        self.carry
    }

    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    pub fn set_b(&mut self, value: u8) {
        self.b = value;
    }

    pub fn set_ir(&mut self, value: u8) {
        self.ir = value;
    }

    pub fn set_mar(&mut self, addr: Nibble) {
        self.mar = addr;
    }

    pub fn set_carry(&mut self, carry: bool) {
        self.carry = carry;
    }

    /// Increment the program counter by 1, wrapping from 15 to 0.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> Nibble {
        let old = self.pc;
        self.pc = self.pc.wrapping_inc();
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: Nibble) {
        self.pc = addr;
    }

    /// The opcode field of IR.
    pub fn opcode(&self) -> Nibble {
        Nibble::high(self.ir)
    }
}
