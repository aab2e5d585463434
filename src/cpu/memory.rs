//! SAP-1 memory subsystem.
//!
//! The SAP-1 has 16 bytes of RAM addressed by a 4-bit memory address
//! register. All accesses wrap modulo 16.

use crate::cpu::registers::Nibble;
use serde::{Serialize, Deserialize};

/// The number of memory cells in the SAP-1.
pub const MEMORY_SIZE: usize = 16;

/// SAP-1 memory: 16 eight-bit cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: [u8; MEMORY_SIZE],
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: [0; MEMORY_SIZE],
        }
    }

    /// Read a cell.
    #[inline]
    pub fn read(&self, addr: Nibble) -> u8 {
        self.cells[addr.index()]
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: Nibble, value: u8) {
        self.cells[addr.index()] = value;
    }

    /// All cells in address order.
    pub fn cells(&self) -> &[u8; MEMORY_SIZE] {
        &self.cells
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells = [0; MEMORY_SIZE];
    }

    /// Iterate over `(address, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Nibble, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, &v)| (Nibble::wrapping_from_usize(i), v))
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}
