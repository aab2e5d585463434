//! CPU emulation for the SAP-1 computer.
//!
//! This module implements the complete SAP-1 architecture:
//! - 16 eight-bit memory cells
//! - Registers: A (accumulator), B, PC, MAR, IR, Carry
//! - 11-instruction set with single-address architecture

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trace;

pub use memory::{Memory, MEMORY_SIZE};
pub use registers::{Nibble, Registers};
pub use decode::{decode, encode, Instruction};
pub use execute::{Machine, MachineError, MachineState, Snapshot, Step, Termination};
pub use trace::{NoopTrace, OutputLog, Recorder, TraceEvent, TraceSink};
