//! # SAP-1 Emulator
//!
//! An emulator of the Simple-As-Possible (SAP-1) 8-bit computer popularised
//! by Ben Eater's breadboard build.
//!
//! The SAP-1 has 16 bytes of memory, an accumulator, a B register, a 4-bit
//! program counter and eleven instructions. This crate models one
//! instruction per cycle; it is not cycle-accurate at the microcode level.

pub mod cpu;
pub mod program;
pub mod report;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{
    Instruction, Machine, MachineError, MachineState, Memory, Nibble, NoopTrace, OutputLog, Recorder,
    Registers, Snapshot, Step, Termination, TraceEvent, TraceSink,
};
pub use program::{assemble, disassemble, load_image, AssemblerError, LoadError, ProgramImage};
pub use report::ConsoleReporter;

#[cfg(feature = "tui")]
pub use tui::run_debugger;
