//! TUI debugger for the SAP-1 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register view with carry flag
//! - Memory view of all 16 cells
//! - Step/run/breakpoint controls
//! - Disassembly and output views

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
