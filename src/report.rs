//! Human-readable rendering of machine state, output and termination.

use crate::cpu::decode::Instruction;
use crate::cpu::execute::{Snapshot, Termination};
use crate::cpu::registers::Nibble;
use crate::cpu::trace::{TraceEvent, TraceSink};
use std::fmt;
use std::io::{self, BufRead, Write};

/// Render a snapshot as a register and memory dump.
pub fn format_snapshot(snap: &Snapshot) -> String {
    let mut lines = vec![
        String::new(),
        format!("   PC:      {:04b}    0x{:02X}", snap.pc.value(), snap.pc.value()),
        format!("   IR:  {:08b}  0x{:04X}", snap.ir, snap.ir),
        format!("    A:  {:08b}  0x{:04X}", snap.a, snap.a),
        format!("    B:  {:08b}  0x{:04X}", snap.b, snap.b),
        format!("  MAR:  {:04b}  0x{:04X}", snap.mar.value(), snap.mar.value()),
        format!("Carry:  {:4b}  0x{:X}", snap.carry as u8, snap.carry as u8),
        "Memory:".to_string(),
    ];
    lines.extend(
        snap.memory
            .iter()
            .enumerate()
            .map(|(addr, value)| format!("    {:04b}: {:08b}  {:3}  0x{:04X}", addr, value, value, value)),
    );

    lines.join("\n    ")
}

/// The banner printed when OUT executes.
pub fn format_output(value: u8) -> String {
    format!(
        "****\n**** OUTPUT: {0}  0x{0:04X}  {0:04X}h  0b{0:08b}\n****",
        value
    )
}

pub fn halt_message(pc: Nibble) -> String {
    format!("HLT executed when PC is {}", pc)
}

pub fn fault_message(ir: u8) -> String {
    format!("Invalid opcode {}: {1}  0x{1:02X}  0b{1:08b}", Nibble::high(ir), ir)
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Termination::Halted { pc } => f.write_str(&halt_message(pc)),
            Termination::Faulted { ir } => f.write_str(&fault_message(ir)),
        }
    }
}

/// A [`TraceSink`] that prints to a terminal.
///
/// OUT banners are always printed. Phase detail is printed only when
/// `trace` is set. When `pause` is set, every execute phase that does not
/// end the run waits for a line on `input` before the next cycle starts.
pub struct ConsoleReporter<W, R> {
    out: W,
    input: R,
    trace: bool,
    pause: bool,
    /// The instruction in flight is HLT or undefined.
    terminal: bool,
    error: Option<io::Error>,
}

impl<W: Write, R: BufRead> ConsoleReporter<W, R> {
    pub fn new(out: W, input: R, trace: bool, pause: bool) -> Self {
        Self { out, input, trace, pause, terminal: false, error: None }
    }

    /// The first I/O error hit while reporting, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn report(&mut self, event: &TraceEvent) -> io::Result<()> {
        match event {
            TraceEvent::Fetch { pc, mar, ir, next_pc } if self.trace => {
                writeln!(self.out)?;
                writeln!(self.out, "---- START fetch/decode/execute ----")?;
                writeln!(self.out, " PC: {}", pc)?;
                writeln!(self.out, "MAR: {}", mar)?;
                writeln!(self.out, " IR: {}", ir)?;
                writeln!(self.out, " PC: {}", next_pc)?;
            }
            TraceEvent::Decode { opcode, instruction } => {
                self.terminal = matches!(instruction, Instruction::Hlt | Instruction::Undefined { .. });
                if self.trace {
                    writeln!(self.out, "Opcode: {} - {}", opcode, instruction.mnemonic())?;
                }
            }
            TraceEvent::Output { value } => {
                writeln!(self.out, "{}", format_output(*value))?;
            }
            TraceEvent::Execute { snapshot } => {
                if self.trace {
                    writeln!(self.out)?;
                    writeln!(self.out, "Machine State")?;
                    writeln!(self.out, "{}", format_snapshot(snapshot))?;
                }
                if self.pause && !self.terminal {
                    write!(self.out, "Pause PC = {}: Type RETURN/ENTER to continue", snapshot.pc)?;
                    self.out.flush()?;
                    let mut line = String::new();
                    self.input.read_line(&mut line)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl<W: Write, R: BufRead> TraceSink for ConsoleReporter<W, R> {
    fn event(&mut self, event: &TraceEvent) {
        if let Err(e) = self.report(event) {
            tracing::warn!(error = %e, "failed to write trace output");
            self.error.get_or_insert(e);
        }
    }
}
