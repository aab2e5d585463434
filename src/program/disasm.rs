//! Disassembler for SAP-1 programs.
//!
//! Converts memory bytes back to readable assembly.

use crate::cpu::decode::{decode, Instruction};
use crate::cpu::memory::Memory;

/// Disassemble a single byte to text.
pub fn disassemble_byte(byte: u8) -> String {
    format_instruction(&decode(byte))
}

/// Disassemble all of memory, one line per cell.
pub fn disassemble(memory: &Memory) -> String {
    let mut output = String::new();
    output.push_str("; SAP-1 Disassembly\n");
    output.push_str("; -----------------\n\n");

    for (addr, value) in memory.iter() {
        let line = disassemble_byte(value);
        output.push_str(&format!("{:02}: {:<8} ; {:08b} {:3}\n", addr.value(), line, value, value));
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Undefined { ir } => format!("??? 0x{:02X}", ir),
        _ => match instr.operand() {
            Some(operand) => format!("{} {}", instr.mnemonic(), operand),
            None => instr.mnemonic().to_string(),
        },
    }
}
