//! Simple assembler for SAP-1 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (or # Comment)
//! LOOP:           ; Define a label
//!     LDA X       ; Load from the address of label X
//!     ADD 15      ; Add memory cell 15
//!     JC END      ; Jump if carry
//!     JMP LOOP    ; Jump to label
//! END: HLT        ; Halt
//!
//!     ORG 14      ; Set origin address
//! X:  DAT 42      ; Define data value
//! ```

use crate::cpu::decode::{encode, Instruction};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::Nibble;
use crate::program::{parse_number, ProgramImage};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<ProgramImage, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// An instruction operand that names a label not yet seen.
struct Pending {
    /// Index into `output`.
    slot: usize,
    label: String,
    line: usize,
}

/// The assembler state.
struct Assembler {
    /// Address of the next emitted byte.
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Label references to patch in pass 2.
    pending: Vec<Pending>,
    /// Emitted `(address, byte)` pairs.
    output: Vec<(Nibble, u8)>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<ProgramImage, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        let mut image = ProgramImage::new();
        for &(addr, value) in &self.output {
            image.push(addr, value);
        }
        tracing::debug!(bytes = image.len(), labels = self.symbols.len(), "assembled program");
        Ok(image)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(|c: char| c == ';' || c == '#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label `{}`", &line[..colon_idx]),
                });
            }
            if self.symbols.contains_key(&label) {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }
            if self.current_addr >= MEMORY_SIZE {
                return Err(AssemblerError::AddressOverflow { line: line_num });
            }
            self.symbols.insert(label, self.current_addr as u8);

            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_statement(rest, line_num);
            }
            return Ok(());
        }

        self.process_statement(line, line_num)
    }

    fn process_statement(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (mnemonic, operand) = match parts.as_slice() {
            [m] => (m.to_uppercase(), None),
            [m, op] => (m.to_uppercase(), Some(*op)),
            _ => {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "expected `MNEMONIC [OPERAND]`".into(),
                })
            }
        };

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let op = require(operand, "ORG requires address", line_num)?;
                let addr = self.literal(op, line_num)?;
                if addr as usize >= MEMORY_SIZE {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr });
                }
                self.current_addr = addr as usize;
            }

            "DAT" | "DB" => {
                let op = require(operand, "DAT requires value", line_num)?;
                let value = self.literal(op, line_num)?;
                if value > u8::MAX as u32 {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value });
                }
                self.emit(value as u8, line_num)?;
            }

            // Instructions
            _ => {
                let slot = self.output.len();
                let value = match operand {
                    Some(op) => self.operand(op, slot, line_num)?,
                    None => Nibble::ZERO,
                };
                let instr = Instruction::from_mnemonic(&mnemonic, value).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
                })?;
                if operand.is_some() && instr.operand().is_none() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("{} takes no operand", mnemonic),
                    });
                }
                self.emit(encode(&instr), line_num)?;
            }
        }

        Ok(())
    }

    /// Parse a numeric directive argument.
    fn literal(&self, operand: &str, line_num: usize) -> Result<u32, AssemblerError> {
        parse_number(operand).ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid number `{}`", operand),
        })
    }

    /// Parse an instruction operand: a 4-bit number or a label.
    fn operand(&mut self, operand: &str, slot: usize, line_num: usize) -> Result<Nibble, AssemblerError> {
        if operand.starts_with(|c: char| c.is_ascii_digit()) {
            let value = self.literal(operand, line_num)?;
            if value > Nibble::MAX.value() as u32 {
                return Err(AssemblerError::ValueOutOfRange { line: line_num, value });
            }
            return Ok(Nibble::new(value as u8));
        }

        // Label reference - patched in pass 2
        self.pending.push(Pending {
            slot,
            label: operand.to_uppercase(),
            line: line_num,
        });
        Ok(Nibble::ZERO)
    }

    fn emit(&mut self, byte: u8, line_num: usize) -> Result<(), AssemblerError> {
        if self.current_addr >= MEMORY_SIZE {
            return Err(AssemblerError::AddressOverflow { line: line_num });
        }
        self.output.push((Nibble::wrapping_from_usize(self.current_addr), byte));
        self.current_addr += 1;
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for pending in &self.pending {
            let addr = self.symbols.get(&pending.label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: pending.line,
                label: pending.label.clone(),
            })?;

            // Labels always point inside memory, so only the operand nibble changes.
            let (_, byte) = &mut self.output[pending.slot];
            *byte = (*byte & 0xF0) | Nibble::new(*addr).value();
        }
        Ok(())
    }
}

fn require<'a>(operand: Option<&'a str>, message: &str, line_num: usize) -> Result<&'a str, AssemblerError> {
    operand.ok_or_else(|| AssemblerError::SyntaxError {
        line: line_num,
        message: message.into(),
    })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: u32 },

    #[error("program does not fit in 16 bytes (line {line})")]
    AddressOverflow { line: usize },
}

impl AssemblerError {
    /// Source line the error was found on.
    pub fn line(&self) -> usize {
        match *self {
            AssemblerError::SyntaxError { line, .. }
            | AssemblerError::UnknownMnemonic { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::DuplicateLabel { line, .. }
            | AssemblerError::ValueOutOfRange { line, .. }
            | AssemblerError::AddressOverflow { line } => line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Machine;
    use crate::cpu::trace::Recorder;

    fn bytes(image: &ProgramImage) -> Vec<u8> {
        image.entries().iter().map(|&(_, v)| v).collect()
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LDA 14
            ADD 15
            OUT
            HLT
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(bytes(&image), vec![0x1E, 0x2F, 0x50, 0xF0]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        START:
            LDA X
            JMP END
            NOP
        END:
            HLT
            ORG 15
        X:  DAT 7
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(bytes(&image), vec![0x1F, 0x63, 0x00, 0xF0, 7]);
        assert_eq!(image.entries()[4].0, Nibble::new(15));
    }

    #[test]
    fn test_assemble_data() {
        let source = "DAT 42\nDB 0xFF # hash comments too\nDAT 0";
        let image = assemble(source).unwrap();
        assert_eq!(bytes(&image), vec![42, 255, 0]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(assemble("MUL 3"), Err(AssemblerError::UnknownMnemonic { line: 1, .. })));
        assert!(matches!(assemble("JMP NOWHERE"), Err(AssemblerError::UndefinedLabel { line: 1, .. })));
        assert!(matches!(assemble("A:\nA:"), Err(AssemblerError::DuplicateLabel { line: 2, .. })));
        assert!(matches!(assemble("LDA 16"), Err(AssemblerError::ValueOutOfRange { value: 16, .. })));
        assert!(matches!(assemble("DAT 256"), Err(AssemblerError::ValueOutOfRange { value: 256, .. })));
        assert!(matches!(assemble("OUT 3"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble("ORG 15\nNOP\nNOP"), Err(AssemblerError::AddressOverflow { line: 3 })));
    }

    #[test]
    fn test_assembled_program_runs() {
        let source = r#"
            LDA A
            ADD B
            OUT
            HLT
            ORG 14
        A:  DAT 14
        B:  DAT 28
        "#;
        let mut m = Machine::new();
        m.load_image(&assemble(source).unwrap());
        let mut rec = Recorder::new();
        m.run_traced(&mut rec).unwrap();
        assert_eq!(rec.outputs(), vec![42]);
    }
}
