//! Program image file format.
//!
//! A program image is a simple text format:
//! - One `<address> <value>` pair per line
//! - Numbers in decimal, `0x` hex, `0b` binary or `0o` octal
//! - `#` starts a comment that runs to the end of the line
//! - Blank lines are ignored
//!
//! ```text
//! # Add numbers
//! 0x00 0b00011110 # LDA 14
//! 0x01 0b00101111 # ADD 15
//! 0x02 0b01010000 # OUT
//! 0x03 0b11110000 # HLT
//! 0x0E 0b00001110 # 14
//! 0x0F 0b00011100 # 28
//! ```

use crate::cpu::registers::Nibble;
use crate::program::parse_number;
use std::path::Path;
use thiserror::Error;

/// A loaded program: the memory cells to set before the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    entries: Vec<(Nibble, u8)>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell. Later entries for the same address win when loaded.
    pub fn push(&mut self, addr: Nibble, value: u8) {
        self.entries.push((addr, value));
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[(Nibble, u8)] {
        &self.entries
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse image text.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let mut image = Self::new();

        for (line_num, line) in text.lines().enumerate() {
            let line_num = line_num + 1;
            let code = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };

            let tokens: Vec<&str> = code.split_whitespace().collect();
            let (addr_tok, value_tok) = match tokens.as_slice() {
                [] => continue,
                [addr, value] => (*addr, *value),
                _ => {
                    return Err(LoadError::Parse {
                        line: line_num,
                        message: format!("expected `<address> <value>`, found {} tokens", tokens.len()),
                    })
                }
            };

            let addr = parse_field(addr_tok, 15, "address", line_num)?;
            let value = parse_field(value_tok, 255, "value", line_num)?;
            image.push(Nibble::new(addr), value);
        }

        tracing::debug!(entries = image.len(), "parsed program image");
        Ok(image)
    }
}

fn parse_field(token: &str, max: u32, what: &str, line: usize) -> Result<u8, LoadError> {
    let value = parse_number(token).ok_or_else(|| LoadError::Parse {
        line,
        message: format!("invalid {} literal `{}`", what, token),
    })?;

    if value > max {
        return Err(LoadError::Parse {
            line,
            message: format!("{} {} out of range (0-{})", what, value, max),
        });
    }

    Ok(value as u8)
}

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, LoadError> {
    let text = read_source(path)?;
    ProgramImage::parse(&text)
}

/// Read a program source file to a string.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String, LoadError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| LoadError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Errors that can occur while loading a program.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("could not open {path}: {message}")]
    Open { path: String, message: String },

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}
