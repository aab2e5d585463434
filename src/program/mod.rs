//! Program loading, assembly and disassembly for the SAP-1.
//!
//! This module provides:
//! - The `<address> <value>` program image loader
//! - A simple two-pass assembler (mnemonics → program image)
//! - A disassembler (memory → readable text)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_byte};
pub use image::{load_image, read_source, LoadError, ProgramImage};

/// Parse an unsigned integer literal.
///
/// Accepts decimal, `0x` hex, `0o` octal and `0b` binary (either case),
/// with single `_` separators between digits. A decimal literal may not
/// start with `0` unless every digit is `0`.
pub fn parse_number(token: &str) -> Option<u32> {
    let (radix, digits) = match token.get(..2) {
        Some("0x") | Some("0X") => (16, &token[2..]),
        Some("0o") | Some("0O") => (8, &token[2..]),
        Some("0b") | Some("0B") => (2, &token[2..]),
        _ => (10, token),
    };

    // A separator may follow the prefix directly, as in `0x_ff`.
    let digits = if radix != 10 { digits.strip_prefix('_').unwrap_or(digits) } else { digits };

    if !digits.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }

    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if radix == 10 && cleaned.starts_with('0') && cleaned.chars().any(|c| c != '0') {
        return None;
    }

    u32::from_str_radix(&cleaned, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_radixes() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x2A"), Some(42));
        assert_eq!(parse_number("0X2a"), Some(42));
        assert_eq!(parse_number("0o52"), Some(42));
        assert_eq!(parse_number("0b00101010"), Some(42));
        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("000"), Some(0));
    }

    #[test]
    fn test_parse_number_separators() {
        assert_eq!(parse_number("0b0010_1010"), Some(42));
        assert_eq!(parse_number("0x_2a"), Some(42));
        assert_eq!(parse_number("1_000"), Some(1000));
        assert_eq!(parse_number("1__0"), None);
        assert_eq!(parse_number("_1"), None);
        assert_eq!(parse_number("1_"), None);
    }

    #[test]
    fn test_bundled_programs() {
        use crate::cpu::{Machine, Recorder, Termination, Nibble};

        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("programs");

        let mut m = Machine::new();
        m.load_image(&load_image(dir.join("add.sap")).unwrap());
        let mut rec = Recorder::new();
        assert_eq!(m.run_traced(&mut rec).unwrap(), Termination::Halted { pc: Nibble::new(4) });
        assert_eq!(rec.outputs(), vec![42]);

        let source = read_source(dir.join("countdown.asm")).unwrap();
        let mut m = Machine::new();
        m.load_image(&assemble(&source).unwrap());
        let mut rec = Recorder::new();
        m.run_limited(100, &mut rec).unwrap();
        assert_eq!(rec.outputs(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_parse_number_rejects() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("012"), None);
        assert_eq!(parse_number("0b102"), None);
        assert_eq!(parse_number("-1"), None);
        assert_eq!(parse_number("+1"), None);
        assert_eq!(parse_number("LABEL"), None);
    }
}
