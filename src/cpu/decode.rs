//! Instruction decoder for the SAP-1.
//!
//! Every instruction is a single byte. The high nibble selects the
//! operation and the low nibble is a memory address or an immediate value.

use crate::cpu::registers::Nibble;
use serde::{Serialize, Deserialize};

/// Decoded SAP-1 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation
    Nop,

    /// Load accumulator: A := [addr]
    Lda { addr: Nibble },

    /// Add: B := [addr], A := A + B
    Add { addr: Nibble },

    /// Subtract: B := [addr], A := A - B
    Sub { addr: Nibble },

    /// Store accumulator: [addr] := A
    Sta { addr: Nibble },

    /// Display A on the output register
    Out,

    /// Unconditional jump: PC := addr
    Jmp { addr: Nibble },

    /// Load immediate: A := value
    Ldi { value: Nibble },

    /// Jump if carry: if Carry then PC := addr
    Jc { addr: Nibble },

    /// Halt execution
    Hlt,

    /// Opcode nibbles 9-14 have no instruction. Keeps the whole IR byte.
    Undefined { ir: u8 },
}

/// Opcode nibble values.
pub mod opcode {
    pub const NOP: u8 = 0b0000;
    pub const LDA: u8 = 0b0001;
    pub const ADD: u8 = 0b0010;
    pub const SUB: u8 = 0b0011;
    pub const STA: u8 = 0b0100;
    pub const OUT: u8 = 0b0101;
    pub const JMP: u8 = 0b0110;
    pub const LDI: u8 = 0b0111;
    pub const JC: u8 = 0b1000;
    pub const HLT: u8 = 0b1111;
}

/// Decode an instruction byte.
///
/// All 256 byte values decode; opcode nibbles 9-14 become
/// [`Instruction::Undefined`].
pub fn decode(ir: u8) -> Instruction {
    let operand = Nibble::low(ir);

    match ir >> 4 {
        0x0 => Instruction::Nop,
        0x1 => Instruction::Lda { addr: operand },
        0x2 => Instruction::Add { addr: operand },
        0x3 => Instruction::Sub { addr: operand },
        0x4 => Instruction::Sta { addr: operand },
        0x5 => Instruction::Out,
        0x6 => Instruction::Jmp { addr: operand },
        0x7 => Instruction::Ldi { value: operand },
        0x8 => Instruction::Jc { addr: operand },
        0x9 | 0xA | 0xB | 0xC | 0xD | 0xE => Instruction::Undefined { ir },
        0xF => Instruction::Hlt,
        // `ir >> 4` is at most 0xF.
        _ => Instruction::Undefined { ir },
    }
}

/// Encode an instruction back to a byte.
///
/// Instructions without an operand encode a zero low nibble.
pub fn encode(instr: &Instruction) -> u8 {
    let (op, operand) = match *instr {
        Instruction::Nop => (opcode::NOP, Nibble::ZERO),
        Instruction::Lda { addr } => (opcode::LDA, addr),
        Instruction::Add { addr } => (opcode::ADD, addr),
        Instruction::Sub { addr } => (opcode::SUB, addr),
        Instruction::Sta { addr } => (opcode::STA, addr),
        Instruction::Out => (opcode::OUT, Nibble::ZERO),
        Instruction::Jmp { addr } => (opcode::JMP, addr),
        Instruction::Ldi { value } => (opcode::LDI, value),
        Instruction::Jc { addr } => (opcode::JC, addr),
        Instruction::Hlt => (opcode::HLT, Nibble::ZERO),
        Instruction::Undefined { ir } => return ir,
    };

    (op << 4) | operand.value()
}

impl Instruction {
    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "NOP",
            Instruction::Lda { .. } => "LDA",
            Instruction::Add { .. } => "ADD",
            Instruction::Sub { .. } => "SUB",
            Instruction::Sta { .. } => "STA",
            Instruction::Out => "OUT",
            Instruction::Jmp { .. } => "JMP",
            Instruction::Ldi { .. } => "LDI",
            Instruction::Jc { .. } => "JC",
            Instruction::Hlt => "HLT",
            Instruction::Undefined { .. } => "???",
        }
    }

    /// The operand this instruction uses, if any.
    pub fn operand(&self) -> Option<Nibble> {
        match *self {
            Instruction::Lda { addr }
            | Instruction::Add { addr }
            | Instruction::Sub { addr }
            | Instruction::Sta { addr }
            | Instruction::Jmp { addr }
            | Instruction::Jc { addr } => Some(addr),
            Instruction::Ldi { value } => Some(value),
            Instruction::Nop
            | Instruction::Out
            | Instruction::Hlt
            | Instruction::Undefined { .. } => None,
        }
    }

    /// Build an instruction from a mnemonic and operand.
    /// Returns `None` for an unknown mnemonic.
    pub fn from_mnemonic(mnemonic: &str, operand: Nibble) -> Option<Self> {
        let instr = match mnemonic {
            "NOP" => Instruction::Nop,
            "LDA" => Instruction::Lda { addr: operand },
            "ADD" => Instruction::Add { addr: operand },
            "SUB" => Instruction::Sub { addr: operand },
            "STA" => Instruction::Sta { addr: operand },
            "OUT" => Instruction::Out,
            "JMP" => Instruction::Jmp { addr: operand },
            "LDI" => Instruction::Ldi { value: operand },
            "JC" => Instruction::Jc { addr: operand },
            "HLT" => Instruction::Hlt,
            _ => return None,
        };
        Some(instr)
    }
}
