//! WebAssembly bindings for the SAP-1 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::cpu::trace::OutputLog;
use crate::program::assembler::assemble;
use crate::program::disasm::disassemble_byte;
use crate::{Machine, MachineError, ProgramImage};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
    image: ProgramImage,
    outputs: Vec<u8>,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a new machine instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
            image: ProgramImage::new(),
            outputs: Vec::new(),
        }
    }

    /// Load a program from `<address> <value>` image text.
    #[wasm_bindgen]
    pub fn load_image(&mut self, text: &str) -> Result<usize, JsError> {
        let image = ProgramImage::parse(text)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(self.install(image))
    }

    /// Load a program from assembly source code.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let image = assemble(source)
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(self.install(image))
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let pc = self.machine.registers().pc();
        let text = disassemble_byte(self.machine.memory().read(pc));

        self.machine
            .step_traced(&mut OutputLog(&mut self.outputs))
            .map_err(|e| JsError::new(&e.to_string()))?;

        Ok(text)
    }

    /// Run until halt, fault or `max_cycles`. Returns the termination
    /// message, or an empty string if the limit was reached.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<String, JsError> {
        match self.machine.run_limited(max_cycles as u64, &mut OutputLog(&mut self.outputs)) {
            Ok(end) => Ok(end.to_string()),
            Err(MachineError::CycleLimit { .. }) => Ok(String::new()),
            Err(e) => Err(JsError::new(&e.to_string())),
        }
    }

    /// Reset the machine with the loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine = Machine::new();
        self.machine.load_image(&self.image);
        self.outputs.clear();
    }

    /// Check if the machine is running.
    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    /// Check if the machine is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    /// Check if the machine hit an undefined opcode.
    #[wasm_bindgen]
    pub fn is_faulted(&self) -> bool {
        self.machine.is_faulted()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.machine.cycles()
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u8 {
        self.machine.registers().pc().value()
    }

    /// Get accumulator value.
    #[wasm_bindgen]
    pub fn accumulator(&self) -> u8 {
        self.machine.registers().a()
    }

    /// Get B register value.
    #[wasm_bindgen]
    pub fn b(&self) -> u8 {
        self.machine.registers().b()
    }

    /// Get instruction register value.
    #[wasm_bindgen]
    pub fn ir(&self) -> u8 {
        self.machine.registers().ir()
    }

    /// Get carry flag.
    #[wasm_bindgen]
    pub fn carry(&self) -> bool {
        self.machine.registers().carry()
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.machine.state())
    }

    /// Get all 16 memory cells.
    #[wasm_bindgen]
    pub fn memory_all(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(&self.machine.memory().cells()[..])
    }

    /// Values shown by OUT since the last reset.
    #[wasm_bindgen]
    pub fn outputs(&self) -> Vec<u8> {
        self.outputs.clone()
    }

    /// Get registers and memory as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine.snapshot())
            .map_err(|e| JsError::new(&e.to_string()))
    }
}

impl WasmMachine {
    fn install(&mut self, image: ProgramImage) -> usize {
        let len = image.len();
        self.image = image;
        self.reset();
        len
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the number of bytes emitted.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let image = assemble(source)
        .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(image.len())
}

/// Disassemble a single byte.
#[wasm_bindgen]
pub fn wasm_disassemble(value: u8) -> String {
    disassemble_byte(value)
}
