//! CPU execution engine for the SAP-1.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::Nibble;
use crate::cpu::trace::{NoopTrace, TraceEvent, TraceSink};
use crate::program::ProgramImage;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Machine is running normally.
    Running,
    /// Machine executed HLT.
    Halted,
    /// Machine hit an undefined opcode.
    Faulted,
}

/// Outcome of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Ready for the next fetch.
    Continue,
    /// HLT executed; `pc` is the program counter after the fetch.
    Halted { pc: Nibble },
    /// Undefined opcode; `ir` is the offending instruction byte.
    Faulted { ir: u8 },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Halted { pc: Nibble },
    Faulted { ir: u8 },
}

/// Read-only copy of every register and memory cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pc: Nibble,
    pub mar: Nibble,
    pub ir: u8,
    pub a: u8,
    pub b: u8,
    pub carry: bool,
    pub memory: [u8; MEMORY_SIZE],
}

/// The SAP-1 computer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    regs: Registers,
    mem: Memory,
    state: MachineState,
    /// Instruction count.
    cycles: u64,
}

impl Machine {
    /// Create a new machine with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: MachineState::Running,
            cycles: 0,
        }
    }

    /// Reset the machine to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = MachineState::Running;
        self.cycles = 0;
    }

    /// Install one byte of the program image.
    ///
    /// The address wraps modulo 16 and the value modulo 256.
    pub fn set_memory(&mut self, address: usize, value: u32) {
        self.mem.write(Nibble::wrapping_from_usize(address), (value % 256) as u8);
    }

    /// Install a loaded program image.
    pub fn load_image(&mut self, image: &ProgramImage) {
        for &(addr, value) in image.entries() {
            self.mem.write(addr, value);
        }
    }

    /// Copy out the current registers and memory.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.regs.pc(),
            mar: self.regs.mar(),
            ir: self.regs.ir(),
            a: self.regs.a(),
            b: self.regs.b(),
            carry: self.regs.carry(),
            memory: *self.mem.cells(),
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Number of instructions executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<Step, MachineError> {
        self.step_traced(&mut NoopTrace)
    }

    /// Execute a single instruction, reporting each phase to `sink`.
    pub fn step_traced<T: TraceSink + ?Sized>(&mut self, sink: &mut T) -> Result<Step, MachineError> {
        if self.state != MachineState::Running {
            return Err(MachineError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.pc();
        self.regs.set_mar(pc);
        let ir = self.mem.read(pc);
        self.regs.set_ir(ir);
        let next_pc = self.regs.advance_pc().wrapping_inc();
        sink.event(&TraceEvent::Fetch { pc, mar: pc, ir, next_pc });

        // Decode
        let instr = decode::decode(ir);
        sink.event(&TraceEvent::Decode { opcode: self.regs.opcode(), instruction: instr });
        tracing::trace!(pc = pc.value(), ir, mnemonic = instr.mnemonic(), "cycle");

        // Execute
        let step = self.execute(instr, sink);
        self.cycles += 1;
        sink.event(&TraceEvent::Execute { snapshot: self.snapshot() });

        match step {
            Step::Continue => {}
            Step::Halted { pc } => {
                self.state = MachineState::Halted;
                tracing::debug!(pc = pc.value(), cycles = self.cycles, "halted");
            }
            Step::Faulted { ir } => {
                self.state = MachineState::Faulted;
                tracing::debug!(ir, cycles = self.cycles, "undefined opcode");
            }
        }

        Ok(step)
    }

    /// Run until halt or fault.
    pub fn run(&mut self) -> Result<Termination, MachineError> {
        self.run_traced(&mut NoopTrace)
    }

    /// Run until halt or fault, reporting every cycle to `sink`.
    pub fn run_traced<T: TraceSink + ?Sized>(&mut self, sink: &mut T) -> Result<Termination, MachineError> {
        loop {
            if let Some(end) = Self::terminal(self.step_traced(sink)?) {
                return Ok(end);
            }
        }
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited<T: TraceSink + ?Sized>(
        &mut self,
        max_cycles: u64,
        sink: &mut T,
    ) -> Result<Termination, MachineError> {
        for _ in 0..max_cycles {
            if let Some(end) = Self::terminal(self.step_traced(sink)?) {
                return Ok(end);
            }
        }
        Err(MachineError::CycleLimit { limit: max_cycles })
    }

    fn terminal(step: Step) -> Option<Termination> {
        match step {
            Step::Continue => None,
            Step::Halted { pc } => Some(Termination::Halted { pc }),
            Step::Faulted { ir } => Some(Termination::Faulted { ir }),
        }
    }

    /// Execute a decoded instruction.
    fn execute<T: TraceSink + ?Sized>(&mut self, instr: Instruction, sink: &mut T) -> Step {
        match instr {
            Instruction::Nop => {}

            Instruction::Lda { addr } => {
                let value = self.load(addr);
                self.regs.set_a(value);
            }

            Instruction::Add { addr } => {
                let b = self.load(addr);
                self.regs.set_b(b);
                let (sum, carry) = self.regs.a().overflowing_add(b);
                self.regs.set_a(sum);
                self.regs.set_carry(carry);
            }

            Instruction::Sub { addr } => {
                let b = self.load(addr);
                self.regs.set_b(b);
                // Carry means A < B; it is not a borrow-out.
                let (diff, negative) = self.regs.a().overflowing_sub(b);
                self.regs.set_a(diff);
                self.regs.set_carry(negative);
            }

            Instruction::Sta { addr } => {
                self.regs.set_mar(addr);
                self.mem.write(addr, self.regs.a());
            }

            Instruction::Out => {
                sink.event(&TraceEvent::Output { value: self.regs.a() });
            }

            Instruction::Jmp { addr } => {
                self.regs.jump(addr);
            }

            Instruction::Ldi { value } => {
                self.regs.set_a(value.value());
            }

            Instruction::Jc { addr } => {
                if self.regs.carry() {
                    self.regs.jump(addr);
                }
            }

            Instruction::Hlt => {
                return Step::Halted { pc: self.regs.pc() };
            }

            Instruction::Undefined { ir } => {
                return Step::Faulted { ir };
            }
        }

        Step::Continue
    }

    /// Read memory through MAR.
    fn load(&mut self, addr: Nibble) -> u8 {
        self.regs.set_mar(addr);
        self.mem.read(addr)
    }

    /// Check if the machine is halted.
    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    /// Check if the machine hit an undefined opcode.
    pub fn is_faulted(&self) -> bool {
        self.state == MachineState::Faulted
    }

    /// Check if the machine is running.
    pub fn is_running(&self) -> bool {
        self.state == MachineState::Running
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur while driving the machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("machine not running: {0:?}")]
    NotRunning(MachineState),

    #[error("no halt within {limit} cycles")]
    CycleLimit { limit: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::trace::{OutputLog, Recorder};

    fn n(v: u8) -> Nibble {
        Nibble::new(v)
    }

    fn machine_with(program: &[Instruction], data: &[(usize, u32)]) -> Machine {
        let mut m = Machine::new();
        for (i, instr) in program.iter().enumerate() {
            m.set_memory(i, encode(instr) as u32);
        }
        for &(addr, value) in data {
            m.set_memory(addr, value);
        }
        m
    }

    fn sample_program() -> Machine {
        machine_with(
            &[
                Instruction::Lda { addr: n(14) },
                Instruction::Add { addr: n(15) },
                Instruction::Out,
                Instruction::Hlt,
            ],
            &[(14, 14), (15, 28)],
        )
    }

    #[test]
    fn test_new_is_zeroed() {
        let snap = Machine::new().snapshot();
        assert_eq!(snap.pc, Nibble::ZERO);
        assert_eq!(snap.mar, Nibble::ZERO);
        assert_eq!((snap.a, snap.b, snap.ir, snap.carry), (0, 0, 0, false));
        assert_eq!(snap.memory, [0; MEMORY_SIZE]);
    }

    #[test]
    fn test_set_memory_wraps() {
        let mut m = Machine::new();
        m.set_memory(3, 200);
        m.set_memory(17, 0x1FF);
        let snap = m.snapshot();
        assert_eq!(snap.memory[3], 200);
        assert_eq!(snap.memory[1], 0xFF);
    }

    #[test]
    fn test_sample_program_outputs_42() {
        let mut m = sample_program();
        let mut rec = Recorder::new();

        let end = m.run_traced(&mut rec).unwrap();

        assert_eq!(rec.outputs(), vec![42]);
        assert_eq!(end, Termination::Halted { pc: n(4) });
        assert_eq!(m.cycles(), 4);
        assert!(m.is_halted());
    }

    #[test]
    fn test_deserialized_registers_wrap() {
        let mut value = serde_json::to_value(sample_program()).unwrap();
        value["regs"]["pc"] = serde_json::json!(200);
        value["regs"]["mar"] = serde_json::json!(255);

        let mut m: Machine = serde_json::from_value(value).unwrap();
        assert_eq!(m.registers().pc(), n(8));
        assert_eq!(m.registers().mar(), n(15));

        // Cell 8 is zero, so this is a NOP.
        assert_eq!(m.step().unwrap(), Step::Continue);
        assert_eq!(m.registers().pc(), n(9));
        assert_eq!(m.registers().mar(), n(8));
    }

    #[test]
    fn test_literal_0xe0_faults() {
        let mut m = Machine::new();
        for (addr, value) in [(0, 0b0001_1110), (1, 0b0010_1111), (2, 0b1110_0000), (3, 0b1111_0000), (14, 14), (15, 28)] {
            m.set_memory(addr, value);
        }
        let end = m.run().unwrap();
        assert_eq!(end, Termination::Faulted { ir: 0b1110_0000 });
        assert_eq!(m.registers().a(), 42);
        assert!(m.is_faulted());
    }

    #[test]
    fn test_add_carry() {
        let mut m = machine_with(&[Instruction::Add { addr: n(15) }], &[(15, 10)]);
        m.regs.set_a(250);
        assert_eq!(m.step().unwrap(), Step::Continue);
        assert_eq!(m.registers().a(), 4);
        assert_eq!(m.registers().b(), 10);
        assert!(m.registers().carry());
        assert_eq!(m.registers().mar(), n(15));
    }

    #[test]
    fn test_add_clears_carry() {
        let mut m = machine_with(&[Instruction::Add { addr: n(15) }], &[(15, 10)]);
        m.regs.set_a(5);
        m.regs.set_carry(true);
        m.step().unwrap();
        assert_eq!(m.registers().a(), 15);
        assert!(!m.registers().carry());
    }

    #[test]
    fn test_add_exactly_256_carries() {
        let mut m = machine_with(&[Instruction::Add { addr: n(15) }], &[(15, 1)]);
        m.regs.set_a(255);
        m.step().unwrap();
        assert_eq!(m.registers().a(), 0);
        assert!(m.registers().carry());
    }

    #[test]
    fn test_sub_negative_sets_carry() {
        let mut m = machine_with(&[Instruction::Sub { addr: n(15) }], &[(15, 10)]);
        m.regs.set_a(5);
        m.step().unwrap();
        assert_eq!(m.registers().a(), 251);
        assert_eq!(m.registers().b(), 10);
        assert!(m.registers().carry());
    }

    #[test]
    fn test_sub_equal_clears_carry() {
        let mut m = machine_with(&[Instruction::Sub { addr: n(15) }], &[(15, 10)]);
        m.regs.set_a(10);
        m.regs.set_carry(true);
        m.step().unwrap();
        assert_eq!(m.registers().a(), 0);
        assert!(!m.registers().carry());
    }

    #[test]
    fn test_sta_then_lda() {
        let mut m = machine_with(
            &[
                Instruction::Ldi { value: n(9) },
                Instruction::Sta { addr: n(12) },
                Instruction::Ldi { value: n(0) },
                Instruction::Lda { addr: n(12) },
                Instruction::Hlt,
            ],
            &[],
        );
        m.run().unwrap();
        assert_eq!(m.memory().read(n(12)), 9);
        assert_eq!(m.registers().a(), 9);
    }

    #[test]
    fn test_ldi_loads_low_nibble() {
        let mut m = Machine::new();
        m.set_memory(0, 0x7B);
        m.regs.set_a(0xFF);
        m.step().unwrap();
        assert_eq!(m.registers().a(), 0x0B);
    }

    #[test]
    fn test_jmp() {
        let mut m = machine_with(&[Instruction::Jmp { addr: n(9) }], &[]);
        m.step().unwrap();
        assert_eq!(m.registers().pc(), n(9));
    }

    #[test]
    fn test_jc_taken_only_with_carry() {
        let mut m = machine_with(&[Instruction::Jc { addr: n(9) }], &[]);
        m.step().unwrap();
        assert_eq!(m.registers().pc(), n(1));

        let mut m = machine_with(&[Instruction::Jc { addr: n(9) }], &[]);
        m.regs.set_carry(true);
        m.step().unwrap();
        assert_eq!(m.registers().pc(), n(9));
    }

    #[test]
    fn test_nop_leaves_state() {
        let mut m = Machine::new();
        m.set_memory(5, 77);
        let before = m.snapshot();
        m.step().unwrap();
        let after = m.snapshot();
        assert_eq!(after.memory, before.memory);
        assert_eq!((after.a, after.b, after.carry), (before.a, before.b, before.carry));
        assert_eq!(after.pc, n(1));
    }

    #[test]
    fn test_out_does_not_change_state() {
        let mut m = machine_with(&[Instruction::Out], &[]);
        m.regs.set_a(7);
        let mut rec = Recorder::new();
        m.step_traced(&mut rec).unwrap();
        assert_eq!(rec.outputs(), vec![7]);
        assert_eq!(m.registers().a(), 7);
    }

    #[test]
    fn test_pc_wraps_after_15() {
        let mut m = Machine::new();
        m.regs.jump(n(15));
        m.step().unwrap();
        assert_eq!(m.registers().pc(), Nibble::ZERO);
        assert_eq!(m.registers().mar(), n(15));
    }

    #[test]
    fn test_hlt_at_15_reports_pc_0() {
        let mut m = Machine::new();
        m.set_memory(15, 0xF0);
        m.regs.jump(n(15));
        assert_eq!(m.step().unwrap(), Step::Halted { pc: Nibble::ZERO });
    }

    #[test]
    fn test_each_undefined_opcode_faults() {
        for op in 9u8..=14 {
            let ir = (op << 4) | 0x3;
            let mut m = Machine::new();
            m.set_memory(0, ir as u32);
            assert_eq!(m.step().unwrap(), Step::Faulted { ir });
            assert_eq!(m.state(), MachineState::Faulted);
        }
    }

    #[test]
    fn test_no_resumption_after_halt() {
        let mut m = machine_with(&[Instruction::Hlt], &[]);
        m.run().unwrap();
        assert_eq!(m.step(), Err(MachineError::NotRunning(MachineState::Halted)));
    }

    #[test]
    fn test_run_limited_stops_infinite_loop() {
        let mut m = machine_with(&[Instruction::Jmp { addr: n(0) }], &[]);
        let result = m.run_limited(100, &mut NoopTrace);
        assert_eq!(result, Err(MachineError::CycleLimit { limit: 100 }));
        assert_eq!(m.cycles(), 100);
        assert!(m.is_running());
    }

    #[test]
    fn test_output_log_over_long_loop() {
        let mut m = machine_with(
            &[Instruction::Ldi { value: n(1) }, Instruction::Out, Instruction::Jmp { addr: n(1) }],
            &[],
        );
        let mut outputs = Vec::new();
        let result = m.run_limited(30_001, &mut OutputLog(&mut outputs));
        assert_eq!(result, Err(MachineError::CycleLimit { limit: 30_001 }));
        assert_eq!(outputs.len(), 15_000);
        assert!(outputs.iter().all(|&v| v == 1));
    }

    #[test]
    fn test_trace_phase_order() {
        let mut m = machine_with(&[Instruction::Out, Instruction::Hlt], &[]);
        let mut rec = Recorder::new();
        m.step_traced(&mut rec).unwrap();

        assert!(matches!(rec.events[0], TraceEvent::Fetch { pc, next_pc, ir: 0x50, .. } if pc == n(0) && next_pc == n(1)));
        assert!(matches!(rec.events[1], TraceEvent::Decode { instruction: Instruction::Out, .. }));
        assert!(matches!(rec.events[2], TraceEvent::Output { value: 0 }));
        assert!(matches!(rec.events[3], TraceEvent::Execute { .. }));
        assert_eq!(rec.events.len(), 4);
    }

    #[test]
    fn test_countdown_loop_with_jc() {
        // Count A down from 3 by subtracting 1; JC fires on the first borrow.
        let mut m = machine_with(
            &[
                Instruction::Ldi { value: n(3) },
                Instruction::Out,
                Instruction::Sub { addr: n(15) },
                Instruction::Jc { addr: n(5) },
                Instruction::Jmp { addr: n(1) },
                Instruction::Hlt,
            ],
            &[(15, 1)],
        );
        let mut rec = Recorder::new();
        let end = m.run_limited(1000, &mut rec).unwrap();
        assert_eq!(rec.outputs(), vec![3, 2, 1, 0]);
        assert_eq!(end, Termination::Halted { pc: n(6) });
    }

    #[test]
    fn test_reset() {
        let mut m = sample_program();
        m.run().unwrap();
        m.reset();
        assert_eq!(m, Machine::new());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_images_never_panic(image in prop::collection::vec(any::<u8>(), 16)) {
                let mut m = Machine::new();
                for (addr, &value) in image.iter().enumerate() {
                    m.set_memory(addr, value as u32);
                }
                let _ = m.run_limited(256, &mut NoopTrace);
                prop_assert!(m.cycles() <= 256);
            }

            #[test]
            fn set_memory_roundtrips(addr in any::<usize>(), value in any::<u32>()) {
                let mut m = Machine::new();
                m.set_memory(addr, value);
                prop_assert_eq!(m.snapshot().memory[addr % 16], (value % 256) as u8);
            }

            #[test]
            fn add_carry_iff_sum_overflows(a in any::<u8>(), b in any::<u8>()) {
                let mut m = machine_with(&[Instruction::Add { addr: Nibble::new(15) }], &[(15, b as u32)]);
                m.regs.set_a(a);
                m.step().unwrap();
                let sum = a as u16 + b as u16;
                prop_assert_eq!(m.registers().a() as u16, sum % 256);
                prop_assert_eq!(m.registers().carry(), sum >= 256);
                prop_assert_eq!(m.registers().b(), b);
            }

            #[test]
            fn sub_carry_iff_a_below_b(a in any::<u8>(), b in any::<u8>()) {
                let mut m = machine_with(&[Instruction::Sub { addr: Nibble::new(15) }], &[(15, b as u32)]);
                m.regs.set_a(a);
                m.step().unwrap();
                let diff = a as i16 - b as i16;
                prop_assert_eq!(m.registers().a() as i16, diff.rem_euclid(256));
                prop_assert_eq!(m.registers().carry(), a < b);
            }

            #[test]
            fn jc_without_carry_never_branches(target in 0u8..16, pc in 0u8..16) {
                let mut m = Machine::new();
                m.set_memory(pc as usize, (0x80 | target) as u32);
                m.regs.jump(Nibble::new(pc));
                m.step().unwrap();
                prop_assert_eq!(m.registers().pc(), Nibble::new(pc).wrapping_inc());
            }

            #[test]
            fn identical_images_trace_identically(image in prop::collection::vec(any::<u8>(), 16)) {
                let mut first = Machine::new();
                let mut second = Machine::new();
                for (addr, &value) in image.iter().enumerate() {
                    first.set_memory(addr, value as u32);
                    second.set_memory(addr, value as u32);
                }
                prop_assert_eq!(first.snapshot(), second.snapshot());

                let mut rec_a = Recorder::new();
                let mut rec_b = Recorder::new();
                let end_a = first.run_limited(64, &mut rec_a);
                let end_b = second.run_limited(64, &mut rec_b);
                prop_assert_eq!(end_a, end_b);
                prop_assert_eq!(rec_a, rec_b);
            }
        }
    }
}
