//! Defines the [`TraceSink`] trait, used to observe the phases of the
//! fetch-decode-execute cycle and the values written to the output register.

use crate::cpu::decode::Instruction;
use crate::cpu::execute::Snapshot;
use crate::cpu::registers::Nibble;
use serde::{Serialize, Deserialize};

/// One observable event of a machine cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// Instruction fetched. `pc` is the fetch address, `next_pc` the
    /// incremented program counter.
    Fetch { pc: Nibble, mar: Nibble, ir: u8, next_pc: Nibble },
    /// Instruction decoded.
    Decode { opcode: Nibble, instruction: Instruction },
    /// OUT executed with this accumulator value.
    Output { value: u8 },
    /// Machine state after the execute phase.
    Execute { snapshot: Snapshot },
}

/// A caller-supplied observer of machine events.
pub trait TraceSink {
    fn event(&mut self, event: &TraceEvent);
}

/// An implementation of [`TraceSink`] that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrace;

impl TraceSink for NoopTrace {
    fn event(&mut self, _event: &TraceEvent) {}
}

impl<F: FnMut(&TraceEvent)> TraceSink for F {
    fn event(&mut self, event: &TraceEvent) {
        self(event)
    }
}

/// Collects every event in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recorder {
    pub events: Vec<TraceEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values emitted by OUT, in order.
    pub fn outputs(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Output { value } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TraceSink for Recorder {
    fn event(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}

/// Keeps only the values emitted by OUT, appending them to a caller's list.
#[derive(Debug)]
pub struct OutputLog<'a>(pub &'a mut Vec<u8>);

impl TraceSink for OutputLog<'_> {
    fn event(&mut self, event: &TraceEvent) {
        if let TraceEvent::Output { value } = event {
            self.0.push(*value);
        }
    }
}
