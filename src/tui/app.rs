//! Debugger application state and logic.

use crate::cpu::trace::OutputLog;
use crate::program::disasm::disassemble_byte;
use crate::{Machine, Nibble, ProgramImage, Step};
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Original program for reset.
    pub image: ProgramImage,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<Nibble>,
    /// Values shown by OUT, oldest first.
    pub outputs: Vec<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(image: ProgramImage) -> Self {
        let mut machine = Machine::new();
        machine.load_image(&image);

        Self {
            machine,
            image,
            breakpoints: HashSet::new(),
            outputs: Vec::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.machine.is_running() {
            self.status = format!("Machine stopped: {:?}", self.machine.state());
            self.running = false;
            return;
        }

        let pc = self.machine.registers().pc();
        let disasm = disassemble_byte(self.machine.memory().read(pc));
        match self.machine.step_traced(&mut OutputLog(&mut self.outputs)) {
            Ok(Step::Continue) => {
                self.status = format!("PC={:02}: {}", pc, disasm);
            }
            Ok(Step::Halted { pc }) => {
                self.status = crate::report::halt_message(pc);
                self.running = false;
            }
            Ok(Step::Faulted { ir }) => {
                self.status = crate::report::fault_message(ir);
                self.running = false;
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or fault.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.machine.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} cycles", self.machine.cycles());
            return;
        }

        // Check for breakpoint
        let pc = self.machine.registers().pc();
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.registers().pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reset the machine to the loaded program.
    pub fn reset(&mut self) {
        self.machine = Machine::new();
        self.machine.load_image(&self.image);
        self.outputs.clear();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Disassembly of every cell: `(address, text, is_pc)`.
    pub fn get_disassembly(&self) -> Vec<(Nibble, String, bool)> {
        let pc = self.machine.registers().pc();
        self.machine
            .memory()
            .iter()
            .map(|(addr, value)| (addr, disassemble_byte(value), addr == pc))
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(image: ProgramImage) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(image);

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
