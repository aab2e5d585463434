//! SAP-1 Emulator - CLI Entry Point
//!
//! Usage:
//! - `sap1 <program>` - Run a program image or `.asm` source until it halts
//! - `sap1 --trace <program>` - Print machine state after every phase
//! - `sap1 --pause <program>` - Wait for ENTER after every instruction
//! - `sap1 --debug <program>` - Interactive debugger

use clap::{ArgAction, Parser};
use sap1::program::{read_source, LoadError};
use sap1::report::format_snapshot;
use sap1::{assemble, load_image, ConsoleReporter, Machine, MachineError, ProgramImage, Termination};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sap1")]
#[command(version)]
#[command(about = "Simulate execution of a SAP-1 program")]
struct Cli {
    /// The file containing the program image (or `.asm` source)
    filename: String,
    /// Display state after each instruction
    #[arg(short, long)]
    trace: bool,
    /// Pause for keyboard input after each instruction execution
    #[arg(short, long)]
    pause: bool,
    /// Give up after this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,
    /// Print the final machine state as JSON
    #[arg(long)]
    json: bool,
    /// Print a disassembly of the loaded program and exit
    #[arg(long)]
    disasm: bool,
    /// Open the interactive debugger
    #[cfg(feature = "tui")]
    #[arg(long)]
    debug: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Run-time switches for a single run.
#[derive(Debug, Clone, Copy)]
struct RunOptions {
    trace: bool,
    pause: bool,
    max_cycles: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!("START");

    let image = match load_program(&cli.filename) {
        Ok(image) => image,
        Err(e) => {
            match e {
                LoadError::Open { .. } => eprintln!("Could not open file {}.", cli.filename),
                LoadError::Parse { .. } => eprintln!("Error reading file {}.", cli.filename),
            }
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut machine = Machine::new();
    machine.load_image(&image);

    if cli.disasm {
        print!("{}", sap1::disassemble(machine.memory()));
        return;
    }

    #[cfg(feature = "tui")]
    if cli.debug {
        debug_program(image);
        return;
    }

    let options = RunOptions {
        trace: cli.trace,
        pause: cli.pause,
        max_cycles: cli.max_cycles,
    };

    if options.trace {
        println!("Load of {} complete.", cli.filename);
        println!("{}", format_snapshot(&machine.snapshot()));
        println!();
    }

    let ok = run_program(&mut machine, options);

    if cli.json {
        match serde_json::to_string_pretty(&machine.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode state: {}", e),
        }
    }

    if !ok {
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load a program image, assembling `.asm` sources first.
fn load_program(path: &str) -> Result<ProgramImage, LoadError> {
    if path.ends_with(".asm") {
        let source = read_source(path)?;
        assemble(&source).map_err(|e| LoadError::Parse {
            line: e.line(),
            message: e.to_string(),
        })
    } else {
        load_image(path)
    }
}

/// Run to halt or fault. Returns false if the run could not finish.
fn run_program(machine: &mut Machine, options: RunOptions) -> bool {
    let result = {
        let stdin = io::stdin();
        let mut reporter = ConsoleReporter::new(io::stdout().lock(), stdin.lock(), options.trace, options.pause);
        let result = match options.max_cycles {
            Some(limit) => machine.run_limited(limit, &mut reporter),
            None => machine.run_traced(&mut reporter),
        };
        if let Some(e) = reporter.take_error() {
            eprintln!("Failed to write output: {}", e);
        }
        result
    };

    match result {
        Ok(end) => {
            if options.trace && matches!(end, Termination::Halted { .. }) {
                println!("HLT encountered");
            }
            println!("{}", end);
            let _ = io::stdout().flush();
            true
        }
        Err(MachineError::CycleLimit { limit }) => {
            eprintln!("No halt after {} instructions. Use --max-cycles to increase.", limit);
            false
        }
        Err(e) => {
            eprintln!("{}", e);
            false
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(image: ProgramImage) {
    println!("Launching debugger...");

    if let Err(e) = sap1::run_debugger(image) {
        eprintln!("Debugger error: {}", e);
        std::process::exit(1);
    }
}
