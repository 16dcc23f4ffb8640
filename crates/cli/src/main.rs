//! `rv32pipe`: a command-line driver for the cycle-accurate RV32I pipeline
//! simulator in `rv32pipe-core`.
//!
//! Accepts a program in either of the two external-interface forms spec.md
//! §6 describes — a flat/ELF binary image, or a textual assembly listing —
//! and an optional JSON configuration overlay, runs it to one of the three
//! halt conditions, and prints the resulting report.

mod asm;
mod loader;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rv32pipe_core::config::Config;
use rv32pipe_core::isa::abi;
use rv32pipe_core::isa::program::Program;
use rv32pipe_core::sim::simulator::{HaltReason, Simulator};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "rv32pipe", about = "Cycle-accurate RV32I pipeline simulator")]
struct Args {
    /// Path to the program image: an ELF/binary file, or (with `--asm`) a
    /// textual assembly listing.
    program: PathBuf,

    /// Treat `program` as a textual assembly listing instead of an ELF/binary
    /// image.
    #[arg(long)]
    asm: bool,

    /// Path to a JSON file overriding the default `Config`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print each register's final value at the end of the run (a snapshot,
    /// not a per-cycle trace — use `RUST_LOG` for that).
    #[arg(long)]
    dump_registers: bool,
}

/// Top-level CLI failure modes, distinct from the architectural
/// [`rv32pipe_core::common::error::Trap`] taxonomy: these prevent a run
/// from ever starting.
#[derive(Debug, Error)]
enum CliError {
    /// Reading the program or config file from disk failed.
    #[error("reading {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The config overlay was not valid JSON for [`Config`].
    #[error("parsing config {path}: {source}")]
    Config {
        /// The config file that failed to parse.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The assembly listing did not parse. See [`asm::AsmError`].
    #[error("parsing assembly: {0}")]
    Asm(#[from] asm::AsmError),
    /// The ELF image did not parse. See [`loader::LoaderError`].
    #[error("loading ELF image: {0}")]
    Loader(#[from] loader::LoaderError),
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, CliError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Config {
        path: path.clone(),
        source,
    })
}

fn build_simulator(args: &Args, config: Config) -> Result<Simulator, CliError> {
    if args.asm {
        let text = fs::read_to_string(&args.program).map_err(|source| CliError::Io {
            path: args.program.clone(),
            source,
        })?;
        let instructions = asm::parse_program(&text)?;
        return Ok(Simulator::new(config, Program::Assembly(instructions)));
    }

    let bytes = fs::read(&args.program).map_err(|source| CliError::Io {
        path: args.program.clone(),
        source,
    })?;

    // An ELF image carries its own segment base addresses and entry point;
    // a raw binary is loaded flat at address 0 with execution starting
    // there, matching spec.md §6's binary-image form.
    if bytes.starts_with(&[0x7f, b'E', b'L', b'F']) {
        let mut sim = Simulator::new(config, Program::Binary);
        let image = loader::load_elf(sim.bus_mut(), &bytes)?;
        sim.pipeline_mut().rf_mut().write_pc(image.entry);
        Ok(sim)
    } else {
        Ok(Simulator::with_binary_image(config, &bytes))
    }
}

fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let mut simulator = build_simulator(&args, config)?;

    let report = simulator.run();

    simulator.stats().print();
    println!("halt reason:          {:?}", report.halt_reason);
    println!("final pc:             {:#010x}", report.pc);
    if !report.uart_output.is_empty() {
        println!("uart output:          {}", String::from_utf8_lossy(&report.uart_output));
    }
    if args.dump_registers {
        for (i, value) in report.registers.iter().enumerate() {
            let name = abi::name(u8::try_from(i).unwrap_or(u8::MAX));
            println!("x{i:<2} ({name:<4}) = {value:#010x}");
        }
    }

    if matches!(report.halt_reason, HaltReason::CycleBudget) {
        tracing::warn!("run stopped on cycle budget rather than program completion");
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rv32pipe: {e}");
            ExitCode::FAILURE
        }
    }
}
