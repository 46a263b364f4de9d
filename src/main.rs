//! Pipeline simulator CLI.
//!
//! Parses an assembly program, runs it on the simulated pipeline and reports
//! the cycle count and final register state.

use clap::Parser;
use std::{fs, process};

use riscv_pipesim::config::SimConfig;
use riscv_pipesim::core::Cpu;
use riscv_pipesim::isa::parser;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-accurate RISC-V pipeline simulator")]
struct Args {
    /// Assembly program to simulate.
    program: String,

    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Memory size in bytes, overriding the configuration.
    #[arg(long)]
    memory: Option<usize>,

    /// Trace every unit's activity per cycle to stderr.
    #[arg(long)]
    trace: bool,

    /// Dump pipeline statistics as JSON after the run.
    #[arg(long)]
    stats: bool,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("error: cannot read config {path}: {e}");
                process::exit(1);
            });
            toml::from_str::<SimConfig>(&content).unwrap_or_else(|e| {
                eprintln!("error: cannot parse config {path}: {e}");
                process::exit(1);
            })
        }
        None => SimConfig::default(),
    };
    if args.trace {
        config.general.trace = true;
    }
    if let Some(memory) = args.memory {
        config.memory.size_bytes = memory;
    }

    let source = fs::read_to_string(&args.program).unwrap_or_else(|e| {
        eprintln!("error: cannot read {}: {e}", args.program);
        process::exit(1);
    });
    let app = parser::parse(&source).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });

    let mut cpu = Cpu::with_config(&config);
    match cpu.run(&app) {
        Ok(cycles) => {
            println!("cycles: {cycles}");
            println!("registers: {}", cpu.context().registers.dump());
            if args.stats {
                let stats = cpu.stats();
                stats.print();
                match serde_json::to_string_pretty(&stats) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("error: cannot serialize stats: {e}"),
                }
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
