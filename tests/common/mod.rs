//! Shared test helpers: a single-cycle reference interpreter and memory
//! utilities used to cross-check the pipeline's architectural results.

use riscv_pipesim::core::context::RegisterFile;
use riscv_pipesim::error::SimError;
use riscv_pipesim::isa::{parser, Application};

/// Parses a program, failing the test on syntax errors.
pub fn assemble(source: &str) -> Application {
    parser::parse(source).expect("test program must parse")
}

/// Executes the program sequentially, one instruction per step, with no
/// pipeline, caches or timing. The final state is the functional truth the
/// pipelined run must reproduce.
pub fn run_reference(
    app: &Application,
    registers: &mut RegisterFile,
    memory: &mut [i8],
) -> Result<(), SimError> {
    let mut pc: i32 = 0;
    while (pc / 4) < app.instructions.len() as i32 {
        let instruction = &app.instructions[(pc / 4) as usize];
        let addrs = instruction.memory_read(registers, None);
        let bytes: Vec<i8> = addrs.iter().map(|&a| memory[a as usize]).collect();
        let execution = instruction.run(registers, &app.labels, pc, &bytes, None)?;
        if execution.ret {
            break;
        }
        if execution.register_change {
            registers.write(execution.register, execution.register_value);
        }
        if execution.memory_change {
            for (&addr, &value) in &execution.memory_changes {
                memory[addr as usize] = value;
            }
        }
        pc = if execution.pc_change {
            execution.next_pc
        } else {
            pc + 4
        };
    }
    Ok(())
}

/// Writes a little-endian word into byte memory.
pub fn poke_word(memory: &mut [i8], addr: usize, value: i32) {
    for (i, byte) in value.to_le_bytes().iter().enumerate() {
        memory[addr + i] = *byte as i8;
    }
}

/// Reads a little-endian word from byte memory.
pub fn peek_word(memory: &[i8], addr: usize) -> i32 {
    i32::from_le_bytes([
        memory[addr] as u8,
        memory[addr + 1] as u8,
        memory[addr + 2] as u8,
        memory[addr + 3] as u8,
    ])
}
