//! Write-back stage.
//!
//! Commits one execution per tick from the write bus: register results apply
//! immediately, memory results pay the backing-memory latency first. Either
//! way the instruction's pending-register marks are released, which is what
//! unblocks dependents sitting in the control unit.

use crate::core::bus::BufferedBus;
use crate::core::context::Context;
use crate::isa::ExecutionContext;

enum WriteState {
    Ready,
    /// A store heading to backing memory, waiting out the access latency.
    MemoryCommit {
        remaining: u64,
        pending: Box<ExecutionContext>,
    },
}

pub struct WriteBackUnit {
    state: WriteState,
    cycles_memory_access: u64,
}

impl WriteBackUnit {
    pub fn new(cycles_memory_access: u64) -> WriteBackUnit {
        WriteBackUnit {
            state: WriteState::Ready,
            cycles_memory_access,
        }
    }

    pub fn tick(&mut self, ctx: &mut Context, in_bus: &mut BufferedBus<ExecutionContext>) {
        if let WriteState::MemoryCommit { remaining, pending } = &mut self.state {
            *remaining -= 1;
            if ctx.trace_enabled() {
                eprintln!("[WU] pending memory write ({remaining})");
            }
            if *remaining == 0 {
                ctx.write_memory(&pending.execution);
                ctx.delete_pending_registers(&pending.read_registers, &pending.write_registers);
                if ctx.trace_enabled() {
                    eprintln!("[WU] {} committed to memory", pending.mnemonic);
                }
                self.state = WriteState::Ready;
            }
            return;
        }

        let Some(execution) = in_bus.get() else {
            return;
        };

        if execution.execution.register_change {
            ctx.write_register(&execution.execution);
            ctx.delete_pending_registers(&execution.read_registers, &execution.write_registers);
            if ctx.trace_enabled() {
                eprintln!(
                    "[WU] {} (pc {}) wrote {}={}",
                    execution.mnemonic,
                    execution.pc / 4,
                    execution.execution.register,
                    execution.execution.register_value
                );
            }
        } else if execution.execution.memory_change {
            if ctx.trace_enabled() {
                eprintln!("[WU] {} waiting on memory", execution.mnemonic);
            }
            self.state = WriteState::MemoryCommit {
                remaining: self.cycles_memory_access,
                pending: Box::new(execution),
            };
        } else {
            ctx.delete_pending_registers(&execution.read_registers, &execution.write_registers);
            if ctx.trace_enabled() {
                eprintln!("[WU] {} released", execution.mnemonic);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, WriteState::Ready)
    }
}
