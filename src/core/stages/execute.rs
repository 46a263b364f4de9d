//! Execute stage.
//!
//! Each execute unit is a resumable state machine: it pulls one in-flight
//! instruction, waits for write-bus room and (if it is a forwarding consumer)
//! for the bypassed value, installs the branch expectation, models the data
//! cache or memory latency of loads, runs the instruction, and routes the
//! result: straight into the data cache for resident stores, onto the write
//! bus for everything else. Branch resolutions surface as flush signals for
//! the top-level loop.

use crate::core::branch::BranchUnit;
use crate::core::bus::BufferedBus;
use crate::core::context::Context;
use crate::core::mmu::MemoryManagementUnit;
use crate::core::stages::control::IssueBus;
use crate::core::stages::decode::DecodeUnit;
use crate::core::stages::fetch::FetchUnit;
use crate::error::SimError;
use crate::isa::{Application, ExecutionContext, Forward, InFlight};

/// What one execute tick reported upward.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecuteSignal {
    pub flush: bool,
    pub from: i32,
    pub next_pc: i32,
    pub ret: bool,
}

enum ExecuteState {
    Idle,
    /// Waiting for write-bus room or a forwarded operand.
    Prepare,
    /// Load hit: pay the cache latency.
    WaitCache { remaining: u64 },
    /// Load miss: pay the memory latency, then refill the line.
    WaitMemory { remaining: u64, addrs: Vec<i32> },
}

pub struct ExecuteUnit {
    state: ExecuteState,
    runner: Option<InFlight>,
    forwarded: Option<Forward>,
    memory: Vec<i8>,
    cycles_memory_access: u64,
    cycle_l1d_access: u64,
}

impl ExecuteUnit {
    pub fn new(cycles_memory_access: u64, cycle_l1d_access: u64) -> ExecuteUnit {
        ExecuteUnit {
            state: ExecuteState::Idle,
            runner: None,
            forwarded: None,
            memory: Vec::new(),
            cycles_memory_access,
            cycle_l1d_access,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        app: &Application,
        in_bus: &mut IssueBus,
        out_bus: &mut BufferedBus<ExecutionContext>,
        mmu: &mut MemoryManagementUnit,
        branch_unit: &mut BranchUnit,
        fetch: &mut FetchUnit,
        decode: &mut DecodeUnit,
    ) -> Result<ExecuteSignal, SimError> {
        match &mut self.state {
            ExecuteState::Idle => {
                let Some(cell) = in_bus.get() else {
                    return Ok(ExecuteSignal::default());
                };
                self.runner = Some(cell.borrow().clone());
                self.state = ExecuteState::Prepare;
                self.prepare(cycle, ctx, app, out_bus, mmu, branch_unit, fetch, decode)
            }
            ExecuteState::Prepare => {
                self.prepare(cycle, ctx, app, out_bus, mmu, branch_unit, fetch, decode)
            }
            ExecuteState::WaitCache { remaining } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(ExecuteSignal::default());
                }
                self.run(cycle, ctx, app, out_bus, mmu, branch_unit, fetch, decode)
            }
            ExecuteState::WaitMemory { remaining, addrs } => {
                if *remaining > 0 {
                    if ctx.trace_enabled() {
                        eprintln!("[EU] pending memory access {remaining}");
                    }
                    *remaining -= 1;
                    return Ok(ExecuteSignal::default());
                }
                let addrs = std::mem::take(addrs);
                let line = mmu.fetch_cache_line(&ctx.memory, addrs[0]);
                mmu.push_line_to_l1d(&mut ctx.memory, addrs[0], line);
                self.memory = mmu
                    .get_from_l1d(&addrs)
                    .unwrap_or_else(|| panic!("cache line missing right after refill"));
                self.run(cycle, ctx, app, out_bus, mmu, branch_unit, fetch, decode)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        app: &Application,
        out_bus: &mut BufferedBus<ExecutionContext>,
        mmu: &mut MemoryManagementUnit,
        branch_unit: &mut BranchUnit,
        fetch: &mut FetchUnit,
        decode: &mut DecodeUnit,
    ) -> Result<ExecuteSignal, SimError> {
        if !out_bus.can_add() {
            if ctx.trace_enabled() {
                eprintln!("[EU] can't add");
            }
            return Ok(ExecuteSignal::default());
        }

        let runner = self.runner.as_mut().expect("prepare without an instruction");
        if let Some((slot, register)) = &runner.receiver {
            let Some(value) = slot.take() else {
                // Producer has not published yet, retry next tick.
                return Ok(ExecuteSignal::default());
            };
            if ctx.trace_enabled() {
                eprintln!(
                    "[EU] {} (pc {}) received forwarded {register}={value}",
                    runner.instruction.mnemonic(),
                    runner.pc / 4
                );
            }
            self.forwarded = Some(Forward {
                value,
                register: *register,
            });
            runner.receiver = None;
        }

        branch_unit.assert_expectation(runner, fetch);

        if ctx.trace_enabled() {
            eprintln!(
                "[EU] executing {} (pc {})",
                runner.instruction.mnemonic(),
                runner.pc / 4
            );
        }

        let addrs = runner.instruction.memory_read(&ctx.registers, self.forwarded);
        if !addrs.is_empty() {
            if let Some(bytes) = mmu.get_from_l1d(&addrs) {
                self.memory = bytes;
                // The state resumes next cycle, which already accounts for
                // one cycle of cache access.
                self.state = ExecuteState::WaitCache {
                    remaining: self.cycle_l1d_access - 1,
                };
            } else {
                self.state = ExecuteState::WaitMemory {
                    remaining: self.cycles_memory_access - 1,
                    addrs,
                };
            }
            return Ok(ExecuteSignal::default());
        }

        self.run(cycle, ctx, app, out_bus, mmu, branch_unit, fetch, decode)
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        app: &Application,
        out_bus: &mut BufferedBus<ExecutionContext>,
        mmu: &mut MemoryManagementUnit,
        branch_unit: &mut BranchUnit,
        fetch: &mut FetchUnit,
        decode: &mut DecodeUnit,
    ) -> Result<ExecuteSignal, SimError> {
        self.state = ExecuteState::Idle;
        let runner = self.runner.take().expect("run without an instruction");
        let bypass = self.forwarded.take();
        let memory = std::mem::take(&mut self.memory);

        let execution =
            runner
                .instruction
                .run(&mut ctx.registers, &app.labels, runner.pc, &memory, bypass)?;
        if ctx.trace_enabled() {
            eprintln!(
                "[EU] {} (pc {}) result: {execution:?}",
                runner.instruction.mnemonic(),
                runner.pc / 4
            );
        }

        if execution.ret {
            return Ok(ExecuteSignal {
                ret: true,
                ..ExecuteSignal::default()
            });
        }

        // Stores whose target bytes are already resident commit straight into
        // the data cache; nothing travels to write-back.
        if execution.memory_change && mmu.execution_memory_changes_in_l1d(&execution) {
            mmu.write_execution_memory_changes_to_l1d(&execution);
            ctx.delete_pending_registers(
                &runner.instruction.read_registers(),
                &runner.instruction.write_registers(),
            );
            return Ok(ExecuteSignal::default());
        }

        let register_value = execution.register_value;
        let pc_change = execution.pc_change;
        let next_pc = execution.next_pc;
        out_bus.add(
            ExecutionContext {
                pc: runner.pc,
                execution,
                mnemonic: runner.instruction.mnemonic(),
                read_registers: runner.instruction.read_registers(),
                write_registers: runner.instruction.write_registers(),
            },
            cycle,
        );

        match &runner.forwarder {
            None => {
                if runner.instruction.is_unconditional_branch() {
                    if ctx.trace_enabled() {
                        eprintln!(
                            "[EU] jump resolved from {} to {}",
                            runner.pc / 4,
                            next_pc / 4
                        );
                    }
                    branch_unit.notify_jump_address_resolved(runner.pc, next_pc, fetch, decode);
                }
                if pc_change && branch_unit.should_flush_pipeline(next_pc) {
                    if ctx.trace_enabled() {
                        eprintln!(
                            "[EU] {} (pc {}) mispredicted",
                            runner.instruction.mnemonic(),
                            runner.pc / 4
                        );
                    }
                    return Ok(ExecuteSignal {
                        flush: true,
                        from: runner.pc,
                        next_pc,
                        ..ExecuteSignal::default()
                    });
                }
            }
            Some(slot) => {
                assert!(
                    !runner.instruction.is_branch(),
                    "a branch was selected as a forwarder"
                );
                slot.set(Some(register_value));
                if ctx.trace_enabled() {
                    eprintln!(
                        "[EU] {} (pc {}) published forward value {register_value}",
                        runner.instruction.mnemonic(),
                        runner.pc / 4
                    );
                }
            }
        }

        Ok(ExecuteSignal::default())
    }

    pub fn flush(&mut self) {
        self.state = ExecuteState::Idle;
        self.runner = None;
        self.forwarded = None;
        self.memory.clear();
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, ExecuteState::Idle)
    }
}
