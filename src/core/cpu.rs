//! The CPU facade: owns every stage, bus and cache, and drives them one
//! clock cycle at a time.
//!
//! Within a cycle the stages tick in pipeline order (fetch, decode, control,
//! execute, write-back); the buses make each stage's output visible to its
//! consumer only in the following cycle. Execute units surface return and
//! mispredict signals, which the loop turns into a drain-and-exit or a
//! drain-flush-restart respectively.

use crate::config::SimConfig;
use crate::core::branch::BranchUnit;
use crate::core::bus::BufferedBus;
use crate::core::context::Context;
use crate::core::mmu::MemoryManagementUnit;
use crate::core::stages::control::{ControlUnit, IssueBus};
use crate::core::stages::decode::DecodeUnit;
use crate::core::stages::execute::ExecuteUnit;
use crate::core::stages::fetch::FetchUnit;
use crate::core::stages::write_back::WriteBackUnit;
use crate::error::SimError;
use crate::isa::{Application, ExecutionContext, InFlight};
use crate::stats::SimStats;

pub struct Cpu {
    ctx: Context,
    fetch_unit: FetchUnit,
    decode_bus: BufferedBus<i32>,
    decode_unit: DecodeUnit,
    control_bus: BufferedBus<InFlight>,
    control_unit: ControlUnit,
    execute_buses: Vec<IssueBus>,
    execute_units: Vec<ExecuteUnit>,
    write_bus: BufferedBus<ExecutionContext>,
    write_units: Vec<WriteBackUnit>,
    branch_unit: BranchUnit,
    mmu: MemoryManagementUnit,
    flush_cycles: u64,
    counter_flush: u64,
    last_cycles: u64,
}

impl Cpu {
    /// A CPU with the default micro-architecture over `memory_bytes` of RAM.
    pub fn new(trace: bool, memory_bytes: usize) -> Cpu {
        let mut config = SimConfig::default();
        config.general.trace = trace;
        config.memory.size_bytes = memory_bytes;
        Cpu::with_config(&config)
    }

    pub fn with_config(config: &SimConfig) -> Cpu {
        let bus_size = config.pipeline.bus_size;
        let memory_cycles = config.memory.access_cycles;
        let l1d_cycles = config.cache.l1d.access_cycles;

        let execute_buses = (0..config.pipeline.execute_units)
            .map(|_| BufferedBus::new(bus_size, bus_size))
            .collect();
        let execute_units = (0..config.pipeline.execute_units)
            .map(|_| ExecuteUnit::new(memory_cycles, l1d_cycles))
            .collect();
        let write_units = (0..config.pipeline.write_back_units)
            .map(|_| WriteBackUnit::new(memory_cycles))
            .collect();

        Cpu {
            ctx: Context::new(config.general.trace, config.memory.size_bytes),
            fetch_unit: FetchUnit::new(memory_cycles),
            decode_bus: BufferedBus::new(bus_size, bus_size),
            decode_unit: DecodeUnit::new(),
            control_bus: BufferedBus::new(bus_size, bus_size),
            control_unit: ControlUnit::new(config.pipeline.pending_capacity),
            execute_buses,
            execute_units,
            write_bus: BufferedBus::new(bus_size, bus_size),
            write_units,
            branch_unit: BranchUnit::new(config.pipeline.btb_size),
            mmu: MemoryManagementUnit::new(config),
            flush_cycles: config.pipeline.flush_cycles,
            counter_flush: 0,
            last_cycles: 0,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Runs the program to completion and returns the total cycle count,
    /// including the final data-cache spill.
    pub fn run(&mut self, app: &Application) -> Result<u64, SimError> {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            if self.ctx.trace_enabled() {
                eprintln!("=== cycle {cycle}");
            }
            self.connect_buses(cycle);

            self.fetch_unit
                .tick(cycle, app, &self.ctx, &mut self.mmu, &mut self.decode_bus);
            self.decode_unit.tick(
                cycle,
                app,
                &self.ctx,
                &mut self.decode_bus,
                &mut self.control_bus,
            );
            self.control_unit.tick(
                cycle,
                &mut self.ctx,
                &mut self.control_bus,
                &mut self.execute_buses,
            );

            let mut flush = false;
            let mut committable = 0;
            let mut from = 0;
            let mut target_pc = 0;
            let mut ret = false;
            for (index, unit) in self.execute_units.iter_mut().enumerate() {
                if self.ctx.trace_enabled() {
                    eprintln!("[EU] execute unit {index}");
                }
                let signal = unit.tick(
                    cycle,
                    &mut self.ctx,
                    app,
                    &mut self.execute_buses[index],
                    &mut self.write_bus,
                    &mut self.mmu,
                    &mut self.branch_unit,
                    &mut self.fetch_unit,
                    &mut self.decode_unit,
                )?;
                if signal.flush && !flush {
                    // Everything queued so far, up to and including the
                    // branch itself, is older than the mispredict and must
                    // commit; later additions are down the wrong path.
                    committable = self.write_bus.len();
                    from = signal.from;
                }
                flush = flush || signal.flush;
                target_pc = target_pc.max(signal.next_pc);
                ret = ret || signal.ret;
            }
            if flush {
                self.write_bus.truncate(committable);
            }

            for unit in &mut self.write_units {
                unit.tick(&mut self.ctx, &mut self.write_bus);
            }
            if self.ctx.trace_enabled() {
                eprintln!("    registers: {}", self.ctx.registers.dump());
            }

            if ret {
                // Let in-flight commits finish before reporting final state.
                cycle += 1;
                self.write_bus.connect(cycle);
                while !self.write_units_empty() || !self.write_bus.is_empty() {
                    for unit in &mut self.write_units {
                        unit.tick(&mut self.ctx, &mut self.write_bus);
                    }
                    cycle += 1;
                    self.write_bus.connect(cycle);
                }
                break;
            }

            if flush {
                self.counter_flush += 1;
                // Commit what survived the truncation before restarting.
                for index in 0..self.write_units.len() {
                    while !self.write_units[index].is_empty() || !self.write_bus.is_empty() {
                        cycle += 1;
                        self.write_bus.connect(cycle);
                        self.write_units[index].tick(&mut self.ctx, &mut self.write_bus);
                    }
                }
                if self.ctx.trace_enabled() {
                    eprintln!("    flush from {} to {}", from / 4, target_pc / 4);
                }
                self.flush(target_pc);
                cycle += self.flush_cycles;
                continue;
            }

            if self.is_empty() {
                break;
            }
        }
        cycle += self.mmu.flush(&mut self.ctx.memory);
        self.last_cycles = cycle;
        Ok(cycle)
    }

    pub fn stats(&self) -> SimStats {
        SimStats {
            cycles: self.last_cycles,
            flushes: self.counter_flush,
            cu_pushed: self.control_unit.pushed.clone(),
            cu_pending: self.control_unit.pending.clone(),
            cu_pending_read: self.control_unit.pending_read.clone(),
            cu_blocked: self.control_unit.blocked.clone(),
            cu_forwardings: self.control_unit.forwardings,
            cu_cycles: self.control_unit.total,
            cu_cant_add: self.control_unit.cant_add,
            cu_blocked_branch: self.control_unit.blocked_branch,
            cu_blocked_data_hazard: self.control_unit.blocked_data_hazard,
            bp_lookups: self.branch_unit.lookups,
            bp_mispredictions: self.branch_unit.mispredictions,
            icache_hits: self.mmu.icache_hits,
            icache_misses: self.mmu.icache_misses,
            dcache_hits: self.mmu.dcache_hits,
            dcache_misses: self.mmu.dcache_misses,
        }
    }

    /// Resets every stage and bus after a mispredict and restarts fetch at
    /// `pc`. Architectural state is untouched.
    fn flush(&mut self, pc: i32) {
        self.fetch_unit.flush(pc);
        self.decode_unit.flush();
        self.control_unit.flush();
        for unit in &mut self.execute_units {
            unit.flush();
        }
        self.decode_bus.clean();
        self.control_bus.clean();
        for bus in &mut self.execute_buses {
            bus.clean();
        }
        self.write_bus.clean();
        self.ctx.flush();
    }

    fn connect_buses(&mut self, cycle: u64) {
        self.decode_bus.connect(cycle);
        self.control_bus.connect(cycle);
        for bus in &mut self.execute_buses {
            bus.connect(cycle);
        }
        self.write_bus.connect(cycle);
    }

    fn write_units_empty(&self) -> bool {
        self.write_units.iter().all(WriteBackUnit::is_empty)
    }

    fn is_empty(&self) -> bool {
        self.fetch_unit.is_empty()
            && self.decode_unit.is_empty()
            && self.control_unit.is_empty()
            && self.write_units_empty()
            && self.decode_bus.is_empty()
            && self.control_bus.is_empty()
            && self.execute_buses.iter().all(BufferedBus::is_empty)
            && self.write_bus.is_empty()
            && self.execute_units.iter().all(ExecuteUnit::is_empty)
    }
}
