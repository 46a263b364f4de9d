//! Control / issue stage.
//!
//! Considers the oldest instructions first (an internal backlog of skipped
//! instructions, then the incoming bus), checks each against the registers
//! still in flight, and issues hazard-free instructions to the execute
//! buses. A single RAW hazard against an instruction issued in the previous
//! cycle is bridged with a one-shot forwarding slot instead of a stall.
//!
//! Issue discipline, in order:
//! - a branch never shares a cycle with an earlier issue,
//! - an instruction depending on one skipped this cycle is skipped too, so
//!   register effects stay visible in program order,
//! - otherwise RAW/WAW/WAR hazards against pending registers block issue.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::core::bus::BufferedBus;
use crate::core::context::{Context, Hazard, HazardKind};
use crate::isa::{InFlight, Instruction, Register};
use crate::stats::Gauge;

/// Bus from the control unit to one execute unit. Entries are shared so a
/// forwarding producer can be annotated after it was issued.
pub type IssueBus = BufferedBus<Rc<RefCell<InFlight>>>;

enum Outcome {
    Pushed { stop: bool },
    Skipped { runner: InFlight, stop: bool },
}

pub struct ControlUnit {
    pendings: VecDeque<InFlight>,
    pending_capacity: usize,
    pushed_previous_cycle: Vec<Rc<RefCell<InFlight>>>,
    pushed_current_cycle: Vec<Rc<RefCell<InFlight>>>,
    skipped_current_cycle: Vec<Instruction>,
    route_next: usize,

    pub pushed: Gauge,
    pub pending: Gauge,
    pub pending_read: Gauge,
    pub blocked: Gauge,
    pub forwardings: u64,
    pub total: u64,
    pub cant_add: u64,
    pub blocked_branch: u64,
    pub blocked_data_hazard: u64,
}

impl ControlUnit {
    pub fn new(pending_capacity: usize) -> ControlUnit {
        ControlUnit {
            pendings: VecDeque::new(),
            pending_capacity,
            pushed_previous_cycle: Vec::new(),
            pushed_current_cycle: Vec::new(),
            skipped_current_cycle: Vec::new(),
            route_next: 0,
            pushed: Gauge::default(),
            pending: Gauge::default(),
            pending_read: Gauge::default(),
            blocked: Gauge::default(),
            forwardings: 0,
            total: 0,
            cant_add: 0,
            blocked_branch: 0,
            blocked_data_hazard: 0,
        }
    }

    pub fn tick(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        in_bus: &mut BufferedBus<InFlight>,
        out_buses: &mut [IssueBus],
    ) {
        self.skipped_current_cycle.clear();
        self.pushed_current_cycle.clear();
        let mut pushed_count: u64 = 0;

        self.pending_read.record(in_bus.pending_read() as u64);
        self.blocked.record(u64::from(in_bus.can_get()));
        self.total += 1;

        self.issue(cycle, ctx, in_bus, out_buses, &mut pushed_count);

        self.pushed.record(pushed_count);
        self.pending.record(self.pendings.len() as u64);
        self.pushed_previous_cycle = std::mem::take(&mut self.pushed_current_cycle);
    }

    fn issue(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        in_bus: &mut BufferedBus<InFlight>,
        out_buses: &mut [IssueBus],
        pushed_count: &mut u64,
    ) {
        if !out_buses.iter().any(BufferedBus::can_add) {
            self.cant_add += 1;
            if ctx.trace_enabled() {
                eprintln!("[CU] can't add");
            }
            return;
        }

        // Backlogged instructions first, oldest first.
        let mut backlog = std::mem::take(&mut self.pendings);
        let mut stopped = false;
        while let Some(runner) = backlog.pop_front() {
            if stopped {
                self.pendings.push_back(runner);
                continue;
            }
            match self.handle_runner(cycle, ctx, *pushed_count, runner, out_buses) {
                Outcome::Pushed { stop } => {
                    *pushed_count += 1;
                    stopped = stop;
                }
                Outcome::Skipped { runner, stop } => {
                    self.skipped_current_cycle.push(runner.instruction.clone());
                    self.pendings.push_back(runner);
                    stopped = stop;
                }
            }
        }
        if stopped {
            return;
        }

        // Then fresh arrivals, as long as the backlog has room for skips.
        while self.pendings.len() < self.pending_capacity {
            let Some(runner) = in_bus.get() else {
                return;
            };
            match self.handle_runner(cycle, ctx, *pushed_count, runner, out_buses) {
                Outcome::Pushed { stop } => {
                    *pushed_count += 1;
                    if stop {
                        return;
                    }
                }
                Outcome::Skipped { runner, stop } => {
                    self.skipped_current_cycle.push(runner.instruction.clone());
                    self.pendings.push_back(runner);
                    if stop {
                        return;
                    }
                }
            }
        }
    }

    fn handle_runner(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        pushed_count: u64,
        mut runner: InFlight,
        out_buses: &mut [IssueBus],
    ) -> Outcome {
        if pushed_count > 0 && runner.instruction.is_branch() {
            self.blocked_branch += 1;
            return Outcome::Skipped { runner, stop: true };
        }

        if self.hazard_with_skipped(&runner.instruction) {
            if ctx.trace_enabled() {
                eprintln!(
                    "[CU] {} (pc {}) hazard with skipped instruction",
                    runner.instruction.mnemonic(),
                    runner.pc / 4
                );
            }
            return Outcome::Skipped {
                runner,
                stop: false,
            };
        }

        let hazards = ctx.data_hazards(&runner.instruction);
        if hazards.is_empty() {
            return match self.push_runner(cycle, ctx, runner, out_buses) {
                Ok(()) => Outcome::Pushed { stop: false },
                Err(runner) => Outcome::Skipped { runner, stop: true },
            };
        }

        if let Some((producer, register)) = self.forwarding_source(&runner.instruction, &hazards) {
            if !out_buses.iter().any(BufferedBus::can_add) {
                return Outcome::Skipped { runner, stop: true };
            }
            let slot = Rc::new(Cell::new(None));
            producer.borrow_mut().forwarder = Some(Rc::clone(&slot));
            runner.receiver = Some((slot, register));
            if ctx.trace_enabled() {
                eprintln!(
                    "[CU] {} (pc {}) forwarding {register} from pc {}",
                    runner.instruction.mnemonic(),
                    runner.pc / 4,
                    producer.borrow().pc / 4
                );
            }
            self.forwardings += 1;
            return match self.push_runner(cycle, ctx, runner, out_buses) {
                Ok(()) => Outcome::Pushed { stop: true },
                Err(runner) => Outcome::Skipped { runner, stop: true },
            };
        }

        if ctx.trace_enabled() {
            eprintln!(
                "[CU] {} (pc {}) data hazard: {hazards:?}",
                runner.instruction.mnemonic(),
                runner.pc / 4
            );
        }
        self.blocked_data_hazard += 1;
        Outcome::Skipped { runner, stop: true }
    }

    /// Dependencies against instructions already skipped this cycle: issuing
    /// around them would reorder register effects.
    fn hazard_with_skipped(&self, instruction: &Instruction) -> bool {
        let reads = instruction.read_registers();
        let writes = instruction.write_registers();
        for skipped in &self.skipped_current_cycle {
            let skipped_reads = skipped.read_registers();
            let skipped_writes = skipped.write_registers();
            let collides = |a: &[Register], b: &[Register]| {
                a.iter()
                    .any(|r| *r != Register::Zero && b.contains(r))
            };
            // Read after write, write after write, write after read.
            if collides(&reads, &skipped_writes)
                || collides(&writes, &skipped_writes)
                || collides(&writes, &skipped_reads)
            {
                return true;
            }
        }
        false
    }

    /// Forwarding applies only to a lone RAW hazard whose producer issued in
    /// the previous cycle. Branches never produce a forwardable value.
    fn forwarding_source(
        &self,
        instruction: &Instruction,
        hazards: &[Hazard],
    ) -> Option<(Rc<RefCell<InFlight>>, Register)> {
        if hazards.len() != 1 || hazards[0].kind != HazardKind::ReadAfterWrite {
            return None;
        }
        for producer in &self.pushed_previous_cycle {
            let candidate = producer.borrow();
            if candidate.instruction.is_branch() {
                continue;
            }
            for write_register in candidate.instruction.write_registers() {
                for read_register in instruction.read_registers() {
                    if read_register != Register::Zero && read_register == write_register {
                        return Some((Rc::clone(producer), read_register));
                    }
                }
            }
        }
        None
    }

    fn push_runner(
        &mut self,
        cycle: u64,
        ctx: &mut Context,
        runner: InFlight,
        out_buses: &mut [IssueBus],
    ) -> Result<(), InFlight> {
        let count = out_buses.len();
        let Some(choice) =
            (0..count).find(|k| out_buses[(self.route_next + k) % count].can_add())
        else {
            return Err(runner);
        };
        let index = (self.route_next + choice) % count;
        ctx.add_pending_registers(&runner.instruction);
        if ctx.trace_enabled() {
            eprintln!(
                "[CU] pushing {} (pc {}) to execute unit {index}",
                runner.instruction.mnemonic(),
                runner.pc / 4
            );
        }
        let cell = Rc::new(RefCell::new(runner));
        out_buses[index].add(Rc::clone(&cell), cycle);
        self.pushed_current_cycle.push(cell);
        self.route_next = (index + 1) % count;
        Ok(())
    }

    pub fn flush(&mut self) {
        self.pendings.clear();
        self.pushed_previous_cycle.clear();
        self.pushed_current_cycle.clear();
        self.skipped_current_cycle.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pendings.is_empty()
    }
}
