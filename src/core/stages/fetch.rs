//! Fetch stage.
//!
//! Emits PC values to the decode bus, one per bus slot per cycle, as long as
//! the instruction cache holds the current PC. A miss suspends the unit for
//! the memory latency, installs the (empty) line and emits the stalled PC
//! when the wait elapses. Instruction bytes are never materialized: programs
//! arrive pre-decoded, the cache models timing only.

use crate::core::bus::BufferedBus;
use crate::core::context::Context;
use crate::core::mmu::MemoryManagementUnit;
use crate::isa::Application;

enum FetchState {
    Ready,
    /// Waiting out a memory access before the line lands in L1I.
    WaitingLine { remaining: u64 },
    /// Ran past the end of the program.
    Done,
}

pub struct FetchUnit {
    pc: i32,
    complete: bool,
    to_clean_pending: bool,
    state: FetchState,
    cycles_memory_access: u64,
}

impl FetchUnit {
    pub fn new(cycles_memory_access: u64) -> FetchUnit {
        FetchUnit {
            pc: 0,
            complete: false,
            to_clean_pending: false,
            state: FetchState::Ready,
            cycles_memory_access,
        }
    }

    pub fn tick(
        &mut self,
        cycle: u64,
        app: &Application,
        ctx: &Context,
        mmu: &mut MemoryManagementUnit,
        out_bus: &mut BufferedBus<i32>,
    ) {
        if self.to_clean_pending {
            // Anything still on the bus was fetched down a wrong path.
            if ctx.trace_enabled() {
                eprintln!("[FU] cleaning output bus");
            }
            out_bus.clean();
            self.to_clean_pending = false;
        }

        match self.state {
            FetchState::Done => {}
            FetchState::WaitingLine { ref mut remaining } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    if ctx.trace_enabled() {
                        eprintln!("[FU] pending memory access");
                    }
                    return;
                }
                if !out_bus.can_add() {
                    return;
                }
                let line_length = mmu.l1i_line_length();
                mmu.push_line_to_l1i(self.pc, vec![0; line_length]);
                self.state = FetchState::Ready;
                self.emit(cycle, app, ctx, out_bus);
            }
            FetchState::Ready => {
                for _ in 0..out_bus.out_length() {
                    if !out_bus.can_add() {
                        if ctx.trace_enabled() {
                            eprintln!("[FU] can't add");
                        }
                        return;
                    }
                    if mmu.get_from_l1i(&[self.pc]).is_none() {
                        self.state = FetchState::WaitingLine {
                            remaining: self.cycles_memory_access - 1,
                        };
                        return;
                    }
                    if self.emit(cycle, app, ctx, out_bus) {
                        return;
                    }
                }
            }
        }
    }

    /// Pushes the current PC to the decode bus and advances. Returns true
    /// once the program end is reached.
    fn emit(
        &mut self,
        cycle: u64,
        app: &Application,
        ctx: &Context,
        out_bus: &mut BufferedBus<i32>,
    ) -> bool {
        let current_pc = self.pc;
        self.pc += 4;
        if ctx.trace_enabled() {
            eprintln!("[FU] pushing pc {}", current_pc / 4);
        }
        out_bus.add(current_pc, cycle);
        if self.pc / 4 >= app.instructions.len() as i32 {
            self.complete = true;
            self.state = FetchState::Done;
            return true;
        }
        false
    }

    /// Restarts fetching at `pc` (branch target known early, or resolved).
    /// With `clean_pending`, the output bus is scrubbed on the next tick:
    /// everything on it was speculated down the wrong path.
    pub fn reset(&mut self, pc: i32, clean_pending: bool) {
        self.state = FetchState::Ready;
        self.pc = pc;
        self.to_clean_pending = clean_pending;
    }

    /// Full restart after a pipeline flush.
    pub fn flush(&mut self, pc: i32) {
        self.state = FetchState::Ready;
        self.complete = false;
        self.to_clean_pending = false;
        self.pc = pc;
    }

    pub fn is_empty(&self) -> bool {
        self.complete
    }

    /// The PC of the next instruction to fetch.
    pub fn pc(&self) -> i32 {
        self.pc
    }
}
