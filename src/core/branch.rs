//! Branch prediction: a small branch target buffer plus the unit that
//! installs expectations before execution and decides on flushes afterwards.
//!
//! Unconditional jumps whose target is already in the BTB redirect fetch
//! immediately, so the speculation has no cost; unknown jumps are marked with
//! an impossible expectation and always flush once resolved. Conditional
//! branches are always predicted not taken.

use crate::core::stages::decode::DecodeUnit;
use crate::core::stages::fetch::FetchUnit;
use crate::isa::InFlight;

/// FIFO map from a resolved branch PC to its most recently observed target.
#[derive(Debug)]
pub struct BranchTargetBuffer {
    size: usize,
    entries: Vec<(i32, i32)>,
}

impl BranchTargetBuffer {
    pub fn new(size: usize) -> BranchTargetBuffer {
        BranchTargetBuffer {
            size,
            entries: Vec::new(),
        }
    }

    pub fn get(&self, pc: i32) -> Option<i32> {
        self.entries
            .iter()
            .find(|(from, _)| *from == pc)
            .map(|(_, to)| *to)
    }

    pub fn add(&mut self, pc: i32, to: i32) {
        if let Some(entry) = self.entries.iter_mut().find(|(from, _)| *from == pc) {
            entry.1 = to;
            return;
        }
        self.entries.push((pc, to));
        if self.entries.len() > self.size {
            self.entries.remove(0);
        }
    }
}

/// Installs per-instruction control-flow expectations and reports mismatches.
pub struct BranchUnit {
    btb: BranchTargetBuffer,
    to_check: bool,
    expectation: i32,
    pub lookups: u64,
    pub mispredictions: u64,
}

impl BranchUnit {
    pub fn new(btb_size: usize) -> BranchUnit {
        BranchUnit {
            btb: BranchTargetBuffer::new(btb_size),
            to_check: false,
            expectation: 0,
            lookups: 0,
            mispredictions: 0,
        }
    }

    /// Records what the in-flight instruction is expected to do to the PC,
    /// before it executes. A BTB hit on an unconditional jump steers fetch to
    /// the cached target right away.
    pub fn assert_expectation(&mut self, runner: &InFlight, fetch: &mut FetchUnit) {
        if runner.instruction.is_unconditional_branch() {
            self.lookups += 1;
            match self.btb.get(runner.pc) {
                Some(next_pc) => {
                    self.to_check = false;
                    fetch.reset(next_pc, true);
                }
                None => {
                    // Unknown target, guaranteed mismatch on resolution.
                    self.to_check = true;
                    self.expectation = -1;
                }
            }
        } else if runner.instruction.is_conditional_branch() {
            self.lookups += 1;
            self.to_check = true;
            self.expectation = runner.pc + 4;
        } else {
            self.to_check = false;
        }
    }

    /// Whether the resolved next PC contradicts the recorded expectation.
    pub fn should_flush_pipeline(&mut self, pc: i32) -> bool {
        if !self.to_check {
            return false;
        }
        self.to_check = false;
        if self.expectation != pc {
            self.mispredictions += 1;
            return true;
        }
        false
    }

    /// Called when an unconditional jump resolves: remember the target,
    /// restart fetch there and release the decode stage.
    pub fn notify_jump_address_resolved(
        &mut self,
        pc: i32,
        to: i32,
        fetch: &mut FetchUnit,
        decode: &mut DecodeUnit,
    ) {
        self.btb.add(pc, to);
        fetch.reset(to, true);
        decode.notify_branch_resolved();
    }
}
