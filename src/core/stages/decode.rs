//! Decode stage.
//!
//! Translates fetched PCs into in-flight instructions for the control unit.
//! Decoding a jump whose target is not yet known serializes the front end:
//! nothing more is emitted until the branch unit reports the resolution.

use crate::core::bus::BufferedBus;
use crate::core::context::Context;
use crate::isa::{Application, InFlight};
use crate::stats::Gauge;

pub struct DecodeUnit {
    pending_branch_resolution: bool,
    pub pushed: Gauge,
    pub pending_read: Gauge,
    pub blocked: Gauge,
}

impl DecodeUnit {
    pub fn new() -> DecodeUnit {
        DecodeUnit {
            pending_branch_resolution: false,
            pushed: Gauge::default(),
            pending_read: Gauge::default(),
            blocked: Gauge::default(),
        }
    }

    pub fn tick(
        &mut self,
        cycle: u64,
        app: &Application,
        ctx: &Context,
        in_bus: &mut BufferedBus<i32>,
        out_bus: &mut BufferedBus<InFlight>,
    ) {
        self.pending_read.record(in_bus.pending_read() as u64);
        self.blocked
            .record(u64::from(self.pending_branch_resolution));
        if self.pending_branch_resolution {
            return;
        }

        let mut pushed = 0;
        for _ in 0..out_bus.in_length() {
            if !out_bus.can_add() {
                break;
            }
            let Some(pc) = in_bus.get() else {
                break;
            };
            if ctx.trace_enabled() {
                eprintln!("[DU] decoding instruction {}", pc / 4);
            }
            let instruction = app.instructions[(pc / 4) as usize].clone();
            let serialize = instruction.is_jump();
            out_bus.add(InFlight::new(instruction, pc), cycle);
            pushed += 1;
            if serialize {
                self.pending_branch_resolution = true;
                break;
            }
        }
        self.pushed.record(pushed);
    }

    pub fn notify_branch_resolved(&mut self) {
        self.pending_branch_resolution = false;
    }

    /// Whether decode is serialized behind an unresolved jump.
    pub fn is_stalled(&self) -> bool {
        self.pending_branch_resolution
    }

    pub fn flush(&mut self) {
        self.pending_branch_resolution = false;
    }

    /// Decode holds no multi-cycle state of its own.
    pub fn is_empty(&self) -> bool {
        true
    }
}

impl Default for DecodeUnit {
    fn default() -> Self {
        DecodeUnit::new()
    }
}
