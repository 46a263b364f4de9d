//! Tests for pending-register bookkeeping and hazard classification.

use riscv_pipesim::core::context::{Context, HazardKind};
use riscv_pipesim::isa::{Instruction, Register};

fn addi(rd: Register, rs: Register) -> Instruction {
    Instruction::Addi { rd, rs, imm: 0 }
}

/// Tests RAW detection: a source matching a pending write.
#[test]
fn test_read_after_write() {
    let mut ctx = Context::new(false, 64);
    ctx.add_pending_registers(&addi(Register::T0, Register::A0));

    let hazards = ctx.data_hazards(&addi(Register::T1, Register::T0));
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].kind, HazardKind::ReadAfterWrite);
    assert_eq!(hazards[0].register, Register::T0);
}

/// Tests WAW detection: a destination matching a pending write.
#[test]
fn test_write_after_write() {
    let mut ctx = Context::new(false, 64);
    ctx.add_pending_registers(&addi(Register::T0, Register::A0));

    let hazards = ctx.data_hazards(&addi(Register::T0, Register::A1));
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].kind, HazardKind::WriteAfterWrite);
}

/// Tests WAR detection: a destination matching a pending read.
#[test]
fn test_write_after_read() {
    let mut ctx = Context::new(false, 64);
    ctx.add_pending_registers(&addi(Register::T0, Register::A0));

    let hazards = ctx.data_hazards(&addi(Register::A0, Register::A1));
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].kind, HazardKind::WriteAfterRead);
}

/// Tests that the zero register never participates in hazards.
#[test]
fn test_zero_register_no_hazards() {
    let mut ctx = Context::new(false, 64);
    ctx.add_pending_registers(&addi(Register::Zero, Register::Zero));
    assert!(ctx.pending_registers_empty());

    let hazards = ctx.data_hazards(&addi(Register::Zero, Register::Zero));
    assert!(hazards.is_empty());
}

/// Tests multiset behavior: two producers of the same register require two
/// releases.
#[test]
fn test_pending_marks_are_counted() {
    let mut ctx = Context::new(false, 64);
    let producer = addi(Register::T0, Register::A0);
    ctx.add_pending_registers(&producer);
    ctx.add_pending_registers(&producer);

    ctx.delete_pending_registers(&[Register::A0], &[Register::T0]);
    assert!(!ctx.pending_registers_empty());
    assert!(!ctx.data_hazards(&addi(Register::T1, Register::T0)).is_empty());

    ctx.delete_pending_registers(&[Register::A0], &[Register::T0]);
    assert!(ctx.pending_registers_empty());
    assert!(ctx.data_hazards(&addi(Register::T1, Register::T0)).is_empty());
}

/// Tests that a flush clears the bookkeeping without touching state.
#[test]
fn test_flush_clears_pending_only() {
    let mut ctx = Context::new(false, 64);
    ctx.registers.write(Register::T0, 7);
    ctx.memory[3] = 9;
    ctx.add_pending_registers(&addi(Register::T1, Register::T0));

    ctx.flush();
    assert!(ctx.pending_registers_empty());
    assert_eq!(ctx.registers.read(Register::T0), 7);
    assert_eq!(ctx.memory[3], 9);
}
