//! Tests for the branch target buffer and the branch unit's flush decisions.

use riscv_pipesim::core::branch::{BranchTargetBuffer, BranchUnit};
use riscv_pipesim::core::stages::decode::DecodeUnit;
use riscv_pipesim::core::stages::fetch::FetchUnit;
use riscv_pipesim::isa::{InFlight, Instruction, Register};

fn jal(pc: i32) -> InFlight {
    InFlight::new(
        Instruction::Jal {
            rd: Register::Ra,
            label: "f".to_string(),
        },
        pc,
    )
}

fn beq(pc: i32) -> InFlight {
    InFlight::new(
        Instruction::Beq {
            rs1: Register::T0,
            rs2: Register::T1,
            label: "l".to_string(),
        },
        pc,
    )
}

/// Tests FIFO replacement in the target buffer.
#[test]
fn test_btb_fifo_replacement() {
    let mut btb = BranchTargetBuffer::new(2);
    btb.add(0, 100);
    btb.add(4, 104);
    assert_eq!(btb.get(0), Some(100));
    assert_eq!(btb.get(4), Some(104));

    btb.add(8, 108);
    assert_eq!(btb.get(0), None);
    assert_eq!(btb.get(4), Some(104));
    assert_eq!(btb.get(8), Some(108));

    // Re-recording an existing entry updates it in place.
    btb.add(4, 200);
    assert_eq!(btb.get(4), Some(200));
    assert_eq!(btb.get(8), Some(108));
}

/// Tests that an unknown jump always flushes once resolved.
#[test]
fn test_unknown_jump_flushes() {
    let mut unit = BranchUnit::new(4);
    let mut fetch = FetchUnit::new(50);

    unit.assert_expectation(&jal(0), &mut fetch);
    assert!(unit.should_flush_pipeline(40));
    assert_eq!(unit.mispredictions, 1);
}

/// Tests that a resolved jump trains the BTB, steers fetch and unblocks
/// decode; the second encounter is then free.
#[test]
fn test_jump_resolution_trains_btb() {
    let mut unit = BranchUnit::new(4);
    let mut fetch = FetchUnit::new(50);
    let mut decode = DecodeUnit::new();

    unit.notify_jump_address_resolved(0, 40, &mut fetch, &mut decode);
    assert_eq!(fetch.pc(), 40);
    assert!(!decode.is_stalled());

    // Known target: fetch is redirected at assert time, no check pending.
    unit.assert_expectation(&jal(0), &mut fetch);
    assert_eq!(fetch.pc(), 40);
    assert!(!unit.should_flush_pipeline(40));
    assert_eq!(unit.mispredictions, 0);
}

/// Tests the not-taken prediction for conditional branches.
#[test]
fn test_conditional_predicts_not_taken() {
    let mut unit = BranchUnit::new(4);
    let mut fetch = FetchUnit::new(50);

    unit.assert_expectation(&beq(8), &mut fetch);
    assert!(!unit.should_flush_pipeline(12));

    unit.assert_expectation(&beq(8), &mut fetch);
    assert!(unit.should_flush_pipeline(24));
    assert_eq!(unit.lookups, 2);
    assert_eq!(unit.mispredictions, 1);
}

/// Tests that non-branches install no expectation.
#[test]
fn test_non_branch_unchecked() {
    let mut unit = BranchUnit::new(4);
    let mut fetch = FetchUnit::new(50);

    unit.assert_expectation(&InFlight::new(Instruction::Nop, 0), &mut fetch);
    assert!(!unit.should_flush_pipeline(999));
    assert_eq!(unit.lookups, 0);
}
