//! Per-opcode semantics.
//!
//! Every operation computes an [`Execution`] descriptor from the current
//! register state; loads consume bytes already collected by the execute unit
//! through the data cache. Arithmetic wraps, shifts use the low 5 bits of the
//! shift amount, and the unsigned compares operate on the `u32` bit pattern.

use std::collections::{BTreeMap, HashMap};

use crate::core::context::RegisterFile;
use crate::error::SimError;
use crate::isa::{bytes_from_low_bits, i32_from_bytes, Category, Execution, Forward, Instruction, Register};

/// Reads a source register, honoring a bypassed value if one was forwarded
/// for that register.
fn source(registers: &RegisterFile, bypass: Option<Forward>, register: Register) -> i32 {
    if let Some(forward) = bypass {
        if forward.register == register {
            return forward.value;
        }
    }
    registers.read(register)
}

fn target(labels: &HashMap<String, i32>, label: &str) -> Result<i32, SimError> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| SimError::UnknownLabel(label.to_string()))
}

fn branch(
    labels: &HashMap<String, i32>,
    label: &str,
    taken: bool,
) -> Result<Execution, SimError> {
    if taken {
        Ok(Execution::jump(target(labels, label)?))
    } else {
        Ok(Execution::default())
    }
}

impl Instruction {
    /// Executes the instruction against the register state, returning the
    /// effect descriptor. `memory` holds the bytes for the addresses announced
    /// by [`Instruction::memory_read`], in order.
    pub fn run(
        &self,
        registers: &mut RegisterFile,
        labels: &HashMap<String, i32>,
        pc: i32,
        memory: &[i8],
        bypass: Option<Forward>,
    ) -> Result<Execution, SimError> {
        let reg = |r: Register| source(registers, bypass, r);
        match self {
            Instruction::Add { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                reg(*rs1).wrapping_add(reg(*rs2)),
            )),
            Instruction::Addi { rd, rs, imm } => {
                Ok(Execution::register_write(*rd, reg(*rs).wrapping_add(*imm)))
            }
            Instruction::Sub { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                reg(*rs1).wrapping_sub(reg(*rs2)),
            )),
            Instruction::And { rd, rs1, rs2 } => {
                Ok(Execution::register_write(*rd, reg(*rs1) & reg(*rs2)))
            }
            Instruction::Andi { rd, rs, imm } => {
                Ok(Execution::register_write(*rd, reg(*rs) & *imm))
            }
            Instruction::Or { rd, rs1, rs2 } => {
                Ok(Execution::register_write(*rd, reg(*rs1) | reg(*rs2)))
            }
            Instruction::Ori { rd, rs, imm } => {
                Ok(Execution::register_write(*rd, reg(*rs) | *imm))
            }
            Instruction::Xor { rd, rs1, rs2 } => {
                Ok(Execution::register_write(*rd, reg(*rs1) ^ reg(*rs2)))
            }
            Instruction::Xori { rd, rs, imm } => {
                Ok(Execution::register_write(*rd, reg(*rs) ^ *imm))
            }
            Instruction::Sll { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                reg(*rs1).wrapping_shl(reg(*rs2) as u32),
            )),
            Instruction::Slli { rd, rs, imm } => Ok(Execution::register_write(
                *rd,
                reg(*rs).wrapping_shl(*imm as u32),
            )),
            Instruction::Srl { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                (reg(*rs1) as u32).wrapping_shr(reg(*rs2) as u32) as i32,
            )),
            Instruction::Srli { rd, rs, imm } => Ok(Execution::register_write(
                *rd,
                (reg(*rs) as u32).wrapping_shr(*imm as u32) as i32,
            )),
            Instruction::Sra { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                reg(*rs1).wrapping_shr(reg(*rs2) as u32),
            )),
            Instruction::Srai { rd, rs, imm } => Ok(Execution::register_write(
                *rd,
                reg(*rs).wrapping_shr(*imm as u32),
            )),
            Instruction::Slt { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                i32::from(reg(*rs1) < reg(*rs2)),
            )),
            Instruction::Slti { rd, rs, imm } => {
                Ok(Execution::register_write(*rd, i32::from(reg(*rs) < *imm)))
            }
            Instruction::Sltu { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                i32::from((reg(*rs1) as u32) < (reg(*rs2) as u32)),
            )),
            Instruction::Mul { rd, rs1, rs2 } => Ok(Execution::register_write(
                *rd,
                reg(*rs1).wrapping_mul(reg(*rs2)),
            )),
            Instruction::Div { rd, rs1, rs2 } => {
                let divisor = reg(*rs2);
                if divisor == 0 {
                    return Err(SimError::DivisionByZero);
                }
                Ok(Execution::register_write(
                    *rd,
                    reg(*rs1).wrapping_div(divisor),
                ))
            }
            Instruction::Rem { rd, rs1, rs2 } => {
                let divisor = reg(*rs2);
                if divisor == 0 {
                    return Err(SimError::DivisionByZero);
                }
                Ok(Execution::register_write(
                    *rd,
                    reg(*rs1).wrapping_rem(divisor),
                ))
            }
            Instruction::Li { rd, imm } => Ok(Execution::register_write(*rd, *imm)),
            Instruction::Lui { rd, imm } => {
                Ok(Execution::register_write(*rd, imm.wrapping_shl(12)))
            }
            Instruction::Auipc { rd, imm } => Ok(Execution::register_write(
                *rd,
                pc.wrapping_add(imm.wrapping_shl(12)),
            )),
            Instruction::Mv { rd, rs } => Ok(Execution::register_write(*rd, reg(*rs))),
            Instruction::Nop => Ok(Execution::default()),
            Instruction::Lb { rd, .. } => {
                Ok(Execution::register_write(*rd, i32::from(memory[0])))
            }
            Instruction::Lh { rd, .. } => Ok(Execution::register_write(
                *rd,
                i32_from_bytes(memory[0], memory[1], 0, 0),
            )),
            Instruction::Lw { rd, .. } => Ok(Execution::register_write(
                *rd,
                i32_from_bytes(memory[0], memory[1], memory[2], memory[3]),
            )),
            Instruction::Sb { rs2, offset, rs1 } => {
                let addr = reg(*rs1).wrapping_add(*offset);
                let bytes = bytes_from_low_bits(reg(*rs2));
                Ok(Execution::memory_write(BTreeMap::from([(addr, bytes[0])])))
            }
            Instruction::Sh { rs2, offset, rs1 } => {
                let addr = reg(*rs1).wrapping_add(*offset);
                let bytes = bytes_from_low_bits(reg(*rs2));
                Ok(Execution::memory_write(BTreeMap::from([
                    (addr, bytes[0]),
                    (addr.wrapping_add(1), bytes[1]),
                ])))
            }
            Instruction::Sw { rs2, offset, rs1 } => {
                let addr = reg(*rs1).wrapping_add(*offset);
                let bytes = bytes_from_low_bits(reg(*rs2));
                Ok(Execution::memory_write(BTreeMap::from([
                    (addr, bytes[0]),
                    (addr.wrapping_add(1), bytes[1]),
                    (addr.wrapping_add(2), bytes[2]),
                    (addr.wrapping_add(3), bytes[3]),
                ])))
            }
            Instruction::Beq { rs1, rs2, label } => {
                branch(labels, label, reg(*rs1) == reg(*rs2))
            }
            Instruction::Bne { rs1, rs2, label } => {
                branch(labels, label, reg(*rs1) != reg(*rs2))
            }
            Instruction::Blt { rs1, rs2, label } => {
                branch(labels, label, reg(*rs1) < reg(*rs2))
            }
            Instruction::Bltu { rs1, rs2, label } => {
                branch(labels, label, (reg(*rs1) as u32) < (reg(*rs2) as u32))
            }
            Instruction::Bge { rs1, rs2, label } => {
                branch(labels, label, reg(*rs1) >= reg(*rs2))
            }
            Instruction::Bgeu { rs1, rs2, label } => {
                branch(labels, label, (reg(*rs1) as u32) >= (reg(*rs2) as u32))
            }
            Instruction::Jal { rd, label } => {
                let addr = target(labels, label)?;
                registers.write(Register::Ra, pc);
                let mut execution = Execution::register_write(*rd, pc.wrapping_add(4));
                execution.pc_change = true;
                execution.next_pc = addr;
                Ok(execution)
            }
            Instruction::Jalr { rd, rs, imm } => {
                let next_pc = reg(*rs).wrapping_add(*imm);
                let mut execution = Execution::register_write(*rd, pc.wrapping_add(4));
                execution.pc_change = true;
                execution.next_pc = next_pc;
                Ok(execution)
            }
            Instruction::Ret => Ok(Execution {
                ret: true,
                ..Execution::default()
            }),
        }
    }

    /// The registers this instruction reads as source operands.
    pub fn read_registers(&self) -> Vec<Register> {
        match self {
            Instruction::Add { rs1, rs2, .. }
            | Instruction::Sub { rs1, rs2, .. }
            | Instruction::And { rs1, rs2, .. }
            | Instruction::Or { rs1, rs2, .. }
            | Instruction::Xor { rs1, rs2, .. }
            | Instruction::Sll { rs1, rs2, .. }
            | Instruction::Srl { rs1, rs2, .. }
            | Instruction::Sra { rs1, rs2, .. }
            | Instruction::Slt { rs1, rs2, .. }
            | Instruction::Sltu { rs1, rs2, .. }
            | Instruction::Mul { rs1, rs2, .. }
            | Instruction::Div { rs1, rs2, .. }
            | Instruction::Rem { rs1, rs2, .. }
            | Instruction::Sb { rs1, rs2, .. }
            | Instruction::Sh { rs1, rs2, .. }
            | Instruction::Sw { rs1, rs2, .. }
            | Instruction::Beq { rs1, rs2, .. }
            | Instruction::Bne { rs1, rs2, .. }
            | Instruction::Blt { rs1, rs2, .. }
            | Instruction::Bltu { rs1, rs2, .. }
            | Instruction::Bge { rs1, rs2, .. }
            | Instruction::Bgeu { rs1, rs2, .. } => vec![*rs1, *rs2],
            Instruction::Addi { rs, .. }
            | Instruction::Andi { rs, .. }
            | Instruction::Ori { rs, .. }
            | Instruction::Xori { rs, .. }
            | Instruction::Slli { rs, .. }
            | Instruction::Srli { rs, .. }
            | Instruction::Srai { rs, .. }
            | Instruction::Slti { rs, .. }
            | Instruction::Mv { rs, .. }
            | Instruction::Lb { rs, .. }
            | Instruction::Lh { rs, .. }
            | Instruction::Lw { rs, .. }
            | Instruction::Jalr { rs, .. } => vec![*rs],
            Instruction::Li { .. }
            | Instruction::Lui { .. }
            | Instruction::Auipc { .. }
            | Instruction::Nop
            | Instruction::Jal { .. }
            | Instruction::Ret => Vec::new(),
        }
    }

    /// The registers this instruction writes at commit.
    pub fn write_registers(&self) -> Vec<Register> {
        match self {
            Instruction::Add { rd, .. }
            | Instruction::Addi { rd, .. }
            | Instruction::Sub { rd, .. }
            | Instruction::And { rd, .. }
            | Instruction::Andi { rd, .. }
            | Instruction::Or { rd, .. }
            | Instruction::Ori { rd, .. }
            | Instruction::Xor { rd, .. }
            | Instruction::Xori { rd, .. }
            | Instruction::Sll { rd, .. }
            | Instruction::Slli { rd, .. }
            | Instruction::Srl { rd, .. }
            | Instruction::Srli { rd, .. }
            | Instruction::Sra { rd, .. }
            | Instruction::Srai { rd, .. }
            | Instruction::Slt { rd, .. }
            | Instruction::Slti { rd, .. }
            | Instruction::Sltu { rd, .. }
            | Instruction::Mul { rd, .. }
            | Instruction::Div { rd, .. }
            | Instruction::Rem { rd, .. }
            | Instruction::Li { rd, .. }
            | Instruction::Lui { rd, .. }
            | Instruction::Auipc { rd, .. }
            | Instruction::Mv { rd, .. }
            | Instruction::Lb { rd, .. }
            | Instruction::Lh { rd, .. }
            | Instruction::Lw { rd, .. }
            | Instruction::Jal { rd, .. }
            | Instruction::Jalr { rd, .. } => vec![*rd],
            Instruction::Nop
            | Instruction::Sb { .. }
            | Instruction::Sh { .. }
            | Instruction::Sw { .. }
            | Instruction::Beq { .. }
            | Instruction::Bne { .. }
            | Instruction::Blt { .. }
            | Instruction::Bltu { .. }
            | Instruction::Bge { .. }
            | Instruction::Bgeu { .. }
            | Instruction::Ret => Vec::new(),
        }
    }

    /// The memory addresses a load will read, in ascending order. Empty for
    /// anything that is not a load.
    pub fn memory_read(&self, registers: &RegisterFile, bypass: Option<Forward>) -> Vec<i32> {
        let (rs, offset, width) = match self {
            Instruction::Lb { rs, offset, .. } => (*rs, *offset, 1),
            Instruction::Lh { rs, offset, .. } => (*rs, *offset, 2),
            Instruction::Lw { rs, offset, .. } => (*rs, *offset, 4),
            _ => return Vec::new(),
        };
        let base = source(registers, bypass, rs).wrapping_add(offset);
        (0..width).map(|i| base.wrapping_add(i)).collect()
    }

    pub fn category(&self) -> Category {
        match self {
            Instruction::Lb { .. } | Instruction::Lh { .. } | Instruction::Lw { .. } => {
                Category::Load
            }
            Instruction::Sb { .. } | Instruction::Sh { .. } | Instruction::Sw { .. } => {
                Category::Store
            }
            Instruction::Beq { .. }
            | Instruction::Bne { .. }
            | Instruction::Blt { .. }
            | Instruction::Bltu { .. }
            | Instruction::Bge { .. }
            | Instruction::Bgeu { .. } => Category::ConditionalBranch,
            Instruction::Jal { .. } | Instruction::Jalr { .. } => Category::UnconditionalBranch,
            Instruction::Ret => Category::Return,
            _ => Category::Alu,
        }
    }

    pub fn is_conditional_branch(&self) -> bool {
        self.category() == Category::ConditionalBranch
    }

    pub fn is_unconditional_branch(&self) -> bool {
        self.category() == Category::UnconditionalBranch
    }

    /// Branches of any flavor must issue alone and never forward.
    pub fn is_branch(&self) -> bool {
        matches!(
            self.category(),
            Category::ConditionalBranch | Category::UnconditionalBranch | Category::Return
        )
    }

    /// Control flow the decode stage cannot resolve by itself; decoding one of
    /// these serializes the front end until the branch unit reports back.
    pub fn is_jump(&self) -> bool {
        matches!(
            self.category(),
            Category::UnconditionalBranch | Category::Return
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Add { .. } => "add",
            Instruction::Addi { .. } => "addi",
            Instruction::Sub { .. } => "sub",
            Instruction::And { .. } => "and",
            Instruction::Andi { .. } => "andi",
            Instruction::Or { .. } => "or",
            Instruction::Ori { .. } => "ori",
            Instruction::Xor { .. } => "xor",
            Instruction::Xori { .. } => "xori",
            Instruction::Sll { .. } => "sll",
            Instruction::Slli { .. } => "slli",
            Instruction::Srl { .. } => "srl",
            Instruction::Srli { .. } => "srli",
            Instruction::Sra { .. } => "sra",
            Instruction::Srai { .. } => "srai",
            Instruction::Slt { .. } => "slt",
            Instruction::Slti { .. } => "slti",
            Instruction::Sltu { .. } => "sltu",
            Instruction::Mul { .. } => "mul",
            Instruction::Div { .. } => "div",
            Instruction::Rem { .. } => "rem",
            Instruction::Li { .. } => "li",
            Instruction::Lui { .. } => "lui",
            Instruction::Auipc { .. } => "auipc",
            Instruction::Mv { .. } => "mv",
            Instruction::Nop => "nop",
            Instruction::Lb { .. } => "lb",
            Instruction::Lh { .. } => "lh",
            Instruction::Lw { .. } => "lw",
            Instruction::Sb { .. } => "sb",
            Instruction::Sh { .. } => "sh",
            Instruction::Sw { .. } => "sw",
            Instruction::Beq { .. } => "beq",
            Instruction::Bne { .. } => "bne",
            Instruction::Blt { .. } => "blt",
            Instruction::Bltu { .. } => "bltu",
            Instruction::Bge { .. } => "bge",
            Instruction::Bgeu { .. } => "bgeu",
            Instruction::Jal { .. } => "jal",
            Instruction::Jalr { .. } => "jalr",
            Instruction::Ret => "ret",
        }
    }
}
