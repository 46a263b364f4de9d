//! Line-oriented assembler front end.
//!
//! Turns assembly text into an [`Application`]: one decoded [`Instruction`]
//! per line, labels resolved to the PC of the instruction that follows them.
//! Supported syntax: `label:` prefixes (alone or before an instruction),
//! `#` comments, decimal and `0x` immediates, and `offset(reg)` memory
//! operands with ABI or `xN` register names.

use std::collections::HashMap;

use crate::error::SimError;
use crate::isa::{Application, Instruction, Register};

/// Parses a full assembly source into an [`Application`].
pub fn parse(source: &str) -> Result<Application, SimError> {
    let mut instructions = Vec::new();
    let mut labels = HashMap::new();

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let mut line = match raw.split_once('#') {
            Some((code, _comment)) => code.trim(),
            None => raw.trim(),
        };

        while let Some(colon) = line.find(':') {
            let (head, tail) = line.split_at(colon);
            let label = head.trim();
            if label.is_empty() || !is_identifier(label) {
                return Err(err(line_no, format!("invalid label {label:?}")));
            }
            if labels
                .insert(label.to_string(), (instructions.len() as i32) * 4)
                .is_some()
            {
                return Err(err(line_no, format!("duplicate label {label:?}")));
            }
            line = tail[1..].trim();
        }

        if line.is_empty() {
            continue;
        }
        instructions.push(parse_instruction(line, line_no)?);
    }

    Ok(Application {
        instructions,
        labels,
    })
}

fn parse_instruction(line: &str, line_no: usize) -> Result<Instruction, SimError> {
    let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
        Some((m, rest)) => (m, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    let inst = match mnemonic {
        "add" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Add { rd, rs1, rs2 })?,
        "sub" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Sub { rd, rs1, rs2 })?,
        "and" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::And { rd, rs1, rs2 })?,
        "or" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Or { rd, rs1, rs2 })?,
        "xor" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Xor { rd, rs1, rs2 })?,
        "sll" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Sll { rd, rs1, rs2 })?,
        "srl" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Srl { rd, rs1, rs2 })?,
        "sra" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Sra { rd, rs1, rs2 })?,
        "slt" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Slt { rd, rs1, rs2 })?,
        "sltu" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Sltu { rd, rs1, rs2 })?,
        "mul" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Mul { rd, rs1, rs2 })?,
        "div" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Div { rd, rs1, rs2 })?,
        "rem" => rtype(&args, line_no, |rd, rs1, rs2| Instruction::Rem { rd, rs1, rs2 })?,
        "addi" => itype(&args, line_no, |rd, rs, imm| Instruction::Addi { rd, rs, imm })?,
        "andi" => itype(&args, line_no, |rd, rs, imm| Instruction::Andi { rd, rs, imm })?,
        "ori" => itype(&args, line_no, |rd, rs, imm| Instruction::Ori { rd, rs, imm })?,
        "xori" => itype(&args, line_no, |rd, rs, imm| Instruction::Xori { rd, rs, imm })?,
        "slli" => itype(&args, line_no, |rd, rs, imm| Instruction::Slli { rd, rs, imm })?,
        "srli" => itype(&args, line_no, |rd, rs, imm| Instruction::Srli { rd, rs, imm })?,
        "srai" => itype(&args, line_no, |rd, rs, imm| Instruction::Srai { rd, rs, imm })?,
        "slti" => itype(&args, line_no, |rd, rs, imm| Instruction::Slti { rd, rs, imm })?,
        "jalr" => itype(&args, line_no, |rd, rs, imm| Instruction::Jalr { rd, rs, imm })?,
        "lb" => load(&args, line_no, |rd, offset, rs| Instruction::Lb { rd, offset, rs })?,
        "lh" => load(&args, line_no, |rd, offset, rs| Instruction::Lh { rd, offset, rs })?,
        "lw" => load(&args, line_no, |rd, offset, rs| Instruction::Lw { rd, offset, rs })?,
        "sb" => store(&args, line_no, |rs2, offset, rs1| Instruction::Sb { rs2, offset, rs1 })?,
        "sh" => store(&args, line_no, |rs2, offset, rs1| Instruction::Sh { rs2, offset, rs1 })?,
        "sw" => store(&args, line_no, |rs2, offset, rs1| Instruction::Sw { rs2, offset, rs1 })?,
        "beq" => btype(&args, line_no, |rs1, rs2, label| Instruction::Beq { rs1, rs2, label })?,
        "bne" => btype(&args, line_no, |rs1, rs2, label| Instruction::Bne { rs1, rs2, label })?,
        "blt" => btype(&args, line_no, |rs1, rs2, label| Instruction::Blt { rs1, rs2, label })?,
        "bltu" => btype(&args, line_no, |rs1, rs2, label| Instruction::Bltu { rs1, rs2, label })?,
        "bge" => btype(&args, line_no, |rs1, rs2, label| Instruction::Bge { rs1, rs2, label })?,
        "bgeu" => btype(&args, line_no, |rs1, rs2, label| Instruction::Bgeu { rs1, rs2, label })?,
        "li" => {
            expect_args(&args, 2, line_no)?;
            Instruction::Li {
                rd: register(args[0], line_no)?,
                imm: immediate(args[1], line_no)?,
            }
        }
        "lui" => {
            expect_args(&args, 2, line_no)?;
            Instruction::Lui {
                rd: register(args[0], line_no)?,
                imm: immediate(args[1], line_no)?,
            }
        }
        "auipc" => {
            expect_args(&args, 2, line_no)?;
            Instruction::Auipc {
                rd: register(args[0], line_no)?,
                imm: immediate(args[1], line_no)?,
            }
        }
        "mv" => {
            expect_args(&args, 2, line_no)?;
            Instruction::Mv {
                rd: register(args[0], line_no)?,
                rs: register(args[1], line_no)?,
            }
        }
        "jal" => {
            expect_args(&args, 2, line_no)?;
            Instruction::Jal {
                rd: register(args[0], line_no)?,
                label: label_name(args[1], line_no)?,
            }
        }
        "nop" => {
            expect_args(&args, 0, line_no)?;
            Instruction::Nop
        }
        "ret" => {
            expect_args(&args, 0, line_no)?;
            Instruction::Ret
        }
        other => return Err(err(line_no, format!("unknown instruction {other:?}"))),
    };
    Ok(inst)
}

fn rtype(
    args: &[&str],
    line_no: usize,
    build: impl FnOnce(Register, Register, Register) -> Instruction,
) -> Result<Instruction, SimError> {
    expect_args(args, 3, line_no)?;
    Ok(build(
        register(args[0], line_no)?,
        register(args[1], line_no)?,
        register(args[2], line_no)?,
    ))
}

fn itype(
    args: &[&str],
    line_no: usize,
    build: impl FnOnce(Register, Register, i32) -> Instruction,
) -> Result<Instruction, SimError> {
    expect_args(args, 3, line_no)?;
    Ok(build(
        register(args[0], line_no)?,
        register(args[1], line_no)?,
        immediate(args[2], line_no)?,
    ))
}

fn load(
    args: &[&str],
    line_no: usize,
    build: impl FnOnce(Register, i32, Register) -> Instruction,
) -> Result<Instruction, SimError> {
    expect_args(args, 2, line_no)?;
    let rd = register(args[0], line_no)?;
    let (offset, rs) = memory_operand(args[1], line_no)?;
    Ok(build(rd, offset, rs))
}

fn store(
    args: &[&str],
    line_no: usize,
    build: impl FnOnce(Register, i32, Register) -> Instruction,
) -> Result<Instruction, SimError> {
    expect_args(args, 2, line_no)?;
    let rs2 = register(args[0], line_no)?;
    let (offset, rs1) = memory_operand(args[1], line_no)?;
    Ok(build(rs2, offset, rs1))
}

fn btype(
    args: &[&str],
    line_no: usize,
    build: impl FnOnce(Register, Register, String) -> Instruction,
) -> Result<Instruction, SimError> {
    expect_args(args, 3, line_no)?;
    Ok(build(
        register(args[0], line_no)?,
        register(args[1], line_no)?,
        label_name(args[2], line_no)?,
    ))
}

fn expect_args(args: &[&str], count: usize, line_no: usize) -> Result<(), SimError> {
    if args.len() != count {
        return Err(err(
            line_no,
            format!("expected {count} operands, found {}", args.len()),
        ));
    }
    Ok(())
}

fn register(text: &str, line_no: usize) -> Result<Register, SimError> {
    Register::parse(text).ok_or_else(|| err(line_no, format!("unknown register {text:?}")))
}

fn immediate(text: &str, line_no: usize) -> Result<i32, SimError> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = match digits.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    };
    let value = parsed.map_err(|_| err(line_no, format!("invalid immediate {text:?}")))?;
    let value = if negative { -value } else { value };
    i32::try_from(value).map_err(|_| err(line_no, format!("immediate {text:?} out of range")))
}

/// Splits an `offset(reg)` operand; a missing offset means 0.
fn memory_operand(text: &str, line_no: usize) -> Result<(i32, Register), SimError> {
    let open = text
        .find('(')
        .ok_or_else(|| err(line_no, format!("invalid memory operand {text:?}")))?;
    let close = text
        .rfind(')')
        .filter(|&c| c == text.len() - 1 && c > open)
        .ok_or_else(|| err(line_no, format!("invalid memory operand {text:?}")))?;
    let offset_text = text[..open].trim();
    let offset = if offset_text.is_empty() {
        0
    } else {
        immediate(offset_text, line_no)?
    };
    let rs = register(text[open + 1..close].trim(), line_no)?;
    Ok((offset, rs))
}

fn label_name(text: &str, line_no: usize) -> Result<String, SimError> {
    if is_identifier(text) {
        Ok(text.to_string())
    } else {
        Err(err(line_no, format!("invalid label {text:?}")))
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !text.starts_with(|c: char| c.is_ascii_digit())
}

fn err(line: usize, message: String) -> SimError {
    SimError::Parse { line, message }
}
