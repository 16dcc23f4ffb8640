//! Textual assembly ingress: the other external collaborator spec.md §1
//! keeps outside the core crate.
//!
//! Turns a sequence of lines of the form `MNEMONIC arg, arg, arg` into the
//! [`Instruction`] records the core pipeline consumes directly, addressed
//! by `pc / 4` via [`rv32pipe_core::isa::program::Program::Assembly`].
//! Recognizes every RV32I mnemonic plus `MRET` and `BUBBLE` (spec.md §6.1).
//! A label (`name:` on its own line) may stand in for a branch, jump, or
//! `JALR` offset operand; offsets are resolved against the label's own
//! address in a first pass before instructions are built in a second.

use rv32pipe_core::isa::instruction::{
    AluOp, BranchPredicate, CsrOp, CsrSource, Header, Instruction, Kind, ResultSlot, SystemOp,
    Width,
};
use thiserror::Error;

/// A malformed assembly line. Rejected before the pipeline ever sees it,
/// per spec.md §7's "structural errors... reject before pipeline entry."
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    /// `mnemonic` at `line` is not one of the 40 RV32I ops, `MRET`, or
    /// `BUBBLE`.
    #[error("line {line}: unrecognized mnemonic {mnemonic:?}")]
    UnknownMnemonic {
        /// 1-based source line number.
        line: usize,
        /// The unrecognized token.
        mnemonic: String,
    },
    /// An instruction had the wrong number of, or malformed, operands.
    #[error("line {line}: {detail}")]
    MalformedOperands {
        /// 1-based source line number.
        line: usize,
        /// Human-readable description of what was expected.
        detail: String,
    },
    /// A branch/jump/`JALR` operand named a label that was never defined.
    #[error("line {line}: undefined label {label:?}")]
    UndefinedLabel {
        /// 1-based source line number.
        line: usize,
        /// The undefined label.
        label: String,
    },
}

fn err(line: usize, detail: impl Into<String>) -> AsmError {
    AsmError::MalformedOperands {
        line,
        detail: detail.into(),
    }
}

/// Parses a register token (`R0`..`R31`, case-insensitive).
fn parse_reg(tok: &str, line: usize) -> Result<u8, AsmError> {
    let digits = tok
        .strip_prefix(['R', 'r'])
        .ok_or_else(|| err(line, format!("expected a register, got {tok:?}")))?;
    let idx: u8 = digits
        .parse()
        .map_err(|_| err(line, format!("bad register index in {tok:?}")))?;
    if idx > 31 {
        return Err(err(line, format!("register index {idx} out of range")));
    }
    Ok(idx)
}

/// Parses a decimal or `0x`-prefixed immediate, signed.
fn parse_imm_literal(tok: &str, line: usize) -> Result<i32, AsmError> {
    let (neg, body) = tok.strip_prefix('-').map_or((false, tok), |rest| (true, rest));
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        body.parse::<i64>()
    }
    .map_err(|_| err(line, format!("bad immediate {tok:?}")))?;
    let signed = if neg { -value } else { value };
    i32::try_from(signed).map_err(|_| err(line, format!("immediate {tok:?} out of range")))
}

/// An immediate operand that may be a literal or a forward/backward label
/// reference, resolved to a PC-relative offset in the second pass.
enum ImmOperand {
    Literal(i32),
    Label(String),
}

fn parse_imm_operand(tok: &str) -> ImmOperand {
    match parse_imm_literal(tok.trim_start_matches('+'), 0) {
        Ok(v) => ImmOperand::Literal(v),
        Err(_) => ImmOperand::Label(tok.to_string()),
    }
}

impl ImmOperand {
    fn resolve(self, line: usize, own_pc: u32, labels: &std::collections::HashMap<String, u32>) -> Result<i32, AsmError> {
        match self {
            Self::Literal(v) => Ok(v),
            Self::Label(name) => {
                let target = *labels
                    .get(&name)
                    .ok_or_else(|| AsmError::UndefinedLabel { line, label: name.clone() })?;
                Ok(target.wrapping_sub(own_pc) as i32)
            }
        }
    }
}

/// Parses a `offset(Rn)` memory operand, used by loads, stores, and `JALR`.
fn parse_mem_operand(tok: &str, line: usize) -> Result<(i32, u8), AsmError> {
    let open = tok
        .find('(')
        .ok_or_else(|| err(line, format!("expected offset(Rn), got {tok:?}")))?;
    if !tok.ends_with(')') {
        return Err(err(line, format!("expected offset(Rn), got {tok:?}")));
    }
    let offset = parse_imm_literal(&tok[..open], line)?;
    let reg = parse_reg(&tok[open + 1..tok.len() - 1], line)?;
    Ok((offset, reg))
}

fn split_operands(rest: &str) -> Vec<&str> {
    rest.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// A single parsed instruction line, before label offsets are resolved
/// against its final address.
struct PendingLine {
    header_rd: Option<u8>,
    build: Box<dyn FnOnce(u32, &std::collections::HashMap<String, u32>) -> Result<Kind, AsmError>>,
    mnemonic: &'static str,
}

fn strip_comment(line: &str) -> &str {
    let cut = line.find(['#', ';']).unwrap_or(line.len());
    line[..cut].trim()
}

/// Parses `source` into a fully-resolved instruction table, addressed by
/// `pc / 4`, ready to hand to [`rv32pipe_core::isa::program::Program::Assembly`].
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, AsmError> {
    let mut labels = std::collections::HashMap::new();
    let mut pending = Vec::new();
    let mut pc = 0u32;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let text = strip_comment(raw_line);
        if text.is_empty() {
            continue;
        }
        if let Some(label) = text.strip_suffix(':') {
            let _ = labels.insert(label.trim().to_string(), pc);
            continue;
        }
        pending.push(parse_line(text, line_no, pc)?);
        pc += 4;
    }

    let mut program = Vec::with_capacity(pending.len());
    let mut pc = 0u32;
    for PendingLine { header_rd, build, mnemonic } in pending {
        let kind = build(pc, &labels)?;
        program.push(Instruction {
            header: Header { pc, rd: header_rd },
            kind,
            result: ResultSlot::None,
            mnemonic: Some(mnemonic),
        });
        pc += 4;
    }
    Ok(program)
}

#[allow(clippy::too_many_lines)]
fn parse_line(text: &str, line_no: usize, _pc: u32) -> Result<PendingLine, AsmError> {
    let mut parts = text.splitn(2, char::is_whitespace);
    let mnemonic = parts.next().unwrap_or_default().to_ascii_uppercase();
    let rest = parts.next().unwrap_or_default();
    let ops = split_operands(rest);

    macro_rules! rtype {
        ($op:expr) => {{
            if ops.len() != 3 {
                return Err(err(line_no, "expected rd, rs1, rs2"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let rs1 = parse_reg(ops[1], line_no)?;
            let rs2 = parse_reg(ops[2], line_no)?;
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| Ok(Kind::RType { op: $op, rs1, rs2 })),
                mnemonic: mnemonic_str(&mnemonic),
            })
        }};
    }

    macro_rules! itype {
        ($op:expr) => {{
            if ops.len() != 3 {
                return Err(err(line_no, "expected rd, rs1, imm"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let rs1 = parse_reg(ops[1], line_no)?;
            let imm = parse_imm_literal(ops[2], line_no)?;
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| Ok(Kind::IType { op: $op, rs1, imm })),
                mnemonic: mnemonic_str(&mnemonic),
            })
        }};
    }

    macro_rules! load {
        ($width:expr, $signed:expr) => {{
            if ops.len() != 2 {
                return Err(err(line_no, "expected rd, offset(rs1)"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let (imm, rs1) = parse_mem_operand(ops[1], line_no)?;
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| {
                    Ok(Kind::Load { width: $width, signed: $signed, rs1, imm })
                }),
                mnemonic: mnemonic_str(&mnemonic),
            })
        }};
    }

    macro_rules! store {
        ($width:expr) => {{
            if ops.len() != 2 {
                return Err(err(line_no, "expected rs2, offset(rs1)"));
            }
            let rs2 = parse_reg(ops[0], line_no)?;
            let (imm, rs1) = parse_mem_operand(ops[1], line_no)?;
            Ok(PendingLine {
                header_rd: None,
                build: Box::new(move |_pc, _labels| Ok(Kind::Store { width: $width, rs1, rs2, imm })),
                mnemonic: mnemonic_str(&mnemonic),
            })
        }};
    }

    macro_rules! branch {
        ($pred:expr) => {{
            if ops.len() != 3 {
                return Err(err(line_no, "expected rs1, rs2, offset-or-label"));
            }
            let rs1 = parse_reg(ops[0], line_no)?;
            let rs2 = parse_reg(ops[1], line_no)?;
            let target = parse_imm_operand(ops[2]);
            Ok(PendingLine {
                header_rd: None,
                build: Box::new(move |pc, labels| {
                    Ok(Kind::Branch { pred: $pred, rs1, rs2, imm: target.resolve(line_no, pc, labels)? })
                }),
                mnemonic: mnemonic_str(&mnemonic),
            })
        }};
    }

    macro_rules! csr {
        ($op:expr, $imm_variant:expr) => {{
            if ops.len() != 3 {
                return Err(err(line_no, "expected rd, csr, src"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let addr = parse_imm_literal(ops[1], line_no)? as u16;
            let source = if $imm_variant {
                CsrSource::Immediate(parse_imm_literal(ops[2], line_no)? as u8)
            } else {
                CsrSource::Register(parse_reg(ops[2], line_no)?)
            };
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| Ok(Kind::Csr { op: $op, addr, source })),
                mnemonic: mnemonic_str(&mnemonic),
            })
        }};
    }

    match mnemonic.as_str() {
        "BUBBLE" => Ok(PendingLine {
            header_rd: None,
            build: Box::new(|_pc, _labels| Ok(Kind::Bubble)),
            mnemonic: "BUBBLE",
        }),
        "ADD" => rtype!(AluOp::Add),
        "SUB" => rtype!(AluOp::Sub),
        "SLL" => rtype!(AluOp::Sll),
        "SLT" => rtype!(AluOp::Slt),
        "SLTU" => rtype!(AluOp::Sltu),
        "XOR" => rtype!(AluOp::Xor),
        "SRL" => rtype!(AluOp::Srl),
        "SRA" => rtype!(AluOp::Sra),
        "OR" => rtype!(AluOp::Or),
        "AND" => rtype!(AluOp::And),
        "ADDI" => itype!(AluOp::Add),
        "SLTI" => itype!(AluOp::Slt),
        "SLTIU" => itype!(AluOp::Sltu),
        "XORI" => itype!(AluOp::Xor),
        "ORI" => itype!(AluOp::Or),
        "ANDI" => itype!(AluOp::And),
        "SLLI" => itype!(AluOp::Sll),
        "SRLI" => itype!(AluOp::Srl),
        "SRAI" => itype!(AluOp::Sra),
        "LB" => load!(Width::Byte, true),
        "LH" => load!(Width::Half, true),
        "LW" => load!(Width::Word, false),
        "LBU" => load!(Width::Byte, false),
        "LHU" => load!(Width::Half, false),
        "SB" => store!(Width::Byte),
        "SH" => store!(Width::Half),
        "SW" => store!(Width::Word),
        "BEQ" => branch!(BranchPredicate::Eq),
        "BNE" => branch!(BranchPredicate::Ne),
        "BLT" => branch!(BranchPredicate::Lt),
        "BGE" => branch!(BranchPredicate::Ge),
        "BLTU" => branch!(BranchPredicate::Ltu),
        "BGEU" => branch!(BranchPredicate::Geu),
        "LUI" => {
            if ops.len() != 2 {
                return Err(err(line_no, "expected rd, imm20"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let imm = parse_imm_literal(ops[1], line_no)?.wrapping_shl(12);
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| Ok(Kind::Lui { imm })),
                mnemonic: "LUI",
            })
        }
        "AUIPC" => {
            if ops.len() != 2 {
                return Err(err(line_no, "expected rd, imm20"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let imm = parse_imm_literal(ops[1], line_no)?.wrapping_shl(12);
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| Ok(Kind::Auipc { imm })),
                mnemonic: "AUIPC",
            })
        }
        "JAL" => {
            if ops.len() != 2 {
                return Err(err(line_no, "expected rd, offset-or-label"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let target = parse_imm_operand(ops[1]);
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |pc, labels| {
                    Ok(Kind::Jal { imm: target.resolve(line_no, pc, labels)? })
                }),
                mnemonic: "JAL",
            })
        }
        "JALR" => {
            if ops.len() != 2 {
                return Err(err(line_no, "expected rd, offset(rs1)"));
            }
            let rd = parse_reg(ops[0], line_no)?;
            let (imm, rs1) = parse_mem_operand(ops[1], line_no)?;
            Ok(PendingLine {
                header_rd: Some(rd),
                build: Box::new(move |_pc, _labels| Ok(Kind::Jalr { rs1, imm })),
                mnemonic: "JALR",
            })
        }
        "CSRRW" => csr!(CsrOp::ReadWrite, false),
        "CSRRS" => csr!(CsrOp::ReadSet, false),
        "CSRRC" => csr!(CsrOp::ReadClear, false),
        "CSRRWI" => csr!(CsrOp::ReadWrite, true),
        "CSRRSI" => csr!(CsrOp::ReadSet, true),
        "CSRRCI" => csr!(CsrOp::ReadClear, true),
        "FENCE" => Ok(PendingLine {
            header_rd: None,
            build: Box::new(|_pc, _labels| Ok(Kind::System(SystemOp::Fence))),
            mnemonic: "FENCE",
        }),
        "FENCE.I" => Ok(PendingLine {
            header_rd: None,
            build: Box::new(|_pc, _labels| Ok(Kind::System(SystemOp::FenceI))),
            mnemonic: "FENCE.I",
        }),
        "ECALL" => Ok(PendingLine {
            header_rd: None,
            build: Box::new(|_pc, _labels| Ok(Kind::System(SystemOp::Ecall))),
            mnemonic: "ECALL",
        }),
        "EBREAK" => Ok(PendingLine {
            header_rd: None,
            build: Box::new(|_pc, _labels| Ok(Kind::System(SystemOp::Ebreak))),
            mnemonic: "EBREAK",
        }),
        "MRET" => Ok(PendingLine {
            header_rd: None,
            build: Box::new(|_pc, _labels| Ok(Kind::System(SystemOp::Mret))),
            mnemonic: "MRET",
        }),
        other => Err(AsmError::UnknownMnemonic {
            line: line_no,
            mnemonic: other.to_string(),
        }),
    }
}

/// Recovers a `'static` mnemonic string for the [`Instruction::mnemonic`]
/// trace field from the owned, upper-cased token the parser matched on.
fn mnemonic_str(upper: &str) -> &'static str {
    // All match arms above pass a string that is already one of these
    // literals; this just gives the trace field a `'static` lifetime
    // without re-allocating per instruction.
    match upper {
        "ADD" => "ADD",
        "SUB" => "SUB",
        "SLL" => "SLL",
        "SLT" => "SLT",
        "SLTU" => "SLTU",
        "XOR" => "XOR",
        "SRL" => "SRL",
        "SRA" => "SRA",
        "OR" => "OR",
        "AND" => "AND",
        "ADDI" => "ADDI",
        "SLTI" => "SLTI",
        "SLTIU" => "SLTIU",
        "XORI" => "XORI",
        "ORI" => "ORI",
        "ANDI" => "ANDI",
        "SLLI" => "SLLI",
        "SRLI" => "SRLI",
        "SRAI" => "SRAI",
        "LB" => "LB",
        "LH" => "LH",
        "LW" => "LW",
        "LBU" => "LBU",
        "LHU" => "LHU",
        "SB" => "SB",
        "SH" => "SH",
        "SW" => "SW",
        "BEQ" => "BEQ",
        "BNE" => "BNE",
        "BLT" => "BLT",
        "BGE" => "BGE",
        "BLTU" => "BLTU",
        "BGEU" => "BGEU",
        "CSRRW" => "CSRRW",
        "CSRRS" => "CSRRS",
        "CSRRC" => "CSRRC",
        "CSRRWI" => "CSRRWI",
        "CSRRSI" => "CSRRSI",
        "CSRRCI" => "CSRRCI",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_then_store_scenario() {
        let program = parse_program("ADD R1, R2, R3\nSW R1, 100(R0)\n").unwrap();
        assert_eq!(program.len(), 2);
        assert!(matches!(program[0].kind, Kind::RType { op: AluOp::Add, rs1: 2, rs2: 3 }));
        assert!(matches!(program[1].kind, Kind::Store { width: Width::Word, rs1: 0, rs2: 1, imm: 100 }));
    }

    #[test]
    fn branch_resolves_forward_label_to_pc_relative_offset() {
        let src = "BEQ R1, R2, skip\nADDI R3, R0, 99\nskip:\nADDI R4, R0, 7\n";
        let program = parse_program(src).unwrap();
        let Kind::Branch { imm, .. } = program[0].kind else {
            panic!("expected a branch");
        };
        assert_eq!(imm, 8);
    }

    #[test]
    fn literal_branch_offset_is_honored_directly() {
        let program = parse_program("BEQ R1, R2, 8\n").unwrap();
        assert!(matches!(program[0].kind, Kind::Branch { imm: 8, .. }));
    }

    #[test]
    fn unknown_mnemonic_is_rejected() {
        let err = parse_program("FROB R1, R2, R3\n").unwrap_err();
        assert!(matches!(err, AsmError::UnknownMnemonic { .. }));
    }

    #[test]
    fn undefined_label_is_rejected() {
        let err = parse_program("JAL R1, nowhere\n").unwrap_err();
        assert!(matches!(err, AsmError::UndefinedLabel { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let program = parse_program("# a comment\n\nBUBBLE ; trailing note\n").unwrap();
        assert_eq!(program.len(), 1);
        assert!(matches!(program[0].kind, Kind::Bubble));
    }
}
