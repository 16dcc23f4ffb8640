//! Binary decoding of raw 32-bit RV32I words into [`instruction::Instruction`] records.
//!
//! Decoding is total: any bit pattern that does not match a recognized
//! encoding becomes [`Kind::Illegal`], which raises a trap only when it
//! reaches the execute stage. This module never fails and never panics.

use super::bits::InstructionBits;
use super::instruction::{
    AluOp, BranchPredicate, CsrOp, CsrSource, Header, Instruction, Kind, ResultSlot, SystemOp,
    Width,
};
use super::opcodes::*;

/// Sign-extends the low `bits` bits of `value` to a full `i32`.
#[inline]
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// I-type immediate: bits `[31:20]`, sign-extended.
fn imm_i(raw: u32) -> i32 {
    sign_extend(raw >> 20, 12)
}

/// S-type immediate: `rd` field holds `imm[4:0]`, `funct7` field holds `imm[11:5]`.
fn imm_s(raw: u32) -> i32 {
    let lo = raw.rd();
    let hi = raw.funct7();
    sign_extend((hi << 5) | lo, 12)
}

/// B-type immediate: a scrambled 13-bit encoding with bit 0 implicitly zero.
fn imm_b(raw: u32) -> i32 {
    let bit11 = (raw >> 7) & 0x1;
    let bit4_1 = (raw >> 8) & 0xF;
    let bit10_5 = (raw >> 25) & 0x3F;
    let bit12 = (raw >> 31) & 0x1;
    let value = (bit12 << 12) | (bit11 << 11) | (bit10_5 << 5) | (bit4_1 << 1);
    sign_extend(value, 13)
}

/// U-type immediate: bits `[31:12]` already positioned, low 12 bits zero.
fn imm_u(raw: u32) -> i32 {
    (raw & 0xFFFF_F000) as i32
}

/// J-type immediate: a scrambled 21-bit encoding with bit 0 implicitly zero.
fn imm_j(raw: u32) -> i32 {
    let bit19_12 = (raw >> 12) & 0xFF;
    let bit11 = (raw >> 20) & 0x1;
    let bit10_1 = (raw >> 21) & 0x3FF;
    let bit20 = (raw >> 31) & 0x1;
    let value = (bit20 << 20) | (bit19_12 << 12) | (bit11 << 11) | (bit10_1 << 1);
    sign_extend(value, 21)
}

fn alu_op(funct3: u32, funct7: u32, is_reg_reg: bool) -> Option<AluOp> {
    Some(match funct3 {
        alu_funct3::ADD_SUB if is_reg_reg && funct7 == funct7::ALT => AluOp::Sub,
        alu_funct3::ADD_SUB => AluOp::Add,
        alu_funct3::SLL => AluOp::Sll,
        alu_funct3::SLT => AluOp::Slt,
        alu_funct3::SLTU => AluOp::Sltu,
        alu_funct3::XOR => AluOp::Xor,
        alu_funct3::SRL_SRA if funct7 == funct7::ALT => AluOp::Sra,
        alu_funct3::SRL_SRA => AluOp::Srl,
        alu_funct3::OR => AluOp::Or,
        alu_funct3::AND => AluOp::And,
        _ => return None,
    })
}

fn branch_predicate(funct3: u32) -> Option<BranchPredicate> {
    Some(match funct3 {
        branch_funct3::BEQ => BranchPredicate::Eq,
        branch_funct3::BNE => BranchPredicate::Ne,
        branch_funct3::BLT => BranchPredicate::Lt,
        branch_funct3::BGE => BranchPredicate::Ge,
        branch_funct3::BLTU => BranchPredicate::Ltu,
        branch_funct3::BGEU => BranchPredicate::Geu,
        _ => return None,
    })
}

fn load_width(funct3: u32) -> Option<(Width, bool)> {
    Some(match funct3 {
        load_funct3::LB => (Width::Byte, true),
        load_funct3::LH => (Width::Half, true),
        load_funct3::LW => (Width::Word, false),
        load_funct3::LBU => (Width::Byte, false),
        load_funct3::LHU => (Width::Half, false),
        _ => return None,
    })
}

fn store_width(funct3: u32) -> Option<Width> {
    Some(match funct3 {
        store_funct3::SB => Width::Byte,
        store_funct3::SH => Width::Half,
        store_funct3::SW => Width::Word,
        _ => return None,
    })
}

fn csr_op(funct3: u32) -> Option<(CsrOp, bool)> {
    Some(match funct3 {
        csr_funct3::CSRRW => (CsrOp::ReadWrite, false),
        csr_funct3::CSRRS => (CsrOp::ReadSet, false),
        csr_funct3::CSRRC => (CsrOp::ReadClear, false),
        csr_funct3::CSRRWI => (CsrOp::ReadWrite, true),
        csr_funct3::CSRRSI => (CsrOp::ReadSet, true),
        csr_funct3::CSRRCI => (CsrOp::ReadClear, true),
        _ => return None,
    })
}

/// Decodes one raw 32-bit instruction word fetched from `pc`.
///
/// Always returns a fully-formed [`Instruction`]; unrecognized encodings
/// come back as [`Kind::Illegal`] rather than an error.
#[must_use]
pub fn decode(raw: u32, pc: u32) -> Instruction {
    let opcode = raw.opcode();
    let funct3 = raw.funct3();
    let funct7 = raw.funct7();
    let rd = raw.rd() as u8;
    let rs1 = raw.rs1() as u8;
    let rs2 = raw.rs2() as u8;

    let (kind, dest) = match opcode {
        OP_REG => match alu_op(funct3, funct7, true) {
            Some(op) => (Kind::RType { op, rs1, rs2 }, Some(rd)),
            None => (Kind::Illegal { raw }, None),
        },
        OP_IMM => match alu_op(funct3, funct7, false) {
            // SLLI/SRLI/SRAI encode their shift amount in rs2's bit position,
            // not the full I-immediate; the execute stage masks to 5 bits
            // regardless, so decoding the raw immediate is sufficient.
            Some(op) => (
                Kind::IType {
                    op,
                    rs1,
                    imm: imm_i(raw),
                },
                Some(rd),
            ),
            None => (Kind::Illegal { raw }, None),
        },
        OP_LOAD => match load_width(funct3) {
            Some((width, signed)) => (
                Kind::Load {
                    width,
                    signed,
                    rs1,
                    imm: imm_i(raw),
                },
                Some(rd),
            ),
            None => (Kind::Illegal { raw }, None),
        },
        OP_STORE => match store_width(funct3) {
            Some(width) => (
                Kind::Store {
                    width,
                    rs1,
                    rs2,
                    imm: imm_s(raw),
                },
                None,
            ),
            None => (Kind::Illegal { raw }, None),
        },
        OP_LUI => (Kind::Lui { imm: imm_u(raw) }, Some(rd)),
        OP_AUIPC => (Kind::Auipc { imm: imm_u(raw) }, Some(rd)),
        OP_BRANCH => match branch_predicate(funct3) {
            Some(pred) => (
                Kind::Branch {
                    pred,
                    rs1,
                    rs2,
                    imm: imm_b(raw),
                },
                None,
            ),
            None => (Kind::Illegal { raw }, None),
        },
        OP_JAL => (Kind::Jal { imm: imm_j(raw) }, Some(rd)),
        OP_JALR if funct3 == 0 => (
            Kind::Jalr {
                rs1,
                imm: imm_i(raw),
            },
            Some(rd),
        ),
        OP_JALR => (Kind::Illegal { raw }, None),
        OP_MISC_MEM => match funct3 {
            misc_mem_funct3::FENCE => (Kind::System(SystemOp::Fence), None),
            misc_mem_funct3::FENCE_I => (Kind::System(SystemOp::FenceI), None),
            _ => (Kind::Illegal { raw }, None),
        },
        OP_SYSTEM => decode_system(raw, funct3, rs1, rd),
        _ => (Kind::Illegal { raw }, None),
    };

    Instruction {
        header: Header { pc, rd: dest },
        kind,
        result: ResultSlot::None,
        mnemonic: None,
    }
}

fn decode_system(raw: u32, funct3: u32, rs1: u8, rd: u8) -> (Kind, Option<u8>) {
    if funct3 == 0 {
        return match raw {
            system::ECALL => (Kind::System(SystemOp::Ecall), None),
            system::EBREAK => (Kind::System(SystemOp::Ebreak), None),
            system::MRET => (Kind::System(SystemOp::Mret), None),
            _ => (Kind::Illegal { raw }, None),
        };
    }
    let Some((op, immediate_source)) = csr_op(funct3) else {
        return (Kind::Illegal { raw }, None);
    };
    let source = if immediate_source {
        CsrSource::Immediate(rs1)
    } else {
        CsrSource::Register(rs1)
    };
    (
        Kind::Csr {
            op,
            addr: raw.csr() as u16,
            source,
        },
        Some(rd),
    )
}
