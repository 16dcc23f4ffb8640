//! The execute unit: a pure function from a decoded instruction and the
//! live register values to a [`ResultSlot`].
//!
//! Nothing here touches memory or CSR state directly — a load/store becomes
//! a request the memory stage services, and a CSR op becomes a request the
//! writeback stage services. This keeps the unit a total, side-effect-free
//! function of its inputs, which is what lets the pipeline replay it
//! whenever a candidate re-presents itself after a stall.

use crate::common::error::Trap;
use crate::isa::instruction::{
    AluOp, BranchPredicate, CsrOp, CsrSource, Instruction, Kind, ResultSlot, SystemOp,
};

fn alu(op: AluOp, lhs: u32, rhs: u32) -> u32 {
    match op {
        AluOp::Add => lhs.wrapping_add(rhs),
        AluOp::Sub => lhs.wrapping_sub(rhs),
        AluOp::Sll => lhs.wrapping_shl(rhs & 0x1F),
        AluOp::Slt => u32::from((lhs as i32) < (rhs as i32)),
        AluOp::Sltu => u32::from(lhs < rhs),
        AluOp::Xor => lhs ^ rhs,
        AluOp::Srl => lhs.wrapping_shr(rhs & 0x1F),
        AluOp::Sra => ((lhs as i32).wrapping_shr(rhs & 0x1F)) as u32,
        AluOp::Or => lhs | rhs,
        AluOp::And => lhs & rhs,
    }
}

fn branch_taken(pred: BranchPredicate, lhs: u32, rhs: u32) -> bool {
    match pred {
        BranchPredicate::Eq => lhs == rhs,
        BranchPredicate::Ne => lhs != rhs,
        BranchPredicate::Lt => (lhs as i32) < (rhs as i32),
        BranchPredicate::Ge => (lhs as i32) >= (rhs as i32),
        BranchPredicate::Ltu => lhs < rhs,
        BranchPredicate::Geu => lhs >= rhs,
    }
}

/// Executes `instr` against the current register values, returning the
/// [`ResultSlot`] later stages will consume. `rs1`/`rs2` are already
/// resolved reads, taken by the caller before this call (the decode stage
/// owns the point at which the register file is sampled).
#[must_use]
pub fn execute(instr: &Instruction, rs1_val: u32, rs2_val: u32) -> ResultSlot {
    let pc = instr.header.pc;
    match instr.kind {
        Kind::Bubble => ResultSlot::None,
        Kind::RType { op, .. } => ResultSlot::Value(alu(op, rs1_val, rs2_val)),
        Kind::IType { op, imm, .. } => ResultSlot::Value(alu(op, rs1_val, imm as u32)),
        Kind::Load {
            width, signed, imm, ..
        } => ResultSlot::LoadRequest {
            addr: rs1_val.wrapping_add(imm as u32),
            width,
            signed,
        },
        Kind::Store { width, rs2, imm, .. } => ResultSlot::StoreRequest {
            addr: rs1_val.wrapping_add(imm as u32),
            width,
            rs2,
        },
        Kind::Lui { imm } => ResultSlot::Value(imm as u32),
        Kind::Auipc { imm } => ResultSlot::Value(pc.wrapping_add(imm as u32)),
        Kind::Branch { pred, imm, .. } => ResultSlot::Branch {
            taken: branch_taken(pred, rs1_val, rs2_val),
            target: pc.wrapping_add(imm as u32),
        },
        Kind::Jal { imm } => ResultSlot::Jump {
            target: pc.wrapping_add(imm as u32),
            link: pc.wrapping_add(4),
        },
        Kind::Jalr { imm, .. } => ResultSlot::Jump {
            target: rs1_val.wrapping_add(imm as u32) & !1,
            link: pc.wrapping_add(4),
        },
        Kind::System(SystemOp::Ecall) => ResultSlot::TrapRequest(Trap::EcallFromM { pc }),
        Kind::System(SystemOp::Ebreak) => ResultSlot::TrapRequest(Trap::Breakpoint { pc }),
        Kind::System(SystemOp::Mret) => ResultSlot::Return,
        Kind::System(SystemOp::Fence | SystemOp::FenceI) => ResultSlot::None,
        Kind::Csr { op, addr, source } => {
            let (operand, suppress_write) = match source {
                CsrSource::Register(rs1) => (rs1_val, false),
                CsrSource::Immediate(imm5) => {
                    (u32::from(imm5), imm5 == 0 && !matches!(op, CsrOp::ReadWrite))
                }
            };
            ResultSlot::CsrRequest {
                op,
                addr,
                operand,
                suppress_write,
            }
        }
        Kind::Illegal { raw } => ResultSlot::TrapRequest(Trap::IllegalInstruction { pc, raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::instruction::{Header, Width};

    fn instr(pc: u32, kind: Kind) -> Instruction {
        Instruction {
            header: Header { pc, rd: Some(1) },
            kind,
            result: ResultSlot::None,
            mnemonic: None,
        }
    }

    #[test]
    fn addi_adds_sign_extended_immediate() {
        let i = instr(0, Kind::IType { op: AluOp::Add, rs1: 2, imm: -1 });
        assert_eq!(execute(&i, 10, 0), ResultSlot::Value(9));
    }

    #[test]
    fn sub_wraps_on_underflow() {
        let i = instr(0, Kind::RType { op: AluOp::Sub, rs1: 1, rs2: 2 });
        assert_eq!(execute(&i, 0, 1), ResultSlot::Value(u32::MAX));
    }

    #[test]
    fn sra_preserves_sign() {
        let i = instr(0, Kind::IType { op: AluOp::Sra, rs1: 1, imm: 1 });
        assert_eq!(execute(&i, 0x8000_0000, 0), ResultSlot::Value(0xC000_0000));
    }

    #[test]
    fn branch_not_taken_reports_false() {
        let i = instr(100, Kind::Branch { pred: BranchPredicate::Eq, rs1: 1, rs2: 2, imm: 8 });
        assert_eq!(
            execute(&i, 1, 2),
            ResultSlot::Branch { taken: true, target: 108 }
        );
        assert_eq!(
            execute(&i, 1, 3),
            ResultSlot::Branch { taken: false, target: 108 }
        );
    }

    #[test]
    fn jal_links_to_pc_plus_four() {
        let i = instr(100, Kind::Jal { imm: 8 });
        assert_eq!(
            execute(&i, 0, 0),
            ResultSlot::Jump { target: 108, link: 104 }
        );
    }

    #[test]
    fn jalr_clears_low_bit() {
        let i = instr(100, Kind::Jalr { rs1: 1, imm: 5 });
        assert_eq!(
            execute(&i, 10, 0),
            ResultSlot::Jump { target: 14, link: 104 }
        );
    }

    #[test]
    fn load_computes_effective_address() {
        let i = instr(
            0,
            Kind::Load {
                width: Width::Word,
                signed: true,
                rs1: 1,
                imm: 16,
            },
        );
        assert_eq!(
            execute(&i, 1000, 0),
            ResultSlot::LoadRequest { addr: 1016, width: Width::Word, signed: true }
        );
    }

    #[test]
    fn csr_immediate_of_zero_suppresses_write_only_for_set_clear() {
        let i = instr(
            0,
            Kind::Csr {
                op: CsrOp::ReadSet,
                addr: 0x300,
                source: CsrSource::Immediate(0),
            },
        );
        assert_eq!(
            execute(&i, 0, 0),
            ResultSlot::CsrRequest {
                op: CsrOp::ReadSet,
                addr: 0x300,
                operand: 0,
                suppress_write: true,
            }
        );
    }

    #[test]
    fn csrrwi_with_zero_immediate_never_suppresses_the_write() {
        let i = instr(
            0,
            Kind::Csr {
                op: CsrOp::ReadWrite,
                addr: 0x300,
                source: CsrSource::Immediate(0),
            },
        );
        assert_eq!(
            execute(&i, 0, 0),
            ResultSlot::CsrRequest {
                op: CsrOp::ReadWrite,
                addr: 0x300,
                operand: 0,
                suppress_write: false,
            }
        );
    }

    #[test]
    fn ecall_raises_m_mode_trap_request() {
        let i = instr(0x40, Kind::System(SystemOp::Ecall));
        assert_eq!(
            execute(&i, 0, 0),
            ResultSlot::TrapRequest(Trap::EcallFromM { pc: 0x40 })
        );
    }

    #[test]
    fn illegal_instruction_carries_raw_word() {
        let i = instr(0x40, Kind::Illegal { raw: 0xFFFF_FFFF });
        assert_eq!(
            execute(&i, 0, 0),
            ResultSlot::TrapRequest(Trap::IllegalInstruction { pc: 0x40, raw: 0xFFFF_FFFF })
        );
    }
}
