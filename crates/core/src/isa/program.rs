//! The instruction source the fetch stage draws from.
//!
//! Two feeders are modeled, matching the two ways a program can be handed
//! to this simulator: a pre-decoded table addressed by `pc / 4` (the
//! textual-assembly path, whose mnemonic parsing is an external
//! collaborator this crate never implements) and raw bytes decoded on
//! demand from the bus (the binary-image path, seeded by an external ELF
//! loader). Both feeders honor a taken control transfer's redirected PC
//! identically: the assembly table is re-indexed by the new PC exactly as
//! the binary path re-fetches from it, so a flush behaves the same
//! regardless of which feeder supplied the program. See `DESIGN.md` for why
//! this was chosen over the alternative, feeder-specific flush behavior.

use super::decode;
use super::instruction::{Header, Instruction};
use crate::soc::Bus;

/// Where the pipeline's fetch stage draws instructions from.
pub enum Program {
    /// A pre-decoded, fixed-length instruction table. `pc / 4` indexes into
    /// it; an out-of-range index means the source is exhausted.
    Assembly(Vec<Instruction>),
    /// Decode four bytes from the bus at `pc` on every fetch. Never reports
    /// itself exhausted: a binary image occupies the address space up to
    /// the configured memory size, and halting is instead driven by
    /// `EBREAK` or the cycle budget.
    Binary,
}

impl Program {
    /// Fetches the instruction at `pc`, or `None` if the source is
    /// exhausted at this address.
    #[must_use]
    pub fn fetch(&self, pc: u32, bus: &Bus) -> Option<Instruction> {
        match self {
            Self::Assembly(table) => {
                let idx = usize::try_from(pc / 4).ok()?;
                table.get(idx).map(|template| Instruction {
                    header: Header {
                        pc,
                        rd: template.header.rd,
                    },
                    ..*template
                })
            }
            Self::Binary => {
                let raw = bus.load(pc, super::instruction::Width::Word, false);
                Some(decode::decode(raw, pc))
            }
        }
    }

    /// Whether the fetch source has run out of instructions at `pc`,
    /// independent of pipeline occupancy.
    #[must_use]
    pub fn is_exhausted(&self, pc: u32) -> bool {
        match self {
            Self::Assembly(table) => usize::try_from(pc / 4).is_ok_and(|idx| idx >= table.len()),
            Self::Binary => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::instruction::{AluOp, Kind, ResultSlot};

    fn addi(rd: u8, rs1: u8, imm: i32) -> Instruction {
        Instruction {
            header: Header { pc: 0, rd: Some(rd) },
            kind: Kind::IType { op: AluOp::Add, rs1, imm },
            result: ResultSlot::None,
            mnemonic: Some("ADDI"),
        }
    }

    #[test]
    fn assembly_feeder_indexes_by_pc_over_four() {
        let prog = Program::Assembly(vec![addi(1, 0, 1), addi(2, 0, 2)]);
        let bus = Bus::new(64, 0x1000_0000, 0x0200_0000, 1);
        let second = prog.fetch(4, &bus).unwrap();
        assert_eq!(second.header.pc, 4);
        assert!(matches!(second.kind, Kind::IType { imm: 2, .. }));
    }

    #[test]
    fn assembly_feeder_reports_exhaustion_past_the_table() {
        let prog = Program::Assembly(vec![addi(1, 0, 1)]);
        assert!(prog.is_exhausted(4));
        assert!(!prog.is_exhausted(0));
    }

    #[test]
    fn binary_feeder_never_reports_exhaustion() {
        let prog = Program::Binary;
        assert!(!prog.is_exhausted(0xFFFF_FFF0));
    }
}
