//! The RAW hazard detector: a pure function from the decode-stage
//! candidate and the current occupancy of `lDX`/`lXM` to a stall decision.
//!
//! No forwarding exists in this machine, so any source register that
//! matches a still-in-flight destination must stall at decode until the
//! producer has retired. `lMW` is deliberately not consulted: by the time a
//! producer reaches writeback, its value is already committed to the
//! register file by the start of the tick in which a decode-stage consumer
//! reads it, per the writeback-before-memory ordering the pipeline enforces
//! within a single tick.

use crate::isa::instruction::Instruction;

/// Whether `destination` is a register a hazard check should care about:
/// populated, and not `x0` (writes to `x0` are architecturally invisible).
fn is_live(destination: Option<u8>) -> Option<u8> {
    destination.filter(|&r| r != 0)
}

/// Whether `producer` currently occupies its latch with a destination that
/// collides with one of the candidate's source registers.
fn collides(producer: &Instruction, sources: (Option<u8>, Option<u8>)) -> bool {
    let Some(dest) = is_live(producer.header.rd) else {
        return false;
    };
    sources.0 == Some(dest) || sources.1 == Some(dest)
}

/// Decides whether the decode-stage candidate must stall.
///
/// `sources` is the candidate's `(rs1, rs2)` pair from
/// [`crate::isa::instruction::Kind::sources`]. `in_execute` and `in_memory`
/// are the instructions currently latched in `lDX` and `lXM` respectively,
/// as of the start of this tick.
#[must_use]
pub fn stalls(
    sources: (Option<u8>, Option<u8>),
    in_execute: &Instruction,
    in_memory: &Instruction,
) -> bool {
    collides(in_execute, sources) || collides(in_memory, sources)
}
