//! The five-stage orchestrator: fetches, decodes, executes, and retires one
//! instruction slot per stage per tick.
//!
//! Every stage reads the latch state left by the *previous* tick and
//! publishes into a freshly computed "next" value; the swap happens once,
//! at the end of [`Pipeline::tick`]. Stages are evaluated in the order
//! W, M, X, D, F rather than the textbook F..W order. Two correctness
//! properties depend on this:
//!
//! - A store's value register is read fresh by Memory, after Writeback has
//!   applied this tick's retirement — so a producer retiring in the same
//!   tick a dependent store reaches Memory is visible without a stall (see
//!   [`crate::isa::instruction::Kind::sources`]'s store carve-out).
//! - A taken branch, jump, or trap resolved at Execute this tick is visible
//!   to Decode and Fetch later in the *same* tick, collapsing flush
//!   delivery to exactly one discarded slot instead of spreading it across
//!   two ticks. `DESIGN.md` records why this reading of the flush timing
//!   was chosen over the alternative.
//!
//! Because every stage only ever reads the previous tick's latches (never
//! one written earlier in this same tick), the net result is identical to
//! a literal double-buffered F..W evaluation for every property except the
//! two above, which this ordering exists to get right.

use crate::common::error::Trap;
use crate::core::csr::{CsrBank, int_bits};
use crate::core::exe;
use crate::core::hazard;
use crate::core::ic::InterruptController;
use crate::core::rf::RegisterFile;
use crate::core::trap::TrapController;
use crate::isa::instruction::{Instruction, ResultSlot};
use crate::isa::program::Program;
use crate::soc::{Bus, ClintEffect};

/// What happened during one [`Pipeline::tick`] call, for the driver's
/// statistics and halt-condition checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickEffects {
    /// The instruction (possibly a bubble) that reached Writeback this
    /// tick.
    pub retired: Option<Instruction>,
    /// Whether Decode re-presented its input this tick due to a RAW hazard.
    pub stalled: bool,
    /// Whether a taken branch, jump, trap entry, or `MRET` flushed the
    /// speculatively-fetched Decode slot this tick.
    pub flushed: bool,
    /// Whether a synchronous exception or interrupt was delivered this
    /// tick.
    pub trap_taken: bool,
}

/// Owns the register file, CSR bank, trap/interrupt controllers, and the
/// four inter-stage latches `lFD`/`lDX`/`lXM`/`lMW`.
pub struct Pipeline {
    rf: RegisterFile,
    csr: CsrBank,
    ic: InterruptController,
    trap: TrapController,
    lfd: Instruction,
    ldx: Instruction,
    lxm: Instruction,
    lmw: Instruction,
}

impl Pipeline {
    /// Builds a pipeline with every register and latch at its reset state:
    /// all GPRs and the PC zero, `misa` at its fixed reset value, and every
    /// latch a bubble.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rf: RegisterFile::new(),
            csr: CsrBank::new(),
            ic: InterruptController::new(),
            trap: TrapController::new(),
            lfd: Instruction::bubble(),
            ldx: Instruction::bubble(),
            lxm: Instruction::bubble(),
            lmw: Instruction::bubble(),
        }
    }

    /// The register file, for reporting and test assertions.
    #[must_use]
    pub const fn rf(&self) -> &RegisterFile {
        &self.rf
    }

    /// A mutable handle to the register file, for test and scenario setup
    /// that seeds initial values before the first tick.
    pub const fn rf_mut(&mut self) -> &mut RegisterFile {
        &mut self.rf
    }

    /// The CSR bank, for reporting and test assertions.
    #[must_use]
    pub const fn csr(&self) -> &CsrBank {
        &self.csr
    }

    /// A mutable handle to the CSR bank, for scenario setup.
    pub const fn csr_mut(&mut self) -> &mut CsrBank {
        &mut self.csr
    }

    /// Whether every inter-stage latch currently holds a bubble.
    #[must_use]
    pub const fn all_latches_idle(&self) -> bool {
        self.lfd.is_bubble() && self.ldx.is_bubble() && self.lxm.is_bubble() && self.lmw.is_bubble()
    }

    /// Advances the pipeline by one tick against `program` and `bus`,
    /// returning what happened this tick. The caller is responsible for
    /// ticking the CLINT and syncing its `time` shadow into the CSR bank;
    /// those two steps are cycle-aligned with this call but owned by the
    /// driver since the pipeline does not itself hold the bus.
    pub fn tick(&mut self, program: &Program, bus: &mut Bus) -> TickEffects {
        let mut effects = TickEffects::default();

        // lXM is about to be overwritten by the execute stage below; the
        // hazard check needs the value latched *before* this tick, so it
        // is snapshotted here rather than read off `self.lxm` afterward.
        let lxm_before_tick = self.lxm;

        self.writeback(&mut effects);
        let next_lmw = self.memory_stage(bus);
        let flush_target = self.execute_stage(&mut effects);
        let (next_ldx, consumed_fd) =
            self.decode_stage(flush_target, &lxm_before_tick, &mut effects);
        let next_lfd = self.fetch_stage(program, bus, flush_target, consumed_fd, &mut effects);

        self.lmw = next_lmw;
        self.ldx = next_ldx;
        self.lfd = next_lfd;

        self.csr.tick_cycle();
        effects
    }

    fn writeback(&mut self, effects: &mut TickEffects) {
        let retiring = self.lmw;
        if !retiring.is_bubble() {
            match retiring.result {
                ResultSlot::Value(v) => {
                    if let Some(rd) = retiring.header.rd {
                        self.rf.write(rd, v);
                    }
                }
                ResultSlot::Jump { link, .. } => {
                    if let Some(rd) = retiring.header.rd {
                        self.rf.write(rd, link);
                    }
                }
                ResultSlot::CsrRequest {
                    op,
                    addr,
                    operand,
                    suppress_write,
                } => {
                    let old = self.csr.read(addr);
                    if !suppress_write {
                        self.csr
                            .write(addr, crate::core::csr::apply_op(op, old, operand));
                    }
                    if let Some(rd) = retiring.header.rd {
                        self.rf.write(rd, old);
                    }
                }
                ResultSlot::None
                | ResultSlot::Branch { .. }
                | ResultSlot::LoadRequest { .. }
                | ResultSlot::StoreRequest { .. }
                | ResultSlot::TrapRequest(_)
                | ResultSlot::Return => {}
            }
            self.csr.tick_instret();
        }
        effects.retired = Some(retiring);
    }

    fn memory_stage(&mut self, bus: &mut Bus) -> Instruction {
        let mut instr = self.lxm;
        if !instr.is_bubble() {
            match instr.result {
                ResultSlot::LoadRequest { addr, width, signed } => {
                    instr.result = ResultSlot::Value(bus.load(addr, width, signed));
                }
                ResultSlot::StoreRequest { addr, width, rs2 } => {
                    let value = self.rf.read(rs2);
                    if bus.store(addr, width, value) == ClintEffect::ClearTimerPending {
                        self.csr.set_mip_bit(int_bits::MTIP, false);
                    }
                }
                _ => {}
            }
        }
        instr
    }

    fn execute_stage(&mut self, effects: &mut TickEffects) -> Option<u32> {
        let mut instr = self.ldx;
        let mut flush_target = None;
        if !instr.is_bubble() {
            let (rs1, rs2) = instr.kind.sources();
            let rs1_val = rs1.map_or(0, |r| self.rf.read(r));
            let rs2_val = rs2.map_or(0, |r| self.rf.read(r));
            let result = exe::execute(&instr, rs1_val, rs2_val);
            instr.result = result;
            flush_target = self.resolve_control_transfer(result, instr.header.pc, effects);
        }
        self.lxm = instr;
        flush_target
    }

    fn resolve_control_transfer(
        &mut self,
        result: ResultSlot,
        pc: u32,
        effects: &mut TickEffects,
    ) -> Option<u32> {
        match result {
            ResultSlot::Branch { taken: true, target } | ResultSlot::Jump { target, .. } => {
                effects.flushed = true;
                Some(target)
            }
            ResultSlot::TrapRequest(trap) => {
                effects.flushed = true;
                effects.trap_taken = true;
                Some(self.trap.enter(&mut self.csr, trap, pc))
            }
            ResultSlot::Return => {
                effects.flushed = true;
                Some(self.trap.mret(&mut self.csr))
            }
            _ => None,
        }
    }

    fn decode_stage(
        &mut self,
        flush_target: Option<u32>,
        lxm_before_tick: &Instruction,
        effects: &mut TickEffects,
    ) -> (Instruction, bool) {
        if flush_target.is_some() {
            return (Instruction::bubble(), true);
        }
        let candidate = self.lfd;
        if candidate.is_bubble() {
            return (Instruction::bubble(), true);
        }
        let sources = candidate.kind.sources();
        if hazard::stalls(sources, &self.ldx, lxm_before_tick) {
            effects.stalled = true;
            (Instruction::bubble(), false)
        } else {
            (candidate, true)
        }
    }

    fn fetch_stage(
        &mut self,
        program: &Program,
        bus: &Bus,
        flush_target: Option<u32>,
        consumed_fd: bool,
        effects: &mut TickEffects,
    ) -> Instruction {
        let pc = self.rf.read_pc();
        if let Some(trap) = self.ic.deliverable(&self.csr) {
            let handler = self.trap.enter(&mut self.csr, trap, pc);
            self.rf.write_pc(handler);
            effects.trap_taken = true;
            effects.flushed = true;
            return Instruction::bubble();
        }
        if let Some(target) = flush_target {
            self.rf.write_pc(target.wrapping_add(4));
            return program.fetch(target, bus).unwrap_or_else(Instruction::bubble);
        }
        if !consumed_fd {
            return self.lfd;
        }
        if program.is_exhausted(pc) {
            return Instruction::bubble();
        }
        self.rf.write_pc(pc.wrapping_add(4));
        program.fetch(pc, bus).unwrap_or_else(Instruction::bubble)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
