//! [`Simulator`]: owns the pipeline, the bus, and the instruction source,
//! and drives the per-cycle bookkeeping the pipeline itself does not own.
//!
//! [`crate::core::pipeline::Pipeline::tick`] advances the five stages and
//! `mcycle`/`minstret`, but it does not hold the bus — the CLINT tick, the
//! resulting `mip.MTIP`/`mip.MSIP` sync, and the `time` shadow sync all
//! happen here, once per cycle, before the pipeline's fetch stage polls the
//! interrupt controller (spec.md §4.7: "the IC is polled and CLINT ticked
//! before each fetch").

use crate::config::Config;
use crate::core::csr::int_bits;
use crate::core::pipeline::{Pipeline, TickEffects};
use crate::isa::instruction::{Kind, SystemOp};
use crate::isa::program::Program;
use crate::soc::Bus;
use crate::stats::SimStats;

/// Why [`Simulator::run`] stopped ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The fetch source ran out of instructions and every inter-stage latch
    /// was idle for one full tick (spec.md §4.7(a)).
    Exhausted,
    /// An `EBREAK` retired while [`crate::config::PipelineConfig::halt_on_ebreak`]
    /// was set (spec.md §4.7(b)).
    Ebreak,
    /// The configured cycle budget was reached before either of the above
    /// (spec.md §4.7(c)); the run is a clean halt, not a failure.
    CycleBudget,
}

/// The final state of a run, handed back to the caller (spec.md §6,
/// "Exit / completion").
#[derive(Debug, Clone)]
pub struct ExitReport {
    /// Total ticks advanced.
    pub cycles: u64,
    /// Count of non-bubble instructions retired.
    pub instructions_retired: u64,
    /// Count of decode-stage stall ticks.
    pub stalls: u64,
    /// Count of flushed (speculatively-fetched) decode slots.
    pub flushes: u64,
    /// Count of exceptions and interrupts delivered.
    pub traps_taken: u64,
    /// Why the run stopped.
    pub halt_reason: HaltReason,
    /// A snapshot of all 32 integer registers (`x0` included, always 0).
    pub registers: [u32; 32],
    /// The program counter at halt.
    pub pc: u32,
    /// Bytes transmitted to the UART over the run, in emission order.
    pub uart_output: Vec<u8>,
}

/// Owns a [`Pipeline`], a [`Bus`], and an instruction [`Program`]; the
/// single driver spec.md §5 describes as owning every shared resource.
pub struct Simulator {
    pipeline: Pipeline,
    bus: Bus,
    program: Program,
    config: Config,
    stats: SimStats,
}

impl Simulator {
    /// Builds a simulator against `program`, with the bus sized and mapped
    /// per `config`.
    #[must_use]
    pub fn new(config: Config, program: Program) -> Self {
        let bus = Bus::new(
            config.memory.ram_size,
            config.devices.uart_base,
            config.devices.clint_base,
            config.devices.clint_divider,
        );
        Self {
            pipeline: Pipeline::new(),
            bus,
            program,
            config,
            stats: SimStats::default(),
        }
    }

    /// Builds a simulator over a binary image, loaded at address 0 and
    /// decoded on demand by the fetch stage (spec.md §6, binary-image form).
    #[must_use]
    pub fn with_binary_image(config: Config, image: &[u8]) -> Self {
        let mut sim = Self::new(config, Program::Binary);
        sim.bus.load_image(image);
        sim
    }

    /// The pipeline, for reporting and test assertions.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// A mutable handle to the pipeline, for scenario setup that seeds
    /// register or CSR state before the first tick.
    pub const fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// The bus, for reporting and test assertions.
    #[must_use]
    pub const fn bus(&self) -> &Bus {
        &self.bus
    }

    /// A mutable handle to the bus, for scenario setup that pre-seeds RAM.
    pub const fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Accumulated run statistics so far.
    #[must_use]
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Advances the simulator by exactly one cycle: ticks the CLINT, syncs
    /// its lines into `mip` and the `time` shadow, then ticks the pipeline.
    /// Exposed directly so tests can drive the machine tick-by-tick and
    /// assert on intermediate state; [`Self::run`] is a thin loop over this.
    pub fn tick(&mut self) -> TickEffects {
        let timer_line = self.bus.tick_clint();
        let software_line = self.bus.software_interrupt_pending();
        let mtime_low = self.bus.mtime_low();

        let csr = self.pipeline.csr_mut();
        csr.set_mip_bit(int_bits::MTIP, timer_line);
        csr.set_mip_bit(int_bits::MSIP, software_line);
        csr.sync_time(mtime_low);

        let effects = self.pipeline.tick(&self.program, &mut self.bus);

        self.stats.cycles += 1;
        if effects.stalled {
            self.stats.stalls += 1;
            tracing::trace!(cycle = self.stats.cycles, "decode stall");
        }
        if effects.flushed {
            self.stats.flushes += 1;
            tracing::debug!(cycle = self.stats.cycles, "pipeline flush");
        }
        if effects.trap_taken {
            self.stats.traps_taken += 1;
            tracing::debug!(cycle = self.stats.cycles, "trap delivered");
        }
        if let Some(retired) = effects.retired {
            if !retired.is_bubble() {
                self.stats.instructions_retired += 1;
                tracing::trace!(
                    cycle = self.stats.cycles,
                    pc = retired.header.pc,
                    mnemonic = retired.mnemonic.unwrap_or("?"),
                    "retired"
                );
            }
        }
        tracing::trace!(cycle = self.stats.cycles, pc = self.pipeline.rf().read_pc(), "tick");

        effects
    }

    /// Runs until one of the three halt conditions of spec.md §4.7 is met,
    /// then returns the accumulated [`ExitReport`]. The halt is idempotent:
    /// calling [`Self::tick`] again after a halt would simply keep
    /// re-presenting bubbles (or re-exceeding the budget), so nothing here
    /// needs latching beyond the loop's own exit.
    pub fn run(&mut self) -> ExitReport {
        let halt_reason = loop {
            if self.stats.cycles >= self.config.pipeline.cycle_budget {
                tracing::debug!(budget = self.config.pipeline.cycle_budget, "cycle budget reached");
                break HaltReason::CycleBudget;
            }

            let effects = self.tick();

            if self.config.pipeline.halt_on_ebreak {
                if let Some(retired) = effects.retired {
                    if matches!(retired.kind, Kind::System(SystemOp::Ebreak)) {
                        break HaltReason::Ebreak;
                    }
                }
            }

            let pc = self.pipeline.rf().read_pc();
            if self.pipeline.all_latches_idle() && self.program.is_exhausted(pc) {
                break HaltReason::Exhausted;
            }
        };
        self.exit_report(halt_reason)
    }

    fn exit_report(&self, halt_reason: HaltReason) -> ExitReport {
        ExitReport {
            cycles: self.stats.cycles,
            instructions_retired: self.stats.instructions_retired,
            stalls: self.stats.stalls,
            flushes: self.stats.flushes,
            traps_taken: self.stats.traps_taken,
            halt_reason,
            registers: self.pipeline.rf().snapshot(),
            pc: self.pipeline.rf().read_pc(),
            uart_output: self.bus.uart_output().to_vec(),
        }
    }
}
