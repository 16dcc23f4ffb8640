//! Run-time metrics accumulated while the pipeline ticks.

/// Counters accumulated over the lifetime of a [`crate::sim::simulator::Simulator`] run.
///
/// Exposed verbatim in the [`crate::sim::simulator::ExitReport`] returned when the
/// pipeline halts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimStats {
    /// Total ticks advanced, including stall and flush-bubble cycles.
    pub cycles: u64,
    /// Count of non-bubble instructions that reached Writeback.
    pub instructions_retired: u64,
    /// Count of ticks in which the decode stage re-presented its input due
    /// to a RAW hazard against `lDX`/`lXM`.
    pub stalls: u64,
    /// Count of taken branches, jumps, and trap entries that flushed the
    /// speculatively-fetched decode slot.
    pub flushes: u64,
    /// Count of exceptions and interrupts the trap controller delivered.
    pub traps_taken: u64,
}

impl SimStats {
    /// Prints a short human-readable summary to stdout.
    ///
    /// Cycle counts are guarded against division by zero so a run that
    /// halts immediately still produces a report instead of panicking.
    pub fn print(&self) {
        let cycles = self.cycles.max(1);
        println!("--- simulation summary ---");
        println!("cycles:              {}", self.cycles);
        println!("instructions retired: {}", self.instructions_retired);
        println!("stalls:              {}", self.stalls);
        println!("flushes:             {}", self.flushes);
        println!("traps taken:         {}", self.traps_taken);
        #[allow(clippy::cast_precision_loss)]
        let ipc = self.instructions_retired as f64 / cycles as f64;
        println!("IPC:                 {ipc:.3}");
    }
}
