//! Interrupt controller: decides whether a pending, enabled interrupt
//! should preempt the next fetch.
//!
//! Machine-mode only, so delivery reduces to a single global gate
//! (`mstatus.MIE`) and a fixed three-way priority among the standard
//! interrupt sources. Level-triggered: a source stays pending for as long
//! as its producer (CLINT, or a guest write to `mip`) keeps the bit set,
//! and is naturally re-offered every tick until the handler clears it.

use crate::common::error::Trap;
use crate::core::csr::{CsrBank, int_bits};

/// Gates and prioritizes the three standard machine-mode interrupt sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptController;

impl InterruptController {
    /// Builds a controller. Stateless: all pending/enabled state lives in
    /// the CSR bank's `mie`/`mip`, so there is nothing to construct.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the interrupt to deliver this tick, if any.
    ///
    /// `None` if `mstatus.MIE` is clear or no enabled source is pending.
    /// Otherwise the highest-priority source among external, software, and
    /// timer (in that order), matching the standard machine-mode
    /// tie-break order.
    #[must_use]
    pub fn deliverable(&self, csr: &CsrBank) -> Option<Trap> {
        if !csr.mstatus_mie() {
            return None;
        }
        let ready = csr.pending_enabled_interrupts();
        if ready & int_bits::MEIP != 0 {
            Some(Trap::ExternalInterrupt)
        } else if ready & int_bits::MSIP != 0 {
            Some(Trap::SoftwareInterrupt)
        } else if ready & int_bits::MTIP != 0 {
            Some(Trap::TimerInterrupt)
        } else {
            None
        }
    }
}
