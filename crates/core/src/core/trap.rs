//! The machine-mode trap controller: unified entry for synchronous
//! exceptions and asynchronous interrupts, and `MRET` return.
//!
//! Narrowed from the teacher's S/M-mode split down to machine mode only:
//! there is no delegation, no double-fault detection, and `mtvec` is the
//! only vector register consulted.

use crate::common::error::Trap;
use crate::core::csr::{CsrBank, addr, mstatus_bits};

/// `mtvec` mode bit: 0 selects direct, 1 selects vectored.
const MTVEC_VECTORED: u32 = 0b1;

/// Enters and returns from the single machine-mode trap handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapController;

impl TrapController {
    /// Builds a controller. Stateless: every bit it touches lives in the
    /// CSR bank.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Delivers `trap`, saving `epc` (the faulting PC for a synchronous
    /// exception, or the PC the pipeline would otherwise have fetched
    /// next, for an interrupt) into `mepc`.
    ///
    /// Returns the PC the next fetch should redirect to.
    pub fn enter(&self, csr: &mut CsrBank, trap: Trap, epc: u32) -> u32 {
        let code = trap.cause_code();
        let cause = if trap.is_interrupt() {
            code | 0x8000_0000
        } else {
            code
        };

        csr.set_field(addr::MEPC, epc);
        csr.set_field(addr::MCAUSE, cause);
        csr.set_field(addr::MTVAL, trap.tval());

        let status = csr.field(addr::MSTATUS);
        let mie = status & mstatus_bits::MIE != 0;
        let mut next_status = status & !mstatus_bits::MIE;
        next_status = if mie {
            next_status | mstatus_bits::MPIE
        } else {
            next_status & !mstatus_bits::MPIE
        };
        next_status |= mstatus_bits::MPP_MASK;
        csr.set_field(addr::MSTATUS, next_status);

        let mtvec = csr.field(addr::MTVEC);
        let base = mtvec & !0b11;
        if trap.is_interrupt() && (mtvec & MTVEC_VECTORED) != 0 {
            base.wrapping_add(4 * code)
        } else {
            base
        }
    }

    /// Returns from the trap handler: restores `mstatus.MIE` from
    /// `mstatus.MPIE`, sets `MPIE`, clears `MPP`, and returns the saved
    /// `mepc` as the next fetch address.
    pub fn mret(&self, csr: &mut CsrBank) -> u32 {
        let status = csr.field(addr::MSTATUS);
        let mpie = status & mstatus_bits::MPIE != 0;
        let mut next_status = status & !mstatus_bits::MIE;
        if mpie {
            next_status |= mstatus_bits::MIE;
        }
        next_status |= mstatus_bits::MPIE;
        next_status &= !mstatus_bits::MPP_MASK;
        csr.set_field(addr::MSTATUS, next_status);
        csr.field(addr::MEPC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_pushes_mie_and_sets_mpp() {
        let mut csr = CsrBank::new();
        csr.set_field(addr::MSTATUS, mstatus_bits::MIE);
        let target = TrapController::new().enter(&mut csr, Trap::EcallFromM { pc: 0x100 }, 0x100);
        assert_eq!(target, 0);
        assert_eq!(csr.field(addr::MEPC), 0x100);
        assert_eq!(csr.field(addr::MCAUSE), 11);
        let status = csr.field(addr::MSTATUS);
        assert_eq!(status & mstatus_bits::MIE, 0);
        assert_ne!(status & mstatus_bits::MPIE, 0);
        assert_eq!(status & mstatus_bits::MPP_MASK, mstatus_bits::MPP_MASK);
    }

    #[test]
    fn direct_mode_ignores_cause_for_interrupts() {
        let mut csr = CsrBank::new();
        csr.set_field(addr::MTVEC, 0x8000_0000);
        let target = TrapController::new().enter(&mut csr, Trap::TimerInterrupt, 0x40);
        assert_eq!(target, 0x8000_0000);
        assert_eq!(csr.field(addr::MCAUSE), 0x8000_0007);
    }

    #[test]
    fn vectored_mode_offsets_by_cause_for_interrupts_only() {
        let mut csr = CsrBank::new();
        csr.set_field(addr::MTVEC, 0x8000_0000 | MTVEC_VECTORED);
        let target = TrapController::new().enter(&mut csr, Trap::TimerInterrupt, 0x40);
        assert_eq!(target, 0x8000_0000 + 4 * 7);

        let target = TrapController::new().enter(
            &mut csr,
            Trap::IllegalInstruction { pc: 0x40, raw: 0 },
            0x40,
        );
        assert_eq!(target, 0x8000_0000);
    }

    #[test]
    fn mret_restores_mie_from_mpie_and_clears_mpp() {
        let mut csr = CsrBank::new();
        csr.set_field(addr::MSTATUS, mstatus_bits::MPIE | mstatus_bits::MPP_MASK);
        csr.set_field(addr::MEPC, 0x1000);
        let target = TrapController::new().mret(&mut csr);
        assert_eq!(target, 0x1000);
        let status = csr.field(addr::MSTATUS);
        assert_ne!(status & mstatus_bits::MIE, 0);
        assert_ne!(status & mstatus_bits::MPIE, 0);
        assert_eq!(status & mstatus_bits::MPP_MASK, 0);
    }
}
