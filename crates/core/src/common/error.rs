//! Trap taxonomy and structural-error types.
//!
//! [`Trap`] is the architectural mechanism described in the glossary: a
//! unified representation of synchronous exceptions and asynchronous
//! interrupts that [`crate::core::cpu::trap::TrapController`] converts into
//! CSR state and a handler redirect. It is never an `Err` the pipeline
//! propagates — it is a value the execution unit and interrupt controller
//! produce and the trap controller consumes.
//!
//! [`SimError`] is the separate, much smaller taxonomy of structural
//! failures: things wrong with the simulator's own configuration rather
//! than with the guest program it is running.

use thiserror::Error;

/// A synchronous exception or asynchronous interrupt pending delivery.
///
/// Exception variants carry the faulting program counter (`pc`) and, where
/// meaningful, the value that lands in `mtval`. Interrupt variants carry no
/// payload: `mtval` is always zero for the three standard interrupts this
/// simulator models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trap {
    /// Instruction fetch address was not 4-byte aligned.
    #[error("instruction address misaligned at {pc:#010x}")]
    InstructionMisaligned {
        /// Program counter of the faulting fetch.
        pc: u32,
    },
    /// Fetch could not be serviced (unused by this simulator; MEM never faults).
    #[error("instruction access fault at {pc:#010x}")]
    InstructionAccessFault {
        /// Program counter of the faulting fetch.
        pc: u32,
    },
    /// The execute stage was handed an instruction it cannot decode.
    #[error("illegal instruction {raw:#010x} at {pc:#010x}")]
    IllegalInstruction {
        /// Program counter of the offending instruction.
        pc: u32,
        /// The raw 32-bit word that failed to decode to a known operation.
        raw: u32,
    },
    /// `EBREAK` retired.
    #[error("breakpoint at {pc:#010x}")]
    Breakpoint {
        /// Program counter of the `EBREAK`.
        pc: u32,
    },
    /// A load address was not naturally aligned (unused; alignment is not enforced).
    #[error("load address misaligned at {pc:#010x} (addr {addr:#010x})")]
    LoadMisaligned {
        /// Program counter of the load.
        pc: u32,
        /// Effective address of the load.
        addr: u32,
    },
    /// A load could not be serviced (unused; MEM never faults).
    #[error("load access fault at {pc:#010x} (addr {addr:#010x})")]
    LoadAccessFault {
        /// Program counter of the load.
        pc: u32,
        /// Effective address of the load.
        addr: u32,
    },
    /// A store address was not naturally aligned (unused; alignment is not enforced).
    #[error("store address misaligned at {pc:#010x} (addr {addr:#010x})")]
    StoreMisaligned {
        /// Program counter of the store.
        pc: u32,
        /// Effective address of the store.
        addr: u32,
    },
    /// A store could not be serviced (unused; MEM never faults).
    #[error("store access fault at {pc:#010x} (addr {addr:#010x})")]
    StoreAccessFault {
        /// Program counter of the store.
        pc: u32,
        /// Effective address of the store.
        addr: u32,
    },
    /// `ECALL` retired while the core pretended to run in user mode (unused;
    /// the core always executes as if permanently in machine mode).
    #[error("environment call from U-mode at {pc:#010x}")]
    EcallFromU {
        /// Program counter of the `ECALL`.
        pc: u32,
    },
    /// `ECALL` retired.
    #[error("environment call from M-mode at {pc:#010x}")]
    EcallFromM {
        /// Program counter of the `ECALL`.
        pc: u32,
    },
    /// Machine software interrupt, delivered via CLINT's `msip`.
    #[error("machine software interrupt")]
    SoftwareInterrupt,
    /// Machine timer interrupt, delivered via CLINT's compare-match.
    #[error("machine timer interrupt")]
    TimerInterrupt,
    /// Machine external interrupt.
    #[error("machine external interrupt")]
    ExternalInterrupt,
}

impl Trap {
    /// The mip/mie bit position used for the three interrupt variants.
    pub const SOFTWARE_BIT: u32 = 3;
    /// The mip/mie bit position for the timer interrupt.
    pub const TIMER_BIT: u32 = 7;
    /// The mip/mie bit position for the external interrupt.
    pub const EXTERNAL_BIT: u32 = 11;

    /// Whether this trap is an interrupt (`mcause` bit 31 set) rather than a
    /// synchronous exception.
    #[must_use]
    pub const fn is_interrupt(self) -> bool {
        matches!(
            self,
            Self::SoftwareInterrupt | Self::TimerInterrupt | Self::ExternalInterrupt
        )
    }

    /// The exception code or interrupt bit number occupying `mcause[30:0]`.
    #[must_use]
    pub const fn cause_code(self) -> u32 {
        match self {
            Self::InstructionMisaligned { .. } => 0,
            Self::InstructionAccessFault { .. } => 1,
            Self::IllegalInstruction { .. } => 2,
            Self::Breakpoint { .. } => 3,
            Self::LoadMisaligned { .. } => 4,
            Self::LoadAccessFault { .. } => 5,
            Self::StoreMisaligned { .. } => 6,
            Self::StoreAccessFault { .. } => 7,
            Self::EcallFromU { .. } => 8,
            Self::EcallFromM { .. } => 11,
            Self::SoftwareInterrupt => Self::SOFTWARE_BIT,
            Self::TimerInterrupt => Self::TIMER_BIT,
            Self::ExternalInterrupt => Self::EXTERNAL_BIT,
        }
    }

    /// The faulting program counter, used as `mepc` for synchronous
    /// exceptions. Interrupts use the next sequential PC instead (supplied
    /// separately by the caller), so this returns `None` for them.
    #[must_use]
    pub const fn pc(self) -> Option<u32> {
        match self {
            Self::InstructionMisaligned { pc }
            | Self::InstructionAccessFault { pc }
            | Self::IllegalInstruction { pc, .. }
            | Self::Breakpoint { pc }
            | Self::LoadMisaligned { pc, .. }
            | Self::LoadAccessFault { pc, .. }
            | Self::StoreMisaligned { pc, .. }
            | Self::StoreAccessFault { pc, .. }
            | Self::EcallFromU { pc }
            | Self::EcallFromM { pc } => Some(pc),
            Self::SoftwareInterrupt | Self::TimerInterrupt | Self::ExternalInterrupt => None,
        }
    }

    /// The value that lands in `mtval`. Zero for every trap this simulator
    /// actually raises; `addr` for the unused fault variants kept for
    /// taxonomy completeness.
    #[must_use]
    pub const fn tval(self) -> u32 {
        match self {
            Self::LoadMisaligned { addr, .. }
            | Self::LoadAccessFault { addr, .. }
            | Self::StoreMisaligned { addr, .. }
            | Self::StoreAccessFault { addr, .. } => addr,
            Self::IllegalInstruction { raw, .. } => raw,
            _ => 0,
        }
    }
}

/// Failures in the simulator's own configuration or ingress boundary,
/// distinct from architectural traps raised by the guest program.
#[derive(Debug, Error)]
pub enum SimError {
    /// `Config` JSON failed to parse.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}
