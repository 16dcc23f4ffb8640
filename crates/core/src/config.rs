//! Configuration for the simulator.
//!
//! Mirrors the teacher's split between baseline hardware constants and a
//! deserializable configuration struct: defaults reproduce the bit-exact
//! addresses and behavior mandated by the external interface contract, and
//! a caller may override them via JSON when embedding the simulator.

use serde::Deserialize;

/// Baseline hardware constants used when not explicitly overridden.
mod defaults {
    /// Byte-size of the flat backing memory store.
    pub const RAM_SIZE: usize = 16 * 1024 * 1024;

    /// Base address of the UART MMIO aperture.
    pub const UART_BASE: u32 = 0x1000_0000;

    /// Base address of the CLINT MMIO aperture.
    pub const CLINT_BASE: u32 = 0x0200_0000;

    /// `mtime` advances by one tick every `CLINT_DIVIDER` pipeline cycles.
    pub const CLINT_DIVIDER: u32 = 1;

    /// Cycle budget applied when the caller does not specify one.
    pub const CYCLE_BUDGET: u64 = 1_000_000;
}

/// Top-level simulator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Memory subsystem configuration.
    pub memory: MemoryConfig,
    /// Peripheral base-address configuration.
    pub devices: DeviceConfig,
    /// Pipeline behavior configuration.
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            devices: DeviceConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Backing-store sizing.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size in bytes of the flat byte-addressable store.
    pub ram_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: defaults::RAM_SIZE,
        }
    }
}

/// Peripheral MMIO base addresses.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base address of the UART aperture (`0x10000000` in the bit-exact map).
    pub uart_base: u32,
    /// Base address of the CLINT aperture (`0x02000000` in the bit-exact map).
    pub clint_base: u32,
    /// Number of pipeline cycles per CLINT `mtime` increment.
    pub clint_divider: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            uart_base: defaults::UART_BASE,
            clint_base: defaults::CLINT_BASE,
            clint_divider: defaults::CLINT_DIVIDER,
        }
    }
}

/// Pipeline-level behavior toggles.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cycle budget after which the pipeline halts regardless of progress.
    pub cycle_budget: u64,
    /// Whether a retired `EBREAK` halts the simulator (in addition to
    /// entering its trap handler).
    pub halt_on_ebreak: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cycle_budget: defaults::CYCLE_BUDGET,
            halt_on_ebreak: false,
        }
    }
}
