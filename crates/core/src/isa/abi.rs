//! ABI register names, used only for trace/diagnostic rendering.

/// The conventional ABI name for each of the 32 integer registers.
pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Returns the ABI name for a register index, or `"?"` if out of range.
#[must_use]
pub fn name(index: u8) -> &'static str {
    REGISTER_NAMES.get(index as usize).copied().unwrap_or("?")
}
