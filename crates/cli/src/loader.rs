//! ELF image loading: the external collaborator spec.md §1 calls out as
//! deliberately outside the core crate's architectural model.
//!
//! Parses a 32-bit RISC-V ELF executable with `object` and copies every
//! `PT_LOAD` segment to its virtual address in the simulator's bus,
//! byte-by-byte through [`Bus::store`] — the same entry point the pipeline's
//! own Memory stage uses, so a loaded segment that happens to land in the
//! UART or CLINT aperture is routed exactly as architecturally specified
//! rather than silently bypassing it.

use object::{Object, ObjectSegment};
use rv32pipe_core::isa::instruction::Width;
use rv32pipe_core::soc::Bus;
use thiserror::Error;

/// Failures loading an ELF image, distinct from the architectural
/// [`rv32pipe_core::common::error::Trap`] taxonomy: these reject the image
/// before the simulator ever sees an instruction.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// `object` could not parse the file as a supported ELF image.
    #[error("malformed ELF image: {0}")]
    Malformed(#[from] object::Error),
    /// A segment's virtual address or entry point does not fit in 32 bits,
    /// which this RV32I simulator's flat address space cannot represent.
    #[error("address {0:#x} exceeds the 32-bit address space")]
    AddressOutOfRange(u64),
}

/// What the image asked the simulator to do: where execution begins.
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage {
    /// The ELF entry point, to seed the program counter.
    pub entry: u32,
}

fn as_u32(addr: u64) -> Result<u32, LoaderError> {
    u32::try_from(addr).map_err(|_| LoaderError::AddressOutOfRange(addr))
}

/// Parses `bytes` as an ELF image and copies its loadable segments into
/// `bus`, returning the entry point.
///
/// Only segment *contents* are copied; BSS-style zero-fill past a
/// segment's file size is left at the bus's already-zeroed reset value,
/// since [`rv32pipe_core::soc::mem::Memory`] starts zero-filled.
pub fn load_elf(bus: &mut Bus, bytes: &[u8]) -> Result<LoadedImage, LoaderError> {
    let file = object::File::parse(bytes)?;

    for segment in file.segments() {
        let base = as_u32(segment.address())?;
        let data = segment.data()?;
        for (offset, byte) in data.iter().enumerate() {
            let addr = base.wrapping_add(offset as u32);
            let _ = bus.store(addr, Width::Byte, u32::from(*byte));
        }
    }

    Ok(LoadedImage {
        entry: as_u32(file.entry())?,
    })
}
