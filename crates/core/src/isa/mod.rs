//! RV32I instruction representation and binary decoding.
//!
//! Textual assembly parsing lives outside this crate (see the `cli`
//! crate's assembler collaborator); this module only needs to turn a raw
//! 32-bit encoding into the [`instruction::Instruction`] record the
//! pipeline consumes, and to expose the small set of bit-layout and
//! encoding constants the decoder and execute stage both need.

pub mod abi;
pub mod bits;
pub mod decode;
pub mod instruction;
pub mod opcodes;
pub mod program;
