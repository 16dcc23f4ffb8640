//! The top-level simulation driver.
//!
//! Everything under [`crate::core`] and [`crate::soc`] is a pure component;
//! this module is the thin owner that wires them together, drives the
//! per-tick CLINT/CSR bookkeeping the pipeline itself does not own (see
//! [`crate::core::pipeline::Pipeline::tick`]'s doc comment), applies the
//! halt conditions of spec.md §4.7, and packages the final state into an
//! [`simulator::ExitReport`] for a caller (the `cli` crate, or a test) to
//! inspect.

pub mod simulator;
