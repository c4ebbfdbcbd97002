//! Misc VM
//!
//! Emulator for the abstract RISC machine: register file, byte-addressed
//! data memory, syscalls for I/O, and a garbage-collected heap.

pub mod heap;
pub mod machine;
pub mod ops;

pub use machine::{Exit, Machine, MachineConfig, VmError, MAX_FIELD_WIDTH};
