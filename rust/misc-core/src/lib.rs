//! Misc Core
//!
//! Instruction set, register roles, and syscall numbers of the abstract RISC
//! target, shared by the compiler and the emulator.

pub mod risc;

pub use risc::{Instruction, OpCode, Syscall, WORD_SIZE};
