pub mod builder;
pub mod code;
pub mod emit;
pub mod env;
pub mod handle;
pub mod lower;
pub mod regalloc;
pub mod runtime;
pub mod span;
pub mod symbols;
pub mod tree;
pub mod types;
