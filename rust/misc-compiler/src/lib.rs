//! Misc Compiler
//!
//! RISC backend for the Misc expression language: lowers a typed,
//! symbol-resolved tree into an instruction stream for the abstract RISC
//! machine described in `misc-core`.

pub mod compiler;
pub mod diagnostics;

use compiler::code::Assembly;
use compiler::symbols::SymbolTable;
use compiler::tree::Program;
use diagnostics::{Diagnostic, Diagnostics};

use thiserror::Error;

// ── Generation options ──────────────────────────────────────────────

/// What to do when an expression needs more registers than the machine has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterExhaustion {
    /// Report a diagnostic, substitute r0, and keep generating so further
    /// errors surface. The resulting code must not be run (default).
    #[default]
    Report,
    /// Stop generation with [`GenerateError::OutOfRegisters`].
    Abort,
}

/// Options for one generation.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    /// Register exhaustion policy. Default: `Report`.
    pub register_exhaustion: RegisterExhaustion,
    /// Source file named in diagnostics.
    pub file: Option<String>,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("internal generator error: {0}")]
    Internal(String),
    #[error("out of registers at {line}:{col}")]
    OutOfRegisters { line: usize, col: usize },
    #[error("generation reported {} error(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
}

/// Generate code for a program with default options.
pub fn generate(program: &Program, symbols: &SymbolTable) -> Result<Assembly, GenerateError> {
    generate_with_options(program, symbols, &GenOptions::default())
}

/// Generate code, failing with every reported diagnostic if there was any.
pub fn generate_with_options(
    program: &Program,
    symbols: &SymbolTable,
    options: &GenOptions,
) -> Result<Assembly, GenerateError> {
    let mut diagnostics = match &options.file {
        Some(file) => Diagnostics::for_file(file.clone()),
        None => Diagnostics::new(),
    };
    let asm = generate_in_session(program, symbols, options, &mut diagnostics)?;
    if diagnostics.has_errors() {
        return Err(GenerateError::Diagnostics(diagnostics.into_reported()));
    }
    Ok(asm)
}

/// Generate code, reporting into a caller-owned session. The assembly is
/// returned even when errors were reported; check the session before use.
pub fn generate_in_session(
    program: &Program,
    symbols: &SymbolTable,
    options: &GenOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Assembly, GenerateError> {
    let asm = compiler::lower::lower(program, symbols, diagnostics, options.register_exhaustion)?;
    tracing::debug!(instructions = asm.len(), errors = diagnostics.error_count(), "generated");
    Ok(asm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiler::builder::TreeBuilder;

    #[test]
    fn test_generate_simple_program() {
        let b = TreeBuilder::new();
        let program = b.program(vec![], b.call(b.predef("printInt"), vec![b.int(42)]));
        let asm = generate(&program, b.symbols()).unwrap();
        assert!(asm.listing().contains("ret 0"));
    }

    #[test]
    fn test_default_options() {
        let options = GenOptions::default();
        assert_eq!(options.register_exhaustion, RegisterExhaustion::Report);
        assert!(options.file.is_none());
    }

    #[test]
    fn test_error_display() {
        let err = GenerateError::OutOfRegisters { line: 3, col: 14 };
        assert_eq!(err.to_string(), "out of registers at 3:14");
        let mut diags = Diagnostics::new();
        diags.error(compiler::span::Span::at(1, 2), "a");
        diags.error(compiler::span::Span::at(1, 3), "b");
        let err = GenerateError::Diagnostics(diags.into_reported());
        assert_eq!(err.to_string(), "generation reported 2 error(s)");
    }
}
