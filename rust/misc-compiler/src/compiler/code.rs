//! Instruction stream under construction.
//!
//! Owns the emitted instructions, the register allocator, and the logical
//! stack depth. Branches are emitted with a zero offset and patched exactly
//! once by [`Code::fixup`] when their target is known.

use crate::compiler::regalloc::RegAlloc;
use crate::compiler::span::Span;
use crate::diagnostics::Diagnostics;
use crate::{GenerateError, RegisterExhaustion};
use misc_core::risc::{self, Instruction, Reg, WORD_SIZE, ZERO};
use std::collections::HashSet;

pub struct Code<'d> {
    instructions: Vec<Instruction>,
    patched: HashSet<usize>,
    regs: RegAlloc,
    stack_size: i32,
    diagnostics: &'d mut Diagnostics,
    exhaustion: RegisterExhaustion,
    span: Span,
}

impl<'d> Code<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics, exhaustion: RegisterExhaustion) -> Self {
        Self {
            instructions: Vec::new(),
            patched: HashSet::new(),
            regs: RegAlloc::new(),
            stack_size: 0,
            diagnostics,
            exhaustion,
            span: Span::dummy(),
        }
    }

    // ── Registers ───────────────────────────────────────────────────

    /// Source position charged for register exhaustion.
    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn acquire(&mut self) -> Result<Reg, GenerateError> {
        if let Some(reg) = self.regs.alloc() {
            return Ok(reg);
        }
        match self.exhaustion {
            RegisterExhaustion::Report => {
                tracing::warn!(span = %self.span, "out of registers, substituting r0");
                self.diagnostics.error_with_help(
                    self.span,
                    "not enough registers",
                    "bind intermediate results to local variables",
                );
                Ok(ZERO)
            }
            RegisterExhaustion::Abort => Err(GenerateError::OutOfRegisters {
                line: self.span.line,
                col: self.span.col,
            }),
        }
    }

    pub fn release(&mut self, reg: Reg) -> Result<(), GenerateError> {
        self.regs.free(reg).map_err(|e| GenerateError::Internal(e.to_string()))
    }

    /// Allocated registers, lowest first.
    pub fn live_registers(&self) -> Vec<Reg> {
        self.regs.live().collect()
    }

    pub fn live_count(&self) -> usize {
        self.regs.live_count()
    }

    // ── Emission ────────────────────────────────────────────────────

    /// Byte offset of the next instruction.
    pub fn pc(&self) -> i32 {
        self.instructions.len() as i32 * WORD_SIZE
    }

    /// Append an instruction, returning the byte offset it occupies.
    pub fn emit(&mut self, instr: Instruction) -> i32 {
        let pc = self.pc();
        tracing::trace!(pc, %instr, "emit");
        self.instructions.push(instr);
        pc
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Point the branch at `site` to `target`.
    pub fn fixup(&mut self, site: i32, target: i32) -> Result<(), GenerateError> {
        let index = (site / WORD_SIZE) as usize;
        let instr = self
            .instructions
            .get_mut(index)
            .ok_or_else(|| GenerateError::Internal(format!("fixup of unknown site {}", site)))?;
        if !instr.op.is_branch() {
            return Err(GenerateError::Internal(format!(
                "fixup of non-branch `{}` at {}",
                instr, site
            )));
        }
        if !self.patched.insert(index) {
            return Err(GenerateError::Internal(format!("branch at {} patched twice", site)));
        }
        instr.c = Some((target - site) / WORD_SIZE);
        tracing::trace!(site, target, "fixup");
        Ok(())
    }

    // ── Stack ───────────────────────────────────────────────────────

    pub fn stack_size(&self) -> i32 {
        self.stack_size
    }

    pub fn inc_stack_size(&mut self, bytes: i32) {
        self.stack_size += bytes;
    }

    pub fn dec_stack_size(&mut self, bytes: i32) {
        self.stack_size -= bytes;
    }

    // ── Completion ──────────────────────────────────────────────────

    /// Close the stream. Every register must be back in the pool.
    pub fn finish(self) -> Result<Assembly, GenerateError> {
        if !self.regs.is_balanced() {
            return Err(GenerateError::Internal(format!(
                "registers have not been freed: {:?} still allocated",
                self.regs.live().collect::<Vec<_>>()
            )));
        }
        Ok(Assembly { instructions: self.instructions })
    }
}

/// A finished program for the RISC machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub instructions: Vec<Instruction>,
}

impl Assembly {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instruction at a byte offset.
    pub fn at(&self, pc: i32) -> Option<&Instruction> {
        self.instructions.get((pc / WORD_SIZE) as usize)
    }

    /// `/* 0000 */ mnemonic operands` text, one instruction per line.
    pub fn listing(&self) -> String {
        risc::listing(&self.instructions)
    }
}
