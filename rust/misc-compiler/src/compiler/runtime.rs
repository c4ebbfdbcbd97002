//! Runtime conventions: machine start-up, the predefined I/O routines, and
//! the heap layout of list cells.

use crate::compiler::code::Code;
use crate::compiler::env::{Location, LowerEnv};
use crate::compiler::symbols::SymbolTable;
use crate::compiler::types::Type;
use crate::GenerateError;
use misc_core::risc::{Instruction, OpCode, Reg, Syscall, LNK, RES, SP, WORD_SIZE, ZERO};

/// Bytes in a list cell: head word then tail word.
pub const CONS_CELL_SIZE: i32 = 2 * WORD_SIZE;
pub const HEAD_OFFSET: i32 = 0;
pub const TAIL_OFFSET: i32 = WORD_SIZE;

/// Exit status of a program that took `head` or `tail` of `[]`.
pub const NULL_LIST_EXIT: i32 = -1;

/// Bit position of the stack register number in the `GC_INIT` size operand.
const GC_SP_SHIFT: i32 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefKind {
    /// `(Int)Unit`, pops its argument.
    Print,
    /// `()Int`
    Read,
}

#[derive(Debug, Clone, Copy)]
pub struct Predef {
    pub name: &'static str,
    pub kind: PredefKind,
    pub syscall: Syscall,
}

impl Predef {
    pub fn ty(&self) -> Type {
        match self.kind {
            PredefKind::Print => Type::fun(vec![Type::Int], Type::Unit),
            PredefKind::Read => Type::fun(vec![], Type::Int),
        }
    }
}

pub const PREDEFS: [Predef; 4] = [
    Predef { name: "printInt", kind: PredefKind::Print, syscall: Syscall::IoWrInt },
    Predef { name: "printChar", kind: PredefKind::Print, syscall: Syscall::IoWrChr },
    Predef { name: "readInt", kind: PredefKind::Read, syscall: Syscall::IoRdInt },
    Predef { name: "readChar", kind: PredefKind::Read, syscall: Syscall::IoRdChr },
];

fn syscall(a: Reg, b: Reg, call: Syscall) -> Instruction {
    Instruction::abc(OpCode::Syscall, a as i32, b as i32, call.code())
}

/// Point SP at the top of memory and hand the middle half of memory to
/// the collector, with SP as its root register.
pub fn emit_bootstrap(code: &mut Code) -> Result<(), GenerateError> {
    code.emit(syscall(SP, ZERO, Syscall::GetTotalMemSize));
    let start = code.acquire()?;
    let words = code.acquire()?;
    let root = code.acquire()?;
    let (s, w, t) = (start as i32, words as i32, root as i32);
    code.emit(Instruction::abc(OpCode::Divi, s, SP as i32, 4));
    code.emit(Instruction::abc(OpCode::Divi, w, s, 2));
    code.emit(Instruction::abc(OpCode::Addi, t, ZERO as i32, SP as i32));
    code.emit(Instruction::abc(OpCode::Lshi, t, t, GC_SP_SHIFT));
    code.emit(Instruction::abc(OpCode::Add, w, w, t));
    code.emit(syscall(start, words, Syscall::GcInit));
    code.release(root)?;
    code.release(words)?;
    code.release(start)
}

/// Lay down the I/O routines and record their entries.
pub fn emit_predefs(code: &mut Code, env: &mut LowerEnv, symbols: &SymbolTable) -> Result<(), GenerateError> {
    for predef in &PREDEFS {
        let sym = symbols
            .predef(predef.name)
            .ok_or_else(|| GenerateError::Internal(format!("`{}` is not declared", predef.name)))?;
        let entry = code.pc();
        env.record(sym, Location::Entry(entry))?;
        tracing::debug!(name = predef.name, entry, "placed predefined routine");
        match predef.kind {
            PredefKind::Print => {
                let r = code.acquire()?;
                code.release(r)?;
                code.emit(Instruction::abc(OpCode::Pop, r as i32, SP as i32, WORD_SIZE));
                code.emit(syscall(r, ZERO, predef.syscall));
            }
            PredefKind::Read => {
                code.emit(syscall(RES, ZERO, predef.syscall));
            }
        }
        code.emit(Instruction::c(OpCode::Ret, LNK as i32));
    }
    Ok(())
}

/// Stop the program with [`NULL_LIST_EXIT`] when `list` holds `[]`.
pub fn emit_null_guard(code: &mut Code, list: Reg) -> Result<(), GenerateError> {
    let skip = code.emit(Instruction::ac(OpCode::Bne, list as i32, 0));
    let status = code.acquire()?;
    code.release(status)?;
    code.emit(Instruction::abc(OpCode::Addi, status as i32, ZERO as i32, NULL_LIST_EXIT));
    code.emit(syscall(status, ZERO, Syscall::Exit));
    code.fixup(skip, code.pc())
}
