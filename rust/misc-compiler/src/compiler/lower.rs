//! Typed tree → RISC lowering. Walks the tree once, emitting through the
//! instruction stream and returning a [`Handle`] per node.

use crate::compiler::code::{Assembly, Code};
use crate::compiler::env::{Location, LowerEnv};
use crate::compiler::handle::{Cond, Handle};
use crate::compiler::runtime::{self, CONS_CELL_SIZE, HEAD_OFFSET, TAIL_OFFSET};
use crate::compiler::symbols::{SymbolId, SymbolKind, SymbolTable};
use crate::compiler::tree::*;
use crate::diagnostics::Diagnostics;
use crate::{GenerateError, RegisterExhaustion};
use misc_core::risc::{Instruction, OpCode, Reg, Syscall, LNK, RES, SP, WORD_SIZE, ZERO};

/// Lower a whole program: start-up code, runtime routines, declared
/// functions, then the main expression.
pub fn lower(
    program: &Program,
    symbols: &SymbolTable,
    diagnostics: &mut Diagnostics,
    exhaustion: RegisterExhaustion,
) -> Result<Assembly, GenerateError> {
    let mut lowerer = Lowerer {
        code: Code::new(diagnostics, exhaustion),
        env: LowerEnv::new(),
        symbols,
    };
    lowerer.lower_program(program)?;
    lowerer.env.check_resolved()?;
    if lowerer.code.stack_size() != 0 {
        return Err(GenerateError::Internal(format!(
            "stack not unwound: {} bytes left at end of program",
            lowerer.code.stack_size()
        )));
    }
    lowerer.code.finish()
}

struct Lowerer<'a, 'd> {
    code: Code<'d>,
    env: LowerEnv,
    symbols: &'a SymbolTable,
}

impl<'a, 'd> Lowerer<'a, 'd> {
    fn emit(&mut self, op: OpCode, a: impl Into<i32>, b: impl Into<i32>, c: i32) -> i32 {
        self.code.emit(Instruction::abc(op, a.into(), b.into(), c))
    }

    fn lower_program(&mut self, program: &Program) -> Result<(), GenerateError> {
        runtime::emit_bootstrap(&mut self.code)?;
        let to_main = self.code.emit(Instruction::ac(OpCode::Beq, ZERO as i32, 0));
        runtime::emit_predefs(&mut self.code, &mut self.env, self.symbols)?;

        for decl in &program.decls {
            self.lower_fun(decl)?;
        }

        self.code.fixup(to_main, self.code.pc())?;
        tracing::debug!(pc = self.code.pc(), "main expression");
        let main = self.lower_expr(&program.expr)?;
        main.release(&mut self.code)?;
        self.code.emit(Instruction::c(OpCode::Ret, ZERO as i32));
        Ok(())
    }

    // ── Declarations ────────────────────────────────────────────────

    fn lower_fun(&mut self, decl: &FunDecl) -> Result<(), GenerateError> {
        let entry = self.code.pc();
        self.env.record(decl.sym, Location::Entry(entry))?;
        for site in self.env.take_pending(decl.sym) {
            self.code.fixup(site, entry)?;
        }
        tracing::debug!(name = %decl.name, entry, "placed function");

        // Arguments sit below the saved link, first argument deepest.
        let base = self.code.stack_size();
        for (i, formal) in decl.params.iter().enumerate() {
            self.code.inc_stack_size(WORD_SIZE);
            self.env.record(formal.sym, Location::Frame(base + (i as i32 + 1) * WORD_SIZE))?;
        }
        self.code.inc_stack_size(WORD_SIZE);
        self.emit(OpCode::Psh, LNK, SP, WORD_SIZE);

        self.code.set_span(decl.span);
        let body = self.lower_expr(&decl.body)?.load(&mut self.code)?;
        self.emit(OpCode::Add, RES, body, ZERO as i32);
        self.code.release(body)?;

        let frame = self.code.stack_size() - base;
        self.emit(OpCode::Pop, LNK, SP, frame);
        self.code.dec_stack_size(frame);
        self.code.emit(Instruction::c(OpCode::Ret, LNK as i32));
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<Handle, GenerateError> {
        match stmt {
            Stmt::Var(var) => {
                let value = self.lower_expr(&var.value)?.load(&mut self.code)?;
                self.code.inc_stack_size(WORD_SIZE);
                self.emit(OpCode::Psh, value, SP, WORD_SIZE);
                self.code.release(value)?;
                self.env.record(var.sym, Location::Frame(self.code.stack_size()))?;
                Ok(Handle::Immediate(0))
            }
            Stmt::Exec(expr) => {
                self.lower_expr(expr)?.release(&mut self.code)?;
                Ok(Handle::Immediate(0))
            }
            Stmt::While(w) => {
                let top = self.code.pc();
                let exit = self.lower_expr(&w.cond)?.to_cond(&mut self.code)?.jump_if_false(&mut self.code)?;
                self.lower_expr(&w.body)?.release(&mut self.code)?;
                let back = self.code.emit(Instruction::ac(OpCode::Beq, ZERO as i32, 0));
                self.code.fixup(back, top)?;
                self.code.fixup(exit, self.code.pc())?;
                Ok(Handle::Immediate(0))
            }
        }
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn lower_expr(&mut self, expr: &Expr) -> Result<Handle, GenerateError> {
        let outer = self.code.span();
        self.code.set_span(expr.span);
        let handle = self.lower_expr_kind(&expr.kind)?;
        self.code.set_span(outer);
        Ok(handle)
    }

    fn lower_expr_kind(&mut self, kind: &ExprKind) -> Result<Handle, GenerateError> {
        match kind {
            ExprKind::Unit | ExprKind::Nil => Ok(Handle::Immediate(0)),
            ExprKind::Int(value) => Ok(Handle::Immediate(*value)),
            ExprKind::Ident(sym) => self.lower_ident(*sym),
            ExprKind::Assign { sym, value } => {
                let offset = self.frame_offset(*sym)?;
                let reg = self.lower_expr(value)?.load(&mut self.code)?;
                let disp = self.code.stack_size() - offset;
                self.emit(OpCode::Stw, reg, SP, disp);
                self.code.release(reg)?;
                Ok(Handle::Immediate(0))
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                let to_else = self.lower_expr(cond)?.to_cond(&mut self.code)?.jump_if_false(&mut self.code)?;
                let result = self.code.acquire()?;
                self.lower_into(result, then_branch)?;
                let past = self.code.emit(Instruction::ac(OpCode::Beq, ZERO as i32, 0));
                self.code.fixup(to_else, self.code.pc())?;
                self.lower_into(result, else_branch)?;
                self.code.fixup(past, self.code.pc())?;
                Ok(Handle::Register(result))
            }
            ExprKind::Binary { op: BinOp::Cons, left, right } => self.lower_cons(left, right),
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand),
            ExprKind::Call { callee, args } => self.lower_call(callee, args),
            ExprKind::Block { stmts, expr } => {
                let before = self.code.stack_size();
                for stmt in stmts {
                    self.lower_stmt(stmt)?.release(&mut self.code)?;
                }
                let value = self.lower_expr(expr)?.load(&mut self.code)?;
                let introduced = self.code.stack_size() - before;
                self.code.dec_stack_size(introduced);
                self.emit(OpCode::Addi, SP, SP, introduced);
                Ok(Handle::Register(value))
            }
        }
    }

    /// Lower `expr` and copy it into `target`.
    fn lower_into(&mut self, target: Reg, expr: &Expr) -> Result<(), GenerateError> {
        let value = self.lower_expr(expr)?.load(&mut self.code)?;
        self.emit(OpCode::Addi, target, value, 0);
        self.code.release(value)
    }

    fn lower_ident(&mut self, sym: SymbolId) -> Result<Handle, GenerateError> {
        let symbol = self
            .symbols
            .get(sym)
            .ok_or_else(|| GenerateError::Internal(format!("unknown symbol #{}", sym.0)))?;
        match (symbol.kind, self.env.get(sym)) {
            (SymbolKind::Function, Some(Location::Entry(entry))) => Ok(Handle::Immediate(entry)),
            (SymbolKind::Function, None) => {
                // Not placed yet: jump through a thunk patched when it is.
                self.code.emit(Instruction::ac(OpCode::Beq, ZERO as i32, 2));
                let thunk = self.code.emit(Instruction::ac(OpCode::Beq, ZERO as i32, 0));
                self.env.defer(sym, thunk);
                tracing::debug!(name = %symbol.name, thunk, "forward reference");
                Ok(Handle::Immediate(thunk))
            }
            (SymbolKind::Variable, Some(Location::Frame(offset))) => Ok(Handle::Stack(offset)),
            (kind, location) => Err(GenerateError::Internal(format!(
                "`{}` ({:?}) has no usable location: {:?}",
                symbol.name, kind, location
            ))),
        }
    }

    fn frame_offset(&self, sym: SymbolId) -> Result<i32, GenerateError> {
        match self.env.get(sym) {
            Some(Location::Frame(offset)) => Ok(offset),
            other => Err(GenerateError::Internal(format!(
                "assignment to symbol #{} without a frame slot: {:?}",
                sym.0, other
            ))),
        }
    }

    fn lower_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<Handle, GenerateError> {
        let l = self.lower_expr(left)?.load(&mut self.code)?;
        let r = self.lower_expr(right)?.load(&mut self.code)?;
        self.code.release(r)?;
        self.code.release(l)?;
        let result = self.code.acquire()?;
        let (opcode, skip_when) = match op {
            BinOp::Add => (OpCode::Add, None),
            BinOp::Sub => (OpCode::Sub, None),
            BinOp::Mul => (OpCode::Mul, None),
            BinOp::Div => (OpCode::Div, None),
            BinOp::Mod => (OpCode::Mod, None),
            BinOp::Eq => (OpCode::Cmp, Some(OpCode::Bne)),
            BinOp::Ne => (OpCode::Cmp, Some(OpCode::Beq)),
            BinOp::Lt => (OpCode::Cmp, Some(OpCode::Bge)),
            BinOp::Le => (OpCode::Cmp, Some(OpCode::Bgt)),
            BinOp::Gt => (OpCode::Cmp, Some(OpCode::Ble)),
            BinOp::Ge => (OpCode::Cmp, Some(OpCode::Blt)),
            BinOp::Cons => {
                return Err(GenerateError::Internal("`::` reached arithmetic lowering".into()));
            }
        };
        self.emit(opcode, result, l, r as i32);
        Ok(match skip_when {
            Some(branch) => Handle::Cond(Cond::new(result, branch)),
            None => Handle::Register(result),
        })
    }

    /// Tail first, so an allocation made while computing the head can never
    /// alias the fresh cell.
    fn lower_cons(&mut self, head: &Expr, tail: &Expr) -> Result<Handle, GenerateError> {
        let list = self.lower_expr(tail)?.load(&mut self.code)?;
        let cell = self.code.acquire()?;
        let size = self.code.acquire()?;
        self.code.release(size)?;
        self.emit(OpCode::Addi, size, ZERO, CONS_CELL_SIZE);
        self.emit(OpCode::Syscall, cell, size, Syscall::GcAlloc.code());
        self.emit(OpCode::Stw, list, cell, TAIL_OFFSET);
        self.emit(OpCode::Add, list, cell, ZERO as i32);
        self.code.release(cell)?;

        let value = self.lower_expr(head)?.load(&mut self.code)?;
        self.code.release(value)?;
        self.emit(OpCode::Stw, value, list, HEAD_OFFSET);
        Ok(Handle::Register(list))
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Handle, GenerateError> {
        let list = self.lower_expr(operand)?.load(&mut self.code)?;
        match op {
            UnaryOp::Head | UnaryOp::Tail => {
                runtime::emit_null_guard(&mut self.code, list)?;
                self.code.release(list)?;
                let result = self.code.acquire()?;
                let offset = if op == UnaryOp::Head { HEAD_OFFSET } else { TAIL_OFFSET };
                self.emit(OpCode::Ldw, result, list, offset);
                Ok(Handle::Register(result))
            }
            UnaryOp::IsEmpty => {
                self.code.release(list)?;
                let to_true = self.code.emit(Instruction::ac(OpCode::Beq, list as i32, 0));
                let result = self.code.acquire()?;
                self.emit(OpCode::Addi, result, ZERO, 0);
                let past = self.code.emit(Instruction::ac(OpCode::Beq, ZERO as i32, 0));
                self.code.fixup(to_true, self.code.pc())?;
                self.emit(OpCode::Addi, result, ZERO, 1);
                self.code.fixup(past, self.code.pc())?;
                Ok(Handle::Register(result))
            }
        }
    }

    /// Caller saves every live register, pushes arguments left to right,
    /// and the callee pops them together with its saved link.
    fn lower_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Handle, GenerateError> {
        let saved = self.code.live_registers();
        for &reg in saved.iter().rev() {
            self.code.inc_stack_size(WORD_SIZE);
            self.emit(OpCode::Psh, reg, SP, WORD_SIZE);
            self.code.release(reg)?;
        }

        for arg in args {
            let value = self.lower_expr(arg)?.load(&mut self.code)?;
            self.code.release(value)?;
            self.code.inc_stack_size(WORD_SIZE);
            self.emit(OpCode::Psh, value, SP, WORD_SIZE);
        }

        self.lower_expr(callee)?.call(&mut self.code)?;
        self.code.dec_stack_size(args.len() as i32 * WORD_SIZE);

        for _ in &saved {
            let reg = self.code.acquire()?;
            self.code.dec_stack_size(WORD_SIZE);
            self.emit(OpCode::Pop, reg, SP, WORD_SIZE);
        }

        let result = self.code.acquire()?;
        self.emit(OpCode::Add, result, RES, ZERO as i32);
        Ok(Handle::Register(result))
    }
}
