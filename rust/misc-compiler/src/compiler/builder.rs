//! Programmatic construction of typed trees.
//!
//! Stands in for the front end: nodes get the types the analyzer would
//! assign, and each node gets its own synthetic source position so that
//! diagnostics stay distinguishable. No checking is performed.

use crate::compiler::span::Span;
use crate::compiler::symbols::{SymbolId, SymbolKind, SymbolTable};
use crate::compiler::tree::*;
use crate::compiler::types::Type;
use std::cell::Cell;

/// A declared function signature, before its body exists.
#[derive(Debug, Clone)]
pub struct FunSig {
    pub name: String,
    pub sym: SymbolId,
    pub params: Vec<Formal>,
    pub result: Type,
    pub span: Span,
}

impl FunSig {
    pub fn param(&self, index: usize) -> SymbolId {
        self.params[index].sym
    }
}

pub struct TreeBuilder {
    symbols: SymbolTable,
    col: Cell<usize>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self { symbols: SymbolTable::with_predefs(), col: Cell::new(0) }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }

    fn span(&self) -> Span {
        let col = self.col.get() + 1;
        self.col.set(col);
        Span::at(1, col)
    }

    fn node(&self, kind: ExprKind, ty: Type) -> Expr {
        Expr { kind, ty, span: self.span() }
    }

    fn sym_type(&self, sym: SymbolId) -> Type {
        self.symbols.get(sym).map(|s| s.ty.clone()).unwrap_or(Type::Bad)
    }

    // ── Declarations ────────────────────────────────────────────────

    /// Declare a function and its formals. The symbol is usable in calls
    /// right away, so bodies may refer to it recursively.
    pub fn fun(&mut self, name: &str, params: &[(&str, Type)], result: Type) -> FunSig {
        let span = self.span();
        let ty = Type::fun(params.iter().map(|(_, t)| t.clone()).collect(), result.clone());
        let sym = self.symbols.declare(name, SymbolKind::Function, ty, span);
        let mut formals = Vec::with_capacity(params.len());
        for (pname, pty) in params {
            let span = self.span();
            let sym = self.symbols.declare(pname, SymbolKind::Variable, pty.clone(), span);
            formals.push(Formal { name: pname.to_string(), sym, ty: pty.clone(), span });
        }
        FunSig { name: name.to_string(), sym, params: formals, result, span }
    }

    pub fn define(&self, sig: FunSig, body: Expr) -> FunDecl {
        FunDecl {
            name: sig.name,
            sym: sig.sym,
            params: sig.params,
            result: sig.result,
            body,
            span: sig.span,
        }
    }

    /// `var name: <type of value> = value`
    pub fn var(&mut self, name: &str, value: Expr) -> (SymbolId, Stmt) {
        let ty = value.ty.clone();
        self.var_typed(name, ty, value)
    }

    pub fn var_typed(&mut self, name: &str, ty: Type, value: Expr) -> (SymbolId, Stmt) {
        let span = self.span();
        let sym = self.symbols.declare(name, SymbolKind::Variable, ty.clone(), span);
        let decl = VarDecl { name: name.to_string(), sym, ty, value, span };
        (sym, Stmt::Var(decl))
    }

    pub fn exec(&self, expr: Expr) -> Stmt {
        Stmt::Exec(expr)
    }

    pub fn while_(&self, cond: Expr, body: Expr) -> Stmt {
        Stmt::While(WhileStmt { cond, body, span: self.span() })
    }

    pub fn program(&self, decls: Vec<FunDecl>, expr: Expr) -> Program {
        Program { decls, expr, span: self.span() }
    }

    // ── Expressions ─────────────────────────────────────────────────

    pub fn int(&self, value: i32) -> Expr {
        self.node(ExprKind::Int(value), Type::Int)
    }

    pub fn unit(&self) -> Expr {
        self.node(ExprKind::Unit, Type::Unit)
    }

    pub fn nil(&self) -> Expr {
        self.node(ExprKind::Nil, Type::nil())
    }

    pub fn ident(&self, sym: SymbolId) -> Expr {
        self.node(ExprKind::Ident(sym), self.sym_type(sym))
    }

    /// Reference to one of the runtime's I/O routines.
    pub fn predef(&self, name: &str) -> Expr {
        match self.symbols.predef(name) {
            Some(sym) => self.ident(sym),
            None => self.node(ExprKind::Unit, Type::Bad),
        }
    }

    pub fn assign(&self, sym: SymbolId, value: Expr) -> Expr {
        self.node(ExprKind::Assign { sym, value: Box::new(value) }, Type::Unit)
    }

    pub fn binary(&self, op: BinOp, left: Expr, right: Expr) -> Expr {
        let ty = match op {
            BinOp::Cons => match &right.ty {
                Type::List(_) if !right.ty.is_nil() => right.ty.clone(),
                _ => Type::list(left.ty.clone()),
            },
            _ => Type::Int,
        };
        self.node(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, ty)
    }

    pub fn add(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Add, l, r) }
    pub fn sub(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Sub, l, r) }
    pub fn mul(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Mul, l, r) }
    pub fn div(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Div, l, r) }
    pub fn rem(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Mod, l, r) }
    pub fn eq(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Eq, l, r) }
    pub fn ne(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Ne, l, r) }
    pub fn lt(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Lt, l, r) }
    pub fn le(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Le, l, r) }
    pub fn gt(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Gt, l, r) }
    pub fn ge(&self, l: Expr, r: Expr) -> Expr { self.binary(BinOp::Ge, l, r) }
    pub fn cons(&self, head: Expr, tail: Expr) -> Expr { self.binary(BinOp::Cons, head, tail) }

    /// `[a, b, c]` as nested `::` ending in `[]`.
    pub fn list(&self, items: Vec<Expr>) -> Expr {
        items.into_iter().rev().fold(self.nil(), |tail, head| self.cons(head, tail))
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = match op {
            UnaryOp::Head => operand.ty.list_elem().cloned().unwrap_or(Type::Bad),
            UnaryOp::Tail => operand.ty.clone(),
            UnaryOp::IsEmpty => Type::Int,
        };
        self.node(ExprKind::Unary { op, operand: Box::new(operand) }, ty)
    }

    pub fn head(&self, list: Expr) -> Expr { self.unary(UnaryOp::Head, list) }
    pub fn tail(&self, list: Expr) -> Expr { self.unary(UnaryOp::Tail, list) }
    pub fn is_empty(&self, list: Expr) -> Expr { self.unary(UnaryOp::IsEmpty, list) }

    pub fn if_(&self, cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        let ty = if then_branch.ty.is_nil() { else_branch.ty.clone() } else { then_branch.ty.clone() };
        self.node(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            ty,
        )
    }

    /// `a & b`, as the parser desugars it.
    pub fn and(&self, a: Expr, b: Expr) -> Expr {
        let f = self.int(0);
        self.if_(a, b, f)
    }

    /// `a | b`, as the parser desugars it.
    pub fn or(&self, a: Expr, b: Expr) -> Expr {
        let t = self.int(1);
        self.if_(a, t, b)
    }

    /// `!a`, as the parser desugars it.
    pub fn not(&self, a: Expr) -> Expr {
        let (f, t) = (self.int(0), self.int(1));
        self.if_(a, f, t)
    }

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        let ty = callee.ty.fun_result().cloned().unwrap_or(Type::Bad);
        self.node(ExprKind::Call { callee: Box::new(callee), args }, ty)
    }

    pub fn block(&self, stmts: Vec<Stmt>, expr: Expr) -> Expr {
        let ty = expr.ty.clone();
        self.node(ExprKind::Block { stmts, expr: Box::new(expr) }, ty)
    }
}
