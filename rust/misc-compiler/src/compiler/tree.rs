//! Typed tree handed to the generator.
//! Every node carries its resolved type; declarations and references carry bound symbols.

use crate::compiler::span::Span;
use crate::compiler::symbols::SymbolId;
use crate::compiler::types::Type;
use strum_macros::Display;

#[derive(Debug, Clone)]
pub struct Program {
    pub decls: Vec<FunDecl>,
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: String,
    pub sym: SymbolId,
    pub params: Vec<Formal>,
    pub result: Type,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Formal {
    pub name: String,
    pub sym: SymbolId,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub sym: SymbolId,
    pub ty: Type,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Expr,
    pub span: Span,
}

/// Statements appear only inside blocks.
#[derive(Debug, Clone)]
pub enum Stmt {
    Var(VarDecl),
    Exec(Expr),
    While(WhileStmt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "::")]
    Cons,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOp {
    #[strum(serialize = "head")]
    Head,
    #[strum(serialize = "tail")]
    Tail,
    #[strum(serialize = "isEmpty")]
    IsEmpty,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Assign {
        sym: SymbolId,
        value: Box<Expr>,
    },
    Ident(SymbolId),
    Unit,
    Int(i32),
    Nil,
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Block {
        stmts: Vec<Stmt>,
        expr: Box<Expr>,
    },
}
