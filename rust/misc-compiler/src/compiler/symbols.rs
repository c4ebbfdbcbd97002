//! Symbol table shared between the front end and the generator.
//!
//! Symbols are immutable once declared. Where a symbol lives at run time is
//! decided by the generator and kept in its own environment, not here.

use crate::compiler::runtime::PREDEFS;
use crate::compiler::span::Span;
use crate::compiler::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity of a declared symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Variable,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub span: Span,
}

impl Symbol {
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }

    pub fn is_variable(&self) -> bool {
        self.kind == SymbolKind::Variable
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    globals: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with the runtime's I/O routines.
    pub fn with_predefs() -> Self {
        let mut table = Self::new();
        for (name, ty) in PREDEFS.iter().map(|p| (p.name, p.ty())) {
            let id = table.declare(name, SymbolKind::Function, ty, Span::dummy());
            table.globals.insert(name.to_string(), id);
        }
        table
    }

    pub fn declare(&mut self, name: &str, kind: SymbolKind, ty: Type, span: Span) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol { name: name.to_string(), kind, ty, span });
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    /// Look up a predefined routine by name.
    pub fn predef(&self, name: &str) -> Option<SymbolId> {
        self.globals.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
