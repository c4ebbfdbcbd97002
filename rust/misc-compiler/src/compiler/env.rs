//! Run-time locations of symbols, as decided during lowering.

use crate::compiler::symbols::SymbolId;
use crate::GenerateError;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Byte offset of a function's first instruction.
    Entry(i32),
    /// Stack size recorded when the variable was pushed.
    Frame(i32),
}

/// Symbol identity to resolved location. Each symbol is placed once.
#[derive(Debug, Default)]
pub struct LowerEnv {
    locations: HashMap<SymbolId, Location>,
    /// Thunk branches waiting for a function entry.
    pending: HashMap<SymbolId, Vec<i32>>,
}

impl LowerEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sym: SymbolId) -> Option<Location> {
        self.locations.get(&sym).copied()
    }

    pub fn record(&mut self, sym: SymbolId, location: Location) -> Result<(), GenerateError> {
        if let Some(previous) = self.locations.insert(sym, location) {
            return Err(GenerateError::Internal(format!(
                "symbol #{} placed twice ({:?}, then {:?})",
                sym.0, previous, location
            )));
        }
        Ok(())
    }

    /// Remember a branch to patch once `sym`'s entry is known.
    pub fn defer(&mut self, sym: SymbolId, site: i32) {
        self.pending.entry(sym).or_default().push(site);
    }

    /// Branches waiting on `sym`, handed over for patching.
    pub fn take_pending(&mut self, sym: SymbolId) -> Vec<i32> {
        self.pending.remove(&sym).unwrap_or_default()
    }

    /// Fails if some referenced function was never placed.
    pub fn check_resolved(&self) -> Result<(), GenerateError> {
        match self.pending.keys().min() {
            Some(sym) => Err(GenerateError::Internal(format!(
                "function #{} referenced but never generated",
                sym.0
            ))),
            None => Ok(()),
        }
    }
}
