//! Stack-disciplined register allocator.
//! Hands out the lowest free register of the allocatable window; registers
//! must be freed in exact reverse order of allocation.

use misc_core::risc::{Reg, ALLOC_MAX, ALLOC_MIN};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegAllocError {
    #[error("last register allocated is r{expected}, trying to free r{found}")]
    OutOfOrder { expected: Reg, found: Reg },
    #[error("trying to free r{0} while no register is allocated")]
    NothingAllocated(Reg),
}

/// Register allocation state for one generation
#[derive(Debug)]
pub struct RegAlloc {
    next_reg: Reg,
}

impl Default for RegAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl RegAlloc {
    pub fn new() -> Self {
        Self { next_reg: ALLOC_MIN }
    }

    /// Allocate the lowest unused register, or `None` once the window is exhausted.
    pub fn alloc(&mut self) -> Option<Reg> {
        if self.next_reg > ALLOC_MAX {
            return None;
        }
        let reg = self.next_reg;
        self.next_reg += 1;
        Some(reg)
    }

    /// Free a register. Registers outside the allocatable window (fixed
    /// roles, or the zero placeholder handed out on exhaustion) are ignored.
    pub fn free(&mut self, reg: Reg) -> Result<(), RegAllocError> {
        if !(ALLOC_MIN..=ALLOC_MAX).contains(&reg) {
            return Ok(());
        }
        if self.next_reg == ALLOC_MIN {
            return Err(RegAllocError::NothingAllocated(reg));
        }
        let last = self.next_reg - 1;
        if reg != last {
            return Err(RegAllocError::OutOfOrder { expected: last, found: reg });
        }
        self.next_reg = last;
        Ok(())
    }

    /// Currently allocated registers, in allocation order.
    pub fn live(&self) -> impl DoubleEndedIterator<Item = Reg> {
        ALLOC_MIN..self.next_reg
    }

    pub fn live_count(&self) -> usize {
        (self.next_reg - ALLOC_MIN) as usize
    }

    /// True when every allocated register has been freed.
    pub fn is_balanced(&self) -> bool {
        self.next_reg == ALLOC_MIN
    }
}
