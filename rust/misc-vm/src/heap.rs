//! Garbage-collected heap behind the `GC_INIT` / `GC_ALLOC` syscalls.
//!
//! Conservative mark-sweep: every word reachable from a root is treated as
//! a potential pointer. Roots are the registers, memory below the heap, and
//! either the stack (from the stack register to the end of memory) or, when
//! no stack register was given, all memory above the heap.

use misc_core::risc::{Reg, REG_COUNT, WORD_SIZE};
use std::collections::{BTreeMap, HashSet};

const WORD: u32 = WORD_SIZE as u32;

#[derive(Debug)]
pub struct Heap {
    start: u32,
    end: u32,
    stack_reg: Option<Reg>,
    /// Allocated blocks, address to size in bytes.
    blocks: BTreeMap<u32, u32>,
    /// Reusable chunks below `top`, address to size in bytes.
    free: BTreeMap<u32, u32>,
    /// First never-allocated address.
    top: u32,
}

impl Heap {
    pub fn new(start: u32, end: u32, stack_reg: Option<Reg>) -> Self {
        Self { start, end, stack_reg, blocks: BTreeMap::new(), free: BTreeMap::new(), top: start }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of live blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes handed out and not yet reclaimed.
    pub fn used(&self) -> u32 {
        self.blocks.values().sum()
    }

    /// Reserve a word-aligned block of at least `size` bytes. The caller
    /// zeroes it.
    pub fn alloc(&mut self, size: u32) -> Option<u32> {
        let size = size.max(1).div_ceil(WORD) * WORD;
        let fit = self.free.iter().find(|&(_, &len)| len >= size).map(|(&addr, &len)| (addr, len));
        let addr = match fit {
            Some((addr, len)) => {
                self.free.remove(&addr);
                if len > size {
                    self.free.insert(addr + size, len - size);
                }
                addr
            }
            None => {
                let addr = self.top;
                if self.end.checked_sub(addr)? < size {
                    return None;
                }
                self.top = addr + size;
                addr
            }
        };
        self.blocks.insert(addr, size);
        Some(addr)
    }

    fn block_containing(&self, value: u32) -> Option<(u32, u32)> {
        self.blocks
            .range(..=value)
            .next_back()
            .filter(|&(&addr, &size)| value < addr + size)
            .map(|(&addr, &size)| (addr, size))
    }

    /// Free every block not reachable from the roots. Returns the number of
    /// blocks reclaimed.
    pub fn collect(&mut self, memory: &[u8], regs: &[i32; REG_COUNT]) -> usize {
        let mut pending: Vec<u32> = regs.iter().map(|&r| r as u32).collect();
        pending.extend(words(memory, 0, self.start));
        let above = match self.stack_reg {
            Some(sp) => regs[sp as usize] as u32,
            None => self.end,
        };
        pending.extend(words(memory, above, memory.len() as u32));

        let mut marked = HashSet::new();
        while let Some(value) = pending.pop() {
            if let Some((addr, size)) = self.block_containing(value) {
                if marked.insert(addr) {
                    pending.extend(words(memory, addr, addr + size));
                }
            }
        }

        let dead: Vec<(u32, u32)> = self
            .blocks
            .iter()
            .filter(|(addr, _)| !marked.contains(*addr))
            .map(|(&addr, &size)| (addr, size))
            .collect();
        for (addr, size) in &dead {
            self.blocks.remove(addr);
            self.free.insert(*addr, *size);
        }
        self.coalesce();
        tracing::debug!(reclaimed = dead.len(), live = self.blocks.len(), "gc");
        dead.len()
    }

    /// Merge adjacent free chunks and give the last one back to `top`.
    fn coalesce(&mut self) {
        let mut merged: BTreeMap<u32, u32> = BTreeMap::new();
        let mut last: Option<(u32, u32)> = None;
        for (&addr, &size) in &self.free {
            last = match last {
                Some((a, s)) if a + s == addr => Some((a, s + size)),
                Some((a, s)) => {
                    merged.insert(a, s);
                    Some((addr, size))
                }
                None => Some((addr, size)),
            };
        }
        if let Some((a, s)) = last {
            if a + s == self.top {
                self.top = a;
            } else {
                merged.insert(a, s);
            }
        }
        self.free = merged;
    }
}

/// Word values stored in `[from, to)`, clamped to the memory.
fn words(memory: &[u8], from: u32, to: u32) -> impl Iterator<Item = u32> + '_ {
    let from = (from.div_ceil(WORD) * WORD) as usize;
    let to = (to as usize).min(memory.len());
    memory
        .get(from..to.max(from))
        .unwrap_or(&[])
        .chunks_exact(WORD as usize)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
}
