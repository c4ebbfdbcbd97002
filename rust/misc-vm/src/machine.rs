//! Fetch-execute loop for the RISC machine.

use crate::heap::Heap;
use crate::ops;
use misc_core::risc::{Instruction, OpCode, Reg, Syscall, LNK, REG_COUNT, WORD_SIZE};
use std::collections::VecDeque;
use thiserror::Error;

/// Widest padding `WR_INT` accepts.
pub const MAX_FIELD_WIDTH: i32 = 4096;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("pc {0} is outside the loaded code")]
    PcOutOfRange(i32),
    #[error("no register r{0}")]
    BadRegister(i32),
    #[error("misaligned word access at address {0}")]
    Misaligned(i32),
    #[error("memory access out of range at address {0}")]
    AddressOutOfRange(i32),
    #[error("division by zero at pc {0}")]
    DivisionByZero(i32),
    #[error("bound check failed at pc {pc}: {value} not in 0..{limit}")]
    BoundCheck { pc: i32, value: i32, limit: i32 },
    #[error("cannot execute `{op}` at pc {pc}")]
    IllegalInstruction { pc: i32, op: String },
    #[error("break at pc {0}")]
    Break(i32),
    #[error("unknown syscall {code} at pc {pc}")]
    UnknownSyscall { pc: i32, code: i32 },
    #[error("no integer left on input")]
    BadInput,
    #[error("heap used before GC_INIT")]
    NoHeap,
    #[error("invalid heap: start {start}, {words} words")]
    BadHeap { start: i32, words: u32 },
    #[error("out of heap memory allocating {0} bytes")]
    OutOfMemory(i32),
    #[error("field width {width} at pc {pc} is too wide")]
    FieldWidth { pc: i32, width: i32 },
    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
}

/// Machine parameters.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Data memory in bytes. Default: 1 MiB.
    pub memory_size: usize,
    /// Instructions executed before giving up. Default: ten million.
    pub max_steps: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self { memory_size: 1 << 20, max_steps: Some(10_000_000) }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    pub status: i32,
    pub steps: u64,
}

pub struct Machine {
    config: MachineConfig,
    regs: [i32; REG_COUNT],
    memory: Vec<u8>,
    code: Vec<Instruction>,
    pc: i32,
    steps: u64,
    heap: Option<Heap>,
    input: VecDeque<char>,
    output: String,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let memory = vec![0; config.memory_size];
        Self {
            config,
            regs: [0; REG_COUNT],
            memory,
            code: Vec::new(),
            pc: 0,
            steps: 0,
            heap: None,
            input: VecDeque::new(),
            output: String::new(),
        }
    }

    /// Load a program and reset the machine state. Captured output and
    /// queued input are kept.
    pub fn load(&mut self, code: &[Instruction]) {
        self.code = code.to_vec();
        self.regs = [0; REG_COUNT];
        self.memory.iter_mut().for_each(|b| *b = 0);
        self.pc = 0;
        self.steps = 0;
        self.heap = None;
    }

    pub fn push_input(&mut self, text: &str) {
        self.input.extend(text.chars());
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn reg(&self, reg: Reg) -> i32 {
        self.regs[reg as usize]
    }

    pub fn pc(&self) -> i32 {
        self.pc
    }

    pub fn heap(&self) -> Option<&Heap> {
        self.heap.as_ref()
    }

    pub fn read_word(&self, addr: i32) -> Result<i32, VmError> {
        let at = self.word_index(addr)?;
        let bytes = [self.memory[at], self.memory[at + 1], self.memory[at + 2], self.memory[at + 3]];
        Ok(i32::from_le_bytes(bytes))
    }

    /// Run until the program halts or faults.
    pub fn run(&mut self) -> Result<Exit, VmError> {
        loop {
            if let Some(status) = self.step()? {
                tracing::debug!(status, steps = self.steps, "halted");
                return Ok(Exit { status, steps: self.steps });
            }
        }
    }

    /// Execute one instruction. Returns the exit status once the program halts.
    pub fn step(&mut self) -> Result<Option<i32>, VmError> {
        if let Some(limit) = self.config.max_steps {
            if self.steps >= limit {
                return Err(VmError::StepLimit(limit));
            }
        }
        let pc = self.pc;
        let instr = self.fetch(pc)?;
        self.steps += 1;
        tracing::trace!(pc, %instr, "step");

        let (a, b, c) = (instr.a_val(), instr.b_val(), instr.c_val());
        let mut next = pc + WORD_SIZE;

        if let Some((alu, operand)) = ops::decode_alu(instr.op) {
            let rhs = match operand {
                ops::Operand::Register => self.get(c)?,
                ops::Operand::Signed => c,
                ops::Operand::Unsigned => c & 0xFFFF,
            };
            let value = ops::apply(alu, self.get(b)?, rhs, pc)?;
            self.set(a, value)?;
            self.pc = next;
            return Ok(None);
        }

        match instr.op {
            OpCode::Chk | OpCode::Chki | OpCode::Chkiu => {
                let limit = match instr.op {
                    OpCode::Chk => self.get(c)?,
                    OpCode::Chki => c,
                    _ => c & 0xFFFF,
                };
                let value = self.get(a)?;
                if value < 0 || value >= limit {
                    return Err(VmError::BoundCheck { pc, value, limit });
                }
            }
            OpCode::Ldw => {
                let addr = self.get(b)?.wrapping_add(c);
                let value = self.read_word(addr)?;
                self.set(a, value)?;
            }
            OpCode::Ldb => {
                let addr = self.get(b)?.wrapping_add(c);
                let value = self.memory[self.byte_index(addr)?] as i32;
                self.set(a, value)?;
            }
            OpCode::Stw => {
                let addr = self.get(b)?.wrapping_add(c);
                self.write_word(addr, self.get(a)?)?;
            }
            OpCode::Stb => {
                let addr = self.get(b)?.wrapping_add(c);
                let at = self.byte_index(addr)?;
                self.memory[at] = self.get(a)? as u8;
            }
            OpCode::Psh => {
                let addr = self.get(b)?.wrapping_sub(c);
                self.write_word(addr, self.get(a)?)?;
                self.set(b, addr)?;
            }
            OpCode::Pop => {
                let addr = self.get(b)?;
                let value = self.read_word(addr)?;
                self.set(a, value)?;
                self.set(b, addr.wrapping_add(c))?;
            }
            OpCode::Beq | OpCode::Bne | OpCode::Blt | OpCode::Bge | OpCode::Ble | OpCode::Bgt => {
                let v = self.get(a)?;
                let taken = match instr.op {
                    OpCode::Beq => v == 0,
                    OpCode::Bne => v != 0,
                    OpCode::Blt => v < 0,
                    OpCode::Bge => v >= 0,
                    OpCode::Ble => v <= 0,
                    _ => v > 0,
                };
                if taken {
                    next = pc.wrapping_add(c.wrapping_mul(WORD_SIZE));
                }
            }
            OpCode::Bsr => {
                self.regs[LNK as usize] = next;
                next = pc.wrapping_add(c.wrapping_mul(WORD_SIZE));
            }
            OpCode::Jsr => {
                self.regs[LNK as usize] = next;
                next = c.wrapping_mul(WORD_SIZE);
            }
            OpCode::Ret => {
                let target = self.get(c)?;
                if target == 0 {
                    return Ok(Some(0));
                }
                next = target;
            }
            OpCode::Break => return Err(VmError::Break(pc)),
            OpCode::Syscall => {
                if let Some(status) = self.syscall(a, b, c, pc)? {
                    return Ok(Some(status));
                }
            }
            op => return Err(VmError::IllegalInstruction { pc, op: op.to_string() }),
        }
        self.pc = next;
        Ok(None)
    }

    fn fetch(&self, pc: i32) -> Result<Instruction, VmError> {
        if pc < 0 || pc % WORD_SIZE != 0 {
            return Err(VmError::PcOutOfRange(pc));
        }
        self.code.get((pc / WORD_SIZE) as usize).copied().ok_or(VmError::PcOutOfRange(pc))
    }

    fn get(&self, reg: i32) -> Result<i32, VmError> {
        usize::try_from(reg)
            .ok()
            .and_then(|r| self.regs.get(r))
            .copied()
            .ok_or(VmError::BadRegister(reg))
    }

    /// Writes to r0 are discarded.
    fn set(&mut self, reg: i32, value: i32) -> Result<(), VmError> {
        match usize::try_from(reg).ok().filter(|&r| r < REG_COUNT) {
            Some(0) => Ok(()),
            Some(r) => {
                self.regs[r] = value;
                Ok(())
            }
            None => Err(VmError::BadRegister(reg)),
        }
    }

    fn byte_index(&self, addr: i32) -> Result<usize, VmError> {
        usize::try_from(addr)
            .ok()
            .filter(|&at| at < self.memory.len())
            .ok_or(VmError::AddressOutOfRange(addr))
    }

    fn word_index(&self, addr: i32) -> Result<usize, VmError> {
        if addr % WORD_SIZE != 0 {
            return Err(VmError::Misaligned(addr));
        }
        usize::try_from(addr)
            .ok()
            .filter(|&at| at + WORD_SIZE as usize <= self.memory.len())
            .ok_or(VmError::AddressOutOfRange(addr))
    }

    fn write_word(&mut self, addr: i32, value: i32) -> Result<(), VmError> {
        let at = self.word_index(addr)?;
        self.memory[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn syscall(&mut self, a: i32, b: i32, code: i32, pc: i32) -> Result<Option<i32>, VmError> {
        let call = Syscall::from_code(code).ok_or(VmError::UnknownSyscall { pc, code })?;
        tracing::debug!(pc, %call, "syscall");
        match call {
            Syscall::IoRdChr => {
                let ch = self.input.pop_front().map(|c| c as i32).unwrap_or(-1);
                self.set(a, ch)?;
            }
            Syscall::IoRdInt => {
                let value = self.read_int()?;
                self.set(a, value)?;
            }
            Syscall::IoWrChr => {
                let ch = char::from_u32(self.get(a)? as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                self.output.push(ch);
            }
            Syscall::IoWrInt => {
                let width = self.get(b)?;
                if width > MAX_FIELD_WIDTH {
                    return Err(VmError::FieldWidth { pc, width });
                }
                let text = format!("{:>width$}", self.get(a)?, width = width.max(0) as usize);
                self.output.push_str(&text);
            }
            Syscall::GcInit => {
                let start = self.get(a)?;
                let layout = self.get(b)? as u32;
                let words = layout & 0x07FF_FFFF;
                let stack_reg = (layout >> 27) as Reg;
                let mem = self.memory.len() as i64;
                let end = if words == 0 { mem } else { start as i64 + words as i64 * WORD_SIZE as i64 };
                if start < 0 || start % WORD_SIZE != 0 || end > mem || start as i64 > end {
                    return Err(VmError::BadHeap { start, words });
                }
                let stack_reg = if stack_reg == 0 { None } else { Some(stack_reg) };
                tracing::debug!(start, end, ?stack_reg, "gc init");
                self.heap = Some(Heap::new(start as u32, end as u32, stack_reg));
            }
            Syscall::GcAlloc => {
                let size = self.get(b)?;
                let addr = self.allocate(size)?;
                self.set(a, addr)?;
            }
            Syscall::GetTotalMemSize => {
                self.set(a, self.memory.len() as i32)?;
            }
            Syscall::Exit => return Ok(Some(self.get(a)?)),
        }
        Ok(None)
    }

    fn allocate(&mut self, size: i32) -> Result<i32, VmError> {
        let bytes = u32::try_from(size).map_err(|_| VmError::OutOfMemory(size))?;
        let heap = self.heap.as_mut().ok_or(VmError::NoHeap)?;
        let addr = match heap.alloc(bytes) {
            Some(addr) => addr,
            None => {
                heap.collect(&self.memory, &self.regs);
                heap.alloc(bytes).ok_or(VmError::OutOfMemory(size))?
            }
        };
        let rounded = (bytes.max(1).div_ceil(WORD_SIZE as u32) * WORD_SIZE as u32) as usize;
        let at = addr as usize;
        self.memory[at..at + rounded].iter_mut().for_each(|b| *b = 0);
        Ok(addr as i32)
    }

    fn read_int(&mut self) -> Result<i32, VmError> {
        while self.input.front().is_some_and(|c| c.is_whitespace()) {
            self.input.pop_front();
        }
        let mut text = String::new();
        if let Some(&sign) = self.input.front().filter(|&&c| c == '-' || c == '+') {
            text.push(sign);
            self.input.pop_front();
        }
        while let Some(&digit) = self.input.front().filter(|c| c.is_ascii_digit()) {
            text.push(digit);
            self.input.pop_front();
        }
        text.parse().map_err(|_| VmError::BadInput)
    }
}
