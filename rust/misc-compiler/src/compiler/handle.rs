//! Where a just-lowered value lives, and how to force it into a register
//! or a branch decision.

use crate::compiler::code::Code;
use crate::GenerateError;
use misc_core::risc::{Instruction, OpCode, Reg, IMM_LIMIT, LNK, SP, WORD_SIZE, ZERO};

/// A compare residue together with the branch that fires when the tested
/// relation does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cond {
    pub reg: Reg,
    pub branch: OpCode,
}

impl Cond {
    pub fn new(reg: Reg, branch: OpCode) -> Self {
        Self { reg, branch }
    }

    /// Emit the skip branch and give up the residue register. Returns the
    /// site to fix up once the end of the skipped code is known.
    pub fn jump_if_false(self, code: &mut Code) -> Result<i32, GenerateError> {
        let site = code.emit(Instruction::ac(self.branch, self.reg as i32, 0));
        code.release(self.reg)?;
        Ok(site)
    }

    /// Turn the condition into 0 or 1 in its own register.
    pub fn load(self, code: &mut Code) -> Result<Reg, GenerateError> {
        let r = self.reg as i32;
        let to_false = code.emit(Instruction::ac(self.branch, r, 0));
        code.emit(Instruction::abc(OpCode::Addi, r, 0, 1));
        let past = code.emit(Instruction::ac(OpCode::Beq, 0, 0));
        code.fixup(to_false, code.pc())?;
        code.emit(Instruction::abc(OpCode::Addi, r, 0, 0));
        code.fixup(past, code.pc())?;
        Ok(self.reg)
    }

    /// Same residue, opposite sense.
    pub fn negate(self) -> Self {
        Self { reg: self.reg, branch: self.branch.negated_branch().unwrap_or(self.branch) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Register(Reg),
    Immediate(i32),
    /// Stack size recorded when the slot was pushed.
    Stack(i32),
    Cond(Cond),
}

impl Handle {
    /// Force the value into a register.
    pub fn load(self, code: &mut Code) -> Result<Reg, GenerateError> {
        match self {
            Handle::Register(reg) => Ok(reg),
            Handle::Immediate(value) => {
                let reg = code.acquire()?;
                load_immediate(code, reg, value);
                Ok(reg)
            }
            Handle::Stack(offset) => {
                let reg = code.acquire()?;
                let disp = code.stack_size() - offset;
                code.emit(Instruction::abc(OpCode::Ldw, reg as i32, SP as i32, disp));
                Ok(reg)
            }
            Handle::Cond(cond) => cond.load(code),
        }
    }

    /// View the value as a branch decision. Plain values are false when zero.
    pub fn to_cond(self, code: &mut Code) -> Result<Cond, GenerateError> {
        match self {
            Handle::Cond(cond) => Ok(cond),
            other => Ok(Cond::new(other.load(code)?, OpCode::Beq)),
        }
    }

    /// Jump to the code address this value holds, returning right after.
    pub fn call(self, code: &mut Code) -> Result<(), GenerateError> {
        let target = self.load(code)?;
        code.release(target)?;
        let return_to = code.pc() + 2 * WORD_SIZE;
        code.emit(Instruction::abc(OpCode::Addi, LNK as i32, ZERO as i32, return_to));
        code.emit(Instruction::c(OpCode::Ret, target as i32));
        Ok(())
    }

    /// Give back whatever register the value occupies.
    pub fn release(self, code: &mut Code) -> Result<(), GenerateError> {
        match self {
            Handle::Register(reg) | Handle::Cond(Cond { reg, .. }) => code.release(reg),
            Handle::Immediate(_) | Handle::Stack(_) => Ok(()),
        }
    }
}

/// Emit the constant load. Values outside the signed 16-bit window are
/// built from their high half shifted up and their low half added unsigned.
pub fn load_immediate(code: &mut Code, reg: Reg, value: i32) {
    let r = reg as i32;
    if -IMM_LIMIT < value && value < IMM_LIMIT {
        code.emit(Instruction::abc(OpCode::Addi, r, ZERO as i32, value));
    } else {
        code.emit(Instruction::abc(OpCode::Addi, r, ZERO as i32, value >> 16));
        code.emit(Instruction::abc(OpCode::Lshi, r, r, 16));
        code.emit(Instruction::abc(OpCode::Addiu, r, r, value & 0xFFFF));
    }
}
