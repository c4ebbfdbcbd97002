//! Arithmetic and logic shared by the register and immediate instruction
//! forms.

use crate::machine::VmError;
use misc_core::risc::OpCode;

#[derive(Debug, Clone, Copy)]
pub enum Alu {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Cmp,
    Or,
    And,
    Bic,
    Xor,
    Lsh,
    Ash,
}

#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Register,
    Signed,
    Unsigned,
}

pub fn decode_alu(op: OpCode) -> Option<(Alu, Operand)> {
    use OpCode::*;
    Some(match op {
        Add => (Alu::Add, Operand::Register),
        Sub => (Alu::Sub, Operand::Register),
        Mul => (Alu::Mul, Operand::Register),
        Div => (Alu::Div, Operand::Register),
        Mod => (Alu::Mod, Operand::Register),
        Cmp => (Alu::Cmp, Operand::Register),
        Or => (Alu::Or, Operand::Register),
        And => (Alu::And, Operand::Register),
        Bic => (Alu::Bic, Operand::Register),
        Xor => (Alu::Xor, Operand::Register),
        Lsh => (Alu::Lsh, Operand::Register),
        Ash => (Alu::Ash, Operand::Register),
        Addi => (Alu::Add, Operand::Signed),
        Subi => (Alu::Sub, Operand::Signed),
        Muli => (Alu::Mul, Operand::Signed),
        Divi => (Alu::Div, Operand::Signed),
        Modi => (Alu::Mod, Operand::Signed),
        Cmpi => (Alu::Cmp, Operand::Signed),
        Ori => (Alu::Or, Operand::Signed),
        Andi => (Alu::And, Operand::Signed),
        Bici => (Alu::Bic, Operand::Signed),
        Xori => (Alu::Xor, Operand::Signed),
        Lshi => (Alu::Lsh, Operand::Signed),
        Ashi => (Alu::Ash, Operand::Signed),
        Addiu => (Alu::Add, Operand::Unsigned),
        Subiu => (Alu::Sub, Operand::Unsigned),
        Muliu => (Alu::Mul, Operand::Unsigned),
        Diviu => (Alu::Div, Operand::Unsigned),
        Modiu => (Alu::Mod, Operand::Unsigned),
        Cmpiu => (Alu::Cmp, Operand::Unsigned),
        Oriu => (Alu::Or, Operand::Unsigned),
        Andiu => (Alu::And, Operand::Unsigned),
        Biciu => (Alu::Bic, Operand::Unsigned),
        Xoriu => (Alu::Xor, Operand::Unsigned),
        _ => return None,
    })
}

/// `x << n` for positive `n`, otherwise a right shift by `-n`.
pub fn shift(x: i32, n: i32, arithmetic: bool) -> i32 {
    if n >= 0 {
        if n >= 32 { 0 } else { x << n }
    } else {
        let n = n.unsigned_abs();
        if arithmetic {
            x >> n.min(31)
        } else if n >= 32 {
            0
        } else {
            ((x as u32) >> n) as i32
        }
    }
}

/// Apply `op` to `x` and `y`. `pc` names the faulting instruction.
pub fn apply(op: Alu, x: i32, y: i32, pc: i32) -> Result<i32, VmError> {
    Ok(match op {
        Alu::Add => x.wrapping_add(y),
        Alu::Sub => x.wrapping_sub(y),
        Alu::Mul => x.wrapping_mul(y),
        Alu::Div | Alu::Mod if y == 0 => return Err(VmError::DivisionByZero(pc)),
        Alu::Div => x.wrapping_div(y),
        Alu::Mod => x.wrapping_rem(y),
        Alu::Cmp => x.cmp(&y) as i32,
        Alu::Or => x | y,
        Alu::And => x & y,
        Alu::Bic => x & !y,
        Alu::Xor => x ^ y,
        Alu::Lsh => shift(x, y, false),
        Alu::Ash => shift(x, y, true),
    })
}
