//! RISC target description.
//! Word-addressed register machine: 32 registers, 4-byte words, syscalls for I/O and the heap.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumIter};

/// Size of a machine word in bytes. Instructions occupy one word each.
pub const WORD_SIZE: i32 = 4;

/// Number of registers in the register file.
pub const REG_COUNT: usize = 32;

/// A register number.
pub type Reg = u8;

/// Register: hard-wired zero.
pub const ZERO: Reg = 0;
/// Register: function return value.
pub const RES: Reg = 29;
/// Register: stack pointer. Pushes pre-decrement, the stack grows downwards.
pub const SP: Reg = 30;
/// Register: return address, written by `bsr`/`jsr`.
pub const LNK: Reg = 31;

/// Lowest register handed out by the allocator.
pub const ALLOC_MIN: Reg = 1;
/// Highest register handed out by the allocator.
pub const ALLOC_MAX: Reg = 28;

/// Immediates strictly inside this window fit a single `addi`.
pub const IMM_LIMIT: i32 = 32768;

/// Opcodes of the RISC machine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum OpCode {
    // Register arithmetic / logic
    Add = 0,   // a = b + c
    Sub = 1,   // a = b - c
    Mul = 2,   // a = b * c
    Div = 3,   // a = b / c
    Mod = 4,   // a = b % c
    Cmp = 5,   // a = sign(b - c)
    Or = 8,    // a = b | c
    And = 9,   // a = b & c
    Bic = 10,  // a = b & !c
    Xor = 11,  // a = b ^ c
    Lsh = 12,  // a = c > 0 ? b << c : b >>> -c
    Ash = 13,  // a = c > 0 ? b << c : b >> -c
    Chk = 14,  // trap unless 0 <= a < c

    // Signed immediate forms
    Addi = 16,
    Subi = 17,
    Muli = 18,
    Divi = 19,
    Modi = 20,
    Cmpi = 21,
    Ori = 24,
    Andi = 25,
    Bici = 26,
    Xori = 27,
    Lshi = 28,
    Ashi = 29,
    Chki = 30,

    // Unsigned immediate forms
    Addiu = 54,
    Subiu = 55,
    Muliu = 56,
    Diviu = 57,
    Modiu = 58,
    Cmpiu = 59,
    Oriu = 60,
    Andiu = 61,
    Biciu = 62,
    Xoriu = 63,
    Chkiu = 39,

    // Load / store
    Ldw = 32,  // a = word[b + c]
    Ldb = 33,  // a = byte[b + c]
    Pop = 34,  // a = word[b]; b += c
    Stw = 36,  // word[b + c] = a
    Stb = 37,  // byte[b + c] = a
    Psh = 38,  // b -= c; word[b] = a

    // Control
    Beq = 40,  // if a == 0: pc += 4 * c
    Bne = 41,  // if a != 0
    Blt = 42,  // if a < 0
    Bge = 43,  // if a >= 0
    Ble = 44,  // if a <= 0
    Bgt = 45,  // if a > 0
    Bsr = 46,  // LNK = pc + 4; pc += 4 * c
    Jsr = 48,  // LNK = pc + 4; pc = 4 * c
    Ret = 49,  // pc = reg[c]

    // Miscellaneous
    Break = 6,
    Syscall = 7, // invoke system function c with registers a, b
}

impl OpCode {
    /// Numeric encoding of the opcode.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Branch-class instructions carry a pc-relative word offset in `c`,
    /// the only operand a fixup may rewrite.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            OpCode::Beq
                | OpCode::Bne
                | OpCode::Blt
                | OpCode::Bge
                | OpCode::Ble
                | OpCode::Bgt
                | OpCode::Bsr
        )
    }

    /// Conditional branch that fires when the tested relation is false,
    /// i.e. the inverse sense. `None` for non-conditional opcodes.
    pub fn negated_branch(self) -> Option<OpCode> {
        Some(match self {
            OpCode::Beq => OpCode::Bne,
            OpCode::Bne => OpCode::Beq,
            OpCode::Blt => OpCode::Bge,
            OpCode::Bge => OpCode::Blt,
            OpCode::Ble => OpCode::Bgt,
            OpCode::Bgt => OpCode::Ble,
            _ => return None,
        })
    }
}

/// System functions reachable through `syscall a b <code>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum Syscall {
    /// a = next input character, or -1 at end of input
    IoRdChr = 1,
    /// a = next input integer
    IoRdInt = 2,
    /// write character with code a
    IoWrChr = 6,
    /// write integer a, space padded to width b
    IoWrInt = 7,
    /// heap starts at a; b & 0x07FF_FFFF words (0: to end of memory);
    /// b >>> 27 names the stack pointer register (0: no stack)
    GcInit = 11,
    /// a = address of a zeroed block of at least b bytes
    GcAlloc = 12,
    /// a = memory size in bytes
    GetTotalMemSize = 13,
    /// terminate with status a
    Exit = 19,
}

impl Syscall {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Syscall> {
        use strum::IntoEnumIterator;
        Syscall::iter().find(|s| s.code() == code)
    }
}

/// A fixed-format instruction. Unset operands are `None` and are omitted
/// from the textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: OpCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<i32>,
}

impl Instruction {
    pub fn new(op: OpCode) -> Self { Self { op, a: None, b: None, c: None } }
    pub fn c(op: OpCode, c: i32) -> Self { Self { op, a: None, b: None, c: Some(c) } }
    pub fn ac(op: OpCode, a: i32, c: i32) -> Self { Self { op, a: Some(a), b: None, c: Some(c) } }
    pub fn abc(op: OpCode, a: i32, b: i32, c: i32) -> Self { Self { op, a: Some(a), b: Some(b), c: Some(c) } }

    /// Operand value, treating an unset slot as zero.
    pub fn a_val(&self) -> i32 { self.a.unwrap_or(0) }
    pub fn b_val(&self) -> i32 { self.b.unwrap_or(0) }
    pub fn c_val(&self) -> i32 { self.c.unwrap_or(0) }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for operand in [self.a, self.b, self.c].into_iter().flatten() {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// Render an instruction stream as `/* 0000 */ mnemonic operands` lines.
pub fn listing(code: &[Instruction]) -> String {
    let mut out = String::new();
    for (i, instr) in code.iter().enumerate() {
        out.push_str(&format!("/* {:04} */ {}\n", i as i32 * WORD_SIZE, instr));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mnemonics_are_lowercase() {
        assert_eq!(OpCode::Addiu.to_string(), "addiu");
        assert_eq!(OpCode::Syscall.to_string(), "syscall");
        assert_eq!(OpCode::Break.to_string(), "break");
    }

    #[test]
    fn test_opcode_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for op in OpCode::iter() {
            assert!(seen.insert(op.code()), "duplicate code for {:?}", op);
        }
        assert_eq!(OpCode::Beq.code(), 40);
        assert_eq!(OpCode::Chkiu.code(), 39);
    }

    #[test]
    fn test_negated_branch_is_an_involution() {
        for op in OpCode::iter() {
            if let Some(neg) = op.negated_branch() {
                assert!(neg.is_branch());
                assert_eq!(neg.negated_branch(), Some(op));
            }
        }
        assert_eq!(OpCode::Bsr.negated_branch(), None);
    }

    #[test]
    fn test_display_skips_unset_operands() {
        assert_eq!(Instruction::c(OpCode::Ret, 31).to_string(), "ret 31");
        assert_eq!(Instruction::ac(OpCode::Beq, 0, -3).to_string(), "beq 0 -3");
        assert_eq!(Instruction::abc(OpCode::Addi, 1, 0, 100).to_string(), "addi 1 0 100");
        assert_eq!(Instruction::new(OpCode::Break).to_string(), "break");
    }

    #[test]
    fn test_listing_pads_byte_offsets() {
        let code = vec![
            Instruction::abc(OpCode::Addi, 1, 0, 7),
            Instruction::c(OpCode::Ret, 0),
        ];
        assert_eq!(listing(&code), "/* 0000 */ addi 1 0 7\n/* 0004 */ ret 0\n");
    }

    #[test]
    fn test_syscall_lookup() {
        assert_eq!(Syscall::from_code(12), Some(Syscall::GcAlloc));
        assert_eq!(Syscall::from_code(3), None);
        assert_eq!(Syscall::Exit.to_string(), "EXIT");
    }

    #[test]
    fn test_instruction_json_omits_unset_operands() {
        let json = serde_json::to_string(&Instruction::c(OpCode::Ret, 31)).unwrap();
        assert_eq!(json, r#"{"op":"ret","c":31}"#);
    }
}
