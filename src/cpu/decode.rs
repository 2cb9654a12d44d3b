//! Instruction decoder for the 32-bit instruction word.
//!
//! Bit layout (bit 31 = most significant):
//!
//! | Bits  | Field      | Meaning                                        |
//! |-------|------------|------------------------------------------------|
//! | 31-28 | BCC        | 0 = ALU instruction, nonzero = branch          |
//! | 27    | SIGN       | branch only: 1 = backward displacement         |
//! | 26-0  | OFFSET_MAG | branch only: unsigned displacement magnitude   |
//! | 24    | IMM_FLAG   | ALU only: second operand is the immediate      |
//! | 23-20 | OPCODE     | ALU operation selector                         |
//! | 19-16 | SRC1       | first source register                          |
//! | 15-12 | SRC2       | second source register (ignored with IMM_FLAG) |
//! | 11-8  | DEST       | destination register                           |
//! | 7-0   | IMM        | 8-bit immediate operand                        |
//!
//! Exactly one interpretation applies per word: the BCC field selects
//! branch or ALU. Decoding is total: every word maps to an instruction,
//! with unassigned opcode slots decoding to a no-op and unassigned
//! condition codes to the always-taken condition.

use crate::cpu::registers::{Flags, Reg};
use serde::{Deserialize, Serialize};

const COND_SHIFT: u32 = 28;
const SIGN_BIT: u32 = 1 << 27;
const OFFSET_MASK: u32 = 0x07ff_ffff;
const IMM_FLAG_BIT: u32 = 1 << 24;
const OPCODE_SHIFT: u32 = 20;
const SRC1_SHIFT: u32 = 16;
const SRC2_SHIFT: u32 = 12;
const DEST_SHIFT: u32 = 8;
const FIELD_MASK: u32 = 0x0f;

/// ALU operation selector.
///
/// The four unassigned slots (0xB..0xE) and the reserved 0xF all decode
/// to `Nop`: an unsupported opcode executes with no effect rather than
/// trapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    /// Bitwise AND: dest = op1 & op2
    And,
    /// Bitwise OR: dest = op1 | op2
    Orr,
    /// Bitwise XOR: dest = op1 ^ op2
    Eor,
    /// Addition: dest = op1 + op2, sets carry on unsigned overflow
    Add,
    /// Addition with carry-in: dest = op1 + op2 + carry
    Adc,
    /// Unsigned comparison: sets the six comparison flags, writes no register
    Cmp,
    /// Subtraction: dest = op1 - op2
    Sub,
    /// Subtraction with carry: dest = op1 - op2 + carry - 1
    Sbc,
    /// Move: dest = op2
    Mov,
    /// Logical left shift: dest = op1 << op2
    Lsh,
    /// Logical right shift: dest = op1 >> op2
    Rsh,
    /// No operation (unassigned opcode slots)
    Nop,
}

impl Opcode {
    /// Decode a 4-bit opcode field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0f {
            0x0 => Opcode::And,
            0x1 => Opcode::Orr,
            0x2 => Opcode::Eor,
            0x3 => Opcode::Add,
            0x4 => Opcode::Adc,
            0x5 => Opcode::Cmp,
            0x6 => Opcode::Sub,
            0x7 => Opcode::Sbc,
            0x8 => Opcode::Mov,
            0x9 => Opcode::Lsh,
            0xa => Opcode::Rsh,
            _ => Opcode::Nop,
        }
    }

    /// The 4-bit field value. `Nop` encodes to 0xF, one of the
    /// unassigned slots.
    pub fn bits(self) -> u8 {
        match self {
            Opcode::And => 0x0,
            Opcode::Orr => 0x1,
            Opcode::Eor => 0x2,
            Opcode::Add => 0x3,
            Opcode::Adc => 0x4,
            Opcode::Cmp => 0x5,
            Opcode::Sub => 0x6,
            Opcode::Sbc => 0x7,
            Opcode::Mov => 0x8,
            Opcode::Lsh => 0x9,
            Opcode::Rsh => 0xa,
            Opcode::Nop => 0xf,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::And => "AND",
            Opcode::Orr => "ORR",
            Opcode::Eor => "EOR",
            Opcode::Add => "ADD",
            Opcode::Adc => "ADC",
            Opcode::Cmp => "CMP",
            Opcode::Sub => "SUB",
            Opcode::Sbc => "SBC",
            Opcode::Mov => "MOV",
            Opcode::Lsh => "LSH",
            Opcode::Rsh => "RSH",
            Opcode::Nop => "NOP",
        }
    }

    /// Look up an opcode by mnemonic (uppercase).
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(Opcode::And),
            "ORR" => Some(Opcode::Orr),
            "EOR" => Some(Opcode::Eor),
            "ADD" => Some(Opcode::Add),
            "ADC" => Some(Opcode::Adc),
            "CMP" => Some(Opcode::Cmp),
            "SUB" => Some(Opcode::Sub),
            "SBC" => Some(Opcode::Sbc),
            "MOV" => Some(Opcode::Mov),
            "LSH" => Some(Opcode::Lsh),
            "RSH" => Some(Opcode::Rsh),
            "NOP" => Some(Opcode::Nop),
            _ => None,
        }
    }
}

/// Branch condition, from the 4-bit BCC field of a branch word.
///
/// Codes 9-14 map to the six comparison flags. Every other nonzero
/// value, including 8 (the unconditional branch) and all reserved
/// codes, is taken unconditionally; there is no "never taken" encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Always,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl Condition {
    /// Decode a nonzero BCC field.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0x9 => Condition::Eq,
            0xa => Condition::Ne,
            0xb => Condition::Le,
            0xc => Condition::Ge,
            0xd => Condition::Lt,
            0xe => Condition::Gt,
            _ => Condition::Always,
        }
    }

    /// The canonical BCC field value.
    pub fn bits(self) -> u8 {
        match self {
            Condition::Always => 0x8,
            Condition::Eq => 0x9,
            Condition::Ne => 0xa,
            Condition::Le => 0xb,
            Condition::Ge => 0xc,
            Condition::Lt => 0xd,
            Condition::Gt => 0xe,
        }
    }

    /// Whether the branch is taken under the given flags.
    pub fn holds(self, flags: &Flags) -> bool {
        match self {
            Condition::Always => true,
            Condition::Eq => flags.eq,
            Condition::Ne => flags.ne,
            Condition::Le => flags.le,
            Condition::Ge => flags.ge,
            Condition::Lt => flags.lt,
            Condition::Gt => flags.gt,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Always => "B",
            Condition::Eq => "BEQ",
            Condition::Ne => "BNE",
            Condition::Le => "BLE",
            Condition::Ge => "BGE",
            Condition::Lt => "BL",
            Condition::Gt => "BG",
        }
    }

    /// Look up a condition by mnemonic (uppercase).
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "B" => Some(Condition::Always),
            "BEQ" => Some(Condition::Eq),
            "BNE" => Some(Condition::Ne),
            "BLE" => Some(Condition::Le),
            "BGE" => Some(Condition::Ge),
            "BL" => Some(Condition::Lt),
            "BG" => Some(Condition::Gt),
            _ => None,
        }
    }
}

/// Second operand of an ALU instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// The SRC2 register's value.
    Reg(Reg),
    /// The 8-bit immediate, zero-extended to 64 bits.
    Imm(u8),
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Arithmetic/logic instruction (BCC field zero).
    Alu {
        op: Opcode,
        src1: Reg,
        operand2: Operand,
        dest: Reg,
    },
    /// Branch instruction (BCC field nonzero). The displacement is a
    /// 27-bit magnitude with a separate direction bit.
    Branch {
        cond: Condition,
        back: bool,
        magnitude: u32,
    },
}

impl Instruction {
    /// Whether this word encodes a branch.
    pub fn is_branch(&self) -> bool {
        matches!(self, Instruction::Branch { .. })
    }
}

/// Decode a 32-bit instruction word.
///
/// Pure: produces the instruction record and nothing else. Register
/// values are read later, by the executor.
pub fn decode(word: u32) -> Instruction {
    let cond_bits = (word >> COND_SHIFT) as u8;
    if cond_bits != 0 {
        Instruction::Branch {
            cond: Condition::from_bits(cond_bits),
            back: word & SIGN_BIT != 0,
            magnitude: word & OFFSET_MASK,
        }
    } else {
        let op = Opcode::from_bits((word >> OPCODE_SHIFT) as u8 & FIELD_MASK as u8);
        let src1 = Reg::from_bits((word >> SRC1_SHIFT) as u8 & FIELD_MASK as u8);
        let src2 = Reg::from_bits((word >> SRC2_SHIFT) as u8 & FIELD_MASK as u8);
        let dest = Reg::from_bits((word >> DEST_SHIFT) as u8 & FIELD_MASK as u8);
        let operand2 = if word & IMM_FLAG_BIT != 0 {
            Operand::Imm(word as u8)
        } else {
            Operand::Reg(src2)
        };
        Instruction::Alu {
            op,
            src1,
            operand2,
            dest,
        }
    }
}

/// Encode an instruction back to a 32-bit word.
///
/// Exact inverse of [`decode`] on the represented fields.
pub fn encode(instr: &Instruction) -> u32 {
    match instr {
        Instruction::Branch {
            cond,
            back,
            magnitude,
        } => {
            let mut word = (cond.bits() as u32) << COND_SHIFT;
            if *back {
                word |= SIGN_BIT;
            }
            word | (magnitude & OFFSET_MASK)
        }
        Instruction::Alu {
            op,
            src1,
            operand2,
            dest,
        } => {
            let mut word = (op.bits() as u32) << OPCODE_SHIFT
                | (src1.bits() as u32) << SRC1_SHIFT
                | (dest.bits() as u32) << DEST_SHIFT;
            match operand2 {
                Operand::Reg(r) => word |= (r.bits() as u32) << SRC2_SHIFT,
                Operand::Imm(v) => word |= IMM_FLAG_BIT | *v as u32,
            }
            word
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reg(n: u8) -> Reg {
        Reg::from_bits(n)
    }

    #[test]
    fn test_decode_alu_register_form() {
        // ADD R2, R0, R1: opcode 3, src1 0, src2 1, dest 2
        let word = 0x0030_1200;
        let instr = decode(word);
        assert_eq!(
            instr,
            Instruction::Alu {
                op: Opcode::Add,
                src1: reg(0),
                operand2: Operand::Reg(reg(1)),
                dest: reg(2),
            }
        );
    }

    #[test]
    fn test_decode_alu_immediate_form() {
        // MOV R1, #5: imm flag, opcode 8, dest 1, imm 5
        let word = 0x0180_0105;
        let instr = decode(word);
        assert_eq!(
            instr,
            Instruction::Alu {
                op: Opcode::Mov,
                src1: reg(0),
                operand2: Operand::Imm(5),
                dest: reg(1),
            }
        );
    }

    #[test]
    fn test_decode_branch_forward() {
        // BEQ +3: cond 9, sign clear, magnitude 3
        let word = 0x9000_0003;
        assert_eq!(
            decode(word),
            Instruction::Branch {
                cond: Condition::Eq,
                back: false,
                magnitude: 3,
            }
        );
    }

    #[test]
    fn test_decode_branch_backward_full_magnitude() {
        let word = 0x8800_0000 | 0x07ff_ffff;
        assert_eq!(
            decode(word),
            Instruction::Branch {
                cond: Condition::Always,
                back: true,
                magnitude: 0x07ff_ffff,
            }
        );
    }

    #[test]
    fn test_reserved_condition_codes_decode_to_always() {
        for bits in [1u8, 2, 3, 4, 5, 6, 7, 8, 15] {
            let word = (bits as u32) << 28 | 2;
            match decode(word) {
                Instruction::Branch { cond, .. } => assert_eq!(cond, Condition::Always),
                other => panic!("expected branch, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unassigned_opcode_decodes_to_nop() {
        for bits in [0xbu32, 0xc, 0xd, 0xe, 0xf] {
            let word = bits << 20;
            match decode(word) {
                Instruction::Alu { op, .. } => assert_eq!(op, Opcode::Nop),
                other => panic!("expected ALU, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_condition_default_taken() {
        let flags = Flags::default();
        assert!(Condition::Always.holds(&flags));
        assert!(!Condition::Eq.holds(&flags));
        assert!(Condition::from_bits(0x7).holds(&flags));
        assert!(Condition::from_bits(0xf).holds(&flags));
    }

    #[test]
    fn test_immediate_ignores_src2_field() {
        // Word with both SRC2 and IMM populated and the flag set: the
        // operand must come from the immediate.
        let word = 0x0130_7205;
        match decode(word) {
            Instruction::Alu { operand2, .. } => assert_eq!(operand2, Operand::Imm(5)),
            other => panic!("expected ALU, got {:?}", other),
        }
    }

    fn arb_opcode() -> impl Strategy<Value = Opcode> {
        (0u8..=11).prop_map(|n| match n {
            0 => Opcode::And,
            1 => Opcode::Orr,
            2 => Opcode::Eor,
            3 => Opcode::Add,
            4 => Opcode::Adc,
            5 => Opcode::Cmp,
            6 => Opcode::Sub,
            7 => Opcode::Sbc,
            8 => Opcode::Mov,
            9 => Opcode::Lsh,
            10 => Opcode::Rsh,
            _ => Opcode::Nop,
        })
    }

    fn arb_condition() -> impl Strategy<Value = Condition> {
        (0u8..=6).prop_map(|n| match n {
            0 => Condition::Always,
            1 => Condition::Eq,
            2 => Condition::Ne,
            3 => Condition::Le,
            4 => Condition::Ge,
            5 => Condition::Lt,
            _ => Condition::Gt,
        })
    }

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            (
                arb_opcode(),
                0u8..16,
                prop_oneof![
                    (0u8..16).prop_map(|n| Operand::Reg(Reg::from_bits(n))),
                    any::<u8>().prop_map(Operand::Imm),
                ],
                0u8..16,
            )
                .prop_map(|(op, src1, operand2, dest)| Instruction::Alu {
                    op,
                    src1: Reg::from_bits(src1),
                    operand2,
                    dest: Reg::from_bits(dest),
                }),
            (arb_condition(), any::<bool>(), 0u32..=0x07ff_ffff).prop_map(
                |(cond, back, magnitude)| Instruction::Branch {
                    cond,
                    back,
                    magnitude,
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(instr in arb_instruction()) {
            prop_assert_eq!(decode(encode(&instr)), instr);
        }

        #[test]
        fn prop_opcode_bits_roundtrip(bits in 0u8..16) {
            let op = Opcode::from_bits(bits);
            // Assigned slots survive a field roundtrip; unassigned
            // slots all collapse to the canonical Nop encoding.
            prop_assert_eq!(Opcode::from_bits(op.bits()), op);
        }
    }
}
