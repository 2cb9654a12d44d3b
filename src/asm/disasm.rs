//! Disassembler for core programs.
//!
//! Converts instruction words back to readable assembly.

use crate::cpu::decode::{decode, Instruction, Opcode, Operand};

/// Disassemble a single instruction word.
pub fn disassemble_word(word: u32) -> String {
    format_instruction(&decode(word))
}

/// Disassemble a program to a listing with addresses and raw words.
pub fn disassemble(words: &[u32]) -> String {
    let mut output = String::new();
    for (addr, word) in words.iter().enumerate() {
        output.push_str(&format!(
            "{:03}: {:<20} ; 0x{:08x}\n",
            addr,
            disassemble_word(*word),
            word
        ));
    }
    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Branch {
            cond,
            back,
            magnitude,
        } => {
            let displacement = if *back {
                -(*magnitude as i64)
            } else {
                *magnitude as i64
            };
            format!("{} {}", cond.mnemonic(), displacement)
        }
        Instruction::Alu {
            op,
            src1,
            operand2,
            dest,
        } => match op {
            Opcode::Nop => op.mnemonic().to_string(),
            Opcode::Cmp => format!("{} {}, {}", op.mnemonic(), src1, format_operand(operand2)),
            Opcode::Mov => format!("{} {}, {}", op.mnemonic(), dest, format_operand(operand2)),
            _ => format!(
                "{} {}, {}, {}",
                op.mnemonic(),
                dest,
                src1,
                format_operand(operand2)
            ),
        },
    }
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Reg(r) => r.to_string(),
        Operand::Imm(v) => format!("#{}", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;
    use crate::cpu::decode::encode;
    use crate::cpu::registers::Reg;

    #[test]
    fn test_disassemble_alu_forms() {
        let add = encode(&Instruction::Alu {
            op: Opcode::Add,
            src1: Reg::from_bits(0),
            operand2: Operand::Reg(Reg::from_bits(1)),
            dest: Reg::from_bits(2),
        });
        assert_eq!(disassemble_word(add), "ADD R2, R0, R1");

        let mov = encode(&Instruction::Alu {
            op: Opcode::Mov,
            src1: Reg::from_bits(0),
            operand2: Operand::Imm(5),
            dest: Reg::from_bits(1),
        });
        assert_eq!(disassemble_word(mov), "MOV R1, #5");
    }

    #[test]
    fn test_disassemble_branches() {
        let beq = encode(&Instruction::Branch {
            cond: crate::cpu::decode::Condition::Eq,
            back: true,
            magnitude: 3,
        });
        assert_eq!(disassemble_word(beq), "BEQ -3");
    }

    #[test]
    fn test_disassembly_reassembles() {
        let source = "MOV r1, #5\nADD r2, r1, r1\nCMP r2, r1\nBNE -2\nSUB r3, r2, #1";
        let words = assemble(source).unwrap();

        for &word in &words {
            let reassembled = assemble(&disassemble_word(word)).unwrap();
            assert_eq!(reassembled, vec![word]);
        }
    }

    #[test]
    fn test_listing_has_one_line_per_word() {
        let words = assemble("MOV r1, #1\nB -1").unwrap();
        let listing = disassemble(&words);
        assert_eq!(listing.lines().count(), 2);
        assert!(listing.contains("MOV R1, #1"));
        assert!(listing.contains("B -1"));
    }
}
