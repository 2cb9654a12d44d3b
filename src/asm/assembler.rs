//! Two-pass assembler for core programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! MOV r1, #5          ; dest = immediate (the # is optional)
//! MOV r2, r1          ; dest = register
//! ADD r3, r1, r2      ; dest, src1, src2
//! ADD r3, r1, 200     ; dest, src1, immediate (0-255)
//! CMP r1, r3          ; op1, op2 -- no destination
//! LOOP:               ; label
//!     SUB r3, r3, #1
//!     CMP r3, r0
//!     BNE LOOP        ; branch to label, or a signed offset: BNE -2
//! ```

use crate::cpu::decode::{decode, encode, Condition, Instruction, Opcode, Operand};
use crate::cpu::registers::Reg;
use std::collections::HashMap;
use thiserror::Error;

/// Largest branch displacement magnitude the word can hold (27 bits).
const MAX_BRANCH_MAGNITUDE: i64 = 0x07ff_ffff;

/// Assemble source text to a list of instruction words.
pub fn assemble(source: &str) -> Result<Vec<u32>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> instruction index).
    symbols: HashMap<String, i64>,
    /// Branches waiting for a label: (output index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output instruction words.
    output: Vec<u32>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u32>, AssemblerError> {
        // Pass 1: collect labels and generate code.
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve label references into displacements.
        self.resolve_references()?;

        Ok(self.output.clone())
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Strip inline comments first.
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        // Label definition, possibly followed by an instruction.
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !label.is_empty() {
                self.symbols.insert(label, self.output.len() as i64);
            }

            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m.to_uppercase(), rest.trim()),
            None => (line.to_uppercase(), ""),
        };
        let operands: Vec<&str> = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let instr = if let Some(cond) = Condition::from_mnemonic(&mnemonic) {
            self.parse_branch(cond, &operands, line_num)?
        } else if let Some(op) = Opcode::from_mnemonic(&mnemonic) {
            self.parse_alu(op, &operands, line_num)?
        } else {
            return Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic,
            });
        };

        self.output.push(encode(&instr));
        Ok(())
    }

    fn parse_branch(
        &mut self,
        cond: Condition,
        operands: &[&str],
        line_num: usize,
    ) -> Result<Instruction, AssemblerError> {
        let [target] = operands else {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: "branch takes one offset or label".into(),
            });
        };

        if let Ok(offset) = parse_int(target) {
            if offset.abs() > MAX_BRANCH_MAGNITUDE {
                return Err(AssemblerError::ValueOutOfRange {
                    line: line_num,
                    value: offset,
                });
            }
            return Ok(Instruction::Branch {
                cond,
                back: offset < 0,
                magnitude: offset.unsigned_abs() as u32,
            });
        }

        // Label reference: emit a placeholder branch and fix the
        // displacement in pass 2.
        self.pending
            .push((self.output.len(), target.to_uppercase(), line_num));
        Ok(Instruction::Branch {
            cond,
            back: false,
            magnitude: 0,
        })
    }

    fn parse_alu(
        &mut self,
        op: Opcode,
        operands: &[&str],
        line_num: usize,
    ) -> Result<Instruction, AssemblerError> {
        let zero = Reg::from_bits(0);
        let (dest, src1, op2_text) = match op {
            // CMP has no destination: op1, op2.
            Opcode::Cmp => {
                let [op1, op2] = operands else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "CMP takes two operands".into(),
                    });
                };
                (zero, self.parse_register(op1, line_num)?, *op2)
            }
            // MOV has no first source: dest, op2.
            Opcode::Mov => {
                let [dest, op2] = operands else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "MOV takes a destination and one operand".into(),
                    });
                };
                (self.parse_register(dest, line_num)?, zero, *op2)
            }
            Opcode::Nop => {
                if !operands.is_empty() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "NOP takes no operands".into(),
                    });
                }
                return Ok(Instruction::Alu {
                    op,
                    src1: zero,
                    operand2: Operand::Reg(zero),
                    dest: zero,
                });
            }
            _ => {
                let [dest, src1, op2] = operands else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!(
                            "{} takes a destination and two operands",
                            op.mnemonic()
                        ),
                    });
                };
                (
                    self.parse_register(dest, line_num)?,
                    self.parse_register(src1, line_num)?,
                    *op2,
                )
            }
        };

        let operand2 = self.parse_operand2(op2_text, line_num)?;
        Ok(Instruction::Alu {
            op,
            src1,
            operand2,
            dest,
        })
    }

    fn parse_register(&self, text: &str, line_num: usize) -> Result<Reg, AssemblerError> {
        Reg::from_name(text).ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("expected a register r0-r15, found `{}`", text),
        })
    }

    /// Second operand: a register, or an immediate with optional `#`.
    fn parse_operand2(&self, text: &str, line_num: usize) -> Result<Operand, AssemblerError> {
        if let Some(reg) = Reg::from_name(text) {
            return Ok(Operand::Reg(reg));
        }

        let literal = text.strip_prefix('#').unwrap_or(text);
        let value = parse_int(literal).map_err(|_| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("expected a register or immediate, found `{}`", text),
        })?;
        if !(0..=u8::MAX as i64).contains(&value) {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value,
            });
        }
        Ok(Operand::Imm(value as u8))
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let target = *self.symbols.get(label).ok_or_else(|| {
                AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                }
            })?;

            let displacement = target - *out_idx as i64;
            if displacement.abs() > MAX_BRANCH_MAGNITUDE {
                return Err(AssemblerError::ValueOutOfRange {
                    line: *line_num,
                    value: displacement,
                });
            }

            // Re-encode the placeholder with the resolved displacement,
            // keeping its condition.
            if let Instruction::Branch { cond, .. } = decode(self.output[*out_idx]) {
                self.output[*out_idx] = encode(&Instruction::Branch {
                    cond,
                    back: displacement < 0,
                    magnitude: displacement.unsigned_abs() as u32,
                });
            }
        }
        Ok(())
    }
}

/// Parse a signed integer literal, decimal or `0x` hex.
fn parse_int(text: &str) -> Result<i64, std::num::ParseIntError> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)?
    } else {
        digits.parse::<i64>()?
    };
    Ok(sign * value)
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}
