//! Execution engine: the fetch-decode-execute cycle.
//!
//! Each cycle reads one word at the program counter, decodes it, commits
//! the next program counter (branches resolve here, during fetch), and
//! then applies the ALU effect. The machine stops when the program
//! counter leaves [0, word_count): past the end is normal completion, a
//! negative value is the error terminal state.

use crate::cpu::decode::{self, Instruction, Opcode, Operand};
use crate::cpu::program::{Program, ProgramError};
use crate::cpu::registers::{Flags, Reg, Registers};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal classification of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// The program counter is inside the instruction range.
    Running,
    /// The program counter ran past the end of the program.
    Completed,
    /// A branch drove the program counter negative, or a fetch failed.
    Error,
}

/// The virtual core: register file, program image, and control state.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Register file, carry, comparison flags, and program counter.
    pub regs: Registers,
    /// The instruction stream. Read-only during execution.
    pub program: Program,
    /// Current control state.
    pub state: CpuState,
    /// Instructions executed so far.
    pub cycles: u64,
    /// Last executed instruction, for tracing.
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a core over a program image, with zeroed registers and
    /// the program counter at the first instruction.
    pub fn new(program: Program) -> Self {
        let state = if program.is_empty() {
            CpuState::Completed
        } else {
            CpuState::Running
        };
        Self {
            regs: Registers::new(),
            program,
            state,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset registers, flags, program counter, and cycle count. The
    /// loaded program is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.state = if self.program.is_empty() {
            CpuState::Completed
        } else {
            CpuState::Running
        };
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Bulk-load named registers before the run starts.
    pub fn load_registers<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Reg, u64)>,
    {
        self.regs.load(entries);
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// Returns the instruction that was executed. The program counter
    /// is committed during fetch, before any ALU effect is applied.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let word = match self.program.fetch(self.regs.pc) {
            Ok(word) => word,
            Err(e) => {
                self.state = CpuState::Error;
                return Err(e.into());
            }
        };
        let instr = decode::decode(word);

        // Fetch owns the program counter: a taken branch lands here,
        // everything else falls through to the next word.
        self.regs.pc = self.next_pc(&instr);
        self.execute(&instr);

        self.cycles += 1;
        self.last_instr = Some(instr);
        self.sync_state();

        Ok(instr)
    }

    /// Run until the machine leaves the running state. Returns the
    /// number of instructions executed.
    ///
    /// A negative program counter is a terminal state, not an `Err`:
    /// inspect [`Cpu::state`] after the run.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start = self.cycles;
        while self.state == CpuState::Running {
            self.step()?;
        }
        Ok(self.cycles - start)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);
        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }
        Ok(self.cycles - start)
    }

    /// The program counter after `instr`, evaluated against the current
    /// flags.
    fn next_pc(&self, instr: &Instruction) -> i64 {
        match instr {
            Instruction::Branch {
                cond,
                back,
                magnitude,
            } if cond.holds(&self.regs.flags) => {
                let displacement = *magnitude as i64;
                if *back {
                    self.regs.pc - displacement
                } else {
                    self.regs.pc + displacement
                }
            }
            _ => self.regs.pc + 1,
        }
    }

    /// Apply the ALU effect of a decoded instruction. Branch words have
    /// none: their whole effect was the PC update in fetch.
    fn execute(&mut self, instr: &Instruction) {
        let Instruction::Alu {
            op,
            src1,
            operand2,
            dest,
        } = instr
        else {
            return;
        };

        let op1 = self.regs.get(*src1);
        let op2 = match operand2 {
            Operand::Reg(r) => self.regs.get(*r),
            Operand::Imm(v) => *v as u64,
        };

        match op {
            Opcode::And => self.regs.set(*dest, op1 & op2),
            Opcode::Orr => self.regs.set(*dest, op1 | op2),
            Opcode::Eor => self.regs.set(*dest, op1 ^ op2),
            Opcode::Add => {
                let result = op1.wrapping_add(op2);
                self.regs.carry = result < op1 || result < op2;
                self.regs.set(*dest, result);
            }
            Opcode::Adc => {
                let result = op1.wrapping_add(op2).wrapping_add(self.regs.carry as u64);
                // Overflow is judged against the two raw operands; the
                // carry-in does not participate in the test.
                self.regs.carry = result < op1 || result < op2;
                self.regs.set(*dest, result);
            }
            Opcode::Cmp => {
                self.regs.flags = Flags::compare(op1, op2);
            }
            Opcode::Sub => self.regs.set(*dest, op1.wrapping_sub(op2)),
            Opcode::Sbc => {
                let result = op1
                    .wrapping_sub(op2)
                    .wrapping_add(self.regs.carry as u64)
                    .wrapping_sub(1);
                self.regs.set(*dest, result);
            }
            Opcode::Mov => self.regs.set(*dest, op2),
            // Shift counts are taken modulo 64.
            Opcode::Lsh => self.regs.set(*dest, op1.wrapping_shl(op2 as u32)),
            Opcode::Rsh => self.regs.set(*dest, op1.wrapping_shr(op2 as u32)),
            Opcode::Nop => {}
        }
    }

    /// Re-derive the control state from the committed program counter.
    fn sync_state(&mut self) {
        if self.regs.pc < 0 {
            self.state = CpuState::Error;
        } else if self.regs.pc >= self.program.word_count() {
            self.state = CpuState::Completed;
        }
    }

    /// The last executed instruction, if any.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Whether the machine is still running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Whether the machine ran to normal completion.
    pub fn is_completed(&self) -> bool {
        self.state == CpuState::Completed
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur while driving the core.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    /// Stepping a machine that already reached a terminal state.
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    /// The program image failed to yield a whole word.
    #[error("program error: {0}")]
    Program(#[from] ProgramError),
}
