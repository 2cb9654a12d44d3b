//! # vcore
//!
//! An emulator for a 64-bit virtual core: 16 general-purpose registers,
//! a carry flag, six comparison flags, and fixed-width 32-bit
//! big-endian instruction words.
//!
//! The machine fetches one word per cycle, resolves branches during
//! fetch (the program counter is committed before any ALU effect), and
//! stops when the program counter leaves the instruction range:
//! past the end is normal completion, negative is the error state.

pub mod asm;
pub mod cpu;
pub mod state;

// Re-export commonly used types
pub use cpu::{
    decode, encode, Condition, Cpu, CpuError, CpuState, Flags, Instruction, Opcode, Operand,
    Program, ProgramError, Reg, Registers, REG_COUNT,
};
pub use asm::{assemble, disassemble, disassemble_word, load_image, save_image, AssemblerError};
pub use state::{load_state, parse_state, StateFile};
