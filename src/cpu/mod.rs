//! The virtual core.
//!
//! - 16 general-purpose 64-bit registers, a carry flag, six comparison flags
//! - 32-bit big-endian instruction words
//! - branches resolved at fetch time, ALU effects applied after

pub mod decode;
pub mod execute;
pub mod program;
pub mod registers;

pub use decode::{decode, encode, Condition, Instruction, Opcode, Operand};
pub use execute::{Cpu, CpuError, CpuState};
pub use program::{Program, ProgramError};
pub use registers::{Flags, Reg, Registers, REG_COUNT};
