//! Register state files.
//!
//! The initial register snapshot is a text file with one `NAME=VALUE`
//! entry per line (`R4=0x2a`): names are `R0`..`R15` (case-insensitive),
//! values hexadecimal with an optional `0x` prefix. Lines that do not
//! parse (unknown names, bad values, stray text) are skipped, not
//! fatal.

use crate::cpu::registers::Reg;
use std::path::Path;
use thiserror::Error;

/// A parsed register state file.
#[derive(Debug, Clone, Default)]
pub struct StateFile {
    /// Register assignments in file order. A register named twice keeps
    /// the later value when applied through `Registers::load`.
    pub entries: Vec<(Reg, u64)>,
}

impl StateFile {
    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse register state text. Malformed entries are skipped.
pub fn parse_state(source: &str) -> StateFile {
    let mut state = StateFile::default();

    for line in source.lines() {
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let Some(reg) = Reg::from_name(name.trim()) else {
            continue;
        };
        let digits = value.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);
        let Ok(value) = u64::from_str_radix(digits, 16) else {
            continue;
        };
        state.entries.push((reg, value));
    }

    state
}

/// Load and parse a register state file from disk.
pub fn load_state<P: AsRef<Path>>(path: P) -> Result<StateFile, StateError> {
    let source = std::fs::read_to_string(path.as_ref()).map_err(|e| StateError::Io(e.to_string()))?;
    Ok(parse_state(&source))
}

/// Errors from reading a state file.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::Registers;

    fn reg(n: u8) -> Reg {
        Reg::from_bits(n)
    }

    #[test]
    fn test_parse_basic_entries() {
        let state = parse_state("R0=0x10\nR1=0x20\n");
        assert_eq!(state.entries, vec![(reg(0), 0x10), (reg(1), 0x20)]);
    }

    #[test]
    fn test_parse_all_sixteen_registers() {
        let source: String = (0..16).map(|i| format!("R{}=0x{:x}\n", i, i + 1)).collect();
        let state = parse_state(&source);

        assert_eq!(state.len(), 16);
        // R15 loads like any other register.
        assert_eq!(state.entries[15], (reg(15), 0x10));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let state = parse_state(
            "R0=0x10\n\
             R99=0x1\n\
             X2=0x2\n\
             R1=zzz\n\
             no equals sign here\n\
             R2=0x30\n",
        );
        assert_eq!(state.entries, vec![(reg(0), 0x10), (reg(2), 0x30)]);
    }

    #[test]
    fn test_parse_prefix_and_case_variants() {
        let state = parse_state("r3 = a5a5\nR4=0XFF\n");
        assert_eq!(state.entries, vec![(reg(3), 0xa5a5), (reg(4), 0xff)]);
    }

    #[test]
    fn test_entries_apply_to_registers() {
        let state = parse_state("R0=0x0123456789abcdef\nR1=a5a5a5a5a5a5a5a5\n");
        let mut regs = Registers::new();
        regs.load(state.entries);

        assert_eq!(regs.get(reg(0)), 0x0123456789abcdef);
        assert_eq!(regs.get(reg(1)), 0xa5a5a5a5a5a5a5a5);
        assert_eq!(regs.get(reg(2)), 0);
    }
}
