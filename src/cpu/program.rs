//! Read-only program image.
//!
//! A program is a flat byte stream of 32-bit big-endian words, one
//! instruction per word. The image is consumed purely by index; the
//! executor never writes back to it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of one instruction word in bytes.
pub const WORD_SIZE: usize = 4;

/// An immutable instruction stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    /// Wrap a raw byte stream. A trailing partial word is kept in the
    /// buffer but never addressable through [`Program::fetch`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build an image from already-decoded words (stored big-endian).
    pub fn from_words(words: &[u32]) -> Self {
        let mut bytes = Vec::with_capacity(words.len() * WORD_SIZE);
        for word in words {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        Self { bytes }
    }

    /// Number of whole instruction words in the image.
    pub fn word_count(&self) -> i64 {
        (self.bytes.len() / WORD_SIZE) as i64
    }

    /// Whether the image contains no whole word.
    pub fn is_empty(&self) -> bool {
        self.word_count() == 0
    }

    /// The raw byte stream.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read the word at `index`, converting from the stored big-endian
    /// byte order.
    ///
    /// Fails with [`ProgramError::TruncatedRead`] when the 4-byte span
    /// at `index * 4` is not fully inside the image (including any
    /// negative index).
    pub fn fetch(&self, index: i64) -> Result<u32, ProgramError> {
        let start = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(WORD_SIZE))
            .ok_or(ProgramError::TruncatedRead { index })?;
        let bytes = start
            .checked_add(WORD_SIZE)
            .and_then(|end| self.bytes.get(start..end))
            .ok_or(ProgramError::TruncatedRead { index })?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Decode the whole image to words, for disassembly.
    pub fn words(&self) -> Vec<u32> {
        (0..self.word_count()).filter_map(|i| self.fetch(i).ok()).collect()
    }
}

/// Errors from reading the program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// The image has no complete word at the requested index. Cannot
    /// happen from the execution loop on a well-formed image, but must
    /// stop the machine rather than panic when it does.
    #[error("truncated read: no complete instruction word at index {index}")]
    TruncatedRead { index: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_is_big_endian() {
        let program = Program::from_bytes(vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(program.fetch(0), Ok(0x1234_5678));
    }

    #[test]
    fn test_word_count_floors_partial_word() {
        let program = Program::from_bytes(vec![0; 7]);
        assert_eq!(program.word_count(), 1);
        assert_eq!(program.fetch(0), Ok(0));
        assert_eq!(
            program.fetch(1),
            Err(ProgramError::TruncatedRead { index: 1 })
        );
    }

    #[test]
    fn test_fetch_negative_index() {
        let program = Program::from_words(&[1, 2, 3]);
        assert_eq!(
            program.fetch(-1),
            Err(ProgramError::TruncatedRead { index: -1 })
        );
    }

    #[test]
    fn test_from_words_roundtrip() {
        let words = [0xdead_beef, 0x0000_0001, 0x8000_0002];
        let program = Program::from_words(&words);
        assert_eq!(program.word_count(), 3);
        for (i, &word) in words.iter().enumerate() {
            assert_eq!(program.fetch(i as i64), Ok(word));
        }
        assert_eq!(program.words(), words.to_vec());
    }

    #[test]
    fn test_empty_image() {
        let program = Program::from_bytes(Vec::new());
        assert!(program.is_empty());
        assert_eq!(
            program.fetch(0),
            Err(ProgramError::TruncatedRead { index: 0 })
        );
    }
}
