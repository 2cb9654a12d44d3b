//! Binary program image files.
//!
//! A compiled program on disk is a flat sequence of 32-bit big-endian
//! words with no header.

use crate::cpu::program::Program;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Load a binary program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Program, ImageError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    Ok(Program::from_bytes(bytes))
}

/// Save instruction words to a binary program image.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[u32]) -> Result<(), ImageError> {
    let mut file =
        std::fs::File::create(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    for word in words {
        file.write_all(&word.to_be_bytes())
            .map_err(|e| ImageError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Errors from reading or writing image files.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_bytes_match_program_words() {
        // The on-disk layout is exactly Program's in-memory byte order.
        let words = [0x0180_0105u32, 0x8800_0001];
        let program = Program::from_words(&words);
        let expected: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        assert_eq!(program.as_bytes(), expected.as_slice());
    }
}
