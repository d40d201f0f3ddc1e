//! # Error Types for the program container

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BytecodeError {
    // Program format errors
    #[error("Invalid program magic: expected 0x41574b42, got {0:#010x}")]
    InvalidMagic(u32),

    #[error("Invalid program version: expected {expected:#010x}, found {found:#010x}")]
    InvalidVersion { expected: u32, found: u32 },

    #[error("Invalid header size: expected {expected} bytes, found {found} bytes")]
    InvalidHeaderSize { expected: usize, found: usize },

    #[error("Malformed program payload: {0}")]
    Serialization(#[from] bincode::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BytecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BytecodeError::InvalidMagic(0x12345678);
        assert_eq!(
            err.to_string(),
            "Invalid program magic: expected 0x41574b42, got 0x12345678"
        );

        let err = BytecodeError::InvalidVersion { expected: 0x10000, found: 2 };
        assert_eq!(
            err.to_string(),
            "Invalid program version: expected 0x00010000, found 0x00000002"
        );
    }
}
