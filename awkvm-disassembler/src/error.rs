//! Disassembler errors

use awkvm_spec::Word;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DisassemblerError {
    #[error("Truncated instruction at 0x{addr:04x}")]
    Truncated { addr: usize },

    #[error("Unknown opcode {word} at 0x{addr:04x}")]
    UnknownOpcode { addr: usize, word: Word },

    #[error("Invalid operand at 0x{addr:04x}: {message}")]
    InvalidOperand { addr: usize, message: String },

    #[error("{pool} index {index} out of range ({len} entries) at 0x{addr:04x}")]
    PoolOutOfRange {
        addr: usize,
        pool: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Jump at 0x{addr:04x} lands on {target}, which is not an instruction boundary")]
    BadJumpTarget { addr: usize, target: i64 },

    #[error("Local operand outside of a function at 0x{addr:04x}")]
    LocalOutsideFunction { addr: usize },

    #[error("Local slot {slot} out of range ({slots} slots) at 0x{addr:04x}")]
    SlotOutOfRange { addr: usize, slot: usize, slots: usize },

    #[error("Call to {name} at 0x{addr:04x} passes {given} arrays, function takes {expected}")]
    TooManyArrays {
        addr: usize,
        name: String,
        given: usize,
        expected: usize,
    },

    #[error("Function {name}: {message}")]
    InvalidFunction { name: String, message: String },

    #[error("In {unit}: {source}")]
    InUnit {
        unit: String,
        source: Box<DisassemblerError>,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DisassemblerError {
    /// Attach the name of the unit being processed
    pub fn in_unit(self, unit: impl Into<String>) -> Self {
        DisassemblerError::InUnit { unit: unit.into(), source: Box::new(self) }
    }
}

pub type Result<T> = std::result::Result<T, DisassemblerError>;
