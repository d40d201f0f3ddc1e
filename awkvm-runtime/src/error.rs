//! Runtime error types

use thiserror::Error;
use awkvm_disassembler::DisassemblerError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] DisassemblerError),

    /// Fault raised while executing `unit` at `addr`
    #[error("In {unit} at 0x{addr:04x}: {source}")]
    At {
        unit: String,
        addr: usize,
        source: Box<RuntimeError>,
    },

    #[error("Value stack underflow")]
    StackUnderflow,

    #[error("Division by zero in {op}")]
    DivisionByZero { op: &'static str },

    #[error("Invalid regex {pattern:?}: {message}")]
    Regex { pattern: String, message: String },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Cannot open {target:?}: {source}")]
    Redirect {
        target: String,
        source: std::io::Error,
    },

    #[error("Local slot {slot} holds a scalar, not an array")]
    NotAnArray { slot: usize },

    #[error("Local slot {slot} holds an array, not a scalar")]
    NotAScalar { slot: usize },

    #[error("Local slot {slot} outside the current frame")]
    SlotOutOfRange { slot: usize },

    #[error("Field index {0} is negative")]
    NegativeField(i64),

    #[error("Field index {index} exceeds the limit of {limit}")]
    FieldTooLarge { index: f64, limit: usize },

    #[error("Cycle limit exceeded: {limit}")]
    CycleLimitExceeded { limit: u64 },

    #[error("Call depth exceeded: {limit}")]
    CallDepthExceeded { limit: usize },

    #[error("next used outside record processing")]
    NextOutsideRecord,

    #[error("Jump to 0x{target:04x} outside stream of length {len}")]
    JumpOutOfRange { target: i64, len: usize },

    #[error("Unknown variable {0:?}")]
    UnknownVariable(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RuntimeError {
    /// Attach the executing unit and address unless already attached
    pub fn at(self, unit: &str, addr: usize) -> Self {
        match self {
            err @ RuntimeError::At { .. } => err,
            err => RuntimeError::At {
                unit: unit.to_string(),
                addr,
                source: Box::new(err),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
