//! Assembler errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    SyntaxError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unknown instruction at line {line}: {name}")]
    UnknownInstruction { line: usize, name: String },

    #[error("Invalid operand at line {line}: {message}")]
    InvalidOperand { line: usize, message: String },

    #[error("Undefined label at line {line}: {name}")]
    UndefinedLabel { line: usize, name: String },

    #[error("Duplicate label at line {line}: {name}")]
    DuplicateLabel { line: usize, name: String },

    #[error("Undefined function at line {line}: {name}")]
    UndefinedFunction { line: usize, name: String },

    #[error("Invalid directive at line {line}: {name}")]
    InvalidDirective { line: usize, name: String },

    #[error("Instruction outside of a section at line {0}")]
    NoSection(usize),

    // Code builder errors
    #[error("Label #{0} was never bound")]
    UnboundLabel(usize),

    #[error("Label #{0} is already bound")]
    LabelRebound(usize),

    #[error("Label #{0} does not belong to this builder")]
    UnknownLabel(usize),

    #[error("{0} does not take a jump target")]
    NotAJump(String),

    #[error("Jump offset {0} does not fit in a word")]
    JumpOutOfRange(i64),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
