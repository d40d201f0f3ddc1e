//! # AWK Bytecode Specification
//!
//! Stack-based instruction set targeted by an AWK compiler front-end and
//! executed by `awkvm-runtime`.
//!
//! ## Key Features
//! - Flat streams of 32-bit words: one opcode word, then inline operands
//! - One instruction per storage class (global, local, special, array)
//! - Relative jumps, measured from the word after the offset operand
//! - Constant pools and name tables referenced by index
//! - Binary program container (magic + version + bincode payload)

pub mod opcode;
pub mod token;
pub mod instruction;
pub mod special;
pub mod error;
pub mod program;
pub mod number;

pub use opcode::Opcode;
pub use token::{ArrayArg, AugOp, Redirect, Scope};
pub use instruction::Instruction;
pub use special::{SpecialVar, NUM_SPECIALS};
pub use error::{BytecodeError, Result};
pub use program::{Action, Function, Program, Unit, UnitKind, MAGIC, VERSION};

/// One stream word (opcode or operand)
pub type Word = i32;

/// Default SUBSEP joining multi-part array subscripts
pub const DEFAULT_SUBSEP: &str = "\x1c";
