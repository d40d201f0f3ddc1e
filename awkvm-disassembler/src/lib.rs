//! # AWK Bytecode Disassembler
//!
//! Decode instruction streams and render them as address-annotated listings.
//!
//! ## Components
//!
//! - [`decode`]: the fetch routine shared with the runtime; consumes one
//!   opcode and its operands and advances the instruction pointer
//! - [`format`]: renders one instruction with names resolved
//! - [`disassemble`]: listing of every unit of a program
//! - [`verify`]: structural check of a program before it is executed
//!
//! ## Example
//!
//! ```rust
//! use awkvm_spec::{Opcode, Program, Redirect, Word};
//! use awkvm_disassembler::disassemble;
//!
//! let mut program = Program::new();
//! program.nums = vec![5.0];
//! program.begin = Some(vec![
//!     Opcode::Num.to_u8() as Word, 0,
//!     Opcode::Print.to_u8() as Word, 1, Redirect::None.to_word(),
//! ]);
//!
//! let listing = disassemble(&program).unwrap();
//! assert!(listing.contains("0000    Num 5"));
//! assert!(listing.contains("0002    Print 1"));
//! ```

pub mod error;
pub mod decoder;
pub mod formatter;
pub mod disassembler;
pub mod verify;

pub use error::{DisassemblerError, Result};
pub use decoder::{decode, instructions, Instructions};
pub use formatter::{format, Names};
pub use disassembler::{disassemble, disassemble_to};
pub use verify::verify;
