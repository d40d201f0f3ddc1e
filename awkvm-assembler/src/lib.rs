//! AWK Bytecode Assembler
//!
//! Encode resolved instructions into stream words, and assemble the textual
//! assembly language into a complete [`Program`](awkvm_spec::Program).
//!
//! ## Example
//!
//! ```rust
//! use awkvm_assembler::assemble;
//!
//! let source = r#"
//!     BEGIN:
//!         Str "hello"
//!         Print 1
//! "#;
//!
//! let program = assemble(source).unwrap();
//! assert_eq!(program.strs, vec!["hello".to_string()]);
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod encoder;
pub mod assembler;

pub use error::{AssemblerError, Result};
pub use assembler::assemble;
pub use parser::{parse_line, parse_source, Line, Operand, Section};
pub use encoder::{encode, encode_into, CodeBuilder, Label};
