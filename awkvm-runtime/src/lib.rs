//! # AWK Bytecode Runtime
//!
//! Stack interpreter for programs produced by an AWK compiler front-end (or
//! by `awkvm-assembler`).
//!
//! ## Features
//!
//! - **Verified before running**: streams are checked once by
//!   `awkvm_disassembler::verify`, then decoded with the same fetch routine
//!   the disassembler uses
//! - **Storage classes**: global scalars, frame-local slots, special
//!   variables, global and local associative arrays, fields
//! - **Records**: `RS` newline, single character, paragraph or regex
//!   separated input, `FS` field splitting
//! - **Output**: standard output, files (`>`, `>>`) and command pipes (`|`),
//!   one handle per target
//! - **Limits**: instruction budget and call depth from [`VMConfig`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use awkvm_runtime::run;
//!
//! let program = awkvm_assembler::assemble("
//! body:
//!     FieldNum 2
//!     Print 1
//! ").unwrap();
//! let output = run(Arc::new(program), "a b\nc d\n").unwrap();
//! assert_eq!(output, "b\nd\n");
//! ```

pub mod error;
pub mod value;
pub mod format;
pub mod regex;
pub mod fields;
pub mod io;
pub mod state;
pub mod execute;
pub mod vm;

use std::sync::Arc;

use awkvm_spec::Program;

pub use error::{Result, RuntimeError};
pub use value::Value;
pub use format::sprintf;
pub use fields::{split_fields, Record, RecordReader};
pub use io::{OutputStreams, SharedOutput};
pub use state::{Array, ArrayId, Slot, VMState};
pub use vm::{ExecutionResult, VMConfig, VM};

/// Simple execution helper
///
/// Runs `program` over `input` and returns everything written to standard
/// output.
pub fn run(program: Arc<Program>, input: &str) -> Result<String> {
    let output = SharedOutput::new();
    let mut vm = VM::with_output(program, VMConfig::default(), Box::new(output.clone()))?;
    let mut reader = std::io::Cursor::new(input.as_bytes());
    vm.run(&mut reader, "")?;
    Ok(output.contents())
}
