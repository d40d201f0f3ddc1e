//! # Opcode Definitions
//!
//! Every instruction starts with one opcode word. The opcode alone decides how
//! many operand words follow and what they mean, so the numbering below is part
//! of the binary format and must stay stable.
//!
//! ## Families
//!
//! - 0x00-0x05: Stack and constants
//! - 0x06-0x0E: Field and variable reads
//! - 0x10-0x1F: Assignment and deletion
//! - 0x20-0x2B: Increment and augmented assignment
//! - 0x30-0x43: Regex, subscripts, arithmetic and comparison
//! - 0x48-0x4E: Jumps
//! - 0x50-0x59: Loops and flow control
//! - 0x60-0x7B: Builtin calls
//! - 0x7C-0x7F: User calls and output

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident = $value:literal,)*) => {
        /// Instruction opcode
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $($(#[$doc])* $name = $value,)*
        }

        impl Opcode {
            /// Every opcode, in numbering order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            /// Try to convert from u8
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Mnemonic used by the disassembler and the assembler
            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    // ========== Stack and constants ==========
    /// No operation
    Nop = 0x00,
    /// Push `nums[index]`
    Num = 0x01,
    /// Push `strs[index]`
    Str = 0x02,
    /// Duplicate top of stack
    Dupe = 0x03,
    /// Discard top of stack
    Drop = 0x04,
    /// Swap the two top values
    Swap = 0x05,

    // ========== Reads ==========
    /// Pop index, push `$index`
    Field = 0x06,
    /// Push `$n` for an inline field number
    FieldNum = 0x07,
    Global = 0x08,
    Local = 0x09,
    Special = 0x0A,
    /// Pop key, push `array[key]`
    ArrayGlobal = 0x0B,
    ArrayLocal = 0x0C,
    /// Pop key, push `key in array`
    InGlobal = 0x0D,
    InLocal = 0x0E,

    // ========== Assignment and deletion ==========
    /// Pop index and value, assign `$index = value`
    AssignField = 0x10,
    AssignGlobal = 0x11,
    AssignLocal = 0x12,
    AssignSpecial = 0x13,
    /// Pop key and value, assign `array[key] = value`
    AssignArrayGlobal = 0x14,
    AssignArrayLocal = 0x15,
    /// Pop key, delete `array[key]`
    DeleteGlobal = 0x18,
    DeleteLocal = 0x19,
    /// Delete every key of an array
    DeleteAllGlobal = 0x1A,
    DeleteAllLocal = 0x1B,

    // ========== Increment and augmented assignment ==========
    IncrField = 0x20,
    IncrGlobal = 0x21,
    IncrLocal = 0x22,
    IncrSpecial = 0x23,
    IncrArrayGlobal = 0x24,
    IncrArrayLocal = 0x25,
    AugAssignField = 0x26,
    AugAssignGlobal = 0x27,
    AugAssignLocal = 0x28,
    AugAssignSpecial = 0x29,
    AugAssignArrayGlobal = 0x2A,
    AugAssignArrayLocal = 0x2B,

    // ========== Expressions ==========
    /// Push whether `$0` matches `regexes[index]`
    Regex = 0x30,
    /// Pop n values, push them joined with SUBSEP
    MultiIndex = 0x31,
    Add = 0x32,
    Subtract = 0x33,
    Multiply = 0x34,
    Divide = 0x35,
    Power = 0x36,
    Modulo = 0x37,
    Concat = 0x38,
    Match = 0x39,
    NotMatch = 0x3A,
    Equals = 0x3B,
    NotEquals = 0x3C,
    Less = 0x3D,
    Greater = 0x3E,
    LessOrEqual = 0x3F,
    GreaterOrEqual = 0x40,
    Not = 0x41,
    UnaryMinus = 0x42,
    UnaryPlus = 0x43,
    Boolean = 0x44,

    // ========== Jumps ==========
    Jump = 0x48,
    JumpFalse = 0x49,
    JumpTrue = 0x4A,
    JumpNumLess = 0x4B,
    JumpNumGreater = 0x4C,
    JumpNumLessOrEqual = 0x4D,
    JumpNumGreaterOrEqual = 0x4E,

    // ========== Loops and flow control ==========
    ForGlobalInGlobal = 0x50,
    ForGlobalInLocal = 0x51,
    ForLocalInGlobal = 0x52,
    ForLocalInLocal = 0x53,
    BreakForIn = 0x54,
    Next = 0x55,
    /// Stop, keeping the current exit status
    Exit = 0x56,
    /// Pop return value and leave the function
    Return = 0x57,
    ReturnNull = 0x58,
    /// Pop exit status and stop
    ExitStatus = 0x59,

    // ========== Builtins ==========
    CallLength = 0x60,
    CallLengthArg = 0x61,
    CallIndex = 0x62,
    CallSubstr = 0x63,
    CallSubstrLength = 0x64,
    CallTolower = 0x65,
    CallToupper = 0x66,
    CallInt = 0x67,
    CallSqrt = 0x68,
    CallExp = 0x69,
    CallLog = 0x6A,
    CallSin = 0x6B,
    CallCos = 0x6C,
    CallAtan2 = 0x6D,
    CallMatch = 0x6E,
    CallSystem = 0x6F,
    CallClose = 0x70,
    CallFflush = 0x71,
    CallFflushAll = 0x72,
    CallSplitGlobal = 0x73,
    CallSplitLocal = 0x74,
    CallSplitSepGlobal = 0x75,
    CallSplitSepLocal = 0x76,
    CallSprintf = 0x77,

    // ========== Calls and output ==========
    CallUser = 0x7C,
    /// Push n null values
    Nulls = 0x7D,
    Print = 0x7E,
    Printf = 0x7F,
}

impl Opcode {
    /// Convert to u8
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Number of operand words that follow the opcode, or `None` when the
    /// count depends on the operands themselves (`CallUser`)
    pub const fn operand_words(self) -> Option<usize> {
        use Opcode::*;
        match self {
            CallUser => None,
            Num | Str | FieldNum | Global | Local | Special | ArrayGlobal | ArrayLocal
            | InGlobal | InLocal | AssignGlobal | AssignLocal | AssignSpecial
            | AssignArrayGlobal | AssignArrayLocal | DeleteGlobal | DeleteLocal
            | DeleteAllGlobal | DeleteAllLocal | IncrField | AugAssignField | Regex
            | MultiIndex | Jump | JumpFalse | JumpTrue | JumpNumLess | JumpNumGreater
            | JumpNumLessOrEqual | JumpNumGreaterOrEqual | CallSplitGlobal | CallSplitLocal
            | CallSplitSepGlobal | CallSplitSepLocal | CallSprintf | Nulls => Some(1),
            IncrGlobal | IncrLocal | IncrSpecial | IncrArrayGlobal | IncrArrayLocal
            | AugAssignGlobal | AugAssignLocal | AugAssignSpecial | AugAssignArrayGlobal
            | AugAssignArrayLocal | Print | Printf => Some(2),
            ForGlobalInGlobal | ForGlobalInLocal | ForLocalInGlobal | ForLocalInLocal => Some(3),
            _ => Some(0),
        }
    }

    /// Check if this opcode carries a relative jump offset
    #[inline]
    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::JumpFalse
                | Opcode::JumpTrue
                | Opcode::JumpNumLess
                | Opcode::JumpNumGreater
                | Opcode::JumpNumLessOrEqual
                | Opcode::JumpNumGreaterOrEqual
        )
    }

    /// Check if this opcode is one of the `for (k in a)` loops
    #[inline]
    pub const fn is_for_in(self) -> bool {
        matches!(
            self,
            Opcode::ForGlobalInGlobal
                | Opcode::ForGlobalInLocal
                | Opcode::ForLocalInGlobal
                | Opcode::ForLocalInLocal
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
