//! Typed instruction set
//!
//! One variant per opcode, each carrying exactly its inline operands.
//!
//! ## Operand kinds
//! - `index`: scalar or special-variable index, or a constant pool index
//! - `array`: array pool index
//! - `slot`: local slot of the enclosing function frame
//! - `amount`: signed increment
//! - `offset`: signed jump offset, relative to the address after the operand
//! - `count`: small argument count

use crate::opcode::Opcode;
use crate::token::{ArrayArg, AugOp, Redirect};
use serde::{Deserialize, Serialize};

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ========== Stack and constants ==========
    Nop,
    Num { index: u32 },
    Str { index: u32 },
    Dupe,
    Drop,
    Swap,

    // ========== Reads ==========
    Field,
    FieldNum { index: u32 },
    Global { index: u32 },
    Local { slot: u32 },
    Special { index: u32 },
    ArrayGlobal { array: u32 },
    ArrayLocal { slot: u32 },
    InGlobal { array: u32 },
    InLocal { slot: u32 },

    // ========== Assignment and deletion ==========
    AssignField,
    AssignGlobal { index: u32 },
    AssignLocal { slot: u32 },
    AssignSpecial { index: u32 },
    AssignArrayGlobal { array: u32 },
    AssignArrayLocal { slot: u32 },
    DeleteGlobal { array: u32 },
    DeleteLocal { slot: u32 },
    DeleteAllGlobal { array: u32 },
    DeleteAllLocal { slot: u32 },

    // ========== Increment and augmented assignment ==========
    IncrField { amount: i32 },
    IncrGlobal { amount: i32, index: u32 },
    IncrLocal { amount: i32, slot: u32 },
    IncrSpecial { amount: i32, index: u32 },
    IncrArrayGlobal { amount: i32, array: u32 },
    IncrArrayLocal { amount: i32, slot: u32 },
    AugAssignField { op: AugOp },
    AugAssignGlobal { op: AugOp, index: u32 },
    AugAssignLocal { op: AugOp, slot: u32 },
    AugAssignSpecial { op: AugOp, index: u32 },
    AugAssignArrayGlobal { op: AugOp, array: u32 },
    AugAssignArrayLocal { op: AugOp, slot: u32 },

    // ========== Expressions ==========
    Regex { index: u32 },
    MultiIndex { count: u32 },
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulo,
    Concat,
    Match,
    NotMatch,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Not,
    UnaryMinus,
    UnaryPlus,
    Boolean,

    // ========== Jumps ==========
    Jump { offset: i32 },
    JumpFalse { offset: i32 },
    JumpTrue { offset: i32 },
    JumpNumLess { offset: i32 },
    JumpNumGreater { offset: i32 },
    JumpNumLessOrEqual { offset: i32 },
    JumpNumGreaterOrEqual { offset: i32 },

    // ========== Loops and flow control ==========
    /// `var` and `array` are global indexes or local slots as the name says;
    /// `offset` addresses the loop exit
    ForGlobalInGlobal { var: u32, array: u32, offset: i32 },
    ForGlobalInLocal { var: u32, array: u32, offset: i32 },
    ForLocalInGlobal { var: u32, array: u32, offset: i32 },
    ForLocalInLocal { var: u32, array: u32, offset: i32 },
    BreakForIn,
    Next,
    Exit,
    Return,
    ReturnNull,
    ExitStatus,

    // ========== Builtins ==========
    CallLength,
    CallLengthArg,
    CallIndex,
    CallSubstr,
    CallSubstrLength,
    CallTolower,
    CallToupper,
    CallInt,
    CallSqrt,
    CallExp,
    CallLog,
    CallSin,
    CallCos,
    CallAtan2,
    CallMatch,
    CallSystem,
    CallClose,
    CallFflush,
    CallFflushAll,
    CallSplitGlobal { array: u32 },
    CallSplitLocal { slot: u32 },
    CallSplitSepGlobal { array: u32 },
    CallSplitSepLocal { slot: u32 },
    CallSprintf { count: u32 },

    // ========== Calls and output ==========
    /// Scalar arguments are on the stack, array arguments travel inline
    CallUser { func: u32, arrays: Vec<ArrayArg> },
    Nulls { count: u32 },
    Print { count: u32, redirect: Redirect },
    Printf { count: u32, redirect: Redirect },
}

impl Instruction {
    /// Opcode word that starts this instruction
    pub fn opcode(&self) -> Opcode {
        use Instruction as I;
        match self {
            I::Nop => Opcode::Nop,
            I::Num { .. } => Opcode::Num,
            I::Str { .. } => Opcode::Str,
            I::Dupe => Opcode::Dupe,
            I::Drop => Opcode::Drop,
            I::Swap => Opcode::Swap,
            I::Field => Opcode::Field,
            I::FieldNum { .. } => Opcode::FieldNum,
            I::Global { .. } => Opcode::Global,
            I::Local { .. } => Opcode::Local,
            I::Special { .. } => Opcode::Special,
            I::ArrayGlobal { .. } => Opcode::ArrayGlobal,
            I::ArrayLocal { .. } => Opcode::ArrayLocal,
            I::InGlobal { .. } => Opcode::InGlobal,
            I::InLocal { .. } => Opcode::InLocal,
            I::AssignField => Opcode::AssignField,
            I::AssignGlobal { .. } => Opcode::AssignGlobal,
            I::AssignLocal { .. } => Opcode::AssignLocal,
            I::AssignSpecial { .. } => Opcode::AssignSpecial,
            I::AssignArrayGlobal { .. } => Opcode::AssignArrayGlobal,
            I::AssignArrayLocal { .. } => Opcode::AssignArrayLocal,
            I::DeleteGlobal { .. } => Opcode::DeleteGlobal,
            I::DeleteLocal { .. } => Opcode::DeleteLocal,
            I::DeleteAllGlobal { .. } => Opcode::DeleteAllGlobal,
            I::DeleteAllLocal { .. } => Opcode::DeleteAllLocal,
            I::IncrField { .. } => Opcode::IncrField,
            I::IncrGlobal { .. } => Opcode::IncrGlobal,
            I::IncrLocal { .. } => Opcode::IncrLocal,
            I::IncrSpecial { .. } => Opcode::IncrSpecial,
            I::IncrArrayGlobal { .. } => Opcode::IncrArrayGlobal,
            I::IncrArrayLocal { .. } => Opcode::IncrArrayLocal,
            I::AugAssignField { .. } => Opcode::AugAssignField,
            I::AugAssignGlobal { .. } => Opcode::AugAssignGlobal,
            I::AugAssignLocal { .. } => Opcode::AugAssignLocal,
            I::AugAssignSpecial { .. } => Opcode::AugAssignSpecial,
            I::AugAssignArrayGlobal { .. } => Opcode::AugAssignArrayGlobal,
            I::AugAssignArrayLocal { .. } => Opcode::AugAssignArrayLocal,
            I::Regex { .. } => Opcode::Regex,
            I::MultiIndex { .. } => Opcode::MultiIndex,
            I::Add => Opcode::Add,
            I::Subtract => Opcode::Subtract,
            I::Multiply => Opcode::Multiply,
            I::Divide => Opcode::Divide,
            I::Power => Opcode::Power,
            I::Modulo => Opcode::Modulo,
            I::Concat => Opcode::Concat,
            I::Match => Opcode::Match,
            I::NotMatch => Opcode::NotMatch,
            I::Equals => Opcode::Equals,
            I::NotEquals => Opcode::NotEquals,
            I::Less => Opcode::Less,
            I::Greater => Opcode::Greater,
            I::LessOrEqual => Opcode::LessOrEqual,
            I::GreaterOrEqual => Opcode::GreaterOrEqual,
            I::Not => Opcode::Not,
            I::UnaryMinus => Opcode::UnaryMinus,
            I::UnaryPlus => Opcode::UnaryPlus,
            I::Boolean => Opcode::Boolean,
            I::Jump { .. } => Opcode::Jump,
            I::JumpFalse { .. } => Opcode::JumpFalse,
            I::JumpTrue { .. } => Opcode::JumpTrue,
            I::JumpNumLess { .. } => Opcode::JumpNumLess,
            I::JumpNumGreater { .. } => Opcode::JumpNumGreater,
            I::JumpNumLessOrEqual { .. } => Opcode::JumpNumLessOrEqual,
            I::JumpNumGreaterOrEqual { .. } => Opcode::JumpNumGreaterOrEqual,
            I::ForGlobalInGlobal { .. } => Opcode::ForGlobalInGlobal,
            I::ForGlobalInLocal { .. } => Opcode::ForGlobalInLocal,
            I::ForLocalInGlobal { .. } => Opcode::ForLocalInGlobal,
            I::ForLocalInLocal { .. } => Opcode::ForLocalInLocal,
            I::BreakForIn => Opcode::BreakForIn,
            I::Next => Opcode::Next,
            I::Exit => Opcode::Exit,
            I::Return => Opcode::Return,
            I::ReturnNull => Opcode::ReturnNull,
            I::ExitStatus => Opcode::ExitStatus,
            I::CallLength => Opcode::CallLength,
            I::CallLengthArg => Opcode::CallLengthArg,
            I::CallIndex => Opcode::CallIndex,
            I::CallSubstr => Opcode::CallSubstr,
            I::CallSubstrLength => Opcode::CallSubstrLength,
            I::CallTolower => Opcode::CallTolower,
            I::CallToupper => Opcode::CallToupper,
            I::CallInt => Opcode::CallInt,
            I::CallSqrt => Opcode::CallSqrt,
            I::CallExp => Opcode::CallExp,
            I::CallLog => Opcode::CallLog,
            I::CallSin => Opcode::CallSin,
            I::CallCos => Opcode::CallCos,
            I::CallAtan2 => Opcode::CallAtan2,
            I::CallMatch => Opcode::CallMatch,
            I::CallSystem => Opcode::CallSystem,
            I::CallClose => Opcode::CallClose,
            I::CallFflush => Opcode::CallFflush,
            I::CallFflushAll => Opcode::CallFflushAll,
            I::CallSplitGlobal { .. } => Opcode::CallSplitGlobal,
            I::CallSplitLocal { .. } => Opcode::CallSplitLocal,
            I::CallSplitSepGlobal { .. } => Opcode::CallSplitSepGlobal,
            I::CallSplitSepLocal { .. } => Opcode::CallSplitSepLocal,
            I::CallSprintf { .. } => Opcode::CallSprintf,
            I::CallUser { .. } => Opcode::CallUser,
            I::Nulls { .. } => Opcode::Nulls,
            I::Print { .. } => Opcode::Print,
            I::Printf { .. } => Opcode::Printf,
        }
    }

    /// Instruction mnemonic
    pub fn mnemonic(&self) -> &'static str {
        self.opcode().name()
    }

    /// Encoded width in words, opcode included
    pub fn width(&self) -> usize {
        match self {
            Instruction::CallUser { arrays, .. } => 3 + 2 * arrays.len(),
            other => 1 + other.opcode().operand_words().unwrap_or(0),
        }
    }

    /// Relative jump offset carried by this instruction, if any
    pub fn jump_offset(&self) -> Option<i32> {
        use Instruction as I;
        match *self {
            I::Jump { offset }
            | I::JumpFalse { offset }
            | I::JumpTrue { offset }
            | I::JumpNumLess { offset }
            | I::JumpNumGreater { offset }
            | I::JumpNumLessOrEqual { offset }
            | I::JumpNumGreaterOrEqual { offset }
            | I::ForGlobalInGlobal { offset, .. }
            | I::ForGlobalInLocal { offset, .. }
            | I::ForLocalInGlobal { offset, .. }
            | I::ForLocalInLocal { offset, .. } => Some(offset),
            _ => None,
        }
    }
}
