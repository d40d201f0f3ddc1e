//! Operator tags embedded inline in the instruction stream

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator of an augmented assignment (`x += 1` carries `AugOp::Add`)
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AugOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Mod = 4,
    Pow = 5,
}

impl AugOp {
    pub fn from_word(word: i32) -> Option<Self> {
        match word {
            0 => Some(AugOp::Add),
            1 => Some(AugOp::Sub),
            2 => Some(AugOp::Mul),
            3 => Some(AugOp::Div),
            4 => Some(AugOp::Mod),
            5 => Some(AugOp::Pow),
            _ => None,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(AugOp::Add),
            "-" => Some(AugOp::Sub),
            "*" => Some(AugOp::Mul),
            "/" => Some(AugOp::Div),
            "%" => Some(AugOp::Mod),
            "^" => Some(AugOp::Pow),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_word(self) -> i32 {
        self as i32
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            AugOp::Add => "+",
            AugOp::Sub => "-",
            AugOp::Mul => "*",
            AugOp::Div => "/",
            AugOp::Mod => "%",
            AugOp::Pow => "^",
        }
    }
}

impl fmt::Display for AugOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Output destination of `print` and `printf`
///
/// `None` is the "no redirection" sentinel: output goes to standard output
/// and no destination value is on the stack.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Redirect {
    None = 0,
    /// `> file`: truncate on first open, then keep appending
    Truncate = 1,
    /// `>> file`
    Append = 2,
    /// `| command`
    Pipe = 3,
}

impl Redirect {
    pub fn from_word(word: i32) -> Option<Self> {
        match word {
            0 => Some(Redirect::None),
            1 => Some(Redirect::Truncate),
            2 => Some(Redirect::Append),
            3 => Some(Redirect::Pipe),
            _ => None,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Redirect::Truncate),
            ">>" => Some(Redirect::Append),
            "|" => Some(Redirect::Pipe),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_word(self) -> i32 {
        self as i32
    }

    /// Token text, empty for `Redirect::None`
    pub const fn symbol(self) -> &'static str {
        match self {
            Redirect::None => "",
            Redirect::Truncate => ">",
            Redirect::Append => ">>",
            Redirect::Pipe => "|",
        }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Storage class of an array passed by reference to a user function
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Global = 0,
    Local = 1,
}

impl Scope {
    pub fn from_word(word: i32) -> Option<Self> {
        match word {
            0 => Some(Scope::Global),
            1 => Some(Scope::Local),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_word(self) -> i32 {
        self as i32
    }
}

/// One inline array argument of `CallUser`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayArg {
    pub scope: Scope,
    /// Array pool index for `Scope::Global`, frame slot for `Scope::Local`
    pub index: u32,
}

impl ArrayArg {
    pub const fn global(index: u32) -> Self {
        Self { scope: Scope::Global, index }
    }

    pub const fn local(slot: u32) -> Self {
        Self { scope: Scope::Local, index: slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aug_op_words() {
        for op in [AugOp::Add, AugOp::Sub, AugOp::Mul, AugOp::Div, AugOp::Mod, AugOp::Pow] {
            assert_eq!(AugOp::from_word(op.to_word()), Some(op));
            assert_eq!(AugOp::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(AugOp::from_word(6), None);
    }

    #[test]
    fn test_redirect_symbols() {
        assert_eq!(Redirect::Append.to_string(), ">>");
        assert_eq!(Redirect::None.to_string(), "");
        assert_eq!(Redirect::from_symbol("|"), Some(Redirect::Pipe));
        assert_eq!(Redirect::from_word(-1), None);
    }

    #[test]
    fn test_scope_words() {
        assert_eq!(Scope::from_word(1), Some(Scope::Local));
        assert_eq!(Scope::from_word(2), None);
    }
}
