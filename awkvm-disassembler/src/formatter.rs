//! Instruction formatting for listings
//!
//! Operands are rendered by name wherever the program knows one: scalar and
//! array names, special variable names, function names and parameter names.
//! Jump and `for-in` offsets are rendered as absolute target addresses.

use awkvm_spec::number::format_number;
use awkvm_spec::{ArrayArg, Function, Instruction, Program, Redirect, Scope, SpecialVar};
use crate::error::{DisassemblerError, Result};

/// Name lookup context for one unit
#[derive(Clone, Copy)]
pub struct Names<'a> {
    program: &'a Program,
    function: Option<&'a Function>,
}

impl<'a> Names<'a> {
    /// `function` is the index of the function whose body is being rendered
    pub fn new(program: &'a Program, function: Option<usize>) -> Self {
        Self { program, function: function.and_then(|index| program.functions.get(index)) }
    }

    fn pool<'p>(&self, addr: usize, pool: &'static str, table: &'p [String], index: u32) -> Result<&'p str> {
        table
            .get(index as usize)
            .map(String::as_str)
            .ok_or(DisassemblerError::PoolOutOfRange { addr, pool, index: index as usize, len: table.len() })
    }

    fn scalar(&self, addr: usize, index: u32) -> Result<&'a str> {
        self.pool(addr, "scalar", &self.program.scalar_names, index)
    }

    fn array(&self, addr: usize, index: u32) -> Result<&'a str> {
        self.pool(addr, "array", &self.program.array_names, index)
    }

    fn special(&self, addr: usize, index: u32) -> Result<&'static str> {
        SpecialVar::from_index(index).map(SpecialVar::name).ok_or(DisassemblerError::PoolOutOfRange {
            addr,
            pool: "special",
            index: index as usize,
            len: awkvm_spec::NUM_SPECIALS,
        })
    }

    /// Parameter name, or the raw slot for temporaries past the parameters
    fn local(&self, slot: u32) -> String {
        self.function
            .and_then(|f| f.param_name(slot as usize))
            .map(str::to_string)
            .unwrap_or_else(|| slot.to_string())
    }

    fn function_name(&self, addr: usize, index: u32) -> Result<&'a str> {
        self.program.functions.get(index as usize).map(|f| f.name.as_str()).ok_or(
            DisassemblerError::PoolOutOfRange {
                addr,
                pool: "function",
                index: index as usize,
                len: self.program.functions.len(),
            },
        )
    }

    fn array_arg(&self, addr: usize, arg: &ArrayArg) -> Result<String> {
        match arg.scope {
            Scope::Global => self.array(addr, arg.index).map(str::to_string),
            Scope::Local => Ok(self.local(arg.index)),
        }
    }
}

/// Double-quote `s` for a listing, escaping ASCII control characters as
/// `\xHH` (or their short forms) and other control characters as `\uXXXX`
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Format the instruction at `addr` as listing text (without the address)
pub fn format(instr: &Instruction, addr: usize, names: &Names<'_>) -> Result<String> {
    use Instruction as I;

    let name = instr.mnemonic();
    let target = |offset: i32| (addr + instr.width()) as i64 + offset as i64;

    let text = match instr {
        // ========== Constants ==========
        I::Num { index } => {
            let nums = &names.program.nums;
            let value = nums.get(*index as usize).ok_or(DisassemblerError::PoolOutOfRange {
                addr,
                pool: "nums",
                index: *index as usize,
                len: nums.len(),
            })?;
            format!("{} {}", name, format_number(*value))
        }
        I::Str { index } => {
            let s = names.pool(addr, "strs", &names.program.strs, *index)?;
            format!("{} {}", name, quote(s))
        }
        I::Regex { index } => {
            let s = names.pool(addr, "regexes", &names.program.regexes, *index)?;
            format!("{} {}", name, quote(s))
        }

        // ========== Plain numeric operands ==========
        I::FieldNum { index } => format!("{} {}", name, index),
        I::MultiIndex { count } | I::CallSprintf { count } | I::Nulls { count } => {
            format!("{} {}", name, count)
        }
        I::IncrField { amount } => format!("{} {}", name, amount),
        I::AugAssignField { op } => format!("{} {}", name, op),

        // ========== Scalars ==========
        I::Global { index } | I::AssignGlobal { index } => {
            format!("{} {}", name, names.scalar(addr, *index)?)
        }
        I::Special { index } | I::AssignSpecial { index } => {
            format!("{} {}", name, names.special(addr, *index)?)
        }
        I::IncrGlobal { amount, index } => format!("{} {} {}", name, amount, names.scalar(addr, *index)?),
        I::IncrSpecial { amount, index } => format!("{} {} {}", name, amount, names.special(addr, *index)?),
        I::AugAssignGlobal { op, index } => format!("{} {} {}", name, op, names.scalar(addr, *index)?),
        I::AugAssignSpecial { op, index } => format!("{} {} {}", name, op, names.special(addr, *index)?),

        // ========== Arrays ==========
        I::ArrayGlobal { array }
        | I::InGlobal { array }
        | I::AssignArrayGlobal { array }
        | I::DeleteGlobal { array }
        | I::DeleteAllGlobal { array }
        | I::CallSplitGlobal { array }
        | I::CallSplitSepGlobal { array } => format!("{} {}", name, names.array(addr, *array)?),
        I::IncrArrayGlobal { amount, array } => format!("{} {} {}", name, amount, names.array(addr, *array)?),
        I::AugAssignArrayGlobal { op, array } => format!("{} {} {}", name, op, names.array(addr, *array)?),

        // ========== Locals ==========
        I::Local { slot }
        | I::AssignLocal { slot }
        | I::ArrayLocal { slot }
        | I::InLocal { slot }
        | I::AssignArrayLocal { slot }
        | I::DeleteLocal { slot }
        | I::DeleteAllLocal { slot }
        | I::CallSplitLocal { slot }
        | I::CallSplitSepLocal { slot } => format!("{} {}", name, names.local(*slot)),
        I::IncrLocal { amount, slot } | I::IncrArrayLocal { amount, slot } => {
            format!("{} {} {}", name, amount, names.local(*slot))
        }
        I::AugAssignLocal { op, slot } | I::AugAssignArrayLocal { op, slot } => {
            format!("{} {} {}", name, op, names.local(*slot))
        }

        // ========== Control flow ==========
        I::Jump { offset }
        | I::JumpFalse { offset }
        | I::JumpTrue { offset }
        | I::JumpNumLess { offset }
        | I::JumpNumGreater { offset }
        | I::JumpNumLessOrEqual { offset }
        | I::JumpNumGreaterOrEqual { offset } => format!("{} 0x{:04x}", name, target(*offset)),
        I::ForGlobalInGlobal { var, array, offset } => format!(
            "{} {} {} 0x{:04x}",
            name,
            names.scalar(addr, *var)?,
            names.array(addr, *array)?,
            target(*offset)
        ),
        I::ForGlobalInLocal { var, array, offset } => format!(
            "{} {} {} 0x{:04x}",
            name,
            names.scalar(addr, *var)?,
            names.local(*array),
            target(*offset)
        ),
        I::ForLocalInGlobal { var, array, offset } => format!(
            "{} {} {} 0x{:04x}",
            name,
            names.local(*var),
            names.array(addr, *array)?,
            target(*offset)
        ),
        I::ForLocalInLocal { var, array, offset } => format!(
            "{} {} {} 0x{:04x}",
            name,
            names.local(*var),
            names.local(*array),
            target(*offset)
        ),

        // ========== Calls and output ==========
        I::CallUser { func, arrays } => {
            let mut text = format!("{} {}", name, names.function_name(addr, *func)?);
            for arg in arrays {
                text.push(' ');
                text.push_str(&names.array_arg(addr, arg)?);
            }
            text
        }
        I::Print { count, redirect } | I::Printf { count, redirect } => match redirect {
            Redirect::None => format!("{} {}", name, count),
            _ => format!("{} {} {}", name, count, redirect),
        },

        _ => name.to_string(),
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use awkvm_spec::AugOp;

    fn program() -> Program {
        Program {
            nums: vec![5.0, 5.25, 1e-7],
            strs: vec!["a\"b".to_string(), "tab\there".to_string()],
            regexes: vec!["^[a-z]+$".to_string()],
            scalar_names: vec!["x".to_string()],
            array_names: vec!["arr".to_string()],
            functions: vec![Function {
                name: "f".to_string(),
                params: vec!["n".to_string(), "seen".to_string()],
                arrays: vec![false, true],
                num_locals: 1,
                body: vec![],
            }],
            ..Program::default()
        }
    }

    fn fmt(instr: Instruction) -> String {
        let program = program();
        format(&instr, 0, &Names::new(&program, None)).unwrap()
    }

    fn fmt_in_function(instr: Instruction) -> String {
        let program = program();
        format(&instr, 0, &Names::new(&program, Some(0))).unwrap()
    }

    #[test]
    fn test_format_num() {
        assert_eq!(fmt(Instruction::Num { index: 0 }), "Num 5");
        assert_eq!(fmt(Instruction::Num { index: 1 }), "Num 5.25");
        assert_eq!(fmt(Instruction::Num { index: 2 }), "Num 1e-07");
    }

    #[test]
    fn test_format_strings_quoted() {
        assert_eq!(fmt(Instruction::Str { index: 0 }), r#"Str "a\"b""#);
        assert_eq!(fmt(Instruction::Str { index: 1 }), r#"Str "tab\there""#);
        assert_eq!(fmt(Instruction::Regex { index: 0 }), r#"Regex "^[a-z]+$""#);
    }

    #[test]
    fn test_quote_control_characters() {
        assert_eq!(quote("\x1c"), r#""\x1c""#);
        assert_eq!(quote("\x07\x08\x0b\x0c\r"), r#""\a\b\v\f\r""#);
        assert_eq!(quote("\x7f\u{85}é"), r#""\x7f\u0085é""#);
        assert_eq!(quote(r"a\.b"), r#""a\\.b""#);
    }

    #[test]
    fn test_format_print() {
        assert_eq!(fmt(Instruction::Print { count: 2, redirect: Redirect::None }), "Print 2");
        assert_eq!(fmt(Instruction::Print { count: 2, redirect: Redirect::Append }), "Print 2 >>");
        assert_eq!(fmt(Instruction::Printf { count: 1, redirect: Redirect::Pipe }), "Printf 1 |");
    }

    #[test]
    fn test_format_names() {
        assert_eq!(fmt(Instruction::Global { index: 0 }), "Global x");
        assert_eq!(fmt(Instruction::AssignSpecial { index: 7 }), "AssignSpecial OFS");
        assert_eq!(fmt(Instruction::IncrArrayGlobal { amount: -1, array: 0 }), "IncrArrayGlobal -1 arr");
        assert_eq!(fmt(Instruction::AugAssignSpecial { op: AugOp::Add, index: 5 }), "AugAssignSpecial + NR");
        assert_eq!(
            fmt(Instruction::CallUser { func: 0, arrays: vec![ArrayArg::global(0)] }),
            "CallUser f arr"
        );
    }

    #[test]
    fn test_format_locals() {
        assert_eq!(fmt_in_function(Instruction::Local { slot: 0 }), "Local n");
        assert_eq!(fmt_in_function(Instruction::CallSplitLocal { slot: 1 }), "CallSplitLocal seen");
        // Temporaries past the parameter list have no name
        assert_eq!(fmt_in_function(Instruction::AssignLocal { slot: 2 }), "AssignLocal 2");
        assert_eq!(fmt_in_function(Instruction::IncrLocal { amount: 1, slot: 9 }), "IncrLocal 1 9");
    }

    #[test]
    fn test_format_jump_targets() {
        let program = program();
        let names = Names::new(&program, None);
        // Jump at 0x10 is two words wide, so offset -4 lands on 0x0e
        assert_eq!(format(&Instruction::Jump { offset: -4 }, 0x10, &names).unwrap(), "Jump 0x000e");
        assert_eq!(
            format(&Instruction::ForGlobalInGlobal { var: 0, array: 0, offset: 6 }, 0, &names).unwrap(),
            "ForGlobalInGlobal x arr 0x000a"
        );
    }

    #[test]
    fn test_format_no_operands() {
        assert_eq!(fmt(Instruction::CallFflushAll), "CallFflushAll");
        assert_eq!(fmt(Instruction::BreakForIn), "BreakForIn");
    }

    #[test]
    fn test_format_out_of_range_is_error() {
        let program = program();
        let names = Names::new(&program, None);
        assert!(matches!(
            format(&Instruction::Global { index: 4 }, 3, &names),
            Err(DisassemblerError::PoolOutOfRange { addr: 3, pool: "scalar", index: 4, len: 1 })
        ));
        assert!(format(&Instruction::Special { index: 40 }, 0, &names).is_err());
        assert!(format(&Instruction::CallUser { func: 2, arrays: vec![] }, 0, &names).is_err());
    }
}
