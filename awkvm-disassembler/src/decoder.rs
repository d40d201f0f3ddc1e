//! Instruction decoder
//!
//! [`decode`] is the single fetch routine: the listing generator, the verifier
//! and the runtime all step through streams with it.

use awkvm_spec::{ArrayArg, AugOp, Instruction, Opcode, Redirect, Scope, Word};
use crate::error::{DisassemblerError, Result};

/// Decode the instruction starting at `*ip`
///
/// On success `*ip` is advanced past the opcode and every operand it consumed.
/// On failure `*ip` is left unchanged.
pub fn decode(code: &[Word], ip: &mut usize) -> Result<Instruction> {
    let mut cursor = Cursor { code, addr: *ip, pos: *ip };
    let instr = cursor.instruction()?;
    *ip = cursor.pos;
    Ok(instr)
}

/// Iterate over `(address, instruction)` pairs of a stream
///
/// Iteration stops after the first decoding error.
pub fn instructions(code: &[Word]) -> Instructions<'_> {
    Instructions { code, ip: 0, failed: false }
}

pub struct Instructions<'a> {
    code: &'a [Word],
    ip: usize,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<(usize, Instruction)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.ip >= self.code.len() {
            return None;
        }
        let addr = self.ip;
        match decode(self.code, &mut self.ip) {
            Ok(instr) => Some(Ok((addr, instr))),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

struct Cursor<'a> {
    code: &'a [Word],
    /// Address of the opcode word
    addr: usize,
    pos: usize,
}

impl Cursor<'_> {
    fn word(&mut self) -> Result<Word> {
        let word = *self.code.get(self.pos).ok_or(DisassemblerError::Truncated { addr: self.addr })?;
        self.pos += 1;
        Ok(word)
    }

    fn invalid(&self, message: String) -> DisassemblerError {
        DisassemblerError::InvalidOperand { addr: self.addr, message }
    }

    /// Non-negative operand: pool index, slot or count
    fn index(&mut self) -> Result<u32> {
        let word = self.word()?;
        u32::try_from(word).map_err(|_| self.invalid(format!("negative index {}", word)))
    }

    fn op(&mut self) -> Result<AugOp> {
        let word = self.word()?;
        AugOp::from_word(word).ok_or_else(|| self.invalid(format!("unknown operator tag {}", word)))
    }

    fn redirect(&mut self) -> Result<Redirect> {
        let word = self.word()?;
        Redirect::from_word(word).ok_or_else(|| self.invalid(format!("unknown redirect tag {}", word)))
    }

    fn array_arg(&mut self) -> Result<ArrayArg> {
        let word = self.word()?;
        let scope = Scope::from_word(word).ok_or_else(|| self.invalid(format!("unknown array scope {}", word)))?;
        Ok(ArrayArg { scope, index: self.index()? })
    }

    fn instruction(&mut self) -> Result<Instruction> {
        use Instruction as I;

        let word = self.word()?;
        let opcode = u8::try_from(word)
            .ok()
            .and_then(Opcode::from_u8)
            .ok_or(DisassemblerError::UnknownOpcode { addr: self.addr, word })?;

        let instr = match opcode {
            // ========== Stack and constants ==========
            Opcode::Nop => I::Nop,
            Opcode::Num => I::Num { index: self.index()? },
            Opcode::Str => I::Str { index: self.index()? },
            Opcode::Dupe => I::Dupe,
            Opcode::Drop => I::Drop,
            Opcode::Swap => I::Swap,

            // ========== Reads ==========
            Opcode::Field => I::Field,
            Opcode::FieldNum => I::FieldNum { index: self.index()? },
            Opcode::Global => I::Global { index: self.index()? },
            Opcode::Local => I::Local { slot: self.index()? },
            Opcode::Special => I::Special { index: self.index()? },
            Opcode::ArrayGlobal => I::ArrayGlobal { array: self.index()? },
            Opcode::ArrayLocal => I::ArrayLocal { slot: self.index()? },
            Opcode::InGlobal => I::InGlobal { array: self.index()? },
            Opcode::InLocal => I::InLocal { slot: self.index()? },

            // ========== Assignment and deletion ==========
            Opcode::AssignField => I::AssignField,
            Opcode::AssignGlobal => I::AssignGlobal { index: self.index()? },
            Opcode::AssignLocal => I::AssignLocal { slot: self.index()? },
            Opcode::AssignSpecial => I::AssignSpecial { index: self.index()? },
            Opcode::AssignArrayGlobal => I::AssignArrayGlobal { array: self.index()? },
            Opcode::AssignArrayLocal => I::AssignArrayLocal { slot: self.index()? },
            Opcode::DeleteGlobal => I::DeleteGlobal { array: self.index()? },
            Opcode::DeleteLocal => I::DeleteLocal { slot: self.index()? },
            Opcode::DeleteAllGlobal => I::DeleteAllGlobal { array: self.index()? },
            Opcode::DeleteAllLocal => I::DeleteAllLocal { slot: self.index()? },

            // ========== Increment and augmented assignment ==========
            Opcode::IncrField => I::IncrField { amount: self.word()? },
            Opcode::IncrGlobal => I::IncrGlobal { amount: self.word()?, index: self.index()? },
            Opcode::IncrLocal => I::IncrLocal { amount: self.word()?, slot: self.index()? },
            Opcode::IncrSpecial => I::IncrSpecial { amount: self.word()?, index: self.index()? },
            Opcode::IncrArrayGlobal => I::IncrArrayGlobal { amount: self.word()?, array: self.index()? },
            Opcode::IncrArrayLocal => I::IncrArrayLocal { amount: self.word()?, slot: self.index()? },
            Opcode::AugAssignField => I::AugAssignField { op: self.op()? },
            Opcode::AugAssignGlobal => I::AugAssignGlobal { op: self.op()?, index: self.index()? },
            Opcode::AugAssignLocal => I::AugAssignLocal { op: self.op()?, slot: self.index()? },
            Opcode::AugAssignSpecial => I::AugAssignSpecial { op: self.op()?, index: self.index()? },
            Opcode::AugAssignArrayGlobal => I::AugAssignArrayGlobal { op: self.op()?, array: self.index()? },
            Opcode::AugAssignArrayLocal => I::AugAssignArrayLocal { op: self.op()?, slot: self.index()? },

            // ========== Expressions ==========
            Opcode::Regex => I::Regex { index: self.index()? },
            Opcode::MultiIndex => I::MultiIndex { count: self.index()? },
            Opcode::Add => I::Add,
            Opcode::Subtract => I::Subtract,
            Opcode::Multiply => I::Multiply,
            Opcode::Divide => I::Divide,
            Opcode::Power => I::Power,
            Opcode::Modulo => I::Modulo,
            Opcode::Concat => I::Concat,
            Opcode::Match => I::Match,
            Opcode::NotMatch => I::NotMatch,
            Opcode::Equals => I::Equals,
            Opcode::NotEquals => I::NotEquals,
            Opcode::Less => I::Less,
            Opcode::Greater => I::Greater,
            Opcode::LessOrEqual => I::LessOrEqual,
            Opcode::GreaterOrEqual => I::GreaterOrEqual,
            Opcode::Not => I::Not,
            Opcode::UnaryMinus => I::UnaryMinus,
            Opcode::UnaryPlus => I::UnaryPlus,
            Opcode::Boolean => I::Boolean,

            // ========== Jumps ==========
            Opcode::Jump => I::Jump { offset: self.word()? },
            Opcode::JumpFalse => I::JumpFalse { offset: self.word()? },
            Opcode::JumpTrue => I::JumpTrue { offset: self.word()? },
            Opcode::JumpNumLess => I::JumpNumLess { offset: self.word()? },
            Opcode::JumpNumGreater => I::JumpNumGreater { offset: self.word()? },
            Opcode::JumpNumLessOrEqual => I::JumpNumLessOrEqual { offset: self.word()? },
            Opcode::JumpNumGreaterOrEqual => I::JumpNumGreaterOrEqual { offset: self.word()? },

            // ========== Loops and flow control ==========
            Opcode::ForGlobalInGlobal => I::ForGlobalInGlobal {
                var: self.index()?,
                array: self.index()?,
                offset: self.word()?,
            },
            Opcode::ForGlobalInLocal => I::ForGlobalInLocal {
                var: self.index()?,
                array: self.index()?,
                offset: self.word()?,
            },
            Opcode::ForLocalInGlobal => I::ForLocalInGlobal {
                var: self.index()?,
                array: self.index()?,
                offset: self.word()?,
            },
            Opcode::ForLocalInLocal => I::ForLocalInLocal {
                var: self.index()?,
                array: self.index()?,
                offset: self.word()?,
            },
            Opcode::BreakForIn => I::BreakForIn,
            Opcode::Next => I::Next,
            Opcode::Exit => I::Exit,
            Opcode::Return => I::Return,
            Opcode::ReturnNull => I::ReturnNull,
            Opcode::ExitStatus => I::ExitStatus,

            // ========== Builtins ==========
            Opcode::CallLength => I::CallLength,
            Opcode::CallLengthArg => I::CallLengthArg,
            Opcode::CallIndex => I::CallIndex,
            Opcode::CallSubstr => I::CallSubstr,
            Opcode::CallSubstrLength => I::CallSubstrLength,
            Opcode::CallTolower => I::CallTolower,
            Opcode::CallToupper => I::CallToupper,
            Opcode::CallInt => I::CallInt,
            Opcode::CallSqrt => I::CallSqrt,
            Opcode::CallExp => I::CallExp,
            Opcode::CallLog => I::CallLog,
            Opcode::CallSin => I::CallSin,
            Opcode::CallCos => I::CallCos,
            Opcode::CallAtan2 => I::CallAtan2,
            Opcode::CallMatch => I::CallMatch,
            Opcode::CallSystem => I::CallSystem,
            Opcode::CallClose => I::CallClose,
            Opcode::CallFflush => I::CallFflush,
            Opcode::CallFflushAll => I::CallFflushAll,
            Opcode::CallSplitGlobal => I::CallSplitGlobal { array: self.index()? },
            Opcode::CallSplitLocal => I::CallSplitLocal { slot: self.index()? },
            Opcode::CallSplitSepGlobal => I::CallSplitSepGlobal { array: self.index()? },
            Opcode::CallSplitSepLocal => I::CallSplitSepLocal { slot: self.index()? },
            Opcode::CallSprintf => I::CallSprintf { count: self.index()? },

            // ========== Calls and output ==========
            Opcode::CallUser => {
                let func = self.index()?;
                let count = self.index()? as usize;
                // Each argument needs two words; reject absurd counts before allocating
                if count > self.code.len().saturating_sub(self.pos) / 2 {
                    return Err(DisassemblerError::Truncated { addr: self.addr });
                }
                let mut arrays = Vec::with_capacity(count);
                for _ in 0..count {
                    arrays.push(self.array_arg()?);
                }
                I::CallUser { func, arrays }
            }
            Opcode::Nulls => I::Nulls { count: self.index()? },
            Opcode::Print => I::Print { count: self.index()?, redirect: self.redirect()? },
            Opcode::Printf => I::Printf { count: self.index()?, redirect: self.redirect()? },
        };
        Ok(instr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(opcode: Opcode) -> Word {
        opcode.to_u8() as Word
    }

    #[test]
    fn test_decode_advances_ip() {
        let code = vec![op(Opcode::Num), 0, op(Opcode::IncrGlobal), -1, 2, op(Opcode::Add)];
        let mut ip = 0;
        assert_eq!(decode(&code, &mut ip).unwrap(), Instruction::Num { index: 0 });
        assert_eq!(ip, 2);
        assert_eq!(decode(&code, &mut ip).unwrap(), Instruction::IncrGlobal { amount: -1, index: 2 });
        assert_eq!(ip, 5);
        assert_eq!(decode(&code, &mut ip).unwrap(), Instruction::Add);
        assert_eq!(ip, 6);
    }

    #[test]
    fn test_decode_call_user() {
        let code = vec![op(Opcode::CallUser), 3, 2, 0, 1, 1, 0];
        let mut ip = 0;
        assert_eq!(
            decode(&code, &mut ip).unwrap(),
            Instruction::CallUser { func: 3, arrays: vec![ArrayArg::global(1), ArrayArg::local(0)] }
        );
        assert_eq!(ip, 7);
    }

    #[test]
    fn test_decode_print_redirect() {
        let code = vec![op(Opcode::Print), 2, 2];
        let mut ip = 0;
        assert_eq!(
            decode(&code, &mut ip).unwrap(),
            Instruction::Print { count: 2, redirect: Redirect::Append }
        );
    }

    #[test]
    fn test_decode_truncated() {
        let code = vec![op(Opcode::Nop), op(Opcode::ForGlobalInGlobal), 0, 0];
        let mut ip = 1;
        assert!(matches!(decode(&code, &mut ip), Err(DisassemblerError::Truncated { addr: 1 })));
        assert_eq!(ip, 1);
    }

    #[test]
    fn test_decode_truncated_call_user() {
        let code = vec![op(Opcode::CallUser), 0, 1_000_000];
        let mut ip = 0;
        assert!(matches!(decode(&code, &mut ip), Err(DisassemblerError::Truncated { .. })));
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let mut ip = 0;
        assert!(matches!(
            decode(&[0xEE], &mut ip),
            Err(DisassemblerError::UnknownOpcode { addr: 0, word: 0xEE })
        ));
        assert!(matches!(decode(&[-1], &mut ip), Err(DisassemblerError::UnknownOpcode { .. })));
    }

    #[test]
    fn test_decode_bad_operands() {
        let mut ip = 0;
        assert!(matches!(
            decode(&[op(Opcode::Global), -4], &mut ip),
            Err(DisassemblerError::InvalidOperand { .. })
        ));
        assert!(matches!(
            decode(&[op(Opcode::AugAssignField), 9], &mut ip),
            Err(DisassemblerError::InvalidOperand { .. })
        ));
        assert!(matches!(
            decode(&[op(Opcode::Printf), 1, 7], &mut ip),
            Err(DisassemblerError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_instructions_iterator() {
        let code = vec![op(Opcode::Nop), op(Opcode::Jump), -3, op(Opcode::Drop)];
        let decoded: Vec<_> = instructions(&code).map(|r| r.unwrap()).collect();
        assert_eq!(
            decoded,
            vec![
                (0, Instruction::Nop),
                (1, Instruction::Jump { offset: -3 }),
                (3, Instruction::Drop),
            ]
        );
    }

    #[test]
    fn test_instructions_stop_after_error() {
        let code = vec![op(Opcode::Nop), 0xEE, op(Opcode::Nop)];
        let results: Vec<_> = instructions(&code).collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Arbitrary words never panic the decoder, and a successful
            // decode consumes exactly the instruction's width.
            #[test]
            fn decode_width_matches(words in prop::collection::vec(-4i32..0x90, 1..16)) {
                let mut ip = 0;
                while ip < words.len() {
                    let start = ip;
                    match decode(&words, &mut ip) {
                        Ok(instr) => prop_assert_eq!(ip - start, instr.width()),
                        Err(_) => {
                            prop_assert_eq!(ip, start);
                            break;
                        }
                    }
                }
            }
        }
    }
}
