//! Instruction encoding to stream words
//!
//! Every instruction is one opcode word followed by its operands in the
//! order they appear in the `Instruction` variant. Jump offsets are always the
//! last word of their instruction, so an offset is measured from the end of
//! the instruction that carries it.

use awkvm_spec::{Instruction, Word};
use crate::error::{AssemblerError, Result};

/// Append the encoding of `instr` to `out`
pub fn encode_into(instr: &Instruction, out: &mut Vec<Word>) {
    use Instruction as I;

    out.push(instr.opcode().to_u8() as Word);
    match instr {
        // ========== Single pool index / slot / count ==========
        I::Num { index }
        | I::Str { index }
        | I::FieldNum { index }
        | I::Global { index }
        | I::Special { index }
        | I::AssignGlobal { index }
        | I::AssignSpecial { index }
        | I::Regex { index } => out.push(*index as Word),

        I::Local { slot }
        | I::ArrayLocal { slot }
        | I::InLocal { slot }
        | I::AssignLocal { slot }
        | I::AssignArrayLocal { slot }
        | I::DeleteLocal { slot }
        | I::DeleteAllLocal { slot }
        | I::CallSplitLocal { slot }
        | I::CallSplitSepLocal { slot } => out.push(*slot as Word),

        I::ArrayGlobal { array }
        | I::InGlobal { array }
        | I::AssignArrayGlobal { array }
        | I::DeleteGlobal { array }
        | I::DeleteAllGlobal { array }
        | I::CallSplitGlobal { array }
        | I::CallSplitSepGlobal { array } => out.push(*array as Word),

        I::MultiIndex { count } | I::CallSprintf { count } | I::Nulls { count } => {
            out.push(*count as Word)
        }

        // ========== Increment: amount, target ==========
        I::IncrField { amount } => out.push(*amount),
        I::IncrGlobal { amount, index } | I::IncrSpecial { amount, index } => {
            out.push(*amount);
            out.push(*index as Word);
        }
        I::IncrLocal { amount, slot } | I::IncrArrayLocal { amount, slot } => {
            out.push(*amount);
            out.push(*slot as Word);
        }
        I::IncrArrayGlobal { amount, array } => {
            out.push(*amount);
            out.push(*array as Word);
        }

        // ========== Augmented assignment: operator, target ==========
        I::AugAssignField { op } => out.push(op.to_word()),
        I::AugAssignGlobal { op, index } | I::AugAssignSpecial { op, index } => {
            out.push(op.to_word());
            out.push(*index as Word);
        }
        I::AugAssignLocal { op, slot } | I::AugAssignArrayLocal { op, slot } => {
            out.push(op.to_word());
            out.push(*slot as Word);
        }
        I::AugAssignArrayGlobal { op, array } => {
            out.push(op.to_word());
            out.push(*array as Word);
        }

        // ========== Jumps ==========
        I::Jump { offset }
        | I::JumpFalse { offset }
        | I::JumpTrue { offset }
        | I::JumpNumLess { offset }
        | I::JumpNumGreater { offset }
        | I::JumpNumLessOrEqual { offset }
        | I::JumpNumGreaterOrEqual { offset } => out.push(*offset),

        I::ForGlobalInGlobal { var, array, offset }
        | I::ForGlobalInLocal { var, array, offset }
        | I::ForLocalInGlobal { var, array, offset }
        | I::ForLocalInLocal { var, array, offset } => {
            out.push(*var as Word);
            out.push(*array as Word);
            out.push(*offset);
        }

        // ========== Calls and output ==========
        I::CallUser { func, arrays } => {
            out.push(*func as Word);
            out.push(arrays.len() as Word);
            for arg in arrays {
                out.push(arg.scope.to_word());
                out.push(arg.index as Word);
            }
        }
        I::Print { count, redirect } | I::Printf { count, redirect } => {
            out.push(*count as Word);
            out.push(redirect.to_word());
        }

        // ========== No operands ==========
        I::Nop
        | I::Dupe
        | I::Drop
        | I::Swap
        | I::Field
        | I::AssignField
        | I::Add
        | I::Subtract
        | I::Multiply
        | I::Divide
        | I::Power
        | I::Modulo
        | I::Concat
        | I::Match
        | I::NotMatch
        | I::Equals
        | I::NotEquals
        | I::Less
        | I::Greater
        | I::LessOrEqual
        | I::GreaterOrEqual
        | I::Not
        | I::UnaryMinus
        | I::UnaryPlus
        | I::Boolean
        | I::BreakForIn
        | I::Next
        | I::Exit
        | I::Return
        | I::ReturnNull
        | I::ExitStatus
        | I::CallLength
        | I::CallLengthArg
        | I::CallIndex
        | I::CallSubstr
        | I::CallSubstrLength
        | I::CallTolower
        | I::CallToupper
        | I::CallInt
        | I::CallSqrt
        | I::CallExp
        | I::CallLog
        | I::CallSin
        | I::CallCos
        | I::CallAtan2
        | I::CallMatch
        | I::CallSystem
        | I::CallClose
        | I::CallFflush
        | I::CallFflushAll => {}
    }
}

/// Encode a single instruction to its words
pub fn encode(instr: &Instruction) -> Vec<Word> {
    let mut out = Vec::with_capacity(instr.width());
    encode_into(instr, &mut out);
    out
}

/// Forward or backward jump target, resolved when the stream is finished
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Debug)]
struct Fixup {
    /// Index of the offset word to patch
    site: usize,
    label: Label,
}

/// Stream builder with label-based jumps and backpatching
///
/// Jumps are emitted with a placeholder offset and patched in `finish` once
/// every label address is known.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<Word>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current address (index of the next word to be emitted)
    pub fn addr(&self) -> usize {
        self.code.len()
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current address
    pub fn bind(&mut self, label: Label) -> Result<()> {
        match self.labels.get_mut(label.0) {
            Some(slot @ None) => {
                *slot = Some(self.code.len());
                Ok(())
            }
            Some(Some(_)) => Err(AssemblerError::LabelRebound(label.0)),
            None => Err(AssemblerError::UnknownLabel(label.0)),
        }
    }

    pub fn emit(&mut self, instr: &Instruction) {
        encode_into(instr, &mut self.code);
    }

    /// Emit a jump or `for-in` instruction whose offset targets `label`
    ///
    /// The offset carried by `instr` is ignored and replaced on `finish`.
    pub fn emit_jump(&mut self, instr: &Instruction, label: Label) -> Result<()> {
        if instr.jump_offset().is_none() {
            return Err(AssemblerError::NotAJump(instr.mnemonic().to_string()));
        }
        if label.0 >= self.labels.len() {
            return Err(AssemblerError::UnknownLabel(label.0));
        }
        encode_into(instr, &mut self.code);
        self.fixups.push(Fixup { site: self.code.len() - 1, label });
        Ok(())
    }

    /// Resolve every pending jump and return the finished stream
    pub fn finish(mut self) -> Result<Vec<Word>> {
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0].ok_or(AssemblerError::UnboundLabel(fixup.label.0))?;
            let offset = target as i64 - (fixup.site as i64 + 1);
            self.code[fixup.site] = Word::try_from(offset)
                .map_err(|_| AssemblerError::JumpOutOfRange(offset))?;
        }
        Ok(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awkvm_spec::{ArrayArg, AugOp, Opcode, Redirect};

    #[test]
    fn test_encode_no_operands() {
        assert_eq!(encode(&Instruction::Add), vec![Opcode::Add.to_u8() as Word]);
    }

    #[test]
    fn test_encode_operand_order() {
        assert_eq!(
            encode(&Instruction::IncrGlobal { amount: -1, index: 3 }),
            vec![Opcode::IncrGlobal.to_u8() as Word, -1, 3]
        );
        assert_eq!(
            encode(&Instruction::AugAssignArrayLocal { op: AugOp::Pow, slot: 2 }),
            vec![Opcode::AugAssignArrayLocal.to_u8() as Word, 5, 2]
        );
        assert_eq!(
            encode(&Instruction::Print { count: 2, redirect: Redirect::Append }),
            vec![Opcode::Print.to_u8() as Word, 2, 2]
        );
    }

    #[test]
    fn test_encode_call_user() {
        let instr = Instruction::CallUser {
            func: 1,
            arrays: vec![ArrayArg::global(4), ArrayArg::local(0)],
        };
        assert_eq!(encode(&instr), vec![Opcode::CallUser.to_u8() as Word, 1, 2, 0, 4, 1, 0]);
    }

    #[test]
    fn test_width_agrees_with_encoding() {
        let samples = [
            Instruction::Nop,
            Instruction::Num { index: 0 },
            Instruction::IncrArrayGlobal { amount: 1, array: 0 },
            Instruction::ForLocalInGlobal { var: 0, array: 0, offset: 0 },
            Instruction::Printf { count: 3, redirect: Redirect::Pipe },
        ];
        for instr in samples {
            assert_eq!(encode(&instr).len(), instr.width(), "{:?}", instr);
        }
    }

    #[test]
    fn test_forward_jump_backpatch() {
        let mut builder = CodeBuilder::new();
        let done = builder.new_label();
        builder.emit_jump(&Instruction::Jump { offset: 0 }, done).unwrap();
        builder.emit(&Instruction::Nop);
        builder.emit(&Instruction::Nop);
        builder.bind(done).unwrap();
        let code = builder.finish().unwrap();
        // offset word at 1, next address 2, target 4
        assert_eq!(code[1], 2);
    }

    #[test]
    fn test_backward_jump_backpatch() {
        let mut builder = CodeBuilder::new();
        let top = builder.new_label();
        builder.bind(top).unwrap();
        builder.emit(&Instruction::Nop);
        builder.emit_jump(&Instruction::JumpTrue { offset: 0 }, top).unwrap();
        let code = builder.finish().unwrap();
        // offset word at 2, next address 3, target 0
        assert_eq!(code[2], -3);
    }

    #[test]
    fn test_for_in_offset_is_last_word() {
        let mut builder = CodeBuilder::new();
        let exit = builder.new_label();
        builder
            .emit_jump(&Instruction::ForGlobalInGlobal { var: 0, array: 0, offset: 0 }, exit)
            .unwrap();
        builder.emit(&Instruction::Nop);
        builder.bind(exit).unwrap();
        let code = builder.finish().unwrap();
        assert_eq!(code, vec![Opcode::ForGlobalInGlobal.to_u8() as Word, 0, 0, 1, 0]);
    }

    #[test]
    fn test_unbound_label() {
        let mut builder = CodeBuilder::new();
        let nowhere = builder.new_label();
        builder.emit_jump(&Instruction::Jump { offset: 0 }, nowhere).unwrap();
        assert!(matches!(builder.finish(), Err(AssemblerError::UnboundLabel(_))));
    }

    #[test]
    fn test_rebind_label() {
        let mut builder = CodeBuilder::new();
        let label = builder.new_label();
        builder.bind(label).unwrap();
        assert!(matches!(builder.bind(label), Err(AssemblerError::LabelRebound(_))));
    }

    #[test]
    fn test_emit_jump_rejects_non_jump() {
        let mut builder = CodeBuilder::new();
        let label = builder.new_label();
        assert!(matches!(
            builder.emit_jump(&Instruction::Add, label),
            Err(AssemblerError::NotAJump(_))
        ));
    }
}
