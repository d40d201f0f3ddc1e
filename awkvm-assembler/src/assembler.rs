//! Main assembler logic
//!
//! Resolves names into the program's pools and name tables, encodes each
//! statement, and closes every section through a [`CodeBuilder`] so labels are
//! backpatched once their addresses are known.

use std::collections::HashMap;

use awkvm_spec::{
    Action, ArrayArg, AugOp, Function, Instruction, Opcode, Program, Redirect, SpecialVar, Word,
};
use crate::encoder::{CodeBuilder, Label};
use crate::error::{AssemblerError, Result};
use crate::parser::{parse_source, Line, Operand, Section};

/// Assemble source code into a program
pub fn assemble(source: &str) -> Result<Program> {
    let lines = parse_source(source)?;
    let mut assembler = Assembler::default();

    // Functions may be called before their section appears
    for (_, line) in &lines {
        if let Line::Section(Section::Function { name, params, locals }) = line {
            assembler.program.functions.push(Function {
                name: name.clone(),
                params: params.iter().map(|p| p.name.clone()).collect(),
                arrays: params.iter().map(|p| p.is_array).collect(),
                num_locals: *locals,
                body: Vec::new(),
            });
        }
    }

    for (line, parsed) in lines {
        assembler.line(line, parsed)?;
    }
    assembler.finish()
}

/// Where a jump or `for-in` instruction lands
enum JumpTarget {
    Label(String),
    Address(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Begin,
    End,
    Pattern { action: usize },
    Start { action: usize },
    Stop { action: usize },
    Body { action: usize },
    Function { index: usize },
}

struct OpenSection {
    target: Target,
    builder: CodeBuilder,
    /// name -> (label, line of first mention)
    labels: HashMap<String, (Label, usize)>,
    bound: Vec<String>,
}

impl OpenSection {
    fn new(target: Target) -> Self {
        Self {
            target,
            builder: CodeBuilder::new(),
            labels: HashMap::new(),
            bound: Vec::new(),
        }
    }

    fn label(&mut self, name: &str, line: usize) -> Label {
        if let Some((label, _)) = self.labels.get(name) {
            return *label;
        }
        let label = self.builder.new_label();
        self.labels.insert(name.to_string(), (label, line));
        label
    }
}

#[derive(Default)]
struct Assembler {
    program: Program,
    section: Option<OpenSection>,
    next_function: usize,
}

impl Assembler {
    fn line(&mut self, line: usize, parsed: Line) -> Result<()> {
        match parsed {
            Line::Directive { name, args } => self.directive(line, &name, &args),
            Line::Section(section) => self.open_section(line, section),
            Line::Label(name) => {
                let section = self.section.as_mut().ok_or(AssemblerError::NoSection(line))?;
                if section.bound.contains(&name) {
                    return Err(AssemblerError::DuplicateLabel { line, name });
                }
                let label = section.label(&name, line);
                section.builder.bind(label)?;
                section.bound.push(name);
                Ok(())
            }
            Line::Statement { mnemonic, operands } => self.statement(line, &mnemonic, &operands),
        }
    }

    fn directive(&mut self, line: usize, name: &str, args: &[String]) -> Result<()> {
        match name {
            "globals" => {
                for arg in args {
                    intern(&mut self.program.scalar_names, arg);
                }
            }
            "arrays" => {
                for arg in args {
                    intern(&mut self.program.array_names, arg);
                }
            }
            _ => {
                return Err(AssemblerError::InvalidDirective { line, name: name.to_string() });
            }
        }
        Ok(())
    }

    fn open_section(&mut self, line: usize, section: Section) -> Result<()> {
        let previous = self.close_section()?;

        let target = match section {
            Section::Begin if self.program.begin.is_some() => {
                return Err(duplicate_section(line, "BEGIN"));
            }
            Section::Begin => Target::Begin,
            Section::End if self.program.end.is_some() => {
                return Err(duplicate_section(line, "END"));
            }
            Section::End => Target::End,
            Section::Pattern => Target::Pattern { action: self.new_action() },
            Section::Start => Target::Start { action: self.new_action() },
            Section::Stop => match previous {
                Some(Target::Start { action }) => Target::Stop { action },
                _ => {
                    return Err(AssemblerError::SyntaxError {
                        line,
                        column: 0,
                        message: "stop: must directly follow start:".to_string(),
                    })
                }
            },
            Section::Body => match previous {
                Some(Target::Pattern { action }) | Some(Target::Stop { action }) => Target::Body { action },
                _ => Target::Body { action: self.new_action() },
            },
            Section::Function { .. } => {
                let index = self.next_function;
                self.next_function += 1;
                Target::Function { index }
            }
        };

        self.section = Some(OpenSection::new(target));
        Ok(())
    }

    fn new_action(&mut self) -> usize {
        self.program.actions.push(Action::default());
        self.program.actions.len() - 1
    }

    /// Finish the open section and store its stream; returns its target
    fn close_section(&mut self) -> Result<Option<Target>> {
        let Some(section) = self.section.take() else {
            return Ok(None);
        };

        for (name, (_, first_use)) in &section.labels {
            if !section.bound.contains(name) {
                return Err(AssemblerError::UndefinedLabel { line: *first_use, name: name.clone() });
            }
        }

        let code: Vec<Word> = section.builder.finish()?;
        match section.target {
            Target::Begin => self.program.begin = Some(code),
            Target::End => self.program.end = Some(code),
            Target::Pattern { action } | Target::Start { action } | Target::Stop { action } => {
                self.program.actions[action].pattern.push(code)
            }
            Target::Body { action } => self.program.actions[action].body = Some(code),
            Target::Function { index } => self.program.functions[index].body = code,
        }
        Ok(Some(section.target))
    }

    fn finish(mut self) -> Result<Program> {
        self.close_section()?;
        Ok(self.program)
    }

    fn statement(&mut self, line: usize, mnemonic: &str, operands: &[Operand]) -> Result<()> {
        let opcode = Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.name() == mnemonic)
            .ok_or_else(|| AssemblerError::UnknownInstruction { line, name: mnemonic.to_string() })?;

        let target = self.section.as_ref().map(|s| s.target).ok_or(AssemblerError::NoSection(line))?;
        let function = match target {
            Target::Function { index } => Some(index),
            _ => None,
        };

        let mut ops = Operands { line, operands, pos: 0, function, program: &mut self.program };
        let mut jump_to = None;

        use Instruction as I;
        let instr = match opcode {
            Opcode::Nop => I::Nop,
            Opcode::Num => I::Num { index: ops.num()? },
            Opcode::Str => I::Str { index: ops.string()? },
            Opcode::Dupe => I::Dupe,
            Opcode::Drop => I::Drop,
            Opcode::Swap => I::Swap,

            Opcode::Field => I::Field,
            Opcode::FieldNum => I::FieldNum { index: ops.count()? },
            Opcode::Global => I::Global { index: ops.scalar()? },
            Opcode::Local => I::Local { slot: ops.slot()? },
            Opcode::Special => I::Special { index: ops.special()? },
            Opcode::ArrayGlobal => I::ArrayGlobal { array: ops.array()? },
            Opcode::ArrayLocal => I::ArrayLocal { slot: ops.slot()? },
            Opcode::InGlobal => I::InGlobal { array: ops.array()? },
            Opcode::InLocal => I::InLocal { slot: ops.slot()? },

            Opcode::AssignField => I::AssignField,
            Opcode::AssignGlobal => I::AssignGlobal { index: ops.scalar()? },
            Opcode::AssignLocal => I::AssignLocal { slot: ops.slot()? },
            Opcode::AssignSpecial => I::AssignSpecial { index: ops.special()? },
            Opcode::AssignArrayGlobal => I::AssignArrayGlobal { array: ops.array()? },
            Opcode::AssignArrayLocal => I::AssignArrayLocal { slot: ops.slot()? },
            Opcode::DeleteGlobal => I::DeleteGlobal { array: ops.array()? },
            Opcode::DeleteLocal => I::DeleteLocal { slot: ops.slot()? },
            Opcode::DeleteAllGlobal => I::DeleteAllGlobal { array: ops.array()? },
            Opcode::DeleteAllLocal => I::DeleteAllLocal { slot: ops.slot()? },

            Opcode::IncrField => I::IncrField { amount: ops.amount()? },
            Opcode::IncrGlobal => I::IncrGlobal { amount: ops.amount()?, index: ops.scalar()? },
            Opcode::IncrLocal => I::IncrLocal { amount: ops.amount()?, slot: ops.slot()? },
            Opcode::IncrSpecial => I::IncrSpecial { amount: ops.amount()?, index: ops.special()? },
            Opcode::IncrArrayGlobal => I::IncrArrayGlobal { amount: ops.amount()?, array: ops.array()? },
            Opcode::IncrArrayLocal => I::IncrArrayLocal { amount: ops.amount()?, slot: ops.slot()? },
            Opcode::AugAssignField => I::AugAssignField { op: ops.aug_op()? },
            Opcode::AugAssignGlobal => I::AugAssignGlobal { op: ops.aug_op()?, index: ops.scalar()? },
            Opcode::AugAssignLocal => I::AugAssignLocal { op: ops.aug_op()?, slot: ops.slot()? },
            Opcode::AugAssignSpecial => I::AugAssignSpecial { op: ops.aug_op()?, index: ops.special()? },
            Opcode::AugAssignArrayGlobal => {
                I::AugAssignArrayGlobal { op: ops.aug_op()?, array: ops.array()? }
            }
            Opcode::AugAssignArrayLocal => I::AugAssignArrayLocal { op: ops.aug_op()?, slot: ops.slot()? },

            Opcode::Regex => I::Regex { index: ops.regex()? },
            Opcode::MultiIndex => I::MultiIndex { count: ops.count()? },
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

            Opcode::Jump
            | Opcode::JumpFalse
            | Opcode::JumpTrue
            | Opcode::JumpNumLess
            | Opcode::JumpNumGreater
            | Opcode::JumpNumLessOrEqual
            | Opcode::JumpNumGreaterOrEqual => {
                jump_to = Some(ops.jump_target()?);
                match opcode {
                    Opcode::Jump => I::Jump { offset: 0 },
                    Opcode::JumpFalse => I::JumpFalse { offset: 0 },
                    Opcode::JumpTrue => I::JumpTrue { offset: 0 },
                    Opcode::JumpNumLess => I::JumpNumLess { offset: 0 },
                    Opcode::JumpNumGreater => I::JumpNumGreater { offset: 0 },
                    Opcode::JumpNumLessOrEqual => I::JumpNumLessOrEqual { offset: 0 },
                    _ => I::JumpNumGreaterOrEqual { offset: 0 },
                }
            }

            Opcode::ForGlobalInGlobal => {
                let (var, array) = (ops.scalar()?, ops.array()?);
                jump_to = Some(ops.jump_target()?);
                I::ForGlobalInGlobal { var, array, offset: 0 }
            }
            Opcode::ForGlobalInLocal => {
                let (var, array) = (ops.scalar()?, ops.slot()?);
                jump_to = Some(ops.jump_target()?);
                I::ForGlobalInLocal { var, array, offset: 0 }
            }
            Opcode::ForLocalInGlobal => {
                let (var, array) = (ops.slot()?, ops.array()?);
                jump_to = Some(ops.jump_target()?);
                I::ForLocalInGlobal { var, array, offset: 0 }
            }
            Opcode::ForLocalInLocal => {
                let (var, array) = (ops.slot()?, ops.slot()?);
                jump_to = Some(ops.jump_target()?);
                I::ForLocalInLocal { var, array, offset: 0 }
            }
            Opcode::BreakForIn => I::BreakForIn,
            Opcode::Next => I::Next,
            Opcode::Exit => I::Exit,
            Opcode::Return => I::Return,
            Opcode::ReturnNull => I::ReturnNull,
            Opcode::ExitStatus => I::ExitStatus,

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
            Opcode::CallSplitGlobal => I::CallSplitGlobal { array: ops.array()? },
            Opcode::CallSplitLocal => I::CallSplitLocal { slot: ops.slot()? },
            Opcode::CallSplitSepGlobal => I::CallSplitSepGlobal { array: ops.array()? },
            Opcode::CallSplitSepLocal => I::CallSplitSepLocal { slot: ops.slot()? },
            Opcode::CallSprintf => I::CallSprintf { count: ops.count()? },

            Opcode::CallUser => {
                let func = ops.function()?;
                let mut arrays = Vec::new();
                while !ops.done() {
                    arrays.push(ops.array_arg()?);
                }
                I::CallUser { func, arrays }
            }
            Opcode::Nulls => I::Nulls { count: ops.count()? },
            Opcode::Print => I::Print { count: ops.count()?, redirect: ops.redirect()? },
            Opcode::Printf => I::Printf { count: ops.count()?, redirect: ops.redirect()? },
        };

        if !ops.done() {
            return Err(AssemblerError::InvalidOperand {
                line,
                message: format!("too many operands for {}", mnemonic),
            });
        }

        let section = self.section.as_mut().ok_or(AssemblerError::NoSection(line))?;
        match jump_to {
            Some(JumpTarget::Label(name)) => {
                let label = section.label(&name, line);
                section.builder.emit_jump(&instr, label)?;
            }
            Some(JumpTarget::Address(target)) => {
                // The offset word is the last word of the instruction
                let next = section.builder.addr() + instr.width();
                let offset = target as i64 - next as i64;
                let offset = Word::try_from(offset).map_err(|_| AssemblerError::JumpOutOfRange(offset))?;
                section.builder.emit(&with_offset(instr, offset));
            }
            None => section.builder.emit(&instr),
        }
        Ok(())
    }
}

/// Cursor over one statement's operands
struct Operands<'a> {
    line: usize,
    operands: &'a [Operand],
    pos: usize,
    function: Option<usize>,
    program: &'a mut Program,
}

impl<'a> Operands<'a> {
    fn done(&self) -> bool {
        self.pos >= self.operands.len()
    }

    fn next(&mut self, what: &str) -> Result<&'a Operand> {
        let operands = self.operands;
        let operand = operands.get(self.pos).ok_or_else(|| AssemblerError::InvalidOperand {
            line: self.line,
            message: format!("missing {}", what),
        })?;
        self.pos += 1;
        Ok(operand)
    }

    fn invalid(&self, message: String) -> AssemblerError {
        AssemblerError::InvalidOperand { line: self.line, message }
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        match self.next(what)? {
            Operand::Ident(name) => Ok(name.clone()),
            other => Err(self.invalid(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn integer(&mut self, what: &str) -> Result<f64> {
        match self.next(what)? {
            Operand::Number(n) if n.fract() == 0.0 => Ok(*n),
            other => Err(self.invalid(format!("expected integer {}, found {:?}", what, other))),
        }
    }

    fn count(&mut self) -> Result<u32> {
        let n = self.integer("count")?;
        if !(0.0..=u32::MAX as f64).contains(&n) {
            return Err(self.invalid(format!("count {} out of range", n)));
        }
        Ok(n as u32)
    }

    fn amount(&mut self) -> Result<i32> {
        let n = self.integer("amount")?;
        if !(i32::MIN as f64..=i32::MAX as f64).contains(&n) {
            return Err(self.invalid(format!("amount {} out of range", n)));
        }
        Ok(n as i32)
    }

    fn num(&mut self) -> Result<u32> {
        let value = match self.next("number")? {
            Operand::Number(n) => *n,
            other => return Err(self.invalid(format!("expected number, found {:?}", other))),
        };
        let nums = &mut self.program.nums;
        let index = match nums.iter().position(|n| n.to_bits() == value.to_bits()) {
            Some(index) => index,
            None => {
                nums.push(value);
                nums.len() - 1
            }
        };
        Ok(index as u32)
    }

    fn quoted(&mut self, what: &str) -> Result<String> {
        match self.next(what)? {
            Operand::Str(s) => Ok(s.clone()),
            other => Err(self.invalid(format!("expected quoted {}, found {:?}", what, other))),
        }
    }

    fn string(&mut self) -> Result<u32> {
        let value = self.quoted("string")?;
        Ok(intern(&mut self.program.strs, &value))
    }

    fn regex(&mut self) -> Result<u32> {
        let value = self.quoted("regex")?;
        Ok(intern(&mut self.program.regexes, &value))
    }

    fn scalar(&mut self) -> Result<u32> {
        let name = self.ident("scalar name")?;
        Ok(intern(&mut self.program.scalar_names, &name))
    }

    fn array(&mut self) -> Result<u32> {
        let name = self.ident("array name")?;
        Ok(intern(&mut self.program.array_names, &name))
    }

    fn special(&mut self) -> Result<u32> {
        let name = self.ident("special variable")?;
        SpecialVar::from_name(&name)
            .map(SpecialVar::index)
            .ok_or_else(|| self.invalid(format!("unknown special variable {}", name)))
    }

    /// Parameter name or raw slot number
    fn slot(&mut self) -> Result<u32> {
        let function = self
            .function
            .ok_or_else(|| self.invalid("local operand outside of a function".to_string()))?;
        let slot = match self.next("local slot")?.clone() {
            Operand::Ident(name) => self.program.functions[function]
                .params
                .iter()
                .position(|p| *p == name)
                .ok_or_else(|| self.invalid(format!("unknown parameter {}", name)))?,
            Operand::Number(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            other => return Err(self.invalid(format!("expected local slot, found {:?}", other))),
        };
        if slot >= self.program.functions[function].num_slots() {
            return Err(self.invalid(format!("local slot {} out of range", slot)));
        }
        Ok(slot as u32)
    }

    fn aug_op(&mut self) -> Result<AugOp> {
        match self.next("operator")? {
            Operand::Symbol(symbol) => {
                let symbol = *symbol;
                AugOp::from_symbol(symbol).ok_or_else(|| self.invalid(format!("invalid operator {}", symbol)))
            }
            other => Err(self.invalid(format!("expected operator, found {:?}", other))),
        }
    }

    fn redirect(&mut self) -> Result<Redirect> {
        if self.done() {
            return Ok(Redirect::None);
        }
        match self.next("redirect")? {
            Operand::Symbol(symbol) => {
                let symbol = *symbol;
                Redirect::from_symbol(symbol).ok_or_else(|| self.invalid(format!("invalid redirect {}", symbol)))
            }
            other => Err(self.invalid(format!("expected redirect, found {:?}", other))),
        }
    }

    fn jump_target(&mut self) -> Result<JumpTarget> {
        match self.next("jump target")? {
            Operand::Ident(name) => Ok(JumpTarget::Label(name.clone())),
            Operand::Address(addr) => Ok(JumpTarget::Address(*addr)),
            other => Err(self.invalid(format!("expected label or address, found {:?}", other))),
        }
    }

    fn function(&mut self) -> Result<u32> {
        let name = self.ident("function name")?;
        self.program
            .function_index(&name)
            .map(|index| index as u32)
            .ok_or(AssemblerError::UndefinedFunction { line: self.line, name })
    }

    /// Array argument of `CallUser`: a parameter of the enclosing function
    /// when one has that name, otherwise a global array
    fn array_arg(&mut self) -> Result<ArrayArg> {
        let name = self.ident("array argument")?;
        if let Some(function) = self.function {
            if let Some(slot) = self.program.functions[function].params.iter().position(|p| *p == name) {
                return Ok(ArrayArg::local(slot as u32));
            }
        }
        Ok(ArrayArg::global(intern(&mut self.program.array_names, &name)))
    }
}

/// Replace the offset of a jump or `for-in` instruction
fn with_offset(instr: Instruction, offset: i32) -> Instruction {
    use Instruction as I;
    match instr {
        I::Jump { .. } => I::Jump { offset },
        I::JumpFalse { .. } => I::JumpFalse { offset },
        I::JumpTrue { .. } => I::JumpTrue { offset },
        I::JumpNumLess { .. } => I::JumpNumLess { offset },
        I::JumpNumGreater { .. } => I::JumpNumGreater { offset },
        I::JumpNumLessOrEqual { .. } => I::JumpNumLessOrEqual { offset },
        I::JumpNumGreaterOrEqual { .. } => I::JumpNumGreaterOrEqual { offset },
        I::ForGlobalInGlobal { var, array, .. } => I::ForGlobalInGlobal { var, array, offset },
        I::ForGlobalInLocal { var, array, .. } => I::ForGlobalInLocal { var, array, offset },
        I::ForLocalInGlobal { var, array, .. } => I::ForLocalInGlobal { var, array, offset },
        I::ForLocalInLocal { var, array, .. } => I::ForLocalInLocal { var, array, offset },
        other => other,
    }
}

fn intern(table: &mut Vec<String>, value: &str) -> u32 {
    match table.iter().position(|entry| entry == value) {
        Some(index) => index as u32,
        None => {
            table.push(value.to_string());
            (table.len() - 1) as u32
        }
    }
}

fn duplicate_section(line: usize, name: &str) -> AssemblerError {
    AssemblerError::SyntaxError { line, column: 0, message: format!("duplicate {} section", name) }
}
