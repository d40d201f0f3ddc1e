//! Instruction execution
//!
//! ## Stack conventions
//! - binary operators pop the right operand, then the left
//! - assignments to fields and array elements pop the index or key, then
//!   the value
//! - `Print`/`Printf` pop their arguments, then the redirect destination
//!   pushed beneath them
//! - user calls pop one value per scalar parameter; array arguments travel
//!   inline as `(scope, index)` operands
//!
//! ## Dispatch
//! Calls and `for (k in a)` loops do not recurse on the host stack. One loop
//! runs an explicit stack of activations, each with its own loops in
//! progress, so call depth is bounded only by `max_call_depth`.

use std::cmp::Ordering;
use std::sync::Arc;

use awkvm_disassembler::decode;
use awkvm_spec::{ArrayArg, AugOp, Instruction, Program, Redirect, Scope, SpecialVar, UnitKind, Word};
use tracing::{debug, trace};

use crate::error::{Result, RuntimeError};
use crate::fields::{split_fields, MAX_FIELD};
use crate::format::sprintf;
use crate::state::{ArrayId, Slot};
use crate::value::Value;
use crate::vm::VM;

/// How a stream finished, or what an instruction asks the dispatcher to do
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Next,
    Exit,
    Return(Value),
    /// A frame for this function has been pushed; run its body
    Call(usize),
}

/// A `for (k in a)` loop in progress
struct ForIn {
    var: Lvalue,
    /// Keys present when the loop started
    keys: std::vec::IntoIter<String>,
    body: usize,
    exit: usize,
    /// Address of the loop instruction
    addr: usize,
}

/// A stream being executed: the unit itself or one active call
struct Activation<'a> {
    code: &'a [Word],
    ip: usize,
    unit: String,
    loops: Vec<ForIn>,
    /// Owns the innermost call frame
    call: bool,
}

impl<'a> Activation<'a> {
    fn new(code: &'a [Word], unit: String, call: bool) -> Self {
        Self { code, ip: 0, unit, loops: Vec::new(), call }
    }
}

/// Assignable storage location
#[derive(Debug, Clone)]
enum Lvalue {
    Global(usize),
    Local(usize),
    Special(SpecialVar),
    Field(usize),
    Element(ArrayId, String),
}

fn jump_target(ip: usize, offset: i32, len: usize) -> Result<usize> {
    let target = ip as i64 + offset as i64;
    if target < 0 || target as usize > len {
        return Err(RuntimeError::JumpOutOfRange { target, len });
    }
    Ok(target as usize)
}

fn arith(op: AugOp, a: f64, b: f64) -> Result<f64> {
    Ok(match op {
        AugOp::Add => a + b,
        AugOp::Sub => a - b,
        AugOp::Mul => a * b,
        AugOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { op: "Divide" });
            }
            a / b
        }
        AugOp::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero { op: "Modulo" });
            }
            a % b
        }
        AugOp::Pow => a.powf(b),
    })
}

fn field_index(value: &Value) -> Result<usize> {
    let n = value.to_num().trunc();
    if n < 0.0 {
        return Err(RuntimeError::NegativeField(n as i64));
    }
    if n > MAX_FIELD as f64 {
        return Err(RuntimeError::FieldTooLarge { index: n, limit: MAX_FIELD });
    }
    Ok(n as usize)
}

fn special_var(index: u32) -> Result<SpecialVar> {
    SpecialVar::from_index(index).ok_or_else(|| RuntimeError::UnknownVariable(format!("special #{}", index)))
}

/// `substr(s, start [, length])` with 1-based, rounded positions
fn substr(s: &str, start: f64, length: Option<f64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let end = chars.len() as f64 + 1.0;
    let from = start.round();
    let to = match length {
        Some(n) => from + n.round(),
        None => end,
    };
    let (from, to) = (from.max(1.0), to.min(end));
    if to <= from {
        return String::new();
    }
    chars[(from as usize - 1)..(to as usize - 1)].iter().collect()
}

impl VM {
    /// Execute a unit's stream along with every call it makes
    pub(crate) fn execute(&mut self, code: &[Word], unit: &str) -> Result<Flow> {
        let program = Arc::clone(&self.program);
        let mut stack = vec![Activation::new(code, unit.to_string(), false)];
        let result = self.dispatch(&program, &mut stack);

        // calls abandoned by an error, `next` or `exit`
        let abandoned = stack.iter().filter(|act| act.call).count();
        for _ in 0..abandoned {
            self.state.pop_frame();
        }
        result
    }

    fn dispatch<'a>(&mut self, program: &'a Program, stack: &mut Vec<Activation<'a>>) -> Result<Flow> {
        loop {
            let Some(act) = stack.last_mut() else {
                return Ok(Flow::Normal);
            };

            if let Some(looping) = act.loops.last_mut() {
                if act.ip >= looping.exit {
                    match looping.keys.next() {
                        Some(key) => {
                            act.ip = looping.body;
                            let (var, addr) = (looping.var.clone(), looping.addr);
                            self.store(var, Value::Str(key)).map_err(|e| e.at(&act.unit, addr))?;
                        }
                        None => {
                            act.ip = looping.exit;
                            act.loops.pop();
                        }
                    }
                    continue;
                }
            }

            if act.ip >= act.code.len() {
                if !act.call {
                    return Ok(Flow::Normal);
                }
                self.leave_call(stack, Value::Null);
                continue;
            }

            let addr = act.ip;
            self.state.cycles += 1;
            if self.state.cycles > self.config.max_cycles {
                let limit = self.config.max_cycles;
                return Err(RuntimeError::CycleLimitExceeded { limit }.at(&act.unit, addr));
            }

            let instr = decode(act.code, &mut act.ip).map_err(|e| RuntimeError::from(e).at(&act.unit, addr))?;
            if self.config.trace {
                trace!(unit = act.unit.as_str(), addr, ?instr, depth = self.state.stack.len(), "step");
            }

            let in_call = act.call;
            let flow = self.step(&instr, act, addr).map_err(|e| e.at(&act.unit, addr))?;
            match flow {
                Flow::Normal => {}
                Flow::Call(index) => {
                    let unit = program.unit_label(UnitKind::Function { index });
                    stack.push(Activation::new(&program.functions[index].body, unit, true));
                }
                Flow::Return(value) if in_call => self.leave_call(stack, value),
                flow => return Ok(flow),
            }
        }
    }

    /// Finish the innermost call, leaving `value` as its result
    fn leave_call(&mut self, stack: &mut Vec<Activation<'_>>, value: Value) {
        stack.pop();
        self.state.pop_frame();
        self.state.push(value);
    }

    fn step(&mut self, instr: &Instruction, act: &mut Activation<'_>, addr: usize) -> Result<Flow> {
        use Instruction as I;

        match instr {
            // ========== Stack ==========
            I::Nop => {}
            I::Num { index } => {
                let n = self.program.nums[*index as usize];
                self.state.push(Value::Num(n));
            }
            I::Str { index } => {
                let s = self.program.strs[*index as usize].clone();
                self.state.push(Value::Str(s));
            }
            I::Dupe => {
                let top = self.state.top()?.clone();
                self.state.push(top);
            }
            I::Drop => {
                self.state.pop()?;
            }
            I::Swap => {
                let b = self.state.pop()?;
                let a = self.state.pop()?;
                self.state.push(b);
                self.state.push(a);
            }

            // ========== Reads ==========
            I::Field => {
                let n = field_index(&self.state.pop()?)?;
                let value = self.state.field(n);
                self.state.push(value);
            }
            I::FieldNum { index } => {
                let value = self.state.field(*index as usize);
                self.state.push(value);
            }
            I::Global { index } => {
                let value = self.state.globals[*index as usize].clone();
                self.state.push(value);
            }
            I::Local { slot } => {
                let value = self.state.local(*slot as usize)?;
                self.state.push(value);
            }
            I::Special { index } => {
                let value = self.state.special(special_var(*index)?);
                self.state.push(value);
            }
            I::ArrayGlobal { array } => self.push_element(ArrayId(*array as usize))?,
            I::ArrayLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                self.push_element(id)?;
            }
            I::InGlobal { array } => self.push_in(ArrayId(*array as usize))?,
            I::InLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                self.push_in(id)?;
            }

            // ========== Writes ==========
            I::AssignField => {
                let n = field_index(&self.state.pop()?)?;
                let value = self.state.pop()?;
                self.store(Lvalue::Field(n), value)?;
            }
            I::AssignGlobal { index } => {
                let value = self.state.pop()?;
                self.store(Lvalue::Global(*index as usize), value)?;
            }
            I::AssignLocal { slot } => {
                let value = self.state.pop()?;
                self.store(Lvalue::Local(*slot as usize), value)?;
            }
            I::AssignSpecial { index } => {
                let value = self.state.pop()?;
                self.store(Lvalue::Special(special_var(*index)?), value)?;
            }
            I::AssignArrayGlobal { array } => {
                let key = self.pop_key()?;
                let value = self.state.pop()?;
                self.store(Lvalue::Element(ArrayId(*array as usize), key), value)?;
            }
            I::AssignArrayLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                let key = self.pop_key()?;
                let value = self.state.pop()?;
                self.store(Lvalue::Element(id, key), value)?;
            }
            I::DeleteGlobal { array } => {
                let key = self.pop_key()?;
                self.state.array_mut(ArrayId(*array as usize)).shift_remove(&key);
            }
            I::DeleteLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                let key = self.pop_key()?;
                self.state.array_mut(id).shift_remove(&key);
            }
            I::DeleteAllGlobal { array } => self.state.array_mut(ArrayId(*array as usize)).clear(),
            I::DeleteAllLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                self.state.array_mut(id).clear();
            }

            // ========== Increment and augmented assignment ==========
            I::IncrField { amount } => {
                let n = field_index(&self.state.pop()?)?;
                self.update(Lvalue::Field(n), AugOp::Add, *amount as f64)?;
            }
            I::IncrGlobal { amount, index } => {
                self.update(Lvalue::Global(*index as usize), AugOp::Add, *amount as f64)?
            }
            I::IncrLocal { amount, slot } => {
                self.update(Lvalue::Local(*slot as usize), AugOp::Add, *amount as f64)?
            }
            I::IncrSpecial { amount, index } => {
                self.update(Lvalue::Special(special_var(*index)?), AugOp::Add, *amount as f64)?
            }
            I::IncrArrayGlobal { amount, array } => {
                let key = self.pop_key()?;
                self.update(Lvalue::Element(ArrayId(*array as usize), key), AugOp::Add, *amount as f64)?;
            }
            I::IncrArrayLocal { amount, slot } => {
                let id = self.state.local_array(*slot as usize)?;
                let key = self.pop_key()?;
                self.update(Lvalue::Element(id, key), AugOp::Add, *amount as f64)?;
            }
            I::AugAssignField { op } => {
                let n = field_index(&self.state.pop()?)?;
                let operand = self.state.pop()?.to_num();
                self.update(Lvalue::Field(n), *op, operand)?;
            }
            I::AugAssignGlobal { op, index } => {
                let operand = self.state.pop()?.to_num();
                self.update(Lvalue::Global(*index as usize), *op, operand)?;
            }
            I::AugAssignLocal { op, slot } => {
                let operand = self.state.pop()?.to_num();
                self.update(Lvalue::Local(*slot as usize), *op, operand)?;
            }
            I::AugAssignSpecial { op, index } => {
                let operand = self.state.pop()?.to_num();
                self.update(Lvalue::Special(special_var(*index)?), *op, operand)?;
            }
            I::AugAssignArrayGlobal { op, array } => {
                let key = self.pop_key()?;
                let operand = self.state.pop()?.to_num();
                self.update(Lvalue::Element(ArrayId(*array as usize), key), *op, operand)?;
            }
            I::AugAssignArrayLocal { op, slot } => {
                let id = self.state.local_array(*slot as usize)?;
                let key = self.pop_key()?;
                let operand = self.state.pop()?.to_num();
                self.update(Lvalue::Element(id, key), *op, operand)?;
            }

            // ========== Expressions ==========
            I::Regex { index } => {
                let matched = match self.regexes.pool(*index as usize) {
                    Some(regex) => regex.is_match(self.state.record.line()),
                    None => {
                        return Err(RuntimeError::Regex {
                            pattern: format!("#{}", index),
                            message: "not in the regex pool".to_string(),
                        })
                    }
                };
                self.state.push(Value::bool(matched));
            }
            I::MultiIndex { count } => {
                let parts = self.state.pop_n(*count as usize)?;
                let subsep = self.state.special_str(SpecialVar::Subsep);
                let key = parts.iter().map(|part| self.state.to_str(part)).collect::<Vec<_>>().join(&subsep);
                self.state.push(Value::Str(key));
            }
            I::Add => self.binary(AugOp::Add)?,
            I::Subtract => self.binary(AugOp::Sub)?,
            I::Multiply => self.binary(AugOp::Mul)?,
            I::Divide => self.binary(AugOp::Div)?,
            I::Power => self.binary(AugOp::Pow)?,
            I::Modulo => self.binary(AugOp::Mod)?,
            I::Concat => {
                let b = self.state.pop()?;
                let a = self.state.pop()?;
                let mut s = self.state.to_str(&a);
                s.push_str(&self.state.to_str(&b));
                self.state.push(Value::Str(s));
            }
            I::Match | I::NotMatch => {
                let pattern = self.state.pop()?;
                let subject = self.state.pop()?;
                let regex = self.regexes.dynamic(&self.state.to_str(&pattern))?;
                let matched = regex.is_match(&self.state.to_str(&subject));
                self.state.push(Value::bool(matched == matches!(instr, I::Match)));
            }
            I::Equals => self.compare(|ord| ord == Ordering::Equal)?,
            I::NotEquals => self.compare(|ord| ord != Ordering::Equal)?,
            I::Less => self.compare(|ord| ord == Ordering::Less)?,
            I::Greater => self.compare(|ord| ord == Ordering::Greater)?,
            I::LessOrEqual => self.compare(|ord| ord != Ordering::Greater)?,
            I::GreaterOrEqual => self.compare(|ord| ord != Ordering::Less)?,
            I::Not => {
                let value = self.state.pop()?;
                self.state.push(Value::bool(!value.is_true()));
            }
            I::UnaryMinus => {
                let n = self.state.pop()?.to_num();
                self.state.push(Value::Num(-n));
            }
            I::UnaryPlus => {
                let n = self.state.pop()?.to_num();
                self.state.push(Value::Num(n));
            }
            I::Boolean => {
                let value = self.state.pop()?;
                self.state.push(Value::bool(value.is_true()));
            }

            // ========== Jumps ==========
            I::Jump { offset } => act.ip = jump_target(act.ip, *offset, act.code.len())?,
            I::JumpFalse { offset } => {
                if !self.state.pop()?.is_true() {
                    act.ip = jump_target(act.ip, *offset, act.code.len())?;
                }
            }
            I::JumpTrue { offset } => {
                if self.state.pop()?.is_true() {
                    act.ip = jump_target(act.ip, *offset, act.code.len())?;
                }
            }
            I::JumpNumLess { offset } => self.jump_num(act, *offset, |ord| ord == Ordering::Less)?,
            I::JumpNumGreater { offset } => self.jump_num(act, *offset, |ord| ord == Ordering::Greater)?,
            I::JumpNumLessOrEqual { offset } => self.jump_num(act, *offset, |ord| ord != Ordering::Greater)?,
            I::JumpNumGreaterOrEqual { offset } => self.jump_num(act, *offset, |ord| ord != Ordering::Less)?,

            // ========== Loops and flow ==========
            I::ForGlobalInGlobal { var, array, offset } => {
                self.for_in(act, addr, Lvalue::Global(*var as usize), ArrayId(*array as usize), *offset)?;
            }
            I::ForGlobalInLocal { var, array, offset } => {
                let id = self.state.local_array(*array as usize)?;
                self.for_in(act, addr, Lvalue::Global(*var as usize), id, *offset)?;
            }
            I::ForLocalInGlobal { var, array, offset } => {
                self.for_in(act, addr, Lvalue::Local(*var as usize), ArrayId(*array as usize), *offset)?;
            }
            I::ForLocalInLocal { var, array, offset } => {
                let id = self.state.local_array(*array as usize)?;
                self.for_in(act, addr, Lvalue::Local(*var as usize), id, *offset)?;
            }
            I::BreakForIn => match act.loops.pop() {
                Some(looping) => act.ip = looping.exit,
                None => return Ok(Flow::Return(Value::Null)),
            },
            I::Next => {
                if !self.in_record {
                    return Err(RuntimeError::NextOutsideRecord);
                }
                return Ok(Flow::Next);
            }
            I::Exit => return Ok(Flow::Exit),
            I::ExitStatus => {
                self.exit_status = self.state.pop()?.to_num() as i32;
                return Ok(Flow::Exit);
            }
            I::Return => return Ok(Flow::Return(self.state.pop()?)),
            I::ReturnNull => return Ok(Flow::Return(Value::Null)),

            // ========== Builtins ==========
            I::CallLength => {
                let len = self.state.record.line().chars().count();
                self.state.push(Value::Num(len as f64));
            }
            I::CallLengthArg => {
                let value = self.state.pop()?;
                let len = self.state.to_str(&value).chars().count();
                self.state.push(Value::Num(len as f64));
            }
            I::CallIndex => {
                let needle = self.pop_str()?;
                let haystack = self.pop_str()?;
                let pos = haystack.find(&needle).map_or(0, |i| haystack[..i].chars().count() + 1);
                self.state.push(Value::Num(pos as f64));
            }
            I::CallSubstr => {
                let start = self.state.pop()?.to_num();
                let s = self.pop_str()?;
                self.state.push(Value::Str(substr(&s, start, None)));
            }
            I::CallSubstrLength => {
                let length = self.state.pop()?.to_num();
                let start = self.state.pop()?.to_num();
                let s = self.pop_str()?;
                self.state.push(Value::Str(substr(&s, start, Some(length))));
            }
            I::CallTolower => {
                let s = self.pop_str()?;
                self.state.push(Value::Str(s.to_lowercase()));
            }
            I::CallToupper => {
                let s = self.pop_str()?;
                self.state.push(Value::Str(s.to_uppercase()));
            }
            I::CallInt => self.math(f64::trunc)?,
            I::CallSqrt => self.math(f64::sqrt)?,
            I::CallExp => self.math(f64::exp)?,
            I::CallLog => self.math(f64::ln)?,
            I::CallSin => self.math(f64::sin)?,
            I::CallCos => self.math(f64::cos)?,
            I::CallAtan2 => {
                let x = self.state.pop()?.to_num();
                let y = self.state.pop()?.to_num();
                self.state.push(Value::Num(y.atan2(x)));
            }
            I::CallMatch => {
                let pattern = self.pop_str()?;
                let s = self.pop_str()?;
                let regex = self.regexes.dynamic(&pattern)?;
                let (start, length) = match regex.find(&s) {
                    Some(m) => {
                        let start = s[..m.start()].chars().count() + 1;
                        (start as f64, s[m.start()..m.end()].chars().count() as f64)
                    }
                    None => (0.0, -1.0),
                };
                self.state.set_special(SpecialVar::Rstart, Value::Num(start))?;
                self.state.set_special(SpecialVar::Rlength, Value::Num(length))?;
                self.state.push(Value::Num(start));
            }
            I::CallSystem => {
                let command = self.pop_str()?;
                let status = self.output.system(&command)?;
                self.state.push(Value::Num(status as f64));
            }
            I::CallClose => {
                let target = self.pop_str()?;
                let status = self.output.close(&target);
                self.state.push(Value::Num(status as f64));
            }
            I::CallFflush => {
                let target = self.pop_str()?;
                let status = self.output.flush(&target);
                self.state.push(Value::Num(status as f64));
            }
            I::CallFflushAll => {
                let status = self.output.flush_all();
                self.state.push(Value::Num(status as f64));
            }
            I::CallSplitGlobal { array } => self.split(ArrayId(*array as usize), None)?,
            I::CallSplitLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                self.split(id, None)?;
            }
            I::CallSplitSepGlobal { array } => {
                let sep = self.pop_str()?;
                self.split(ArrayId(*array as usize), Some(sep))?;
            }
            I::CallSplitSepLocal { slot } => {
                let id = self.state.local_array(*slot as usize)?;
                let sep = self.pop_str()?;
                self.split(id, Some(sep))?;
            }
            I::CallSprintf { count } => {
                let text = self.sprintf_args(*count as usize)?;
                self.state.push(Value::Str(text));
            }

            // ========== Calls and output ==========
            I::CallUser { func, arrays } => return self.call(*func as usize, arrays),
            I::Nulls { count } => {
                for _ in 0..*count {
                    self.state.push(Value::Null);
                }
            }
            I::Print { count, redirect } => {
                let args = self.state.pop_n(*count as usize)?;
                let mut line = if args.is_empty() {
                    self.state.record.line().to_string()
                } else {
                    let ofs = self.state.special_str(SpecialVar::Ofs);
                    args.iter().map(|arg| self.state.to_output_str(arg)).collect::<Vec<_>>().join(&ofs)
                };
                line.push_str(&self.state.special_str(SpecialVar::Ors));
                self.write_output(*redirect, &line)?;
            }
            I::Printf { count, redirect } => {
                let text = self.sprintf_args(*count as usize)?;
                self.write_output(*redirect, &text)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ========== Helpers ==========

    fn pop_str(&mut self) -> Result<String> {
        let value = self.state.pop()?;
        Ok(self.state.to_str(&value))
    }

    /// Array subscripts are strings converted through `CONVFMT`
    fn pop_key(&mut self) -> Result<String> {
        self.pop_str()
    }

    fn push_element(&mut self, id: ArrayId) -> Result<()> {
        let key = self.pop_key()?;
        let value = self.state.element(id, key);
        self.state.push(value);
        Ok(())
    }

    fn push_in(&mut self, id: ArrayId) -> Result<()> {
        let key = self.pop_key()?;
        let found = self.state.array(id).contains_key(&key);
        self.state.push(Value::bool(found));
        Ok(())
    }

    fn load(&mut self, lvalue: &Lvalue) -> Result<Value> {
        Ok(match lvalue {
            Lvalue::Global(index) => self.state.globals[*index].clone(),
            Lvalue::Local(slot) => self.state.local(*slot)?,
            Lvalue::Special(var) => self.state.special(*var),
            Lvalue::Field(n) => self.state.field(*n),
            Lvalue::Element(id, key) => self.state.element(*id, key.clone()),
        })
    }

    fn store(&mut self, lvalue: Lvalue, value: Value) -> Result<()> {
        match lvalue {
            Lvalue::Global(index) => self.state.globals[index] = value,
            Lvalue::Local(slot) => self.state.set_local(slot, value)?,
            Lvalue::Special(var) => self.state.set_special(var, value)?,
            Lvalue::Field(0) => {
                let line = self.state.to_str(&value);
                self.set_record(line)?;
            }
            Lvalue::Field(n) => {
                let text = self.state.to_str(&value);
                let ofs = self.state.special_str(SpecialVar::Ofs);
                self.state.record.set_field(n, text, &ofs);
            }
            Lvalue::Element(id, key) => {
                self.state.array_mut(id).insert(key, value);
            }
        }
        Ok(())
    }

    fn update(&mut self, lvalue: Lvalue, op: AugOp, operand: f64) -> Result<()> {
        let current = self.load(&lvalue)?.to_num();
        let result = arith(op, current, operand)?;
        self.store(lvalue, Value::Num(result))
    }

    fn binary(&mut self, op: AugOp) -> Result<()> {
        let b = self.state.pop()?.to_num();
        let a = self.state.pop()?.to_num();
        self.state.push(Value::Num(arith(op, a, b)?));
        Ok(())
    }

    fn math(&mut self, f: fn(f64) -> f64) -> Result<()> {
        let n = self.state.pop()?.to_num();
        self.state.push(Value::Num(f(n)));
        Ok(())
    }

    fn compare(&mut self, test: impl Fn(Ordering) -> bool) -> Result<()> {
        let b = self.state.pop()?;
        let a = self.state.pop()?;
        let ord = a.compare(&b, |v| self.state.to_str(v));
        self.state.push(Value::bool(test(ord)));
        Ok(())
    }

    fn jump_num(&mut self, act: &mut Activation<'_>, offset: i32, test: impl Fn(Ordering) -> bool) -> Result<()> {
        let b = self.state.pop()?.to_num();
        let a = self.state.pop()?.to_num();
        if a.partial_cmp(&b).map_or(false, test) {
            act.ip = jump_target(act.ip, offset, act.code.len())?;
        }
        Ok(())
    }

    /// Start a loop whose body is `code[ip..exit]`; the dispatcher assigns
    /// each key present now and reruns the body until the keys run out
    fn for_in(&mut self, act: &mut Activation<'_>, addr: usize, var: Lvalue, array: ArrayId, offset: i32) -> Result<()> {
        let body = act.ip;
        let exit = jump_target(body, offset, act.code.len())?;
        let keys: Vec<String> = self.state.array(array).keys().cloned().collect();
        act.loops.push(ForIn { var, keys: keys.into_iter(), body, exit, addr });
        act.ip = exit;
        Ok(())
    }

    /// `split(s, a [, sep])`: the separator has already been popped
    fn split(&mut self, array: ArrayId, sep: Option<String>) -> Result<()> {
        let s = self.pop_str()?;
        let sep = match sep {
            Some(sep) => sep,
            None => self.state.special_str(SpecialVar::Fs),
        };
        let parts = split_fields(&s, &sep, &mut self.regexes)?;
        let count = parts.len();
        let elements = self.state.array_mut(array);
        elements.clear();
        for (i, part) in parts.into_iter().enumerate() {
            elements.insert((i + 1).to_string(), Value::StrNum(part));
        }
        self.state.push(Value::Num(count as f64));
        Ok(())
    }

    /// Pop a format string and its arguments and format them
    fn sprintf_args(&mut self, count: usize) -> Result<String> {
        let args = self.state.pop_n(count)?;
        let (format, rest) = args
            .split_first()
            .ok_or_else(|| RuntimeError::Format("missing format string".to_string()))?;
        let format = self.state.to_str(format);
        sprintf(&format, rest, |v| self.state.to_str(v))
    }

    fn write_output(&mut self, redirect: Redirect, text: &str) -> Result<()> {
        let target = match redirect {
            Redirect::None => String::new(),
            _ => self.pop_str()?,
        };
        self.output.writer(redirect, &target)?.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Bind a call frame for function `index`; its body runs once the
    /// dispatcher sees [`Flow::Call`]
    fn call(&mut self, index: usize, arrays: &[ArrayArg]) -> Result<Flow> {
        if self.state.depth() >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded { limit: self.config.max_call_depth });
        }
        let program = Arc::clone(&self.program);
        let function = &program.functions[index];

        let mut scalars = self.state.pop_n(function.num_scalar_params())?.into_iter();
        let mut supplied = Vec::with_capacity(arrays.len());
        for arg in arrays {
            supplied.push(match arg.scope {
                Scope::Global => ArrayId(arg.index as usize),
                Scope::Local => self.state.local_array(arg.index as usize)?,
            });
        }
        let mut supplied = supplied.into_iter();

        let arrays_mark = self.state.arrays_len();
        let mut slots = Vec::with_capacity(function.num_slots());
        for param in 0..function.params.len() {
            if function.is_array_param(param) {
                let id = match supplied.next() {
                    Some(id) => id,
                    None => self.state.new_array(),
                };
                slots.push(Slot::Array(id));
            } else {
                slots.push(Slot::Scalar(scalars.next().unwrap_or_default()));
            }
        }
        slots.extend((0..function.num_locals).map(|_| Slot::Scalar(Value::Null)));

        debug!(function = function.name.as_str(), depth = self.state.depth() + 1, "call");
        self.state.push_frame(index, slots, arrays_mark);
        Ok(Flow::Call(index))
    }
}
