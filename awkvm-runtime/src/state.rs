//! VM storage: value stack, variables, arrays and call frames

use awkvm_spec::number::format_number;
use awkvm_spec::{SpecialVar, DEFAULT_SUBSEP, NUM_SPECIALS};
use indexmap::IndexMap;

use crate::error::{Result, RuntimeError};
use crate::fields::{Record, MAX_FIELD};
use crate::format::sprintf;
use crate::value::Value;

/// An associative array; iteration follows insertion order
pub type Array = IndexMap<String, Value>;

/// Index into the array arena. Global arrays occupy the first ids
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArrayId(pub usize);

/// A local slot holds a scalar or a reference to an array
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Scalar(Value),
    Array(ArrayId),
}

/// One active user-function call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub function: usize,
    /// First slot of this frame in the slot vector
    pub base: usize,
    /// Arena length at entry; arrays created by the call live above it
    pub arrays_mark: usize,
}

#[derive(Debug, Clone)]
pub struct VMState {
    pub stack: Vec<Value>,
    pub globals: Vec<Value>,
    arrays: Vec<Array>,
    slots: Vec<Slot>,
    frames: Vec<Frame>,
    specials: [Value; NUM_SPECIALS],
    pub record: Record,
    /// Instructions executed
    pub cycles: u64,
}

impl VMState {
    pub fn new(num_globals: usize, num_arrays: usize) -> Self {
        let mut specials: [Value; NUM_SPECIALS] = Default::default();
        specials[SpecialVar::Convfmt as usize] = Value::str("%.6g");
        specials[SpecialVar::Fnr as usize] = Value::Num(0.0);
        specials[SpecialVar::Fs as usize] = Value::str(" ");
        specials[SpecialVar::Nr as usize] = Value::Num(0.0);
        specials[SpecialVar::Ofmt as usize] = Value::str("%.6g");
        specials[SpecialVar::Ofs as usize] = Value::str(" ");
        specials[SpecialVar::Ors as usize] = Value::str("\n");
        specials[SpecialVar::Rlength as usize] = Value::Num(-1.0);
        specials[SpecialVar::Rs as usize] = Value::str("\n");
        specials[SpecialVar::Rstart as usize] = Value::Num(0.0);
        specials[SpecialVar::Subsep as usize] = Value::str(DEFAULT_SUBSEP);

        VMState {
            stack: Vec::new(),
            globals: vec![Value::Null; num_globals],
            arrays: vec![Array::new(); num_arrays],
            slots: Vec::new(),
            frames: Vec::new(),
            specials,
            record: Record::default(),
            cycles: 0,
        }
    }

    // ========== Value stack ==========

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop `n` values, returned in push order
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let start = self.stack.len().checked_sub(n).ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(start))
    }

    pub fn top(&self) -> Result<&Value> {
        self.stack.last().ok_or(RuntimeError::StackUnderflow)
    }

    // ========== Conversions ==========

    fn number_to_str(&self, n: f64, var: SpecialVar) -> String {
        let format = self.special_str(var);
        if format == "%.6g" {
            return format_number(n);
        }
        sprintf(&format, &[Value::Num(n)], Value::to_default_str).unwrap_or_else(|_| format_number(n))
    }

    /// String conversion through `CONVFMT`
    pub fn to_str(&self, value: &Value) -> String {
        value.to_str_with(|n| self.number_to_str(n, SpecialVar::Convfmt))
    }

    /// String conversion for output through `OFMT`
    pub fn to_output_str(&self, value: &Value) -> String {
        value.to_str_with(|n| self.number_to_str(n, SpecialVar::Ofmt))
    }

    // ========== Special variables ==========

    pub fn special(&self, var: SpecialVar) -> Value {
        match var {
            SpecialVar::Nf => Value::Num(self.record.nf() as f64),
            _ => self.specials[var as usize].clone(),
        }
    }

    /// String value of a special; never goes through `CONVFMT` itself
    pub fn special_str(&self, var: SpecialVar) -> String {
        self.special(var).to_default_str()
    }

    /// Assign a special; writing `NF` rebuilds the record
    pub fn set_special(&mut self, var: SpecialVar, value: Value) -> Result<()> {
        match var {
            SpecialVar::Nf => {
                let nf = value.to_num().max(0.0);
                if nf > MAX_FIELD as f64 {
                    return Err(RuntimeError::FieldTooLarge { index: nf, limit: MAX_FIELD });
                }
                let ofs = self.special_str(SpecialVar::Ofs);
                self.record.set_nf(nf as usize, &ofs);
            }
            _ => self.specials[var as usize] = value,
        }
        Ok(())
    }

    // ========== Fields ==========

    /// `$n`; fields past `NF` are uninitialized
    pub fn field(&self, n: usize) -> Value {
        if n == 0 {
            return Value::StrNum(self.record.line().to_string());
        }
        match self.record.field(n) {
            Some(field) => Value::StrNum(field.to_string()),
            None => Value::Null,
        }
    }

    // ========== Arrays ==========

    pub fn array(&self, id: ArrayId) -> &Array {
        &self.arrays[id.0]
    }

    pub fn array_mut(&mut self, id: ArrayId) -> &mut Array {
        &mut self.arrays[id.0]
    }

    pub fn new_array(&mut self) -> ArrayId {
        self.arrays.push(Array::new());
        ArrayId(self.arrays.len() - 1)
    }

    /// Element `key`, created empty if missing
    pub fn element(&mut self, id: ArrayId, key: String) -> Value {
        self.arrays[id.0].entry(key).or_default().clone()
    }

    // ========== Locals and frames ==========

    fn slot_index(&self, slot: usize) -> usize {
        self.frames.last().map_or(0, |frame| frame.base) + slot
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut Slot> {
        let index = self.slot_index(slot);
        self.slots.get_mut(index).ok_or(RuntimeError::SlotOutOfRange { slot })
    }

    pub fn local(&mut self, slot: usize) -> Result<Value> {
        match self.slot_mut(slot)? {
            Slot::Scalar(value) => Ok(value.clone()),
            Slot::Array(_) => Err(RuntimeError::NotAScalar { slot }),
        }
    }

    pub fn set_local(&mut self, slot: usize, value: Value) -> Result<()> {
        match self.slot_mut(slot)? {
            Slot::Scalar(current) => {
                *current = value;
                Ok(())
            }
            Slot::Array(_) => Err(RuntimeError::NotAScalar { slot }),
        }
    }

    /// Array held by a local slot; an untouched slot becomes a fresh array
    pub fn local_array(&mut self, slot: usize) -> Result<ArrayId> {
        match self.slot_mut(slot)? {
            Slot::Array(id) => return Ok(*id),
            Slot::Scalar(Value::Null) => {}
            Slot::Scalar(_) => return Err(RuntimeError::NotAnArray { slot }),
        }
        let id = self.new_array();
        *self.slot_mut(slot)? = Slot::Array(id);
        Ok(id)
    }

    /// Enter a call; `arrays_mark` must be taken before the call's own
    /// arrays were allocated
    pub fn push_frame(&mut self, function: usize, slots: Vec<Slot>, arrays_mark: usize) {
        let base = self.slots.len();
        self.slots.extend(slots);
        self.frames.push(Frame { function, base, arrays_mark });
    }

    /// Leave a call, dropping its slots and the arrays it created
    pub fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        self.slots.truncate(frame.base);
        self.arrays.truncate(frame.arrays_mark);
        Some(frame)
    }

    pub fn arrays_len(&self) -> usize {
        self.arrays.len()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_specials() {
        let state = VMState::new(0, 0);
        assert_eq!(state.special_str(SpecialVar::Fs), " ");
        assert_eq!(state.special_str(SpecialVar::Subsep), "\x1c");
        assert_eq!(state.special(SpecialVar::Rlength), Value::Num(-1.0));
        assert_eq!(state.special(SpecialVar::Nf), Value::Num(0.0));
    }

    #[test]
    fn test_stack_underflow() {
        let mut state = VMState::new(0, 0);
        assert!(matches!(state.pop(), Err(RuntimeError::StackUnderflow)));
        state.push(Value::Num(1.0));
        assert!(matches!(state.pop_n(2), Err(RuntimeError::StackUnderflow)));
        assert_eq!(state.pop_n(1).unwrap(), vec![Value::Num(1.0)]);
    }

    #[test]
    fn test_convfmt_conversion() {
        let mut state = VMState::new(0, 0);
        assert_eq!(state.to_str(&Value::Num(0.1)), "0.1");
        state.set_special(SpecialVar::Convfmt, Value::str("%.2f")).unwrap();
        assert_eq!(state.to_str(&Value::Num(0.125)), "0.12");
        assert_eq!(state.to_str(&Value::Num(3.0)), "3");
        assert_eq!(state.to_output_str(&Value::Num(0.125)), "0.125");
    }

    #[test]
    fn test_nf_write_rebuilds_record() {
        let mut state = VMState::new(0, 0);
        state.record = Record::new("a b c".to_string(), vec!["a".into(), "b".into(), "c".into()]);
        state.set_special(SpecialVar::Ofs, Value::str(",")).unwrap();
        state.set_special(SpecialVar::Nf, Value::Num(2.0)).unwrap();
        assert_eq!(state.field(0), Value::StrNum("a,b".to_string()));
        assert_eq!(state.field(3), Value::Null);
    }

    #[test]
    fn test_nf_write_past_limit() {
        let mut state = VMState::new(0, 0);
        let err = state.set_special(SpecialVar::Nf, Value::Num(1e12)).unwrap_err();
        assert!(matches!(err, RuntimeError::FieldTooLarge { limit: MAX_FIELD, .. }));
        assert_eq!(state.special(SpecialVar::Nf), Value::Num(0.0));
        state.set_special(SpecialVar::Nf, Value::Num(MAX_FIELD as f64)).unwrap();
        assert_eq!(state.record.nf(), MAX_FIELD);
    }

    #[test]
    fn test_element_created_on_reference() {
        let mut state = VMState::new(0, 1);
        assert_eq!(state.element(ArrayId(0), "k".to_string()), Value::Null);
        assert!(state.array(ArrayId(0)).contains_key("k"));
    }

    #[test]
    fn test_frames_release_slots_and_arrays() {
        let mut state = VMState::new(0, 1);
        let mark = state.arrays_len();
        state.push_frame(0, vec![Slot::Scalar(Value::Num(1.0)), Slot::Scalar(Value::Null)], mark);
        assert_eq!(state.local(0).unwrap(), Value::Num(1.0));
        let id = state.local_array(1).unwrap();
        assert_eq!(id, ArrayId(1));
        assert!(matches!(state.local(1), Err(RuntimeError::NotAScalar { slot: 1 })));
        assert!(matches!(state.local_array(0), Err(RuntimeError::NotAnArray { slot: 0 })));

        let frame = state.pop_frame().unwrap();
        assert_eq!(frame.base, 0);
        assert_eq!(state.arrays_len(), 1);
        assert_eq!(state.depth(), 0);
    }
}
