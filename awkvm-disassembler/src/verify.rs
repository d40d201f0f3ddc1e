//! Structural verification of compiled programs
//!
//! Checks every stream of a program against the invariants the runtime relies
//! on, so execution never has to guard against malformed operands:
//! - every stream decodes completely
//! - pool indexes, special indexes and function indexes are in range
//! - local operands only appear in function bodies and name a frame slot
//! - jump and `for-in` targets land on an instruction start or the stream end

use awkvm_spec::{ArrayArg, Function, Instruction, Program, Scope, UnitKind, Word, NUM_SPECIALS};
use crate::decoder::decode;
use crate::error::{DisassemblerError, Result};

/// Verify a whole program; the first violation found is returned
pub fn verify(program: &Program) -> Result<()> {
    for function in &program.functions {
        if function.arrays.len() != function.params.len() {
            return Err(DisassemblerError::InvalidFunction {
                name: function.name.clone(),
                message: format!(
                    "{} array flags for {} parameters",
                    function.arrays.len(),
                    function.params.len()
                ),
            });
        }
    }

    for unit in program.units() {
        let function = match unit.kind {
            UnitKind::Function { index } => program.functions.get(index),
            _ => None,
        };
        let checker = Checker { program, function };
        checker
            .stream(unit.code)
            .map_err(|e| e.in_unit(program.unit_label(unit.kind)))?;
    }
    Ok(())
}

struct Checker<'a> {
    program: &'a Program,
    function: Option<&'a Function>,
}

impl Checker<'_> {
    fn stream(&self, code: &[Word]) -> Result<()> {
        // starts[i] is true when an instruction begins at i; the end is a valid target
        let mut starts = vec![false; code.len() + 1];
        starts[code.len()] = true;
        let mut jumps = Vec::new();

        let mut ip = 0;
        while ip < code.len() {
            let addr = ip;
            let instr = decode(code, &mut ip)?;
            starts[addr] = true;
            self.operands(&instr, addr)?;
            if let Some(offset) = instr.jump_offset() {
                jumps.push((addr, ip as i64 + offset as i64));
            }
        }

        for (addr, target) in jumps {
            let lands = usize::try_from(target).ok().and_then(|t| starts.get(t).copied()).unwrap_or(false);
            if !lands {
                return Err(DisassemblerError::BadJumpTarget { addr, target });
            }
        }
        Ok(())
    }

    fn pool(&self, addr: usize, pool: &'static str, index: u32, len: usize) -> Result<()> {
        if (index as usize) < len {
            Ok(())
        } else {
            Err(DisassemblerError::PoolOutOfRange { addr, pool, index: index as usize, len })
        }
    }

    fn scalar(&self, addr: usize, index: u32) -> Result<()> {
        self.pool(addr, "scalar", index, self.program.scalar_names.len())
    }

    fn array(&self, addr: usize, index: u32) -> Result<()> {
        self.pool(addr, "array", index, self.program.array_names.len())
    }

    fn special(&self, addr: usize, index: u32) -> Result<()> {
        self.pool(addr, "special", index, NUM_SPECIALS)
    }

    fn slot(&self, addr: usize, slot: u32) -> Result<()> {
        let function = self.function.ok_or(DisassemblerError::LocalOutsideFunction { addr })?;
        let slots = function.num_slots();
        if (slot as usize) < slots {
            Ok(())
        } else {
            Err(DisassemblerError::SlotOutOfRange { addr, slot: slot as usize, slots })
        }
    }

    fn call(&self, addr: usize, func: u32, arrays: &[ArrayArg]) -> Result<()> {
        self.pool(addr, "function", func, self.program.functions.len())?;
        let callee = &self.program.functions[func as usize];
        if arrays.len() > callee.num_array_params() {
            return Err(DisassemblerError::TooManyArrays {
                addr,
                name: callee.name.clone(),
                given: arrays.len(),
                expected: callee.num_array_params(),
            });
        }
        for arg in arrays {
            match arg.scope {
                Scope::Global => self.array(addr, arg.index)?,
                Scope::Local => self.slot(addr, arg.index)?,
            }
        }
        Ok(())
    }

    fn operands(&self, instr: &Instruction, addr: usize) -> Result<()> {
        use Instruction as I;

        match instr {
            I::Num { index } => self.pool(addr, "nums", *index, self.program.nums.len()),
            I::Str { index } => self.pool(addr, "strs", *index, self.program.strs.len()),
            I::Regex { index } => self.pool(addr, "regexes", *index, self.program.regexes.len()),

            I::Global { index }
            | I::AssignGlobal { index }
            | I::IncrGlobal { index, .. }
            | I::AugAssignGlobal { index, .. } => self.scalar(addr, *index),

            I::Special { index }
            | I::AssignSpecial { index }
            | I::IncrSpecial { index, .. }
            | I::AugAssignSpecial { index, .. } => self.special(addr, *index),

            I::ArrayGlobal { array }
            | I::InGlobal { array }
            | I::AssignArrayGlobal { array }
            | I::DeleteGlobal { array }
            | I::DeleteAllGlobal { array }
            | I::IncrArrayGlobal { array, .. }
            | I::AugAssignArrayGlobal { array, .. }
            | I::CallSplitGlobal { array }
            | I::CallSplitSepGlobal { array } => self.array(addr, *array),

            I::Local { slot }
            | I::ArrayLocal { slot }
            | I::InLocal { slot }
            | I::AssignLocal { slot }
            | I::AssignArrayLocal { slot }
            | I::DeleteLocal { slot }
            | I::DeleteAllLocal { slot }
            | I::IncrLocal { slot, .. }
            | I::IncrArrayLocal { slot, .. }
            | I::AugAssignLocal { slot, .. }
            | I::AugAssignArrayLocal { slot, .. }
            | I::CallSplitLocal { slot }
            | I::CallSplitSepLocal { slot } => self.slot(addr, *slot),

            I::ForGlobalInGlobal { var, array, .. } => {
                self.scalar(addr, *var)?;
                self.array(addr, *array)
            }
            I::ForGlobalInLocal { var, array, .. } => {
                self.scalar(addr, *var)?;
                self.slot(addr, *array)
            }
            I::ForLocalInGlobal { var, array, .. } => {
                self.slot(addr, *var)?;
                self.array(addr, *array)
            }
            I::ForLocalInLocal { var, array, .. } => {
                self.slot(addr, *var)?;
                self.slot(addr, *array)
            }

            I::CallUser { func, arrays } => self.call(addr, *func, arrays),
            I::CallSprintf { count } if *count == 0 => Err(DisassemblerError::InvalidOperand {
                addr,
                message: "sprintf needs a format argument".to_string(),
            }),
            I::MultiIndex { count } if *count == 0 => Err(DisassemblerError::InvalidOperand {
                addr,
                message: "empty subscript list".to_string(),
            }),

            _ => Ok(()),
        }
    }
}
