//! # Program Structure
//!
//! A compiled program: one instruction stream per executable unit plus the
//! constant pools and name tables the streams index into.

use crate::error::{BytecodeError, Result};
use crate::Word;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Magic number for compiled programs: "AWKB" = 0x41574B42
pub const MAGIC: u32 = 0x41574B42;

/// Format version: v1.0 = 0x00010000
pub const VERSION: u32 = 0x00010000;

/// Header size in bytes (magic + version)
pub const HEADER_SIZE: usize = 8;

/// A pattern-action rule
///
/// Zero patterns match every record, one pattern is a condition, two patterns
/// form a `start, stop` range. A `None` body prints the record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub pattern: Vec<Vec<Word>>,
    pub body: Option<Vec<Word>>,
}

/// A user-defined function
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,

    /// Parameter names; parameter `i` lives in local slot `i`
    pub params: Vec<String>,

    /// `arrays[i]` is true when parameter `i` is an array
    pub arrays: Vec<bool>,

    /// Function-local slots after the parameters
    pub num_locals: u32,

    pub body: Vec<Word>,
}

impl Function {
    /// Total frame size in slots
    pub fn num_slots(&self) -> usize {
        self.params.len() + self.num_locals as usize
    }

    /// Number of values the caller pushes (one per scalar parameter)
    pub fn num_scalar_params(&self) -> usize {
        self.params.len() - self.num_array_params()
    }

    pub fn num_array_params(&self) -> usize {
        self.arrays.iter().filter(|&&is_array| is_array).count()
    }

    pub fn is_array_param(&self, slot: usize) -> bool {
        self.arrays.get(slot).copied().unwrap_or(false)
    }

    /// Declared name of a parameter slot; temporaries past the parameter list
    /// have none
    pub fn param_name(&self, slot: usize) -> Option<&str> {
        self.params.get(slot).map(String::as_str)
    }
}

/// Which executable unit a stream belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Begin,
    Pattern { action: usize },
    RangeStart { action: usize },
    RangeStop { action: usize },
    Body { action: usize },
    End,
    Function { index: usize },
}

/// A borrowed instruction stream tagged with its unit
#[derive(Clone, Copy, Debug)]
pub struct Unit<'a> {
    pub kind: UnitKind,
    pub code: &'a [Word],
}

/// Complete program structure
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub begin: Option<Vec<Word>>,
    pub actions: Vec<Action>,
    pub end: Option<Vec<Word>>,
    pub functions: Vec<Function>,

    /// Numeric constants
    pub nums: Vec<f64>,
    /// String constants
    pub strs: Vec<String>,
    /// Regex sources; compiled once when a VM is built
    pub regexes: Vec<String>,

    /// Global scalar names, for diagnostics only
    pub scalar_names: Vec<String>,
    /// Global array names, for diagnostics only
    pub array_names: Vec<String>,
}

impl Program {
    /// Create a new empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Every instruction stream in listing order: BEGIN, actions, END,
    /// functions
    pub fn units(&self) -> Vec<Unit<'_>> {
        let mut units = Vec::new();
        if let Some(code) = &self.begin {
            units.push(Unit { kind: UnitKind::Begin, code });
        }
        for (action, rule) in self.actions.iter().enumerate() {
            match rule.pattern.as_slice() {
                [] => {}
                [pattern] => units.push(Unit { kind: UnitKind::Pattern { action }, code: pattern }),
                [start, stop, ..] => {
                    units.push(Unit { kind: UnitKind::RangeStart { action }, code: start });
                    units.push(Unit { kind: UnitKind::RangeStop { action }, code: stop });
                }
            }
            if let Some(body) = &rule.body {
                units.push(Unit { kind: UnitKind::Body { action }, code: body });
            }
        }
        if let Some(code) = &self.end {
            units.push(Unit { kind: UnitKind::End, code });
        }
        for (index, function) in self.functions.iter().enumerate() {
            units.push(Unit { kind: UnitKind::Function { index }, code: &function.body });
        }
        units
    }

    /// Human-readable unit label used in listings and error messages
    pub fn unit_label(&self, kind: UnitKind) -> String {
        match kind {
            UnitKind::Begin => "BEGIN".to_string(),
            UnitKind::Pattern { .. } => "pattern".to_string(),
            UnitKind::RangeStart { .. } => "start".to_string(),
            UnitKind::RangeStop { .. } => "stop".to_string(),
            UnitKind::Body { .. } => "{ body }".to_string(),
            UnitKind::End => "END".to_string(),
            UnitKind::Function { index } => match self.functions.get(index) {
                Some(function) => format!("function {}", function.name),
                None => format!("function #{}", index),
            },
        }
    }

    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }

    pub fn scalar_index(&self, name: &str) -> Option<usize> {
        self.scalar_names.iter().position(|n| n == name)
    }

    pub fn array_index(&self, name: &str) -> Option<usize> {
        self.array_names.iter().position(|n| n == name)
    }

    /// Serialize to bytes: header followed by a bincode payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(BytecodeError::InvalidHeaderSize {
                expected: HEADER_SIZE,
                found: bytes.len(),
            });
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC {
            return Err(BytecodeError::InvalidMagic(magic));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != VERSION {
            return Err(BytecodeError::InvalidVersion {
                expected: VERSION,
                found: version,
            });
        }

        Ok(bincode::deserialize(&bytes[HEADER_SIZE..])?)
    }

    /// Check whether `bytes` start with the program magic
    pub fn is_binary(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && bytes[..4] == MAGIC.to_le_bytes()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AWK bytecode program v1.0")?;
        writeln!(f, "  Actions:     {}", self.actions.len())?;
        writeln!(f, "  Functions:   {}", self.functions.len())?;
        writeln!(f, "  Nums:        {}", self.nums.len())?;
        writeln!(f, "  Strs:        {}", self.strs.len())?;
        writeln!(f, "  Regexes:     {}", self.regexes.len())?;
        writeln!(f, "  Scalars:     {}", self.scalar_names.len())?;
        writeln!(f, "  Arrays:      {}", self.array_names.len())?;
        Ok(())
    }
}
