//! Virtual machine driver
//!
//! Runs `BEGIN`, then every action against each input record, then `END`.

use std::io::{self, BufRead, BufWriter, Write};
use std::sync::Arc;

use awkvm_spec::{Program, SpecialVar, UnitKind, Word};
use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::execute::Flow;
use crate::fields::{split_fields, split_paragraph, Record, RecordReader};
use crate::io::OutputStreams;
use crate::regex::RegexCache;
use crate::state::{Array, ArrayId, VMState};
use crate::value::Value;

/// VM configuration
#[derive(Debug, Clone)]
pub struct VMConfig {
    /// Maximum number of instructions before the run fails
    pub max_cycles: u64,

    /// Maximum depth of nested user-function calls
    pub max_call_depth: usize,

    /// Log every executed instruction at trace level
    pub trace: bool,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            max_cycles: 10_000_000,
            max_call_depth: 1000,
            trace: false,
        }
    }
}

/// Execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Status set by `exit`, 0 otherwise
    pub exit_status: i32,

    /// Number of instructions executed
    pub cycles: u64,

    /// Number of input records read
    pub records: u64,
}

/// AWK bytecode virtual machine
pub struct VM {
    pub(crate) program: Arc<Program>,
    pub(crate) config: VMConfig,
    pub(crate) state: VMState,
    pub(crate) regexes: RegexCache,
    pub(crate) output: OutputStreams,

    /// Active flag of each action's range pattern
    range_active: Vec<bool>,

    /// True while actions run against a record; `next` is invalid otherwise
    pub(crate) in_record: bool,

    pub(crate) exit_status: i32,
    records: u64,
}

impl VM {
    /// Create a VM writing to the process's standard output
    pub fn new(program: Arc<Program>, config: VMConfig) -> Result<Self> {
        Self::with_output(program, config, Box::new(BufWriter::new(io::stdout())))
    }

    /// Create a VM writing standard output to `stdout`
    ///
    /// The program is verified and its regex pool compiled here; nothing is
    /// compiled during execution.
    pub fn with_output(program: Arc<Program>, config: VMConfig, stdout: Box<dyn Write>) -> Result<Self> {
        awkvm_disassembler::verify(&program)?;
        let regexes = RegexCache::new(&program.regexes)?;
        let state = VMState::new(program.scalar_names.len(), program.array_names.len());
        Ok(Self {
            range_active: vec![false; program.actions.len()],
            program,
            config,
            state,
            regexes,
            output: OutputStreams::new(stdout),
            in_record: false,
            exit_status: 0,
            records: 0,
        })
    }

    /// Set a global scalar or special variable by name before running
    pub fn assign_global(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(index) = self.program.scalar_index(name) {
            self.state.globals[index] = value;
        } else if let Some(var) = SpecialVar::from_name(name) {
            self.state.set_special(var, value)?;
        } else {
            return Err(RuntimeError::UnknownVariable(name.to_string()));
        }
        Ok(())
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.program.scalar_index(name).map(|index| &self.state.globals[index])
    }

    pub fn array(&self, name: &str) -> Option<&Array> {
        self.program.array_index(name).map(|index| self.state.array(ArrayId(index)))
    }

    pub fn special(&self, var: SpecialVar) -> Value {
        self.state.special(var)
    }

    pub fn state(&self) -> &VMState {
        &self.state
    }

    /// Run the program over one input
    pub fn run(&mut self, input: &mut dyn BufRead, filename: &str) -> Result<ExecutionResult> {
        self.run_sources(vec![(filename.to_string(), input)])
    }

    /// Run the program over several inputs in order; `FNR` restarts per input
    pub fn run_inputs(&mut self, mut inputs: Vec<(String, Box<dyn BufRead>)>) -> Result<ExecutionResult> {
        let sources = inputs
            .iter_mut()
            .map(|(name, input)| (name.clone(), input.as_mut() as &mut dyn BufRead))
            .collect();
        self.run_sources(sources)
    }

    fn run_sources(&mut self, sources: Vec<(String, &mut dyn BufRead)>) -> Result<ExecutionResult> {
        let program = Arc::clone(&self.program);
        let mut exiting = false;

        if let Some(begin) = &program.begin {
            exiting = matches!(self.run_unit(begin, UnitKind::Begin)?, Flow::Exit);
        }

        if !exiting && (!program.actions.is_empty() || program.end.is_some()) {
            'inputs: for (name, input) in sources {
                debug!(input = name.as_str(), "reading input");
                self.state.set_special(SpecialVar::Filename, Value::str(name))?;
                self.state.set_special(SpecialVar::Fnr, Value::Num(0.0))?;
                let mut reader = RecordReader::new(input);
                loop {
                    let rs = self.state.special_str(SpecialVar::Rs);
                    let Some(line) = reader.next_record(&rs, &mut self.regexes)? else {
                        break;
                    };
                    self.next_record_number(SpecialVar::Nr)?;
                    self.next_record_number(SpecialVar::Fnr)?;
                    self.records += 1;
                    self.set_record(line)?;

                    self.in_record = true;
                    let flow = self.run_actions(&program);
                    self.in_record = false;
                    if matches!(flow?, Flow::Exit) {
                        break 'inputs;
                    }
                }
            }
        }

        if let Some(end) = &program.end {
            self.run_unit(end, UnitKind::End)?;
        }

        self.output.close_all()?;
        Ok(ExecutionResult {
            exit_status: self.exit_status,
            cycles: self.state.cycles,
            records: self.records,
        })
    }

    fn next_record_number(&mut self, var: SpecialVar) -> Result<()> {
        let n = self.state.special(var).to_num() + 1.0;
        self.state.set_special(var, Value::Num(n))
    }

    fn run_actions(&mut self, program: &Program) -> Result<Flow> {
        for (index, action) in program.actions.iter().enumerate() {
            let matched = match action.pattern.as_slice() {
                [] => true,
                [pattern] => match self.eval_pattern(pattern, UnitKind::Pattern { action: index })? {
                    Ok(matched) => matched,
                    Err(flow) => return Ok(flow),
                },
                [start, stop, ..] => {
                    if !self.range_active[index] {
                        match self.eval_pattern(start, UnitKind::RangeStart { action: index })? {
                            Ok(matched) => self.range_active[index] = matched,
                            Err(flow) => return Ok(flow),
                        }
                    }
                    let active = self.range_active[index];
                    if active {
                        match self.eval_pattern(stop, UnitKind::RangeStop { action: index })? {
                            Ok(true) => self.range_active[index] = false,
                            Ok(false) => {}
                            Err(flow) => return Ok(flow),
                        }
                    }
                    active
                }
            };
            if !matched {
                continue;
            }

            match &action.body {
                None => self.print_record()?,
                Some(body) => match self.run_unit(body, UnitKind::Body { action: index })? {
                    Flow::Next => return Ok(Flow::Normal),
                    Flow::Exit => return Ok(Flow::Exit),
                    _ => {}
                },
            }
        }
        Ok(Flow::Normal)
    }

    /// Truth of a pattern stream, or the flow that interrupted it
    fn eval_pattern(&mut self, code: &[Word], kind: UnitKind) -> Result<std::result::Result<bool, Flow>> {
        match self.run_unit(code, kind)? {
            Flow::Next => Ok(Err(Flow::Normal)),
            Flow::Exit => Ok(Err(Flow::Exit)),
            _ => Ok(Ok(self.state.pop()?.is_true())),
        }
    }

    fn run_unit(&mut self, code: &[Word], kind: UnitKind) -> Result<Flow> {
        let label = self.program.unit_label(kind);
        debug!(unit = label.as_str(), "running unit");
        self.state.stack.clear();
        match self.execute(code, &label)? {
            Flow::Return(_) => Ok(Flow::Normal),
            flow => Ok(flow),
        }
    }

    fn print_record(&mut self) -> Result<()> {
        let ors = self.state.special_str(SpecialVar::Ors);
        let out = self.output.stdout();
        out.write_all(self.state.record.line().as_bytes())?;
        out.write_all(ors.as_bytes())?;
        Ok(())
    }

    /// Replace `$0` and split it into fields with the current `FS`
    pub(crate) fn set_record(&mut self, line: String) -> Result<()> {
        let fs = self.state.special_str(SpecialVar::Fs);
        let fields = if self.state.special_str(SpecialVar::Rs).is_empty() {
            split_paragraph(&line, &fs, &mut self.regexes)?
        } else {
            split_fields(&line, &fs, &mut self.regexes)?
        };
        self.state.record = Record::new(line, fields);
        Ok(())
    }
}
