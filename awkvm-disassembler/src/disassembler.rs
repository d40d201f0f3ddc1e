//! Program listings
//!
//! Each unit starts with a `// <unit>` comment line, followed by one line per
//! instruction (4-digit hex address, mnemonic, operands) and a blank line.

use std::io::Write;

use awkvm_spec::{Program, UnitKind};
use crate::decoder::decode;
use crate::error::{DisassemblerError, Result};
use crate::formatter::{format, Names};

/// Disassemble a program into listing text
pub fn disassemble(program: &Program) -> Result<String> {
    let mut out = Vec::new();
    disassemble_to(program, &mut out)?;
    String::from_utf8(out).map_err(|e| {
        DisassemblerError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Write the listing of every unit to `out`; empty action bodies are skipped
pub fn disassemble_to<W: Write + ?Sized>(program: &Program, out: &mut W) -> Result<()> {
    for unit in program.units() {
        let function = match unit.kind {
            UnitKind::Function { index } => Some(index),
            UnitKind::Body { .. } if unit.code.is_empty() => continue,
            _ => None,
        };
        let label = program.unit_label(unit.kind);
        write_unit(program, function, &label, unit.code, out).map_err(|e| e.in_unit(label.clone()))?;
    }
    Ok(())
}

fn write_unit<W: Write + ?Sized>(
    program: &Program,
    function: Option<usize>,
    label: &str,
    code: &[awkvm_spec::Word],
    out: &mut W,
) -> Result<()> {
    let names = Names::new(program, function);

    writeln!(out, "        // {}", label)?;
    let mut ip = 0;
    while ip < code.len() {
        let addr = ip;
        let instr = decode(code, &mut ip)?;
        writeln!(out, "{:04x}    {}", addr, format(&instr, addr, &names)?)?;
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use awkvm_spec::{Action, Instruction, Opcode, Redirect, Word};

    fn encode(instrs: &[Instruction]) -> Vec<Word> {
        // Minimal local encoder for the handful of shapes used below
        let mut out = Vec::new();
        for instr in instrs {
            out.push(instr.opcode().to_u8() as Word);
            match instr {
                Instruction::Num { index } | Instruction::Str { index } => out.push(*index as Word),
                Instruction::Print { count, redirect } => {
                    out.push(*count as Word);
                    out.push(redirect.to_word());
                }
                Instruction::Jump { offset } => out.push(*offset),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_disassemble_begin() {
        let program = Program {
            begin: Some(encode(&[
                Instruction::Str { index: 0 },
                Instruction::Print { count: 1, redirect: Redirect::None },
            ])),
            strs: vec!["hi".to_string()],
            ..Program::default()
        };
        let listing = disassemble(&program).unwrap();
        assert_eq!(listing, "        // BEGIN\n0000    Str \"hi\"\n0002    Print 1\n\n");
    }

    #[test]
    fn test_disassemble_unit_order() {
        let program = Program {
            begin: Some(vec![Opcode::Nop.to_u8() as Word]),
            actions: vec![Action {
                pattern: vec![encode(&[Instruction::Num { index: 0 }])],
                body: Some(vec![Opcode::Nop.to_u8() as Word]),
            }],
            end: Some(encode(&[Instruction::Jump { offset: -2 }])),
            nums: vec![1.0],
            ..Program::default()
        };
        let listing = disassemble(&program).unwrap();
        let headers: Vec<&str> = listing.lines().filter(|l| l.contains("//")).collect();
        assert_eq!(headers, vec!["        // BEGIN", "        // pattern", "        // { body }", "        // END"]);
        assert!(listing.contains("0000    Jump 0x0000"));
    }

    #[test]
    fn test_disassemble_skips_empty_body() {
        let program = Program {
            actions: vec![Action {
                pattern: vec![encode(&[Instruction::Num { index: 0 }])],
                body: Some(vec![]),
            }],
            nums: vec![1.0],
            ..Program::default()
        };
        let listing = disassemble(&program).unwrap();
        assert_eq!(listing, "        // pattern\n0000    Num 1\n\n");
    }

    #[test]
    fn test_disassemble_error_names_unit() {
        let program = Program { end: Some(vec![Opcode::Num.to_u8() as Word]), ..Program::default() };
        let err = disassemble(&program).unwrap_err();
        assert_eq!(err.to_string(), "In END: Truncated instruction at 0x0000");
    }

    #[test]
    fn test_disassemble_empty_program() {
        assert_eq!(disassemble(&Program::new()).unwrap(), "");
    }
}
