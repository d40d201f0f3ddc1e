//! Cross-module interaction tests
//!
//! Tests cover:
//! - Assembler output accepted by the verifier, listing and runtime
//! - Binary program files executing like their in-memory source
//! - Decoder width accounting shared by listing and execution
//! - Encoding defects rejected before execution

use std::io::Cursor;
use std::sync::Arc;

use awkvm_assembler::{assemble, CodeBuilder};
use awkvm_disassembler::{decode, disassemble, instructions, verify, DisassemblerError};
use awkvm_runtime::{run, RuntimeError, SharedOutput, VMConfig, VM};
use awkvm_spec::{Instruction, Opcode, Program, Redirect, Word};

const WORD_COUNT: &str = r#"
    body:
        Num 1
        AssignGlobal i
    top:
        Global i
        Special NF
        JumpNumGreater fields_done
        Global i
        Field
        IncrArrayGlobal 1 count
        IncrGlobal 1 i
        Jump top
    fields_done:
    END:
        ForGlobalInGlobal w count done
        Global w
        Global w
        ArrayGlobal count
        Print 2
    done:
"#;

const JOIN: &str = r#"
    BEGIN:
        Str "x y z"
        CallSplitGlobal parts
        Str "-"
        CallUser join parts
        Print 1
    function join(n, sep, @a) locals 2:
        Str "1"
        ArrayLocal a
        AssignLocal 4
        Num 2
        AssignLocal 3
    top:
        Local 3
        Local n
        JumpNumGreater done
        Local 4
        Local sep
        Concat
        Local 3
        ArrayLocal a
        Concat
        AssignLocal 4
        IncrLocal 1 3
        Jump top
    done:
        Local 4
        Return
"#;

// ============================================================================
// Assembler -> Verifier -> Disassembler
// ============================================================================

#[test]
fn test_assembled_programs_verify() {
    for source in [WORD_COUNT, JOIN] {
        let program = assemble(source).unwrap();
        verify(&program).unwrap();
    }
}

#[test]
fn test_listing_names_units_and_parameters() {
    let program = assemble(JOIN).unwrap();
    let listing = disassemble(&program).unwrap();
    assert!(listing.contains("// BEGIN"));
    assert!(listing.contains("// function join"));
    assert!(listing.contains("CallUser join parts"));
    assert!(listing.contains("Local sep"));
}

#[test]
fn test_absolute_jump_targets_run() {
    // Listing-style absolute target: loop back to the first instruction
    let source = r#"
        BEGIN:
            IncrGlobal 1 i
            Global i
            Num 3
            JumpNumLess 0x0000
            Global i
            Print 1
    "#;
    let program = assemble(source).unwrap();
    verify(&program).unwrap();
    assert_eq!(run(Arc::new(program), "").unwrap(), "3\n");
}

// ============================================================================
// Decoder shared by listing and runtime
// ============================================================================

#[test]
fn test_decode_consumes_every_word() {
    for source in [WORD_COUNT, JOIN] {
        let program = assemble(source).unwrap();
        for unit in program.units() {
            let mut ip = 0;
            while ip < unit.code.len() {
                let before = ip;
                let instr = decode(unit.code, &mut ip).unwrap();
                assert_eq!(ip - before, instr.width(), "{:?}", instr);
            }
            assert_eq!(ip, unit.code.len());
        }
    }
}

#[test]
fn test_cycles_match_decoded_instructions() {
    let source = r#"
        BEGIN:
            Num 1
            Num 2
            Add
            AssignGlobal x
            Str "a"
            Str "b"
            Concat
            Drop
    "#;
    let program = Arc::new(assemble(source).unwrap());
    let decoded = instructions(program.begin.as_deref().unwrap()).count() as u64;

    let mut vm = VM::with_output(program, VMConfig::default(), Box::new(SharedOutput::new())).unwrap();
    let result = vm.run(&mut Cursor::new(Vec::new()), "").unwrap();
    assert_eq!(result.cycles, decoded);
}

// ============================================================================
// Binary program files
// ============================================================================

#[test]
fn test_binary_round_trip_runs_identically() {
    let program = assemble(WORD_COUNT).unwrap();
    let bytes = program.to_bytes().unwrap();
    assert!(Program::is_binary(&bytes));

    let loaded = Program::from_bytes(&bytes).unwrap();
    assert_eq!(loaded, program);
    assert_eq!(disassemble(&loaded).unwrap(), disassemble(&program).unwrap());

    let input = "the cat\nthe dog\n";
    let expected = run(Arc::new(program), input).unwrap();
    assert_eq!(run(Arc::new(loaded), input).unwrap(), expected);
    assert_eq!(expected, "the 2\ncat 1\ndog 1\n");
}

// ============================================================================
// Encoding defects
// ============================================================================

fn bad_pool_index() -> Program {
    Program {
        begin: Some(vec![Opcode::Num.to_u8() as Word, 7]),
        ..Program::default()
    }
}

#[test]
fn test_verifier_rejects_bad_pool_index() {
    let err = verify(&bad_pool_index()).unwrap_err();
    assert!(err.to_string().contains("BEGIN"), "{}", err);
}

#[test]
fn test_vm_refuses_unverified_program() {
    let result = VM::with_output(
        Arc::new(bad_pool_index()),
        VMConfig::default(),
        Box::new(SharedOutput::new()),
    );
    assert!(matches!(result, Err(RuntimeError::Bytecode(_))));
}

#[test]
fn test_truncated_stream() {
    let code = vec![Opcode::IncrGlobal.to_u8() as Word, 1];
    let mut ip = 0;
    assert!(matches!(decode(&code, &mut ip), Err(DisassemblerError::Truncated { addr: 0 })));
    assert_eq!(ip, 0);
}

#[test]
fn test_hand_built_program_runs() {
    let mut builder = CodeBuilder::new();
    let skip = builder.new_label();
    builder.emit(&Instruction::Str { index: 0 });
    builder.emit(&Instruction::Print { count: 1, redirect: Redirect::None });
    builder.emit_jump(&Instruction::Jump { offset: 0 }, skip).unwrap();
    builder.emit(&Instruction::Str { index: 0 });
    builder.emit(&Instruction::Print { count: 1, redirect: Redirect::None });
    builder.bind(skip).unwrap();

    let program = Program {
        begin: Some(builder.finish().unwrap()),
        strs: vec!["hello".to_string()],
        ..Program::default()
    };
    verify(&program).unwrap();
    assert_eq!(run(Arc::new(program), "").unwrap(), "hello\n");
}
