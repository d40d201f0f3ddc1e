//! Integration tests for the AWK bytecode assembler
//!
//! Tests the complete assembly workflow including:
//! - Section handling and action assembly
//! - Label resolution in both directions
//! - Pool and name-table interning
//! - Error handling for malformed input

use awkvm_assembler::{assemble, encode, AssemblerError};
use awkvm_spec::{ArrayArg, AugOp, Instruction, Opcode, Program, Redirect, Word};

fn concat(instrs: &[Instruction]) -> Vec<Word> {
    instrs.iter().flat_map(encode).collect()
}

// ============================================================================
// Basic Assembly Tests
// ============================================================================

#[test]
fn test_assemble_empty_program() {
    let program = assemble("").unwrap();
    assert_eq!(program, Program::new());
}

#[test]
fn test_assemble_comments_only() {
    let source = r#"
        ; a comment
        // BEGIN
    "#;
    let program = assemble(source).unwrap();
    assert!(program.begin.is_none());
    assert!(program.actions.is_empty());
}

#[test]
fn test_assemble_begin_and_end() {
    let source = r#"
        BEGIN:
            Num 1
            AssignGlobal x
        END:
            Global x
            Print 1
    "#;
    let program = assemble(source).unwrap();
    assert_eq!(
        program.begin,
        Some(concat(&[Instruction::Num { index: 0 }, Instruction::AssignGlobal { index: 0 }]))
    );
    assert_eq!(
        program.end,
        Some(concat(&[
            Instruction::Global { index: 0 },
            Instruction::Print { count: 1, redirect: Redirect::None },
        ]))
    );
}

#[test]
fn test_assemble_operators_and_redirects() {
    let source = r#"
        BEGIN:
            Num 2
            AugAssignGlobal ^ x
            Global x
            Str "out.txt"
            Swap
            Printf 1 >
            Str "sort"
            Print 0 |
    "#;
    let program = assemble(source).unwrap();
    let code = program.begin.unwrap();
    let expected = concat(&[
        Instruction::Num { index: 0 },
        Instruction::AugAssignGlobal { op: AugOp::Pow, index: 0 },
        Instruction::Global { index: 0 },
        Instruction::Str { index: 0 },
        Instruction::Swap,
        Instruction::Printf { count: 1, redirect: Redirect::Truncate },
        Instruction::Str { index: 1 },
        Instruction::Print { count: 0, redirect: Redirect::Pipe },
    ]);
    assert_eq!(code, expected);
}

#[test]
fn test_assemble_specials() {
    let program = assemble("BEGIN:\n Str \"-\"\n AssignSpecial OFS\n IncrSpecial 1 NR\n").unwrap();
    assert_eq!(
        program.begin.unwrap(),
        concat(&[
            Instruction::Str { index: 0 },
            Instruction::AssignSpecial { index: 7 },
            Instruction::IncrSpecial { amount: 1, index: 5 },
        ])
    );
}

// ============================================================================
// Label Resolution Tests
// ============================================================================

#[test]
fn test_counting_loop() {
    let source = r#"
        BEGIN:
            Num 1
            AssignGlobal i
        loop:
            Global i
            Num 10
            JumpNumGreater done
            IncrGlobal 1 i
            Jump loop
        done:
    "#;
    let program = assemble(source).unwrap();
    let code = program.begin.unwrap();

    // Num(0..2) AssignGlobal(2..4) Global(4..6) Num(6..8)
    // JumpNumGreater(8..10) IncrGlobal(10..13) Jump(13..15)
    assert_eq!(code.len(), 15);
    assert_eq!(code[8], Opcode::JumpNumGreater.to_u8() as Word);
    assert_eq!(code[9], 15 - 10);
    assert_eq!(code[13], Opcode::Jump.to_u8() as Word);
    assert_eq!(code[14], 4 - 15);
}

#[test]
fn test_labels_are_per_section() {
    let source = r#"
        BEGIN:
        top:
            Jump top
        END:
        top:
            Jump top
    "#;
    let program = assemble(source).unwrap();
    assert_eq!(program.begin, program.end);
}

#[test]
fn test_for_in_exit_label() {
    let source = r#"
        function dump(@a) locals 1:
            ForLocalInLocal 1 a done
            Local 1
            Print 1
        done:
            ReturnNull
    "#;
    let program = assemble(source).unwrap();
    let body = &program.functions[0].body;
    let for_in = Instruction::ForLocalInLocal { var: 1, array: 0, offset: 5 };
    assert_eq!(body[..4], encode(&for_in)[..]);
}

// ============================================================================
// Functions and Calls
// ============================================================================

#[test]
fn test_call_with_local_array_argument() {
    let source = r#"
        function outer(@seen):
            Nulls 1
            CallUser inner seen
            Return
        function inner(x, @m):
            ReturnNull
    "#;
    let program = assemble(source).unwrap();
    assert_eq!(
        program.functions[0].body,
        concat(&[
            Instruction::Nulls { count: 1 },
            Instruction::CallUser { func: 1, arrays: vec![ArrayArg::local(0)] },
            Instruction::Return,
        ])
    );
}

#[test]
fn test_split_into_global_and_local() {
    let source = r#"
        BEGIN:
            Str "a b"
            CallSplitGlobal parts
            Drop
        function f(@out):
            Str "x:y"
            Str ":"
            CallSplitSepLocal out
            Return
    "#;
    let program = assemble(source).unwrap();
    assert_eq!(program.array_names, vec!["parts".to_string()]);
    assert!(program.functions[0]
        .body
        .starts_with(&concat(&[Instruction::Str { index: 1 }, Instruction::Str { index: 2 }])));
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[test]
fn test_unknown_mnemonic_reports_line() {
    let source = "BEGIN:\n    Nop\n    Addd\n";
    match assemble(source) {
        Err(AssemblerError::UnknownInstruction { line, name }) => {
            assert_eq!(line, 3);
            assert_eq!(name, "Addd");
        }
        other => panic!("Expected UnknownInstruction error, got {:?}", other),
    }
}

#[test]
fn test_missing_operand() {
    let err = assemble("BEGIN:\n Num\n").unwrap_err();
    assert!(matches!(err, AssemblerError::InvalidOperand { line: 2, .. }));
}

#[test]
fn test_wrong_operand_kind() {
    assert!(assemble("BEGIN:\n Num \"one\"\n").is_err());
    assert!(assemble("BEGIN:\n Str 1\n").is_err());
    assert!(assemble("BEGIN:\n AugAssignGlobal > x\n").is_err());
    assert!(assemble("BEGIN:\n Print 1 +\n").is_err());
}

#[test]
fn test_unterminated_string() {
    let err = assemble("BEGIN:\n Str \"open\n").unwrap_err();
    assert!(matches!(err, AssemblerError::SyntaxError { line: 2, .. }));
}

#[test]
fn test_duplicate_begin() {
    assert!(assemble("BEGIN:\n Nop\nBEGIN:\n Nop\n").is_err());
}

#[test]
fn test_error_display_has_line() {
    let err = assemble("BEGIN:\n Jump missing\n").unwrap_err();
    assert_eq!(err.to_string(), "Undefined label at line 2: missing");
}
