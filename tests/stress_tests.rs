//! Stress tests for the AWK bytecode runtime
//!
//! Tests with large inputs, long loops, deep recursion and big arrays.

use std::sync::Arc;

use awkvm_assembler::assemble;
use awkvm_runtime::{run, RuntimeError, SharedOutput, VMConfig, VM};

// ============================================================================
// Large Inputs
// ============================================================================

#[test]
fn test_ten_thousand_records() {
    let source = r#"
        body:
            FieldNum 2
            AugAssignGlobal + sum
        END:
            Special NR
            Global sum
            Print 2
    "#;
    let input: String = (1..=10_000).map(|i| format!("row {}\n", i)).collect();
    let output = run(Arc::new(assemble(source).unwrap()), &input).unwrap();
    assert_eq!(output, "10000 50005000\n");
}

#[test]
fn test_wide_record() {
    let source = r#"
        body:
            Special NF
            FieldNum 500
            Print 2
    "#;
    let input: String = (1..=1000).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
    let output = run(Arc::new(assemble(source).unwrap()), &input).unwrap();
    assert_eq!(output, "1000 500\n");
}

// ============================================================================
// Long Loops
// ============================================================================

#[test]
fn test_hundred_thousand_iterations() {
    let source = r#"
        BEGIN:
        top:
            IncrGlobal 1 i
            Global i
            Num 100000
            JumpNumLess top
            Global i
            Print 1
    "#;
    let output = run(Arc::new(assemble(source).unwrap()), "").unwrap();
    assert_eq!(output, "100000\n");
}

#[test]
fn test_large_array_and_for_in() {
    let source = r#"
        BEGIN:
        fill:
            Num 1
            Global i
            AssignArrayGlobal seen
            IncrGlobal 1 i
            Global i
            Num 20000
            JumpNumLess fill
            ForGlobalInGlobal k seen done
            IncrGlobal 1 n
        done:
            Global n
            Print 1
    "#;
    let output = run(Arc::new(assemble(source).unwrap()), "").unwrap();
    assert_eq!(output, "20000\n");
}

#[test]
fn test_cycle_limit_stops_infinite_loop() {
    let source = r#"
        BEGIN:
        top:
            Jump top
    "#;
    let program = Arc::new(assemble(source).unwrap());
    let config = VMConfig { max_cycles: 50_000, ..VMConfig::default() };
    let mut vm = VM::with_output(program, config, Box::new(SharedOutput::new())).unwrap();
    let err = vm.run(&mut std::io::empty(), "").unwrap_err();
    assert!(err.to_string().contains("Cycle limit exceeded: 50000"), "{}", err);
}

// ============================================================================
// Deep Recursion
// ============================================================================

#[test]
fn test_recursion_to_default_depth_limit() {
    // depth(999) nests exactly max_call_depth calls
    let source = r#"
        BEGIN:
            Num 999
            CallUser depth
            Print 1
        function depth(n):
            Local n
            Num 0
            JumpNumGreater recurse
            Num 0
            Return
        recurse:
            Local n
            Num 1
            Subtract
            CallUser depth
            Num 1
            Add
            Return
    "#;
    let output = run(Arc::new(assemble(source).unwrap()), "").unwrap();
    assert_eq!(output, "999\n");
}

#[test]
fn test_recursion_past_depth_limit() {
    let source = r#"
        BEGIN:
            CallUser down
            Drop
        function down():
            CallUser down
            Return
    "#;
    let program = Arc::new(assemble(source).unwrap());
    let mut vm = VM::with_output(program, VMConfig::default(), Box::new(SharedOutput::new())).unwrap();
    let err = vm.run(&mut std::io::empty(), "").unwrap_err();
    assert!(
        matches!(&err, RuntimeError::At { source, .. } if matches!(**source, RuntimeError::CallDepthExceeded { limit: 1000 })),
        "{}",
        err
    );
    assert_eq!(vm.state().depth(), 0);
}
