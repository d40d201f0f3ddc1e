//! Listing tests: assemble text, then check the disassembler's rendering
//!
//! Tests cover:
//! - Constant and operand rendering
//! - Jump targets as absolute addresses
//! - Local names inside functions
//! - Verification of assembled programs

use awkvm_assembler::assemble;
use awkvm_disassembler::{disassemble, instructions, verify};

fn listing(source: &str) -> String {
    let program = assemble(source).unwrap();
    verify(&program).unwrap();
    disassemble(&program).unwrap()
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_num_rendering() {
    let out = listing("BEGIN:\n Num 5.0\n Num 5.25\n Num 0.000001\n");
    assert!(out.contains("0000    Num 5\n"));
    assert!(out.contains("0002    Num 5.25\n"));
    assert!(out.contains("0004    Num 1e-06\n"));
}

#[test]
fn test_str_rendering() {
    let out = listing(r#"BEGIN:
 Str "a\"b"
 Print 1
"#);
    assert!(out.contains("0000    Str \"a\\\"b\"\n"));
}

#[test]
fn test_control_characters_render_as_hex_escapes() {
    let out = listing("BEGIN:\n Str \"a\\x1cb\\u{7}\"\n Print 1\n");
    assert!(out.contains("0000    Str \"a\\x1cb\\a\"\n"), "{}", out);

    // the listing assembles back to the same string
    let line = out.lines().find(|l| l.contains("Str")).unwrap();
    let reassembled = assemble(&format!("BEGIN:\n{}\n", &line[4..])).unwrap();
    assert_eq!(reassembled.strs, vec!["a\x1cb\x07".to_string()]);
}

#[test]
fn test_empty_action_body_not_listed() {
    let out = listing("pattern:\n Regex \"x\"\nbody:\nEND:\n Nop\n");
    let headers: Vec<&str> = out.lines().filter(|l| l.starts_with("        //")).collect();
    assert_eq!(headers, vec!["        // pattern", "        // END"]);
}

#[test]
fn test_print_rendering() {
    let out = listing("BEGIN:\n Num 1\n Num 2\n Print 2\n Num 1\n Num 2\n Str \"f\"\n Print 2 >>\n");
    assert!(out.contains("    Print 2\n"));
    assert!(out.contains("    Print 2 >>\n"));
}

#[test]
fn test_full_listing() {
    let source = r#"
        BEGIN:
            Num 0
            AssignGlobal i
        top:
            Global i
            Num 3
            JumpNumGreaterOrEqual done
            IncrGlobal 1 i
            Jump top
        done:
        END:
            Special NR
            Print 1
    "#;
    let expected = "        // BEGIN\n\
0000    Num 0\n\
0002    AssignGlobal i\n\
0004    Global i\n\
0006    Num 3\n\
0008    JumpNumGreaterOrEqual 0x000f\n\
000a    IncrGlobal 1 i\n\
000d    Jump 0x0004\n\
\n\
        // END\n\
0000    Special NR\n\
0002    Print 1\n\
\n";
    assert_eq!(listing(source), expected);
}

#[test]
fn test_function_listing_uses_param_names() {
    let source = r#"
        function count(@items, n) locals 1:
            Num 0
            AssignLocal n
            ForLocalInLocal 2 items done
            IncrLocal 1 n
        done:
            Local n
            Return
    "#;
    let out = listing(source);
    assert!(out.contains("        // function count\n"));
    assert!(out.contains("    AssignLocal n\n"));
    assert!(out.contains("    ForLocalInLocal 2 items 0x000b\n"));
    assert!(out.contains("    IncrLocal 1 n\n"));
}

#[test]
fn test_action_listing_labels() {
    let out = listing("start:\n Num 1\nstop:\n Num 0\nbody:\n Field\n Print 1\n");
    let headers: Vec<&str> = out.lines().filter(|l| l.starts_with("        //")).collect();
    assert_eq!(headers, vec!["        // start", "        // stop", "        // { body }"]);
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn test_decode_consumes_every_word() {
    let program = assemble(
        r#"
        BEGIN:
            Str "x"
            Str ":"
            CallSplitSepGlobal parts
            Drop
            ForGlobalInGlobal k parts out
            Global k
            Print 1
        out:
            Num 1
            CallUser f parts
            Drop
        function f(v, @a):
            ReturnNull
    "#,
    )
    .unwrap();

    for unit in program.units() {
        let mut consumed = 0;
        for item in instructions(unit.code) {
            let (addr, instr) = item.unwrap();
            assert_eq!(addr, consumed);
            consumed += instr.width();
        }
        assert_eq!(consumed, unit.code.len());
    }
}

#[test]
fn test_verify_rejects_tampered_stream() {
    let mut program = assemble("BEGIN:\n Num 1\n Jump end\n Nop\nend:\n").unwrap();
    verify(&program).unwrap();
    if let Some(code) = program.begin.as_mut() {
        // Point the jump into its own operand
        let last = code.len() - 2;
        code[last] = -1;
    }
    assert!(verify(&program).is_err());
}
