//! End-to-end `tokenize -> parse -> compile` tests against the six concrete
//! scenarios described for the compiler's externally visible bytecode
//! behavior. Assertions read the disassembled mnemonic sequence rather than
//! raw byte vectors.

use mildew_compiler::compile;
use mildew_compiler::disasm::disassemble;
use pretty_assertions::assert_eq;

fn init_tracing() {
  let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Just the mnemonic of each line (drops the offset and operands), so
/// assertions read as a shape, not exact byte positions.
fn mnemonics(text: &str) -> Vec<&str> {
  text
    .lines()
    .map(|line| line.split_whitespace().nth(1).expect("line has a mnemonic"))
    .collect()
}

#[test]
fn scenario_1_arithmetic_expression_statement() {
  init_tracing();
  let chunk = compile("1 + 2;").expect("compiles");
  let text = disassemble(&chunk);
  assert_eq!(mnemonics(&text), vec!["PUSH_ONE", "CONST", "ADD", "POP"]);
  assert!(chunk.constant_table.iter().any(|v| matches!(v, mildew_core::values::Value::Int(2))));
}

#[test]
fn scenario_2_lexical_compound_assignment() {
  init_tracing();
  let chunk = compile("let x = 5; x += 3;").expect("compiles");
  let text = disassemble(&chunk);
  assert_eq!(
    mnemonics(&text),
    vec!["CONST", "DECL_LEXICAL", "PUSH_STACK", "CONST", "ADD", "STORE_STACK", "POP"]
  );
  // x's slot is 0: both the read and the store target it.
  let lines: Vec<&str> = text.lines().collect();
  assert!(lines[2].ends_with(" 0"));
  assert!(lines[5].ends_with(" 0"));
}

#[test]
fn scenario_3_if_else_no_scope_opcodes_without_declarations() {
  init_tracing();
  let chunk = compile("if (a) { b; } else { c; }").expect("compiles");
  let text = disassemble(&chunk);
  assert_eq!(
    mnemonics(&text),
    vec!["GET_VAR", "JMP_FALSE", "GET_VAR", "POP", "JMP", "GET_VAR", "POP"]
  );
  assert!(!text.contains("OPEN_SCOPE"));
  assert!(!text.contains("CLOSE_SCOPE"));
}

#[test]
fn scenario_4_while_break_continue_single_back_edge() {
  init_tracing();
  let chunk = compile("while (cond) { if (done) break; continue; }").expect("compiles");
  let text = disassemble(&chunk);
  assert_eq!(text.matches("JMP ").count(), 1, "exactly one back-edge JMP");
  assert_eq!(text.matches("GOTO").count(), 2, "one GOTO for break, one for continue");
  for line in text.lines().filter(|l| l.contains("GOTO")) {
    let pop_count: &str = line.split_whitespace().last().unwrap();
    assert_eq!(pop_count, "0", "break/continue at loop's own depth pops no scopes");
  }
  assert!(!text.contains("UNPATCHED") && !text.contains(&i32::MAX.to_string()));
}

#[test]
fn scenario_5_function_call() {
  init_tracing();
  let chunk = compile("function f(x) { return x * x; } f(3);").expect("compiles");
  let text = disassemble(&chunk);
  let m = mnemonics(&text);
  // Outer context: function literal constant, declare f, then the call site.
  assert_eq!(
    m,
    vec!["CONST", "DECLARE_VAR", "THIS", "CONST", "CONST", "CALL", "POP"]
  );

  let has_function_body = chunk.constant_table.iter().any(|v| matches!(v, mildew_core::values::Value::Func(_)));
  assert!(has_function_body);
  let func = chunk
    .constant_table
    .iter()
    .find_map(|v| match v {
      mildew_core::values::Value::Func(f) => Some(f.clone()),
      _ => None,
    })
    .expect("interned function");
  let body_text = disassemble(&func.chunk);
  assert_eq!(
    mnemonics(&body_text),
    vec!["PUSH_STACK", "PUSH_STACK", "MUL", "RETURN", "PUSH_UNDEF", "RETURN"]
  );
}

#[test]
fn scenario_6_class_extends_super_new() {
  init_tracing();
  let chunk = compile(
    "class A extends B { constructor(x){ super(x); } m(){ return 1; } } new A(4);",
  )
  .expect("compiles");
  let text = disassemble(&chunk);
  let m = mnemonics(&text);
  // Class body: method name, method fn, constructor fn, base expr, CLASS, then
  // declare A; then the new-site: GET_VAR A, CONST 4, NEW, POP.
  assert_eq!(
    m,
    vec!["CONST", "CONST", "CONST", "GET_VAR", "CLASS", "DECLARE_VAR", "GET_VAR", "CONST", "NEW", "POP"]
  );
  let class_line = text.lines().find(|l| l.contains("CLASS")).unwrap();
  assert!(class_line.ends_with("1 0 0 0"));
}
