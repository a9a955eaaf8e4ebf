//! Bytecode-to-text dump for tests and debugging. Not part of the public
//! contract with the VM — the VM consumes `Chunk` directly — this exists so
//! assertions can read `"PUSH_ONE\nCONST 0\nADD\nPOP\n"` instead of a byte
//! vector.

use mildew_core::bytecode::OpCode;
use mildew_core::chunk::Chunk;

/// Renders every instruction in `chunk.bytecode` as `<offset> <MNEMONIC>
/// [operands]`, one per line.
pub fn disassemble(chunk: &Chunk) -> String {
  let mut out = String::new();
  let mut offset = 0usize;
  let bytes = &chunk.bytecode;
  while offset < bytes.len() {
    let op = OpCode::from(bytes[offset]);
    let start = offset;
    offset += 1;
    let line = match op {
      OpCode::Goto => {
        let target = read_u32(bytes, offset);
        let pop_count = bytes[offset + 4];
        offset += 5;
        format!("GOTO {target} {pop_count}")
      }
      OpCode::ClassBuild => {
        let (a, b, c, d) = (bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]);
        offset += 4;
        format!("CLASS {a} {b} {c} {d}")
      }
      OpCode::PushStack => {
        let v = read_i32(bytes, offset);
        offset += 4;
        format!("PUSH_STACK {v}")
      }
      OpCode::Jmp | OpCode::JmpFalse => {
        let v = read_i32(bytes, offset);
        offset += 4;
        format!("{} {v}", mnemonic(op))
      }
      _ => match op.operand_len() {
        Some(n) => {
          let v = read_u32(bytes, offset);
          offset += n;
          format!("{} {v}", mnemonic(op))
        }
        None => mnemonic(op).to_string(),
      },
    };
    out.push_str(&format!("{start} {line}\n"));
  }
  out
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
  u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
  i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn mnemonic(op: OpCode) -> &'static str {
  use OpCode::*;
  match op {
    Const => "CONST",
    PushZero => "PUSH_ZERO",
    PushOne => "PUSH_ONE",
    PushUndef => "PUSH_UNDEF",
    Pow => "POW",
    Mul => "MUL",
    Div => "DIV",
    Mod => "MOD",
    Add => "ADD",
    Sub => "SUB",
    Neg => "NEG",
    BitLShift => "BIT_LSHIFT",
    BitRShift => "BIT_RSHIFT",
    BitURShift => "BIT_URSHIFT",
    BitAnd => "BIT_AND",
    BitOr => "BIT_OR",
    BitXor => "BIT_XOR",
    BitNot => "BIT_NOT",
    Not => "NOT",
    And => "AND",
    Or => "OR",
    Lt => "LT",
    Le => "LE",
    Gt => "GT",
    Ge => "GE",
    Eq => "EQ",
    Neq => "NEQ",
    StrictEq => "STRICT_EQ",
    Tern => "TERN",
    Instanceof => "INSTANCEOF",
    Typeof => "TYPEOF",
    Concat => "CONCAT",
    Array => "ARRAY",
    Object => "OBJECT",
    ClassBuild => "CLASS",
    GetVar => "GET_VAR",
    SetVar => "SET_VAR",
    GetIndex => "GET_INDEX",
    SetIndex => "SET_INDEX",
    PushStack => "PUSH_STACK",
    StoreStack => "STORE_STACK",
    This => "THIS",
    LoadException => "LOAD_EXCEPTION",
    Delete => "DELETE",
    DeclareVar => "DECLARE_VAR",
    DeclLexical => "DECL_LEXICAL",
    DeclConst => "DECL_CONST",
    Jmp => "JMP",
    JmpFalse => "JMP_FALSE",
    Goto => "GOTO",
    Switch => "SWITCH",
    Call => "CALL",
    New => "NEW",
    Return => "RETURN",
    Throw => "THROW",
    Rethrow => "RETHROW",
    Try => "TRY",
    EndTry => "END_TRY",
    Iter => "ITER",
    OpenScope => "OPEN_SCOPE",
    CloseScope => "CLOSE_SCOPE",
    Pop => "POP",
    PopN => "POP_N",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn one_plus_two_disassembles_in_order() {
    let chunk = crate::compile("1 + 2;").expect("compiles");
    let text = disassemble(&chunk);
    assert!(text.contains("PUSH_ONE"));
    assert!(text.contains("ADD"));
    assert!(text.contains("POP"));
  }
}
