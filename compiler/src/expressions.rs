use mildew_core::ast::{BinaryOp, Expr, ExprIdx, PostfixOp, UnaryOp};
use mildew_core::bytecode::OpCode;
use mildew_core::errors::{CompileError, Result, SourcePos};
use mildew_core::values::{FuncObj, Value};

use crate::{literal_to_value, Compiler};

impl Compiler {
  /// Emits `expr`, leaving exactly one value on the VM stack.
  pub(crate) fn compile_expr(&mut self, idx: ExprIdx) -> Result<()> {
    match self.ast.expr(idx) {
      Expr::Literal { value, .. } => {
        let value = value.clone();
        self.emit_literal(&value);
      }
      Expr::TemplateString { .. } => self.emit_template_string(idx)?,
      Expr::ArrayLiteral { .. } => self.emit_array_literal(idx)?,
      Expr::ObjectLiteral { .. } => self.emit_object_literal(idx)?,
      Expr::ClassLiteral { class, pos } => {
        let (class, pos) = (*class, *pos);
        self.emit_class_literal(class, pos)?;
      }
      Expr::Binary { .. } => self.emit_binary(idx)?,
      Expr::Unary { .. } => self.emit_unary(idx)?,
      Expr::Postfix { .. } => self.emit_postfix(idx)?,
      Expr::Ternary { .. } => self.emit_ternary(idx)?,
      Expr::Identifier { name, pos } => {
        let (name, pos) = (name.clone(), *pos);
        self.emit_identifier_read(&name, pos)?;
      }
      Expr::This { .. } => {
        self.chunk().push_op(OpCode::This);
      }
      Expr::Super { pos } => {
        return Err(CompileError::SuperOutsideDerivedClass { pos: *pos });
      }
      Expr::Call { .. } => self.emit_call(idx)?,
      Expr::Index { .. } => self.emit_index_read(idx)?,
      Expr::Member { .. } => self.emit_member_read(idx)?,
      Expr::Assign { .. } => self.emit_assign(idx)?,
      Expr::CompoundAssign { .. } => self.emit_compound_assign_expr(idx)?,
      Expr::FuncLiteral { .. } => self.emit_func_literal(idx)?,
    }
    Ok(())
  }

  fn emit_literal(&mut self, value: &mildew_core::ast::Literal) {
    use mildew_core::ast::Literal;
    match value {
      Literal::Int(0) => {
        self.chunk().push_op(OpCode::PushZero);
      }
      Literal::Int(1) => {
        self.chunk().push_op(OpCode::PushOne);
      }
      Literal::Undefined => {
        self.chunk().push_op(OpCode::PushUndef);
      }
      other => {
        let idx = self.chunk().add_constant(literal_to_value(other));
        self.chunk().push_op(OpCode::Const);
        self.chunk().push_u32(idx);
      }
    }
  }

  fn emit_template_string(&mut self, idx: ExprIdx) -> Result<()> {
    use mildew_core::ast::TemplatePart;
    let Expr::TemplateString { parts, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let count = parts.len() as u32;
    let parts: Vec<PartView> = parts
      .iter()
      .map(|p| match p {
        TemplatePart::Literal(s) => PartView::Literal(s.clone()),
        TemplatePart::Expr(e) => PartView::Expr(*e),
      })
      .collect();
    for part in parts {
      match part {
        PartView::Literal(s) => {
          let idx = self.chunk().add_constant(Value::from(s));
          self.chunk().push_op(OpCode::Const);
          self.chunk().push_u32(idx);
        }
        PartView::Expr(e) => self.compile_expr(e)?,
      }
    }
    self.chunk().push_op(OpCode::Concat);
    self.chunk().push_u32(count);
    Ok(())
  }

  fn emit_array_literal(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::ArrayLiteral { elements, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let elements = elements.clone();
    for &e in &elements {
      self.compile_expr(e)?;
    }
    self.chunk().push_op(OpCode::Array);
    self.chunk().push_u32(elements.len() as u32);
    Ok(())
  }

  fn emit_object_literal(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::ObjectLiteral { keys, values, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let keys = keys.clone();
    let values = values.clone();
    for (key, &value) in keys.iter().zip(values.iter()) {
      let key_idx = self.chunk().add_constant(Value::from(key.clone()));
      self.chunk().push_op(OpCode::Const);
      self.chunk().push_u32(key_idx);
      self.compile_expr(value)?;
    }
    self.chunk().push_op(OpCode::Object);
    self.chunk().push_u32(keys.len() as u32);
    Ok(())
  }

  pub(crate) fn emit_func_literal(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::FuncLiteral { name, params, body, is_class_member, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (name, params, body, is_class_member) =
      (name.clone(), params.clone(), body.clone(), *is_class_member);
    let chunk = self.compile_function_body(&params, &body)?;
    let mut func = FuncObj::new(name, params, chunk);
    func.is_class_member = is_class_member;
    let idx = self.intern_func(func);
    self.chunk().push_op(OpCode::Const);
    self.chunk().push_u32(idx);
    Ok(())
  }

  fn emit_binary(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Binary { op, left, right, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (op, left, right) = (*op, *left, *right);
    self.compile_expr(left)?;
    self.compile_expr(right)?;
    self.chunk().push_op(binary_opcode(op));
    if op == BinaryOp::StrictNeq {
      self.chunk().push_op(OpCode::Not);
    }
    Ok(())
  }

  fn emit_unary(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Unary { op, operand, pos } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (op, operand, pos) = (*op, *operand, *pos);
    match op {
      UnaryOp::PrefixInc => self.emit_compound_assign(BinaryOp::Add, operand, Rhs::One, pos),
      UnaryOp::PrefixDec => self.emit_compound_assign(BinaryOp::Sub, operand, Rhs::One, pos),
      UnaryOp::Neg | UnaryOp::Not | UnaryOp::BitNot | UnaryOp::Typeof => {
        self.compile_expr(operand)?;
        self.chunk().push_op(unary_opcode(op));
        Ok(())
      }
    }
  }

  fn emit_postfix(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Postfix { op, operand, pos } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (op, operand, pos) = (*op, *operand, *pos);
    self.emit_identifier_or_member_read(operand)?;
    let bop = match op {
      PostfixOp::Inc => BinaryOp::Add,
      PostfixOp::Dec => BinaryOp::Sub,
    };
    self.emit_compound_assign(bop, operand, Rhs::One, pos)?;
    self.chunk().push_op(OpCode::Pop);
    Ok(())
  }

  fn emit_ternary(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Ternary { cond, then_branch, else_branch, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (cond, then_branch, else_branch) = (*cond, *then_branch, *else_branch);
    self.compile_expr(cond)?;
    self.compile_expr(then_branch)?;
    self.compile_expr(else_branch)?;
    self.chunk().push_op(OpCode::Tern);
    Ok(())
  }

  /// Reads the current value of a variable access, for identifier
  /// expressions and for the left half of compound-assignment/postfix
  /// rewriting.
  fn emit_identifier_read(&mut self, name: &str, _pos: SourcePos) -> Result<()> {
    match self.resolve_local(name) {
      Some((slot, _)) => {
        self.chunk().push_op(OpCode::PushStack);
        self.chunk().push_i32(slot);
      }
      None => {
        let idx = self.intern_name(name);
        self.chunk().push_op(OpCode::GetVar);
        self.chunk().push_u32(idx);
      }
    }
    Ok(())
  }

  /// Reads the current value of any valid assignment target (identifier,
  /// member, or index), re-evaluating the object/index sub-expressions —
  /// used as the "L" read half of compound-assignment rewriting.
  fn emit_identifier_or_member_read(&mut self, target: ExprIdx) -> Result<()> {
    self.compile_expr(target)
  }

  fn emit_index_read(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Index { object, index, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (object, index) = (*object, *index);
    self.compile_expr(object)?;
    self.compile_expr(index)?;
    self.chunk().push_op(OpCode::GetIndex);
    Ok(())
  }

  fn emit_member_read(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Member { object, property, .. } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (object, property) = (*object, property.clone());
    self.compile_expr(object)?;
    let key_idx = self.intern_name(&property);
    self.chunk().push_op(OpCode::Const);
    self.chunk().push_u32(key_idx);
    self.chunk().push_op(OpCode::GetIndex);
    Ok(())
  }

  // --- assignment ---

  fn emit_assign(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Assign { target, value, pos } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (target, value, pos) = (*target, *value, *pos);
    self.emit_plain_assign(target, value, pos)
  }

  /// `L = R`, per the three target shapes: identifier (stack-slot or
  /// late-bound), member access, index access. `R` is emitted in place, no
  /// re-evaluation of `L`'s sub-expressions since no prior read is needed.
  fn emit_plain_assign(&mut self, target: ExprIdx, value: ExprIdx, pos: SourcePos) -> Result<()> {
    match self.ast.expr(target) {
      Expr::Identifier { name, .. } => {
        let name = name.clone();
        self.compile_expr(value)?;
        self.emit_store_identifier(&name, pos)
      }
      Expr::Member { object, property, .. } => {
        let (object, property) = (*object, property.clone());
        self.compile_expr(object)?;
        let key_idx = self.intern_name(&property);
        self.chunk().push_op(OpCode::Const);
        self.chunk().push_u32(key_idx);
        self.compile_expr(value)?;
        self.chunk().push_op(OpCode::SetIndex);
        Ok(())
      }
      Expr::Index { object, index, .. } => {
        let (object, index) = (*object, *index);
        self.compile_expr(object)?;
        self.compile_expr(index)?;
        self.compile_expr(value)?;
        self.chunk().push_op(OpCode::SetIndex);
        Ok(())
      }
      _ => unreachable!("parser only admits identifier/member/index assignment targets"),
    }
  }

  /// Stores the top-of-stack value into `name`, leaving it on the stack as
  /// the assignment expression's own value (`STORE_STACK`/`SET_VAR` do not
  /// consume it).
  fn emit_store_identifier(&mut self, name: &str, pos: SourcePos) -> Result<()> {
    match self.resolve_local(name) {
      Some((_, true)) => Err(CompileError::AssignmentToConstant { pos, name: name.to_string() }),
      Some((slot, false)) => {
        self.chunk().push_op(OpCode::StoreStack);
        self.chunk().push_u32(slot as u32);
        Ok(())
      }
      None => {
        let idx = self.intern_name(name);
        self.chunk().push_op(OpCode::SetVar);
        self.chunk().push_u32(idx);
        Ok(())
      }
    }
  }

  fn emit_compound_assign_expr(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::CompoundAssign { op, target, value, pos } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (op, target, value, pos) = (*op, *target, *value, *pos);
    self.emit_compound_assign(op, target, Rhs::Expr(value), pos)
  }

  /// `L op= R`, rewritten at emit time to `L = (L op R)`. Identifier targets
  /// read/store directly (no object to duplicate). Member/index targets use
  /// the `PUSH_STACK <negative>` duplicate trick (the same one used for
  /// method-call receivers) to read `obj[key]`/`obj.m` without evaluating
  /// `obj`/the index expression twice.
  fn emit_compound_assign(&mut self, op: BinaryOp, target: ExprIdx, rhs: Rhs, pos: SourcePos) -> Result<()> {
    match self.ast.expr(target) {
      Expr::Identifier { name, .. } => {
        let name = name.clone();
        self.emit_identifier_read(&name, pos)?;
        self.emit_rhs(rhs)?;
        self.chunk().push_op(binary_opcode(op));
        self.emit_store_identifier(&name, pos)
      }
      Expr::Member { object, property, .. } => {
        let (object, property) = (*object, property.clone());
        self.compile_expr(object)?;
        let key_idx = self.intern_name(&property);
        self.chunk().push_op(OpCode::Const);
        self.chunk().push_u32(key_idx);
        self.dup_two_below_top();
        self.chunk().push_op(OpCode::GetIndex);
        self.emit_rhs(rhs)?;
        self.chunk().push_op(binary_opcode(op));
        self.chunk().push_op(OpCode::SetIndex);
        Ok(())
      }
      Expr::Index { object, index, .. } => {
        let (object, index) = (*object, *index);
        self.compile_expr(object)?;
        self.compile_expr(index)?;
        self.dup_two_below_top();
        self.chunk().push_op(OpCode::GetIndex);
        self.emit_rhs(rhs)?;
        self.chunk().push_op(binary_opcode(op));
        self.chunk().push_op(OpCode::SetIndex);
        Ok(())
      }
      _ => unreachable!("parser only admits identifier/member/index assignment targets"),
    }
  }

  /// Given a stack of `[..., a, b]`, pushes a duplicate of each so the stack
  /// becomes `[..., a, b, a, b]` — `PUSH_STACK` addresses relative to the
  /// current top, so the second duplicate shifts the offset by one.
  fn dup_two_below_top(&mut self) {
    self.chunk().push_op(OpCode::PushStack);
    self.chunk().push_i32(-2);
    self.chunk().push_op(OpCode::PushStack);
    self.chunk().push_i32(-2);
  }

  fn emit_rhs(&mut self, rhs: Rhs) -> Result<()> {
    match rhs {
      Rhs::Expr(e) => self.compile_expr(e),
      Rhs::One => {
        self.chunk().push_op(OpCode::PushOne);
        Ok(())
      }
    }
  }

  // --- calls / new / super ---

  fn emit_call(&mut self, idx: ExprIdx) -> Result<()> {
    let Expr::Call { callee, args, is_new, pos } = self.ast.expr(idx) else {
      unreachable!()
    };
    let (callee, args, is_new, pos) = (*callee, args.clone(), *is_new, *pos);

    if is_new {
      self.compile_expr(callee)?;
      for &a in &args {
        self.compile_expr(a)?;
      }
      self.chunk().push_op(OpCode::New);
      self.chunk().push_u32(args.len() as u32);
      return Ok(());
    }

    if matches!(self.ast.expr(callee), Expr::Super { .. }) {
      let Some(&base) = self.base_class_stack.last() else {
        return Err(CompileError::SuperOutsideDerivedClass { pos });
      };
      self.chunk().push_op(OpCode::This);
      self.compile_expr(base)?;
      for &a in &args {
        self.compile_expr(a)?;
      }
      self.chunk().push_op(OpCode::Call);
      self.chunk().push_u32(args.len() as u32);
      return Ok(());
    }

    match self.ast.expr(callee) {
      Expr::Member { object, property, .. } => {
        let (object, property) = (*object, property.clone());
        self.compile_expr(object)?;
        self.chunk().push_op(OpCode::PushStack);
        self.chunk().push_i32(-1);
        let key_idx = self.intern_name(&property);
        self.chunk().push_op(OpCode::Const);
        self.chunk().push_u32(key_idx);
        self.chunk().push_op(OpCode::GetIndex);
        for &a in &args {
          self.compile_expr(a)?;
        }
        self.chunk().push_op(OpCode::Call);
        self.chunk().push_u32(args.len() as u32);
      }
      Expr::Index { object, index, .. } => {
        let (object, index) = (*object, *index);
        self.compile_expr(object)?;
        self.chunk().push_op(OpCode::PushStack);
        self.chunk().push_i32(-1);
        self.compile_expr(index)?;
        self.chunk().push_op(OpCode::GetIndex);
        for &a in &args {
          self.compile_expr(a)?;
        }
        self.chunk().push_op(OpCode::Call);
        self.chunk().push_u32(args.len() as u32);
      }
      _ => {
        self.chunk().push_op(OpCode::This);
        self.compile_expr(callee)?;
        for &a in &args {
          self.compile_expr(a)?;
        }
        self.chunk().push_op(OpCode::Call);
        self.chunk().push_u32(args.len() as u32);
      }
    }
    Ok(())
  }

  // --- class literal ---

  pub(crate) fn emit_class_literal(&mut self, class_idx: mildew_core::ast::ClassIdx, _pos: SourcePos) -> Result<()> {
    let class = self.ast.class(class_idx);
    let method_names: Vec<String> = class.methods.iter().map(|m| m.name.clone()).collect();
    let method_funcs: Vec<ExprIdx> = class.methods.iter().map(|m| m.func).collect();
    let getter_names: Vec<String> = class.getters.iter().map(|m| m.name.clone()).collect();
    let getter_funcs: Vec<ExprIdx> = class.getters.iter().map(|m| m.func).collect();
    let setter_names: Vec<String> = class.setters.iter().map(|m| m.name.clone()).collect();
    let setter_funcs: Vec<ExprIdx> = class.setters.iter().map(|m| m.func).collect();
    let static_names: Vec<String> = class.statics.iter().map(|m| m.name.clone()).collect();
    let static_funcs: Vec<ExprIdx> = class.statics.iter().map(|m| m.func).collect();
    let constructor = class.constructor;
    let extends = class.extends;

    for kind in ["methods", "getters", "setters", "statics"] {
      let len = match kind {
        "methods" => method_names.len(),
        "getters" => getter_names.len(),
        "setters" => setter_names.len(),
        _ => static_names.len(),
      };
      if len > 255 {
        return Err(CompileError::ClassMemberCountOverflow { pos: _pos, kind });
      }
    }

    if let Some(base) = extends {
      self.base_class_stack.push(base);
    }

    for (names, funcs) in [
      (&method_names, &method_funcs),
      (&getter_names, &getter_funcs),
      (&setter_names, &setter_funcs),
      (&static_names, &static_funcs),
    ] {
      for (name, &func) in names.iter().zip(funcs.iter()) {
        let idx = self.intern_name(name);
        self.chunk().push_op(OpCode::Const);
        self.chunk().push_u32(idx);
        self.emit_func_literal(func)?;
      }
    }

    self.emit_func_literal(constructor)?;

    if let Some(base) = extends {
      self.compile_expr(base)?;
    } else {
      self.chunk().push_op(OpCode::PushUndef);
    }

    if extends.is_some() {
      self.base_class_stack.pop();
    }

    self.chunk().push_op(OpCode::ClassBuild);
    self.chunk().push_byte(method_names.len() as u8);
    self.chunk().push_byte(getter_names.len() as u8);
    self.chunk().push_byte(setter_names.len() as u8);
    self.chunk().push_byte(static_names.len() as u8);
    Ok(())
  }
}

enum PartView {
  Literal(String),
  Expr(ExprIdx),
}

/// The right-hand side of a compound-assignment rewrite: either the parsed
/// expression (`L op= R`) or a synthesized `1` (`++x`/`--x`/`x++`/`x--`).
pub(crate) enum Rhs {
  Expr(ExprIdx),
  One,
}

fn binary_opcode(op: BinaryOp) -> OpCode {
  match op {
    BinaryOp::Pow => OpCode::Pow,
    BinaryOp::Mul => OpCode::Mul,
    BinaryOp::Div => OpCode::Div,
    BinaryOp::Mod => OpCode::Mod,
    BinaryOp::Add => OpCode::Add,
    BinaryOp::Sub => OpCode::Sub,
    BinaryOp::Lt => OpCode::Lt,
    BinaryOp::Le => OpCode::Le,
    BinaryOp::Gt => OpCode::Gt,
    BinaryOp::Ge => OpCode::Ge,
    BinaryOp::Eq => OpCode::Eq,
    BinaryOp::Neq => OpCode::Neq,
    BinaryOp::StrictEq | BinaryOp::StrictNeq => OpCode::StrictEq,
    BinaryOp::Instanceof => OpCode::Instanceof,
    BinaryOp::LogicAnd => OpCode::And,
    BinaryOp::LogicOr => OpCode::Or,
    BinaryOp::BitAnd => OpCode::BitAnd,
    BinaryOp::BitOr => OpCode::BitOr,
    BinaryOp::BitXor => OpCode::BitXor,
    BinaryOp::Shl => OpCode::BitLShift,
    BinaryOp::Shr => OpCode::BitRShift,
    BinaryOp::UShr => OpCode::BitURShift,
  }
}

fn unary_opcode(op: UnaryOp) -> OpCode {
  match op {
    UnaryOp::Neg => OpCode::Neg,
    UnaryOp::Not => OpCode::Not,
    UnaryOp::BitNot => OpCode::BitNot,
    UnaryOp::Typeof => OpCode::Typeof,
    UnaryOp::PrefixInc | UnaryOp::PrefixDec => unreachable!("rewritten before reaching unary_opcode"),
  }
}

#[cfg(test)]
mod tests {
  use crate::disasm::disassemble;
  use pretty_assertions::assert_eq;

  fn ops(source: &str) -> Vec<String> {
    let chunk = crate::compile(source).expect("compiles");
    disassemble(&chunk)
      .lines()
      .map(|l| l.split_whitespace().nth(1).unwrap().to_string())
      .collect()
  }

  #[test]
  fn ternary_evaluates_all_three_branches_unconditionally() {
    let text = ops("a ? b : c;");
    assert_eq!(text, vec!["GET_VAR", "GET_VAR", "GET_VAR", "TERN", "POP"]);
  }

  #[test]
  fn postfix_increment_reads_then_rewrites_then_discards() {
    let text = ops("x++;");
    // read x, then (x += 1) rewritten inline, then POP the rewrite's value,
    // then POP the expression statement's own value.
    assert_eq!(text, vec!["GET_VAR", "GET_VAR", "PUSH_ONE", "ADD", "SET_VAR", "POP", "POP"]);
  }

  #[test]
  fn prefix_increment_has_no_separate_pre_read() {
    let text = ops("++x;");
    assert_eq!(text, vec!["GET_VAR", "PUSH_ONE", "ADD", "SET_VAR", "POP"]);
  }

  #[test]
  fn compound_assign_on_index_target_duplicates_object_and_index_once() {
    let text = ops("obj[i] += 1;");
    assert_eq!(
      text,
      vec![
        "GET_VAR", "GET_VAR", "PUSH_STACK", "PUSH_STACK", "GET_INDEX", "PUSH_ONE", "ADD", "SET_INDEX", "POP",
      ]
    );
  }

  #[test]
  fn assignment_to_declared_constant_is_an_error() {
    let err = crate::compile("const x = 1; x = 2;").unwrap_err();
    assert!(matches!(err, mildew_core::errors::CompileError::AssignmentToConstant { .. }));
  }

  #[test]
  fn strict_neq_lowers_to_strict_eq_then_not() {
    let text = ops("a !== b;");
    assert_eq!(text, vec!["GET_VAR", "GET_VAR", "STRICT_EQ", "NOT", "POP"]);
  }

  #[test]
  fn new_call_skips_this_and_receiver_duplication() {
    let text = ops("new F(1);");
    assert_eq!(text, vec!["GET_VAR", "PUSH_ONE", "NEW", "POP"]);
  }
}
