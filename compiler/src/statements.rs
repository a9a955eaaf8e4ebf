use mildew_core::ast::{Stmt, StmtIdx, VarQualifier};
use mildew_core::bytecode::OpCode;
use mildew_core::errors::Result;

use crate::{literal_to_value, Compiler, PatchKind};

impl Compiler {
  pub(crate) fn compile_stmt(&mut self, idx: StmtIdx) -> Result<()> {
    let line = self.ast.stmt(idx).line();
    self.chunk().mark_statement(line);
    match self.ast.stmt(idx) {
      Stmt::VarDecl { .. } => self.compile_var_decl(idx),
      Stmt::Block { .. } => self.compile_block(idx),
      Stmt::If { .. } => self.compile_if(idx),
      Stmt::Switch { .. } => self.compile_switch(idx),
      Stmt::While { .. } => self.compile_while(idx),
      Stmt::DoWhile { .. } => self.compile_do_while(idx),
      Stmt::For { .. } => self.compile_for(idx),
      Stmt::ForOf { .. } => self.compile_for_of(idx),
      Stmt::Break { label, line } => {
        let (label, pos) = (label.clone(), mildew_core::errors::SourcePos::new(*line, 0));
        self.compile_break_or_continue(label.as_deref(), PatchKind::Break, pos)
      }
      Stmt::Continue { label, line } => {
        let (label, pos) = (label.clone(), mildew_core::errors::SourcePos::new(*line, 0));
        self.compile_break_or_continue(label.as_deref(), PatchKind::Continue, pos)
      }
      Stmt::Return { .. } => self.compile_return(idx),
      Stmt::Throw { .. } => self.compile_throw(idx),
      Stmt::TryCatchFinally { .. } => self.compile_try(idx),
      Stmt::Delete { .. } => self.compile_delete(idx),
      Stmt::FuncDecl { .. } => self.compile_func_decl(idx),
      Stmt::ClassDecl { .. } => self.compile_class_decl(idx),
      Stmt::Expr { .. } => self.compile_expr_stmt(idx),
    }
  }

  fn compile_var_decl(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::VarDecl { qualifier, bindings, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let qualifier = *qualifier;
    let bindings: Vec<(String, Option<mildew_core::ast::ExprIdx>, mildew_core::errors::SourcePos)> =
      bindings.iter().map(|b| (b.name.clone(), b.init, b.pos)).collect();

    for (name, init, pos) in bindings {
      match init {
        Some(e) => self.compile_expr(e)?,
        None => {
          self.chunk().push_op(OpCode::PushUndef);
        }
      }
      match qualifier {
        VarQualifier::Var => {
          let name_idx = self.intern_name(&name);
          self.chunk().push_op(OpCode::DeclareVar);
          self.chunk().push_u32(name_idx);
        }
        VarQualifier::Let => {
          self.declare_binding(&name, true, false, pos)?;
          let name_idx = self.intern_name(&name);
          self.chunk().push_op(OpCode::DeclLexical);
          self.chunk().push_u32(name_idx);
        }
        VarQualifier::Const => {
          self.declare_binding(&name, true, true, pos)?;
          let name_idx = self.intern_name(&name);
          self.chunk().push_op(OpCode::DeclConst);
          self.chunk().push_u32(name_idx);
        }
      }
    }
    Ok(())
  }

  /// Whether `body`'s direct statements (not descending into nested blocks
  /// or function literals) declare at least one lexical/constant binding —
  /// a block with none needs no runtime `OPEN_SCOPE`/`CLOSE_SCOPE` pair,
  /// since nothing will occupy a fresh stack slot.
  fn block_declares_lexical(&self, body: &[StmtIdx]) -> bool {
    body.iter().any(|&s| {
      matches!(
        self.ast.stmt(s),
        Stmt::VarDecl { qualifier, .. } if *qualifier != VarQualifier::Var
      )
    })
  }

  fn compile_block(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::Block { body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let body = body.clone();
    self.compile_stmt_list_scoped(&body)
  }

  fn compile_stmt_list_scoped(&mut self, body: &[StmtIdx]) -> Result<()> {
    let needs_scope = self.block_declares_lexical(body);
    if needs_scope {
      self.open_scope();
    }
    for &s in body {
      self.compile_stmt(s)?;
    }
    if needs_scope {
      self.close_scope();
    }
    Ok(())
  }

  fn compile_if(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::If { cond, then_branch, else_branch, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let (cond, then_branch, else_branch) = (*cond, *then_branch, *else_branch);
    self.compile_expr(cond)?;
    let exit_false = self.chunk().emit_placeholder_jump(OpCode::JmpFalse);
    self.compile_stmt(then_branch)?;
    match else_branch {
      Some(else_branch) => {
        let exit_end = self.chunk().emit_placeholder_jump(OpCode::Jmp);
        self.patch_jump_traced(exit_false);
        self.compile_stmt(else_branch)?;
        self.patch_jump_traced(exit_end);
      }
      None => {
        self.patch_jump_traced(exit_false);
      }
    }
    Ok(())
  }

  fn compile_switch(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::Switch { discriminant, cases, default_stmt_index, body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let discriminant = *discriminant;
    let default_stmt_index = *default_stmt_index;
    let cases: Vec<(mildew_core::ast::Literal, usize)> =
      cases.iter().map(|c| (c.key.clone(), c.target_stmt_index)).collect();
    let body = body.clone();

    let mut case_patches: Vec<(usize, u32)> = Vec::with_capacity(cases.len());
    for (key, target_stmt_index) in &cases {
      let key_idx = self.chunk().add_constant(literal_to_value(key));
      let placeholder_idx = self
        .chunk()
        .push_placeholder_constant(mildew_core::values::Value::Int(mildew_core::chunk::UNPATCHED_JMP as i64));
      self.chunk().push_op(OpCode::Const);
      self.chunk().push_u32(key_idx);
      self.chunk().push_op(OpCode::Const);
      self.chunk().push_u32(placeholder_idx);
      self.chunk().push_op(OpCode::Array);
      self.chunk().push_u32(2);
      case_patches.push((*target_stmt_index, placeholder_idx));
    }
    self.chunk().push_op(OpCode::Array);
    self.chunk().push_u32(cases.len() as u32);

    self.compile_expr(discriminant)?;
    let default_handle = self.chunk().emit_placeholder_jump(OpCode::Switch);

    let level = self.enter_switch();
    for (i, &stmt) in body.iter().enumerate() {
      self.patch_case_targets_at(&case_patches, i);
      if default_stmt_index == Some(i) {
        let offset = self.chunk().len();
        self.patch_absolute_traced(default_handle, offset);
      }
      self.compile_stmt(stmt)?;
    }
    self.patch_case_targets_at(&case_patches, body.len());
    if default_stmt_index.is_none() || default_stmt_index == Some(body.len()) {
      let offset = self.chunk().len();
      self.patch_absolute_traced(default_handle, offset);
    }

    let break_target = self.chunk().len();
    self.exit_switch(level, break_target);
    Ok(())
  }

  fn patch_case_targets_at(&mut self, case_patches: &[(usize, u32)], i: usize) {
    let offset = self.chunk().len();
    for &(target_idx, const_idx) in case_patches {
      if target_idx == i {
        self.chunk().patch_constant(const_idx, mildew_core::values::Value::Int(offset as i64));
      }
    }
  }

  fn compile_while(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::While { label, cond, body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let (label, cond, body) = (label.clone(), *cond, *body);

    let level = self.enter_loop(label.as_deref());
    let loop_start = self.chunk().len();
    self.compile_expr(cond)?;
    let exit_handle = self.chunk().emit_placeholder_jump(OpCode::JmpFalse);
    self.compile_stmt(body)?;
    self.emit_jump_to(OpCode::Jmp, loop_start);
    self.patch_jump_traced(exit_handle);
    let break_target = self.chunk().len();
    self.exit_loop(label.as_deref(), level, loop_start, break_target);
    Ok(())
  }

  fn compile_do_while(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::DoWhile { label, cond, body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let (label, cond, body) = (label.clone(), *cond, *body);

    let level = self.enter_loop(label.as_deref());
    let body_start = self.chunk().len();
    self.compile_stmt(body)?;
    let cond_start = self.chunk().len();
    self.compile_expr(cond)?;
    let exit_handle = self.chunk().emit_placeholder_jump(OpCode::JmpFalse);
    self.emit_jump_to(OpCode::Jmp, body_start);
    self.patch_jump_traced(exit_handle);
    let break_target = self.chunk().len();
    self.exit_loop(label.as_deref(), level, cond_start, break_target);
    Ok(())
  }

  fn compile_for(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::For { label, init, cond, update, body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let (label, init, cond, update, body) = (label.clone(), *init, *cond, *update, *body);

    let init_needs_scope = matches!(
      init.map(|i| self.ast.stmt(i)),
      Some(Stmt::VarDecl { qualifier, .. }) if *qualifier != VarQualifier::Var
    );
    if init_needs_scope {
      self.open_scope();
    }
    if let Some(init) = init {
      self.compile_stmt(init)?;
    }

    let level = self.enter_loop(label.as_deref());
    let cond_start = self.chunk().len();
    let exit_handle = if let Some(cond) = cond {
      self.compile_expr(cond)?;
      Some(self.chunk().emit_placeholder_jump(OpCode::JmpFalse))
    } else {
      None
    };
    self.compile_stmt(body)?;
    let update_start = self.chunk().len();
    if let Some(update) = update {
      self.compile_expr(update)?;
      self.chunk().push_op(OpCode::Pop);
    }
    self.emit_jump_to(OpCode::Jmp, cond_start);
    if let Some(h) = exit_handle {
      self.patch_jump_traced(h);
    }
    let break_target = self.chunk().len();
    self.exit_loop(label.as_deref(), level, update_start, break_target);

    if init_needs_scope {
      self.close_scope();
    }
    Ok(())
  }

  fn compile_for_of(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::ForOf { label, head, body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let label = label.clone();
    let key_binding = head.key_binding.clone();
    let value_binding = head.value_binding.clone();
    let qualifier = head.qualifier;
    let object = head.object;
    let body = *body;

    self.compile_expr(object)?;
    self.chunk().push_op(OpCode::Iter);

    let level = self.enter_loop(label.as_deref());
    let loop_start = self.chunk().len();
    // result = iter.next(): duplicate the persistent iterator twice (once as
    // the call's receiver, once to look `next` up on), leaving the
    // iterator itself untouched at the bottom of this iteration's frame so
    // the next lap can call it again. Stack: [iter] -> [iter, result].
    self.chunk().push_op(OpCode::PushStack);
    self.chunk().push_i32(-1);
    self.chunk().push_op(OpCode::PushStack);
    self.chunk().push_i32(-1);
    let next_key = self.intern_name("next");
    self.chunk().push_op(OpCode::Const);
    self.chunk().push_u32(next_key);
    self.chunk().push_op(OpCode::GetIndex);
    self.chunk().push_op(OpCode::Call);
    self.chunk().push_u32(0);

    // Stack: [iter, result]. Read `result.done` without losing `result`.
    self.chunk().push_op(OpCode::PushStack);
    self.chunk().push_i32(-1);
    let done_key = self.intern_name("done");
    self.chunk().push_op(OpCode::Const);
    self.chunk().push_u32(done_key);
    self.chunk().push_op(OpCode::GetIndex);
    let exit_handle = self.chunk().emit_placeholder_jump(OpCode::JmpFalse);
    // JMP_FALSE consumed `done`; stack is back to [iter, result] on both
    // the fallthrough (done was false) and, on exit, at the patched target.

    let is_lexical = qualifier != VarQualifier::Var;
    self.open_scope();

    if let Some(key_name) = &key_binding {
      self.chunk().push_op(OpCode::PushStack);
      self.chunk().push_i32(-1);
      let key_key = self.intern_name("key");
      self.chunk().push_op(OpCode::Const);
      self.chunk().push_u32(key_key);
      self.chunk().push_op(OpCode::GetIndex);
      if is_lexical {
        self.declare_binding(key_name, true, false, mildew_core::errors::SourcePos::default())?;
        let idx = self.intern_name(key_name);
        self.chunk().push_op(OpCode::DeclLexical);
        self.chunk().push_u32(idx);
      } else {
        let idx = self.intern_name(key_name);
        self.chunk().push_op(OpCode::DeclareVar);
        self.chunk().push_u32(idx);
      }
    }

    // `result` sits two slots down when the key binding's value was kept on
    // the stack (lexical), or still one down if `var` popped it away.
    let value_offset: i32 = if key_binding.is_some() && is_lexical { -2 } else { -1 };
    self.chunk().push_op(OpCode::PushStack);
    self.chunk().push_i32(value_offset);
    let value_key = self.intern_name("value");
    self.chunk().push_op(OpCode::Const);
    self.chunk().push_u32(value_key);
    self.chunk().push_op(OpCode::GetIndex);
    if is_lexical {
      self.declare_binding(&value_binding, true, false, mildew_core::errors::SourcePos::default())?;
      let idx = self.intern_name(&value_binding);
      self.chunk().push_op(OpCode::DeclLexical);
      self.chunk().push_u32(idx);
    } else {
      let idx = self.intern_name(&value_binding);
      self.chunk().push_op(OpCode::DeclareVar);
      self.chunk().push_u32(idx);
    }

    self.compile_stmt(body)?;
    self.close_scope();
    // Drop this lap's `result` before looping back, so every lap starts
    // from the same [iter] shape the first one did.
    self.chunk().push_op(OpCode::Pop);
    self.emit_jump_to(OpCode::Jmp, loop_start);
    self.patch_jump_traced(exit_handle);

    let break_target = self.chunk().len();
    self.exit_loop(label.as_deref(), level, loop_start, break_target);

    self.chunk().push_op(OpCode::PopN);
    self.chunk().push_u32(2);
    Ok(())
  }

  fn compile_return(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::Return { value, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    match *value {
      Some(e) => self.compile_expr(e)?,
      None => {
        self.chunk().push_op(OpCode::PushUndef);
      }
    }
    self.chunk().push_op(OpCode::Return);
    Ok(())
  }

  fn compile_throw(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::Throw { value, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let value = *value;
    self.compile_expr(value)?;
    self.chunk().push_op(OpCode::Throw);
    Ok(())
  }

  fn compile_try(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::TryCatchFinally { inner, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let try_body = inner.try_body.clone();
    let catch_binding = inner.catch_binding.clone();
    let catch_body = inner.catch_body.clone();
    let finally_body = inner.finally_body.clone();

    let catch_handle = self.chunk().emit_placeholder_jump(OpCode::Try);
    for &s in &try_body {
      self.compile_stmt(s)?;
    }
    self.chunk().push_op(OpCode::EndTry);
    let over_catch = self.chunk().emit_placeholder_jump(OpCode::Jmp);
    self.patch_absolute_here_traced(catch_handle);

    if let Some(catch_body) = &catch_body {
      self.open_scope();
      self.chunk().push_op(OpCode::LoadException);
      match &catch_binding {
        Some(name) => {
          self.declare_binding(name, true, false, mildew_core::errors::SourcePos::default())?;
          let idx = self.intern_name(name);
          self.chunk().push_op(OpCode::DeclLexical);
          self.chunk().push_u32(idx);
        }
        None => {
          self.chunk().push_op(OpCode::Pop);
        }
      }
      for &s in catch_body {
        self.compile_stmt(s)?;
      }
      self.close_scope();
    } else {
      self.chunk().push_op(OpCode::LoadException);
      self.chunk().push_op(OpCode::Pop);
    }
    self.patch_jump_traced(over_catch);

    if let Some(finally_body) = &finally_body {
      for &s in finally_body {
        self.compile_stmt(s)?;
      }
    }
    if catch_body.is_none() && finally_body.is_some() {
      self.chunk().push_op(OpCode::Rethrow);
    }
    Ok(())
  }

  fn compile_delete(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::Delete { target, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let target = *target;
    self.compile_expr(target)?;
    self.chunk().push_op(OpCode::Delete);
    Ok(())
  }

  /// Function declarations are always late-bound, regardless of any
  /// enclosing qualifier context — grouped with `var` in the binding model.
  fn compile_func_decl(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::FuncDecl { name, params, body, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let (name, params, body) = (name.clone(), params.clone(), body.clone());
    let chunk = self.compile_function_body(&params, &body)?;
    let mut func = mildew_core::values::FuncObj::new(Some(name.clone()), params, chunk);
    func.is_class_member = false;
    let func_idx = self.intern_func(func);
    self.chunk().push_op(OpCode::Const);
    self.chunk().push_u32(func_idx);
    let name_idx = self.intern_name(&name);
    self.chunk().push_op(OpCode::DeclareVar);
    self.chunk().push_u32(name_idx);
    Ok(())
  }

  /// A class declaration binds its name the same way a function declaration
  /// does: late-bound, regardless of nesting depth. The name is sugar for
  /// "declare a binding initialized from a class literal", not a `let`.
  fn compile_class_decl(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::ClassDecl { class, line } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let (class, line) = (*class, *line);
    let name = self.ast.class(class).name.clone();
    let pos = mildew_core::errors::SourcePos::new(line, 0);
    self.emit_class_literal(class, pos)?;
    let name_idx = self.intern_name(&name);
    self.chunk().push_op(OpCode::DeclareVar);
    self.chunk().push_u32(name_idx);
    Ok(())
  }

  fn compile_expr_stmt(&mut self, idx: StmtIdx) -> Result<()> {
    let Stmt::Expr { expr, .. } = self.ast.stmt(idx) else {
      unreachable!()
    };
    let expr = *expr;
    self.compile_expr(expr)?;
    self.chunk().push_op(OpCode::Pop);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use crate::disasm::disassemble;
  use mildew_core::errors::CompileError;
  use pretty_assertions::assert_eq;

  fn ops(source: &str) -> Vec<String> {
    let chunk = crate::compile(source).expect("compiles");
    disassemble(&chunk)
      .lines()
      .map(|l| l.split_whitespace().nth(1).unwrap().to_string())
      .collect()
  }

  #[test]
  fn switch_builds_case_table_before_discriminant() {
    let text = ops("switch (x) { case 1: a; break; case 2: b; break; default: c; }");
    // per-case: CONST key, CONST placeholder, ARRAY 2 -- twice, then the
    // packing ARRAY, then the discriminant read, then SWITCH.
    assert_eq!(
      text,
      vec![
        "CONST", "CONST", "ARRAY", "CONST", "CONST", "ARRAY", "ARRAY", "GET_VAR", "SWITCH", "GET_VAR", "POP",
        "GOTO", "GET_VAR", "POP", "GOTO", "GET_VAR", "POP",
      ]
    );
  }

  #[test]
  fn unlabeled_continue_inside_switch_bubbles_to_enclosing_loop() {
    // the switch's own exit only ever resolves BREAK; this only compiles at
    // all if continue correctly skips the switch and attaches to the while.
    let chunk = crate::compile("while (cond) { switch (x) { case 1: continue; } }").expect("compiles");
    let text = disassemble(&chunk);
    assert_eq!(text.matches("GOTO").count(), 1);
  }

  #[test]
  fn continue_with_no_enclosing_loop_is_unresolved() {
    let err = crate::compile("switch (x) { case 1: continue; }").unwrap_err();
    assert!(matches!(err, CompileError::UnresolvedBreakOrContinue { kw: "continue", .. }));
  }

  #[test]
  fn labeled_break_to_unknown_label_is_a_compile_error() {
    let err = crate::compile("while (a) { break missing; }").unwrap_err();
    assert!(matches!(err, CompileError::UnknownLabel { kw: "break", .. }));
  }

  #[test]
  fn redeclaring_lexical_in_same_scope_errors() {
    let err = crate::compile("let x = 1; let x = 2;").unwrap_err();
    assert!(matches!(err, CompileError::RedeclaredLexicalBinding { .. }));
  }

  #[test]
  fn var_may_shadow_outer_lexical_without_erroring() {
    crate::compile("let x = 1; { var x = 2; }").expect("var redeclaring outer lexical is allowed");
  }

  #[test]
  fn block_without_declarations_emits_no_scope_opcodes() {
    let text = ops("{ a; b; }");
    assert!(!text.contains("OPEN_SCOPE"));
    assert!(!text.contains("CLOSE_SCOPE"));
  }

  #[test]
  fn block_with_lexical_declaration_is_scoped() {
    let text = ops("{ let a = 5; }");
    assert_eq!(text, vec!["OPEN_SCOPE", "CONST", "DECL_LEXICAL", "CLOSE_SCOPE"]);
  }

  #[test]
  fn for_of_drives_next_and_pops_iterator_pair_on_exit() {
    let text = ops("for (let v of xs) { use(v); }");
    assert_eq!(
      text,
      vec![
        "GET_VAR", "ITER", "PUSH_STACK", "PUSH_STACK", "CONST", "GET_INDEX", "CALL", "PUSH_STACK", "CONST",
        "GET_INDEX", "JMP_FALSE", "OPEN_SCOPE", "PUSH_STACK", "CONST", "GET_INDEX", "DECL_LEXICAL", "THIS",
        "GET_VAR", "PUSH_STACK", "CALL", "POP", "CLOSE_SCOPE", "POP", "JMP", "POP_N",
      ]
    );
  }

  #[test]
  fn try_catch_finally_emits_end_try_and_patched_jump_over_catch() {
    let mnemonics = ops("try { risky(); } catch (e) { handle(e); } finally { cleanup(); }");
    assert_eq!(mnemonics.first().map(String::as_str), Some("TRY"));
    assert!(mnemonics.contains(&"END_TRY".to_string()));
    assert!(mnemonics.contains(&"LOAD_EXCEPTION".to_string()));
    assert!(mnemonics.contains(&"DECL_LEXICAL".to_string()));
    assert!(!mnemonics.contains(&"RETHROW".to_string()));
  }

  #[test]
  fn finally_only_rethrows_when_no_catch_clause() {
    let mnemonics = ops("try { risky(); } finally { cleanup(); }");
    assert!(mnemonics.contains(&"RETHROW".to_string()));
  }
}
