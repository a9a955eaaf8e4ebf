use mildew_core::ast::{
  ForOfHead, Literal, Stmt, StmtIdx, SwitchCase, TryCatchFinally, VarBinding, VarQualifier,
};
use mildew_core::errors::{CompileError, Result, SourcePos};
use mildew_core::tokens::TokenKind;

use crate::Parser;

impl Parser {
  pub(crate) fn parse_statement(&mut self) -> Result<StmtIdx> {
    match self.current_kind() {
      TokenKind::Var => self.parse_var_decl(VarQualifier::Var),
      TokenKind::Let => self.parse_var_decl(VarQualifier::Let),
      TokenKind::Const => self.parse_var_decl(VarQualifier::Const),
      TokenKind::LBrace => self.parse_block_stmt(),
      TokenKind::If => self.parse_if_stmt(),
      TokenKind::Switch => self.parse_switch_stmt(),
      TokenKind::While => self.parse_while_stmt(None),
      TokenKind::Do => self.parse_do_while_stmt(None),
      TokenKind::For => self.parse_for_stmt(None),
      TokenKind::Label => self.parse_labeled_stmt(),
      TokenKind::Break => self.parse_break_stmt(),
      TokenKind::Continue => self.parse_continue_stmt(),
      TokenKind::Return => self.parse_return_stmt(),
      TokenKind::Function => self.parse_func_decl(),
      TokenKind::Throw => self.parse_throw_stmt(),
      TokenKind::Try => self.parse_try_stmt(),
      TokenKind::Delete => self.parse_delete_stmt(),
      TokenKind::Class => self.parse_class_decl_stmt(),
      TokenKind::Semicolon => {
        // Empty statement.
        let line = self.pos().line;
        self.advance();
        Ok(self.push_stmt(Stmt::Block { body: Vec::new(), line }))
      }
      _ => self.parse_expr_stmt(),
    }
  }

  fn parse_var_decl(&mut self, qualifier: VarQualifier) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let mut bindings = Vec::new();
    loop {
      let pos = self.pos();
      let name = self.consume_identifier("binding name")?;
      let init = if self.match_tok(TokenKind::Assign) {
        Some(self.parse_expr()?)
      } else {
        None
      };
      bindings.push(VarBinding { name, init, pos });
      if !self.match_tok(TokenKind::Comma) {
        break;
      }
    }
    self.consume(TokenKind::Semicolon, "';' after variable declaration")?;
    Ok(self.push_stmt(Stmt::VarDecl { qualifier, bindings, line }))
  }

  pub(crate) fn parse_block_body(&mut self) -> Result<Vec<StmtIdx>> {
    let mut body = Vec::new();
    while !self.check(TokenKind::RBrace) && !self.is_at_end() {
      body.push(self.parse_statement()?);
    }
    self.consume(TokenKind::RBrace, "'}' to close block")?;
    Ok(body)
  }

  fn parse_block_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let body = self.parse_block_body()?;
    Ok(self.push_stmt(Stmt::Block { body, line }))
  }

  fn parse_if_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    self.consume(TokenKind::LParen, "'(' after 'if'")?;
    let cond = self.parse_expr()?;
    self.consume(TokenKind::RParen, "')' after if condition")?;
    let then_branch = self.parse_statement()?;
    let else_branch = if self.match_tok(TokenKind::Else) {
      Some(self.parse_statement()?)
    } else {
      None
    };
    Ok(self.push_stmt(Stmt::If {
      cond,
      then_branch,
      else_branch,
      line,
    }))
  }

  /// Precomputes the switch jump table at parse time: each `case K:` key
  /// must be a literal constant, recorded against the index of its target
  /// statement within the switch's flattened body.
  fn parse_switch_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    self.consume(TokenKind::LParen, "'(' after 'switch'")?;
    let discriminant = self.parse_expr()?;
    self.consume(TokenKind::RParen, "')' after switch discriminant")?;
    self.consume(TokenKind::LBrace, "'{' to start switch body")?;

    let mut cases = Vec::new();
    let mut default_stmt_index = None;
    let mut body = Vec::new();

    while !self.check(TokenKind::RBrace) && !self.is_at_end() {
      if self.match_tok(TokenKind::Case) {
        let key_pos = self.pos();
        let key = self.parse_literal_case_key(key_pos)?;
        self.consume(TokenKind::Colon, "':' after case key")?;
        let target_stmt_index = body.len();
        if cases.iter().any(|c: &SwitchCase| c.key == key) {
          return Err(CompileError::DuplicateCaseKey { pos: key_pos });
        }
        cases.push(SwitchCase { key, target_stmt_index });
      } else if self.match_tok(TokenKind::Default) {
        self.consume(TokenKind::Colon, "':' after 'default'")?;
        if default_stmt_index.is_some() {
          return Err(CompileError::UnexpectedToken {
            pos: self.pos(),
            expected: "at most one 'default' label".to_string(),
            found: "default".to_string(),
          });
        }
        default_stmt_index = Some(body.len());
      } else {
        body.push(self.parse_statement()?);
      }
    }
    self.consume(TokenKind::RBrace, "'}' to close switch body")?;

    Ok(self.push_stmt(Stmt::Switch {
      discriminant,
      cases,
      default_stmt_index,
      body,
      line,
    }))
  }

  fn parse_literal_case_key(&mut self, pos: SourcePos) -> Result<Literal> {
    let expr = self.parse_expr()?;
    match self.ast.expr(expr) {
      mildew_core::ast::Expr::Literal { value, .. } => Ok(value.clone()),
      _ => Err(CompileError::NonLiteralCaseKey { pos }),
    }
  }

  fn parse_labeled_stmt(&mut self) -> Result<StmtIdx> {
    let label = self.advance().lexeme.clone();
    match self.current_kind() {
      TokenKind::While => self.parse_while_stmt(Some(label)),
      TokenKind::Do => self.parse_do_while_stmt(Some(label)),
      TokenKind::For => self.parse_for_stmt(Some(label)),
      _ => Err(CompileError::UnexpectedToken {
        pos: self.pos(),
        expected: "a loop statement after label".to_string(),
        found: format!("{:?}", self.current_kind()),
      }),
    }
  }

  fn parse_while_stmt(&mut self, label: Option<String>) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    self.consume(TokenKind::LParen, "'(' after 'while'")?;
    let cond = self.parse_expr()?;
    self.consume(TokenKind::RParen, "')' after while condition")?;
    let body = self.parse_statement()?;
    Ok(self.push_stmt(Stmt::While { label, cond, body, line }))
  }

  fn parse_do_while_stmt(&mut self, label: Option<String>) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let body = self.parse_statement()?;
    self.consume(TokenKind::While, "'while' after 'do' body")?;
    self.consume(TokenKind::LParen, "'(' after 'while'")?;
    let cond = self.parse_expr()?;
    self.consume(TokenKind::RParen, "')' after do-while condition")?;
    self.consume(TokenKind::Semicolon, "';' after do-while statement")?;
    Ok(self.push_stmt(Stmt::DoWhile { label, cond, body, line }))
  }

  /// Dispatches between a classic C-style `for (init; cond; update)` and
  /// `for (qualifier v [, k] of|in expr)`, distinguished by whether an
  /// `of`/`in` keyword appears after the first binding.
  fn parse_for_stmt(&mut self, label: Option<String>) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    self.consume(TokenKind::LParen, "'(' after 'for'")?;

    if self.check_any(&[TokenKind::Var, TokenKind::Let, TokenKind::Const]) {
      if let Some(stmt) = self.try_parse_for_of_in(label.clone(), line)? {
        return Ok(stmt);
      }
    }

    let init = if self.match_tok(TokenKind::Semicolon) {
      None
    } else if self.check_any(&[TokenKind::Var, TokenKind::Let, TokenKind::Const]) {
      Some(self.parse_var_decl_for_init()?)
    } else {
      let expr = self.parse_expr()?;
      self.consume(TokenKind::Semicolon, "';' after for-init expression")?;
      Some(self.push_stmt(Stmt::Expr { expr, line }))
    };

    let cond = if self.check(TokenKind::Semicolon) {
      None
    } else {
      Some(self.parse_expr()?)
    };
    self.consume(TokenKind::Semicolon, "';' after for-condition")?;

    let update = if self.check(TokenKind::RParen) {
      None
    } else {
      Some(self.parse_expr()?)
    };
    self.consume(TokenKind::RParen, "')' after for-clauses")?;

    let body = self.parse_statement()?;
    Ok(self.push_stmt(Stmt::For {
      label,
      init,
      cond,
      update,
      body,
      line,
    }))
  }

  fn parse_var_decl_for_init(&mut self) -> Result<StmtIdx> {
    let qualifier = match self.current_kind() {
      TokenKind::Var => VarQualifier::Var,
      TokenKind::Let => VarQualifier::Let,
      TokenKind::Const => VarQualifier::Const,
      _ => unreachable!(),
    };
    let line = self.pos().line;
    self.advance();
    let pos = self.pos();
    let name = self.consume_identifier("binding name")?;
    let init = if self.match_tok(TokenKind::Assign) {
      Some(self.parse_expr()?)
    } else {
      None
    };
    self.consume(TokenKind::Semicolon, "';' after for-init declaration")?;
    Ok(self.push_stmt(Stmt::VarDecl {
      qualifier,
      bindings: vec![VarBinding { name, init, pos }],
      line,
    }))
  }

  /// Attempts to parse `qualifier v [, k] (of|in) expr)` starting right
  /// after `for (`. Returns `Ok(None)` (having consumed nothing beyond the
  /// qualifier/bindings it always needs for a classic for-loop too) only
  /// when no `of`/`in` keyword follows — callers fall back to classic
  /// for-parsing in that case. Since this grammar requires 1-2 token
  /// lookahead past the bindings to disambiguate, bindings already parsed
  /// here are reused instead of re-parsed on fallback.
  fn try_parse_for_of_in(&mut self, label: Option<String>, line: u32) -> Result<Option<StmtIdx>> {
    let checkpoint = self.current;
    let qualifier = match self.current_kind() {
      TokenKind::Var => VarQualifier::Var,
      TokenKind::Let => VarQualifier::Let,
      TokenKind::Const => VarQualifier::Const,
      _ => unreachable!(),
    };
    self.advance();
    let first = match self.consume_identifier("binding name") {
      Ok(name) => name,
      Err(_) => {
        self.current = checkpoint;
        return Ok(None);
      }
    };

    let (key_binding, value_binding) = if self.match_tok(TokenKind::Comma) {
      match self.consume_identifier("second binding name") {
        Ok(second) => (Some(first), second),
        Err(_) => {
          self.current = checkpoint;
          return Ok(None);
        }
      }
    } else {
      (None, first)
    };

    let is_of = if self.match_tok(TokenKind::Of) {
      true
    } else if self.match_tok(TokenKind::In) {
      false
    } else {
      self.current = checkpoint;
      return Ok(None);
    };

    let object = self.parse_expr()?;
    self.consume(TokenKind::RParen, "')' after for-of/in source expression")?;
    let body = self.parse_statement()?;
    Ok(Some(self.push_stmt(Stmt::ForOf {
      label,
      head: ForOfHead {
        key_binding,
        value_binding,
        qualifier,
        is_of,
        object,
      },
      body,
      line,
    })))
  }

  fn parse_break_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let label = self.parse_optional_label()?;
    self.consume(TokenKind::Semicolon, "';' after 'break'")?;
    Ok(self.push_stmt(Stmt::Break { label, line }))
  }

  fn parse_continue_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let label = self.parse_optional_label()?;
    self.consume(TokenKind::Semicolon, "';' after 'continue'")?;
    Ok(self.push_stmt(Stmt::Continue { label, line }))
  }

  fn parse_optional_label(&mut self) -> Result<Option<String>> {
    if self.check(TokenKind::Identifier) && !self.check(TokenKind::Semicolon) {
      // A break/continue label is a bare identifier on the same
      // statement, not a `Label` token (that form is reserved for the
      // identifier-colon prefix attached to the loop itself).
      Ok(Some(self.advance().lexeme.clone()))
    } else {
      Ok(None)
    }
  }

  fn parse_return_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let value = if self.check(TokenKind::Semicolon) {
      None
    } else {
      Some(self.parse_expr()?)
    };
    self.consume(TokenKind::Semicolon, "';' after 'return'")?;
    Ok(self.push_stmt(Stmt::Return { value, line }))
  }

  fn parse_func_decl(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let name = self.consume_identifier("function name")?;
    let params = self.parse_param_list()?;
    self.consume(TokenKind::LBrace, "'{' to start function body")?;
    let body = self.parse_block_body()?;
    Ok(self.push_stmt(Stmt::FuncDecl { name, params, body, line }))
  }

  fn parse_throw_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let value = self.parse_expr()?;
    self.consume(TokenKind::Semicolon, "';' after 'throw' value")?;
    Ok(self.push_stmt(Stmt::Throw { value, line }))
  }

  fn parse_try_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    self.consume(TokenKind::LBrace, "'{' to start try body")?;
    let try_body = self.parse_block_body()?;

    let mut catch_binding = None;
    let mut catch_body = None;
    if self.match_tok(TokenKind::Catch) {
      if self.match_tok(TokenKind::LParen) {
        catch_binding = Some(self.consume_identifier("catch binding name")?);
        self.consume(TokenKind::RParen, "')' after catch binding")?;
      }
      self.consume(TokenKind::LBrace, "'{' to start catch body")?;
      catch_body = Some(self.parse_block_body()?);
    }

    let mut finally_body = None;
    if self.match_tok(TokenKind::Finally) {
      self.consume(TokenKind::LBrace, "'{' to start finally body")?;
      finally_body = Some(self.parse_block_body()?);
    }

    if catch_body.is_none() && finally_body.is_none() {
      return Err(CompileError::UnexpectedToken {
        pos: self.pos(),
        expected: "'catch' or 'finally' after 'try' block".to_string(),
        found: format!("{:?}", self.current_kind()),
      });
    }

    Ok(self.push_stmt(Stmt::TryCatchFinally {
      inner: TryCatchFinally {
        try_body,
        catch_binding,
        catch_body,
        finally_body,
      },
      line,
    }))
  }

  fn parse_delete_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    self.advance();
    let target = self.parse_expr()?;
    self.consume(TokenKind::Semicolon, "';' after 'delete' target")?;
    if !matches!(
      self.ast.expr(target),
      mildew_core::ast::Expr::Member { .. } | mildew_core::ast::Expr::Index { .. }
    ) {
      return Err(CompileError::InvalidDeleteTarget {
        pos: self.ast.expr(target).pos(),
      });
    }
    Ok(self.push_stmt(Stmt::Delete { target, line }))
  }

  fn parse_class_decl_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    let class = self.parse_class_decl()?;
    Ok(self.push_stmt(Stmt::ClassDecl { class, line }))
  }

  fn parse_expr_stmt(&mut self) -> Result<StmtIdx> {
    let line = self.pos().line;
    let expr = self.parse_expr()?;
    self.consume(TokenKind::Semicolon, "';' after expression statement")?;
    Ok(self.push_stmt(Stmt::Expr { expr, line }))
  }
}

#[cfg(test)]
mod tests {
  use crate::parse;
  use mildew_core::ast::Stmt;
  use mildew_core::errors::CompileError;

  #[test]
  fn if_without_else_leaves_else_branch_none() {
    let (ast, body) = parse("if (a) b;").expect("parses");
    let Stmt::If { else_branch, .. } = ast.stmt(body[0]) else {
      panic!("expected an if statement")
    };
    assert!(else_branch.is_none());
  }

  #[test]
  fn switch_records_case_keys_and_at_most_one_default() {
    let (ast, body) = parse("switch (x) { case 1: a; case 2: b; default: c; }").expect("parses");
    let Stmt::Switch { cases, default_stmt_index, .. } = ast.stmt(body[0]) else {
      panic!("expected a switch statement")
    };
    assert_eq!(cases.len(), 2);
    assert_eq!(default_stmt_index, &Some(2));
  }

  #[test]
  fn duplicate_case_keys_are_rejected() {
    let err = parse("switch (x) { case 1: a; case 1: b; }").unwrap_err();
    assert!(matches!(err, CompileError::DuplicateCaseKey { .. }));
  }

  #[test]
  fn a_non_literal_case_key_is_rejected() {
    let err = parse("switch (x) { case y: a; }").unwrap_err();
    assert!(matches!(err, CompileError::NonLiteralCaseKey { .. }));
  }

  #[test]
  fn for_of_with_two_bindings_splits_key_and_value() {
    let (ast, body) = parse("for (let k, v of obj) { use(v); }").expect("parses");
    let Stmt::ForOf { head, .. } = ast.stmt(body[0]) else {
      panic!("expected a for-of statement")
    };
    assert_eq!(head.key_binding.as_deref(), Some("k"));
    assert_eq!(head.value_binding, "v");
    assert!(head.is_of);
  }

  #[test]
  fn for_in_is_distinguished_from_for_of() {
    let (ast, body) = parse("for (let v in obj) { use(v); }").expect("parses");
    let Stmt::ForOf { head, .. } = ast.stmt(body[0]) else {
      panic!("expected a for-of statement")
    };
    assert!(!head.is_of);
  }

  #[test]
  fn ambiguous_for_head_falls_back_to_a_classic_for_loop() {
    // `let i = 0` looks like the start of a for-of/in head until the
    // disambiguating lookahead fails to find `of`/`in`, so parsing must
    // rewind and retry as a classic three-clause for.
    let (ast, body) = parse("for (let i = 0; i < 10; i = i + 1) { use(i); }").expect("parses");
    assert!(matches!(ast.stmt(body[0]), Stmt::For { .. }));
  }

  #[test]
  fn labeled_loop_attaches_its_label() {
    let (ast, body) = parse("outer: while (true) { break outer; }").expect("parses");
    let Stmt::While { label, .. } = ast.stmt(body[0]) else {
      panic!("expected a while statement")
    };
    assert_eq!(label.as_deref(), Some("outer"));
  }

  #[test]
  fn a_label_on_a_non_loop_statement_is_rejected() {
    let err = parse("outer: let x = 1;").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }

  #[test]
  fn try_with_neither_catch_nor_finally_is_rejected() {
    let err = parse("try { risky(); }").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }

  #[test]
  fn catch_binding_is_optional() {
    let (ast, body) = parse("try { risky(); } catch { handle(); }").expect("parses");
    let Stmt::TryCatchFinally { inner, .. } = ast.stmt(body[0]) else {
      panic!("expected a try statement")
    };
    assert!(inner.catch_binding.is_none());
  }

  #[test]
  fn delete_requires_a_member_or_index_target() {
    let err = parse("delete x;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidDeleteTarget { .. }));
  }

  #[test]
  fn delete_accepts_a_member_target() {
    let (ast, body) = parse("delete obj.field;").expect("parses");
    assert!(matches!(ast.stmt(body[0]), Stmt::Delete { .. }));
  }
}
