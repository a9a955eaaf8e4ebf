use mildew_core::ast::{ClassDef, ClassMethod, Expr};
use mildew_core::errors::{CompileError, Result};
use mildew_core::tokens::TokenKind;

use crate::Parser;
use mildew_core::ast::ClassIdx;

impl Parser {
  /// Parses `class Name [extends Base] { members }`, producing a
  /// [`ClassDef`]. The base-class expression (if any) is pushed onto
  /// `base_class_stack` before the body is parsed so `super(...)` is
  /// legal to parse inside the constructor, and popped on exit.
  pub(crate) fn parse_class_decl(&mut self) -> Result<ClassIdx> {
    self.consume(TokenKind::Class, "'class' keyword")?;
    let name = self.consume_identifier("class name")?;
    self.parse_class_body(name)
  }

  pub(crate) fn parse_class_body(&mut self, name: String) -> Result<ClassIdx> {
    let extends_pos = self.pos();
    let extends = if self.match_tok(TokenKind::Extends) {
      Some(self.parse_expr()?)
    } else {
      None
    };

    self.base_class_stack.push(extends.is_some());
    let result = self.parse_class_members(name, extends, extends_pos);
    self.base_class_stack.pop();
    result
  }

  fn parse_class_members(
    &mut self,
    name: String,
    extends: Option<mildew_core::ast::ExprIdx>,
    extends_pos: mildew_core::errors::SourcePos,
  ) -> Result<ClassIdx> {
    self.consume(TokenKind::LBrace, "'{' to start class body")?;

    let mut constructor = None;
    let mut methods = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();
    let mut statics = Vec::new();

    while !self.check(TokenKind::RBrace) && !self.is_at_end() {
      let is_static = self.check_contextual_keyword("static");
      if is_static {
        self.advance();
        let member = self.parse_class_method()?;
        if member.name == "constructor" {
          return Err(CompileError::UnexpectedToken {
            pos: self.pos(),
            expected: "non-'constructor' static method name".to_string(),
            found: "constructor".to_string(),
          });
        }
        statics.push(member);
        continue;
      }

      let is_get = self.check_contextual_keyword("get");
      let is_set = self.check_contextual_keyword("set");
      if is_get {
        self.advance();
        getters.push(self.parse_class_method()?);
        continue;
      }
      if is_set {
        self.advance();
        setters.push(self.parse_class_method()?);
        continue;
      }

      let member = self.parse_class_method()?;
      if member.name == "constructor" {
        if constructor.is_some() {
          return Err(CompileError::UnexpectedToken {
            pos: self.pos(),
            expected: "at most one 'constructor'".to_string(),
            found: "constructor".to_string(),
          });
        }
        constructor = Some(member.func);
      } else {
        methods.push(member);
      }
    }

    self.consume(TokenKind::RBrace, "'}' to close class body")?;

    let constructor = match constructor {
      Some(ctor) => ctor,
      None => self.synthesize_empty_constructor(extends, extends_pos)?,
    };

    if extends.is_some() {
      self.assert_exactly_one_super_call(constructor, extends_pos)?;
    }

    for (group, kind) in [
      (&methods, "methods"),
      (&getters, "getters"),
      (&setters, "setters"),
      (&statics, "statics"),
    ] {
      if group.len() > 255 {
        return Err(CompileError::ClassMemberCountOverflow {
          pos: extends_pos,
          kind,
        });
      }
    }

    Ok(self.push_class(ClassDef {
      name,
      constructor,
      methods,
      getters,
      setters,
      statics,
      extends,
    }))
  }

  fn check_contextual_keyword(&self, word: &str) -> bool {
    self.check(TokenKind::Identifier)
      && self.current_tok().lexeme == word
      && matches!(self.peek_kind_at(1), TokenKind::Identifier)
  }

  fn peek_kind_at(&self, offset: usize) -> TokenKind {
    self.tokens.get(self.current + offset).map(|t| t.kind).unwrap_or(TokenKind::Eof)
  }

  fn parse_class_method(&mut self) -> Result<ClassMethod> {
    let name = self.consume_identifier("method name")?;
    let func = self.parse_method_literal()?;
    Ok(ClassMethod { name, func })
  }

  /// Parses a method body sharing the shape of a function literal
  /// (`(params) { body }`) but without the leading `function` keyword,
  /// since class members are written `name(params) { ... }`.
  fn parse_method_literal(&mut self) -> Result<mildew_core::ast::ExprIdx> {
    let pos = self.pos();
    let params = self.parse_param_list()?;
    self.consume(TokenKind::LBrace, "'{' to start method body")?;
    let body = self.parse_block_body()?;
    Ok(self.push_expr(Expr::FuncLiteral {
      name: None,
      params,
      body,
      is_class_member: true,
      pos,
    }))
  }

  fn synthesize_empty_constructor(
    &mut self,
    extends: Option<mildew_core::ast::ExprIdx>,
    pos: mildew_core::errors::SourcePos,
  ) -> Result<mildew_core::ast::ExprIdx> {
    let body = if let Some(base) = extends {
      let super_call = self.push_expr(Expr::Super { pos });
      let call = self.push_expr(Expr::Call {
        callee: super_call,
        args: Vec::new(),
        is_new: false,
        pos,
      });
      let _ = base;
      vec![self.push_stmt(mildew_core::ast::Stmt::Expr { expr: call, line: pos.line })]
    } else {
      Vec::new()
    };
    Ok(self.push_expr(Expr::FuncLiteral {
      name: None,
      params: Vec::new(),
      body,
      is_class_member: true,
      pos,
    }))
  }

  /// Walks the constructor body's top-level statements counting
  /// `super(...)` call expressions; nested function/class bodies are not
  /// descended into, since `super` there would refer to a different
  /// enclosing class (itself a separate compile error, caught when that
  /// nested body is parsed).
  fn assert_exactly_one_super_call(
    &self,
    constructor: mildew_core::ast::ExprIdx,
    pos: mildew_core::errors::SourcePos,
  ) -> Result<()> {
    let Expr::FuncLiteral { body, .. } = self.ast.expr(constructor) else {
      return Ok(());
    };
    let mut count = 0u32;
    for &stmt_idx in body {
      self.count_super_calls_in_stmt(stmt_idx, &mut count);
    }
    if count != 1 {
      return Err(CompileError::SuperCallArity { pos, count });
    }
    Ok(())
  }

  fn count_super_calls_in_stmt(&self, stmt_idx: mildew_core::ast::StmtIdx, count: &mut u32) {
    use mildew_core::ast::Stmt;
    match self.ast.stmt(stmt_idx) {
      Stmt::Expr { expr, .. } => self.count_super_calls_in_expr(*expr, count),
      Stmt::Block { body, .. } => {
        for &s in body {
          self.count_super_calls_in_stmt(s, count);
        }
      }
      Stmt::If { then_branch, else_branch, .. } => {
        self.count_super_calls_in_stmt(*then_branch, count);
        if let Some(e) = else_branch {
          self.count_super_calls_in_stmt(*e, count);
        }
      }
      Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::For { body, .. } | Stmt::ForOf { body, .. } => {
        self.count_super_calls_in_stmt(*body, count);
      }
      Stmt::Switch { body, .. } => {
        for &s in body {
          self.count_super_calls_in_stmt(s, count);
        }
      }
      Stmt::TryCatchFinally { inner, .. } => {
        for &s in &inner.try_body {
          self.count_super_calls_in_stmt(s, count);
        }
        if let Some(catch_body) = &inner.catch_body {
          for &s in catch_body {
            self.count_super_calls_in_stmt(s, count);
          }
        }
        if let Some(finally_body) = &inner.finally_body {
          for &s in finally_body {
            self.count_super_calls_in_stmt(s, count);
          }
        }
      }
      _ => {}
    }
  }

  fn count_super_calls_in_expr(&self, expr_idx: mildew_core::ast::ExprIdx, count: &mut u32) {
    if let Expr::Call { callee, .. } = self.ast.expr(expr_idx) {
      if matches!(self.ast.expr(*callee), Expr::Super { .. }) {
        *count += 1;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::parse;
  use mildew_core::ast::Stmt;
  use mildew_core::errors::CompileError;

  #[test]
  fn class_without_a_constructor_gets_a_synthesized_one() {
    let (ast, body) = parse("class A { m() { return 1; } }").expect("parses");
    let Stmt::ClassDecl { class, .. } = ast.stmt(body[0]) else {
      panic!("expected a class declaration")
    };
    let class = ast.class(*class);
    assert_eq!(class.methods.len(), 1);
  }

  #[test]
  fn derived_class_requires_exactly_one_super_call() {
    let err = parse("class A extends B { constructor() {} }").unwrap_err();
    assert!(matches!(err, CompileError::SuperCallArity { count: 0, .. }));
  }

  #[test]
  fn derived_class_with_two_super_calls_is_rejected() {
    let source = "class A extends B { constructor() { super(); super(); } }";
    let err = parse(source).unwrap_err();
    assert!(matches!(err, CompileError::SuperCallArity { count: 2, .. }));
  }

  #[test]
  fn derived_class_with_no_explicit_constructor_gets_one_synthesized_super_call() {
    let (ast, body) = parse("class A extends B { m() { return 1; } }").expect("parses");
    let Stmt::ClassDecl { class, .. } = ast.stmt(body[0]) else {
      panic!("expected a class declaration")
    };
    assert!(ast.class(*class).extends.is_some());
  }

  #[test]
  fn a_second_constructor_is_rejected() {
    let err = parse("class A { constructor() {} constructor() {} }").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }

  #[test]
  fn static_constructor_is_rejected() {
    let err = parse("class A { static constructor() {} }").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }

  #[test]
  fn getters_setters_and_statics_sort_into_distinct_groups() {
    let source = "class A { get x() { return 1; } set x(v) {} static y() {} m() {} }";
    let (ast, body) = parse(source).expect("parses");
    let Stmt::ClassDecl { class, .. } = ast.stmt(body[0]) else {
      panic!("expected a class declaration")
    };
    let class = ast.class(*class);
    assert_eq!(class.getters.len(), 1);
    assert_eq!(class.setters.len(), 1);
    assert_eq!(class.statics.len(), 1);
    assert_eq!(class.methods.len(), 1);
  }

  #[test]
  fn class_expression_parses_with_no_name_requirement() {
    let (ast, body) = parse("let C = class { m() { return 1; } };").expect("parses");
    let Stmt::VarDecl { bindings, .. } = ast.stmt(body[0]) else {
      panic!("expected a var declaration")
    };
    let init = bindings[0].init.expect("has an initializer");
    assert!(matches!(ast.expr(init), mildew_core::ast::Expr::ClassLiteral { .. }));
  }
}
