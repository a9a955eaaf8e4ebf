mod classes;
mod expressions;
mod statements;

use mildew_core::ast::{AstArena, ClassIdx, ExprIdx, StmtIdx};
use mildew_core::errors::{CompileError, Result, SourcePos};
use mildew_core::tokens::{Token, TokenKind};

/// Parses a complete source string into an AST arena plus the top-level
/// statement list. Recursive-descent for statements, precedence climbing
/// for expressions, matching `SPEC_FULL.md` Section 4.2.
pub fn parse(source: &str) -> Result<(AstArena, Vec<StmtIdx>)> {
  let (ast, body, mut errors) = parse_all(source)?;
  match errors.drain(..).next() {
    Some(first) => Err(first),
    None => Ok((ast, body)),
  }
}

/// Like [`parse`], but surfaces every structural error the parser's
/// panic-mode recovery collected, not just the first. Still fails fast on
/// a lex error (there is no recovery below the token stream). A host that
/// wants to report several syntax errors from one pass reads the third
/// element instead of only the first one `parse` would otherwise return.
pub fn parse_all(source: &str) -> Result<(AstArena, Vec<StmtIdx>, Vec<CompileError>)> {
  let tokens = mildew_lexer::tokenize(source)?;
  let mut parser = Parser::new(tokens);
  let body = parser.parse_program();
  Ok((parser.ast, body, parser.errors))
}

pub(crate) struct Parser {
  tokens: Vec<Token>,
  current: usize,
  ast: AstArena,
  errors: Vec<CompileError>,
  /// `true` at depth `n` means the class body currently being parsed at
  /// nesting depth `n` has a base class, so `super(...)` is legal there.
  base_class_stack: Vec<bool>,
}

impl Parser {
  fn new(tokens: Vec<Token>) -> Self {
    Self {
      tokens,
      current: 0,
      ast: AstArena::new(),
      errors: Vec::new(),
      base_class_stack: Vec::new(),
    }
  }

  fn parse_program(&mut self) -> Vec<StmtIdx> {
    let mut body = Vec::new();
    while !self.is_at_end() {
      match self.parse_statement() {
        Ok(stmt) => body.push(stmt),
        Err(e) => {
          self.errors.push(e);
          self.synchronize();
        }
      }
    }
    body
  }

  // --- token stream primitives ---

  fn current_tok(&self) -> &Token {
    &self.tokens[self.current]
  }

  fn current_kind(&self) -> TokenKind {
    self.current_tok().kind
  }

  fn prev_tok(&self) -> &Token {
    &self.tokens[self.current - 1]
  }

  fn pos(&self) -> SourcePos {
    self.current_tok().pos
  }

  fn is_at_end(&self) -> bool {
    self.current_kind() == TokenKind::Eof
  }

  fn advance(&mut self) -> &Token {
    if !self.is_at_end() {
      self.current += 1;
    }
    self.prev_tok()
  }

  fn check(&self, kind: TokenKind) -> bool {
    self.current_kind() == kind
  }

  fn check_any(&self, kinds: &[TokenKind]) -> bool {
    kinds.contains(&self.current_kind())
  }

  fn match_tok(&mut self, kind: TokenKind) -> bool {
    if self.check(kind) {
      self.advance();
      true
    } else {
      false
    }
  }

  fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<&Token> {
    if self.check(kind) {
      Ok(self.advance())
    } else {
      let found = format!("{:?}", self.current_kind());
      Err(CompileError::UnexpectedToken {
        pos: self.pos(),
        expected: expected.to_string(),
        found,
      })
    }
  }

  fn consume_identifier(&mut self, expected: &str) -> Result<String> {
    self.consume(TokenKind::Identifier, expected).map(|t| t.lexeme.clone())
  }

  /// Recovers from a parse error by skipping to the next statement
  /// boundary (`;`, or a token that starts a new statement).
  fn synchronize(&mut self) {
    self.advance();
    while !self.is_at_end() {
      if self.prev_tok().kind == TokenKind::Semicolon {
        return;
      }
      if self.check_any(&[
        TokenKind::Var,
        TokenKind::Let,
        TokenKind::Const,
        TokenKind::If,
        TokenKind::While,
        TokenKind::For,
        TokenKind::Do,
        TokenKind::Switch,
        TokenKind::Return,
        TokenKind::Function,
        TokenKind::Class,
        TokenKind::Try,
        TokenKind::Throw,
        TokenKind::LBrace,
      ]) {
        return;
      }
      self.advance();
    }
  }

  pub(crate) fn push_expr(&mut self, expr: mildew_core::ast::Expr) -> ExprIdx {
    self.ast.push_expr(expr)
  }

  pub(crate) fn push_stmt(&mut self, stmt: mildew_core::ast::Stmt) -> StmtIdx {
    self.ast.push_stmt(stmt)
  }

  pub(crate) fn push_class(&mut self, class: mildew_core::ast::ClassDef) -> ClassIdx {
    self.ast.push_class(class)
  }
}

#[cfg(test)]
mod tests {
  use super::parse;
  use mildew_core::ast::{Expr, Stmt};
  use mildew_core::errors::CompileError;

  #[test]
  fn empty_source_parses_to_empty_body() {
    let (_, body) = parse("").expect("parses");
    assert!(body.is_empty());
  }

  #[test]
  fn empty_statement_is_an_empty_block() {
    let (ast, body) = parse(";").expect("parses");
    assert_eq!(body.len(), 1);
    assert!(matches!(ast.stmt(body[0]), Stmt::Block { body, .. } if body.is_empty()));
  }

  #[test]
  fn parse_error_on_unexpected_token_names_what_was_expected() {
    let err = parse("let = 5;").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }

  #[test]
  fn multiple_top_level_statements_parse_in_order() {
    let (ast, body) = parse("let a = 1; let b = 2;").expect("parses");
    assert_eq!(body.len(), 2);
    for stmt in &body {
      assert!(matches!(ast.stmt(*stmt), Stmt::VarDecl { .. }));
    }
  }

  #[test]
  fn expression_statement_wraps_its_expression() {
    let (ast, body) = parse("1 + 2;").expect("parses");
    let Stmt::Expr { expr, .. } = ast.stmt(body[0]) else {
      panic!("expected an expression statement")
    };
    assert!(matches!(ast.expr(*expr), Expr::Binary { .. }));
  }

  #[test]
  fn parse_all_recovers_past_the_first_syntax_error_to_report_a_second() {
    let (_, _, errors) = super::parse_all("let = 1; let = 2; let ok = 3;").expect("tokenizes");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, CompileError::UnexpectedToken { .. })));
  }

  #[test]
  fn parse_only_ever_surfaces_the_first_of_several_errors() {
    let err = parse("let = 1; let = 2;").unwrap_err();
    assert!(matches!(err, CompileError::UnexpectedToken { .. }));
  }
}
