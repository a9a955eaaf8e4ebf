use mildew_core::ast::{BinaryOp, Expr, Literal, PostfixOp, TemplatePart, UnaryOp};
use mildew_core::errors::{CompileError, Result};
use mildew_core::tokens::{NumberBase, TokenKind};
use mildew_core::utils::{
  parse_float_lexeme, parse_int_from_lexeme_base, parse_int_lexeme, parse_scientific_literal_lexeme,
};

use crate::Parser;
use mildew_core::ast::ExprIdx;

/// Binary operators ordered low-to-high per `SPEC_FULL.md` Section 4.2's
/// precedence table. Each level is its own function, cascading into the
/// next-higher level, mirroring a classic recursive-descent precedence
/// climb.
impl Parser {
  pub(crate) fn parse_expr(&mut self) -> Result<ExprIdx> {
    self.parse_assignment()
  }

  fn parse_assignment(&mut self) -> Result<ExprIdx> {
    let left = self.parse_ternary()?;

    let compound_op = match self.current_kind() {
      TokenKind::Assign => None,
      TokenKind::PlusEq => Some(BinaryOp::Add),
      TokenKind::MinusEq => Some(BinaryOp::Sub),
      TokenKind::StarEq => Some(BinaryOp::Mul),
      TokenKind::StarStarEq => Some(BinaryOp::Pow),
      TokenKind::SlashEq => Some(BinaryOp::Div),
      TokenKind::PercentEq => Some(BinaryOp::Mod),
      TokenKind::BitAndEq => Some(BinaryOp::BitAnd),
      TokenKind::BitOrEq => Some(BinaryOp::BitOr),
      TokenKind::BitXorEq => Some(BinaryOp::BitXor),
      TokenKind::ShlEq => Some(BinaryOp::Shl),
      TokenKind::ShrEq => Some(BinaryOp::Shr),
      TokenKind::UShrEq => Some(BinaryOp::UShr),
      _ => return Ok(left),
    };

    let is_plain = compound_op.is_none();
    let op_pos = self.pos();
    self.advance();
    self.assert_assignment_target(left, op_pos)?;
    let value = self.parse_assignment()?;

    Ok(if is_plain {
      self.push_expr(Expr::Assign {
        target: left,
        value,
        pos: op_pos,
      })
    } else {
      self.push_expr(Expr::CompoundAssign {
        op: compound_op.unwrap(),
        target: left,
        value,
        pos: op_pos,
      })
    })
  }

  fn assert_assignment_target(&self, target: ExprIdx, pos: mildew_core::errors::SourcePos) -> Result<()> {
    match self.ast.expr(target) {
      Expr::Identifier { .. } | Expr::Member { .. } | Expr::Index { .. } => Ok(()),
      _ => Err(CompileError::InvalidAssignmentTarget { pos }),
    }
  }

  fn parse_ternary(&mut self) -> Result<ExprIdx> {
    let cond = self.parse_logic_or()?;
    if self.match_tok(TokenKind::Question) {
      let pos = self.pos();
      let then_branch = self.parse_assignment()?;
      self.consume(TokenKind::Colon, "':' in ternary expression")?;
      let else_branch = self.parse_assignment()?;
      return Ok(self.push_expr(Expr::Ternary {
        cond,
        then_branch,
        else_branch,
        pos,
      }));
    }
    Ok(cond)
  }

  fn parse_logic_or(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_logic_and()?;
    while self.check(TokenKind::Or) {
      let pos = self.pos();
      self.advance();
      let right = self.parse_logic_and()?;
      left = self.push_expr(Expr::Binary {
        op: BinaryOp::LogicOr,
        left,
        right,
        pos,
      });
    }
    Ok(left)
  }

  fn parse_logic_and(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_bit_or()?;
    while self.check(TokenKind::And) {
      let pos = self.pos();
      self.advance();
      let right = self.parse_bit_or()?;
      left = self.push_expr(Expr::Binary {
        op: BinaryOp::LogicAnd,
        left,
        right,
        pos,
      });
    }
    Ok(left)
  }

  fn parse_bit_or(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_bit_xor()?;
    while self.check(TokenKind::BitOr) {
      let pos = self.pos();
      self.advance();
      let right = self.parse_bit_xor()?;
      left = self.push_expr(Expr::Binary {
        op: BinaryOp::BitOr,
        left,
        right,
        pos,
      });
    }
    Ok(left)
  }

  fn parse_bit_xor(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_bit_and()?;
    while self.check(TokenKind::BitXor) {
      let pos = self.pos();
      self.advance();
      let right = self.parse_bit_and()?;
      left = self.push_expr(Expr::Binary {
        op: BinaryOp::BitXor,
        left,
        right,
        pos,
      });
    }
    Ok(left)
  }

  fn parse_bit_and(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_equality()?;
    while self.check(TokenKind::BitAnd) {
      let pos = self.pos();
      self.advance();
      let right = self.parse_equality()?;
      left = self.push_expr(Expr::Binary {
        op: BinaryOp::BitAnd,
        left,
        right,
        pos,
      });
    }
    Ok(left)
  }

  fn parse_equality(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_relational()?;
    loop {
      let op = match self.current_kind() {
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::Neq,
        TokenKind::StrictEq => BinaryOp::StrictEq,
        TokenKind::StrictNotEq => BinaryOp::StrictNeq,
        _ => break,
      };
      let pos = self.pos();
      self.advance();
      let right = self.parse_relational()?;
      left = self.push_expr(Expr::Binary { op, left, right, pos });
    }
    Ok(left)
  }

  fn parse_relational(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_shift()?;
    loop {
      let op = match self.current_kind() {
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Ge => BinaryOp::Ge,
        TokenKind::Instanceof => BinaryOp::Instanceof,
        _ => break,
      };
      let pos = self.pos();
      self.advance();
      let right = self.parse_shift()?;
      left = self.push_expr(Expr::Binary { op, left, right, pos });
    }
    Ok(left)
  }

  fn parse_shift(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_additive()?;
    loop {
      let op = match self.current_kind() {
        TokenKind::Shl => BinaryOp::Shl,
        TokenKind::Shr => BinaryOp::Shr,
        TokenKind::UShr => BinaryOp::UShr,
        _ => break,
      };
      let pos = self.pos();
      self.advance();
      let right = self.parse_additive()?;
      left = self.push_expr(Expr::Binary { op, left, right, pos });
    }
    Ok(left)
  }

  fn parse_additive(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_multiplicative()?;
    loop {
      let op = match self.current_kind() {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        _ => break,
      };
      let pos = self.pos();
      self.advance();
      let right = self.parse_multiplicative()?;
      left = self.push_expr(Expr::Binary { op, left, right, pos });
    }
    Ok(left)
  }

  fn parse_multiplicative(&mut self) -> Result<ExprIdx> {
    let mut left = self.parse_exponent()?;
    loop {
      let op = match self.current_kind() {
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        _ => break,
      };
      let pos = self.pos();
      self.advance();
      let right = self.parse_exponent()?;
      left = self.push_expr(Expr::Binary { op, left, right, pos });
    }
    Ok(left)
  }

  /// Right-associative, unlike every level below it.
  fn parse_exponent(&mut self) -> Result<ExprIdx> {
    let left = self.parse_unary()?;
    if self.check(TokenKind::StarStar) {
      let pos = self.pos();
      self.advance();
      let right = self.parse_exponent()?;
      return Ok(self.push_expr(Expr::Binary {
        op: BinaryOp::Pow,
        left,
        right,
        pos,
      }));
    }
    Ok(left)
  }

  fn parse_unary(&mut self) -> Result<ExprIdx> {
    let op = match self.current_kind() {
      TokenKind::Minus => Some(UnaryOp::Neg),
      TokenKind::Not => Some(UnaryOp::Not),
      TokenKind::BitNot => Some(UnaryOp::BitNot),
      TokenKind::Typeof => Some(UnaryOp::Typeof),
      TokenKind::PlusPlus => Some(UnaryOp::PrefixInc),
      TokenKind::MinusMinus => Some(UnaryOp::PrefixDec),
      _ => None,
    };
    if let Some(op) = op {
      let pos = self.pos();
      self.advance();
      let operand = self.parse_unary()?;
      if matches!(op, UnaryOp::PrefixInc | UnaryOp::PrefixDec) {
        self.assert_assignment_target(operand, pos)?;
      }
      return Ok(self.push_expr(Expr::Unary { op, operand, pos }));
    }
    self.parse_postfix()
  }

  fn parse_postfix(&mut self) -> Result<ExprIdx> {
    let mut expr = self.parse_call_or_member()?;
    loop {
      let op = match self.current_kind() {
        TokenKind::PlusPlus => PostfixOp::Inc,
        TokenKind::MinusMinus => PostfixOp::Dec,
        _ => break,
      };
      let pos = self.pos();
      self.assert_assignment_target(expr, pos)?;
      self.advance();
      expr = self.push_expr(Expr::Postfix { op, operand: expr, pos });
    }
    Ok(expr)
  }

  fn parse_call_or_member(&mut self) -> Result<ExprIdx> {
    let mut expr = self.parse_primary()?;
    loop {
      if self.match_tok(TokenKind::LParen) {
        let pos = self.pos();
        let args = self.parse_arg_list()?;
        expr = self.push_expr(Expr::Call {
          callee: expr,
          args,
          is_new: false,
          pos,
        });
      } else if self.match_tok(TokenKind::Dot) {
        let pos = self.pos();
        let property = self.consume_identifier("property name after '.'")?;
        expr = self.push_expr(Expr::Member {
          object: expr,
          property,
          pos,
        });
      } else if self.match_tok(TokenKind::LBracket) {
        let pos = self.pos();
        let index = self.parse_expr()?;
        self.consume(TokenKind::RBracket, "']' after index expression")?;
        expr = self.push_expr(Expr::Index {
          object: expr,
          index,
          pos,
        });
      } else {
        break;
      }
    }
    Ok(expr)
  }

  fn parse_arg_list(&mut self) -> Result<Vec<ExprIdx>> {
    let mut args = Vec::new();
    if !self.check(TokenKind::RParen) {
      loop {
        args.push(self.parse_assignment()?);
        if !self.match_tok(TokenKind::Comma) {
          break;
        }
      }
    }
    self.consume(TokenKind::RParen, "')' after argument list")?;
    Ok(args)
  }

  fn parse_primary(&mut self) -> Result<ExprIdx> {
    let pos = self.pos();
    match self.current_kind() {
      TokenKind::Number => self.parse_number_literal(),
      TokenKind::String => {
        let lexeme = self.advance().lexeme.clone();
        Ok(self.push_expr(Expr::Literal {
          value: Literal::Str(lexeme),
          base: None,
          pos,
        }))
      }
      TokenKind::TemplateString => self.parse_template_string(),
      TokenKind::True => {
        self.advance();
        Ok(self.push_expr(Expr::Literal {
          value: Literal::Bool(true),
          base: None,
          pos,
        }))
      }
      TokenKind::False => {
        self.advance();
        Ok(self.push_expr(Expr::Literal {
          value: Literal::Bool(false),
          base: None,
          pos,
        }))
      }
      TokenKind::Null => {
        self.advance();
        Ok(self.push_expr(Expr::Literal {
          value: Literal::Null,
          base: None,
          pos,
        }))
      }
      TokenKind::Undefined => {
        self.advance();
        Ok(self.push_expr(Expr::Literal {
          value: Literal::Undefined,
          base: None,
          pos,
        }))
      }
      TokenKind::This => {
        self.advance();
        Ok(self.push_expr(Expr::This { pos }))
      }
      TokenKind::Super => {
        self.advance();
        if self.base_class_stack.last().copied() != Some(true) {
          return Err(CompileError::SuperOutsideDerivedClass { pos });
        }
        Ok(self.push_expr(Expr::Super { pos }))
      }
      TokenKind::Identifier => {
        let name = self.advance().lexeme.clone();
        Ok(self.push_expr(Expr::Identifier { name, pos }))
      }
      TokenKind::New => {
        self.advance();
        let callee_or_call = self.parse_call_or_member()?;
        Ok(self.as_new_expr(callee_or_call, pos))
      }
      TokenKind::LParen => {
        self.advance();
        let inner = self.parse_expr()?;
        self.consume(TokenKind::RParen, "')' after expression")?;
        Ok(inner)
      }
      TokenKind::LBracket => self.parse_array_literal(),
      TokenKind::LBrace => self.parse_object_literal(),
      TokenKind::Function => self.parse_function_literal(false),
      TokenKind::Class => {
        let class = self.parse_class_body("<anonymous>".to_string())?;
        Ok(self.push_expr(Expr::ClassLiteral { class, pos }))
      }
      _ => {
        let found = format!("{:?}", self.current_kind());
        Err(CompileError::UnexpectedToken {
          pos,
          expected: "expression".to_string(),
          found,
        })
      }
    }
  }

  /// `new F(args)` parses as an ordinary call expression with `is_new`
  /// forced on; `new F` with no parens is a zero-arg call.
  fn as_new_expr(&mut self, expr: ExprIdx, pos: mildew_core::errors::SourcePos) -> ExprIdx {
    match self.ast.expr(expr) {
      Expr::Call { .. } => {
        // Mutate in place by pushing a fresh Call node with is_new = true,
        // since arena nodes are append-only.
        if let Expr::Call { callee, args, .. } = self.ast.expr(expr) {
          let callee = *callee;
          let args = args.clone();
          return self.push_expr(Expr::Call {
            callee,
            args,
            is_new: true,
            pos,
          });
        }
        unreachable!()
      }
      _ => self.push_expr(Expr::Call {
        callee: expr,
        args: Vec::new(),
        is_new: true,
        pos,
      }),
    }
  }

  fn parse_number_literal(&mut self) -> Result<ExprIdx> {
    let pos = self.pos();
    let token = self.advance().clone();
    let base = token.number_base;
    let value = match base {
      Some(NumberBase::Hex) => Literal::Int(
        parse_int_from_lexeme_base(&token.lexeme, 16)
          .map_err(|_| malformed(pos, &token.lexeme))?,
      ),
      Some(NumberBase::Octal) => Literal::Int(
        parse_int_from_lexeme_base(&token.lexeme, 8).map_err(|_| malformed(pos, &token.lexeme))?,
      ),
      Some(NumberBase::Binary) => Literal::Int(
        parse_int_from_lexeme_base(&token.lexeme, 2).map_err(|_| malformed(pos, &token.lexeme))?,
      ),
      Some(NumberBase::Decimal) | None => {
        if token.lexeme.contains(['e', 'E']) {
          Literal::Double(
            parse_scientific_literal_lexeme(&token.lexeme).map_err(|_| malformed(pos, &token.lexeme))?,
          )
        } else if token.lexeme.contains('.') {
          Literal::Double(parse_float_lexeme(&token.lexeme).map_err(|_| malformed(pos, &token.lexeme))?)
        } else {
          Literal::Int(parse_int_lexeme(&token.lexeme).map_err(|_| malformed(pos, &token.lexeme))?)
        }
      }
    };
    Ok(self.push_expr(Expr::Literal { value, base, pos }))
  }

  /// Splits a template string's raw interior (as captured by the lexer,
  /// with `${...}` spans preserved literally) into literal/expression
  /// parts, re-lexing and re-parsing each embedded expression span.
  fn parse_template_string(&mut self) -> Result<ExprIdx> {
    let pos = self.pos();
    let raw = self.advance().lexeme.clone();
    let mut parts = Vec::new();
    let bytes = raw.as_bytes();
    let mut i = 0;
    let mut literal = String::new();
    while i < bytes.len() {
      if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
        if !literal.is_empty() {
          parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
        }
        let start = i + 2;
        let mut depth = 1;
        let mut j = start;
        while j < bytes.len() && depth > 0 {
          match bytes[j] {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
          }
          if depth > 0 {
            j += 1;
          }
        }
        let inner_src = raw[start..j].to_string();
        let inner_expr = self.parse_embedded_expr(&inner_src)?;
        parts.push(TemplatePart::Expr(inner_expr));
        i = j + 1;
      } else if bytes[i] == b'\\' && i + 1 < bytes.len() {
        literal.push(bytes[i + 1] as char);
        i += 2;
      } else {
        literal.push(bytes[i] as char);
        i += 1;
      }
    }
    if !literal.is_empty() {
      parts.push(TemplatePart::Literal(literal));
    }
    Ok(self.push_expr(Expr::TemplateString { parts, pos }))
  }

  fn parse_array_literal(&mut self) -> Result<ExprIdx> {
    let pos = self.pos();
    self.advance();
    let mut elements = Vec::new();
    if !self.check(TokenKind::RBracket) {
      loop {
        elements.push(self.parse_assignment()?);
        if !self.match_tok(TokenKind::Comma) {
          break;
        }
      }
    }
    self.consume(TokenKind::RBracket, "']' after array literal")?;
    Ok(self.push_expr(Expr::ArrayLiteral { elements, pos }))
  }

  fn parse_object_literal(&mut self) -> Result<ExprIdx> {
    let pos = self.pos();
    self.advance();
    let mut keys = Vec::new();
    let mut values = Vec::new();
    if !self.check(TokenKind::RBrace) {
      loop {
        let key = if self.check(TokenKind::String) {
          self.advance().lexeme.clone()
        } else {
          self.consume_identifier("object key")?
        };
        self.consume(TokenKind::Colon, "':' after object key")?;
        let value = self.parse_assignment()?;
        keys.push(key);
        values.push(value);
        if !self.match_tok(TokenKind::Comma) {
          break;
        }
      }
    }
    self.consume(TokenKind::RBrace, "'}' after object literal")?;
    Ok(self.push_expr(Expr::ObjectLiteral { keys, values, pos }))
  }

  pub(crate) fn parse_function_literal(&mut self, is_class_member: bool) -> Result<ExprIdx> {
    let pos = self.pos();
    self.consume(TokenKind::Function, "'function' keyword")?;
    let name = if self.check(TokenKind::Identifier) {
      Some(self.advance().lexeme.clone())
    } else {
      None
    };
    let params = self.parse_param_list()?;
    self.consume(TokenKind::LBrace, "'{' to start function body")?;
    let body = self.parse_block_body()?;
    Ok(self.push_expr(Expr::FuncLiteral {
      name,
      params,
      body,
      is_class_member,
      pos,
    }))
  }

  pub(crate) fn parse_param_list(&mut self) -> Result<Vec<String>> {
    self.consume(TokenKind::LParen, "'(' to start parameter list")?;
    let mut params = Vec::new();
    if !self.check(TokenKind::RParen) {
      loop {
        params.push(self.consume_identifier("parameter name")?);
        if !self.match_tok(TokenKind::Comma) {
          break;
        }
      }
    }
    self.consume(TokenKind::RParen, "')' after parameter list")?;
    Ok(params)
  }

  /// Re-lexes and re-parses one `${...}` span from a template string's raw
  /// interior as a standalone expression. The embedded tokens are swapped
  /// in over `self.tokens` so the resulting nodes land in the same AST
  /// arena as the enclosing parse (rather than a disjoint one that would
  /// need its indices renumbered on merge), then the outer token stream is
  /// restored.
  fn parse_embedded_expr(&mut self, src: &str) -> Result<ExprIdx> {
    let tokens = mildew_lexer::tokenize(src)?;
    let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
    let saved_current = self.current;
    self.current = 0;
    let result = self.parse_expr();
    self.tokens = saved_tokens;
    self.current = saved_current;
    result
  }
}

fn malformed(pos: mildew_core::errors::SourcePos, lexeme: &str) -> CompileError {
  CompileError::MalformedNumber {
    pos,
    lexeme: lexeme.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use crate::parse;
  use mildew_core::ast::{BinaryOp, Expr, Literal};
  use mildew_core::errors::CompileError;

  fn expr(source: &str) -> (mildew_core::ast::AstArena, mildew_core::ast::ExprIdx) {
    let (ast, body) = parse(source).expect("parses");
    let mildew_core::ast::Stmt::Expr { expr, .. } = ast.stmt(body[0]) else {
      panic!("expected an expression statement")
    };
    let expr = *expr;
    (ast, expr)
  }

  #[test]
  fn exponent_is_right_associative() {
    // `2 ** 3 ** 2` must parse as `2 ** (3 ** 2)`, so the outer node's right
    // side is itself a Pow, not its left.
    let (ast, e) = expr("2 ** 3 ** 2;");
    let Expr::Binary { op, left, right, .. } = ast.expr(e) else {
      panic!("expected a binary expression")
    };
    assert_eq!(*op, BinaryOp::Pow);
    assert!(matches!(ast.expr(*left), Expr::Literal { .. }));
    assert!(matches!(ast.expr(*right), Expr::Binary { op: BinaryOp::Pow, .. }));
  }

  #[test]
  fn multiplicative_binds_tighter_than_additive() {
    let (ast, e) = expr("1 + 2 * 3;");
    let Expr::Binary { op, left, right, .. } = ast.expr(e) else {
      panic!("expected a binary expression")
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(ast.expr(*left), Expr::Literal { .. }));
    assert!(matches!(ast.expr(*right), Expr::Binary { op: BinaryOp::Mul, .. }));
  }

  #[test]
  fn ternary_is_right_associative_and_lower_than_logic_or() {
    let (ast, e) = expr("a || b ? c : d;");
    let Expr::Ternary { cond, .. } = ast.expr(e) else {
      panic!("expected a ternary expression")
    };
    assert!(matches!(ast.expr(*cond), Expr::Binary { op: BinaryOp::LogicOr, .. }));
  }

  #[test]
  fn assignment_to_a_non_lvalue_is_rejected() {
    let err = parse("1 + 2 = 3;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
  }

  #[test]
  fn compound_assign_lowers_its_operator() {
    let (ast, e) = expr("x += 1;");
    assert!(matches!(ast.expr(e), Expr::CompoundAssign { op: BinaryOp::Add, .. }));
  }

  #[test]
  fn prefix_increment_on_a_literal_is_rejected() {
    let err = parse("++5;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
  }

  #[test]
  fn postfix_increment_on_a_literal_is_rejected() {
    let err = parse("5++;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
  }

  #[test]
  fn member_and_index_chain_nests_left_to_right() {
    let (ast, e) = expr("a.b[c].d;");
    let Expr::Member { object, property, .. } = ast.expr(e) else {
      panic!("expected a member expression")
    };
    assert_eq!(property, "d");
    assert!(matches!(ast.expr(*object), Expr::Index { .. }));
  }

  #[test]
  fn new_with_parens_marks_the_call_as_new() {
    let (ast, e) = expr("new F(1, 2);");
    let Expr::Call { is_new, args, .. } = ast.expr(e) else {
      panic!("expected a call expression")
    };
    assert!(is_new);
    assert_eq!(args.len(), 2);
  }

  #[test]
  fn bare_new_with_no_parens_is_a_zero_arg_call() {
    let (ast, e) = expr("new F;");
    let Expr::Call { is_new, args, .. } = ast.expr(e) else {
      panic!("expected a call expression")
    };
    assert!(is_new);
    assert!(args.is_empty());
  }

  #[test]
  fn super_outside_a_derived_class_is_rejected() {
    let err = parse("function f() { super(); }").unwrap_err();
    assert!(matches!(err, CompileError::SuperOutsideDerivedClass { .. }));
  }

  #[test]
  fn hex_octal_binary_number_literals_decode() {
    let (ast, e) = expr("0xff;");
    assert!(matches!(ast.expr(e), Expr::Literal { value: Literal::Int(255), .. }));
    let (ast, e) = expr("0o17;");
    assert!(matches!(ast.expr(e), Expr::Literal { value: Literal::Int(15), .. }));
    let (ast, e) = expr("0b101;");
    assert!(matches!(ast.expr(e), Expr::Literal { value: Literal::Int(5), .. }));
  }

  #[test]
  fn decimal_with_a_dot_is_a_double_literal() {
    let (ast, e) = expr("3.5;");
    assert!(matches!(ast.expr(e), Expr::Literal { value: Literal::Double(v), .. } if (*v - 3.5).abs() < f64::EPSILON));
  }

  #[test]
  fn template_string_splits_literal_and_embedded_expression_parts() {
    use mildew_core::ast::TemplatePart;
    let (ast, e) = expr("`a${1 + 2}b`;");
    let Expr::TemplateString { parts, .. } = ast.expr(e) else {
      panic!("expected a template string")
    };
    assert_eq!(parts.len(), 3);
    assert!(matches!(&parts[0], TemplatePart::Literal(s) if s == "a"));
    match &parts[1] {
      TemplatePart::Expr(idx) => assert!(matches!(ast.expr(*idx), Expr::Binary { .. })),
      _ => panic!("expected an embedded expression part"),
    }
    assert!(matches!(&parts[2], TemplatePart::Literal(s) if s == "b"));
  }

  #[test]
  fn object_literal_accepts_string_keys() {
    let (ast, e) = expr(r#"({ "a-b": 1 });"#);
    let Expr::ObjectLiteral { keys, .. } = ast.expr(e) else {
      panic!("expected an object literal")
    };
    assert_eq!(keys, &["a-b"]);
  }

  #[test]
  fn array_literal_collects_elements_in_order() {
    let (ast, e) = expr("[1, 2, 3];");
    let Expr::ArrayLiteral { elements, .. } = ast.expr(e) else {
      panic!("expected an array literal")
    };
    assert_eq!(elements.len(), 3);
  }
}
