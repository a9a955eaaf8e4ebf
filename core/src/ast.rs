use crate::errors::SourcePos;
use crate::tokens::NumberBase;

/// Index of an expression node in an [`AstArena`]. Default is an obviously
/// invalid sentinel (`usize::MAX`) so an accidentally-unset index panics
/// loudly on first use rather than silently indexing node 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassIdx(pub usize);

impl Default for ExprIdx {
  fn default() -> Self {
    ExprIdx(usize::MAX)
  }
}

impl Default for StmtIdx {
  fn default() -> Self {
    StmtIdx(usize::MAX)
  }
}

/// Owns every expression, statement, and class-definition node produced by
/// a single parse. Nodes reference each other only through arena indices,
/// never through `Box`/`Rc` — the tree is built once, walked once by the
/// compiler, and dropped whole with the arena at the end of `compile()`.
#[derive(Debug, Default)]
pub struct AstArena {
  pub exprs: Vec<Expr>,
  pub stmts: Vec<Stmt>,
  pub classes: Vec<ClassDef>,
}

impl AstArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_expr(&mut self, expr: Expr) -> ExprIdx {
    self.exprs.push(expr);
    ExprIdx(self.exprs.len() - 1)
  }

  pub fn push_stmt(&mut self, stmt: Stmt) -> StmtIdx {
    self.stmts.push(stmt);
    StmtIdx(self.stmts.len() - 1)
  }

  pub fn push_class(&mut self, class: ClassDef) -> ClassIdx {
    self.classes.push(class);
    ClassIdx(self.classes.len() - 1)
  }

  pub fn expr(&self, idx: ExprIdx) -> &Expr {
    &self.exprs[idx.0]
  }

  pub fn stmt(&self, idx: StmtIdx) -> &Stmt {
    &self.stmts[idx.0]
  }

  pub fn class(&self, idx: ClassIdx) -> &ClassDef {
    &self.classes[idx.0]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Pow,
  Mul,
  Div,
  Mod,
  Add,
  Sub,
  Lt,
  Le,
  Gt,
  Ge,
  Eq,
  Neq,
  StrictEq,
  StrictNeq,
  Instanceof,
  LogicAnd,
  LogicOr,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
  BitNot,
  Typeof,
  /// Prefix `++x`; rewritten by the compiler to `x += 1` at emit time.
  PrefixInc,
  /// Prefix `--x`; rewritten by the compiler to `x -= 1` at emit time.
  PrefixDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
  Inc,
  Dec,
}

/// One interpolated segment of a template string: either a literal run of
/// text or an embedded expression (already re-lexed and parsed by the
/// parser from the `${...}` span).
#[derive(Debug)]
pub enum TemplatePart {
  Literal(String),
  Expr(ExprIdx),
}

/// A literal scalar value, distinguished from runtime [`crate::values::Value`]
/// because the AST only ever holds constants the parser itself produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Int(i64),
  Double(f64),
  Str(String),
  Bool(bool),
  Null,
  Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarQualifier {
  Var,
  Let,
  Const,
}

/// One name bound by a `var`/`let`/`const` declaration, with its optional
/// initializer expression.
#[derive(Debug)]
pub struct VarBinding {
  pub name: String,
  pub init: Option<ExprIdx>,
  pub pos: SourcePos,
}

#[derive(Debug)]
pub enum Expr {
  Literal {
    value: Literal,
    base: Option<NumberBase>,
    pos: SourcePos,
  },
  TemplateString {
    parts: Vec<TemplatePart>,
    pos: SourcePos,
  },
  ArrayLiteral {
    elements: Vec<ExprIdx>,
    pos: SourcePos,
  },
  ObjectLiteral {
    keys: Vec<String>,
    values: Vec<ExprIdx>,
    pos: SourcePos,
  },
  ClassLiteral {
    class: ClassIdx,
    pos: SourcePos,
  },
  Binary {
    op: BinaryOp,
    left: ExprIdx,
    right: ExprIdx,
    pos: SourcePos,
  },
  Unary {
    op: UnaryOp,
    operand: ExprIdx,
    pos: SourcePos,
  },
  Postfix {
    op: PostfixOp,
    operand: ExprIdx,
    pos: SourcePos,
  },
  Ternary {
    cond: ExprIdx,
    then_branch: ExprIdx,
    else_branch: ExprIdx,
    pos: SourcePos,
  },
  Identifier {
    name: String,
    pos: SourcePos,
  },
  This {
    pos: SourcePos,
  },
  Super {
    pos: SourcePos,
  },
  Call {
    callee: ExprIdx,
    args: Vec<ExprIdx>,
    is_new: bool,
    pos: SourcePos,
  },
  Index {
    object: ExprIdx,
    index: ExprIdx,
    pos: SourcePos,
  },
  Member {
    object: ExprIdx,
    property: String,
    pos: SourcePos,
  },
  Assign {
    target: ExprIdx,
    value: ExprIdx,
    pos: SourcePos,
  },
  CompoundAssign {
    op: BinaryOp,
    target: ExprIdx,
    value: ExprIdx,
    pos: SourcePos,
  },
  FuncLiteral {
    name: Option<String>,
    params: Vec<String>,
    body: Vec<StmtIdx>,
    is_class_member: bool,
    pos: SourcePos,
  },
}

impl Expr {
  pub fn pos(&self) -> SourcePos {
    match self {
      Expr::Literal { pos, .. }
      | Expr::TemplateString { pos, .. }
      | Expr::ArrayLiteral { pos, .. }
      | Expr::ObjectLiteral { pos, .. }
      | Expr::ClassLiteral { pos, .. }
      | Expr::Binary { pos, .. }
      | Expr::Unary { pos, .. }
      | Expr::Postfix { pos, .. }
      | Expr::Ternary { pos, .. }
      | Expr::Identifier { pos, .. }
      | Expr::This { pos }
      | Expr::Super { pos }
      | Expr::Call { pos, .. }
      | Expr::Index { pos, .. }
      | Expr::Member { pos, .. }
      | Expr::Assign { pos, .. }
      | Expr::CompoundAssign { pos, .. }
      | Expr::FuncLiteral { pos, .. } => *pos,
    }
  }
}

/// A single precomputed `case`: the literal key, and the index (into the
/// switch's flattened statement list) of its target.
#[derive(Debug)]
pub struct SwitchCase {
  pub key: Literal,
  pub target_stmt_index: usize,
}

#[derive(Debug)]
pub struct ForOfHead {
  pub key_binding: Option<String>,
  pub value_binding: String,
  pub qualifier: VarQualifier,
  pub is_of: bool, // false => for-in
  pub object: ExprIdx,
}

#[derive(Debug)]
pub struct TryCatchFinally {
  pub try_body: Vec<StmtIdx>,
  pub catch_binding: Option<String>,
  pub catch_body: Option<Vec<StmtIdx>>,
  pub finally_body: Option<Vec<StmtIdx>>,
}

#[derive(Debug)]
pub enum Stmt {
  VarDecl {
    qualifier: VarQualifier,
    bindings: Vec<VarBinding>,
    line: u32,
  },
  Block {
    body: Vec<StmtIdx>,
    line: u32,
  },
  If {
    cond: ExprIdx,
    then_branch: StmtIdx,
    else_branch: Option<StmtIdx>,
    line: u32,
  },
  Switch {
    discriminant: ExprIdx,
    cases: Vec<SwitchCase>,
    default_stmt_index: Option<usize>,
    body: Vec<StmtIdx>,
    line: u32,
  },
  While {
    label: Option<String>,
    cond: ExprIdx,
    body: StmtIdx,
    line: u32,
  },
  DoWhile {
    label: Option<String>,
    cond: ExprIdx,
    body: StmtIdx,
    line: u32,
  },
  For {
    label: Option<String>,
    init: Option<StmtIdx>,
    cond: Option<ExprIdx>,
    update: Option<ExprIdx>,
    body: StmtIdx,
    line: u32,
  },
  ForOf {
    label: Option<String>,
    head: ForOfHead,
    body: StmtIdx,
    line: u32,
  },
  Break {
    label: Option<String>,
    line: u32,
  },
  Continue {
    label: Option<String>,
    line: u32,
  },
  Return {
    value: Option<ExprIdx>,
    line: u32,
  },
  Throw {
    value: ExprIdx,
    line: u32,
  },
  TryCatchFinally {
    inner: TryCatchFinally,
    line: u32,
  },
  Delete {
    target: ExprIdx,
    line: u32,
  },
  FuncDecl {
    name: String,
    params: Vec<String>,
    body: Vec<StmtIdx>,
    line: u32,
  },
  ClassDecl {
    class: ClassIdx,
    line: u32,
  },
  Expr {
    expr: ExprIdx,
    line: u32,
  },
}

impl Stmt {
  pub fn line(&self) -> u32 {
    match self {
      Stmt::VarDecl { line, .. }
      | Stmt::Block { line, .. }
      | Stmt::If { line, .. }
      | Stmt::Switch { line, .. }
      | Stmt::While { line, .. }
      | Stmt::DoWhile { line, .. }
      | Stmt::For { line, .. }
      | Stmt::ForOf { line, .. }
      | Stmt::Break { line, .. }
      | Stmt::Continue { line, .. }
      | Stmt::Return { line, .. }
      | Stmt::Throw { line, .. }
      | Stmt::TryCatchFinally { line, .. }
      | Stmt::Delete { line, .. }
      | Stmt::FuncDecl { line, .. }
      | Stmt::ClassDecl { line, .. }
      | Stmt::Expr { line, .. } => *line,
    }
  }
}

/// A single method/getter/setter/static entry: a name paired with its
/// function literal.
#[derive(Debug)]
pub struct ClassMethod {
  pub name: String,
  pub func: ExprIdx,
}

/// Aggregates a fully-parsed class. Invariant: the constructor is always
/// present (synthesized empty if the source omits it); if `extends` is
/// set, the constructor's body must contain exactly one `super(...)` call.
#[derive(Debug)]
pub struct ClassDef {
  pub name: String,
  pub constructor: ExprIdx,
  pub methods: Vec<ClassMethod>,
  pub getters: Vec<ClassMethod>,
  pub setters: Vec<ClassMethod>,
  pub statics: Vec<ClassMethod>,
  pub extends: Option<ExprIdx>,
}
