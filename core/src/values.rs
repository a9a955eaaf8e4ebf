use std::fmt;
use std::rc::Rc;

use crate::chunk::Chunk;

/// A runtime value as it appears in the constant table. The VM's own value
/// representation (tagging, NaN-boxing, etc.) is out of scope here — this
/// is only the shape the compiler needs to intern constants and build
/// function values.
#[derive(Debug, Clone)]
pub enum Value {
  Int(i64),
  Double(f64),
  Str(Rc<str>),
  Bool(bool),
  Null,
  Undefined,
  Func(Rc<FuncObj>),
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Int(a), Value::Int(b)) => a == b,
      (Value::Double(a), Value::Double(b)) => a == b,
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Null, Value::Null) => true,
      (Value::Undefined, Value::Undefined) => true,
      // Function values are never deduplicated against each other: each
      // function literal produces a distinct constant-table entry even if
      // two bodies happen to compile identically.
      _ => false,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Int(n) => write!(f, "{n}"),
      Value::Double(n) => write!(f, "{n}"),
      Value::Str(s) => write!(f, "{s}"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Null => write!(f, "null"),
      Value::Undefined => write!(f, "undefined"),
      Value::Func(func) => write!(f, "<function {}>", func.name.as_deref().unwrap_or("anonymous")),
    }
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self {
    Value::Int(v)
  }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self {
    Value::Double(v)
  }
}

impl From<bool> for Value {
  fn from(v: bool) -> Self {
    Value::Bool(v)
  }
}

impl From<String> for Value {
  fn from(v: String) -> Self {
    Value::Str(Rc::from(v))
  }
}

impl From<FuncObj> for Value {
  fn from(v: FuncObj) -> Self {
    Value::Func(Rc::new(v))
  }
}

/// A compiled function body: the product of emitting a function literal.
/// Carries everything the VM needs to set up a call frame.
#[derive(Debug, Clone)]
pub struct FuncObj {
  pub name: Option<String>,
  pub params: Vec<String>,
  pub min_arity: u8,
  pub max_arity: u8,
  pub chunk: Chunk,
  pub is_class_member: bool,
}

impl FuncObj {
  pub fn new(name: Option<String>, params: Vec<String>, chunk: Chunk) -> Self {
    let arity = params.len() as u8;
    Self {
      name,
      params,
      min_arity: arity,
      max_arity: arity,
      chunk,
      is_class_member: false,
    }
  }
}
