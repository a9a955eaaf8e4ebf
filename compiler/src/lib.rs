mod expressions;
mod statements;

/// Bytecode-to-text dump, used by this crate's own tests and by the
/// workspace's `tests/` integration suite to assert on emitted shape
/// without comparing raw byte vectors. Not a published disassembler
/// product (the VM-side consumer of a full disassembler is out of scope).
pub mod disasm;

use mildew_core::ast::{AstArena, Literal, StmtIdx};
use mildew_core::chunk::{Chunk, PatchHandle};
use mildew_core::errors::{CompileError, Result};
use mildew_core::values::{FuncObj, Value};

/// Converts a parsed literal into the runtime value interned for it.
pub(crate) fn literal_to_value(lit: &Literal) -> Value {
  match lit {
    Literal::Int(n) => Value::Int(*n),
    Literal::Double(n) => Value::Double(*n),
    Literal::Str(s) => Value::from(s.clone()),
    Literal::Bool(b) => Value::Bool(*b),
    Literal::Null => Value::Null,
    Literal::Undefined => Value::Undefined,
  }
}

/// Compiles a complete source string into a [`Chunk`] ready for the VM.
/// The sole public entry point (`SPEC_FULL.md` Section 6).
pub fn compile(source: &str) -> Result<Chunk> {
  let (ast, body) = mildew_parser::parse(source)?;
  let span = tracing::info_span!("compile", len = source.len());
  let _enter = span.enter();
  let mut compiler = Compiler::new(ast);
  compiler.compile_program(&body)?;
  Ok(compiler.pop_fn_chunk())
}

/// One binding visible in a lexical scope: either a late-bound name (`var`,
/// function declarations) with `slot = -1`, or a lexical/constant binding
/// pinned to an absolute VM stack slot.
struct Binding {
  name: String,
  slot: i32,
  is_constant: bool,
}

/// One nested lexical scope (block, loop body, for-init, catch clause).
/// `function_depth` pins the scope to the function it was opened in, so
/// identifier resolution never crosses into an enclosing function's slots.
struct Scope {
  function_depth: usize,
  slot_base: i32,
  bindings: Vec<Binding>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PatchKind {
  Break,
  Continue,
}

/// A `break`/`continue` waiting for its enclosing loop or switch to finish
/// emitting, so its `GOTO` target and scope-pop-count can be resolved.
///
/// `level` is the emitting construct's `loop_level` for a `continue`, or its
/// `break_level` for a `break` — `continue` only ever targets a loop, while
/// `break` targets the nearest loop *or* switch, so the two counters only
/// stay in lockstep while nested purely in loops; a `switch` bumps
/// `break_level` alone, which is what lets an unlabeled `continue` inside a
/// `switch` skip past it to the enclosing loop untouched.
struct PendingPatch {
  label: Option<String>,
  kind: PatchKind,
  handle: PatchHandle,
  pop_count_offset: usize,
  recorded_scope_depth: u32,
  level: u32,
  pos: mildew_core::errors::SourcePos,
}

/// Per-function compilation state: one pushed per function literal
/// (including the implicit top-level function), popped when its body
/// finishes emitting.
struct FnContext {
  chunk: Chunk,
  next_slot: i32,
  scope_depth: u32,
  loop_level: u32,
  break_level: u32,
  /// One entry per currently-open loop/switch, `Some(name)` for a labeled
  /// loop. Checked on labeled `break`/`continue` so a dangling label is a
  /// compile error at the statement, not an unresolved patch at fn end.
  active_labels: Vec<Option<String>>,
  pending: Vec<PendingPatch>,
}

impl FnContext {
  fn new() -> Self {
    Self {
      chunk: Chunk::new(),
      next_slot: 0,
      scope_depth: 0,
      loop_level: 0,
      break_level: 0,
      active_labels: Vec::new(),
      pending: Vec::new(),
    }
  }
}

pub(crate) struct Compiler {
  ast: AstArena,
  fn_stack: Vec<FnContext>,
  scopes: Vec<Scope>,
  /// One entry per class currently being compiled whose constructor may
  /// contain a `super(...)` call: the base-class expression to re-emit.
  base_class_stack: Vec<mildew_core::ast::ExprIdx>,
}

impl Compiler {
  fn new(ast: AstArena) -> Self {
    Self {
      ast,
      fn_stack: vec![FnContext::new()],
      scopes: Vec::new(),
      base_class_stack: Vec::new(),
    }
  }

  /// The top-level program body is itself a scope for binding-resolution
  /// purposes (a top-level `let`/`const` still needs a `Scope` to register
  /// its slot in), but — like a function's parameter scope, and per
  /// Testable Scenario #1 — it never emits `OPEN_SCOPE`/`CLOSE_SCOPE`.
  fn compile_program(&mut self, body: &[StmtIdx]) -> Result<()> {
    self.push_param_scope();
    for &stmt in body {
      self.compile_stmt(stmt)?;
    }
    self.assert_no_unresolved_patches()?;
    self.pop_param_scope();
    Ok(())
  }

  fn pop_fn_chunk(&mut self) -> Chunk {
    self.fn_stack.pop().expect("fn_stack never empty").chunk
  }

  fn chunk(&mut self) -> &mut Chunk {
    &mut self.fn_stack.last_mut().expect("fn_stack never empty").chunk
  }

  fn function_depth(&self) -> usize {
    self.fn_stack.len() - 1
  }

  fn current_fn(&mut self) -> &mut FnContext {
    self.fn_stack.last_mut().expect("fn_stack never empty")
  }

  // --- scopes ---

  /// Pushes scope bookkeeping without emitting `OPEN_SCOPE`, for a function
  /// body's parameter bindings: those slots come from the call convention
  /// itself (the VM pushes arguments before entering the body), not from a
  /// runtime scope the VM needs to track for later closing.
  fn push_param_scope(&mut self) {
    let depth = self.function_depth();
    let slot_base = self.current_fn().next_slot;
    self.scopes.push(Scope {
      function_depth: depth,
      slot_base,
      bindings: Vec::new(),
    });
  }

  fn pop_param_scope(&mut self) {
    let scope = self.scopes.pop().expect("balanced param scope");
    self.current_fn().next_slot = scope.slot_base;
  }

  fn open_scope(&mut self) {
    let depth = self.function_depth();
    let slot_base = self.current_fn().next_slot;
    self.scopes.push(Scope {
      function_depth: depth,
      slot_base,
      bindings: Vec::new(),
    });
    self.current_fn().scope_depth += 1;
    self.chunk().push_op(mildew_core::bytecode::OpCode::OpenScope);
  }

  fn close_scope(&mut self) {
    let scope = self.scopes.pop().expect("balanced open/close scope");
    self.current_fn().next_slot = scope.slot_base;
    self.current_fn().scope_depth -= 1;
    self.chunk().push_op(mildew_core::bytecode::OpCode::CloseScope);
  }

  /// Declares a name in the innermost scope. `slot = None` means late-bound
  /// (`var`/function declaration); `Some` means lexical/constant, assigned
  /// the next absolute stack slot in the current function.
  fn declare_binding(
    &mut self,
    name: &str,
    lexical: bool,
    is_constant: bool,
    pos: mildew_core::errors::SourcePos,
  ) -> Result<i32> {
    if lexical {
      if let Some(scope) = self.scopes.last() {
        if scope.bindings.iter().any(|b| b.name == name && b.slot >= 0) {
          return Err(CompileError::RedeclaredLexicalBinding {
            pos,
            name: name.to_string(),
          });
        }
      }
      let slot = self.current_fn().next_slot;
      self.current_fn().next_slot += 1;
      if let Some(scope) = self.scopes.last_mut() {
        scope.bindings.push(Binding {
          name: name.to_string(),
          slot,
          is_constant,
        });
      }
      Ok(slot)
    } else {
      if let Some(scope) = self.scopes.last_mut() {
        scope.bindings.push(Binding {
          name: name.to_string(),
          slot: -1,
          is_constant: false,
        });
      }
      Ok(-1)
    }
  }

  /// Resolves an identifier against the scope stack, restricted to scopes
  /// opened in the current function. Returns `Some(slot)` for a lexical hit
  /// (`slot >= 0`), `None` if nothing at this function depth matches (the
  /// caller falls back to name-based `GET_VAR`/`SET_VAR`).
  fn resolve_local(&self, name: &str) -> Option<(i32, bool)> {
    let depth = self.function_depth();
    for scope in self.scopes.iter().rev() {
      if scope.function_depth != depth {
        break;
      }
      if let Some(binding) = scope.bindings.iter().rev().find(|b| b.name == name) {
        if binding.slot >= 0 {
          return Some((binding.slot, binding.is_constant));
        }
        return None;
      }
    }
    None
  }

  fn assert_no_unresolved_patches(&self) -> Result<()> {
    if let Some(p) = self.fn_stack.last().and_then(|f| f.pending.first()) {
      let kw = match p.kind {
        PatchKind::Break => "break",
        PatchKind::Continue => "continue",
      };
      return Err(CompileError::UnresolvedBreakOrContinue { pos: p.pos, kw });
    }
    Ok(())
  }

  /// Pushes a fresh function context, compiles `body` into it, appends the
  /// fallthrough `PUSH_UNDEF` + `RETURN`, and pops the finished [`Chunk`].
  fn compile_function_body(&mut self, params: &[String], body: &[StmtIdx]) -> Result<Chunk> {
    let depth = self.fn_stack.len();
    tracing::debug!(depth, "entering function literal");
    self.fn_stack.push(FnContext::new());
    self.push_param_scope();
    for p in params {
      self.declare_binding(p, true, false, mildew_core::errors::SourcePos::default())?;
    }
    for &stmt in body {
      self.compile_stmt(stmt)?;
    }
    self.chunk().push_op(mildew_core::bytecode::OpCode::PushUndef);
    self.chunk().push_op(mildew_core::bytecode::OpCode::Return);
    self.assert_no_unresolved_patches()?;
    self.pop_param_scope();
    let chunk = self.pop_fn_chunk();
    tracing::debug!(depth, "exiting function literal");
    Ok(chunk)
  }

  fn intern_name(&mut self, name: &str) -> u32 {
    self.chunk().add_constant(Value::from(name.to_string()))
  }

  fn intern_func(&mut self, func: FuncObj) -> u32 {
    self.chunk().add_constant(Value::from(func))
  }

  // --- loops / switch / break / continue ---

  /// Emits `op` followed by a resolved backward branch to `target`, for a
  /// loop's back-edge where the destination (unlike a forward exit) is
  /// already known at emission time.
  fn emit_jump_to(&mut self, op: mildew_core::bytecode::OpCode, target: usize) {
    self.chunk().push_op(op);
    let offset = self.chunk().len();
    let displacement = target as i64 - (offset as i64 + 4);
    self.chunk().push_i32(displacement as i32);
  }

  /// Patches a relative forward branch (`JMP`/`JMP_FALSE`), tracing the
  /// patch per `SPEC_FULL.md` Section 10.2.
  fn patch_jump_traced(&mut self, handle: PatchHandle) {
    self.chunk().patch_jump(handle);
    tracing::trace!(kind = "relative", "patched forward jump");
  }

  /// Patches an absolute-target branch (`SWITCH`/`TRY`), tracing the patch.
  fn patch_absolute_traced(&mut self, handle: PatchHandle, target: usize) {
    self.chunk().patch_absolute(handle, target);
    tracing::trace!(kind = "absolute", target, "patched forward jump");
  }

  fn patch_absolute_here_traced(&mut self, handle: PatchHandle) {
    let target = self.chunk().len();
    self.patch_absolute_traced(handle, target);
  }

  fn enter_loop(&mut self, label: Option<&str>) -> u32 {
    let f = self.current_fn();
    f.loop_level += 1;
    f.break_level += 1;
    f.active_labels.push(label.map(|s| s.to_string()));
    f.loop_level
  }

  /// Resolves every pending `break`/`continue` attached to the loop just
  /// finished: unlabeled entries at this loop's level, plus any entry
  /// carrying this loop's own label.
  fn exit_loop(&mut self, label: Option<&str>, level: u32, continue_target: usize, break_target: usize) {
    self.resolve_unlabeled(PatchKind::Continue, level, continue_target);
    self.resolve_unlabeled(PatchKind::Break, level, break_target);
    if let Some(l) = label {
      self.resolve_labeled(l, continue_target, break_target);
    }
    self.current_fn().active_labels.pop();
  }

  fn enter_switch(&mut self) -> u32 {
    let f = self.current_fn();
    f.break_level += 1;
    f.active_labels.push(None);
    f.break_level
  }

  /// A `switch` only resolves unlabeled `break`; `continue` and any labeled
  /// entry pass through untouched, so they resolve against the enclosing
  /// loop instead.
  fn exit_switch(&mut self, level: u32, break_target: usize) {
    self.resolve_unlabeled(PatchKind::Break, level, break_target);
    self.current_fn().active_labels.pop();
  }

  fn resolve_unlabeled(&mut self, kind: PatchKind, level: u32, target: usize) {
    let exit_scope_depth = self.current_fn().scope_depth;
    let pending = std::mem::take(&mut self.current_fn().pending);
    let mut remaining = Vec::with_capacity(pending.len());
    for p in pending {
      if p.label.is_none() && p.kind == kind && p.level == level {
        self.patch_pending(&p, target, exit_scope_depth);
      } else {
        remaining.push(p);
      }
    }
    self.current_fn().pending = remaining;
  }

  fn resolve_labeled(&mut self, label: &str, continue_target: usize, break_target: usize) {
    let exit_scope_depth = self.current_fn().scope_depth;
    let pending = std::mem::take(&mut self.current_fn().pending);
    let mut remaining = Vec::with_capacity(pending.len());
    for p in pending {
      if p.label.as_deref() == Some(label) {
        let target = match p.kind {
          PatchKind::Break => break_target,
          PatchKind::Continue => continue_target,
        };
        self.patch_pending(&p, target, exit_scope_depth);
      } else {
        remaining.push(p);
      }
    }
    self.current_fn().pending = remaining;
  }

  fn patch_pending(&mut self, p: &PendingPatch, target: usize, exit_scope_depth: u32) {
    self.patch_absolute_traced(p.handle, target);
    let pop_count = p.recorded_scope_depth.saturating_sub(exit_scope_depth);
    self.chunk().patch_byte_at(p.pop_count_offset, pop_count as u8);
  }

  /// Emits a `break`/`continue`'s `GOTO` and queues its patch. A labeled
  /// reference to a label not currently open is a compile error raised
  /// immediately, rather than surfacing later as an unresolved patch.
  fn compile_break_or_continue(
    &mut self,
    label: Option<&str>,
    kind: PatchKind,
    pos: mildew_core::errors::SourcePos,
  ) -> Result<()> {
    if let Some(l) = label {
      let kw = match kind {
        PatchKind::Break => "break",
        PatchKind::Continue => "continue",
      };
      if !self.current_fn().active_labels.iter().any(|a| a.as_deref() == Some(l)) {
        return Err(CompileError::UnknownLabel { pos, kw, label: l.to_string() });
      }
    }
    let level = match kind {
      PatchKind::Continue => self.current_fn().loop_level,
      PatchKind::Break => self.current_fn().break_level,
    };
    let recorded_scope_depth = self.current_fn().scope_depth;
    let handle = self.chunk().emit_placeholder_jump(mildew_core::bytecode::OpCode::Goto);
    let pop_count_offset = self.chunk().len();
    self.chunk().push_byte(0);
    self.current_fn().pending.push(PendingPatch {
      label: label.map(|s| s.to_string()),
      kind,
      handle,
      pop_count_offset,
      recorded_scope_depth,
      level,
      pos,
    });
    Ok(())
  }
}
