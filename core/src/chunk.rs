use crate::bytecode::OpCode;
use crate::values::Value;

/// Sentinel written into a forward-jump's payload bytes until it is
/// patched. Must never survive past the emission of its enclosing
/// construct (asserted by the compiler on function-body completion).
pub const UNPATCHED_JMP: i32 = i32::MAX;

/// A handle to a not-yet-patched forward branch, returned by
/// [`Chunk::emit_placeholder_jump`]. Distinct from a raw `usize` offset so
/// a handle from one chunk cannot accidentally be used to patch another,
/// and so call sites read as "patch this specific branch" rather than
/// "poke this byte offset".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHandle(usize);

/// Per-statement debug info: the byte offset of the first instruction of
/// each statement, paired with its source line. A chunk is itself the
/// unit of identity the spec's `debug_map` is keyed by, so each `Chunk`
/// owns exactly one `DebugInfo` record rather than a separate map.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
  pub source_name: Option<String>,
  pub lines: Vec<(usize, u32)>,
}

impl DebugInfo {
  /// Maps a bytecode offset back to the source line of the statement that
  /// contains it (the last recorded statement whose offset is `<= at`).
  pub fn line_for_offset(&self, at: usize) -> Option<u32> {
    self
      .lines
      .iter()
      .rev()
      .find(|(offset, _)| *offset <= at)
      .map(|(_, line)| *line)
  }
}

/// The compiled unit handed to the VM: bytecode, constant table, and
/// per-statement debug info. The sole output of a `compile()` call.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
  pub bytecode: Vec<u8>,
  pub constant_table: Vec<Value>,
  pub debug: DebugInfo,
}

impl Chunk {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.bytecode.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytecode.is_empty()
  }

  pub fn push_op(&mut self, op: OpCode) -> usize {
    let offset = self.bytecode.len();
    self.bytecode.push(op as u8);
    offset
  }

  pub fn push_byte(&mut self, byte: u8) {
    self.bytecode.push(byte);
  }

  pub fn push_u32(&mut self, value: u32) {
    self.bytecode.extend_from_slice(&value.to_le_bytes());
  }

  pub fn push_i32(&mut self, value: i32) {
    self.bytecode.extend_from_slice(&value.to_le_bytes());
  }

  fn patch_i32_at(&mut self, offset: usize, value: i32) {
    let bytes = value.to_le_bytes();
    self.bytecode[offset..offset + 4].copy_from_slice(&bytes);
  }

  fn patch_u32_at(&mut self, offset: usize, value: u32) {
    let bytes = value.to_le_bytes();
    self.bytecode[offset..offset + 4].copy_from_slice(&bytes);
  }

  /// Patches a single already-emitted byte, for the trailing scope-pop-count
  /// field of a `GOTO` whose value (like its target) is only known once the
  /// enclosing loop/switch is fully emitted.
  pub fn patch_byte_at(&mut self, offset: usize, value: u8) {
    self.bytecode[offset] = value;
  }

  /// Emits `op` followed by a sentinel 4-byte payload, returning a handle
  /// to later overwrite it via [`Chunk::patch_jump`] (relative) or
  /// [`Chunk::patch_absolute`] (absolute). Used for `JMP`, `JMP_FALSE`,
  /// `SWITCH`'s default target, and `TRY`'s catch target.
  pub fn emit_placeholder_jump(&mut self, op: OpCode) -> PatchHandle {
    self.push_op(op);
    let offset = self.bytecode.len();
    self.push_i32(UNPATCHED_JMP);
    PatchHandle(offset)
  }

  /// Patches a relative-displacement placeholder (`JMP`/`JMP_FALSE`) so it
  /// lands on the current end of the bytecode, measured from the byte
  /// immediately following the placeholder's own 4 bytes.
  pub fn patch_jump(&mut self, handle: PatchHandle) {
    let PatchHandle(offset) = handle;
    let target = self.bytecode.len();
    let displacement = target as i64 - (offset as i64 + 4);
    self.patch_i32_at(offset, displacement as i32);
  }

  /// Patches an absolute-target placeholder (`SWITCH` default, `TRY` catch
  /// target) to a given byte offset.
  pub fn patch_absolute(&mut self, handle: PatchHandle, target: usize) {
    let PatchHandle(offset) = handle;
    self.patch_u32_at(offset, target as u32);
  }

  /// Patches an absolute-target placeholder to the chunk's current end.
  pub fn patch_absolute_here(&mut self, handle: PatchHandle) {
    let target = self.bytecode.len();
    self.patch_absolute(handle, target);
  }

  /// Interns a value into the constant table, deduplicating against
  /// existing entries when `value` supports equality comparison (numbers,
  /// strings, bools). Function values are never deduplicated. Returns the
  /// 32-bit index.
  pub fn add_constant(&mut self, value: Value) -> u32 {
    if !matches!(value, Value::Func(_)) {
      if let Some(pos) = self.constant_table.iter().position(|existing| existing == &value) {
        return pos as u32;
      }
    }
    self.constant_table.push(value);
    (self.constant_table.len() - 1) as u32
  }

  pub fn get_constant(&self, idx: u32) -> Option<&Value> {
    self.constant_table.get(idx as usize)
  }

  /// Interns a value without deduplication, for switch-table entries: each
  /// case needs its own constant slot to patch independently even when two
  /// cases' placeholder sentinels start out equal.
  pub fn push_placeholder_constant(&mut self, value: Value) -> u32 {
    self.constant_table.push(value);
    (self.constant_table.len() - 1) as u32
  }

  /// Overwrites a previously-interned constant table entry in place, once a
  /// switch case's placeholder target byte offset is known.
  pub fn patch_constant(&mut self, idx: u32, value: Value) {
    self.constant_table[idx as usize] = value;
  }

  /// Records the byte offset of the current end of the chunk as the start
  /// of a new statement at `line`, for the per-statement debug map.
  pub fn mark_statement(&mut self, line: u32) {
    self.debug.lines.push((self.bytecode.len(), line));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn little_endian_u32() {
    let mut chunk = Chunk::new();
    chunk.push_u32(0x0102_0304);
    assert_eq!(&chunk.bytecode, &[0x04, 0x03, 0x02, 0x01]);
  }

  #[test]
  fn jump_patch_is_relative_from_after_payload() {
    let mut chunk = Chunk::new();
    let handle = chunk.emit_placeholder_jump(OpCode::Jmp);
    chunk.push_op(OpCode::Pop);
    chunk.push_op(OpCode::Pop);
    chunk.patch_jump(handle);
    let PatchHandle(offset) = handle;
    let bytes: [u8; 4] = chunk.bytecode[offset..offset + 4].try_into().unwrap();
    assert_eq!(i32::from_le_bytes(bytes), 2);
  }

  #[test]
  fn constant_dedup_for_scalars_not_functions() {
    let mut chunk = Chunk::new();
    let a = chunk.add_constant(Value::Int(9));
    let b = chunk.add_constant(Value::Int(9));
    assert_eq!(a, b);
    assert_eq!(chunk.constant_table.len(), 1);
  }

  #[test]
  fn absolute_patch_writes_a_fixed_target_not_a_displacement() {
    let mut chunk = Chunk::new();
    let handle = chunk.emit_placeholder_jump(OpCode::Switch);
    chunk.patch_absolute(handle, 42);
    let PatchHandle(offset) = handle;
    let bytes: [u8; 4] = chunk.bytecode[offset..offset + 4].try_into().unwrap();
    assert_eq!(u32::from_le_bytes(bytes), 42);
  }

  #[test]
  fn debug_info_maps_an_offset_back_to_its_enclosing_statement_line() {
    let mut info = DebugInfo::default();
    info.lines.push((0, 1));
    info.lines.push((10, 2));
    assert_eq!(info.line_for_offset(0), Some(1));
    assert_eq!(info.line_for_offset(5), Some(1));
    assert_eq!(info.line_for_offset(10), Some(2));
    assert_eq!(info.line_for_offset(999), Some(2));
  }

  #[test]
  fn debug_info_has_no_line_before_the_first_recorded_statement() {
    let mut info = DebugInfo::default();
    info.lines.push((10, 1));
    assert_eq!(info.line_for_offset(0), None);
  }
}
