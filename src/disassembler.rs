/*!
  Disassembles a code object into a linked instruction list.

  The pipeline is this:
  ```text
  bytes -> [`WordcodeReader`] -> `RawInstruction`s ->⋯

  ⋯-> [`resolve_operand`] + [`LineCursor`] + [`pretty_arg`] -> `DecodedInstruction`s ->⋯

  ⋯-> [`Disassembly::link`] -> linked `Disassembly`
  ```
  The first pass materializes one instruction per non-prefix code unit and records where each
  one starts. The second pass turns jump operands, which are byte offsets by then, into
  instruction indices and wires up the `prev`/`next` adjacency.
*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};
use tracing::{debug, instrument};
#[cfg(feature = "trace_disassembly")]
use tracing::trace;

use crate::bytecode::{Revision, WordcodeReader};
use crate::code::CodeObject;
use crate::error::{DisassemblyError, Result};
use crate::instruction::{Argument, DecodedInstruction};
use crate::linetable::LineCursor;
use crate::operand::{pretty_arg, resolve_operand};

/// The decoded instructions of one code object, in stream order.
#[derive(Clone, Debug, PartialEq)]
pub struct Disassembly {
  revision     : Revision,
  instructions : Vec<DecodedInstruction>,
  /// Start offset to index.
  offsets      : HashMap<usize, usize>,
}

impl Disassembly {

  // region Accessors

  pub fn revision(&self) -> Revision {
    self.revision
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&DecodedInstruction> {
    self.instructions.get(index)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DecodedInstruction> {
    self.instructions.iter()
  }

  pub fn instructions(&self) -> &[DecodedInstruction] {
    &self.instructions
  }

  pub fn into_instructions(self) -> Vec<DecodedInstruction> {
    self.instructions
  }

  /// The index of the instruction starting at `offset`, counting `EXTENDED_ARG` prefixes as
  /// part of the instruction they extend.
  pub fn index_of_offset(&self, offset: usize) -> Option<usize> {
    self.offsets.get(&offset).copied()
  }

  pub fn prev_of(&self, instruction: &DecodedInstruction) -> Option<&DecodedInstruction> {
    instruction.prev.and_then(|index| self.get(index))
  }

  pub fn next_of(&self, instruction: &DecodedInstruction) -> Option<&DecodedInstruction> {
    instruction.next.and_then(|index| self.get(index))
  }

  pub fn target_of(&self, instruction: &DecodedInstruction) -> Option<&DecodedInstruction> {
    instruction.target.and_then(|index| self.get(index))
  }

  // endregion

  /// Decodes the code object's wordcode without linking jumps.
  fn decode(code: &CodeObject) -> Result<Disassembly> {
    let (major, minor) = code.version;
    let revision       = Revision::from_version(major, minor)?;
    let mut lines      = LineCursor::new(revision, code);
    let reader         = WordcodeReader::new(&code.code, revision.table())?;

    let mut instructions = Vec::with_capacity(code.code.len() / 2);
    let mut offsets      = HashMap::new();

    for raw in reader {
      let raw   = raw?;
      let index = instructions.len();
      let line  = lines.get(raw.offset);

      let (arg, pretty) = match raw.arg {
        Some(raw_arg) => {
          let arg = resolve_operand(raw.opcode, raw_arg, raw.offset, raw.end_offset, revision)?;
          (Some(arg), pretty_arg(raw.opcode, arg, raw.offset, code, revision)?)
        }
        None => (None, None)
      };

      let instruction =
        DecodedInstruction::new(index, line, raw.offset, raw.end_offset, raw.opcode, arg, pretty);

      #[cfg(feature = "trace_disassembly")]
      trace!(index, offset = raw.offset, line, instruction = %instruction, "decoded");

      offsets.insert(raw.offset, index);
      instructions.push(instruction);
    }

    Ok(Disassembly { revision, instructions, offsets })
  }

  /// Replaces jump byte offsets with target indices and assigns `prev` and `next`.
  fn link(mut self) -> Result<Disassembly> {
    let count = self.instructions.len();

    for index in 0..count {
      let target = {
        let instruction = &self.instructions[index];
        match &instruction.arg {

          Argument::Value(address) if instruction.has_known_jump() => {
            let target = self.offsets.get(&(*address as usize)).copied().ok_or(
              DisassemblyError::InvalidJumpTarget {
                offset: instruction.offset,
                target: *address as i64,
              }
            )?;
            Some(target)
          }

          _ => None
        }
      };

      let instruction = &mut self.instructions[index];
      if let Some(target) = target {
        instruction.arg    = Argument::Target(target);
        instruction.target = Some(target);
      }
      instruction.prev = index.checked_sub(1);
      instruction.next = match instruction.is_backward_jump() {
        true                      => instruction.prev,
        false if index + 1 < count => Some(index + 1),
        false                     => None
      };
    }

    Ok(self)
  }

}

/**
  Disassembles the code object's wordcode into a fully linked instruction list.

  Fails if the declared version is not a supported revision, if the stream contains an id the
  revision does not define, if an operand indexes past the end of its side table, or if a jump
  lands anywhere but the start of an instruction.
*/
#[instrument(
  name = "wordcode::disassemble",
  level = "debug",
  skip(code),
  fields(version = ?code.version, length = code.code.len())
)]
pub fn disassemble(code: &CodeObject) -> Result<Disassembly> {
  let result = Disassembly::decode(code).and_then(Disassembly::link);
  match &result {
    Ok(disassembly) => debug!(instructions = disassembly.len(), "disassembled"),
    Err(error)      => debug!(%error, "disassembly failed"),
  }
  result
}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Disassembly {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(
      row![ubr->"#", ubr->"Offset", ubr->"Line", ubl->"Instruction", ubr->"Arg", ubl->"Detail"]
    );

    for instruction in &self.instructions {
      let arg = match instruction.arg() {
        Argument::None          => String::new(),
        Argument::Value(value)  => value.to_string(),
        Argument::Target(index) => format!("-> {}", index),
        Argument::Folded(_)     => String::new(),
      };
      let detail = match instruction.arg() {
        Argument::Folded(value) => value.to_string(),
        _ => instruction.pretty_arg().map(ToString::to_string).unwrap_or_default()
      };

      table.add_row(row![
        r->instruction.index(),
        r->instruction.offset(),
        r->instruction.line(),
        instruction.name(),
        r->arg,
        detail
      ]);
    }

    write!(f, "Revision {}\n{}", self.revision, table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{assemble, Opcode};
  use crate::code::Constant;
  use crate::instruction::PrettyArg;
  use string_cache::DefaultAtom;

  const REVISIONS: [Revision; 4] = [Revision::Py38, Revision::Py39, Revision::Py310, Revision::Py311];

  fn code_for(revision: Revision, text: &str) -> CodeObject {
    CodeObject::new(revision.version(), assemble(revision, text).unwrap())
      .with_consts(vec![Constant::None, Constant::Int(1)])
      .with_names(vec!["print", "len"])
      .with_varnames(vec!["x", "y"])
  }

  fn names(disassembly: &Disassembly) -> Vec<&'static str> {
    disassembly.iter().map(DecodedInstruction::name).collect()
  }

  #[test]
  fn argumentless_stream_in_every_revision(){
    for revision in &REVISIONS {
      let code = code_for(*revision, "NOP\nNOP\nNOP\nNOP\nNOP");
      let disassembly = disassemble(&code).unwrap();
      assert_eq!(disassembly.len(), code.code.len() / 2);
      let offsets: Vec<usize> = disassembly.iter().map(|i| i.offset()).collect();
      assert_eq!(offsets, vec![0, 2, 4, 6, 8]);
      let indices: Vec<usize> = disassembly.iter().map(|i| i.index()).collect();
      assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }
  }

  #[test]
  fn add_two_locals(){
    let bytes = vec![0x7c, 0, 0x7c, 0, 0x17, 0, 0x01, 0, 0x64, 0, 0x53, 0];
    for revision in &[Revision::Py38, Revision::Py39, Revision::Py310] {
      let code = CodeObject::new(revision.version(), bytes.clone())
        .with_consts(vec![Constant::None])
        .with_varnames(vec!["a"]);
      let disassembly = disassemble(&code).unwrap();
      assert_eq!(
        names(&disassembly),
        vec!["LOAD_FAST", "LOAD_FAST", "BINARY_ADD", "POP_TOP", "LOAD_CONST", "RETURN_VALUE"]
      );
      assert_eq!(disassembly.get(0).unwrap().arg(), &Argument::Value(0));
      assert_eq!(
        disassembly.get(0).unwrap().pretty_arg(),
        Some(&PrettyArg::Name(DefaultAtom::from("a")))
      );
      assert_eq!(disassembly.get(2).unwrap().arg(), &Argument::None);
      assert_eq!(
        disassembly.get(4).unwrap().pretty_arg(),
        Some(&PrettyArg::Constant(Constant::None))
      );
      let ret = disassembly.get(5).unwrap();
      assert!(!ret.carries_on_to_next());
      assert_eq!(ret.next(), None);
      assert_eq!(ret.prev(), Some(4));
    }
  }

  #[test]
  fn extended_args_in_the_driver(){
    let code = CodeObject::new((3, 8), vec![144, 1, 144, 2, 102, 3, 1, 0]);
    let disassembly = disassemble(&code).unwrap();
    assert_eq!(disassembly.len(), 2);
    assert_eq!(disassembly.get(0).unwrap().opcode(), Opcode::BuildTuple);
    assert_eq!(disassembly.get(0).unwrap().arg(), &Argument::Value(0x010203));
    assert_eq!(disassembly.get(0).unwrap().end_offset(), 6);
    assert_eq!(disassembly.get(1).unwrap().offset(), 6);
    assert_eq!(disassembly.index_of_offset(6), Some(1));
    assert_eq!(disassembly.index_of_offset(2), None);
  }

  #[test]
  fn lnotab_lines(){
    let code = code_for(Revision::Py38, "NOP\nNOP\nNOP\nNOP\nNOP")
      .with_linetable(vec![2, 1, 2, 1, 2, 0xFE]);
    let lines: Vec<u32> = disassemble(&code).unwrap().iter().map(|i| i.line()).collect();
    assert_eq!(lines, vec![1, 2, 3, 1, 1]);
  }

  #[test]
  fn linetable_lines(){
    let code = code_for(Revision::Py310, "NOP\nNOP\nNOP")
      .with_first_line(10)
      .with_linetable(vec![2, 0, 4, 2]);
    let lines: Vec<u32> = disassemble(&code).unwrap().iter().map(|i| i.line()).collect();
    assert_eq!(lines, vec![10, 12, 12]);
  }

  #[test]
  fn positions_lines(){
    let code = code_for(Revision::Py311, "RESUME 0\nLOAD_CONST 0\nRETURN_VALUE")
      .with_first_line(4)
      .with_positions(vec![Some(4), Some(5), Some(6)]);
    let lines: Vec<u32> = disassemble(&code).unwrap().iter().map(|i| i.line()).collect();
    assert_eq!(lines, vec![4, 5, 6]);
  }

  #[test]
  fn absolute_jump_in_38(){
    let code = code_for(Revision::Py38, "
      LOAD_FAST 0
      POP_JUMP_IF_FALSE 8
      LOAD_CONST 0
      RETURN_VALUE
      LOAD_CONST 1
      RETURN_VALUE
    ");
    let disassembly = disassemble(&code).unwrap();
    let jump = disassembly.get(1).unwrap();
    assert_eq!(jump.arg(), &Argument::Target(4));
    assert_eq!(jump.target(), Some(4));
    assert_eq!(jump.pretty_arg(), Some(&PrettyArg::Address(8)));
    assert_eq!(jump.next(), Some(2));
    assert_eq!(disassembly.target_of(jump).unwrap().offset(), 8);
    assert_eq!(disassembly.next_of(jump).unwrap().name(), "LOAD_CONST");
    assert_eq!(disassembly.prev_of(jump).unwrap().name(), "LOAD_FAST");
  }

  #[test]
  fn loop_in_39(){
    let code = code_for(Revision::Py39, "
      LOAD_FAST 0      # 0
      GET_ITER         # 2
      FOR_ITER 4       # 4, exits to 10
      STORE_FAST 1     # 6
      JUMP_ABSOLUTE 4  # 8
      LOAD_CONST 0     # 10
      RETURN_VALUE     # 12
    ");
    let disassembly = disassemble(&code).unwrap();
    assert_eq!(disassembly.get(2).unwrap().target(), Some(5));
    let back = disassembly.get(4).unwrap();
    assert_eq!(back.target(), Some(2));
    assert!(!back.carries_on_to_next());
    assert_eq!(back.next(), Some(5));
  }

  #[test]
  fn setup_finally_stores_its_handler(){
    let code = code_for(Revision::Py39, "
      SETUP_FINALLY 4  # 0, handler at 6
      NOP              # 2
      POP_BLOCK        # 4
      POP_TOP          # 6
      LOAD_CONST 0     # 8
      RETURN_VALUE     # 10
    ");
    let disassembly = disassemble(&code).unwrap();
    let setup = disassembly.get(0).unwrap();
    assert!(setup.pushes_block());
    assert!(setup.stores_jump());
    assert!(!setup.does_jump());
    assert_eq!(setup.target(), Some(3));
    assert!(disassembly.get(2).unwrap().pops_block());
  }

  #[test]
  fn absolute_jumps_count_words_in_310(){
    let code = code_for(Revision::Py310, "
      LOAD_FAST 0
      POP_JUMP_IF_FALSE 4  # word 4 is offset 8
      LOAD_CONST 0
      RETURN_VALUE
      LOAD_CONST 1
      RETURN_VALUE
    ");
    let disassembly = disassemble(&code).unwrap();
    assert_eq!(disassembly.get(1).unwrap().target(), Some(4));
  }

  #[test]
  fn for_loop_in_310(){
    // for x in y: pass
    let code = CodeObject::new((3, 10), vec![101, 0, 68, 0, 93, 2, 90, 1, 113, 2, 100, 0, 83, 0])
      .with_consts(vec![Constant::None])
      .with_names(vec!["y", "x"]);
    let disassembly = disassemble(&code).unwrap();
    assert_eq!(
      names(&disassembly),
      vec!["LOAD_NAME", "GET_ITER", "FOR_ITER", "STORE_NAME", "JUMP_ABSOLUTE", "LOAD_CONST",
           "RETURN_VALUE"]
    );
    let for_iter = disassembly.get(2).unwrap();
    assert_eq!(for_iter.target(), Some(5));
    assert_eq!(for_iter.pretty_arg(), Some(&PrettyArg::Address(10)));
    assert_eq!(disassembly.target_of(for_iter).unwrap().name(), "LOAD_CONST");
    assert_eq!(disassembly.get(4).unwrap().target(), Some(2));
  }

  #[test]
  fn code_without_side_tables(){
    // LOAD_NAME 0, LOAD_CONST 0, LOAD_CONST 1, CALL_FUNCTION 2, RETURN_VALUE
    let code = CodeObject::new((3, 8), vec![0x65, 0, 0x64, 0, 0x64, 1, 0x83, 2, 0x53, 0]);
    let disassembly = disassemble(&code).unwrap();
    assert_eq!(disassembly.len(), 5);
    assert!(disassembly.iter().all(|i| i.pretty_arg().is_none()));
    assert_eq!(disassembly.get(2).unwrap().arg(), &Argument::Value(1));
    assert_eq!(disassembly.get(3).unwrap().to_string(), "CALL_FUNCTION 2");
  }

  #[test]
  fn backward_jump_in_311(){
    let code = code_for(Revision::Py311, "
      RESUME 0           # 0
      NOP                # 2
      NOP                # 4
      JUMP_BACKWARD 3    # 6, back to 2
      LOAD_CONST 0       # 8
      RETURN_VALUE       # 10
    ");
    let disassembly = disassemble(&code).unwrap();
    let jump = disassembly.get(3).unwrap();
    assert!(jump.is_backward_jump());
    assert_eq!(jump.target(), Some(1));
    assert_eq!(jump.prev(), Some(2));
    assert_eq!(jump.next(), jump.prev());
    assert_eq!(disassembly.get(4).unwrap().prev(), Some(3));
  }

  #[test]
  fn forward_jumps_in_311(){
    let code = code_for(Revision::Py311, "
      RESUME 0                     # 0
      LOAD_FAST 0                  # 2
      POP_JUMP_FORWARD_IF_FALSE 2  # 4, over 2 units to 10
      LOAD_CONST 0                 # 6
      RETURN_VALUE                 # 8
      LOAD_CONST 1                 # 10
      RETURN_VALUE                 # 12
    ");
    let disassembly = disassemble(&code).unwrap();
    let jump = disassembly.get(2).unwrap();
    assert_eq!(jump.target(), Some(5));
    assert_eq!(jump.next(), Some(3));
  }

  #[test]
  fn load_global_in_311(){
    let code = code_for(Revision::Py311, "RESUME 0\nLOAD_GLOBAL 3\nRETURN_VALUE");
    let load = disassemble(&code).unwrap().get(1).cloned().unwrap();
    assert_eq!(load.arg(), &Argument::Value(1));
    assert_eq!(load.pretty_arg(), Some(&PrettyArg::Name(DefaultAtom::from("len"))));
  }

  #[test]
  fn jump_into_an_extended_instruction(){
    // The target offset is the first EXTENDED_ARG prefix, not the instruction's own unit.
    let code = CodeObject::new((3, 8), vec![113, 2, 144, 1, 102, 0, 83, 0]);
    let disassembly = disassemble(&code).unwrap();
    assert_eq!(disassembly.get(0).unwrap().target(), Some(1));
    assert_eq!(disassembly.get(1).unwrap().arg(), &Argument::Value(256));
  }

  #[test]
  fn misaligned_jump_target(){
    let code = CodeObject::new((3, 8), vec![113, 3, 9, 0, 83, 0]);
    assert_eq!(
      disassemble(&code),
      Err(DisassemblyError::InvalidJumpTarget { offset: 0, target: 3 })
    );
  }

  #[test]
  fn jump_past_the_end(){
    let code = CodeObject::new((3, 9), vec![110, 4, 83, 0]);
    assert_eq!(
      disassemble(&code),
      Err(DisassemblyError::InvalidJumpTarget { offset: 0, target: 6 })
    );
  }

  #[test]
  fn unsupported_revision(){
    let code = CodeObject::new((3, 7), vec![1, 0]);
    assert_eq!(
      disassemble(&code),
      Err(DisassemblyError::UnsupportedRevision { major: 3, minor: 7 })
    );
  }

  #[test]
  fn unknown_opcode(){
    // BINARY_ADD no longer exists in 3.11.
    let code = CodeObject::new((3, 11), vec![151, 0, 23, 0]);
    assert_eq!(
      disassemble(&code),
      Err(DisassemblyError::UnknownOpcode { opcode: 23, offset: 2, revision: Revision::Py311 })
    );
  }

  #[test]
  fn disassembly_is_deterministic(){
    let code = code_for(Revision::Py39, "
      LOAD_FAST 0
      POP_JUMP_IF_TRUE 8
      LOAD_GLOBAL 0
      POP_TOP
      LOAD_CONST 1
      RETURN_VALUE
    ");
    assert_eq!(disassemble(&code).unwrap(), disassemble(&code).unwrap());
  }

  #[test]
  fn empty_code(){
    let disassembly = disassemble(&CodeObject::new((3, 10), vec![])).unwrap();
    assert!(disassembly.is_empty());
    assert_eq!(disassembly.revision(), Revision::Py310);
  }

  #[test]
  fn table_display(){
    let code = code_for(Revision::Py38, "LOAD_FAST 1\nPOP_JUMP_IF_FALSE 0\nRETURN_VALUE");
    let text = disassemble(&code).unwrap().to_string();
    assert!(text.starts_with("Revision 3.8"));
    assert!(text.contains("LOAD_FAST"));
    assert!(text.contains("-> 0"));
    assert!(text.contains("RETURN_VALUE"));
  }
}
