//! A decoded instruction and the operand forms it can carry.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

use crate::bytecode::Opcode;
use crate::code::Constant;

/// The semantic operand of a decoded instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
  None,
  /// A resolved operand. For jumps this is the absolute byte offset of the target until the
  /// jump is linked.
  Value(u32),
  /// A linked jump: the index of the target instruction.
  Target(usize),
  /// The value loaded by a `LOAD_FOLDED_CONST`.
  Folded(Constant),
}

/// The operand dereferenced into a side table.
#[derive(Clone, Debug, PartialEq)]
pub enum PrettyArg {
  Constant(Constant),
  Name(DefaultAtom),
  /// The byte offset a jump resolved to.
  Address(u32),
}

impl Display for PrettyArg {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      PrettyArg::Constant(constant) => write!(f, "{}", constant),
      PrettyArg::Name(name)         => write!(f, "{}", name),
      PrettyArg::Address(address)   => write!(f, "to {}", address),
    }
  }
}

/**
  One instruction of a disassembly.

  `prev`, `next` and `target` are indices into the owning `Disassembly`. `next` is the following
  instruction, except after a backward jump, where it is the preceding one: control never falls
  forward past a backward jump.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedInstruction {
  pub(crate) index      : usize,
  pub(crate) line       : u32,
  pub(crate) offset     : usize,
  pub(crate) end_offset : usize,
  pub(crate) opcode     : Opcode,
  pub(crate) arg        : Argument,
  pub(crate) pretty_arg : Option<PrettyArg>,
  pub(crate) prev       : Option<usize>,
  pub(crate) next       : Option<usize>,
  pub(crate) target     : Option<usize>,
}

impl DecodedInstruction {

  pub(crate) fn new(
    index: usize,
    line: u32,
    offset: usize,
    end_offset: usize,
    opcode: Opcode,
    arg: Option<u32>,
    pretty_arg: Option<PrettyArg>
  ) -> DecodedInstruction {
    DecodedInstruction {
      index,
      line,
      offset,
      end_offset,
      opcode,
      arg: arg.map_or(Argument::None, Argument::Value),
      pretty_arg,
      prev: None,
      next: None,
      target: None,
    }
  }

  /// A `LOAD_FOLDED_CONST` carrying an already computed value.
  pub fn folded_constant(index: usize, line: u32, offset: usize, value: Constant)
    -> DecodedInstruction
  {
    DecodedInstruction {
      index,
      line,
      offset,
      end_offset: offset,
      opcode: Opcode::LoadFoldedConst,
      pretty_arg: Some(PrettyArg::Constant(value.clone())),
      arg: Argument::Folded(value),
      prev: None,
      next: None,
      target: None,
    }
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn line(&self) -> u32 {
    self.line
  }

  pub fn offset(&self) -> usize {
    self.offset
  }

  pub fn end_offset(&self) -> usize {
    self.end_offset
  }

  pub fn opcode(&self) -> Opcode {
    self.opcode
  }

  pub fn name(&self) -> &'static str {
    self.opcode.name()
  }

  pub fn arg(&self) -> &Argument {
    &self.arg
  }

  pub fn pretty_arg(&self) -> Option<&PrettyArg> {
    self.pretty_arg.as_ref()
  }

  pub fn prev(&self) -> Option<usize> {
    self.prev
  }

  pub fn next(&self) -> Option<usize> {
    self.next
  }

  pub fn target(&self) -> Option<usize> {
    self.target
  }

  // region Flag predicates

  pub fn has_argument(&self) -> bool {
    self.opcode.has_argument()
  }

  pub fn has_jump(&self) -> bool {
    self.opcode.has_jump()
  }

  pub fn has_known_jump(&self) -> bool {
    self.opcode.has_known_jump()
  }

  pub fn has_unknown_jump(&self) -> bool {
    self.opcode.has_unknown_jump()
  }

  pub fn carries_on_to_next(&self) -> bool {
    self.opcode.carries_on_to_next()
  }

  pub fn no_next(&self) -> bool {
    self.opcode.no_next()
  }

  pub fn does_jump(&self) -> bool {
    self.opcode.does_jump()
  }

  pub fn stores_jump(&self) -> bool {
    self.opcode.stores_jump()
  }

  pub fn pushes_block(&self) -> bool {
    self.opcode.pushes_block()
  }

  pub fn pops_block(&self) -> bool {
    self.opcode.pops_block()
  }

  pub fn is_backward_jump(&self) -> bool {
    self.opcode.is_backward_jump()
  }

  // endregion

}

impl Display for DecodedInstruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match (&self.arg, &self.pretty_arg) {

      (Argument::None, _) => write!(f, "{}", self.opcode),

      (Argument::Target(index), _) => write!(f, "{} -> {}", self.opcode, index),

      (Argument::Folded(value), _) => write!(f, "{} {}", self.opcode, value),

      (Argument::Value(arg), Some(pretty)) => write!(f, "{} {} ({})", self.opcode, arg, pretty),

      (Argument::Value(arg), None) => write!(f, "{} {}", self.opcode, arg),

    }
  }
}
