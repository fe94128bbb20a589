//! Errors surfaced by disassembly and assembly. Decoding is a pure function of its input, so
//! every error describes malformed input or an unsupported revision; nothing is retried.

use crate::bytecode::Revision;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisassemblyError {
  #[error("unsupported bytecode revision {major}.{minor}")]
  UnsupportedRevision {
    major: u8,
    minor: u8,
  },

  #[error("unknown opcode {opcode} at offset {offset} for revision {revision}")]
  UnknownOpcode {
    opcode: u8,
    offset: usize,
    revision: Revision,
  },

  #[error("wordcode must have an even length, got {length} bytes")]
  OddLength {
    length: usize,
  },

  #[error("jump at offset {offset} targets {target}, which is not the start of an instruction")]
  InvalidJumpTarget {
    offset: usize,
    target: i64,
  },

  #[error("{table} table has no entry {index} (instruction at offset {offset})")]
  MissingSideTableEntry {
    table: SideTable,
    index: u32,
    offset: usize,
  },

  #[error("assembly error on line {line}: {message}")]
  Assembly {
    line: usize,
    message: String,
  },
}

/// The code object table an operand was dereferenced into.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum SideTable {
  Constants,
  Names,
  Varnames,
  /// Cell variables followed by free variables.
  CellAndFreeVars,
  LocalsPlusNames,
}

pub type Result<T> = std::result::Result<T, DisassemblyError>;
