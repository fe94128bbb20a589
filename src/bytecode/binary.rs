/*!
  This module is responsible for the encoding and decoding of wordcode.

  Decoding absorbs `EXTENDED_ARG` prefixes: a prefix is never emitted on its own; its operand
  byte is shifted into an accumulator that the next instruction ORs into its own operand byte.
  The emitted instruction spans from the first prefix to the end of its own code unit.

  Operands are 32 bits wide, so three prefixes are the most that can contribute. Bytes shifted
  past the top of the accumulator by a fourth prefix are dropped.
*/

use super::{Opcode, VersionTable};
use crate::error::{DisassemblyError, Result};

/// Size in bytes of one code unit.
pub const CODE_UNIT: usize = 2;

/// An instruction as it appears in the stream, before its operand is resolved.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawInstruction {
  /// Offset of the first byte, including any `EXTENDED_ARG` prefixes.
  pub offset     : usize,
  /// Offset one past the instruction's own code unit.
  pub end_offset : usize,
  pub opcode     : Opcode,
  /// The stitched operand, for kinds that take one.
  pub arg        : Option<u32>,
}

/**
  Reads wordcode one instruction at a time. The reader is a single forward pass; it stops after
  yielding the first error.
*/
#[derive(Debug)]
pub struct WordcodeReader<'a> {
  bytes        : &'a [u8],
  table        : &'a VersionTable,
  position     : usize,
  extended_arg : u32,
  failed       : bool,
}

impl<'a> WordcodeReader<'a> {

  pub fn new(bytes: &'a [u8], table: &'a VersionTable) -> Result<WordcodeReader<'a>> {
    if bytes.len() % CODE_UNIT != 0 {
      return Err(DisassemblyError::OddLength { length: bytes.len() });
    }
    Ok(WordcodeReader {
      bytes,
      table,
      position     : 0,
      extended_arg : 0,
      failed       : false,
    })
  }

}

impl<'a> Iterator for WordcodeReader<'a> {
  type Item = Result<RawInstruction>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }

    let start = self.position;
    while self.position < self.bytes.len() {
      let position = self.position;
      let id       = self.bytes[position];
      let raw      = self.bytes[position + 1] as u32;
      self.position += CODE_UNIT;

      let opcode = match self.table.kind(id) {
        Some(opcode) => opcode,
        None => {
          self.failed = true;
          return Some(Err(DisassemblyError::UnknownOpcode {
            opcode: id,
            offset: position,
            revision: self.table.revision(),
          }));
        }
      };

      if opcode == Opcode::ExtendedArg {
        // Shifting a `u32` by 8 discards the high byte.
        self.extended_arg = (raw | self.extended_arg) << 8;
        continue;
      }

      let arg = match opcode.has_argument() {
        true  => Some(raw | self.extended_arg),
        false => None
      };
      self.extended_arg = 0;

      return Some(Ok(RawInstruction {
        offset: start,
        end_offset: self.position,
        opcode,
        arg,
      }));
    }

    // Either the end of the stream or a trailing run of prefixes with nothing to apply them to.
    None
  }
}

/**
  Encodes one instruction, preceded by as many `EXTENDED_ARG` units as its operand needs. It is
  the caller's responsibility to supply an operand exactly when the kind takes one; a missing
  operand encodes as zero and a superfluous one is ignored.
*/
pub fn encode_instruction(table: &VersionTable, opcode: Opcode, arg: Option<u32>)
  -> Result<Vec<u8>>
{
  let id = table.id(opcode).ok_or_else(|| DisassemblyError::Assembly {
    line: 0,
    message: format!("{} has no opcode in revision {}", opcode, table.revision()),
  })?;

  let arg = match opcode.has_argument() {
    true  => arg.unwrap_or(0),
    false => 0
  };

  let mut bytes = Vec::with_capacity(4 * CODE_UNIT);
  if arg > 0xFF {
    let extended_arg = table.id(Opcode::ExtendedArg).ok_or_else(|| DisassemblyError::Assembly {
      line: 0,
      message: format!("revision {} has no EXTENDED_ARG", table.revision()),
    })?;
    let prefixes = arg.to_be_bytes();
    let first    = prefixes.iter().position(|byte| *byte != 0).unwrap_or(3);
    for byte in &prefixes[first..3] {
      bytes.push(extended_arg);
      bytes.push(*byte);
    }
  }
  bytes.push(id);
  bytes.push(arg as u8);
  Ok(bytes)
}

/// Encodes a sequence of instructions for the given table.
pub fn encode(table: &VersionTable, instructions: &[(Opcode, Option<u32>)]) -> Result<Vec<u8>> {
  let mut bytes = Vec::with_capacity(instructions.len() * CODE_UNIT);
  for (opcode, arg) in instructions {
    bytes.extend(encode_instruction(table, *opcode, *arg)?);
  }
  Ok(bytes)
}
