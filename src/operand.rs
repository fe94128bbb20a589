/*!
  Turns raw operands into semantic operands and dereferences them into the code object's side
  tables.

  After `resolve_operand`, the operand of every jump is the absolute byte offset of its target,
  whatever the revision:

  | Revision  | Relative jump            | Absolute jump   |
  |-----------|--------------------------|-----------------|
  | 3.8, 3.9  | `end + arg`              | `arg`           |
  | 3.10      | `end + arg * 2`          | `arg * 2`       |
  | 3.11      | `end ± arg * 2`          | (none)          |

  From 3.10 on, jump operands count code units rather than bytes.

  In 3.11 every jump is relative and the `*JUMP_BACKWARD*` family counts toward the start of the
  code. `LOAD_GLOBAL` in 3.11 packs a push-null bit under its name index; the bit is dropped
  before anything else happens to the operand.
*/

use string_cache::DefaultAtom;

use crate::bytecode::{Opcode, Revision};
use crate::code::CodeObject;
use crate::error::{DisassemblyError, Result, SideTable};
use crate::instruction::PrettyArg;

/**
  Resolves the raw operand of the instruction spanning `offset..end_offset`. Non-jump operands
  pass through unchanged, except for the 3.11 `LOAD_GLOBAL` adjustment.
*/
pub fn resolve_operand(
  opcode     : Opcode,
  raw        : u32,
  offset     : usize,
  end_offset : usize,
  revision   : Revision
) -> Result<u32> {
  match revision {

    Revision::Py38 | Revision::Py39 => {
      match opcode.has_relative_jump() {
        true  => relative_target(offset, end_offset, raw as i64),
        false => Ok(raw)
      }
    }

    Revision::Py310 => {
      if opcode.has_absolute_jump() {
        jump_target(offset, 2 * raw as i64)
      } else if opcode.has_relative_jump() {
        relative_target(offset, end_offset, 2 * raw as i64)
      } else {
        Ok(raw)
      }
    }

    Revision::Py311 => {
      let raw = match opcode {
        Opcode::LoadGlobal => raw >> 1,
        _                  => raw
      };
      if !opcode.has_jump() {
        return Ok(raw);
      }
      let delta = match opcode.is_backward_jump() {
        true  => -2 * raw as i64,
        false => 2 * raw as i64
      };
      relative_target(offset, end_offset, delta)
    }

  }
}

fn relative_target(offset: usize, end_offset: usize, delta: i64) -> Result<u32> {
  jump_target(offset, end_offset as i64 + delta)
}

fn jump_target(offset: usize, target: i64) -> Result<u32> {
  match target >= 0 && target <= u32::MAX as i64 {
    true  => Ok(target as u32),
    false => Err(DisassemblyError::InvalidJumpTarget { offset, target })
  }
}

fn name_at<'a, I>(names: I, table: SideTable, index: u32, offset: usize)
  -> Result<Option<PrettyArg>>
  where I: IntoIterator<Item = &'a DefaultAtom>
{
  let mut names = names.into_iter().peekable();
  if names.peek().is_none() {
    return Ok(None);
  }
  names
    .nth(index as usize)
    .map(|name| Some(PrettyArg::Name(name.clone())))
    .ok_or(DisassemblyError::MissingSideTableEntry { table, index, offset })
}

/**
  Dereferences a resolved operand into the one side table its kind names. Jump operands are
  reported as the byte address they resolved to. Operands of kinds that name no table, or whose
  table is empty, have no pretty form. An index past the end of a non-empty table is an error.
*/
pub fn pretty_arg(
  opcode   : Opcode,
  arg      : u32,
  offset   : usize,
  code     : &CodeObject,
  revision : Revision
) -> Result<Option<PrettyArg>> {
  if opcode.has_jump() {
    Ok(Some(PrettyArg::Address(arg)))
  } else if opcode.has_const() {
    if code.consts.is_empty() {
      return Ok(None);
    }
    code
      .consts
      .get(arg as usize)
      .map(|constant| Some(PrettyArg::Constant(constant.clone())))
      .ok_or(DisassemblyError::MissingSideTableEntry {
        table: SideTable::Constants,
        index: arg,
        offset
      })
  } else if opcode.has_name() {
    name_at(&code.names, SideTable::Names, arg, offset)
  } else if opcode.has_local() {
    name_at(&code.varnames, SideTable::Varnames, arg, offset)
  } else if opcode.has_free() {
    match revision {
      Revision::Py311 => name_at(&code.localsplusnames, SideTable::LocalsPlusNames, arg, offset),
      _ => name_at(code.cell_and_free_vars(), SideTable::CellAndFreeVars, arg, offset),
    }
  } else {
    Ok(None)
  }
}
