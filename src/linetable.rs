/*!
  Maps instruction offsets to source lines.

  Both table formats are sequences of `(address delta, line delta)` byte pairs, and both cursors
  answer queries in a single forward sweep: `get` must be called with non-decreasing offsets.

  * Before 3.10 (`co_lnotab`), a line delta of `0x80` or more is negative, and a pair's line delta
    takes effect at the address the pair advances to.
  * In 3.10 (`co_linetable`), a line delta of 128 means no change and larger values are negative.
    A pair's line delta applies to the range the pair *starts*, so the first pair's delta is
    applied as soon as the cursor is built.

  3.11 line numbers are resolved by the loader and only looked up here.
*/

use crate::bytecode::{Revision, CODE_UNIT};
use crate::code::CodeObject;

fn lnotab_delta(byte: u8) -> i32 {
  match byte >= 0x80 {
    true  => byte as i32 - 0x100,
    false => byte as i32
  }
}

fn linetable_delta(byte: u8) -> i32 {
  match byte {
    128           => 0,
    b if b > 128  => b as i32 - 256,
    b             => b as i32
  }
}

/// Cursor over a `co_lnotab` table.
#[derive(Clone, Debug)]
pub struct LnotabCursor<'a> {
  table     : &'a [u8],
  line      : u32,
  next_addr : usize,
  position  : usize,
}

impl<'a> LnotabCursor<'a> {

  pub fn new(table: &'a [u8], first_line: u32) -> LnotabCursor<'a> {
    LnotabCursor {
      table,
      line      : first_line,
      next_addr : table.first().copied().unwrap_or(0) as usize,
      position  : 0,
    }
  }

  pub fn get(&mut self, offset: usize) -> u32 {
    while offset >= self.next_addr && self.position + 1 < self.table.len() {
      self.line = self.line.saturating_add_signed(lnotab_delta(self.table[self.position + 1]));
      self.position += 2;
      if self.position < self.table.len() {
        self.next_addr += self.table[self.position] as usize;
      }
    }
    self.line
  }

}

/// Cursor over a 3.10 `co_linetable` table.
#[derive(Clone, Debug)]
pub struct LinetableCursor<'a> {
  table    : &'a [u8],
  line     : u32,
  /// End of the address range covered by the current pair.
  end_addr : usize,
  position : usize,
}

impl<'a> LinetableCursor<'a> {

  pub fn new(table: &'a [u8], first_line: u32) -> LinetableCursor<'a> {
    let mut cursor = LinetableCursor {
      table,
      line     : first_line,
      end_addr : 0,
      position : 0,
    };
    if table.len() >= 2 {
      cursor.end_addr = table[0] as usize;
      cursor.line = cursor.line.saturating_add_signed(linetable_delta(table[1]));
    }
    cursor
  }

  pub fn get(&mut self, offset: usize) -> u32 {
    while offset >= self.end_addr && self.position + 3 < self.table.len() {
      self.position += 2;
      self.end_addr += self.table[self.position] as usize;
      self.line = self.line.saturating_add_signed(linetable_delta(self.table[self.position + 1]));
    }
    self.line
  }

}

/// Per-decode line state, selected by revision.
#[derive(Clone, Debug)]
pub enum LineCursor<'a> {
  Lnotab(LnotabCursor<'a>),
  Linetable(LinetableCursor<'a>),
  /// Lines resolved by the loader, one entry per code unit.
  Positions {
    positions  : &'a [Option<u32>],
    first_line : u32,
  },
  /// No line information; every instruction is on the first line.
  FirstLine(u32),
}

impl<'a> LineCursor<'a> {

  pub fn new(revision: Revision, code: &'a CodeObject) -> LineCursor<'a> {
    match revision {

      Revision::Py311 => match &code.positions {
        Some(positions) => LineCursor::Positions {
          positions  : positions.as_slice(),
          first_line : code.first_line,
        },
        None => LineCursor::FirstLine(code.first_line),
      },

      _ if code.linetable.is_empty() => LineCursor::FirstLine(code.first_line),

      Revision::Py310 => {
        LineCursor::Linetable(LinetableCursor::new(&code.linetable, code.first_line))
      }

      Revision::Py38 | Revision::Py39 => {
        LineCursor::Lnotab(LnotabCursor::new(&code.linetable, code.first_line))
      }

    }
  }

  /// The line of the instruction starting at `offset`. Offsets must not decrease between calls.
  pub fn get(&mut self, offset: usize) -> u32 {
    match self {
      LineCursor::Lnotab(cursor)    => cursor.get(offset),
      LineCursor::Linetable(cursor) => cursor.get(offset),

      LineCursor::Positions { positions, first_line } => {
        positions.get(offset / CODE_UNIT).copied().flatten().unwrap_or(*first_line)
      }

      LineCursor::FirstLine(line) => *line,
    }
  }

}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lnotab_sequential_queries(){
    let table = [2, 1, 2, 1, 2, 0xFE];
    let mut cursor = LnotabCursor::new(&table, 1);
    let lines: Vec<u32> = [0, 2, 4, 6, 8].iter().map(|offset| cursor.get(*offset)).collect();
    assert_eq!(lines, vec![1, 2, 3, 1, 1]);
  }

  #[test]
  fn lnotab_skips_past_several_pairs(){
    let table = [2, 1, 2, 1, 2, 1];
    let mut cursor = LnotabCursor::new(&table, 10);
    assert_eq!(cursor.get(0), 10);
    assert_eq!(cursor.get(5), 12);
    assert_eq!(cursor.get(100), 13);
  }

  #[test]
  fn lnotab_large_address_step(){
    // A step of 0 bytes with a line delta lets a single address advance several lines.
    let table = [0, 3, 4, 1];
    let mut cursor = LnotabCursor::new(&table, 1);
    assert_eq!(cursor.get(0), 4);
    assert_eq!(cursor.get(2), 4);
    assert_eq!(cursor.get(4), 5);
  }

  #[test]
  fn linetable_applies_first_delta_eagerly(){
    // [0, 4) is line first+1, [4, 6) unchanged, [6, 10) is two lines back.
    let table = [4, 1, 2, 128, 4, 254];
    let mut cursor = LinetableCursor::new(&table, 5);
    assert_eq!(cursor.get(0), 6);
    assert_eq!(cursor.get(2), 6);
    assert_eq!(cursor.get(4), 6);
    assert_eq!(cursor.get(6), 4);
    assert_eq!(cursor.get(8), 4);
    assert_eq!(cursor.get(10), 4);
  }

  #[test]
  fn absent_table_reports_first_line(){
    let code = CodeObject::new((3, 9), vec![1, 0, 1, 0]).with_first_line(7);
    let mut cursor = LineCursor::new(Revision::Py39, &code);
    assert_eq!(cursor.get(0), 7);
    assert_eq!(cursor.get(2), 7);

    let code = CodeObject::new((3, 10), vec![]).with_first_line(3);
    assert_eq!(LineCursor::new(Revision::Py310, &code).get(0), 3);
  }

  #[test]
  fn positions_are_looked_up_per_code_unit(){
    let code = CodeObject::new((3, 11), vec![0; 8])
      .with_first_line(2)
      .with_positions(vec![Some(2), Some(3), None]);
    let mut cursor = LineCursor::new(Revision::Py311, &code);
    assert_eq!(cursor.get(0), 2);
    assert_eq!(cursor.get(2), 3);
    assert_eq!(cursor.get(4), 2);
    assert_eq!(cursor.get(6), 2);
  }

  #[test]
  fn py311_ignores_linetable_bytes(){
    let code = CodeObject::new((3, 11), vec![0; 2])
      .with_first_line(9)
      .with_linetable(vec![2, 1]);
    assert_eq!(LineCursor::new(Revision::Py311, &code).get(0), 9);
  }
}
