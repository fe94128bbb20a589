/*!
  The human readable textual form of wordcode is called assembly. One instruction per line:

  ```text
  # comments run to the end of the line
  LOAD_FAST 0
  LOAD_CONST 1
  BINARY_ADD
  RETURN_VALUE
  ```

  Operands are the raw encoded values, i.e. jump operands are written as the interpreter
  encodes them for the target revision. Instruction names are resolved against the target
  revision's table, since a name may belong to different kinds in different revisions.
*/

use nom::{
  bytes::complete::take_while1,
  character::complete::{digit1, space0, space1},
  combinator::{all_consuming, map_res, opt},
  sequence::{delimited, pair, preceded},
  IResult,
};

use super::{encode, Opcode, Revision};
use crate::error::{DisassemblyError, Result};

/// One parsed line of assembly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssemblyLine<'a> {
  /// One-based line number in the source text.
  pub line : usize,
  pub name : &'a str,
  pub arg  : Option<u32>,
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

fn instruction_p(text: &str) -> IResult<&str, (&str, Option<u32>)> {
  all_consuming(
    delimited(
      space0,
      pair(
        take_while1(is_name_char),
        opt(preceded(space1, map_res(digit1, |digits: &str| digits.parse::<u32>()))),
      ),
      space0,
    )
  )(text)
}

/// Parses assembly text into its instruction lines, skipping blank lines and comments.
pub fn parse_assembly(text: &str) -> Result<Vec<AssemblyLine>> {
  let mut lines = Vec::new();

  for (number, source) in text.lines().enumerate() {
    let line = number + 1;
    let code = match source.find('#') {
      Some(start) => &source[..start],
      None        => source
    };
    if code.trim().is_empty() {
      continue;
    }

    match instruction_p(code) {
      Ok((_rest, (name, arg))) => lines.push(AssemblyLine { line, name, arg }),
      Err(_e) => {
        return Err(DisassemblyError::Assembly {
          line,
          message: format!("expected `NAME [integer]`, found `{}`", code.trim()),
        });
      }
    }
  }

  Ok(lines)
}

/// Parses and encodes assembly text for the given revision.
pub fn assemble(revision: Revision, text: &str) -> Result<Vec<u8>> {
  let table = revision.table();
  let mut instructions: Vec<(Opcode, Option<u32>)> = Vec::new();

  for AssemblyLine { line, name, arg } in parse_assembly(text)? {
    let opcode = table.find(name).ok_or_else(|| DisassemblyError::Assembly {
      line,
      message: format!("{} is not an instruction of revision {}", name, revision),
    })?;
    if opcode == Opcode::ExtendedArg {
      return Err(DisassemblyError::Assembly {
        line,
        message: "EXTENDED_ARG is emitted automatically for wide operands".to_string(),
      });
    }
    if opcode.has_argument() && arg.is_none() {
      return Err(DisassemblyError::Assembly {
        line,
        message: format!("{} requires an argument", name),
      });
    }
    instructions.push((opcode, arg));
  }

  encode(table, &instructions)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_lines_and_comments(){
    let text = "
      # a comment
      LOAD_FAST 0
        BINARY_ADD   # trailing comment

      RETURN_VALUE
    ";
    let lines = parse_assembly(text).unwrap();
    assert_eq!(lines, vec![
      AssemblyLine { line: 3, name: "LOAD_FAST", arg: Some(0) },
      AssemblyLine { line: 4, name: "BINARY_ADD", arg: None },
      AssemblyLine { line: 6, name: "RETURN_VALUE", arg: None },
    ]);
  }

  #[test]
  fn reject_malformed_lines(){
    assert_eq!(
      parse_assembly("LOAD_FAST 0\nload_fast 1\n").err(),
      Some(DisassemblyError::Assembly {
        line: 2,
        message: "expected `NAME [integer]`, found `load_fast 1`".to_string()
      })
    );
    assert!(parse_assembly("LOAD_FAST x").is_err());
    assert!(parse_assembly("LOAD_FAST 1 2").is_err());
  }

  #[test]
  fn assemble_for_revision(){
    let text = "LOAD_FAST 0\nLOAD_FAST 0\nBINARY_ADD\nRETURN_VALUE";
    assert_eq!(assemble(Revision::Py38, text).unwrap(), vec![124, 0, 124, 0, 23, 0, 83, 0]);
    assert!(matches!(
      assemble(Revision::Py311, text),
      Err(DisassemblyError::Assembly { line: 3, .. })
    ));
  }

  #[test]
  fn assemble_wide_operand(){
    assert_eq!(assemble(Revision::Py39, "LOAD_CONST 258").unwrap(), vec![144, 1, 100, 2]);
  }

  #[test]
  fn missing_argument(){
    assert!(matches!(
      assemble(Revision::Py310, "LOAD_CONST"),
      Err(DisassemblyError::Assembly { line: 1, .. })
    ));
  }
}
