//! The code object fields the disassembler reads. Code objects are produced by the loader of
//! the container format; the disassembler never modifies one.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

/// A value of the constants table.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
  None,
  Ellipsis,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  Bytes(Vec<u8>),
  Tuple(Vec<Constant>),
  /// A nested code object, referred to by name.
  Code(DefaultAtom),
}

impl Display for Constant {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Constant::None        => write!(f, "None"),
      Constant::Ellipsis    => write!(f, "Ellipsis"),
      Constant::Bool(true)  => write!(f, "True"),
      Constant::Bool(false) => write!(f, "False"),
      Constant::Int(i)      => write!(f, "{}", i),
      Constant::Float(x)    => write!(f, "{:?}", x),
      Constant::Str(s)      => write!(f, "{:?}", s),
      Constant::Bytes(b)    => write!(f, "b{:?}", String::from_utf8_lossy(b)),

      Constant::Tuple(items) => {
        let items: Vec<String> = items.iter().map(Constant::to_string).collect();
        match items.len() {
          1 => write!(f, "({},)", items[0]),
          _ => write!(f, "({})", items.join(", "))
        }
      }

      Constant::Code(name) => write!(f, "<code {}>", name),
    }
  }
}

fn atoms<I, S>(names: I) -> Vec<DefaultAtom>
  where I: IntoIterator<Item = S>, S: AsRef<str>
{
  names.into_iter().map(|name| DefaultAtom::from(name.as_ref())).collect()
}

/**
  A loaded code object.

  `linetable` holds `co_lnotab` for revisions before 3.10 and `co_linetable` for 3.10. Revision
  3.11 line numbers come pre-resolved in `positions`, one entry per code unit.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct CodeObject {
  pub version         : (u8, u8),
  pub code            : Vec<u8>,
  pub consts          : Vec<Constant>,
  pub names           : Vec<DefaultAtom>,
  pub varnames        : Vec<DefaultAtom>,
  pub freevars        : Vec<DefaultAtom>,
  pub cellvars        : Vec<DefaultAtom>,
  /// Locals, cells and free variables in frame order. Only meaningful for 3.11.
  pub localsplusnames : Vec<DefaultAtom>,
  pub first_line      : u32,
  pub linetable       : Vec<u8>,
  pub positions       : Option<Vec<Option<u32>>>,
}

impl CodeObject {

  pub fn new(version: (u8, u8), code: Vec<u8>) -> CodeObject {
    CodeObject {
      version,
      code,
      consts          : vec![],
      names           : vec![],
      varnames        : vec![],
      freevars        : vec![],
      cellvars        : vec![],
      localsplusnames : vec![],
      first_line      : 1,
      linetable       : vec![],
      positions       : None,
    }
  }

  pub fn with_consts(mut self, consts: Vec<Constant>) -> CodeObject {
    self.consts = consts;
    self
  }

  pub fn with_names<I, S>(mut self, names: I) -> CodeObject
    where I: IntoIterator<Item = S>, S: AsRef<str>
  {
    self.names = atoms(names);
    self
  }

  pub fn with_varnames<I, S>(mut self, varnames: I) -> CodeObject
    where I: IntoIterator<Item = S>, S: AsRef<str>
  {
    self.varnames = atoms(varnames);
    self
  }

  pub fn with_freevars<I, S>(mut self, freevars: I) -> CodeObject
    where I: IntoIterator<Item = S>, S: AsRef<str>
  {
    self.freevars = atoms(freevars);
    self
  }

  pub fn with_cellvars<I, S>(mut self, cellvars: I) -> CodeObject
    where I: IntoIterator<Item = S>, S: AsRef<str>
  {
    self.cellvars = atoms(cellvars);
    self
  }

  pub fn with_localsplusnames<I, S>(mut self, localsplusnames: I) -> CodeObject
    where I: IntoIterator<Item = S>, S: AsRef<str>
  {
    self.localsplusnames = atoms(localsplusnames);
    self
  }

  pub fn with_first_line(mut self, first_line: u32) -> CodeObject {
    self.first_line = first_line;
    self
  }

  pub fn with_linetable(mut self, linetable: Vec<u8>) -> CodeObject {
    self.linetable = linetable;
    self
  }

  pub fn with_positions(mut self, positions: Vec<Option<u32>>) -> CodeObject {
    self.positions = Some(positions);
    self
  }

  /// Cell variables followed by free variables, the table free-variable operands index before
  /// 3.11.
  pub fn cell_and_free_vars(&self) -> impl Iterator<Item = &DefaultAtom> {
    self.cellvars.iter().chain(self.freevars.iter())
  }

}
