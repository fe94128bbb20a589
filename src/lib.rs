/*!
  A disassembler for CPython wordcode.

  Four revisions of the wordcode format are supported, those of interpreters 3.8, 3.9, 3.10 and
  3.11. Given a loaded code object, `disassemble` produces the instruction list with operands
  resolved, jumps linked to their target instructions, and every instruction attributed to a
  source line.

  ```ignore
  let code = CodeObject::new((3, 9), assemble(Revision::Py39, "LOAD_CONST 0\nRETURN_VALUE")?)
    .with_consts(vec![Constant::None]);
  println!("{}", disassemble(&code)?);
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;
extern crate strum;
extern crate strum_macros;

pub mod bytecode;
pub mod code;
pub mod disassembler;
pub mod error;
pub mod instruction;
pub mod linetable;
pub mod operand;

pub use bytecode::{assemble, Opcode, Revision, VersionTable};
pub use code::{CodeObject, Constant};
pub use disassembler::{disassemble, Disassembly};
pub use error::{DisassemblyError, Result, SideTable};
pub use instruction::{Argument, DecodedInstruction, PrettyArg};
