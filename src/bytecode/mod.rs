/*!

  CPython wordcode is a sequence of 2-byte code units. The first byte of a unit is the opcode
  id and the second is the raw operand byte:

    Opcode:   8 bits
    Argument: 8 bits

  Operands wider than 8 bits are spelled with one or more `EXTENDED_ARG` prefix units, each of
  which contributes the next-higher byte of the operand of the instruction that follows it.

  The meaning of an opcode id is not stable. Every revision of the interpreter is free to move
  an instruction to another id, delete it, or hand its old id to an unrelated instruction. We
  therefore keep two things apart:

   1. `Opcode`, the closed set of instruction kinds across all supported revisions, each with a
      fixed set of behavioral flags, and
   2. `VersionTable`, the per-revision mapping from id to `Opcode` (see `revision`).

  An instruction whose argument-bearing status changed when it moved has two variants here,
  one per assignment, displayed under the same name.

*/

mod assembly;
mod binary;
mod revision;

pub use assembly::{assemble, parse_assembly, AssemblyLine};
pub use binary::{encode, encode_instruction, RawInstruction, WordcodeReader, CODE_UNIT};
pub use revision::{apply_overrides, Override, Revision, VersionTable};

use strum_macros::{Display as StrumDisplay, EnumIter, IntoStaticStr};

/// A set of behavioral flags. Flags of an `Opcode` are fixed; see `Opcode::flags`.
pub type Flags = u16;

/// Argument indexes the constants table.
pub const HAS_CONST     : Flags = 1 << 0;
/// Argument indexes the names table.
pub const HAS_NAME      : Flags = 1 << 1;
/// Argument indexes the local variable table.
pub const HAS_LOCAL     : Flags = 1 << 2;
/// Argument indexes the cell and free variable tables.
pub const HAS_FREE      : Flags = 1 << 3;
/// Argument is a jump relative to the end of the instruction.
pub const HAS_JREL      : Flags = 1 << 4;
/// Argument is an absolute jump target.
pub const HAS_JABS      : Flags = 1 << 5;
/// Control may leave the instruction for a target not encoded in it (exceptions, returns).
pub const HAS_JUNKNOWN  : Flags = 1 << 6;
pub const HAS_ARGUMENT  : Flags = 1 << 7;
/// Control never falls through to the following instruction.
pub const NO_NEXT       : Flags = 1 << 8;
/// The jump target is recorded (on the block stack) but not jumped to.
pub const STORE_JUMP    : Flags = 1 << 9;
pub const PUSHES_BLOCK  : Flags = 1 << 10;
pub const POPS_BLOCK    : Flags = 1 << 11;
/// Argument encodes a (positional, keyword) argument-count pair.
pub const HAS_NARGS     : Flags = 1 << 12;

const JUMP_FLAGS: Flags = HAS_JREL | HAS_JABS;

/**
  Instruction kinds of every supported revision.

  The variant order carries no meaning; numeric ids live in the version tables. Display names
  are the interpreter's own instruction names, e.g. `Opcode::BinaryAdd` displays as
  `BINARY_ADD`.
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumIter,
Clone,        Copy,          Eq, PartialEq, Ord, PartialOrd, Debug, Hash
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
  Cache,
  PopTop,
  RotTwo,
  RotThree,
  DupTop,
  DupTopTwo,
  RotFour,
  Nop,
  PushNull,
  UnaryPositive,
  UnaryNegative,
  UnaryNot,
  UnaryInvert,
  BinaryMatrixMultiply,
  InplaceMatrixMultiply,
  BinaryPower,
  BinaryMultiply,
  BinaryModulo,
  BinaryAdd,
  BinarySubtract,
  BinarySubscr,
  BinaryFloorDivide,
  BinaryTrueDivide,
  InplaceFloorDivide,
  InplaceTrueDivide,
  GetLen,
  MatchMapping,
  MatchSequence,
  MatchKeys,
  CopyDictWithoutKeys,
  PushExcInfo,
  CheckExcMatch,
  CheckEgMatch,
  /// `RERAISE` before it took an argument.
  Reraise,
  WithExceptStart,
  GetAiter,
  GetAnext,
  BeforeAsyncWith,
  BeginFinally,
  BeforeWith,
  EndAsyncFor,
  InplaceAdd,
  InplaceSubtract,
  InplaceMultiply,
  InplaceModulo,
  StoreSubscr,
  DeleteSubscr,
  BinaryLshift,
  BinaryRshift,
  BinaryAnd,
  BinaryXor,
  BinaryOr,
  InplacePower,
  GetIter,
  GetYieldFromIter,
  PrintExpr,
  LoadBuildClass,
  YieldFrom,
  /// `GET_AWAITABLE` before it took an argument.
  GetAwaitable,
  LoadAssertionError,
  ReturnGenerator,
  InplaceLshift,
  InplaceRshift,
  InplaceAnd,
  InplaceXor,
  InplaceOr,
  WithCleanupStart,
  WithCleanupFinish,
  ListToTuple,
  ReturnValue,
  ImportStar,
  SetupAnnotations,
  YieldValue,
  PopBlock,
  AsyncGenWrap,
  EndFinally,
  PrepReraiseStar,
  PopExcept,
  StoreName,
  DeleteName,
  UnpackSequence,
  ForIter,
  UnpackEx,
  StoreAttr,
  DeleteAttr,
  StoreGlobal,
  DeleteGlobal,
  RotN,
  Swap,
  LoadConst,
  LoadName,
  BuildTuple,
  BuildList,
  BuildSet,
  BuildMap,
  LoadAttr,
  CompareOp,
  ImportName,
  ImportFrom,
  JumpForward,
  JumpIfFalseOrPop,
  JumpIfTrueOrPop,
  JumpAbsolute,
  PopJumpIfFalse,
  PopJumpIfTrue,
  PopJumpForwardIfFalse,
  PopJumpForwardIfTrue,
  LoadGlobal,
  IsOp,
  ContainsOp,
  /// `RERAISE` with its `lasti` argument.
  #[strum(to_string = "RERAISE")]
  ReraiseLasti,
  Copy,
  JumpIfNotExcMatch,
  SetupFinally,
  BinaryOp,
  Send,
  LoadFast,
  StoreFast,
  DeleteFast,
  GenStart,
  PopJumpForwardIfNotNone,
  PopJumpForwardIfNone,
  RaiseVarargs,
  CallFunction,
  /// `GET_AWAITABLE` with its `where` argument.
  #[strum(to_string = "GET_AWAITABLE")]
  GetAwaitableWhere,
  MakeFunction,
  BuildSlice,
  JumpBackwardNoInterrupt,
  /// Only ever assigned an id, never emitted by these interpreters.
  MakeClosure,
  MakeCell,
  LoadClosure,
  LoadDeref,
  StoreDeref,
  DeleteDeref,
  JumpBackward,
  CallFunctionKw,
  CallFunctionEx,
  SetupWith,
  ExtendedArg,
  ListAppend,
  SetAdd,
  MapAdd,
  LoadClassderef,
  CopyFreeVars,
  BuildListUnpack,
  BuildMapUnpack,
  BuildMapUnpackWithCall,
  BuildTupleUnpack,
  BuildSetUnpack,
  Resume,
  MatchClass,
  SetupAsyncWith,
  FormatValue,
  BuildConstKeyMap,
  BuildString,
  BuildTupleUnpackWithCall,
  LoadMethod,
  CallMethod,
  CallFinally,
  PopFinally,
  ListExtend,
  SetUpdate,
  DictMerge,
  DictUpdate,
  Precall,
  Call,
  KwNames,
  PopJumpBackwardIfNotNone,
  PopJumpBackwardIfNone,
  PopJumpBackwardIfFalse,
  PopJumpBackwardIfTrue,
  /// A constant load whose value was computed by constant folding. It has no id in any
  /// revision and only ever appears in already-decoded instruction lists.
  LoadFoldedConst,
}

impl Opcode {

  /// The interpreter's name for the instruction.
  pub fn name(&self) -> &'static str {
    self.into()
  }

  pub fn flags(&self) -> Flags {
    use Opcode::*;

    match self {

      LoadConst | KwNames => HAS_CONST | HAS_ARGUMENT,

      | StoreName  | DeleteName   | StoreAttr   | DeleteAttr
      | StoreGlobal| DeleteGlobal | LoadName    | LoadAttr
      | ImportFrom | LoadGlobal   | LoadMethod => HAS_NAME | HAS_ARGUMENT,

      ImportName => HAS_NAME | HAS_ARGUMENT | HAS_JUNKNOWN,

      LoadFast | StoreFast | DeleteFast => HAS_LOCAL | HAS_ARGUMENT,

      | LoadClosure | LoadDeref | StoreDeref | DeleteDeref
      | LoadClassderef | MakeCell => HAS_FREE | HAS_ARGUMENT,

      // Jumps
      JumpForward => HAS_JREL | HAS_ARGUMENT | NO_NEXT,
      JumpAbsolute => HAS_JABS | HAS_ARGUMENT | NO_NEXT,
      JumpBackward | JumpBackwardNoInterrupt => HAS_JREL | HAS_ARGUMENT | NO_NEXT,

      | JumpIfFalseOrPop | JumpIfTrueOrPop
      | PopJumpIfFalse   | PopJumpIfTrue | JumpIfNotExcMatch => HAS_JABS | HAS_ARGUMENT,

      | ForIter | Send | CallFinally
      | PopJumpForwardIfFalse   | PopJumpForwardIfTrue
      | PopJumpForwardIfNotNone | PopJumpForwardIfNone
      | PopJumpBackwardIfFalse  | PopJumpBackwardIfTrue
      | PopJumpBackwardIfNotNone| PopJumpBackwardIfNone => HAS_JREL | HAS_ARGUMENT,

      SetupFinally | SetupWith | SetupAsyncWith => {
        HAS_JREL | HAS_ARGUMENT | STORE_JUMP | PUSHES_BLOCK
      }

      PopBlock => POPS_BLOCK,

      // Leaving the frame
      ReturnValue | Reraise => HAS_JUNKNOWN | NO_NEXT,
      RaiseVarargs | ReraiseLasti => HAS_JUNKNOWN | HAS_ARGUMENT | NO_NEXT,
      YieldValue | YieldFrom | EndFinally | WithCleanupStart | EndAsyncFor => HAS_JUNKNOWN,
      PopFinally => HAS_ARGUMENT | HAS_JUNKNOWN,

      // Calls
      CallFunction | CallFunctionKw | CallMethod => HAS_NARGS | HAS_ARGUMENT | HAS_JUNKNOWN,

      | UnpackSequence | UnpackEx  | BuildTuple  | BuildList   | BuildSet | BuildMap
      | CompareOp      | IsOp      | ContainsOp  | MakeFunction| BuildSlice
      | ListAppend     | SetAdd    | MapAdd      | FormatValue | BuildConstKeyMap
      | BuildString    | ListExtend| SetUpdate   | DictMerge   | DictUpdate
      | BuildListUnpack| BuildMapUnpack | BuildMapUnpackWithCall | BuildTupleUnpack
      | BuildSetUnpack | BuildTupleUnpackWithCall | CallFunctionEx | Call | Precall
      | RotN | Swap    | Copy      | BinaryOp    | GenStart    | MatchClass | MakeClosure
      | GetAwaitableWhere | CopyFreeVars | Resume | ExtendedArg
      | LoadFoldedConst => HAS_ARGUMENT,

      _ => 0
    }
  }

  fn has(&self, flags: Flags) -> bool {
    self.flags() & flags != 0
  }

  pub fn has_argument(&self) -> bool {
    self.has(HAS_ARGUMENT)
  }

  pub fn has_const(&self) -> bool {
    self.has(HAS_CONST)
  }

  pub fn has_name(&self) -> bool {
    self.has(HAS_NAME)
  }

  pub fn has_local(&self) -> bool {
    self.has(HAS_LOCAL)
  }

  pub fn has_free(&self) -> bool {
    self.has(HAS_FREE)
  }

  pub fn has_relative_jump(&self) -> bool {
    self.has(HAS_JREL)
  }

  pub fn has_absolute_jump(&self) -> bool {
    self.has(HAS_JABS)
  }

  /// True for relative and absolute jumps alike.
  pub fn has_jump(&self) -> bool {
    self.has(JUMP_FLAGS)
  }

  /// A jump whose target is encoded in the instruction and nowhere else.
  pub fn has_known_jump(&self) -> bool {
    self.has_jump() && !self.has_unknown_jump()
  }

  pub fn has_unknown_jump(&self) -> bool {
    self.has(HAS_JUNKNOWN)
  }

  /// Whether control can fall through to the following instruction.
  pub fn carries_on_to_next(&self) -> bool {
    !self.has(NO_NEXT)
  }

  pub fn no_next(&self) -> bool {
    self.has(NO_NEXT)
  }

  pub fn stores_jump(&self) -> bool {
    self.has(STORE_JUMP)
  }

  /// A jump that transfers control, as opposed to one that only records its target.
  pub fn does_jump(&self) -> bool {
    self.has_jump() && !self.stores_jump()
  }

  pub fn pushes_block(&self) -> bool {
    self.has(PUSHES_BLOCK)
  }

  pub fn pops_block(&self) -> bool {
    self.has(POPS_BLOCK)
  }

  pub fn has_nargs(&self) -> bool {
    self.has(HAS_NARGS)
  }

  /// The `*JUMP_BACKWARD*` family, whose relative argument counts toward the start of the code.
  pub fn is_backward_jump(&self) -> bool {
    matches!(
      self,
      Opcode::JumpBackward
      | Opcode::JumpBackwardNoInterrupt
      | Opcode::PopJumpBackwardIfNotNone
      | Opcode::PopJumpBackwardIfNone
      | Opcode::PopJumpBackwardIfFalse
      | Opcode::PopJumpBackwardIfTrue
    )
  }

}
