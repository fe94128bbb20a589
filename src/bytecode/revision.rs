/*!
  Per-revision opcode tables.

  Each revision's table is the previous revision's table with a sparse set of overrides
  applied. The first supported revision is expressed as overrides of the empty table, so a new
  revision is a new override list and one more line in the `lazy_static!` block below.
*/

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use bimap::BiMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::Opcode;
use super::Opcode::*;
use crate::error::{DisassemblyError, Result};

/// The supported wordcode revisions. The discriminant is the minor version of the interpreter.
#[derive(
TryFromPrimitive, IntoPrimitive,
Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash
)]
#[repr(u8)]
pub enum Revision {
  Py38  = 8,
  Py39  = 9,
  Py310 = 10,
  Py311 = 11,
}

impl Revision {
  pub const MAJOR: u8 = 3;

  /// Selects the revision for a declared `(major, minor)` interpreter version.
  pub fn from_version(major: u8, minor: u8) -> Result<Revision> {
    if major != Revision::MAJOR {
      return Err(DisassemblyError::UnsupportedRevision { major, minor });
    }
    Revision::try_from(minor).map_err(|_| DisassemblyError::UnsupportedRevision { major, minor })
  }

  pub fn version(&self) -> (u8, u8) {
    (Revision::MAJOR, Into::<u8>::into(*self))
  }

  /// The opcode table of this revision.
  pub fn table(&self) -> &'static VersionTable {
    match self {
      Revision::Py38  => &PY38_TABLE,
      Revision::Py39  => &PY39_TABLE,
      Revision::Py310 => &PY310_TABLE,
      Revision::Py311 => &PY311_TABLE,
    }
  }
}

impl Display for Revision {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let (major, minor) = self.version();
    write!(f, "{}.{}", major, minor)
  }
}

/// One entry of a revision delta.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Override {
  /// Binds the id to the kind. Binding a kind that already has an id moves it.
  Set(u8, Opcode),
  /// Tombstones the id. A later revision may bind it again.
  Remove(u8),
}
use Override::{Remove, Set};

/// A mapping between opcode ids and instruction kinds for one revision.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionTable {
  revision: Revision,
  opcodes: BiMap<u8, Opcode>,
}

impl VersionTable {

  pub fn empty(revision: Revision) -> VersionTable {
    VersionTable {
      revision,
      opcodes: BiMap::new(),
    }
  }

  pub fn revision(&self) -> Revision {
    self.revision
  }

  pub fn kind(&self, id: u8) -> Option<Opcode> {
    self.opcodes.get_by_left(&id).copied()
  }

  pub fn id(&self, opcode: Opcode) -> Option<u8> {
    self.opcodes.get_by_right(&opcode).copied()
  }

  /// Looks an instruction up by its display name.
  pub fn find(&self, name: &str) -> Option<Opcode> {
    self.opcodes.right_values().copied().find(|opcode| opcode.name() == name)
  }

  pub fn len(&self) -> usize {
    self.opcodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.opcodes.is_empty()
  }

  /// The `(id, kind)` pairs in ascending id order.
  pub fn iter(&self) -> impl Iterator<Item = (u8, Opcode)> {
    let mut pairs: Vec<(u8, Opcode)> =
      self.opcodes.iter().map(|(id, opcode)| (*id, *opcode)).collect();
    pairs.sort_unstable();
    pairs.into_iter()
  }
}

/// Derives the table of `revision` from the table of the revision before it.
pub fn apply_overrides(prior: &VersionTable, revision: Revision, overrides: &[Override])
  -> VersionTable
{
  let mut opcodes = prior.opcodes.clone();
  for entry in overrides {
    match *entry {

      Set(id, opcode) => {
        opcodes.insert(id, opcode);
      }

      Remove(id) => {
        opcodes.remove_by_left(&id);
      }

    }
  }
  VersionTable { revision, opcodes }
}

// region Revision deltas

const PY38_OVERRIDES: &[Override] = &[
  Set(1, PopTop),
  Set(2, RotTwo),
  Set(3, RotThree),
  Set(4, DupTop),
  Set(5, DupTopTwo),
  Set(6, RotFour),
  Set(9, Nop),
  Set(10, UnaryPositive),
  Set(11, UnaryNegative),
  Set(12, UnaryNot),
  Set(15, UnaryInvert),
  Set(16, BinaryMatrixMultiply),
  Set(17, InplaceMatrixMultiply),
  Set(19, BinaryPower),
  Set(20, BinaryMultiply),
  Set(22, BinaryModulo),
  Set(23, BinaryAdd),
  Set(24, BinarySubtract),
  Set(25, BinarySubscr),
  Set(26, BinaryFloorDivide),
  Set(27, BinaryTrueDivide),
  Set(28, InplaceFloorDivide),
  Set(29, InplaceTrueDivide),
  Set(50, GetAiter),
  Set(51, GetAnext),
  Set(52, BeforeAsyncWith),
  Set(53, BeginFinally),
  Set(54, EndAsyncFor),
  Set(55, InplaceAdd),
  Set(56, InplaceSubtract),
  Set(57, InplaceMultiply),
  Set(59, InplaceModulo),
  Set(60, StoreSubscr),
  Set(61, DeleteSubscr),
  Set(62, BinaryLshift),
  Set(63, BinaryRshift),
  Set(64, BinaryAnd),
  Set(65, BinaryXor),
  Set(66, BinaryOr),
  Set(67, InplacePower),
  Set(68, GetIter),
  Set(69, GetYieldFromIter),
  Set(70, PrintExpr),
  Set(71, LoadBuildClass),
  Set(72, YieldFrom),
  Set(73, GetAwaitable),
  Set(75, InplaceLshift),
  Set(76, InplaceRshift),
  Set(77, InplaceAnd),
  Set(78, InplaceXor),
  Set(79, InplaceOr),
  Set(81, WithCleanupStart),
  Set(82, WithCleanupFinish),
  Set(83, ReturnValue),
  Set(84, ImportStar),
  Set(85, SetupAnnotations),
  Set(86, YieldValue),
  Set(87, PopBlock),
  Set(88, EndFinally),
  Set(89, PopExcept),
  // Ids from here on take an argument.
  Set(90, StoreName),
  Set(91, DeleteName),
  Set(92, UnpackSequence),
  Set(93, ForIter),
  Set(94, UnpackEx),
  Set(95, StoreAttr),
  Set(96, DeleteAttr),
  Set(97, StoreGlobal),
  Set(98, DeleteGlobal),
  Set(100, LoadConst),
  Set(101, LoadName),
  Set(102, BuildTuple),
  Set(103, BuildList),
  Set(104, BuildSet),
  Set(105, BuildMap),
  Set(106, LoadAttr),
  Set(107, CompareOp),
  Set(108, ImportName),
  Set(109, ImportFrom),
  Set(110, JumpForward),
  Set(111, JumpIfFalseOrPop),
  Set(112, JumpIfTrueOrPop),
  Set(113, JumpAbsolute),
  Set(114, PopJumpIfFalse),
  Set(115, PopJumpIfTrue),
  Set(116, LoadGlobal),
  Set(122, SetupFinally),
  Set(124, LoadFast),
  Set(125, StoreFast),
  Set(126, DeleteFast),
  Set(130, RaiseVarargs),
  Set(131, CallFunction),
  Set(132, MakeFunction),
  Set(133, BuildSlice),
  Set(134, MakeClosure),
  Set(135, LoadClosure),
  Set(136, LoadDeref),
  Set(137, StoreDeref),
  Set(138, DeleteDeref),
  Set(141, CallFunctionKw),
  Set(142, CallFunctionEx),
  Set(143, SetupWith),
  Set(144, ExtendedArg),
  Set(145, ListAppend),
  Set(146, SetAdd),
  Set(147, MapAdd),
  Set(148, LoadClassderef),
  Set(149, BuildListUnpack),
  Set(150, BuildMapUnpack),
  Set(151, BuildMapUnpackWithCall),
  Set(152, BuildTupleUnpack),
  Set(153, BuildSetUnpack),
  Set(154, SetupAsyncWith),
  Set(155, FormatValue),
  Set(156, BuildConstKeyMap),
  Set(157, BuildString),
  Set(158, BuildTupleUnpackWithCall),
  Set(160, LoadMethod),
  Set(161, CallMethod),
  Set(162, CallFinally),
  Set(163, PopFinally),
];

const PY39_OVERRIDES: &[Override] = &[
  Set(48, Reraise),
  Set(49, WithExceptStart),
  Remove(53),  // BEGIN_FINALLY
  Set(74, LoadAssertionError),
  Remove(81),  // WITH_CLEANUP_START
  Set(82, ListToTuple),
  Remove(88),  // END_FINALLY
  Set(117, IsOp),
  Set(118, ContainsOp),
  Set(121, JumpIfNotExcMatch),
  Remove(149), // BUILD_LIST_UNPACK
  Remove(150), // BUILD_MAP_UNPACK
  Remove(151), // BUILD_MAP_UNPACK_WITH_CALL
  Remove(152), // BUILD_TUPLE_UNPACK
  Remove(153), // BUILD_SET_UNPACK
  Remove(158), // BUILD_TUPLE_UNPACK_WITH_CALL
  Set(162, ListExtend),
  Set(163, SetUpdate),
  Set(164, DictMerge),
  Set(165, DictUpdate),
];

const PY310_OVERRIDES: &[Override] = &[
  Set(30, GetLen),
  Set(31, MatchMapping),
  Set(32, MatchSequence),
  Set(33, MatchKeys),
  Set(34, CopyDictWithoutKeys),
  Remove(48),  // RERAISE moves to 119 and takes an argument
  Set(99, RotN),
  Set(119, ReraiseLasti),
  Set(129, GenStart),
  Set(152, MatchClass),
];

const PY311_OVERRIDES: &[Override] = &[
  Set(0, Cache),
  Set(2, PushNull),
  Remove(3),   // ROT_THREE
  Remove(4),   // DUP_TOP
  Remove(5),   // DUP_TOP_TWO
  Remove(6),   // ROT_FOUR
  Remove(16),  // BINARY_MATRIX_MULTIPLY
  Remove(17),  // INPLACE_MATRIX_MULTIPLY
  Remove(19),  // BINARY_POWER
  Remove(20),  // BINARY_MULTIPLY
  Remove(22),  // BINARY_MODULO
  Remove(23),  // BINARY_ADD
  Remove(24),  // BINARY_SUBTRACT
  Remove(26),  // BINARY_FLOOR_DIVIDE
  Remove(27),  // BINARY_TRUE_DIVIDE
  Remove(28),  // INPLACE_FLOOR_DIVIDE
  Remove(29),  // INPLACE_TRUE_DIVIDE
  Remove(34),  // COPY_DICT_WITHOUT_KEYS
  Set(35, PushExcInfo),
  Set(36, CheckExcMatch),
  Set(37, CheckEgMatch),
  Set(53, BeforeWith),
  Remove(55),  // INPLACE_ADD
  Remove(56),  // INPLACE_SUBTRACT
  Remove(57),  // INPLACE_MULTIPLY
  Remove(59),  // INPLACE_MODULO
  Remove(62),  // BINARY_LSHIFT
  Remove(63),  // BINARY_RSHIFT
  Remove(64),  // BINARY_AND
  Remove(65),  // BINARY_XOR
  Remove(66),  // BINARY_OR
  Remove(67),  // INPLACE_POWER
  Remove(72),  // YIELD_FROM
  Remove(73),  // GET_AWAITABLE moves to 131 and takes an argument
  Set(75, ReturnGenerator),
  Remove(76),  // INPLACE_RSHIFT
  Remove(77),  // INPLACE_AND
  Remove(78),  // INPLACE_XOR
  Remove(79),  // INPLACE_OR
  Set(87, AsyncGenWrap),
  Set(88, PrepReraiseStar),
  Set(99, Swap),
  Remove(113), // JUMP_ABSOLUTE
  Set(114, PopJumpForwardIfFalse),
  Set(115, PopJumpForwardIfTrue),
  Set(120, Copy),
  Remove(121), // JUMP_IF_NOT_EXC_MATCH
  Set(122, BinaryOp),
  Set(123, Send),
  Set(128, PopJumpForwardIfNotNone),
  Set(129, PopJumpForwardIfNone),
  Set(131, GetAwaitableWhere),
  Set(134, JumpBackwardNoInterrupt),
  // The cell and free variable instructions each move up by one.
  Set(139, DeleteDeref),
  Set(138, StoreDeref),
  Set(137, LoadDeref),
  Set(136, LoadClosure),
  Set(135, MakeCell),
  Set(140, JumpBackward),
  Remove(141), // CALL_FUNCTION_KW
  Remove(143), // SETUP_WITH
  Set(149, CopyFreeVars),
  Set(151, Resume),
  Remove(154), // SETUP_ASYNC_WITH
  Remove(161), // CALL_METHOD
  Set(166, Precall),
  Set(171, Call),
  Set(172, KwNames),
  Set(173, PopJumpBackwardIfNotNone),
  Set(174, PopJumpBackwardIfNone),
  Set(175, PopJumpBackwardIfFalse),
  Set(176, PopJumpBackwardIfTrue),
];

// endregion

lazy_static! {
  static ref PY38_TABLE: VersionTable =
    apply_overrides(&VersionTable::empty(Revision::Py38), Revision::Py38, PY38_OVERRIDES);
  static ref PY39_TABLE: VersionTable =
    apply_overrides(&PY38_TABLE, Revision::Py39, PY39_OVERRIDES);
  static ref PY310_TABLE: VersionTable =
    apply_overrides(&PY39_TABLE, Revision::Py310, PY310_OVERRIDES);
  static ref PY311_TABLE: VersionTable =
    apply_overrides(&PY310_TABLE, Revision::Py311, PY311_OVERRIDES);
}
