//! Basic blocks and control-flow terminators.
//!
//! Labels and control flow never cross function boundaries; a [`Label`]
//! is only meaningful within the function that defines it. Terminators
//! carry an optional source line because the interface analysis must
//! report the lines at which control can leave a region.
use auto_enums::auto_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

use crate::instr::{Instr, Operand};

/// Identity of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Label(pub u32);

impl Label {
    pub const NIL: Label = Label(0);

    /// True for the reserved 'function entry' label. Every function has it.
    pub fn is_nil(&self) -> bool {
        self == &Label::NIL
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%block_{}", self.0)
    }
}

/// Unconditional jump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Jump {
    pub target: Label,
    pub line: Option<u32>,
}

/// Two-way conditional branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CBranch {
    pub cond: Operand,
    pub target_true: Label,
    pub target_false: Label,
    pub line: Option<u32>,
}

/// Multi-way branch over an integer operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Switch {
    pub operand: Operand,
    pub default_target: Label,
    pub cases: Vec<(i64, Label)>,
    pub line: Option<u32>,
}

/// Return from the function, optionally with a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ret {
    pub value: Option<Operand>,
    pub line: Option<u32>,
}

/// Unreachable/trapping terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trap {
    pub line: Option<u32>,
}

/// Control-flow terminator of a basic block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Terminator {
    Jump(Jump),
    CBranch(CBranch),
    Switch(Switch),
    Ret(Ret),
    Trap(Trap),
}

impl Terminator {
    /// Iterate over the labels this terminator may transfer control to.
    #[auto_enum(Iterator)]
    pub fn iter_targets(&self) -> impl Iterator<Item = Label> + '_ {
        match self {
            Terminator::Jump(jump) => std::iter::once(jump.target),
            Terminator::CBranch(cbranch) => {
                [cbranch.target_true, cbranch.target_false].into_iter()
            }
            Terminator::Switch(switch) => std::iter::once(switch.default_target)
                .chain(switch.cases.iter().map(|(_, target)| *target)),
            Terminator::Ret(_) => std::iter::empty(),
            Terminator::Trap(_) => std::iter::empty(),
        }
    }

    /// Originating source line, when debug metadata carried one.
    pub fn line(&self) -> Option<u32> {
        match self {
            Terminator::Jump(jump) => jump.line,
            Terminator::CBranch(cbranch) => cbranch.line,
            Terminator::Switch(switch) => switch.line,
            Terminator::Ret(ret) => ret.line,
            Terminator::Trap(trap) => trap.line,
        }
    }
}

macro_rules! define_terminator_from {
    ($typ:ty, $variant:ident) => {
        impl From<$typ> for Terminator {
            fn from(inst: $typ) -> Self {
                Terminator::$variant(inst)
            }
        }
    };
}

define_terminator_from!(Jump, Jump);
define_terminator_from!(CBranch, CBranch);
define_terminator_from!(Switch, Switch);
define_terminator_from!(Ret, Ret);
define_terminator_from!(Trap, Trap);

/// A basic block: a labeled, ordered instruction sequence ending with a
/// control-flow terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub label: Label,

    /// Textual label as the front end named it ("entry", "for.cond", ...).
    /// Region configurations refer to blocks by this name; it is display
    /// identity, not object identity.
    pub name: String,

    pub instructions: Vec<Instr>,
    pub terminator: Terminator,
}
