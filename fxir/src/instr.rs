//! Instruction and operand model.
//!
//! Each instruction is a small data structure with public fields; the
//! [`Instr`] enum is the tagged union over all concrete forms and the
//! generated [`InstrKind`] discriminant gives fast opcode classification.
//!
//! The shape is deliberately coarse: the interface analysis only needs to
//! distinguish memory reads, memory writes, block copies and calls; every
//! other computation collapses into [`Compute`].
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use auto_enums::auto_enum;
use strum::{EnumDiscriminants, EnumIs, EnumTryAs};

use crate::{consts::AnyConst, storage::StorageId};

/// SSA value identifier naming an instruction result.
pub type Name = u32;

/// A constant expression: an address computed at compile time, e.g. an
/// element pointer into a global array. Carries its own operand list so
/// provenance tracing can recurse into it to find the referenced storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstExpr {
    pub operands: Vec<Operand>,
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// Reference to a previously defined SSA value.
    Reg(Name),
    /// The address of a stack slot or global.
    Storage(StorageId),
    /// Immediate literal (integer or floating-point).
    Imm(AnyConst),
    /// Formal parameter of the enclosing function, by index.
    Arg(usize),
    /// Compile-time constant expression.
    Expr(Box<ConstExpr>),
}

/// Common interface implemented by every instruction node.
///
/// Provides zero-allocation iteration over input operands, the optional
/// destination SSA name, and the originating source line when debug
/// metadata carried one.
pub trait Instruction {
    /// Iterate over all operands of this instruction.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Return the destination SSA name if the instruction produces a result.
    fn destination(&self) -> Option<Name> {
        None
    }

    /// Originating source line, when present.
    fn line(&self) -> Option<u32> {
        None
    }
}

/// Load from memory into a destination SSA name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MLoad {
    pub dest: Name,
    pub addr: Operand,
    pub line: Option<u32>,
}

impl Instruction for MLoad {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.addr)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn line(&self) -> Option<u32> {
        self.line
    }
}

/// Store a value to memory.
///
/// The two operands play very different roles for interface analysis:
/// `addr` names what is being mutated, `value` names what flows into it.
/// Provenance tracing must follow `addr` alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MStore {
    pub addr: Operand,
    pub value: Operand,
    pub line: Option<u32>,
}

impl Instruction for MStore {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.addr, &self.value].into_iter()
    }

    fn line(&self) -> Option<u32> {
        self.line
    }
}

/// Block copy between two addresses (memcpy/memmove in front-end output,
/// typically emitted for aggregate assignment).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemCpy {
    pub dst: Operand,
    pub src: Operand,
    pub len: Operand,
    pub line: Option<u32>,
}

impl Instruction for MemCpy {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.dst, &self.src, &self.len].into_iter()
    }

    fn line(&self) -> Option<u32> {
        self.line
    }
}

/// Call to a named function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Call {
    pub dest: Option<Name>,
    pub callee: String,
    pub args: Vec<Operand>,
    pub line: Option<u32>,
}

impl Instruction for Call {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.args.iter()
    }

    fn destination(&self) -> Option<Name> {
        self.dest
    }

    fn line(&self) -> Option<u32> {
        self.line
    }
}

/// Catch-all for value computations: arithmetic, comparisons, casts,
/// address arithmetic. The analysis never cares which; it only follows
/// the operand edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Compute {
    pub dest: Name,
    pub operands: Vec<Operand>,
    pub line: Option<u32>,
}

impl Instruction for Compute {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.operands.iter()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn line(&self) -> Option<u32> {
        self.line
    }
}

/// Discriminated union covering all instruction kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(InstrKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instr {
    MLoad(MLoad),
    MStore(MStore),
    MemCpy(MemCpy),
    Call(Call),
    Compute(Compute),
}

impl Instr {
    /// Opcode-level classification of this instruction.
    pub fn kind(&self) -> InstrKind {
        self.into()
    }

    /// True for the memory-affecting subset the interface classifier
    /// restricts itself to: loads, stores, and block copies.
    pub fn touches_memory(&self) -> bool {
        matches!(
            self.kind(),
            InstrKind::MLoad | InstrKind::MStore | InstrKind::MemCpy
        )
    }
}

impl Instruction for Instr {
    #[auto_enum(Iterator)]
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        match self {
            Instr::MLoad(i) => i.operands(),
            Instr::MStore(i) => i.operands(),
            Instr::MemCpy(i) => i.operands(),
            Instr::Call(i) => i.operands(),
            Instr::Compute(i) => i.operands(),
        }
    }

    fn destination(&self) -> Option<Name> {
        match self {
            Instr::MLoad(i) => i.destination(),
            Instr::MStore(i) => i.destination(),
            Instr::MemCpy(i) => i.destination(),
            Instr::Call(i) => i.destination(),
            Instr::Compute(i) => i.destination(),
        }
    }

    fn line(&self) -> Option<u32> {
        match self {
            Instr::MLoad(i) => i.line(),
            Instr::MStore(i) => i.line(),
            Instr::MemCpy(i) => i.line(),
            Instr::Call(i) => i.line(),
            Instr::Compute(i) => i.line(),
        }
    }
}

macro_rules! define_instr_from {
    ($typ:ty, $variant:ident) => {
        impl From<$typ> for Instr {
            fn from(inst: $typ) -> Self {
                Instr::$variant(inst)
            }
        }
    };
}

define_instr_from!(MLoad, MLoad);
define_instr_from!(MStore, MStore);
define_instr_from!(MemCpy, MemCpy);
define_instr_from!(Call, Call);
define_instr_from!(Compute, Compute);
