//! Literal constants appearing as immediate operands.
//!
//! Constants carry only their value, not a type: the literal-constant
//! reattribution step matches immediates *by value* across the whole
//! function, and a front end that folded `const int x = 1000;` into an
//! `add` has already erased the type context anyway. Two independent
//! occurrences of the same literal therefore compare equal on purpose.
use bigdecimal::{BigDecimal, FromPrimitive};
use num_bigint::BigInt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

/// An integer literal of arbitrary precision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IConst {
    pub value: BigInt,
}

impl IConst {
    pub fn new(value: impl Into<BigInt>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl From<i64> for IConst {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<u64> for IConst {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<i32> for IConst {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for IConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A floating-point literal stored as an arbitrary-precision decimal.
///
/// `BigDecimal` gives value equality across representations (`1.0` equals
/// `1.00`), which is the equality the reattribution heuristic needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FConst {
    pub value: BigDecimal,
}

impl FConst {
    pub fn new(value: BigDecimal) -> Self {
        Self { value }
    }
}

impl TryFrom<f32> for FConst {
    type Error = ();

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        let value = BigDecimal::from_f32(value).ok_or(())?;
        Ok(Self { value })
    }
}

impl TryFrom<f64> for FConst {
    type Error = ();

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let value = BigDecimal::from_f64(value).ok_or(())?;
        Ok(Self { value })
    }
}

impl std::fmt::Display for FConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Any literal constant usable as an immediate operand.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnyConst {
    Int(IConst),
    Float(FConst),
}

impl From<IConst> for AnyConst {
    fn from(value: IConst) -> Self {
        AnyConst::Int(value)
    }
}

impl From<FConst> for AnyConst {
    fn from(value: FConst) -> Self {
        AnyConst::Float(value)
    }
}

impl AnyConst {
    /// Convenience constructor for integer immediates.
    pub fn int(value: impl Into<BigInt>) -> Self {
        AnyConst::Int(IConst::new(value))
    }
}

impl std::fmt::Display for AnyConst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyConst::Int(c) => c.fmt(f),
            AnyConst::Float(c) => c.fmt(f),
        }
    }
}
