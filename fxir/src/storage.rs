//! Storage locations: stack slots and globals.
//!
//! A storage location is the unit the interface classifier reasons about.
//! Identity is the [`StorageId`] handed out by the owning module arena,
//! never the name: front ends routinely emit colliding names for shadowed
//! locals and renamed temporaries.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

use crate::{consts::AnyConst, types::Typeref};

/// Identity of a storage location within a [`crate::module::Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StorageId(pub u32);

impl std::fmt::Display for StorageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Linkage of a global storage location.
///
/// `Internal` corresponds to the notion of the `static` keyword in C; the
/// downstream extractor needs to know because a static cannot simply be
/// redeclared in the callee.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Linkage {
    /// Only directly accessible by objects in the current module; does
    /// not show up in any symbol table.
    #[default]
    Private,

    /// Module-local symbol (STB_LOCAL in the case of ELF); C `static`.
    Internal,

    /// May be referenced and defined by other modules.
    External,
}

/// What kind of storage a location denotes.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StorageKind {
    /// A stack slot of one function (an alloca in front-end output).
    Stack,

    /// A module-level global.
    Global {
        linkage: Linkage,
        is_const: bool,
        /// The literal the global was initialized with, when the
        /// initializer is a plain scalar literal. Feeds literal-constant
        /// reattribution for function-scoped constants the front end
        /// promoted to globals.
        initializer: Option<AnyConst>,
    },
}

/// A stack slot or global variable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Storage {
    /// Source-level name. Not an identity; see [`StorageId`].
    pub name: String,

    /// Declared/allocated type, as a debug-type descriptor chain.
    pub ty: Typeref,

    pub kind: StorageKind,

    /// Declaration line from debug metadata. Compiler-synthesized slots
    /// (return-value slots, spill temporaries) legitimately have none.
    pub decl_line: Option<u32>,

    /// Whether this slot backs a formal parameter of its function.
    pub is_param: bool,
}

impl Storage {
    /// Shorthand for a plain stack slot.
    pub fn stack(name: impl Into<String>, ty: Typeref, decl_line: Option<u32>) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: StorageKind::Stack,
            decl_line,
            is_param: false,
        }
    }

    /// Shorthand for a module-level global with private linkage, no
    /// const qualification and no recorded initializer.
    pub fn global(name: impl Into<String>, ty: Typeref, decl_line: Option<u32>) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: StorageKind::Global {
                linkage: Linkage::Private,
                is_const: false,
                initializer: None,
            },
            decl_line,
            is_param: false,
        }
    }

    /// Mark this slot as backing a formal parameter.
    pub fn param(mut self) -> Self {
        self.is_param = true;
        self
    }

    /// Mark a global as const-qualified, recording its literal initializer
    /// when one is known. No effect on stack slots.
    pub fn constant(mut self, init: Option<AnyConst>) -> Self {
        if let StorageKind::Global {
            is_const,
            initializer,
            ..
        } = &mut self.kind
        {
            *is_const = true;
            *initializer = init;
        }
        self
    }

    /// Give a global internal linkage (C `static`). No effect on stack slots.
    pub fn internal(mut self) -> Self {
        if let StorageKind::Global { linkage, .. } = &mut self.kind {
            *linkage = Linkage::Internal;
        }
        self
    }

    pub fn is_global(&self) -> bool {
        self.kind.is_global()
    }

    /// True for globals with internal linkage (C `static`).
    pub fn is_static(&self) -> bool {
        matches!(
            self.kind,
            StorageKind::Global {
                linkage: Linkage::Internal,
                ..
            }
        )
    }

    /// True for const-qualified globals.
    pub fn is_const_global(&self) -> bool {
        matches!(self.kind, StorageKind::Global { is_const: true, .. })
    }
}
