//! Debug-type descriptors.
//!
//! Source-level types are recovered from debug metadata as *chains* of
//! descriptors: each [`TypeDesc`] is one derivation or composition level
//! (a pointer, a qualifier, one array dimension, ...) referencing the next
//! level through a [`Typeref`]. The chain terminates at a basic type, an
//! aggregate, or a subroutine type.
//!
//! Descriptors live in a central [`TypeRegistry`] which deduplicates them
//! and hands out stable `Typeref` identifiers. The registry is read-mostly
//! once a module is loaded; its interior locking exists so a driver may
//! analyze functions of the same module from several threads.
//!
//! A dangling `Typeref` (present in a descriptor, absent from the
//! registry) is representable on purpose: it models a malformed metadata
//! chain, which consumers must survive by truncating their walk.
use std::{
    collections::BTreeMap,
    hash::{DefaultHasher, Hash, Hasher},
};

use log::{debug, info};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use strum::EnumIs;
use uuid::Uuid;

/// A stable reference to a descriptor stored inside a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Typeref(Uuid);

/// One level of a debug-type-descriptor chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeDesc {
    /// Terminal base type, carrying its source-level spelling ("int",
    /// "unsigned long", "float", ...).
    Basic(String),

    /// Pointer to the referenced type.
    Pointer(Typeref),

    /// `const` qualification of the referenced type.
    ConstQ(Typeref),

    /// A typedef. The name is kept for diagnostics; reconstruction treats
    /// typedefs as transparent and walks through to `base`.
    Typedef { name: String, base: Typeref },

    /// One array dimension. Multi-dimensional arrays are chains of
    /// `Array` levels, outermost first.
    Array { elem: Typeref, len: u64 },

    /// Terminal struct type. `None` means the aggregate is anonymous.
    Struct { name: Option<String> },

    /// Terminal union type. `None` means the aggregate is anonymous.
    Union { name: Option<String> },

    /// Terminal enum type. `None` means the aggregate is anonymous.
    Enum { name: Option<String> },

    /// A subroutine type, i.e. the pointee of a function pointer.
    /// `ret: None` is a `void` return.
    Subroutine {
        ret: Option<Typeref>,
        params: Vec<Typeref>,
    },
}

/// A central registry that stores and deduplicates [`TypeDesc`] values.
///
/// Identical descriptors map to the same stable [`Typeref`]. Lookup goes
/// through a hash-based inverse index with per-hash candidate buckets, so
/// collisions only cost a linear scan of the bucket.
pub struct TypeRegistry {
    array: RwLock<BTreeMap<Uuid, TypeDesc>>,
    inverse_lookup: RwLock<BTreeMap<u64, SmallVec<Uuid, 1>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    fn hash_desc(desc: &TypeDesc) -> u64 {
        let mut hasher = DefaultHasher::new();
        desc.hash(&mut hasher);
        hasher.finish()
    }

    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            array: Default::default(),
            // INFO: Always lock array before inverse_lookup to avoid deadlock
            inverse_lookup: Default::default(),
        }
    }

    /// Retrieve a borrowed [`TypeDesc`] for the given `typeref`. Returns
    /// [`None`] if the given `typeref` is not present in the registry.
    ///
    /// The returned guard keeps a read lock held for its lifetime; do not
    /// hold it across a call to [`Self::search_or_insert`].
    pub fn get(&self, typeref: Typeref) -> Option<MappedRwLockReadGuard<'_, TypeDesc>> {
        let array_lock = self.array.read_recursive();
        RwLockReadGuard::try_map(array_lock, |map| map.get(&typeref.0)).ok()
    }

    /// Clone the descriptor behind `typeref` out of the registry.
    ///
    /// Chain walkers prefer this over [`Self::get`] so they never hold a
    /// guard while following the chain.
    pub fn lookup(&self, typeref: Typeref) -> Option<TypeDesc> {
        self.get(typeref).map(|guard| guard.clone())
    }

    /// Insert `desc` into the registry if an equivalent descriptor doesn't
    /// already exist and return the [`Typeref`] for it.
    ///
    /// Uses an upgradable read lock so the common hit path never contends
    /// with other readers. Must not be called while holding a guard
    /// returned by [`Self::get`].
    pub fn search_or_insert(&self, desc: TypeDesc) -> Typeref {
        let h = Self::hash_desc(&desc);

        // Lock, notice that the order is critical, always lock array first
        let mut array_lock = self.array.upgradable_read();
        let mut inverse_lookup_lock = self.inverse_lookup.upgradable_read();

        if let Some(typerefs) = inverse_lookup_lock.get(&h) {
            for typeref in typerefs {
                if &array_lock[typeref] == &desc {
                    return Typeref(*typeref);
                }
            }
        }

        // No match, reserve a fresh typeref and publish the descriptor.
        // NOTE: Ordering of upgrade is paramount to avoid deadlock
        array_lock.with_upgraded(|array_lock| {
            inverse_lookup_lock.with_upgraded(|inverse_lookup_lock| {
                let new_typeref = Uuid::new_v4();

                if let Some(list) = inverse_lookup_lock.get_mut(&h) {
                    // Important: log collisions at info level with full context.
                    info!(
                        "Detected a hash collision on hash 0x{:016x} while registering {:?}; {} candidate(s) already present",
                        h,
                        desc,
                        list.len(),
                    );
                    list.push(new_typeref);
                } else {
                    debug!(
                        "New type descriptor {:?} registered with UUID {}",
                        desc, new_typeref
                    );
                    inverse_lookup_lock.insert(h, smallvec![new_typeref]);
                }

                array_lock.insert(new_typeref, desc);
                Typeref(new_typeref)
            })
        })
    }

    /// Allocate a `Typeref` that resolves to nothing.
    ///
    /// Test-facing: models a truncated debug-metadata chain so consumers
    /// can exercise their recovery path.
    pub fn dangling() -> Typeref {
        Typeref(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_deduplicates_identical_descriptors() {
        let reg = TypeRegistry::new();
        let a = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let b = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let c = reg.search_or_insert(TypeDesc::Basic("float".into()));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.lookup(a), Some(TypeDesc::Basic("int".into())));
    }

    #[test]
    fn chains_reference_levels_by_typeref() {
        let reg = TypeRegistry::new();
        let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let cint = reg.search_or_insert(TypeDesc::ConstQ(int));
        let pcint = reg.search_or_insert(TypeDesc::Pointer(cint));

        let desc = reg.lookup(pcint).expect("pointer level present");
        assert_eq!(desc, TypeDesc::Pointer(cint));
        assert!(reg.lookup(TypeRegistry::dangling()).is_none());
    }
}
