//! Debug-metadata oracle.
//!
//! The interface analysis needs three facts about a storage location that
//! only debug metadata can answer: where it was declared, what
//! source-level type it has, and whether it backs a formal parameter.
//! Those lookups are an injected capability rather than a concrete
//! compiler API so the engine runs unchanged against a synthetic
//! in-memory CFG with hand-authored metadata.
//!
//! Every method is nullable. Compiler-synthesized storage (return-value
//! slots, spill temporaries) legitimately lacks source-level identity and
//! callers are expected to fail open, excluding such locations from
//! classification instead of erroring.
use crate::{module::Module, storage::StorageId, types::Typeref};

/// Metadata lookups for storage locations.
pub trait DebugInfo {
    /// Declaration line of `id`, when debug metadata recorded one.
    fn line_of(&self, id: StorageId) -> Option<u32>;

    /// Debug-type descriptor of `id`.
    fn type_of(&self, id: StorageId) -> Option<Typeref>;

    /// Whether `id` backs a formal parameter of its function.
    fn is_parameter(&self, id: StorageId) -> bool;

    /// Source-level name of `id`.
    fn name_of(&self, id: StorageId) -> Option<&str>;
}

impl DebugInfo for Module {
    fn line_of(&self, id: StorageId) -> Option<u32> {
        self.storage(id).and_then(|s| s.decl_line)
    }

    fn type_of(&self, id: StorageId) -> Option<Typeref> {
        self.storage(id).map(|s| s.ty)
    }

    fn is_parameter(&self, id: StorageId) -> bool {
        self.storage(id).is_some_and(|s| s.is_param)
    }

    fn name_of(&self, id: StorageId) -> Option<&str> {
        self.storage(id).map(|s| s.name.as_str())
    }
}
