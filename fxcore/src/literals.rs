//! Literal-constant reattribution.
//!
//! Front ends routinely fold `const int x = 1000;` into every use of `x`,
//! so the immediates inside a region carry no storage reference back to
//! the variable they came from. This module rebuilds that association
//! heuristically: a binding is a `(constant, storage)` pair meaning "an
//! immediate equal to this constant plausibly stands for this location".
//!
//! The association is by *value equality*, so two distinct variables
//! initialized to the same literal both bind to an occurrence of that
//! literal. That over-approximation is deliberate: reporting both
//! candidates keeps the consumer safe, while guessing one of them risks
//! dropping a genuine interface variable.
use std::collections::BTreeMap;

use fxir::{
    block::Label,
    consts::AnyConst,
    instr::{Instr, Operand},
    module::{Function, Module},
    storage::{StorageId, StorageKind},
};

use crate::region::Area;

/// All literal bindings discovered for one function.
#[derive(Debug, Clone, Default)]
pub struct LiteralBindings {
    pairs: Vec<(AnyConst, StorageId)>,
}

impl LiteralBindings {
    /// Derive the bindings for `func`.
    ///
    /// Two shapes qualify:
    /// - a stack slot whose single referencing instruction is a store of
    ///   an immediate directly into it (the initializer survived folding,
    ///   every read was replaced by the constant);
    /// - a constant-qualified global with a known initializer, declared
    ///   within the function's line area (a function-local `static const`
    ///   the front end hoisted out).
    pub fn build(
        module: &Module,
        func: &Function,
        users: &BTreeMap<StorageId, Vec<(Label, usize)>>,
    ) -> Self {
        let mut pairs = Vec::new();

        for &slot in &func.slots {
            let Some(&[(label, idx)]) = users.get(&slot).map(Vec::as_slice) else {
                continue;
            };
            let instr = func
                .body
                .get(&label)
                .and_then(|bb| bb.instructions.get(idx));
            if let Some(Instr::MStore(store)) = instr {
                if store.addr == Operand::Storage(slot) {
                    if let Operand::Imm(value) = &store.value {
                        pairs.push((value.clone(), slot));
                    }
                }
            }
        }

        let area = Area::of_function(func);
        for (id, storage) in module.globals() {
            if !storage.is_const_global() {
                continue;
            }
            let StorageKind::Global {
                initializer: Some(value),
                ..
            } = &storage.kind
            else {
                continue;
            };
            if storage.decl_line.is_some_and(|line| area.contains(line)) {
                pairs.push((value.clone(), id));
            }
        }

        Self { pairs }
    }

    /// Every storage location bound to a constant equal to `value`.
    pub fn bound_to<'a>(&'a self, value: &'a AnyConst) -> impl Iterator<Item = StorageId> + 'a {
        self.pairs
            .iter()
            .filter(move |(bound, _)| bound == value)
            .map(|&(_, id)| id)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
