//! Functions and modules.
//!
//! A [`Function`] owns its control-flow graph (`body`) keyed by [`Label`];
//! by convention the entrypoint is the basic block with [`Label::NIL`].
//! A [`Module`] is the compilation-unit boundary: it owns every function
//! plus the storage arena in which both globals and all functions' stack
//! slots live, so a [`StorageId`] is unique module-wide.
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    block::{BasicBlock, Label},
    instr::{Instr, Instruction},
    storage::{Storage, StorageId},
    types::Typeref,
};

/// A function made of basic blocks plus the metadata the interface
/// analysis needs: formal parameters, return type, the stack slots the
/// function declares, and its source-line bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub name: String,

    /// Formal parameters in declaration order.
    pub params: Vec<(String, Typeref)>,

    /// `None` is a `void` return.
    pub return_type: Option<Typeref>,

    pub body: BTreeMap<Label, BasicBlock>,

    /// Stack slots declared by this function, in allocation order.
    pub slots: Vec<StorageId>,

    /// Line of the function's declaration.
    pub decl_line: u32,

    /// First body line, when debug metadata distinguishes it from the
    /// declaration line. Used as the lower bound of the function's area.
    pub first_line: Option<u32>,
}

impl Function {
    /// The entry block, i.e. the block labeled [`Label::NIL`].
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.body.get(&Label::NIL)
    }

    /// Lower line bound of the function.
    pub fn low_line(&self) -> u32 {
        self.first_line.unwrap_or(self.decl_line)
    }

    /// Successor labels of `label`, from its terminator's targets.
    /// Duplicate edges (e.g. a conditional branch with equal arms) are
    /// yielded as-is; closure walks deduplicate through their visited set.
    pub fn successors(&self, label: Label) -> impl Iterator<Item = Label> + '_ {
        self.body
            .get(&label)
            .into_iter()
            .flat_map(|bb| bb.terminator.iter_targets())
    }

    /// Build the reverse edge map for the whole body.
    pub fn predecessor_map(&self) -> BTreeMap<Label, BTreeSet<Label>> {
        let mut map: BTreeMap<Label, BTreeSet<Label>> = BTreeMap::new();
        for (label, bb) in &self.body {
            map.entry(*label).or_default();
            for target in bb.terminator.iter_targets() {
                map.entry(target).or_default().insert(*label);
            }
        }
        map
    }

    /// Find a block by its textual label. Textual names are unique within
    /// a function; region configurations resolve blocks through this.
    pub fn block_by_name(&self, name: &str) -> Option<&BasicBlock> {
        self.body.values().find(|bb| bb.name == name)
    }

    /// Iterate over every instruction of the function together with its
    /// position `(label, index)`.
    pub fn instructions(&self) -> impl Iterator<Item = (Label, usize, &Instr)> {
        self.body.iter().flat_map(|(label, bb)| {
            bb.instructions
                .iter()
                .enumerate()
                .map(move |(idx, instr)| (*label, idx, instr))
        })
    }

    /// Highest source line observed among the function's instructions and
    /// terminators. `None` when the function carries no line metadata.
    pub fn max_line(&self) -> Option<u32> {
        self.body
            .values()
            .flat_map(|bb| {
                bb.instructions
                    .iter()
                    .filter_map(|i| i.line())
                    .chain(bb.terminator.line())
            })
            .max()
    }
}

/// A compilation unit: defined functions plus the storage arena.
#[derive(Debug, Default, Clone)]
pub struct Module {
    pub functions: BTreeMap<String, Function>,
    storage: BTreeMap<StorageId, Storage>,
    next_storage: u32,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh identity for `storage` and take ownership of it.
    pub fn alloc_storage(&mut self, storage: Storage) -> StorageId {
        let id = StorageId(self.next_storage);
        self.next_storage += 1;
        self.storage.insert(id, storage);
        id
    }

    /// Look a storage location up by identity.
    pub fn storage(&self, id: StorageId) -> Option<&Storage> {
        self.storage.get(&id)
    }

    /// Iterate over all storage locations in the arena.
    pub fn storage_iter(&self) -> impl Iterator<Item = (StorageId, &Storage)> {
        self.storage.iter().map(|(id, storage)| (*id, storage))
    }

    /// Iterate over global storage locations only.
    pub fn globals(&self) -> impl Iterator<Item = (StorageId, &Storage)> {
        self.storage_iter().filter(|(_, s)| s.is_global())
    }

    /// Register `function`, keyed by its name.
    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Jump, Ret, Terminator};

    fn block(label: u32, name: &str, terminator: Terminator) -> BasicBlock {
        BasicBlock {
            label: Label(label),
            name: name.into(),
            instructions: Vec::new(),
            terminator,
        }
    }

    #[test]
    fn predecessor_map_inverts_terminator_edges() {
        let mut body = BTreeMap::new();
        body.insert(
            Label::NIL,
            block(
                0,
                "entry",
                Jump {
                    target: Label(1),
                    line: None,
                }
                .into(),
            ),
        );
        body.insert(
            Label(1),
            block(
                1,
                "exit",
                Ret {
                    value: None,
                    line: None,
                }
                .into(),
            ),
        );

        let func = Function {
            name: "f".into(),
            params: Vec::new(),
            return_type: None,
            body,
            slots: Vec::new(),
            decl_line: 1,
            first_line: None,
        };

        let preds = func.predecessor_map();
        assert!(preds[&Label::NIL].is_empty());
        assert_eq!(
            preds[&Label(1)].iter().copied().collect::<Vec<_>>(),
            vec![Label::NIL]
        );
        assert_eq!(func.successors(Label::NIL).collect::<Vec<_>>(), vec![
            Label(1)
        ]);
    }
}
