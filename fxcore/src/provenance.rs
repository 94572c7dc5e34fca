//! Value provenance: which storage locations feed an instruction.
//!
//! [`FunctionIndex`] is the per-function working set the engine builds
//! before classifying anything: the SSA definition map, the storage user
//! map, and the literal-constant bindings. It is rebuilt for every
//! analyzed function; caching it across functions would leak literal
//! associations between unrelated functions.
use std::collections::{BTreeMap, BTreeSet};

use fxir::{
    block::Label,
    instr::{Instr, Instruction, Name, Operand},
    module::{Function, Module},
    storage::StorageId,
};

use crate::literals::LiteralBindings;

/// Per-function lookup structures for provenance tracing.
pub struct FunctionIndex {
    defs: BTreeMap<Name, (Label, usize)>,
    users: BTreeMap<StorageId, Vec<(Label, usize)>>,
    pub literals: LiteralBindings,
}

impl FunctionIndex {
    /// Scan `func` once, recording where every SSA name is defined and
    /// where every storage location is referenced (transitively through
    /// constant expressions), then derive the literal bindings.
    pub fn build(module: &Module, func: &Function) -> Self {
        let mut defs: BTreeMap<Name, (Label, usize)> = BTreeMap::new();
        let mut users: BTreeMap<StorageId, Vec<(Label, usize)>> = BTreeMap::new();

        for (label, idx, instr) in func.instructions() {
            if let Some(dest) = instr.destination() {
                defs.insert(dest, (label, idx));
            }

            let mut stack: Vec<&Operand> = instr.operands().collect();
            while let Some(op) = stack.pop() {
                match op {
                    Operand::Storage(id) => {
                        users.entry(*id).or_default().push((label, idx));
                    }
                    Operand::Expr(expr) => stack.extend(expr.operands.iter()),
                    Operand::Reg(_) | Operand::Imm(_) | Operand::Arg(_) => {}
                }
            }
        }

        let literals = LiteralBindings::build(module, func, &users);
        Self {
            defs,
            users,
            literals,
        }
    }

    /// Where `name` is defined, if anywhere in the function.
    pub fn def_site(&self, name: Name) -> Option<(Label, usize)> {
        self.defs.get(&name).copied()
    }

    /// Every `(block, instruction index)` at which `id` appears as an
    /// operand.
    pub fn users_of(&self, id: StorageId) -> &[(Label, usize)] {
        self.users.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `id` is referenced by some instruction located in `blocks`.
    pub fn used_in(&self, id: StorageId, blocks: &BTreeSet<Label>) -> bool {
        self.users_of(id)
            .iter()
            .any(|(label, _)| blocks.contains(label))
    }
}

fn trace_operands<'a>(
    func: &Function,
    index: &FunctionIndex,
    seed: impl IntoIterator<Item = &'a Operand>,
) -> BTreeSet<StorageId> {
    let mut roots = BTreeSet::new();
    let mut visited: BTreeSet<Name> = BTreeSet::new();
    let mut stack: Vec<&Operand> = seed.into_iter().collect();

    while let Some(op) = stack.pop() {
        match op {
            Operand::Reg(name) => {
                // Memoize visited names: use-chains can cycle through
                // loop back-edges feeding phi-like joins.
                if !visited.insert(*name) {
                    continue;
                }
                let Some((label, idx)) = index.def_site(*name) else {
                    continue;
                };
                if let Some(def) = func
                    .body
                    .get(&label)
                    .and_then(|bb| bb.instructions.get(idx))
                {
                    stack.extend(def.operands());
                }
            }
            Operand::Storage(id) => {
                roots.insert(*id);
            }
            Operand::Expr(expr) => stack.extend(expr.operands.iter()),
            // Immediates are handled by literal reattribution; direct SSA
            // uses of formal arguments are not storage and are discarded.
            Operand::Imm(_) | Operand::Arg(_) => {}
        }
    }

    roots
}

/// The set of storage locations that causally feed `instr`.
///
/// A store is the one special case: only its *destination* operand is
/// traced. Recursing into the value operand would conflate "what is being
/// written" with "what is being written to" and wreck output detection.
pub fn trace(func: &Function, index: &FunctionIndex, instr: &Instr) -> BTreeSet<StorageId> {
    match instr {
        Instr::MStore(store) => trace_operands(func, index, [&store.addr]),
        _ => trace_operands(func, index, instr.operands()),
    }
}

/// The storage locations an instruction writes through, if it writes at
/// all: the traced destination of a store or block copy.
pub fn trace_destination(
    func: &Function,
    index: &FunctionIndex,
    instr: &Instr,
) -> BTreeSet<StorageId> {
    match instr {
        Instr::MStore(store) => trace_operands(func, index, [&store.addr]),
        Instr::MemCpy(memcpy) => trace_operands(func, index, [&memcpy.dst]),
        _ => BTreeSet::new(),
    }
}

/// The operand written by `instr` when the write destination is a storage
/// location *directly*, i.e. the address operand is the location itself
/// rather than a value computed from it. This is what distinguishes
/// overwriting a pointer variable from writing through it.
pub fn direct_write_target(instr: &Instr) -> Option<StorageId> {
    let addr = match instr {
        Instr::MStore(store) => &store.addr,
        Instr::MemCpy(memcpy) => &memcpy.dst,
        _ => return None,
    };
    match addr {
        Operand::Storage(id) => Some(*id),
        _ => None,
    }
}
