//! Interface classification.
//!
//! Given a resolved region and its closures, decide for every storage
//! location that feeds the region whether it crosses the boundary inward
//! (input), outward (output), both, or not at all. Locations without a
//! declaration line in debug metadata are skipped rather than guessed at;
//! a missed variable surfaces as a compile error in the extracted code,
//! a wrongly guessed one as silent misbehavior.
use std::collections::{BTreeMap, BTreeSet};

use fxir::{
    consts::AnyConst,
    debug::DebugInfo,
    instr::{Instr, Instruction, Operand},
    module::{Function, Module},
    storage::StorageId,
    types::{TypeDesc, TypeRegistry, Typeref},
};
use log::{debug, warn};

use crate::{
    provenance::{self, FunctionIndex},
    region::{Area, Region, RegionClosures},
};

/// The two independent boundary directions. A variable can cross both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub input: bool,
    pub output: bool,
}

/// The resolved region together with everything derived from it that
/// classification consults.
pub struct RegionScope<'a> {
    pub region: &'a Region,
    pub closures: &'a RegionClosures,
    pub region_area: Area,
    pub func_area: Area,
}

/// Classify every storage location relevant to the region in `scope`.
pub fn classify<O: DebugInfo>(
    module: &Module,
    registry: &TypeRegistry,
    oracle: &O,
    func: &Function,
    index: &FunctionIndex,
    scope: &RegionScope<'_>,
) -> BTreeMap<StorageId, Classification> {
    // Locations written through inside the region, and the subset whose
    // write destination is the location itself rather than an address
    // computed from it.
    let mut written = BTreeSet::new();
    let mut overwritten = BTreeSet::new();
    for label in &scope.region.blocks {
        let Some(bb) = func.body.get(label) else {
            continue;
        };
        for instr in &bb.instructions {
            written.extend(provenance::trace_destination(func, index, instr));
            if let Some(id) = provenance::direct_write_target(instr) {
                overwritten.insert(id);
            }
        }
    }

    let mut result: BTreeMap<StorageId, Classification> = BTreeMap::new();

    for label in &scope.region.blocks {
        let Some(bb) = func.body.get(label) else {
            continue;
        };
        for instr in &bb.instructions {
            if !instr.touches_memory() {
                continue;
            }
            for id in provenance::trace(func, index, instr) {
                if result.contains_key(&id) {
                    continue;
                }
                let class =
                    classify_storage(module, registry, oracle, index, scope, id, &written, &overwritten);
                if let Some(class) = class {
                    result.insert(id, class);
                }
            }
        }
    }

    // Immediates inside the region may stand for folded constants declared
    // before it; immediates after the region for constants declared inside
    // it. Either way the binding crosses the boundary even though no
    // storage operand ever names it.
    for label in &scope.region.blocks {
        let Some(bb) = func.body.get(label) else {
            continue;
        };
        for instr in &bb.instructions {
            for value in imm_operands(instr) {
                for bound in index.literals.bound_to(value) {
                    let Some(decl) = oracle.line_of(bound) else {
                        continue;
                    };
                    if scope.region_area.contains(decl) {
                        continue;
                    }
                    let eligible = match module.storage(bound) {
                        Some(s) if s.is_global() => scope.func_area.contains(decl),
                        Some(_) => true,
                        None => false,
                    };
                    if eligible {
                        result.entry(bound).or_default().input = true;
                    }
                }
            }
        }
    }
    for label in &scope.closures.successors {
        let Some(bb) = func.body.get(label) else {
            continue;
        };
        for instr in &bb.instructions {
            for value in imm_operands(instr) {
                for bound in index.literals.bound_to(value) {
                    let inside = oracle
                        .line_of(bound)
                        .is_some_and(|decl| scope.region_area.contains(decl));
                    if inside && !oracle.is_parameter(bound) {
                        result.entry(bound).or_default().output = true;
                    }
                }
            }
        }
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn classify_storage<O: DebugInfo>(
    module: &Module,
    registry: &TypeRegistry,
    oracle: &O,
    index: &FunctionIndex,
    scope: &RegionScope<'_>,
    id: StorageId,
    written: &BTreeSet<StorageId>,
    overwritten: &BTreeSet<StorageId>,
) -> Option<Classification> {
    let storage = module.storage(id)?;
    let Some(decl) = oracle.line_of(id) else {
        debug!("storage {id} carries no declaration line; not classified");
        return None;
    };
    let is_param = oracle.is_parameter(id);
    let inside_region = scope.region_area.contains(decl);

    let input = if storage.is_global() {
        // A global crosses the boundary as an argument only when it is
        // function-local in source terms (a static local hoisted out by
        // the front end): declared within the function's area but outside
        // the region's. File-scope globals stay visible by name.
        scope.func_area.contains(decl) && !inside_region
    } else {
        is_param
            || (!inside_region
                && (decl < scope.region_area.start
                    || index.used_in(id, &scope.closures.predecessors)))
    };

    let read_after = index.used_in(id, &scope.closures.successors);
    let mut output = inside_region && !is_param && read_after;
    if output && written.contains(&id) {
        output = must_return(registry, oracle.type_of(id), overwritten.contains(&id));
    }

    Some(Classification { input, output })
}

/// Whether a written variable's post-region value has to travel back
/// through a return value.
///
/// Scalars and aggregates do: the region's copy dies with the extracted
/// function's frame. Arrays never do; their contents live in memory the
/// caller already shares. A pointer only does when the pointer *itself*
/// was overwritten (`directly_overwritten`); writes through it went to
/// shared memory.
pub fn must_return(
    registry: &TypeRegistry,
    ty: Option<Typeref>,
    directly_overwritten: bool,
) -> bool {
    // No type metadata: assume scalar, which at worst returns a value the
    // caller ignores.
    let Some(mut current) = ty else {
        return true;
    };

    let mut seen = BTreeSet::new();
    loop {
        if !seen.insert(current) {
            warn!("cyclic type-descriptor chain at {current:?}; assuming scalar");
            return true;
        }
        match registry.lookup(current) {
            None => {
                warn!("dangling type descriptor {current:?}; assuming scalar");
                return true;
            }
            Some(TypeDesc::ConstQ(base)) | Some(TypeDesc::Typedef { base, .. }) => current = base,
            Some(TypeDesc::Basic(_))
            | Some(TypeDesc::Struct { .. })
            | Some(TypeDesc::Union { .. })
            | Some(TypeDesc::Enum { .. }) => return true,
            Some(TypeDesc::Array { .. }) => return false,
            Some(TypeDesc::Pointer(_)) | Some(TypeDesc::Subroutine { .. }) => {
                return directly_overwritten;
            }
        }
    }
}

fn imm_operands(instr: &Instr) -> impl Iterator<Item = &AnyConst> {
    let mut found = Vec::new();
    let mut stack: Vec<&Operand> = instr.operands().collect();
    while let Some(op) = stack.pop() {
        match op {
            Operand::Imm(value) => found.push(value),
            Operand::Expr(expr) => stack.extend(expr.operands.iter()),
            Operand::Reg(_) | Operand::Storage(_) | Operand::Arg(_) => {}
        }
    }
    found.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returnability_follows_the_resolved_type() {
        let reg = TypeRegistry::new();
        let int = reg.search_or_insert(TypeDesc::Basic("int".into()));
        let cint = reg.search_or_insert(TypeDesc::ConstQ(int));
        let pint = reg.search_or_insert(TypeDesc::Pointer(int));
        let arr = reg.search_or_insert(TypeDesc::Array { elem: int, len: 8 });
        let tdef = reg.search_or_insert(TypeDesc::Typedef {
            name: "myint".into(),
            base: cint,
        });

        assert!(must_return(&reg, Some(int), false));
        assert!(must_return(&reg, Some(tdef), false));
        assert!(!must_return(&reg, Some(arr), true));
        assert!(!must_return(&reg, Some(pint), false));
        assert!(must_return(&reg, Some(pint), true));
        // Fail open on missing metadata.
        assert!(must_return(&reg, None, false));
        assert!(must_return(&reg, Some(TypeRegistry::dangling()), false));
    }
}
