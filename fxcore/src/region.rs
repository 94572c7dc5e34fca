//! Region resolution and CFG closure walking.
//!
//! A region is a designated connected subgraph of one function's basic
//! blocks. Resolution matches a configured [`RegionSpec`] against the
//! function's *current* block set; failing to match is the expected
//! outcome for every function/region pair that isn't the target, so it is
//! reported as `None` and logged at debug level only.
use std::collections::{BTreeSet, VecDeque};

use fxir::{
    block::Label,
    instr::Instruction,
    module::Function,
};
use log::{debug, warn};

use crate::config::RegionSpec;

/// A closed source-line interval derived from debug line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub start: u32,
    pub end: u32,
}

impl Area {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, line: u32) -> bool {
        line >= self.start && line <= self.end
    }

    /// Min/max line over the instructions and terminators of `labels`.
    /// `None` when no instruction in the set carries a line.
    pub fn of_blocks<'a>(
        func: &Function,
        labels: impl IntoIterator<Item = &'a Label>,
    ) -> Option<Area> {
        let mut bounds: Option<(u32, u32)> = None;
        for label in labels {
            let Some(bb) = func.body.get(label) else {
                continue;
            };
            let lines = bb
                .instructions
                .iter()
                .filter_map(|i| i.line())
                .chain(bb.terminator.line());
            for line in lines {
                bounds = Some(match bounds {
                    None => (line, line),
                    Some((lo, hi)) => (lo.min(line), hi.max(line)),
                });
            }
        }
        bounds.map(|(lo, hi)| Area::new(lo, hi))
    }

    /// The whole function's area: from its declaration (or first body
    /// line) to the highest line it contains.
    pub fn of_function(func: &Function) -> Area {
        let start = func.low_line();
        let end = func.max_line().unwrap_or(start).max(start);
        Area::new(start, end)
    }
}

/// A resolved region: block set plus its single entry block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub blocks: BTreeSet<Label>,
    pub entry: Label,
}

impl Region {
    pub fn contains(&self, label: Label) -> bool {
        self.blocks.contains(&label)
    }

    /// True when the region's entry is the function entry, in which case
    /// the predecessor closure is empty and formal parameters must all be
    /// treated as inputs.
    pub fn starts_at_function_entry(&self) -> bool {
        self.entry.is_nil()
    }

    /// True when the region covers every block of `func`, i.e. the region
    /// is already a whole function.
    pub fn is_toplevel(&self, func: &Function) -> bool {
        self.blocks.len() == func.body.len()
    }
}

/// Match `spec` against the current block set of `func`.
///
/// Block mode requires every configured label to name a block of the
/// function. A stale configuration (labels renamed or merged by an
/// earlier pass) therefore resolves to `None` instead of silently
/// analyzing a partial region.
pub fn resolve(func: &Function, spec: &RegionSpec) -> Option<Region> {
    let blocks: BTreeSet<Label> = match spec {
        RegionSpec::Blocks { blocks: labels } => {
            let mut selected = BTreeSet::new();
            for name in labels {
                let Some(bb) = func.block_by_name(name) else {
                    debug!(
                        "function `{}`: configured label `{name}` matches no block, not the region",
                        func.name
                    );
                    return None;
                };
                selected.insert(bb.label);
            }
            selected
        }
        RegionSpec::Lines { lines: [start, end] } => {
            let span = Area::new(*start, *end);
            func.body
                .values()
                .filter(|bb| {
                    let mut lines = bb
                        .instructions
                        .iter()
                        .filter_map(|i| i.line())
                        .chain(bb.terminator.line())
                        .peekable();
                    lines.peek().is_some() && lines.all(|line| span.contains(line))
                })
                .map(|bb| bb.label)
                .collect()
        }
    };

    if blocks.is_empty() {
        debug!("function `{}`: region spec selected no blocks", func.name);
        return None;
    }

    let entry = region_entry(func, &blocks);
    Some(Region { blocks, entry })
}

/// Pick the region's entry block: the function entry when it belongs to
/// the region, otherwise the block with a predecessor outside the region.
/// Single-entry regions are assumed, not enforced; ambiguity is resolved
/// towards the smallest label and logged.
fn region_entry(func: &Function, blocks: &BTreeSet<Label>) -> Label {
    if blocks.contains(&Label::NIL) {
        return Label::NIL;
    }

    let preds = func.predecessor_map();
    let mut candidates = blocks.iter().copied().filter(|label| {
        preds
            .get(label)
            .is_some_and(|p| p.iter().any(|pred| !blocks.contains(pred)))
    });

    match (candidates.next(), candidates.next()) {
        (Some(first), None) => first,
        (Some(first), Some(second)) => {
            warn!(
                "function `{}`: region has multiple entry candidates ({first}, {second}, ...); assuming {first}",
                func.name
            );
            first
        }
        (None, _) => {
            let first = *blocks.iter().next().expect("region is never empty");
            warn!(
                "function `{}`: region unreachable from outside; assuming entry {first}",
                func.name
            );
            first
        }
    }
}

/// Traversal direction for [`reachable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Succ,
    Pred,
}

/// Breadth-first reachability closure from `from`, following edges in the
/// given direction. The returned set includes `from` itself.
pub fn reachable(func: &Function, from: Label, direction: Direction) -> BTreeSet<Label> {
    let preds = match direction {
        Direction::Succ => None,
        Direction::Pred => Some(func.predecessor_map()),
    };

    let mut blocks = BTreeSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(from);

    while let Some(current) = queue.pop_front() {
        // Expand each block once; a revisit means we came back around a loop.
        if !blocks.insert(current) {
            continue;
        }
        match (&direction, &preds) {
            (Direction::Succ, _) => queue.extend(func.successors(current)),
            (Direction::Pred, Some(preds)) => {
                if let Some(p) = preds.get(&current) {
                    queue.extend(p.iter().copied());
                }
            }
            (Direction::Pred, None) => unreachable!(),
        }
    }

    blocks
}

/// The two disjoint block sets surrounding a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionClosures {
    /// Blocks backward-reachable from the region entry, minus the region.
    pub predecessors: BTreeSet<Label>,
    /// Blocks forward-reachable from the region entry, minus the region.
    pub successors: BTreeSet<Label>,
}

/// Compute both closures for `region`.
///
/// The region's own blocks are removed only after each traversal
/// completes: removing them during the walk would hide blocks that are
/// reachable only through a path passing back through the region.
pub fn closures(func: &Function, region: &Region) -> RegionClosures {
    let mut predecessors = reachable(func, region.entry, Direction::Pred);
    let mut successors = reachable(func, region.entry, Direction::Succ);

    for label in &region.blocks {
        predecessors.remove(label);
        successors.remove(label);
    }

    RegionClosures {
        predecessors,
        successors,
    }
}

/// The source lines at which control can leave the region: terminators
/// with a target outside the region, plus in-region returns and traps.
pub fn exit_lines(func: &Function, region: &Region) -> BTreeSet<u32> {
    let mut lines = BTreeSet::new();
    for label in &region.blocks {
        let Some(bb) = func.body.get(label) else {
            continue;
        };
        let mut leaves = bb.terminator.iter_targets().peekable();
        let exits = if leaves.peek().is_none() {
            // Ret or Trap: always leaves the region.
            true
        } else {
            leaves.any(|target| !region.contains(target))
        };
        if exits {
            if let Some(line) = bb.terminator.line() {
                lines.insert(line);
            }
        }
    }
    lines
}
