//! Incremental construction of well-formed functions.
//!
//! Front ends and tests use [`FunctionBuilder`] to assemble a CFG without
//! hand-maintaining label counters, SSA name counters, or block maps. The
//! builder keeps an ambient "current source line" that is stamped onto
//! every pushed instruction, which is how hand-authored debug metadata is
//! written concisely.
//!
//! Blocks are opened with [`FunctionBuilder::block`] (or
//! [`FunctionBuilder::block_at`] for forward-referenced labels) and sealed
//! by pushing a terminator. [`FunctionBuilder::finish`] validates the
//! result: entry block present, unique textual names, no dangling branch
//! targets, no unsealed block.
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    block::{BasicBlock, CBranch, Jump, Label, Ret, Switch, Terminator, Trap},
    instr::{Call, Compute, Instr, MLoad, MStore, MemCpy, Name, Operand},
    module::{Function, Module},
    storage::{Storage, StorageId},
    types::Typeref,
    utils::Error,
};

struct OpenBlock {
    label: Label,
    name: String,
    instructions: Vec<Instr>,
}

/// Builder for one [`Function`], allocating storage into the owning module.
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    name: String,
    params: Vec<(String, Typeref)>,
    return_type: Option<Typeref>,
    decl_line: u32,
    first_line: Option<u32>,
    body: BTreeMap<Label, BasicBlock>,
    slots: Vec<StorageId>,
    open: Option<OpenBlock>,
    next_label: u32,
    next_name: Name,
    current_line: Option<u32>,
}

impl<'m> FunctionBuilder<'m> {
    pub fn new(module: &'m mut Module, name: impl Into<String>, decl_line: u32) -> Self {
        Self {
            module,
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            decl_line,
            first_line: None,
            body: BTreeMap::new(),
            slots: Vec::new(),
            open: None,
            next_label: 0,
            next_name: 0,
            current_line: Some(decl_line),
        }
    }

    /// Append a formal parameter.
    pub fn param(mut self, name: impl Into<String>, ty: Typeref) -> Self {
        self.params.push((name.into(), ty));
        self
    }

    /// Set the return type (`None` stays void).
    pub fn returns(mut self, ty: Typeref) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Record the first body line as the function's lower line bound.
    pub fn first_line(mut self, line: u32) -> Self {
        self.first_line = Some(line);
        self
    }

    /// Set the ambient source line stamped onto subsequent instructions.
    pub fn line(&mut self, line: u32) -> &mut Self {
        self.current_line = Some(line);
        self
    }

    /// Clear the ambient source line: subsequent instructions carry none,
    /// modeling compiler-synthesized code without debug locations.
    pub fn no_line(&mut self) -> &mut Self {
        self.current_line = None;
        self
    }

    /// Reserve a label without opening a block, for forward references.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Allocate a stack slot owned by this function.
    pub fn slot(&mut self, name: impl Into<String>, ty: Typeref, decl_line: u32) -> StorageId {
        let id = self
            .module
            .alloc_storage(Storage::stack(name, ty, Some(decl_line)));
        self.slots.push(id);
        id
    }

    /// Allocate a stack slot backing a formal parameter.
    pub fn param_slot(&mut self, name: impl Into<String>, ty: Typeref, decl_line: u32) -> StorageId {
        let id = self
            .module
            .alloc_storage(Storage::stack(name, ty, Some(decl_line)).param());
        self.slots.push(id);
        id
    }

    /// Allocate a compiler-synthesized slot with no declaration line.
    pub fn synthetic_slot(&mut self, name: impl Into<String>, ty: Typeref) -> StorageId {
        let id = self.module.alloc_storage(Storage::stack(name, ty, None));
        self.slots.push(id);
        id
    }

    /// Open a new block with a fresh label.
    pub fn block(&mut self, name: impl Into<String>) -> Result<Label, Error> {
        let label = self.new_label();
        self.block_at(label, name)?;
        Ok(label)
    }

    /// Open a new block at a previously reserved label.
    pub fn block_at(&mut self, label: Label, name: impl Into<String>) -> Result<(), Error> {
        if let Some(open) = &self.open {
            return Err(Error::UnsealedBlock(open.label));
        }
        if self.body.contains_key(&label) {
            return Err(Error::BlockLabelAlreadyExists(label));
        }
        self.open = Some(OpenBlock {
            label,
            name: name.into(),
            instructions: Vec::new(),
        });
        Ok(())
    }

    fn fresh_name(&mut self) -> Name {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    /// Panics if no block is open; pushing instructions outside a block is
    /// a construction bug, not a recoverable condition.
    fn open_mut(&mut self) -> &mut OpenBlock {
        self.open
            .as_mut()
            .expect("no open basic block; call block() first")
    }

    fn push(&mut self, instr: Instr) {
        self.open_mut().instructions.push(instr);
    }

    /// Push a load from `addr`, returning the produced SSA name.
    pub fn load(&mut self, addr: Operand) -> Name {
        let dest = self.fresh_name();
        let line = self.current_line;
        self.push(MLoad { dest, addr, line }.into());
        dest
    }

    /// Push a store of `value` to `addr`.
    pub fn store(&mut self, addr: Operand, value: Operand) {
        let line = self.current_line;
        self.push(MStore { addr, value, line }.into());
    }

    /// Push a block copy from `src` to `dst`.
    pub fn memcpy(&mut self, dst: Operand, src: Operand, len: Operand) {
        let line = self.current_line;
        self.push(MemCpy { dst, src, len, line }.into());
    }

    /// Push a call producing a result.
    pub fn call(&mut self, callee: impl Into<String>, args: Vec<Operand>) -> Name {
        let dest = self.fresh_name();
        let line = self.current_line;
        self.push(
            Call {
                dest: Some(dest),
                callee: callee.into(),
                args,
                line,
            }
            .into(),
        );
        dest
    }

    /// Push a generic value computation over `operands`.
    pub fn compute(&mut self, operands: Vec<Operand>) -> Name {
        let dest = self.fresh_name();
        let line = self.current_line;
        self.push(
            Compute {
                dest,
                operands,
                line,
            }
            .into(),
        );
        dest
    }

    fn seal(&mut self, terminator: Terminator) {
        let open = self
            .open
            .take()
            .expect("no open basic block to terminate; call block() first");
        self.body.insert(open.label, BasicBlock {
            label: open.label,
            name: open.name,
            instructions: open.instructions,
            terminator,
        });
    }

    /// Seal the open block with an unconditional jump.
    pub fn jump(&mut self, target: Label) {
        let line = self.current_line;
        self.seal(Jump { target, line }.into());
    }

    /// Seal the open block with a conditional branch.
    pub fn cbranch(&mut self, cond: Operand, target_true: Label, target_false: Label) {
        let line = self.current_line;
        self.seal(
            CBranch {
                cond,
                target_true,
                target_false,
                line,
            }
            .into(),
        );
    }

    /// Seal the open block with a switch.
    pub fn switch(&mut self, operand: Operand, default_target: Label, cases: Vec<(i64, Label)>) {
        let line = self.current_line;
        self.seal(
            Switch {
                operand,
                default_target,
                cases,
                line,
            }
            .into(),
        );
    }

    /// Seal the open block with a return.
    pub fn ret(&mut self, value: Option<Operand>) {
        let line = self.current_line;
        self.seal(Ret { value, line }.into());
    }

    /// Seal the open block with a trap.
    pub fn trap(&mut self) {
        let line = self.current_line;
        self.seal(Trap { line }.into());
    }

    /// Validate and register the function with the module, returning its
    /// name for later lookup.
    pub fn finish(self) -> Result<String, Error> {
        if let Some(open) = &self.open {
            return Err(Error::UnsealedBlock(open.label));
        }
        if !self.body.contains_key(&Label::NIL) {
            return Err(Error::MissingEntryBlock);
        }

        let mut seen_names = BTreeSet::new();
        for bb in self.body.values() {
            if !seen_names.insert(bb.name.as_str()) {
                return Err(Error::DuplicateBlockName(bb.name.clone()));
            }
            for target in bb.terminator.iter_targets() {
                if !self.body.contains_key(&target) {
                    return Err(Error::UndefinedBasicBlock {
                        block: bb.label,
                        target,
                    });
                }
            }
        }

        let function = Function {
            name: self.name.clone(),
            params: self.params,
            return_type: self.return_type,
            body: self.body,
            slots: self.slots,
            decl_line: self.decl_line,
            first_line: self.first_line,
        };
        self.module.add_function(function);
        Ok(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeDesc, TypeRegistry};

    #[test]
    fn builder_assembles_a_two_block_function() {
        let reg = TypeRegistry::new();
        let int = reg.search_or_insert(TypeDesc::Basic("int".into()));

        let mut module = Module::new();
        let mut fb = FunctionBuilder::new(&mut module, "f", 10).returns(int);
        let a = fb.slot("a", int, 11);

        fb.block("entry").expect("entry opens");
        let exit = fb.new_label();
        fb.line(11).store(Operand::Storage(a), Operand::Imm(crate::consts::AnyConst::int(0)));
        fb.jump(exit);

        fb.block_at(exit, "exit").expect("exit opens");
        fb.line(12);
        let v = fb.load(Operand::Storage(a));
        fb.ret(Some(Operand::Reg(v)));

        let name = fb.finish().expect("function validates");
        let func = &module.functions[&name];
        assert_eq!(func.body.len(), 2);
        assert!(func.entry().is_some());
        assert_eq!(func.max_line(), Some(12));
    }

    #[test]
    fn finish_rejects_dangling_branch_targets() {
        let mut module = Module::new();
        let mut fb = FunctionBuilder::new(&mut module, "broken", 1);
        fb.block("entry").expect("entry opens");
        let nowhere = fb.new_label();
        fb.jump(nowhere);

        assert!(matches!(
            fb.finish(),
            Err(Error::UndefinedBasicBlock { .. })
        ));
    }

    #[test]
    fn finish_rejects_duplicate_textual_names() {
        let mut module = Module::new();
        let mut fb = FunctionBuilder::new(&mut module, "dups", 1);
        fb.block("entry").expect("entry opens");
        let second = fb.new_label();
        fb.jump(second);
        fb.block_at(second, "entry").expect("second opens");
        fb.ret(None);

        assert_eq!(fb.finish(), Err(Error::DuplicateBlockName("entry".into())));
    }
}
