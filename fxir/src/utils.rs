use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

use crate::block::Label;

#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// No basic block with the entrypoint label was found.
    #[error(
        "By convention, the entrypoint basic block of a function must have label `%block_0`. No such basic block was found."
    )]
    MissingEntryBlock,

    /// A basic block with the given label already exists in the function.
    #[error("A basic block with label `{0}` already exists in the function.")]
    BlockLabelAlreadyExists(Label),

    /// Two basic blocks share the same textual name.
    #[error(
        "The textual block name `{0}` is used by more than one basic block. Region configurations match blocks by name, so names must be unique within a function."
    )]
    DuplicateBlockName(String),

    /// A terminator transfers control to a label with no basic block.
    #[error(
        "The terminator of basic block `{block}` targets `{target}`, but no basic block with that label is defined within the function."
    )]
    UndefinedBasicBlock { block: Label, target: Label },

    /// A block was started but never given a terminator.
    #[error(
        "Basic block `{0}` was opened but never sealed with a terminator. Every basic block must end with exactly one terminator."
    )]
    UnsealedBlock(Label),
}
