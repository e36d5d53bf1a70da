//! Functions, parameters, globals and the basic-block state machine.
//!
//! A block is open until its terminator is set; after that every attempt to
//! append is rejected. Blocks form an arbitrary directed graph (loops are
//! first class) but validation requires every reachable block to be
//! terminated before the unit is handed to the backend.

use typed_generational_arena::{SmallSlab, SmallSlabIndex};

use crate::object::{Block, LocIndex, Rvalue};
use crate::types::TypeIndex;
use crate::value::{BinaryOp, ValueIndex};

pub(crate) type FnIndex = SmallSlabIndex<FnNode>;
pub(crate) type ParamIndex = SmallSlabIndex<ParamNode>;
pub(crate) type BlockIndex = SmallSlabIndex<BlockNode>;

pub(crate) type FnArena = SmallSlab<FnNode>;
pub(crate) type ParamArena = SmallSlab<ParamNode>;
pub(crate) type BlockArena = SmallSlab<BlockNode>;

/// Linkage of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Defined here, visible to the produced artifact's importers.
    Exported,
    /// Defined here, internal linkage.
    Internal,
    /// Declared here, resolved by the linker or loader.
    Imported,
    AlwaysInline,
}

/// Linkage of a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Exported,
    Internal,
    Imported,
}

#[derive(Debug, Clone)]
pub(crate) struct ParamNode {
    pub name: String,
    pub ty: TypeIndex,
    /// Set exactly once, by the function whose signature adopts the param.
    pub owner: Option<FnIndex>,
    pub loc: Option<LocIndex>,
}

#[derive(Debug, Clone)]
pub(crate) struct FnNode {
    pub name: String,
    pub kind: FunctionKind,
    pub ret: TypeIndex,
    pub params: Vec<ParamIndex>,
    pub variadic: bool,
    /// Creation order; the first block is the entry block.
    pub blocks: Vec<BlockIndex>,
    pub locals: Vec<ValueIndex>,
    pub loc: Option<LocIndex>,
}

#[derive(Debug, Clone)]
pub(crate) struct BlockNode {
    pub name: String,
    pub func: FnIndex,
    pub statements: Vec<Statement>,
    pub terminator: Option<TerminatorNode>,
}

#[derive(Debug, Clone)]
pub(crate) struct Statement {
    pub loc: Option<LocIndex>,
    pub kind: StatementKind,
}

#[derive(Debug, Clone)]
pub(crate) enum StatementKind {
    Comment(String),
    Eval(ValueIndex),
    Assign {
        target: ValueIndex,
        value: ValueIndex,
    },
    AssignOp {
        target: ValueIndex,
        op: BinaryOp,
        value: ValueIndex,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct TerminatorNode {
    pub loc: Option<LocIndex>,
    pub kind: TerminatorKind,
}

#[derive(Debug, Clone)]
pub(crate) enum TerminatorKind {
    Jump {
        target: BlockIndex,
    },
    Conditional {
        cond: ValueIndex,
        on_true: BlockIndex,
        on_false: BlockIndex,
    },
    Return {
        value: ValueIndex,
    },
    VoidReturn,
}

/// How a block ends, as reported by
/// [`Context::terminator_of`](crate::Context::terminator_of).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Jump {
        target: Block,
    },
    Conditional {
        condition: Rvalue,
        on_true: Block,
        on_false: Block,
    },
    Return {
        value: Rvalue,
    },
    VoidReturn,
}
