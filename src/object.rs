//! The handle layer.
//!
//! Every IR entity is owned by exactly one [`Context`](crate::Context) and
//! is referred to through a small `Copy` handle carrying the owning
//! context's identity plus a typed arena index. Handles never own anything;
//! using one against the wrong context, or after its context was released,
//! fails a checked guard instead of touching freed state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use typed_generational_arena::SmallSlabIndex;

use crate::function::{BlockIndex, FnIndex, ParamIndex};
use crate::types::{FieldIndex, TypeIndex};
use crate::value::ValueIndex;

/// Process-unique identity of a [`Context`](crate::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context #{}", self.0)
    }
}

/// A type handle.
///
/// Not comparable: requesting the "same" type twice may or may not hand
/// back an identical handle, so the structural queries on
/// [`Context`](crate::Context) (`is_pointer`, `is_integral`, `is_bool`,
/// `is_struct`, `size_of`) are the only meaningful equality surface.
#[derive(Debug, Clone, Copy)]
pub struct Type {
    pub(crate) ctx: ContextId,
    pub(crate) idx: TypeIndex,
}

/// A named, typed struct member. Belongs to at most one struct type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub(crate) ctx: ContextId,
    pub(crate) idx: FieldIndex,
}

/// A function declared in a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    pub(crate) ctx: ContextId,
    pub(crate) idx: FnIndex,
}

/// A basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub(crate) ctx: ContextId,
    pub(crate) idx: BlockIndex,
}

/// A readable, typed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rvalue {
    pub(crate) ctx: ContextId,
    pub(crate) idx: ValueIndex,
}

/// An addressable, typed storage location. Always readable; never writable
/// through the [`Rvalue`] view it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lvalue {
    pub(crate) ctx: ContextId,
    pub(crate) idx: ValueIndex,
}

impl Lvalue {
    /// The read-only view of this storage location. Total: every lvalue can
    /// be read. The reverse direction, `Context::as_lvalue`, is fallible.
    pub fn as_rvalue(self) -> Rvalue {
        Rvalue {
            ctx: self.ctx,
            idx: self.idx,
        }
    }
}

/// A function parameter. Addressable like a local, readable like any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub(crate) ctx: ContextId,
    pub(crate) idx: ParamIndex,
    pub(crate) value: ValueIndex,
}

impl Param {
    pub fn as_lvalue(self) -> Lvalue {
        Lvalue {
            ctx: self.ctx,
            idx: self.value,
        }
    }

    pub fn as_rvalue(self) -> Rvalue {
        Rvalue {
            ctx: self.ctx,
            idx: self.value,
        }
    }
}

/// An optional source-position tag for diagnostics. Never affects semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub(crate) ctx: ContextId,
    pub(crate) idx: LocIndex,
}

pub(crate) type LocIndex = SmallSlabIndex<LocNode>;

#[derive(Debug, Clone)]
pub(crate) struct LocNode {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

/// Any IR entity, for the universal queries shared by all of them
/// ([`Context::debug_string`](crate::Context::debug_string) and
/// [`Object::context_id`]).
#[derive(Debug, Clone, Copy)]
pub enum Object {
    Type(Type),
    Field(Field),
    Function(Function),
    Param(Param),
    Block(Block),
    Rvalue(Rvalue),
    Lvalue(Lvalue),
    Location(Location),
}

impl Object {
    /// Identity of the context that owns this entity.
    pub fn context_id(self) -> ContextId {
        match self {
            Object::Type(o) => o.ctx,
            Object::Field(o) => o.ctx,
            Object::Function(o) => o.ctx,
            Object::Param(o) => o.ctx,
            Object::Block(o) => o.ctx,
            Object::Rvalue(o) => o.ctx,
            Object::Lvalue(o) => o.ctx,
            Object::Location(o) => o.ctx,
        }
    }
}

impl Type {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Field {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Function {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Param {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Block {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Rvalue {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Lvalue {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl Location {
    pub fn context_id(self) -> ContextId {
        self.ctx
    }
}

impl From<Type> for Object {
    fn from(o: Type) -> Self {
        Object::Type(o)
    }
}

impl From<Field> for Object {
    fn from(o: Field) -> Self {
        Object::Field(o)
    }
}

impl From<Function> for Object {
    fn from(o: Function) -> Self {
        Object::Function(o)
    }
}

impl From<Param> for Object {
    fn from(o: Param) -> Self {
        Object::Param(o)
    }
}

impl From<Block> for Object {
    fn from(o: Block) -> Self {
        Object::Block(o)
    }
}

impl From<Rvalue> for Object {
    fn from(o: Rvalue) -> Self {
        Object::Rvalue(o)
    }
}

impl From<Lvalue> for Object {
    fn from(o: Lvalue) -> Self {
        Object::Lvalue(o)
    }
}

impl From<Location> for Object {
    fn from(o: Location) -> Self {
        Object::Location(o)
    }
}
