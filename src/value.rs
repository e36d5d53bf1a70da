//! Expression nodes. Values are immutable once created and may be
//! referenced by any number of statements in the owning context.

use typed_generational_arena::SmallSlab;
use typed_generational_arena::SmallSlabIndex;

use crate::function::{FnIndex, ParamIndex};
use crate::object::LocIndex;
use crate::types::{FieldIndex, TypeIndex};

pub(crate) type ValueIndex = SmallSlabIndex<ValueNode>;
pub(crate) type ValueArena = SmallSlab<ValueNode>;

/// Comparison operators, in the backend's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Binary operators, in the backend's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    Lshift,
    Rshift,
}

#[derive(Debug, Clone)]
pub(crate) struct ValueNode {
    pub ty: TypeIndex,
    pub kind: ValueKind,
    pub loc: Option<LocIndex>,
}

#[derive(Debug, Clone)]
pub(crate) enum ValueKind {
    FromInt(i32),
    FromLong(i64),
    FromPtr(usize),
    StringLiteral(String),
    Zero,
    One,
    Cast(ValueIndex),
    Bitcast(ValueIndex),
    Comparison {
        op: Comparison,
        lhs: ValueIndex,
        rhs: ValueIndex,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueIndex,
        rhs: ValueIndex,
    },
    Call {
        func: FnIndex,
        args: Vec<ValueIndex>,
    },
    CallThroughPtr {
        fn_ptr: ValueIndex,
        args: Vec<ValueIndex>,
    },
    AddressOf(ValueIndex),
    // addressable storage; only these back an Lvalue handle
    Param(ParamIndex),
    Local {
        func: FnIndex,
        name: String,
    },
    Global {
        kind: crate::function::GlobalKind,
        name: String,
    },
    Deref(ValueIndex),
    ArrayAccess {
        ptr: ValueIndex,
        index: ValueIndex,
    },
    AccessField {
        base: ValueIndex,
        field: FieldIndex,
    },
    DerefField {
        ptr: ValueIndex,
        field: FieldIndex,
    },
}

impl ValueKind {
    pub(crate) fn is_addressable(&self) -> bool {
        matches!(
            self,
            ValueKind::Param(_)
                | ValueKind::Local { .. }
                | ValueKind::Global { .. }
                | ValueKind::Deref(_)
                | ValueKind::ArrayAccess { .. }
                | ValueKind::AccessField { .. }
                | ValueKind::DerefField { .. }
        )
    }
}
