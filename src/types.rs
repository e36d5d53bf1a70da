//! The type-system façade: primitive kinds, derived type nodes and the
//! structural queries that stand in for type equality.

use typed_generational_arena::{SmallSlab, SmallSlabIndex};

use crate::object::LocIndex;

pub(crate) type TypeIndex = SmallSlabIndex<TypeNode>;
pub(crate) type FieldIndex = SmallSlabIndex<FieldNode>;

/// The fixed enumeration of primitive type kinds, in the backend's own
/// order (the discriminants cross the foreign boundary unchanged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    VoidPtr,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    ConstCharPtr,
    SizeT,
    FilePtr,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
}

impl TypeKind {
    /// Every primitive kind, for exhaustive sweeps.
    pub const ALL: [TypeKind; 33] = [
        TypeKind::Void,
        TypeKind::VoidPtr,
        TypeKind::Bool,
        TypeKind::Char,
        TypeKind::SignedChar,
        TypeKind::UnsignedChar,
        TypeKind::Short,
        TypeKind::UnsignedShort,
        TypeKind::Int,
        TypeKind::UnsignedInt,
        TypeKind::Long,
        TypeKind::UnsignedLong,
        TypeKind::LongLong,
        TypeKind::UnsignedLongLong,
        TypeKind::Float,
        TypeKind::Double,
        TypeKind::LongDouble,
        TypeKind::ConstCharPtr,
        TypeKind::SizeT,
        TypeKind::FilePtr,
        TypeKind::ComplexFloat,
        TypeKind::ComplexDouble,
        TypeKind::ComplexLongDouble,
        TypeKind::UInt8,
        TypeKind::UInt16,
        TypeKind::UInt32,
        TypeKind::UInt64,
        TypeKind::UInt128,
        TypeKind::Int8,
        TypeKind::Int16,
        TypeKind::Int32,
        TypeKind::Int64,
        TypeKind::Int128,
    ];
}

/// A type's shape. Nodes are immutable once inserted; derived nodes only
/// ever point at nodes created before them.
#[derive(Debug, Clone)]
pub(crate) enum TypeNode {
    Primitive(TypeKind),
    Pointer(TypeIndex),
    Const(TypeIndex),
    Volatile(TypeIndex),
    Array { element: TypeIndex, count: u64 },
    Struct { name: String, fields: Vec<FieldIndex> },
    FnPtr {
        ret: TypeIndex,
        params: Vec<TypeIndex>,
        variadic: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct FieldNode {
    pub name: String,
    pub ty: TypeIndex,
    /// Set exactly once, by the struct type that adopts the field.
    pub owner: Option<TypeIndex>,
    pub loc: Option<LocIndex>,
}

pub(crate) type TypeArena = SmallSlab<TypeNode>;
pub(crate) type FieldArena = SmallSlab<FieldNode>;

/// Strips const/volatile wrappers.
pub(crate) fn unqualified(types: &TypeArena, mut idx: TypeIndex) -> TypeIndex {
    loop {
        match &types[idx] {
            TypeNode::Const(base) | TypeNode::Volatile(base) => idx = *base,
            _ => return idx,
        }
    }
}

pub(crate) fn is_pointer(types: &TypeArena, idx: TypeIndex) -> bool {
    match &types[unqualified(types, idx)] {
        TypeNode::Pointer(_) | TypeNode::FnPtr { .. } => true,
        TypeNode::Primitive(kind) => matches!(
            kind,
            TypeKind::VoidPtr | TypeKind::ConstCharPtr | TypeKind::FilePtr
        ),
        _ => false,
    }
}

pub(crate) fn is_integral(types: &TypeArena, idx: TypeIndex) -> bool {
    match &types[unqualified(types, idx)] {
        TypeNode::Primitive(kind) => matches!(
            kind,
            TypeKind::Char
                | TypeKind::SignedChar
                | TypeKind::UnsignedChar
                | TypeKind::Short
                | TypeKind::UnsignedShort
                | TypeKind::Int
                | TypeKind::UnsignedInt
                | TypeKind::Long
                | TypeKind::UnsignedLong
                | TypeKind::LongLong
                | TypeKind::UnsignedLongLong
                | TypeKind::SizeT
                | TypeKind::UInt8
                | TypeKind::UInt16
                | TypeKind::UInt32
                | TypeKind::UInt64
                | TypeKind::UInt128
                | TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Int128
        ),
        _ => false,
    }
}

pub(crate) fn is_bool(types: &TypeArena, idx: TypeIndex) -> bool {
    matches!(
        &types[unqualified(types, idx)],
        TypeNode::Primitive(TypeKind::Bool)
    )
}

pub(crate) fn is_struct(types: &TypeArena, idx: TypeIndex) -> bool {
    matches!(&types[unqualified(types, idx)], TypeNode::Struct { .. })
}

fn pointer_size() -> u64 {
    std::mem::size_of::<usize>() as u64
}

fn long_double_size() -> u64 {
    if cfg!(target_os = "windows") { 8 } else { 16 }
}

fn primitive_size(kind: TypeKind) -> u64 {
    use std::os::raw::{c_int, c_long, c_longlong, c_short};
    match kind {
        // sizeof(void) == 1 is the GNU extension the backend implements.
        TypeKind::Void => 1,
        TypeKind::Bool
        | TypeKind::Char
        | TypeKind::SignedChar
        | TypeKind::UnsignedChar
        | TypeKind::UInt8
        | TypeKind::Int8 => 1,
        TypeKind::Short | TypeKind::UnsignedShort => std::mem::size_of::<c_short>() as u64,
        TypeKind::Int | TypeKind::UnsignedInt => std::mem::size_of::<c_int>() as u64,
        TypeKind::Long | TypeKind::UnsignedLong => std::mem::size_of::<c_long>() as u64,
        TypeKind::LongLong | TypeKind::UnsignedLongLong => {
            std::mem::size_of::<c_longlong>() as u64
        }
        TypeKind::Float => 4,
        TypeKind::Double => 8,
        TypeKind::LongDouble => long_double_size(),
        TypeKind::VoidPtr | TypeKind::ConstCharPtr | TypeKind::FilePtr => pointer_size(),
        TypeKind::SizeT => pointer_size(),
        TypeKind::ComplexFloat => 8,
        TypeKind::ComplexDouble => 16,
        TypeKind::ComplexLongDouble => 2 * long_double_size(),
        TypeKind::UInt16 | TypeKind::Int16 => 2,
        TypeKind::UInt32 | TypeKind::Int32 => 4,
        TypeKind::UInt64 | TypeKind::Int64 => 8,
        TypeKind::UInt128 | TypeKind::Int128 => 16,
    }
}

fn primitive_align(kind: TypeKind) -> u64 {
    match kind {
        // complex values align like their component, not their total size
        TypeKind::ComplexFloat => 4,
        TypeKind::ComplexDouble => 8,
        TypeKind::ComplexLongDouble => long_double_size(),
        _ => primitive_size(kind).max(1),
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

pub(crate) fn align_of(types: &TypeArena, fields: &FieldArena, idx: TypeIndex) -> u64 {
    match &types[idx] {
        TypeNode::Primitive(kind) => primitive_align(*kind),
        TypeNode::Pointer(_) | TypeNode::FnPtr { .. } => pointer_size(),
        TypeNode::Const(base) | TypeNode::Volatile(base) => align_of(types, fields, *base),
        TypeNode::Array { element, .. } => align_of(types, fields, *element),
        TypeNode::Struct { fields: members, .. } => members
            .iter()
            .map(|f| align_of(types, fields, fields[*f].ty))
            .max()
            .unwrap_or(1),
    }
}

/// Size in bytes under the host C ABI, with natural alignment and tail
/// padding for aggregates.
pub(crate) fn size_of(types: &TypeArena, fields: &FieldArena, idx: TypeIndex) -> u64 {
    match &types[idx] {
        TypeNode::Primitive(kind) => primitive_size(*kind),
        TypeNode::Pointer(_) | TypeNode::FnPtr { .. } => pointer_size(),
        TypeNode::Const(base) | TypeNode::Volatile(base) => size_of(types, fields, *base),
        TypeNode::Array { element, count } => size_of(types, fields, *element) * count,
        TypeNode::Struct { fields: members, .. } => {
            let mut offset = 0u64;
            let mut align = 1u64;
            for f in members {
                let ty = fields[*f].ty;
                let falign = align_of(types, fields, ty);
                offset = round_up(offset, falign) + size_of(types, fields, ty);
                align = align.max(falign);
            }
            round_up(offset, align)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_up(0, 8), 0);
        assert_eq!(round_up(1, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(9, 4), 12);
    }

    #[test]
    fn complex_kinds_align_like_their_component() {
        assert_eq!(primitive_align(TypeKind::ComplexFloat), 4);
        assert_eq!(primitive_size(TypeKind::ComplexFloat), 8);
    }
}
