use thiserror::Error;

use crate::object::ContextId;

/// Errors reported by the IR construction model and the backend boundary.
///
/// Structural problems are rejected as early as they are detectable;
/// everything the backend alone can judge (operand type compatibility,
/// implicit conversions) surfaces as [`Error::Compile`] after the fact,
/// with the backend's own diagnostic text untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("context has already been released")]
    ContextReleased,

    #[error("context has already been compiled and can no longer be mutated")]
    AlreadyCompiled,

    #[error("object belongs to {found}, not to {expected}")]
    ForeignObject { expected: ContextId, found: ContextId },

    #[error("{what} contains an interior NUL byte")]
    Nul { what: &'static str },

    #[error("invalid value {value} for {option}")]
    InvalidOptionValue { option: &'static str, value: i64 },

    #[error("array length {count} does not fit the backend's length type")]
    InvalidArrayLength { count: u64 },

    #[error("field {field:?} already belongs to struct {owner:?}")]
    FieldReused { field: String, owner: String },

    #[error("field {field:?} is not a member of the accessed struct")]
    FieldNotInStruct { field: String },

    #[error("parameter {param:?} already belongs to function {owner:?}")]
    ParamReused { param: String, owner: String },

    #[error("function {name:?} was already created in this context")]
    DuplicateFunction { name: String },

    #[error("imported function {function:?} cannot have a body")]
    ImportedFunctionBody { function: String },

    #[error("function {function:?} has no basic blocks")]
    EmptyFunction { function: String },

    #[error("block {block:?} already has a terminator")]
    BlockTerminated { block: String },

    #[error("block {target:?} belongs to a different function than {block:?}")]
    TargetOutsideFunction { block: String, target: String },

    #[error("reachable block {block:?} in function {function:?} has no terminator")]
    UnterminatedBlock { function: String, block: String },

    #[error("unreachable blocks in function {function:?}: {blocks}")]
    UnreachableBlocks { function: String, blocks: String },

    #[error("call to {callee:?} expects {expected} arguments, got {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("value is not addressable")]
    NotAddressable,

    #[error("value does not have a function pointer type")]
    NotAFunctionPointer,

    #[error("value does not have a dereferenceable pointer type")]
    NotAPointer,

    #[error("value is neither a pointer nor an array")]
    NotIndexable,

    #[error("failed to load the native backend: {0}")]
    BackendUnavailable(#[from] libloading::Error),

    #[error("the backend could not acquire a compilation session")]
    AcquireFailed,

    #[error("compilation failed: {message}")]
    Compile { message: String },

    #[error("no code named {name:?} in the compiled unit")]
    SymbolNotFound { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
