//! Construct compilation units (types, functions, basic blocks, typed
//! values, control flow) and hand them to the GCC JIT library for native
//! compilation, either in memory (callable function pointers) or to a file
//! artifact.
//!
//! The unit is built entirely in-crate inside a [`Context`]; the loaded
//! [`Backend`] is only touched by `compile`/`compile_to_file`, which
//! validate the graph and replay it through the foreign entry points.

pub mod backend;
pub mod bf;
mod context;
mod dump;
mod error;
mod function;
mod lower;
mod object;
mod types;
mod validate;
mod value;

pub use backend::{Backend, CompiledUnit, OutputKind};
pub use context::{BoolOption, Context, IntOption, StrOption};
pub use error::Error;
pub use function::{FunctionKind, GlobalKind, Terminator};
pub use object::{
    Block, ContextId, Field, Function, Location, Lvalue, Object, Param, Rvalue, Type,
};
pub use types::TypeKind;
pub use value::{BinaryOp, Comparison};
