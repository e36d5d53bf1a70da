//! The compilation session: owns every IR entity, accumulates diagnostics,
//! and hands the finished unit to the backend.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use typed_generational_arena::SmallSlab;

use crate::backend::{Backend, CompiledUnit, OutputKind};
use crate::error::Error;
use crate::function::{
    BlockArena, BlockIndex, BlockNode, FnArena, FnIndex, FnNode, FunctionKind, GlobalKind,
    ParamArena, ParamNode, Statement, StatementKind, Terminator, TerminatorKind, TerminatorNode,
};
use crate::lower;
use crate::object::{
    Block, ContextId, Field, Function, LocIndex, LocNode, Location, Lvalue, Param, Rvalue, Type,
};
use crate::types::{
    self, FieldArena, FieldNode, TypeArena, TypeIndex, TypeKind, TypeNode,
};
use crate::value::{BinaryOp, Comparison, ValueArena, ValueIndex, ValueKind, ValueNode};

/// Boolean compilation switches, in the backend's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOption {
    /// Emit debug info for the generated code.
    Debuginfo,
    DumpInitialTree,
    DumpInitialGimple,
    DumpGeneratedCode,
    DumpSummary,
    DumpEverything,
    SelfcheckGc,
    KeepIntermediates,
}

const NUM_BOOL_OPTIONS: usize = 8;

/// Integer compilation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntOption {
    /// 0 through 3, like the C compiler's -O levels.
    OptimizationLevel,
}

/// String compilation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOption {
    /// Program name used in backend diagnostics.
    Progname,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Options {
    pub opt_level: u8,
    pub bools: [bool; NUM_BOOL_OPTIONS],
    pub progname: Option<String>,
    pub allow_unreachable_blocks: Option<bool>,
    pub print_errors_to_stderr: Option<bool>,
    pub use_external_driver: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Building,
    Compiled,
    Released,
}

/// One isolated compilation session.
///
/// All entities created through a context live exactly as long as the
/// context does. `release` tears everything down; compilation is a one-shot
/// transition after which the context still answers queries but rejects
/// mutation. A context is single-threaded; independent contexts are fully
/// isolated from each other.
#[derive(Debug)]
pub struct Context {
    id: ContextId,
    state: State,
    pub(crate) types: TypeArena,
    primitives: HashMap<TypeKind, TypeIndex>,
    pub(crate) fields: FieldArena,
    pub(crate) functions: FnArena,
    pub(crate) fn_order: Vec<FnIndex>,
    fn_names: HashMap<String, FnIndex>,
    pub(crate) params: ParamArena,
    pub(crate) blocks: BlockArena,
    pub(crate) values: ValueArena,
    pub(crate) globals: Vec<ValueIndex>,
    pub(crate) locations: SmallSlab<LocNode>,
    pub(crate) options: Options,
    diagnostics: Vec<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: ContextId::fresh(),
            state: State::Building,
            types: SmallSlab::new(),
            primitives: HashMap::new(),
            fields: SmallSlab::new(),
            functions: SmallSlab::new(),
            fn_order: Vec::new(),
            fn_names: HashMap::new(),
            params: SmallSlab::new(),
            blocks: SmallSlab::new(),
            values: SmallSlab::new(),
            globals: Vec::new(),
            locations: SmallSlab::new(),
            options: Options::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Destroys every entity owned by this context. Exactly once: a second
    /// call, like any other operation afterwards, fails with
    /// [`Error::ContextReleased`].
    pub fn release(&mut self) -> Result<(), Error> {
        self.ensure_live()?;
        self.state = State::Released;
        self.types = SmallSlab::new();
        self.primitives = HashMap::new();
        self.fields = SmallSlab::new();
        self.functions = SmallSlab::new();
        self.fn_order = Vec::new();
        self.fn_names = HashMap::new();
        self.params = SmallSlab::new();
        self.blocks = SmallSlab::new();
        self.values = SmallSlab::new();
        self.globals = Vec::new();
        self.locations = SmallSlab::new();
        Ok(())
    }

    // ---- guards ----------------------------------------------------------

    pub(crate) fn ensure_live(&self) -> Result<(), Error> {
        if self.state == State::Released {
            return Err(Error::ContextReleased);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        self.ensure_live()?;
        if self.state == State::Compiled {
            return Err(Error::AlreadyCompiled);
        }
        Ok(())
    }

    pub(crate) fn guard(&self, owner: ContextId) -> Result<(), Error> {
        if owner != self.id {
            return Err(Error::ForeignObject {
                expected: self.id,
                found: owner,
            });
        }
        Ok(())
    }

    /// Records a structural rejection so it is also visible through
    /// `first_error`/`last_error`, then fails with it.
    pub(crate) fn reject<T>(&mut self, err: Error) -> Result<T, Error> {
        self.diagnostics.push(err.to_string());
        Err(err)
    }

    fn check_nul(&mut self, what: &'static str, text: &str) -> Result<(), Error> {
        if text.contains('\0') {
            return self.reject(Error::Nul { what });
        }
        Ok(())
    }

    // ---- handle resolution -----------------------------------------------

    fn ty_idx(&self, ty: Type) -> Result<TypeIndex, Error> {
        self.guard(ty.ctx)?;
        Ok(ty.idx)
    }

    fn rv_idx(&self, value: Rvalue) -> Result<ValueIndex, Error> {
        self.guard(value.ctx)?;
        Ok(value.idx)
    }

    fn lv_idx(&self, value: Lvalue) -> Result<ValueIndex, Error> {
        self.guard(value.ctx)?;
        Ok(value.idx)
    }

    fn fn_idx(&self, function: Function) -> Result<FnIndex, Error> {
        self.guard(function.ctx)?;
        Ok(function.idx)
    }

    fn field_idx(&self, field: Field) -> Result<crate::types::FieldIndex, Error> {
        self.guard(field.ctx)?;
        Ok(field.idx)
    }

    fn block_idx(&self, block: Block) -> Result<BlockIndex, Error> {
        self.guard(block.ctx)?;
        Ok(block.idx)
    }

    fn loc_idx(&self, loc: Option<Location>) -> Result<Option<LocIndex>, Error> {
        match loc {
            None => Ok(None),
            Some(loc) => {
                self.guard(loc.ctx)?;
                Ok(Some(loc.idx))
            }
        }
    }

    fn make_type(&mut self, node: TypeNode) -> Type {
        Type {
            ctx: self.id,
            idx: self.types.insert(node),
        }
    }

    fn make_rvalue(&mut self, node: ValueNode) -> Rvalue {
        Rvalue {
            ctx: self.id,
            idx: self.values.insert(node),
        }
    }

    fn make_lvalue(&mut self, node: ValueNode) -> Lvalue {
        debug_assert!(node.kind.is_addressable());
        Lvalue {
            ctx: self.id,
            idx: self.values.insert(node),
        }
    }

    fn primitive(&mut self, kind: TypeKind) -> TypeIndex {
        if let Some(&idx) = self.primitives.get(&kind) {
            return idx;
        }
        let idx = self.types.insert(TypeNode::Primitive(kind));
        self.primitives.insert(kind, idx);
        idx
    }

    // ---- options ---------------------------------------------------------

    pub fn set_bool_option(&mut self, option: BoolOption, value: bool) -> Result<(), Error> {
        self.ensure_open()?;
        self.options.bools[option as usize] = value;
        Ok(())
    }

    pub fn set_int_option(&mut self, option: IntOption, value: i64) -> Result<(), Error> {
        self.ensure_open()?;
        match option {
            IntOption::OptimizationLevel => {
                if !(0..=3).contains(&value) {
                    return self.reject(Error::InvalidOptionValue {
                        option: "optimization level",
                        value,
                    });
                }
                self.options.opt_level = value as u8;
            }
        }
        Ok(())
    }

    pub fn set_str_option(&mut self, option: StrOption, value: &str) -> Result<(), Error> {
        self.ensure_open()?;
        self.check_nul("option value", value)?;
        match option {
            StrOption::Progname => self.options.progname = Some(value.to_owned()),
        }
        Ok(())
    }

    /// Lets compilation tolerate blocks no path reaches.
    pub fn set_allow_unreachable_blocks(&mut self, value: bool) -> Result<(), Error> {
        self.ensure_open()?;
        self.options.allow_unreachable_blocks = Some(value);
        Ok(())
    }

    pub fn set_print_errors_to_stderr(&mut self, value: bool) -> Result<(), Error> {
        self.ensure_open()?;
        self.options.print_errors_to_stderr = Some(value);
        Ok(())
    }

    /// Routes artifact emission through the external driver binary instead
    /// of the backend's embedded one.
    pub fn set_use_external_driver(&mut self, value: bool) -> Result<(), Error> {
        self.ensure_open()?;
        self.options.use_external_driver = Some(value);
        Ok(())
    }

    // ---- diagnostics -----------------------------------------------------

    /// The oldest diagnostic accumulated since the session began; empty when
    /// none. Backend diagnostics are surfaced verbatim.
    pub fn first_error(&self) -> &str {
        self.diagnostics.first().map(String::as_str).unwrap_or("")
    }

    /// The most recent diagnostic; empty when none.
    pub fn last_error(&self) -> &str {
        self.diagnostics.last().map(String::as_str).unwrap_or("")
    }

    // ---- types -----------------------------------------------------------

    pub fn get_type(&mut self, kind: TypeKind) -> Result<Type, Error> {
        self.ensure_open()?;
        let idx = self.primitive(kind);
        Ok(Type { ctx: self.id, idx })
    }

    pub fn pointer_to(&mut self, ty: Type) -> Result<Type, Error> {
        self.ensure_open()?;
        let base = self.ty_idx(ty)?;
        Ok(self.make_type(TypeNode::Pointer(base)))
    }

    pub fn const_of(&mut self, ty: Type) -> Result<Type, Error> {
        self.ensure_open()?;
        let base = self.ty_idx(ty)?;
        Ok(self.make_type(TypeNode::Const(base)))
    }

    pub fn volatile_of(&mut self, ty: Type) -> Result<Type, Error> {
        self.ensure_open()?;
        let base = self.ty_idx(ty)?;
        Ok(self.make_type(TypeNode::Volatile(base)))
    }

    pub fn array_type(
        &mut self,
        loc: Option<Location>,
        element: Type,
        count: u64,
    ) -> Result<Type, Error> {
        self.ensure_open()?;
        self.loc_idx(loc)?;
        let element = self.ty_idx(element)?;
        if count > i32::MAX as u64 {
            return self.reject(Error::InvalidArrayLength { count });
        }
        Ok(self.make_type(TypeNode::Array { element, count }))
    }

    pub fn new_field(
        &mut self,
        loc: Option<Location>,
        ty: Type,
        name: &str,
    ) -> Result<Field, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ty = self.ty_idx(ty)?;
        self.check_nul("field name", name)?;
        let idx = self.fields.insert(FieldNode {
            name: name.to_owned(),
            ty,
            owner: None,
            loc,
        });
        Ok(Field { ctx: self.id, idx })
    }

    /// Builds a named aggregate from previously created fields. A field can
    /// be adopted by at most one struct type.
    pub fn struct_type(
        &mut self,
        loc: Option<Location>,
        name: &str,
        fields: &[Field],
    ) -> Result<Type, Error> {
        self.ensure_open()?;
        self.loc_idx(loc)?;
        self.check_nul("struct name", name)?;
        let mut members = Vec::with_capacity(fields.len());
        for field in fields {
            members.push(self.field_idx(*field)?);
        }
        for &fi in &members {
            if let Some(owner) = self.fields[fi].owner {
                let field = self.fields[fi].name.clone();
                let owner = match &self.types[owner] {
                    TypeNode::Struct { name, .. } => name.clone(),
                    _ => unreachable!("field owner is always a struct type"),
                };
                return self.reject(Error::FieldReused { field, owner });
            }
        }
        let ty = self.make_type(TypeNode::Struct {
            name: name.to_owned(),
            fields: members.clone(),
        });
        for fi in members {
            self.fields[fi].owner = Some(ty.idx);
        }
        Ok(ty)
    }

    pub fn function_ptr_type(
        &mut self,
        loc: Option<Location>,
        ret: Type,
        params: &[Type],
        variadic: bool,
    ) -> Result<Type, Error> {
        self.ensure_open()?;
        self.loc_idx(loc)?;
        let ret = self.ty_idx(ret)?;
        let mut param_indices = Vec::with_capacity(params.len());
        for ty in params {
            param_indices.push(self.ty_idx(*ty)?);
        }
        Ok(self.make_type(TypeNode::FnPtr {
            ret,
            params: param_indices,
            variadic,
        }))
    }

    // ---- structural type queries -----------------------------------------

    pub fn is_pointer(&self, ty: Type) -> Result<bool, Error> {
        self.ensure_live()?;
        let idx = self.ty_idx(ty)?;
        Ok(types::is_pointer(&self.types, idx))
    }

    pub fn is_integral(&self, ty: Type) -> Result<bool, Error> {
        self.ensure_live()?;
        let idx = self.ty_idx(ty)?;
        Ok(types::is_integral(&self.types, idx))
    }

    pub fn is_bool(&self, ty: Type) -> Result<bool, Error> {
        self.ensure_live()?;
        let idx = self.ty_idx(ty)?;
        Ok(types::is_bool(&self.types, idx))
    }

    pub fn is_struct(&self, ty: Type) -> Result<bool, Error> {
        self.ensure_live()?;
        let idx = self.ty_idx(ty)?;
        Ok(types::is_struct(&self.types, idx))
    }

    /// Size in bytes under the host C ABI.
    pub fn size_of(&self, ty: Type) -> Result<u64, Error> {
        self.ensure_live()?;
        let idx = self.ty_idx(ty)?;
        Ok(types::size_of(&self.types, &self.fields, idx))
    }

    /// The type with const/volatile stripped.
    pub fn unqualified(&self, ty: Type) -> Result<Type, Error> {
        self.ensure_live()?;
        let idx = self.ty_idx(ty)?;
        Ok(Type {
            ctx: self.id,
            idx: types::unqualified(&self.types, idx),
        })
    }

    // ---- locations -------------------------------------------------------

    pub fn new_location(
        &mut self,
        filename: &str,
        line: u32,
        column: u32,
    ) -> Result<Location, Error> {
        self.ensure_open()?;
        self.check_nul("location filename", filename)?;
        let idx = self.locations.insert(LocNode {
            filename: filename.to_owned(),
            line,
            column,
        });
        Ok(Location { ctx: self.id, idx })
    }

    // ---- literals and expressions ----------------------------------------

    pub fn new_rvalue_from_int(&mut self, ty: Type, value: i32) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::FromInt(value),
            loc: None,
        }))
    }

    pub fn new_rvalue_from_long(&mut self, ty: Type, value: i64) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::FromLong(value),
            loc: None,
        }))
    }

    pub fn new_rvalue_from_ptr(&mut self, ty: Type, value: usize) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::FromPtr(value),
            loc: None,
        }))
    }

    pub fn new_string_literal(&mut self, value: &str) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        self.check_nul("string literal", value)?;
        let ty = self.primitive(TypeKind::ConstCharPtr);
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::StringLiteral(value.to_owned()),
            loc: None,
        }))
    }

    pub fn zero(&mut self, ty: Type) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::Zero,
            loc: None,
        }))
    }

    pub fn one(&mut self, ty: Type) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::One,
            loc: None,
        }))
    }

    /// Re-types a value, converting numerically where the backend's rules
    /// allow it.
    pub fn new_cast(
        &mut self,
        loc: Option<Location>,
        value: Rvalue,
        ty: Type,
    ) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let value = self.rv_idx(value)?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::Cast(value),
            loc,
        }))
    }

    /// Re-types a value without any conversion of the underlying bits.
    pub fn new_bitcast(
        &mut self,
        loc: Option<Location>,
        value: Rvalue,
        ty: Type,
    ) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let value = self.rv_idx(value)?;
        let ty = self.ty_idx(ty)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::Bitcast(value),
            loc,
        }))
    }

    /// Operand compatibility is the backend's judgement, deferred to
    /// compile time; the result is bool-typed.
    pub fn new_comparison(
        &mut self,
        loc: Option<Location>,
        op: Comparison,
        lhs: Rvalue,
        rhs: Rvalue,
    ) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let lhs = self.rv_idx(lhs)?;
        let rhs = self.rv_idx(rhs)?;
        let ty = self.primitive(TypeKind::Bool);
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::Comparison { op, lhs, rhs },
            loc,
        }))
    }

    pub fn new_binary_op(
        &mut self,
        loc: Option<Location>,
        op: BinaryOp,
        ty: Type,
        lhs: Rvalue,
        rhs: Rvalue,
    ) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ty = self.ty_idx(ty)?;
        let lhs = self.rv_idx(lhs)?;
        let rhs = self.rv_idx(rhs)?;
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::Binary { op, lhs, rhs },
            loc,
        }))
    }

    /// Direct call. The argument count must match the callee's declared
    /// parameters; a variadic callee accepts any suffix beyond them.
    pub fn new_call(
        &mut self,
        loc: Option<Location>,
        function: Function,
        args: &[Rvalue],
    ) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let func = self.fn_idx(function)?;
        let (name, expected, variadic, ret) = {
            let node = &self.functions[func];
            (node.name.clone(), node.params.len(), node.variadic, node.ret)
        };
        if args.len() != expected && !(variadic && args.len() > expected) {
            return self.reject(Error::ArityMismatch {
                callee: name,
                expected,
                found: args.len(),
            });
        }
        let mut arg_indices = Vec::with_capacity(args.len());
        for arg in args {
            arg_indices.push(self.rv_idx(*arg)?);
        }
        Ok(self.make_rvalue(ValueNode {
            ty: ret,
            kind: ValueKind::Call {
                func,
                args: arg_indices,
            },
            loc,
        }))
    }

    /// Indirect call through a function-pointer-typed value.
    pub fn new_call_through_ptr(
        &mut self,
        loc: Option<Location>,
        fn_ptr: Rvalue,
        args: &[Rvalue],
    ) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let fn_ptr = self.rv_idx(fn_ptr)?;
        let unq = types::unqualified(&self.types, self.values[fn_ptr].ty);
        let (ret, expected, variadic) = match &self.types[unq] {
            TypeNode::FnPtr {
                ret,
                params,
                variadic,
            } => (*ret, params.len(), *variadic),
            _ => return self.reject(Error::NotAFunctionPointer),
        };
        if args.len() != expected && !(variadic && args.len() > expected) {
            return self.reject(Error::ArityMismatch {
                callee: "<function pointer>".to_owned(),
                expected,
                found: args.len(),
            });
        }
        let mut arg_indices = Vec::with_capacity(args.len());
        for arg in args {
            arg_indices.push(self.rv_idx(*arg)?);
        }
        Ok(self.make_rvalue(ValueNode {
            ty: ret,
            kind: ValueKind::CallThroughPtr {
                fn_ptr,
                args: arg_indices,
            },
            loc,
        }))
    }

    /// Pointer to the given storage, as a readable value.
    pub fn address_of(&mut self, loc: Option<Location>, target: Lvalue) -> Result<Rvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let target = self.lv_idx(target)?;
        let pointee = self.values[target].ty;
        let ty = self.types.insert(TypeNode::Pointer(pointee));
        Ok(self.make_rvalue(ValueNode {
            ty,
            kind: ValueKind::AddressOf(target),
            loc,
        }))
    }

    /// The storage a pointer-typed value points at.
    pub fn dereference(&mut self, loc: Option<Location>, value: Rvalue) -> Result<Lvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let value = self.rv_idx(value)?;
        let unq = types::unqualified(&self.types, self.values[value].ty);
        let pointee = match &self.types[unq] {
            TypeNode::Pointer(base) => Some(*base),
            TypeNode::Primitive(TypeKind::ConstCharPtr) => None,
            _ => return self.reject(Error::NotAPointer),
        };
        let pointee = match pointee {
            Some(idx) => idx,
            None => {
                let ch = self.primitive(TypeKind::Char);
                self.types.insert(TypeNode::Const(ch))
            }
        };
        Ok(self.make_lvalue(ValueNode {
            ty: pointee,
            kind: ValueKind::Deref(value),
            loc,
        }))
    }

    /// One element of an array or pointed-at buffer.
    pub fn new_array_access(
        &mut self,
        loc: Option<Location>,
        ptr: Rvalue,
        index: Rvalue,
    ) -> Result<Lvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ptr = self.rv_idx(ptr)?;
        let index = self.rv_idx(index)?;
        let unq = types::unqualified(&self.types, self.values[ptr].ty);
        let element = match &self.types[unq] {
            TypeNode::Pointer(base) => Some(*base),
            TypeNode::Array { element, .. } => Some(*element),
            TypeNode::Primitive(TypeKind::ConstCharPtr) => None,
            _ => return self.reject(Error::NotIndexable),
        };
        let element = match element {
            Some(idx) => idx,
            None => {
                let ch = self.primitive(TypeKind::Char);
                self.types.insert(TypeNode::Const(ch))
            }
        };
        Ok(self.make_lvalue(ValueNode {
            ty: element,
            kind: ValueKind::ArrayAccess { ptr, index },
            loc,
        }))
    }

    /// Member of a struct-typed storage location.
    pub fn access_field(
        &mut self,
        loc: Option<Location>,
        target: Lvalue,
        field: Field,
    ) -> Result<Lvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let target = self.lv_idx(target)?;
        let field = self.field_idx(field)?;
        let unq = types::unqualified(&self.types, self.values[target].ty);
        self.check_member(unq, field)?;
        let ty = self.fields[field].ty;
        Ok(self.make_lvalue(ValueNode {
            ty,
            kind: ValueKind::AccessField {
                base: target,
                field,
            },
            loc,
        }))
    }

    /// Member of the struct a pointer-typed value points at.
    pub fn dereference_field(
        &mut self,
        loc: Option<Location>,
        ptr: Rvalue,
        field: Field,
    ) -> Result<Lvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ptr = self.rv_idx(ptr)?;
        let field = self.field_idx(field)?;
        let unq = types::unqualified(&self.types, self.values[ptr].ty);
        let pointee = match &self.types[unq] {
            TypeNode::Pointer(base) => *base,
            _ => return self.reject(Error::NotAPointer),
        };
        let pointee = types::unqualified(&self.types, pointee);
        self.check_member(pointee, field)?;
        let ty = self.fields[field].ty;
        Ok(self.make_lvalue(ValueNode {
            ty,
            kind: ValueKind::DerefField { ptr, field },
            loc,
        }))
    }

    fn check_member(
        &mut self,
        struct_ty: TypeIndex,
        field: crate::types::FieldIndex,
    ) -> Result<(), Error> {
        let is_member = match &self.types[struct_ty] {
            TypeNode::Struct { fields, .. } => fields.contains(&field),
            _ => false,
        };
        if !is_member {
            let field = self.fields[field].name.clone();
            return self.reject(Error::FieldNotInStruct { field });
        }
        Ok(())
    }

    /// Recovers the addressable view of a value that denotes storage.
    /// Fallible: a literal or operator result has no address.
    pub fn as_lvalue(&self, value: Rvalue) -> Result<Lvalue, Error> {
        self.ensure_live()?;
        let idx = self.rv_idx(value)?;
        if !self.values[idx].kind.is_addressable() {
            return Err(Error::NotAddressable);
        }
        Ok(Lvalue { ctx: self.id, idx })
    }

    /// The static type of a value.
    pub fn type_of(&self, value: Rvalue) -> Result<Type, Error> {
        self.ensure_live()?;
        let idx = self.rv_idx(value)?;
        Ok(Type {
            ctx: self.id,
            idx: self.values[idx].ty,
        })
    }

    // ---- functions, params, globals --------------------------------------

    pub fn new_param(
        &mut self,
        loc: Option<Location>,
        ty: Type,
        name: &str,
    ) -> Result<Param, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ty = self.ty_idx(ty)?;
        self.check_nul("parameter name", name)?;
        let idx = self.params.insert(ParamNode {
            name: name.to_owned(),
            ty,
            owner: None,
            loc,
        });
        let value = self.values.insert(ValueNode {
            ty,
            kind: ValueKind::Param(idx),
            loc,
        });
        Ok(Param {
            ctx: self.id,
            idx,
            value,
        })
    }

    /// Declares a function. One per distinct name within a context; each
    /// param belongs to exactly one signature.
    pub fn new_function(
        &mut self,
        loc: Option<Location>,
        kind: FunctionKind,
        return_type: Type,
        name: &str,
        params: &[Param],
        variadic: bool,
    ) -> Result<Function, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ret = self.ty_idx(return_type)?;
        self.check_nul("function name", name)?;
        if self.fn_names.contains_key(name) {
            return self.reject(Error::DuplicateFunction {
                name: name.to_owned(),
            });
        }
        let mut param_indices = Vec::with_capacity(params.len());
        for param in params {
            self.guard(param.ctx)?;
            param_indices.push(param.idx);
        }
        for &pi in &param_indices {
            if let Some(owner) = self.params[pi].owner {
                let param = self.params[pi].name.clone();
                let owner = self.functions[owner].name.clone();
                return self.reject(Error::ParamReused { param, owner });
            }
        }
        let idx = self.functions.insert(FnNode {
            name: name.to_owned(),
            kind,
            ret,
            params: param_indices.clone(),
            variadic,
            blocks: Vec::new(),
            locals: Vec::new(),
            loc,
        });
        for pi in param_indices {
            self.params[pi].owner = Some(idx);
        }
        self.fn_order.push(idx);
        self.fn_names.insert(name.to_owned(), idx);
        Ok(Function { ctx: self.id, idx })
    }

    pub fn new_global(
        &mut self,
        loc: Option<Location>,
        kind: GlobalKind,
        ty: Type,
        name: &str,
    ) -> Result<Lvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ty = self.ty_idx(ty)?;
        self.check_nul("global name", name)?;
        let lvalue = self.make_lvalue(ValueNode {
            ty,
            kind: ValueKind::Global {
                kind,
                name: name.to_owned(),
            },
            loc,
        });
        self.globals.push(lvalue.idx);
        Ok(lvalue)
    }

    pub fn new_local(
        &mut self,
        function: Function,
        loc: Option<Location>,
        ty: Type,
        name: &str,
    ) -> Result<Lvalue, Error> {
        self.ensure_open()?;
        let loc = self.loc_idx(loc)?;
        let ty = self.ty_idx(ty)?;
        let func = self.fn_idx(function)?;
        self.check_nul("local name", name)?;
        if self.functions[func].kind == FunctionKind::Imported {
            let function = self.functions[func].name.clone();
            return self.reject(Error::ImportedFunctionBody { function });
        }
        let lvalue = self.make_lvalue(ValueNode {
            ty,
            kind: ValueKind::Local {
                func,
                name: name.to_owned(),
            },
            loc,
        });
        self.functions[func].locals.push(lvalue.idx);
        Ok(lvalue)
    }

    // ---- blocks ----------------------------------------------------------

    /// Adds a block to a function; the first block added is the entry
    /// block. Freshly created blocks are open.
    pub fn new_block(&mut self, function: Function, name: &str) -> Result<Block, Error> {
        self.ensure_open()?;
        let func = self.fn_idx(function)?;
        self.check_nul("block name", name)?;
        if self.functions[func].kind == FunctionKind::Imported {
            let function = self.functions[func].name.clone();
            return self.reject(Error::ImportedFunctionBody { function });
        }
        let idx = self.blocks.insert(BlockNode {
            name: name.to_owned(),
            func,
            statements: Vec::new(),
            terminator: None,
        });
        self.functions[func].blocks.push(idx);
        Ok(Block { ctx: self.id, idx })
    }

    fn append(&mut self, block: BlockIndex, statement: Statement) -> Result<(), Error> {
        if self.blocks[block].terminator.is_some() {
            let block = self.blocks[block].name.clone();
            return self.reject(Error::BlockTerminated { block });
        }
        self.blocks[block].statements.push(statement);
        Ok(())
    }

    fn set_terminator(
        &mut self,
        block: BlockIndex,
        terminator: TerminatorNode,
    ) -> Result<(), Error> {
        if self.blocks[block].terminator.is_some() {
            let block = self.blocks[block].name.clone();
            return self.reject(Error::BlockTerminated { block });
        }
        self.blocks[block].terminator = Some(terminator);
        Ok(())
    }

    fn check_target(&mut self, block: BlockIndex, target: BlockIndex) -> Result<(), Error> {
        if self.blocks[block].func != self.blocks[target].func {
            let block = self.blocks[block].name.clone();
            let target = self.blocks[target].name.clone();
            return self.reject(Error::TargetOutsideFunction { block, target });
        }
        Ok(())
    }

    pub fn add_comment(
        &mut self,
        block: Block,
        loc: Option<Location>,
        text: &str,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        self.check_nul("comment", text)?;
        self.append(
            block,
            Statement {
                loc,
                kind: StatementKind::Comment(text.to_owned()),
            },
        )
    }

    /// Evaluates a value for its side effects.
    pub fn add_eval(
        &mut self,
        block: Block,
        loc: Option<Location>,
        value: Rvalue,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        let value = self.rv_idx(value)?;
        self.append(
            block,
            Statement {
                loc,
                kind: StatementKind::Eval(value),
            },
        )
    }

    pub fn add_assignment(
        &mut self,
        block: Block,
        loc: Option<Location>,
        target: Lvalue,
        value: Rvalue,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        let target = self.lv_idx(target)?;
        let value = self.rv_idx(value)?;
        self.append(
            block,
            Statement {
                loc,
                kind: StatementKind::Assign { target, value },
            },
        )
    }

    /// `target op= value`.
    pub fn add_assignment_op(
        &mut self,
        block: Block,
        loc: Option<Location>,
        target: Lvalue,
        op: BinaryOp,
        value: Rvalue,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        let target = self.lv_idx(target)?;
        let value = self.rv_idx(value)?;
        self.append(
            block,
            Statement {
                loc,
                kind: StatementKind::AssignOp { target, op, value },
            },
        )
    }

    pub fn end_with_jump(
        &mut self,
        block: Block,
        loc: Option<Location>,
        target: Block,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        let target = self.block_idx(target)?;
        self.check_target(block, target)?;
        self.set_terminator(
            block,
            TerminatorNode {
                loc,
                kind: TerminatorKind::Jump { target },
            },
        )
    }

    pub fn end_with_conditional(
        &mut self,
        block: Block,
        loc: Option<Location>,
        cond: Rvalue,
        on_true: Block,
        on_false: Block,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        let cond = self.rv_idx(cond)?;
        let on_true = self.block_idx(on_true)?;
        let on_false = self.block_idx(on_false)?;
        self.check_target(block, on_true)?;
        self.check_target(block, on_false)?;
        self.set_terminator(
            block,
            TerminatorNode {
                loc,
                kind: TerminatorKind::Conditional {
                    cond,
                    on_true,
                    on_false,
                },
            },
        )
    }

    pub fn end_with_return(
        &mut self,
        block: Block,
        loc: Option<Location>,
        value: Rvalue,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        let value = self.rv_idx(value)?;
        self.set_terminator(
            block,
            TerminatorNode {
                loc,
                kind: TerminatorKind::Return { value },
            },
        )
    }

    pub fn end_with_void_return(
        &mut self,
        block: Block,
        loc: Option<Location>,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let block = self.block_idx(block)?;
        let loc = self.loc_idx(loc)?;
        self.set_terminator(
            block,
            TerminatorNode {
                loc,
                kind: TerminatorKind::VoidReturn,
            },
        )
    }

    // ---- introspection ---------------------------------------------------

    /// The function's blocks in creation order.
    pub fn blocks_of(&self, function: Function) -> Result<Vec<Block>, Error> {
        self.ensure_live()?;
        let func = self.fn_idx(function)?;
        Ok(self.functions[func]
            .blocks
            .iter()
            .map(|&idx| Block { ctx: self.id, idx })
            .collect())
    }

    pub fn entry_block(&self, function: Function) -> Result<Option<Block>, Error> {
        self.ensure_live()?;
        let func = self.fn_idx(function)?;
        Ok(self.functions[func]
            .blocks
            .first()
            .map(|&idx| Block { ctx: self.id, idx }))
    }

    pub fn block_name(&self, block: Block) -> Result<String, Error> {
        self.ensure_live()?;
        let block = self.block_idx(block)?;
        Ok(self.blocks[block].name.clone())
    }

    pub fn is_terminated(&self, block: Block) -> Result<bool, Error> {
        self.ensure_live()?;
        let block = self.block_idx(block)?;
        Ok(self.blocks[block].terminator.is_some())
    }

    /// How the block currently ends, if it was terminated.
    pub fn terminator_of(&self, block: Block) -> Result<Option<Terminator>, Error> {
        self.ensure_live()?;
        let block = self.block_idx(block)?;
        let make_block = |idx| Block { ctx: self.id, idx };
        Ok(self.blocks[block]
            .terminator
            .as_ref()
            .map(|t| match t.kind {
                TerminatorKind::Jump { target } => Terminator::Jump {
                    target: make_block(target),
                },
                TerminatorKind::Conditional {
                    cond,
                    on_true,
                    on_false,
                } => Terminator::Conditional {
                    condition: Rvalue {
                        ctx: self.id,
                        idx: cond,
                    },
                    on_true: make_block(on_true),
                    on_false: make_block(on_false),
                },
                TerminatorKind::Return { value } => Terminator::Return {
                    value: Rvalue {
                        ctx: self.id,
                        idx: value,
                    },
                },
                TerminatorKind::VoidReturn => Terminator::VoidReturn,
            }))
    }

    // ---- compilation -----------------------------------------------------

    /// Compiles the accumulated unit in memory. One-shot: afterwards the
    /// context answers queries but rejects further mutation.
    pub fn compile<'b>(&mut self, backend: &'b Backend) -> Result<CompiledUnit<'b>, Error> {
        self.ensure_open()?;
        self.validate()?;
        let started = Instant::now();
        let out = lower::run_in_memory(self, backend)?;
        tracing::debug!("backend compile took {:?}", started.elapsed());
        self.absorb_backend_errors(&out.first_error, &out.last_error);
        match out.unit {
            Some(unit) => {
                self.state = State::Compiled;
                Ok(unit)
            }
            None => Err(Error::Compile {
                message: pick_message(out.first_error, out.last_error),
            }),
        }
    }

    /// Compiles the accumulated unit into a file artifact of the given
    /// kind. One-shot, like [`Context::compile`].
    pub fn compile_to_file(
        &mut self,
        backend: &Backend,
        kind: OutputKind,
        path: &Path,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        self.validate()?;
        let started = Instant::now();
        let out = lower::run_to_file(self, backend, kind, path)?;
        tracing::debug!("backend compile took {:?}", started.elapsed());
        self.absorb_backend_errors(&out.first_error, &out.last_error);
        if out.first_error.is_empty() {
            self.state = State::Compiled;
            Ok(())
        } else {
            Err(Error::Compile {
                message: pick_message(out.first_error, out.last_error),
            })
        }
    }

    fn absorb_backend_errors(&mut self, first: &str, last: &str) {
        if !first.is_empty() {
            self.diagnostics.push(first.to_owned());
        }
        if !last.is_empty() && last != first {
            self.diagnostics.push(last.to_owned());
        }
    }
}

fn pick_message(first: String, last: String) -> String {
    if !last.is_empty() {
        last
    } else if !first.is_empty() {
        first
    } else {
        "backend returned no result".to_owned()
    }
}
