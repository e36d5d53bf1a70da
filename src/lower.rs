//! Replays the arena IR through the backend's entry points.
//!
//! The graph is materialized on demand: asking for a type, value or
//! function first materializes everything it depends on, so the foreign
//! objects are always created in a valid partial order no matter how the
//! unit was built. A foreign session exists only for the duration of one
//! compile call; its diagnostics are captured before it is released.

use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::{c_int, c_long, c_void};
use std::path::Path;
use std::ptr::{null_mut, NonNull};

use crate::backend::ffi::{
    Api, RawBlock, RawField, RawFunction, RawLocation, RawLvalue, RawParam, RawRvalue, RawType,
};
use crate::backend::{error_text, Backend, CompiledUnit, OutputKind};
use crate::context::Context;
use crate::error::Error;
use crate::function::{BlockIndex, FnIndex, ParamIndex, StatementKind, TerminatorKind};
use crate::object::LocIndex;
use crate::types::{FieldIndex, TypeIndex, TypeNode};
use crate::value::{ValueIndex, ValueKind};

pub(crate) struct LowerOutput<'b> {
    pub unit: Option<CompiledUnit<'b>>,
    pub first_error: String,
    pub last_error: String,
}

pub(crate) fn run_in_memory<'b>(
    ctx: &Context,
    backend: &'b Backend,
) -> Result<LowerOutput<'b>, Error> {
    let mut session = Session::acquire(ctx, backend.api())?;
    session.replay();
    let raw_result = unsafe { (session.api.context_compile)(session.raw) };
    let (first_error, last_error) = session.errors();
    Ok(LowerOutput {
        unit: NonNull::new(raw_result).map(|raw| CompiledUnit::from_raw(backend, raw)),
        first_error,
        last_error,
    })
}

pub(crate) fn run_to_file<'b>(
    ctx: &Context,
    backend: &'b Backend,
    kind: OutputKind,
    path: &Path,
) -> Result<LowerOutput<'b>, Error> {
    let path = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| Error::Nul {
        what: "output path",
    })?;
    let mut session = Session::acquire(ctx, backend.api())?;
    session.replay();
    unsafe {
        (session.api.context_compile_to_file)(session.raw, kind as c_int, path.as_ptr());
    }
    let (first_error, last_error) = session.errors();
    Ok(LowerOutput {
        unit: None,
        first_error,
        last_error,
    })
}

fn cstr(text: &str) -> CString {
    CString::new(text).expect("interior NUL bytes are rejected at construction")
}

struct Session<'a> {
    ctx: &'a Context,
    api: &'a Api,
    raw: *mut crate::backend::ffi::RawContext,
    types: HashMap<TypeIndex, *mut RawType>,
    fields: HashMap<FieldIndex, *mut RawField>,
    functions: HashMap<FnIndex, *mut RawFunction>,
    params: HashMap<ParamIndex, *mut RawParam>,
    blocks: HashMap<BlockIndex, *mut RawBlock>,
    lvalues: HashMap<ValueIndex, *mut RawLvalue>,
    rvalues: HashMap<ValueIndex, *mut RawRvalue>,
    locations: HashMap<LocIndex, *mut RawLocation>,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.context_release)(self.raw) }
    }
}

impl<'a> Session<'a> {
    fn acquire(ctx: &'a Context, api: &'a Api) -> Result<Self, Error> {
        let raw = unsafe { (api.context_acquire)() };
        if raw.is_null() {
            return Err(Error::AcquireFailed);
        }
        Ok(Self {
            ctx,
            api,
            raw,
            types: HashMap::new(),
            fields: HashMap::new(),
            functions: HashMap::new(),
            params: HashMap::new(),
            blocks: HashMap::new(),
            lvalues: HashMap::new(),
            rvalues: HashMap::new(),
            locations: HashMap::new(),
        })
    }

    fn errors(&self) -> (String, String) {
        unsafe {
            (
                error_text((self.api.context_get_first_error)(self.raw)),
                error_text((self.api.context_get_last_error)(self.raw)),
            )
        }
    }

    fn apply_options(&mut self) {
        let options = &self.ctx.options;
        unsafe {
            // INT_OPTION_OPTIMIZATION_LEVEL is the backend's option 0
            (self.api.context_set_int_option)(self.raw, 0, options.opt_level as c_int);
            for (i, &value) in options.bools.iter().enumerate() {
                (self.api.context_set_bool_option)(self.raw, i as c_int, value as c_int);
            }
            if let Some(progname) = &options.progname {
                let progname = cstr(progname);
                // STR_OPTION_PROGNAME is the backend's option 0
                (self.api.context_set_str_option)(self.raw, 0, progname.as_ptr());
            }
            if let Some(value) = options.allow_unreachable_blocks {
                (self.api.context_set_bool_allow_unreachable_blocks)(self.raw, value as c_int);
            }
            if let Some(value) = options.print_errors_to_stderr {
                (self.api.context_set_bool_print_errors_to_stderr)(self.raw, value as c_int);
            }
            if let Some(value) = options.use_external_driver {
                (self.api.context_set_bool_use_external_driver)(self.raw, value as c_int);
            }
        }
    }

    /// Materializes the whole unit in the foreign session.
    fn replay(&mut self) {
        let ctx = self.ctx;
        self.apply_options();
        for &func in &ctx.fn_order {
            self.function(func);
        }
        for &global in &ctx.globals {
            self.lvalue(global);
        }
        for &func in &ctx.fn_order {
            for &local in &ctx.functions[func].locals {
                self.lvalue(local);
            }
            for &block in &ctx.functions[func].blocks {
                self.block(block);
            }
        }
        for &func in &ctx.fn_order {
            for &block in &ctx.functions[func].blocks {
                self.block_body(block);
            }
        }
    }

    fn location(&mut self, loc: Option<LocIndex>) -> *mut RawLocation {
        let Some(idx) = loc else {
            return null_mut();
        };
        if let Some(&raw) = self.locations.get(&idx) {
            return raw;
        }
        let node = &self.ctx.locations[idx];
        let filename = cstr(&node.filename);
        let raw = unsafe {
            (self.api.context_new_location)(
                self.raw,
                filename.as_ptr(),
                node.line as c_int,
                node.column as c_int,
            )
        };
        self.locations.insert(idx, raw);
        raw
    }

    fn ty(&mut self, idx: TypeIndex) -> *mut RawType {
        if let Some(&raw) = self.types.get(&idx) {
            return raw;
        }
        let ctx = self.ctx;
        let raw = match &ctx.types[idx] {
            TypeNode::Primitive(kind) => unsafe {
                (self.api.context_get_type)(self.raw, *kind as c_int)
            },
            TypeNode::Pointer(base) => {
                let base = self.ty(*base);
                unsafe { (self.api.type_get_pointer)(base) }
            }
            TypeNode::Const(base) => {
                let base = self.ty(*base);
                unsafe { (self.api.type_get_const)(base) }
            }
            TypeNode::Volatile(base) => {
                let base = self.ty(*base);
                unsafe { (self.api.type_get_volatile)(base) }
            }
            TypeNode::Array { element, count } => {
                let element = self.ty(*element);
                unsafe {
                    (self.api.context_new_array_type)(
                        self.raw,
                        null_mut(),
                        element,
                        *count as c_int,
                    )
                }
            }
            TypeNode::Struct { name, fields } => {
                let mut members: Vec<*mut RawField> =
                    fields.iter().map(|&f| self.field(f)).collect();
                let name = cstr(name);
                unsafe {
                    let raw_struct = (self.api.context_new_struct_type)(
                        self.raw,
                        null_mut(),
                        name.as_ptr(),
                        members.len() as c_int,
                        members.as_mut_ptr(),
                    );
                    (self.api.struct_as_type)(raw_struct)
                }
            }
            TypeNode::FnPtr {
                ret,
                params,
                variadic,
            } => {
                let ret = self.ty(*ret);
                let mut param_types: Vec<*mut RawType> =
                    params.iter().map(|&p| self.ty(p)).collect();
                unsafe {
                    (self.api.context_new_function_ptr_type)(
                        self.raw,
                        null_mut(),
                        ret,
                        param_types.len() as c_int,
                        param_types.as_mut_ptr(),
                        *variadic as c_int,
                    )
                }
            }
        };
        self.types.insert(idx, raw);
        raw
    }

    fn field(&mut self, idx: FieldIndex) -> *mut RawField {
        if let Some(&raw) = self.fields.get(&idx) {
            return raw;
        }
        let node = &self.ctx.fields[idx];
        let ty = self.ty(node.ty);
        let loc = self.location(node.loc);
        let name = cstr(&node.name);
        let raw = unsafe { (self.api.context_new_field)(self.raw, loc, ty, name.as_ptr()) };
        self.fields.insert(idx, raw);
        raw
    }

    fn param(&mut self, idx: ParamIndex) -> *mut RawParam {
        if let Some(&raw) = self.params.get(&idx) {
            return raw;
        }
        let node = &self.ctx.params[idx];
        let ty = self.ty(node.ty);
        let loc = self.location(node.loc);
        let name = cstr(&node.name);
        let raw = unsafe { (self.api.context_new_param)(self.raw, loc, ty, name.as_ptr()) };
        self.params.insert(idx, raw);
        raw
    }

    fn function(&mut self, idx: FnIndex) -> *mut RawFunction {
        if let Some(&raw) = self.functions.get(&idx) {
            return raw;
        }
        let node = &self.ctx.functions[idx];
        let ret = self.ty(node.ret);
        let mut params: Vec<*mut RawParam> =
            node.params.iter().map(|&p| self.param(p)).collect();
        let loc = self.location(node.loc);
        let name = cstr(&node.name);
        let raw = unsafe {
            (self.api.context_new_function)(
                self.raw,
                loc,
                node.kind as c_int,
                ret,
                name.as_ptr(),
                params.len() as c_int,
                params.as_mut_ptr(),
                node.variadic as c_int,
            )
        };
        self.functions.insert(idx, raw);
        raw
    }

    fn block(&mut self, idx: BlockIndex) -> *mut RawBlock {
        if let Some(&raw) = self.blocks.get(&idx) {
            return raw;
        }
        let node = &self.ctx.blocks[idx];
        let func = self.function(node.func);
        let name = cstr(&node.name);
        let raw = unsafe { (self.api.function_new_block)(func, name.as_ptr()) };
        self.blocks.insert(idx, raw);
        raw
    }

    fn lvalue(&mut self, idx: ValueIndex) -> *mut RawLvalue {
        if let Some(&raw) = self.lvalues.get(&idx) {
            return raw;
        }
        let node = &self.ctx.values[idx];
        let loc = self.location(node.loc);
        let raw = match &node.kind {
            ValueKind::Param(param) => {
                let param = self.param(*param);
                unsafe { (self.api.param_as_lvalue)(param) }
            }
            ValueKind::Local { func, name } => {
                let func = self.function(*func);
                let ty = self.ty(node.ty);
                let name = cstr(name);
                unsafe { (self.api.function_new_local)(func, loc, ty, name.as_ptr()) }
            }
            ValueKind::Global { kind, name } => {
                let ty = self.ty(node.ty);
                let name = cstr(name);
                unsafe {
                    (self.api.context_new_global)(
                        self.raw,
                        loc,
                        *kind as c_int,
                        ty,
                        name.as_ptr(),
                    )
                }
            }
            ValueKind::Deref(value) => {
                let value = self.rvalue(*value);
                unsafe { (self.api.rvalue_dereference)(value, loc) }
            }
            ValueKind::ArrayAccess { ptr, index } => {
                let ptr = self.rvalue(*ptr);
                let index = self.rvalue(*index);
                unsafe { (self.api.context_new_array_access)(self.raw, loc, ptr, index) }
            }
            ValueKind::AccessField { base, field } => {
                let base = self.lvalue(*base);
                let field = self.field(*field);
                unsafe { (self.api.lvalue_access_field)(base, loc, field) }
            }
            ValueKind::DerefField { ptr, field } => {
                let ptr = self.rvalue(*ptr);
                let field = self.field(*field);
                unsafe { (self.api.rvalue_dereference_field)(ptr, loc, field) }
            }
            _ => unreachable!("only addressable values back an lvalue handle"),
        };
        self.lvalues.insert(idx, raw);
        raw
    }

    fn rvalue(&mut self, idx: ValueIndex) -> *mut RawRvalue {
        if let Some(&raw) = self.rvalues.get(&idx) {
            return raw;
        }
        let node = &self.ctx.values[idx];
        let loc = self.location(node.loc);
        let raw = match &node.kind {
            ValueKind::Param(param) => {
                let param = self.param(*param);
                unsafe { (self.api.param_as_rvalue)(param) }
            }
            ValueKind::Local { .. }
            | ValueKind::Global { .. }
            | ValueKind::Deref(_)
            | ValueKind::ArrayAccess { .. }
            | ValueKind::AccessField { .. }
            | ValueKind::DerefField { .. } => {
                let lvalue = self.lvalue(idx);
                unsafe { (self.api.lvalue_as_rvalue)(lvalue) }
            }
            ValueKind::FromInt(value) => {
                let ty = self.ty(node.ty);
                unsafe {
                    (self.api.context_new_rvalue_from_int)(self.raw, ty, *value as c_int)
                }
            }
            ValueKind::FromLong(value) => {
                let ty = self.ty(node.ty);
                unsafe {
                    (self.api.context_new_rvalue_from_long)(self.raw, ty, *value as c_long)
                }
            }
            ValueKind::FromPtr(value) => {
                let ty = self.ty(node.ty);
                unsafe {
                    (self.api.context_new_rvalue_from_ptr)(self.raw, ty, *value as *mut c_void)
                }
            }
            ValueKind::StringLiteral(text) => {
                let text = cstr(text);
                unsafe { (self.api.context_new_string_literal)(self.raw, text.as_ptr()) }
            }
            ValueKind::Zero => {
                let ty = self.ty(node.ty);
                unsafe { (self.api.context_zero)(self.raw, ty) }
            }
            ValueKind::One => {
                let ty = self.ty(node.ty);
                unsafe { (self.api.context_one)(self.raw, ty) }
            }
            ValueKind::Cast(value) => {
                let value = self.rvalue(*value);
                let ty = self.ty(node.ty);
                unsafe { (self.api.context_new_cast)(self.raw, loc, value, ty) }
            }
            ValueKind::Bitcast(value) => {
                let value = self.rvalue(*value);
                let ty = self.ty(node.ty);
                unsafe { (self.api.context_new_bitcast)(self.raw, loc, value, ty) }
            }
            ValueKind::Comparison { op, lhs, rhs } => {
                let lhs = self.rvalue(*lhs);
                let rhs = self.rvalue(*rhs);
                unsafe {
                    (self.api.context_new_comparison)(self.raw, loc, *op as c_int, lhs, rhs)
                }
            }
            ValueKind::Binary { op, lhs, rhs } => {
                let ty = self.ty(node.ty);
                let lhs = self.rvalue(*lhs);
                let rhs = self.rvalue(*rhs);
                unsafe {
                    (self.api.context_new_binary_op)(self.raw, loc, *op as c_int, ty, lhs, rhs)
                }
            }
            ValueKind::Call { func, args } => {
                let func = self.function(*func);
                let mut args: Vec<*mut RawRvalue> =
                    args.clone().iter().map(|&a| self.rvalue(a)).collect();
                unsafe {
                    (self.api.context_new_call)(
                        self.raw,
                        loc,
                        func,
                        args.len() as c_int,
                        args.as_mut_ptr(),
                    )
                }
            }
            ValueKind::CallThroughPtr { fn_ptr, args } => {
                let fn_ptr = self.rvalue(*fn_ptr);
                let mut args: Vec<*mut RawRvalue> =
                    args.clone().iter().map(|&a| self.rvalue(a)).collect();
                unsafe {
                    (self.api.context_new_call_through_ptr)(
                        self.raw,
                        loc,
                        fn_ptr,
                        args.len() as c_int,
                        args.as_mut_ptr(),
                    )
                }
            }
            ValueKind::AddressOf(target) => {
                let target = self.lvalue(*target);
                unsafe { (self.api.lvalue_get_address)(target, loc) }
            }
        };
        self.rvalues.insert(idx, raw);
        raw
    }

    fn block_body(&mut self, idx: BlockIndex) {
        let ctx = self.ctx;
        let raw_block = self.block(idx);
        let body = &ctx.blocks[idx];
        for statement in &body.statements {
            let loc = self.location(statement.loc);
            match &statement.kind {
                StatementKind::Comment(text) => {
                    let text = cstr(text);
                    unsafe { (self.api.block_add_comment)(raw_block, loc, text.as_ptr()) }
                }
                StatementKind::Eval(value) => {
                    let value = self.rvalue(*value);
                    unsafe { (self.api.block_add_eval)(raw_block, loc, value) }
                }
                StatementKind::Assign { target, value } => {
                    let target = self.lvalue(*target);
                    let value = self.rvalue(*value);
                    unsafe { (self.api.block_add_assignment)(raw_block, loc, target, value) }
                }
                StatementKind::AssignOp { target, op, value } => {
                    let target = self.lvalue(*target);
                    let value = self.rvalue(*value);
                    unsafe {
                        (self.api.block_add_assignment_op)(
                            raw_block,
                            loc,
                            target,
                            *op as c_int,
                            value,
                        )
                    }
                }
            }
        }
        let Some(terminator) = &body.terminator else {
            // left for the backend to report; only possible for unreachable
            // blocks under the allow-unreachable option
            return;
        };
        let loc = self.location(terminator.loc);
        match &terminator.kind {
            TerminatorKind::Jump { target } => {
                let target = self.block(*target);
                unsafe { (self.api.block_end_with_jump)(raw_block, loc, target) }
            }
            TerminatorKind::Conditional {
                cond,
                on_true,
                on_false,
            } => {
                let cond = self.rvalue(*cond);
                let on_true = self.block(*on_true);
                let on_false = self.block(*on_false);
                unsafe {
                    (self.api.block_end_with_conditional)(raw_block, loc, cond, on_true, on_false)
                }
            }
            TerminatorKind::Return { value } => {
                let value = self.rvalue(*value);
                unsafe { (self.api.block_end_with_return)(raw_block, loc, value) }
            }
            TerminatorKind::VoidReturn => unsafe {
                (self.api.block_end_with_void_return)(raw_block, loc)
            },
        }
    }
}
