//! Textual renderings of the IR: the human-readable dump, the per-entity
//! debug strings, and a Rust-source reproducer that rebuilds the context
//! through the public API.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use itertools::Itertools;

use crate::context::Context;
use crate::error::Error;
use crate::function::{
    FnIndex, FunctionKind, GlobalKind, ParamIndex, StatementKind, TerminatorKind,
};
use crate::object::{LocIndex, Object};
use crate::types::{FieldIndex, TypeIndex, TypeKind, TypeNode};
use crate::value::{BinaryOp, Comparison, ValueIndex, ValueKind};

fn c_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Void => "void",
        TypeKind::VoidPtr => "void *",
        TypeKind::Bool => "bool",
        TypeKind::Char => "char",
        TypeKind::SignedChar => "signed char",
        TypeKind::UnsignedChar => "unsigned char",
        TypeKind::Short => "short",
        TypeKind::UnsignedShort => "unsigned short",
        TypeKind::Int => "int",
        TypeKind::UnsignedInt => "unsigned int",
        TypeKind::Long => "long",
        TypeKind::UnsignedLong => "unsigned long",
        TypeKind::LongLong => "long long",
        TypeKind::UnsignedLongLong => "unsigned long long",
        TypeKind::Float => "float",
        TypeKind::Double => "double",
        TypeKind::LongDouble => "long double",
        TypeKind::ConstCharPtr => "const char *",
        TypeKind::SizeT => "size_t",
        TypeKind::FilePtr => "FILE *",
        TypeKind::ComplexFloat => "_Complex float",
        TypeKind::ComplexDouble => "_Complex double",
        TypeKind::ComplexLongDouble => "_Complex long double",
        TypeKind::UInt8 => "uint8_t",
        TypeKind::UInt16 => "uint16_t",
        TypeKind::UInt32 => "uint32_t",
        TypeKind::UInt64 => "uint64_t",
        TypeKind::UInt128 => "__uint128_t",
        TypeKind::Int8 => "int8_t",
        TypeKind::Int16 => "int16_t",
        TypeKind::Int32 => "int32_t",
        TypeKind::Int64 => "int64_t",
        TypeKind::Int128 => "__int128_t",
    }
}

fn comparison_symbol(op: Comparison) -> &'static str {
    match op {
        Comparison::Eq => "==",
        Comparison::Ne => "!=",
        Comparison::Lt => "<",
        Comparison::Le => "<=",
        Comparison::Gt => ">",
        Comparison::Ge => ">=",
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Plus => "+",
        BinaryOp::Minus => "-",
        BinaryOp::Mult => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::BitwiseAnd => "&",
        BinaryOp::BitwiseXor => "^",
        BinaryOp::BitwiseOr => "|",
        BinaryOp::LogicalAnd => "&&",
        BinaryOp::LogicalOr => "||",
        BinaryOp::Lshift => "<<",
        BinaryOp::Rshift => ">>",
    }
}

fn function_kind_str(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::Exported => "exported",
        FunctionKind::Internal => "internal",
        FunctionKind::Imported => "imported",
        FunctionKind::AlwaysInline => "always_inline",
    }
}

fn global_kind_str(kind: GlobalKind) -> &'static str {
    match kind {
        GlobalKind::Exported => "exported",
        GlobalKind::Internal => "internal",
        GlobalKind::Imported => "imported",
    }
}

pub(crate) fn type_string(ctx: &Context, idx: TypeIndex) -> String {
    match &ctx.types[idx] {
        TypeNode::Primitive(kind) => c_name(*kind).to_owned(),
        TypeNode::Pointer(base) => format!("{} *", type_string(ctx, *base)),
        TypeNode::Const(base) => format!("const {}", type_string(ctx, *base)),
        TypeNode::Volatile(base) => format!("volatile {}", type_string(ctx, *base)),
        TypeNode::Array { element, count } => {
            format!("{}[{}]", type_string(ctx, *element), count)
        }
        TypeNode::Struct { name, .. } => format!("struct {name}"),
        TypeNode::FnPtr {
            ret,
            params,
            variadic,
        } => {
            let mut args = params.iter().map(|&p| type_string(ctx, p)).join(", ");
            if *variadic {
                if args.is_empty() {
                    args.push_str("...");
                } else {
                    args.push_str(", ...");
                }
            }
            format!("{} (*)({})", type_string(ctx, *ret), args)
        }
    }
}

pub(crate) fn value_string(ctx: &Context, idx: ValueIndex) -> String {
    let node = &ctx.values[idx];
    let ty = |i| type_string(ctx, i);
    let val = |i| value_string(ctx, i);
    match &node.kind {
        ValueKind::FromInt(v) => format!("({}){}", ty(node.ty), v),
        ValueKind::FromLong(v) => format!("({}){}", ty(node.ty), v),
        ValueKind::FromPtr(v) => format!("({})0x{:x}", ty(node.ty), v),
        ValueKind::StringLiteral(s) => format!("{s:?}"),
        ValueKind::Zero => format!("({})0", ty(node.ty)),
        ValueKind::One => format!("({})1", ty(node.ty)),
        ValueKind::Cast(v) => format!("({})({})", ty(node.ty), val(*v)),
        ValueKind::Bitcast(v) => format!("bitcast({}, {})", val(*v), ty(node.ty)),
        ValueKind::Comparison { op, lhs, rhs } => {
            format!("({} {} {})", val(*lhs), comparison_symbol(*op), val(*rhs))
        }
        ValueKind::Binary { op, lhs, rhs } => {
            format!("({} {} {})", val(*lhs), binary_symbol(*op), val(*rhs))
        }
        ValueKind::Call { func, args } => {
            let args = args.iter().map(|&a| val(a)).join(", ");
            format!("{}({})", ctx.functions[*func].name, args)
        }
        ValueKind::CallThroughPtr { fn_ptr, args } => {
            let args = args.iter().map(|&a| val(a)).join(", ");
            format!("(*{})({})", val(*fn_ptr), args)
        }
        ValueKind::AddressOf(v) => format!("&{}", val(*v)),
        ValueKind::Param(p) => ctx.params[*p].name.clone(),
        ValueKind::Local { name, .. } => name.clone(),
        ValueKind::Global { name, .. } => name.clone(),
        ValueKind::Deref(v) => format!("*{}", val(*v)),
        ValueKind::ArrayAccess { ptr, index } => format!("{}[{}]", val(*ptr), val(*index)),
        ValueKind::AccessField { base, field } => {
            format!("{}.{}", val(*base), ctx.fields[*field].name)
        }
        ValueKind::DerefField { ptr, field } => {
            format!("{}->{}", val(*ptr), ctx.fields[*field].name)
        }
    }
}

fn render(ctx: &Context) -> String {
    let mut out = String::new();
    for &global in &ctx.globals {
        let node = &ctx.values[global];
        if let ValueKind::Global { kind, name } = &node.kind {
            let _ = writeln!(
                out,
                "global {} {} {};",
                global_kind_str(*kind),
                type_string(ctx, node.ty),
                name
            );
        }
    }
    for &func in &ctx.fn_order {
        let node = &ctx.functions[func];
        let mut params = node
            .params
            .iter()
            .map(|&p| {
                format!(
                    "{} {}",
                    type_string(ctx, ctx.params[p].ty),
                    ctx.params[p].name
                )
            })
            .join(", ");
        if node.variadic {
            if params.is_empty() {
                params.push_str("...");
            } else {
                params.push_str(", ...");
            }
        }
        let _ = writeln!(
            out,
            "\nfunction {} {}({}) -> {}",
            function_kind_str(node.kind),
            node.name,
            params,
            type_string(ctx, node.ret)
        );
        for &block in &node.blocks {
            let body = &ctx.blocks[block];
            let _ = writeln!(out, "  {}:", body.name);
            for statement in &body.statements {
                match &statement.kind {
                    StatementKind::Comment(text) => {
                        let _ = writeln!(out, "    /* {text} */");
                    }
                    StatementKind::Eval(value) => {
                        let _ = writeln!(out, "    {};", value_string(ctx, *value));
                    }
                    StatementKind::Assign { target, value } => {
                        let _ = writeln!(
                            out,
                            "    {} = {};",
                            value_string(ctx, *target),
                            value_string(ctx, *value)
                        );
                    }
                    StatementKind::AssignOp { target, op, value } => {
                        let _ = writeln!(
                            out,
                            "    {} {}= {};",
                            value_string(ctx, *target),
                            binary_symbol(*op),
                            value_string(ctx, *value)
                        );
                    }
                }
            }
            match body.terminator.as_ref().map(|t| &t.kind) {
                None => {
                    let _ = writeln!(out, "    /* no terminator */");
                }
                Some(TerminatorKind::Jump { target }) => {
                    let _ = writeln!(out, "    goto {};", ctx.blocks[*target].name);
                }
                Some(TerminatorKind::Conditional {
                    cond,
                    on_true,
                    on_false,
                }) => {
                    let _ = writeln!(
                        out,
                        "    if ({}) goto {}; else goto {};",
                        value_string(ctx, *cond),
                        ctx.blocks[*on_true].name,
                        ctx.blocks[*on_false].name
                    );
                }
                Some(TerminatorKind::Return { value }) => {
                    let _ = writeln!(out, "    return {};", value_string(ctx, *value));
                }
                Some(TerminatorKind::VoidReturn) => {
                    let _ = writeln!(out, "    return;");
                }
            }
        }
    }
    out
}

impl Context {
    /// Human-readable description of any entity.
    pub fn debug_string<O: Into<Object>>(&self, object: O) -> Result<String, Error> {
        self.ensure_live()?;
        let object = object.into();
        self.guard(object.context_id())?;
        Ok(match object {
            Object::Type(o) => type_string(self, o.idx),
            Object::Field(o) => self.fields[o.idx].name.clone(),
            Object::Function(o) => {
                let node = &self.functions[o.idx];
                let params = node
                    .params
                    .iter()
                    .map(|&p| type_string(self, self.params[p].ty))
                    .join(", ");
                format!(
                    "{} {}({})",
                    type_string(self, node.ret),
                    node.name,
                    params
                )
            }
            Object::Param(o) => self.params[o.idx].name.clone(),
            Object::Block(o) => self.blocks[o.idx].name.clone(),
            Object::Rvalue(o) => value_string(self, o.idx),
            Object::Lvalue(o) => value_string(self, o.idx),
            Object::Location(o) => {
                let node = &self.locations[o.idx];
                format!("{}:{}:{}", node.filename, node.line, node.column)
            }
        })
    }

    /// Writes a textual dump of the whole unit. Request-only; works with or
    /// without a backend at hand.
    pub fn dump_to_file(&self, path: &Path) -> Result<(), Error> {
        self.ensure_live()?;
        std::fs::write(path, render(self))?;
        Ok(())
    }

    /// Writes a standalone Rust program that rebuilds this context through
    /// the public API, for offline diagnosis of backend failures.
    pub fn dump_reproducer_to_file(&self, path: &Path) -> Result<(), Error> {
        self.ensure_live()?;
        let mut reproducer = Reproducer::new(self);
        reproducer.run();
        std::fs::write(path, reproducer.out)?;
        Ok(())
    }
}

enum Binding {
    Rvalue(String),
    Lvalue(String),
    Param(String),
}

impl Binding {
    fn as_rvalue(&self) -> String {
        match self {
            Binding::Rvalue(name) => name.clone(),
            Binding::Lvalue(name) => format!("{name}.as_rvalue()"),
            Binding::Param(name) => format!("{name}.as_rvalue()"),
        }
    }

    fn as_lvalue(&self) -> String {
        match self {
            Binding::Rvalue(name) => unreachable!("{name} does not denote storage"),
            Binding::Lvalue(name) => name.clone(),
            Binding::Param(name) => format!("{name}.as_lvalue()"),
        }
    }
}

/// Emits builder calls for every entity reachable from the unit's functions
/// and globals, dependencies first.
struct Reproducer<'a> {
    ctx: &'a Context,
    out: String,
    types: HashMap<TypeIndex, String>,
    fields: HashMap<FieldIndex, String>,
    params: HashMap<ParamIndex, String>,
    functions: HashMap<FnIndex, String>,
    values: HashMap<ValueIndex, String>,
    value_kinds: HashMap<ValueIndex, u8>,
    locations: HashMap<LocIndex, String>,
    counter: usize,
}

impl<'a> Reproducer<'a> {
    fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            out: String::new(),
            types: HashMap::new(),
            fields: HashMap::new(),
            params: HashMap::new(),
            functions: HashMap::new(),
            values: HashMap::new(),
            value_kinds: HashMap::new(),
            locations: HashMap::new(),
            counter: 0,
        }
    }

    fn fresh(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}{}", prefix, self.counter)
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "    {text}");
    }

    fn run(&mut self) {
        let ctx = self.ctx;
        self.out.push_str(
            "//! Generated reproducer; rebuilds the compilation unit through the\n\
             //! public API.\n\nuse anvil::*;\n\n\
             fn main() -> Result<(), Error> {\n    \
             let backend = Backend::load()?;\n    \
             let mut ctx = Context::new();\n",
        );
        self.emit_options();
        for &func in &ctx.fn_order {
            self.emit_function(func);
        }
        for &global in &ctx.globals {
            self.emit_value(global);
        }
        let mut block_names = HashMap::new();
        for &func in &ctx.fn_order {
            for &block in &ctx.functions[func].blocks {
                let var = self.fresh("b");
                let func_var = self.functions[&func].clone();
                let name = &ctx.blocks[block].name;
                self.line(&format!(
                    "let {var} = ctx.new_block({func_var}, {name:?})?;"
                ));
                block_names.insert(block, var);
            }
            for &local in &ctx.functions[func].locals {
                self.emit_value(local);
            }
        }
        for &func in &ctx.fn_order {
            for &block in &ctx.functions[func].blocks {
                self.emit_block_body(block, &block_names);
            }
        }
        self.out.push_str(
            "    let unit = ctx.compile(&backend)?;\n    \
             drop(unit);\n    \
             ctx.release()?;\n    \
             Ok(())\n}\n",
        );
    }

    fn emit_options(&mut self) {
        let options = self.ctx.options.clone();
        if options.opt_level != 0 {
            self.line(&format!(
                "ctx.set_int_option(IntOption::OptimizationLevel, {})?;",
                options.opt_level
            ));
        }
        let bool_options = [
            crate::context::BoolOption::Debuginfo,
            crate::context::BoolOption::DumpInitialTree,
            crate::context::BoolOption::DumpInitialGimple,
            crate::context::BoolOption::DumpGeneratedCode,
            crate::context::BoolOption::DumpSummary,
            crate::context::BoolOption::DumpEverything,
            crate::context::BoolOption::SelfcheckGc,
            crate::context::BoolOption::KeepIntermediates,
        ];
        for (i, option) in bool_options.iter().enumerate() {
            if options.bools[i] {
                self.line(&format!("ctx.set_bool_option(BoolOption::{option:?}, true)?;"));
            }
        }
        if let Some(progname) = &options.progname {
            self.line(&format!(
                "ctx.set_str_option(StrOption::Progname, {progname:?})?;"
            ));
        }
        if let Some(v) = options.allow_unreachable_blocks {
            self.line(&format!("ctx.set_allow_unreachable_blocks({v})?;"));
        }
        if let Some(v) = options.print_errors_to_stderr {
            self.line(&format!("ctx.set_print_errors_to_stderr({v})?;"));
        }
        if let Some(v) = options.use_external_driver {
            self.line(&format!("ctx.set_use_external_driver({v})?;"));
        }
    }

    fn emit_loc(&mut self, loc: Option<LocIndex>) -> String {
        match loc {
            None => "None".to_owned(),
            Some(idx) => {
                if let Some(var) = self.locations.get(&idx) {
                    return format!("Some({var})");
                }
                let node = self.ctx.locations[idx].clone();
                let var = self.fresh("loc");
                self.line(&format!(
                    "let {var} = ctx.new_location({:?}, {}, {})?;",
                    node.filename, node.line, node.column
                ));
                self.locations.insert(idx, var.clone());
                format!("Some({var})")
            }
        }
    }

    fn emit_type(&mut self, idx: TypeIndex) -> String {
        if let Some(var) = self.types.get(&idx) {
            return var.clone();
        }
        let node = self.ctx.types[idx].clone();
        let var = self.fresh("t");
        match node {
            TypeNode::Primitive(kind) => {
                self.line(&format!("let {var} = ctx.get_type(TypeKind::{kind:?})?;"));
            }
            TypeNode::Pointer(base) => {
                let base = self.emit_type(base);
                self.line(&format!("let {var} = ctx.pointer_to({base})?;"));
            }
            TypeNode::Const(base) => {
                let base = self.emit_type(base);
                self.line(&format!("let {var} = ctx.const_of({base})?;"));
            }
            TypeNode::Volatile(base) => {
                let base = self.emit_type(base);
                self.line(&format!("let {var} = ctx.volatile_of({base})?;"));
            }
            TypeNode::Array { element, count } => {
                let element = self.emit_type(element);
                self.line(&format!(
                    "let {var} = ctx.array_type(None, {element}, {count})?;"
                ));
            }
            TypeNode::Struct { name, fields } => {
                let members = fields
                    .iter()
                    .map(|&f| self.emit_field(f))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.line(&format!(
                    "let {var} = ctx.struct_type(None, {name:?}, &[{members}])?;"
                ));
            }
            TypeNode::FnPtr {
                ret,
                params,
                variadic,
            } => {
                let ret = self.emit_type(ret);
                let params = params
                    .iter()
                    .map(|&p| self.emit_type(p))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.line(&format!(
                    "let {var} = ctx.function_ptr_type(None, {ret}, &[{params}], {variadic})?;"
                ));
            }
        }
        self.types.insert(idx, var.clone());
        var
    }

    fn emit_field(&mut self, idx: FieldIndex) -> String {
        if let Some(var) = self.fields.get(&idx) {
            return var.clone();
        }
        let node = self.ctx.fields[idx].clone();
        let ty = self.emit_type(node.ty);
        let loc = self.emit_loc(node.loc);
        let var = self.fresh("f");
        self.line(&format!(
            "let {var} = ctx.new_field({loc}, {ty}, {:?})?;",
            node.name
        ));
        self.fields.insert(idx, var.clone());
        var
    }

    fn emit_param(&mut self, idx: ParamIndex) -> String {
        if let Some(var) = self.params.get(&idx) {
            return var.clone();
        }
        let node = self.ctx.params[idx].clone();
        let ty = self.emit_type(node.ty);
        let loc = self.emit_loc(node.loc);
        let var = self.fresh("p");
        self.line(&format!(
            "let {var} = ctx.new_param({loc}, {ty}, {:?})?;",
            node.name
        ));
        self.params.insert(idx, var.clone());
        var
    }

    fn emit_function(&mut self, idx: FnIndex) -> String {
        if let Some(var) = self.functions.get(&idx) {
            return var.clone();
        }
        let node = self.ctx.functions[idx].clone();
        let ret = self.emit_type(node.ret);
        let params = node
            .params
            .iter()
            .map(|&p| self.emit_param(p))
            .collect::<Vec<_>>()
            .join(", ");
        let loc = self.emit_loc(node.loc);
        let var = self.fresh("func");
        self.line(&format!(
            "let {var} = ctx.new_function({loc}, FunctionKind::{:?}, {ret}, {:?}, &[{params}], {})?;",
            node.kind, node.name, node.variadic
        ));
        self.functions.insert(idx, var.clone());
        var
    }

    fn binding(&self, idx: ValueIndex) -> Binding {
        let name = self.values[&idx].clone();
        match self.value_kinds[&idx] {
            0 => Binding::Rvalue(name),
            1 => Binding::Lvalue(name),
            _ => Binding::Param(name),
        }
    }

    fn emit_value(&mut self, idx: ValueIndex) -> Binding {
        if self.values.contains_key(&idx) {
            return self.binding(idx);
        }
        let node = self.ctx.values[idx].clone();
        let loc = self.emit_loc(node.loc);
        let var = self.fresh("v");
        let mut kind_tag = 0u8;
        match node.kind {
            ValueKind::FromInt(v) => {
                let ty = self.emit_type(node.ty);
                self.line(&format!("let {var} = ctx.new_rvalue_from_int({ty}, {v})?;"));
            }
            ValueKind::FromLong(v) => {
                let ty = self.emit_type(node.ty);
                self.line(&format!("let {var} = ctx.new_rvalue_from_long({ty}, {v})?;"));
            }
            ValueKind::FromPtr(v) => {
                let ty = self.emit_type(node.ty);
                self.line(&format!("let {var} = ctx.new_rvalue_from_ptr({ty}, {v})?;"));
            }
            ValueKind::StringLiteral(s) => {
                self.line(&format!("let {var} = ctx.new_string_literal({s:?})?;"));
            }
            ValueKind::Zero => {
                let ty = self.emit_type(node.ty);
                self.line(&format!("let {var} = ctx.zero({ty})?;"));
            }
            ValueKind::One => {
                let ty = self.emit_type(node.ty);
                self.line(&format!("let {var} = ctx.one({ty})?;"));
            }
            ValueKind::Cast(v) => {
                let value = self.emit_value(v).as_rvalue();
                let ty = self.emit_type(node.ty);
                self.line(&format!("let {var} = ctx.new_cast({loc}, {value}, {ty})?;"));
            }
            ValueKind::Bitcast(v) => {
                let value = self.emit_value(v).as_rvalue();
                let ty = self.emit_type(node.ty);
                self.line(&format!(
                    "let {var} = ctx.new_bitcast({loc}, {value}, {ty})?;"
                ));
            }
            ValueKind::Comparison { op, lhs, rhs } => {
                let lhs = self.emit_value(lhs).as_rvalue();
                let rhs = self.emit_value(rhs).as_rvalue();
                self.line(&format!(
                    "let {var} = ctx.new_comparison({loc}, Comparison::{op:?}, {lhs}, {rhs})?;"
                ));
            }
            ValueKind::Binary { op, lhs, rhs } => {
                let ty = self.emit_type(node.ty);
                let lhs = self.emit_value(lhs).as_rvalue();
                let rhs = self.emit_value(rhs).as_rvalue();
                self.line(&format!(
                    "let {var} = ctx.new_binary_op({loc}, BinaryOp::{op:?}, {ty}, {lhs}, {rhs})?;"
                ));
            }
            ValueKind::Call { func, args } => {
                let func = self.emit_function(func);
                let args = args
                    .iter()
                    .map(|&a| self.emit_value(a).as_rvalue())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.line(&format!(
                    "let {var} = ctx.new_call({loc}, {func}, &[{args}])?;"
                ));
            }
            ValueKind::CallThroughPtr { fn_ptr, args } => {
                let fn_ptr = self.emit_value(fn_ptr).as_rvalue();
                let args = args
                    .iter()
                    .map(|&a| self.emit_value(a).as_rvalue())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.line(&format!(
                    "let {var} = ctx.new_call_through_ptr({loc}, {fn_ptr}, &[{args}])?;"
                ));
            }
            ValueKind::AddressOf(v) => {
                let value = self.emit_value(v).as_lvalue();
                self.line(&format!("let {var} = ctx.address_of({loc}, {value})?;"));
            }
            ValueKind::Param(p) => {
                let param = self.emit_param(p);
                self.values.insert(idx, param);
                self.value_kinds.insert(idx, 2);
                return self.binding(idx);
            }
            ValueKind::Local { func, name } => {
                kind_tag = 1;
                let func = self.emit_function(func);
                let ty = self.emit_type(node.ty);
                self.line(&format!(
                    "let {var} = ctx.new_local({func}, {loc}, {ty}, {name:?})?;"
                ));
            }
            ValueKind::Global { kind, name } => {
                kind_tag = 1;
                let ty = self.emit_type(node.ty);
                self.line(&format!(
                    "let {var} = ctx.new_global({loc}, GlobalKind::{kind:?}, {ty}, {name:?})?;"
                ));
            }
            ValueKind::Deref(v) => {
                kind_tag = 1;
                let value = self.emit_value(v).as_rvalue();
                self.line(&format!("let {var} = ctx.dereference({loc}, {value})?;"));
            }
            ValueKind::ArrayAccess { ptr, index } => {
                kind_tag = 1;
                let ptr = self.emit_value(ptr).as_rvalue();
                let index = self.emit_value(index).as_rvalue();
                self.line(&format!(
                    "let {var} = ctx.new_array_access({loc}, {ptr}, {index})?;"
                ));
            }
            ValueKind::AccessField { base, field } => {
                kind_tag = 1;
                let base = self.emit_value(base).as_lvalue();
                let field = self.emit_field(field);
                self.line(&format!(
                    "let {var} = ctx.access_field({loc}, {base}, {field})?;"
                ));
            }
            ValueKind::DerefField { ptr, field } => {
                kind_tag = 1;
                let ptr = self.emit_value(ptr).as_rvalue();
                let field = self.emit_field(field);
                self.line(&format!(
                    "let {var} = ctx.dereference_field({loc}, {ptr}, {field})?;"
                ));
            }
        }
        self.values.insert(idx, var);
        self.value_kinds.insert(idx, kind_tag);
        self.binding(idx)
    }

    fn emit_block_body(
        &mut self,
        block: crate::function::BlockIndex,
        block_names: &HashMap<crate::function::BlockIndex, String>,
    ) {
        let body = self.ctx.blocks[block].clone();
        let var = block_names[&block].clone();
        for statement in &body.statements {
            let loc = self.emit_loc(statement.loc);
            match &statement.kind {
                StatementKind::Comment(text) => {
                    self.line(&format!("ctx.add_comment({var}, {loc}, {text:?})?;"));
                }
                StatementKind::Eval(value) => {
                    let value = self.emit_value(*value).as_rvalue();
                    self.line(&format!("ctx.add_eval({var}, {loc}, {value})?;"));
                }
                StatementKind::Assign { target, value } => {
                    let target = self.emit_value(*target).as_lvalue();
                    let value = self.emit_value(*value).as_rvalue();
                    self.line(&format!(
                        "ctx.add_assignment({var}, {loc}, {target}, {value})?;"
                    ));
                }
                StatementKind::AssignOp { target, op, value } => {
                    let target = self.emit_value(*target).as_lvalue();
                    let value = self.emit_value(*value).as_rvalue();
                    self.line(&format!(
                        "ctx.add_assignment_op({var}, {loc}, {target}, BinaryOp::{op:?}, {value})?;"
                    ));
                }
            }
        }
        if let Some(terminator) = &body.terminator {
            let loc = self.emit_loc(terminator.loc);
            match &terminator.kind {
                TerminatorKind::Jump { target } => {
                    let target = block_names[target].clone();
                    self.line(&format!("ctx.end_with_jump({var}, {loc}, {target})?;"));
                }
                TerminatorKind::Conditional {
                    cond,
                    on_true,
                    on_false,
                } => {
                    let cond = self.emit_value(*cond).as_rvalue();
                    let on_true = block_names[on_true].clone();
                    let on_false = block_names[on_false].clone();
                    self.line(&format!(
                        "ctx.end_with_conditional({var}, {loc}, {cond}, {on_true}, {on_false})?;"
                    ));
                }
                TerminatorKind::Return { value } => {
                    let value = self.emit_value(*value).as_rvalue();
                    self.line(&format!("ctx.end_with_return({var}, {loc}, {value})?;"));
                }
                TerminatorKind::VoidReturn => {
                    self.line(&format!("ctx.end_with_void_return({var}, {loc})?;"));
                }
            }
        }
    }
}
