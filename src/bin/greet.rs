//! In-memory JIT demo: build a `greet` function that formats through
//! `printf`, compile it, resolve the pointer and call it.

use std::ffi::CString;
use std::os::raw::c_char;

use anvil::{Backend, BoolOption, Context, FunctionKind, TypeKind};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let backend = Backend::load()?;
    let mut ctx = Context::new();
    ctx.set_bool_option(BoolOption::Debuginfo, false)?;

    let void_type = ctx.get_type(TypeKind::Void)?;
    let int_type = ctx.get_type(TypeKind::Int)?;
    let char_ptr = ctx.get_type(TypeKind::ConstCharPtr)?;

    let param_name = ctx.new_param(None, char_ptr, "name")?;
    let greet = ctx.new_function(
        None,
        FunctionKind::Exported,
        void_type,
        "greet",
        &[param_name],
        false,
    )?;

    let param_format = ctx.new_param(None, char_ptr, "format")?;
    let printf = ctx.new_function(
        None,
        FunctionKind::Imported,
        int_type,
        "printf",
        &[param_format],
        true,
    )?;

    let block = ctx.new_block(greet, "entry")?;
    let format = ctx.new_string_literal("Hello %s from anvil!\n")?;
    let call = ctx.new_call(None, printf, &[format, param_name.as_rvalue()])?;
    ctx.add_eval(block, None, call)?;
    ctx.end_with_void_return(block, None)?;

    let unit = ctx.compile(&backend)?;
    let code = unit.code("greet")?;
    let greet_fn: unsafe extern "C" fn(*const c_char) =
        unsafe { std::mem::transmute(code.as_ptr()) };

    let name = CString::new("world")?;
    unsafe { greet_fn(name.as_ptr()) };

    ctx.release()?;
    Ok(())
}
