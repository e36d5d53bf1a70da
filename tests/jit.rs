//! End-to-end tests against the real native backend. Every test skips
//! (successfully) when the backend library is not installed on the host.

use std::os::raw::{c_char, c_int};

use anvil::bf::{self, Settings};
use anvil::{
    Backend, BinaryOp, BoolOption, Context, Error, FunctionKind, OutputKind, TypeKind,
};

fn load_backend() -> Option<Backend> {
    match Backend::load() {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("skipping: native backend unavailable ({err})");
            None
        }
    }
}

fn build_add(ctx: &mut Context) {
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let a = ctx.new_param(None, int, "a").unwrap();
    let b = ctx.new_param(None, int, "b").unwrap();
    let add = ctx
        .new_function(None, FunctionKind::Exported, int, "add", &[a, b], false)
        .unwrap();
    let entry = ctx.new_block(add, "entry").unwrap();
    let sum = ctx
        .new_binary_op(None, BinaryOp::Plus, int, a.as_rvalue(), b.as_rvalue())
        .unwrap();
    ctx.end_with_return(entry, None, sum).unwrap();
}

#[test]
fn compile_and_call_in_memory() {
    let Some(backend) = load_backend() else { return };

    let mut ctx = Context::new();
    ctx.set_bool_option(BoolOption::Debuginfo, false).unwrap();
    build_add(&mut ctx);

    let unit = ctx.compile(&backend).unwrap();
    let code = unit.code("add").unwrap();
    let add: unsafe extern "C" fn(c_int, c_int) -> c_int =
        unsafe { std::mem::transmute(code.as_ptr()) };
    assert_eq!(unsafe { add(2, 3) }, 5);
    assert_eq!(unsafe { add(-7, 7) }, 0);

    assert!(matches!(
        unit.code("missing").unwrap_err(),
        Error::SymbolNotFound { .. }
    ));
}

#[test]
fn compilation_is_one_shot() {
    let Some(backend) = load_backend() else { return };

    let mut ctx = Context::new();
    build_add(&mut ctx);
    let unit = ctx.compile(&backend).unwrap();
    drop(unit);

    assert!(matches!(
        ctx.compile(&backend).unwrap_err(),
        Error::AlreadyCompiled
    ));
    // queries still answer after the one-shot transition, mutation is rejected
    assert_eq!(ctx.first_error(), "");
    let err = ctx.get_type(TypeKind::Int).unwrap_err();
    assert!(matches!(err, Error::AlreadyCompiled));
}

#[test]
fn emit_object_file() {
    let Some(backend) = load_backend() else { return };

    let mut ctx = Context::new();
    build_add(&mut ctx);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("add.o");
    ctx.compile_to_file(&backend, OutputKind::ObjectFile, &path)
        .unwrap();
    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
}

#[test]
fn greet_through_a_resolved_pointer() {
    let Some(backend) = load_backend() else { return };

    let mut ctx = Context::new();
    let void = ctx.get_type(TypeKind::Void).unwrap();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let char_ptr = ctx.get_type(TypeKind::ConstCharPtr).unwrap();

    let name = ctx.new_param(None, char_ptr, "name").unwrap();
    let greet = ctx
        .new_function(None, FunctionKind::Exported, void, "greet", &[name], false)
        .unwrap();
    let format = ctx.new_param(None, char_ptr, "format").unwrap();
    let printf = ctx
        .new_function(None, FunctionKind::Imported, int, "printf", &[format], true)
        .unwrap();

    let block = ctx.new_block(greet, "entry").unwrap();
    let hello = ctx.new_string_literal("Hello %s from anvil!\n").unwrap();
    let call = ctx
        .new_call(None, printf, &[hello, name.as_rvalue()])
        .unwrap();
    ctx.add_eval(block, None, call).unwrap();
    ctx.end_with_void_return(block, None).unwrap();

    let unit = ctx.compile(&backend).unwrap();
    let code = unit.code("greet").unwrap();
    let greet: unsafe extern "C" fn(*const c_char) =
        unsafe { std::mem::transmute(code.as_ptr()) };
    let world = std::ffi::CString::new("world").unwrap();
    unsafe { greet(world.as_ptr()) };
}

#[test]
fn translated_brainfuck_runs() {
    let Some(backend) = load_backend() else { return };

    // sets the cell to 2, loops it down to zero, then returns 0 from main
    let mut ctx = bf::translate(b"++[-]", "run.bf", Settings::default()).unwrap();
    let unit = ctx.compile(&backend).unwrap();
    let code = unit.code("main").unwrap();
    let main: unsafe extern "C" fn(c_int, *mut *const c_char) -> c_int =
        unsafe { std::mem::transmute(code.as_ptr()) };
    assert_eq!(unsafe { main(0, std::ptr::null_mut()) }, 0);
}

#[test]
fn backend_reports_a_version() {
    let Some(backend) = load_backend() else { return };
    let (major, _, _) = backend.version();
    assert!(major > 0);
}
