use anvil::{
    BinaryOp, Context, Error, FunctionKind, GlobalKind, Terminator, TypeKind,
};

/// A function whose reachable blocks are all terminated.
fn well_formed(ctx: &mut Context) -> anvil::Function {
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let func = ctx
        .new_function(None, FunctionKind::Exported, int, "answer", &[], false)
        .unwrap();
    let entry = ctx.new_block(func, "entry").unwrap();
    let exit = ctx.new_block(func, "exit").unwrap();
    ctx.end_with_jump(entry, None, exit).unwrap();
    let forty_two = ctx.new_rvalue_from_int(int, 42).unwrap();
    ctx.end_with_return(exit, None, forty_two).unwrap();
    func
}

#[test]
fn terminated_graph_validates() {
    let mut ctx = Context::new();
    well_formed(&mut ctx);
    ctx.validate().unwrap();
    assert_eq!(ctx.first_error(), "");
}

#[test]
fn reachable_unterminated_block_fails_validation() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let func = ctx
        .new_function(None, FunctionKind::Exported, int, "broken", &[], false)
        .unwrap();
    let entry = ctx.new_block(func, "entry").unwrap();
    let dangling = ctx.new_block(func, "dangling").unwrap();
    ctx.end_with_jump(entry, None, dangling).unwrap();

    let err = ctx.validate().unwrap_err();
    assert!(
        matches!(&err, Error::UnterminatedBlock { function, block }
            if function == "broken" && block == "dangling"),
        "{err:?}"
    );
    assert!(!ctx.first_error().is_empty());
}

#[test]
fn statements_after_a_terminator_are_rejected() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let func = ctx
        .new_function(None, FunctionKind::Exported, int, "f", &[], false)
        .unwrap();
    let entry = ctx.new_block(func, "entry").unwrap();
    let zero = ctx.zero(int).unwrap();
    ctx.end_with_return(entry, None, zero).unwrap();

    let err = ctx.add_eval(entry, None, zero).unwrap_err();
    assert!(matches!(&err, Error::BlockTerminated { block } if block == "entry"));

    // a second terminator is just as malformed as a trailing statement
    let err = ctx.end_with_return(entry, None, zero).unwrap_err();
    assert!(matches!(err, Error::BlockTerminated { .. }));
}

#[test]
fn unreachable_blocks_require_the_permissive_option() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let func = ctx
        .new_function(None, FunctionKind::Exported, int, "f", &[], false)
        .unwrap();
    let entry = ctx.new_block(func, "entry").unwrap();
    let orphan = ctx.new_block(func, "orphan").unwrap();
    let zero = ctx.zero(int).unwrap();
    ctx.end_with_return(entry, None, zero).unwrap();
    ctx.end_with_return(orphan, None, zero).unwrap();

    let err = ctx.validate().unwrap_err();
    assert!(
        matches!(&err, Error::UnreachableBlocks { function, blocks }
            if function == "f" && blocks.contains("orphan")),
        "{err:?}"
    );

    ctx.set_allow_unreachable_blocks(true).unwrap();
    ctx.validate().unwrap();
}

#[test]
fn empty_function_fails_validation() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    ctx.new_function(None, FunctionKind::Exported, int, "empty", &[], false)
        .unwrap();
    let err = ctx.validate().unwrap_err();
    assert!(matches!(&err, Error::EmptyFunction { function } if function == "empty"));
}

#[test]
fn imported_functions_cannot_grow_a_body() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let puts = ctx
        .new_function(None, FunctionKind::Imported, int, "puts", &[], true)
        .unwrap();
    let err = ctx.new_block(puts, "entry").unwrap_err();
    assert!(matches!(&err, Error::ImportedFunctionBody { function } if function == "puts"));

    let err = ctx.new_local(puts, None, int, "tmp").unwrap_err();
    assert!(matches!(err, Error::ImportedFunctionBody { .. }));
}

#[test]
fn jump_targets_stay_within_the_function() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let first = ctx
        .new_function(None, FunctionKind::Exported, int, "first", &[], false)
        .unwrap();
    let second = ctx
        .new_function(None, FunctionKind::Exported, int, "second", &[], false)
        .unwrap();
    let a = ctx.new_block(first, "entry").unwrap();
    let b = ctx.new_block(second, "entry").unwrap();

    let err = ctx.end_with_jump(a, None, b).unwrap_err();
    assert!(matches!(err, Error::TargetOutsideFunction { .. }));
}

#[test]
fn release_is_exactly_once() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    ctx.release().unwrap();

    // every operation on the released session is a checked error
    assert!(matches!(
        ctx.get_type(TypeKind::Int).unwrap_err(),
        Error::ContextReleased
    ));
    assert!(matches!(ctx.size_of(int).unwrap_err(), Error::ContextReleased));
    assert!(matches!(ctx.release().unwrap_err(), Error::ContextReleased));
}

#[test]
fn handles_are_bound_to_their_context() {
    let mut ctx_a = Context::new();
    let mut ctx_b = Context::new();
    let int_a = ctx_a.get_type(TypeKind::Int).unwrap();

    let err = ctx_b.pointer_to(int_a).unwrap_err();
    assert!(matches!(err, Error::ForeignObject { .. }));
    let err = ctx_b.size_of(int_a).unwrap_err();
    assert!(matches!(err, Error::ForeignObject { .. }));
}

#[test]
fn rvalue_to_lvalue_is_fallible() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let func = ctx
        .new_function(None, FunctionKind::Exported, int, "f", &[], false)
        .unwrap();
    let local = ctx.new_local(func, None, int, "x").unwrap();

    // storage survives the round trip through its readable view
    let read = local.as_rvalue();
    let back = ctx.as_lvalue(read).unwrap();
    assert_eq!(back, local);

    let literal = ctx.new_rvalue_from_int(int, 7).unwrap();
    assert!(matches!(
        ctx.as_lvalue(literal).unwrap_err(),
        Error::NotAddressable
    ));
}

#[test]
fn call_arity_is_checked_at_construction() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let a = ctx.new_param(None, int, "a").unwrap();
    let b = ctx.new_param(None, int, "b").unwrap();
    let add = ctx
        .new_function(None, FunctionKind::Imported, int, "add", &[a, b], false)
        .unwrap();

    let one = ctx.one(int).unwrap();
    let err = ctx.new_call(None, add, &[one]).unwrap_err();
    assert!(
        matches!(&err, Error::ArityMismatch { callee, expected: 2, found: 1 }
            if callee == "add"),
        "{err:?}"
    );

    // a variadic callee accepts any suffix past its fixed parameters
    let format = ctx.new_param(None, int, "format").unwrap();
    let variadic = ctx
        .new_function(None, FunctionKind::Imported, int, "variadic", &[format], true)
        .unwrap();
    ctx.new_call(None, variadic, &[one, one, one]).unwrap();
    let err = ctx.new_call(None, variadic, &[]).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { .. }));
}

#[test]
fn duplicate_function_names_are_rejected() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    ctx.new_function(None, FunctionKind::Exported, int, "twice", &[], false)
        .unwrap();
    let err = ctx
        .new_function(None, FunctionKind::Exported, int, "twice", &[], false)
        .unwrap_err();
    assert!(matches!(&err, Error::DuplicateFunction { name } if name == "twice"));
}

#[test]
fn params_belong_to_one_signature() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let x = ctx.new_param(None, int, "x").unwrap();
    ctx.new_function(None, FunctionKind::Imported, int, "f", &[x], false)
        .unwrap();
    let err = ctx
        .new_function(None, FunctionKind::Imported, int, "g", &[x], false)
        .unwrap_err();
    assert!(
        matches!(&err, Error::ParamReused { param, owner } if param == "x" && owner == "f"),
        "{err:?}"
    );
}

#[test]
fn terminator_introspection_reports_the_graph() {
    let mut ctx = Context::new();
    let func = well_formed(&mut ctx);
    let blocks = ctx.blocks_of(func).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(ctx.entry_block(func).unwrap(), Some(blocks[0]));

    match ctx.terminator_of(blocks[0]).unwrap() {
        Some(Terminator::Jump { target }) => assert_eq!(target, blocks[1]),
        other => panic!("unexpected terminator {other:?}"),
    }
    assert!(matches!(
        ctx.terminator_of(blocks[1]).unwrap(),
        Some(Terminator::Return { .. })
    ));
}

#[test]
fn assignment_ops_render_in_debug_strings() {
    let mut ctx = Context::new();
    let int = ctx.get_type(TypeKind::Int).unwrap();
    let byte = ctx.get_type(TypeKind::UnsignedChar).unwrap();
    let tape_type = ctx.array_type(None, byte, 16).unwrap();
    let func = ctx
        .new_function(None, FunctionKind::Exported, int, "main", &[], false)
        .unwrap();
    let tape = ctx
        .new_global(None, GlobalKind::Internal, tape_type, "tape")
        .unwrap();
    let idx = ctx.new_local(func, None, int, "idx").unwrap();
    let cell = ctx
        .new_array_access(None, tape.as_rvalue(), idx.as_rvalue())
        .unwrap();

    assert_eq!(ctx.debug_string(cell).unwrap(), "tape[idx]");

    let one = ctx.one(byte).unwrap();
    let sum = ctx
        .new_binary_op(None, BinaryOp::Plus, byte, cell.as_rvalue(), one)
        .unwrap();
    assert_eq!(ctx.debug_string(sum).unwrap(), "(tape[idx] + (unsigned char)1)");
}

#[test]
fn dump_writes_the_whole_unit() {
    let mut ctx = Context::new();
    well_formed(&mut ctx);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unit.ir");
    ctx.dump_to_file(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("function exported answer"), "{text}");
    assert!(text.contains("goto exit;"), "{text}");
    assert!(text.contains("return (int)42;"), "{text}");
}

#[test]
fn reproducer_replays_the_builder_calls() {
    let mut ctx = Context::new();
    well_formed(&mut ctx);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repro.rs");
    ctx.dump_reproducer_to_file(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("Context::new()"), "{text}");
    assert!(text.contains("ctx.new_function("), "{text}");
    assert!(text.contains("ctx.end_with_jump("), "{text}");
    assert!(text.contains("ctx.compile(&backend)?"), "{text}");
}

#[test]
fn invalid_option_values_are_rejected_before_the_backend() {
    let mut ctx = Context::new();
    let err = ctx
        .set_int_option(anvil::IntOption::OptimizationLevel, 7)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOptionValue { .. }));
    ctx.set_int_option(anvil::IntOption::OptimizationLevel, 2)
        .unwrap();
}
