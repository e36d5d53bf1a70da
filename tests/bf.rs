use anvil::bf::{self, BfError, Settings};
use anvil::{Error, Terminator};

fn translate(source: &str) -> Result<anvil::Context, BfError> {
    bf::translate(source.as_bytes(), "test.bf", Settings::default())
}

/// `+[>+<-]` opens exactly one loop: the entry block jumps to the loop test,
/// the test branches to after (cell zero) or body (cell non-zero), and the
/// body jumps back to the test.
#[test]
fn single_loop_control_flow() {
    let mut compiler = bf::Compiler::new("test.bf", Settings::default()).unwrap();
    for byte in "+[>+<-]".bytes() {
        compiler.feed(byte).unwrap();
    }
    assert_eq!(compiler.open_loops(), 0);
    let main = compiler.main_function();
    let ctx = compiler.finish().unwrap();

    let blocks = ctx.blocks_of(main).unwrap();
    assert_eq!(blocks.len(), 4, "entry plus one test/body/after triple");
    let (entry, test, body, after) = (blocks[0], blocks[1], blocks[2], blocks[3]);
    assert_eq!(ctx.block_name(test).unwrap(), "loop_test");
    assert_eq!(ctx.block_name(body).unwrap(), "loop_body");
    assert_eq!(ctx.block_name(after).unwrap(), "loop_after");

    match ctx.terminator_of(entry).unwrap() {
        Some(Terminator::Jump { target }) => assert_eq!(target, test),
        other => panic!("unexpected entry terminator {other:?}"),
    }
    match ctx.terminator_of(test).unwrap() {
        Some(Terminator::Conditional {
            on_true, on_false, ..
        }) => {
            assert_eq!(on_true, after, "zero cell leaves the loop");
            assert_eq!(on_false, body, "non-zero cell enters the body");
        }
        other => panic!("unexpected test terminator {other:?}"),
    }
    match ctx.terminator_of(body).unwrap() {
        Some(Terminator::Jump { target }) => assert_eq!(target, test),
        other => panic!("unexpected body terminator {other:?}"),
    }
    assert!(matches!(
        ctx.terminator_of(after).unwrap(),
        Some(Terminator::Return { .. })
    ));
}

#[test]
fn translated_units_validate() {
    let mut ctx = translate("+[>+<-]>.").unwrap();
    ctx.validate().unwrap();
}

#[test]
fn nesting_depth_is_bounded_by_configuration() {
    let settings = Settings {
        max_loop_depth: 2,
        ..Settings::default()
    };
    let err = bf::translate(b"[[[", "deep.bf", settings).unwrap_err();
    match err {
        BfError::TooManyOpenParens {
            file,
            line,
            column,
            limit,
        } => {
            assert_eq!(file, "deep.bf");
            assert_eq!(line, 1);
            assert_eq!(column, 2);
            assert_eq!(limit, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn default_nesting_bound_is_twenty() {
    let twenty = "[".repeat(20);
    bf::translate(twenty.as_bytes(), "ok.bf", Settings::default()).unwrap();

    let too_deep = "[".repeat(21);
    let err = bf::translate(too_deep.as_bytes(), "deep.bf", Settings::default()).unwrap_err();
    assert!(err.to_string().contains("too many open parens"), "{err}");
}

#[test]
fn unmatched_close_is_fatal() {
    let err = translate("]").unwrap_err();
    match err {
        BfError::MismatchingParens { file, line, column } => {
            assert_eq!(file, "test.bf");
            assert_eq!(line, 1);
            assert_eq!(column, 0);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn positions_track_lines_and_columns() {
    let err = translate("\n\n]").unwrap_err();
    match err {
        BfError::MismatchingParens { line, column, .. } => {
            assert_eq!(line, 3);
            assert_eq!(column, 0);
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = translate("++\n+]").unwrap_err();
    match err {
        BfError::MismatchingParens { line, column, .. } => {
            assert_eq!(line, 2);
            assert_eq!(column, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn error_messages_keep_the_diagnostic_wording() {
    let err = translate("]").unwrap_err();
    assert_eq!(err.to_string(), "test.bf:1:0: mismatching parens");

    let settings = Settings {
        max_loop_depth: 1,
        ..Settings::default()
    };
    let err = bf::translate(b"[[", "x.bf", settings).unwrap_err();
    assert_eq!(err.to_string(), "x.bf:1:1: too many open parens");
}

/// An unclosed `[` is deferred: translation succeeds but the loop's
/// after-block is reachable and unterminated, so validation rejects it.
#[test]
fn unclosed_loop_surfaces_at_validation() {
    let mut ctx = translate("[").unwrap();
    let err = ctx.validate().unwrap_err();
    assert!(
        matches!(&err, Error::UnterminatedBlock { block, .. } if block == "loop_after"),
        "{err:?}"
    );
    assert!(!ctx.first_error().is_empty());
}

#[test]
fn unknown_bytes_are_ignored() {
    let mut compiler = bf::Compiler::new("noise.bf", Settings::default()).unwrap();
    for byte in "hello world".bytes() {
        compiler.feed(byte).unwrap();
    }
    let main = compiler.main_function();
    let ctx = compiler.finish().unwrap();
    assert_eq!(ctx.blocks_of(main).unwrap().len(), 1);
}

#[test]
fn io_ops_stay_in_the_current_block() {
    let mut compiler = bf::Compiler::new("io.bf", Settings::default()).unwrap();
    for byte in "+.,-<>".bytes() {
        compiler.feed(byte).unwrap();
    }
    assert_eq!(compiler.open_loops(), 0);
    let main = compiler.main_function();
    let ctx = compiler.finish().unwrap();
    assert_eq!(ctx.blocks_of(main).unwrap().len(), 1);
}
