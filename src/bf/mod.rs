//! A front-end compiler for the Brainfuck stack-machine language.
//!
//! Eight single-byte operations over a tape of byte cells, translated
//! straight into basic blocks and jumps. The interesting part is `[`/`]`:
//! loops nest dynamically, so open loops are matched through a bounded
//! stack of (test, body, after) block triples. The bound is configuration;
//! overflowing it or closing a loop that was never opened aborts
//! translation with a positioned error, because the half-built block graph
//! has no consistent continuation.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::backend::{Backend, OutputKind};
use crate::context::{BoolOption, Context, IntOption};
use crate::error::Error as IrError;
use crate::function::{FunctionKind, GlobalKind};
use crate::object::{Block, Function, Location, Lvalue, Rvalue, Type};
use crate::types::TypeKind;
use crate::value::{BinaryOp, Comparison};

/// Translation settings. The loop-nesting bound is a runtime value, not a
/// compile-time constant.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum depth of open `[` loops.
    pub max_loop_depth: usize,
    /// Number of byte cells on the tape.
    pub tape_cells: u64,
    /// Backend optimization level, 0 through 3.
    pub opt_level: u8,
    /// Emit debug info for the produced artifact.
    pub debug_info: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_loop_depth: 20,
            tape_cells: 30_000,
            opt_level: 3,
            debug_info: true,
        }
    }
}

/// Fatal translation errors, positioned at the byte that triggered them.
#[derive(Debug, Error)]
pub enum BfError {
    #[error("{file}:{line}:{column}: too many open parens")]
    TooManyOpenParens {
        file: String,
        line: u32,
        column: u32,
        limit: usize,
    },

    #[error("{file}:{line}:{column}: mismatching parens")]
    MismatchingParens {
        file: String,
        line: u32,
        column: u32,
    },

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct LoopFrame {
    test: Block,
    #[allow(dead_code)]
    body: Block,
    after: Block,
}

/// Incremental translator: one byte in, zero or more IR statements out.
pub struct Compiler {
    settings: Settings,
    filename: String,
    line: u32,
    column: u32,
    ctx: Context,
    int_type: Type,
    byte_type: Type,
    func_getchar: Function,
    func_putchar: Function,
    func_main: Function,
    cur_block: Block,
    int_zero: Rvalue,
    int_one: Rvalue,
    byte_zero: Rvalue,
    byte_one: Rvalue,
    tape: Lvalue,
    idx: Lvalue,
    frames: Vec<LoopFrame>,
}

impl Compiler {
    /// Builds the program skeleton: imported `getchar`/`putchar`, an
    /// exported `main`, the cell tape and its index.
    pub fn new(filename: &str, settings: Settings) -> Result<Self, BfError> {
        let mut ctx = Context::new();
        ctx.set_int_option(IntOption::OptimizationLevel, settings.opt_level as i64)?;
        ctx.set_bool_option(BoolOption::Debuginfo, settings.debug_info)?;

        let int_type = ctx.get_type(TypeKind::Int)?;
        let byte_type = ctx.get_type(TypeKind::UnsignedChar)?;
        let tape_type = ctx.array_type(None, byte_type, settings.tape_cells)?;

        let func_getchar =
            ctx.new_function(None, FunctionKind::Imported, int_type, "getchar", &[], false)?;
        let param_c = ctx.new_param(None, int_type, "c")?;
        let func_putchar = ctx.new_function(
            None,
            FunctionKind::Imported,
            int_type,
            "putchar",
            &[param_c],
            false,
        )?;

        let char_ptr = ctx.get_type(TypeKind::ConstCharPtr)?;
        let argv_type = ctx.pointer_to(char_ptr)?;
        let param_argc = ctx.new_param(None, int_type, "argc")?;
        let param_argv = ctx.new_param(None, argv_type, "argv")?;
        let func_main = ctx.new_function(
            None,
            FunctionKind::Exported,
            int_type,
            "main",
            &[param_argc, param_argv],
            false,
        )?;

        let cur_block = ctx.new_block(func_main, "entry")?;
        let int_zero = ctx.zero(int_type)?;
        let int_one = ctx.one(int_type)?;
        let byte_zero = ctx.zero(byte_type)?;
        let byte_one = ctx.one(byte_type)?;
        let tape = ctx.new_global(None, GlobalKind::Internal, tape_type, "tape")?;
        let idx = ctx.new_local(func_main, None, int_type, "idx")?;

        ctx.add_comment(cur_block, None, "idx = 0;")?;
        ctx.add_assignment(cur_block, None, idx, int_zero)?;

        Ok(Self {
            settings,
            filename: filename.to_owned(),
            line: 1,
            column: 0,
            ctx,
            int_type,
            byte_type,
            func_getchar,
            func_putchar,
            func_main,
            cur_block,
            int_zero,
            int_one,
            byte_zero,
            byte_one,
            tape,
            idx,
            frames: Vec::new(),
        })
    }

    pub fn main_function(&self) -> Function {
        self.func_main
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn location(&mut self) -> Result<Location, IrError> {
        self.ctx
            .new_location(&self.filename, self.line, self.column)
    }

    /// `tape[idx]`
    fn current_cell(&mut self, loc: Location) -> Result<Lvalue, IrError> {
        self.ctx
            .new_array_access(Some(loc), self.tape.as_rvalue(), self.idx.as_rvalue())
    }

    /// `tape[idx] == 0`
    fn cell_is_zero(&mut self, loc: Location) -> Result<Rvalue, IrError> {
        let cell = self.current_cell(loc)?;
        self.ctx.new_comparison(
            Some(loc),
            Comparison::Eq,
            cell.as_rvalue(),
            self.byte_zero,
        )
    }

    /// Translates one byte of source.
    pub fn feed(&mut self, byte: u8) -> Result<(), BfError> {
        let loc = self.location()?;

        match byte {
            b'>' => {
                self.ctx
                    .add_comment(self.cur_block, Some(loc), "'>': idx += 1;")?;
                self.ctx.add_assignment_op(
                    self.cur_block,
                    Some(loc),
                    self.idx,
                    BinaryOp::Plus,
                    self.int_one,
                )?;
            }
            b'<' => {
                self.ctx
                    .add_comment(self.cur_block, Some(loc), "'<': idx -= 1;")?;
                self.ctx.add_assignment_op(
                    self.cur_block,
                    Some(loc),
                    self.idx,
                    BinaryOp::Minus,
                    self.int_one,
                )?;
            }
            b'+' => {
                self.ctx
                    .add_comment(self.cur_block, Some(loc), "'+': tape[idx] += 1;")?;
                let cell = self.current_cell(loc)?;
                self.ctx.add_assignment_op(
                    self.cur_block,
                    Some(loc),
                    cell,
                    BinaryOp::Plus,
                    self.byte_one,
                )?;
            }
            b'-' => {
                self.ctx
                    .add_comment(self.cur_block, Some(loc), "'-': tape[idx] -= 1;")?;
                let cell = self.current_cell(loc)?;
                self.ctx.add_assignment_op(
                    self.cur_block,
                    Some(loc),
                    cell,
                    BinaryOp::Minus,
                    self.byte_one,
                )?;
            }
            b'.' => {
                let cell = self.current_cell(loc)?;
                let arg = self
                    .ctx
                    .new_cast(Some(loc), cell.as_rvalue(), self.int_type)?;
                let call = self
                    .ctx
                    .new_call(Some(loc), self.func_putchar, &[arg])?;
                self.ctx
                    .add_comment(self.cur_block, Some(loc), "'.': putchar(tape[idx]);")?;
                self.ctx.add_eval(self.cur_block, Some(loc), call)?;
            }
            b',' => {
                let call = self.ctx.new_call(Some(loc), self.func_getchar, &[])?;
                let value = self.ctx.new_cast(Some(loc), call, self.byte_type)?;
                let cell = self.current_cell(loc)?;
                self.ctx
                    .add_comment(self.cur_block, Some(loc), "',': tape[idx] = getchar();")?;
                self.ctx
                    .add_assignment(self.cur_block, Some(loc), cell, value)?;
            }
            b'[' => {
                if self.frames.len() >= self.settings.max_loop_depth {
                    return Err(BfError::TooManyOpenParens {
                        file: self.filename.clone(),
                        line: self.line,
                        column: self.column,
                        limit: self.settings.max_loop_depth,
                    });
                }

                let test = self.ctx.new_block(self.func_main, "loop_test")?;
                let body = self.ctx.new_block(self.func_main, "loop_body")?;
                let after = self.ctx.new_block(self.func_main, "loop_after")?;

                self.ctx.end_with_jump(self.cur_block, Some(loc), test)?;
                self.ctx.add_comment(test, Some(loc), "'[':")?;
                let is_zero = self.cell_is_zero(loc)?;
                self.ctx
                    .end_with_conditional(test, Some(loc), is_zero, after, body)?;

                self.frames.push(LoopFrame { test, body, after });
                self.cur_block = body;
            }
            b']' => {
                self.ctx.add_comment(self.cur_block, Some(loc), "']':")?;
                let Some(frame) = self.frames.pop() else {
                    return Err(BfError::MismatchingParens {
                        file: self.filename.clone(),
                        line: self.line,
                        column: self.column,
                    });
                };
                self.ctx
                    .end_with_jump(self.cur_block, Some(loc), frame.test)?;
                self.cur_block = frame.after;
            }
            b'\n' => {
                self.line += 1;
                self.column = 0;
            }
            _ => {}
        }

        if byte != b'\n' {
            self.column += 1;
        }
        Ok(())
    }

    /// Number of loops currently open.
    pub fn open_loops(&self) -> usize {
        self.frames.len()
    }

    /// Ends the program with `return 0` and hands the finished context
    /// back. An unclosed `[` is not caught here: it leaves its after-block
    /// reachable and unterminated, which compilation rejects.
    pub fn finish(mut self) -> Result<Context, BfError> {
        self.ctx
            .end_with_return(self.cur_block, None, self.int_zero)?;
        Ok(self.ctx)
    }
}

/// Translates a whole source stream into a ready-to-compile context.
pub fn translate(source: &[u8], filename: &str, settings: Settings) -> Result<Context, BfError> {
    let mut compiler = Compiler::new(filename, settings)?;
    for &byte in source {
        compiler.feed(byte)?;
    }
    compiler.finish()
}

/// Reads a source file and compiles it to a native artifact; the
/// conventional output for an executable is `a.out`.
pub fn compile_file(
    backend: &Backend,
    source_path: &Path,
    kind: OutputKind,
    output_path: &Path,
    settings: Settings,
) -> Result<(), BfError> {
    let source = std::fs::read(source_path)?;
    debug!("translating {} ({} bytes)", source_path.display(), source.len());
    let mut ctx = translate(&source, &source_path.to_string_lossy(), settings)?;
    ctx.compile_to_file(backend, kind, output_path)?;
    Ok(())
}
