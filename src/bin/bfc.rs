//! Brainfuck-to-native compiler driver.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::bail;
use clap::{Parser, ValueEnum};

use anvil::bf::{self, Settings};
use anvil::{Backend, OutputKind};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile Brainfuck source to native code", long_about = None)]
struct Args {
    /// The input file.
    input: PathBuf,

    /// Where to put the produced artifact.
    #[arg(short, long, default_value = "a.out")]
    output: PathBuf,

    /// Artifact kind to emit.
    #[arg(long, value_enum, default_value = "executable")]
    emit: Emit,

    /// Backend optimization level, 0 through 3.
    #[arg(long, default_value_t = 3)]
    opt_level: u8,

    /// Maximum loop nesting depth.
    #[arg(long, default_value_t = 20)]
    max_loop_depth: usize,

    /// Number of byte cells on the tape.
    #[arg(long, default_value_t = 30_000)]
    tape_cells: u64,

    /// Skip debug info in the produced artifact.
    #[arg(long)]
    no_debug: bool,

    /// Explicit path to the backend library.
    #[arg(long)]
    backend: Option<PathBuf>,

    /// Write a textual dump of the constructed unit to this path.
    #[arg(long)]
    dump_ir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Emit {
    Asm,
    Object,
    Library,
    Executable,
}

impl From<Emit> for OutputKind {
    fn from(emit: Emit) -> Self {
        match emit {
            Emit::Asm => OutputKind::Assembler,
            Emit::Object => OutputKind::ObjectFile,
            Emit::Library => OutputKind::DynamicLibrary,
            Emit::Executable => OutputKind::Executable,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let start_time = Instant::now();

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    if args.opt_level > 3 {
        bail!("--opt-level must be 0 through 3");
    }

    let backend = match &args.backend {
        Some(path) => Backend::load_from(path)?,
        None => Backend::load()?,
    };
    let (major, minor, patch) = backend.version();
    tracing::debug!("backend version {major}.{minor}.{patch}");

    let settings = Settings {
        max_loop_depth: args.max_loop_depth,
        tape_cells: args.tape_cells,
        opt_level: args.opt_level,
        debug_info: !args.no_debug,
    };

    if let Some(dump_path) = &args.dump_ir {
        let source = std::fs::read(&args.input)?;
        let ctx = bf::translate(&source, &args.input.to_string_lossy(), settings.clone())?;
        ctx.dump_to_file(dump_path)?;
    }

    bf::compile_file(
        &backend,
        &args.input,
        args.emit.into(),
        &args.output,
        settings,
    )?;

    tracing::debug!("done in {:?}", start_time.elapsed());
    Ok(())
}
