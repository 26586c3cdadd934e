use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use cd25_compiler::{ir, parse_and_analyse};

#[derive(Parser)]
#[command(name = "cd25")]
#[command(about = "A compiler for the CD25 language")]
struct Args {
    /// Path to the source file to compile
    in_file: PathBuf,

    /// Output filepath (defaults to <stem>.asm or <stem>.mod next to the
    /// working directory)
    #[arg(short = 'o', long = "out")]
    out_file: Option<PathBuf>,

    /// Target architecture
    #[arg(short = 'a', long = "arch", value_enum, default_value_t = Arch::X86)]
    arch: Arch,

    /// Emit debugging line directives in the assembly
    #[arg(short = 'g', long)]
    debug: bool,

    /// Print the TAC to stdout and stop compilation
    #[arg(short = 'T', long)]
    print_tac: bool,

    /// Print the AST to stdout and stop compilation
    #[arg(short = 'A', long)]
    print_ast: bool,

    /// Print readable SM25 opcodes to stdout and stop compilation
    #[arg(short = 'S', long)]
    readable_sm25: bool,

    /// Produce a listing file next to the output path
    #[arg(short = 'l', long)]
    make_listing: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Arch {
    X86,
    Sm25,
}

fn default_output(in_file: &Path, extension: &str) -> PathBuf {
    let mut path = PathBuf::from(in_file.file_stem().unwrap_or_default());
    path.set_extension(extension);
    path
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.debug && matches!(args.arch, Arch::Sm25) {
        bail!("cannot emit debugging metadata for SM25");
    }
    if [args.print_tac, args.print_ast, args.readable_sm25]
        .iter()
        .filter(|&&f| f)
        .count()
        > 1
    {
        bail!("can only stop compilation once");
    }

    let source = fs::read_to_string(&args.in_file)
        .with_context(|| format!("could not open source file '{}'", args.in_file.display()))?;

    let (mut ast, lister) = parse_and_analyse(&source);

    if args.make_listing {
        let listing_path = default_output(&args.in_file, "lst");
        fs::write(&listing_path, lister.listing(&source))
            .with_context(|| format!("could not create listing file '{}'", listing_path.display()))?;
    }
    print!("{}", lister.report());

    if !ast.is_valid {
        bail!("compilation aborted: {} error(s)", lister.error_count());
    }

    if args.print_ast {
        print!("{}", ast.render());
        return Ok(());
    }

    let tac = ir::tac_generator::lower(&mut ast);

    if args.print_tac {
        print!("{}", tac.render());
        return Ok(());
    }
    if args.readable_sm25 {
        print!("{}", cd25_compiler::backend::sm25::emit_listing(&tac));
        return Ok(());
    }

    match args.arch {
        Arch::X86 => {
            let out_path = args
                .out_file
                .unwrap_or_else(|| default_output(&args.in_file, "asm"));
            let source_name = args
                .debug
                .then(|| args.in_file.file_name().unwrap_or_default().to_string_lossy().into_owned());
            let asm = cd25_compiler::backend::x86::emit(&tac, source_name.as_deref());
            fs::write(&out_path, asm)
                .with_context(|| format!("could not write '{}'", out_path.display()))?;
        }
        Arch::Sm25 => {
            let out_path = args
                .out_file
                .unwrap_or_else(|| default_output(&args.in_file, "mod"));
            let module = cd25_compiler::backend::sm25::emit_module(&tac);
            fs::write(&out_path, module)
                .with_context(|| format!("could not write '{}'", out_path.display()))?;
        }
    }
    Ok(())
}
