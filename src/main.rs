//! SafeC front-end CLI.
//!
//! Runs the pipeline described in `lib.rs` and reports results the way
//! spec.md §6/§7 prescribe: every diagnostic printed in the order it
//! was recorded, then a stage/error-count summary on failure.

use clap::Parser as ClapParser;
use safec::codegen::{CodeGenerator, NullCodeGen};
use safec::{ast, CommandLineDefine, CompilerConfig};
use std::io::Write;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "safecc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SafeC front-end: preprocess, lex, parse, and check a .sc source file", long_about = None)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Output path; `-` means stdout
    #[arg(short = 'o', value_name = "PATH")]
    output: Option<String>,

    /// Emit lowered IR text instead of stopping after the front end
    #[arg(long)]
    emit_llvm: bool,

    /// Stop after parsing and print the textual AST
    #[arg(long)]
    dump_ast: bool,

    /// Stop after preprocessing and print the expanded text
    #[arg(long)]
    dump_pp: bool,

    /// Skip semantic analysis
    #[arg(long)]
    no_sema: bool,

    /// Skip the constant-evaluation pass (`static_assert`, `if const`)
    #[arg(long)]
    no_consteval: bool,

    /// Permit function-like macros and `##`/`#` in the preprocessor
    #[arg(long)]
    compat_preprocessor: bool,

    /// Add an include search directory (repeatable)
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Define a command-line macro `NAME` or `NAME=VALUE` (repeatable)
    #[arg(short = 'D', value_name = "NAME[=VAL]")]
    defines: Vec<String>,

    /// Print progress to stderr as each pipeline stage runs
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut defines = Vec::with_capacity(cli.defines.len());
    for raw in &cli.defines {
        match CommandLineDefine::parse(raw) {
            Ok(d) => defines.push(d),
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
    }

    let config = CompilerConfig::new()
        .with_include_dirs(cli.include_dirs.clone())
        .with_compat_preprocessor(cli.compat_preprocessor)
        .with_no_sema(cli.no_sema)
        .with_no_consteval(cli.no_consteval)
        .with_verbose(cli.verbose);
    let config = defines.into_iter().fold(config, |c, d| c.with_define(d));

    if cli.dump_pp {
        verbose(&cli, "preprocess");
        let (text, diags) = safec::preprocess_only(&cli.input, &config);
        print_diagnostics(&diags);
        if diags.has_errors() {
            eprintln!("preprocess: {} error(s)", diags.error_count());
            process::exit(1);
        }
        write_output(cli.output.as_deref(), &text);
        return;
    }

    if cli.dump_ast {
        verbose(&cli, "preprocess");
        verbose(&cli, "lex");
        verbose(&cli, "parse");
        let (diags, unit) = safec::parse_only(&cli.input, &config);
        print_diagnostics(&diags);
        let Some(unit) = unit else {
            eprintln!("parse: {} error(s)", diags.error_count());
            process::exit(1);
        };
        if diags.has_errors() {
            eprintln!("parse: {} error(s)", diags.error_count());
            process::exit(1);
        }
        write_output(cli.output.as_deref(), &ast::dump_translation_unit(&unit));
        return;
    }

    verbose(&cli, "preprocess");
    verbose(&cli, "lex");
    verbose(&cli, "parse");
    if !cli.no_sema {
        verbose(&cli, "sema");
    }
    if !cli.no_consteval {
        verbose(&cli, "consteval");
    }

    let outcome = safec::compile(&cli.input, &config);
    print_diagnostics(&outcome.diags);

    if !outcome.success() {
        eprintln!("{}: {} error(s)", outcome.last_stage, outcome.diags.error_count());
        process::exit(1);
    }

    let unit = outcome.unit.expect("a successful outcome always carries a unit");

    if cli.emit_llvm {
        verbose(&cli, "codegen");
        match NullCodeGen.generate(&unit) {
            Ok(ir) => write_output(cli.output.as_deref(), &ir),
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    write_output(cli.output.as_deref(), &ast::dump_translation_unit(&unit));
}

fn verbose(cli: &Cli, stage: &str) {
    if cli.verbose {
        eprintln!("safecc: {stage} {}", cli.input.display());
    }
}

fn print_diagnostics(diags: &safec::DiagEngine) {
    for record in diags.records() {
        eprintln!("{record}");
    }
}

fn write_output(output: Option<&str>, text: &str) {
    match output {
        None | Some("-") => {
            print!("{text}");
        }
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("error: cannot write '{path}': {e}");
                process::exit(1);
            }
        }
    }
    let _ = std::io::stdout().flush();
}
