//! SafeC front-end: preprocessor, lexer, parser, and semantic analyzer
//! for a region-qualified C superset.
//!
//! `compile` wires the full pipeline together and is the crate's
//! primary entry point for embedding tools; `main.rs` is a thin CLI
//! built on top of it.

pub mod ast;
pub mod clone;
pub mod codegen;
pub mod config;
pub mod consteval;
pub mod diagnostics;
pub mod header_importer;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod sema;
pub mod tokens;
pub mod types;

pub use ast::TranslationUnit;
pub use config::{CommandLineDefine, CompilerConfig};
pub use diagnostics::{DiagEngine, Diagnostic};

use diagnostics::SourceLocation;
use header_importer::{HeaderImporter, NoHeaderImporter};
use lexer::Lexer;
use parser::Parser;
use preprocessor::{Preprocessor, PreprocessorConfig};
use sema::Sema;
use std::fs;
use std::path::Path;

/// What each pipeline stage left behind, for a caller that wants to
/// stop early (`--dump-pp`, `--dump-ast`) without re-running the whole
/// thing.
pub struct CompileOutcome {
    pub diags: DiagEngine,
    pub preprocessed: Option<String>,
    pub unit: Option<TranslationUnit>,
    /// Name of the last stage the pipeline entered, for the CLI's
    /// failure summary line (spec.md §7 "prints the stage name").
    pub last_stage: &'static str,
}

impl CompileOutcome {
    pub fn success(&self) -> bool {
        !self.diags.has_errors()
    }
}

/// Runs the pipeline `Preprocessor -> Lexer -> Parser -> Sema -> ConstEval`
/// over `path`, stopping at the first stage that reports an error
/// (spec.md §7 "Cross-stage escalation"). The returned diagnostics
/// carry every record accumulated before the abort, regardless of
/// success.
pub fn compile(path: &Path, config: &CompilerConfig) -> CompileOutcome {
    compile_with_importer(path, config, &NoHeaderImporter)
}

pub fn compile_with_importer(
    path: &Path,
    config: &CompilerConfig,
    importer: &dyn HeaderImporter,
) -> CompileOutcome {
    let mut diags = DiagEngine::new();
    let file_name = path.display().to_string();

    if !path.is_file() {
        diags.error(
            SourceLocation::new(file_name, 0, 0),
            format!("cannot read '{}': no such file", path.display()),
        );
        return CompileOutcome { diags, preprocessed: None, unit: None, last_stage: "preprocess" };
    }

    let pp_config = PreprocessorConfig {
        include_dirs: config.include_dirs.clone(),
        defines: config.define_pairs(),
        compat: config.compat_preprocessor,
        ..PreprocessorConfig::default()
    };
    let preprocessed = {
        let mut pp = Preprocessor::new(&pp_config, Some(importer));
        pp.process_file(path, &mut diags)
    };
    if diags.has_errors() {
        return CompileOutcome { diags, preprocessed: Some(preprocessed), unit: None, last_stage: "preprocess" };
    }

    let tokens = {
        let lexer = Lexer::new(&preprocessed, file_name.clone(), &mut diags);
        lexer.tokenize()
    };
    if diags.has_errors() {
        return CompileOutcome { diags, preprocessed: Some(preprocessed), unit: None, last_stage: "lex" };
    }

    let mut unit = {
        let parser = Parser::new(tokens, &mut diags);
        parser.parse(file_name)
    };
    if diags.has_errors() {
        return CompileOutcome { diags, preprocessed: Some(preprocessed), unit: Some(unit), last_stage: "parse" };
    }

    if !config.no_sema {
        let mut sema = Sema::new(&mut diags).with_skip_consteval(config.no_consteval);
        sema.run(&mut unit);
        if diags.has_errors() {
            return CompileOutcome { diags, preprocessed: Some(preprocessed), unit: Some(unit), last_stage: "sema" };
        }
    }

    CompileOutcome { diags, preprocessed: Some(preprocessed), unit: Some(unit), last_stage: "consteval" }
}

/// Runs only the preprocessor, for `--dump-pp`.
pub fn preprocess_only(path: &Path, config: &CompilerConfig) -> (String, DiagEngine) {
    let mut diags = DiagEngine::new();
    let pp_config = PreprocessorConfig {
        include_dirs: config.include_dirs.clone(),
        defines: config.define_pairs(),
        compat: config.compat_preprocessor,
        ..PreprocessorConfig::default()
    };
    let importer = NoHeaderImporter;
    let mut pp = Preprocessor::new(&pp_config, Some(&importer));
    let text = pp.process_file(path, &mut diags);
    (text, diags)
}

/// Runs `Preprocessor -> Lexer -> Parser` only, stopping before Sema,
/// for `--dump-ast` (spec.md §6, §4.9: the lint driver's AST dump is
/// taken "after parsing but before Sema" — no resolved types, no
/// appended monomorphization clones).
pub fn parse_only(path: &Path, config: &CompilerConfig) -> (DiagEngine, Option<TranslationUnit>) {
    let mut diags = DiagEngine::new();
    let file_name = path.display().to_string();

    if !path.is_file() {
        diags.error(
            SourceLocation::new(file_name, 0, 0),
            format!("cannot read '{}': no such file", path.display()),
        );
        return (diags, None);
    }

    let pp_config = PreprocessorConfig {
        include_dirs: config.include_dirs.clone(),
        defines: config.define_pairs(),
        compat: config.compat_preprocessor,
        ..PreprocessorConfig::default()
    };
    let importer = NoHeaderImporter;
    let preprocessed = {
        let mut pp = Preprocessor::new(&pp_config, Some(&importer));
        pp.process_file(path, &mut diags)
    };
    if diags.has_errors() {
        return (diags, None);
    }

    let tokens = {
        let lexer = Lexer::new(&preprocessed, file_name.clone(), &mut diags);
        lexer.tokenize()
    };
    if diags.has_errors() {
        return (diags, None);
    }

    let unit = {
        let parser = Parser::new(tokens, &mut diags);
        parser.parse(file_name)
    };
    (diags, Some(unit))
}

/// Reads `path` eagerly so pipeline errors before the preprocessor
/// (missing file) are reported through the same `DiagEngine` channel
/// as everything else, rather than as a bare `io::Error`.
pub fn read_source(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn compiles_a_trivial_function() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "t.sc", "int main() { return 0; }\n");
        let outcome = compile(&path, &CompilerConfig::default());
        assert!(outcome.success(), "{:?}", outcome.diags.records());
        assert!(outcome.unit.is_some());
    }

    #[test]
    fn missing_file_reports_through_diagnostics_not_a_panic() {
        let outcome = compile(Path::new("/does/not/exist.sc"), &CompilerConfig::default());
        assert!(!outcome.success());
        assert!(outcome.unit.is_none());
    }

    #[test]
    fn sema_errors_still_return_the_parsed_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "t.sc", "int main() { return undeclared_thing; }\n");
        let outcome = compile(&path, &CompilerConfig::default());
        assert!(!outcome.success());
        assert!(outcome.unit.is_some());
    }

    #[test]
    fn no_sema_skips_name_resolution_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "t.sc", "int main() { return undeclared_thing; }\n");
        let config = CompilerConfig::new().with_no_sema(true);
        let outcome = compile(&path, &config);
        assert!(outcome.success());
    }

    #[test]
    fn parse_only_does_not_run_sema() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "t.sc", "int main() { return undeclared_thing; }\n");
        let (diags, unit) = parse_only(&path, &CompilerConfig::default());
        assert!(!diags.has_errors(), "{:?}", diags.records());
        assert!(unit.is_some());
    }

    #[test]
    fn parse_only_does_not_append_monomorphization_clones() {
        let dir = tempfile::tempdir().unwrap();
        let src = "generic<T: Numeric> T add(T a, T b) { return a + b; }\nint main() { return add(1, 2); }\n";
        let path = write_temp(&dir, "t.sc", src);
        let (diags, unit) = parse_only(&path, &CompilerConfig::default());
        assert!(!diags.has_errors(), "{:?}", diags.records());
        assert_eq!(unit.unwrap().decls.len(), 2, "parse-only has no generic clones to append");
    }
}
