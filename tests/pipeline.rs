//! End-to-end pipeline tests for the seven boundary scenarios in
//! spec.md §8, plus a couple of the quantified invariants that are
//! easiest to exercise from outside the crate.

use safec::ast::Decl;
use safec::{compile, CompilerConfig};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn messages(diags: &safec::DiagEngine) -> Vec<String> {
    diags.records().iter().map(|r| r.message.clone()).collect()
}

#[test]
fn scenario_1_trivial_main_compiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(&dir, "t.sc", "int main() { return 0; }\n");
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
    let unit = outcome.unit.unwrap();
    assert_eq!(unit.decls.len(), 1);
    match &unit.decls[0] {
        Decl::Function(f) => assert_eq!(f.name, "main"),
        other => panic!("expected a function decl, found {other:?}"),
    }
}

#[test]
fn scenario_2_stack_reference_to_stack_reference_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { &stack int x = 0; &stack int y = &x; return 0; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
}

#[test]
fn scenario_3_returning_stack_reference_escapes() {
    let dir = tempfile::tempdir().unwrap();
    let src = "&stack int leak() { int x = 0; return &x; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(!outcome.success());
    assert!(messages(&outcome.diags).iter().any(|m| m.contains("stack reference escape")));
}

#[test]
fn scenario_4_deref_of_nullable_without_check_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { ?&stack int p = null; return *p; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(!outcome.success());
    assert!(messages(&outcome.diags).iter().any(|m| m.contains("dereference of nullable reference")));
}

#[test]
fn scenario_4b_deref_of_nullable_after_null_check_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { ?&stack int p = null; if (p != null) { return *p; } return 0; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
}

#[test]
fn scenario_5_generic_add_monomorphizes_once() {
    let dir = tempfile::tempdir().unwrap();
    let src = "generic<T: Numeric> T add(T a, T b) { return a + b; }\nint main() { return add(1, 2); }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
    let unit = outcome.unit.unwrap();
    let clones: Vec<&str> = unit
        .decls
        .iter()
        .filter_map(|d| match d {
            Decl::Function(f) if f.name.starts_with("add_") => Some(f.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(clones, vec!["add_int32"], "expected exactly one monomorphic clone, found {clones:?}");
}

#[test]
fn scenario_5b_repeated_calls_reuse_the_same_clone() {
    let dir = tempfile::tempdir().unwrap();
    let src = "generic<T: Numeric> T add(T a, T b) { return a + b; }\n\
               int main() { int x = add(1, 2); int y = add(3, 4); return x + y; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
    let unit = outcome.unit.unwrap();
    let clone_count =
        unit.decls.iter().filter(|d| matches!(d, Decl::Function(f) if f.name == "add_int32")).count();
    assert_eq!(clone_count, 1, "calling with the same inferred type arguments twice must add one clone, not two");
}

#[test]
fn scenario_6_preprocessor_conditional_picks_one_branch() {
    let dir = tempfile::tempdir().unwrap();
    let src = "#define X 1\n#if X + 2 > 2\nint picked() { return 1; }\n#else\nint picked() { return 0; }\n#endif\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
    let unit = outcome.unit.unwrap();
    assert_eq!(unit.decls.len(), 1, "exactly one branch of the #if/#else must survive preprocessing");
}

#[test]
fn scenario_7_uninitialized_raw_pointer_deref_outside_unsafe() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { int *p; *p = 1; return 0; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(!outcome.success());
    let msgs = messages(&outcome.diags);
    assert!(msgs.iter().any(|m| m.contains("uninitialized") && m.contains("'p'")), "{msgs:?}");
    assert!(msgs.iter().any(|m| m.contains("requires 'unsafe' block")), "{msgs:?}");
}

#[test]
fn raw_pointer_deref_inside_unsafe_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { int x = 0; unsafe { int *p = (int*)&x; *p = 1; } return 0; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(outcome.success(), "{:?}", messages(&outcome.diags));
}

#[test]
fn duplicate_mutable_alias_in_same_scope_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { int x = 0; &stack int a = &x; &stack int b = &x; return 0; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(!outcome.success());
    assert!(messages(&outcome.diags).iter().any(|m| m.contains("already referenced")));
}

#[test]
fn preprocessor_idempotence_modulo_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let src = "#define X 1\n#if X\nint kept() { return 1; }\n#endif\n";
    let path = write_source(&dir, "t.sc", src);
    let config = CompilerConfig::default();
    let (first, diags1) = safec::preprocess_only(&path, &config);
    assert!(!diags1.has_errors());

    let path2 = write_source(&dir, "t2.sc", &first);
    let (second, diags2) = safec::preprocess_only(&path2, &config);
    assert!(!diags2.has_errors());
    assert_eq!(first.split_whitespace().collect::<Vec<_>>(), second.split_whitespace().collect::<Vec<_>>());
}

#[test]
fn missing_include_degrades_to_a_diagnostic_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let src = "#include \"does_not_exist.sch\"\nint main() { return 0; }\n";
    let path = write_source(&dir, "t.sc", src);
    let outcome = compile(&path, &CompilerConfig::default());
    assert!(!outcome.success());
    assert!(messages(&outcome.diags).iter().any(|m| m.to_lowercase().contains("include")));
}

#[test]
fn no_sema_flag_skips_semantic_errors_but_still_parses() {
    let dir = tempfile::tempdir().unwrap();
    let src = "int main() { return undeclared_thing; }\n";
    let path = write_source(&dir, "t.sc", src);
    let config = CompilerConfig::new().with_no_sema(true);
    let outcome = compile(&path, &config);
    assert!(outcome.success());
    assert!(outcome.unit.is_some());
}
