//! Contract for the code-generation external collaborator. IR lowering
//! and target code generation are out of scope; this module only
//! describes the shape a real back end must accept.

use crate::ast::TranslationUnit;
use crate::types::Type;

/// What a back end receives from the front end: the annotated
/// translation unit, where every value-producing expression carries a
/// non-null `type`, plus the guarantee that
/// `Reference`/`Pointer`/`Optional`/`Slice`/`Tuple`/`Enum`/tagged-union
/// lowering is the back end's responsibility, not the front end's.
pub trait CodeGenerator {
    /// Lowers one translation unit, returning textual IR (e.g. for
    /// `--emit-llvm`) or an error describing why lowering failed.
    fn generate(&self, unit: &TranslationUnit) -> Result<String, String>;
}

/// Test double / default used when no real back end is wired in: it
/// always reports that code generation is unavailable, so the rest of
/// the pipeline (preprocess/lex/parse/sema/consteval) can be exercised
/// and the CLI's `--emit-llvm` path has something to call.
pub struct NullCodeGen;

impl CodeGenerator for NullCodeGen {
    fn generate(&self, _unit: &TranslationUnit) -> Result<String, String> {
        Err("no code generator configured; this build covers only the front end".to_string())
    }
}

/// Describes how the back end is expected to lower each composite
/// `Type` variant. Exposed so a real implementation (or a test) can
/// assert the front end has prepared what the contract promises,
/// without the front end itself performing any lowering.
pub fn lowering_hint(ty: &Type) -> &'static str {
    match ty {
        Type::Reference { .. } | Type::Pointer { .. } => "machine pointer",
        Type::Optional(_) => "{ value, present_bit }",
        Type::Slice(_) => "{ pointer, length }",
        Type::Tuple(_) => "struct with positional fields",
        Type::Enum(_) => "declared underlying width",
        Type::Struct(shape) if shape.is_tagged_union => "{ tag, union-of-payloads }",
        _ => "unchanged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_codegen_reports_unavailable() {
        let unit = TranslationUnit::new("f.sc");
        let result = NullCodeGen.generate(&unit);
        assert!(result.is_err());
    }

    #[test]
    fn lowering_hint_covers_references_and_pointers() {
        let r = Type::reference(Type::int32(), crate::types::Region::Stack, false, true);
        assert_eq!(lowering_hint(&r), "machine pointer");
    }
}
