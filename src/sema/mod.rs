//! Two-pass semantic analyzer (spec.md §4.7): pass 1 collects every
//! top-level symbol into the root scope without looking at bodies;
//! pass 2 walks bodies, creating a scope per function/compound/for-init
//! and performing name resolution, type checking, region escape
//! analysis, alias exclusivity, nullability narrowing, definite
//! initialization, unsafe-boundary enforcement, trait satisfaction, and
//! generics monomorphization. Split into one file per concern the way
//! the teacher splits `codegen/` into per-concern files.

mod collect;
mod expr;
mod generics;
mod region;
mod stmt;

use crate::ast::*;
use crate::consteval::ConstEval;
use crate::diagnostics::DiagEngine;
use crate::types::{EnumShape, StructShape, Type};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Type,
    Region,
    Enum,
}

/// One entry in a `Scope`. Shared via `Rc` so the same symbol can be
/// looked up repeatedly without cloning its state; `initialized` is a
/// `Cell` because definite-initialization analysis flips it in place
/// during an otherwise read-only tree walk.
#[derive(Debug)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub ty: Rc<Type>,
    pub scope_depth: usize,
    pub initialized: Cell<bool>,
    pub is_const: bool,
}

struct Scope {
    depth: usize,
    is_unsafe: bool,
    symbols: HashMap<String, Rc<Symbol>>,
}

impl Scope {
    fn new(depth: usize, is_unsafe: bool) -> Self {
        Scope { depth, is_unsafe, symbols: HashMap::new() }
    }

    fn insert(&mut self, sym: Rc<Symbol>) {
        self.symbols.insert(sym.name.clone(), sym);
    }

    fn get(&self, name: &str) -> Option<Rc<Symbol>> {
        self.symbols.get(name).cloned()
    }
}

/// Signature of a collected function, used for call-site resolution
/// and generic inference. Not the same as `Type::Function`: this also
/// carries the generic parameter list and constraint names.
#[derive(Debug, Clone)]
pub(crate) struct FunctionSig {
    pub params: Vec<Rc<Type>>,
    pub return_type: Rc<Type>,
    pub variadic: bool,
    pub generic_params: Vec<GenericParam>,
}

#[derive(Debug, Clone)]
pub(crate) struct RegionInfo {
    #[allow(dead_code)]
    pub name: String,
}

/// One entry of the alias map (spec.md §3 "Alias map"): a record that
/// `target` (keyed externally by name) is currently borrowed, with
/// what mutability, at what scope depth.
#[derive(Debug, Clone)]
pub(crate) struct AliasRecord {
    pub is_mutable: bool,
    pub depth: usize,
}

pub struct Sema<'a> {
    pub(crate) diags: &'a mut DiagEngine,
    scopes: Vec<Scope>,
    pub(crate) functions: HashMap<String, Rc<FunctionSig>>,
    /// Owned deep copies of every generic function's original body,
    /// stored at collection time so monomorphization can clone+
    /// substitute on demand regardless of call-site/decl order.
    pub(crate) generic_sources: HashMap<String, FunctionDecl>,
    pub(crate) structs: HashMap<String, Rc<StructShape>>,
    pub(crate) enums: HashMap<String, Rc<EnumShape>>,
    pub(crate) regions: HashMap<String, RegionInfo>,
    pub(crate) alias_map: HashMap<String, Vec<AliasRecord>>,
    pub(crate) mono_cache: HashMap<(String, Vec<String>), String>,
    pub(crate) generated: Vec<Decl>,
    /// Stack of per-branch sets of identifiers narrowed non-null by an
    /// enclosing `if (p != null)`/`if (p == null)` guard (spec.md §4.7
    /// "Nullability"; one level of flow-sensitivity, see DESIGN.md).
    pub(crate) narrowed_nonnull: Vec<HashSet<String>>,
    pub(crate) current_return_type: Vec<Rc<Type>>,
    pub(crate) skip_consteval: bool,
}

impl<'a> Sema<'a> {
    pub fn new(diags: &'a mut DiagEngine) -> Self {
        Sema {
            diags,
            scopes: vec![Scope::new(0, false)],
            functions: HashMap::new(),
            generic_sources: HashMap::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            regions: HashMap::new(),
            alias_map: HashMap::new(),
            mono_cache: HashMap::new(),
            generated: Vec::new(),
            narrowed_nonnull: Vec::new(),
            current_return_type: Vec::new(),
            skip_consteval: false,
        }
    }

    /// Skips `static_assert`/`if const` constant evaluation (CLI
    /// `--no-consteval`); `if const` branches are still both checked
    /// rather than chosen between, since picking one is ConstEval's job.
    pub fn with_skip_consteval(mut self, skip: bool) -> Self {
        self.skip_consteval = skip;
        self
    }

    /// Runs both passes over `unit`, appending any monomorphized
    /// function clones pass 2 produced. Returns `false` if any error
    /// was recorded; a single error does not stop traversal (spec.md
    /// §4.7 "Failure semantics").
    pub fn run(&mut self, unit: &mut TranslationUnit) -> bool {
        self.collect_decls(unit);
        for decl in &unit.decls {
            self.check_decl(decl);
        }
        unit.decls.append(&mut self.generated);
        !self.diags.has_errors()
    }

    pub(crate) fn check_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Function(f) => self.check_function_decl(f),
            Decl::GlobalVar(g) => self.check_global_var(g),
            Decl::Struct(_) | Decl::Enum(_) | Decl::Region(_) | Decl::Typedef(_) => {}
            Decl::StaticAssert { cond, message, location } => {
                self.check_static_assert(cond, message.as_deref(), location);
            }
        }
    }

    // --- scope stack -----------------------------------------------------

    pub(crate) fn current_depth(&self) -> usize {
        self.scopes.last().map(|s| s.depth).unwrap_or(0)
    }

    pub(crate) fn push_scope(&mut self, is_unsafe: bool) {
        let depth = self.current_depth() + 1;
        let unsafe_here = is_unsafe || self.in_unsafe();
        self.scopes.push(Scope::new(depth, unsafe_here));
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            self.evict_alias_depth(scope.depth);
        }
    }

    pub(crate) fn in_unsafe(&self) -> bool {
        self.scopes.last().map(|s| s.is_unsafe).unwrap_or(false)
    }

    pub(crate) fn declare(&mut self, sym: Symbol) -> Rc<Symbol> {
        let sym = Rc::new(sym);
        self.scopes.last_mut().expect("scope stack is never empty").insert(sym.clone());
        sym
    }

    pub(crate) fn declare_at_root(&mut self, sym: Symbol) {
        let sym = Rc::new(sym);
        self.scopes[0].insert(sym);
    }

    pub(crate) fn root_has(&self, name: &str) -> bool {
        self.scopes[0].get(name).is_some()
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<Rc<Symbol>> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.get(name) {
                return Some(sym);
            }
        }
        None
    }
}
