//! Pass 1: register every top-level symbol (structs, enums, regions,
//! functions, methods, globals) into the root scope before any body is
//! checked, so forward references within one translation unit resolve
//! regardless of declaration order.

use super::*;
use crate::clone::{clone_function_decl, TypeSubst};
use crate::types::FieldDecl;

impl<'a> Sema<'a> {
    pub(crate) fn collect_decls(&mut self, unit: &TranslationUnit) {
        for decl in &unit.decls {
            self.collect_decl(decl);
        }
    }

    fn collect_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Struct(s) => self.collect_struct(s),
            Decl::Enum(e) => self.collect_enum(e),
            Decl::Region(r) => self.collect_region(r),
            // A typedef's target type is already embedded at every use
            // site by the parser; nothing further to register.
            Decl::Typedef(_) => {}
            Decl::Function(f) => self.collect_function(f),
            Decl::GlobalVar(g) => self.collect_global_var(g),
            Decl::StaticAssert { .. } => {}
        }
    }

    fn collect_struct(&mut self, s: &StructDecl) {
        if self.structs.contains_key(&s.name) {
            self.diags.error(s.location.clone(), format!("duplicate declaration of struct '{}'", s.name));
            return;
        }
        let fields: Vec<FieldDecl> =
            s.fields.iter().map(|(name, ty)| FieldDecl { name: name.clone(), ty: ty.clone() }).collect();
        let max_payload_size = fields.iter().map(|f| f.ty.size_of()).max().unwrap_or(0);
        let shape = Rc::new(StructShape {
            name: s.name.clone(),
            fields,
            is_union: s.is_union,
            is_packed: s.is_packed,
            is_tagged_union: s.is_tagged_union,
            max_payload_size,
            defined: true,
        });
        self.structs.insert(s.name.clone(), shape.clone());
        self.declare_at_root(Symbol {
            kind: SymbolKind::Type,
            name: s.name.clone(),
            ty: Rc::new(Type::Struct(shape)),
            scope_depth: 0,
            initialized: Cell::new(true),
            is_const: true,
        });
    }

    fn collect_enum(&mut self, e: &EnumDecl) {
        if self.enums.contains_key(&e.name) {
            self.diags.error(e.location.clone(), format!("duplicate declaration of enum '{}'", e.name));
            return;
        }
        let mut next = 0i64;
        let mut enumerators = Vec::with_capacity(e.enumerators.len());
        for (name, value) in &e.enumerators {
            let v = value.unwrap_or(next);
            enumerators.push((name.clone(), v));
            next = v + 1;
        }
        let shape = Rc::new(EnumShape { name: e.name.clone(), enumerators, bit_width: 32, signed: true });
        self.enums.insert(e.name.clone(), shape.clone());
        self.declare_at_root(Symbol {
            kind: SymbolKind::Enum,
            name: e.name.clone(),
            ty: Rc::new(Type::Enum(shape)),
            scope_depth: 0,
            initialized: Cell::new(true),
            is_const: true,
        });
    }

    fn collect_region(&mut self, r: &RegionDecl) {
        if self.regions.contains_key(&r.name) {
            self.diags.error(r.location.clone(), format!("duplicate declaration of region '{}'", r.name));
            return;
        }
        self.regions.insert(r.name.clone(), RegionInfo { name: r.name.clone() });
        self.declare_at_root(Symbol {
            kind: SymbolKind::Region,
            name: r.name.clone(),
            ty: Type::void(),
            scope_depth: 0,
            initialized: Cell::new(true),
            is_const: true,
        });
    }

    fn collect_function(&mut self, f: &FunctionDecl) {
        let key = match &f.method_owner {
            Some(owner) => format!("{owner}::{}", f.name),
            None => f.name.clone(),
        };
        if self.functions.contains_key(&key) {
            self.diags.error(f.location.clone(), format!("duplicate declaration of function '{key}'"));
            return;
        }
        let sig = Rc::new(FunctionSig {
            params: f.params.iter().map(|p| p.ty.clone()).collect(),
            return_type: f.return_type.clone(),
            variadic: f.is_variadic,
            generic_params: f.generic_params.clone(),
        });
        self.functions.insert(key, sig);

        if !f.generic_params.is_empty() {
            // Own a deep copy of the body now: the clone source must
            // survive independent of where `f` itself lives, and must
            // be available however call sites and the declaration are
            // ordered relative to each other.
            let source = clone_function_decl(f, &TypeSubst::new());
            self.generic_sources.insert(f.name.clone(), source);
        }

        if f.method_owner.is_none() {
            let fn_ty = Rc::new(Type::Function {
                ret: f.return_type.clone(),
                params: f.params.iter().map(|p| p.ty.clone()).collect(),
                variadic: f.is_variadic,
            });
            self.declare_at_root(Symbol {
                kind: SymbolKind::Function,
                name: f.name.clone(),
                ty: fn_ty,
                scope_depth: 0,
                initialized: Cell::new(true),
                is_const: true,
            });
        }
    }

    fn collect_global_var(&mut self, g: &GlobalVarDecl) {
        if self.root_has(&g.name) {
            self.diags.error(g.location.clone(), format!("duplicate declaration of '{}'", g.name));
            return;
        }
        self.declare_at_root(Symbol {
            kind: SymbolKind::Variable,
            name: g.name.clone(),
            ty: g.ty.clone(),
            scope_depth: 0,
            initialized: Cell::new(g.init.is_some()),
            is_const: g.is_const,
        });
    }
}
