//! Statement checking and the function/global-declaration drivers that
//! set up scopes before delegating into expression checking (spec.md
//! §4.7). Each compound/for-init/function body gets its own scope so
//! definite-initialization, aliasing, and region-depth tracking reset
//! correctly on exit.

use super::*;
use crate::types::{assignment_compatible, Region};

impl<'a> Sema<'a> {
    pub(crate) fn check_function_decl(&mut self, f: &FunctionDecl) {
        let Some(body) = &f.body else { return };
        self.push_scope(false);
        self.current_return_type.push(f.return_type.clone());
        for p in &f.params {
            self.declare(Symbol {
                kind: SymbolKind::Variable,
                name: p.name.clone(),
                ty: p.ty.clone(),
                scope_depth: self.current_depth(),
                initialized: Cell::new(true),
                is_const: false,
            });
        }
        if let Some(owner) = &f.method_owner {
            if let Some(shape) = self.structs.get(owner).cloned() {
                let self_ty = Type::reference(Rc::new(Type::Struct(shape)), Region::Stack, false, !f.is_const);
                self.declare(Symbol {
                    kind: SymbolKind::Variable,
                    name: "self".to_string(),
                    ty: self_ty,
                    scope_depth: self.current_depth(),
                    initialized: Cell::new(true),
                    is_const: f.is_const,
                });
            }
        }
        self.check_stmt(body);
        self.current_return_type.pop();
        self.pop_scope();
    }

    pub(crate) fn check_global_var(&mut self, g: &GlobalVarDecl) {
        let Some(init) = &g.init else { return };
        let init_ty = self.check_expr(init);
        let compatible = match &init.kind {
            ExprKind::NullLiteral => g.ty.is_nullable_reference(),
            _ => assignment_compatible(&init_ty, &g.ty) || self.scalar_region_init_compatible(&g.ty, &init_ty),
        };
        if !compatible && !init_ty.is_error() {
            self.diags.error(g.location.clone(), format!("type mismatch in initialization of global '{}'", g.name));
        }
        // Anything stored in a global lives for the whole program, so
        // any &stack value reaching here necessarily escapes.
        self.check_store_escape(0, init, &init_ty, &g.location);
    }

    pub(crate) fn check_static_assert(&mut self, cond: &Expr, message: Option<&str>, loc: &SourceLocation) {
        if self.skip_consteval {
            return;
        }
        let mut ce = ConstEval::new(self.diags);
        match ce.eval_bool(cond) {
            Some(true) => {}
            Some(false) => {
                let suffix = message.map(|m| format!(": {m}")).unwrap_or_default();
                self.diags.error(loc.clone(), format!("static assertion failed{suffix}"));
            }
            None => {} // ConstEval already recorded a fatal diagnostic
        }
    }

    pub(crate) fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Compound { stmts, .. } => {
                self.push_scope(false);
                for s in stmts {
                    self.check_stmt(s);
                }
                self.pop_scope();
            }
            Stmt::Expr { expr, .. } => {
                self.check_expr(expr);
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.check_expr(cond);
                let narrow = Self::null_check_narrowing(cond);

                let mut then_set = HashSet::new();
                if let Some((name, non_null_in_then)) = &narrow {
                    if *non_null_in_then {
                        then_set.insert(name.clone());
                    }
                }
                self.push_narrowed(then_set);
                self.check_stmt(then_branch);
                self.pop_narrowed();

                if let Some(else_b) = else_branch {
                    let mut else_set = HashSet::new();
                    if let Some((name, non_null_in_then)) = &narrow {
                        if !*non_null_in_then {
                            else_set.insert(name.clone());
                        }
                    }
                    self.push_narrowed(else_set);
                    self.check_stmt(else_b);
                    self.pop_narrowed();
                }
            }
            Stmt::IfConst { cond, then_branch, else_branch, .. } => {
                if self.skip_consteval {
                    self.check_stmt(then_branch);
                    if let Some(e) = else_branch {
                        self.check_stmt(e);
                    }
                    return;
                }
                let taken = {
                    let mut ce = ConstEval::new(self.diags);
                    ce.eval_bool(cond)
                };
                match taken {
                    Some(true) => self.check_stmt(then_branch),
                    Some(false) => {
                        if let Some(e) = else_branch {
                            self.check_stmt(e);
                        }
                    }
                    None => {}
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_expr(cond);
                self.check_stmt(body);
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.check_stmt(body);
                self.check_expr(cond);
            }
            Stmt::For { init, cond, step, body, .. } => {
                self.push_scope(false);
                if let Some(i) = init {
                    self.check_stmt(i);
                }
                if let Some(c) = cond {
                    self.check_expr(c);
                }
                if let Some(s) = step {
                    self.check_expr(s);
                }
                self.check_stmt(body);
                self.pop_scope();
            }
            Stmt::Return { value, location } => {
                let expected = self.current_return_type.last().cloned();
                if let Some(v) = value {
                    let ty = self.check_expr(v);
                    self.check_return_escape(&ty, location);
                    if let Some(expected) = expected {
                        let compatible = match &v.kind {
                            ExprKind::NullLiteral => expected.is_nullable_reference(),
                            _ => assignment_compatible(&ty, &expected) || self.scalar_region_init_compatible(&expected, &ty),
                        };
                        if !compatible && !ty.is_error() {
                            self.diags.error(location.clone(), format!("type mismatch in return: cannot return '{ty}' as '{expected}'"));
                        }
                    }
                }
            }
            Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Goto { .. } => {}
            Stmt::Label { stmt: inner, .. } => self.check_stmt(inner),
            Stmt::VarDeclStmt { decl, .. } => self.check_var_decl(decl),
            Stmt::Unsafe { body, .. } => {
                self.push_scope(true);
                self.check_stmt(body);
                self.pop_scope();
            }
            Stmt::StaticAssert { cond, message, location } => {
                self.check_static_assert(cond, message.as_deref(), location);
            }
            Stmt::Defer { body, .. } | Stmt::Errdefer { body, .. } => self.check_stmt(body),
            Stmt::Match { subject, arms, .. } => self.check_match(subject, arms),
            Stmt::InlineAsm { .. } => {}
        }
    }

    pub(crate) fn check_var_decl(&mut self, decl: &VarDecl) {
        let declared = decl.declared_type.clone();
        if let Some(init) = &decl.init {
            let init_ty = self.check_expr(init);
            let compatible = match &init.kind {
                ExprKind::NullLiteral => declared.is_nullable_reference(),
                _ => assignment_compatible(&init_ty, &declared) || self.scalar_region_init_compatible(&declared, &init_ty),
            };
            if !compatible && !init_ty.is_error() {
                self.diags.error(
                    decl.location.clone(),
                    format!("type mismatch in initialization of '{}': cannot assign '{init_ty}' to '{declared}'", decl.name),
                );
            }
            self.check_store_escape(self.current_depth(), init, &init_ty, &decl.location);
            if let Type::Reference { mutable, .. } = declared.as_ref() {
                if let Some(target) = Self::borrow_target_name(init) {
                    self.record_borrow(target, *mutable, &decl.location);
                }
            }
        }
        *decl.resolved_type.borrow_mut() = Some(declared.clone());
        let initialized = decl.init.is_some() || declared.is_aggregate();
        self.declare(Symbol {
            kind: SymbolKind::Variable,
            name: decl.name.clone(),
            ty: declared,
            scope_depth: self.current_depth(),
            initialized: Cell::new(initialized),
            is_const: decl.is_const,
        });
    }

    fn check_match(&mut self, subject: &Expr, arms: &[MatchArm]) {
        self.check_expr(subject);
        for arm in arms {
            self.push_scope(false);
            for pat in &arm.patterns {
                if let Pattern::Variant { binding: Some(bind_name), .. } = pat {
                    self.declare(Symbol {
                        kind: SymbolKind::Variable,
                        name: bind_name.clone(),
                        ty: Type::error(),
                        scope_depth: self.current_depth(),
                        initialized: Cell::new(true),
                        is_const: false,
                    });
                }
            }
            self.check_stmt(&arm.body);
            self.pop_scope();
        }
    }
}
