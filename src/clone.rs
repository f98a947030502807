//! Deep clone of `Expr`/`Stmt`/`FunctionDecl` trees with type
//! substitution, used for generic monomorphization (spec.md §4.6).
//!
//! Cloning walks every variant and substitutes occurrences of
//! `Type::Generic { name }` with a concrete type drawn from the
//! supplied substitution map. Identifier references lose their
//! resolved-declaration back-pointers: Sema re-resolves the clone in
//! its own fresh scope rather than sharing the original's resolution.

use crate::ast::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use crate::types::Type;

pub type TypeSubst = HashMap<String, Rc<Type>>;

/// Replaces every `Generic { name }` reachable from `ty` with its
/// entry in `subst`, recursing through the composite variants.
/// Non-generic leaves and unmapped generic names pass through
/// unchanged (an unmapped name means the substitution doesn't apply
/// here, e.g. a constraint on an unrelated type parameter).
pub fn substitute_type(ty: &Rc<Type>, subst: &TypeSubst) -> Rc<Type> {
    match ty.as_ref() {
        Type::Generic { name, .. } => subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Pointer { base, is_const } => {
            Rc::new(Type::Pointer { base: substitute_type(base, subst), is_const: *is_const })
        }
        Type::Reference { base, region, arena_name, nullable, mutable } => {
            Rc::new(Type::Reference {
                base: substitute_type(base, subst),
                region: *region,
                arena_name: arena_name.clone(),
                nullable: *nullable,
                mutable: *mutable,
            })
        }
        Type::Array { element, size } => {
            Rc::new(Type::Array { element: substitute_type(element, subst), size: *size })
        }
        Type::Function { ret, params, variadic } => Rc::new(Type::Function {
            ret: substitute_type(ret, subst),
            params: params.iter().map(|p| substitute_type(p, subst)).collect(),
            variadic: *variadic,
        }),
        Type::Tuple(elements) => {
            Rc::new(Type::Tuple(elements.iter().map(|e| substitute_type(e, subst)).collect()))
        }
        Type::Optional(inner) => Rc::new(Type::Optional(substitute_type(inner, subst))),
        Type::Slice(element) => Rc::new(Type::Slice(substitute_type(element, subst))),
        Type::Newtype { name, base } => {
            Rc::new(Type::Newtype { name: name.clone(), base: substitute_type(base, subst) })
        }
        _ => ty.clone(),
    }
}

pub fn clone_expr(expr: &Expr, subst: &TypeSubst) -> Expr {
    let kind = match &expr.kind {
        ExprKind::IntLiteral(v) => ExprKind::IntLiteral(*v),
        ExprKind::FloatLiteral(v) => ExprKind::FloatLiteral(*v),
        ExprKind::BoolLiteral(v) => ExprKind::BoolLiteral(*v),
        ExprKind::StringLiteral(s) => ExprKind::StringLiteral(s.clone()),
        ExprKind::CharLiteral(c) => ExprKind::CharLiteral(*c),
        ExprKind::NullLiteral => ExprKind::NullLiteral,
        ExprKind::Identifier { name, .. } => ExprKind::Identifier {
            name: name.clone(),
            resolved: RefCell::new(None),
            resolved_name: RefCell::new(None),
        },
        ExprKind::Unary { op, operand } => {
            ExprKind::Unary { op: *op, operand: Box::new(clone_expr(operand, subst)) }
        }
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op: *op,
            lhs: Box::new(clone_expr(lhs, subst)),
            rhs: Box::new(clone_expr(rhs, subst)),
        },
        ExprKind::Ternary { cond, then_branch, else_branch } => ExprKind::Ternary {
            cond: Box::new(clone_expr(cond, subst)),
            then_branch: Box::new(clone_expr(then_branch, subst)),
            else_branch: Box::new(clone_expr(else_branch, subst)),
        },
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: Box::new(clone_expr(callee, subst)),
            args: args.iter().map(|a| clone_expr(a, subst)).collect(),
        },
        ExprKind::Subscript { base, index } => ExprKind::Subscript {
            base: Box::new(clone_expr(base, subst)),
            index: Box::new(clone_expr(index, subst)),
        },
        ExprKind::Member { base, field, arrow } => ExprKind::Member {
            base: Box::new(clone_expr(base, subst)),
            field: field.clone(),
            arrow: *arrow,
        },
        ExprKind::Cast { target, operand } => ExprKind::Cast {
            target: substitute_type(target, subst),
            operand: Box::new(clone_expr(operand, subst)),
        },
        ExprKind::Assign { op, lhs, rhs } => ExprKind::Assign {
            op: *op,
            lhs: Box::new(clone_expr(lhs, subst)),
            rhs: Box::new(clone_expr(rhs, subst)),
        },
        ExprKind::AddressOf(inner) => ExprKind::AddressOf(Box::new(clone_expr(inner, subst))),
        ExprKind::Deref(inner) => ExprKind::Deref(Box::new(clone_expr(inner, subst))),
        ExprKind::SizeofType(ty) => ExprKind::SizeofType(substitute_type(ty, subst)),
        ExprKind::SizeofExpr(inner) => ExprKind::SizeofExpr(Box::new(clone_expr(inner, subst))),
        ExprKind::Alignof(ty) => ExprKind::Alignof(substitute_type(ty, subst)),
        ExprKind::Fieldcount(ty) => ExprKind::Fieldcount(substitute_type(ty, subst)),
        ExprKind::CompoundInit(elements) => {
            ExprKind::CompoundInit(elements.iter().map(|e| clone_expr(e, subst)).collect())
        }
        ExprKind::TupleLiteral(elements) => {
            ExprKind::TupleLiteral(elements.iter().map(|e| clone_expr(e, subst)).collect())
        }
        ExprKind::New { region_name, ty } => {
            ExprKind::New { region_name: region_name.clone(), ty: substitute_type(ty, subst) }
        }
        ExprKind::Spawn { function, arg } => ExprKind::Spawn {
            function: Box::new(clone_expr(function, subst)),
            arg: Box::new(clone_expr(arg, subst)),
        },
        ExprKind::Join(inner) => ExprKind::Join(Box::new(clone_expr(inner, subst))),
        ExprKind::Try(inner) => ExprKind::Try(Box::new(clone_expr(inner, subst))),
        ExprKind::TupleIndex { base, index } => {
            ExprKind::TupleIndex { base: Box::new(clone_expr(base, subst)), index: *index }
        }
        ExprKind::SelfValue => ExprKind::SelfValue,
        ExprKind::ArenaReset { region_name } => {
            ExprKind::ArenaReset { region_name: region_name.clone() }
        }
    };
    Expr::new(expr.location.clone(), kind)
}

fn clone_var_decl(decl: &VarDecl, subst: &TypeSubst) -> VarDecl {
    VarDecl {
        name: decl.name.clone(),
        declared_type: substitute_type(&decl.declared_type, subst),
        resolved_type: RefCell::new(None),
        init: decl.init.as_ref().map(|e| clone_expr(e, subst)),
        is_const: decl.is_const,
        is_static: decl.is_static,
        location: decl.location.clone(),
    }
}

fn clone_match_arm(arm: &MatchArm, subst: &TypeSubst) -> MatchArm {
    MatchArm {
        patterns: arm.patterns.clone(),
        body: clone_stmt(&arm.body, subst),
        location: arm.location.clone(),
    }
}

pub fn clone_stmt(stmt: &Stmt, subst: &TypeSubst) -> Stmt {
    match stmt {
        Stmt::Compound { stmts, location } => Stmt::Compound {
            stmts: stmts.iter().map(|s| clone_stmt(s, subst)).collect(),
            location: location.clone(),
        },
        Stmt::Expr { expr, location } => {
            Stmt::Expr { expr: clone_expr(expr, subst), location: location.clone() }
        }
        Stmt::If { cond, then_branch, else_branch, location } => Stmt::If {
            cond: clone_expr(cond, subst),
            then_branch: Box::new(clone_stmt(then_branch, subst)),
            else_branch: else_branch.as_ref().map(|s| Box::new(clone_stmt(s, subst))),
            location: location.clone(),
        },
        Stmt::IfConst { cond, then_branch, else_branch, location } => Stmt::IfConst {
            cond: clone_expr(cond, subst),
            then_branch: Box::new(clone_stmt(then_branch, subst)),
            else_branch: else_branch.as_ref().map(|s| Box::new(clone_stmt(s, subst))),
            location: location.clone(),
        },
        Stmt::While { cond, body, location } => Stmt::While {
            cond: clone_expr(cond, subst),
            body: Box::new(clone_stmt(body, subst)),
            location: location.clone(),
        },
        Stmt::DoWhile { body, cond, location } => Stmt::DoWhile {
            body: Box::new(clone_stmt(body, subst)),
            cond: clone_expr(cond, subst),
            location: location.clone(),
        },
        Stmt::For { init, cond, step, body, location } => Stmt::For {
            init: init.as_ref().map(|s| Box::new(clone_stmt(s, subst))),
            cond: cond.as_ref().map(|e| clone_expr(e, subst)),
            step: step.as_ref().map(|e| clone_expr(e, subst)),
            body: Box::new(clone_stmt(body, subst)),
            location: location.clone(),
        },
        Stmt::Return { value, location } => {
            Stmt::Return { value: value.as_ref().map(|e| clone_expr(e, subst)), location: location.clone() }
        }
        Stmt::Break { label, location } => Stmt::Break { label: label.clone(), location: location.clone() },
        Stmt::Continue { label, location } => {
            Stmt::Continue { label: label.clone(), location: location.clone() }
        }
        Stmt::Goto { label, location } => Stmt::Goto { label: label.clone(), location: location.clone() },
        Stmt::Label { name, stmt, location } => Stmt::Label {
            name: name.clone(),
            stmt: Box::new(clone_stmt(stmt, subst)),
            location: location.clone(),
        },
        Stmt::VarDeclStmt { decl, location } => {
            Stmt::VarDeclStmt { decl: clone_var_decl(decl, subst), location: location.clone() }
        }
        Stmt::Unsafe { body, location } => {
            Stmt::Unsafe { body: Box::new(clone_stmt(body, subst)), location: location.clone() }
        }
        Stmt::StaticAssert { cond, message, location } => Stmt::StaticAssert {
            cond: clone_expr(cond, subst),
            message: message.clone(),
            location: location.clone(),
        },
        Stmt::Defer { body, location } => {
            Stmt::Defer { body: Box::new(clone_stmt(body, subst)), location: location.clone() }
        }
        Stmt::Errdefer { body, location } => {
            Stmt::Errdefer { body: Box::new(clone_stmt(body, subst)), location: location.clone() }
        }
        Stmt::Match { subject, arms, location } => Stmt::Match {
            subject: clone_expr(subject, subst),
            arms: arms.iter().map(|a| clone_match_arm(a, subst)).collect(),
            location: location.clone(),
        },
        Stmt::InlineAsm { text, location } => {
            Stmt::InlineAsm { text: text.clone(), location: location.clone() }
        }
    }
}

/// Clones a function declaration with `subst` applied to every type it
/// carries. Clears `generic_params`: the caller installs a mangled
/// name and treats the result as an ordinary, fully concrete function.
pub fn clone_function_decl(f: &FunctionDecl, subst: &TypeSubst) -> FunctionDecl {
    FunctionDecl {
        name: f.name.clone(),
        mangled_name: RefCell::new(None),
        return_type: substitute_type(&f.return_type, subst),
        params: f
            .params
            .iter()
            .map(|p| Param { name: p.name.clone(), ty: substitute_type(&p.ty, subst) })
            .collect(),
        body: f.body.as_ref().map(|s| clone_stmt(s, subst)),
        generic_params: Vec::new(),
        method_owner: f.method_owner.clone(),
        is_inline: f.is_inline,
        is_extern: f.is_extern,
        is_const: f.is_const,
        is_consteval: f.is_consteval,
        must_use: f.must_use,
        is_variadic: f.is_variadic,
        location: f.location.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sc", 1, 1)
    }

    #[test]
    fn substitute_type_replaces_matching_generic() {
        let mut subst = TypeSubst::new();
        subst.insert("T".to_string(), Type::int32());
        let generic = Rc::new(Type::Generic { name: "T".to_string(), constraint: None });
        assert_eq!(*substitute_type(&generic, &subst), Type::Int(crate::types::IntWidth::W32));
    }

    #[test]
    fn substitute_type_recurses_into_reference_base() {
        let mut subst = TypeSubst::new();
        subst.insert("T".to_string(), Type::int32());
        let generic = Rc::new(Type::Generic { name: "T".to_string(), constraint: None });
        let reference = Type::reference(generic, crate::types::Region::Stack, false, true);
        let substituted = substitute_type(&reference, &subst);
        match substituted.as_ref() {
            Type::Reference { base, .. } => assert_eq!(**base, Type::Int(crate::types::IntWidth::W32)),
            _ => panic!("expected a reference"),
        }
    }

    #[test]
    fn clone_expr_produces_fresh_unresolved_identifier() {
        let subst = TypeSubst::new();
        let original = Expr::new(
            loc(),
            ExprKind::Identifier {
                name: "a".to_string(),
                resolved: RefCell::new(Some(IdentKind::Variable)),
                resolved_name: RefCell::new(None),
            },
        );
        let cloned = clone_expr(&original, &subst);
        if let ExprKind::Identifier { resolved, .. } = &cloned.kind {
            assert!(resolved.borrow().is_none());
        } else {
            panic!("expected identifier");
        }
        assert!(cloned.meta.ty().is_none());
    }

    #[test]
    fn clone_function_decl_clears_generic_params() {
        let f = FunctionDecl {
            name: "add".to_string(),
            mangled_name: RefCell::new(None),
            return_type: Rc::new(Type::Generic { name: "T".to_string(), constraint: None }),
            params: vec![Param {
                name: "a".to_string(),
                ty: Rc::new(Type::Generic { name: "T".to_string(), constraint: None }),
            }],
            body: Some(Stmt::Return { value: None, location: loc() }),
            generic_params: vec![GenericParam { name: "T".to_string(), constraint: Some("Numeric".to_string()) }],
            method_owner: None,
            is_inline: false,
            is_extern: false,
            is_const: false,
            is_consteval: false,
            must_use: false,
            is_variadic: false,
            location: loc(),
        };
        let mut subst = TypeSubst::new();
        subst.insert("T".to_string(), Type::int32());
        let cloned = clone_function_decl(&f, &subst);
        assert!(cloned.generic_params.is_empty());
        assert_eq!(*cloned.return_type, Type::Int(crate::types::IntWidth::W32));
    }
}
