//! Trait satisfaction and generics monomorphization (spec.md §4.6,
//! §4.7 "Generics"). Generic functions are never checked against an
//! abstract type parameter directly: each call site infers concrete
//! type arguments by structural unification, and a mangled clone of
//! the body is checked as an ordinary function — cached so repeated
//! calls with the same type arguments reuse one clone.

use super::*;
use crate::clone::{clone_function_decl, substitute_type, TypeSubst};
use crate::types::assignment_compatible;
use std::cell::RefCell;

impl<'a> Sema<'a> {
    pub(crate) fn check_call(&mut self, call_expr: &Expr, callee: &Expr, args: &[Expr]) -> Rc<Type> {
        if let ExprKind::Identifier { name, resolved, resolved_name } = &callee.kind {
            if let Some(sig) = self.functions.get(name).cloned() {
                if !sig.generic_params.is_empty() {
                    return self.check_generic_call(call_expr, name, &sig, resolved, resolved_name, args);
                }
            }
        }
        let callee_ty = self.check_expr(callee);
        self.check_ordinary_call(call_expr, &callee_ty, args)
    }

    fn check_ordinary_call(&mut self, call_expr: &Expr, callee_ty: &Rc<Type>, args: &[Expr]) -> Rc<Type> {
        match callee_ty.as_ref() {
            Type::Function { ret, params, variadic } => {
                self.check_call_args(params, *variadic, args, &call_expr.location);
                ret.clone()
            }
            Type::Error => {
                for a in args {
                    self.check_expr(a);
                }
                Type::error()
            }
            other => {
                self.diags.error(call_expr.location.clone(), format!("called value of type '{other}' is not a function"));
                for a in args {
                    self.check_expr(a);
                }
                Type::error()
            }
        }
    }

    pub(crate) fn check_call_args(
        &mut self,
        params: &[Rc<Type>],
        variadic: bool,
        args: &[Expr],
        loc: &SourceLocation,
    ) -> Vec<Rc<Type>> {
        if args.len() < params.len() || (!variadic && args.len() > params.len()) {
            self.diags.error(loc.clone(), format!("expected {} argument(s), found {}", params.len(), args.len()));
        }
        let mut tys = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let ty = self.check_expr(arg);
            if let Some(param_ty) = params.get(i) {
                let compatible = match &arg.kind {
                    ExprKind::NullLiteral => param_ty.is_nullable_reference(),
                    _ => assignment_compatible(&ty, param_ty),
                };
                if !compatible && !ty.is_error() && !param_ty.is_error() {
                    self.diags.error(
                        arg.location.clone(),
                        format!("argument {} type mismatch: cannot pass '{ty}' as '{param_ty}'", i + 1),
                    );
                }
            }
            tys.push(ty);
        }
        tys
    }

    fn check_generic_call(
        &mut self,
        call_expr: &Expr,
        name: &str,
        sig: &FunctionSig,
        resolved: &RefCell<Option<IdentKind>>,
        resolved_name: &RefCell<Option<String>>,
        args: &[Expr],
    ) -> Rc<Type> {
        let arg_tys: Vec<Rc<Type>> = args.iter().map(|a| self.check_expr(a)).collect();
        let Some(subst) = infer_type_args(&sig.params, &arg_tys) else {
            self.diags.error(call_expr.location.clone(), format!("cannot infer generic type arguments for '{name}'"));
            return Type::error();
        };
        for gp in &sig.generic_params {
            let Some(concrete) = subst.get(&gp.name) else { continue };
            if let Some(constraint) = &gp.constraint {
                if !self.satisfies_constraint(concrete, constraint) {
                    self.diags.error(
                        call_expr.location.clone(),
                        format!(
                            "type '{concrete}' does not satisfy constraint '{constraint}' for generic parameter '{}'",
                            gp.name
                        ),
                    );
                }
            }
        }
        let mangled = self.instantiate_generic(name, sig, &subst);
        *resolved.borrow_mut() = Some(IdentKind::Function);
        *resolved_name.borrow_mut() = Some(mangled);
        substitute_type(&sig.return_type, &subst)
    }

    /// Returns the mangled name of the concrete clone for this
    /// `(name, type arguments)` pair, cloning and checking it the first
    /// time this combination is requested.
    fn instantiate_generic(&mut self, name: &str, sig: &FunctionSig, subst: &TypeSubst) -> String {
        let key_parts: Vec<String> =
            sig.generic_params.iter().map(|gp| subst.get(&gp.name).map(|t| t.to_string()).unwrap_or_default()).collect();
        let cache_key = (name.to_string(), key_parts.clone());
        if let Some(mangled) = self.mono_cache.get(&cache_key) {
            return mangled.clone();
        }
        let mangled = format!("{name}_{}", key_parts.join("_"));
        self.mono_cache.insert(cache_key, mangled.clone());
        if let Some(source) = self.generic_sources.get(name).cloned() {
            let mut clone = clone_function_decl(&source, subst);
            clone.name = mangled.clone();
            *clone.mangled_name.borrow_mut() = Some(mangled.clone());
            self.check_function_decl(&clone);
            self.generated.push(Decl::Function(clone));
        }
        mangled
    }

    pub(crate) fn satisfies_constraint(&self, ty: &Type, constraint: &str) -> bool {
        match constraint {
            "Numeric" => ty.is_arithmetic(),
            "Ordered" => ty.is_arithmetic() || self.struct_has_operator(ty, "operator<"),
            // Unknown/unmodeled constraints are accepted rather than
            // rejected: a closed list here would make every future
            // trait name a hard error instead of a silent pass-through.
            _ => true,
        }
    }

    fn struct_has_operator(&self, ty: &Type, op_name: &str) -> bool {
        match ty {
            Type::Struct(shape) => self.functions.contains_key(&format!("{}::{op_name}", shape.name)),
            _ => false,
        }
    }
}

pub(crate) fn infer_type_args(params: &[Rc<Type>], args: &[Rc<Type>]) -> Option<TypeSubst> {
    if params.len() != args.len() {
        return None;
    }
    let mut subst = TypeSubst::new();
    for (p, a) in params.iter().zip(args) {
        if !match_type(p, a, &mut subst) {
            return None;
        }
    }
    Some(subst)
}

fn match_type(generic: &Rc<Type>, concrete: &Rc<Type>, subst: &mut TypeSubst) -> bool {
    match (generic.as_ref(), concrete.as_ref()) {
        (Type::Generic { name, .. }, _) => match subst.get(name) {
            Some(existing) => **existing == **concrete,
            None => {
                subst.insert(name.clone(), concrete.clone());
                true
            }
        },
        (Type::Pointer { base: b1, .. }, Type::Pointer { base: b2, .. }) => match_type(b1, b2, subst),
        (
            Type::Reference { base: b1, region: r1, nullable: n1, .. },
            Type::Reference { base: b2, region: r2, nullable: n2, .. },
        ) => r1 == r2 && n1 == n2 && match_type(b1, b2, subst),
        (Type::Array { element: e1, .. }, Type::Array { element: e2, .. }) => match_type(e1, e2, subst),
        (Type::Tuple(a), Type::Tuple(b)) if a.len() == b.len() => {
            a.iter().zip(b).all(|(x, y)| match_type(x, y, subst))
        }
        (Type::Optional(a), Type::Optional(b)) => match_type(a, b, subst),
        (Type::Slice(a), Type::Slice(b)) => match_type(a, b, subst),
        (
            Type::Function { ret: r1, params: p1, variadic: v1 },
            Type::Function { ret: r2, params: p2, variadic: v2 },
        ) => v1 == v2 && p1.len() == p2.len() && match_type(r1, r2, subst) && p1.iter().zip(p2).all(|(x, y)| match_type(x, y, subst)),
        _ => generic == concrete,
    }
}
