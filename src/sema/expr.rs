//! Expression type-checking (spec.md §4.7): literals, name resolution,
//! the full operator set, calls, and every SafeC-specific form (region
//! references, `new`/`spawn`/`join`/`try`, tuples, pattern subjects).

use super::*;
use crate::types::{assignment_compatible, IntWidth, Region};
use std::cell::RefCell;

impl<'a> Sema<'a> {
    pub(crate) fn check_expr(&mut self, expr: &Expr) -> Rc<Type> {
        let ty = self.check_expr_kind(expr);
        expr.meta.set_ty(ty.clone());
        expr.meta.is_lvalue.set(Self::is_lvalue_kind(expr));
        ty
    }

    fn is_lvalue_kind(expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Identifier { resolved, .. } => matches!(*resolved.borrow(), Some(IdentKind::Variable)),
            ExprKind::Subscript { .. }
            | ExprKind::Member { .. }
            | ExprKind::Deref(_)
            | ExprKind::TupleIndex { .. }
            | ExprKind::SelfValue => true,
            ExprKind::Unary { op, .. } => {
                matches!(op, UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec)
            }
            _ => false,
        }
    }

    pub(crate) fn is_arithmetic_like(&self, ty: &Type) -> bool {
        ty.is_arithmetic() || matches!(ty, Type::Generic { constraint: Some(c), .. } if c == "Numeric")
    }

    pub(crate) fn require_unsafe(&mut self, loc: &SourceLocation, what: &str) {
        if !self.in_unsafe() {
            self.diags.error(loc.clone(), format!("{what} requires 'unsafe' block"));
        }
    }

    pub(crate) fn check_nullable_operand(&mut self, operand: &Expr, nullable: bool, loc: &SourceLocation) {
        if !nullable {
            return;
        }
        let narrowed = match &operand.kind {
            ExprKind::Identifier { name, .. } => self.is_narrowed_nonnull(name),
            _ => false,
        };
        if !narrowed {
            self.diags.error(loc.clone(), "dereference of nullable reference requires a null check".to_string());
        }
    }

    fn check_expr_kind(&mut self, expr: &Expr) -> Rc<Type> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => {
                if i32::try_from(*v).is_ok() {
                    Type::int32()
                } else {
                    Type::int64()
                }
            }
            ExprKind::FloatLiteral(_) => Type::float64(),
            ExprKind::BoolLiteral(_) => Type::bool_(),
            ExprKind::StringLiteral(_) => Type::reference(Type::char_(), Region::Static, false, false),
            ExprKind::CharLiteral(_) => Type::char_(),
            ExprKind::NullLiteral => Rc::new(Type::Reference {
                base: Type::void(),
                region: Region::Static,
                arena_name: None,
                nullable: true,
                mutable: false,
            }),
            ExprKind::Identifier { name, resolved, resolved_name } => {
                self.check_identifier(expr, name, resolved, resolved_name)
            }
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, &expr.location),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, &expr.location),
            ExprKind::Ternary { cond, then_branch, else_branch } => {
                self.check_expr(cond);
                let t = self.check_expr(then_branch);
                let e = self.check_expr(else_branch);
                if t.is_error() || e.is_error() {
                    Type::error()
                } else if *t == *e {
                    t
                } else {
                    self.diags.error(expr.location.clone(), format!("ternary branches have mismatched types '{t}' and '{e}'"));
                    Type::error()
                }
            }
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args),
            ExprKind::Subscript { base, index } => self.check_subscript(base, index, &expr.location),
            ExprKind::Member { base, field, arrow } => self.check_member(base, field, *arrow, &expr.location),
            ExprKind::Cast { target, operand } => self.check_cast(target, operand, &expr.location),
            ExprKind::Assign { op, lhs, rhs } => self.check_assign(*op, lhs, rhs, &expr.location),
            ExprKind::AddressOf(inner) => self.check_address_of(inner),
            ExprKind::Deref(inner) => self.check_deref(inner, &expr.location),
            ExprKind::SizeofType(_) | ExprKind::Alignof(_) | ExprKind::Fieldcount(_) => {
                Rc::new(Type::UInt(IntWidth::W64))
            }
            ExprKind::SizeofExpr(inner) => {
                self.check_expr(inner);
                Rc::new(Type::UInt(IntWidth::W64))
            }
            ExprKind::CompoundInit(elements) => {
                let tys: Vec<Rc<Type>> = elements.iter().map(|e| self.check_expr(e)).collect();
                Rc::new(Type::Tuple(tys))
            }
            ExprKind::TupleLiteral(elements) => {
                let tys: Vec<Rc<Type>> = elements.iter().map(|e| self.check_expr(e)).collect();
                Rc::new(Type::Tuple(tys))
            }
            ExprKind::New { region_name, ty } => {
                if !self.regions.contains_key(region_name) {
                    self.diags.error(expr.location.clone(), format!("unknown region '{region_name}'"));
                }
                Type::arena_reference(ty.clone(), region_name.clone(), false, true)
            }
            ExprKind::Spawn { function, arg } => self.check_spawn(function, arg, &expr.location),
            ExprKind::Join(inner) => self.check_join(inner, &expr.location),
            ExprKind::Try(inner) => self.check_try(inner, &expr.location),
            ExprKind::TupleIndex { base, index } => self.check_tuple_index(base, *index, &expr.location),
            ExprKind::SelfValue => match self.lookup("self") {
                Some(sym) => sym.ty.clone(),
                None => {
                    self.diags.error(expr.location.clone(), "'self' used outside a method".to_string());
                    Type::error()
                }
            },
            ExprKind::ArenaReset { region_name } => {
                if !self.regions.contains_key(region_name) {
                    self.diags.error(expr.location.clone(), format!("unknown region '{region_name}'"));
                }
                Type::void()
            }
        }
    }

    fn check_identifier(
        &mut self,
        expr: &Expr,
        name: &str,
        resolved: &RefCell<Option<IdentKind>>,
        _resolved_name: &RefCell<Option<String>>,
    ) -> Rc<Type> {
        match self.lookup(name) {
            Some(sym) => match sym.kind {
                SymbolKind::Variable => {
                    if !sym.initialized.get() && !sym.ty.is_aggregate() {
                        self.diags.error(expr.location.clone(), format!("use of possibly uninitialized variable '{name}'"));
                    }
                    *resolved.borrow_mut() = Some(IdentKind::Variable);
                    sym.ty.clone()
                }
                SymbolKind::Function => {
                    *resolved.borrow_mut() = Some(IdentKind::Function);
                    sym.ty.clone()
                }
                SymbolKind::Type | SymbolKind::Region | SymbolKind::Enum => {
                    self.diags.error(expr.location.clone(), format!("'{name}' does not name a value"));
                    Type::error()
                }
            },
            None => {
                self.diags.error(expr.location.clone(), format!("undeclared identifier '{name}'"));
                Type::error()
            }
        }
    }

    fn check_unary(&mut self, op: UnOp, operand: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let ty = self.check_expr(operand);
        match op {
            UnOp::Neg => {
                if !ty.is_error() && !self.is_arithmetic_like(&ty) {
                    self.diags.error(loc.clone(), format!("unary '-' requires an arithmetic operand, found '{ty}'"));
                }
                ty
            }
            UnOp::BitNot => {
                if !ty.is_error() && !ty.is_integer() {
                    self.diags.error(loc.clone(), format!("unary '~' requires an integer operand, found '{ty}'"));
                }
                ty
            }
            UnOp::Not => {
                if !ty.is_error() && !matches!(*ty, Type::Bool) && !ty.is_arithmetic() {
                    self.diags.error(loc.clone(), format!("unary '!' requires a bool or arithmetic operand, found '{ty}'"));
                }
                Type::bool_()
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                if !ty.is_error() && !ty.is_arithmetic() && !(self.in_unsafe() && ty.is_pointer()) {
                    self.diags.error(
                        loc.clone(),
                        format!("increment/decrement requires an arithmetic or (in unsafe scope) pointer operand, found '{ty}'"),
                    );
                }
                ty
            }
        }
    }

    fn check_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let lt = self.check_expr(lhs);
        let rt = self.check_expr(rhs);
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if lt.is_error() || rt.is_error() {
                    return Type::error();
                }
                if matches!(op, BinOp::Add | BinOp::Sub) && (lt.is_pointer() || rt.is_pointer()) {
                    self.require_unsafe(loc, "pointer arithmetic");
                    return if lt.is_pointer() { lt } else { rt };
                }
                if self.is_arithmetic_like(&lt) && self.is_arithmetic_like(&rt) && *lt == *rt {
                    lt
                } else {
                    self.diags.error(loc.clone(), format!("type mismatch in arithmetic expression: '{lt}' vs '{rt}'"));
                    Type::error()
                }
            }
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                if lt.is_error() || rt.is_error() {
                    return Type::error();
                }
                if lt.is_integer() && rt.is_integer() {
                    lt
                } else {
                    self.diags.error(loc.clone(), format!("bitwise operator requires integer operands, found '{lt}' and '{rt}'"));
                    Type::error()
                }
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if lt.is_error() || rt.is_error() {
                    return Type::bool_();
                }
                let ok = *lt == *rt
                    || (self.is_arithmetic_like(&lt) && self.is_arithmetic_like(&rt))
                    || (lt.is_reference() && matches!(rhs.kind, ExprKind::NullLiteral))
                    || (rt.is_reference() && matches!(lhs.kind, ExprKind::NullLiteral));
                if !ok {
                    self.diags.error(loc.clone(), format!("cannot compare '{lt}' and '{rt}'"));
                }
                Type::bool_()
            }
            BinOp::LogAnd | BinOp::LogOr => Type::bool_(),
        }
    }

    fn check_subscript(&mut self, base: &Expr, index: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let base_ty = self.check_expr(base);
        let index_ty = self.check_expr(index);
        if !index_ty.is_error() && !index_ty.is_integer() {
            self.diags.error(loc.clone(), format!("subscript index must be an integer, found '{index_ty}'"));
        }
        match base_ty.as_ref() {
            Type::Array { element, .. } => element.clone(),
            Type::Slice(element) => element.clone(),
            Type::Pointer { base: inner, .. } => {
                self.require_unsafe(loc, "pointer subscript");
                inner.clone()
            }
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("cannot subscript a value of type '{other}'"));
                Type::error()
            }
        }
    }

    fn check_member(&mut self, base: &Expr, field: &str, arrow: bool, loc: &SourceLocation) -> Rc<Type> {
        let base_ty = self.check_expr(base);
        if base_ty.is_error() {
            return Type::error();
        }
        let struct_base: Rc<Type> = if arrow {
            match base_ty.as_ref() {
                Type::Pointer { base: inner, .. } => {
                    self.require_unsafe(loc, "raw pointer member access");
                    inner.clone()
                }
                Type::Reference { base: inner, nullable, .. } => {
                    self.check_nullable_operand(base, *nullable, loc);
                    inner.clone()
                }
                other => {
                    self.diags.error(loc.clone(), format!("'->' requires a pointer or reference operand, found '{other}'"));
                    return Type::error();
                }
            }
        } else {
            match base_ty.as_ref() {
                Type::Reference { base: inner, nullable, .. } => {
                    self.check_nullable_operand(base, *nullable, loc);
                    inner.clone()
                }
                _ => base_ty.clone(),
            }
        };
        self.struct_field_type(&struct_base, field, loc)
    }

    fn struct_field_type(&mut self, base: &Rc<Type>, field: &str, loc: &SourceLocation) -> Rc<Type> {
        match base.as_ref() {
            Type::Struct(shape) => {
                let fields = self.structs.get(&shape.name).map(|s| s.fields.clone()).unwrap_or_else(|| shape.fields.clone());
                match fields.iter().find(|f| f.name == field) {
                    Some(f) => f.ty.clone(),
                    None => {
                        self.diags.error(loc.clone(), format!("struct '{}' has no field '{field}'", shape.name));
                        Type::error()
                    }
                }
            }
            Type::Tuple(_) => {
                self.diags.error(loc.clone(), "use '.N' to access tuple fields, not a name".to_string());
                Type::error()
            }
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("'{other}' has no member fields"));
                Type::error()
            }
        }
    }

    fn check_cast(&mut self, target: &Rc<Type>, operand: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let operand_ty = self.check_expr(operand);
        if matches!(target.as_ref(), Type::Pointer { .. }) && matches!(operand_ty.as_ref(), Type::Reference { .. }) {
            self.require_unsafe(loc, "cast from reference to raw pointer");
        }
        target.clone()
    }

    fn check_assign(&mut self, op: AssignOp, lhs: &Expr, rhs: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);

        if !lhs.meta.is_lvalue.get() {
            self.diags.error(loc.clone(), "left-hand side of assignment is not an lvalue".to_string());
        }

        let lhs_symbol = match &lhs.kind {
            ExprKind::Identifier { name, .. } => self.lookup(name),
            _ => None,
        };
        if let Some(sym) = &lhs_symbol {
            if sym.is_const {
                self.diags.error(loc.clone(), format!("cannot assign to const variable '{}'", sym.name));
            }
        }

        if !lhs_ty.is_error() && !rhs_ty.is_error() {
            if op == AssignOp::Assign {
                let compatible = match &rhs.kind {
                    ExprKind::NullLiteral => lhs_ty.is_nullable_reference(),
                    _ => assignment_compatible(&rhs_ty, &lhs_ty) || self.scalar_region_init_compatible(&lhs_ty, &rhs_ty),
                };
                if !compatible {
                    self.diags.error(loc.clone(), format!("type mismatch in assignment: cannot assign '{rhs_ty}' to '{lhs_ty}'"));
                }
            } else if !self.is_arithmetic_like(&lhs_ty) || !self.is_arithmetic_like(&rhs_ty) || *lhs_ty != *rhs_ty {
                self.diags.error(loc.clone(), format!("type mismatch in compound assignment: '{lhs_ty}' vs '{rhs_ty}'"));
            }
        }

        if let Some(sym) = &lhs_symbol {
            if op == AssignOp::Assign {
                sym.initialized.set(true);
                self.check_store_escape(sym.scope_depth, rhs, &rhs_ty, loc);
                if let Type::Reference { mutable, .. } = lhs_ty.as_ref() {
                    if let Some(target) = Self::borrow_target_name(rhs) {
                        self.record_borrow(target, *mutable, loc);
                    }
                }
            }
        }

        lhs_ty
    }

    fn check_address_of(&mut self, operand: &Expr) -> Rc<Type> {
        let ty = self.check_expr(operand);
        if !operand.meta.is_lvalue.get() {
            self.diags.error(operand.location.clone(), "cannot take the address of a non-lvalue".to_string());
        }
        // Taking the address of a variable that already holds a safe
        // reference reborrows it (spec.md §8 scenario 2: `&stack int y
        // = &x` where `x` itself is `&stack int` stays `&stack int`,
        // it does not wrap in a second reference layer). Only a plain
        // scalar/aggregate lvalue gets freshly wrapped in `&stack T`.
        if matches!(*ty, Type::Reference { .. }) {
            ty
        } else {
            Type::reference(ty, Region::Stack, false, true)
        }
    }

    fn check_deref(&mut self, operand: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let ty = self.check_expr(operand);
        match ty.as_ref() {
            Type::Pointer { base, .. } => {
                self.require_unsafe(loc, "dereference of raw pointer");
                base.clone()
            }
            Type::Reference { base, nullable, .. } => {
                self.check_nullable_operand(operand, *nullable, loc);
                base.clone()
            }
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("cannot dereference a value of type '{other}'"));
                Type::error()
            }
        }
    }

    fn check_spawn(&mut self, function: &Expr, arg: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let fn_ty = self.check_expr(function);
        let arg_ty = self.check_expr(arg);
        match fn_ty.as_ref() {
            Type::Function { ret, params, .. } => {
                if let Some(p) = params.first() {
                    if !assignment_compatible(&arg_ty, p) && !arg_ty.is_error() {
                        self.diags.error(loc.clone(), format!("spawn argument type mismatch: cannot pass '{arg_ty}' as '{p}'"));
                    }
                }
                Rc::new(Type::Newtype { name: "TaskHandle".to_string(), base: ret.clone() })
            }
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("spawn requires a function value, found '{other}'"));
                Type::error()
            }
        }
    }

    fn check_join(&mut self, handle: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let ty = self.check_expr(handle);
        match ty.as_ref() {
            Type::Newtype { name, base } if name == "TaskHandle" => base.clone(),
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("join requires a spawn handle, found '{other}'"));
                Type::error()
            }
        }
    }

    fn check_try(&mut self, operand: &Expr, loc: &SourceLocation) -> Rc<Type> {
        let ty = self.check_expr(operand);
        match ty.as_ref() {
            Type::Optional(inner) => inner.clone(),
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("'try' requires an optional type, found '{other}'"));
                Type::error()
            }
        }
    }

    fn check_tuple_index(&mut self, base: &Expr, index: u32, loc: &SourceLocation) -> Rc<Type> {
        let ty = self.check_expr(base);
        match ty.as_ref() {
            Type::Tuple(elements) => match elements.get(index as usize) {
                Some(t) => t.clone(),
                None => {
                    self.diags.error(loc.clone(), format!("tuple index {index} out of range"));
                    Type::error()
                }
            },
            Type::Error => Type::error(),
            other => {
                self.diags.error(loc.clone(), format!("cannot use '.{index}' on a non-tuple type '{other}'"));
                Type::error()
            }
        }
    }
}
