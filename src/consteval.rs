//! Compile-time evaluator for `static_assert` conditions and `if const`
//! branch selection (spec.md §4.10). Integer-and-bool arithmetic only;
//! `sizeof`/`alignof`/`fieldcount` read the target-independent layout
//! already exposed by `Type::size_of`/`Type::align_of`. Signed
//! arithmetic wraps in 64-bit two's complement; any unsupported node or
//! a division by zero is a fatal constant-expression error.

use crate::ast::{BinOp, Expr, ExprKind, UnOp};
use crate::diagnostics::{DiagEngine, SourceLocation};
use crate::types::Type;

/// Pure interpreter over `Expr`. Owns no state beyond the diagnostic
/// sink it reports failures through; one instance is created per
/// evaluation the way the teacher creates a fresh evaluator per call
/// rather than threading one through the whole pipeline.
pub struct ConstEval<'a> {
    diags: &'a mut DiagEngine,
}

impl<'a> ConstEval<'a> {
    pub fn new(diags: &'a mut DiagEngine) -> Self {
        ConstEval { diags }
    }

    /// Evaluates `expr` as a constant integer expression, or `None` on
    /// failure (a fatal diagnostic has already been recorded).
    pub fn eval_i64(&mut self, expr: &Expr) -> Option<i64> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Some(*v),
            ExprKind::CharLiteral(c) => Some(*c as i64),
            ExprKind::BoolLiteral(b) => Some(i64::from(*b)),
            ExprKind::Unary { op, operand } => {
                let v = self.eval_i64(operand)?;
                Some(match op {
                    UnOp::Neg => v.wrapping_neg(),
                    UnOp::Not => i64::from(v == 0),
                    UnOp::BitNot => !v,
                    _ => return self.unsupported(expr),
                })
            }
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(expr, *op, lhs, rhs),
            ExprKind::Ternary { cond, then_branch, else_branch } => {
                if self.eval_i64(cond)? != 0 {
                    self.eval_i64(then_branch)
                } else {
                    self.eval_i64(else_branch)
                }
            }
            ExprKind::SizeofType(ty) => i64::try_from(ty.size_of()).ok(),
            ExprKind::Alignof(ty) => i64::try_from(ty.align_of()).ok(),
            ExprKind::Fieldcount(ty) => match ty.as_ref() {
                Type::Struct(shape) => i64::try_from(shape.fields.len()).ok(),
                _ => self.unsupported(expr),
            },
            _ => self.unsupported(expr),
        }
    }

    pub fn eval_bool(&mut self, expr: &Expr) -> Option<bool> {
        self.eval_i64(expr).map(|v| v != 0)
    }

    fn eval_binary(&mut self, expr: &Expr, op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<i64> {
        let a = self.eval_i64(lhs)?;
        let b_expr = rhs;
        match op {
            BinOp::LogAnd => return Some(i64::from(a != 0 && self.eval_i64(b_expr)? != 0)),
            BinOp::LogOr => return Some(i64::from(a != 0 || self.eval_i64(b_expr)? != 0)),
            _ => {}
        }
        let b = self.eval_i64(b_expr)?;
        Some(match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => {
                if b == 0 {
                    self.diags.fatal(expr.location.clone(), "division by zero in constant expression");
                    return None;
                }
                a.wrapping_div(b)
            }
            BinOp::Mod => {
                if b == 0 {
                    self.diags.fatal(expr.location.clone(), "division by zero in constant expression");
                    return None;
                }
                a.wrapping_rem(b)
            }
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            BinOp::Shl => a.wrapping_shl(b as u32),
            BinOp::Shr => a.wrapping_shr(b as u32),
            BinOp::Eq => i64::from(a == b),
            BinOp::Ne => i64::from(a != b),
            BinOp::Lt => i64::from(a < b),
            BinOp::Le => i64::from(a <= b),
            BinOp::Gt => i64::from(a > b),
            BinOp::Ge => i64::from(a >= b),
            BinOp::LogAnd | BinOp::LogOr => unreachable!("handled above"),
        })
    }

    fn unsupported(&mut self, expr: &Expr) -> Option<i64> {
        self.fatal_at(&expr.location, "not a constant expression");
        None
    }

    fn fatal_at(&mut self, loc: &SourceLocation, message: &str) {
        self.diags.fatal(loc.clone(), message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagEngine;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sc", 1, 1)
    }

    fn int(v: i64) -> Expr {
        Expr::new(loc(), ExprKind::IntLiteral(v))
    }

    #[test]
    fn evaluates_arithmetic_expression() {
        let mut diags = DiagEngine::new();
        let mut ce = ConstEval::new(&mut diags);
        let expr = Expr::new(
            loc(),
            ExprKind::Binary { op: BinOp::Add, lhs: Box::new(int(1)), rhs: Box::new(int(2)) },
        );
        assert_eq!(ce.eval_i64(&expr), Some(3));
    }

    #[test]
    fn matches_static_assert_boundary_case() {
        // #define X 1 / #if X + 2 > 2
        let mut diags = DiagEngine::new();
        let mut ce = ConstEval::new(&mut diags);
        let cond = Expr::new(
            loc(),
            ExprKind::Binary {
                op: BinOp::Gt,
                lhs: Box::new(Expr::new(
                    loc(),
                    ExprKind::Binary { op: BinOp::Add, lhs: Box::new(int(1)), rhs: Box::new(int(2)) },
                )),
                rhs: Box::new(int(2)),
            },
        );
        assert_eq!(ce.eval_bool(&cond), Some(true));
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let mut diags = DiagEngine::new();
        let mut ce = ConstEval::new(&mut diags);
        let expr = Expr::new(
            loc(),
            ExprKind::Binary { op: BinOp::Div, lhs: Box::new(int(1)), rhs: Box::new(int(0)) },
        );
        assert!(ce.eval_i64(&expr).is_none());
        assert!(diags.has_errors());
    }

    #[test]
    fn sizeof_primitive_matches_layout() {
        let mut diags = DiagEngine::new();
        let mut ce = ConstEval::new(&mut diags);
        let expr = Expr::new(loc(), ExprKind::SizeofType(Type::int64()));
        assert_eq!(ce.eval_i64(&expr), Some(8));
    }

    #[test]
    fn unsupported_node_is_fatal() {
        let mut diags = DiagEngine::new();
        let mut ce = ConstEval::new(&mut diags);
        let expr = Expr::new(loc(), ExprKind::StringLiteral("x".to_string()));
        assert!(ce.eval_i64(&expr).is_none());
        assert!(diags.has_errors());
    }
}
