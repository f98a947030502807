//! Region escape analysis, mutable-alias exclusivity, and nullability
//! flow narrowing (spec.md §4.7 "Region checks", "Alias map",
//! "Nullability").

use super::*;
use crate::types::Region;

impl<'a> Sema<'a> {
    // --- alias exclusivity ----------------------------------------------

    /// Records that `target` is now borrowed at the current scope
    /// depth, reporting a conflict if an existing borrow at the same
    /// or an enclosing depth would be violated by `is_mutable`.
    pub(crate) fn record_borrow(&mut self, target: &str, is_mutable: bool, loc: &SourceLocation) {
        let depth = self.current_depth();
        let conflict = self
            .alias_map
            .get(target)
            .map(|recs| recs.iter().any(|r| r.depth <= depth && (r.is_mutable || is_mutable)))
            .unwrap_or(false);
        if conflict {
            self.diags.error(
                loc.clone(),
                format!("cannot borrow '{target}' here: already referenced in an enclosing scope"),
            );
        }
        self.alias_map.entry(target.to_string()).or_default().push(AliasRecord { is_mutable, depth });
    }

    pub(crate) fn evict_alias_depth(&mut self, depth: usize) {
        for recs in self.alias_map.values_mut() {
            recs.retain(|r| r.depth != depth);
        }
    }

    /// Best-effort identification of the variable a reference-valued
    /// expression borrows from, for escape and alias tracking. Anything
    /// beyond a bare identifier or a direct `&name` borrows nothing
    /// nameable as far as this analysis is concerned.
    pub(crate) fn borrow_target_name(expr: &Expr) -> Option<&str> {
        match &expr.kind {
            ExprKind::Identifier { name, .. } => Some(name),
            ExprKind::AddressOf(inner) => Self::borrow_target_name(inner),
            _ => None,
        }
    }

    // --- stack reference escape ------------------------------------------

    fn is_stack_reference(ty: &Type) -> bool {
        matches!(ty, Type::Reference { region: Region::Stack, .. })
    }

    /// The scope depth at which a stack-region reference value was
    /// formed. Falls back to the current depth for an expression with
    /// no nameable origin, which conservatively treats the value as
    /// freshly formed right here (nothing to escape from).
    pub(crate) fn stack_origin_depth(&self, expr: &Expr) -> usize {
        match Self::borrow_target_name(expr) {
            Some(name) => self.lookup(name).map(|s| s.scope_depth).unwrap_or_else(|| self.current_depth()),
            None => self.current_depth(),
        }
    }

    /// `return`ing a `&stack` reference always escapes its defining
    /// function (spec.md §4.7): the stack frame it points into is gone
    /// the instant the caller resumes.
    pub(crate) fn check_return_escape(&mut self, value_ty: &Type, loc: &SourceLocation) {
        if Self::is_stack_reference(value_ty) {
            self.diags.error(
                loc.clone(),
                "stack reference escape: cannot return a &stack reference out of its defining function".to_string(),
            );
        }
    }

    /// Storing a `&stack` reference into a variable (or global) that
    /// outlives the frame it points into escapes. `target_depth` is the
    /// depth of the variable being written; depth 0 is the global scope.
    pub(crate) fn check_store_escape(
        &mut self,
        target_depth: usize,
        value: &Expr,
        value_ty: &Type,
        loc: &SourceLocation,
    ) {
        if !Self::is_stack_reference(value_ty) {
            return;
        }
        let origin = self.stack_origin_depth(value);
        if origin > target_depth {
            self.diags.error(
                loc.clone(),
                "stack reference escape: storing a &stack reference into a binding that outlives it".to_string(),
            );
        }
    }

    // --- nullability narrowing -------------------------------------------

    pub(crate) fn push_narrowed(&mut self, set: HashSet<String>) {
        self.narrowed_nonnull.push(set);
    }

    pub(crate) fn pop_narrowed(&mut self) {
        self.narrowed_nonnull.pop();
    }

    pub(crate) fn is_narrowed_nonnull(&self, name: &str) -> bool {
        self.narrowed_nonnull.iter().any(|s| s.contains(name))
    }

    /// Recognizes `p != null` / `p == null` (either operand order) as a
    /// one-level null check on a bare identifier, returning the
    /// identifier name and whether it is proven non-null in the
    /// `then`-branch.
    pub(crate) fn null_check_narrowing(cond: &Expr) -> Option<(String, bool)> {
        let ExprKind::Binary { op, lhs, rhs } = &cond.kind else { return None };
        if !matches!(op, BinOp::Eq | BinOp::Ne) {
            return None;
        }
        let name = match (&lhs.kind, &rhs.kind) {
            (ExprKind::Identifier { name, .. }, ExprKind::NullLiteral) => name,
            (ExprKind::NullLiteral, ExprKind::Identifier { name, .. }) => name,
            _ => return None,
        };
        Some((name.clone(), matches!(op, BinOp::Ne)))
    }

    // --- shared type-compatibility helper ---------------------------------

    /// `&region BaseT x = <scalar of type BaseT>;` is accepted as
    /// sugar that materializes the scalar in `region` and binds the
    /// reference to it (spec.md boundary scenario 2); `assignment_compatible`
    /// deliberately doesn't special-case this since it operates purely on
    /// types, not on where a value came from.
    pub(crate) fn scalar_region_init_compatible(&self, to: &Type, from: &Type) -> bool {
        match to {
            Type::Reference { base, nullable: false, .. } => **base == *from,
            _ => false,
        }
    }
}
