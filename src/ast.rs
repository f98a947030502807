//! AST node types.
//!
//! Every node owns its location. `Expr` carries a resolved `type` and
//! `is_lvalue` flag that start empty/false after parsing and are
//! filled in during semantic analysis; they're `RefCell`/`Cell` fields
//! rather than plain fields because that pass fills them in during an
//! otherwise immutable-looking tree walk.

use crate::diagnostics::SourceLocation;
use crate::types::Type;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Resolution state filled in during Sema. Starts empty after parse.
#[derive(Debug, Default)]
pub struct ExprMeta {
    pub ty: RefCell<Option<Rc<Type>>>,
    pub is_lvalue: Cell<bool>,
}

impl ExprMeta {
    pub fn ty(&self) -> Option<Rc<Type>> {
        self.ty.borrow().clone()
    }

    pub fn set_ty(&self, ty: Rc<Type>) {
        *self.ty.borrow_mut() = Some(ty);
    }
}

#[derive(Debug)]
pub struct Expr {
    pub location: SourceLocation,
    pub kind: ExprKind,
    pub meta: ExprMeta,
}

impl Expr {
    pub fn new(location: SourceLocation, kind: ExprKind) -> Self {
        Expr {
            location,
            kind,
            meta: ExprMeta::default(),
        }
    }
}

/// Resolution of an identifier, filled in by Sema name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Variable,
    Function,
}

#[derive(Debug)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    CharLiteral(char),
    NullLiteral,
    /// Before Sema: just a name. After Sema: `resolved` names the
    /// symbol kind and `resolved_name` carries the mangled name for
    /// functions (to support monomorphized clones).
    Identifier {
        name: String,
        resolved: RefCell<Option<IdentKind>>,
        resolved_name: RefCell<Option<String>>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
        /// `true` for `->`, `false` for `.`
        arrow: bool,
    },
    Cast {
        target: Rc<Type>,
        operand: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    AddressOf(Box<Expr>),
    Deref(Box<Expr>),
    SizeofType(Rc<Type>),
    SizeofExpr(Box<Expr>),
    Alignof(Rc<Type>),
    Fieldcount(Rc<Type>),
    CompoundInit(Vec<Expr>),
    TupleLiteral(Vec<Expr>),
    /// `new<Region> Type`
    New {
        region_name: String,
        ty: Rc<Type>,
    },
    /// `spawn(fn, arg)`
    Spawn {
        function: Box<Expr>,
        arg: Box<Expr>,
    },
    /// `join(handle)`
    Join(Box<Expr>),
    /// `try expr` — unwrap an optional or propagate its emptiness.
    Try(Box<Expr>),
    /// `t.N` tuple field access — distinguished from `Member` because
    /// the index is an integer literal, not a field name.
    TupleIndex {
        base: Box<Expr>,
        index: u32,
    },
    SelfValue,
    ArenaReset {
        region_name: String,
    },
}

#[derive(Debug, Clone)]
pub enum Pattern {
    IntLiteral(i64),
    CharLiteral(char),
    Range(i64, i64),
    /// Enum identifier, optionally with a tagged-union bind, e.g.
    /// `Variant(x)` or `.variant(x)`.
    Variant {
        name: String,
        binding: Option<String>,
    },
    Wildcard,
}

#[derive(Debug)]
pub struct MatchArm {
    pub patterns: Vec<Pattern>,
    pub body: Stmt,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct VarDecl {
    pub name: String,
    pub declared_type: Rc<Type>,
    pub resolved_type: RefCell<Option<Rc<Type>>>,
    pub init: Option<Expr>,
    pub is_const: bool,
    pub is_static: bool,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub enum Stmt {
    Compound {
        stmts: Vec<Stmt>,
        location: SourceLocation,
    },
    Expr {
        expr: Expr,
        location: SourceLocation,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },
    /// Compile-time branch: ConstEval decides which side to keep.
    IfConst {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        location: SourceLocation,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        location: SourceLocation,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        location: SourceLocation,
    },
    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },
    Break {
        label: Option<String>,
        location: SourceLocation,
    },
    Continue {
        label: Option<String>,
        location: SourceLocation,
    },
    Goto {
        label: String,
        location: SourceLocation,
    },
    Label {
        name: String,
        stmt: Box<Stmt>,
        location: SourceLocation,
    },
    VarDeclStmt {
        decl: VarDecl,
        location: SourceLocation,
    },
    Unsafe {
        body: Box<Stmt>,
        location: SourceLocation,
    },
    StaticAssert {
        cond: Expr,
        message: Option<String>,
        location: SourceLocation,
    },
    Defer {
        body: Box<Stmt>,
        location: SourceLocation,
    },
    Errdefer {
        body: Box<Stmt>,
        location: SourceLocation,
    },
    Match {
        subject: Expr,
        arms: Vec<MatchArm>,
        location: SourceLocation,
    },
    InlineAsm {
        text: String,
        location: SourceLocation,
    },
}

impl Stmt {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::Compound { location, .. }
            | Stmt::Expr { location, .. }
            | Stmt::If { location, .. }
            | Stmt::IfConst { location, .. }
            | Stmt::While { location, .. }
            | Stmt::DoWhile { location, .. }
            | Stmt::For { location, .. }
            | Stmt::Return { location, .. }
            | Stmt::Break { location, .. }
            | Stmt::Continue { location, .. }
            | Stmt::Goto { location, .. }
            | Stmt::Label { location, .. }
            | Stmt::VarDeclStmt { location, .. }
            | Stmt::Unsafe { location, .. }
            | Stmt::StaticAssert { location, .. }
            | Stmt::Defer { location, .. }
            | Stmt::Errdefer { location, .. }
            | Stmt::Match { location, .. }
            | Stmt::InlineAsm { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Rc<Type>,
}

#[derive(Debug, Clone)]
pub struct GenericParam {
    pub name: String,
    pub constraint: Option<String>,
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    /// Mangled name once monomorphized; `None` for non-generic or
    /// not-yet-cloned functions.
    pub mangled_name: RefCell<Option<String>>,
    pub return_type: Rc<Type>,
    pub params: Vec<Param>,
    pub body: Option<Stmt>,
    pub generic_params: Vec<GenericParam>,
    /// `StructName` for `Type Owner::Name(...)` method declarations.
    pub method_owner: Option<String>,
    pub is_inline: bool,
    pub is_extern: bool,
    pub is_const: bool,
    pub is_consteval: bool,
    pub must_use: bool,
    pub is_variadic: bool,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct GlobalVarDecl {
    pub name: String,
    pub ty: Rc<Type>,
    pub init: Option<Expr>,
    pub is_const: bool,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, Rc<Type>)>,
    pub is_union: bool,
    pub is_packed: bool,
    pub is_tagged_union: bool,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct EnumDecl {
    pub name: String,
    /// `None` means auto-number from the previous entry, starting at 0.
    pub enumerators: Vec<(String, Option<i64>)>,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct RegionDecl {
    pub name: String,
    pub capacity: Expr,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub struct TypedefDecl {
    pub name: String,
    pub target: Rc<Type>,
    pub location: SourceLocation,
}

#[derive(Debug)]
pub enum Decl {
    Function(FunctionDecl),
    GlobalVar(GlobalVarDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Region(RegionDecl),
    Typedef(TypedefDecl),
    StaticAssert { cond: Expr, message: Option<String>, location: SourceLocation },
}

#[derive(Debug)]
pub struct TranslationUnit {
    pub file: String,
    pub decls: Vec<Decl>,
}

impl TranslationUnit {
    pub fn new(file: impl Into<String>) -> Self {
        TranslationUnit {
            file: file.into(),
            decls: Vec::new(),
        }
    }
}

/// Renders the textual AST-dump format (spec.md §6): one line per
/// top-level declaration, function/struct bodies in braces. Stable
/// enough for an external lint driver to scrape, but not meant to be
/// re-parsed.
pub fn dump_translation_unit(unit: &TranslationUnit) -> String {
    let mut out = String::new();
    for decl in &unit.decls {
        dump_decl(decl, &mut out);
    }
    out
}

fn dump_decl(decl: &Decl, out: &mut String) {
    match decl {
        Decl::Function(f) => {
            out.push_str(&format!("Function '{}' -> {}", f.name, f.return_type));
            match &f.body {
                Some(body) => {
                    out.push_str(" { ");
                    dump_stmt_summary(body, out);
                    out.push_str(" }\n");
                }
                None => out.push_str(" (decl)\n"),
            }
        }
        Decl::Struct(s) => {
            out.push_str(&format!("Struct '{}' {{ ", s.name));
            for (name, ty) in &s.fields {
                out.push_str(&format!("{name}: {ty} "));
            }
            out.push_str("}\n");
        }
        Decl::Enum(e) => out.push_str(&format!("Enum '{}'\n", e.name)),
        Decl::Region(r) => {
            let capacity = dump_const_hint(&r.capacity);
            out.push_str(&format!("Region '{}' {{ capacity: {capacity} }}\n", r.name));
        }
        Decl::GlobalVar(g) => out.push_str(&format!("Global '{}': {}\n", g.name, g.ty)),
        Decl::Typedef(t) => out.push_str(&format!("Typedef '{}' = {}\n", t.name, t.target)),
        Decl::StaticAssert { .. } => out.push_str("StaticAssert\n"),
    }
}

fn dump_const_hint(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntLiteral(n) => n.to_string(),
        _ => "?".to_string(),
    }
}

/// A one-line summary of a function body's top-level shape, not a full
/// recursive statement dump: the dump format only needs to show that a
/// function has a body, not reproduce it.
fn dump_stmt_summary(stmt: &Stmt, out: &mut String) {
    match stmt {
        Stmt::Compound { stmts, .. } => out.push_str(&format!("{} stmt(s)", stmts.len())),
        other => out.push_str(&format!("{:?}", std::mem::discriminant(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_meta_starts_empty() {
        let expr = Expr::new(
            SourceLocation::new("f", 1, 1),
            ExprKind::IntLiteral(0),
        );
        assert!(expr.meta.ty().is_none());
        assert!(!expr.meta.is_lvalue.get());
    }

    #[test]
    fn setting_type_is_visible_through_shared_ref() {
        let expr = Expr::new(SourceLocation::new("f", 1, 1), ExprKind::IntLiteral(0));
        expr.meta.set_ty(Type::int32());
        assert_eq!(*expr.meta.ty().unwrap(), Type::Int(crate::types::IntWidth::W32));
    }

    #[test]
    fn stmt_location_dispatches_per_variant() {
        let loc = SourceLocation::new("f", 4, 2);
        let stmt = Stmt::Break {
            label: None,
            location: loc.clone(),
        };
        assert_eq!(*stmt.location(), loc);
    }

    #[test]
    fn dump_renders_struct_and_function_decl_headers() {
        let loc = SourceLocation::new("f", 1, 1);
        let mut unit = TranslationUnit::new("f");
        unit.decls.push(Decl::Struct(StructDecl {
            name: "Point".to_string(),
            fields: vec![("x".to_string(), Type::int32())],
            is_union: false,
            is_packed: false,
            is_tagged_union: false,
            location: loc.clone(),
        }));
        unit.decls.push(Decl::Function(FunctionDecl {
            name: "main".to_string(),
            mangled_name: RefCell::new(None),
            return_type: Type::int32(),
            params: Vec::new(),
            body: None,
            generic_params: Vec::new(),
            method_owner: None,
            is_inline: false,
            is_extern: false,
            is_const: false,
            is_consteval: false,
            must_use: false,
            is_variadic: false,
            location: loc,
        }));
        let text = dump_translation_unit(&unit);
        assert!(text.contains("Struct 'Point' { x: int32 }"));
        assert!(text.contains("Function 'main' -> int32 (decl)"));
    }
}
