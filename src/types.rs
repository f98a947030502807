//! SafeC's type system: the `Type` sum type, factories, structural
//! equality, and `assignment_compatible`.

use std::fmt;
use std::rc::Rc;

/// A region category attached to a safe reference (GLOSSARY: Region).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Stack,
    Static,
    Heap,
    /// Named user-declared arena; the name indexes the region registry.
    Arena,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Stack => "stack",
            Region::Static => "static",
            Region::Heap => "heap",
            Region::Arena => "arena",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Rc<Type>,
}

#[derive(Debug, Clone)]
pub struct StructShape {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub is_union: bool,
    pub is_packed: bool,
    pub is_tagged_union: bool,
    pub max_payload_size: u64,
    pub defined: bool,
}

#[derive(Debug, Clone)]
pub struct EnumShape {
    pub name: String,
    pub enumerators: Vec<(String, i64)>,
    pub bit_width: u32,
    pub signed: bool,
}

/// Sum type of every SafeC type. Reference-counted so it can be
/// shared across the AST and symbol tables cheaply.
#[derive(Debug, Clone)]
pub enum Type {
    Void,
    Bool,
    Char,
    Int(IntWidth),
    UInt(IntWidth),
    Float32,
    Float64,
    /// Recovery sentinel: silently compatible with everything so a
    /// single failure does not cascade into unrelated diagnostics.
    Error,
    Pointer {
        base: Rc<Type>,
        is_const: bool,
    },
    Reference {
        base: Rc<Type>,
        region: Region,
        /// Present only when `region == Region::Arena`.
        arena_name: Option<String>,
        nullable: bool,
        mutable: bool,
    },
    Array {
        element: Rc<Type>,
        /// Negative means unsized.
        size: i64,
    },
    Struct(Rc<StructShape>),
    Enum(Rc<EnumShape>),
    Function {
        ret: Rc<Type>,
        params: Vec<Rc<Type>>,
        variadic: bool,
    },
    Tuple(Vec<Rc<Type>>),
    Optional(Rc<Type>),
    Slice(Rc<Type>),
    Generic {
        name: String,
        constraint: Option<String>,
    },
    Newtype {
        name: String,
        base: Rc<Type>,
    },
    /// Resolved by Sema from a back-pointer to the wrapped expression.
    /// Holds the resolved type once Sema has processed the expression
    /// it refers to.
    Typeof {
        resolved: Option<Rc<Type>>,
    },
}

impl Type {
    pub fn int32() -> Rc<Type> {
        Rc::new(Type::Int(IntWidth::W32))
    }

    pub fn int64() -> Rc<Type> {
        Rc::new(Type::Int(IntWidth::W64))
    }

    pub fn float64() -> Rc<Type> {
        Rc::new(Type::Float64)
    }

    pub fn bool_() -> Rc<Type> {
        Rc::new(Type::Bool)
    }

    pub fn char_() -> Rc<Type> {
        Rc::new(Type::Char)
    }

    pub fn error() -> Rc<Type> {
        Rc::new(Type::Error)
    }

    pub fn void() -> Rc<Type> {
        Rc::new(Type::Void)
    }

    pub fn reference(base: Rc<Type>, region: Region, nullable: bool, mutable: bool) -> Rc<Type> {
        Rc::new(Type::Reference {
            base,
            region,
            arena_name: None,
            nullable,
            mutable,
        })
    }

    pub fn arena_reference(
        base: Rc<Type>,
        arena_name: impl Into<String>,
        nullable: bool,
        mutable: bool,
    ) -> Rc<Type> {
        Rc::new(Type::Reference {
            base,
            region: Region::Arena,
            arena_name: Some(arena_name.into()),
            nullable,
            mutable,
        })
    }

    pub fn pointer(base: Rc<Type>, is_const: bool) -> Rc<Type> {
        Rc::new(Type::Pointer { base, is_const })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_) | Type::UInt(_) | Type::Char | Type::Bool)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float32 | Type::Float64)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference { .. })
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Array { .. } | Type::Tuple(_))
    }

    pub fn is_nullable_reference(&self) -> bool {
        matches!(self, Type::Reference { nullable: true, .. })
    }

    /// Width in bytes for ConstEval's `sizeof`/`alignof` and for
    /// lowering decisions the code-generation collaborator relies on.
    /// Layout is target-independent; no ABI is modeled.
    pub fn size_of(&self) -> u64 {
        match self {
            Type::Void => 0,
            Type::Bool | Type::Char => 1,
            Type::Int(w) | Type::UInt(w) => u64::from(w.bits()) / 8,
            Type::Float32 => 4,
            Type::Float64 => 8,
            Type::Error => 0,
            Type::Pointer { .. } | Type::Reference { .. } => 8,
            Type::Array { element, size } => {
                element.size_of() * u64::try_from((*size).max(0)).unwrap_or(0)
            }
            Type::Struct(shape) => {
                if shape.is_union || shape.is_tagged_union {
                    shape.max_payload_size
                } else {
                    shape.fields.iter().map(|f| f.ty.size_of()).sum()
                }
            }
            Type::Enum(shape) => u64::from(shape.bit_width) / 8,
            Type::Function { .. } => 8,
            Type::Tuple(elements) => elements.iter().map(|t| t.size_of()).sum(),
            Type::Optional(inner) => inner.size_of() + 1,
            Type::Slice(_) => 16,
            Type::Generic { .. } | Type::Newtype { .. } | Type::Typeof { .. } => 0,
        }
    }

    pub fn align_of(&self) -> u64 {
        match self {
            Type::Struct(shape) => shape
                .fields
                .iter()
                .map(|f| f.ty.align_of())
                .max()
                .unwrap_or(1),
            other => other.size_of().max(1),
        }
    }

    pub fn str(&self) -> String {
        format!("{self}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Int(IntWidth::W8) => write!(f, "int8"),
            Type::Int(IntWidth::W16) => write!(f, "int16"),
            Type::Int(IntWidth::W32) => write!(f, "int32"),
            Type::Int(IntWidth::W64) => write!(f, "int64"),
            Type::UInt(IntWidth::W8) => write!(f, "uint8"),
            Type::UInt(IntWidth::W16) => write!(f, "uint16"),
            Type::UInt(IntWidth::W32) => write!(f, "uint32"),
            Type::UInt(IntWidth::W64) => write!(f, "uint64"),
            Type::Float32 => write!(f, "float32"),
            Type::Float64 => write!(f, "float64"),
            Type::Error => write!(f, "<error>"),
            Type::Pointer { base, is_const } => {
                write!(f, "{}*{}", base, if *is_const { " const" } else { "" })
            }
            Type::Reference {
                base,
                region,
                arena_name,
                nullable,
                mutable,
            } => {
                write!(f, "{}&", if *nullable { "?" } else { "" })?;
                match (region, arena_name) {
                    (Region::Arena, Some(name)) => write!(f, "arena<{name}> ")?,
                    _ => write!(f, "{region} ")?,
                }
                if !*mutable {
                    write!(f, "const ")?;
                }
                write!(f, "{base}")
            }
            Type::Array { element, size } => {
                if *size < 0 {
                    write!(f, "{element}[]")
                } else {
                    write!(f, "{element}[{size}]")
                }
            }
            Type::Struct(shape) => write!(f, "struct {}", shape.name),
            Type::Enum(shape) => write!(f, "enum {}", shape.name),
            Type::Function {
                ret,
                params,
                variadic,
            } => {
                write!(f, "fn {ret}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            Type::Tuple(elements) => {
                write!(f, "tuple(")?;
                for (i, t) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Type::Optional(inner) => write!(f, "?{inner}"),
            Type::Slice(element) => write!(f, "[]{element}"),
            Type::Generic { name, .. } => write!(f, "{name}"),
            Type::Newtype { name, .. } => write!(f, "{name}"),
            Type::Typeof { resolved } => match resolved {
                Some(t) => write!(f, "{t}"),
                None => write!(f, "typeof(?)"),
            },
        }
    }
}

/// Nominal-where-it-matters equality: `Struct` and `Enum`
/// compare by name (nominal), `Newtype` by name+base (a wrapper is
/// distinct even from an identically-shaped one with another name),
/// everything else recurses structurally. Hand-written because a
/// derived `PartialEq` would compare `Struct`'s full field list, which
/// is wrong for recursive/forward-declared structs.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        use Type::*;
        match (self, other) {
            (Void, Void)
            | (Bool, Bool)
            | (Char, Char)
            | (Float32, Float32)
            | (Float64, Float64)
            | (Error, Error) => true,
            (Int(a), Int(b)) | (UInt(a), UInt(b)) => a == b,
            (
                Pointer {
                    base: b1,
                    is_const: c1,
                },
                Pointer {
                    base: b2,
                    is_const: c2,
                },
            ) => c1 == c2 && b1 == b2,
            (
                Reference {
                    base: b1,
                    region: r1,
                    arena_name: a1,
                    nullable: n1,
                    mutable: m1,
                },
                Reference {
                    base: b2,
                    region: r2,
                    arena_name: a2,
                    nullable: n2,
                    mutable: m2,
                },
            ) => r1 == r2 && a1 == a2 && n1 == n2 && m1 == m2 && b1 == b2,
            (Array { element: e1, size: s1 }, Array { element: e2, size: s2 }) => {
                s1 == s2 && e1 == e2
            }
            (Struct(a), Struct(b)) => a.name == b.name,
            (Enum(a), Enum(b)) => a.name == b.name,
            (
                Function {
                    ret: r1,
                    params: p1,
                    variadic: v1,
                },
                Function {
                    ret: r2,
                    params: p2,
                    variadic: v2,
                },
            ) => v1 == v2 && r1 == r2 && p1 == p2,
            (Tuple(a), Tuple(b)) => a == b,
            (Optional(a), Optional(b)) => a == b,
            (Slice(a), Slice(b)) => a == b,
            (Generic { name: n1, .. }, Generic { name: n2, .. }) => n1 == n2,
            (Newtype { name: n1, base: b1 }, Newtype { name: n2, base: b2 }) => {
                n1 == n2 && b1 == b2
            }
            (Typeof { resolved: r1 }, Typeof { resolved: r2 }) => r1 == r2,
            _ => false,
        }
    }
}

/// `assignment_compatible(from, to)`: can a value of type `from` be
/// assigned/passed where `to` is expected?
pub fn assignment_compatible(from: &Type, to: &Type) -> bool {
    if from.is_error() || to.is_error() {
        return true;
    }
    if from == to {
        return true;
    }
    if (matches!(from, Type::Bool) && to.is_integer())
        || (from.is_integer() && matches!(to, Type::Bool))
    {
        return true;
    }
    if is_8bit_scalar(from) && is_8bit_scalar(to) {
        return true;
    }
    if let (Type::Pointer { base: fb, .. }, Type::Pointer { .. }) = (from, to) {
        if matches!(**fb, Type::Void) {
            return true;
        }
    }
    if matches!(from, Type::Pointer { .. }) && matches!(to, Type::Reference { .. }) {
        return false;
    }
    if let (
        Type::Reference {
            base: fb,
            region: fr,
            nullable: fn_,
            mutable: fm,
            ..
        },
        Type::Reference {
            base: tb,
            region: tr,
            nullable: tn,
            mutable: tm,
            ..
        },
    ) = (from, to)
    {
        let base_ok = fb == tb;
        let region_ok = fr == tr;
        // non-null -> nullable widens (ok); nullable -> non-null narrows (forbidden)
        let nullable_ok = *tn || !*fn_;
        // a mutable source can satisfy an immutable target; the
        // reverse would allow mutation through an immutable binding
        let mutable_ok = *fm || !*tm;
        return base_ok && region_ok && nullable_ok && mutable_ok;
    }
    false
}

fn is_8bit_scalar(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Char | Type::Bool | Type::Int(IntWidth::W8) | Type::UInt(IntWidth::W8)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_is_reflexive() {
        let t = Type::int32();
        assert_eq!(*t, *t.clone());
    }

    #[test]
    fn equals_is_symmetric_and_transitive_for_structurally_equal_types() {
        let a = Type::reference(Type::int32(), Region::Stack, false, true);
        let b = Type::reference(Type::int32(), Region::Stack, false, true);
        let c = Type::reference(Type::int32(), Region::Stack, false, true);
        assert_eq!(*a, *b);
        assert_eq!(*b, *a);
        assert_eq!(*b, *c);
        assert_eq!(*a, *c);
    }

    #[test]
    fn struct_equality_is_nominal() {
        let shape_a = Rc::new(StructShape {
            name: "Point".to_string(),
            fields: vec![FieldDecl {
                name: "x".to_string(),
                ty: Type::int32(),
            }],
            is_union: false,
            is_packed: false,
            is_tagged_union: false,
            max_payload_size: 0,
            defined: true,
        });
        let shape_b = Rc::new(StructShape {
            name: "Point".to_string(),
            fields: vec![],
            is_union: false,
            is_packed: false,
            is_tagged_union: false,
            max_payload_size: 0,
            defined: false,
        });
        assert_eq!(Type::Struct(shape_a), Type::Struct(shape_b));
    }

    #[test]
    fn error_is_compatible_with_anything() {
        assert!(assignment_compatible(&Type::Error, &Type::Bool));
        assert!(assignment_compatible(&Type::int32(), &Type::Error));
    }

    #[test]
    fn bool_and_integer_are_compatible() {
        assert!(assignment_compatible(&Type::Bool, &Type::int32()));
        assert!(assignment_compatible(&Type::int32(), &Type::Bool));
    }

    #[test]
    fn raw_pointer_to_reference_is_forbidden() {
        let ptr = Type::pointer(Type::int32(), false);
        let reference = Type::reference(Type::int32(), Region::Stack, false, true);
        assert!(!assignment_compatible(&ptr, &reference));
    }

    #[test]
    fn widening_nonnull_to_nullable_reference_is_allowed() {
        let non_null = Type::reference(Type::int32(), Region::Stack, false, true);
        let nullable = Type::reference(Type::int32(), Region::Stack, true, true);
        assert!(assignment_compatible(&non_null, &nullable));
    }

    #[test]
    fn narrowing_nullable_to_nonnull_reference_is_forbidden() {
        let nullable = Type::reference(Type::int32(), Region::Stack, true, true);
        let non_null = Type::reference(Type::int32(), Region::Stack, false, true);
        assert!(!assignment_compatible(&nullable, &non_null));
    }

    #[test]
    fn integer_widening_requires_explicit_cast() {
        assert!(!assignment_compatible(&Type::Int(IntWidth::W16), &Type::int32()));
    }

    #[test]
    fn eight_bit_scalars_are_mutually_assignable() {
        assert!(assignment_compatible(&Type::Char, &Type::Bool));
        assert!(assignment_compatible(&Type::UInt(IntWidth::W8), &Type::Char));
    }
}
