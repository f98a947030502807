//! Token kinds and the `Token` record produced by the lexer.
//!
//! Grounded on `Token.h`: kind, lexeme, location, and a numeric
//! payload carrying both the signed and unsigned interpretation plus
//! suffix flags, since a numeric literal's exact width/signedness is
//! only pinned down once the suffix (`U`, `L`, `LL`, `F`) is read.

use crate::diagnostics::SourceLocation;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    Identifier,

    // C keywords (subset actually referenced by the grammar; the full
    // C89-C23 set is accepted and mapped to `Keyword` uniformly, the
    // lexeme distinguishes them)
    Keyword,

    // SafeC extension keywords get their own kinds so the parser can
    // match on them directly instead of string-comparing lexemes.
    KwRegion,
    KwUnsafe,
    KwConsteval,
    KwGeneric,
    KwStaticAssert,
    KwStack,
    KwHeap,
    KwArena,
    KwCapacity,
    KwSelfValue,
    KwOperator,
    KwNew,
    KwArenaReset,
    KwTuple,
    KwSpawn,
    KwJoin,
    KwDefer,
    KwErrdefer,
    KwMatch,
    KwPacked,
    KwTry,
    KwMustUse,
    KwFn,
    KwAlignof,
    KwTypeof,
    KwFieldcount,
    KwCase,
    KwDefault,
    KwNull,
    KwTrue,
    KwFalse,
    KwIfConst,

    // Punctuation / operators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    ColonColon,
    Question,
    QuestionAmp,
    Arrow,
    FatArrow,
    Dot,
    DotDotDot,
    Amp,
    AmpAmp,
    AmpEq,
    Pipe,
    PipePipe,
    PipeEq,
    Caret,
    CaretEq,
    Tilde,
    Bang,
    BangEq,
    Eq,
    EqEq,
    Lt,
    LtEq,
    LtLt,
    LtLtEq,
    Gt,
    GtEq,
    GtGt,
    GtGtEq,
    Plus,
    PlusPlus,
    PlusEq,
    Minus,
    MinusMinus,
    MinusEq,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,

    Eof,
}

/// Numeric payload attached to an `IntLiteral`/`FloatLiteral` token.
/// The signed parse is attempted first; on overflow it is re-parsed
/// unsigned and its bit pattern is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericPayload {
    pub int_value: i64,
    pub float_value: f64,
    pub is_long_long: bool,
    pub is_unsigned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
    pub numeric: NumericPayload,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: SourceLocation) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            location,
            numeric: NumericPayload::default(),
        }
    }

    pub fn with_numeric(mut self, numeric: NumericPayload) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}('{}')", self.kind, self.lexeme)
    }
}

/// Maps an identifier lexeme to a SafeC extension keyword kind, or
/// `None` if it is an ordinary identifier or a plain C keyword (plain
/// C keywords are recognized by the lexer's separate C-keyword table
/// and tagged `TokenKind::Keyword`).
pub fn lookup_extension_keyword(lexeme: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match lexeme {
        "region" => KwRegion,
        "unsafe" => KwUnsafe,
        "consteval" => KwConsteval,
        "generic" => KwGeneric,
        "static_assert" => KwStaticAssert,
        "stack" => KwStack,
        "heap" => KwHeap,
        "arena" => KwArena,
        "capacity" => KwCapacity,
        "self" => KwSelfValue,
        "operator" => KwOperator,
        "new" => KwNew,
        "arena_reset" => KwArenaReset,
        "tuple" => KwTuple,
        "spawn" => KwSpawn,
        "join" => KwJoin,
        "defer" => KwDefer,
        "errdefer" => KwErrdefer,
        "match" => KwMatch,
        "packed" => KwPacked,
        "try" => KwTry,
        "must_use" => KwMustUse,
        "fn" => KwFn,
        "alignof" => KwAlignof,
        "typeof" => KwTypeof,
        "fieldcount" => KwFieldcount,
        "case" => KwCase,
        "default" => KwDefault,
        "null" => KwNull,
        "true" => KwTrue,
        "false" => KwFalse,
        _ => return None,
    })
}

/// The full C89-C23 keyword set mapped to the generic `Keyword` kind.
/// The parser distinguishes individual C keywords by comparing the
/// lexeme, the same way the extension keywords are distinguished by
/// `TokenKind` — plain C keywords don't need their own `TokenKind`
/// variant because the grammar only branches on a handful of them.
pub const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool", "_Complex", "_Imaginary",
    "_Alignas", "_Alignof", "_Atomic", "_Generic", "_Noreturn", "_Static_assert",
    "_Thread_local", "bool",
];

pub fn is_c_keyword(lexeme: &str) -> bool {
    C_KEYWORDS.contains(&lexeme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_keywords_resolve() {
        assert_eq!(lookup_extension_keyword("region"), Some(TokenKind::KwRegion));
        assert_eq!(lookup_extension_keyword("defer"), Some(TokenKind::KwDefer));
        assert_eq!(lookup_extension_keyword("not_a_keyword"), None);
    }

    #[test]
    fn c_keyword_table_recognizes_common_words() {
        assert!(is_c_keyword("return"));
        assert!(is_c_keyword("struct"));
        assert!(!is_c_keyword("region"));
    }

    #[test]
    fn eof_detection() {
        let tok = Token::new(TokenKind::Eof, "", SourceLocation::new("f", 1, 1));
        assert!(tok.is_eof());
    }
}
