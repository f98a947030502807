//! Character stream to token stream: a hand-rolled scanner tracking
//! line/column explicitly as it consumes one `char` at a time.

use crate::diagnostics::{DiagEngine, SourceLocation};
use crate::tokens::{lookup_extension_keyword, is_c_keyword, NumericPayload, Token, TokenKind};

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file: String,
    diags: &'a mut DiagEngine,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, file: impl Into<String>, diags: &'a mut DiagEngine) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.into(),
            diags,
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let loc = self.loc();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", loc));
                break;
            };
            let tok = if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.lex_number(loc)
            } else if c == '"' {
                self.lex_string(loc)
            } else if c == '\'' {
                self.lex_char(loc)
            } else if c.is_alphabetic() || c == '_' {
                self.lex_identifier(loc)
            } else {
                self.lex_operator(loc)
            };
            tokens.push(tok);
        }
        tokens
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start_loc = self.loc();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.bump();
                            self.bump();
                            closed = true;
                            break;
                        }
                        self.bump();
                    }
                    if !closed {
                        self.diags.error(start_loc, "unterminated block comment");
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, loc: SourceLocation) -> Token {
        let start = self.pos;
        let mut is_float = false;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let lexeme_digits: String = self.chars[start + 2..self.pos].iter().collect();
            let (suffix_start, unsigned, long_long) = self.lex_int_suffix();
            let lexeme: String = self.chars[start..suffix_start].iter().collect();
            let value = i64::from_str_radix(&lexeme_digits, 16).unwrap_or(0);
            return Token::new(TokenKind::IntLiteral, lexeme, loc).with_numeric(NumericPayload {
                int_value: value,
                float_value: 0.0,
                is_long_long: long_long,
                is_unsigned: unsigned,
            });
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || !c.is_alphabetic())
        {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            let save_line = self.line;
            let save_col = self.column;
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                self.pos = save;
                self.line = save_line;
                self.column = save_col;
            }
        }

        let digits_end = self.pos;
        let digit_text: String = self.chars[start..digits_end].iter().collect();
        let (suffix_start, unsigned, long_long) = self.lex_int_suffix();
        let is_float_suffix = suffix_start > digits_end
            && matches!(self.chars[digits_end], 'f' | 'F');
        let lexeme: String = self.chars[start..suffix_start].iter().collect();

        if is_float || is_float_suffix {
            let value: f64 = digit_text.parse().unwrap_or(0.0);
            Token::new(TokenKind::FloatLiteral, lexeme, loc).with_numeric(NumericPayload {
                int_value: 0,
                float_value: value,
                is_long_long: long_long,
                is_unsigned: unsigned,
            })
        } else {
            let (value, unsigned) = match digit_text.parse::<i64>() {
                Ok(v) => (v, unsigned),
                Err(_) => (digit_text.parse::<u64>().unwrap_or(0) as i64, true),
            };
            Token::new(TokenKind::IntLiteral, lexeme, loc).with_numeric(NumericPayload {
                int_value: value,
                float_value: 0.0,
                is_long_long: long_long,
                is_unsigned: unsigned,
            })
        }
    }

    /// Consumes a numeric suffix in any order (`u`/`U`, `l`/`L`/`ll`/`LL`,
    /// `f`/`F`); returns the position after the suffix plus the
    /// unsigned/long-long flags observed.
    fn lex_int_suffix(&mut self) -> (usize, bool, bool) {
        let mut unsigned = false;
        let mut long_long = false;
        loop {
            match self.peek() {
                Some('u') | Some('U') => {
                    unsigned = true;
                    self.bump();
                }
                Some('l') | Some('L') => {
                    let c = self.peek().unwrap();
                    self.bump();
                    if self.peek() == Some(c) {
                        long_long = true;
                        self.bump();
                    }
                }
                Some('f') | Some('F') => {
                    self.bump();
                    break;
                }
                _ => break,
            }
        }
        (self.pos, unsigned, long_long)
    }

    fn lex_string(&mut self, loc: SourceLocation) -> Token {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    self.diags.error(loc.clone(), "unterminated string literal");
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    value.push(self.lex_escape());
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        Token::new(TokenKind::StringLiteral, value, loc)
    }

    fn lex_char(&mut self, loc: SourceLocation) -> Token {
        self.bump(); // opening quote
        let ch = match self.peek() {
            Some('\\') => {
                self.bump();
                self.lex_escape()
            }
            Some(c) => {
                self.bump();
                c
            }
            None => {
                self.diags.error(loc.clone(), "unterminated char literal");
                '\0'
            }
        };
        if self.peek() == Some('\'') {
            self.bump();
        } else {
            self.diags.error(loc.clone(), "unterminated char literal");
        }
        Token::new(TokenKind::CharLiteral, ch.to_string(), loc).with_numeric(NumericPayload {
            int_value: i64::from(ch as u32),
            float_value: 0.0,
            is_long_long: false,
            is_unsigned: false,
        })
    }

    fn lex_escape(&mut self) -> char {
        match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('0') => '\0',
            Some(other) => other,
            None => '\0',
        }
    }

    fn lex_identifier(&mut self, loc: SourceLocation) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let lexeme: String = self.chars[start..self.pos].iter().collect();
        if let Some(kind) = lookup_extension_keyword(&lexeme) {
            Token::new(kind, lexeme, loc)
        } else if lexeme == "if" && self.looks_like_if_const() {
            Token::new(TokenKind::KwIfConst, lexeme, loc)
        } else if is_c_keyword(&lexeme) {
            Token::new(TokenKind::Keyword, lexeme, loc)
        } else {
            Token::new(TokenKind::Identifier, lexeme, loc)
        }
    }

    /// `if const (...)` is lexed as a distinct keyword only when the
    /// literal text `const` follows `if`, so the parser can build a
    /// distinct `if-const` AST node. Plain `if` stays `Keyword`.
    fn looks_like_if_const(&mut self) -> bool {
        let save = self.pos;
        let save_line = self.line;
        let save_col = self.column;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let matched = self.chars[self.pos..].starts_with(&['c', 'o', 'n', 's', 't'])
            && !self
                .chars
                .get(self.pos + 5)
                .is_some_and(|c| c.is_alphanumeric() || *c == '_');
        if matched {
            for _ in 0..5 {
                self.bump();
            }
        } else {
            self.pos = save;
            self.line = save_line;
            self.column = save_col;
        }
        matched
    }

    fn lex_operator(&mut self, loc: SourceLocation) -> Token {
        use TokenKind::*;
        let c = self.bump().unwrap();
        macro_rules! two {
            ($second:expr, $then:expr, $else_:expr) => {{
                if self.peek() == Some($second) {
                    self.bump();
                    $then
                } else {
                    $else_
                }
            }};
        }
        let (kind, lexeme) = match c {
            '(' => (LParen, "(".to_string()),
            ')' => (RParen, ")".to_string()),
            '{' => (LBrace, "{".to_string()),
            '}' => (RBrace, "}".to_string()),
            '[' => (LBracket, "[".to_string()),
            ']' => (RBracket, "]".to_string()),
            ',' => (Comma, ",".to_string()),
            ';' => (Semicolon, ";".to_string()),
            ':' => two!(':', (ColonColon, "::".to_string()), (Colon, ":".to_string())),
            '?' => two!('&', (QuestionAmp, "?&".to_string()), (Question, "?".to_string())),
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.bump();
                    self.bump();
                    (DotDotDot, "...".to_string())
                } else {
                    (Dot, ".".to_string())
                }
            }
            '&' => match self.peek() {
                Some('&') => {
                    self.bump();
                    (AmpAmp, "&&".to_string())
                }
                Some('=') => {
                    self.bump();
                    (AmpEq, "&=".to_string())
                }
                _ => (Amp, "&".to_string()),
            },
            '|' => match self.peek() {
                Some('|') => {
                    self.bump();
                    (PipePipe, "||".to_string())
                }
                Some('=') => {
                    self.bump();
                    (PipeEq, "|=".to_string())
                }
                _ => (Pipe, "|".to_string()),
            },
            '^' => two!('=', (CaretEq, "^=".to_string()), (Caret, "^".to_string())),
            '~' => (Tilde, "~".to_string()),
            '!' => two!('=', (BangEq, "!=".to_string()), (Bang, "!".to_string())),
            '=' => two!('=', (EqEq, "==".to_string()), two!('>', (FatArrow, "=>".to_string()), (Eq, "=".to_string()))),
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    (LtEq, "<=".to_string())
                }
                Some('<') => {
                    self.bump();
                    two!('=', (LtLtEq, "<<=".to_string()), (LtLt, "<<".to_string()))
                }
                _ => (Lt, "<".to_string()),
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.bump();
                    (GtEq, ">=".to_string())
                }
                Some('>') => {
                    self.bump();
                    two!('=', (GtGtEq, ">>=".to_string()), (GtGt, ">>".to_string()))
                }
                _ => (Gt, ">".to_string()),
            },
            '+' => match self.peek() {
                Some('+') => {
                    self.bump();
                    (PlusPlus, "++".to_string())
                }
                Some('=') => {
                    self.bump();
                    (PlusEq, "+=".to_string())
                }
                _ => (Plus, "+".to_string()),
            },
            '-' => match self.peek() {
                Some('-') => {
                    self.bump();
                    (MinusMinus, "--".to_string())
                }
                Some('=') => {
                    self.bump();
                    (MinusEq, "-=".to_string())
                }
                Some('>') => {
                    self.bump();
                    (Arrow, "->".to_string())
                }
                _ => (Minus, "-".to_string()),
            },
            '*' => two!('=', (StarEq, "*=".to_string()), (Star, "*".to_string())),
            '/' => two!('=', (SlashEq, "/=".to_string()), (Slash, "/".to_string())),
            '%' => two!('=', (PercentEq, "%=".to_string()), (Percent, "%".to_string())),
            other => {
                self.diags.error(loc.clone(), format!("unexpected character '{other}'"));
                (Eof, other.to_string())
            }
        };
        Token::new(kind, lexeme, loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        let mut diags = DiagEngine::new();
        Lexer::new(src, "t.sc", &mut diags).tokenize()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let mut diags = DiagEngine::new();
        let tokens = Lexer::new("int main foo", "t.sc", &mut diags).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn lexes_extension_keywords() {
        let mut diags = DiagEngine::new();
        let tokens = Lexer::new("region unsafe generic", "t.sc", &mut diags).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::KwRegion);
        assert_eq!(tokens[1].kind, TokenKind::KwUnsafe);
        assert_eq!(tokens[2].kind, TokenKind::KwGeneric);
    }

    #[test]
    fn lexes_integers_and_floats() {
        let mut diags = DiagEngine::new();
        let tokens = Lexer::new("42 3.14 0x2A 7UL", "t.sc", &mut diags).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[0].numeric.int_value, 42);
        assert_eq!(tokens[1].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[2].numeric.int_value, 42);
        assert!(tokens[3].numeric.is_unsigned);
        assert!(tokens[3].numeric.is_long_long);
    }

    #[test]
    fn lexes_strings_with_escapes() {
        let mut diags = DiagEngine::new();
        let tokens = Lexer::new("\"hi\\n\"", "t.sc", &mut diags).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].lexeme, "hi\n");
        assert!(!diags.has_errors());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut diags = DiagEngine::new();
        Lexer::new("\"oops", "t.sc", &mut diags).tokenize();
        assert!(diags.has_errors());
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let mut diags = DiagEngine::new();
        Lexer::new("/* never closes", "t.sc", &mut diags).tokenize();
        assert!(diags.has_errors());
    }

    #[test]
    fn lexes_safec_operators() {
        let mut diags = DiagEngine::new();
        let tokens = Lexer::new("?& :: => ...", "t.sc", &mut diags).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::QuestionAmp);
        assert_eq!(tokens[1].kind, TokenKind::ColonColon);
        assert_eq!(tokens[2].kind, TokenKind::FatArrow);
        assert_eq!(tokens[3].kind, TokenKind::DotDotDot);
    }

    #[test]
    fn final_token_is_eof() {
        let tokens = lex("int x;");
        assert!(tokens.last().unwrap().is_eof());
    }
}
