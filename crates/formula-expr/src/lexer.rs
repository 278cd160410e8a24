use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{ErrorKind, ExprError, ExprResult, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// No token has been read since the source was set.
    Begin,
    End,
    Name(String),
    Int(i32),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Bool(bool),
    Text(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    BitOr,
    BitAnd,
    BitXor,
    /// `!` or `~`.
    Not,
    OrOr,
    AndAnd,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Begin => "beginning of formula",
            Self::End => "end of formula",
            Self::Name(name) => return write!(f, "name `{name}`"),
            Self::Int(_) | Self::Float(_) | Self::Double(_) | Self::Decimal(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "string",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::LBrace => "`{`",
            Self::RBrace => "`}`",
            Self::Semicolon => "`;`",
            Self::Colon => "`:`",
            Self::Comma => "`,`",
            Self::Dot => "`.`",
            Self::Eq => "`=`",
            Self::Ne => "`!=`",
            Self::Lt => "`<`",
            Self::Le => "`<=`",
            Self::Gt => "`>`",
            Self::Ge => "`>=`",
            Self::Shl => "`<<`",
            Self::Shr => "`>>`",
            Self::BitOr => "`|`",
            Self::BitAnd => "`&`",
            Self::BitXor => "`^`",
            Self::Not => "`!`",
            Self::OrOr => "`||`",
            Self::AndAnd => "`&&`",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Pull-based tokenizer over a single formula.
///
/// The lexer owns its source and a cursor; [`Lexer::next_token`] is the only operation that moves
/// the cursor. After every call `start()..position()` is the span of the lexeme just produced.
#[derive(Debug, Clone)]
pub struct Lexer {
    src: String,
    pos: usize,
    start: usize,
    current: Token,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            src: String::new(),
            pos: 0,
            start: 0,
            current: Token {
                kind: TokenKind::Begin,
                span: Span::default(),
            },
        }
    }

    pub fn with_source(src: impl Into<String>) -> Self {
        let mut lexer = Self::new();
        lexer.set_source(src);
        lexer
    }

    /// Replace the source and rewind to [`TokenKind::Begin`].
    pub fn set_source(&mut self, src: impl Into<String>) {
        self.src = src.into();
        self.pos = 0;
        self.start = 0;
        self.current = Token {
            kind: TokenKind::Begin,
            span: Span::default(),
        };
    }

    pub fn source(&self) -> &str {
        &self.src
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Where the current lexeme begins.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte length of the current lexeme.
    pub fn len(&self) -> usize {
        self.pos - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Skip whitespace and classify the next lexeme.
    pub fn next_token(&mut self) -> ExprResult<&Token> {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
        self.start = self.pos;

        let kind = match self.peek() {
            None => TokenKind::End,
            Some(ch) => self.scan(ch)?,
        };
        self.current = Token {
            kind,
            span: Span::new(self.start, self.pos),
        };
        Ok(&self.current)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>) -> ExprError {
        ExprError::new(kind, message, Span::new(self.start, self.pos))
    }

    fn scan(&mut self, ch: char) -> ExprResult<TokenKind> {
        let single = match ch {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ';' => Some(TokenKind::Semicolon),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            '.' => Some(TokenKind::Dot),
            '^' => Some(TokenKind::BitXor),
            '~' => Some(TokenKind::Not),
            _ => None,
        };
        if let Some(kind) = single {
            self.bump();
            return Ok(kind);
        }

        match ch {
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(TokenKind::Ne)
                } else {
                    Ok(TokenKind::Not)
                }
            }
            '=' | '<' | '>' => self.scan_comparison(),
            '|' => {
                self.bump();
                if self.peek() == Some('|') {
                    self.bump();
                    Ok(TokenKind::OrOr)
                } else {
                    Ok(TokenKind::BitOr)
                }
            }
            '&' => {
                self.bump();
                if self.peek() == Some('&') {
                    self.bump();
                    Ok(TokenKind::AndAnd)
                } else {
                    Ok(TokenKind::BitAnd)
                }
            }
            '"' => self.scan_text(),
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_name(),
            other => {
                self.bump();
                Err(self.error(
                    ErrorKind::InvalidCharacter,
                    format!("invalid character {other:?}"),
                ))
            }
        }
    }

    fn scan_comparison(&mut self) -> ExprResult<TokenKind> {
        let first = self.bump();
        let second = match self.peek() {
            Some(c @ ('=' | '<' | '>')) => {
                self.bump();
                Some(c)
            }
            _ => None,
        };
        match (first, second) {
            (Some('='), None) => Ok(TokenKind::Eq),
            (Some('<'), None) => Ok(TokenKind::Lt),
            (Some('>'), None) => Ok(TokenKind::Gt),
            (Some('<'), Some('=')) => Ok(TokenKind::Le),
            (Some('>'), Some('=')) => Ok(TokenKind::Ge),
            (Some('<'), Some('<')) => Ok(TokenKind::Shl),
            (Some('>'), Some('>')) => Ok(TokenKind::Shr),
            _ => Err(self.error(
                ErrorKind::InvalidOperator,
                format!(
                    "invalid operator `{}`; expected one of =, <, >, <=, >=, !=, <<, >>",
                    &self.src[self.start..self.pos]
                ),
            )),
        }
    }

    fn scan_number(&mut self) -> ExprResult<TokenKind> {
        self.eat_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        match self.peek() {
            Some('.') => {
                is_float = true;
                self.bump();
                self.eat_while(|c| c.is_ascii_digit());
                if matches!(self.peek(), Some('e' | 'E')) {
                    self.bump();
                    self.eat_while(|c| c.is_ascii_digit());
                }
            }
            Some('e' | 'E') => {
                is_float = true;
                self.bump();
                self.eat_while(|c| c.is_ascii_digit());
            }
            _ => {}
        }

        let text_end = self.pos;
        let text = &self.src[self.start..text_end];
        let span = Span::new(self.start, text_end);
        let malformed =
            || ExprError::new(ErrorKind::MalformedNumber, format!("malformed number `{text}`"), span);
        let overflow = || {
            ExprError::new(
                ErrorKind::NumberOverflow,
                format!("number `{text}` is out of range"),
                span,
            )
        };

        // A suffix turns an all-digit run into a float or decimal literal.
        if !is_float && !matches!(self.peek(), Some('m' | 'f')) {
            return match text.parse::<i32>() {
                Ok(v) => Ok(TokenKind::Int(v)),
                Err(err) if matches!(err.kind(), IntErrorKind::PosOverflow) => Err(overflow()),
                Err(_) => Err(malformed()),
            };
        }

        match self.peek() {
            Some('m') => {
                // Fixed-point literals have no exponent form.
                if text.contains(['e', 'E']) {
                    return Err(malformed());
                }
                let value = Decimal::from_str(text.trim_end_matches('.')).map_err(|_| overflow())?;
                self.bump();
                Ok(TokenKind::Decimal(value))
            }
            Some('f') => {
                let value = text.parse::<f32>().map_err(|_| malformed())?;
                if value.is_infinite() {
                    return Err(overflow());
                }
                self.bump();
                Ok(TokenKind::Float(value))
            }
            _ => {
                let value = text.parse::<f64>().map_err(|_| malformed())?;
                if value.is_infinite() {
                    return Err(overflow());
                }
                Ok(TokenKind::Double(value))
            }
        }
    }

    fn scan_name(&mut self) -> ExprResult<TokenKind> {
        self.eat_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
        let name = &self.src[self.start..self.pos];
        if name.ends_with('.') {
            return Err(self.error(
                ErrorKind::InvalidName,
                format!("name `{name}` must not end with `.`"),
            ));
        }
        Ok(match name {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Name(name.to_string()),
        })
    }

    fn scan_text(&mut self) -> ExprResult<TokenKind> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(
                        ErrorKind::UnterminatedText,
                        "unterminated string literal",
                    ))
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') if self.peek_second() == Some('"') => {
                    self.pos += 2;
                    out.push('"');
                }
                Some(c) => {
                    self.pos += c.len_utf8();
                    out.push(c);
                }
            }
        }
        Ok(TokenKind::Text(out))
    }
}

/// Tokenize a whole formula, including the trailing [`TokenKind::End`].
pub fn tokenize(src: &str) -> ExprResult<Vec<Token>> {
    let mut lexer = Lexer::with_source(src);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?.clone();
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn starts_at_begin_and_ends_with_end() {
        let mut lexer = Lexer::with_source("  ");
        assert_eq!(lexer.current().kind, TokenKind::Begin);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
    }

    #[test]
    fn start_and_len_describe_the_lexeme() {
        let mut lexer = Lexer::with_source("  abc  <= 12");
        lexer.next_token().unwrap();
        assert_eq!((lexer.start(), lexer.len()), (2, 3));
        lexer.next_token().unwrap();
        assert_eq!((lexer.start(), lexer.len()), (7, 2));
        lexer.next_token().unwrap();
        assert_eq!((lexer.start(), lexer.len()), (10, 2));
    }

    #[test]
    fn doubled_pipes_and_ampersands_are_logical() {
        assert_eq!(
            kinds("| || & && ^ ! ~ !="),
            vec![
                TokenKind::BitOr,
                TokenKind::OrOr,
                TokenKind::BitAnd,
                TokenKind::AndAnd,
                TokenKind::BitXor,
                TokenKind::Not,
                TokenKind::Not,
                TokenKind::Ne,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn set_source_rewinds() {
        let mut lexer = Lexer::with_source("1");
        lexer.next_token().unwrap();
        lexer.set_source("x");
        assert_eq!(lexer.current().kind, TokenKind::Begin);
        assert_eq!(lexer.position(), 0);
        assert_eq!(
            lexer.next_token().unwrap().kind,
            TokenKind::Name("x".to_string())
        );
    }
}
