//! Token Types
//!
//! Tokens of the directive expression language: a side-effect free subset
//! of JavaScript expressions plus the `in` keyword used by `:for`.

/// Source span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Token with kind and span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(Box<str>),
    Boolean(bool),
    Null,
    Undefined,

    Identifier(Box<str>),

    // Keywords
    In,
    Typeof,

    // Punctuators
    LParen,      // (
    RParen,      // )
    LBracket,    // [
    RBracket,    // ]
    Dot,         // .
    Comma,       // ,
    Colon,       // :
    Question,    // ?
    QuestionQuestion, // ??

    // Operators
    Plus,        // +
    Minus,       // -
    Star,        // *
    Slash,       // /
    Percent,     // %
    LessThan,    // <
    LessThanEq,  // <=
    GreaterThan, // >
    GreaterThanEq, // >=
    EqEq,        // ==
    NotEq,       // !=
    EqEqEq,      // ===
    NotEqEq,     // !==
    AmpersandAmpersand, // &&
    PipePipe,    // ||
    Bang,        // !

    // Special
    Eof,
    Error(Box<str>),
}

/// Keyword lookup
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "true" => Some(TokenKind::Boolean(true)),
        "false" => Some(TokenKind::Boolean(false)),
        "null" => Some(TokenKind::Null),
        "undefined" => Some(TokenKind::Undefined),
        "in" => Some(TokenKind::In),
        "typeof" => Some(TokenKind::Typeof),
        _ => None,
    }
}
