//! Directive expression language
//!
//! A small, side-effect free expression subset: literals, names, member and
//! index access, calls, unary/binary/logical operators and the conditional
//! operator. `:for` headers and `:on` handler calls have dedicated entry
//! points.

mod ast;
mod eval;
mod lexer;
mod parser;
mod token;

pub use ast::{BinaryOp, Expr, ExprKind, ForHeader, HandlerCall, LiteralValue, LogicalOp, Segment, UnaryOp};
pub use eval::{evaluate, member};
pub use lexer::Lexer;
pub use parser::{parse_interpolation, ParseError, Parser};
pub use token::{Span, Token, TokenKind};

/// Parse a complete expression
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source).parse()
}

/// Parse `item in list` or `(item, index) in list`
pub fn parse_for(source: &str) -> Result<ForHeader, ParseError> {
    Parser::new(source).parse_for()
}

/// Parse `handler` or `handler(args...)`
pub fn parse_handler(source: &str) -> Result<HandlerCall, ParseError> {
    Parser::new(source).parse_handler()
}

/// Whether `text` contains an interpolation
pub fn has_interpolation(text: &str) -> bool {
    text.contains("{{")
}
