//! Expression Parser
//!
//! Recursive descent, one function per precedence level:
//! conditional, `??`, `||`, `&&`, equality, comparison, additive,
//! multiplicative, unary, postfix (member/index/call), primary.

use super::ast::{BinaryOp, Expr, ExprKind, ForHeader, HandlerCall, LiteralValue, LogicalOp, Segment, UnaryOp};
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};

/// Parser error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {}..{}", .span.start, .span.end)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }

    fn shifted(mut self, offset: u32) -> Self {
        self.span = Span::new(self.span.start + offset, self.span.end + offset);
        self
    }
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous: Token,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current: current.clone(),
            previous: current,
        }
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {:?}", kind)))
        }
    }

    fn unexpected(&self, context: &str) -> ParseError {
        match &self.current.kind {
            TokenKind::Error(message) => ParseError::new(message.to_string(), self.current.span),
            TokenKind::Eof => ParseError::new(format!("{}, got end of input", context), self.current.span),
            other => ParseError::new(format!("{}, got {:?}", context, other), self.current.span),
        }
    }

    fn identifier(&mut self) -> Result<Box<str>, ParseError> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("expected identifier"))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.check(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("expected end of expression"))
        }
    }

    /// Parse a whole expression; trailing tokens are an error
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse a `:for` header
    pub fn parse_for(mut self) -> Result<ForHeader, ParseError> {
        let (item, index) = if self.check(&TokenKind::LParen) {
            self.advance();
            let item = self.identifier()?;
            let index = if self.check(&TokenKind::Comma) {
                self.advance();
                Some(self.identifier()?)
            } else {
                None
            };
            self.consume(TokenKind::RParen)?;
            (item, index)
        } else {
            (self.identifier()?, None)
        };
        self.consume(TokenKind::In)?;
        let iterable = self.parse_expression()?;
        self.expect_end()?;
        Ok(ForHeader { item, index, iterable })
    }

    /// Parse an `:on` value
    pub fn parse_handler(self) -> Result<HandlerCall, ParseError> {
        let expr = self.parse()?;
        let span = expr.span;
        match expr.kind {
            ExprKind::Call { callee, arguments } if callee.is_path() => Ok(HandlerCall { callee: *callee, arguments }),
            kind => {
                let expr = Expr::new(kind, span);
                if expr.is_path() {
                    Ok(HandlerCall { callee: expr, arguments: Vec::new() })
                } else {
                    Err(ParseError::new("expected a handler name or handler call", span))
                }
            }
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_nullish()?;
        if !self.check(&TokenKind::Question) {
            return Ok(test);
        }
        self.advance();
        let consequent = self.parse_conditional()?;
        self.consume(TokenKind::Colon)?;
        let alternate = self.parse_conditional()?;
        let span = test.span.merge(alternate.span);
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn logical(left: Expr, operator: LogicalOp, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr::new(ExprKind::Logical { operator, left: Box::new(left), right: Box::new(right) }, span)
    }

    fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr::new(ExprKind::Binary { operator, left: Box::new(left), right: Box::new(right) }, span)
    }

    fn parse_nullish(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_or()?;
        while self.check(&TokenKind::QuestionQuestion) {
            self.advance();
            let right = self.parse_logical_or()?;
            left = Self::logical(left, LogicalOp::Nullish, right);
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Self::logical(left, LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_equality()?;
            left = Self::logical(left, LogicalOp::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let operator = match self.current.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::EqEqEq => BinaryOp::StrictEq,
                TokenKind::NotEqEq => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let operator = match self.current.kind {
                TokenKind::LessThan => BinaryOp::Lt,
                TokenKind::LessThanEq => BinaryOp::LtEq,
                TokenKind::GreaterThan => BinaryOp::Gt,
                TokenKind::GreaterThanEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let operator = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span;
        let operator = match self.current.kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let argument = self.parse_unary()?;
        let span = start.merge(argument.span);
        Ok(Expr::new(ExprKind::Unary { operator, argument: Box::new(argument) }, span))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let property = self.identifier()?;
                let span = expr.span.merge(self.previous.span);
                expr = Expr::new(ExprKind::Member { object: Box::new(expr), property }, span);
            } else if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket)?;
                let span = expr.span.merge(self.previous.span);
                expr = Expr::new(ExprKind::Index { object: Box::new(expr), index: Box::new(index) }, span);
            } else if self.check(&TokenKind::LParen) {
                self.advance();
                let arguments = self.parse_list(TokenKind::RParen)?;
                let span = expr.span.merge(self.previous.span);
                expr = Expr::new(ExprKind::Call { callee: Box::new(expr), arguments }, span);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Comma separated expressions up to and including `close`
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.check(&close) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(close)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.current.span;
        let kind = match &self.current.kind {
            TokenKind::Number(n) => ExprKind::Literal(LiteralValue::Number(*n)),
            TokenKind::String(s) => ExprKind::Literal(LiteralValue::String(s.clone())),
            TokenKind::Boolean(b) => ExprKind::Literal(LiteralValue::Bool(*b)),
            TokenKind::Null => ExprKind::Literal(LiteralValue::Null),
            TokenKind::Undefined => ExprKind::Literal(LiteralValue::Undefined),
            TokenKind::Identifier(name) => ExprKind::Identifier(name.clone()),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen)?;
                return Ok(Expr::new(inner.kind, span.merge(self.previous.span)));
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_list(TokenKind::RBracket)?;
                return Ok(Expr::new(ExprKind::Array(items), span.merge(self.previous.span)));
            }
            _ => return Err(self.unexpected("expected expression")),
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }
}

/// Split `text` into literal and `{{ expr }}` segments
///
/// Adjacent literal text is merged; an unclosed `{{` is an error.
pub fn parse_interpolation(text: &str) -> Result<Vec<Segment>, ParseError> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut offset = 0u32;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            push_text(&mut segments, &rest[..open]);
        }
        let body_start = open + 2;
        let Some(close) = rest[body_start..].find("}}") else {
            let start = offset + open as u32;
            return Err(ParseError::new("unterminated interpolation", Span::new(start, text.len() as u32)));
        };
        let body = &rest[body_start..body_start + close];
        let body_offset = offset + body_start as u32;
        let expr = Parser::new(body).parse().map_err(|e| e.shifted(body_offset))?;
        segments.push(Segment::Expr(shift_expr(expr, body_offset)));

        let consumed = body_start + close + 2;
        offset += consumed as u32;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        push_text(&mut segments, rest);
    }
    Ok(segments)
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if let Some(Segment::Text(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}

fn shift_expr(mut expr: Expr, offset: u32) -> Expr {
    expr.span = Span::new(expr.span.start + offset, expr.span.end + offset);
    expr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        Parser::new(src).parse().unwrap()
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2 > 3 && !c");
        let ExprKind::Logical { operator: LogicalOp::And, left, right } = expr.kind else {
            panic!("expected &&");
        };
        assert!(matches!(left.kind, ExprKind::Binary { operator: BinaryOp::Gt, .. }));
        assert!(matches!(right.kind, ExprKind::Unary { operator: UnaryOp::Not, .. }));
    }

    #[test]
    fn test_conditional_and_member() {
        let expr = parse("user.name ? user['age'] : 'n/a'");
        assert!(matches!(expr.kind, ExprKind::Conditional { .. }));
        assert_eq!(expr.free_variables(), vec!["user"]);
        assert_eq!(expr.span, Span::new(0, 31));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = Parser::new("a b").parse().unwrap_err();
        assert_eq!(err.span, Span::new(2, 3));
        assert!(Parser::new("a = 1").parse().is_err());
        assert!(Parser::new("").parse().is_err());
    }

    #[test]
    fn test_for_headers() {
        let header = Parser::new("i in list").parse_for().unwrap();
        assert_eq!(&*header.item, "i");
        assert!(header.index.is_none());

        let header = Parser::new("( item, key ) in data.list").parse_for().unwrap();
        assert_eq!(header.index.as_deref(), Some("key"));
        assert!(header.iterable.is_path());

        assert!(Parser::new("in list").parse_for().is_err());
        assert!(Parser::new("i of list").parse_for().is_err());
    }

    #[test]
    fn test_handlers() {
        let call = Parser::new("click").parse_handler().unwrap();
        assert!(call.arguments.is_empty());

        let call = Parser::new("actions.click ( 666, '555' )").parse_handler().unwrap();
        assert!(call.callee.is_path());
        assert_eq!(call.arguments.len(), 2);

        assert!(Parser::new("a + b").parse_handler().is_err());
        assert!(Parser::new("make()()").parse_handler().is_err());
    }

    #[test]
    fn test_interpolation_segments() {
        let segments = parse_interpolation("Hi {{ name }}, {{ n + 1 }}!").unwrap();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Text("Hi ".into()));
        let Segment::Expr(expr) = &segments[1] else { panic!("expected expr") };
        assert_eq!(expr.span, Span::new(6, 10));
        assert_eq!(segments[4], Segment::Text("!".into()));

        assert_eq!(parse_interpolation("plain").unwrap(), vec![Segment::Text("plain".into())]);
    }

    #[test]
    fn test_interpolation_errors() {
        let err = parse_interpolation("a {{ b").unwrap_err();
        assert_eq!(err.message, "unterminated interpolation");
        assert_eq!(err.span, Span::new(2, 6));

        let err = parse_interpolation("xx{{ + }}").unwrap_err();
        assert_eq!(err.span.start, 7);
    }
}
