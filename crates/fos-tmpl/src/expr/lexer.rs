//! Expression Lexer
//!
//! Tokenizes directive expressions. Unexpected characters become
//! [`TokenKind::Error`] tokens; the parser turns them into errors.

use super::token::{keyword_from_str, Span, Token, TokenKind};
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<Chars<'src>>,
    pos: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            pos: 0,
        }
    }

    /// Current byte offset
    pub fn position(&self) -> u32 {
        self.pos
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.pos as usize..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Consume the next character if it is `expected`
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;
        let Some(c) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match c {
            'a'..='z' | 'A'..='Z' | '_' | '$' => self.scan_identifier(start),
            '0'..='9' => self.scan_number(start),
            '.' if matches!(self.peek(), Some('0'..='9')) => self.scan_number(start),
            '"' | '\'' => self.scan_string(c),

            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '?' => {
                if self.eat('?') {
                    TokenKind::QuestionQuestion
                } else {
                    TokenKind::Question
                }
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' => {
                if self.eat('=') {
                    TokenKind::LessThanEq
                } else {
                    TokenKind::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterThanEq
                } else {
                    TokenKind::GreaterThan
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    TokenKind::Error("assignment is not allowed in expressions".into())
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::NotEqEq
                    } else {
                        TokenKind::NotEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AmpersandAmpersand
                } else {
                    TokenKind::Error("unexpected character '&'".into())
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::PipePipe
                } else {
                    TokenKind::Error("unexpected character '|'".into())
                }
            }
            _ => TokenKind::Error(format!("unexpected character '{}'", c).into()),
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    fn scan_identifier(&mut self, start: u32) -> TokenKind {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start as usize..self.pos as usize];
        keyword_from_str(text).unwrap_or_else(|| TokenKind::Identifier(text.into()))
    }

    fn scan_number(&mut self, start: u32) -> TokenKind {
        while matches!(self.peek(), Some('0'..='9')) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_next(), Some('0'..='9')) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }

        let text = &self.source[start as usize..self.pos as usize];
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("invalid number '{}'", text).into()),
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        while let Some(c) = self.advance() {
            if c == quote {
                return TokenKind::String(value.into());
            }
            if c == '\\' {
                match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('0') => value.push('\0'),
                    Some(other) => value.push(other),
                    None => break,
                }
            } else {
                value.push(c);
            }
        }
        TokenKind::Error("unterminated string".into())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).map(|t| t.kind).collect()
    }

    #[test]
    fn test_call_with_literals() {
        assert_eq!(
            kinds("click ( 666, '555' )"),
            vec![
                TokenKind::Identifier("click".into()),
                TokenKind::LParen,
                TokenKind::Number(666.0),
                TokenKind::Comma,
                TokenKind::String("555".into()),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a === b ?? !c <= .5"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::EqEqEq,
                TokenKind::Identifier("b".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Bang,
                TokenKind::Identifier("c".into()),
                TokenKind::LessThanEq,
                TokenKind::Number(0.5),
            ]
        );
    }

    #[test]
    fn test_for_header() {
        assert_eq!(
            kinds("(item, i) in list"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("item".into()),
                TokenKind::Comma,
                TokenKind::Identifier("i".into()),
                TokenKind::RParen,
                TokenKind::In,
                TokenKind::Identifier("list".into()),
            ]
        );
    }

    #[test]
    fn test_spans_and_errors() {
        let mut lexer = Lexer::new("ab = 'x");
        assert_eq!(lexer.next_token().span, Span::new(0, 2));
        assert!(matches!(lexer.next_token().kind, TokenKind::Error(_)));
        assert_eq!(lexer.next_token().kind, TokenKind::Error("unterminated string".into()));
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b\n""#), vec![TokenKind::String("a\"b\n".into())]);
    }
}
