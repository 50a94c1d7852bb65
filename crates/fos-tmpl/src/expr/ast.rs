//! Expression AST

use super::token::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether the expression is a plain `a.b.c` path
    pub fn is_path(&self) -> bool {
        match &self.kind {
            ExprKind::Identifier(_) => true,
            ExprKind::Member { object, .. } => object.is_path(),
            _ => false,
        }
    }

    /// Root identifiers read by the expression, in first-use order
    pub fn free_variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_free(&mut out);
        out
    }

    fn collect_free<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Identifier(name) => {
                if !out.contains(&&**name) {
                    out.push(name);
                }
            }
            ExprKind::Array(items) => items.iter().for_each(|e| e.collect_free(out)),
            ExprKind::Member { object, .. } => object.collect_free(out),
            ExprKind::Index { object, index } => {
                object.collect_free(out);
                index.collect_free(out);
            }
            ExprKind::Unary { argument, .. } => argument.collect_free(out),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                left.collect_free(out);
                right.collect_free(out);
            }
            ExprKind::Conditional { test, consequent, alternate } => {
                test.collect_free(out);
                consequent.collect_free(out);
                alternate.collect_free(out);
            }
            ExprKind::Call { callee, arguments } => {
                callee.collect_free(out);
                arguments.iter().for_each(|e| e.collect_free(out));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(LiteralValue),
    Identifier(Box<str>),
    Array(Vec<Expr>),
    Member { object: Box<Expr>, property: Box<str> },
    Index { object: Box<Expr>, index: Box<Expr> },
    Unary { operator: UnaryOp, argument: Box<Expr> },
    Binary { operator: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { operator: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Call { callee: Box<Expr>, arguments: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    String(Box<str>),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// `item in list` / `(item, index) in list`
#[derive(Debug, Clone, PartialEq)]
pub struct ForHeader {
    pub item: Box<str>,
    pub index: Option<Box<str>>,
    pub iterable: Expr,
}

/// `handler` / `handler(args...)`
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerCall {
    pub callee: Expr,
    pub arguments: Vec<Expr>,
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expr),
}
