//! Expression parsing: precedence climbing plus suffixed/primary forms.

use super::Parser;
use crate::compiler::ast::{BinOp, Expr, ExprKind, TableField, UnOp};
use crate::compiler::lexer::TokenKind;
use crate::vm::error::{LuaResult, ParseErrorKind};

/// Binary operator priorities; `(left, right)`. Right-associative
/// operators carry a lower right priority so they recurse into themselves.
fn binop_priority(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 1),
        BinOp::And => (2, 2),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => (3, 3),
        BinOp::BOr => (4, 4),
        BinOp::BXor => (5, 5),
        BinOp::BAnd => (6, 6),
        BinOp::Shl | BinOp::Shr => (7, 7),
        BinOp::Concat => (9, 8),
        BinOp::Add | BinOp::Sub => (10, 10),
        BinOp::Mul | BinOp::Div | BinOp::IDiv | BinOp::Mod => (11, 11),
        BinOp::Pow => (14, 13),
    }
}

const UNARY_PRIORITY: u8 = 12;

fn token_binop(kind: &TokenKind) -> Option<BinOp> {
    let op = match kind {
        TokenKind::Or => BinOp::Or,
        TokenKind::And => BinOp::And,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Le => BinOp::Le,
        TokenKind::Ge => BinOp::Ge,
        TokenKind::Eq => BinOp::Eq,
        TokenKind::Ne => BinOp::Ne,
        TokenKind::Pipe => BinOp::BOr,
        TokenKind::Tilde => BinOp::BXor,
        TokenKind::Ampersand => BinOp::BAnd,
        TokenKind::Shl => BinOp::Shl,
        TokenKind::Shr => BinOp::Shr,
        TokenKind::Concat => BinOp::Concat,
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::DoubleSlash => BinOp::IDiv,
        TokenKind::Percent => BinOp::Mod,
        TokenKind::Caret => BinOp::Pow,
        _ => return None,
    };
    Some(op)
}

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> LuaResult<Expr> {
        self.parse_binexpr(0)
    }

    fn parse_binexpr(&mut self, limit: u8) -> LuaResult<Expr> {
        let start = self.current_span();
        let mut lhs = match self.current() {
            TokenKind::Not | TokenKind::Minus | TokenKind::Hash | TokenKind::Tilde => {
                let op = match self.current() {
                    TokenKind::Not => UnOp::Not,
                    TokenKind::Minus => UnOp::Neg,
                    TokenKind::Hash => UnOp::Len,
                    _ => UnOp::BNot,
                };
                self.advance();
                let operand = self.parse_binexpr(UNARY_PRIORITY)?;
                let span = start.merge(operand.span);
                Expr {
                    kind: ExprKind::UnOp {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                }
            }
            _ => self.parse_simple_expr()?,
        };
        while let Some(op) = token_binop(self.current()) {
            let (left_prio, right_prio) = binop_priority(op);
            if left_prio <= limit {
                break;
            }
            self.advance();
            let rhs = self.parse_binexpr(right_prio)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr {
                kind: ExprKind::BinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_simple_expr(&mut self) -> LuaResult<Expr> {
        let span = self.current_span();
        let kind = match self.current().clone() {
            TokenKind::Nil => {
                self.advance();
                ExprKind::Nil
            }
            TokenKind::True => {
                self.advance();
                ExprKind::True
            }
            TokenKind::False => {
                self.advance();
                ExprKind::False
            }
            TokenKind::Int(i) => {
                self.advance();
                ExprKind::Int(i)
            }
            TokenKind::Float(f) => {
                self.advance();
                ExprKind::Float(f)
            }
            TokenKind::Str(bytes) => {
                self.advance();
                ExprKind::Str(bytes)
            }
            TokenKind::Dots => {
                self.advance();
                ExprKind::Vararg
            }
            TokenKind::Function => {
                self.advance();
                let body = self.parse_func_body(span)?;
                let body_span = body.span;
                return Ok(Expr {
                    kind: ExprKind::Function(body),
                    span: body_span,
                });
            }
            TokenKind::LeftBrace => return self.parse_table_constructor(),
            _ => return self.parse_suffixed_expr(),
        };
        Ok(Expr { kind, span })
    }

    /// Primary expression (name or parenthesized) followed by any number of
    /// index, property, call and method-call suffixes.
    pub(crate) fn parse_suffixed_expr(&mut self) -> LuaResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.current() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_name()?;
                    let span = expr.span.merge(field.span);
                    expr = Expr {
                        kind: ExprKind::Property {
                            table: Box::new(expr),
                            field,
                        },
                        span,
                    };
                }
                TokenKind::LeftBracket => {
                    let open = self.advance();
                    let key = self.parse_expression()?;
                    let close =
                        self.expect_close(&TokenKind::RightBracket, "[", open.span)?;
                    let span = expr.span.merge(close.span);
                    expr = Expr {
                        kind: ExprKind::Index {
                            table: Box::new(expr),
                            key: Box::new(key),
                        },
                        span,
                    };
                }
                TokenKind::Colon => {
                    self.advance();
                    let method = self.expect_name()?;
                    let args = self.parse_call_args()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr {
                        kind: ExprKind::MethodCall {
                            object: Box::new(expr),
                            method,
                            args,
                        },
                        span,
                    };
                }
                TokenKind::LeftParen | TokenKind::Str(_) | TokenKind::LeftBrace => {
                    let args = self.parse_call_args()?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr {
                        kind: ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary_expr(&mut self) -> LuaResult<Expr> {
        let span = self.current_span();
        match self.current().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Var(name),
                    span,
                })
            }
            TokenKind::LeftParen => {
                let open = self.advance();
                let inner = self.parse_expression()?;
                let close = self.expect_close(&TokenKind::RightParen, "(", open.span)?;
                Ok(Expr {
                    kind: ExprKind::Paren(Box::new(inner)),
                    span: open.span.merge(close.span),
                })
            }
            _ => Err(self.parse_error(
                ParseErrorKind::InvalidExpression,
                vec!["expression".to_string()],
            )),
        }
    }

    /// Call arguments: `(...)`, a string literal, or a table constructor.
    fn parse_call_args(&mut self) -> LuaResult<Vec<Expr>> {
        match self.current().clone() {
            TokenKind::LeftParen => {
                let open = self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RightParen) {
                    args = self.parse_expr_list()?;
                }
                self.expect_close(&TokenKind::RightParen, "(", open.span)?;
                Ok(args)
            }
            TokenKind::Str(bytes) => {
                let span = self.current_span();
                self.advance();
                Ok(vec![Expr {
                    kind: ExprKind::Str(bytes),
                    span,
                }])
            }
            TokenKind::LeftBrace => Ok(vec![self.parse_table_constructor()?]),
            _ => Err(self.unexpected_token(&["'('", "string", "'{'"])),
        }
    }

    /// `{ field (sep field)* [sep] }` with `,` or `;` separators. Field
    /// forms: `exp`, `name = exp`, `[exp] = exp`.
    fn parse_table_constructor(&mut self) -> LuaResult<Expr> {
        let open = self.expect(&TokenKind::LeftBrace)?;
        let mut fields = Vec::new();
        loop {
            if self.check(&TokenKind::RightBrace) {
                break;
            }
            match self.current().clone() {
                TokenKind::Name(name)
                    if matches!(self.peek(), TokenKind::Assign) =>
                {
                    let key_span = self.current_span();
                    self.advance();
                    self.advance();
                    let value = self.parse_expression()?;
                    fields.push(TableField::Record {
                        key: Expr {
                            kind: ExprKind::Str(name.as_bytes().to_vec()),
                            span: key_span,
                        },
                        value,
                    });
                }
                TokenKind::LeftBracket => {
                    let bracket = self.advance();
                    let key = self.parse_expression()?;
                    self.expect_close(&TokenKind::RightBracket, "[", bracket.span)?;
                    self.expect(&TokenKind::Assign)?;
                    let value = self.parse_expression()?;
                    fields.push(TableField::Record { key, value });
                }
                _ => {
                    fields.push(TableField::List(self.parse_expression()?));
                }
            }
            if !self.accept(&TokenKind::Comma) && !self.accept(&TokenKind::Semicolon) {
                break;
            }
        }
        let close = self.expect_close(&TokenKind::RightBrace, "{", open.span)?;
        Ok(Expr {
            kind: ExprKind::Table(fields),
            span: open.span.merge(close.span),
        })
    }
}
