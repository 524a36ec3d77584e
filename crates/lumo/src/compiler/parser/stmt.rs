//! Statement parsing.

use super::Parser;
use crate::compiler::ast::{Expr, ExprKind, FuncBody, Name, Stmt, StmtKind};
use crate::compiler::lexer::TokenKind;
use crate::compiler::span::Span;
use crate::vm::error::{LuaResult, ParseErrorKind};

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        match self.current() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::For => self.parse_for(),
            TokenKind::Do => {
                self.advance();
                let body = self.parse_block()?;
                let end = self.expect(&TokenKind::End)?;
                Ok(Stmt {
                    kind: StmtKind::Do { body },
                    span: start.merge(end.span),
                })
            }
            TokenKind::Function => self.parse_func_decl(),
            TokenKind::Local => self.parse_local(),
            TokenKind::Return => {
                self.advance();
                let mut values = Vec::new();
                if !self.return_follows() {
                    values = self.parse_expr_list()?;
                }
                let span = start.merge(self.previous_span());
                Ok(Stmt {
                    kind: StmtKind::Return { values },
                    span,
                })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span: start,
                })
            }
            TokenKind::Goto => {
                self.advance();
                let name = self.expect_name()?;
                let span = start.merge(name.span);
                Ok(Stmt {
                    kind: StmtKind::Goto(name),
                    span,
                })
            }
            TokenKind::Colon if matches!(self.peek(), TokenKind::Colon) => {
                // ::name::
                self.advance();
                self.advance();
                let name = self.expect_name()?;
                self.expect(&TokenKind::Colon)?;
                let end = self.expect(&TokenKind::Colon)?;
                Ok(Stmt {
                    kind: StmtKind::Label(name),
                    span: start.merge(end.span),
                })
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn return_follows(&self) -> bool {
        matches!(
            self.current(),
            TokenKind::Eof
                | TokenKind::End
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::Until
                | TokenKind::Semicolon
        )
    }

    fn parse_if(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::If)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::Then)?;
        let then_block = self.parse_block()?;
        let mut elseifs = Vec::new();
        let mut else_block = None;
        loop {
            match self.current() {
                TokenKind::ElseIf => {
                    self.advance();
                    let c = self.parse_expression()?;
                    self.expect(&TokenKind::Then)?;
                    let b = self.parse_block()?;
                    elseifs.push((c, b));
                }
                TokenKind::Else => {
                    self.advance();
                    else_block = Some(self.parse_block()?);
                    let end = self.expect(&TokenKind::End)?;
                    return Ok(Stmt {
                        kind: StmtKind::If {
                            cond,
                            then_block,
                            elseifs,
                            else_block,
                        },
                        span: start.merge(end.span),
                    });
                }
                _ => {
                    let end = self.expect(&TokenKind::End)?;
                    return Ok(Stmt {
                        kind: StmtKind::If {
                            cond,
                            then_block,
                            elseifs,
                            else_block,
                        },
                        span: start.merge(end.span),
                    });
                }
            }
        }
    }

    fn parse_while(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::While)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_block()?;
        let end = self.expect(&TokenKind::End)?;
        Ok(Stmt {
            kind: StmtKind::While { cond, body },
            span: start.merge(end.span),
        })
    }

    fn parse_repeat(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Repeat)?;
        let body = self.parse_block()?;
        self.expect(&TokenKind::Until)?;
        let cond = self.parse_expression()?;
        let span = start.merge(cond.span);
        Ok(Stmt {
            kind: StmtKind::Repeat { body, cond },
            span,
        })
    }

    fn parse_for(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::For)?;
        let first = self.expect_name()?;
        if self.accept(&TokenKind::Assign) {
            // Numeric: for v = start, limit [, step] do ... end
            let init = self.parse_expression()?;
            self.expect(&TokenKind::Comma)?;
            let limit = self.parse_expression()?;
            let step = if self.accept(&TokenKind::Comma) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(&TokenKind::Do)?;
            let body = self.parse_block()?;
            let end = self.expect(&TokenKind::End)?;
            return Ok(Stmt {
                kind: StmtKind::ForNum {
                    var: first,
                    start: init,
                    limit,
                    step,
                    body,
                },
                span: start.merge(end.span),
            });
        }
        // Generic: for a, b, ... in exprs do ... end
        let mut vars = vec![first];
        while self.accept(&TokenKind::Comma) {
            vars.push(self.expect_name()?);
        }
        self.expect(&TokenKind::In)?;
        let exprs = self.parse_expr_list()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_block()?;
        let end = self.expect(&TokenKind::End)?;
        Ok(Stmt {
            kind: StmtKind::ForIn {
                vars,
                exprs,
                body,
            },
            span: start.merge(end.span),
        })
    }

    /// `function a.b.c(...)` / `function a.b:m(...)`. The method form gets
    /// an implicit leading `self` parameter.
    fn parse_func_decl(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Function)?;
        let mut path = vec![self.expect_name()?];
        let mut is_method = false;
        loop {
            if self.accept(&TokenKind::Dot) {
                path.push(self.expect_name()?);
            } else if self.accept(&TokenKind::Colon) {
                path.push(self.expect_name()?);
                is_method = true;
                break;
            } else {
                break;
            }
        }
        let mut body = self.parse_func_body(start)?;
        if is_method {
            let self_name = Name {
                name: "self".into(),
                span: Span::at(body.span.start),
            };
            body.params.insert(0, self_name);
        }
        let span = start.merge(body.span);
        Ok(Stmt {
            kind: StmtKind::FuncDecl {
                path,
                is_method,
                body,
            },
            span,
        })
    }

    fn parse_local(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Local)?;
        if self.accept(&TokenKind::Function) {
            let name = self.expect_name()?;
            let body = self.parse_func_body(start)?;
            let span = start.merge(body.span);
            return Ok(Stmt {
                kind: StmtKind::LocalFunc { name, body },
                span,
            });
        }
        let mut names = vec![self.expect_name()?];
        while self.accept(&TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        let mut values = Vec::new();
        if self.accept(&TokenKind::Assign) {
            values = self.parse_expr_list()?;
        }
        let span = start.merge(self.previous_span());
        Ok(Stmt {
            kind: StmtKind::Local { names, values },
            span,
        })
    }

    /// Parameter list and body, starting at `(`.
    pub(crate) fn parse_func_body(&mut self, start: Span) -> LuaResult<FuncBody> {
        let open = self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.check(&TokenKind::RightParen) {
            loop {
                if self.accept(&TokenKind::Dots) {
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_name()?);
                if !self.accept(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_close(&TokenKind::RightParen, "(", open.span)?;
        let block = self.parse_block()?;
        let end = self.expect(&TokenKind::End)?;
        Ok(FuncBody {
            params,
            is_vararg,
            block,
            span: start.merge(end.span),
        })
    }

    /// Assignment or call statement, disambiguated by what follows the
    /// parsed prefix expression.
    fn parse_expr_statement(&mut self) -> LuaResult<Stmt> {
        let start = self.current_span();
        let first = self.parse_suffixed_expr()?;
        if self.check(&TokenKind::Assign) || self.check(&TokenKind::Comma) {
            let mut targets = vec![first];
            while self.accept(&TokenKind::Comma) {
                targets.push(self.parse_suffixed_expr()?);
            }
            for target in &targets {
                if !matches!(
                    target.kind,
                    ExprKind::Var(_) | ExprKind::Index { .. } | ExprKind::Property { .. }
                ) {
                    return Err(self.parse_error(
                        ParseErrorKind::UnexpectedToken,
                        vec!["variable or field".to_string()],
                    ));
                }
            }
            self.expect(&TokenKind::Assign)?;
            let values = self.parse_expr_list()?;
            let span = start.merge(self.previous_span());
            return Ok(Stmt {
                kind: StmtKind::Assign { targets, values },
                span,
            });
        }
        match first.kind {
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
                let span = first.span;
                Ok(Stmt {
                    kind: StmtKind::Call(first),
                    span,
                })
            }
            _ => Err(self.parse_error(
                ParseErrorKind::UnexpectedToken,
                vec!["'='".to_string(), "call".to_string()],
            )),
        }
    }

    pub(crate) fn parse_expr_list(&mut self) -> LuaResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expression()?];
        while self.accept(&TokenKind::Comma) {
            exprs.push(self.parse_expression()?);
        }
        Ok(exprs)
    }
}
