//! Recursive-descent parser: token stream in, spanned AST out. Grammar,
//! precedence and associativity are enforced here; diagnostics carry the
//! expected set and the offending token.

mod expr;
mod stmt;

use smol_str::SmolStr;

use crate::compiler::ast::{Block, Chunk};
use crate::compiler::lexer::{Token, TokenKind};
use crate::compiler::span::{Position, Span};
use crate::vm::error::{
    ErrorKind, LuaError, LuaResult, ParseDetail, ParseErrorKind,
};

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    chunk_name: SmolStr,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, chunk_name: &str) -> Self {
        Parser {
            tokens,
            index: 0,
            chunk_name: SmolStr::new(chunk_name),
        }
    }

    pub fn parse_chunk(mut self) -> LuaResult<Chunk> {
        let start = self.current_span();
        let block = self.parse_block()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected_token(&["<eof>"]));
        }
        let span = if block.stmts.is_empty() {
            start
        } else {
            start.merge(block.span)
        };
        Ok(Chunk { block, span })
    }

    /// Statements until a block terminator. `return` must be the final
    /// statement of its block.
    pub(crate) fn parse_block(&mut self) -> LuaResult<Block> {
        let start = self.current_span();
        let mut stmts = Vec::new();
        loop {
            if self.block_follows() {
                break;
            }
            if self.accept(&TokenKind::Semicolon) {
                continue;
            }
            let is_return = self.check(&TokenKind::Return);
            let stmt = self.parse_statement()?;
            stmts.push(stmt);
            if is_return {
                self.accept(&TokenKind::Semicolon);
                if !self.block_follows() {
                    return Err(self.unexpected_token(&["'end'", "<eof>"]));
                }
                break;
            }
        }
        let span = match (stmts.first(), stmts.last()) {
            (Some(first), Some(last)) => first.span.merge(last.span),
            _ => Span::at(start.start),
        };
        Ok(Block { stmts, span })
    }

    fn block_follows(&self) -> bool {
        matches!(
            self.current(),
            TokenKind::Eof
                | TokenKind::End
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::Until
        )
    }

    // ---- cursor -----------------------------------------------------

    pub(crate) fn current(&self) -> &TokenKind {
        &self.tokens[self.index.min(self.tokens.len() - 1)].kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.index.min(self.tokens.len() - 1)].span
    }

    pub(crate) fn previous_span(&self) -> Span {
        if self.index == 0 {
            return self.current_span();
        }
        self.tokens[(self.index - 1).min(self.tokens.len() - 1)].span
    }

    pub(crate) fn peek(&self) -> &TokenKind {
        let next = (self.index + 1).min(self.tokens.len() - 1);
        &self.tokens[next].kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.tokens[self.index.min(self.tokens.len() - 1)].clone();
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(kind)
    }

    pub(crate) fn accept(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Require a fixed-spelling token (keyword, operator or delimiter).
    pub(crate) fn expect(&mut self, kind: &TokenKind) -> LuaResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.parse_error(
                ParseErrorKind::MissingKeyword(kind.lexeme()),
                vec![format!("'{}'", kind.lexeme())],
            ))
        }
    }

    /// Require a closing delimiter; a mismatch is reported as an unclosed
    /// group anchored at the opener.
    pub(crate) fn expect_close(
        &mut self,
        close: &TokenKind,
        open: &'static str,
        open_span: Span,
    ) -> LuaResult<Token> {
        if self.check(close) {
            Ok(self.advance())
        } else {
            let detail = ParseDetail {
                kind: ParseErrorKind::UnclosedGroup(open),
                expected: vec![format!("'{}'", close.lexeme())],
                found: self.current().describe(),
            };
            Err(LuaError::new(
                ErrorKind::Parse(detail),
                open_span.start,
                self.chunk_name.clone(),
            ))
        }
    }

    pub(crate) fn expect_name(&mut self) -> LuaResult<crate::compiler::ast::Name> {
        let span = self.current_span();
        match self.current().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(crate::compiler::ast::Name { name, span })
            }
            _ => Err(self.parse_error(ParseErrorKind::MissingName, vec!["name".to_string()])),
        }
    }

    // ---- diagnostics ------------------------------------------------

    pub(crate) fn parse_error(&self, kind: ParseErrorKind, expected: Vec<String>) -> LuaError {
        let detail = ParseDetail {
            kind,
            expected,
            found: self.current().describe(),
        };
        LuaError::new(
            ErrorKind::Parse(detail),
            self.error_position(),
            self.chunk_name.clone(),
        )
    }

    pub(crate) fn unexpected_token(&self, expected: &[&str]) -> LuaError {
        self.parse_error(
            ParseErrorKind::UnexpectedToken,
            expected.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn error_position(&self) -> Position {
        self.current_span().start
    }
}
