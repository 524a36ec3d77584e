//! Front-end pipeline: source text → tokens → AST → scope map → prototype
//! tree. Every stage is pure and reports errors with source positions.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod span;

use std::rc::Rc;

use crate::vm::error::LuaResult;
use crate::vm::proto::Prototype;

/// Compile a chunk to its root prototype.
pub fn compile(source: &str, chunk_name: &str) -> LuaResult<Rc<Prototype>> {
    let tokens = lexer::Lexer::new(source, chunk_name).tokenize()?;
    let chunk = parser::Parser::new(tokens, chunk_name).parse_chunk()?;
    let scope = resolver::resolve(&chunk, chunk_name)?;
    codegen::generate(&chunk, &scope, chunk_name)
}

/// Lex and parse only; used by tooling and tests that inspect the AST.
pub fn parse(source: &str, chunk_name: &str) -> LuaResult<ast::Chunk> {
    let tokens = lexer::Lexer::new(source, chunk_name).tokenize()?;
    parser::Parser::new(tokens, chunk_name).parse_chunk()
}
