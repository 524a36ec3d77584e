//! Code generation: scope-resolved AST → prototype tree.
//!
//! Register discipline: locals occupy the fixed registers the resolver
//! assigned; a next-temp pointer runs above them and resets to the
//! post-locals base after every statement, so statement temporaries never
//! bleed across statements. A peak high-water joins the resolver's local
//! maximum to form `max_registers`.

mod expr;
mod stmt;

use std::rc::Rc;

use smol_str::SmolStr;

use crate::compiler::ast::{Block, Chunk, FuncBody};
use crate::compiler::resolver::{FuncInfo, ScopeMap};
use crate::compiler::span::Span;
use crate::vm::error::{ErrorKind, LuaError, LuaResult};
use crate::vm::instruction::Instruction;
use crate::vm::proto::Prototype;

/// Per-function generation state; one per nesting level.
pub(crate) struct FuncState {
    pub instrs: Vec<Instruction>,
    pub protos: Vec<Rc<Prototype>>,
    pub info: FuncInfo,
    /// First register above the active locals; temps allocate from here.
    pub local_base: u32,
    pub free_reg: u32,
    pub peak_reg: u32,
    pub first_line: u32,
    pub last_line: u32,
}

impl FuncState {
    fn new(info: FuncInfo, span: Span) -> Self {
        let base = info.param_count;
        FuncState {
            instrs: Vec::new(),
            protos: Vec::new(),
            info,
            local_base: base,
            free_reg: base,
            peak_reg: base,
            first_line: span.start.line,
            last_line: span.end.line,
        }
    }
}

pub(crate) struct CodeGen<'a> {
    pub scope: &'a ScopeMap,
    pub chunk_name: SmolStr,
    pub funcs: Vec<FuncState>,
}

/// Generate the prototype tree for a resolved chunk.
pub fn generate(
    chunk: &Chunk,
    scope: &ScopeMap,
    chunk_name: &str,
) -> LuaResult<Rc<Prototype>> {
    let mut generator = CodeGen {
        scope,
        chunk_name: SmolStr::new(chunk_name),
        funcs: Vec::new(),
    };
    let info = generator.lookup_func_info(chunk.span)?;
    generator.gen_function_body(&chunk.block, info, chunk.span)
}

impl<'a> CodeGen<'a> {
    pub(crate) fn lookup_func_info(&self, span: Span) -> LuaResult<FuncInfo> {
        self.scope.func_info(span).cloned().ok_or_else(|| {
            LuaError::new(
                ErrorKind::Internal("unresolved function scope".to_string()),
                span.start,
                self.chunk_name.clone(),
            )
        })
    }

    pub(crate) fn fs(&mut self) -> &mut FuncState {
        self.funcs.last_mut().expect("function state")
    }

    pub(crate) fn emit(&mut self, instr: Instruction) {
        self.fs().instrs.push(instr);
    }

    pub(crate) fn alloc_temp(&mut self) -> u32 {
        let fs = self.fs();
        let reg = fs.free_reg;
        fs.free_reg += 1;
        if fs.free_reg > fs.peak_reg {
            fs.peak_reg = fs.free_reg;
        }
        reg
    }

    /// Make sure temps allocate strictly above `reg`.
    pub(crate) fn reserve_through(&mut self, reg: u32) {
        let fs = self.fs();
        if fs.free_reg < reg + 1 {
            fs.free_reg = reg + 1;
        }
        if fs.free_reg > fs.peak_reg {
            fs.peak_reg = fs.free_reg;
        }
    }

    /// Generate into a detached instruction buffer; used for the inline
    /// bodies of loops, branches and short-circuit operators.
    pub(crate) fn with_body(
        &mut self,
        r#gen: impl FnOnce(&mut Self) -> LuaResult<()>,
    ) -> LuaResult<Vec<Instruction>> {
        let outer = std::mem::take(&mut self.fs().instrs);
        let result = r#gen(self);
        let body = std::mem::replace(&mut self.fs().instrs, outer);
        result?;
        Ok(body)
    }

    /// Compile a nested function literal and return its prototype index in
    /// the current function.
    pub(crate) fn gen_closure_proto(&mut self, body: &FuncBody) -> LuaResult<u32> {
        let info = self.lookup_func_info(body.span)?;
        let proto = self.gen_function_body(&body.block, info, body.span)?;
        let fs = self.fs();
        fs.protos.push(proto);
        Ok((fs.protos.len() - 1) as u32)
    }

    fn gen_function_body(
        &mut self,
        block: &Block,
        info: FuncInfo,
        span: Span,
    ) -> LuaResult<Rc<Prototype>> {
        self.funcs.push(FuncState::new(info, span));
        for stmt in &block.stmts {
            self.gen_stmt(stmt)?;
        }
        // Implicit bare return falling off the end.
        let base = self.fs().free_reg;
        self.emit(Instruction::Return { base, count: 0 });
        let fs = self.funcs.pop().expect("function state");
        Ok(Rc::new(Prototype {
            instructions: fs.instrs,
            prototypes: fs.protos,
            upvalues: fs.info.upvalues.clone(),
            param_count: fs.info.param_count,
            is_vararg: fs.info.is_vararg,
            max_registers: fs.peak_reg.max(fs.info.max_local_register),
            source: self.chunk_name.clone(),
            first_line: fs.first_line,
            last_line: fs.last_line,
        }))
    }

    /// Generate a block's statements, closing cells for any locals it
    /// declared (registers are released on block exit, so live captures
    /// must move into their cells) and releasing the registers.
    pub(crate) fn gen_block(&mut self, block: &Block) -> LuaResult<()> {
        let base = self.fs().local_base;
        for stmt in &block.stmts {
            self.gen_stmt(stmt)?;
        }
        let fs = self.fs();
        let declared_locals = fs.local_base > base;
        let captures = fs.info.captures_locals;
        if declared_locals && captures {
            self.emit(Instruction::CloseUpvalues { from: base });
        }
        let fs = self.fs();
        fs.local_base = base;
        fs.free_reg = base;
        Ok(())
    }

    pub(crate) fn internal_error<T>(&self, message: &str, span: Span) -> LuaResult<T> {
        Err(LuaError::new(
            ErrorKind::Internal(message.to_string()),
            span.start,
            self.chunk_name.clone(),
        ))
    }
}
