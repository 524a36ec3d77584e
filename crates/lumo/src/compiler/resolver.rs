//! Scope resolution: the pass between parsing and code generation.
//!
//! Walks the AST once and produces a [`ScopeMap`] the generator consumes:
//! a register for every local, a classification for every variable
//! occurrence, and per-function data (upvalue descriptors in first-use
//! order, parameter count, vararg flag, peak local register).
//!
//! Registers are assigned in declaration order; blocks release their
//! registers on exit so later statements at the outer level reuse the
//! slots. Loop variables count as locals of the loop body. Numeric and
//! generic `for` additionally reserve three internal registers below their
//! visible variables.

use ahash::AHashMap;
use smol_str::SmolStr;

use crate::compiler::ast::{
    Block, Chunk, Expr, ExprKind, FuncBody, Name, Stmt, StmtKind, TableField,
};
use crate::compiler::span::Span;
use crate::vm::error::{ErrorKind, LuaError, LuaResult};
use crate::vm::proto::UpvalueDesc;

/// Per-occurrence classification of a variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarClass {
    /// A local of the current function, read and written directly.
    Register(u32),
    /// A local of the current function that some inner function captures;
    /// accessed through its cell.
    CapturedLocal(u32),
    /// An upvalue of the current function, by descriptor index.
    Upvalue(u32),
    Global(SmolStr),
}

/// Resolved data for one function (the chunk counts as one).
#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub param_count: u32,
    pub is_vararg: bool,
    pub upvalues: Vec<UpvalueDesc>,
    /// Peak register taken by locals (loop internals included). The
    /// generator adds its temporary high-water on top.
    pub max_local_register: u32,
    /// True when any local of this function is captured by an inner
    /// function; drives cell-closing instruction emission.
    pub captures_locals: bool,
}

/// Output of resolution, keyed by AST spans (a span uniquely names an
/// occurrence).
#[derive(Debug, Default)]
pub struct ScopeMap {
    vars: AHashMap<(u32, u32), VarClass>,
    locals: AHashMap<(u32, u32), u32>,
    local_stmts: AHashMap<(u32, u32), Vec<u32>>,
    funcs: AHashMap<(u32, u32), FuncInfo>,
    loop_bases: AHashMap<(u32, u32), u32>,
}

impl ScopeMap {
    pub fn var_class(&self, span: Span) -> Option<&VarClass> {
        self.vars.get(&span.key())
    }

    /// Register of a declared local, keyed by the declaring `Name`'s span.
    pub fn local_register(&self, span: Span) -> Option<u32> {
        self.locals.get(&span.key()).copied()
    }

    /// Contiguous register list of one `local` statement.
    pub fn local_stmt_registers(&self, span: Span) -> Option<&[u32]> {
        self.local_stmts.get(&span.key()).map(|v| v.as_slice())
    }

    pub fn func_info(&self, span: Span) -> Option<&FuncInfo> {
        self.funcs.get(&span.key())
    }

    /// Base register (first internal slot) of a `for` statement.
    pub fn loop_base(&self, span: Span) -> Option<u32> {
        self.loop_bases.get(&span.key()).copied()
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }
}

struct LocalSlot {
    name: SmolStr,
    register: u32,
    captured: bool,
}

struct FuncScope {
    locals: Vec<LocalSlot>,
    block_starts: Vec<usize>,
    reg_starts: Vec<u32>,
    next_reg: u32,
    max_reg: u32,
    upvalues: Vec<UpvalueDesc>,
    is_vararg: bool,
    param_count: u32,
    captures_locals: bool,
    /// Loop nesting within this function; `break` is legal only above zero.
    /// Function literals start a fresh count, so a `break` inside a closure
    /// cannot target an enclosing function's loop.
    loop_depth: u32,
}

impl FuncScope {
    fn new(param_count: u32, is_vararg: bool) -> Self {
        FuncScope {
            locals: Vec::new(),
            block_starts: Vec::new(),
            reg_starts: Vec::new(),
            next_reg: 0,
            max_reg: param_count,
            upvalues: Vec::new(),
            is_vararg,
            param_count,
            captures_locals: false,
            loop_depth: 0,
        }
    }
}

pub struct Resolver {
    funcs: Vec<FuncScope>,
    map: ScopeMap,
    chunk_name: SmolStr,
}

/// Resolve a parsed chunk. The chunk itself is an implicit vararg function
/// whose info is keyed by the chunk's span.
pub fn resolve(chunk: &Chunk, chunk_name: &str) -> LuaResult<ScopeMap> {
    let mut resolver = Resolver {
        funcs: Vec::new(),
        map: ScopeMap::default(),
        chunk_name: SmolStr::new(chunk_name),
    };
    resolver.funcs.push(FuncScope::new(0, true));
    resolver.resolve_block(&chunk.block)?;
    let scope = resolver.funcs.pop().expect("chunk scope");
    resolver.record_func(chunk.span, scope);
    Ok(resolver.map)
}

impl Resolver {
    fn compile_error(&self, message: impl Into<String>, span: Span) -> LuaError {
        LuaError::new(
            ErrorKind::Compile(message.into()),
            span.start,
            self.chunk_name.clone(),
        )
    }

    fn record_func(&mut self, span: Span, scope: FuncScope) {
        self.map.funcs.insert(
            span.key(),
            FuncInfo {
                param_count: scope.param_count,
                is_vararg: scope.is_vararg,
                upvalues: scope.upvalues,
                max_local_register: scope.max_reg,
                captures_locals: scope.captures_locals,
            },
        );
    }

    fn current(&mut self) -> &mut FuncScope {
        self.funcs.last_mut().expect("function scope")
    }

    // ---- blocks and registers ---------------------------------------

    fn enter_block(&mut self) {
        let scope = self.current();
        scope.block_starts.push(scope.locals.len());
        scope.reg_starts.push(scope.next_reg);
    }

    fn exit_block(&mut self) {
        let scope = self.current();
        let locals_start = scope.block_starts.pop().unwrap_or(0);
        let reg_start = scope.reg_starts.pop().unwrap_or(0);
        scope.locals.truncate(locals_start);
        scope.next_reg = reg_start;
    }

    fn alloc_register(&mut self) -> u32 {
        let scope = self.current();
        let reg = scope.next_reg;
        scope.next_reg += 1;
        if scope.next_reg > scope.max_reg {
            scope.max_reg = scope.next_reg;
        }
        reg
    }

    fn declare_local(&mut self, name: &Name) -> u32 {
        let reg = self.alloc_register();
        self.current().locals.push(LocalSlot {
            name: name.name.clone(),
            register: reg,
            captured: false,
        });
        self.map.locals.insert(name.span.key(), reg);
        reg
    }

    // ---- variable classification ------------------------------------

    fn find_local(&self, func: usize, name: &SmolStr) -> Option<usize> {
        self.funcs[func]
            .locals
            .iter()
            .rposition(|slot| &slot.name == name)
    }

    /// Reuse an existing descriptor for `name` or append a new one. Within
    /// one function a free name always resolves to the same outer slot, so
    /// name-based reuse is exact.
    fn add_upvalue(&mut self, func: usize, desc: UpvalueDesc) -> u32 {
        if let Some(pos) = self.funcs[func]
            .upvalues
            .iter()
            .position(|existing| existing.name() == desc.name())
        {
            return pos as u32;
        }
        self.funcs[func].upvalues.push(desc);
        (self.funcs[func].upvalues.len() - 1) as u32
    }

    fn classify(&mut self, name: &SmolStr) -> VarClass {
        let depth = self.funcs.len() - 1;
        if let Some(idx) = self.find_local(depth, name) {
            let slot = &self.funcs[depth].locals[idx];
            return if slot.captured {
                VarClass::CapturedLocal(slot.register)
            } else {
                VarClass::Register(slot.register)
            };
        }
        for level in (0..depth).rev() {
            if let Some(idx) = self.find_local(level, name) {
                let slot = &mut self.funcs[level].locals[idx];
                slot.captured = true;
                let register = slot.register;
                self.funcs[level].captures_locals = true;
                let mut desc_index = self.add_upvalue(
                    level + 1,
                    UpvalueDesc::ParentLocal {
                        register,
                        name: name.clone(),
                    },
                );
                for mid in level + 2..=depth {
                    desc_index = self.add_upvalue(
                        mid,
                        UpvalueDesc::ParentUpvalue {
                            index: desc_index,
                            name: name.clone(),
                        },
                    );
                }
                return VarClass::Upvalue(desc_index);
            }
        }
        VarClass::Global(name.clone())
    }

    fn resolve_var(&mut self, name: &SmolStr, span: Span) {
        let class = self.classify(name);
        self.map.vars.insert(span.key(), class);
    }

    // ---- statements -------------------------------------------------

    fn resolve_block(&mut self, block: &Block) -> LuaResult<()> {
        self.enter_block();
        let result = self.resolve_stmts(&block.stmts);
        self.exit_block();
        result
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt]) -> LuaResult<()> {
        for stmt in stmts {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> LuaResult<()> {
        match &stmt.kind {
            StmtKind::Local { names, values } => {
                for value in values {
                    self.resolve_expr(value)?;
                }
                let mut regs = Vec::with_capacity(names.len());
                for name in names {
                    regs.push(self.declare_local(name));
                }
                self.map.local_stmts.insert(stmt.span.key(), regs);
            }
            StmtKind::LocalFunc { name, body } => {
                // The register exists before the body resolves, so the
                // function can capture itself for recursion.
                let reg = self.declare_local(name);
                self.map.local_stmts.insert(stmt.span.key(), vec![reg]);
                self.resolve_function(body)?;
            }
            StmtKind::Assign { targets, values } => {
                for target in targets {
                    self.resolve_expr(target)?;
                }
                for value in values {
                    self.resolve_expr(value)?;
                }
            }
            StmtKind::FuncDecl { path, body, .. } => {
                self.resolve_var(&path[0].name, path[0].span);
                self.resolve_function(body)?;
            }
            StmtKind::If {
                cond,
                then_block,
                elseifs,
                else_block,
            } => {
                self.resolve_expr(cond)?;
                self.resolve_block(then_block)?;
                for (c, b) in elseifs {
                    self.resolve_expr(c)?;
                    self.resolve_block(b)?;
                }
                if let Some(b) = else_block {
                    self.resolve_block(b)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.resolve_expr(cond)?;
                self.current().loop_depth += 1;
                let result = self.resolve_block(body);
                self.current().loop_depth -= 1;
                result?;
            }
            StmtKind::Repeat { body, cond } => {
                // The until-condition sees locals declared in the body.
                self.current().loop_depth += 1;
                self.enter_block();
                let result = self
                    .resolve_stmts(&body.stmts)
                    .and_then(|_| self.resolve_expr(cond));
                self.exit_block();
                self.current().loop_depth -= 1;
                result?;
            }
            StmtKind::ForNum {
                var,
                start,
                limit,
                step,
                body,
            } => {
                self.resolve_expr(start)?;
                self.resolve_expr(limit)?;
                if let Some(step) = step {
                    self.resolve_expr(step)?;
                }
                self.enter_block();
                let base = self.alloc_register();
                self.alloc_register();
                self.alloc_register();
                self.map.loop_bases.insert(stmt.span.key(), base);
                self.declare_local(var);
                self.current().loop_depth += 1;
                let result = self.resolve_stmts(&body.stmts);
                self.current().loop_depth -= 1;
                self.exit_block();
                result?;
            }
            StmtKind::ForIn { vars, exprs, body } => {
                for expr in exprs {
                    self.resolve_expr(expr)?;
                }
                self.enter_block();
                let base = self.alloc_register();
                self.alloc_register();
                self.alloc_register();
                self.map.loop_bases.insert(stmt.span.key(), base);
                for var in vars {
                    self.declare_local(var);
                }
                self.current().loop_depth += 1;
                let result = self.resolve_stmts(&body.stmts);
                self.current().loop_depth -= 1;
                self.exit_block();
                result?;
            }
            StmtKind::Do { body } => self.resolve_block(body)?,
            StmtKind::Call(expr) => self.resolve_expr(expr)?,
            StmtKind::Return { values } => {
                for value in values {
                    self.resolve_expr(value)?;
                }
            }
            StmtKind::Break => {
                if self.current().loop_depth == 0 {
                    return Err(
                        self.compile_error("'break' outside a loop", stmt.span)
                    );
                }
            }
            StmtKind::Goto(name) => {
                return Err(self.compile_error(
                    format!("goto '{}' is not supported", name.name),
                    stmt.span,
                ));
            }
            StmtKind::Label(name) => {
                return Err(self.compile_error(
                    format!("label '{}' is not supported", name.name),
                    stmt.span,
                ));
            }
        }
        Ok(())
    }

    // ---- expressions ------------------------------------------------

    fn resolve_expr(&mut self, expr: &Expr) -> LuaResult<()> {
        match &expr.kind {
            ExprKind::Nil
            | ExprKind::True
            | ExprKind::False
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_) => {}
            ExprKind::Vararg => {
                if !self.funcs.last().map(|f| f.is_vararg).unwrap_or(false) {
                    return Err(self.compile_error(
                        "cannot use '...' outside a vararg function",
                        expr.span,
                    ));
                }
            }
            ExprKind::Var(name) => self.resolve_var(name, expr.span),
            ExprKind::BinOp { lhs, rhs, .. } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)?;
            }
            ExprKind::UnOp { operand, .. } => self.resolve_expr(operand)?,
            ExprKind::Table(fields) => {
                for field in fields {
                    match field {
                        TableField::List(value) => self.resolve_expr(value)?,
                        TableField::Record { key, value } => {
                            self.resolve_expr(key)?;
                            self.resolve_expr(value)?;
                        }
                    }
                }
            }
            ExprKind::Call { func, args } => {
                self.resolve_expr(func)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
            }
            ExprKind::MethodCall { object, args, .. } => {
                self.resolve_expr(object)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
            }
            ExprKind::Index { table, key } => {
                self.resolve_expr(table)?;
                self.resolve_expr(key)?;
            }
            ExprKind::Property { table, .. } => self.resolve_expr(table)?,
            ExprKind::Function(body) => self.resolve_function(body)?,
            ExprKind::Paren(inner) => self.resolve_expr(inner)?,
        }
        Ok(())
    }

    fn resolve_function(&mut self, body: &FuncBody) -> LuaResult<()> {
        self.funcs
            .push(FuncScope::new(body.params.len() as u32, body.is_vararg));
        self.enter_block();
        for param in &body.params {
            self.declare_local(param);
        }
        let result = self.resolve_stmts(&body.block.stmts);
        self.exit_block();
        let scope = self.funcs.pop().expect("function scope");
        result?;
        self.record_func(body.span, scope);
        Ok(())
    }
}
