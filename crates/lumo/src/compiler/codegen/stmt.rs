//! Statement code generation.

use super::CodeGen;
use crate::compiler::ast::{Block, Expr, ExprKind, Stmt, StmtKind};
use crate::vm::error::LuaResult;
use crate::vm::instruction::{Constant, Instruction};

impl<'a> CodeGen<'a> {
    pub(crate) fn gen_stmt(&mut self, stmt: &Stmt) -> LuaResult<()> {
        self.emit(Instruction::SourceLine {
            line: stmt.span.start.line,
        });
        match &stmt.kind {
            StmtKind::Local { names, values } => self.gen_local(stmt, names.len(), values)?,
            StmtKind::LocalFunc { name, body } => {
                let Some(reg) = self.scope.local_register(name.span) else {
                    return self.internal_error("unresolved local function", name.span);
                };
                // The register is live before the closure is built, so the
                // body can capture it and recurse.
                let proto = self.gen_closure_proto(body)?;
                self.emit(Instruction::Closure { dest: reg, proto });
                let fs = self.fs();
                fs.local_base = fs.local_base.max(reg + 1);
            }
            StmtKind::Assign { targets, values } => self.gen_assign(targets, values)?,
            StmtKind::FuncDecl { path, body, .. } => self.gen_func_decl(path, body)?,
            StmtKind::If {
                cond,
                then_block,
                elseifs,
                else_block,
            } => self.gen_if(cond, then_block, elseifs, else_block.as_ref())?,
            StmtKind::While { cond, body } => {
                let close = self.fs().local_base;
                let saved = self.fs().free_reg;
                let creg = self.alloc_temp();
                let cond_body = self.with_body(|g| g.gen_expr(cond, creg))?;
                let loop_body = self.with_body(|g| g.gen_block(body))?;
                self.emit(Instruction::WhileLoop {
                    cond_body,
                    cond: creg,
                    body: loop_body,
                    close,
                });
                self.fs().free_reg = saved;
            }
            StmtKind::Repeat { body, cond } => self.gen_repeat(body, cond)?,
            StmtKind::ForNum {
                start,
                limit,
                step,
                body,
                ..
            } => self.gen_for_num(stmt, start, limit, step.as_ref(), body)?,
            StmtKind::ForIn {
                vars, exprs, body, ..
            } => self.gen_for_in(stmt, vars.len() as u32, exprs, body)?,
            StmtKind::Do { body } => self.gen_block(body)?,
            StmtKind::Call(call) => {
                let saved = self.fs().free_reg;
                let base = self.alloc_temp();
                self.gen_call(call, base, 0, false)?;
                self.fs().free_reg = saved;
            }
            StmtKind::Return { values } => self.gen_return(values)?,
            StmtKind::Break => self.emit(Instruction::Break),
            // Rejected during resolution; unreachable here.
            StmtKind::Goto(_) | StmtKind::Label(_) => {
                return self.internal_error("goto/label reached codegen", stmt.span);
            }
        }
        // Statement temporaries never bleed into the next statement.
        let fs = self.fs();
        fs.free_reg = fs.local_base;
        Ok(())
    }

    fn gen_local(
        &mut self,
        stmt: &Stmt,
        count: usize,
        values: &[Expr],
    ) -> LuaResult<()> {
        let regs = match self.scope.local_stmt_registers(stmt.span) {
            Some(regs) => regs.to_vec(),
            None => return self.internal_error("unresolved local statement", stmt.span),
        };
        debug_assert_eq!(regs.len(), count);
        let base = regs[0];
        // Fresh registers; old bindings of the same names live elsewhere,
        // so values can be generated straight into place.
        self.gen_values_adjusted(values, base, regs.len() as u32)?;
        let last = *regs.last().unwrap_or(&base);
        let fs = self.fs();
        fs.local_base = fs.local_base.max(last + 1);
        Ok(())
    }

    /// Multi-assignment: target prefixes evaluate first, then all values
    /// into temporaries, then the stores.
    fn gen_assign(&mut self, targets: &[Expr], values: &[Expr]) -> LuaResult<()> {
        enum Prepared {
            Var(usize),
            Field { table: u32, name: smol_str::SmolStr },
            Index { table: u32, key: u32 },
        }

        let mut prepared = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            match &target.kind {
                ExprKind::Var(_) => prepared.push(Prepared::Var(i)),
                ExprKind::Property { table, field } => {
                    let treg = self.alloc_temp();
                    self.gen_expr(table, treg)?;
                    prepared.push(Prepared::Field {
                        table: treg,
                        name: field.name.clone(),
                    });
                }
                ExprKind::Index { table, key } => {
                    let treg = self.alloc_temp();
                    self.gen_expr(table, treg)?;
                    let kreg = self.alloc_temp();
                    self.gen_expr(key, kreg)?;
                    prepared.push(Prepared::Index {
                        table: treg,
                        key: kreg,
                    });
                }
                _ => return self.internal_error("invalid assignment target", target.span),
            }
        }

        let vbase = self.fs().free_reg;
        let want = targets.len() as u32;
        self.reserve_through(vbase + want.saturating_sub(1));
        self.gen_values_adjusted(values, vbase, want)?;

        for (i, slot) in prepared.into_iter().enumerate() {
            let src = vbase + i as u32;
            match slot {
                Prepared::Var(idx) => self.gen_store_var(&targets[idx], src)?,
                Prepared::Field { table, name } => {
                    self.emit(Instruction::SetField {
                        table,
                        name,
                        value: src,
                    });
                }
                Prepared::Index { table, key } => {
                    self.emit(Instruction::SetTable {
                        table,
                        key,
                        value: src,
                    });
                }
            }
        }
        Ok(())
    }

    /// `function a.b.c(...)`: closure stored through the dotted path.
    fn gen_func_decl(
        &mut self,
        path: &[crate::compiler::ast::Name],
        body: &crate::compiler::ast::FuncBody,
    ) -> LuaResult<()> {
        let saved = self.fs().free_reg;
        let proto = self.gen_closure_proto(body)?;
        if path.len() == 1 {
            let creg = self.alloc_temp();
            self.emit(Instruction::Closure { dest: creg, proto });
            let target = Expr {
                kind: ExprKind::Var(path[0].name.clone()),
                span: path[0].span,
            };
            self.gen_store_var(&target, creg)?;
        } else {
            let treg = self.alloc_temp();
            let head = Expr {
                kind: ExprKind::Var(path[0].name.clone()),
                span: path[0].span,
            };
            self.gen_expr(&head, treg)?;
            let mut current = treg;
            for middle in &path[1..path.len() - 1] {
                let next = self.alloc_temp();
                self.emit(Instruction::GetField {
                    dest: next,
                    table: current,
                    name: middle.name.clone(),
                });
                current = next;
            }
            let creg = self.alloc_temp();
            self.emit(Instruction::Closure { dest: creg, proto });
            self.emit(Instruction::SetField {
                table: current,
                name: path[path.len() - 1].name.clone(),
                value: creg,
            });
        }
        self.fs().free_reg = saved;
        Ok(())
    }

    /// `if` chains lower to nested `Test` trees; each `elseif` becomes the
    /// `Test` at the head of the previous branch's else body.
    fn gen_if(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        elseifs: &[(Expr, Block)],
        else_block: Option<&Block>,
    ) -> LuaResult<()> {
        let saved = self.fs().free_reg;
        let creg = self.alloc_temp();
        self.gen_expr(cond, creg)?;
        let then_body = self.with_body(|g| g.gen_block(then_block))?;
        let else_body = if let Some((next_cond, next_block)) = elseifs.first() {
            self.with_body(|g| g.gen_if(next_cond, next_block, &elseifs[1..], else_block))?
        } else if let Some(block) = else_block {
            self.with_body(|g| g.gen_block(block))?
        } else {
            Vec::new()
        };
        self.emit(Instruction::Test {
            cond: creg,
            then_body,
            else_body,
        });
        self.fs().free_reg = saved;
        Ok(())
    }

    /// `repeat`: the condition evaluates inside the loop scope, so the
    /// body block stays open until after it; cell closing runs after the
    /// condition instead of at block end.
    fn gen_repeat(&mut self, body: &Block, cond: &Expr) -> LuaResult<()> {
        let close = self.fs().local_base;
        let saved = self.fs().free_reg;
        let outer_base = self.fs().local_base;
        let loop_body = self.with_body(|g| {
            for stmt in &body.stmts {
                g.gen_stmt(stmt)?;
            }
            Ok(())
        })?;
        let creg = self.alloc_temp();
        let cond_body = self.with_body(|g| {
            g.gen_expr(cond, creg)?;
            if g.fs().info.captures_locals {
                g.emit(Instruction::CloseUpvalues { from: close });
            }
            Ok(())
        })?;
        let fs = self.fs();
        fs.local_base = outer_base;
        fs.free_reg = saved;
        self.emit(Instruction::RepeatLoop {
            body: loop_body,
            cond_body,
            cond: creg,
            close,
        });
        Ok(())
    }

    fn gen_for_num(
        &mut self,
        stmt: &Stmt,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &Block,
    ) -> LuaResult<()> {
        let Some(base) = self.scope.loop_base(stmt.span) else {
            return self.internal_error("unresolved numeric for", stmt.span);
        };
        // counter/limit/step evaluate in the enclosing scope.
        self.reserve_through(base);
        self.gen_expr(start, base)?;
        self.reserve_through(base + 1);
        self.gen_expr(limit, base + 1)?;
        self.reserve_through(base + 2);
        match step {
            Some(step) => self.gen_expr(step, base + 2)?,
            None => self.emit(Instruction::LoadConstant {
                dest: base + 2,
                constant: Constant::Integer(1),
            }),
        }
        let outer_base = self.fs().local_base;
        let fs = self.fs();
        fs.local_base = base + 4;
        fs.free_reg = base + 4;
        if fs.peak_reg < base + 4 {
            fs.peak_reg = base + 4;
        }
        let loop_body = self.gen_loop_body(body, base)?;
        let fs = self.fs();
        fs.local_base = outer_base;
        fs.free_reg = outer_base;
        self.emit(Instruction::NumericFor {
            base,
            body: loop_body,
        });
        Ok(())
    }

    fn gen_for_in(
        &mut self,
        stmt: &Stmt,
        nvars: u32,
        exprs: &[Expr],
        body: &Block,
    ) -> LuaResult<()> {
        let Some(base) = self.scope.loop_base(stmt.span) else {
            return self.internal_error("unresolved generic for", stmt.span);
        };
        // Iterator expression list adjusts to (iterator, state, control).
        self.reserve_through(base);
        self.gen_values_adjusted(exprs, base, 3)?;
        let outer_base = self.fs().local_base;
        let fs = self.fs();
        fs.local_base = base + 3 + nvars;
        fs.free_reg = base + 3 + nvars;
        if fs.peak_reg < base + 3 + nvars {
            fs.peak_reg = base + 3 + nvars;
        }
        let loop_body = self.gen_loop_body(body, base)?;
        let fs = self.fs();
        fs.local_base = outer_base;
        fs.free_reg = outer_base;
        self.emit(Instruction::GenericFor {
            base,
            nvars,
            body: loop_body,
        });
        Ok(())
    }

    /// Loop body with per-iteration cell closing: captures made in one
    /// iteration must not alias the next iteration's registers.
    fn gen_loop_body(
        &mut self,
        body: &Block,
        close_from: u32,
    ) -> LuaResult<Vec<Instruction>> {
        self.with_body(|g| {
            let base = g.fs().local_base;
            for stmt in &body.stmts {
                g.gen_stmt(stmt)?;
            }
            if g.fs().info.captures_locals {
                g.emit(Instruction::CloseUpvalues { from: close_from });
            }
            let fs = g.fs();
            fs.local_base = base;
            fs.free_reg = base;
            Ok(())
        })
    }

    fn gen_return(&mut self, values: &[Expr]) -> LuaResult<()> {
        // `return f(...)` forwards every result of the call.
        if values.len() == 1 && values[0].is_multi() {
            if let ExprKind::Vararg = values[0].kind {
                let base = self.fs().free_reg;
                self.reserve_through(base);
                self.emit(Instruction::Vararg { base, count: -1 });
                self.emit(Instruction::Return { base, count: -1 });
                return Ok(());
            }
            let base = self.fs().free_reg;
            self.gen_call(&values[0], base, -1, true)?;
            return Ok(());
        }
        let base = self.fs().free_reg;
        if values.is_empty() {
            self.emit(Instruction::Return { base, count: 0 });
            return Ok(());
        }
        let mut count = values.len() as i32;
        for (i, value) in values.iter().enumerate() {
            let target = base + i as u32;
            self.reserve_through(target);
            let last = i == values.len() - 1;
            if last && value.is_multi() {
                self.gen_expr_multi(value, target, -1)?;
                count = -1;
            } else {
                self.gen_expr(value, target)?;
            }
        }
        self.emit(Instruction::Return { base, count });
        Ok(())
    }
}
