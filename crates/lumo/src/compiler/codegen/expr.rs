//! Expression code generation.

use smol_str::SmolStr;

use super::CodeGen;
use crate::compiler::ast::{BinOp, Expr, ExprKind, TableField, UnOp};
use crate::compiler::resolver::VarClass;
use crate::vm::instruction::{ArithOp, CompareOp, Constant, Instruction};
use crate::vm::value::LuaStr;

/// Array fields buffered per `SetList`, matching Lua's flush granularity.
const FIELDS_PER_FLUSH: u32 = 50;

impl<'a> CodeGen<'a> {
    /// Generate `expr` into register `dest`. Multi-value expressions are
    /// truncated to one value here; multi positions go through
    /// [`gen_expr_multi`](Self::gen_expr_multi).
    pub(crate) fn gen_expr(&mut self, expr: &Expr, dest: u32) -> crate::vm::error::LuaResult<()> {
        self.reserve_through(dest);
        match &expr.kind {
            ExprKind::Nil => self.emit(Instruction::LoadConstant {
                dest,
                constant: Constant::Nil,
            }),
            ExprKind::True => self.emit(Instruction::LoadBoolean { dest, value: true }),
            ExprKind::False => self.emit(Instruction::LoadBoolean { dest, value: false }),
            ExprKind::Int(i) => self.emit(Instruction::LoadConstant {
                dest,
                constant: Constant::Integer(*i),
            }),
            ExprKind::Float(f) => self.emit(Instruction::LoadConstant {
                dest,
                constant: Constant::Float(*f),
            }),
            ExprKind::Str(bytes) => self.emit(Instruction::LoadConstant {
                dest,
                constant: Constant::Str(LuaStr::from_bytes(bytes.clone())),
            }),
            ExprKind::Vararg => self.emit(Instruction::Vararg {
                base: dest,
                count: 1,
            }),
            ExprKind::Var(_) => {
                let class = match self.scope.var_class(expr.span) {
                    Some(class) => class.clone(),
                    None => return self.internal_error("unclassified variable", expr.span),
                };
                match class {
                    VarClass::Register(reg) => {
                        if reg != dest {
                            self.emit(Instruction::Move { dest, src: reg });
                        }
                    }
                    VarClass::CapturedLocal(reg) => {
                        self.emit(Instruction::GetOpenUpvalue {
                            dest,
                            register: reg,
                        });
                    }
                    VarClass::Upvalue(index) => {
                        self.emit(Instruction::GetUpvalue { dest, index });
                    }
                    VarClass::Global(name) => {
                        self.emit(Instruction::GetGlobal { dest, name });
                    }
                }
            }
            ExprKind::Paren(inner) => self.gen_expr(inner, dest)?,
            ExprKind::UnOp { op, operand } => {
                let saved = self.fs().free_reg;
                let src = self.alloc_temp();
                self.gen_expr(operand, src)?;
                let instr = match op {
                    UnOp::Not => Instruction::Not { dest, src },
                    UnOp::Neg => Instruction::Negate { dest, src },
                    UnOp::Len => Instruction::Length { dest, src },
                    UnOp::BNot => Instruction::BitNot { dest, src },
                };
                self.emit(instr);
                self.fs().free_reg = saved;
            }
            ExprKind::BinOp { op, lhs, rhs } => self.gen_binop(*op, lhs, rhs, dest)?,
            ExprKind::Index { table, key } => {
                let saved = self.fs().free_reg;
                let treg = self.alloc_temp();
                self.gen_expr(table, treg)?;
                let kreg = self.alloc_temp();
                self.gen_expr(key, kreg)?;
                self.emit(Instruction::GetTable {
                    dest,
                    table: treg,
                    key: kreg,
                });
                self.fs().free_reg = saved;
            }
            ExprKind::Property { table, field } => {
                let saved = self.fs().free_reg;
                let treg = self.alloc_temp();
                self.gen_expr(table, treg)?;
                self.emit(Instruction::GetField {
                    dest,
                    table: treg,
                    name: field.name.clone(),
                });
                self.fs().free_reg = saved;
            }
            ExprKind::Function(body) => {
                let proto = self.gen_closure_proto(body)?;
                self.emit(Instruction::Closure { dest, proto });
            }
            ExprKind::Table(fields) => self.gen_table(fields, dest)?,
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
                let saved = self.fs().free_reg;
                let base = self.alloc_temp();
                self.gen_call(expr, base, 1, false)?;
                if base != dest {
                    self.emit(Instruction::Move { dest, src: base });
                }
                self.fs().free_reg = saved;
            }
        }
        Ok(())
    }

    fn gen_binop(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        dest: u32,
    ) -> crate::vm::error::LuaResult<()> {
        // Short-circuit forms evaluate the right side lazily.
        if matches!(op, BinOp::And | BinOp::Or) {
            let saved = self.fs().free_reg;
            let src = self.alloc_temp();
            self.gen_expr(lhs, src)?;
            let rhs_body = self.with_body(|g| g.gen_expr(rhs, dest))?;
            let instr = if op == BinOp::And {
                Instruction::TestAnd {
                    dest,
                    src,
                    rhs_body,
                }
            } else {
                Instruction::TestOr {
                    dest,
                    src,
                    rhs_body,
                }
            };
            self.emit(instr);
            self.fs().free_reg = saved;
            return Ok(());
        }

        let saved = self.fs().free_reg;
        let l = self.alloc_temp();
        self.gen_expr(lhs, l)?;
        let r = self.alloc_temp();
        self.gen_expr(rhs, r)?;
        let instr = match op {
            BinOp::Add => Instruction::Arith { op: ArithOp::Add, dest, lhs: l, rhs: r },
            BinOp::Sub => Instruction::Arith { op: ArithOp::Sub, dest, lhs: l, rhs: r },
            BinOp::Mul => Instruction::Arith { op: ArithOp::Mul, dest, lhs: l, rhs: r },
            BinOp::Div => Instruction::Arith { op: ArithOp::Div, dest, lhs: l, rhs: r },
            BinOp::IDiv => Instruction::Arith { op: ArithOp::IDiv, dest, lhs: l, rhs: r },
            BinOp::Mod => Instruction::Arith { op: ArithOp::Mod, dest, lhs: l, rhs: r },
            BinOp::Pow => Instruction::Arith { op: ArithOp::Pow, dest, lhs: l, rhs: r },
            BinOp::BAnd => Instruction::Arith { op: ArithOp::BAnd, dest, lhs: l, rhs: r },
            BinOp::BOr => Instruction::Arith { op: ArithOp::BOr, dest, lhs: l, rhs: r },
            BinOp::BXor => Instruction::Arith { op: ArithOp::BXor, dest, lhs: l, rhs: r },
            BinOp::Shl => Instruction::Arith { op: ArithOp::Shl, dest, lhs: l, rhs: r },
            BinOp::Shr => Instruction::Arith { op: ArithOp::Shr, dest, lhs: l, rhs: r },
            BinOp::Concat => Instruction::Concatenate { dest, lhs: l, rhs: r },
            BinOp::Eq => Instruction::Compare { op: CompareOp::Eq, dest, lhs: l, rhs: r },
            BinOp::Ne => Instruction::Compare { op: CompareOp::Ne, dest, lhs: l, rhs: r },
            BinOp::Lt => Instruction::Compare { op: CompareOp::Lt, dest, lhs: l, rhs: r },
            BinOp::Le => Instruction::Compare { op: CompareOp::Le, dest, lhs: l, rhs: r },
            BinOp::Gt => Instruction::Compare { op: CompareOp::Gt, dest, lhs: l, rhs: r },
            BinOp::Ge => Instruction::Compare { op: CompareOp::Ge, dest, lhs: l, rhs: r },
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        };
        self.emit(instr);
        self.fs().free_reg = saved;
        Ok(())
    }

    /// Generate a call or method call with its callee/argument window at
    /// `base`. When `tail` is set, emits `TailCall` instead of `Call`.
    pub(crate) fn gen_call(
        &mut self,
        expr: &Expr,
        base: u32,
        nresults: i32,
        tail: bool,
    ) -> crate::vm::error::LuaResult<()> {
        self.reserve_through(base);
        match &expr.kind {
            ExprKind::Call { func, args } => {
                let name = callee_name(func);
                self.gen_expr(func, base)?;
                let nargs = self.gen_call_args(args, base + 1)?;
                self.emit_call(base, nargs, nresults, name, tail);
            }
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                self.gen_expr(object, base)?;
                self.reserve_through(base + 1);
                self.emit(Instruction::SelfPrep {
                    base,
                    object: base,
                    method: method.name.clone(),
                });
                // Arguments follow the implicit self.
                let nargs = self.gen_call_args(args, base + 2)?;
                let nargs = if nargs < 0 { nargs } else { nargs + 1 };
                self.emit_call(base, nargs, nresults, Some(method.name.clone()), tail);
            }
            _ => return self.internal_error("call generation on non-call", expr.span),
        }
        Ok(())
    }

    fn emit_call(
        &mut self,
        base: u32,
        nargs: i32,
        nresults: i32,
        name: Option<SmolStr>,
        tail: bool,
    ) {
        if tail {
            self.emit(Instruction::TailCall { base, nargs, name });
        } else {
            self.emit(Instruction::Call {
                base,
                nargs,
                nresults,
                name,
            });
        }
    }

    /// Lay out arguments from `first` upward. Returns the `nargs` encoding:
    /// an exact count, or -1 when the last argument expands.
    fn gen_call_args(&mut self, args: &[Expr], first: u32) -> crate::vm::error::LuaResult<i32> {
        for (i, arg) in args.iter().enumerate() {
            let target = first + i as u32;
            self.reserve_through(target);
            let last = i == args.len() - 1;
            if last && arg.is_multi() {
                self.gen_expr_multi(arg, target, -2)?;
                return Ok(-1);
            }
            self.gen_expr(arg, target)?;
        }
        Ok(args.len() as i32)
    }

    /// Generate a multi-value expression (call, method call or vararg)
    /// with the given result-count encoding.
    pub(crate) fn gen_expr_multi(
        &mut self,
        expr: &Expr,
        base: u32,
        want: i32,
    ) -> crate::vm::error::LuaResult<()> {
        self.reserve_through(base);
        match &expr.kind {
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
                self.gen_call(expr, base, want, false)
            }
            ExprKind::Vararg => {
                self.emit(Instruction::Vararg { base, count: want });
                Ok(())
            }
            _ => self.internal_error("multi-value generation on single-value", expr.span),
        }
    }

    /// Evaluate an expression list so that exactly `want` values land at
    /// `base..base+want`. Only the last expression expands; shortfalls pad
    /// with nil, surplus values are still evaluated for their effects.
    pub(crate) fn gen_values_adjusted(
        &mut self,
        values: &[Expr],
        base: u32,
        want: u32,
    ) -> crate::vm::error::LuaResult<()> {
        if values.is_empty() {
            if want > 0 {
                self.reserve_through(base + want - 1);
                self.emit(Instruction::LoadNil {
                    from: base,
                    to: base + want - 1,
                });
            }
            return Ok(());
        }
        for (i, value) in values.iter().enumerate() {
            let target = base + i as u32;
            self.reserve_through(target);
            let last = i == values.len() - 1;
            if !last {
                self.gen_expr(value, target)?;
                continue;
            }
            let remaining = want as i64 - i as i64;
            if value.is_multi() {
                let count = remaining.max(0) as i32;
                self.gen_expr_multi(value, target, count)?;
            } else {
                self.gen_expr(value, target)?;
                if remaining > 1 {
                    self.reserve_through(base + want - 1);
                    self.emit(Instruction::LoadNil {
                        from: target + 1,
                        to: base + want - 1,
                    });
                }
            }
        }
        Ok(())
    }

    /// Table constructor: array fields batch into `SetList` flushes, record
    /// fields store eagerly. Only the trailing array field expands.
    fn gen_table(
        &mut self,
        fields: &[TableField],
        dest: u32,
    ) -> crate::vm::error::LuaResult<()> {
        let array_hint = fields
            .iter()
            .filter(|f| matches!(f, TableField::List(_)))
            .count() as u32;
        let hash_hint = fields.len() as u32 - array_hint;
        self.emit(Instruction::NewTable {
            dest,
            array_hint,
            hash_hint,
        });

        let mut flushed: u32 = 0;
        let mut pending: u32 = 0;
        let mut batch_start: u32 = 0;
        let mut batch_saved: u32 = 0;

        for (i, field) in fields.iter().enumerate() {
            match field {
                TableField::List(value) => {
                    let last = i == fields.len() - 1;
                    if pending == 0 {
                        batch_saved = self.fs().free_reg;
                        batch_start = batch_saved;
                    }
                    let target = batch_start + pending;
                    self.reserve_through(target);
                    if last && value.is_multi() {
                        self.gen_expr_multi(value, target, -2)?;
                        self.emit(Instruction::SetList {
                            table: dest,
                            start: batch_start,
                            count: -1,
                            offset: flushed,
                        });
                        self.fs().free_reg = batch_saved;
                        return Ok(());
                    }
                    self.gen_expr(value, target)?;
                    pending += 1;
                    if pending == FIELDS_PER_FLUSH {
                        self.emit(Instruction::SetList {
                            table: dest,
                            start: batch_start,
                            count: pending as i32,
                            offset: flushed,
                        });
                        flushed += pending;
                        pending = 0;
                        self.fs().free_reg = batch_saved;
                    }
                }
                TableField::Record { key, value } => {
                    let saved = self.fs().free_reg;
                    if let ExprKind::Str(bytes) = &key.kind {
                        if let Ok(name) = std::str::from_utf8(bytes) {
                            let vreg = self.alloc_temp();
                            self.gen_expr(value, vreg)?;
                            self.emit(Instruction::SetField {
                                table: dest,
                                name: SmolStr::new(name),
                                value: vreg,
                            });
                            self.fs().free_reg = saved;
                            continue;
                        }
                    }
                    let kreg = self.alloc_temp();
                    self.gen_expr(key, kreg)?;
                    let vreg = self.alloc_temp();
                    self.gen_expr(value, vreg)?;
                    self.emit(Instruction::SetTable {
                        table: dest,
                        key: kreg,
                        value: vreg,
                    });
                    self.fs().free_reg = saved;
                }
            }
        }
        if pending > 0 {
            self.emit(Instruction::SetList {
                table: dest,
                start: batch_start,
                count: pending as i32,
                offset: flushed,
            });
            self.fs().free_reg = batch_saved;
        }
        Ok(())
    }

    /// Store `src` into a variable occurrence according to its class.
    pub(crate) fn gen_store_var(
        &mut self,
        expr: &Expr,
        src: u32,
    ) -> crate::vm::error::LuaResult<()> {
        let class = match self.scope.var_class(expr.span) {
            Some(class) => class.clone(),
            None => return self.internal_error("unclassified variable", expr.span),
        };
        match class {
            VarClass::Register(reg) => {
                if reg != src {
                    self.emit(Instruction::Move { dest: reg, src });
                }
            }
            VarClass::CapturedLocal(reg) => {
                self.emit(Instruction::SetOpenUpvalue { register: reg, src });
            }
            VarClass::Upvalue(index) => {
                self.emit(Instruction::SetUpvalue { index, src });
            }
            VarClass::Global(name) => {
                self.emit(Instruction::SetGlobal { name, src });
            }
        }
        Ok(())
    }
}

/// Static callee name for stack traces, when the call expression names one.
fn callee_name(func: &Expr) -> Option<SmolStr> {
    match &func.kind {
        ExprKind::Var(name) => Some(name.clone()),
        ExprKind::Property { field, .. } => Some(field.name.clone()),
        _ => None,
    }
}
