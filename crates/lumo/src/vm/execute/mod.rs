//! The executor: recursive dispatch over tree-structured instructions with
//! an explicit register file per activation. Authoritative on truthiness,
//! coercion, metamethod dispatch and the multi-value conventions.

mod arith;
mod call;
mod table_ops;

use std::rc::Rc;

use crate::vm::instruction::{Constant, Instruction};
use crate::vm::state::LuaState;
use crate::vm::table::LuaTable;
use crate::vm::value::{LuaClosure, LuaValue};

/// Signal surfaced by a block to its enclosing construct. `Break` is
/// consumed by the nearest loop; `Return` unwinds to the activation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecFlow {
    Normal,
    Break,
    Return,
}

impl LuaState {
    // ---- register access -------------------------------------------

    pub(crate) fn reg_clone(&self, index: u32) -> LuaValue {
        match self.frames.last() {
            Some(frame) => frame
                .registers
                .get(index as usize)
                .cloned()
                .unwrap_or(LuaValue::Nil),
            None => LuaValue::Nil,
        }
    }

    pub(crate) fn set_reg(&mut self, index: u32, value: LuaValue) {
        if let Some(frame) = self.frames.last_mut() {
            let slot = index as usize;
            if slot >= frame.registers.len() {
                frame.registers.resize(slot + 1, LuaValue::Nil);
            }
            frame.registers[slot] = value;
        }
    }

    pub(crate) fn frame_top(&self) -> usize {
        self.frames.last().map(|f| f.top).unwrap_or(0)
    }

    pub(crate) fn set_frame_top(&mut self, top: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.top = top;
        }
    }

    // ---- dispatch ---------------------------------------------------

    pub(crate) fn exec_block(
        &mut self,
        instrs: &[Instruction],
        closure: &Rc<LuaClosure>,
    ) -> crate::vm::error::LuaResult<ExecFlow> {
        for instr in instrs {
            match instr {
                Instruction::LoadConstant { dest, constant } => {
                    let value = match constant {
                        Constant::Nil => LuaValue::Nil,
                        Constant::Boolean(b) => LuaValue::Boolean(*b),
                        Constant::Integer(i) => LuaValue::Integer(*i),
                        Constant::Float(f) => LuaValue::Float(*f),
                        Constant::Str(s) => LuaValue::Str(s.clone()),
                    };
                    self.set_reg(*dest, value);
                }
                Instruction::LoadBoolean { dest, value } => {
                    self.set_reg(*dest, LuaValue::Boolean(*value));
                }
                Instruction::LoadNil { from, to } => {
                    for reg in *from..=*to {
                        self.set_reg(reg, LuaValue::Nil);
                    }
                }
                Instruction::Move { dest, src } => {
                    let value = self.reg_clone(*src);
                    self.set_reg(*dest, value);
                }
                Instruction::GetGlobal { dest, name } => {
                    let value = self.get_global(name);
                    self.set_reg(*dest, value);
                }
                Instruction::SetGlobal { name, src } => {
                    let value = self.reg_clone(*src);
                    self.set_global(name, value);
                }
                Instruction::GetUpvalue { dest, index } => {
                    let cell = closure.upvalues[*index as usize];
                    let value = self.cell_get(cell);
                    self.set_reg(*dest, value);
                }
                Instruction::SetUpvalue { index, src } => {
                    let cell = closure.upvalues[*index as usize];
                    let value = self.reg_clone(*src);
                    self.cell_set(cell, value);
                }
                // Open cells alias their register, so captured locals read
                // and write the register directly while the frame lives.
                Instruction::GetOpenUpvalue { dest, register } => {
                    let value = self.reg_clone(*register);
                    self.set_reg(*dest, value);
                }
                Instruction::SetOpenUpvalue { register, src } => {
                    let value = self.reg_clone(*src);
                    self.set_reg(*register, value);
                }
                Instruction::CloseUpvalues { from } => {
                    self.close_cells(*from);
                }
                Instruction::NewTable {
                    dest,
                    array_hint,
                    hash_hint,
                } => {
                    let table = LuaTable::with_capacity(
                        *array_hint as usize,
                        *hash_hint as usize,
                    );
                    let id = self.alloc_table(table);
                    self.set_reg(*dest, LuaValue::Table(id));
                }
                Instruction::GetTable { dest, table, key } => {
                    let obj = self.reg_clone(*table);
                    let key = self.reg_clone(*key);
                    let value = self.index_value(&obj, &key)?;
                    self.set_reg(*dest, value);
                }
                Instruction::SetTable { table, key, value } => {
                    let obj = self.reg_clone(*table);
                    let key = self.reg_clone(*key);
                    let value = self.reg_clone(*value);
                    self.setindex_value(&obj, key, value)?;
                }
                Instruction::GetField { dest, table, name } => {
                    let obj = self.reg_clone(*table);
                    let key = LuaValue::str_from(name);
                    let value = self.index_value(&obj, &key)?;
                    self.set_reg(*dest, value);
                }
                Instruction::SetField { table, name, value } => {
                    let obj = self.reg_clone(*table);
                    let key = LuaValue::str_from(name);
                    let value = self.reg_clone(*value);
                    self.setindex_value(&obj, key, value)?;
                }
                Instruction::SetList {
                    table,
                    start,
                    count,
                    offset,
                } => {
                    let n = if *count >= 0 {
                        *count as usize
                    } else {
                        self.frame_top().saturating_sub(*start as usize)
                    };
                    let obj = self.reg_clone(*table);
                    let Some(id) = obj.as_table_ref() else {
                        return self.internal_error("SetList target is not a table");
                    };
                    for k in 0..n {
                        let value = self.reg_clone(*start + k as u32);
                        self.table_mut(id)
                            .raw_set_int(*offset as i64 + k as i64 + 1, value);
                    }
                }
                Instruction::Arith { op, dest, lhs, rhs } => {
                    let a = self.reg_clone(*lhs);
                    let b = self.reg_clone(*rhs);
                    let value = self.arith_values(*op, &a, &b)?;
                    self.set_reg(*dest, value);
                }
                Instruction::Compare { op, dest, lhs, rhs } => {
                    let a = self.reg_clone(*lhs);
                    let b = self.reg_clone(*rhs);
                    let value = self.compare_values(*op, &a, &b)?;
                    self.set_reg(*dest, LuaValue::Boolean(value));
                }
                Instruction::Not { dest, src } => {
                    let value = !self.reg_clone(*src).truthy();
                    self.set_reg(*dest, LuaValue::Boolean(value));
                }
                Instruction::Length { dest, src } => {
                    let value = self.reg_clone(*src);
                    let len = self.length_of(&value)?;
                    self.set_reg(*dest, len);
                }
                Instruction::Negate { dest, src } => {
                    let value = self.reg_clone(*src);
                    let negated = self.negate_value(&value)?;
                    self.set_reg(*dest, negated);
                }
                Instruction::BitNot { dest, src } => {
                    let value = self.reg_clone(*src);
                    let result = self.bitnot_value(&value)?;
                    self.set_reg(*dest, result);
                }
                Instruction::Concatenate { dest, lhs, rhs } => {
                    let a = self.reg_clone(*lhs);
                    let b = self.reg_clone(*rhs);
                    let value = self.concat_values(&a, &b)?;
                    self.set_reg(*dest, value);
                }
                Instruction::Test {
                    cond,
                    then_body,
                    else_body,
                } => {
                    let branch = if self.reg_clone(*cond).truthy() {
                        then_body
                    } else {
                        else_body
                    };
                    let flow = self.exec_block(branch, closure)?;
                    if flow != ExecFlow::Normal {
                        return Ok(flow);
                    }
                }
                Instruction::TestAnd {
                    dest,
                    src,
                    rhs_body,
                } => {
                    let left = self.reg_clone(*src);
                    if left.truthy() {
                        let flow = self.exec_block(rhs_body, closure)?;
                        if flow != ExecFlow::Normal {
                            return Ok(flow);
                        }
                    } else {
                        self.set_reg(*dest, left);
                    }
                }
                Instruction::TestOr {
                    dest,
                    src,
                    rhs_body,
                } => {
                    let left = self.reg_clone(*src);
                    if left.truthy() {
                        self.set_reg(*dest, left);
                    } else {
                        let flow = self.exec_block(rhs_body, closure)?;
                        if flow != ExecFlow::Normal {
                            return Ok(flow);
                        }
                    }
                }
                Instruction::WhileLoop {
                    cond_body,
                    cond,
                    body,
                    close,
                } => loop {
                    let flow = self.exec_block(cond_body, closure)?;
                    if flow != ExecFlow::Normal {
                        return Ok(flow);
                    }
                    if !self.reg_clone(*cond).truthy() {
                        break;
                    }
                    match self.exec_block(body, closure)? {
                        ExecFlow::Normal => {}
                        ExecFlow::Break => {
                            self.close_cells(*close);
                            break;
                        }
                        ExecFlow::Return => return Ok(ExecFlow::Return),
                    }
                },
                Instruction::RepeatLoop {
                    body,
                    cond_body,
                    cond,
                    close,
                } => loop {
                    match self.exec_block(body, closure)? {
                        ExecFlow::Normal => {}
                        ExecFlow::Break => {
                            self.close_cells(*close);
                            break;
                        }
                        ExecFlow::Return => return Ok(ExecFlow::Return),
                    }
                    let flow = self.exec_block(cond_body, closure)?;
                    if flow != ExecFlow::Normal {
                        return Ok(flow);
                    }
                    if self.reg_clone(*cond).truthy() {
                        break;
                    }
                },
                Instruction::NumericFor { base, body } => {
                    let flow = self.exec_numeric_for(*base, body, closure)?;
                    if flow == ExecFlow::Return {
                        return Ok(ExecFlow::Return);
                    }
                }
                Instruction::GenericFor { base, nvars, body } => {
                    let flow = self.exec_generic_for(*base, *nvars, body, closure)?;
                    if flow == ExecFlow::Return {
                        return Ok(ExecFlow::Return);
                    }
                }
                Instruction::Break => return Ok(ExecFlow::Break),
                Instruction::Closure { dest, proto } => {
                    let value = self.instantiate_closure(closure, *proto)?;
                    self.set_reg(*dest, value);
                }
                Instruction::Call {
                    base,
                    nargs,
                    nresults,
                    name,
                } => {
                    let func = self.reg_clone(*base);
                    let args = self.collect_args(*base, *nargs);
                    let results = self.call_value(&func, args, name.as_deref())?;
                    self.place_results(*base, results, *nresults);
                }
                Instruction::TailCall { base, nargs, name } => {
                    let func = self.reg_clone(*base);
                    let args = self.collect_args(*base, *nargs);
                    let results = self.call_value(&func, args, name.as_deref())?;
                    self.return_buffer = results;
                    return Ok(ExecFlow::Return);
                }
                Instruction::SelfPrep {
                    base,
                    object,
                    method,
                } => {
                    let obj = self.reg_clone(*object);
                    let key = LuaValue::str_from(method);
                    let callee = self.index_value(&obj, &key)?;
                    self.set_reg(*base, callee);
                    self.set_reg(*base + 1, obj);
                }
                Instruction::Vararg { base, count } => {
                    let varargs = self
                        .frames
                        .last()
                        .map(|f| f.varargs.clone())
                        .unwrap_or_default();
                    if *count >= 0 {
                        for i in 0..*count as usize {
                            let value =
                                varargs.get(i).cloned().unwrap_or(LuaValue::Nil);
                            self.set_reg(*base + i as u32, value);
                        }
                    } else {
                        for (i, value) in varargs.iter().enumerate() {
                            self.set_reg(*base + i as u32, value.clone());
                        }
                        self.set_frame_top(*base as usize + varargs.len());
                    }
                }
                Instruction::Return { base, count } => {
                    let values = if *count >= 0 {
                        (0..*count as u32)
                            .map(|i| self.reg_clone(*base + i))
                            .collect()
                    } else {
                        let top = self.frame_top();
                        (*base as usize..top)
                            .map(|i| self.reg_clone(i as u32))
                            .collect()
                    };
                    self.return_buffer = values;
                    return Ok(ExecFlow::Return);
                }
                Instruction::SourceLine { line } => {
                    self.current_line = *line;
                }
            }
        }
        Ok(ExecFlow::Normal)
    }
}
