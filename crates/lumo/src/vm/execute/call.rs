//! Calls, closures, frames and the loop instructions that drive calls.

use std::rc::Rc;

use smol_str::SmolStr;

use super::ExecFlow;
use crate::vm::error::{FrameTrace, LuaResult};
use crate::vm::instruction::Instruction;
use crate::vm::state::{Frame, LuaState, MAX_CALL_DEPTH};
use crate::vm::value::{LuaClosure, LuaValue};

impl LuaState {
    /// Arguments for a call at `base`: an exact count, or everything up to
    /// the frame top for the expanded (-1) encoding.
    pub(crate) fn collect_args(&self, base: u32, nargs: i32) -> Vec<LuaValue> {
        if nargs >= 0 {
            (0..nargs as u32)
                .map(|i| self.reg_clone(base + 1 + i))
                .collect()
        } else {
            let top = self.frame_top();
            (base as usize + 1..top)
                .map(|i| self.reg_clone(i as u32))
                .collect()
        }
    }

    /// Write call results back at `base` per the count convention.
    pub(crate) fn place_results(&mut self, base: u32, results: Vec<LuaValue>, nresults: i32) {
        match nresults {
            0 => {}
            n if n > 0 => {
                for i in 0..n as u32 {
                    let value = results.get(i as usize).cloned().unwrap_or(LuaValue::Nil);
                    self.set_reg(base + i, value);
                }
            }
            _ => {
                for (i, value) in results.iter().enumerate() {
                    self.set_reg(base + i as u32, value.clone());
                }
                self.set_frame_top(base as usize + results.len());
            }
        }
    }

    /// Call any callable value: closure, native function, or a value whose
    /// metatable supplies `__call`.
    pub fn call_value(
        &mut self,
        func: &LuaValue,
        args: Vec<LuaValue>,
        name: Option<&str>,
    ) -> LuaResult<Vec<LuaValue>> {
        match func {
            LuaValue::Function(closure) => {
                let closure = closure.clone();
                self.call_closure_named(&closure, args, name)
            }
            LuaValue::Native(native) => {
                let native = native.clone();
                if self.call_stack.len() >= MAX_CALL_DEPTH {
                    return self.runtime_error("stack overflow");
                }
                self.call_stack.push(FrameTrace {
                    source: self.current_source.clone(),
                    line: self.current_line,
                    name: Some(native.name.clone()),
                });
                let result = (native.func)(self, args);
                if result.is_ok() {
                    self.call_stack.pop();
                }
                result
            }
            other => {
                if let Some(handler) = self.get_metamethod(other, "__call") {
                    let mut call_args = Vec::with_capacity(args.len() + 1);
                    call_args.push(other.clone());
                    call_args.extend(args);
                    return self.call_value(&handler, call_args, name);
                }
                let described = match name {
                    Some(n) => {
                        format!("attempt to call a {} value ('{}')", other.type_name(), n)
                    }
                    None => format!("attempt to call a {} value", other.type_name()),
                };
                self.type_error(described)
            }
        }
    }

    pub fn call_closure(
        &mut self,
        closure: &Rc<LuaClosure>,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        self.call_closure_named(closure, args, None)
    }

    pub(crate) fn call_closure_named(
        &mut self,
        closure: &Rc<LuaClosure>,
        args: Vec<LuaValue>,
        name: Option<&str>,
    ) -> LuaResult<Vec<LuaValue>> {
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return self.runtime_error("stack overflow");
        }
        let proto = closure.proto.clone();
        let param_count = proto.param_count as usize;
        let mut registers =
            vec![LuaValue::Nil; (proto.max_registers as usize).max(param_count)];
        for (i, slot) in registers.iter_mut().take(param_count).enumerate() {
            if let Some(arg) = args.get(i) {
                *slot = arg.clone();
            }
        }
        let varargs = if proto.is_vararg && args.len() > param_count {
            args[param_count..].to_vec()
        } else {
            Vec::new()
        };

        // The trace frame records the call site; source switches to the
        // callee for everything it executes.
        self.call_stack.push(FrameTrace {
            source: self.current_source.clone(),
            line: self.current_line,
            name: name.map(SmolStr::new),
        });
        let saved_source = std::mem::replace(&mut self.current_source, proto.source.clone());
        let saved_line = self.current_line;
        self.current_line = proto.first_line;

        self.frames.push(Frame {
            registers,
            varargs,
            top: param_count,
            open_cells: Default::default(),
        });
        let frame_depth = self.frames.len();

        let flow = self.exec_block(&proto.instructions, closure);
        match flow {
            Ok(flow) => {
                let results = if flow == ExecFlow::Return {
                    std::mem::take(&mut self.return_buffer)
                } else {
                    Vec::new()
                };
                // Close any cells still aliasing this activation, then pop.
                self.unwind_frames(frame_depth - 1);
                self.call_stack.pop();
                self.current_source = saved_source;
                self.current_line = saved_line;
                Ok(results)
            }
            // On error the frames stay for the protected-call boundary (or
            // the embedding boundary) to unwind; the traceback was captured
            // at raise time.
            Err(err) => Err(err),
        }
    }

    /// Build a closure of child prototype `proto_index`, resolving each
    /// upvalue descriptor against the current activation.
    pub(crate) fn instantiate_closure(
        &mut self,
        parent: &Rc<LuaClosure>,
        proto_index: u32,
    ) -> LuaResult<LuaValue> {
        let Some(proto) = parent.proto.prototypes.get(proto_index as usize).cloned()
        else {
            return self.internal_error("closure prototype index out of range");
        };
        let mut upvalues = Vec::with_capacity(proto.upvalues.len());
        for desc in &proto.upvalues {
            let cell = match desc {
                crate::vm::proto::UpvalueDesc::ParentLocal { register, .. } => {
                    self.capture_cell(*register)
                }
                crate::vm::proto::UpvalueDesc::ParentUpvalue { index, .. } => {
                    match parent.upvalues.get(*index as usize) {
                        Some(cell) => *cell,
                        None => {
                            return self
                                .internal_error("upvalue descriptor index out of range");
                        }
                    }
                }
            };
            upvalues.push(cell);
        }
        Ok(LuaValue::Function(Rc::new(LuaClosure { proto, upvalues })))
    }

    // ---- loops driving calls ---------------------------------------

    pub(crate) fn exec_numeric_for(
        &mut self,
        base: u32,
        body: &[Instruction],
        closure: &Rc<LuaClosure>,
    ) -> LuaResult<ExecFlow> {
        let start = self.reg_clone(base);
        let limit = self.reg_clone(base + 1);
        let step = self.reg_clone(base + 2);

        let all_integer = matches!(
            (&start, &limit, &step),
            (
                LuaValue::Integer(_),
                LuaValue::Integer(_),
                LuaValue::Integer(_)
            )
        );
        if all_integer {
            let (mut counter, limit, step) = match (&start, &limit, &step) {
                (LuaValue::Integer(a), LuaValue::Integer(b), LuaValue::Integer(c)) => {
                    (*a, *b, *c)
                }
                _ => unreachable!(),
            };
            if step == 0 {
                return self.runtime_error("'for' step is zero");
            }
            loop {
                let done = if step > 0 {
                    counter > limit
                } else {
                    counter < limit
                };
                if done {
                    break;
                }
                self.set_reg(base + 3, LuaValue::Integer(counter));
                match self.exec_block(body, closure)? {
                    ExecFlow::Normal => {}
                    ExecFlow::Break => {
                        self.close_cells(base);
                        break;
                    }
                    ExecFlow::Return => return Ok(ExecFlow::Return),
                }
                match counter.checked_add(step) {
                    Some(next) => counter = next,
                    // The counter would wrap past the integer range; the
                    // loop terminates cleanly.
                    None => break,
                }
            }
            return Ok(ExecFlow::Normal);
        }

        let Some(mut counter) = start.as_number() else {
            return self.runtime_error("'for' initial value must be a number");
        };
        let Some(limit) = limit.as_number() else {
            return self.runtime_error("'for' limit must be a number");
        };
        let Some(step) = step.as_number() else {
            return self.runtime_error("'for' step must be a number");
        };
        if step == 0.0 {
            return self.runtime_error("'for' step is zero");
        }
        loop {
            let done = if step > 0.0 {
                !(counter <= limit)
            } else {
                !(counter >= limit)
            };
            if done {
                break;
            }
            self.set_reg(base + 3, LuaValue::Float(counter));
            match self.exec_block(body, closure)? {
                ExecFlow::Normal => {}
                ExecFlow::Break => {
                    self.close_cells(base);
                    break;
                }
                ExecFlow::Return => return Ok(ExecFlow::Return),
            }
            counter += step;
        }
        Ok(ExecFlow::Normal)
    }

    pub(crate) fn exec_generic_for(
        &mut self,
        base: u32,
        nvars: u32,
        body: &[Instruction],
        closure: &Rc<LuaClosure>,
    ) -> LuaResult<ExecFlow> {
        loop {
            let iterator = self.reg_clone(base);
            let state = self.reg_clone(base + 1);
            let control = self.reg_clone(base + 2);
            let results = self.call_value(&iterator, vec![state, control], None)?;
            let first = results.first().cloned().unwrap_or(LuaValue::Nil);
            if first.is_nil() {
                break;
            }
            self.set_reg(base + 2, first);
            for i in 0..nvars {
                let value = results.get(i as usize).cloned().unwrap_or(LuaValue::Nil);
                self.set_reg(base + 3 + i, value);
            }
            match self.exec_block(body, closure)? {
                ExecFlow::Normal => {}
                ExecFlow::Break => {
                    self.close_cells(base);
                    break;
                }
                ExecFlow::Return => return Ok(ExecFlow::Return),
            }
        }
        Ok(ExecFlow::Normal)
    }
}
