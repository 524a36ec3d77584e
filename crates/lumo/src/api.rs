//! The embedding surface: evaluation entry points, dotted-path access to
//! globals, host-function registration and the host↔VM value encoding.

use std::any::Any;
use std::collections::HashSet;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::vm::error::{LuaError, LuaResult};
use crate::vm::proto::Prototype;
use crate::vm::state::LuaState;
use crate::vm::table::LuaTable;
use crate::vm::value::{LuaClosure, LuaStr, LuaValue, NativeFn, NativeFunction};

/// An immutable compiled chunk, reusable across executions. Prototypes
/// hold no runtime identity, so a handle outlives any particular state.
pub type ChunkHandle = Rc<Prototype>;

/// Host-side value for the encoding contract. `encode` turns one into a VM
/// value inside a state; `decode` walks a VM value back out (tracking
/// visited tables, so cyclic structures fail cleanly instead of looping).
pub enum HostValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<HostValue>),
    /// String-keyed map entries.
    Map(Vec<(String, HostValue)>),
    Function { name: String, func: NativeFn },
    Userdata(Rc<dyn Any>),
}

impl LuaState {
    // ---- evaluation -------------------------------------------------

    /// Compile and run a source string: lex → parse → compile → execute.
    pub fn eval(&mut self, source: &str) -> LuaResult<Vec<LuaValue>> {
        self.eval_named(source, "chunk")
    }

    pub fn eval_named(&mut self, source: &str, name: &str) -> LuaResult<Vec<LuaValue>> {
        let chunk = self.compile(source, name)?;
        self.eval_chunk(&chunk)
    }

    /// Compile only; the handle can be executed any number of times.
    pub fn load_chunk(&mut self, source: &str, name: &str) -> LuaResult<ChunkHandle> {
        self.compile(source, name)
    }

    /// Execute a previously compiled chunk.
    pub fn eval_chunk(&mut self, chunk: &ChunkHandle) -> LuaResult<Vec<LuaValue>> {
        let closure = Rc::new(LuaClosure {
            proto: chunk.clone(),
            upvalues: Vec::new(),
        });
        let saved_frames = self.frames.len();
        let saved_stack = self.call_stack.len();
        let saved_source = self.current_source.clone();
        let saved_line = self.current_line;
        self.current_source = chunk.source.clone();
        self.current_line = chunk.first_line;
        let result = self.call_closure(&closure, Vec::new());
        if result.is_err() {
            self.unwind_frames(saved_frames);
            self.call_stack.truncate(saved_stack);
        }
        self.current_source = saved_source;
        self.current_line = saved_line;
        result
    }

    /// Render an error report, with a source snippet when the state still
    /// holds the chunk's text.
    pub fn format_error(&self, error: &LuaError, color: bool) -> String {
        let text = self.source_text(error.source.as_str());
        crate::vm::diagnostics::render(error, text, color)
    }

    // ---- dotted-path access ----------------------------------------

    /// Deep-set through a dotted path from the globals, creating
    /// intermediate tables as needed.
    pub fn set(&mut self, path: &str, value: LuaValue) -> LuaResult<()> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(pair) => pair,
            None => return self.type_error("empty path"),
        };
        if parents.is_empty() {
            self.set_global(last, value);
            return Ok(());
        }
        let mut current = match self.get_global(parents[0]) {
            LuaValue::Nil => {
                let table = self.new_table();
                self.set_global(parents[0], table.clone());
                table
            }
            existing => existing,
        };
        for segment in &parents[1..] {
            let Some(id) = current.as_table_ref() else {
                return self.type_error(format!(
                    "path segment '{}' is not a table",
                    segment
                ));
            };
            let next = self.table(id).raw_get_str(segment);
            current = if next.is_nil() {
                let created = self.new_table();
                self.table_mut(id).raw_set_str(segment, created.clone());
                created
            } else {
                next
            };
        }
        let Some(id) = current.as_table_ref() else {
            return self.type_error(format!("path '{}' does not reach a table", path));
        };
        self.table_mut(id).raw_set_str(last, value);
        Ok(())
    }

    /// Dotted-path read from the globals; nil when any segment is absent.
    pub fn get(&self, path: &str) -> LuaValue {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return LuaValue::Nil;
        };
        let mut current = self.get_global(first);
        for segment in segments {
            let Some(id) = current.as_table_ref() else {
                return LuaValue::Nil;
            };
            current = self.table(id).raw_get_str(segment);
        }
        current
    }

    /// Look up a function by dotted path and call it.
    pub fn call_function(
        &mut self,
        path: &str,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        let func = self.get(path);
        let name = path.rsplit('.').next().unwrap_or(path);
        self.call_value(&func, args, Some(name))
    }

    /// Install a host function at a dotted path, auto-creating tables.
    pub fn register_function<F>(&mut self, path: &str, func: F) -> LuaResult<()>
    where
        F: Fn(&mut LuaState, Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> + 'static,
    {
        let name = path.rsplit('.').next().unwrap_or(path);
        let value = LuaValue::Native(Rc::new(NativeFunction {
            name: SmolStr::new(name),
            func: Rc::new(func),
        }));
        self.set(path, value)
    }

    // ---- encoding ---------------------------------------------------

    /// Encode a host value into this state.
    pub fn encode(&mut self, value: HostValue) -> LuaResult<LuaValue> {
        Ok(match value {
            HostValue::Nil => LuaValue::Nil,
            HostValue::Boolean(b) => LuaValue::Boolean(b),
            HostValue::Integer(i) => LuaValue::Integer(i),
            HostValue::Float(f) => LuaValue::Float(f),
            HostValue::Str(s) => LuaValue::str_from(&s),
            HostValue::Bytes(bytes) => LuaValue::str_from_bytes(bytes),
            HostValue::List(items) => {
                let id = self.alloc_table(LuaTable::with_capacity(items.len(), 0));
                for (i, item) in items.into_iter().enumerate() {
                    let encoded = self.encode(item)?;
                    self.table_mut(id).raw_set_int(i as i64 + 1, encoded);
                }
                LuaValue::Table(id)
            }
            HostValue::Map(entries) => {
                let id = self.alloc_table(LuaTable::with_capacity(0, entries.len()));
                for (key, item) in entries {
                    let encoded = self.encode(item)?;
                    self.table_mut(id).raw_set_str(&key, encoded);
                }
                LuaValue::Table(id)
            }
            HostValue::Function { name, func } => LuaValue::Native(Rc::new(
                NativeFunction {
                    name: SmolStr::new(&name),
                    func,
                },
            )),
            HostValue::Userdata(data) => self.alloc_userdata(data),
        })
    }

    /// Decode a VM value for the host. Table graphs are walked with a
    /// visited set; a cycle is an error rather than a hang.
    pub fn decode(&self, value: &LuaValue) -> LuaResult<HostValue> {
        let mut visited = HashSet::new();
        self.decode_inner(value, &mut visited)
    }

    fn decode_inner(
        &self,
        value: &LuaValue,
        visited: &mut HashSet<u32>,
    ) -> LuaResult<HostValue> {
        Ok(match value {
            LuaValue::Nil => HostValue::Nil,
            LuaValue::Boolean(b) => HostValue::Boolean(*b),
            LuaValue::Integer(i) => HostValue::Integer(*i),
            LuaValue::Float(f) => HostValue::Float(*f),
            LuaValue::Str(s) => match s.as_str() {
                Some(text) => HostValue::Str(text.to_string()),
                None => HostValue::Bytes(s.as_bytes().to_vec()),
            },
            LuaValue::Table(id) => {
                if !visited.insert(*id) {
                    return self.type_error("cannot decode a cyclic table");
                }
                let table = self.table(*id);
                let length = table.length();
                if length > 0 && table.entries().len() as i64 == length {
                    let mut items = Vec::with_capacity(length as usize);
                    for i in 1..=length {
                        items.push(
                            self.decode_inner(&table.raw_get_int(i), visited)?,
                        );
                    }
                    visited.remove(id);
                    HostValue::List(items)
                } else {
                    let mut entries = Vec::new();
                    for (key, item) in table.entries() {
                        let key = match &key {
                            LuaValue::Str(s) => match s.as_str() {
                                Some(text) => text.to_string(),
                                None => {
                                    return self
                                        .type_error("map key is not valid text");
                                }
                            },
                            LuaValue::Integer(i) => i.to_string(),
                            other => {
                                return self.type_error(format!(
                                    "cannot decode a {} table key",
                                    other.type_name()
                                ));
                            }
                        };
                        entries.push((key, self.decode_inner(&item, visited)?));
                    }
                    visited.remove(id);
                    HostValue::Map(entries)
                }
            }
            LuaValue::Native(native) => HostValue::Function {
                name: native.name.to_string(),
                func: native.func.clone(),
            },
            LuaValue::Userdata(id) => match self.userdata(*id) {
                Some(data) => HostValue::Userdata(data.clone()),
                None => HostValue::Nil,
            },
            LuaValue::Function(_) => {
                return self.type_error("cannot decode a Lua function");
            }
        })
    }

    /// Wrap raw bytes as a Lua string value.
    pub fn string_value(&self, text: &str) -> LuaValue {
        LuaValue::Str(LuaStr::from_str(text))
    }
}
