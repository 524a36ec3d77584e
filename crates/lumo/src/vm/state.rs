//! The process-wide runtime state. Owns every piece of runtime identity:
//! the globals map, the table/userdata/cell arenas, the activation frames
//! and the trace stack. The lexer, parser, resolver and generator are pure;
//! only the executor and host-registered natives mutate a state.

use std::any::Any;
use std::rc::Rc;
use std::time::Instant;

use ahash::AHashMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use smol_str::SmolStr;

use crate::compiler;
use crate::compiler::span::Position;
use crate::vm::error::{
    ArgumentDetail, ErrorKind, FrameTrace, LuaError, LuaResult,
};
use crate::vm::proto::Prototype;
use crate::vm::table::LuaTable;
use crate::vm::value::{CellRef, LuaValue, TableRef, UserdataRef};

/// Hard ceiling on nested calls; exceeding it raises a runtime error
/// instead of exhausting the host stack.
pub(crate) const MAX_CALL_DEPTH: usize = 200;

/// An upvalue cell: one independently-addressable slot. While the owning
/// activation is live the cell is open and aliases a register; on exit the
/// value is copied out and the cell closes.
#[derive(Debug, Clone)]
pub(crate) enum Cell {
    Open { frame: usize, register: u32 },
    Closed(LuaValue),
}

/// One activation: its register file, collected varargs, the dynamic top
/// used by multi-value operations, and the cells currently aliasing its
/// registers.
#[derive(Debug)]
pub(crate) struct Frame {
    pub registers: Vec<LuaValue>,
    pub varargs: Vec<LuaValue>,
    pub top: usize,
    pub open_cells: AHashMap<u32, CellRef>,
}

pub struct LuaState {
    pub(crate) globals: AHashMap<SmolStr, LuaValue>,
    tables: Vec<LuaTable>,
    userdata: Vec<Rc<dyn Any>>,
    pub(crate) cells: Vec<Cell>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) call_stack: Vec<FrameTrace>,
    pub(crate) current_line: u32,
    pub(crate) current_source: SmolStr,
    /// Chunk sources retained for diagnostics (context snippets).
    sources: AHashMap<SmolStr, String>,
    privates: AHashMap<String, LuaValue>,
    pub(crate) rng: StdRng,
    start_time: Instant,
    /// Scratch buffer carrying return values out of a frame.
    pub(crate) return_buffer: Vec<LuaValue>,
}

impl Default for LuaState {
    fn default() -> Self {
        LuaState::new()
    }
}

impl LuaState {
    /// A fresh state with no libraries installed. Call
    /// [`open_libs`](LuaState::open_libs) to register the standard library.
    pub fn new() -> Self {
        LuaState {
            globals: AHashMap::new(),
            tables: Vec::new(),
            userdata: Vec::new(),
            cells: Vec::new(),
            frames: Vec::new(),
            call_stack: Vec::new(),
            current_line: 0,
            current_source: SmolStr::new("?"),
            sources: AHashMap::new(),
            privates: AHashMap::new(),
            rng: StdRng::seed_from_u64(0x6c756d6f),
            start_time: Instant::now(),
            return_buffer: Vec::new(),
        }
    }

    /// Install the full standard library.
    pub fn open_libs(&mut self) {
        crate::lib_registry::standard_registry().install(self, &[]);
    }

    /// Install the standard library minus the named modules, for
    /// sandboxing (e.g. `&["os"]`).
    pub fn open_libs_except(&mut self, excluded: &[&str]) {
        crate::lib_registry::standard_registry().install(self, excluded);
    }

    /// Compile source to a prototype, retaining the text for diagnostics.
    pub fn compile(&mut self, source: &str, chunk_name: &str) -> LuaResult<Rc<Prototype>> {
        self.sources
            .insert(SmolStr::new(chunk_name), source.to_string());
        compiler::compile(source, chunk_name)
    }

    pub(crate) fn source_text(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(|s| s.as_str())
    }

    // ---- globals ----------------------------------------------------

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.globals.get(name).cloned().unwrap_or(LuaValue::Nil)
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) {
        if value.is_nil() {
            self.globals.remove(name);
        } else {
            self.globals.insert(SmolStr::new(name), value);
        }
    }

    // ---- arenas -----------------------------------------------------

    pub fn alloc_table(&mut self, table: LuaTable) -> TableRef {
        let id = self.tables.len() as TableRef;
        self.tables.push(table);
        id
    }

    pub fn new_table(&mut self) -> LuaValue {
        LuaValue::Table(self.alloc_table(LuaTable::new()))
    }

    pub fn table(&self, id: TableRef) -> &LuaTable {
        &self.tables[id as usize]
    }

    pub fn table_mut(&mut self, id: TableRef) -> &mut LuaTable {
        &mut self.tables[id as usize]
    }

    pub fn alloc_userdata(&mut self, data: Rc<dyn Any>) -> LuaValue {
        let id = self.userdata.len() as UserdataRef;
        self.userdata.push(data);
        LuaValue::Userdata(id)
    }

    pub fn userdata(&self, id: UserdataRef) -> Option<&Rc<dyn Any>> {
        self.userdata.get(id as usize)
    }

    // ---- upvalue cells ----------------------------------------------

    /// The open cell aliasing `register` in the current frame, creating it
    /// on first capture.
    pub(crate) fn capture_cell(&mut self, register: u32) -> CellRef {
        let frame_idx = self.frames.len() - 1;
        if let Some(&cell) = self.frames[frame_idx].open_cells.get(&register) {
            return cell;
        }
        let id = self.cells.len() as CellRef;
        self.cells.push(Cell::Open {
            frame: frame_idx,
            register,
        });
        self.frames[frame_idx].open_cells.insert(register, id);
        id
    }

    pub(crate) fn cell_get(&self, cell: CellRef) -> LuaValue {
        match &self.cells[cell as usize] {
            Cell::Open { frame, register } => {
                self.frames[*frame].registers[*register as usize].clone()
            }
            Cell::Closed(value) => value.clone(),
        }
    }

    pub(crate) fn cell_set(&mut self, cell: CellRef, value: LuaValue) {
        match self.cells[cell as usize].clone() {
            Cell::Open { frame, register } => {
                self.frames[frame].registers[register as usize] = value;
            }
            Cell::Closed(_) => {
                self.cells[cell as usize] = Cell::Closed(value);
            }
        }
    }

    /// Close the current frame's open cells for registers at or above
    /// `from`: copy the live register value into the cell so it survives
    /// the register's reuse or the activation's exit.
    pub(crate) fn close_cells(&mut self, from: u32) {
        let Some(frame_idx) = self.frames.len().checked_sub(1) else {
            return;
        };
        let to_close: Vec<(u32, CellRef)> = self.frames[frame_idx]
            .open_cells
            .iter()
            .filter(|(reg, _)| **reg >= from)
            .map(|(reg, cell)| (*reg, *cell))
            .collect();
        for (reg, cell) in to_close {
            let value = self.frames[frame_idx].registers[reg as usize].clone();
            self.cells[cell as usize] = Cell::Closed(value);
            self.frames[frame_idx].open_cells.remove(&reg);
        }
    }

    /// Pop frames down to `depth`, closing every open cell they own.
    /// Used both on normal return and when `pcall` unwinds an error.
    pub(crate) fn unwind_frames(&mut self, depth: usize) {
        while self.frames.len() > depth {
            self.close_cells(0);
            self.frames.pop();
        }
    }

    // ---- error construction -----------------------------------------

    pub(crate) fn runtime_position(&self) -> Position {
        Position::new(self.current_line.max(1), 1, 0)
    }

    fn raise(&self, kind: ErrorKind) -> LuaError {
        LuaError::new(kind, self.runtime_position(), self.current_source.clone())
            .with_traceback(self.call_stack.clone())
    }

    pub fn type_error<T>(&self, message: impl Into<String>) -> LuaResult<T> {
        Err(self.raise(ErrorKind::Type(message.into())))
    }

    /// Runtime error with a string message, prefixed with the raise
    /// position the way Lua prefixes thrown strings.
    pub fn runtime_error<T>(&self, message: impl Into<String>) -> LuaResult<T> {
        let located = format!(
            "{}:{}: {}",
            self.current_source,
            self.current_line.max(1),
            message.into()
        );
        Err(self.raise(ErrorKind::Runtime(LuaValue::str_from(&located))))
    }

    /// Runtime error carrying an arbitrary Lua value, as `error()` raises.
    pub fn throw<T>(&self, value: LuaValue) -> LuaResult<T> {
        Err(self.raise(ErrorKind::Runtime(value)))
    }

    pub fn assertion_error<T>(&self, value: LuaValue) -> LuaResult<T> {
        Err(self.raise(ErrorKind::Assertion(value)))
    }

    pub fn argument_error<T>(
        &self,
        function: &str,
        arg: usize,
        expected: &str,
        got: &str,
    ) -> LuaResult<T> {
        Err(self.raise(ErrorKind::Argument(ArgumentDetail {
            function: SmolStr::new(function),
            arg,
            expected: expected.to_string(),
            got: got.to_string(),
            details: None,
        })))
    }

    pub fn argument_error_detailed<T>(
        &self,
        function: &str,
        arg: usize,
        expected: &str,
        got: &str,
        details: &str,
    ) -> LuaResult<T> {
        Err(self.raise(ErrorKind::Argument(ArgumentDetail {
            function: SmolStr::new(function),
            arg,
            expected: expected.to_string(),
            got: got.to_string(),
            details: Some(details.to_string()),
        })))
    }

    pub(crate) fn internal_error<T>(&self, message: impl Into<String>) -> LuaResult<T> {
        Err(self.raise(ErrorKind::Internal(message.into())))
    }

    // ---- misc -------------------------------------------------------

    pub fn put_private(&mut self, key: &str, value: LuaValue) {
        self.privates.insert(key.to_string(), value);
    }

    pub fn get_private(&self, key: &str) -> Option<LuaValue> {
        self.privates.get(key).cloned()
    }

    pub fn delete_private(&mut self, key: &str) -> Option<LuaValue> {
        self.privates.remove(key)
    }

    /// Seconds elapsed since the state was created; backs `os.clock`.
    pub(crate) fn clock_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}
