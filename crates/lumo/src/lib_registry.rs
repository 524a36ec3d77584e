//! Library registration: a declarative way to install Rust functions as
//! Lua globals or library tables, with an exclusion list for sandboxing.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::stdlib;
use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::{LuaValue, NativeFunction};

/// Plain-function entry signature used by the standard library.
pub type NativeEntry = fn(&mut LuaState, Vec<LuaValue>) -> LuaResult<Vec<LuaValue>>;

/// Value initializer, for library constants like `math.pi`.
pub type ValueInitializer = fn(&mut LuaState) -> LuaValue;

pub enum LibraryEntry {
    Function(NativeEntry),
    Value(ValueInitializer),
}

/// A named module: either a table global of that name, or (for the base
/// library) entries installed directly as globals.
pub struct LibraryModule {
    pub name: &'static str,
    pub globals: bool,
    pub entries: Vec<(&'static str, LibraryEntry)>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        LibraryModule {
            name,
            globals: false,
            entries: Vec::new(),
        }
    }

    pub fn as_globals(mut self) -> Self {
        self.globals = true;
        self
    }

    pub fn with_function(mut self, name: &'static str, func: NativeEntry) -> Self {
        self.entries.push((name, LibraryEntry::Function(func)));
        self
    }

    pub fn with_value(mut self, name: &'static str, init: ValueInitializer) -> Self {
        self.entries.push((name, LibraryEntry::Value(init)));
        self
    }
}

/// Build a [`LibraryModule`] from a function table.
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push((
                $item_name,
                $crate::lib_registry::LibraryEntry::Function($item),
            ));
        )*
        module
    }};
}

pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        LibraryRegistry::new()
    }
}

impl LibraryRegistry {
    pub fn new() -> Self {
        LibraryRegistry {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    /// Install every registered module except the excluded ones.
    pub fn install(&self, state: &mut LuaState, excluded: &[&str]) {
        for module in &self.modules {
            if excluded.contains(&module.name) {
                continue;
            }
            self.install_module(state, module);
        }
    }

    fn install_module(&self, state: &mut LuaState, module: &LibraryModule) {
        if module.globals {
            for (name, entry) in &module.entries {
                let value = materialize(state, name, entry);
                state.set_global(name, value);
            }
            return;
        }
        let table = state.new_table();
        let Some(id) = table.as_table_ref() else {
            return;
        };
        for (name, entry) in &module.entries {
            let value = materialize(state, name, entry);
            state.table_mut(id).raw_set_str(name, value);
        }
        state.set_global(module.name, table);
    }
}

fn materialize(state: &mut LuaState, name: &'static str, entry: &LibraryEntry) -> LuaValue {
    match entry {
        LibraryEntry::Function(func) => {
            let func = *func;
            LuaValue::Native(Rc::new(NativeFunction {
                name: SmolStr::new(name),
                func: Rc::new(func),
            }))
        }
        LibraryEntry::Value(init) => init(state),
    }
}

/// The full standard library of this runtime.
pub fn standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    registry.register(stdlib::basic::create_basic_lib());
    registry.register(stdlib::string::create_string_lib());
    registry.register(stdlib::math::create_math_lib());
    registry.register(stdlib::table::create_table_lib());
    registry.register(stdlib::os::create_os_lib());
    registry
}
