// Lumo
// A Lua 5.3 front-end and register VM for embedding

#[cfg(test)]
mod test;

pub mod api;
pub mod compiler;
pub mod lib_registry;
pub mod stdlib;
pub mod vm;

pub use api::{ChunkHandle, HostValue};
pub use lib_registry::{LibraryModule, LibraryRegistry};
pub use vm::{LuaError, LuaResult, LuaState, LuaTable, LuaValue, Prototype};

/// One-shot convenience: fresh state, full stdlib, evaluate.
pub fn execute(source: &str) -> LuaResult<Vec<LuaValue>> {
    let mut state = LuaState::new();
    state.open_libs();
    state.eval(source)
}

/// Execute against an existing state.
pub fn execute_with_state(state: &mut LuaState, source: &str) -> LuaResult<Vec<LuaValue>> {
    state.eval(source)
}
