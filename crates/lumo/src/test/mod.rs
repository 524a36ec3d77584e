pub mod test_errors;
pub mod test_exec;
pub mod test_host_api;
pub mod test_lexer;
pub mod test_math;
pub mod test_parser;
pub mod test_resolver;
pub mod test_string;
pub mod test_table;

use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::LuaValue;

/// Fresh state with the full stdlib, evaluate, return results.
pub(crate) fn eval(source: &str) -> LuaResult<Vec<LuaValue>> {
    let mut state = LuaState::new();
    state.open_libs();
    state.eval(source)
}

pub(crate) fn eval_ok(source: &str) -> Vec<LuaValue> {
    match eval(source) {
        Ok(results) => results,
        Err(err) => panic!("eval failed: {}", err),
    }
}

/// Run a snippet whose own `assert` calls are the test.
pub(crate) fn assert_lua(source: &str) {
    if let Err(err) = eval(source) {
        panic!("lua assertion failed: {}", err);
    }
}

pub(crate) fn first(results: Vec<LuaValue>) -> LuaValue {
    results.into_iter().next().unwrap_or(LuaValue::Nil)
}

pub(crate) fn as_int(value: &LuaValue) -> i64 {
    match value {
        LuaValue::Integer(i) => *i,
        other => panic!("expected integer, got {:?}", other),
    }
}

pub(crate) fn as_str(value: &LuaValue) -> String {
    match value {
        LuaValue::Str(s) => s.to_string_lossy(),
        other => panic!("expected string, got {:?}", other),
    }
}
