//! Standard libraries, registered through the library registry. Argument
//! validation raises structured argument errors rendered in the canonical
//! `bad argument #n to 'f' (...)` shape.

pub mod basic;
pub mod math;
pub mod os;
pub mod string;
pub mod table;

use std::rc::Rc;

use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::{
    LuaStr, LuaValue, TableRef, float_to_display, integer_to_display,
};

pub(crate) fn arg_type_name(args: &[LuaValue], n: usize) -> &'static str {
    args.get(n - 1).map(|v| v.type_name()).unwrap_or("no value")
}

pub(crate) fn check_any(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<LuaValue> {
    match args.get(n - 1) {
        Some(value) => Ok(value.clone()),
        None => l.argument_error(fname, n, "value", "no value"),
    }
}

pub(crate) fn check_integer(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<i64> {
    match args.get(n - 1).and_then(|v| v.coerce_integer()) {
        Some(i) => Ok(i),
        None => l.argument_error(fname, n, "number", arg_type_name(args, n)),
    }
}

pub(crate) fn opt_integer(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
    default: i64,
) -> LuaResult<i64> {
    match args.get(n - 1) {
        None | Some(LuaValue::Nil) => Ok(default),
        Some(value) => match value.coerce_integer() {
            Some(i) => Ok(i),
            None => l.argument_error(fname, n, "number", arg_type_name(args, n)),
        },
    }
}

pub(crate) fn check_number(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<f64> {
    let coerced = args
        .get(n - 1)
        .and_then(|v| v.coerce_number())
        .and_then(|v| v.as_number());
    match coerced {
        Some(f) => Ok(f),
        None => l.argument_error(fname, n, "number", arg_type_name(args, n)),
    }
}

/// String argument; numbers coerce to their display form.
pub(crate) fn check_str(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<Rc<LuaStr>> {
    match args.get(n - 1) {
        Some(LuaValue::Str(s)) => Ok(s.clone()),
        Some(LuaValue::Integer(i)) => Ok(LuaStr::from_str(&integer_to_display(*i))),
        Some(LuaValue::Float(f)) => Ok(LuaStr::from_str(&float_to_display(*f))),
        _ => l.argument_error(fname, n, "string", arg_type_name(args, n)),
    }
}

pub(crate) fn check_table(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<TableRef> {
    match args.get(n - 1) {
        Some(LuaValue::Table(id)) => Ok(*id),
        _ => l.argument_error(fname, n, "table", arg_type_name(args, n)),
    }
}

pub(crate) fn check_callable(
    l: &LuaState,
    args: &[LuaValue],
    n: usize,
    fname: &str,
) -> LuaResult<LuaValue> {
    match args.get(n - 1) {
        Some(value @ (LuaValue::Function(_) | LuaValue::Native(_))) => Ok(value.clone()),
        _ => l.argument_error(fname, n, "function", arg_type_name(args, n)),
    }
}

/// `tostring` semantics: `__tostring` wins, then the per-type rendering.
pub(crate) fn tostring_value(l: &mut LuaState, value: &LuaValue) -> LuaResult<Rc<LuaStr>> {
    if let Some(handler) = l.get_metamethod(value, "__tostring") {
        let results = l.call_value(&handler, vec![value.clone()], None)?;
        return match results.into_iter().next() {
            Some(LuaValue::Str(s)) => Ok(s),
            Some(other) => tostring_plain(&other),
            None => Ok(LuaStr::from_str("nil")),
        };
    }
    tostring_plain(value)
}

pub(crate) fn tostring_plain(value: &LuaValue) -> LuaResult<Rc<LuaStr>> {
    Ok(match value {
        LuaValue::Nil => LuaStr::from_str("nil"),
        LuaValue::Boolean(true) => LuaStr::from_str("true"),
        LuaValue::Boolean(false) => LuaStr::from_str("false"),
        LuaValue::Integer(i) => LuaStr::from_str(&integer_to_display(*i)),
        LuaValue::Float(f) => LuaStr::from_str(&float_to_display(*f)),
        LuaValue::Str(s) => s.clone(),
        LuaValue::Table(id) => LuaStr::from_str(&format!("table: 0x{:08x}", id)),
        LuaValue::Function(f) => {
            LuaStr::from_str(&format!("function: 0x{:012x}", Rc::as_ptr(f) as usize))
        }
        LuaValue::Native(f) => LuaStr::from_str(&format!(
            "function: builtin: 0x{:012x}",
            Rc::as_ptr(f) as usize
        )),
        LuaValue::Userdata(id) => LuaStr::from_str(&format!("userdata: 0x{:08x}", id)),
    })
}
