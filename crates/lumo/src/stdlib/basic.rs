//! Base library: installed directly as globals.

use std::io::Write;
use std::rc::Rc;

use smol_str::SmolStr;

use super::{arg_type_name, check_any, check_table, opt_integer, tostring_value};
use crate::lib_registry::LibraryModule;
use crate::vm::error::{ErrorKind, LuaResult};
use crate::vm::state::LuaState;
use crate::vm::value::{
    LuaValue, NativeFunction, parse_number,
};

pub fn create_basic_lib() -> LibraryModule {
    crate::lib_module!("base", {
        "type" => lua_type,
        "tostring" => lua_tostring,
        "tonumber" => lua_tonumber,
        "print" => lua_print,
        "error" => lua_error,
        "assert" => lua_assert,
        "pcall" => lua_pcall,
        "xpcall" => lua_xpcall,
        "rawget" => lua_rawget,
        "rawset" => lua_rawset,
        "rawlen" => lua_rawlen,
        "rawequal" => lua_rawequal,
        "next" => lua_next,
        "pairs" => lua_pairs,
        "ipairs" => lua_ipairs,
        "select" => lua_select,
        "setmetatable" => lua_setmetatable,
        "getmetatable" => lua_getmetatable,
    })
    .as_globals()
}

fn lua_type(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "type")?;
    Ok(vec![LuaValue::str_from(value.type_name())])
}

fn lua_tostring(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "tostring")?;
    let rendered = tostring_value(l, &value)?;
    Ok(vec![LuaValue::Str(rendered)])
}

fn lua_tonumber(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "tonumber")?;
    match args.get(1) {
        None | Some(LuaValue::Nil) => {
            let converted = match &value {
                LuaValue::Integer(_) | LuaValue::Float(_) => Some(value.clone()),
                LuaValue::Str(s) => s.as_str().and_then(parse_number),
                _ => None,
            };
            Ok(vec![converted.unwrap_or(LuaValue::Nil)])
        }
        Some(base_value) => {
            let base = match base_value.coerce_integer() {
                Some(b) if (2..=36).contains(&b) => b as u32,
                _ => {
                    return l.argument_error_detailed(
                        "tonumber",
                        2,
                        "number",
                        arg_type_name(&args, 2),
                        "base out of range",
                    );
                }
            };
            let LuaValue::Str(s) = &value else {
                return l.argument_error("tonumber", 1, "string", arg_type_name(&args, 1));
            };
            let Some(text) = s.as_str() else {
                return Ok(vec![LuaValue::Nil]);
            };
            let text = text.trim();
            let (negative, digits) = match text.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, text),
            };
            if digits.is_empty() {
                return Ok(vec![LuaValue::Nil]);
            }
            let mut value: i64 = 0;
            for ch in digits.chars() {
                let Some(digit) = ch.to_digit(base) else {
                    return Ok(vec![LuaValue::Nil]);
                };
                value = value
                    .wrapping_mul(base as i64)
                    .wrapping_add(digit as i64);
            }
            Ok(vec![LuaValue::Integer(if negative { -value } else { value })])
        }
    }
}

fn lua_print(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut pieces = Vec::with_capacity(args.len());
    for value in &args {
        pieces.push(tostring_value(l, value)?.to_string_lossy());
    }
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{}", pieces.join("\t"));
    Ok(Vec::new())
}

fn lua_error(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = args.first().cloned().unwrap_or(LuaValue::Nil);
    let level = opt_integer(l, &args, 2, "error", 1)?;
    match &value {
        LuaValue::Str(s) if level != 0 => {
            let located = format!(
                "{}:{}: {}",
                l.current_source,
                l.current_line.max(1),
                s.to_string_lossy()
            );
            l.throw(LuaValue::str_from(&located))
        }
        _ => l.throw(value),
    }
}

fn lua_assert(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "assert")?;
    if value.truthy() {
        return Ok(args);
    }
    let message = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| LuaValue::str_from("assertion failed!"));
    l.assertion_error(message)
}

/// Run `f` protected: `(true, results…)` on success, `(false, message)` on
/// error, with frames and the trace stack restored to the call site.
/// Mutations made before the raise are preserved.
fn lua_pcall(l: &mut LuaState, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return l.argument_error("pcall", 1, "value", "no value");
    }
    let func = args.remove(0);
    let saved_frames = l.frames.len();
    let saved_stack = l.call_stack.len();
    let saved_source = l.current_source.clone();
    let saved_line = l.current_line;
    match l.call_value(&func, args, None) {
        Ok(mut results) => {
            let mut out = Vec::with_capacity(results.len() + 1);
            out.push(LuaValue::Boolean(true));
            out.append(&mut results);
            Ok(out)
        }
        Err(err) => {
            // Internal errors are implementation bugs; let them escape.
            if matches!(err.kind, ErrorKind::Internal(_)) {
                return Err(err);
            }
            l.unwind_frames(saved_frames);
            l.call_stack.truncate(saved_stack);
            l.current_source = saved_source;
            l.current_line = saved_line;
            Ok(vec![LuaValue::Boolean(false), err.to_lua_value()])
        }
    }
}

/// Like `pcall`, but routes the error value through `handler` and returns
/// `(false, handler_results…)` on failure.
fn lua_xpcall(l: &mut LuaState, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.len() < 2 {
        return l.argument_error("xpcall", 2, "value", arg_type_name(&args, 2));
    }
    let func = args.remove(0);
    let handler = args.remove(0);
    let saved_frames = l.frames.len();
    let saved_stack = l.call_stack.len();
    let saved_source = l.current_source.clone();
    let saved_line = l.current_line;
    match l.call_value(&func, args, None) {
        Ok(mut results) => {
            let mut out = Vec::with_capacity(results.len() + 1);
            out.push(LuaValue::Boolean(true));
            out.append(&mut results);
            Ok(out)
        }
        Err(err) => {
            if matches!(err.kind, ErrorKind::Internal(_)) {
                return Err(err);
            }
            l.unwind_frames(saved_frames);
            l.call_stack.truncate(saved_stack);
            l.current_source = saved_source;
            l.current_line = saved_line;
            let handled = l.call_value(&handler, vec![err.to_lua_value()], None)?;
            let mut out = Vec::with_capacity(handled.len() + 1);
            out.push(LuaValue::Boolean(false));
            out.extend(handled);
            Ok(out)
        }
    }
}

fn lua_rawget(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "rawget")?;
    let key = check_any(l, &args, 2, "rawget")?;
    Ok(vec![l.table(id).raw_get(&key)])
}

fn lua_rawset(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "rawset")?;
    let key = check_any(l, &args, 2, "rawset")?;
    let value = check_any(l, &args, 3, "rawset")?;
    l.raw_set_checked(id, key, value)?;
    Ok(vec![args[0].clone()])
}

fn lua_rawlen(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        Some(LuaValue::Table(id)) => Ok(vec![LuaValue::Integer(l.table(*id).length())]),
        Some(LuaValue::Str(s)) => Ok(vec![LuaValue::Integer(s.len() as i64)]),
        _ => l.argument_error("rawlen", 1, "table or string", arg_type_name(&args, 1)),
    }
}

fn lua_rawequal(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let a = check_any(l, &args, 1, "rawequal")?;
    let b = check_any(l, &args, 2, "rawequal")?;
    Ok(vec![LuaValue::Boolean(a.raw_equals(&b))])
}

fn lua_next(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "next")?;
    let key = args.get(1).cloned().unwrap_or(LuaValue::Nil);
    match l.table(id).next(&key) {
        Ok(Some((k, v))) => Ok(vec![k, v]),
        Ok(None) => Ok(vec![LuaValue::Nil]),
        Err(_) => l.runtime_error("invalid key to 'next'"),
    }
}

fn lua_pairs(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_any(l, &args, 1, "pairs")?;
    check_table(l, &args, 1, "pairs")?;
    let iterator = LuaValue::Native(Rc::new(NativeFunction {
        name: SmolStr::new("next"),
        func: Rc::new(lua_next),
    }));
    Ok(vec![iterator, table, LuaValue::Nil])
}

/// Numeric iterator stopping at the first nil. Reads are live (no length
/// snapshot) and honor `__index`.
fn ipairs_iterator(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_any(l, &args, 1, "ipairs")?;
    let index = check_any(l, &args, 2, "ipairs")?
        .coerce_integer()
        .unwrap_or(0);
    let next_index = index + 1;
    let value = l.index_value(&table, &LuaValue::Integer(next_index))?;
    if value.is_nil() {
        Ok(vec![LuaValue::Nil])
    } else {
        Ok(vec![LuaValue::Integer(next_index), value])
    }
}

fn lua_ipairs(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_any(l, &args, 1, "ipairs")?;
    let iterator = LuaValue::Native(Rc::new(NativeFunction {
        name: SmolStr::new("ipairs_iterator"),
        func: Rc::new(ipairs_iterator),
    }));
    Ok(vec![iterator, table, LuaValue::Integer(0)])
}

fn lua_select(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        Some(LuaValue::Str(s)) if s.as_bytes() == b"#" => {
            Ok(vec![LuaValue::Integer(args.len() as i64 - 1)])
        }
        Some(value) => {
            let n = match value.coerce_integer() {
                Some(n) if n != 0 => n,
                _ => {
                    return l.argument_error_detailed(
                        "select",
                        1,
                        "number",
                        arg_type_name(&args, 1),
                        "index out of range",
                    );
                }
            };
            let rest = args.len() as i64 - 1;
            let start = if n < 0 {
                let from_end = rest + n;
                if from_end < 0 {
                    return l.argument_error_detailed(
                        "select",
                        1,
                        "number",
                        "number",
                        "index out of range",
                    );
                }
                from_end + 1
            } else {
                n
            };
            Ok(args
                .into_iter()
                .skip(start as usize)
                .collect())
        }
        None => l.argument_error("select", 1, "number", "no value"),
    }
}

fn lua_setmetatable(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "setmetatable")?;
    match args.get(2) {
        None | Some(LuaValue::Nil) => {
            l.table_mut(id).set_metatable(None);
        }
        Some(LuaValue::Table(mt)) => {
            l.table_mut(id).set_metatable(Some(*mt));
        }
        _ => {
            return l.argument_error(
                "setmetatable",
                2,
                "nil or table",
                arg_type_name(&args, 2),
            );
        }
    }
    Ok(vec![args[0].clone()])
}

fn lua_getmetatable(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "getmetatable")?;
    Ok(vec![match l.metatable_of(&value) {
        Some(mt) => LuaValue::Table(mt),
        None => LuaValue::Nil,
    }])
}
