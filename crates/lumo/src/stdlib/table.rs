//! Table library. Sequence operations use the raw sequence length; `sort`
//! is a stable merge sort so equal elements keep their order even under a
//! user comparator.

use super::{arg_type_name, check_table, opt_integer};
use crate::lib_registry::LibraryModule;
use crate::stdlib::string::display_value;
use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::LuaValue;

pub fn create_table_lib() -> LibraryModule {
    crate::lib_module!("table", {
        "insert" => table_insert,
        "remove" => table_remove,
        "concat" => table_concat,
        "sort" => table_sort,
        "pack" => table_pack,
        "unpack" => table_unpack,
        "move" => table_move,
    })
}

fn table_insert(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "insert")?;
    let len = l.table(id).length();
    match args.len() {
        2 => {
            let value = args[1].clone();
            l.table_mut(id).raw_set_int(len + 1, value);
        }
        3 => {
            let pos = super::check_integer(l, &args, 2, "insert")?;
            if pos < 1 || pos > len + 1 {
                return l.argument_error_detailed(
                    "insert",
                    2,
                    "number",
                    arg_type_name(&args, 2),
                    "position out of bounds",
                );
            }
            let value = args[2].clone();
            let mut i = len;
            while i >= pos {
                let shifted = l.table(id).raw_get_int(i);
                l.table_mut(id).raw_set_int(i + 1, shifted);
                i -= 1;
            }
            l.table_mut(id).raw_set_int(pos, value);
        }
        _ => return l.runtime_error("wrong number of arguments to 'insert'"),
    }
    Ok(Vec::new())
}

fn table_remove(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "remove")?;
    let len = l.table(id).length();
    let pos = opt_integer(l, &args, 2, "remove", len)?;
    if len == 0 && (pos == 0 || pos == len) {
        return Ok(vec![LuaValue::Nil]);
    }
    if pos < 1 || pos > len + 1 {
        return l.argument_error_detailed(
            "remove",
            2,
            "number",
            arg_type_name(&args, 2),
            "position out of bounds",
        );
    }
    let removed = l.table(id).raw_get_int(pos);
    let mut i = pos;
    while i < len {
        let shifted = l.table(id).raw_get_int(i + 1);
        l.table_mut(id).raw_set_int(i, shifted);
        i += 1;
    }
    if pos <= len {
        l.table_mut(id).raw_set_int(len, LuaValue::Nil);
    }
    Ok(vec![removed])
}

fn table_concat(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "concat")?;
    let sep = match args.get(2) {
        None | Some(LuaValue::Nil) => Vec::new(),
        _ => super::check_str(l, &args, 2, "concat")?.as_bytes().to_vec(),
    };
    let len = l.table(id).length();
    let i = opt_integer(l, &args, 3, "concat", 1)?;
    let j = opt_integer(l, &args, 4, "concat", len)?;
    let mut out: Vec<u8> = Vec::new();
    let mut pos = i;
    while pos <= j {
        let value = l.table(id).raw_get_int(pos);
        match &value {
            LuaValue::Str(s) => out.extend_from_slice(s.as_bytes()),
            LuaValue::Integer(_) | LuaValue::Float(_) => {
                out.extend_from_slice(display_value(&value).as_bytes());
            }
            _ => {
                return l.runtime_error(format!(
                    "invalid value (at index {}) in table for 'concat'",
                    pos
                ));
            }
        }
        if pos < j {
            out.extend_from_slice(&sep);
        }
        pos += 1;
    }
    Ok(vec![LuaValue::str_from_bytes(out)])
}

/// Stable merge sort over the sequence `1..#t`, with an optional Lua
/// comparator. Comparator errors propagate.
fn table_sort(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "sort")?;
    let comparator = match args.get(2) {
        None | Some(LuaValue::Nil) => None,
        _ => Some(super::check_callable(l, &args, 2, "sort")?),
    };
    let len = l.table(id).length();
    let mut values: Vec<LuaValue> = (1..=len).map(|i| l.table(id).raw_get_int(i)).collect();
    merge_sort(l, &mut values, &comparator)?;
    for (i, value) in values.into_iter().enumerate() {
        l.table_mut(id).raw_set_int(i as i64 + 1, value);
    }
    Ok(Vec::new())
}

fn sort_less(
    l: &mut LuaState,
    comparator: &Option<LuaValue>,
    a: &LuaValue,
    b: &LuaValue,
) -> LuaResult<bool> {
    match comparator {
        Some(f) => {
            let results = l.call_value(f, vec![a.clone(), b.clone()], None)?;
            Ok(results.first().map(|v| v.truthy()).unwrap_or(false))
        }
        None => l.compare_values(crate::vm::instruction::CompareOp::Lt, a, b),
    }
}

fn merge_sort(
    l: &mut LuaState,
    values: &mut [LuaValue],
    comparator: &Option<LuaValue>,
) -> LuaResult<()> {
    let len = values.len();
    if len <= 1 {
        return Ok(());
    }
    let mid = len / 2;
    merge_sort(l, &mut values[..mid], comparator)?;
    merge_sort(l, &mut values[mid..], comparator)?;
    let left: Vec<LuaValue> = values[..mid].to_vec();
    let right: Vec<LuaValue> = values[mid..].to_vec();
    let (mut i, mut j) = (0, 0);
    for slot in values.iter_mut() {
        let take_left = if i >= left.len() {
            false
        } else if j >= right.len() {
            true
        } else {
            // Stability: take the left element unless the right is
            // strictly smaller.
            !sort_less(l, comparator, &right[j], &left[i])?
        };
        if take_left {
            *slot = left[i].clone();
            i += 1;
        } else {
            *slot = right[j].clone();
            j += 1;
        }
    }
    Ok(())
}

fn table_pack(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let count = args.len() as i64;
    let table = l.new_table();
    let Some(id) = table.as_table_ref() else {
        return l.internal_error("pack allocation failed");
    };
    for (i, value) in args.into_iter().enumerate() {
        l.table_mut(id).raw_set_int(i as i64 + 1, value);
    }
    l.table_mut(id).raw_set_str("n", LuaValue::Integer(count));
    Ok(vec![table])
}

/// Unpacking guards the range size so a bogus `j` cannot allocate without
/// bound.
const MAX_UNPACK: i64 = 1_000_000;

fn table_unpack(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let id = check_table(l, &args, 1, "unpack")?;
    let i = opt_integer(l, &args, 2, "unpack", 1)?;
    let j = opt_integer(l, &args, 3, "unpack", l.table(id).length())?;
    if j - i >= MAX_UNPACK {
        return l.runtime_error("too many results to unpack");
    }
    let mut out = Vec::new();
    let mut pos = i;
    while pos <= j {
        out.push(l.table(id).raw_get_int(pos));
        pos += 1;
    }
    Ok(out)
}

fn table_move(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let src = check_table(l, &args, 1, "move")?;
    let f = super::check_integer(l, &args, 2, "move")?;
    let e = super::check_integer(l, &args, 3, "move")?;
    let t = super::check_integer(l, &args, 4, "move")?;
    let dst = match args.get(5) {
        None | Some(LuaValue::Nil) => src,
        _ => check_table(l, &args, 5, "move")?,
    };
    if e >= f {
        if e - f >= MAX_UNPACK {
            return l.runtime_error("too many elements to move");
        }
        // Buffering the span makes overlapping self-moves safe.
        let span: Vec<LuaValue> =
            (f..=e).map(|i| l.table(src).raw_get_int(i)).collect();
        for (offset, value) in span.into_iter().enumerate() {
            l.table_mut(dst).raw_set_int(t + offset as i64, value);
        }
    }
    let dst_value = args
        .get(5)
        .filter(|v| !v.is_nil())
        .cloned()
        .unwrap_or_else(|| args[0].clone());
    Ok(vec![dst_value])
}
