//! Minimal, host-gated os library: clock, time, date. Excludable at
//! install time for sandboxing (`open_libs_except(&["os"])`).

use std::fmt::Write;

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

use super::{check_str, check_table, opt_integer};
use crate::lib_registry::LibraryModule;
use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::LuaValue;

pub fn create_os_lib() -> LibraryModule {
    crate::lib_module!("os", {
        "clock" => os_clock,
        "time" => os_time,
        "date" => os_date,
    })
}

/// Seconds of elapsed time since the state was created.
fn os_clock(l: &mut LuaState, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Float(l.clock_seconds())])
}

/// `time()` → current epoch seconds; `time(t)` → epoch seconds for a table
/// with year/month/day and optional hour/min/sec.
fn os_time(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        None | Some(LuaValue::Nil) => {
            Ok(vec![LuaValue::Integer(Utc::now().timestamp())])
        }
        Some(LuaValue::Table(_)) => {
            let id = check_table(l, &args, 1, "time")?;
            let field = |l: &LuaState, name: &str, default: Option<i64>| -> LuaResult<i64> {
                let value = l.table(id).raw_get_str(name);
                match value.coerce_integer() {
                    Some(i) => Ok(i),
                    None => match default {
                        Some(d) if value.is_nil() => Ok(d),
                        _ => l.runtime_error(format!(
                            "field '{}' missing in date table",
                            name
                        )),
                    },
                }
            };
            let year = field(l, "year", None)?;
            let month = field(l, "month", None)?;
            let day = field(l, "day", None)?;
            let hour = field(l, "hour", Some(12))?;
            let min = field(l, "min", Some(0))?;
            let sec = field(l, "sec", Some(0))?;
            match Local
                .with_ymd_and_hms(
                    year as i32,
                    month as u32,
                    day as u32,
                    hour as u32,
                    min as u32,
                    sec as u32,
                )
                .single()
            {
                Some(datetime) => Ok(vec![LuaValue::Integer(datetime.timestamp())]),
                None => l.runtime_error("time result cannot be represented"),
            }
        }
        _ => l.argument_error("time", 1, "table", super::arg_type_name(&args, 1)),
    }
}

/// `date(format?, time?)`: strftime-style formatting, a leading `!` for
/// UTC, and the `*t` form returning a broken-down table.
fn os_date(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let format = match args.first() {
        None | Some(LuaValue::Nil) => "%c".to_string(),
        _ => check_str(l, &args, 1, "date")?.to_string_lossy(),
    };
    let timestamp = opt_integer(l, &args, 2, "date", Utc::now().timestamp())?;
    let Some(utc) = DateTime::from_timestamp(timestamp, 0) else {
        return l.runtime_error("time value out of range for 'date'");
    };

    let (spec, is_utc) = match format.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (format.as_str(), false),
    };

    if spec == "*t" {
        let table = l.new_table();
        let Some(id) = table.as_table_ref() else {
            return l.internal_error("date allocation failed");
        };
        let (year, month, day, hour, min, sec, wday, yday) = if is_utc {
            broken_down(&utc)
        } else {
            broken_down(&utc.with_timezone(&Local))
        };
        let fields: [(&str, i64); 8] = [
            ("year", year),
            ("month", month),
            ("day", day),
            ("hour", hour),
            ("min", min),
            ("sec", sec),
            ("wday", wday),
            ("yday", yday),
        ];
        for (name, value) in fields {
            l.table_mut(id).raw_set_str(name, LuaValue::Integer(value));
        }
        l.table_mut(id).raw_set_str("isdst", LuaValue::Boolean(false));
        return Ok(vec![table]);
    }

    let mut rendered = String::new();
    let result = if is_utc {
        write!(rendered, "{}", utc.format(spec))
    } else {
        write!(rendered, "{}", utc.with_timezone(&Local).format(spec))
    };
    if result.is_err() {
        return l.runtime_error("invalid format string to 'date'");
    }
    Ok(vec![LuaValue::str_from(&rendered)])
}

fn broken_down<Tz: TimeZone>(dt: &DateTime<Tz>) -> (i64, i64, i64, i64, i64, i64, i64, i64) {
    (
        dt.year() as i64,
        dt.month() as i64,
        dt.day() as i64,
        dt.hour() as i64,
        dt.minute() as i64,
        dt.second() as i64,
        // Lua counts Sunday as 1.
        dt.weekday().num_days_from_sunday() as i64 + 1,
        dt.ordinal() as i64,
    )
}
