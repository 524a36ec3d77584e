//! Math library. Integer-valued results keep integer type where Lua 5.3
//! does (abs, floor, ceil, min/max, tointeger).

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{arg_type_name, check_any, check_number};
use crate::lib_registry::LibraryModule;
use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::{LuaValue, float_to_integer};

pub fn create_math_lib() -> LibraryModule {
    let mut module = crate::lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "floor" => math_floor,
        "sqrt" => math_sqrt,
        "sin" => math_sin,
        "cos" => math_cos,
        "tan" => math_tan,
        "asin" => math_asin,
        "acos" => math_acos,
        "atan" => math_atan,
        "exp" => math_exp,
        "log" => math_log,
        "min" => math_min,
        "max" => math_max,
        "fmod" => math_fmod,
        "modf" => math_modf,
        "random" => math_random,
        "randomseed" => math_randomseed,
        "tointeger" => math_tointeger,
        "type" => math_type,
    });
    module = module.with_value("pi", |_| LuaValue::Float(std::f64::consts::PI));
    module = module.with_value("huge", |_| LuaValue::Float(f64::INFINITY));
    module = module.with_value("maxinteger", |_| LuaValue::Integer(i64::MAX));
    module = module.with_value("mininteger", |_| LuaValue::Integer(i64::MIN));
    module
}

fn math_abs(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        Some(LuaValue::Integer(i)) => Ok(vec![LuaValue::Integer(i.wrapping_abs())]),
        Some(LuaValue::Float(f)) => Ok(vec![LuaValue::Float(f.abs())]),
        _ => {
            let x = check_number(l, &args, 1, "abs")?;
            Ok(vec![LuaValue::Float(x.abs())])
        }
    }
}

fn math_floor(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        Some(LuaValue::Integer(i)) => Ok(vec![LuaValue::Integer(*i)]),
        _ => {
            let x = check_number(l, &args, 1, "floor")?;
            let floored = x.floor();
            Ok(vec![match float_to_integer(floored) {
                Some(i) => LuaValue::Integer(i),
                None => LuaValue::Float(floored),
            }])
        }
    }
}

fn math_ceil(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.first() {
        Some(LuaValue::Integer(i)) => Ok(vec![LuaValue::Integer(*i)]),
        _ => {
            let x = check_number(l, &args, 1, "ceil")?;
            let ceiled = x.ceil();
            Ok(vec![match float_to_integer(ceiled) {
                Some(i) => LuaValue::Integer(i),
                None => LuaValue::Float(ceiled),
            }])
        }
    }
}

macro_rules! unary_float {
    ($rust_name:ident, $lua_name:literal, $method:ident) => {
        fn $rust_name(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
            let x = check_number(l, &args, 1, $lua_name)?;
            Ok(vec![LuaValue::Float(x.$method())])
        }
    };
}

unary_float!(math_sqrt, "sqrt", sqrt);
unary_float!(math_sin, "sin", sin);
unary_float!(math_cos, "cos", cos);
unary_float!(math_tan, "tan", tan);
unary_float!(math_asin, "asin", asin);
unary_float!(math_acos, "acos", acos);
unary_float!(math_exp, "exp", exp);

fn math_atan(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let y = check_number(l, &args, 1, "atan")?;
    let x = match args.get(2) {
        None | Some(LuaValue::Nil) => 1.0,
        _ => check_number(l, &args, 2, "atan")?,
    };
    Ok(vec![LuaValue::Float(y.atan2(x))])
}

fn math_log(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(l, &args, 1, "log")?;
    match args.get(2) {
        None | Some(LuaValue::Nil) => Ok(vec![LuaValue::Float(x.ln())]),
        _ => {
            let base = check_number(l, &args, 2, "log")?;
            Ok(vec![LuaValue::Float(x.ln() / base.ln())])
        }
    }
}

fn math_min(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return l.argument_error("min", 1, "number", "no value");
    }
    check_number(l, &args, 1, "min")?;
    let mut best = args[0].clone();
    for n in 2..=args.len() {
        let contender = check_number(l, &args, n, "min")?;
        let current = best.as_number().unwrap_or(f64::INFINITY);
        if contender < current {
            best = args[n - 1].clone();
        }
    }
    Ok(vec![best])
}

fn math_max(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return l.argument_error("max", 1, "number", "no value");
    }
    check_number(l, &args, 1, "max")?;
    let mut best = args[0].clone();
    for n in 2..=args.len() {
        let contender = check_number(l, &args, n, "max")?;
        let current = best.as_number().unwrap_or(f64::NEG_INFINITY);
        if contender > current {
            best = args[n - 1].clone();
        }
    }
    Ok(vec![best])
}

fn math_fmod(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(l, &args, 1, "fmod")?;
    let y = check_number(l, &args, 2, "fmod")?;
    if y == 0.0 {
        return l.argument_error_detailed(
            "fmod",
            2,
            "number",
            arg_type_name(&args, 2),
            "zero",
        );
    }
    Ok(vec![LuaValue::Float(x % y)])
}

fn math_modf(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(l, &args, 1, "modf")?;
    let integral = x.trunc();
    let fractional = x - integral;
    let integral = match float_to_integer(integral) {
        Some(i) => LuaValue::Integer(i),
        None => LuaValue::Float(integral),
    };
    Ok(vec![integral, LuaValue::Float(fractional)])
}

/// `random()` → uniform float in [0,1); `random(m)` → integer in [1,m];
/// `random(m,n)` → integer in [m,n].
fn math_random(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match args.len() {
        0 => {
            let x: f64 = l.rng.r#gen();
            Ok(vec![LuaValue::Float(x)])
        }
        1 => {
            let m = super::check_integer(l, &args, 1, "random")?;
            if m < 1 {
                return l.argument_error_detailed(
                    "random",
                    1,
                    "number",
                    arg_type_name(&args, 1),
                    "interval is empty",
                );
            }
            Ok(vec![LuaValue::Integer(l.rng.gen_range(1..=m))])
        }
        _ => {
            let m = super::check_integer(l, &args, 1, "random")?;
            let n = super::check_integer(l, &args, 2, "random")?;
            if m > n {
                return l.argument_error_detailed(
                    "random",
                    2,
                    "number",
                    arg_type_name(&args, 2),
                    "interval is empty",
                );
            }
            Ok(vec![LuaValue::Integer(l.rng.gen_range(m..=n))])
        }
    }
}

fn math_randomseed(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let seed = check_number(l, &args, 1, "randomseed")?;
    l.rng = StdRng::seed_from_u64(seed.to_bits());
    Ok(Vec::new())
}

fn math_tointeger(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "tointeger")?;
    Ok(vec![match value {
        LuaValue::Integer(i) => LuaValue::Integer(i),
        LuaValue::Float(f) => match float_to_integer(f) {
            Some(i) => LuaValue::Integer(i),
            None => LuaValue::Nil,
        },
        _ => LuaValue::Nil,
    }])
}

fn math_type(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = check_any(l, &args, 1, "type")?;
    Ok(vec![match value {
        LuaValue::Integer(_) => LuaValue::str_from("integer"),
        LuaValue::Float(_) => LuaValue::str_from("float"),
        _ => LuaValue::Nil,
    }])
}
