//! Runtime value representation.

use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::vm::error::LuaResult;
use crate::vm::proto::Prototype;
use crate::vm::state::LuaState;

/// Index into the state's table arena. Identity is the id: two distinct
/// allocations never share one, and comparing references compares ids.
pub type TableRef = u32;

/// Index into the state's userdata arena.
pub type UserdataRef = u32;

/// Index into the state's upvalue-cell arena.
pub type CellRef = u32;

/// Immutable byte string. Lua strings are byte sequences; they are only
/// interpreted as UTF-8 when a host boundary needs text.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LuaStr {
    bytes: Box<[u8]>,
}

impl LuaStr {
    pub fn from_bytes(bytes: Vec<u8>) -> Rc<LuaStr> {
        Rc::new(LuaStr {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn from_str(s: &str) -> Rc<LuaStr> {
        LuaStr::from_bytes(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The bytes as UTF-8 text, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl fmt::Display for LuaStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

/// A compiled Lua function value: the immutable prototype plus the upvalue
/// cells captured when the closure was built. `upvalues.len()` always equals
/// `proto.upvalues.len()`.
#[derive(Debug)]
pub struct LuaClosure {
    pub proto: Rc<Prototype>,
    pub upvalues: Vec<CellRef>,
}

/// Host function callable from Lua. Receives the state and the argument
/// list, returns the result list.
pub type NativeFn = Rc<dyn Fn(&mut LuaState, Vec<LuaValue>) -> LuaResult<Vec<LuaValue>>>;

/// A registered host function. Identity is the `Rc` allocation, mirroring
/// closure identity: registering the same Rust fn twice yields two distinct
/// Lua values.
pub struct NativeFunction {
    pub name: SmolStr,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// The VM's tagged value union.
#[derive(Debug, Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(Rc<LuaStr>),
    Table(TableRef),
    Function(Rc<LuaClosure>),
    Native(Rc<NativeFunction>),
    Userdata(UserdataRef),
}

impl LuaValue {
    pub fn str_from(s: &str) -> LuaValue {
        LuaValue::Str(LuaStr::from_str(s))
    }

    pub fn str_from_bytes(bytes: Vec<u8>) -> LuaValue {
        LuaValue::Str(LuaStr::from_bytes(bytes))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    /// Only `nil` and `false` are falsy.
    pub fn truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Integer(_) | LuaValue::Float(_) => "number",
            LuaValue::Str(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) | LuaValue::Native(_) => "function",
            LuaValue::Userdata(_) => "userdata",
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            LuaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view: integers widen to float.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LuaValue::Integer(i) => Some(*i as f64),
            LuaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_table_ref(&self) -> Option<TableRef> {
        match self {
            LuaValue::Table(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_lua_str(&self) -> Option<&Rc<LuaStr>> {
        match self {
            LuaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Arithmetic coercion: numbers pass through, strings are parsed the
    /// way a Lua number literal would be.
    pub fn coerce_number(&self) -> Option<LuaValue> {
        match self {
            LuaValue::Integer(_) | LuaValue::Float(_) => Some(self.clone()),
            LuaValue::Str(s) => {
                let text = s.as_str()?;
                parse_number(text.trim())
            }
            _ => None,
        }
    }

    /// Integer coercion for bitwise operations: integers pass through,
    /// floats with an exact integral value convert, coercible strings parse.
    pub fn coerce_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            LuaValue::Float(f) => float_to_integer(*f),
            LuaValue::Str(_) => match self.coerce_number()? {
                LuaValue::Integer(i) => Some(i),
                LuaValue::Float(f) => float_to_integer(f),
                _ => None,
            },
            _ => None,
        }
    }

    /// Raw (metamethod-free) equality, as `rawequal` sees it.
    pub fn raw_equals(&self, other: &LuaValue) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Float(b))
            | (LuaValue::Float(b), LuaValue::Integer(a)) => (*a as f64) == *b,
            (LuaValue::Str(a), LuaValue::Str(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => a == b,
            (LuaValue::Userdata(a), LuaValue::Userdata(b)) => a == b,
            (LuaValue::Function(a), LuaValue::Function(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Native(a), LuaValue::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Float → integer conversion that succeeds only for exact integral values.
pub fn float_to_integer(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= -(2f64.powi(63)) && f < 2f64.powi(63) {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a Lua number literal (decimal or hex, integer or float). Used for
/// string→number coercion and `tonumber`.
pub fn parse_number(text: &str) -> Option<LuaValue> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => match text.strip_prefix('+') {
            Some(rest) => (false, rest.trim_start()),
            None => (false, text),
        },
    };
    if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        // Hex literals wrap around i64, as in Lua 5.3.
        let mut value: i64 = 0;
        for b in hex.bytes() {
            let digit = (b as char).to_digit(16).unwrap_or(0) as i64;
            value = value.wrapping_mul(16).wrapping_add(digit);
        }
        return Some(LuaValue::Integer(if negative {
            value.wrapping_neg()
        } else {
            value
        }));
    }
    if body.bytes().all(|b| b.is_ascii_digit()) && !body.is_empty() {
        if let Ok(i) = body.parse::<i64>() {
            return Some(LuaValue::Integer(if negative { -i } else { i }));
        }
        // Decimal integers that overflow become floats.
        if let Ok(f) = body.parse::<f64>() {
            return Some(LuaValue::Float(if negative { -f } else { f }));
        }
        return None;
    }
    match body.parse::<f64>() {
        Ok(f) if body.bytes().all(|b| {
            b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')
        }) =>
        {
            Some(LuaValue::Float(if negative { -f } else { f }))
        }
        _ => None,
    }
}

/// Render a float the way Lua 5.3 does: `%.14g`, with a trailing `.0`
/// appended when the result would read as an integer.
pub fn float_to_display(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = format_g(f, 14);
    if !s.contains(['.', 'e', 'n', 'i']) {
        s.push_str(".0");
    }
    s
}

/// C-style `%g` formatting with the given significant-digit precision.
pub fn format_g(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let precision = precision.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= precision as i32 {
        // Scientific notation, trailing zeros stripped from the mantissa.
        let formatted = format!("{:.*e}", precision - 1, value);
        let (mantissa, exp) = match formatted.split_once('e') {
            Some(pair) => pair,
            None => return formatted,
        };
        let mantissa = strip_trailing_zeros(mantissa);
        let exp_val: i32 = exp.parse().unwrap_or(0);
        format!(
            "{}e{}{:02}",
            mantissa,
            if exp_val < 0 { '-' } else { '+' },
            exp_val.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let formatted = format!("{:.*}", decimals, value);
        strip_trailing_zeros(&formatted).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Integer rendering through `itoa`, the hot path of `tostring` and
/// concatenation.
pub fn integer_to_display(i: i64) -> String {
    let mut buf = itoa::Buffer::new();
    buf.format(i).to_string()
}
