//! String library. Strings are byte sequences throughout; only `format`
//! interprets text. `find` performs literal search (no patterns).

use super::{arg_type_name, check_integer, check_str, opt_integer, tostring_value};
use crate::lib_registry::LibraryModule;
use crate::vm::error::LuaResult;
use crate::vm::state::LuaState;
use crate::vm::value::{LuaValue, float_to_display, format_g, integer_to_display};

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "lower" => string_lower,
        "upper" => string_upper,
        "len" => string_len,
        "sub" => string_sub,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "byte" => string_byte,
        "char" => string_char,
        "format" => string_format,
        "find" => string_find,
    })
}

fn string_lower(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "lower")?;
    let bytes = s.as_bytes().iter().map(|b| b.to_ascii_lowercase()).collect();
    Ok(vec![LuaValue::str_from_bytes(bytes)])
}

fn string_upper(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "upper")?;
    let bytes = s.as_bytes().iter().map(|b| b.to_ascii_uppercase()).collect();
    Ok(vec![LuaValue::str_from_bytes(bytes)])
}

fn string_len(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "len")?;
    Ok(vec![LuaValue::Integer(s.len() as i64)])
}

/// Translate a possibly-negative, possibly-out-of-range 1-based index.
/// Negative counts from the end; results clamp into `1..=len` for starts
/// and `0..=len` for ends.
fn relative_index(pos: i64, len: usize) -> i64 {
    if pos >= 0 {
        pos
    } else {
        len as i64 + pos + 1
    }
}

fn string_sub(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "sub")?;
    let len = s.len();
    let i = opt_integer(l, &args, 2, "sub", 1)?;
    let j = opt_integer(l, &args, 3, "sub", -1)?;
    let start = relative_index(i, len).max(1);
    let end = relative_index(j, len).min(len as i64);
    if start > end {
        return Ok(vec![LuaValue::str_from("")]);
    }
    let bytes = s.as_bytes()[start as usize - 1..end as usize].to_vec();
    Ok(vec![LuaValue::str_from_bytes(bytes)])
}

fn string_rep(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "rep")?;
    let n = check_integer(l, &args, 2, "rep")?;
    let sep = match args.get(3) {
        None | Some(LuaValue::Nil) => Vec::new(),
        _ => check_str(l, &args, 3, "rep")?.as_bytes().to_vec(),
    };
    if n <= 0 {
        return Ok(vec![LuaValue::str_from("")]);
    }
    let mut out = Vec::with_capacity(s.len() * n as usize);
    for i in 0..n {
        if i > 0 {
            out.extend_from_slice(&sep);
        }
        out.extend_from_slice(s.as_bytes());
    }
    Ok(vec![LuaValue::str_from_bytes(out)])
}

fn string_reverse(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "reverse")?;
    let mut bytes = s.as_bytes().to_vec();
    bytes.reverse();
    Ok(vec![LuaValue::str_from_bytes(bytes)])
}

fn string_byte(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "byte")?;
    let len = s.len();
    let i = opt_integer(l, &args, 2, "byte", 1)?;
    let j = opt_integer(l, &args, 3, "byte", i)?;
    let start = relative_index(i, len).max(1);
    let end = relative_index(j, len).min(len as i64);
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut pos = start;
    while pos <= end {
        out.push(LuaValue::Integer(bytes[pos as usize - 1] as i64));
        pos += 1;
    }
    Ok(out)
}

fn string_char(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut bytes = Vec::with_capacity(args.len());
    for n in 1..=args.len() {
        let value = check_integer(l, &args, n, "char")?;
        if !(0..=255).contains(&value) {
            return l.argument_error_detailed(
                "char",
                n,
                "number",
                arg_type_name(&args, n),
                "value out of range",
            );
        }
        bytes.push(value as u8);
    }
    Ok(vec![LuaValue::str_from_bytes(bytes)])
}

/// Literal substring search: `find(s, needle, init?, plain?)`. Patterns
/// are not interpreted; every needle is taken verbatim.
fn string_find(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_str(l, &args, 1, "find")?;
    let needle = check_str(l, &args, 2, "find")?;
    let init = opt_integer(l, &args, 3, "find", 1)?;
    let len = s.len();
    let mut start = relative_index(init, len);
    if start < 1 {
        start = 1;
    }
    if start as usize > len + 1 {
        return Ok(vec![LuaValue::Nil]);
    }
    let haystack = s.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return Ok(vec![
            LuaValue::Integer(start),
            LuaValue::Integer(start - 1),
        ]);
    }
    let from = start as usize - 1;
    if needle.len() > len {
        return Ok(vec![LuaValue::Nil]);
    }
    for pos in from..=len - needle.len() {
        if &haystack[pos..pos + needle.len()] == needle {
            return Ok(vec![
                LuaValue::Integer(pos as i64 + 1),
                LuaValue::Integer((pos + needle.len()) as i64),
            ]);
        }
    }
    Ok(vec![LuaValue::Nil])
}

// ---- format ---------------------------------------------------------

#[derive(Default)]
struct FormatSpec {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
}

impl FormatSpec {
    fn pad(&self, body: String) -> String {
        if body.len() >= self.width {
            return body;
        }
        let fill = self.width - body.len();
        if self.left_align {
            let mut out = body;
            out.push_str(&" ".repeat(fill));
            out
        } else if self.zero_pad {
            // Zero padding goes after any sign or prefix.
            let split = body
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(0);
            let (head, tail) = body.split_at(split);
            format!("{}{}{}", head, "0".repeat(fill), tail)
        } else {
            format!("{}{}", " ".repeat(fill), body)
        }
    }

    /// C-style integer precision: a minimum digit count, filled with
    /// leading zeros before any sign or prefix is attached.
    fn min_digits(&self, digits: String) -> String {
        match self.precision {
            Some(precision) if digits.len() < precision => {
                format!("{}{}", "0".repeat(precision - digits.len()), digits)
            }
            _ => digits,
        }
    }

    fn signed(&self, negative: bool, digits: String) -> String {
        if negative {
            format!("-{}", digits)
        } else if self.plus_sign {
            format!("+{}", digits)
        } else if self.space_sign {
            format!(" {}", digits)
        } else {
            digits
        }
    }
}

/// `string.format` with the C-style subset `%s %q %d %i %u %c %x %X %o %f
/// %e %g %%`, honoring flags, width and precision.
fn string_format(l: &mut LuaState, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_str(l, &args, 1, "format")?;
    let text = fmt.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(text.len());
    let mut arg_index = 1;
    let mut i = 0;
    while i < text.len() {
        if text[i] != b'%' {
            out.push(text[i]);
            i += 1;
            continue;
        }
        i += 1;
        if i >= text.len() {
            return l.runtime_error("invalid format string to 'format'");
        }
        if text[i] == b'%' {
            out.push(b'%');
            i += 1;
            continue;
        }
        let mut spec = FormatSpec::default();
        while i < text.len() {
            match text[i] {
                b'-' => spec.left_align = true,
                b'0' => spec.zero_pad = true,
                b'+' => spec.plus_sign = true,
                b' ' => spec.space_sign = true,
                b'#' => spec.alternate = true,
                _ => break,
            }
            i += 1;
        }
        let mut width = 0usize;
        while i < text.len() && text[i].is_ascii_digit() {
            width = width * 10 + (text[i] - b'0') as usize;
            i += 1;
        }
        spec.width = width;
        if i < text.len() && text[i] == b'.' {
            i += 1;
            let mut precision = 0usize;
            while i < text.len() && text[i].is_ascii_digit() {
                precision = precision * 10 + (text[i] - b'0') as usize;
                i += 1;
            }
            spec.precision = Some(precision);
        }
        if i >= text.len() {
            return l.runtime_error("invalid format string to 'format'");
        }
        let conversion = text[i];
        i += 1;
        arg_index += 1;
        let piece = format_one(l, &args, arg_index, conversion, &spec)?;
        out.extend_from_slice(&piece);
    }
    Ok(vec![LuaValue::str_from_bytes(out)])
}

fn format_one(
    l: &mut LuaState,
    args: &[LuaValue],
    n: usize,
    conversion: u8,
    spec: &FormatSpec,
) -> LuaResult<Vec<u8>> {
    match conversion {
        b's' => {
            let value = args.get(n - 1).cloned().unwrap_or(LuaValue::Nil);
            let rendered = tostring_value(l, &value)?;
            let mut bytes = rendered.as_bytes().to_vec();
            if let Some(precision) = spec.precision {
                bytes.truncate(precision);
            }
            Ok(spec.pad(String::from_utf8_lossy(&bytes).into_owned()).into_bytes())
        }
        b'q' => {
            let s = check_str(l, args, n, "format")?;
            let mut quoted = vec![b'"'];
            for &b in s.as_bytes() {
                match b {
                    b'"' => quoted.extend_from_slice(b"\\\""),
                    b'\\' => quoted.extend_from_slice(b"\\\\"),
                    b'\n' => quoted.extend_from_slice(b"\\n"),
                    b'\r' => quoted.extend_from_slice(b"\\r"),
                    0 => quoted.extend_from_slice(b"\\0"),
                    _ if b < 32 || b == 127 => {
                        quoted.extend_from_slice(format!("\\{}", b).as_bytes());
                    }
                    _ => quoted.push(b),
                }
            }
            quoted.push(b'"');
            Ok(quoted)
        }
        b'd' | b'i' => {
            let value = check_integer(l, args, n, "format")?;
            let digits = integer_to_display(value.wrapping_abs());
            let digits = if value == i64::MIN {
                // abs(i64::MIN) wraps; render through u64 instead.
                (value as u64 as i64).unsigned_abs().to_string()
            } else {
                digits
            };
            let digits = spec.min_digits(digits);
            Ok(spec.pad(spec.signed(value < 0, digits)).into_bytes())
        }
        b'u' => {
            let value = check_integer(l, args, n, "format")?;
            let digits = spec.min_digits(format!("{}", value as u64));
            Ok(spec.pad(digits).into_bytes())
        }
        b'c' => {
            let value = check_integer(l, args, n, "format")?;
            Ok(vec![value as u8])
        }
        b'x' => {
            let value = check_integer(l, args, n, "format")?;
            let body = spec.min_digits(format!("{:x}", value as u64));
            let body = if spec.alternate {
                format!("0x{}", body)
            } else {
                body
            };
            Ok(spec.pad(body).into_bytes())
        }
        b'X' => {
            let value = check_integer(l, args, n, "format")?;
            let body = spec.min_digits(format!("{:X}", value as u64));
            let body = if spec.alternate {
                format!("0X{}", body)
            } else {
                body
            };
            Ok(spec.pad(body).into_bytes())
        }
        b'o' => {
            let value = check_integer(l, args, n, "format")?;
            let digits = spec.min_digits(format!("{:o}", value as u64));
            Ok(spec.pad(digits).into_bytes())
        }
        b'f' | b'F' => {
            let value = super::check_number(l, args, n, "format")?;
            let precision = spec.precision.unwrap_or(6);
            let body = format!("{:.*}", precision, value.abs());
            Ok(spec
                .pad(spec.signed(value.is_sign_negative(), body))
                .into_bytes())
        }
        b'e' | b'E' => {
            let value = super::check_number(l, args, n, "format")?;
            let precision = spec.precision.unwrap_or(6);
            let body = format_exponent(value.abs(), precision, conversion == b'E');
            Ok(spec
                .pad(spec.signed(value.is_sign_negative(), body))
                .into_bytes())
        }
        b'g' | b'G' => {
            let value = super::check_number(l, args, n, "format")?;
            let precision = spec.precision.unwrap_or(6).max(1);
            let mut body = format_g(value, precision);
            if conversion == b'G' {
                body = body.to_uppercase();
            }
            Ok(spec.pad(body).into_bytes())
        }
        other => l.runtime_error(format!(
            "invalid conversion '%{}' to 'format'",
            other as char
        )),
    }
}

/// C-style `%e`: mantissa, `e`, signed two-digit exponent.
fn format_exponent(value: f64, precision: usize, upper: bool) -> String {
    if value == 0.0 {
        let mantissa = format!("{:.*}", precision, 0.0);
        return format!("{}{}+00", mantissa, if upper { 'E' } else { 'e' });
    }
    if value.is_infinite() {
        return "inf".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    let mantissa = value / 10f64.powi(exponent);
    // Rounding in the mantissa can carry past 10.
    let (mantissa, exponent) = if format!("{:.*}", precision, mantissa).starts_with("10") {
        (mantissa / 10.0, exponent + 1)
    } else {
        (mantissa, exponent)
    };
    format!(
        "{:.*}{}{}{:02}",
        precision,
        mantissa,
        if upper { 'E' } else { 'e' },
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    )
}

/// Rendering for error messages and concatenation contexts.
pub(crate) fn display_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Str(s) => s.to_string_lossy(),
        LuaValue::Integer(i) => integer_to_display(*i),
        LuaValue::Float(f) => float_to_display(*f),
        other => other.type_name().to_string(),
    }
}
