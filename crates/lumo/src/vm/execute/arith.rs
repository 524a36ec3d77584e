//! Arithmetic, comparison, concatenation and length, with metamethod
//! fallback and Lua 5.3 integer/float semantics. Integer arithmetic wraps
//! two's-complement; any division or modulo by zero (integer or float) is
//! a runtime error.

use crate::vm::instruction::{ArithOp, CompareOp};
use crate::vm::state::LuaState;
use crate::vm::value::{
    LuaValue, float_to_display, integer_to_display,
};

fn arith_event(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "__add",
        ArithOp::Sub => "__sub",
        ArithOp::Mul => "__mul",
        ArithOp::Div => "__div",
        ArithOp::IDiv => "__idiv",
        ArithOp::Mod => "__mod",
        ArithOp::Pow => "__pow",
        ArithOp::BAnd => "__band",
        ArithOp::BOr => "__bor",
        ArithOp::BXor => "__bxor",
        ArithOp::Shl => "__shl",
        ArithOp::Shr => "__shr",
    }
}

/// Floor division rounding toward negative infinity.
fn int_floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && (a ^ b) < 0 {
        q.wrapping_sub(1)
    } else {
        q
    }
}

/// Modulo with the sign of the divisor, as Lua defines `%`.
fn int_floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r ^ b) < 0 { r.wrapping_add(b) } else { r }
}

fn float_floor_mod(a: f64, b: f64) -> f64 {
    a - (a / b).floor() * b
}

/// Shifts: counts of 64 or more clear the value; negative counts shift the
/// other way. Both shifts are logical (unsigned), as in Lua 5.3.
fn int_shl(a: i64, n: i64) -> i64 {
    if n < 0 {
        int_shr(a, n.wrapping_neg())
    } else if n >= 64 {
        0
    } else {
        ((a as u64) << n) as i64
    }
}

fn int_shr(a: i64, n: i64) -> i64 {
    if n < 0 {
        int_shl(a, n.wrapping_neg())
    } else if n >= 64 {
        0
    } else {
        ((a as u64) >> n) as i64
    }
}

impl LuaState {
    /// Try the metamethod for `event` on either operand.
    fn arith_metamethod(
        &mut self,
        event: &'static str,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<Option<LuaValue>> {
        let handler = self
            .get_metamethod(a, event)
            .or_else(|| self.get_metamethod(b, event));
        match handler {
            Some(h) => {
                let results = self.call_value(&h, vec![a.clone(), b.clone()], None)?;
                Ok(Some(results.into_iter().next().unwrap_or(LuaValue::Nil)))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn arith_values(
        &mut self,
        op: ArithOp,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        // Bitwise operations work on integers only.
        if matches!(
            op,
            ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr
        ) {
            if let (Some(x), Some(y)) = (a.coerce_integer(), b.coerce_integer()) {
                let result = match op {
                    ArithOp::BAnd => x & y,
                    ArithOp::BOr => x | y,
                    ArithOp::BXor => x ^ y,
                    ArithOp::Shl => int_shl(x, y),
                    ArithOp::Shr => int_shr(x, y),
                    _ => unreachable!(),
                };
                return Ok(LuaValue::Integer(result));
            }
            if let Some(result) = self.arith_metamethod(arith_event(op), a, b)? {
                return Ok(result);
            }
            let offender = if a.coerce_integer().is_none() { a } else { b };
            if offender.as_number().is_some() {
                return self
                    .runtime_error("number has no integer representation");
            }
            return self.type_error(format!(
                "attempt to perform bitwise operation on a {} value",
                offender.type_name()
            ));
        }

        let (na, nb) = match (a.coerce_number(), b.coerce_number()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                if let Some(result) = self.arith_metamethod(arith_event(op), a, b)? {
                    return Ok(result);
                }
                let offender = if a.coerce_number().is_none() { a } else { b };
                return self.type_error(format!(
                    "attempt to perform arithmetic on a {} value",
                    offender.type_name()
                ));
            }
        };

        match (na, nb) {
            (LuaValue::Integer(x), LuaValue::Integer(y)) => match op {
                ArithOp::Add => Ok(LuaValue::Integer(x.wrapping_add(y))),
                ArithOp::Sub => Ok(LuaValue::Integer(x.wrapping_sub(y))),
                ArithOp::Mul => Ok(LuaValue::Integer(x.wrapping_mul(y))),
                ArithOp::Div => self.float_arith(ArithOp::Div, x as f64, y as f64),
                ArithOp::IDiv => {
                    if y == 0 {
                        self.runtime_error("divide by zero")
                    } else {
                        Ok(LuaValue::Integer(int_floor_div(x, y)))
                    }
                }
                ArithOp::Mod => {
                    if y == 0 {
                        self.runtime_error("modulo by zero")
                    } else {
                        Ok(LuaValue::Integer(int_floor_mod(x, y)))
                    }
                }
                ArithOp::Pow => self.float_arith(ArithOp::Pow, x as f64, y as f64),
                _ => unreachable!(),
            },
            (x, y) => {
                let (Some(x), Some(y)) = (x.as_number(), y.as_number()) else {
                    return self.internal_error("numeric coercion produced non-number");
                };
                self.float_arith(op, x, y)
            }
        }
    }

    fn float_arith(
        &mut self,
        op: ArithOp,
        x: f64,
        y: f64,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        let result = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => {
                if y == 0.0 {
                    return self.runtime_error("divide by zero");
                }
                x / y
            }
            ArithOp::IDiv => {
                if y == 0.0 {
                    return self.runtime_error("divide by zero");
                }
                (x / y).floor()
            }
            ArithOp::Mod => {
                if y == 0.0 {
                    return self.runtime_error("modulo by zero");
                }
                float_floor_mod(x, y)
            }
            ArithOp::Pow => x.powf(y),
            _ => return self.internal_error("bitwise op in float arithmetic"),
        };
        Ok(LuaValue::Float(result))
    }

    pub(crate) fn negate_value(
        &mut self,
        value: &LuaValue,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        match value.coerce_number() {
            Some(LuaValue::Integer(i)) => Ok(LuaValue::Integer(i.wrapping_neg())),
            Some(LuaValue::Float(f)) => Ok(LuaValue::Float(-f)),
            _ => {
                if let Some(handler) = self.get_metamethod(value, "__unm") {
                    let results = self
                        .call_value(&handler, vec![value.clone(), value.clone()], None)?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                self.type_error(format!(
                    "attempt to perform arithmetic on a {} value",
                    value.type_name()
                ))
            }
        }
    }

    pub(crate) fn bitnot_value(
        &mut self,
        value: &LuaValue,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        match value.coerce_integer() {
            Some(i) => Ok(LuaValue::Integer(!i)),
            None => {
                if let Some(handler) = self.get_metamethod(value, "__bnot") {
                    let results = self
                        .call_value(&handler, vec![value.clone(), value.clone()], None)?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                self.type_error(format!(
                    "attempt to perform bitwise operation on a {} value",
                    value.type_name()
                ))
            }
        }
    }

    // ---- comparison -------------------------------------------------

    pub(crate) fn compare_values(
        &mut self,
        op: CompareOp,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<bool> {
        match op {
            CompareOp::Eq => self.equals_values(a, b),
            CompareOp::Ne => Ok(!self.equals_values(a, b)?),
            CompareOp::Lt => self.less_than(a, b),
            CompareOp::Le => self.less_equal(a, b),
            CompareOp::Gt => self.less_than(b, a),
            CompareOp::Ge => self.less_equal(b, a),
        }
    }

    /// `==`: raw equality first; `__eq` fires only when both operands are
    /// tables sharing the same handler.
    pub(crate) fn equals_values(
        &mut self,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<bool> {
        if a.raw_equals(b) {
            return Ok(true);
        }
        if let (LuaValue::Table(_), LuaValue::Table(_)) = (a, b) {
            let ha = self.get_metamethod(a, "__eq");
            let hb = self.get_metamethod(b, "__eq");
            if let (Some(ha), Some(hb)) = (ha, hb) {
                if ha.raw_equals(&hb) {
                    let results =
                        self.call_value(&ha, vec![a.clone(), b.clone()], None)?;
                    return Ok(results
                        .into_iter()
                        .next()
                        .unwrap_or(LuaValue::Nil)
                        .truthy());
                }
            }
        }
        Ok(false)
    }

    fn less_than(&mut self, a: &LuaValue, b: &LuaValue) -> crate::vm::error::LuaResult<bool> {
        match (a, b) {
            (LuaValue::Integer(x), LuaValue::Integer(y)) => Ok(x < y),
            _ if a.as_number().is_some() && b.as_number().is_some() => {
                let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
                    return self.internal_error("number comparison lost operands");
                };
                Ok(x < y)
            }
            (LuaValue::Str(x), LuaValue::Str(y)) => Ok(x.as_bytes() < y.as_bytes()),
            _ => self.order_metamethod("__lt", a, b),
        }
    }

    fn less_equal(
        &mut self,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<bool> {
        match (a, b) {
            (LuaValue::Integer(x), LuaValue::Integer(y)) => Ok(x <= y),
            _ if a.as_number().is_some() && b.as_number().is_some() => {
                let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
                    return self.internal_error("number comparison lost operands");
                };
                Ok(x <= y)
            }
            (LuaValue::Str(x), LuaValue::Str(y)) => Ok(x.as_bytes() <= y.as_bytes()),
            _ => self.order_metamethod("__le", a, b),
        }
    }

    fn order_metamethod(
        &mut self,
        event: &'static str,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<bool> {
        let handler = self
            .get_metamethod(a, event)
            .or_else(|| self.get_metamethod(b, event));
        match handler {
            Some(h) => {
                let results = self.call_value(&h, vec![a.clone(), b.clone()], None)?;
                Ok(results.into_iter().next().unwrap_or(LuaValue::Nil).truthy())
            }
            None => self.type_error(format!(
                "attempt to compare {} with {}",
                a.type_name(),
                b.type_name()
            )),
        }
    }

    // ---- concatenation and length -----------------------------------

    /// Strings and numbers concatenate; anything else goes through
    /// `__concat` on either operand.
    pub(crate) fn concat_values(
        &mut self,
        a: &LuaValue,
        b: &LuaValue,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        let left = concat_bytes(a);
        let right = concat_bytes(b);
        if let (Some(mut left), Some(right)) = (left, right) {
            left.extend_from_slice(&right);
            return Ok(LuaValue::str_from_bytes(left));
        }
        if let Some(handler) = self
            .get_metamethod(a, "__concat")
            .or_else(|| self.get_metamethod(b, "__concat"))
        {
            let results = self.call_value(&handler, vec![a.clone(), b.clone()], None)?;
            return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
        }
        let offender = if concat_bytes(a).is_none() { a } else { b };
        self.type_error(format!(
            "attempt to concatenate a {} value",
            offender.type_name()
        ))
    }

    /// `#v`: byte length for strings; `__len` (else sequence length) for
    /// tables.
    pub(crate) fn length_of(
        &mut self,
        value: &LuaValue,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        match value {
            LuaValue::Str(s) => Ok(LuaValue::Integer(s.len() as i64)),
            LuaValue::Table(id) => {
                if let Some(handler) = self.get_metamethod(value, "__len") {
                    let results = self.call_value(&handler, vec![value.clone()], None)?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                Ok(LuaValue::Integer(self.table(*id).length()))
            }
            other => self.type_error(format!(
                "attempt to get length of a {} value",
                other.type_name()
            )),
        }
    }
}

fn concat_bytes(value: &LuaValue) -> Option<Vec<u8>> {
    match value {
        LuaValue::Str(s) => Some(s.as_bytes().to_vec()),
        LuaValue::Integer(i) => Some(integer_to_display(*i).into_bytes()),
        LuaValue::Float(f) => Some(float_to_display(*f).into_bytes()),
        _ => None,
    }
}
