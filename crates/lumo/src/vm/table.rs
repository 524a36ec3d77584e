//! Tables: a single keyed map with an array fast path, plus an optional
//! metatable reference. Tables live in the state's arena; everything here
//! is metamethod-free (raw) access.

use std::rc::Rc;

use ahash::AHashMap;

use crate::vm::value::{LuaStr, LuaValue, TableRef, float_to_integer};

/// Normalized table key. Float keys with an exact integral value become
/// integer keys, so `t[1]` and `t[1.0]` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LuaKey {
    Integer(i64),
    Str(Rc<LuaStr>),
    Boolean(bool),
    /// Non-integral float, stored by bit pattern.
    Float(u64),
    Table(TableRef),
    /// Closure identity by allocation address.
    Function(usize),
    Native(usize),
    Userdata(u32),
}

/// Why a value cannot be used as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    Nil,
    NaN,
}

impl LuaKey {
    pub fn from_value(value: &LuaValue) -> Result<LuaKey, KeyError> {
        match value {
            LuaValue::Nil => Err(KeyError::Nil),
            LuaValue::Boolean(b) => Ok(LuaKey::Boolean(*b)),
            LuaValue::Integer(i) => Ok(LuaKey::Integer(*i)),
            LuaValue::Float(f) => {
                if f.is_nan() {
                    return Err(KeyError::NaN);
                }
                match float_to_integer(*f) {
                    Some(i) => Ok(LuaKey::Integer(i)),
                    None => Ok(LuaKey::Float(f.to_bits())),
                }
            }
            LuaValue::Str(s) => Ok(LuaKey::Str(s.clone())),
            LuaValue::Table(t) => Ok(LuaKey::Table(*t)),
            LuaValue::Function(f) => Ok(LuaKey::Function(Rc::as_ptr(f) as usize)),
            LuaValue::Native(f) => Ok(LuaKey::Native(Rc::as_ptr(f) as usize)),
            LuaValue::Userdata(u) => Ok(LuaKey::Userdata(*u)),
        }
    }

    /// Rebuild the value form, for `next` and host decoding. Identity keys
    /// need the original value, so tables keep it alongside (see
    /// `LuaTable::hash`).
    fn to_value(&self) -> Option<LuaValue> {
        match self {
            LuaKey::Integer(i) => Some(LuaValue::Integer(*i)),
            LuaKey::Str(s) => Some(LuaValue::Str(s.clone())),
            LuaKey::Boolean(b) => Some(LuaValue::Boolean(*b)),
            LuaKey::Float(bits) => Some(LuaValue::Float(f64::from_bits(*bits))),
            LuaKey::Table(t) => Some(LuaValue::Table(*t)),
            LuaKey::Userdata(u) => Some(LuaValue::Userdata(*u)),
            // Function keys cannot be reconstructed from the address alone.
            LuaKey::Function(_) | LuaKey::Native(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct LuaTable {
    /// Dense values for keys `1..=array.len()`. Interior nils are allowed
    /// transiently (a hole made by assignment); trailing nils are trimmed.
    array: Vec<LuaValue>,
    hash: AHashMap<LuaKey, (LuaValue, LuaValue)>,
    metatable: Option<TableRef>,
}

impl LuaTable {
    pub fn new() -> Self {
        LuaTable::default()
    }

    pub fn with_capacity(array_hint: usize, hash_hint: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(array_hint),
            hash: AHashMap::with_capacity(hash_hint),
            metatable: None,
        }
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable
    }

    pub fn set_metatable(&mut self, mt: Option<TableRef>) {
        self.metatable = mt;
    }

    pub fn raw_get(&self, key: &LuaValue) -> LuaValue {
        match LuaKey::from_value(key) {
            Ok(key) => self.raw_get_key(&key),
            Err(_) => LuaValue::Nil,
        }
    }

    pub fn raw_get_key(&self, key: &LuaKey) -> LuaValue {
        if let LuaKey::Integer(i) = key {
            if *i >= 1 && (*i as usize) <= self.array.len() {
                return self.array[*i as usize - 1].clone();
            }
        }
        self.hash
            .get(key)
            .map(|(_, v)| v.clone())
            .unwrap_or(LuaValue::Nil)
    }

    pub fn raw_get_int(&self, i: i64) -> LuaValue {
        self.raw_get_key(&LuaKey::Integer(i))
    }

    pub fn raw_get_str(&self, s: &str) -> LuaValue {
        self.raw_get_key(&LuaKey::Str(LuaStr::from_str(s)))
    }

    /// Raw assignment. Nil or NaN keys surface as a `KeyError` for the
    /// caller to turn into a type error.
    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> Result<(), KeyError> {
        let normalized = LuaKey::from_value(&key)?;
        self.raw_set_key(normalized, key, value);
        Ok(())
    }

    pub fn raw_set_int(&mut self, i: i64, value: LuaValue) {
        self.raw_set_key(LuaKey::Integer(i), LuaValue::Integer(i), value);
    }

    pub fn raw_set_str(&mut self, s: &str, value: LuaValue) {
        let rc = LuaStr::from_str(s);
        self.raw_set_key(LuaKey::Str(rc.clone()), LuaValue::Str(rc), value);
    }

    fn raw_set_key(&mut self, key: LuaKey, original: LuaValue, value: LuaValue) {
        if let LuaKey::Integer(i) = key {
            let len = self.array.len() as i64;
            if i >= 1 && i <= len {
                self.array[i as usize - 1] = value;
                if i == len {
                    self.trim_array_tail();
                }
                return;
            }
            if i == len + 1 {
                if value.is_nil() {
                    self.hash.remove(&key);
                    return;
                }
                self.array.push(value);
                self.migrate_from_hash();
                return;
            }
        }
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, (original, value));
        }
    }

    fn trim_array_tail(&mut self) {
        while matches!(self.array.last(), Some(LuaValue::Nil)) {
            self.array.pop();
        }
    }

    /// After an append, pull any hash-resident successors into the array
    /// part so the dense prefix stays dense.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = LuaKey::Integer(self.array.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some((_, value)) => self.array.push(value),
                None => break,
            }
        }
    }

    /// Sequence length: the largest N such that keys 1..N are all present.
    pub fn length(&self) -> i64 {
        let mut n: i64 = 0;
        // Fast path over the dense prefix.
        for value in &self.array {
            if value.is_nil() {
                return n;
            }
            n += 1;
        }
        while !self.raw_get_key(&LuaKey::Integer(n + 1)).is_nil() {
            n += 1;
        }
        n
    }

    /// Stateless iteration: the entry after `key`, or the first entry when
    /// `key` is nil. Order is array part first, then hash order; stable as
    /// long as no non-current key is added or removed mid-iteration.
    pub fn next(&self, key: &LuaValue) -> Result<Option<(LuaValue, LuaValue)>, KeyError> {
        if key.is_nil() {
            if let Some(found) = self.first_array_entry(0) {
                return Ok(Some(found));
            }
            return Ok(self.first_hash_entry());
        }
        let normalized = LuaKey::from_value(key)?;
        if let LuaKey::Integer(i) = normalized {
            if i >= 1 && (i as usize) <= self.array.len() {
                if let Some(found) = self.first_array_entry(i as usize) {
                    return Ok(Some(found));
                }
                return Ok(self.first_hash_entry());
            }
        }
        let mut iter = self.hash.iter();
        for (k, _) in iter.by_ref() {
            if *k == normalized {
                break;
            }
        }
        for (_, (original, value)) in iter {
            if !value.is_nil() {
                return Ok(Some((original.clone(), value.clone())));
            }
        }
        Ok(None)
    }

    fn first_array_entry(&self, from: usize) -> Option<(LuaValue, LuaValue)> {
        for (idx, value) in self.array.iter().enumerate().skip(from) {
            if !value.is_nil() {
                return Some((LuaValue::Integer(idx as i64 + 1), value.clone()));
            }
        }
        None
    }

    fn first_hash_entry(&self) -> Option<(LuaValue, LuaValue)> {
        self.hash
            .iter()
            .find(|(_, (_, v))| !v.is_nil())
            .map(|(_, (original, value))| (original.clone(), value.clone()))
    }

    /// All live entries, array part first. Used by host-side encoding.
    pub fn entries(&self) -> Vec<(LuaValue, LuaValue)> {
        let mut out = Vec::with_capacity(self.array.len() + self.hash.len());
        for (idx, value) in self.array.iter().enumerate() {
            if !value.is_nil() {
                out.push((LuaValue::Integer(idx as i64 + 1), value.clone()));
            }
        }
        for (key, (original, value)) in &self.hash {
            if !value.is_nil() {
                let key_value = original.clone();
                debug_assert!(LuaKey::from_value(&key_value).ok().as_ref() == Some(key));
                out.push((key_value, value.clone()));
            }
        }
        out
    }
}
