//! Indexing with `__index`/`__newindex` chains, and metamethod lookup.

use crate::vm::state::LuaState;
use crate::vm::table::KeyError;
use crate::vm::value::{LuaValue, TableRef};

/// Bound on metamethod chains, so cyclic `__index` graphs fail instead of
/// spinning.
const MAX_META_CHAIN: usize = 100;

impl LuaState {
    pub(crate) fn metatable_of(&self, value: &LuaValue) -> Option<TableRef> {
        match value {
            LuaValue::Table(id) => self.table(*id).metatable(),
            _ => None,
        }
    }

    /// The metamethod for `event` on `value`'s metatable, if any.
    pub(crate) fn get_metamethod(&self, value: &LuaValue, event: &str) -> Option<LuaValue> {
        let mt = self.metatable_of(value)?;
        let handler = self.table(mt).raw_get_str(event);
        if handler.is_nil() { None } else { Some(handler) }
    }

    /// `obj[key]` with the `__index` chain: a present key wins; a table
    /// handler re-indexes; a function handler is called with `(obj, key)`.
    pub fn index_value(
        &mut self,
        obj: &LuaValue,
        key: &LuaValue,
    ) -> crate::vm::error::LuaResult<LuaValue> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            if let LuaValue::Table(id) = current {
                let raw = self.table(id).raw_get(key);
                if !raw.is_nil() {
                    return Ok(raw);
                }
                match self.get_metamethod(&current, "__index") {
                    None => return Ok(LuaValue::Nil),
                    Some(handler @ (LuaValue::Function(_) | LuaValue::Native(_))) => {
                        let results = self
                            .call_value(&handler, vec![current, key.clone()], None)?;
                        return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                    }
                    Some(next) => current = next,
                }
            } else {
                return self.type_error(format!(
                    "attempt to index a {} value",
                    current.type_name()
                ));
            }
        }
        self.type_error("'__index' chain too long; possible loop")
    }

    /// `obj[key] = value` with the `__newindex` chain: a present key (or a
    /// missing handler) assigns in place; a table handler re-assigns there;
    /// a function handler is called with `(obj, key, value)`.
    pub fn setindex_value(
        &mut self,
        obj: &LuaValue,
        key: LuaValue,
        value: LuaValue,
    ) -> crate::vm::error::LuaResult<()> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            if let LuaValue::Table(id) = current {
                let present = !self.table(id).raw_get(&key).is_nil();
                if present {
                    return self.raw_set_checked(id, key, value);
                }
                match self.get_metamethod(&current, "__newindex") {
                    None => return self.raw_set_checked(id, key, value),
                    Some(handler @ (LuaValue::Function(_) | LuaValue::Native(_))) => {
                        self.call_value(&handler, vec![current, key, value], None)?;
                        return Ok(());
                    }
                    Some(next) => current = next,
                }
            } else {
                return self.type_error(format!(
                    "attempt to index a {} value",
                    current.type_name()
                ));
            }
        }
        self.type_error("'__newindex' chain too long; possible loop")
    }

    pub(crate) fn raw_set_checked(
        &mut self,
        id: TableRef,
        key: LuaValue,
        value: LuaValue,
    ) -> crate::vm::error::LuaResult<()> {
        match self.table_mut(id).raw_set(key, value) {
            Ok(()) => Ok(()),
            Err(KeyError::Nil) => self.type_error("table index is nil"),
            Err(KeyError::NaN) => self.type_error("table index is NaN"),
        }
    }
}
